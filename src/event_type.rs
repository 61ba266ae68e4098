//! Event Types und geordnete Event-Tabellen (EXI 8.2, 8.5.4.3).
//!
//! Eine [`EventTypeList`] beschreibt genau einen Grammatik-Zustand: die
//! geordneten Productions mit Index, Tiefe und Event Code. Encoder und
//! Decoder verlassen sich darauf, dass dieselbe Grammatik unter denselben
//! Optionen immer dieselbe Liste erzeugt.

use std::fmt;
use std::sync::Arc;

use crate::event::{Event, NilValue};
use crate::event_code::{Depth, EventCode, EventCodeWidths};
use crate::qname::QName;
use crate::schema::{ElementId, WildcardConstraint};

/// Identität einer gecachten Grammatik (vom Cache vergeben).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrammarId(pub(crate) u32);

/// Item kind of a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartDocument,
    EndDocument,
    /// Deklariertes `SE(qname)`.
    StartElement,
    /// Wildcard mit konkretem Namespace: `SE(uri:*)`.
    StartElementNs,
    /// Wildcard beliebiger Namespace: `SE(*)` (deklariert).
    StartElementWildcard,
    /// Deklariertes `EE`.
    EndElement,
    /// Deklariertes `AT(qname)`.
    Attribute,
    /// Attribute Wildcard mit konkretem Namespace: `AT(uri:*)`.
    AttributeNs,
    /// Attribute Wildcard beliebiger Namespace: `AT(*)` (deklariert).
    AttributeWildcard,
    /// Getypte Character Data.
    Characters,
    /// Character Data in mixed content.
    CharactersMixed,
    /// `AT(xsi:nil)`
    Nil,
    /// `AT(xsi:type)`
    Type,
    UndeclaredEndElement,
    UndeclaredAttributeWildcard,
    /// `AT(qname)[untyped]` für deklarierte Attribute mit ungültigem Wert.
    UndeclaredAttributeInvalidValue,
    /// `AT(*)[untyped]`
    UndeclaredAttributeWildcardInvalidValue,
    UndeclaredStartElementWildcard,
    UndeclaredCharacters,
    NamespaceDeclaration,
    Comment,
    ProcessingInstruction,
    SelfContained,
}

impl EventKind {
    /// Productions die aus dem Schema stammen (erstes Level).
    pub fn is_declared(self) -> bool {
        matches!(
            self,
            Self::StartDocument
                | Self::EndDocument
                | Self::StartElement
                | Self::StartElementNs
                | Self::StartElementWildcard
                | Self::EndElement
                | Self::Attribute
                | Self::AttributeNs
                | Self::AttributeWildcard
                | Self::Characters
                | Self::CharactersMixed
        )
    }

    /// Fallback-Productions des lenient mode (EXI 8.5.4.4.1).
    pub fn is_undeclared(self) -> bool {
        matches!(
            self,
            Self::UndeclaredEndElement
                | Self::UndeclaredAttributeWildcard
                | Self::UndeclaredAttributeInvalidValue
                | Self::UndeclaredAttributeWildcardInvalidValue
                | Self::UndeclaredStartElementWildcard
                | Self::UndeclaredCharacters
        )
    }

    /// Feature-Events, die nur mit gesetztem Options-Flag existieren.
    pub fn is_feature(self) -> bool {
        matches!(
            self,
            Self::NamespaceDeclaration | Self::Comment | Self::ProcessingInstruction | Self::SelfContained
        )
    }
}

/// One production of a grammar state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    kind: EventKind,
    name: Option<QName>,
    uri: Option<Arc<str>>,
    wildcard: Option<WildcardConstraint>,
    depth: Depth,
    index: u32,
    code: EventCode,
    grammar: GrammarId,
    pub(crate) element: Option<ElementId>,
    pub(crate) leaf: Option<u32>,
    pub(crate) next_position: Option<u32>,
}

impl EventType {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Name bei `SE(qname)`, `AT(qname)` und `AT(qname)[untyped]`.
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    /// Namespace bei `SE(uri:*)` und `AT(uri:*)`.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Namespace Constraint bei deklariertem `SE(*)`/`AT(*)` (`None` = `##any`).
    pub fn wildcard(&self) -> Option<&WildcardConstraint> {
        self.wildcard.as_ref()
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Rang innerhalb der Liste.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn code(&self) -> EventCode {
        self.code
    }

    pub fn grammar(&self) -> GrammarId {
        self.grammar
    }

    /// Deklaration des Kind-Elements bei deklariertem `SE(qname)`.
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// Prüft ob ein konkretes Event von dieser Production abgedeckt wird.
    pub fn matches(&self, event: &Event) -> bool {
        use EventKind as K;
        match (self.kind, event) {
            (K::StartDocument, Event::StartDocument) | (K::EndDocument, Event::EndDocument) => true,
            (K::StartElement, Event::StartElement(q)) => self.name.as_ref() == Some(q),
            (K::StartElementNs, Event::StartElement(q)) => self.uri.as_deref() == Some(&*q.uri),
            (K::StartElementWildcard, Event::StartElement(q)) => self.allows(&q.uri),
            (K::UndeclaredStartElementWildcard, Event::StartElement(_)) => true,
            (K::EndElement | K::UndeclaredEndElement, Event::EndElement) => true,
            (K::Attribute, Event::Attribute { name, valid: true }) => self.name.as_ref() == Some(name),
            (K::AttributeNs, Event::Attribute { name, valid: true }) => self.uri.as_deref() == Some(&*name.uri),
            (K::AttributeWildcard, Event::Attribute { name, valid: true }) => self.allows(&name.uri),
            (K::UndeclaredAttributeWildcard, Event::Attribute { valid: true, .. }) => true,
            // xsi:type/xsi:nil ausserhalb von Element_i,0 (lenient)
            (K::UndeclaredAttributeWildcard, Event::XsiType(_) | Event::XsiNil(NilValue::True | NilValue::False)) => {
                true
            }
            (K::UndeclaredAttributeInvalidValue, Event::Attribute { name, valid: false }) => {
                self.name.as_ref() == Some(name)
            }
            (K::UndeclaredAttributeWildcardInvalidValue, Event::Attribute { valid: false, .. }) => true,
            (K::UndeclaredAttributeWildcardInvalidValue, Event::XsiNil(NilValue::Invalid)) => true,
            (K::Type, Event::XsiType(_)) => true,
            (K::Nil, Event::XsiNil(NilValue::True | NilValue::False)) => true,
            (K::Characters, Event::Characters { valid: true }) => true,
            (K::CharactersMixed | K::UndeclaredCharacters, Event::Characters { .. }) => true,
            (K::NamespaceDeclaration, Event::NamespaceDeclaration)
            | (K::Comment, Event::Comment)
            | (K::ProcessingInstruction, Event::ProcessingInstruction)
            | (K::SelfContained, Event::SelfContained) => true,
            _ => false,
        }
    }

    fn allows(&self, uri: &str) -> bool {
        self.wildcard.as_ref().map_or(true, |w| w.allows(uri))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EventKind as K;
        let name = self.name.as_ref().map(ToString::to_string).unwrap_or_default();
        let uri = self.uri.as_deref().unwrap_or_default();
        match self.kind {
            K::StartDocument => f.write_str("SD"),
            K::EndDocument => f.write_str("ED"),
            K::StartElement => write!(f, "SE({name})"),
            K::StartElementNs => write!(f, "SE({uri}:*)"),
            K::StartElementWildcard | K::UndeclaredStartElementWildcard => f.write_str("SE(*)"),
            K::EndElement | K::UndeclaredEndElement => f.write_str("EE"),
            K::Attribute => write!(f, "AT({name})"),
            K::AttributeNs => write!(f, "AT({uri}:*)"),
            K::AttributeWildcard | K::UndeclaredAttributeWildcard => f.write_str("AT(*)"),
            K::UndeclaredAttributeInvalidValue => write!(f, "AT({name})[untyped]"),
            K::UndeclaredAttributeWildcardInvalidValue => f.write_str("AT(*)[untyped]"),
            K::Characters => f.write_str("CH"),
            K::CharactersMixed => f.write_str("CH[mixed]"),
            K::UndeclaredCharacters => f.write_str("CH[untyped]"),
            K::Nil => f.write_str("AT(xsi:nil)"),
            K::Type => f.write_str("AT(xsi:type)"),
            K::NamespaceDeclaration => f.write_str("NS"),
            K::Comment => f.write_str("CM"),
            K::ProcessingInstruction => f.write_str("PI"),
            K::SelfContained => f.write_str("SC"),
        }
    }
}

/// Ordered productions of exactly one grammar state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeList {
    events: Vec<EventType>,
    widths: EventCodeWidths,
}

impl EventTypeList {
    /// Leere Liste (nur als Platzhalter, kein gültiger Zustand).
    pub fn empty() -> Self {
        Self { events: Vec::new(), widths: EventCodeWidths::default() }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EventType> {
        self.events.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EventType> {
        self.events.iter()
    }

    /// Bitbreiten der Code-Teile.
    pub fn widths(&self) -> &EventCodeWidths {
        &self.widths
    }

    /// Production zu einem gelesenen Event Code (Decoder-Richtung).
    pub fn by_code(&self, code: &EventCode) -> Option<&EventType> {
        self.events.iter().find(|et| et.code == *code)
    }

    /// Erste Production einer Art (optional mit Name).
    pub fn find(&self, kind: EventKind, name: Option<&QName>) -> Option<&EventType> {
        self.events
            .iter()
            .find(|et| et.kind == kind && (name.is_none() || et.name.as_ref() == name))
    }

    pub fn contains_kind(&self, kind: EventKind) -> bool {
        self.events.iter().any(|et| et.kind == kind)
    }

    /// Production mit dem niedrigsten Index, die das Event abdeckt
    /// (Encoder-Richtung). Deklarierte Productions stehen vor Wildcards,
    /// Wildcards vor undeclared Productions.
    pub fn match_event(&self, event: &Event) -> Option<&EventType> {
        self.events.iter().find(|et| et.matches(event))
    }

    /// Kompakte Darstellung `code:event, ...` für Fehlermeldungen.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self.events.iter().map(|et| format!("{} {et}", et.code)).collect();
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventTypeList {
    type Item = &'a EventType;
    type IntoIter = std::slice::Iter<'a, EventType>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl fmt::Display for EventTypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for et in &self.events {
            writeln!(f, "  {:<8} {et}", et.code.to_string())?;
        }
        Ok(())
    }
}

// ============================================================================
// Aufbau
// ============================================================================

/// Noch nicht nummerierte Production.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) kind: EventKind,
    pub(crate) name: Option<QName>,
    pub(crate) uri: Option<Arc<str>>,
    pub(crate) wildcard: Option<WildcardConstraint>,
    pub(crate) element: Option<ElementId>,
    pub(crate) leaf: Option<u32>,
    pub(crate) next_position: Option<u32>,
}

impl Entry {
    pub(crate) fn new(kind: EventKind) -> Self {
        Self {
            kind,
            name: None,
            uri: None,
            wildcard: None,
            element: None,
            leaf: None,
            next_position: None,
        }
    }

    pub(crate) fn named(kind: EventKind, name: QName) -> Self {
        Self { name: Some(name), ..Self::new(kind) }
    }

    pub(crate) fn with_uri(mut self, uri: Arc<str>) -> Self {
        self.uri = Some(uri);
        self
    }

    pub(crate) fn with_wildcard(mut self, wildcard: WildcardConstraint) -> Self {
        self.wildcard = Some(wildcard);
        self
    }

    pub(crate) fn with_element(mut self, element: ElementId) -> Self {
        self.element = Some(element);
        self
    }

    pub(crate) fn with_leaf(mut self, leaf: u32) -> Self {
        self.leaf = Some(leaf);
        self
    }

    pub(crate) fn with_next_position(mut self, position: u32) -> Self {
        self.next_position = Some(position);
        self
    }

    fn key(&self) -> (EventKind, Option<&QName>, Option<&str>, Option<&WildcardConstraint>) {
        (self.kind, self.name.as_ref(), self.uri.as_deref(), self.wildcard.as_ref())
    }
}

enum Slot {
    Single(Entry),
    Group(Vec<Entry>),
}

/// Nummeriert Productions: deklarierte auf dem ersten Level, danach ein
/// Escape-Wert für das zweite Level, dessen Slots einzeln (Tiefe zwei) oder
/// als Gruppe mit drittem Level (Tiefe drei) belegt werden.
pub(crate) struct EventTypeListBuilder {
    grammar: GrammarId,
    first: Vec<Entry>,
    second: Vec<Slot>,
}

impl EventTypeListBuilder {
    pub(crate) fn new(grammar: GrammarId) -> Self {
        Self { grammar, first: Vec::new(), second: Vec::new() }
    }

    pub(crate) fn declared(&mut self, entry: Entry) {
        self.first.push(entry);
    }

    pub(crate) fn second(&mut self, entry: Entry) {
        self.second.push(Slot::Single(entry));
    }

    /// Slot mit drittem Level; leere Gruppen entfallen.
    pub(crate) fn third(&mut self, group: Vec<Entry>) {
        if !group.is_empty() {
            self.second.push(Slot::Group(group));
        }
    }

    pub(crate) fn build(self) -> EventTypeList {
        let grammar = self.grammar;
        let escape = self.first.len() as u32;
        let mut events = Vec::with_capacity(self.first.len() + self.second.len());
        let push = |events: &mut Vec<EventType>, entry: Entry, code: EventCode| {
            debug_assert!(
                !events.iter().any(|et: &EventType| {
                    (et.kind, et.name.as_ref(), et.uri.as_deref(), et.wildcard.as_ref()) == entry.key()
                }),
                "duplicate production {:?}",
                entry.key()
            );
            let index = events.len() as u32;
            events.push(EventType {
                kind: entry.kind,
                name: entry.name,
                uri: entry.uri,
                wildcard: entry.wildcard,
                depth: code.depth(),
                index,
                code,
                grammar,
                element: entry.element,
                leaf: entry.leaf,
                next_position: entry.next_position,
            });
        };
        for (i, entry) in self.first.into_iter().enumerate() {
            push(&mut events, entry, EventCode::one(i as u32));
        }
        for (p2, slot) in self.second.into_iter().enumerate() {
            match slot {
                Slot::Single(entry) => push(&mut events, entry, EventCode::two(escape, p2 as u32)),
                Slot::Group(group) => {
                    for (p3, entry) in group.into_iter().enumerate() {
                        push(&mut events, entry, EventCode::three(escape, p2 as u32, p3 as u32));
                    }
                }
            }
        }
        let widths = EventCodeWidths::from_codes(events.iter().map(|et| &et.code));
        EventTypeList { events, widths }
    }
}
