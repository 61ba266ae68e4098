//! Schema-informed Grammars (EXI 8.5.1 - 8.5.4).
//!
//! Eine [`Grammar`] ist ein unveränderliches, geteiltes Template. Alle
//! Varianten (Document, Element, ElementTag, Content) sind ein Summentyp
//! ([`GrammarBody`]); Kandidaten und Transitionen werden per Pattern
//! Matching berechnet. Der veränderliche Zustand ([`GrammarState`]) gehört
//! dem Cursor.
//!
//! # Zustände
//!
//! ```text
//! Document:    DocStart --SD--> DocContent --SE--> DocEnd --ED-->
//! Element:     Tag{0,Start} --AT--> Tag{1} ... Tag{n}   (n = Anzahl Attribute)
//!                 |  SE/CH/EE aus dem Content-Anfang, sobald kein
//!                 v  Pflicht-Attribut mehr aussteht
//! Content:     Content(Particles | Characters | End)
//! Nil:         NilTag{0} ... NilTag{n} --CM/PI--> NilEnd
//! ```
//!
//! `Tag{n}` entspricht `Element_i,content`, der initiale Content-Zustand
//! entspricht `Element_i,content2` (EXI 8.5.4.4.1). [`TagLead`] hält fest,
//! welche Productions von `Element_i,0` (xsi:type, xsi:nil, NS, SC) noch
//! offen sind: `Start --xsi:nil=false--> AfterNil --SC--> Closed`, jedes
//! Attribut und SC schliessen den Kopf.
//!
//! # Tabellen
//!
//! [`Grammar::candidates`] berechnet die [`EventTypeList`] eines Zustands
//! genau einmal und hält sie danach im Template (double-checked unter einem
//! `RwLock`). Gleiche Zustände liefern dieselbe `Arc`.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use crate::event_type::{Entry, EventKind, EventType, EventTypeList, EventTypeListBuilder, GrammarId};
use crate::group::{ContentModel, LeafGrammar, LeafKind, ParticleProgress};
use crate::options::GrammarOptions;
use crate::qname::QName;
use crate::schema::{AttributeUse, ElementId, TypeId, WildcardConstraint};
use crate::undeclared::{self, Phase, Slots};
use crate::FastHashMap;

// ============================================================================
// Keys und Zustände
// ============================================================================

/// Identität einer Grammatik im Cache (zusammen mit den Optionen).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarKey {
    Document,
    /// Element Grammar: deklarierter Typ und Nillability der Deklaration.
    Element { type_id: TypeId, nillable: bool },
    /// Nach `xsi:type`: effektiver Typ, Nillability der ursprünglichen Deklaration.
    ElementTag { type_id: TypeId, nillable: bool },
    Content { type_id: TypeId },
    /// Nach `xsi:nil="true"`.
    Nil { type_id: TypeId },
}

impl GrammarKey {
    pub fn type_id(&self) -> Option<TypeId> {
        match *self {
            Self::Document => None,
            Self::Element { type_id, .. }
            | Self::ElementTag { type_id, .. }
            | Self::Content { type_id }
            | Self::Nil { type_id } => Some(type_id),
        }
    }
}

impl fmt::Display for GrammarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("Document"),
            Self::Element { type_id, nillable } => write!(f, "Element({type_id:?}, nillable={nillable})"),
            Self::ElementTag { type_id, nillable } => write!(f, "ElementTag({type_id:?}, nillable={nillable})"),
            Self::Content { type_id } => write!(f, "Content({type_id:?})"),
            Self::Nil { type_id } => write!(f, "Nil({type_id:?})"),
        }
    }
}

/// Zustand innerhalb einer Grammatik.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrammarState {
    DocStart,
    DocContent,
    DocEnd,
    /// Attribut-Phase; `position` indiziert die nach QName sortierten Attribute.
    Tag { position: u32, lead: TagLead },
    Content(ContentState),
    NilTag { position: u32 },
    NilEnd,
}

/// Kopf einer Attribut-Phase (`Element_i,0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagLead {
    /// Noch nichts konsumiert (oder nur NS): xsi:type, xsi:nil, NS, SC.
    Start,
    /// Nach `xsi:nil="false"`: nur noch SC.
    AfterNil,
    /// Nach SC oder einem Attribut.
    Closed,
}

impl TagLead {
    pub fn offers_markers(self) -> bool {
        self == Self::Start
    }

    pub fn offers_self_contained(self) -> bool {
        self != Self::Closed
    }
}

/// Zustand einer Content Grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentState {
    /// Complex Content: Fortschritt im Content Model.
    Particles(ParticleProgress),
    /// Simple Content vor dem Wert.
    Characters,
    /// Nur noch EE.
    End,
}

// ============================================================================
// Transitionen
// ============================================================================

/// Ziel einer Transition.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    /// Zustand derselben Grammatik.
    Here(GrammarState),
    /// Wechsel in die Content Grammar.
    Content(Arc<Grammar>, GrammarState),
}

/// Ergebnis von [`Grammar::advance`], vom Cursor ausgeführt.
#[derive(Debug, Clone)]
pub(crate) enum Transition {
    Move(Target),
    /// Eigenes Frame wechselt nach `target`, danach beginnt ein Kind-Element.
    /// `element` ist bei `SE(*)`/`SE(uri:*)` leer (Lookup über den Namen).
    StartElement { target: Target, element: Option<ElementId> },
    EndElement,
    EndDocument,
    /// Cursor löst den Typnamen auf und wechselt in die ElementTag Grammar.
    XsiType,
    /// Cursor wechselt bei `true` in die Nil Grammar, sonst nach `otherwise`.
    XsiNil { otherwise: GrammarState },
}

enum ContentStep {
    Next(ContentState),
    Child(ContentState, Option<ElementId>),
    End,
}

impl ContentStep {
    fn into_transition(self, target: impl Fn(ContentState) -> Target) -> Transition {
        match self {
            Self::Next(state) => Transition::Move(target(state)),
            Self::Child(state, element) => Transition::StartElement { target: target(state), element },
            Self::End => Transition::EndElement,
        }
    }
}

// ============================================================================
// Deklarierte Productions (EXI 8.5.4.3)
// ============================================================================

/// Sortierschlüssel: (Klasse, primär, sekundär).
type Rank = (u8, u32, u32);
type Ranked = (Rank, Entry);

const RANK_AT: u8 = 0;
const RANK_AT_NS: u8 = 1;
const RANK_AT_ANY: u8 = 2;
const RANK_SE: u8 = 3;
const RANK_SE_NS: u8 = 4;
const RANK_SE_ANY: u8 = 5;
const RANK_EE: u8 = 6;
const RANK_CH: u8 = 7;

/// Sortiert nach EXI 8.5.4.3 und entfernt Duplikate.
///
/// Gleich ist, was dasselbe Event mit demselben Namespace Constraint
/// abdeckt; dann gilt das Blatt mit der kleineren Schema-Reihenfolge.
/// `SE(*)` verschiedener Wildcards bleiben getrennte Einträge, jeweils mit
/// eigenem Constraint und Blatt.
fn finish(mut ranked: Vec<Ranked>) -> Vec<Entry> {
    ranked.sort_by_key(|(rank, _)| *rank);
    let mut entries: Vec<Entry> = Vec::with_capacity(ranked.len());
    for (_, entry) in ranked {
        let duplicate = entries.iter().any(|e| {
            e.kind == entry.kind && e.name == entry.name && e.uri == entry.uri && e.wildcard == entry.wildcard
        });
        if !duplicate {
            entries.push(entry);
        }
    }
    entries
}

fn leaf_entries(leaf: &LeafGrammar, out: &mut Vec<Ranked>) {
    match &leaf.kind {
        LeafKind::Element(members) => {
            for (i, (name, element)) in members.iter().enumerate() {
                let entry = Entry::named(EventKind::StartElement, name.clone())
                    .with_element(*element)
                    .with_leaf(leaf.order);
                out.push(((RANK_SE, leaf.order, i as u32), entry));
            }
        }
        LeafKind::Wildcard(WildcardConstraint::Namespaces(uris)) => {
            for (i, uri) in uris.iter().enumerate() {
                let entry = Entry::new(EventKind::StartElementNs).with_uri(Arc::clone(uri)).with_leaf(leaf.order);
                out.push(((RANK_SE_NS, leaf.order, i as u32), entry));
            }
        }
        LeafKind::Wildcard(WildcardConstraint::Any) => {
            let entry = Entry::new(EventKind::StartElementWildcard).with_leaf(leaf.order);
            out.push(((RANK_SE_ANY, leaf.order, 0), entry));
        }
        LeafKind::Wildcard(constraint @ WildcardConstraint::Not(_)) => {
            let entry = Entry::new(EventKind::StartElementWildcard)
                .with_wildcard(constraint.clone())
                .with_leaf(leaf.order);
            out.push(((RANK_SE_ANY, leaf.order, 0), entry));
        }
    }
}

fn end_element() -> Ranked {
    ((RANK_EE, 0, 0), Entry::new(EventKind::EndElement))
}

// ============================================================================
// Attribut-Phase
// ============================================================================

/// Attribute Uses eines Typs, sortiert nach local-name, dann uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePhase {
    attributes: Vec<AttributeUse>,
    wildcard: Option<WildcardConstraint>,
}

impl AttributePhase {
    pub(crate) fn new(attributes: &[AttributeUse], wildcard: Option<&WildcardConstraint>) -> Self {
        let mut attributes = attributes.to_vec();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));
        attributes.dedup_by(|a, b| a.name == b.name);
        Self { attributes, wildcard: wildcard.cloned() }
    }

    pub fn attributes(&self) -> &[AttributeUse] {
        &self.attributes
    }

    pub fn wildcard(&self) -> Option<&WildcardConstraint> {
        self.wildcard.as_ref()
    }

    /// Deklarierte Attribut-Productions ab `position`: alle Attribute bis
    /// einschliesslich des ersten Pflicht-Attributs, plus die Wildcard.
    ///
    /// Rückgabe: kein Pflicht-Attribut steht mehr aus, der Content-Anfang
    /// ist erreichbar.
    fn declared(&self, position: u32, out: &mut Vec<Ranked>) -> bool {
        let mut reaches_content = true;
        for (i, attribute) in self.attributes.iter().enumerate().skip(position as usize) {
            let i = i as u32;
            let entry = Entry::named(EventKind::Attribute, attribute.name.clone()).with_next_position(i + 1);
            out.push(((RANK_AT, i, 0), entry));
            if attribute.required {
                reaches_content = false;
                break;
            }
        }
        match &self.wildcard {
            None => {}
            Some(WildcardConstraint::Any) => out.push(((RANK_AT_ANY, 0, 0), Entry::new(EventKind::AttributeWildcard))),
            Some(constraint @ WildcardConstraint::Not(_)) => out.push((
                (RANK_AT_ANY, 0, 0),
                Entry::new(EventKind::AttributeWildcard).with_wildcard(constraint.clone()),
            )),
            Some(WildcardConstraint::Namespaces(uris)) => {
                let mut uris: Vec<&Arc<str>> = uris.iter().collect();
                uris.sort();
                for (i, uri) in uris.into_iter().enumerate() {
                    out.push(((RANK_AT_NS, i as u32, 0), Entry::new(EventKind::AttributeNs).with_uri(Arc::clone(uri))));
                }
            }
        }
        reaches_content
    }
}

// ============================================================================
// Grammar-Varianten
// ============================================================================

/// Content Grammar eines Typs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentGrammar {
    /// Element-only oder mixed Content über ein Content Model.
    Complex { type_id: TypeId, model: Arc<ContentModel>, mixed: bool },
    /// Genau ein getypter Wert (EXI 8.5.4.1.3.1).
    Simple { type_id: TypeId },
    /// Leerer Content.
    Empty { type_id: TypeId },
    /// `xsi:nil="true"`: restliche Attribute, dann nur EE (EXI 8.5.4.1.3.2, TypeEmpty).
    Nil { type_id: TypeId, attributes: AttributePhase },
}

impl ContentGrammar {
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Complex { type_id, .. }
            | Self::Simple { type_id }
            | Self::Empty { type_id }
            | Self::Nil { type_id, .. } => *type_id,
        }
    }

    fn initial(&self) -> ContentState {
        match self {
            Self::Complex { .. } => ContentState::Particles(ParticleProgress::fresh()),
            Self::Simple { .. } => ContentState::Characters,
            Self::Empty { .. } | Self::Nil { .. } => ContentState::End,
        }
    }

    fn initial_state(&self) -> GrammarState {
        match self {
            Self::Nil { .. } => GrammarState::NilTag { position: 0 },
            _ => GrammarState::Content(self.initial()),
        }
    }

    fn declared(&self, state: &ContentState, out: &mut Vec<Ranked>) {
        match (self, state) {
            (Self::Complex { model, mixed, .. }, ContentState::Particles(progress)) => {
                let candidates = model.candidates(progress);
                for leaf in &candidates.leaves {
                    leaf_entries(leaf, out);
                }
                if candidates.end_reachable {
                    out.push(end_element());
                }
                if *mixed {
                    out.push(((RANK_CH, 0, 0), Entry::new(EventKind::CharactersMixed)));
                }
            }
            (Self::Simple { .. }, ContentState::Characters) => {
                out.push(((RANK_CH, 0, 0), Entry::new(EventKind::Characters)));
            }
            (_, ContentState::End) => out.push(end_element()),
            (grammar, state) => unreachable!("{state:?} is not a state of {grammar:?}"),
        }
    }

    fn step(&self, state: &ContentState, et: &EventType) -> ContentStep {
        use EventKind as K;
        match et.kind() {
            K::StartElement | K::StartElementNs | K::StartElementWildcard => {
                let next = match (self, state, et.leaf) {
                    (Self::Complex { model, .. }, ContentState::Particles(progress), Some(leaf)) => {
                        match model.advance(progress, leaf) {
                            Some(next) => ContentState::Particles(next),
                            None => unreachable!("leaf {leaf} is not a candidate of {progress:?}"),
                        }
                    }
                    _ => unreachable!("{et} outside of a content model"),
                };
                ContentStep::Child(next, et.element())
            }
            K::UndeclaredStartElementWildcard => ContentStep::Child(state.clone(), None),
            K::EndElement | K::UndeclaredEndElement => ContentStep::End,
            K::Characters => ContentStep::Next(ContentState::End),
            // CH[mixed], CH[untyped], CM, PI
            _ => ContentStep::Next(state.clone()),
        }
    }
}

/// Attribut-Phase einer Element oder ElementTag Grammar.
#[derive(Debug)]
pub struct TagGrammar {
    type_id: TypeId,
    nillable: bool,
    attributes: AttributePhase,
    content: Arc<Grammar>,
    type_marker: bool,
    nil_marker: bool,
}

impl TagGrammar {
    /// `content` muss eine Content Grammar sein.
    pub(crate) fn new(
        type_id: TypeId,
        nillable: bool,
        attributes: AttributePhase,
        content: Arc<Grammar>,
        type_marker: bool,
        nil_marker: bool,
    ) -> Self {
        debug_assert!(matches!(content.body, GrammarBody::Content(_)));
        Self { type_id, nillable, attributes, content, type_marker, nil_marker }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Nillability der ursprünglichen Element-Deklaration.
    pub fn nillable(&self) -> bool {
        self.nillable
    }

    pub fn attributes(&self) -> &AttributePhase {
        &self.attributes
    }

    pub fn content(&self) -> &Arc<Grammar> {
        &self.content
    }

    fn content_grammar(&self) -> &ContentGrammar {
        match &self.content.body {
            GrammarBody::Content(content) => content,
            other => unreachable!("tag grammar with non-content body {other:?}"),
        }
    }

    fn declared(&self, position: u32) -> Vec<Entry> {
        let mut ranked = Vec::new();
        if self.attributes.declared(position, &mut ranked) {
            let content = self.content_grammar();
            content.declared(&content.initial(), &mut ranked);
        }
        finish(ranked)
    }

    fn advance(&self, position: u32, lead: TagLead, et: &EventType) -> Transition {
        use EventKind as K;
        let here = |position, lead| Transition::Move(Target::Here(GrammarState::Tag { position, lead }));
        match et.kind() {
            K::Attribute | K::UndeclaredAttributeInvalidValue => {
                here(et.next_position.unwrap_or(position), TagLead::Closed)
            }
            // xsi:type/xsi:nil über AT(*) gelten als gewöhnliche Attribute
            K::AttributeNs
            | K::AttributeWildcard
            | K::UndeclaredAttributeWildcard
            | K::UndeclaredAttributeWildcardInvalidValue
            | K::SelfContained => here(position, TagLead::Closed),
            K::NamespaceDeclaration => here(position, lead),
            K::Type => Transition::XsiType,
            K::Nil => Transition::XsiNil {
                otherwise: GrammarState::Tag { position, lead: TagLead::AfterNil },
            },
            // SE, CH, EE, CM, PI: weiter im Content-Anfang
            _ => {
                let content = self.content_grammar();
                content
                    .step(&content.initial(), et)
                    .into_transition(|state| Target::Content(Arc::clone(&self.content), GrammarState::Content(state)))
            }
        }
    }
}

/// Varianten einer Grammatik.
#[derive(Debug)]
pub enum GrammarBody {
    /// Globale Elemente, sortiert nach local-name, dann uri.
    Document { globals: Vec<(QName, ElementId)> },
    Element(TagGrammar),
    ElementTag(TagGrammar),
    Content(ContentGrammar),
}

// ============================================================================
// Grammar
// ============================================================================

/// Unveränderliches Grammatik-Template mit memoisierten Event-Tabellen.
#[derive(Debug)]
pub struct Grammar {
    id: GrammarId,
    key: GrammarKey,
    options: GrammarOptions,
    body: GrammarBody,
    tables: RwLock<FastHashMap<GrammarState, Arc<EventTypeList>>>,
}

impl Grammar {
    pub(crate) fn new(id: GrammarId, key: GrammarKey, options: GrammarOptions, body: GrammarBody) -> Self {
        Self { id, key, options, body, tables: RwLock::new(FastHashMap::default()) }
    }

    pub fn id(&self) -> GrammarId {
        self.id
    }

    pub fn key(&self) -> GrammarKey {
        self.key
    }

    pub fn options(&self) -> GrammarOptions {
        self.options
    }

    pub fn body(&self) -> &GrammarBody {
        &self.body
    }

    /// Content Grammar einer Element/ElementTag Grammar.
    pub fn content(&self) -> Option<&Arc<Grammar>> {
        match &self.body {
            GrammarBody::Element(tag) | GrammarBody::ElementTag(tag) => Some(&tag.content),
            _ => None,
        }
    }

    pub fn initial_state(&self) -> GrammarState {
        match &self.body {
            GrammarBody::Document { .. } => GrammarState::DocStart,
            GrammarBody::Element(_) | GrammarBody::ElementTag(_) => {
                GrammarState::Tag { position: 0, lead: TagLead::Start }
            }
            GrammarBody::Content(content) => content.initial_state(),
        }
    }

    /// Geordnete Productions eines Zustands.
    ///
    /// Jeder Zustand wird höchstens einmal berechnet; wiederholte Aufrufe
    /// liefern dieselbe `Arc`.
    ///
    /// # Panics
    ///
    /// Wenn `state` nicht zu dieser Grammatik gehört.
    pub fn candidates(&self, state: &GrammarState) -> Arc<EventTypeList> {
        {
            let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = tables.get(state) {
                return Arc::clone(list);
            }
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = tables.get(state) {
            return Arc::clone(list);
        }
        let list = Arc::new(self.build_table(state));
        debug!("{}: {:?} -> {} productions", self.key, state, list.len());
        tables.insert(state.clone(), Arc::clone(&list));
        list
    }

    /// Anzahl bereits berechneter Zustände.
    pub fn table_count(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn build_table(&self, state: &GrammarState) -> EventTypeList {
        let (declared, phase, markers) = match (&self.body, state) {
            (GrammarBody::Document { .. }, GrammarState::DocStart) => {
                (vec![Entry::new(EventKind::StartDocument)], Phase::DocumentStart, false)
            }
            (GrammarBody::Document { globals }, GrammarState::DocContent) => {
                let mut declared: Vec<Entry> = globals
                    .iter()
                    .map(|(name, element)| Entry::named(EventKind::StartElement, name.clone()).with_element(*element))
                    .collect();
                declared.push(Entry::new(EventKind::StartElementWildcard));
                (declared, Phase::DocumentContent, false)
            }
            (GrammarBody::Document { .. }, GrammarState::DocEnd) => {
                (vec![Entry::new(EventKind::EndDocument)], Phase::DocumentEnd, false)
            }
            (GrammarBody::Element(tag) | GrammarBody::ElementTag(tag), GrammarState::Tag { position, lead }) => {
                (tag.declared(*position), Phase::Tag { lead: *lead }, true)
            }
            (GrammarBody::Content(ContentGrammar::Nil { attributes, .. }), GrammarState::NilTag { position }) => {
                let mut ranked = Vec::new();
                if attributes.declared(*position, &mut ranked) {
                    ranked.push(end_element());
                }
                (finish(ranked), Phase::NilTag, false)
            }
            (GrammarBody::Content(ContentGrammar::Nil { .. }), GrammarState::NilEnd) => {
                (vec![Entry::new(EventKind::EndElement)], Phase::NilEnd, false)
            }
            (GrammarBody::Content(content), GrammarState::Content(content_state)) => {
                let mut ranked = Vec::new();
                content.declared(content_state, &mut ranked);
                (finish(ranked), Phase::Content, false)
            }
            (_, state) => unreachable!("{state:?} is not a state of {}", self.key),
        };

        let mut slots = Slots::new(phase).with_declared(&declared);
        if let (true, GrammarBody::Element(tag) | GrammarBody::ElementTag(tag)) = (markers, &self.body) {
            slots.type_marker = tag.type_marker;
            slots.nil_marker = tag.nil_marker;
        }
        let mut builder = EventTypeListBuilder::new(self.id);
        for entry in declared {
            builder.declared(entry);
        }
        undeclared::append(&mut builder, &slots, self.options);
        builder.build()
    }

    /// Transition über die Production `et` im Zustand `state`.
    pub(crate) fn advance(&self, state: &GrammarState, et: &EventType) -> Transition {
        use EventKind as K;
        let here = |state: GrammarState| Transition::Move(Target::Here(state));
        match (&self.body, state) {
            (GrammarBody::Document { .. }, GrammarState::DocStart) => here(GrammarState::DocContent),
            (GrammarBody::Document { .. }, GrammarState::DocContent) => match et.kind() {
                K::StartElement | K::StartElementWildcard => Transition::StartElement {
                    target: Target::Here(GrammarState::DocEnd),
                    element: et.element(),
                },
                _ => here(GrammarState::DocContent),
            },
            (GrammarBody::Document { .. }, GrammarState::DocEnd) => match et.kind() {
                K::EndDocument => Transition::EndDocument,
                _ => here(GrammarState::DocEnd),
            },
            (GrammarBody::Element(tag) | GrammarBody::ElementTag(tag), GrammarState::Tag { position, lead }) => {
                tag.advance(*position, *lead, et)
            }
            (GrammarBody::Content(ContentGrammar::Nil { .. }), GrammarState::NilTag { position }) => match et.kind() {
                K::Attribute | K::UndeclaredAttributeInvalidValue => here(GrammarState::NilTag {
                    position: et.next_position.unwrap_or(*position),
                }),
                K::EndElement | K::UndeclaredEndElement => Transition::EndElement,
                K::Comment | K::ProcessingInstruction => here(GrammarState::NilEnd),
                _ => here(state.clone()),
            },
            (GrammarBody::Content(ContentGrammar::Nil { .. }), GrammarState::NilEnd) => match et.kind() {
                K::EndElement | K::UndeclaredEndElement => Transition::EndElement,
                _ => here(GrammarState::NilEnd),
            },
            (GrammarBody::Content(content), GrammarState::Content(content_state)) => content
                .step(content_state, et)
                .into_transition(|next| Target::Here(GrammarState::Content(next))),
            (_, state) => unreachable!("{state:?} is not a state of {}", self.key),
        }
    }
}

impl fmt::Display for Grammar {
    /// Bereits berechnete Zustände mit ihren Tabellen.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{:?}]", self.key, self.id)?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<(&GrammarState, &Arc<EventTypeList>)> = tables.iter().collect();
        states.sort_by_key(|(state, _)| format!("{state:?}"));
        for (state, list) in states {
            writeln!(f, " {state:?}")?;
            write!(f, "{list}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_names(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| format!("{:?}:{}", e.kind, e.name.as_ref().map(ToString::to_string).unwrap_or_default()))
            .collect()
    }

    /// Attribute bis einschliesslich des ersten Pflicht-Attributs.
    #[test]
    fn attribut_phase_bis_pflicht() {
        let phase = AttributePhase::new(
            &[
                AttributeUse::optional(QName::new("", "c")),
                AttributeUse::required(QName::new("", "b")),
                AttributeUse::optional(QName::new("", "a")),
            ],
            None,
        );
        let names: Vec<&str> = phase.attributes().iter().map(|a| &*a.name.local_name).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let mut out = Vec::new();
        assert!(!phase.declared(0, &mut out));
        assert_eq!(entry_names(&finish(out)), ["Attribute:a", "Attribute:b"]);

        let mut out = Vec::new();
        assert!(phase.declared(2, &mut out));
        let entries = finish(out);
        assert_eq!(entry_names(&entries), ["Attribute:c"]);
        assert_eq!(entries[0].next_position, Some(3));

        let mut out = Vec::new();
        assert!(phase.declared(3, &mut out));
        assert!(out.is_empty());
    }

    /// Attribute Wildcard mit Namespace-Liste: AT(uri:*) lexikalisch sortiert.
    #[test]
    fn attribut_wildcard_namespaces() {
        let wildcard = WildcardConstraint::Namespaces(vec![Arc::from("urn:z"), Arc::from("urn:a")]);
        let phase = AttributePhase::new(&[AttributeUse::optional(QName::new("", "x"))], Some(&wildcard));
        let mut out = Vec::new();
        phase.declared(0, &mut out);
        let entries = finish(out);
        let uris: Vec<Option<&str>> = entries.iter().map(|e| e.uri.as_deref()).collect();
        assert_eq!(uris, [None, Some("urn:a"), Some("urn:z")]);
    }

    /// Rangfolge: AT vor SE vor EE vor CH, unabhängig von der Einfügereihenfolge.
    #[test]
    fn rangfolge() {
        let ranked = vec![
            ((RANK_CH, 0, 0), Entry::new(EventKind::CharactersMixed)),
            end_element(),
            ((RANK_SE_ANY, 3, 0), Entry::new(EventKind::StartElementWildcard).with_leaf(3)),
            ((RANK_SE, 2, 0), Entry::named(EventKind::StartElement, QName::new("", "e"))),
            ((RANK_AT, 0, 0), Entry::named(EventKind::Attribute, QName::new("", "a"))),
        ];
        let kinds: Vec<EventKind> = finish(ranked).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::Attribute,
                EventKind::StartElement,
                EventKind::StartElementWildcard,
                EventKind::EndElement,
                EventKind::CharactersMixed
            ]
        );
    }

    /// `SE(*)` verschiedener Wildcards behalten Constraint und Blatt; gleiche
    /// Einträge fallen auf das erste Blatt zusammen.
    #[test]
    fn wildcards_bleiben_getrennt() {
        let not = |ns: &str| WildcardConstraint::Not(Some(Arc::from(ns)));
        let wildcard = |order: u32, constraint: WildcardConstraint| {
            (
                (RANK_SE_ANY, order, 0),
                Entry::new(EventKind::StartElementWildcard).with_wildcard(constraint).with_leaf(order),
            )
        };
        let entries = finish(vec![wildcard(3, not("urn:a")), wildcard(1, not("urn:b")), wildcard(5, not("urn:b"))]);
        let seen: Vec<(Option<WildcardConstraint>, Option<u32>)> =
            entries.iter().map(|e| (e.wildcard.clone(), e.leaf)).collect();
        assert_eq!(seen, [(Some(not("urn:b")), Some(1)), (Some(not("urn:a")), Some(3))]);
    }

    /// Content Grammar eines Simple Types: CH, danach nur EE.
    #[test]
    fn simple_content_schritte() {
        let content = ContentGrammar::Simple { type_id: TypeId(0) };
        let mut out = Vec::new();
        content.declared(&ContentState::Characters, &mut out);
        assert_eq!(entry_names(&finish(out)), ["Characters:"]);
        let mut out = Vec::new();
        content.declared(&ContentState::End, &mut out);
        assert_eq!(entry_names(&finish(out)), ["EndElement:"]);
        assert_eq!(content.initial_state(), GrammarState::Content(ContentState::Characters));
    }
}
