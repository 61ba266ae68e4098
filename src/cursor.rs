//! Grammar Cursor: der einzige veränderliche Teil der Engine.
//!
//! Ein Cursor läuft genau einmal durch ein Dokument. Er hält einen Stack
//! von Frames (Document-Frame plus ein Frame pro offenem Element); jedes
//! Frame zeigt auf ein geteiltes Grammatik-Template und besitzt den
//! eigenen [`GrammarState`]. Templates werden nie verändert.
//!
//! Encoder-Richtung: [`GrammarCursor::consume`] sucht die Production mit dem
//! niedrigsten Index. Decoder-Richtung: [`GrammarCursor::consume_at`] geht
//! über den Eintrag, den der Decoder per Event Code gewählt hat.

use std::sync::Arc;

use log::{trace, warn};

use crate::cache::GrammarCache;
use crate::event::{Event, NilValue};
use crate::event_type::{EventKind, EventType, EventTypeList};
use crate::grammar::{Grammar, GrammarKey, GrammarState, Target, Transition};
use crate::options::GrammarOptions;
use crate::qname::QName;
use crate::schema::ElementId;
use crate::{Error, Result};

#[derive(Debug)]
struct Frame {
    grammar: Arc<Grammar>,
    state: GrammarState,
    candidates: Arc<EventTypeList>,
    self_contained: bool,
    /// Elementname (`None` für den Document-Frame).
    name: Option<QName>,
}

impl Frame {
    fn new(grammar: Arc<Grammar>, name: Option<QName>) -> Self {
        let state = grammar.initial_state();
        let candidates = grammar.candidates(&state);
        Self { grammar, state, candidates, self_contained: false, name }
    }

    fn enter(&mut self, target: Target) {
        match target {
            Target::Here(state) => self.state = state,
            Target::Content(grammar, state) => {
                self.grammar = grammar;
                self.state = state;
            }
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        self.candidates = self.grammar.candidates(&self.state);
    }

    /// Nillability der ursprünglichen Deklaration.
    fn nillable(&self) -> bool {
        match self.grammar.key() {
            GrammarKey::Element { nillable, .. } | GrammarKey::ElementTag { nillable, .. } => nillable,
            _ => false,
        }
    }
}

/// Zustandsmaschine über die Grammatiken eines Caches.
#[derive(Debug)]
pub struct GrammarCursor<'c> {
    cache: &'c GrammarCache,
    options: GrammarOptions,
    stack: Vec<Frame>,
    finished: Arc<EventTypeList>,
}

impl<'c> GrammarCursor<'c> {
    /// Erstellt einen Cursor am Dokumentanfang (`DocStart`).
    ///
    /// # Fehler
    ///
    /// - `InvalidOptionCombination` für strict zusammen mit Preserve-Flags
    ///   oder selfContained (EXI 5.4)
    pub fn new(cache: &'c GrammarCache, options: GrammarOptions) -> Result<Self> {
        options.validate()?;
        let document = cache.document(options)?;
        Ok(Self {
            cache,
            options,
            stack: vec![Frame::new(document, None)],
            finished: Arc::new(EventTypeList::empty()),
        })
    }

    pub fn options(&self) -> GrammarOptions {
        self.options
    }

    /// Kandidaten des aktuellen Zustands; nach `ED` leer.
    pub fn current_candidates(&self) -> &Arc<EventTypeList> {
        self.stack.last().map_or(&self.finished, |frame| &frame.candidates)
    }

    /// Grammatik des innersten Frames.
    pub fn grammar(&self) -> Option<&Arc<Grammar>> {
        self.stack.last().map(|frame| &frame.grammar)
    }

    pub fn state(&self) -> Option<&GrammarState> {
        self.stack.last().map(|frame| &frame.state)
    }

    /// Anzahl offener Elemente.
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// Name des innersten offenen Elements.
    pub fn element_name(&self) -> Option<&QName> {
        self.stack.last().and_then(|frame| frame.name.as_ref())
    }

    /// Das innerste Element wurde per `SC` als self-contained markiert.
    pub fn is_self_contained(&self) -> bool {
        self.stack.last().is_some_and(|frame| frame.self_contained)
    }

    /// `ED` wurde konsumiert.
    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// Konsumiert ein Event über die passende Production mit dem niedrigsten
    /// Index und liefert diese zurück.
    ///
    /// # Fehler
    ///
    /// - `Undeclared` wenn kein Kandidat passt (im lenient mode nur bei
    ///   Events, die der Zustand grundsätzlich nicht kennt, z.B. `SE` nach dem
    ///   Wurzelelement)
    /// - `XsiNilContentNotEmpty` für Inhalt nach `xsi:nil="true"`
    /// - `UnbalancedEvent` nach `ED`
    pub fn consume(&mut self, event: &Event) -> Result<EventType> {
        let Some(frame) = self.stack.last() else {
            return Err(Error::unbalanced(format!("{event} after end of document")));
        };
        match frame.candidates.match_event(event) {
            Some(et) => {
                let index = et.index() as usize;
                self.consume_at(index, event)
            }
            None if matches!(frame.grammar.key(), GrammarKey::Nil { .. })
                && matches!(event, Event::StartElement(_) | Event::Characters { .. }) =>
            {
                Err(Error::XsiNilContentNotEmpty)
            }
            None => Err(Error::undeclared(event, &frame.candidates)),
        }
    }

    /// Konsumiert ein Event über die Production `index` der aktuellen Liste.
    ///
    /// Die Production muss das Event abdecken (sonst `Undeclared`).
    pub fn consume_at(&mut self, index: usize, event: &Event) -> Result<EventType> {
        let cache = self.cache;
        let options = self.options;
        let Some(frame) = self.stack.last_mut() else {
            return Err(Error::unbalanced(format!("{event} after end of document")));
        };
        let candidates = Arc::clone(&frame.candidates);
        let Some(et) = candidates.get(index).filter(|et| et.matches(event)) else {
            return Err(Error::undeclared(event, &candidates));
        };
        if et.kind().is_undeclared() {
            warn!("{}: undeclared production {} {et} for {event}", frame.grammar.key(), et.code());
        }

        let transition = frame.grammar.advance(&frame.state, et);
        trace!("{} {:?} --{et}--> {transition:?}", frame.grammar.key(), frame.state);

        match transition {
            Transition::Move(target) => frame.enter(target),
            Transition::StartElement { target, element } => {
                let Event::StartElement(name) = event else {
                    unreachable!("{et} matched {event}");
                };
                let child = child_grammar(cache, options, name, element)?;
                frame.enter(target);
                self.stack.push(Frame::new(child, Some(name.clone())));
            }
            Transition::EndElement => {
                self.stack.pop();
            }
            Transition::EndDocument => {
                self.stack.pop();
                trace!("end of document");
            }
            Transition::XsiType => {
                let Event::XsiType(type_name) = event else {
                    unreachable!("{et} matched {event}");
                };
                let type_id = match cache.schema().type_by_name(type_name) {
                    Some(type_id) => type_id,
                    None if options.strict() => return Err(Error::XsiTypeNotFound(type_name.to_string())),
                    None => {
                        warn!("xsi:type {type_name} not found, falling back to xs:anyType");
                        cache.schema().any_type()
                    }
                };
                let key = GrammarKey::ElementTag { type_id, nillable: frame.nillable() };
                frame.grammar = cache.get_or_build(key, options)?;
                frame.state = frame.grammar.initial_state();
                frame.refresh();
            }
            Transition::XsiNil { otherwise } => match (event, otherwise) {
                (Event::XsiNil(NilValue::True), GrammarState::Tag { position, .. }) => {
                    let Some(type_id) = frame.grammar.key().type_id() else {
                        unreachable!("xsi:nil outside of an element grammar");
                    };
                    frame.grammar = cache.get_or_build(GrammarKey::Nil { type_id }, options)?;
                    frame.state = GrammarState::NilTag { position };
                    frame.refresh();
                }
                (_, otherwise) => frame.enter(Target::Here(otherwise)),
            },
        }

        if et.kind() == EventKind::SelfContained {
            if let Some(frame) = self.stack.last_mut() {
                frame.self_contained = true;
            }
        }
        Ok(et.clone())
    }
}

/// Grammatik eines neuen Kind-Elements: Deklaration aus der Production,
/// sonst globale Deklaration gleichen Namens, sonst `xs:anyType`.
fn child_grammar(
    cache: &GrammarCache,
    options: GrammarOptions,
    name: &QName,
    element: Option<ElementId>,
) -> Result<Arc<Grammar>> {
    let schema = cache.schema();
    match element.or_else(|| schema.global_element(name)) {
        Some(element) => cache.element(element, options),
        None => cache.get_or_build(GrammarKey::Element { type_id: schema.any_type(), nillable: false }, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Preserve;
    use crate::schema::{
        AttributeUse, ContentType, ElementDeclaration, Particle, ParticleTerm, SchemaBuilder, TypeDefinition,
    };

    fn q(local: &str) -> QName {
        QName::new("", local)
    }

    /// `<root id=".."><a/>*</root>`, `a` ist simple (string) und nillable.
    fn cache() -> GrammarCache {
        let mut b = SchemaBuilder::new();
        let string = b.add_type(TypeDefinition::simple(Some(QName::xsd("string"))));
        let a = b.add_element(ElementDeclaration::new(q("a"), string).with_nillable(true));
        let many = b.add_particle(Particle::zero_or_more(ParticleTerm::Element(a)));
        let seq = b.add_particle(Particle::once(ParticleTerm::sequence(vec![many])));
        let root_type = b.add_type(
            TypeDefinition::complex(None, ContentType::ElementOnly(seq)).with_attribute(AttributeUse::required(q("id"))),
        );
        b.add_global_element(ElementDeclaration::new(q("root"), root_type));
        GrammarCache::new(Arc::new(b.build().unwrap()))
    }

    fn walk(cursor: &mut GrammarCursor<'_>, events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|event| {
                let et = cursor.consume(event).unwrap();
                format!("{} {et}", et.code())
            })
            .collect()
    }

    #[test]
    fn dokument_durchlauf() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        assert_eq!(cursor.depth(), 0);
        let codes = walk(
            &mut cursor,
            &[
                Event::StartDocument,
                Event::StartElement(q("root")),
                Event::attribute(q("id")),
                Event::StartElement(q("a")),
                Event::characters(),
                Event::EndElement,
                Event::EndElement,
                Event::EndDocument,
            ],
        );
        assert_eq!(codes, ["0 SD", "0 SE(root)", "0 AT(id)", "0 SE(a)", "0 CH", "0 EE", "1 EE", "0 ED"]);
        assert!(cursor.is_finished());
        assert!(cursor.current_candidates().is_empty());
        let err = cursor.consume(&Event::EndDocument).unwrap_err();
        assert!(matches!(err, Error::UnbalancedEvent(_)));
    }

    /// Fehlendes Pflicht-Attribut: lenient über Fallbacks, strict als Fehler.
    #[test]
    fn pflicht_attribut_fehlt() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(&mut cursor, &[Event::StartDocument, Event::StartElement(q("root"))]);
        let et = cursor.consume(&Event::StartElement(q("a"))).unwrap();
        assert_eq!(et.kind(), EventKind::UndeclaredStartElementWildcard);
        assert_eq!(cursor.depth(), 2);
        assert_eq!(cursor.element_name(), Some(&q("a")));

        let mut strict = GrammarCursor::new(&cache, GrammarOptions::default().with_strict()).unwrap();
        walk(&mut strict, &[Event::StartDocument, Event::StartElement(q("root"))]);
        let err = strict.consume(&Event::StartElement(q("a"))).unwrap_err();
        match err {
            Error::Undeclared { event, candidates } => {
                assert_eq!(event, Event::StartElement(q("a")));
                assert_eq!(candidates.summary(), "0 AT(id)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    /// xsi:nil="true": nur noch EE; Inhalt ist ein Fehler.
    #[test]
    fn xsi_nil_true() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(
            &mut cursor,
            &[
                Event::StartDocument,
                Event::StartElement(q("root")),
                Event::attribute(q("id")),
                Event::StartElement(q("a")),
                Event::XsiNil(NilValue::True),
            ],
        );
        assert!(matches!(cursor.grammar().unwrap().key(), GrammarKey::Nil { .. }));
        assert_eq!(cursor.consume(&Event::characters()).unwrap_err(), Error::XsiNilContentNotEmpty);
        assert_eq!(cursor.consume(&Event::EndElement).unwrap().kind(), EventKind::EndElement);
        assert_eq!(cursor.depth(), 1);
    }

    /// Ungültiger xsi:nil Wert geht über `AT(*)[untyped]`.
    #[test]
    fn xsi_nil_ungueltig() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(&mut cursor, &[Event::StartDocument, Event::StartElement(q("root")), Event::attribute(q("id"))]);
        cursor.consume(&Event::StartElement(q("a"))).unwrap();
        let et = cursor.consume(&Event::XsiNil(NilValue::Invalid)).unwrap();
        assert_eq!(et.kind(), EventKind::UndeclaredAttributeWildcardInvalidValue);
        assert_eq!(cursor.consume(&Event::characters()).unwrap().kind(), EventKind::Characters);
    }

    /// Unbekannter xsi:type: lenient xs:anyType, strict Fehler.
    #[test]
    fn xsi_type_unbekannt() {
        let cache = cache();
        let unknown = Event::XsiType(QName::new("urn:x", "Nope"));
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(&mut cursor, &[Event::StartDocument, Event::StartElement(q("root"))]);
        cursor.consume(&unknown).unwrap();
        assert_eq!(
            cursor.grammar().unwrap().key(),
            GrammarKey::ElementTag { type_id: cache.schema().any_type(), nillable: false }
        );

        // strict: root hat keine Sub-Types, also gar kein xsi:type Kandidat
        let mut strict = GrammarCursor::new(&cache, GrammarOptions::default().with_strict()).unwrap();
        walk(&mut strict, &[Event::StartDocument, Event::StartElement(q("root"))]);
        assert!(matches!(strict.consume(&unknown), Err(Error::Undeclared { .. })));
    }

    /// Undeklariertes Wurzelelement läuft über xs:anyType.
    #[test]
    fn undeklariertes_element() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(&mut cursor, &[Event::StartDocument]);
        let et = cursor.consume(&Event::StartElement(QName::new("urn:x", "foo"))).unwrap();
        assert_eq!(et.kind(), EventKind::StartElementWildcard);
        assert_eq!(cursor.grammar().unwrap().key().type_id(), Some(cache.schema().any_type()));
        cursor.consume(&Event::StartElement(q("bar"))).unwrap();
        cursor.consume(&Event::EndElement).unwrap();
        cursor.consume(&Event::EndElement).unwrap();
        cursor.consume(&Event::EndDocument).unwrap();
        assert!(cursor.is_finished());
    }

    /// SC markiert das Element, CM wird nur mit Flag angeboten.
    #[test]
    fn features() {
        let cache = cache();
        let options = GrammarOptions::default()
            .with_self_contained()
            .with_preserve(Preserve { comments: true, ..Preserve::default() });
        let mut cursor = GrammarCursor::new(&cache, options).unwrap();
        walk(&mut cursor, &[Event::StartDocument, Event::Comment, Event::StartElement(q("root"))]);
        assert!(!cursor.is_self_contained());
        let et = cursor.consume(&Event::SelfContained).unwrap();
        assert_eq!(et.kind(), EventKind::SelfContained);
        assert!(cursor.is_self_contained());
        cursor.consume(&Event::attribute(q("id"))).unwrap();
        cursor.consume(&Event::Comment).unwrap();

        let mut plain = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        walk(&mut plain, &[Event::StartDocument]);
        assert!(matches!(plain.consume(&Event::Comment), Err(Error::Undeclared { .. })));
    }

    /// strict verträgt sich nicht mit Preserve-Flags oder selfContained (EXI 5.4).
    #[test]
    fn ungueltige_optionen() {
        let cache = cache();
        let strict = GrammarOptions::default().with_strict();
        let comments = strict.with_preserve(Preserve { comments: true, ..Preserve::default() });
        assert_eq!(GrammarCursor::new(&cache, comments).unwrap_err(), Error::InvalidOptionCombination);
        let sc = strict.with_self_contained();
        assert_eq!(GrammarCursor::new(&cache, sc).unwrap_err(), Error::InvalidOptionCombination);
        assert!(cache.is_empty());
        assert!(GrammarCursor::new(&cache, strict).is_ok());
    }

    /// consume_at prüft, dass die Production das Event abdeckt.
    #[test]
    fn consume_at_prueft_event() {
        let cache = cache();
        let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
        assert!(matches!(cursor.consume_at(0, &Event::EndDocument), Err(Error::Undeclared { .. })));
        assert!(matches!(cursor.consume_at(7, &Event::StartDocument), Err(Error::Undeclared { .. })));
        cursor.consume_at(0, &Event::StartDocument).unwrap();
        assert_eq!(cursor.state(), Some(&GrammarState::DocContent));
    }
}
