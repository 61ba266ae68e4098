//! Grammar Cache: einziger Konstruktionspfad für Grammatiken.
//!
//! Grammatiken werden pro ([`GrammarKey`], Options-Bitmaske) höchstens
//! einmal in den Cache übernommen; Treffer liefern dieselbe `Arc`
//! (referentielle Gleichheit). Content Models werden pro (Particle,
//! Options-Bitmaske) geteilt.
//!
//! Der Füllpfad folgt dem Muster "Lock, prüfen, freigeben, bauen, Lock,
//! einfügen": Abhängigkeiten (Content Grammar einer Element Grammar) werden
//! ohne gehaltenen Lock über denselben Cache aufgelöst. Bauen zwei Threads
//! gleichzeitig denselben Key, gewinnt der erste Eintrag; der zweite Bau
//! wird verworfen. Kind-Elemente werden nicht vorab aufgelöst, rekursive
//! Typen terminieren daher ohne Sonderbehandlung.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::event_type::GrammarId;
use crate::grammar::{AttributePhase, ContentGrammar, Grammar, GrammarBody, GrammarKey, TagGrammar};
use crate::group::ContentModel;
use crate::options::GrammarOptions;
use crate::schema::{ContentType, ElementId, ParticleId, Schema, TypeDefinition, TypeId};
use crate::{Error, FastHashMap, Result};

/// Process-weiter Cache aller Grammatiken eines Schemas.
#[derive(Debug)]
pub struct GrammarCache {
    schema: Arc<Schema>,
    grammars: Mutex<FastHashMap<(GrammarKey, u8), Arc<Grammar>>>,
    models: Mutex<FastHashMap<(ParticleId, u8), Arc<ContentModel>>>,
    next_id: AtomicU32,
}

impl GrammarCache {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            grammars: Mutex::new(FastHashMap::default()),
            models: Mutex::new(FastHashMap::default()),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Anzahl gecachter Grammatiken.
    pub fn len(&self) -> usize {
        self.grammars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Liefert die Grammatik zu `key` unter `options`, baut sie bei Bedarf.
    ///
    /// # Fehler
    ///
    /// - `DanglingReference` wenn der Key einen Typ ausserhalb des Schemas nennt
    pub fn get_or_build(&self, key: GrammarKey, options: GrammarOptions) -> Result<Arc<Grammar>> {
        let cache_key = (key, options.bits());
        {
            let grammars = self.grammars.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(grammar) = grammars.get(&cache_key) {
                return Ok(Arc::clone(grammar));
            }
        }

        let body = self.build_body(key, options)?;
        let id = GrammarId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let grammar = Arc::new(Grammar::new(id, key, options, body));

        let mut grammars = self.grammars.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = grammars.entry(cache_key).or_insert_with(|| {
            debug!("grammar cache: built {key} as {id:?} (options {:#07b})", options.bits());
            grammar
        });
        Ok(Arc::clone(entry))
    }

    /// Document Grammar (Wurzel jedes Cursors).
    pub fn document(&self, options: GrammarOptions) -> Result<Arc<Grammar>> {
        self.get_or_build(GrammarKey::Document, options)
    }

    /// Element Grammar einer Element-Deklaration.
    pub fn element(&self, element: ElementId, options: GrammarOptions) -> Result<Arc<Grammar>> {
        if element.index() >= self.schema.element_count() {
            return Err(Error::DanglingReference { kind: "element", index: element.0 });
        }
        let decl = self.schema.element(element);
        self.get_or_build(GrammarKey::Element { type_id: decl.type_id, nillable: decl.nillable }, options)
    }

    /// Geteiltes Content Model eines Particles.
    pub fn content_model(&self, particle: ParticleId, options: GrammarOptions) -> Arc<ContentModel> {
        let cache_key = (particle, options.bits());
        {
            let models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(model) = models.get(&cache_key) {
                return Arc::clone(model);
            }
        }
        let model = Arc::new(ContentModel::compile(&self.schema, particle));
        let mut models = self.models.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(models.entry(cache_key).or_insert(model))
    }

    fn type_definition(&self, type_id: TypeId) -> Result<&TypeDefinition> {
        if type_id.index() < self.schema.type_count() {
            Ok(self.schema.type_definition(type_id))
        } else {
            Err(Error::DanglingReference { kind: "type", index: type_id.0 })
        }
    }

    fn build_body(&self, key: GrammarKey, options: GrammarOptions) -> Result<GrammarBody> {
        let body = match key {
            GrammarKey::Document => {
                let globals = self
                    .schema
                    .global_elements()
                    .iter()
                    .map(|&id| (self.schema.element(id).name.clone(), id))
                    .collect();
                GrammarBody::Document { globals }
            }
            GrammarKey::Content { type_id } => {
                let def = self.type_definition(type_id)?;
                GrammarBody::Content(match def.content() {
                    ContentType::Empty => ContentGrammar::Empty { type_id },
                    ContentType::Simple => ContentGrammar::Simple { type_id },
                    ContentType::ElementOnly(particle) => ContentGrammar::Complex {
                        type_id,
                        model: self.content_model(particle, options),
                        mixed: false,
                    },
                    ContentType::Mixed(particle) => ContentGrammar::Complex {
                        type_id,
                        model: self.content_model(particle, options),
                        mixed: true,
                    },
                })
            }
            GrammarKey::Nil { type_id } => {
                let def = self.type_definition(type_id)?;
                let attributes = AttributePhase::new(def.attributes(), def.attribute_wildcard());
                GrammarBody::Content(ContentGrammar::Nil { type_id, attributes })
            }
            GrammarKey::Element { type_id, nillable } | GrammarKey::ElementTag { type_id, nillable } => {
                let def = self.type_definition(type_id)?;
                let attributes = AttributePhase::new(def.attributes(), def.attribute_wildcard());
                let content = self.get_or_build(GrammarKey::Content { type_id }, options)?;
                // EXI 8.5.4.4.2: strict nur mit Sub-Types/Union bzw. nillable
                let (type_marker, nil_marker) = if options.strict() {
                    (matches!(key, GrammarKey::Element { .. }) && def.accepts_xsi_type(), nillable)
                } else {
                    (true, true)
                };
                let tag = TagGrammar::new(type_id, nillable, attributes, content, type_marker, nil_marker);
                match key {
                    GrammarKey::Element { .. } => GrammarBody::Element(tag),
                    _ => GrammarBody::ElementTag(tag),
                }
            }
        };
        Ok(body)
    }
}
