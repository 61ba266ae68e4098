//! exi-grammar – Schema-informed EXI 1.0 Grammatiken und Event-Code-Tabellen
//!
//! Aus einem abstrakten Schema-Modell ([`Schema`]) werden die
//! schema-informed Grammars aus EXI 8.5 abgeleitet: für jeden erreichbaren
//! Zustand die geordnete Liste der erlaubten Events mit ihren Event Codes.
//! Encoder und Decoder sind externe Konsumenten; sie laufen mit einem
//! [`GrammarCursor`] durch dieselben, geteilten Grammatiken.
//!
//! # Beispiel
//!
//! ```
//! use std::sync::Arc;
//! use exi_grammar::{
//!     ContentType, ElementDeclaration, Event, GrammarCache, GrammarCursor, GrammarOptions,
//!     Particle, ParticleTerm, QName, SchemaBuilder, TypeDefinition,
//! };
//!
//! // <greeting><text/>+</greeting>
//! let mut b = SchemaBuilder::new();
//! let string = b.add_type(TypeDefinition::simple(Some(QName::xsd("string"))));
//! let text = b.add_element(ElementDeclaration::new(QName::new("", "text"), string));
//! let texts = b.add_particle(Particle::one_or_more(ParticleTerm::Element(text)));
//! let seq = b.add_particle(Particle::once(ParticleTerm::sequence(vec![texts])));
//! let greeting = b.add_type(TypeDefinition::complex(None, ContentType::ElementOnly(seq)));
//! b.add_global_element(ElementDeclaration::new(QName::new("", "greeting"), greeting));
//! let cache = GrammarCache::new(Arc::new(b.build().unwrap()));
//!
//! let mut cursor = GrammarCursor::new(&cache, GrammarOptions::default()).unwrap();
//! cursor.consume(&Event::StartDocument).unwrap();
//! cursor.consume(&Event::StartElement(QName::new("", "greeting"))).unwrap();
//!
//! let first = cursor.current_candidates();
//! assert_eq!(first.get(0).unwrap().to_string(), "SE(text)");
//! assert_eq!(first.widths().bits_part1(), 1);
//! ```

pub mod cache;
pub mod cursor;
pub mod error;
pub mod event;
pub mod event_code;
pub mod event_type;
pub mod grammar;
pub mod group;
pub mod options;
pub mod qname;
pub mod schema;
mod undeclared;

pub use error::{Error, GrammarError, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent; für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// HashSet mit ahash.
pub(crate) type FastHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Schema-Modell
pub use qname::QName;
pub use schema::{
    AttributeUse, ContentType, DerivationKind, ElementDeclaration, ElementId, MaxOccurs, Particle, ParticleId,
    ParticleTerm, Schema, SchemaBuilder, SimpleTypeVariety, TypeDefinition, TypeId, WildcardConstraint,
};

// Public API: Options
pub use options::{GrammarOptions, Preserve};

// Public API: Events und Tabellen
pub use event::{Event, NilValue};
pub use event_code::{Depth, EventCode, EventCodeWidths};
pub use event_type::{EventKind, EventType, EventTypeList, GrammarId};

// Public API: Grammatiken
pub use cache::GrammarCache;
pub use cursor::GrammarCursor;
pub use grammar::{ContentGrammar, ContentState, Grammar, GrammarBody, GrammarKey, GrammarState, TagLead};
pub use group::{ContentModel, ParticleProgress};
