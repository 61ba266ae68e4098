//! Central error types for the grammar engine.
//!
//! Drei Fehlerklassen:
//! - Schema-Konstruktionsfehler (beim Bauen des Schemas bzw. der Grammatiken,
//!   fatal, es wird nie eine halbe Grammatik gecacht)
//! - Undeclared-Fehler (ein Event passt im strict mode auf keinen Kandidaten)
//! - Zustandsfehler des Cursors (EE ohne offenes Element usw.)
//!
//! Ungültige Attributwerte sind *kein* Fehler: dafür existiert die
//! `AT(qname)[untyped]`-Production (EXI 8.5.4.4.1).

use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use crate::event::Event;
use crate::event_type::EventTypeList;

/// All error types of the grammar engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The schema model violates a structural constraint (EXI 8.5).
    SchemaViolation(Cow<'static, str>),
    /// A Particle has invalid occurs constraints: max < min (EXI 8.5.4.1.5).
    InvalidParticleOccurs { min: u32, max: u32 },
    /// A wildcard namespace list is empty (EXI 8.5.4.1.7).
    EmptyNamespaceList,
    /// Ein Handle zeigt ausserhalb der Arena.
    DanglingReference {
        /// Art des Handles (`"type"`, `"element"`, `"particle"`).
        kind: &'static str,
        /// Der ungültige Index.
        index: u32,
    },
    /// Ein per `reserve_type` angelegter Typ wurde nie definiert.
    UndefinedType(String),
    /// An invalid combination of grammar options was specified (EXI 5.4).
    InvalidOptionCombination,
    /// Kein Kandidat passt auf das Event und der Modus ist strict (EXI 8.5.4.4.2).
    Undeclared {
        /// Das abgelehnte Event.
        event: Event,
        /// Die Kandidatenliste des aktuellen Zustands (für Diagnose).
        candidates: Arc<EventTypeList>,
    },
    /// xsi:type references a type not found in the schema (EXI 8.5.4.4).
    XsiTypeNotFound(String),
    /// Content after xsi:nil="true" is not empty (EXI 8.5.4.4.2).
    ///
    /// Nach xsi:nil="true" sind nur noch Attribute, EE und CM/PI erlaubt.
    XsiNilContentNotEmpty,
    /// Das Event passt nicht zur Verschachtelung (z.B. EE ohne offenes Element,
    /// Events nach ED).
    UnbalancedEvent(Cow<'static, str>),
}

/// Alias unter dem die Cursor-API ihre Fehler dokumentiert.
pub type GrammarError = Error;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaViolation(msg) => {
                if msg.is_empty() {
                    write!(f, "schema violation (EXI 8.5)")
                } else {
                    write!(f, "schema violation: {msg} (EXI 8.5)")
                }
            }
            Self::InvalidParticleOccurs { min, max } => {
                write!(f, "invalid particle occurs: max {max} < min {min} (EXI 8.5.4.1.5)")
            }
            Self::EmptyNamespaceList => {
                write!(f, "empty namespace list in wildcard constraint (EXI 8.5.4.1.7)")
            }
            Self::DanglingReference { kind, index } => {
                write!(f, "dangling {kind} reference #{index}")
            }
            Self::UndefinedType(name) => write!(f, "type '{name}' was reserved but never defined"),
            Self::InvalidOptionCombination => write!(f, "invalid grammar option combination (EXI 5.4)"),
            Self::Undeclared { event, candidates } => {
                write!(f, "undeclared event {event} in strict mode (EXI 8.5.4.4.2); candidates: [{}]", candidates.summary())
            }
            Self::XsiTypeNotFound(type_name) => {
                write!(f, "xsi:type '{type_name}' not found in schema (EXI 8.5.4.4)")
            }
            Self::XsiNilContentNotEmpty => {
                write!(f, "content after xsi:nil=\"true\" is not empty (EXI 8.5.4.4.2)")
            }
            Self::UnbalancedEvent(msg) => write!(f, "unbalanced event: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `SchemaViolation` Fehler mit Nachricht.
    pub fn schema_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Erstellt einen `Undeclared` Fehler mit Event und Kandidatenliste.
    pub fn undeclared(event: &Event, candidates: &Arc<EventTypeList>) -> Self {
        Self::Undeclared {
            event: event.clone(),
            candidates: Arc::clone(candidates),
        }
    }

    /// Erstellt einen `UnbalancedEvent` Fehler mit Nachricht.
    pub fn unbalanced(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::UnbalancedEvent(msg.into())
    }

    /// `true` für Fehler die beim Bauen von Schema/Grammatik entstehen.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation(_)
                | Self::InvalidParticleOccurs { .. }
                | Self::EmptyNamespaceList
                | Self::DanglingReference { .. }
                | Self::UndefinedType(_)
                | Self::InvalidOptionCombination
        )
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;

    #[test]
    fn schema_violation_display() {
        let e = Error::schema_violation("");
        let msg = e.to_string();
        assert!(msg.contains("schema"), "{msg}");
        assert!(msg.contains("8.5"), "{msg}");

        let e = Error::schema_violation("all group contains a sequence");
        assert!(e.to_string().contains("all group"));
    }

    #[test]
    fn invalid_particle_occurs_display() {
        let e = Error::InvalidParticleOccurs { min: 3, max: 1 };
        let msg = e.to_string();
        assert!(msg.contains("max 1 < min 3"), "{msg}");
        assert!(msg.contains("8.5.4.1.5"), "{msg}");
    }

    #[test]
    fn empty_namespace_list_display() {
        let msg = Error::EmptyNamespaceList.to_string();
        assert!(msg.contains("namespace"), "{msg}");
        assert!(msg.contains("8.5.4.1.7"), "{msg}");
    }

    #[test]
    fn dangling_reference_display() {
        let e = Error::DanglingReference { kind: "particle", index: 42 };
        let msg = e.to_string();
        assert!(msg.contains("particle"), "{msg}");
        assert!(msg.contains("42"), "{msg}");
    }

    #[test]
    fn undeclared_display_nennt_event_und_kandidaten() {
        let candidates = Arc::new(EventTypeList::empty());
        let e = Error::undeclared(&Event::StartElement(QName::new("", "x")), &candidates);
        let msg = e.to_string();
        assert!(msg.contains("SE(x)"), "{msg}");
        assert!(msg.contains("strict"), "{msg}");
    }

    #[test]
    fn xsi_fehler_display() {
        assert!(Error::XsiTypeNotFound("foo:Bar".into()).to_string().contains("foo:Bar"));
        assert!(Error::XsiNilContentNotEmpty.to_string().contains("xsi:nil"));
    }

    /// Konstruktionsfehler werden von Laufzeitfehlern unterschieden.
    #[test]
    fn construction_error_klassifikation() {
        assert!(Error::EmptyNamespaceList.is_construction_error());
        assert!(Error::InvalidOptionCombination.is_construction_error());
        assert!(!Error::XsiNilContentNotEmpty.is_construction_error());
        assert!(!Error::unbalanced("EE without open element").is_construction_error());
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<Error>();
    }
}
