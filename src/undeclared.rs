//! Undeclared Productions und Feature-Events (EXI 8.5.4.4).
//!
//! Ergänzt die deklarierten Productions eines Zustands um das zweite und
//! dritte Level:
//! - Bei strict=false: EE, xsi:type, xsi:nil, AT(*), AT(qname)[untyped],
//!   AT(*)[untyped], NS, SC, SE(*), CH[untyped], CM, PI
//! - Bei strict=true: nur xsi:type/xsi:nil (falls erlaubt) und die
//!   Feature-Events der gesetzten Optionen
//!
//! # Reihenfolge (EXI 8.5.4.4.1)
//!
//! ```text
//! Element_i,j:
//!   EE              n.m        (falls nicht deklariert)
//!   AT(xsi:type)    n.(m+1)    (nur j=0, vor xsi:nil)
//!   AT(xsi:nil)     n.(m+2)    (nur j=0, vor xsi:nil)
//!   AT(*)           n.(m+3)
//!   AT(qname)[untyped] ... AT(*)[untyped]   n.(m+4).x
//!   NS              n.(m+5)    (nur j=0, vor xsi:nil, preserve.prefixes)
//!   SC              n.(m+6)    (nur j=0, vor SC, selfContained)
//!   SE(*)           n.(m+7)
//!   CH[untyped]     n.(m+8)
//!   CM, PI          n.(m+9).x  (preserve.comments / preserve.pis)
//! ```
//!
//! Slots die wegfallen, rücken nach; die Nummerierung übernimmt
//! [`EventTypeListBuilder`].

use crate::event_type::{Entry, EventKind, EventTypeListBuilder};
use crate::grammar::TagLead;
use crate::options::GrammarOptions;
use crate::qname::QName;

/// Art des Zustands, für den Slots ergänzt werden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    DocumentStart,
    /// `DocContent`: CM/PI als dritte Ebene.
    DocumentContent,
    /// `DocEnd`: CM/PI direkt auf der zweiten Ebene.
    DocumentEnd,
    /// Attribut-Phase von Element/ElementTag Grammar; `lead` ist der noch
    /// offene Teil von `Element_i,0`.
    Tag { lead: TagLead },
    /// Attribut-Phase der Nil Grammar.
    NilTag,
    /// Nil Grammar nach CM/PI: nur noch EE.
    NilEnd,
    /// Inhalt: keine Attribute mehr.
    Content,
}

/// Eingaben für die Slot-Berechnung eines Zustands.
#[derive(Debug, Clone)]
pub(crate) struct Slots {
    pub(crate) phase: Phase,
    /// EE ist bereits deklariert.
    pub(crate) end_declared: bool,
    pub(crate) type_marker: bool,
    pub(crate) nil_marker: bool,
    /// Deklarierte `AT(qname)` des Zustands mit ihrem Folgezustand.
    pub(crate) attributes: Vec<(QName, u32)>,
}

impl Slots {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            end_declared: false,
            type_marker: false,
            nil_marker: false,
            attributes: Vec::new(),
        }
    }

    /// Übernimmt die deklarierten `AT(qname)` Productions aus den Einträgen.
    pub(crate) fn with_declared(mut self, declared: &[Entry]) -> Self {
        for entry in declared {
            match (entry.kind, &entry.name, entry.next_position) {
                (EventKind::Attribute, Some(name), Some(next)) => self.attributes.push((name.clone(), next)),
                (EventKind::EndElement, ..) => self.end_declared = true,
                _ => {}
            }
        }
        self
    }
}

/// Hängt zweite und dritte Ebene an.
pub(crate) fn append(builder: &mut EventTypeListBuilder, slots: &Slots, options: GrammarOptions) {
    let lenient = !options.strict();
    match slots.phase {
        Phase::DocumentStart => {}
        Phase::DocumentContent => builder.third(comments_and_pis(options)),
        Phase::DocumentEnd => {
            for entry in comments_and_pis(options) {
                builder.second(entry);
            }
        }
        Phase::Tag { lead } => {
            if lenient && !slots.end_declared {
                builder.second(Entry::new(EventKind::UndeclaredEndElement));
            }
            if lead.offers_markers() && slots.type_marker {
                builder.second(Entry::named(EventKind::Type, QName::xsi_type()));
            }
            if lead.offers_markers() && slots.nil_marker {
                builder.second(Entry::named(EventKind::Nil, QName::xsi_nil()));
            }
            if lenient {
                attribute_fallbacks(builder, slots);
            }
            if lead.offers_markers() && options.preserve().prefixes {
                builder.second(Entry::new(EventKind::NamespaceDeclaration));
            }
            if lead.offers_self_contained() && options.self_contained() {
                builder.second(Entry::new(EventKind::SelfContained));
            }
            if lenient {
                builder.second(Entry::new(EventKind::UndeclaredStartElementWildcard));
                builder.second(Entry::new(EventKind::UndeclaredCharacters));
            }
            builder.third(comments_and_pis(options));
        }
        Phase::NilTag => {
            if lenient {
                if !slots.end_declared {
                    builder.second(Entry::new(EventKind::UndeclaredEndElement));
                }
                attribute_fallbacks(builder, slots);
            }
            builder.third(comments_and_pis(options));
        }
        Phase::NilEnd => {
            if lenient && !slots.end_declared {
                builder.second(Entry::new(EventKind::UndeclaredEndElement));
            }
            builder.third(comments_and_pis(options));
        }
        Phase::Content => {
            if lenient {
                if !slots.end_declared {
                    builder.second(Entry::new(EventKind::UndeclaredEndElement));
                }
                builder.second(Entry::new(EventKind::UndeclaredStartElementWildcard));
                builder.second(Entry::new(EventKind::UndeclaredCharacters));
            }
            builder.third(comments_and_pis(options));
        }
    }
}

/// `AT(*)`, danach die untyped-Gruppe: `AT(qname)[untyped]` pro deklariertem
/// Attribut des Zustands, abgeschlossen von `AT(*)[untyped]`.
fn attribute_fallbacks(builder: &mut EventTypeListBuilder, slots: &Slots) {
    builder.second(Entry::new(EventKind::UndeclaredAttributeWildcard));
    let mut group: Vec<Entry> = slots
        .attributes
        .iter()
        .map(|(name, next)| {
            Entry::named(EventKind::UndeclaredAttributeInvalidValue, name.clone()).with_next_position(*next)
        })
        .collect();
    group.push(Entry::new(EventKind::UndeclaredAttributeWildcardInvalidValue));
    builder.third(group);
}

fn comments_and_pis(options: GrammarOptions) -> Vec<Entry> {
    let mut group = Vec::new();
    if options.preserve().comments {
        group.push(Entry::new(EventKind::Comment));
    }
    if options.preserve().pis {
        group.push(Entry::new(EventKind::ProcessingInstruction));
    }
    group
}
