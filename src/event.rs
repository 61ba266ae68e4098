//! Aufgelöste XML-Events, wie sie der Cursor konsumiert (EXI 4, Table 4-1).
//!
//! Die Events tragen keine Werte, nur das, was für die Grammatik zählt:
//! Namen, ob ein Wert seinen Typ erfüllt (`valid`), den Zieltyp von
//! `xsi:type` und den Wert von `xsi:nil`. Werte-Codecs leben in der
//! externen I/O-Schicht.

use std::fmt;

use crate::qname::QName;

/// Wert eines `xsi:nil` Attributs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NilValue {
    True,
    False,
    /// Kein gültiger xs:boolean.
    Invalid,
}

impl NilValue {
    /// Parst den lexikalischen Wert (xs:boolean, Whitespace collapse).
    pub fn parse(lexical: &str) -> Self {
        match lexical.trim() {
            "true" | "1" => Self::True,
            "false" | "0" => Self::False,
            _ => Self::Invalid,
        }
    }
}

/// A resolved XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StartDocument,
    EndDocument,
    StartElement(QName),
    EndElement,
    /// Attribut; `valid` ist `false` wenn der Wert seinen deklarierten Typ
    /// verletzt (führt auf `AT(qname)[untyped]`).
    Attribute { name: QName, valid: bool },
    /// `xsi:type` mit dem aufgelösten Typnamen.
    XsiType(QName),
    XsiNil(NilValue),
    /// Character data; `valid` wie bei Attributen.
    Characters { valid: bool },
    NamespaceDeclaration,
    Comment,
    ProcessingInstruction,
    SelfContained,
}

impl Event {
    /// Attribut mit typgültigem Wert.
    pub fn attribute(name: QName) -> Self {
        Self::Attribute { name, valid: true }
    }

    /// Character data mit typgültigem Wert.
    pub fn characters() -> Self {
        Self::Characters { valid: true }
    }

    /// Baut das passende Event für ein Attribut aus Name und lexikalischem Wert.
    ///
    /// `xsi:nil` wird geparst; `xsi:type` erwartet den bereits aufgelösten
    /// Typnamen und ist daher hier nicht abgedeckt.
    pub fn from_attribute(name: QName, lexical: &str, valid: bool) -> Self {
        if name.is_xsi_nil() {
            Self::XsiNil(NilValue::parse(lexical))
        } else {
            Self::Attribute { name, valid }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartDocument => f.write_str("SD"),
            Self::EndDocument => f.write_str("ED"),
            Self::StartElement(name) => write!(f, "SE({name})"),
            Self::EndElement => f.write_str("EE"),
            Self::Attribute { name, valid: true } => write!(f, "AT({name})"),
            Self::Attribute { name, valid: false } => write!(f, "AT({name})[invalid value]"),
            Self::XsiType(name) => write!(f, "AT(xsi:type={name})"),
            Self::XsiNil(value) => write!(f, "AT(xsi:nil={value:?})"),
            Self::Characters { valid: true } => f.write_str("CH"),
            Self::Characters { valid: false } => f.write_str("CH[invalid value]"),
            Self::NamespaceDeclaration => f.write_str("NS"),
            Self::Comment => f.write_str("CM"),
            Self::ProcessingInstruction => f.write_str("PI"),
            Self::SelfContained => f.write_str("SC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_value_parse() {
        assert_eq!(NilValue::parse("true"), NilValue::True);
        assert_eq!(NilValue::parse(" 1 "), NilValue::True);
        assert_eq!(NilValue::parse("false"), NilValue::False);
        assert_eq!(NilValue::parse("0"), NilValue::False);
        assert_eq!(NilValue::parse("yes"), NilValue::Invalid);
        assert_eq!(NilValue::parse("TRUE"), NilValue::Invalid);
    }

    #[test]
    fn from_attribute_erkennt_xsi_nil() {
        let e = Event::from_attribute(QName::xsi_nil(), "true", true);
        assert_eq!(e, Event::XsiNil(NilValue::True));
        let e = Event::from_attribute(QName::new("", "id"), "x", false);
        assert_eq!(e, Event::Attribute { name: QName::new("", "id"), valid: false });
    }

    #[test]
    fn display() {
        assert_eq!(Event::StartElement(QName::new("urn:a", "x")).to_string(), "SE(urn:a:x)");
        assert_eq!(Event::attribute(QName::new("", "id")).to_string(), "AT(id)");
        assert_eq!(Event::Characters { valid: false }.to_string(), "CH[invalid value]");
    }
}
