//! Qualified names (EXI 7.1.7).
//!
//! Komponenten sind `Arc<str>`, damit Grammatiken und Event-Tabellen ohne
//! Kopien zwischen Threads geteilt werden können.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHasher;

/// Namespace URI der XML Schema Instance Attribute (`xsi:type`, `xsi:nil`).
pub const URI_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace URI von XML Schema (für die Built-in Typen).
pub const URI_XSD: &str = "http://www.w3.org/2001/XMLSchema";

/// A qualified name: namespace URI plus local-name, optional prefix.
///
/// EXI 7.1.7: "Two qnames are considered equal if they have the same uri
/// and local-name, regardless of their prefix values."
#[derive(Clone)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub uri: Arc<str>,
    /// The local name.
    pub local_name: Arc<str>,
    /// The optional prefix.
    pub prefix: Option<Arc<str>>,
    /// Vorberechneter Hash von (uri, local_name).
    identity: u64,
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QName")
            .field("uri", &self.uri)
            .field("local_name", &self.local_name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Berechnet den Identity-Hash für ein QName (uri + local_name).
fn compute_identity(uri: &str, local_name: &str) -> u64 {
    let mut hasher = AHasher::default();
    uri.hash(&mut hasher);
    local_name.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.uri == other.uri
            && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sortierung: erst local_name, dann uri (EXI 8.5.4.3, Attribute und
/// Substitution-Group-Member).
impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local_name
            .cmp(&other.local_name)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Display in EXI-Notation: `uri:local` bzw. nur `local` ohne Namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{}:{}", self.uri, self.local_name)
        }
    }
}

impl QName {
    /// Creates a new QName with the given URI and local-name, without prefix.
    pub fn new(uri: impl Into<Arc<str>>, local_name: impl Into<Arc<str>>) -> Self {
        let uri = uri.into();
        let local_name = local_name.into();
        let identity = compute_identity(&uri, &local_name);
        Self {
            uri,
            local_name,
            prefix: None,
            identity,
        }
    }

    /// Creates a new QName with URI, local-name, and prefix.
    pub fn with_prefix(
        uri: impl Into<Arc<str>>,
        local_name: impl Into<Arc<str>>,
        prefix: impl Into<Arc<str>>,
    ) -> Self {
        let mut qname = Self::new(uri, local_name);
        qname.prefix = Some(prefix.into());
        qname
    }

    /// xsi:type QName.
    pub fn xsi_type() -> Self {
        Self::with_prefix(URI_XSI, "type", "xsi")
    }

    /// xsi:nil QName.
    pub fn xsi_nil() -> Self {
        Self::with_prefix(URI_XSI, "nil", "xsi")
    }

    /// Name eines Built-in Typs im XML Schema Namespace.
    pub fn xsd(local_name: &str) -> Self {
        Self::new(URI_XSD, local_name)
    }

    #[inline]
    pub fn is_xsi_type(&self) -> bool {
        &*self.local_name == "type" && &*self.uri == URI_XSI
    }

    #[inline]
    pub fn is_xsi_nil(&self) -> bool {
        &*self.local_name == "nil" && &*self.uri == URI_XSI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gleichheit ignoriert den Prefix.
    #[test]
    fn equality_ignores_prefix() {
        let a = QName::new("urn:a", "x");
        let b = QName::with_prefix("urn:a", "x", "p");
        assert_eq!(a, b);
        assert_ne!(a, QName::new("urn:b", "x"));
    }

    /// EXI 8.5.4.3: Sortierung nach local-name, dann uri.
    #[test]
    fn ordering_local_name_then_uri() {
        let mut names = vec![
            QName::new("urn:b", "a"),
            QName::new("", "b"),
            QName::new("urn:a", "a"),
            QName::new("", "a"),
        ];
        names.sort();
        let rendered: Vec<String> = names.iter().map(|q| q.to_string()).collect();
        assert_eq!(rendered, ["a", "urn:a:a", "urn:b:a", "b"]);
    }

    #[test]
    fn xsi_names() {
        assert!(QName::xsi_type().is_xsi_type());
        assert!(QName::xsi_nil().is_xsi_nil());
        assert!(!QName::new("", "nil").is_xsi_nil());
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(QName::new("urn:a", "x"));
        assert!(set.contains(&QName::with_prefix("urn:a", "x", "q")));
    }
}
