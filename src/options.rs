//! Grammar options (EXI 5.4, Table 5-1, subset relevant for grammars).
//!
//! Die Optionen bestimmen, welche Productions eine Grammatik enthält
//! (EXI 8.3 Pruning) und ob undeclared Productions existieren (strict).
//! Sie werden als Wert durch jeden Cache-Lookup gereicht, es gibt keinen
//! globalen Zustand.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::options::{GrammarOptions, Preserve};
//!
//! let opts = GrammarOptions::default()
//!     .with_preserve(Preserve { comments: true, ..Preserve::default() })
//!     .with_self_contained();
//!
//! assert!(opts.preserve().comments);
//! assert!(opts.self_contained());
//! assert!(opts.validate().is_ok());
//! assert_eq!(GrammarOptions::from_bits(opts.bits()), opts);
//! ```

use crate::{Error, Result};

/// Fidelity options controlling which feature events exist (EXI 5.4, 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Preserve {
    /// CM events can be preserved.
    pub comments: bool,
    /// PI events can be preserved.
    pub pis: bool,
    /// NS events and namespace prefixes can be preserved.
    pub prefixes: bool,
}

/// Options that influence grammar construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GrammarOptions {
    preserve: Preserve,
    strict: bool,
    self_contained: bool,
}

const BIT_COMMENTS: u8 = 1 << 0;
const BIT_PIS: u8 = 1 << 1;
const BIT_PREFIXES: u8 = 1 << 2;
const BIT_SELF_CONTAINED: u8 = 1 << 3;
const BIT_STRICT: u8 = 1 << 4;

impl GrammarOptions {
    // Getter
    pub fn preserve(&self) -> &Preserve { &self.preserve }
    pub fn strict(&self) -> bool { self.strict }
    pub fn self_contained(&self) -> bool { self.self_contained }

    // Builder
    pub fn with_preserve(mut self, preserve: Preserve) -> Self { self.preserve = preserve; self }
    pub fn with_strict(mut self) -> Self { self.strict = true; self }
    pub fn with_self_contained(mut self) -> Self { self.self_contained = true; self }

    // Setter
    pub fn set_preserve(&mut self, preserve: Preserve) { self.preserve = preserve; }
    pub fn set_strict(&mut self, val: bool) { self.strict = val; }
    pub fn set_self_contained(&mut self, val: bool) { self.self_contained = val; }

    /// Kompakte Bitmaske aller grammatik-relevanten Flags.
    ///
    /// Dient als Cache-Key; zwei Optionswerte mit gleicher Bitmaske erzeugen
    /// identische Grammatiken.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.preserve.comments {
            bits |= BIT_COMMENTS;
        }
        if self.preserve.pis {
            bits |= BIT_PIS;
        }
        if self.preserve.prefixes {
            bits |= BIT_PREFIXES;
        }
        if self.self_contained {
            bits |= BIT_SELF_CONTAINED;
        }
        if self.strict {
            bits |= BIT_STRICT;
        }
        bits
    }

    /// Umkehrung von [`bits`](Self::bits); unbekannte Bits werden ignoriert.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            preserve: Preserve {
                comments: bits & BIT_COMMENTS != 0,
                pis: bits & BIT_PIS != 0,
                prefixes: bits & BIT_PREFIXES != 0,
            },
            strict: bits & BIT_STRICT != 0,
            self_contained: bits & BIT_SELF_CONTAINED != 0,
        }
    }

    /// Validiert die Options-Kombination (EXI 5.4).
    ///
    /// "strict" MUST NOT appear when one of "prefixes", "comments", "pis"
    /// or "selfContained" is present.
    pub fn validate(&self) -> Result<()> {
        let incompatible_with_strict = self.preserve.comments
            || self.preserve.pis
            || self.preserve.prefixes
            || self.self_contained;
        if self.strict && incompatible_with_strict {
            return Err(Error::InvalidOptionCombination);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lenient_without_features() {
        let opts = GrammarOptions::default();
        assert!(!opts.strict());
        assert!(!opts.self_contained());
        assert_eq!(*opts.preserve(), Preserve::default());
        assert_eq!(opts.bits(), 0);
    }

    /// Jede Kombination überlebt bits() -> from_bits().
    #[test]
    fn bits_bijektiv() {
        for bits in 0u8..32 {
            assert_eq!(GrammarOptions::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn setter_und_builder_gleichwertig() {
        let mut a = GrammarOptions::default();
        a.set_strict(true);
        assert_eq!(a, GrammarOptions::default().with_strict());
        a.set_strict(false);
        a.set_preserve(Preserve { pis: true, ..Preserve::default() });
        assert!(a.preserve().pis);
    }

    /// EXI 5.4: strict ist inkompatibel mit Preserve-Flags und selfContained.
    #[test]
    fn strict_inkompatibel() {
        assert!(GrammarOptions::default().with_strict().validate().is_ok());
        for preserve in [
            Preserve { comments: true, ..Preserve::default() },
            Preserve { pis: true, ..Preserve::default() },
            Preserve { prefixes: true, ..Preserve::default() },
        ] {
            let opts = GrammarOptions::default().with_strict().with_preserve(preserve);
            assert_eq!(opts.validate(), Err(Error::InvalidOptionCombination));
        }
        let opts = GrammarOptions::default().with_strict().with_self_contained();
        assert_eq!(opts.validate(), Err(Error::InvalidOptionCombination));
    }
}
