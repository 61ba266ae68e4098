//! Event Codes und ihre Bitbreiten (EXI 6.2).
//!
//! Event Codes identifizieren Productions eines Grammatik-Zustands und
//! bestehen aus 1-3 Teilen. Jeder Teil wird als n-bit unsigned integer
//! geschrieben, n hängt von der Anzahl der Geschwister ab:
//! - Part 1: Alle Event Codes sind Geschwister
//! - Part 2: Nur Event Codes mit gleichem Part1-Wert sind Geschwister
//! - Part 3: Nur Event Codes mit gleichen Part1 und Part2-Werten sind Geschwister
//!
//! Das Lesen/Schreiben der Bits übernimmt die externe I/O-Schicht; hier
//! werden nur Codes und Breiten berechnet.

use std::fmt;

/// Berechnet die Anzahl Bits fuer `n` unterschiedliche Werte: `⌈log₂(n)⌉`.
///
/// - `n = 0` oder `n = 1`: 0 Bits (Teil wird weggelassen)
/// - `n = 2`: 1 Bit
/// - `n = 3..4`: 2 Bits
/// - `n = 5..8`: 3 Bits
#[inline]
pub fn bits_for_part(num_distinct_values: u32) -> u8 {
    if num_distinct_values <= 1 {
        0
    } else {
        (u32::BITS - (num_distinct_values - 1).leading_zeros()) as u8
    }
}

/// Tiefe eines Event Codes: Anzahl der Teile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Depth {
    /// Deklarierte Productions (`n`).
    One,
    /// Undeclared/Fallback-Productions (`n.m`).
    Two,
    /// Seltene Feature-Productions (`n.m.k`).
    Three,
}

/// Ein Event Code mit 1-3 Teilen, z.B. "1.3.0".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode {
    part1: u32,
    part2: Option<u32>,
    part3: Option<u32>,
}

impl EventCode {
    /// Erstellt einen Event Code mit einem Teil.
    pub fn one(part1: u32) -> Self {
        Self { part1, part2: None, part3: None }
    }

    /// Erstellt einen Event Code mit zwei Teilen.
    pub fn two(part1: u32, part2: u32) -> Self {
        Self { part1, part2: Some(part2), part3: None }
    }

    /// Erstellt einen Event Code mit drei Teilen.
    pub fn three(part1: u32, part2: u32, part3: u32) -> Self {
        Self { part1, part2: Some(part2), part3: Some(part3) }
    }

    pub fn part1(&self) -> u32 {
        self.part1
    }

    pub fn part2(&self) -> Option<u32> {
        self.part2
    }

    pub fn part3(&self) -> Option<u32> {
        self.part3
    }

    /// Anzahl der Teile.
    pub fn num_parts(&self) -> usize {
        1 + self.part2.is_some() as usize + self.part3.is_some() as usize
    }

    pub fn depth(&self) -> Depth {
        match (self.part2, self.part3) {
            (None, _) => Depth::One,
            (Some(_), None) => Depth::Two,
            (Some(_), Some(_)) => Depth::Three,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.part1)?;
        if let Some(p2) = self.part2 {
            write!(f, ".{p2}")?;
        }
        if let Some(p3) = self.part3 {
            write!(f, ".{p3}")?;
        }
        Ok(())
    }
}

/// Anzahl distinct values pro Teil für eine Event-Tabelle.
///
/// In schema-informed Grammatiken liegen alle 2-teiligen Codes unter
/// demselben Part1-Wert (dem "Escape" nach den deklarierten Productions),
/// 3-teilige Codes können unter mehreren Part2-Werten liegen
/// (z.B. untyped Attribute und CM/PI im selben Zustand).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCodeWidths {
    part1_values: u32,
    part2_values: u32,
    /// (Part2-Wert, Anzahl Part3-Werte); typisch 0-2 Einträge.
    part3_values: Vec<(u32, u32)>,
}

impl EventCodeWidths {
    /// Leitet die Breiten aus einer Folge von Codes ab.
    pub(crate) fn from_codes<'a>(codes: impl IntoIterator<Item = &'a EventCode>) -> Self {
        let mut widths = Self::default();
        for code in codes {
            widths.part1_values = widths.part1_values.max(code.part1 + 1);
            if let Some(p2) = code.part2 {
                widths.part2_values = widths.part2_values.max(p2 + 1);
                if let Some(p3) = code.part3 {
                    match widths.part3_values.iter_mut().find(|(slot, _)| *slot == p2) {
                        Some(entry) => entry.1 = entry.1.max(p3 + 1),
                        None => widths.part3_values.push((p2, p3 + 1)),
                    }
                }
            }
        }
        widths
    }

    /// Anzahl der Part1-Werte inkl. Escape-Wert zum zweiten Level.
    pub fn part1_values(&self) -> u32 {
        self.part1_values
    }

    pub fn part2_values(&self) -> u32 {
        self.part2_values
    }

    /// Anzahl der Part3-Werte unter einem Part2-Wert (0 wenn keine).
    pub fn part3_values(&self, part2: u32) -> u32 {
        self.part3_values
            .iter()
            .find(|(slot, _)| *slot == part2)
            .map_or(0, |(_, n)| *n)
    }

    pub fn bits_part1(&self) -> u8 {
        bits_for_part(self.part1_values)
    }

    pub fn bits_part2(&self) -> u8 {
        bits_for_part(self.part2_values)
    }

    pub fn bits_part3(&self, part2: u32) -> u8 {
        bits_for_part(self.part3_values(part2))
    }

    /// Gesamtzahl Bits für einen Code.
    pub fn bits_for(&self, code: &EventCode) -> u32 {
        let mut bits = u32::from(self.bits_part1());
        if let Some(p2) = code.part2 {
            bits += u32::from(self.bits_part2());
            if code.part3.is_some() {
                bits += u32::from(self.bits_part3(p2));
            }
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // EXI 6.2: ceil(log2(n))
    #[test]
    fn bitbreiten_grundwerte() {
        let expected = [(0, 0), (1, 0), (2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4), (256, 8), (257, 9)];
        for (n, bits) in expected {
            assert_eq!(bits_for_part(n), bits, "n={n}");
        }
    }

    #[test]
    fn code_display_und_tiefe() {
        assert_eq!(EventCode::one(3).to_string(), "3");
        assert_eq!(EventCode::two(2, 7).to_string(), "2.7");
        assert_eq!(EventCode::three(1, 4, 0).to_string(), "1.4.0");
        assert_eq!(EventCode::one(0).depth(), Depth::One);
        assert_eq!(EventCode::two(0, 0).depth(), Depth::Two);
        assert_eq!(EventCode::three(0, 0, 1).depth(), Depth::Three);
        assert_eq!(EventCode::three(0, 0, 1).num_parts(), 3);
    }

    /// Zwei 3-teilige Gruppen unter verschiedenen Part2-Werten werden
    /// getrennt gezählt (Geschwister nur bei gleichem Präfix).
    #[test]
    fn widths_pro_geschwistergruppe() {
        let codes = [
            EventCode::one(0),
            EventCode::one(1),
            EventCode::two(2, 0),
            EventCode::three(2, 1, 0),
            EventCode::three(2, 1, 1),
            EventCode::three(2, 1, 2),
            EventCode::two(2, 2),
            EventCode::three(2, 3, 0),
            EventCode::three(2, 3, 1),
        ];
        let w = EventCodeWidths::from_codes(&codes);
        assert_eq!(w.part1_values(), 3);
        assert_eq!(w.part2_values(), 4);
        assert_eq!(w.part3_values(1), 3);
        assert_eq!(w.part3_values(3), 2);
        assert_eq!(w.part3_values(0), 0);
        assert_eq!(w.bits_part1(), 2);
        assert_eq!(w.bits_part2(), 2);
        assert_eq!(w.bits_part3(1), 2);
        assert_eq!(w.bits_for(&EventCode::one(0)), 2);
        assert_eq!(w.bits_for(&EventCode::three(2, 3, 1)), 5);
    }

    /// Ein einzelner deklarierter Code braucht 0 Bits.
    #[test]
    fn einzelner_code_null_bits() {
        let w = EventCodeWidths::from_codes(&[EventCode::one(0)]);
        assert_eq!(w.bits_for(&EventCode::one(0)), 0);
    }
}
