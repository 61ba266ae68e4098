//! Group Grammars und Particle Flattener (EXI 8.5.4.1.5 - 8.5.4.1.8).
//!
//! Ein [`ContentModel`] ist das unveränderliche Template eines Content
//! Models: der Particle-Baum eines Complex Types, kompiliert in
//! [`ParticleGrammar`]/[`GroupGrammar`] Knoten. Blätter (Element- und
//! Wildcard-Terme) tragen ihre Schema-Reihenfolge (`order`, depth-first),
//! die EXI 8.5.4.3 für die Sortierung der `SE`-Productions vorschreibt.
//!
//! Der veränderliche Fortschritt (Position in Sequenzen, gewählter Zweig
//! einer Choice, verbrauchte Particles einer All-Gruppe, Wiederholungszähler)
//! lebt ausschliesslich in [`ParticleProgress`], das dem Cursor gehört.
//! Templates werden nie verändert und sind zwischen Dokumenten und Threads
//! geteilt.
//!
//! Der Flattener berechnet in einem Durchlauf alle aktuell möglichen
//! Blätter plus das Flag `end_reachable`. `advance` wiederholt denselben
//! Durchlauf und wendet die Transition am ersten passenden Blatt an; es muss
//! nie suchen oder zurücksetzen.

use crate::qname::QName;
use crate::schema::{Compositor, ElementId, MaxOccurs, ParticleId, ParticleTerm, Schema, WildcardConstraint};
use crate::FastHashSet;

// ============================================================================
// Templates
// ============================================================================

/// Art eines Blatts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    /// Element-Term: Kopf plus Substitution Group, ohne abstrakte
    /// Deklarationen, sortiert nach local-name, dann uri.
    Element(Vec<(QName, ElementId)>),
    Wildcard(WildcardConstraint),
}

/// Element- oder Wildcard-Term mit seiner Schema-Reihenfolge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafGrammar {
    pub order: u32,
    pub kind: LeafKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermGrammar {
    Leaf(LeafGrammar),
    Group(GroupGrammar),
}

/// Strukturelle Gruppe; enthält keinen Fortschritt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupGrammar {
    Sequence { particles: Vec<ParticleGrammar> },
    Choice { branches: Vec<ParticleGrammar> },
    All { particles: Vec<ParticleGrammar> },
}

/// Kompiliertes Particle: Vorkommensbereich plus Term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleGrammar {
    pub particle: ParticleId,
    pub min: u32,
    pub max: MaxOccurs,
    pub term: TermGrammar,
    /// Term kann leer abgeleitet werden.
    term_nullable: bool,
}

// ============================================================================
// Fortschritt (gehört dem Cursor)
// ============================================================================

/// Fortschritt innerhalb eines Particles.
///
/// `count` zählt begonnene Vorkommen; bei `maxOccurs = unbounded` wird auf
/// `minOccurs` gekappt, damit die Zustandsmenge endlich bleibt. `inner` ist
/// gesetzt, solange ein Vorkommen eines Gruppen-Terms noch weitere Blätter
/// aufnehmen kann.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParticleProgress {
    count: u32,
    inner: Option<Box<GroupProgress>>,
}

impl ParticleProgress {
    /// Noch nichts verbraucht.
    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Fortschritt innerhalb eines begonnenen Gruppen-Vorkommens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupProgress {
    Sequence { position: usize, child: ParticleProgress },
    Choice { branch: usize, child: ParticleProgress },
    /// Verbrauchte Vorkommen pro Particle (bei `maxOccurs=1` ein Bitset).
    All { consumed: Vec<u32> },
}

/// Ergebnis des Flatteners für einen Zustand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates<'a> {
    /// Blätter in Schema-Reihenfolge, jedes höchstens einmal.
    pub leaves: Vec<&'a LeafGrammar>,
    /// Die restlichen Particles können leer bleiben.
    pub end_reachable: bool,
}

// ============================================================================
// ContentModel
// ============================================================================

/// Template eines Content Models, gecacht pro (Particle, Optionen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentModel {
    root: ParticleGrammar,
    leaf_count: u32,
}

impl ContentModel {
    /// Kompiliert den Particle-Baum ab `particle`.
    ///
    /// Das Schema ist bereits validiert (keine zyklischen Model Groups),
    /// daher terminiert die Rekursion.
    pub fn compile(schema: &Schema, particle: ParticleId) -> Self {
        let mut order = 0;
        let root = compile_particle(schema, particle, &mut order);
        Self { root, leaf_count: order }
    }

    pub fn root(&self) -> &ParticleGrammar {
        &self.root
    }

    /// Anzahl der Blätter (Element- und Wildcard-Terme).
    pub fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    /// Alle Blätter, die im Zustand `progress` als nächstes folgen können.
    pub fn candidates(&self, progress: &ParticleProgress) -> Candidates<'_> {
        let mut leaves = Vec::new();
        let end_reachable = self.root.collect(progress, &mut leaves);
        leaves.sort_by_key(|leaf| leaf.order);
        leaves.dedup_by_key(|leaf| leaf.order);
        Candidates { leaves, end_reachable }
    }

    /// Transition über das Blatt mit Schema-Reihenfolge `leaf`.
    ///
    /// `None` wenn das Blatt im Zustand kein Kandidat ist.
    pub fn advance(&self, progress: &ParticleProgress, leaf: u32) -> Option<ParticleProgress> {
        self.root.advance(progress, leaf)
    }

    /// Das Content Model kann im Zustand `progress` enden.
    pub fn can_end(&self, progress: &ParticleProgress) -> bool {
        self.root.can_end(progress)
    }
}

fn compile_particle(schema: &Schema, id: ParticleId, order: &mut u32) -> ParticleGrammar {
    let particle = schema.particle(id);
    let term = match &particle.term {
        ParticleTerm::Element(element) => {
            let leaf = LeafGrammar { order: *order, kind: LeafKind::Element(element_members(schema, *element)) };
            *order += 1;
            TermGrammar::Leaf(leaf)
        }
        ParticleTerm::Wildcard(constraint) => {
            let leaf = LeafGrammar { order: *order, kind: LeafKind::Wildcard(constraint.clone()) };
            *order += 1;
            TermGrammar::Leaf(leaf)
        }
        ParticleTerm::Group(group) => {
            let children: Vec<ParticleGrammar> =
                group.particles.iter().map(|&child| compile_particle(schema, child, order)).collect();
            TermGrammar::Group(match group.compositor {
                Compositor::Sequence => GroupGrammar::Sequence { particles: children },
                Compositor::Choice => GroupGrammar::Choice { branches: children },
                Compositor::All => GroupGrammar::All { particles: children },
            })
        }
    };
    let term_nullable = match &term {
        TermGrammar::Leaf(_) => false,
        TermGrammar::Group(group) => group.nullable(),
    };
    ParticleGrammar {
        particle: id,
        min: particle.min_occurs,
        max: particle.max_occurs,
        term,
        term_nullable,
    }
}

/// Kopf-Element plus (transitive) Substitution Group, ohne abstrakte
/// Deklarationen (EXI 8.5.4.1.6).
fn element_members(schema: &Schema, head: ElementId) -> Vec<(QName, ElementId)> {
    let mut pending = vec![head];
    let mut seen = FastHashSet::default();
    while let Some(id) = pending.pop() {
        if seen.insert(id) {
            pending.extend(schema.element(id).substitution_group.iter().copied());
        }
    }
    let mut members: Vec<(QName, ElementId)> = seen
        .into_iter()
        .filter(|&id| !schema.element(id).is_abstract)
        .map(|id| (schema.element(id).name.clone(), id))
        .collect();
    // Namen sind eindeutig (SchemaBuilder::build)
    members.sort();
    members
}

// ============================================================================
// Flattener
// ============================================================================

impl ParticleGrammar {
    /// Particle kann ohne weiteres Blatt abgeschlossen werden (frischer Zustand).
    pub fn nullable(&self) -> bool {
        self.min == 0 || self.term_nullable
    }

    fn clamp(&self, count: u32) -> u32 {
        match self.max {
            MaxOccurs::Unbounded => count.min(self.min),
            MaxOccurs::Bounded(_) => count,
        }
    }

    fn progress(&self, count: u32, inner: Option<GroupProgress>) -> ParticleProgress {
        let inner = match (&self.term, inner) {
            (TermGrammar::Group(group), Some(inner)) if !group.is_exhausted(&inner) => Some(Box::new(inner)),
            _ => None,
        };
        ParticleProgress { count: self.clamp(count), inner }
    }

    /// Sammelt Kandidaten; Rückgabe: Particle kann hier enden.
    fn collect<'a>(&'a self, progress: &ParticleProgress, out: &mut Vec<&'a LeafGrammar>) -> bool {
        if let (TermGrammar::Group(group), Some(inner)) = (&self.term, &progress.inner) {
            if !group.collect(inner, out) {
                return false;
            }
        }
        self.collect_boundary(progress.count, out)
    }

    /// Zustand zwischen zwei Vorkommen, `count` Vorkommen sind begonnen.
    fn collect_boundary<'a>(&'a self, count: u32, out: &mut Vec<&'a LeafGrammar>) -> bool {
        if self.max.allows_more(count) {
            match &self.term {
                TermGrammar::Leaf(leaf) => out.push(leaf),
                TermGrammar::Group(group) => {
                    group.collect_initial(out);
                }
            }
        }
        count >= self.min || self.term_nullable
    }

    fn can_end(&self, progress: &ParticleProgress) -> bool {
        if let (TermGrammar::Group(group), Some(inner)) = (&self.term, &progress.inner) {
            if !group.can_end(inner) {
                return false;
            }
        }
        progress.count >= self.min || self.term_nullable
    }

    fn advance(&self, progress: &ParticleProgress, leaf: u32) -> Option<ParticleProgress> {
        if let (TermGrammar::Group(group), Some(inner)) = (&self.term, &progress.inner) {
            if let Some(next) = group.advance(inner, leaf) {
                return Some(self.progress(progress.count, Some(next)));
            }
            if !group.can_end(inner) {
                return None;
            }
        }
        self.advance_boundary(progress.count, leaf)
    }

    /// Beginnt ein neues Vorkommen mit dem Blatt `leaf`.
    fn advance_boundary(&self, count: u32, leaf: u32) -> Option<ParticleProgress> {
        if !self.max.allows_more(count) {
            return None;
        }
        match &self.term {
            TermGrammar::Leaf(l) => (l.order == leaf).then(|| self.progress(count + 1, None)),
            TermGrammar::Group(group) => group
                .advance_initial(leaf)
                .map(|inner| self.progress(count + 1, Some(inner))),
        }
    }
}

impl GroupGrammar {
    fn nullable(&self) -> bool {
        match self {
            Self::Sequence { particles } | Self::All { particles } => particles.iter().all(ParticleGrammar::nullable),
            Self::Choice { branches } => branches.iter().any(ParticleGrammar::nullable),
        }
    }

    fn collect<'a>(&'a self, progress: &GroupProgress, out: &mut Vec<&'a LeafGrammar>) -> bool {
        match (self, progress) {
            (Self::Sequence { particles }, GroupProgress::Sequence { position, child }) => {
                particles[*position].collect(child, out) && collect_tail(&particles[*position + 1..], out)
            }
            (Self::Choice { branches }, GroupProgress::Choice { branch, child }) => branches[*branch].collect(child, out),
            (Self::All { particles }, GroupProgress::All { consumed }) => {
                let mut end = true;
                for (particle, &count) in particles.iter().zip(consumed) {
                    end &= particle.collect_boundary(count, out);
                }
                end
            }
            _ => unreachable!("group progress does not match group structure"),
        }
    }

    fn collect_initial<'a>(&'a self, out: &mut Vec<&'a LeafGrammar>) -> bool {
        match self {
            Self::Sequence { particles } => collect_tail(particles, out),
            Self::Choice { branches } => {
                let mut end = false;
                for branch in branches {
                    end |= branch.collect_boundary(0, out);
                }
                end
            }
            Self::All { particles } => {
                let mut end = true;
                for particle in particles {
                    end &= particle.collect_boundary(0, out);
                }
                end
            }
        }
    }

    fn can_end(&self, progress: &GroupProgress) -> bool {
        match (self, progress) {
            (Self::Sequence { particles }, GroupProgress::Sequence { position, child }) => {
                particles[*position].can_end(child) && particles[*position + 1..].iter().all(ParticleGrammar::nullable)
            }
            (Self::Choice { branches }, GroupProgress::Choice { branch, child }) => branches[*branch].can_end(child),
            (Self::All { particles }, GroupProgress::All { consumed }) => particles
                .iter()
                .zip(consumed)
                .all(|(p, &count)| count >= p.min || p.term_nullable),
            _ => unreachable!("group progress does not match group structure"),
        }
    }

    /// Vorkommen kann enden und kein Blatt mehr aufnehmen.
    fn is_exhausted(&self, progress: &GroupProgress) -> bool {
        let mut scratch = Vec::new();
        self.collect(progress, &mut scratch) && scratch.is_empty()
    }

    fn advance(&self, progress: &GroupProgress, leaf: u32) -> Option<GroupProgress> {
        match (self, progress) {
            (Self::Sequence { particles }, GroupProgress::Sequence { position, child }) => {
                let current = &particles[*position];
                if let Some(child) = current.advance(child, leaf) {
                    return Some(GroupProgress::Sequence { position: *position, child });
                }
                if !current.can_end(child) {
                    return None;
                }
                advance_tail(particles, *position + 1, leaf)
            }
            (Self::Choice { branches }, GroupProgress::Choice { branch, child }) => branches[*branch]
                .advance(child, leaf)
                .map(|child| GroupProgress::Choice { branch: *branch, child }),
            (Self::All { particles }, GroupProgress::All { consumed }) => advance_all(particles, consumed, leaf),
            _ => unreachable!("group progress does not match group structure"),
        }
    }

    fn advance_initial(&self, leaf: u32) -> Option<GroupProgress> {
        match self {
            Self::Sequence { particles } => advance_tail(particles, 0, leaf),
            Self::Choice { branches } => branches.iter().enumerate().find_map(|(branch, particle)| {
                particle
                    .advance_boundary(0, leaf)
                    .map(|child| GroupProgress::Choice { branch, child })
            }),
            Self::All { particles } => advance_all(particles, &vec![0; particles.len()], leaf),
        }
    }
}

/// Sequenz-Rest ab einer Grenze: Kandidaten bis zum ersten Pflicht-Particle.
fn collect_tail<'a>(particles: &'a [ParticleGrammar], out: &mut Vec<&'a LeafGrammar>) -> bool {
    for particle in particles {
        if !particle.collect_boundary(0, out) {
            return false;
        }
    }
    true
}

fn advance_tail(particles: &[ParticleGrammar], from: usize, leaf: u32) -> Option<GroupProgress> {
    for (position, particle) in particles.iter().enumerate().skip(from) {
        if let Some(child) = particle.advance_boundary(0, leaf) {
            return Some(GroupProgress::Sequence { position, child });
        }
        if !particle.nullable() {
            return None;
        }
    }
    None
}

fn advance_all(particles: &[ParticleGrammar], consumed: &[u32], leaf: u32) -> Option<GroupProgress> {
    particles.iter().enumerate().find_map(|(i, particle)| {
        particle.advance_boundary(consumed[i], leaf).map(|next| {
            let mut consumed = consumed.to_vec();
            consumed[i] = next.count;
            GroupProgress::All { consumed }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ContentType, ElementDeclaration, Particle, SchemaBuilder, TypeDefinition};
    use std::sync::Arc;

    /// Hilfsschema: Elemente nach Namen, Content Model über Closure.
    struct Fixture {
        model: ContentModel,
    }

    fn leaf_names(model: &ContentModel, progress: &ParticleProgress) -> (Vec<String>, bool) {
        let c = model.candidates(progress);
        let names = c
            .leaves
            .iter()
            .flat_map(|leaf| match &leaf.kind {
                LeafKind::Element(members) => members.iter().map(|(q, _)| q.to_string()).collect::<Vec<_>>(),
                LeafKind::Wildcard(WildcardConstraint::Namespaces(list)) => {
                    list.iter().map(|ns| format!("{ns}:*")).collect()
                }
                LeafKind::Wildcard(_) => vec!["*".to_string()],
            })
            .collect();
        (names, c.end_reachable)
    }

    impl Fixture {
        fn new(build: impl FnOnce(&mut SchemaBuilder, &dyn Fn(&mut SchemaBuilder, &str) -> ElementId) -> ParticleId) -> Self {
            let mut b = SchemaBuilder::new();
            let t = b.add_type(TypeDefinition::simple(None));
            let element = move |b: &mut SchemaBuilder, name: &str| b.add_element(ElementDeclaration::new(QName::new("", name), t));
            let root = build(&mut b, &element);
            b.add_type(TypeDefinition::complex(None, ContentType::ElementOnly(root)));
            let schema = b.build().unwrap();
            let model = ContentModel::compile(&schema, root);
            Self { model }
        }

        fn leaf_of(&self, name: &str) -> u32 {
            fn find(p: &ParticleGrammar, name: &str) -> Option<u32> {
                match &p.term {
                    TermGrammar::Leaf(LeafGrammar { order, kind: LeafKind::Element(m) }) => {
                        m.iter().any(|(q, _)| &*q.local_name == name).then_some(*order)
                    }
                    TermGrammar::Leaf(_) => None,
                    TermGrammar::Group(GroupGrammar::Sequence { particles } | GroupGrammar::All { particles })
                    | TermGrammar::Group(GroupGrammar::Choice { branches: particles }) => {
                        particles.iter().find_map(|c| find(c, name))
                    }
                }
            }
            find(self.model.root(), name).unwrap()
        }

        fn walk(&self, names: &[&str]) -> ParticleProgress {
            let mut progress = ParticleProgress::fresh();
            for name in names {
                progress = self.model.advance(&progress, self.leaf_of(name)).unwrap_or_else(|| panic!("{name} rejected"));
            }
            progress
        }

        fn next(&self, names: &[&str]) -> (Vec<String>, bool) {
            leaf_names(&self.model, &self.walk(names))
        }
    }

    fn p(b: &mut SchemaBuilder, min: u32, max: MaxOccurs, term: ParticleTerm) -> ParticleId {
        b.add_particle(Particle::new(min, max, term).unwrap())
    }

    use MaxOccurs::{Bounded, Unbounded};

    /// Optionale führende Particles werden übersprungen, Pflicht-Particles stoppen.
    #[test]
    fn sequence_ueberspringt_optionale() {
        let f = Fixture::new(|b, el| {
            let a = el(b, "a");
            let x = el(b, "b");
            let c = el(b, "c");
            let pa = p(b, 0, Bounded(1), ParticleTerm::Element(a));
            let pb = p(b, 1, Bounded(1), ParticleTerm::Element(x));
            let pc = p(b, 0, Bounded(1), ParticleTerm::Element(c));
            p(b, 1, Bounded(1), ParticleTerm::sequence(vec![pa, pb, pc]))
        });
        assert_eq!(f.next(&[]), (vec!["a".into(), "b".into()], false));
        assert_eq!(f.next(&["a"]), (vec!["b".into()], false));
        assert_eq!(f.next(&["b"]), (vec!["c".into()], true));
        assert_eq!(f.next(&["a", "b", "c"]), (vec![], true));
        // c vor b ist nicht erlaubt
        assert!(f.model.advance(&f.walk(&["a"]), f.leaf_of("c")).is_none());
    }

    /// maxOccurs begrenzt Wiederholungen; unbounded bietet immer "nochmal" und "weiter".
    #[test]
    fn wiederholungen() {
        let f = Fixture::new(|b, el| {
            let a = el(b, "a");
            let x = el(b, "b");
            let pa = p(b, 1, Bounded(2), ParticleTerm::Element(a));
            let pb = p(b, 0, Unbounded, ParticleTerm::Element(x));
            p(b, 1, Bounded(1), ParticleTerm::sequence(vec![pa, pb]))
        });
        assert_eq!(f.next(&["a"]), (vec!["a".into(), "b".into()], true));
        assert_eq!(f.next(&["a", "a"]), (vec!["b".into()], true));
        assert!(f.model.advance(&f.walk(&["a", "a"]), f.leaf_of("a")).is_none());
        assert_eq!(f.next(&["a", "b", "b", "b"]), (vec!["b".into()], true));
        // Zähler bei unbounded gekappt: Zustände nach 2 und 3 b sind gleich
        assert_eq!(f.walk(&["a", "b", "b"]), f.walk(&["a", "b", "b", "b"]));
    }

    /// Choice: Vereinigung der Zweige, danach ist der Zweig festgelegt.
    #[test]
    fn choice_legt_zweig_fest() {
        let f = Fixture::new(|b, el| {
            let a = el(b, "a");
            let x = el(b, "b");
            let c = el(b, "c");
            let pa = p(b, 1, Bounded(1), ParticleTerm::Element(a));
            let pc = p(b, 1, Bounded(1), ParticleTerm::Element(c));
            let seq = p(b, 1, Bounded(1), ParticleTerm::sequence(vec![pa, pc]));
            let pb = p(b, 1, Bounded(1), ParticleTerm::Element(x));
            p(b, 1, Bounded(1), ParticleTerm::choice(vec![seq, pb]))
        });
        assert_eq!(f.next(&[]), (vec!["a".into(), "b".into()], false));
        assert_eq!(f.next(&["a"]), (vec!["c".into()], false));
        assert_eq!(f.next(&["b"]), (vec![], true));
        assert!(f.model.advance(&f.walk(&["b"]), f.leaf_of("a")).is_none());
    }

    /// Wiederholte Gruppe: nach einem vollständigen Vorkommen beginnt ein neues,
    /// Kandidaten stehen trotzdem in Schema-Reihenfolge.
    #[test]
    fn wiederholte_gruppe_schema_reihenfolge() {
        let f = Fixture::new(|b, el| {
            let a = el(b, "a");
            let x = el(b, "b");
            let pa = p(b, 1, Bounded(1), ParticleTerm::Element(a));
            let pb = p(b, 0, Bounded(1), ParticleTerm::Element(x));
            p(b, 1, Unbounded, ParticleTerm::sequence(vec![pa, pb]))
        });
        assert_eq!(f.next(&["a"]), (vec!["a".into(), "b".into()], true));
        assert_eq!(f.next(&["a", "b"]), (vec!["a".into()], true));
        assert_eq!(f.next(&["a", "b", "a"]), (vec!["a".into(), "b".into()], true));
    }

    /// {AB, AC(0..2), AD(0..1)}: Sequence und All liefern nach teilweisem
    /// Verbrauch unterschiedliche Kandidaten.
    #[test]
    fn sequence_vs_all() {
        let make = |all: bool| {
            Fixture::new(move |b, el| {
                let ab = el(b, "AB");
                let ac = el(b, "AC");
                let ad = el(b, "AD");
                let p_ab = p(b, 1, Bounded(1), ParticleTerm::Element(ab));
                let p_ac = p(b, 0, Bounded(2), ParticleTerm::Element(ac));
                let p_ad = p(b, 0, Bounded(1), ParticleTerm::Element(ad));
                let children = vec![p_ab, p_ac, p_ad];
                let term = if all { ParticleTerm::all(children) } else { ParticleTerm::sequence(children) };
                p(b, 1, Bounded(1), term)
            })
        };
        let seq = make(false);
        let all = make(true);

        assert_eq!(seq.next(&[]), (vec!["AB".into()], false));
        assert_eq!(all.next(&[]), (vec!["AB".into(), "AC".into(), "AD".into()], false));

        assert_eq!(seq.next(&["AB", "AC"]), (vec!["AC".into(), "AD".into()], true));
        assert_eq!(all.next(&["AB", "AC"]), (vec!["AC".into(), "AD".into()], true));

        // Nach AD: Sequence ist erschöpft, All bietet AC noch an
        assert_eq!(seq.next(&["AB", "AD"]), (vec![], true));
        assert_eq!(all.next(&["AB", "AD"]), (vec!["AC".into()], true));

        // All akzeptiert jede Permutation; Ende erst nach dem Pflicht-Particle
        assert_eq!(all.next(&["AD", "AC"]), (vec!["AB".into(), "AC".into()], false));
        assert_eq!(all.next(&["AD", "AC", "AB"]), (vec!["AC".into()], true));
        assert!(all.model.advance(&all.walk(&["AD"]), all.leaf_of("AD")).is_none());
        assert!(seq.model.advance(&seq.walk(&["AB"]), seq.leaf_of("AB")).is_none());
    }

    /// Wildcard mit Namespace-Liste liefert je Namespace einen Kandidaten;
    /// ##other wird nach Verbrauch nicht erneut angeboten.
    #[test]
    fn wildcard_namespace_union() {
        let f = Fixture::new(|b, _| {
            let other = p(b, 1, Bounded(1), ParticleTerm::Wildcard(WildcardConstraint::Not(Some(Arc::from("urn:t")))));
            let list = p(
                b,
                1,
                Bounded(1),
                ParticleTerm::Wildcard(WildcardConstraint::Namespaces(vec![Arc::from("urn:t"), Arc::from("")])),
            );
            p(b, 1, Bounded(1), ParticleTerm::sequence(vec![other, list]))
        });
        assert_eq!(f.next(&[]), (vec!["*".into()], false));
        let after = f.model.advance(&ParticleProgress::fresh(), 0).unwrap();
        assert_eq!(leaf_names(&f.model, &after), (vec!["urn:t:*".into(), ":*".into()], false));
        let done = f.model.advance(&after, 1).unwrap();
        assert_eq!(leaf_names(&f.model, &done), (vec![], true));
    }

    /// Leere Sequenz und optionale Gruppe: Ende sofort erreichbar.
    #[test]
    fn leere_und_optionale_gruppen() {
        let f = Fixture::new(|b, _| p(b, 1, Bounded(1), ParticleTerm::sequence(vec![])));
        assert_eq!(f.next(&[]), (vec![], true));

        let f = Fixture::new(|b, el| {
            let a = el(b, "a");
            let pa = p(b, 1, Bounded(1), ParticleTerm::Element(a));
            let inner = p(b, 0, Bounded(1), ParticleTerm::sequence(vec![pa]));
            p(b, 1, Bounded(1), ParticleTerm::sequence(vec![inner]))
        });
        assert_eq!(f.next(&[]), (vec!["a".into()], true));
        assert_eq!(f.model.leaf_count(), 1);
    }

    /// Substitution Groups: Mitglieder sortiert, abstrakte Köpfe ausgelassen.
    #[test]
    fn substitution_group_members() {
        let mut b = SchemaBuilder::new();
        let t = b.add_type(TypeDefinition::simple(None));
        let z = b.add_element(ElementDeclaration::new(QName::new("", "zebra"), t));
        let a = b.add_element(ElementDeclaration::new(QName::new("", "ant"), t));
        let head = b.add_element(
            ElementDeclaration::new(QName::new("", "animal"), t).with_abstract().with_substitute(z).with_substitute(a),
        );
        let root = b.add_particle(Particle::once(ParticleTerm::Element(head)));
        let schema = b.build().unwrap();
        let model = ContentModel::compile(&schema, root);
        match &model.root().term {
            TermGrammar::Leaf(LeafGrammar { kind: LeafKind::Element(members), .. }) => {
                let names: Vec<&str> = members.iter().map(|(q, _)| &*q.local_name).collect();
                assert_eq!(names, ["ant", "zebra"]);
            }
            other => panic!("unexpected term {other:?}"),
        }
    }
}
