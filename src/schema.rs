//! Abstraktes Schema-Modell (EXI 8.5, XML Schema Part 1 Komponenten).
//!
//! Das Modell ist eine Arena: Typen, Element-Deklarationen und Particles
//! liegen in Vektoren und werden über [`TypeId`], [`ElementId`] und
//! [`ParticleId`] adressiert. Rekursive Typen (ein Typ dessen Content Model
//! ein Element desselben Typs enthält) sind damit gewöhnliche Index-Zyklen;
//! die Grammatiken lösen sie lazy über den Cache auf statt sie strukturell
//! zu expandieren.
//!
//! Der Kern liest das Modell nur. Aufgebaut wird es über [`SchemaBuilder`],
//! dessen [`build`](SchemaBuilder::build) alle strukturellen Invarianten
//! einmalig prüft (Konstruktionsfehler sind fatal, EXI 8.5.4.1).
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::qname::QName;
//! use exi_grammar::schema::*;
//!
//! let mut b = SchemaBuilder::new();
//! let string = b.add_type(TypeDefinition::simple(Some(QName::xsd("string"))));
//! let a = b.add_element(ElementDeclaration::new(QName::new("", "a"), string));
//! let many_a = b.add_particle(Particle::zero_or_more(ParticleTerm::Element(a)));
//! let seq = b.add_particle(Particle::once(ParticleTerm::sequence(vec![many_a])));
//! let root_type = b.add_type(TypeDefinition::complex(None, ContentType::ElementOnly(seq)));
//! b.add_global_element(ElementDeclaration::new(QName::new("", "root"), root_type));
//! let schema = b.build().unwrap();
//! assert_eq!(schema.global_elements().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::qname::QName;
use crate::{Error, FastHashMap, FastHashSet, FastIndexMap, Result};

// ============================================================================
// Handles
// ============================================================================

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Index in die Arena.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

arena_handle!(
    /// Handle auf eine Typdefinition.
    TypeId, "type"
);
arena_handle!(
    /// Handle auf eine Element-Deklaration.
    ElementId, "element"
);
arena_handle!(
    /// Handle auf ein Particle.
    ParticleId, "particle"
);

fn to_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

// ============================================================================
// Typdefinitionen
// ============================================================================

/// Derivation method of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationKind {
    Extension,
    Restriction,
}

/// Variety of a simple type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimpleTypeVariety {
    #[default]
    Atomic,
    List,
    Union,
}

/// Namespace constraint of a wildcard (EXI 8.5.4.1.6, 8.5.4.1.7).
///
/// Der leere String steht für "absent" (`##local`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WildcardConstraint {
    /// `##any`
    Any,
    /// `##other` relativ zu einem Namespace (`None` = absent).
    Not(Option<Arc<str>>),
    /// Explizite Liste (`##targetNamespace ##local urn:x ...`).
    Namespaces(Vec<Arc<str>>),
}

impl WildcardConstraint {
    /// Prüft ob ein Namespace URI vom Constraint erlaubt wird.
    ///
    /// `Not(x)` schliesst `x` und den absent Namespace aus (XML Schema 1.0).
    pub fn allows(&self, uri: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Not(excluded) => {
                !uri.is_empty() && excluded.as_deref().map_or(true, |ex| ex != uri)
            }
            Self::Namespaces(list) => list.iter().any(|ns| &**ns == uri),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Namespaces(list) if list.is_empty() => Err(Error::EmptyNamespaceList),
            _ => Ok(()),
        }
    }
}

/// Content type of a complex type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Empty,
    /// Simple content: character data typed by the (simple) content type.
    Simple,
    ElementOnly(ParticleId),
    Mixed(ParticleId),
}

/// An attribute use of a complex type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    pub name: QName,
    pub required: bool,
    /// Typ des Attributwerts (nur informativ, der Kern prüft keine Werte).
    pub type_id: Option<TypeId>,
}

impl AttributeUse {
    pub fn required(name: QName) -> Self {
        Self { name, required: true, type_id: None }
    }

    pub fn optional(name: QName) -> Self {
        Self { name, required: false, type_id: None }
    }

    /// Builder: Setzt den Werttyp.
    pub fn with_type(mut self, type_id: TypeId) -> Self {
        self.type_id = Some(type_id);
        self
    }
}

/// Simple type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleType {
    pub name: Option<QName>,
    pub base: Option<TypeId>,
    pub variety: SimpleTypeVariety,
    has_named_sub_types: bool,
}

/// Complex type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    pub name: Option<QName>,
    pub base: Option<(TypeId, DerivationKind)>,
    pub attributes: Vec<AttributeUse>,
    pub attribute_wildcard: Option<WildcardConstraint>,
    pub content: ContentType,
    has_named_sub_types: bool,
}

/// A type definition: simple or complex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefinition {
    Simple(SimpleType),
    Complex(ComplexType),
}

impl TypeDefinition {
    /// Neuer atomarer Simple Type ohne Basis.
    pub fn simple(name: Option<QName>) -> Self {
        Self::Simple(SimpleType {
            name,
            base: None,
            variety: SimpleTypeVariety::Atomic,
            has_named_sub_types: false,
        })
    }

    /// Neuer Complex Type ohne Attribute und ohne Basis.
    pub fn complex(name: Option<QName>, content: ContentType) -> Self {
        Self::Complex(ComplexType {
            name,
            base: None,
            attributes: Vec::new(),
            attribute_wildcard: None,
            content,
            has_named_sub_types: false,
        })
    }

    /// Builder: Setzt die Varietät (nur Simple Types).
    pub fn with_variety(mut self, variety: SimpleTypeVariety) -> Self {
        if let Self::Simple(s) = &mut self {
            s.variety = variety;
        }
        self
    }

    /// Builder: Setzt die Basis. Bei Simple Types wird `derivation` ignoriert
    /// (immer Restriction).
    pub fn with_base(mut self, base: TypeId, derivation: DerivationKind) -> Self {
        match &mut self {
            Self::Simple(s) => s.base = Some(base),
            Self::Complex(c) => c.base = Some((base, derivation)),
        }
        self
    }

    /// Builder: Fügt eine Attribute Use hinzu (nur Complex Types).
    pub fn with_attribute(mut self, attribute: AttributeUse) -> Self {
        if let Self::Complex(c) = &mut self {
            c.attributes.push(attribute);
        }
        self
    }

    /// Builder: Setzt die Attribute Wildcard (nur Complex Types).
    pub fn with_attribute_wildcard(mut self, wildcard: WildcardConstraint) -> Self {
        if let Self::Complex(c) = &mut self {
            c.attribute_wildcard = Some(wildcard);
        }
        self
    }

    pub fn name(&self) -> Option<&QName> {
        match self {
            Self::Simple(s) => s.name.as_ref(),
            Self::Complex(c) => c.name.as_ref(),
        }
    }

    pub fn base(&self) -> Option<TypeId> {
        match self {
            Self::Simple(s) => s.base,
            Self::Complex(c) => c.base.map(|(b, _)| b),
        }
    }

    /// Attribute Uses; leer für Simple Types.
    pub fn attributes(&self) -> &[AttributeUse] {
        match self {
            Self::Simple(_) => &[],
            Self::Complex(c) => &c.attributes,
        }
    }

    pub fn attribute_wildcard(&self) -> Option<&WildcardConstraint> {
        match self {
            Self::Simple(_) => None,
            Self::Complex(c) => c.attribute_wildcard.as_ref(),
        }
    }

    /// Content Type; Simple Types haben [`ContentType::Simple`].
    pub fn content(&self) -> ContentType {
        match self {
            Self::Simple(_) => ContentType::Simple,
            Self::Complex(c) => c.content,
        }
    }

    /// Ob ein benannter Typ existiert, der von diesem Typ abgeleitet ist.
    ///
    /// Wird vom [`SchemaBuilder`] berechnet.
    pub fn has_named_sub_types(&self) -> bool {
        match self {
            Self::Simple(s) => s.has_named_sub_types,
            Self::Complex(c) => c.has_named_sub_types,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, Self::Simple(SimpleType { variety: SimpleTypeVariety::Union, .. }))
    }

    /// Typen für die xsi:type im strict mode eine deklarierte Production hat
    /// (EXI 8.5.4.4.2).
    pub fn accepts_xsi_type(&self) -> bool {
        self.has_named_sub_types() || self.is_union()
    }

    fn set_has_named_sub_types(&mut self) {
        match self {
            Self::Simple(s) => s.has_named_sub_types = true,
            Self::Complex(c) => c.has_named_sub_types = true,
        }
    }
}

// ============================================================================
// Elemente und Particles
// ============================================================================

/// An element declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDeclaration {
    pub name: QName,
    pub type_id: TypeId,
    pub nillable: bool,
    pub is_abstract: bool,
    /// Mitglieder der Substitution Group (ohne das Kopf-Element selbst).
    pub substitution_group: Vec<ElementId>,
}

impl ElementDeclaration {
    pub fn new(name: QName, type_id: TypeId) -> Self {
        Self {
            name,
            type_id,
            nillable: false,
            is_abstract: false,
            substitution_group: Vec::new(),
        }
    }

    /// Builder: Setzt nillable.
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Builder: Markiert die Deklaration als abstract (kein eigenes SE).
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Builder: Fügt ein Mitglied der Substitution Group hinzu.
    pub fn with_substitute(mut self, member: ElementId) -> Self {
        self.substitution_group.push(member);
        self
    }
}

/// Upper bound of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    /// `true` wenn `count` Vorkommen noch ein weiteres erlauben.
    #[inline]
    pub fn allows_more(self, count: u32) -> bool {
        match self {
            Self::Bounded(max) => count < max,
            Self::Unbounded => true,
        }
    }
}

/// Compositor of a model group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compositor {
    Sequence,
    Choice,
    All,
}

/// A model group: compositor plus ordered child particles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelGroup {
    pub compositor: Compositor,
    pub particles: Vec<ParticleId>,
}

/// Term of a particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleTerm {
    Element(ElementId),
    Wildcard(WildcardConstraint),
    Group(ModelGroup),
}

impl ParticleTerm {
    pub fn sequence(particles: Vec<ParticleId>) -> Self {
        Self::Group(ModelGroup { compositor: Compositor::Sequence, particles })
    }

    pub fn choice(particles: Vec<ParticleId>) -> Self {
        Self::Group(ModelGroup { compositor: Compositor::Choice, particles })
    }

    pub fn all(particles: Vec<ParticleId>) -> Self {
        Self::Group(ModelGroup { compositor: Compositor::All, particles })
    }
}

/// A particle: occurrence range plus term (EXI 8.5.4.1.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub term: ParticleTerm,
}

impl Particle {
    /// Erstellt ein neues Particle mit Validierung.
    ///
    /// # Fehler
    ///
    /// - `Error::InvalidParticleOccurs` wenn max < min
    pub fn new(min_occurs: u32, max_occurs: MaxOccurs, term: ParticleTerm) -> Result<Self> {
        let p = Self { min_occurs, max_occurs, term };
        p.validate()?;
        Ok(p)
    }

    /// Erstellt ein Particle mit min=max=1 (genau einmal).
    pub fn once(term: ParticleTerm) -> Self {
        Self { min_occurs: 1, max_occurs: MaxOccurs::Bounded(1), term }
    }

    /// Erstellt ein optionales Particle (min=0, max=1).
    pub fn optional(term: ParticleTerm) -> Self {
        Self { min_occurs: 0, max_occurs: MaxOccurs::Bounded(1), term }
    }

    /// Erstellt ein Particle mit min=0, max=unbounded (beliebig oft).
    pub fn zero_or_more(term: ParticleTerm) -> Self {
        Self { min_occurs: 0, max_occurs: MaxOccurs::Unbounded, term }
    }

    /// Erstellt ein Particle mit min=1, max=unbounded (mindestens einmal).
    pub fn one_or_more(term: ParticleTerm) -> Self {
        Self { min_occurs: 1, max_occurs: MaxOccurs::Unbounded, term }
    }

    /// Validiert Particle Constraints.
    pub fn validate(&self) -> Result<()> {
        match self.max_occurs {
            MaxOccurs::Bounded(max) if max < self.min_occurs => Err(Error::InvalidParticleOccurs {
                min: self.min_occurs,
                max,
            }),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// Read-only schema model shared by all grammars.
#[derive(Debug)]
pub struct Schema {
    types: Vec<TypeDefinition>,
    elements: Vec<ElementDeclaration>,
    particles: Vec<Particle>,
    /// Globale Elemente, sortiert nach local-name, dann uri (EXI 8.5.1).
    global_elements: Vec<ElementId>,
    global_element_names: FastHashMap<QName, ElementId>,
    type_names: FastIndexMap<QName, TypeId>,
    any_type: TypeId,
    any_simple_type: TypeId,
}

impl Schema {
    /// Typdefinition zu einem Handle dieses Schemas.
    ///
    /// # Panics
    ///
    /// Wenn das Handle aus einem anderen Schema stammt.
    pub fn type_definition(&self, id: TypeId) -> &TypeDefinition {
        &self.types[id.index()]
    }

    /// Element-Deklaration zu einem Handle dieses Schemas.
    pub fn element(&self, id: ElementId) -> &ElementDeclaration {
        &self.elements[id.index()]
    }

    /// Particle zu einem Handle dieses Schemas.
    pub fn particle(&self, id: ParticleId) -> &Particle {
        &self.particles[id.index()]
    }

    pub fn global_elements(&self) -> &[ElementId] {
        &self.global_elements
    }

    pub fn global_element(&self, name: &QName) -> Option<ElementId> {
        self.global_element_names.get(name).copied()
    }

    /// Benannter Typ (für xsi:type).
    pub fn type_by_name(&self, name: &QName) -> Option<TypeId> {
        self.type_names.get(name).copied()
    }

    /// Alle benannten Typen in Einfügereihenfolge.
    pub fn named_types(&self) -> impl Iterator<Item = (&QName, TypeId)> {
        self.type_names.iter().map(|(name, id)| (name, *id))
    }

    /// `xs:anyType` (Ur-Type, auch Grammatik für undeklarierte Elemente).
    pub fn any_type(&self) -> TypeId {
        self.any_type
    }

    pub fn any_simple_type(&self) -> TypeId {
        self.any_simple_type
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    types: Vec<Option<TypeDefinition>>,
    elements: Vec<ElementDeclaration>,
    particles: Vec<Particle>,
    globals: Vec<ElementId>,
    any_type: TypeId,
    any_simple_type: TypeId,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Neuer Builder mit den Built-in Typen `xs:anySimpleType` und `xs:anyType`.
    ///
    /// `xs:anyType` ist mixed, hat eine `##any` Attribute Wildcard und das
    /// Content Model `(##any)*` (EXI 8.5.4.1.3.2).
    pub fn new() -> Self {
        let mut b = Self {
            types: Vec::new(),
            elements: Vec::new(),
            particles: Vec::new(),
            globals: Vec::new(),
            any_type: TypeId(0),
            any_simple_type: TypeId(0),
        };
        b.any_simple_type = b.add_type(TypeDefinition::simple(Some(QName::xsd("anySimpleType"))));
        let any = b.add_particle(Particle::zero_or_more(ParticleTerm::Wildcard(WildcardConstraint::Any)));
        let content = b.add_particle(Particle::once(ParticleTerm::sequence(vec![any])));
        b.any_type = b.add_type(
            TypeDefinition::complex(Some(QName::xsd("anyType")), ContentType::Mixed(content))
                .with_attribute_wildcard(WildcardConstraint::Any),
        );
        b
    }

    pub fn any_type(&self) -> TypeId {
        self.any_type
    }

    pub fn any_simple_type(&self) -> TypeId {
        self.any_simple_type
    }

    pub fn add_type(&mut self, def: TypeDefinition) -> TypeId {
        self.types.push(Some(def));
        TypeId(to_u32(self.types.len() - 1))
    }

    /// Reserviert ein Handle für einen Typ, der später per
    /// [`define_type`](Self::define_type) definiert wird (rekursive Typen).
    pub fn reserve_type(&mut self) -> TypeId {
        self.types.push(None);
        TypeId(to_u32(self.types.len() - 1))
    }

    /// Definiert einen reservierten Typ.
    pub fn define_type(&mut self, id: TypeId, def: TypeDefinition) -> Result<()> {
        match self.types.get_mut(id.index()) {
            Some(slot @ None) => {
                *slot = Some(def);
                Ok(())
            }
            Some(Some(_)) => Err(Error::schema_violation(format!("{id:?} is already defined"))),
            None => Err(Error::DanglingReference { kind: "type", index: id.0 }),
        }
    }

    pub fn add_element(&mut self, decl: ElementDeclaration) -> ElementId {
        self.elements.push(decl);
        ElementId(to_u32(self.elements.len() - 1))
    }

    /// Fügt ein globales Element hinzu.
    pub fn add_global_element(&mut self, decl: ElementDeclaration) -> ElementId {
        let id = self.add_element(decl);
        self.globals.push(id);
        id
    }

    /// Macht ein bereits vorhandenes Element global.
    pub fn mark_global(&mut self, id: ElementId) {
        if !self.globals.contains(&id) {
            self.globals.push(id);
        }
    }

    pub fn add_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.push(particle);
        ParticleId(to_u32(self.particles.len() - 1))
    }

    /// Validiert das Modell und erzeugt das unveränderliche [`Schema`].
    ///
    /// # Fehler
    ///
    /// - `UndefinedType` für reservierte, nie definierte Typen
    /// - `DanglingReference` für Handles ausserhalb der Arena
    /// - `InvalidParticleOccurs`, `EmptyNamespaceList`
    /// - `SchemaViolation` für `all`-Gruppen mit Gruppen-Kindern, zyklische
    ///   Model Groups, doppelte Namen und gleichnamige Mitglieder einer
    ///   Substitution Group
    pub fn build(self) -> Result<Schema> {
        let mut types = Vec::with_capacity(self.types.len());
        for (index, def) in self.types.into_iter().enumerate() {
            match def {
                Some(def) => types.push(def),
                None => return Err(Error::UndefinedType(format!("#{index}"))),
            }
        }
        let ctx = Validation {
            types: types.len(),
            elements: self.elements.len(),
            particles: &self.particles,
        };

        for def in &types {
            if let Some(base) = def.base() {
                ctx.type_ref(base)?;
            }
            for attr in def.attributes() {
                if let Some(t) = attr.type_id {
                    ctx.type_ref(t)?;
                }
            }
            if let Some(wildcard) = def.attribute_wildcard() {
                wildcard.validate()?;
            }
            if let ContentType::ElementOnly(p) | ContentType::Mixed(p) = def.content() {
                ctx.particle_ref(p)?;
            }
        }
        for decl in &self.elements {
            ctx.type_ref(decl.type_id)?;
            for member in &decl.substitution_group {
                ctx.element_ref(*member)?;
            }
        }
        for (index, decl) in self.elements.iter().enumerate() {
            if !decl.substitution_group.is_empty() {
                substitution_names(&self.elements, ElementId(to_u32(index)))?;
            }
        }
        for particle in &self.particles {
            ctx.particle(particle)?;
        }
        ctx.acyclic()?;

        // Benannte Typen registrieren, Ableitungen markieren
        let mut type_names = FastIndexMap::default();
        for (index, def) in types.iter().enumerate() {
            if let Some(name) = def.name() {
                if type_names.insert(name.clone(), TypeId(to_u32(index))).is_some() {
                    return Err(Error::schema_violation(format!("duplicate type name '{name}'")));
                }
            }
        }
        let mut derived_from = Vec::new();
        for (index, def) in types.iter().enumerate() {
            if def.name().is_none() || index == self.any_type.index() || index == self.any_simple_type.index() {
                continue;
            }
            let base = match (def, def.base()) {
                (_, Some(base)) => base,
                (TypeDefinition::Simple(_), None) => self.any_simple_type,
                (TypeDefinition::Complex(_), None) => self.any_type,
            };
            derived_from.push(base);
        }
        for base in derived_from {
            types[base.index()].set_has_named_sub_types();
        }

        let mut global_element_names = FastHashMap::default();
        for &id in &self.globals {
            let name = self.elements[id.index()].name.clone();
            if global_element_names.insert(name.clone(), id).is_some() {
                return Err(Error::schema_violation(format!("duplicate global element '{name}'")));
            }
        }
        let mut global_elements = self.globals;
        global_elements.sort_by(|a, b| self.elements[a.index()].name.cmp(&self.elements[b.index()].name));

        Ok(Schema {
            types,
            elements: self.elements,
            particles: self.particles,
            global_elements,
            global_element_names,
            type_names,
            any_type: self.any_type,
            any_simple_type: self.any_simple_type,
        })
    }
}

/// Nicht-abstrakte Mitglieder einer (transitiven) Substitution Group tragen
/// paarweise verschiedene Namen, sonst wäre `SE(qname)` mehrdeutig.
fn substitution_names(elements: &[ElementDeclaration], head: ElementId) -> Result<()> {
    let mut pending = vec![head];
    let mut seen = FastHashSet::default();
    let mut names: FastHashMap<&QName, ElementId> = FastHashMap::default();
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        let decl = &elements[id.index()];
        pending.extend(decl.substitution_group.iter().copied());
        if decl.is_abstract {
            continue;
        }
        if let Some(other) = names.insert(&decl.name, id) {
            return Err(Error::schema_violation(format!(
                "substitution group of {head:?}: {other:?} and {id:?} are both named '{}'",
                decl.name
            )));
        }
    }
    Ok(())
}

struct Validation<'a> {
    types: usize,
    elements: usize,
    particles: &'a [Particle],
}

impl Validation<'_> {
    fn type_ref(&self, id: TypeId) -> Result<()> {
        if id.index() < self.types {
            Ok(())
        } else {
            Err(Error::DanglingReference { kind: "type", index: id.0 })
        }
    }

    fn element_ref(&self, id: ElementId) -> Result<()> {
        if id.index() < self.elements {
            Ok(())
        } else {
            Err(Error::DanglingReference { kind: "element", index: id.0 })
        }
    }

    fn particle_ref(&self, id: ParticleId) -> Result<()> {
        if id.index() < self.particles.len() {
            Ok(())
        } else {
            Err(Error::DanglingReference { kind: "particle", index: id.0 })
        }
    }

    fn particle(&self, particle: &Particle) -> Result<()> {
        particle.validate()?;
        match &particle.term {
            ParticleTerm::Element(e) => self.element_ref(*e),
            ParticleTerm::Wildcard(w) => w.validate(),
            ParticleTerm::Group(group) => {
                for &child in &group.particles {
                    self.particle_ref(child)?;
                    if group.compositor == Compositor::All
                        && matches!(self.particles[child.index()].term, ParticleTerm::Group(_))
                    {
                        return Err(Error::schema_violation(
                            "all group may only contain element and wildcard particles",
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Model Groups dürfen sich nicht selbst enthalten (nur Typen dürfen
    /// rekursiv sein, über Element-Deklarationen).
    fn acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Fresh,
            Active,
            Done,
        }
        let mut marks = vec![Mark::Fresh; self.particles.len()];
        for start in 0..self.particles.len() {
            if marks[start] != Mark::Fresh {
                continue;
            }
            // Iterative DFS: (particle, nächstes Kind)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Active;
            while let Some(top) = stack.last_mut() {
                let (current, next) = *top;
                top.1 += 1;
                let children: &[ParticleId] = match &self.particles[current].term {
                    ParticleTerm::Group(g) => &g.particles,
                    _ => &[],
                };
                if let Some(child) = children.get(next) {
                    match marks[child.index()] {
                        Mark::Active => {
                            return Err(Error::schema_violation(format!(
                                "model group {child:?} contains itself"
                            )))
                        }
                        Mark::Fresh => {
                            marks[child.index()] = Mark::Active;
                            stack.push((child.index(), 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[current] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}
