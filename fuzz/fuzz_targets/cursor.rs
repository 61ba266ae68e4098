#![no_main]
use std::sync::{Arc, OnceLock};

use exi_grammar::{
    AttributeUse, ContentType, ElementDeclaration, Event, GrammarCache, GrammarCursor, GrammarOptions, NilValue,
    Particle, ParticleTerm, QName, Schema, SchemaBuilder, TypeDefinition, WildcardConstraint,
};
use libfuzzer_sys::fuzz_target;

// Rekursiver Typ mit Attributen, Choice, All und Wildcards
fn schema() -> Arc<Schema> {
    static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        let mut b = SchemaBuilder::new();
        let string = b.add_type(TypeDefinition::simple(Some(QName::xsd("string"))));
        let node_type = b.reserve_type();
        let node = b.add_element(ElementDeclaration::new(QName::new("", "node"), node_type).with_nillable(true));
        let leaf = b.add_element(ElementDeclaration::new(QName::new("urn:f", "leaf"), string));
        let p_node = b.add_particle(Particle::zero_or_more(ParticleTerm::Element(node)));
        let p_leaf = b.add_particle(Particle::optional(ParticleTerm::Element(leaf)));
        let p_any = b.add_particle(Particle::once(ParticleTerm::Wildcard(WildcardConstraint::Not(Some(
            Arc::from("urn:f"),
        )))));
        let choice = b.add_particle(Particle::one_or_more(ParticleTerm::choice(vec![p_node, p_any])));
        let all_leaf = b.add_particle(Particle::optional(ParticleTerm::Element(leaf)));
        let all = b.add_particle(Particle::optional(ParticleTerm::all(vec![all_leaf])));
        let seq = b.add_particle(Particle::once(ParticleTerm::sequence(vec![p_leaf, choice, all])));
        b.define_type(
            node_type,
            TypeDefinition::complex(Some(QName::new("urn:f", "Node")), ContentType::Mixed(seq))
                .with_attribute(AttributeUse::required(QName::new("", "id")))
                .with_attribute(AttributeUse::optional(QName::new("", "x")))
                .with_attribute_wildcard(WildcardConstraint::Namespaces(vec![Arc::from("urn:f")])),
        )
        .unwrap();
        b.add_global_element(ElementDeclaration::new(QName::new("", "root"), node_type));
        Arc::new(b.build().unwrap())
    }))
}

fn event(byte: u8) -> Event {
    let names = [
        QName::new("", "root"),
        QName::new("", "node"),
        QName::new("urn:f", "leaf"),
        QName::new("urn:o", "other"),
        QName::new("", "id"),
        QName::new("", "x"),
        QName::new("urn:f", "Node"),
        QName::new("urn:f", "a"),
    ];
    let name = names[(byte >> 4) as usize % names.len()].clone();
    match byte & 0x0f {
        0 => Event::StartDocument,
        1 => Event::EndDocument,
        2 | 3 => Event::StartElement(name),
        4 => Event::EndElement,
        5 => Event::attribute(name),
        6 => Event::Attribute { name, valid: false },
        7 => Event::XsiType(name),
        8 => Event::XsiNil(match byte >> 6 {
            0 => NilValue::True,
            1 => NilValue::False,
            _ => NilValue::Invalid,
        }),
        9 => Event::characters(),
        10 => Event::Characters { valid: false },
        11 => Event::NamespaceDeclaration,
        12 => Event::Comment,
        13 => Event::ProcessingInstruction,
        14 => Event::SelfContained,
        _ => Event::EndElement,
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let cache = GrammarCache::new(schema());
    let options = GrammarOptions::from_bits(flags);
    let Ok(mut cursor) = GrammarCursor::new(&cache, options) else {
        return;
    };
    for chunk in rest.chunks(2) {
        let event = event(chunk[0]);
        // Zweites Byte: Decoder-Richtung über einen Index
        let result = match chunk.get(1) {
            Some(&index) if index & 0x80 != 0 => cursor.consume_at((index & 0x7f) as usize, &event),
            _ => cursor.consume(&event),
        };
        if result.is_ok() {
            let list = cursor.current_candidates();
            assert!(list.iter().enumerate().all(|(i, et)| et.index() as usize == i));
        }
    }
});
