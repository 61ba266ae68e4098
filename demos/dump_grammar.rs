//! Gibt die Event-Tabellen eines kleinen Beispielschemas aus.
//!
//! ```text
//! cargo run --example dump_grammar [strict] [comments] [pis] [prefixes] [sc]
//! ```
//!
//! Der Cursor läuft durch ein festes Dokument; vor jedem Event wird die
//! Kandidatenliste des aktuellen Zustands mit Event Codes und Bitbreiten
//! gedruckt.

use std::env;
use std::sync::Arc;

use exi_grammar::{
    AttributeUse, ContentType, ElementDeclaration, Event, GrammarCache, GrammarCursor, GrammarOptions, NilValue,
    Particle, ParticleTerm, Preserve, QName, SchemaBuilder, TypeDefinition, WildcardConstraint,
};

fn main() {
    let mut options = GrammarOptions::default();
    let mut preserve = Preserve::default();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "strict" => options.set_strict(true),
            "comments" => preserve.comments = true,
            "pis" => preserve.pis = true,
            "prefixes" => preserve.prefixes = true,
            "sc" => options.set_self_contained(true),
            other => {
                eprintln!("unknown option '{other}'");
                std::process::exit(2);
            }
        }
    }
    options.set_preserve(preserve);
    if let Err(e) = options.validate() {
        eprintln!("{e}");
        std::process::exit(2);
    }

    // <order id="..." [note=".."]> <item/>+ <any ##other/>? </order>
    let mut b = SchemaBuilder::new();
    let string = b.add_type(TypeDefinition::simple(Some(QName::xsd("string"))));
    let item = b.add_element(ElementDeclaration::new(QName::new("urn:shop", "item"), string).with_nillable(true));
    let items = b.add_particle(Particle::one_or_more(ParticleTerm::Element(item)));
    let extra = b.add_particle(Particle::optional(ParticleTerm::Wildcard(WildcardConstraint::Not(Some(
        Arc::from("urn:shop"),
    )))));
    let seq = b.add_particle(Particle::once(ParticleTerm::sequence(vec![items, extra])));
    let order_type = b.add_type(
        TypeDefinition::complex(Some(QName::new("urn:shop", "Order")), ContentType::ElementOnly(seq))
            .with_attribute(AttributeUse::required(QName::new("", "id")))
            .with_attribute(AttributeUse::optional(QName::new("", "note"))),
    );
    b.add_global_element(ElementDeclaration::new(QName::new("urn:shop", "order"), order_type));
    let schema = match b.build() {
        Ok(schema) => Arc::new(schema),
        Err(e) => {
            eprintln!("schema error: {e}");
            std::process::exit(1);
        }
    };

    let item_name = QName::new("urn:shop", "item");
    let events = [
        Event::StartDocument,
        Event::StartElement(QName::new("urn:shop", "order")),
        Event::attribute(QName::new("", "id")),
        Event::StartElement(item_name.clone()),
        Event::characters(),
        Event::EndElement,
        Event::StartElement(item_name),
        Event::XsiNil(NilValue::True),
        Event::EndElement,
        Event::StartElement(QName::new("urn:other", "gift")),
        Event::EndElement,
        Event::EndElement,
        Event::EndDocument,
    ];

    let cache = GrammarCache::new(schema);
    let mut cursor = match GrammarCursor::new(&cache, options) {
        Ok(cursor) => cursor,
        Err(e) => {
            eprintln!("cursor error: {e}");
            std::process::exit(1);
        }
    };
    for event in &events {
        let list = cursor.current_candidates();
        let widths = list.widths();
        let key = cursor.grammar().map(|g| g.key().to_string()).unwrap_or_default();
        println!("{key} {:?}  (bits part1={}, part2={})", cursor.state(), widths.bits_part1(), widths.bits_part2());
        print!("{list}");
        match cursor.consume(event) {
            Ok(et) => println!("  -> {event} via {} {et}\n", et.code()),
            Err(e) => {
                println!("  -> {event} rejected: {e}");
                break;
            }
        }
    }
    println!("{} grammars cached", cache.len());
}
