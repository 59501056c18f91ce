//! Fuzz target for subject normalization.
//!
//! Builds collections mixing entities of several types with plain values and
//! checks that normalization either yields one entity type or fails.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_subject
//! ```

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use eagerly_loader::{Element, Record, Subject, Value, entity_ref};
use libfuzzer_sys::fuzz_target;

/// A fuzzable collection element.
#[derive(Debug, Arbitrary)]
enum FuzzElement {
    User(i64),
    Post(i64),
    Null,
    Bool(bool),
    Int(i64),
    String(String),
}

impl From<FuzzElement> for Element {
    fn from(element: FuzzElement) -> Self {
        match element {
            FuzzElement::User(id) => Element::Entity(entity_ref(Record::new("User").with("id", id))),
            FuzzElement::Post(id) => Element::Entity(entity_ref(Record::new("Post").with("id", id))),
            FuzzElement::Null => Element::Value(Value::Null),
            FuzzElement::Bool(b) => Element::Value(Value::Bool(b)),
            FuzzElement::Int(i) => Element::Value(Value::Int(i)),
            FuzzElement::String(s) => Element::Value(Value::String(s)),
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);

    if let Ok(elements) = Vec::<FuzzElement>::arbitrary(&mut unstructured) {
        let elements: Vec<Element> = elements.into_iter().map(Element::from).collect();

        if let Ok(normalized) = Subject::Collection(elements).normalize() {
            match (&normalized.entity_type, &normalized.entities) {
                (Some(entity_type), Some(entities)) => {
                    assert!(!entities.is_empty());
                    assert!(entities.iter().all(|e| e.read().entity_type() == entity_type));
                }
                (None, None) => {}
                _ => panic!("entity type and entities disagree"),
            }
        }
    }
});
