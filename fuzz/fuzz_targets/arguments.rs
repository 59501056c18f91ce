//! Fuzz target for the eager-load argument parser.
//!
//! Feeds arbitrary argument lists, in both the flat and the map form, to
//! `parse_arguments`.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_arguments
//! ```

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use eagerly_loader::{ArgKey, ArgMap, ArgValue, EagerArg, Value, constraint, parse_arguments};
use libfuzzer_sys::fuzz_target;

/// A fuzzable scalar value.
#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<FuzzValue> for Value {
    fn from(val: FuzzValue) -> Self {
        match val {
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::Bool(b),
            FuzzValue::Int(i) => Value::Int(i),
            FuzzValue::Float(f) => Value::Float(f),
            FuzzValue::String(s) => Value::String(s),
        }
    }
}

/// A fuzzable map entry.
#[derive(Debug, Arbitrary)]
enum FuzzEntry {
    Constrained(String, u8),
    Named(String, FuzzValue),
    Indexed(usize, String),
    IndexedValue(usize, FuzzValue),
}

/// A fuzzable argument.
#[derive(Debug, Arbitrary)]
enum FuzzArg {
    Path(String),
    Map(Vec<FuzzEntry>),
    Value(FuzzValue),
}

impl From<FuzzArg> for EagerArg {
    fn from(arg: FuzzArg) -> Self {
        match arg {
            FuzzArg::Path(path) => EagerArg::Path(path),
            FuzzArg::Value(value) => EagerArg::Value(value.into()),
            FuzzArg::Map(entries) => {
                let map = entries.into_iter().fold(ArgMap::new(), |map, entry| match entry {
                    FuzzEntry::Constrained(path, limit) => map.entry(
                        ArgKey::Name(path),
                        ArgValue::Constraint(constraint(move |q| {
                            q.limit(u64::from(limit));
                        })),
                    ),
                    FuzzEntry::Named(path, value) => {
                        map.entry(ArgKey::Name(path), ArgValue::Value(value.into()))
                    }
                    FuzzEntry::Indexed(index, path) => {
                        map.entry(ArgKey::Index(index), ArgValue::Path(path))
                    }
                    FuzzEntry::IndexedValue(index, value) => {
                        map.entry(ArgKey::Index(index), ArgValue::Value(value.into()))
                    }
                });
                EagerArg::Map(map)
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);

    if let Ok(args) = Vec::<FuzzArg>::arbitrary(&mut unstructured) {
        let was_empty = args.is_empty();
        let args: Vec<EagerArg> = args.into_iter().map(EagerArg::from).collect();

        // Parsing should never panic, only return errors
        match parse_arguments(args) {
            Ok(spec) => assert!(!spec.is_empty()),
            Err(err) => assert!(!was_empty || err.is_validation_error()),
        }
    }
});
