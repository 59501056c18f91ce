//! Fuzz target for relation-path tree resolution.
//!
//! Resolves arbitrary relation paths against a fixed catalog and checks the
//! shape of every tree that resolves.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_build_tree
//! ```

#![no_main]

use eagerly_loader::{EagerLoadSpec, RelationDescriptor, RelationRegistry, build_tree};
use libfuzzer_sys::fuzz_target;

fn catalog() -> RelationRegistry {
    RelationRegistry::new()
        .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
        .with("User", RelationDescriptor::has_one("profile", "id", "Profile", "user_id"))
        .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"))
        .with("Post", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
        .with("Comment", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
}

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // One path per line
    let mut spec = EagerLoadSpec::new();
    for path in input.lines() {
        spec.insert(path, None);
    }

    // Resolution should never panic, only return errors
    if let Ok(tree) = build_tree("User", &spec, &catalog()) {
        for (index, node) in tree.iter().enumerate() {
            if let Some(parent) = node.parent() {
                assert!(parent < index, "parent resolved after child");
            }
        }
        for path in spec.paths() {
            assert!(tree.get(path).is_some(), "requested path missing from tree");
        }
    }
});
