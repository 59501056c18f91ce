//! Eager loading a small blog.
//!
//! Run with:
//! ```bash
//! EAGERLY_DEBUG=1 EAGERLY_LOG_FORMAT=compact cargo run --example blog --features tracing-subscriber
//! ```

use std::sync::Arc;

use eagerly::logging;
use eagerly::prelude::*;

fn seed(store: &MemoryStore) -> Vec<EntityRef> {
    let users = vec![
        store.insert(Record::new("User").with("id", 1).with("name", "ada")),
        store.insert(Record::new("User").with("id", 2).with("name", "grace")),
    ];

    for (id, user_id, title) in [
        (1, 1, "Notes on the analytical engine"),
        (2, 2, "Compilers for everyone"),
        (3, 2, "Nanoseconds"),
    ] {
        store.insert(
            Record::new("Post")
                .with("id", id)
                .with("user_id", user_id)
                .with("title", title),
        );
    }

    for (id, post_id, user_id, body, approved) in [
        (1, 1, 2, "Beautiful", true),
        (2, 2, 1, "Bold", true),
        (3, 2, 1, "First!", false),
        (4, 3, 1, "Hold up a wire", true),
    ] {
        store.insert(
            Record::new("Comment")
                .with("id", id)
                .with("post_id", post_id)
                .with("user_id", user_id)
                .with("body", body)
                .with("approved", approved),
        );
    }

    store.insert(Record::new("Tag").with("id", 1).with("name", "history"));
    store.insert(Record::new("Tag").with("id", 2).with("name", "languages"));
    for (post_id, tag_id) in [(1, 1), (2, 2), (3, 1), (3, 2)] {
        store.insert(Record::new("PostTag").with("post_id", post_id).with("tag_id", tag_id));
    }

    users
}

fn catalog() -> RelationRegistry {
    RelationRegistry::new()
        .with("User", RelationDescriptor::has_many("posts", "id", "Post", "user_id"))
        .with("Post", RelationDescriptor::has_many("comments", "id", "Comment", "post_id"))
        .with("Comment", RelationDescriptor::belongs_to("author", "user_id", "User", "id"))
        .with(
            "Post",
            RelationDescriptor::has_many_through(
                "tags",
                "id",
                ThroughSpec::new("PostTag", "post_id", "tag_id"),
                "Tag",
                "id",
            ),
        )
}

fn text(entity: &EntityRef, field: &str) -> String {
    entity
        .read()
        .attribute(field)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn related(entity: &EntityRef, alias: &str) -> Vec<EntityRef> {
    entity
        .read()
        .related(alias)
        .map(|r| r.iter().cloned().collect())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> EagerResult<()> {
    logging::init();

    let store = Arc::new(MemoryStore::new());
    let users = seed(&store);
    let ctx = EagerContext::new(catalog(), store.clone());

    let args = ArgMap::new()
        .path("posts.tags")
        .path("posts.comments.author")
        .constrained("posts.comments", |q| {
            q.r#where(Filter::eq("approved", true))
                .order_by("id", SortOrder::Desc);
        });

    let mut loader = Loader::new(&ctx, users, vec![args.into()])?;
    let tree = loader.build_tree()?;
    println!("Plan: {}", tree.paths().collect::<Vec<_>>().join(", "));

    loader.execute().await?;

    for user in loader.get().into_vec() {
        println!("{}", text(&user, "name"));
        for post in related(&user, "posts") {
            let tags: Vec<_> = related(&post, "tags").iter().map(|t| text(t, "name")).collect();
            println!("  {} [{}]", text(&post, "title"), tags.join(", "));
            for comment in related(&post, "comments") {
                let author = related(&comment, "author")
                    .first()
                    .map(|a| text(a, "name"))
                    .unwrap_or_default();
                println!("    {}: {}", author, text(&comment, "body"));
            }
        }
    }

    println!("Fetches: {}", store.fetch_count());
    Ok(())
}
