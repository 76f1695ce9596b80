//! Topic Resolver Integration Tests
//!
//! Tree reconstruction from flat parent-pointer records: pruning, ordering,
//! and handling of inconsistent source data.

use std::path::PathBuf;

use ekshiksha::core::{resolve_forest, ResolveError};
use ekshiksha::domain::{
    AddressScheme, ArchiveRef, ContentItem, ContentRecord, PackagedItem, TopicId, TopicNode,
    TopicRecord,
};
use ekshiksha::source::parse_js_literal;

/// Parse topics the way they appear in topics.js
fn topics(source: &str) -> Vec<TopicRecord> {
    let mut parsed = parse_js_literal(source).unwrap();
    serde_json::from_value(parsed.remove("topics").unwrap()).unwrap()
}

fn item(dir: &str, topic: Option<u64>) -> PackagedItem {
    let record: ContentRecord = serde_json::from_value(match topic {
        Some(id) => serde_json::json!({ "htmlFileName": "index.html", "resourceDir": dir, "topic": { "id": id } }),
        None => serde_json::json!({ "htmlFileName": "index.html", "resourceDir": dir }),
    })
    .unwrap();

    PackagedItem {
        item: ContentItem {
            record,
            scheme: AddressScheme::App,
            dir: PathBuf::from("apps").join(dir),
            dir_absolute: PathBuf::from("/content/apps").join(dir),
            html_file: "index.html".to_string(),
            image_dir: None,
            title: None,
            author: Some("Author".to_string()),
            organization: None,
        },
        archive: ArchiveRef {
            hash: dir.to_string(),
            path: PathBuf::from(format!("/cache/{}.zip", dir)),
        },
        needs_dependency_bundle: false,
    }
}

fn ids(nodes: &[TopicNode]) -> Vec<u64> {
    nodes.iter().map(|n| n.id.0).collect()
}

const CURRICULUM: &str = r##"var topics = [
    {"id": 1, "text": "Science", "parent": "#"},
    {"id": "2", "text": "Light", "parent": 1},
    {"id": 3, "text": "Sound", "parent": "1"},
    {"id": 4, "text": "Reflection", "parent": 2},
    {"id": 5, "text": "Refraction", "parent": 2},
    {"id": 6, "text": "Maths", "parent": "#"},
    {"id": 7, "text": "Algebra", "parent": 6},
    {"id": 8, "text": "Detached"}
];"##;

#[test]
fn test_forest_is_pruned() {
    let resolution = resolve_forest(
        &topics(CURRICULUM),
        vec![item("mirror", Some(4)), item("lens", Some(5))],
    )
    .unwrap();

    // Maths and Sound carry nothing
    assert_eq!(ids(&resolution.forest), vec![1]);
    let science = &resolution.forest[0];
    assert_eq!(ids(&science.children), vec![2]);
    assert_eq!(ids(&science.children[0].children), vec![4, 5]);

    for root in &resolution.forest {
        for node in root.walk() {
            assert!(node.item_count() > 0, "topic {} is empty", node.id);
        }
    }
    assert_eq!(resolution.item_count(), 2);
}

#[test]
fn test_children_keep_declaration_order() {
    let resolution = resolve_forest(
        &topics(CURRICULUM),
        vec![
            item("echo", Some(3)),
            item("lens", Some(5)),
            item("mirror", Some(4)),
            item("x", Some(7)),
        ],
    )
    .unwrap();

    assert_eq!(ids(&resolution.forest), vec![1, 6]);
    assert_eq!(ids(&resolution.forest[0].children), vec![2, 3]);
    assert_eq!(ids(&resolution.forest[0].children[0].children), vec![4, 5]);
}

#[test]
fn test_items_on_one_topic_keep_input_order() {
    let resolution = resolve_forest(
        &topics(CURRICULUM),
        vec![item("b", Some(3)), item("a", Some(3)), item("c", Some(3))],
    )
    .unwrap();

    let sound = &resolution.forest[0].children[0];
    assert_eq!(sound.id, TopicId(3));
    let dirs: Vec<String> = sound.items.iter().map(|p| p.item.source_id()).collect();
    assert_eq!(dirs, vec!["apps/b", "apps/a", "apps/c"]);
}

#[test]
fn test_inconsistent_items_are_reported_not_fatal() {
    let resolution = resolve_forest(
        &topics(CURRICULUM),
        vec![
            item("lost", Some(99)),
            item("untagged", None),
            item("floating", Some(8)),
            item("mirror", Some(4)),
        ],
    )
    .unwrap();

    assert_eq!(resolution.item_count(), 1);
    assert_eq!(resolution.unassigned.len(), 2);
    assert_eq!(resolution.unreachable.len(), 1);
    assert_eq!(resolution.unreachable[0].item.source_id(), "apps/floating");
}

#[test]
fn test_cycle_fails_fast() {
    let looped = topics(
        r##"var topics = [
            {"id": 1, "text": "Root", "parent": "#"},
            {"id": 2, "text": "A", "parent": 3},
            {"id": 3, "text": "B", "parent": 2}
        ];"##,
    );

    assert!(matches!(
        resolve_forest(&looped, vec![item("a", Some(2))]),
        Err(ResolveError::Cycle(_))
    ));
}

#[test]
fn test_duplicate_topic_id_keeps_first() {
    let duplicated = topics(
        r##"var topics = [
            {"id": 1, "text": "First", "parent": "#"},
            {"id": 1, "text": "Second", "parent": "#"}
        ];"##,
    );

    let resolution = resolve_forest(&duplicated, vec![item("a", Some(1))]).unwrap();
    assert_eq!(resolution.forest.len(), 1);
    assert_eq!(resolution.forest[0].label, "First");
}
