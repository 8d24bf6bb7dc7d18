//! Importing discussions from a course export that mixes the legacy and
//! inline OLX formats.

#![allow(missing_docs)]

use std::{
    io,
    path::{Path, PathBuf},
};

use discussion::{
    CourseDirectory, CourseKey, DiscussionBlock, Element, ImportOptions, ImportRuntime, UsageKey,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/legacy_course")
}

#[test]
fn legacy_definition_and_policy_are_applied() {
    let course = CourseDirectory::open(fixture()).unwrap();
    let block = course.import_file(Path::new("pointer.xml")).unwrap();

    assert_eq!(block.discussion_id(), "legacy-topic");
    assert_eq!(block.display_name(), "Legacy Forum");
    assert_eq!(block.discussion_category(), "Week 1 (policy)");
    assert_eq!(block.discussion_target(), "Lecture 1");
    assert_eq!(block.sort_key(), Some("a"));
    assert_eq!(block.xml_attributes().get("graceperiod").unwrap(), "2 days");
}

#[test]
fn scan_finds_legacy_and_inline_discussions() {
    let course = CourseDirectory::open(fixture()).unwrap();
    assert_eq!(course.course().display_name, "edX Demonstration Course");

    let entries = course.scan();
    let blocks: Vec<_> = entries
        .iter()
        .flat_map(|entry| entry.blocks.as_ref().unwrap())
        .collect();

    let ids: Vec<_> = blocks.iter().map(|block| block.discussion_id()).collect();
    assert_eq!(ids, vec!["legacy-topic", "modern-topic", "disc42"]);

    let modern = blocks[1];
    assert_eq!(modern.display_name(), "Modern Forum");
    assert_eq!(modern.discussion_target(), "Overview");
    assert!(modern.xml_attributes().is_empty());

    let pointer_only = blocks[2];
    assert_eq!(pointer_only.discussion_target(), "Topic-Level Student-Visible Label");
}

#[test]
fn student_view_data_uses_imported_topic() {
    let course = CourseDirectory::open(fixture()).unwrap();
    let block = course.import_file(Path::new("pointer.xml")).unwrap();

    assert_eq!(
        serde_json::to_value(block.student_view_data()).unwrap(),
        json!({"topic_id": "legacy-topic"})
    );
}

#[test]
fn export_then_import_reproduces_the_block() {
    let course = CourseDirectory::open(fixture()).unwrap();
    let legacy = course.import_file(Path::new("pointer.xml")).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(
        tmp.path().join("course.xml"),
        r#"<course url_name="2014" org="edX" course="DemoX"/>"#,
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("forum.xml"),
        legacy.to_olx().to_xml().unwrap(),
    )
    .unwrap();

    let fresh = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();
    let inline = fresh.import_file(Path::new("forum.xml")).unwrap();

    assert_eq!(inline.xml_attributes().get("graceperiod").unwrap(), "2 days");
    assert_eq!(inline, legacy);
}

/// A course with no files and no policy.
struct EmptyCourse(CourseKey);

impl EmptyCourse {
    fn new() -> Self {
        Self(CourseKey::try_from("course-v1:edX+DemoX+2024").unwrap())
    }
}

impl ImportRuntime for EmptyCourse {
    fn course_key(&self) -> &CourseKey {
        &self.0
    }

    fn read_resource(&self, _path: &Path) -> io::Result<String> {
        Err(io::Error::from(io::ErrorKind::NotFound))
    }

    fn policy(&self, _usage_id: &UsageKey) -> Map<String, Value> {
        Map::new()
    }
}

fn import(xml: &str) -> DiscussionBlock {
    let node = Element::parse(xml).unwrap();
    DiscussionBlock::parse_xml(&node, &EmptyCourse::new(), ImportOptions::default()).unwrap()
}

proptest! {
    #[test]
    fn id_attribute_always_becomes_discussion_id(
        id in "[A-Za-z0-9 _.:&<>-]{1,40}",
        inline in proptest::option::of("[a-z0-9]{1,10}"),
    ) {
        let mut node = Element::new("discussion").with_attribute("url_name", "forum");
        if let Some(inline) = &inline {
            node.set_attribute("discussion_id", inline.as_str());
        }
        node.set_attribute("id", id.as_str());

        let block = import(&node.to_xml().unwrap());
        prop_assert_eq!(block.discussion_id(), id.as_str());
        prop_assert_eq!(block.student_view_data().topic_id, id);
    }

    #[test]
    fn for_attribute_always_becomes_discussion_target(target in "[A-Za-z0-9 ,'\"-]{0,40}") {
        let node = Element::new("discussion")
            .with_attribute("url_name", "forum")
            .with_attribute("for", target.as_str());

        let block = import(&node.to_xml().unwrap());
        prop_assert_eq!(block.discussion_target(), target.as_str());
        prop_assert_eq!(block.discussion_category(), "Week 1");
    }

    #[test]
    fn absent_definition_leaves_other_fields_untouched(
        display_name in "[A-Za-z ]{1,20}",
        category in "[A-Za-z0-9 ]{1,20}",
    ) {
        let node = Element::new("discussion")
            .with_attribute("url_name", "forum")
            .with_attribute("display_name", display_name.as_str())
            .with_attribute("discussion_category", category.as_str())
            .with_attribute("id", "disc42");

        let block = import(&node.to_xml().unwrap());
        prop_assert_eq!(block.display_name(), display_name.as_str());
        prop_assert_eq!(block.discussion_category(), category.as_str());
        prop_assert_eq!(block.discussion_target(), "Topic-Level Student-Visible Label");
        prop_assert_eq!(block.sort_key(), None);
        prop_assert!(block.xml_attributes().is_empty());
    }
}
