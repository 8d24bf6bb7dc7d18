//! This bench test simulates scanning a large course export in which every
//! discussion uses the legacy pointer format, so each import also loads a
//! definition file and a policy entry.

#![allow(missing_docs)]

use std::{fs, path::Path};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use discussion::CourseDirectory;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Writes a course with 99 verticals, each pointing at its own legacy
/// discussion definition.
fn preseed_course(root: &Path) {
    fs::create_dir_all(root.join("vertical")).unwrap();
    fs::create_dir_all(root.join("discussion")).unwrap();
    fs::create_dir_all(root.join("policies/2014")).unwrap();
    fs::write(
        root.join("course.xml"),
        r#"<course url_name="2014" org="edX" course="DemoX"/>"#,
    )
    .unwrap();

    let mut policy = Map::new();
    for i in 1..=99 {
        fs::write(
            root.join(format!("vertical/week{i:03}.xml")),
            format!(r#"<vertical><discussion url_name="forum{i:03}"/></vertical>"#),
        )
        .unwrap();
        fs::write(
            root.join(format!("discussion/forum{i:03}.xml")),
            format!(
                r#"<discussion name="Forum {i}" id="topic-{i}" for="Lecture {i}" discussion_category="Week {i}"/>"#
            ),
        )
        .unwrap();
        policy.insert(
            format!("discussion/forum{i:03}"),
            json!({ "sort_key": format!("{i:03}") }),
        );
    }
    fs::write(
        root.join("policies/2014/policy.json"),
        serde_json::to_string(&Value::Object(policy)).unwrap(),
    )
    .unwrap();
}

fn import_course(c: &mut Criterion) {
    c.bench_function("import legacy course", |b| {
        b.iter_batched(
            || {
                let tmp_dir = TempDir::new().unwrap();
                preseed_course(tmp_dir.path());
                tmp_dir
            },
            |tmp_dir| {
                let course = CourseDirectory::open(tmp_dir.path().to_path_buf()).unwrap();
                for entry in course.scan() {
                    entry.blocks.unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, import_course);
criterion_main!(benches);
