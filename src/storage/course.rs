//! A course export on the filesystem.
//!
//! The [`CourseDirectory`] reads the course root element from `course.xml`,
//! loads the run's `policy.json`, and serves legacy definition files to the
//! importer.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::{
    domain::{
        Config, ConfigError, CourseKey, DiscussionBlock, KeyError, KeySegment, UsageKey,
        services::{Course, CourseStore, ServiceError},
    },
    storage::{
        metadata::{Metadata, translate},
        olx::{
            BLOCK_TYPE, ImportError, ImportOptions, ImportRuntime, definition_path,
            load_definition_xml,
        },
        xml::{Element, XmlError},
    },
};

/// A course export rooted at a directory.
#[derive(Debug, Clone)]
pub struct CourseDirectory {
    root: PathBuf,
    course: Course,
    policy: BTreeMap<String, Map<String, Value>>,
    config: Config,
}

impl CourseDirectory {
    /// Opens the course export at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `course.xml` is missing or does not identify the
    /// course, or if the configuration or policy document cannot be parsed.
    pub fn open(root: PathBuf) -> Result<Self, CourseError> {
        let config = Config::load_or_default(&root)?;
        Self::open_with_config(root, config)
    }

    /// Opens the course export at `root` with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`CourseDirectory::open`].
    pub fn open_with_config(root: PathBuf, config: Config) -> Result<Self, CourseError> {
        let course_xml = root.join("course.xml");
        let content = fs::read_to_string(&course_xml).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CourseError::NotACourse(root.clone()),
            _ => CourseError::Io(e),
        })?;
        let element = Element::parse(&content).map_err(|source| CourseError::Xml {
            path: course_xml,
            source,
        })?;

        let key = course_key(&element)?;

        let policy_path = config.policy_file.as_ref().map_or_else(
            || root.join("policies").join(key.run()).join("policy.json"),
            |file| root.join(file),
        );
        let policy = load_policy(&policy_path)?;

        let display_name = policy
            .get(&format!("course/{}", key.run()))
            .and_then(|entry| entry.get("display_name"))
            .and_then(Value::as_str)
            .or_else(|| element.attribute("display_name"))
            .unwrap_or_else(|| key.run())
            .to_string();

        tracing::debug!(
            "Opened course {key} at {} with {} policy entries",
            root.display(),
            policy.len()
        );

        Ok(Self {
            root,
            course: Course { key, display_name },
            policy,
            config,
        })
    }

    /// The root of the export.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The course this export holds.
    #[must_use]
    pub const fn course(&self) -> &Course {
        &self.course
    }

    /// The configuration in effect for this export.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Import options derived from the configuration.
    #[must_use]
    pub const fn import_options(&self) -> ImportOptions {
        ImportOptions {
            strict_definitions: self.config.strict_definitions,
        }
    }

    /// Import the discussion element at the root of `file`.
    ///
    /// Relative paths are resolved against the course root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, its root is not
    /// a discussion element, or the import fails.
    pub fn import_file(&self, file: &Path) -> Result<DiscussionBlock, CourseError> {
        let path = self.root.join(file);
        let element = read_element(&path)?;
        if element.tag() != BLOCK_TYPE {
            return Err(CourseError::NotADiscussion {
                path,
                tag: element.tag().to_string(),
            });
        }
        Ok(DiscussionBlock::parse_xml(
            &element,
            self,
            self.import_options(),
        )?)
    }

    /// Import every discussion element found in the export's unit files.
    ///
    /// Files under `vertical/` are searched. A failure in one file is
    /// reported in its entry and does not stop the scan.
    #[must_use]
    pub fn scan(&self) -> Vec<ScanEntry> {
        collect_xml_paths(&self.root.join("vertical"))
            .into_iter()
            .map(|path| {
                let blocks = self.import_all_in(&path);
                if let Err(e) = &blocks {
                    tracing::warn!("Skipping {}: {e}", path.display());
                }
                ScanEntry { path, blocks }
            })
            .collect()
    }

    fn import_all_in(&self, path: &Path) -> Result<Vec<DiscussionBlock>, CourseError> {
        let element = read_element(path)?;
        element
            .descendants()
            .filter(|node| node.tag() == BLOCK_TYPE)
            .map(|node| {
                DiscussionBlock::parse_xml(node, self, self.import_options())
                    .map_err(CourseError::from)
            })
            .collect()
    }
}

impl CourseDirectory {
    /// The legacy sources that would replace `field` when `block` is
    /// imported again.
    ///
    /// Definition and policy values are only applied to blocks that have a
    /// definition file, so a block without one has no overrides.
    #[must_use]
    pub fn legacy_overrides(&self, block: &DiscussionBlock, field: &str) -> Vec<LegacyOverride> {
        let pointer =
            Element::new(BLOCK_TYPE).with_attribute("url_name", block.usage_id().block_id());
        let Ok(Some(definition)) = load_definition_xml(&pointer, self) else {
            return Vec::new();
        };

        let mut overrides = Vec::new();
        let sets_field = Metadata::from_definition(&definition)
            .fields
            .contains_key(field);
        if let Some(path) = definition_path(&pointer).filter(|_| sets_field) {
            overrides.push(LegacyOverride::Definition(path));
        }
        if ImportRuntime::policy(self, block.usage_id())
            .keys()
            .any(|name| translate(name) == field)
        {
            overrides.push(LegacyOverride::Policy(block.usage_id().policy_key()));
        }
        overrides
    }
}

/// A legacy source whose value for a field wins over the inline value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyOverride {
    /// The block's definition file, relative to the course root.
    Definition(PathBuf),
    /// The block's entry in the course policy, by key.
    Policy(String),
}

impl fmt::Display for LegacyOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition(path) => write!(f, "definition file {}", path.display()),
            Self::Policy(key) => write!(f, "policy entry '{key}'"),
        }
    }
}

/// The result of importing one unit file during a scan.
#[derive(Debug)]
pub struct ScanEntry {
    /// The unit file.
    pub path: PathBuf,
    /// The discussion blocks it contains, or why they could not be imported.
    pub blocks: Result<Vec<DiscussionBlock>, CourseError>,
}

impl ImportRuntime for CourseDirectory {
    fn course_key(&self) -> &CourseKey {
        &self.course.key
    }

    fn read_resource(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(self.root.join(path))
    }

    fn policy(&self, usage_id: &UsageKey) -> Map<String, Value> {
        self.policy
            .get(&usage_id.policy_key())
            .cloned()
            .unwrap_or_default()
    }
}

impl CourseStore for CourseDirectory {
    fn get_course(&self, key: &CourseKey) -> Result<Option<Course>, ServiceError> {
        Ok((*key == self.course.key).then(|| self.course.clone()))
    }
}

/// Derive the course key from the `course.xml` root element.
fn course_key(element: &Element) -> Result<CourseKey, CourseError> {
    let segment = |name: &'static str| {
        let value = element
            .attribute(name)
            .ok_or(CourseError::MissingAttribute(name))?;
        KeySegment::try_from(value).map_err(|e| CourseError::Key(KeyError::from(e)))
    };

    Ok(CourseKey::new(
        segment("org")?,
        segment("course")?,
        segment("url_name")?,
    ))
}

fn load_policy(path: &Path) -> Result<BTreeMap<String, Map<String, Value>>, CourseError> {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).map_err(|source| CourseError::Policy {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("No policy document at {}", path.display());
            Ok(BTreeMap::new())
        }
        Err(e) => Err(CourseError::Io(e)),
    }
}

fn read_element(path: &Path) -> Result<Element, CourseError> {
    let content = fs::read_to_string(path)?;
    Element::parse(&content).map_err(|source| CourseError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_xml_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("xml")))
        .map(walkdir::DirEntry::into_path)
        .collect();
    paths.sort();
    paths
}

/// Errors that can occur when reading a course export.
#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    /// The directory has no `course.xml`.
    #[error("{} is not a course export (no course.xml)", .0.display())]
    NotACourse(PathBuf),

    /// `course.xml` lacks an attribute needed to identify the course.
    #[error("course.xml is missing the '{0}' attribute")]
    MissingAttribute(&'static str),

    /// The course could not be identified.
    #[error("invalid course key: {0}")]
    Key(KeyError),

    /// A file could not be read.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A file is not valid XML.
    #[error("failed to parse {}: {source}", path.display())]
    Xml {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: XmlError,
    },

    /// The policy document is not valid.
    #[error("failed to parse policy {}: {source}", path.display())]
    Policy {
        /// The policy file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// The file does not hold a discussion element.
    #[error("{} holds a <{tag}> element, not a discussion", path.display())]
    NotADiscussion {
        /// The file.
        path: PathBuf,
        /// The root element found instead.
        tag: String,
    },

    /// Importing a discussion element failed.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// The tool configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn legacy_course() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "course.xml",
            r#"<course org="edX" course="DemoX" url_name="2014" display_name="Fallback"/>"#,
        );
        write(
            root,
            "policies/2014/policy.json",
            r#"{
                "course/2014": {"display_name": "Demo Course"},
                "discussion/forum": {"discussion_category": "From policy"}
            }"#,
        );
        write(
            root,
            "discussion/forum.xml",
            r#"<discussion discussion_category="From file" for="Lecture 1"/>"#,
        );
        write(
            root,
            "vertical/unit1.xml",
            r#"<vertical display_name="Unit 1">
                 <html url_name="intro"/>
                 <discussion url_name="forum" id="topic-1"/>
                 <discussion url_name="inline" discussion_id="topic-2" discussion_category="Week 3"/>
               </vertical>"#,
        );
        write(root, "vertical/broken.xml", "<vertical><discussion></vertical>");
        tmp
    }

    #[test]
    fn open_reads_course_identity_and_policy() {
        let tmp = legacy_course();
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        assert_eq!(course.course().key.to_string(), "course-v1:edX+DemoX+2014");
        assert_eq!(course.course().display_name, "Demo Course");
    }

    #[test]
    fn open_rejects_non_course_directories() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            CourseDirectory::open(tmp.path().to_path_buf()),
            Err(CourseError::NotACourse(_))
        ));

        write(tmp.path(), "course.xml", r#"<course org="edX" url_name="2014"/>"#);
        assert!(matches!(
            CourseDirectory::open(tmp.path().to_path_buf()),
            Err(CourseError::MissingAttribute("course"))
        ));
    }

    #[test]
    fn scan_imports_every_discussion_and_reports_failures() {
        let tmp = legacy_course();
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        let entries = course.scan();
        assert_eq!(entries.len(), 2);

        let broken = &entries[0];
        assert!(broken.path.ends_with("broken.xml"));
        assert!(broken.blocks.is_err());

        let blocks = entries[1].blocks.as_ref().unwrap();
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].discussion_id(), "topic-1");
        assert_eq!(blocks[0].discussion_category(), "From policy");
        assert_eq!(blocks[0].discussion_target(), "Lecture 1");

        assert_eq!(blocks[1].discussion_id(), "topic-2");
        assert_eq!(blocks[1].discussion_category(), "Week 3");
    }

    #[test]
    fn import_file_requires_a_discussion_root() {
        let tmp = legacy_course();
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        assert!(matches!(
            course.import_file(Path::new("vertical/unit1.xml")),
            Err(CourseError::NotADiscussion { .. })
        ));

        write(tmp.path(), "pointer.xml", r#"<discussion url_name="forum"/>"#);
        let block = course.import_file(Path::new("pointer.xml")).unwrap();
        assert_eq!(block.discussion_category(), "From policy");
    }

    #[test]
    fn edits_replaced_by_legacy_sources_are_reported() {
        let tmp = legacy_course();
        write(tmp.path(), "pointer.xml", r#"<discussion url_name="forum"/>"#);
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        let mut block = course.import_file(Path::new("pointer.xml")).unwrap();
        block.edit_field("discussion_category", "New").unwrap();

        assert_eq!(
            course.legacy_overrides(&block, "discussion_category"),
            vec![
                LegacyOverride::Definition(PathBuf::from("discussion/forum.xml")),
                LegacyOverride::Policy("discussion/forum".to_string()),
            ]
        );

        write(tmp.path(), "pointer.xml", &block.to_olx().to_xml().unwrap());
        let reimported = course.import_file(Path::new("pointer.xml")).unwrap();
        assert_eq!(reimported.discussion_category(), "From policy");
    }

    #[test]
    fn edits_without_legacy_source_survive_reimport() {
        let tmp = legacy_course();
        write(tmp.path(), "pointer.xml", r#"<discussion url_name="forum"/>"#);
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        let mut block = course.import_file(Path::new("pointer.xml")).unwrap();
        block.edit_field("display_name", "Renamed").unwrap();
        assert!(course.legacy_overrides(&block, "display_name").is_empty());

        write(tmp.path(), "pointer.xml", &block.to_olx().to_xml().unwrap());
        let reimported = course.import_file(Path::new("pointer.xml")).unwrap();
        assert_eq!(reimported.display_name(), "Renamed");
        assert_eq!(reimported, block);
    }

    #[test]
    fn inline_blocks_have_no_legacy_overrides() {
        let tmp = legacy_course();
        write(
            tmp.path(),
            "inline.xml",
            r#"<discussion url_name="inline" discussion_category="Week 3"/>"#,
        );
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        let block = course.import_file(Path::new("inline.xml")).unwrap();
        assert!(course.legacy_overrides(&block, "discussion_category").is_empty());
    }

    #[test]
    fn malformed_config_fails_open() {
        let tmp = legacy_course();
        write(
            tmp.path(),
            ".discussion/config.toml",
            "_version = \"1\"\n[import]\nstrict_definitions = \"yes\"\n",
        );

        assert!(matches!(
            CourseDirectory::open(tmp.path().to_path_buf()),
            Err(CourseError::Config(_))
        ));
    }

    #[test]
    fn course_store_only_knows_its_own_course() {
        let tmp = legacy_course();
        let course = CourseDirectory::open(tmp.path().to_path_buf()).unwrap();

        let own = course.course().key.clone();
        let other = CourseKey::try_from("course-v1:edX+Other+2014").unwrap();
        assert!(course.get_course(&own).unwrap().is_some());
        assert!(course.get_course(&other).unwrap().is_none());
    }

    #[test]
    fn configured_policy_file_is_used() {
        let tmp = legacy_course();
        write(
            tmp.path(),
            "custom/policy.json",
            r#"{"discussion/forum": {"discussion_category": "Custom"}}"#,
        );
        let config = Config {
            policy_file: Some(PathBuf::from("custom/policy.json")),
            ..Config::default()
        };

        write(tmp.path(), "pointer.xml", r#"<discussion url_name="forum"/>"#);

        let course = CourseDirectory::open_with_config(tmp.path().to_path_buf(), config).unwrap();
        let block = course.import_file(Path::new("pointer.xml")).unwrap();
        assert_eq!(course.course().display_name, "Fallback");
        assert_eq!(block.discussion_category(), "Custom");
    }
}
