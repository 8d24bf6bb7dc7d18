use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::{CourseKey, UsageKey};

const DEFAULT_DISPLAY_NAME: &str = "Discussion";
const DEFAULT_CATEGORY: &str = "Week 1";
const DEFAULT_TARGET: &str = "Topic-Level Student-Visible Label";

/// Provides a discussion forum that is inline with other course content.
///
/// Field values that were never set fall back to their defaults. The
/// difference matters on export, where only explicitly set fields are
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionBlock {
    usage_id: UsageKey,
    default_discussion_id: String,
    discussion_id: Option<String>,
    display_name: Option<String>,
    discussion_category: Option<String>,
    discussion_target: Option<String>,
    sort_key: Option<String>,
    xml_attributes: BTreeMap<String, String>,
}

impl DiscussionBlock {
    /// Create a block with every field at its default.
    ///
    /// The default `discussion_id` is derived from the usage id, so a block
    /// loaded twice from the same content gets the same topic.
    #[must_use]
    pub fn new(usage_id: UsageKey) -> Self {
        let default_discussion_id = unique_id(&usage_id, "discussion_id");
        Self {
            usage_id,
            default_discussion_id,
            discussion_id: None,
            display_name: None,
            discussion_category: None,
            discussion_target: None,
            sort_key: None,
            xml_attributes: BTreeMap::new(),
        }
    }

    /// The host-assigned identifier of this usage.
    #[must_use]
    pub const fn usage_id(&self) -> &UsageKey {
        &self.usage_id
    }

    /// The course this block lives in.
    #[must_use]
    pub const fn course_key(&self) -> &CourseKey {
        self.usage_id.course_key()
    }

    /// The forum topic this block shows.
    #[must_use]
    pub fn discussion_id(&self) -> &str {
        self.discussion_id
            .as_deref()
            .unwrap_or(&self.default_discussion_id)
    }

    /// Display name for this component.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    /// The category shown in the left pane of the course forum.
    #[must_use]
    pub fn discussion_category(&self) -> &str {
        self.discussion_category
            .as_deref()
            .unwrap_or(DEFAULT_CATEGORY)
    }

    /// The subcategory shown in the left pane of the course forum.
    #[must_use]
    pub fn discussion_target(&self) -> &str {
        self.discussion_target.as_deref().unwrap_or(DEFAULT_TARGET)
    }

    /// Ordering hint used by the forum when listing topics.
    #[must_use]
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Attributes from legacy content that map to no field.
    ///
    /// These are kept so that export writes them back unchanged.
    #[must_use]
    pub const fn xml_attributes(&self) -> &BTreeMap<String, String> {
        &self.xml_attributes
    }

    /// Set the forum topic id.
    pub fn set_discussion_id(&mut self, value: impl Into<String>) {
        self.discussion_id = Some(value.into());
    }

    /// Set the display name.
    pub fn set_display_name(&mut self, value: impl Into<String>) {
        self.display_name = Some(value.into());
    }

    /// Set the forum category.
    pub fn set_discussion_category(&mut self, value: impl Into<String>) {
        self.discussion_category = Some(value.into());
    }

    /// Set the forum subcategory.
    pub fn set_discussion_target(&mut self, value: impl Into<String>) {
        self.discussion_target = Some(value.into());
    }

    /// Set or clear the sort key.
    pub fn set_sort_key(&mut self, value: Option<String>) {
        self.sort_key = value;
    }

    /// Look up a declared field by name.
    #[must_use]
    pub fn field(name: &str) -> Option<&'static Field> {
        FIELDS.iter().find(|field| field.name == name)
    }

    /// All declared fields, in declaration order.
    #[must_use]
    pub const fn fields() -> &'static [Field] {
        &FIELDS
    }

    /// The fields authors may change from the editing UI.
    pub fn editable_fields() -> impl Iterator<Item = &'static Field> {
        FIELDS.iter().filter(|field| field.editable)
    }

    /// Assign a JSON value to the field called `name`.
    ///
    /// `null` resets the field to its default.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a declared field or `value` has a
    /// shape the field cannot hold.
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let field = Self::field(name).ok_or_else(|| FieldError::Unknown(name.to_string()))?;
        (field.set)(self, value)
    }

    /// The effective value of the field called `name`.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<Value> {
        Self::field(name).map(|field| (field.get)(self))
    }

    /// Change an author-editable field from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown or not editable by authors.
    pub fn edit_field(&mut self, name: &str, value: &str) -> Result<(), FieldError> {
        let field = Self::field(name).ok_or_else(|| FieldError::Unknown(name.to_string()))?;
        if !field.editable {
            return Err(FieldError::NotEditable(name.to_string()));
        }
        (field.set)(self, Value::String(value.to_string()))
    }

    /// Fields that hold an explicitly set value, as strings.
    ///
    /// `xml_attributes` is not included.
    pub fn explicit_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("discussion_id", self.discussion_id.as_deref()),
            ("display_name", self.display_name.as_deref()),
            ("discussion_category", self.discussion_category.as_deref()),
            ("discussion_target", self.discussion_target.as_deref()),
            ("sort_key", self.sort_key.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
    }

    /// Data describing the student view, for consumers such as mobile apps.
    #[must_use]
    pub fn student_view_data(&self) -> StudentViewData {
        StudentViewData {
            topic_id: self.discussion_id().to_string(),
        }
    }
}

/// Derive a stable unique token for a field of the given usage.
fn unique_id(usage_id: &UsageKey, field: &str) -> String {
    let hash = Sha256::digest(format!("settings/{usage_id}/{field}"));
    let hex = format!("{hash:x}");
    hex[..32].to_string()
}

/// The structured representation of a block's student view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentViewData {
    /// The forum topic shown by the block.
    pub topic_id: String,
}

/// A declared field of [`DiscussionBlock`].
///
/// Fields are looked up by name when applying legacy metadata and when
/// authors edit a block.
pub struct Field {
    /// The field name as it appears in OLX and policy documents.
    pub name: &'static str,
    /// Label shown in the editing UI.
    pub display_name: Option<&'static str>,
    /// Help text shown in the editing UI.
    pub help: Option<&'static str>,
    /// Whether authors may change the field from the editing UI.
    pub editable: bool,
    get: fn(&DiscussionBlock) -> Value,
    set: fn(&mut DiscussionBlock, Value) -> Result<(), FieldError>,
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("editable", &self.editable)
            .finish_non_exhaustive()
    }
}

static FIELDS: [Field; 6] = [
    Field {
        name: "discussion_id",
        display_name: None,
        help: None,
        editable: false,
        get: |block| Value::String(block.discussion_id().to_string()),
        set: |block, value| {
            block.discussion_id = string_value("discussion_id", value)?;
            Ok(())
        },
    },
    Field {
        name: "display_name",
        display_name: Some("Display Name"),
        help: Some("Display name for this component"),
        editable: true,
        get: |block| Value::String(block.display_name().to_string()),
        set: |block, value| {
            block.display_name = string_value("display_name", value)?;
            Ok(())
        },
    },
    Field {
        name: "discussion_category",
        display_name: Some("Category"),
        help: Some(
            "A category name for the discussion. This name appears in the left pane of the \
             discussion forum for the course.",
        ),
        editable: true,
        get: |block| Value::String(block.discussion_category().to_string()),
        set: |block, value| {
            block.discussion_category = string_value("discussion_category", value)?;
            Ok(())
        },
    },
    Field {
        name: "discussion_target",
        display_name: Some("Subcategory"),
        help: Some(
            "A subcategory name for the discussion. This name appears in the left pane of the \
             discussion forum for the course.",
        ),
        editable: true,
        get: |block| Value::String(block.discussion_target().to_string()),
        set: |block, value| {
            block.discussion_target = string_value("discussion_target", value)?;
            Ok(())
        },
    },
    Field {
        name: "sort_key",
        display_name: None,
        help: None,
        editable: false,
        get: |block| block.sort_key().map_or(Value::Null, |key| Value::String(key.to_string())),
        set: |block, value| {
            block.sort_key = string_value("sort_key", value)?;
            Ok(())
        },
    },
    Field {
        name: "xml_attributes",
        display_name: None,
        help: None,
        editable: false,
        get: |block| {
            Value::Object(
                block
                    .xml_attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )
        },
        set: |block, value| {
            block.xml_attributes = match value {
                Value::Null => BTreeMap::new(),
                Value::Object(map) => map
                    .into_iter()
                    .map(|(k, v)| {
                        let v = string_value("xml_attributes", v)?.unwrap_or_default();
                        Ok((k, v))
                    })
                    .collect::<Result<_, FieldError>>()?,
                other => return Err(FieldError::invalid("xml_attributes", "an object", &other)),
            };
            Ok(())
        },
    },
];

/// Coerce a JSON value into the contents of a string field.
///
/// `None` means "reset to default".
fn string_value(field: &'static str, value: Value) -> Result<Option<String>, FieldError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(FieldError::invalid(field, "a string", &other)),
    }
}

/// Errors raised when assigning block fields by name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FieldError {
    /// The block declares no field with this name.
    #[error("'{0}' is not a field of the discussion block")]
    Unknown(String),

    /// The field exists but authors may not change it.
    #[error("field '{0}' is not editable")]
    NotEditable(String),

    /// The value cannot be stored in the field.
    #[error("field '{field}' expects {expected}, got {found}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// What the field accepts.
        expected: &'static str,
        /// The JSON type that was supplied.
        found: &'static str,
    },
}

impl FieldError {
    const fn invalid(field: &'static str, expected: &'static str, value: &Value) -> Self {
        let found = match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        Self::InvalidValue {
            field,
            expected,
            found,
        }
    }
}
