//! Field metadata read from legacy definition files and policy documents.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{domain::DiscussionBlock, storage::xml::Element};

/// Legacy attribute names on an inline discussion element and the fields
/// they now populate.
pub const ATTRIBUTE_TRANSLATIONS: &[(&str, &str)] =
    &[("id", "discussion_id"), ("for", "discussion_target")];

/// Legacy names shared by all definition-file blocks.
const INHERITED_TRANSLATIONS: &[(&str, &str)] = &[("slug", "url_name"), ("name", "display_name")];

/// Attributes that are never loaded from a definition file.
const METADATA_TO_STRIP: &[&str] = &[
    "data_dir",
    "tabs",
    "grading_policy",
    "discussion_blackouts",
    "course",
    "org",
    "url_name",
    "filename",
    "xml_attributes",
];

/// Map a legacy attribute name to its current name.
#[must_use]
pub fn translate(name: &str) -> &str {
    INHERITED_TRANSLATIONS
        .iter()
        .chain(ATTRIBUTE_TRANSLATIONS)
        .find_map(|&(legacy, current)| (legacy == name).then_some(current))
        .unwrap_or(name)
}

/// Field values collected from a definition file and policy document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Values for declared fields of the block.
    pub fields: BTreeMap<String, Value>,
    /// Everything else, kept verbatim for export.
    pub xml_attributes: BTreeMap<String, String>,
}

impl Metadata {
    /// Read metadata from the attributes of a definition element.
    ///
    /// Attribute names are translated, stripped names are dropped, and
    /// values holding a JSON string or `null` are decoded.
    #[must_use]
    pub fn from_definition(definition: &Element) -> Self {
        let mut metadata = Self::default();
        for (name, value) in definition.attributes() {
            let name = translate(name);
            if METADATA_TO_STRIP.contains(&name) {
                continue;
            }
            if DiscussionBlock::field(name).is_some() {
                metadata.fields.insert(name.to_string(), decode(value));
            } else {
                metadata
                    .xml_attributes
                    .insert(name.to_string(), value.to_string());
            }
        }
        metadata
    }

    /// Overlay a policy document entry.
    ///
    /// Policy values win over values from the definition file. Unknown keys
    /// are kept as XML attributes.
    pub fn apply_policy(&mut self, policy: &Map<String, Value>) {
        for (name, value) in policy {
            let name = translate(name);
            if DiscussionBlock::field(name).is_some() {
                self.fields.insert(name.to_string(), value.clone());
            } else {
                self.xml_attributes
                    .insert(name.to_string(), attribute_string(value));
            }
        }
    }

    /// Fold the collected XML attributes into the field map.
    ///
    /// `xml_attributes` is itself a declared field, so after this call every
    /// entry of [`Metadata::fields`] names a field of the block.
    #[must_use]
    pub fn into_field_values(mut self) -> BTreeMap<String, Value> {
        if !self.xml_attributes.is_empty() {
            let attributes = self
                .xml_attributes
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            self.fields
                .insert("xml_attributes".to_string(), Value::Object(attributes));
        }
        self.fields
    }
}

/// Decode an attribute value of a string field.
///
/// JSON strings and `null` are decoded. Anything else, including text that
/// happens to parse as a number or array, is kept exactly as written.
fn decode(value: &str) -> Value {
    match serde_json::from_str(value) {
        Ok(decoded @ (Value::String(_) | Value::Null)) => decoded,
        _ => Value::String(value.to_string()),
    }
}

fn attribute_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
