//! Reading and writing discussion blocks as OLX.
//!
//! Two on-disk layouts exist. The current one stores every field inline on
//! the `<discussion>` element. The legacy one stored only a pointer element
//! (`<discussion url_name="..."/>`, optionally with `id`/`for` attributes)
//! and kept the remaining fields in `discussion/{url_name}.xml`, with
//! course-wide overrides in `policy.json`. Import accepts both.

use std::{
    io,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tracing::instrument;

use crate::{
    domain::{CourseKey, DiscussionBlock, FieldError, KeyError, KeySegment, UsageKey},
    storage::{
        metadata::{ATTRIBUTE_TRANSLATIONS, Metadata},
        xml::{Element, XmlError},
    },
};

/// The element name and block type of discussion blocks.
pub const BLOCK_TYPE: &str = "discussion";

/// Namespace of child elements that carry field values.
const OPTION_NAMESPACE: &str = "http://code.edx.org/xblock/option";

/// What a host provides while importing OLX.
pub trait ImportRuntime {
    /// The course being imported.
    fn course_key(&self) -> &CourseKey;

    /// Read a file from the course export, relative to its root.
    ///
    /// # Errors
    ///
    /// Returns an error with kind [`io::ErrorKind::NotFound`] if the file
    /// does not exist, or any other I/O error if it cannot be read.
    fn read_resource(&self, path: &Path) -> io::Result<String>;

    /// The policy entry for a block, or an empty map if there is none.
    fn policy(&self, usage_id: &UsageKey) -> Map<String, Value>;
}

/// How import treats failures while loading a legacy definition file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Report unreadable or malformed definition files instead of treating
    /// them as absent.
    pub strict_definitions: bool,
}

impl DiscussionBlock {
    /// Builds a block from an OLX element.
    ///
    /// The element's own attributes and `option:` children are applied
    /// first. The legacy `id` and `for` attributes are then copied onto
    /// `discussion_id` and `discussion_target`. Finally, if the course
    /// export holds a legacy definition file for this block, its attributes
    /// and the block's policy entry are applied on top, with policy values
    /// winning.
    ///
    /// # Errors
    ///
    /// Returns an error if the element's `url_name` is not a valid block id,
    /// a field value cannot be stored, or (in strict mode) the definition
    /// file exists but cannot be loaded.
    #[instrument(level = "debug", skip_all, fields(url_name = node.attribute("url_name")))]
    pub fn parse_xml(
        node: &Element,
        runtime: &dyn ImportRuntime,
        options: ImportOptions,
    ) -> Result<Self, ImportError> {
        let mut block = base_parse(node, runtime)?;

        apply_translations_to_node_attributes(&mut block, node)?;
        apply_metadata_and_policy(&mut block, node, runtime, options)?;

        Ok(block)
    }

    /// Writes the block as an inline OLX element.
    ///
    /// Only explicitly set fields are written, followed by any preserved
    /// legacy attributes.
    #[must_use]
    pub fn to_olx(&self) -> Element {
        let mut element =
            Element::new(BLOCK_TYPE).with_attribute("url_name", self.usage_id().block_id());

        for (name, value) in self.explicit_fields() {
            element.set_attribute(name, value);
        }
        for (name, value) in self.xml_attributes() {
            if !element.has_attribute(name) {
                element.set_attribute(name.as_str(), value.as_str());
            }
        }

        element
    }
}

/// Stand-in for the generic block parser: assigns the usage id and sets
/// every declared field named by an attribute or an `option:` child.
fn base_parse(node: &Element, runtime: &dyn ImportRuntime) -> Result<DiscussionBlock, ImportError> {
    let block_id = match node.attribute("url_name") {
        Some(url_name) => KeySegment::try_from(url_name).map_err(KeyError::from)?,
        None => generate_block_id(),
    };
    let block_type = KeySegment::try_from(node.tag()).map_err(KeyError::from)?;
    let usage_id = runtime.course_key().make_usage_key(block_type, block_id);

    let mut block = DiscussionBlock::new(usage_id);

    let option_prefix = option_prefix(node);
    for child in node.children() {
        match child
            .tag()
            .split_once(':')
            .filter(|(prefix, _)| *prefix == option_prefix)
        {
            Some((_, name)) => {
                let value = if child.attribute("none") == Some("true") {
                    Value::Null
                } else {
                    Value::String(child.text().to_string())
                };
                set_field_if_present(&mut block, name, value)?;
            }
            None => tracing::debug!(
                "Ignoring child <{}> of {}: discussion blocks have no children",
                child.tag(),
                block.usage_id()
            ),
        }
    }

    let mut preserved = Map::new();
    for (name, value) in node.attributes() {
        if DiscussionBlock::field(name).is_some() {
            set_field_if_present(&mut block, name, Value::String(value.to_string()))?;
        } else if is_preserved_attribute(name) {
            preserved.insert(name.to_string(), Value::String(value.to_string()));
        }
    }
    if !preserved.is_empty() {
        let merged = merge_xml_attributes(&block, Value::Object(preserved));
        block.set_field("xml_attributes", merged)?;
    }

    Ok(block)
}

/// Whether an attribute with no matching field is kept in `xml_attributes`.
///
/// Identity attributes, the legacy aliases handled by the translation step
/// and namespace declarations are not.
fn is_preserved_attribute(name: &str) -> bool {
    !matches!(name, "url_name" | "slug" | "xmlns")
        && !name.starts_with("xmlns:")
        && !ATTRIBUTE_TRANSLATIONS
            .iter()
            .any(|&(legacy, _)| legacy == name)
}

/// The block's current `xml_attributes` with `incoming` entries added on top.
fn merge_xml_attributes(block: &DiscussionBlock, incoming: Value) -> Value {
    let mut merged: Map<String, Value> = block
        .xml_attributes()
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    if let Value::Object(incoming) = incoming {
        merged.extend(incoming);
    }
    Value::Object(merged)
}

fn generate_block_id() -> KeySegment {
    let id = uuid::Uuid::new_v4().simple().to_string();
    KeySegment::try_from(id.as_str()).expect("uuid hex is a valid key segment")
}

/// The prefix bound to the option namespace on `node`, defaulting to
/// `option`.
fn option_prefix(node: &Element) -> &str {
    node.attributes()
        .find_map(|(name, value)| {
            name.strip_prefix("xmlns:")
                .filter(|_| value == OPTION_NAMESPACE)
        })
        .unwrap_or("option")
}

fn set_field_if_present(
    block: &mut DiscussionBlock,
    name: &str,
    value: Value,
) -> Result<(), ImportError> {
    if DiscussionBlock::field(name).is_none() {
        return Ok(());
    }

    // Dictionary fields are serialized as JSON in OLX.
    let value = match value {
        Value::String(s) if name == "xml_attributes" => {
            serde_json::from_str(&s).map_err(|source| ImportError::Encoding {
                field: name.to_string(),
                source,
            })?
        }
        other => other,
    };

    block.set_field(name, value)?;
    Ok(())
}

/// Copy legacy inline attributes onto the fields that replaced them.
fn apply_translations_to_node_attributes(
    block: &mut DiscussionBlock,
    node: &Element,
) -> Result<(), ImportError> {
    for &(legacy, field) in ATTRIBUTE_TRANSLATIONS {
        if let Some(value) = node.attribute(legacy) {
            if DiscussionBlock::field(field).is_some() {
                tracing::debug!("Translating legacy attribute '{legacy}' to field '{field}'");
                block.set_field(field, Value::String(value.to_string()))?;
            }
        }
    }
    Ok(())
}

/// Load the legacy definition file for `block`, then apply it and the
/// block's policy entry.
fn apply_metadata_and_policy(
    block: &mut DiscussionBlock,
    node: &Element,
    runtime: &dyn ImportRuntime,
    options: ImportOptions,
) -> Result<(), ImportError> {
    let definition = match load_definition_xml(node, runtime) {
        Ok(Some(definition)) => definition,
        Ok(None) => {
            tracing::info!(
                "No definition XML for block {} - assuming inline export format",
                block.usage_id()
            );
            return Ok(());
        }
        Err(e) if !options.strict_definitions => {
            tracing::info!(
                "Error when trying to load definition XML for block {}: {e} - assuming inline \
                 export format",
                block.usage_id()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut metadata = Metadata::from_definition(&definition);
    metadata.apply_policy(&runtime.policy(block.usage_id()));

    for (name, value) in metadata.into_field_values() {
        if DiscussionBlock::field(&name).is_none() {
            continue;
        }
        let value = if name == "xml_attributes" {
            merge_xml_attributes(block, value)
        } else {
            value
        };
        block.set_field(&name, value)?;
    }

    Ok(())
}

/// The relative path of the legacy definition file for `node`.
///
/// Returns `None` when the element has no `url_name` (or legacy `slug`).
#[must_use]
pub fn definition_path(node: &Element) -> Option<PathBuf> {
    let url_name = node.attribute("url_name").or_else(|| node.attribute("slug"))?;
    let pathname = url_name.replace(':', "/");
    Some(PathBuf::from(node.tag()).join(format!("{pathname}.xml")))
}

/// Load the legacy definition file for `node`.
///
/// Returns `Ok(None)` when the element names no file or the file does not
/// exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_definition_xml(
    node: &Element,
    runtime: &dyn ImportRuntime,
) -> Result<Option<Element>, DefinitionError> {
    let Some(path) = definition_path(node) else {
        return Ok(None);
    };

    let content = match runtime.read_resource(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(DefinitionError::Io { path, source }),
    };

    Element::parse(&content)
        .map(Some)
        .map_err(|source| DefinitionError::Xml { path, source })
}

/// Errors that can occur while loading a legacy definition file.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path relative to the course root.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// The file is not valid XML.
    #[error("failed to parse {}: {source}", path.display())]
    Xml {
        /// Path relative to the course root.
        path: PathBuf,
        /// The underlying error.
        source: XmlError,
    },
}

/// Errors that can occur while importing a discussion block.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The element does not identify a valid usage.
    #[error("invalid block id: {0}")]
    Key(#[from] KeyError),

    /// A field value could not be stored.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// A field value is not valid JSON where JSON is required.
    #[error("field '{field}' is not valid JSON: {source}")]
    Encoding {
        /// Name of the field.
        field: String,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// The legacy definition file could not be loaded.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}
