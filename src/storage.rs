//! Reading course exports and rendering templates.

pub mod course;
/// Field metadata from legacy definition files and policy documents.
pub mod metadata;
pub mod olx;
pub mod templates;
pub mod xml;

pub use course::{CourseDirectory, CourseError, LegacyOverride, ScanEntry};
pub use metadata::Metadata;
pub use olx::{DefinitionError, ImportError, ImportOptions, ImportRuntime};
pub use templates::Templates;
pub use xml::{Element, XmlError};
