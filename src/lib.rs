//! Inline Discussion Blocks
//!
//! A discussion block embeds a course forum topic in a unit. Blocks are
//! imported from OLX course exports, in both the current inline format and
//! the legacy format that kept fields in separate definition files.

pub mod domain;
pub use domain::{
    Config, ConfigHistory, CourseKey, DiscussionBlock, Fragment, ProgramsConfig, Services,
    UsageKey,
};

/// Course exports, OLX import and export, and template rendering.
pub mod storage;
pub use storage::{CourseDirectory, Element, ImportOptions, ImportRuntime, Templates};
