//! Domain models for inline discussions.
//!
//! This module contains the discussion block and its views, the course and
//! usage keys that locate it, the capabilities a host provides to it, and
//! the versioned programs configuration.

mod block;
pub use block::{DiscussionBlock, Field, FieldError, StudentViewData};

mod config;
pub use config::Config;

mod fragment;
pub use fragment::Fragment;

/// Course and usage key types and parsing.
pub mod keys;
pub use keys::{CourseKey, Error as KeyError, KeySegment, UsageKey};

/// Versioned programs configuration.
pub mod programs;
pub use programs::{ConfigError, ConfigHistory, ProgramsConfig};

pub mod services;
pub use services::Services;

pub mod views;
pub use views::ViewError;
