//! Capabilities a host runtime provides to discussion blocks.
//!
//! Blocks never look services up by name. The host hands them a
//! [`Services`] bundle holding the collaborators a view needs.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::Serialize;

use crate::domain::CourseKey;

/// The user currently interacting with a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Login name of the user.
    pub username: String,
}

impl User {
    /// Create a user with the given username.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// The course a block is rendered in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    /// Identifier of the course run.
    #[serde(serialize_with = "serialize_display")]
    pub key: CourseKey,
    /// Human-readable course title.
    pub display_name: String,
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: serde::Serializer,
{
    serializer.collect_str(value)
}

/// Forum actions that are gated per user and course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    /// Start a new thread.
    CreateThread,
    /// Reply to a thread.
    CreateComment,
    /// Reply to a comment.
    CreateSubcomment,
}

impl Permission {
    /// All forum permissions, in the order views query them.
    pub const ALL: [Self; 3] = [
        Self::CreateThread,
        Self::CreateComment,
        Self::CreateSubcomment,
    ];

    /// The name the permission service knows this permission by.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateThread => "create_thread",
            Self::CreateComment => "create_comment",
            Self::CreateSubcomment => "create_subcomment",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| UnknownPermissionError(s.to_string()))
    }
}

/// Error returned when parsing an unrecognised permission name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown permission '{0}': expected one of create_thread, create_comment, create_subcomment")]
pub struct UnknownPermissionError(String);

/// A failure reported by a host service.
#[derive(Debug, thiserror::Error)]
#[error("{service} service failed: {message}")]
pub struct ServiceError {
    service: &'static str,
    message: String,
}

impl ServiceError {
    /// Create an error attributed to the named service.
    #[must_use]
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Errors raised while rendering a template.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template is registered under the requested name.
    #[error("template '{0}' not found")]
    NotFound(String),

    /// The template engine rejected the template or its context.
    #[error("failed to render template '{name}': {message}")]
    Engine {
        /// Name of the template being rendered.
        name: String,
        /// Engine diagnostic.
        message: String,
    },
}

/// Resolves the user attached to the current request.
pub trait UserService {
    /// The current user, or `None` for anonymous requests.
    fn current_user(&self) -> Option<User>;
}

/// Answers forum permission checks.
pub trait PermissionService {
    /// Whether `user` may perform `permission` in `course`.
    ///
    /// # Errors
    ///
    /// Returns an error if the permission backend cannot answer.
    fn has_permission(
        &self,
        user: Option<&User>,
        permission: Permission,
        course: &CourseKey,
    ) -> Result<bool, ServiceError>;
}

/// Renders named templates against a JSON context.
pub trait TemplateRenderer {
    /// Render `template` with `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or fails to render.
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, RenderError>;
}

/// Looks courses up by key.
pub trait CourseStore {
    /// The course with the given key, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_course(&self, key: &CourseKey) -> Result<Option<Course>, ServiceError>;
}

/// The capabilities a block's views may use.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// User lookup. `None` when the host has no user service.
    pub users: Option<&'a dyn UserService>,
    /// Permission checks.
    pub permissions: &'a dyn PermissionService,
    /// Template rendering.
    pub templates: &'a dyn TemplateRenderer,
    /// Course lookup.
    pub courses: &'a dyn CourseStore,
}

impl fmt::Debug for Services<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("users", &self.users.is_some())
            .finish_non_exhaustive()
    }
}

/// A user service that always returns the same user.
#[derive(Debug, Clone, Default)]
pub struct StaticUser(pub Option<User>);

impl UserService for StaticUser {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}

/// A permission service backed by a fixed set of grants.
///
/// Anonymous users hold no permissions.
#[derive(Debug, Clone, Default)]
pub struct Grants(BTreeSet<Permission>);

impl Grants {
    /// Grant exactly the given permissions.
    #[must_use]
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self(permissions.into_iter().collect())
    }
}

impl PermissionService for Grants {
    fn has_permission(
        &self,
        user: Option<&User>,
        permission: Permission,
        _course: &CourseKey,
    ) -> Result<bool, ServiceError> {
        Ok(user.is_some() && self.0.contains(&permission))
    }
}
