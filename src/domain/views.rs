//! Student and author views of the discussion block.

use serde_json::json;
use tracing::instrument;

use crate::domain::{
    DiscussionBlock, Fragment,
    services::{Permission, RenderError, ServiceError, Services},
};

/// Template for the courseware view.
pub const STUDENT_TEMPLATE: &str = "discussion/_discussion_inline.html";
/// Template for the authoring preview.
pub const AUTHOR_TEMPLATE: &str = "discussion/_discussion_inline_studio.html";
/// Client-side initializer attached to the student view.
pub const JS_INIT_FN: &str = "DiscussionInlineBlock";

impl DiscussionBlock {
    /// Renders the view learners see in the courseware.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the host services fail or the template
    /// cannot be rendered.
    #[instrument(level = "debug", skip(self, services), fields(usage_id = %self.usage_id()))]
    pub fn student_view(&self, services: Services<'_>) -> Result<Fragment, ViewError> {
        let course_key = self.course_key();
        let course = services.courses.get_course(course_key)?;
        let user = services.users.and_then(|users| users.current_user());

        let can = |permission: Permission| {
            services
                .permissions
                .has_permission(user.as_ref(), permission, course_key)
        };

        let can_create_thread = can(Permission::CreateThread)?;
        let can_create_comment = can(Permission::CreateComment)?;
        let can_create_subcomment = can(Permission::CreateSubcomment)?;

        let context = json!({
            "discussion_id": self.discussion_id(),
            "user": user,
            "course": course,
            "course_id": course_key.to_string(),
            "can_create_thread": can_create_thread,
            "can_create_comment": can_create_comment,
            "can_create_subcomment": can_create_subcomment,
        });

        let mut fragment = Fragment::new();
        fragment.add_content(&services.templates.render(STUDENT_TEMPLATE, &context)?);
        fragment.initialize_js(JS_INIT_FN);
        Ok(fragment)
    }

    /// Renders the simplified view shown while editing a unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be rendered.
    #[instrument(level = "debug", skip(self, services), fields(usage_id = %self.usage_id()))]
    pub fn author_view(&self, services: Services<'_>) -> Result<Fragment, ViewError> {
        let context = json!({ "discussion_id": self.discussion_id() });

        let mut fragment = Fragment::new();
        fragment.add_content(&services.templates.render(AUTHOR_TEMPLATE, &context)?);
        Ok(fragment)
    }
}

/// Errors raised while rendering a view.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// A host service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The template could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
}
