//! Template rendering backed by `minijinja`.

use std::{fs, io, path::PathBuf};

use minijinja::{Environment, ErrorKind};

use crate::domain::{
    services::{RenderError, TemplateRenderer},
    views::{AUTHOR_TEMPLATE, STUDENT_TEMPLATE},
};

const BUNDLED: &[(&str, &str)] = &[
    (
        STUDENT_TEMPLATE,
        include_str!("../../templates/discussion/_discussion_inline.html"),
    ),
    (
        AUTHOR_TEMPLATE,
        include_str!("../../templates/discussion/_discussion_inline_studio.html"),
    ),
];

/// Renders the bundled discussion templates.
///
/// Templates in the override directory, if one is set, take precedence
/// over bundled templates with the same name.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Create a renderer, optionally reading overrides from `override_dir`.
    #[must_use]
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_loader(move |name| {
            if let Some(dir) = &override_dir {
                match fs::read_to_string(dir.join(name)) {
                    Ok(source) => {
                        tracing::debug!("Loaded template {name} from {}", dir.display());
                        return Ok(Some(source));
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(minijinja::Error::new(
                            ErrorKind::InvalidOperation,
                            format!("could not read template override {name}"),
                        )
                        .with_source(e));
                    }
                }
            }
            Ok(BUNDLED
                .iter()
                .find_map(|&(bundled, source)| (bundled == name).then(|| source.to_string())))
        });
        Self { env }
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templates").finish_non_exhaustive()
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, RenderError> {
        let engine_error = |e: minijinja::Error| RenderError::Engine {
            name: template.to_string(),
            message: e.to_string(),
        };

        let tmpl = self.env.get_template(template).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => RenderError::NotFound(template.to_string()),
            _ => engine_error(e),
        })?;
        tmpl.render(context).map_err(engine_error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_bundled_student_template() {
        let html = Templates::default()
            .render(
                STUDENT_TEMPLATE,
                &json!({
                    "discussion_id": "disc42",
                    "course_id": "course-v1:edX+DemoX+2024",
                    "user": {"username": "alice"},
                    "course": {"display_name": "Demo <Course>"},
                    "can_create_thread": true,
                    "can_create_comment": false,
                    "can_create_subcomment": false,
                }),
            )
            .unwrap();

        assert!(html.contains(r#"data-discussion-id="disc42""#));
        assert!(html.contains(r#"data-user-create-comment="false""#));
        assert!(html.contains(r#"data-read-only="false""#));
        assert!(html.contains("Add a Post"));
        assert!(html.contains("Demo &lt;Course&gt;"));
    }

    #[test]
    fn anonymous_student_view_is_read_only() {
        let html = Templates::default()
            .render(
                STUDENT_TEMPLATE,
                &json!({
                    "discussion_id": "disc42",
                    "course_id": "course-v1:edX+DemoX+2024",
                    "user": null,
                    "course": null,
                    "can_create_thread": false,
                    "can_create_comment": false,
                    "can_create_subcomment": false,
                }),
            )
            .unwrap();

        assert!(html.contains(r#"data-read-only="true""#));
        assert!(!html.contains("Add a Post"));
    }

    #[test]
    fn overrides_take_precedence() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(AUTHOR_TEMPLATE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "custom {{ discussion_id }}").unwrap();

        let templates = Templates::new(Some(tmp.path().to_path_buf()));
        let html = templates
            .render(AUTHOR_TEMPLATE, &json!({"discussion_id": "disc42"}))
            .unwrap();
        assert_eq!(html, "custom disc42");

        let student = templates
            .render(
                STUDENT_TEMPLATE,
                &json!({"discussion_id": "disc42", "can_create_thread": false}),
            )
            .unwrap();
        assert!(student.contains("disc42"));
    }

    #[test]
    fn unknown_template_is_not_found() {
        let error = Templates::default()
            .render("discussion/missing.html", &json!({}))
            .unwrap_err();
        assert!(matches!(error, RenderError::NotFound(_)));
    }
}
