use serde::Serialize;

/// A rendered piece of HTML handed back to the host page.
///
/// A fragment optionally names a client-side initializer which the host
/// invokes once the HTML has been inserted into the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Fragment {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    js_init_fn: Option<String>,
}

impl Fragment {
    /// Creates an empty fragment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append HTML to the fragment body.
    pub fn add_content(&mut self, html: &str) {
        self.content.push_str(html);
    }

    /// Register the client-side initializer for this fragment.
    ///
    /// Only one initializer is kept; a later call replaces the earlier one.
    pub fn initialize_js(&mut self, function_name: impl Into<String>) {
        self.js_init_fn = Some(function_name.into());
    }

    /// The HTML body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The client-side initializer, if any.
    #[must_use]
    pub fn js_init_fn(&self) -> Option<&str> {
        self.js_init_fn.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::Fragment;

    #[test]
    fn content_accumulates() {
        let mut fragment = Fragment::new();
        fragment.add_content("<div>");
        fragment.add_content("</div>");
        assert_eq!(fragment.content(), "<div></div>");
        assert_eq!(fragment.js_init_fn(), None);
    }

    #[test]
    fn serializes_initializer_only_when_present() {
        let mut fragment = Fragment::new();
        fragment.add_content("<p>hi</p>");
        assert_eq!(
            serde_json::to_value(&fragment).unwrap(),
            serde_json::json!({"content": "<p>hi</p>"})
        );

        fragment.initialize_js("DiscussionInlineBlock");
        assert_eq!(
            serde_json::to_value(&fragment).unwrap(),
            serde_json::json!({"content": "<p>hi</p>", "js_init_fn": "DiscussionInlineBlock"})
        );
    }
}
