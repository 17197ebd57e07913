use axum::response::Html;
use markdown::{MarkdownFilter, MarkdownRenderer};
use serde::Serialize;
use std::sync::Arc;
use tera::{Context, Tera};

pub mod markdown;
pub mod view;

/// HTML templates embedded in the binary and rendered with Tera.
pub struct TemplateRenderer {
    tera: Tera,
    markdown: Arc<MarkdownRenderer>,
}

impl TemplateRenderer {
    pub fn new(markdown: Arc<MarkdownRenderer>) -> tera::Result<Self> {
        // Autoescaping stays on for .html templates, only the markdown filter
        // emits trusted HTML.
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("base.html", include_str!("html/base.html")),
            ("macros.html", include_str!("html/macros.html")),
            ("post_list.html", include_str!("html/post_list.html")),
            ("index.html", include_str!("html/index.html")),
            ("category.html", include_str!("html/category.html")),
            ("detail.html", include_str!("html/detail.html")),
            ("post_form.html", include_str!("html/post_form.html")),
            ("register.html", include_str!("html/register.html")),
            ("login.html", include_str!("html/login.html")),
            ("admin.html", include_str!("html/admin.html")),
            ("admin_change.html", include_str!("html/admin_change.html")),
        ])?;

        tera.register_filter("markdown", MarkdownFilter(Arc::clone(&markdown)));

        Ok(Self { tera, markdown })
    }

    pub fn render(&self, template_name: &str, page: &impl Serialize) -> tera::Result<Html<String>> {
        let context = Context::from_serialize(page)?;
        Ok(Html(self.tera.render(template_name, &context)?))
    }

    #[must_use]
    pub fn highlight_css(&self) -> &str {
        self.markdown.highlight_css()
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::templates::{TemplateRenderer, markdown::MarkdownRenderer};
    use serde_json::json;
    use std::sync::Arc;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new(Arc::new(MarkdownRenderer::new().unwrap())).unwrap()
    }

    #[test]
    fn plain_fields_are_escaped_and_markdown_is_not() {
        let page = json!({
            "viewer": null,
            "post": {
                "id": 1,
                "title": "<script>alert(1)</script>",
                "body": "**bold**",
                "created_on": "March 7, 2026, 09:05",
                "last_modified": "March 7, 2026, 09:05",
                "categories": [],
            },
            "comments": [],
            "form": { "body": "" },
            "errors": {},
        });

        let html = renderer().render("detail.html", &page).unwrap().0;
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("Log in</a> to leave a comment."));
    }

    #[test]
    fn field_errors_are_listed() {
        let page = json!({
            "viewer": { "username": "ada", "is_staff": false },
            "username": "ada",
            "errors": { "password": ["This password is too short."] },
        });

        let html = renderer().render("register.html", &page).unwrap().0;
        assert!(html.contains(r#"<ul class="errorlist">"#));
        assert!(html.contains("<li>This password is too short.</li>"));
        assert!(html.contains("Signed in as ada"));
    }
}
