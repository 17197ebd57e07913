use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use std::{collections::HashMap, sync::Arc};
use syntect::{
    highlighting::ThemeSet,
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::SyntaxSet,
    util::LinesWithEndings,
};
use tera::{Filter, Value};
use thiserror::Error;
use tracing::warn;

const HIGHLIGHT_THEME: &str = "InspiredGitHub";
const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error("Highlight theme {0} is not available")]
    MissingTheme(&'static str),
    #[error("Highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
}

/// Converts markdown with tables and fenced code blocks to HTML. Code is
/// highlighted with CSS classes; the matching stylesheet is
/// [`MarkdownRenderer::highlight_css`].
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    highlight_css: String,
}

impl MarkdownRenderer {
    pub fn new() -> Result<Self, MarkdownError> {
        let theme_set = ThemeSet::load_defaults();
        let theme = theme_set
            .themes
            .get(HIGHLIGHT_THEME)
            .ok_or(MarkdownError::MissingTheme(HIGHLIGHT_THEME))?;
        let highlight_css = css_for_theme_with_class_style(theme, ClassStyle::Spaced)?;

        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            highlight_css,
        })
    }

    #[must_use]
    pub fn highlight_css(&self) -> &str {
        &self.highlight_css
    }

    /// Raw HTML in the source is escaped and script-capable link targets are
    /// replaced, so the output can be embedded without further escaping.
    pub fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
        let parser = Parser::new_ext(markdown, options);

        let mut events = Vec::new();
        let mut code_block: Option<(Option<String>, String)> = None;

        for event in parser {
            if let Some((lang, code)) = &mut code_block {
                match event {
                    Event::Text(text) => code.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let highlighted = self.highlight(code, lang.as_deref())?;
                        events.push(Event::Html(CowStr::from(highlighted)));
                        code_block = None;
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_owned)
                        }
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some((lang, String::new()));
                }
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => events.push(Event::Start(Tag::Image {
                    link_type,
                    dest_url: safe_url(dest_url),
                    title,
                    id,
                })),
                event => events.push(event),
            }
        }

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());
        Ok(output)
    }

    /// Never fails: if conversion does, the source text is returned escaped.
    #[must_use]
    pub fn render_or_escape(&self, markdown: &str) -> String {
        rendered_or_escaped(markdown, self.render(markdown))
    }

    fn highlight(&self, code: &str, lang: Option<&str>) -> Result<String, MarkdownError> {
        let syntax = lang
            .and_then(|lang| self.syntax_set.find_syntax_by_token(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntax_set, ClassStyle::Spaced);
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }

        let class = lang.map_or_else(String::new, |lang| {
            format!(r#" class="language-{}""#, tera::escape_html(lang))
        });
        Ok(format!(
            r#"<div class="codehilite"><pre><code{class}>{}</code></pre></div>"#,
            generator.finalize()
        ))
    }
}

fn rendered_or_escaped(markdown: &str, rendered: Result<String, MarkdownError>) -> String {
    rendered.unwrap_or_else(|err| {
        warn!(%err, "Rendering markdown failed, falling back to plain text");
        tera::escape_html(markdown)
    })
}

fn safe_url(dest_url: CowStr<'_>) -> CowStr<'_> {
    let normalized: String = dest_url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| normalized.starts_with(scheme))
    {
        CowStr::Borrowed("#")
    } else {
        dest_url
    }
}

/// The `markdown` template filter. Its output is marked safe.
pub struct MarkdownFilter(pub Arc<MarkdownRenderer>);

impl Filter for MarkdownFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let markdown = tera::try_get_value!("markdown", "value", String, value);
        Ok(Value::String(self.0.render_or_escape(&markdown)))
    }

    fn is_safe(&self) -> bool {
        true
    }
}
