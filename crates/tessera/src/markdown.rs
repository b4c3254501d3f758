//! A [`Reader`] for Markdown files with TOML or YAML frontmatter.

use crate::error::{IoContext, Result, TesseraError};
use crate::frontmatter::Frontmatter;
use crate::reader::{PartialItem, Reader};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

const DEFAULT_THEME: &str = "base16-ocean.dark";

pub struct MarkdownReader {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme: String,
}

impl Default for MarkdownReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReader {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme: DEFAULT_THEME.to_string(),
        }
    }

    /// Uses another of syntect's bundled themes for code blocks. Unknown names
    /// fall back to the default theme.
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    /// Renders `content` to HTML and returns it with the text of the first level one heading.
    pub fn render(&self, content: &str) -> (String, Option<String>) {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        let mut html_output = String::new();
        let mut title: Option<String> = None;
        let mut in_title = false;
        let mut code_block: Option<(Option<String>, String)> = None;

        for event in Parser::new_ext(content, options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        CodeBlockKind::Fenced(language) if !language.is_empty() => {
                            Some(language.to_string())
                        }
                        _ => None,
                    };
                    code_block = Some((language, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, code)) = code_block.take() {
                        html_output.push_str(&self.highlight(language.as_deref(), &code));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    }
                }
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) if title.is_none() => {
                    in_title = true;
                    title = Some(String::new());
                    push_event(&mut html_output, event);
                }
                Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_title => {
                    in_title = false;
                    push_event(&mut html_output, event);
                }
                Event::Text(ref text) | Event::Code(ref text) if in_title => {
                    if let Some(title) = title.as_mut() {
                        title.push_str(text);
                    }
                    push_event(&mut html_output, event);
                }
                other => push_event(&mut html_output, other),
            }
        }

        let title = title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());
        (html_output, title)
    }

    fn highlight(&self, language: Option<&str>, code: &str) -> String {
        let Some(language) = language else {
            return format!("<pre><code>{}</code></pre>", escape_html(code));
        };

        let theme = self
            .theme_set
            .themes
            .get(&self.theme)
            .or_else(|| self.theme_set.themes.get(DEFAULT_THEME));

        match (self.syntax_set.find_syntax_by_token(language), theme) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
                    .unwrap_or_else(|_| format!("<pre><code>{}</code></pre>", escape_html(code)))
            }
            _ => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_html(language),
                escape_html(code)
            ),
        }
    }

    fn read_document(&self, path: &Path) -> Result<PartialItem> {
        let content = fs::read_to_string(path).io_context("reading", path)?;
        let (frontmatter, body) = split_frontmatter(&content, path)?;
        let (html, heading) = self.render(&body);

        let title = frontmatter.get("title").cloned().or(heading);
        let mut partial = PartialItem::new(html).with_frontmatter(frontmatter);
        partial.title = title;
        Ok(partial)
    }
}

impl Reader for MarkdownReader {
    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn convert(&self, path: &Path) -> Result<PartialItem> {
        self.read_document(path)
            .map_err(|error| TesseraError::Conversion {
                path: path.to_path_buf(),
                message: error.to_string(),
            })
    }
}

fn push_event(html_output: &mut String, event: Event<'_>) {
    pulldown_cmark::html::push_html(html_output, std::iter::once(event));
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Splits a document into flattened frontmatter and the markdown body.
///
/// `+++` fences hold TOML, `---` fences hold YAML. Scalars become their string
/// form, arrays become comma separated lists.
pub fn split_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let content = content.replace("\r\n", "\n");
    let content = content.trim_start();

    if let Some(rest) = content.strip_prefix("+++") {
        let (raw, body) = fenced(rest, "+++", path)?;
        let table: toml::Table = toml::from_str(raw).map_err(|error| TesseraError::TomlParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        let frontmatter = table
            .into_iter()
            .map(|(key, value)| (key, flatten_toml(&value)))
            .collect();
        Ok((frontmatter, body))
    } else if let Some(rest) = content.strip_prefix("---") {
        let (raw, body) = fenced(rest, "---", path)?;
        let mapping: BTreeMap<String, serde_json::Value> =
            serde_yml::from_str(raw).map_err(|error| TesseraError::YamlParse {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;
        let frontmatter = mapping
            .into_iter()
            .map(|(key, value)| (key, flatten_json(&value)))
            .collect();
        Ok((frontmatter, body))
    } else {
        Ok((Frontmatter::new(), content.to_string()))
    }
}

fn fenced<'a>(rest: &'a str, delimiter: &str, path: &Path) -> Result<(&'a str, String)> {
    let (start, end) = find_closing_delimiter(rest, delimiter).ok_or_else(|| {
        TesseraError::InvalidFrontmatter {
            path: path.to_path_buf(),
        }
    })?;
    Ok((&rest[..start], rest[end..].trim().to_string()))
}

/// Returns the byte range of the closing fence line, including its line break.
fn find_closing_delimiter(content: &str, delimiter: &str) -> Option<(usize, usize)> {
    let mut position = 0;
    for line in content.split_inclusive('\n') {
        if position > 0 && line.trim() == delimiter {
            return Some((position, position + line.len()));
        }
        position += line.len();
    }
    None
}

fn flatten_toml(value: &toml::Value) -> String {
    match value {
        toml::Value::String(text) => text.clone(),
        toml::Value::Array(values) => values.iter().map(flatten_toml).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn flatten_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(values) => values.iter().map(flatten_json).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
