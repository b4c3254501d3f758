use crate::paths::extension_of;
use std::path::Path;

/// Post-processor that minifies `.html` outputs, inline CSS and JS included.
/// Other files pass through untouched.
pub fn minify_html(content: String, path: &Path) -> String {
    if extension_of(path) != "html" {
        return content;
    }

    let mut cfg = minify_html::Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.keep_closing_tags = true;

    let minified = minify_html::minify(content.as_bytes(), &cfg);
    String::from_utf8(minified).unwrap_or(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minifies_html_only() {
        let html = "<html>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>\n".to_string();
        let minified = minify_html(html.clone(), Path::new("index.html"));
        assert!(minified.len() < html.len());
        assert!(minified.contains("<p>Hello</p>"));

        let xml = "<feed>\n  <title>x</title>\n</feed>\n".to_string();
        assert_eq!(minify_html(xml.clone(), Path::new("feed.xml")), xml);
    }
}
