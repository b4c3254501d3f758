use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PAGE_PLACEHOLDER: &str = "[page]";
pub const KEY_PLACEHOLDER: &str = "[key]";

/// Where a converted source file lands in the output tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemWriteMode {
    /// `content/about.md` is written to `deploy/about.html`.
    KeepAsFile,
    /// `content/about.md` is written to `deploy/about/index.html`.
    #[default]
    MoveToSubfolder,
}

/// Lowercases and keeps ASCII letters, digits, `-` and `_`; any other run of
/// characters becomes a single `-`.
pub fn slugify(input: &str) -> String {
    input
        .replace(" - ", "-")
        .split(|character: char| {
            !(character.is_ascii_alphanumeric() || character == '-' || character == '_')
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn make_output_path(relative_source: &Path, mode: ItemWriteMode) -> PathBuf {
    let parent = relative_source.parent().unwrap_or(Path::new(""));
    let slug = slugify(&file_stem(relative_source));

    match mode {
        ItemWriteMode::KeepAsFile => parent.join(format!("{slug}.html")),
        ItemWriteMode::MoveToSubfolder if slug == "index" => parent.join("index.html"),
        ItemWriteMode::MoveToSubfolder => parent.join(slug).join("index.html"),
    }
}

/// Site-absolute url of an output path, without a trailing `index.html`.
pub fn url_for(relative_destination: &Path) -> String {
    let path = relative_destination.to_string_lossy().replace('\\', "/");
    let url = format!("/{}", path.trim_start_matches('/'));
    match url.strip_suffix("index.html") {
        Some(stripped) if stripped.ends_with('/') => stripped.to_string(),
        _ => url,
    }
}

pub fn substitute(template: &Path, placeholder: &str, value: &str) -> PathBuf {
    PathBuf::from(
        template
            .to_string_lossy()
            .replace(placeholder, value),
    )
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("one two"), "one-two");
        assert_eq!(slugify("one - two"), "one-two");
        assert_eq!(slugify("One Two"), "one-two");
        assert_eq!(slugify("One! .Two@"), "one-two");
        assert_eq!(slugify("one-two"), "one-two");
        assert_eq!(slugify("one_two"), "one_two");
        assert_eq!(slugify("ONE-TWO"), "one-two");
        assert_eq!(slugify("2024"), "2024");
    }

    #[test]
    fn test_output_path_modes() {
        let source = Path::new("articles/Hello World.md");
        assert_eq!(
            make_output_path(source, ItemWriteMode::KeepAsFile),
            PathBuf::from("articles/hello-world.html")
        );
        assert_eq!(
            make_output_path(source, ItemWriteMode::MoveToSubfolder),
            PathBuf::from("articles/hello-world/index.html")
        );
        assert_eq!(
            make_output_path(Path::new("index.md"), ItemWriteMode::MoveToSubfolder),
            PathBuf::from("index.html")
        );
    }

    #[test]
    fn test_url_for() {
        assert_eq!(url_for(Path::new("index.html")), "/");
        assert_eq!(url_for(Path::new("articles/a/index.html")), "/articles/a/");
        assert_eq!(url_for(Path::new("about.html")), "/about.html");
        assert_eq!(url_for(Path::new("feed.xml")), "/feed.xml");
    }

    #[test]
    fn test_substitute() {
        let template = Path::new("tag/[key]/page/[page]/index.html");
        let keyed = substitute(template, KEY_PLACEHOLDER, "rust");
        assert_eq!(
            substitute(&keyed, PAGE_PLACEHOLDER, "2"),
            PathBuf::from("tag/rust/page/2/index.html")
        );
    }
}
