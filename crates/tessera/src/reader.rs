use crate::error::Result;
use crate::frontmatter::Frontmatter;
use std::path::Path;

/// What a reader extracts from one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialItem {
    pub title: Option<String>,
    pub body: String,
    pub frontmatter: Option<Frontmatter>,
}

impl PartialItem {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_frontmatter(mut self, frontmatter: Frontmatter) -> Self {
        self.frontmatter = Some(frontmatter);
        self
    }
}

/// Turns a source file into a [`PartialItem`].
///
/// A stage asks its readers in registration order and uses the first one that
/// lists the file's extension. Extensions are lowercase and carry no dot.
pub trait Reader: Send + Sync {
    fn supported_extensions(&self) -> &[&str];

    /// Errors here are per file: the file is skipped with a warning and the build goes on.
    /// Readers report them as [`TesseraError::Conversion`](crate::TesseraError::Conversion).
    fn convert(&self, path: &Path) -> Result<PartialItem>;

    /// When true the source file is still copied to the output after the item is built.
    fn copies_source(&self) -> bool {
        false
    }

    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions().contains(&extension)
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "avif"];

/// Builds an item from a binary file without reading it, and lets the file
/// itself through to the output. Useful for photo pages.
#[derive(Debug, Clone, Copy)]
pub struct AssetReader {
    extensions: &'static [&'static str],
}

impl AssetReader {
    pub fn new(extensions: &'static [&'static str]) -> Self {
        Self { extensions }
    }

    pub fn images() -> Self {
        Self::new(IMAGE_EXTENSIONS)
    }
}

impl Default for AssetReader {
    fn default() -> Self {
        Self::images()
    }
}

impl Reader for AssetReader {
    fn supported_extensions(&self) -> &[&str] {
        self.extensions
    }

    fn convert(&self, path: &Path) -> Result<PartialItem> {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(PartialItem::default().with_title(title))
    }

    fn copies_source(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_reader() {
        let reader = AssetReader::images();
        assert!(reader.supports("png"));
        assert!(!reader.supports("md"));
        assert!(reader.copies_source());

        let partial = reader.convert(Path::new("/site/content/photos/beach.jpg")).unwrap();
        assert_eq!(partial.title.as_deref(), Some("beach"));
        assert!(partial.body.is_empty());
        assert!(partial.frontmatter.is_none());
    }
}
