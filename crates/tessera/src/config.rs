use crate::error::{IoContext, Result, TesseraError};
use crate::io::{DiskIo, FileIo};
use crate::paths::ItemWriteMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "tessera.toml";

/// Contents of `tessera.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub title: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_templates")]
    pub templates: PathBuf,
    /// File names skipped by the scan, on top of OS metadata files.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub minify: bool,
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

/// One markdown stage, registered in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Relative to the input folder; may end in `/**`. Empty means the whole input.
    #[serde(default)]
    pub folder: Option<PathBuf>,
    #[serde(default)]
    pub write_mode: ItemWriteMode,
    #[serde(default)]
    pub publication_date_in_filename: bool,
    /// Items with `draft = true` are claimed and skipped.
    #[serde(default)]
    pub skip_drafts: bool,
    pub item_template: Option<String>,
    pub list_template: Option<String>,
    #[serde(default)]
    pub list_output: Option<PathBuf>,
    pub paginate: Option<usize>,
    pub tag_template: Option<String>,
    pub year_template: Option<String>,
    /// Output path of an Atom feed of the section, relative to the section folder.
    pub feed: Option<PathBuf>,
}

/// A page rendered from the whole site, such as a home page or a 404 page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub output: PathBuf,
    pub template: String,
}

fn default_input() -> PathBuf {
    PathBuf::from("content")
}

fn default_output() -> PathBuf {
    PathBuf::from("deploy")
}

fn default_templates() -> PathBuf {
    PathBuf::from("templates")
}

impl SiteConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Err(TesseraError::ConfigNotFound { path: config_path });
        }

        let content =
            fs::read_to_string(&config_path).io_context("reading config", &config_path)?;
        let mut config: SiteConfig =
            toml::from_str(&content).map_err(|error| TesseraError::TomlParse {
                path: config_path.clone(),
                message: error.to_string(),
            })?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(config)
    }

    /// Walks up from `start` to the project root and loads its config.
    pub fn discover(start: &Path) -> Result<(PathBuf, Self)> {
        let root = DiskIo.resolve_root(start)?;
        let config = Self::load(&root)?;
        Ok((root, config))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
title = "Test Site"
base_url = "https://example.com/"

[[sections]]
folder = "articles"
write_mode = "keep_as_file"
item_template = "article.html"
paginate = 5
"#,
        )
        .unwrap();

        let config = SiteConfig::load(dir.path()).unwrap();
        assert_eq!(config.title, "Test Site");
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.input, PathBuf::from("content"));
        assert_eq!(config.output, PathBuf::from("deploy"));
        assert!(!config.minify);
        assert_eq!(config.sections.len(), 1);
        assert_eq!(config.sections[0].write_mode, ItemWriteMode::KeepAsFile);
        assert_eq!(config.sections[0].paginate, Some(5));
        assert!(config.sections[0].list_template.is_none());
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let result = SiteConfig::load(dir.path());
        assert!(matches!(result, Err(TesseraError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "title = ").unwrap();
        let result = SiteConfig::load(dir.path());
        assert!(matches!(result, Err(TesseraError::TomlParse { .. })));
    }

    #[test]
    fn test_discover_from_subfolder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "title = \"Nested\"").unwrap();
        fs::create_dir_all(dir.path().join("content/articles")).unwrap();

        let (root, config) = SiteConfig::discover(&dir.path().join("content/articles")).unwrap();
        assert_eq!(root, dir.path());
        assert_eq!(config.title, "Nested");
    }

    #[test]
    fn test_base_url_override() {
        let config: SiteConfig = toml::from_str("title = \"x\"").unwrap();
        let config = config.with_base_url("https://override.com/");
        assert_eq!(config.base_url, "https://override.com");
    }
}
