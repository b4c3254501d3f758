use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {action} {path}: {source}")]
    IoAt {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not convert {path}: {message}")]
    Conversion { path: PathBuf, message: String },

    #[error("Could not decode metadata of {path} as {type_name}: {message}")]
    MetadataDecode {
        path: PathBuf,
        type_name: &'static str,
        message: String,
    },

    #[error("Invalid date '{value}' in file: {path}")]
    InvalidDate { path: PathBuf, value: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("TOML parse error in {path}: {message}")]
    TomlParse { path: PathBuf, message: String },

    #[error("YAML parse error in {path}: {message}")]
    YamlParse { path: PathBuf, message: String },

    #[error("Invalid frontmatter in file: {path}")]
    InvalidFrontmatter { path: PathBuf },

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },

    #[error("Fetch failed: {message}")]
    Fetch { message: String },

    #[error("Render error for {path}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

pub type Result<T> = std::result::Result<T, TesseraError>;

pub trait IoContext<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| TesseraError::IoAt {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_context_keeps_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let error = result
            .io_context("reading", Path::new("content/a.md"))
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("reading"));
        assert!(message.contains("content/a.md"));
    }
}
