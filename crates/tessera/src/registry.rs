//! The source tree, scanned once, and who has claimed what.

use crate::error::Result;
use crate::io::FileIo;
use crate::item::ErasedItem;
use crate::paths::extension_of;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Operating system droppings that are never content.
pub const ALWAYS_IGNORED: &[&str] = &[".DS_Store", "Thumbs.db"];

pub struct FileRecord {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    /// The item a stage built from this file, if one claimed it.
    pub item: Option<ErasedItem>,
    /// Handled files are not copied to the output by the final pass.
    pub handled: bool,
}

impl FileRecord {
    /// Still available to a stage: nobody handled it and nobody built an item from it.
    pub fn is_available(&self) -> bool {
        !self.handled && self.item.is_none()
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FileRecord")
            .field("relative_path", &self.relative_path)
            .field("claimed", &self.item.is_some())
            .field("handled", &self.handled)
            .finish()
    }
}

/// A decision taken by a stage during its read phase, applied by the site afterwards.
pub struct Claim {
    pub index: usize,
    pub item: Option<ErasedItem>,
    pub handled: bool,
}

impl Claim {
    /// The file produced an accepted item.
    pub fn item(index: usize, item: ErasedItem, copy_source: bool) -> Self {
        Self {
            index,
            item: Some(item),
            handled: !copy_source,
        }
    }

    /// The file is consumed without producing an item, e.g. it failed to convert.
    pub fn handled(index: usize) -> Self {
        Self {
            index,
            item: None,
            handled: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct FileRegistry {
    records: Vec<FileRecord>,
}

impl FileRegistry {
    pub fn scan(io: &dyn FileIo, input: &Path, ignore: &[String]) -> Result<Self> {
        let records = io
            .find_files(input)?
            .into_iter()
            .filter(|path| !is_ignored(path, ignore))
            .filter_map(|path| {
                let relative_path = path.strip_prefix(input).ok()?.to_path_buf();
                Some(FileRecord {
                    path,
                    relative_path,
                    item: None,
                    handled: false,
                })
            })
            .collect::<Vec<_>>();

        debug!(count = records.len(), input = %input.display(), "scanned source files");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Available records inside `folder` whose extension passes `supported`, with
    /// their discovery index.
    pub fn candidates<'a>(
        &'a self,
        folder: Option<&'a Path>,
        supported: impl Fn(&str) -> bool + 'a,
    ) -> impl Iterator<Item = (usize, &'a FileRecord)> + 'a {
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, record)| {
                record.is_available()
                    && folder.is_none_or(|folder| record.relative_path.starts_with(folder))
                    && supported(&extension_of(&record.relative_path))
            })
    }

    /// Distinct immediate subfolders of `prefix` holding at least one file, at
    /// any depth, that passes `supported`. Sorted by name.
    pub fn subfolders(&self, prefix: &Path, supported: impl Fn(&str) -> bool) -> Vec<PathBuf> {
        let mut folders: Vec<PathBuf> = self
            .records
            .iter()
            .filter(|record| supported(&extension_of(&record.relative_path)))
            .filter_map(|record| {
                let rest = record.relative_path.strip_prefix(prefix).ok()?;
                let mut components = rest.components();
                let first = components.next()?;
                components.next()?;
                Some(prefix.join(first))
            })
            .collect();
        folders.sort();
        folders.dedup();
        folders
    }

    pub fn apply(&mut self, claims: Vec<Claim>) {
        for claim in claims {
            let Some(record) = self.records.get_mut(claim.index) else {
                continue;
            };
            if claim.item.is_some() {
                debug!(file = %record.relative_path.display(), "claimed");
                record.item = claim.item;
            }
            record.handled |= claim.handled;
        }
    }

    /// Records left for the final verbatim copy.
    pub fn unhandled(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter().filter(|record| !record.handled)
    }

    /// Unhandled files that sit in `folder` itself, not below it.
    pub fn resources_in(&self, folder: &Path) -> Vec<PathBuf> {
        self.unhandled()
            .filter(|record| record.relative_path.parent() == Some(folder))
            .map(|record| record.path.clone())
            .collect()
    }
}

fn is_ignored(path: &Path, ignore: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    ALWAYS_IGNORED.contains(&name) || ignore.iter().any(|ignored| ignored == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;
    use crate::item::{EmptyMetadata, Item};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn registry(files: &[&str]) -> FileRegistry {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let io = files
            .iter()
            .fold(MemoryIo::new("/site"), |io, file| io.file(format!("content/{file}"), date));
        FileRegistry::scan(&io, Path::new("/site/content"), &["drafts.txt".to_string()]).unwrap()
    }

    fn markdown(extension: &str) -> bool {
        extension == "md"
    }

    fn erased(title: &str) -> ErasedItem {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Arc::new(Item::new(title, date, EmptyMetadata {}))
    }

    #[test]
    fn test_scan_skips_ignored_files() {
        let registry = registry(&["a.md", ".DS_Store", "drafts.txt", "img/.DS_Store", "style.css"]);
        let relative: Vec<_> = registry
            .records()
            .iter()
            .map(|record| record.relative_path.clone())
            .collect();
        assert_eq!(relative, vec![PathBuf::from("a.md"), PathBuf::from("style.css")]);
    }

    #[test]
    fn test_candidates_match_folder_components() {
        let registry = registry(&["articles/a.md", "articles-old/b.md", "c.md", "articles/x.css"]);

        let scoped: Vec<_> = registry
            .candidates(Some(Path::new("articles")), markdown)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(scoped, vec![0]);

        let all: Vec<_> = registry
            .candidates(None, markdown)
            .map(|(_, record)| record.relative_path.clone())
            .collect();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_claims_remove_candidates() {
        let mut registry = registry(&["a.md", "b.md", "c.md"]);
        registry.apply(vec![
            Claim::item(0, erased("a"), false),
            Claim::handled(1),
            Claim::item(2, erased("c"), true),
        ]);

        assert_eq!(registry.candidates(None, markdown).count(), 0);
        let unhandled: Vec<_> = registry
            .unhandled()
            .map(|record| record.relative_path.clone())
            .collect();
        assert_eq!(unhandled, vec![PathBuf::from("c.md")]);
    }

    #[test]
    fn test_subfolders_need_supported_files() {
        let registry = registry(&[
            "folder/sub2/c.md",
            "folder/sub1/a.md",
            "folder/sub1/deep/b.md",
            "folder/empty/style.css",
            "folder/top.md",
        ]);

        assert_eq!(
            registry.subfolders(Path::new("folder"), markdown),
            vec![PathBuf::from("folder/sub1"), PathBuf::from("folder/sub2")]
        );
    }

    #[test]
    fn test_resources_are_unhandled_siblings() {
        let mut registry = registry(&["post/index.md", "post/photo.jpg", "post/deep/other.jpg"]);
        // Discovery order is post/deep/other.jpg, post/index.md, post/photo.jpg.
        registry.apply(vec![Claim::item(1, erased("post"), false)]);

        assert_eq!(
            registry.resources_in(Path::new("post")),
            vec![PathBuf::from("/site/content/post/photo.jpg")]
        );
    }
}
