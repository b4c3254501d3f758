//! What stages and renderers get to see while the site is built.

use crate::error::Result;
use crate::io::FileIo;
use crate::item::{ErasedItem, Item, SharedItem};
use crate::paths::url_for;
use crate::registry::FileRegistry;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// `(content, relative output path) -> content`, applied to every rendered file.
pub type PostProcessor = Arc<dyn Fn(String, &Path) -> String + Send + Sync>;

/// Shared, read-only state handed to every step.
///
/// During the read phase `all_items` holds the items of the steps that have
/// already read; during the write phase it is the complete, sorted list.
pub struct SiteContext<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub registry: &'a FileRegistry,
    pub all_items: &'a [ErasedItem],
    pub(crate) io: &'a dyn FileIo,
    pub(crate) post_processors: &'a [PostProcessor],
}

impl SiteContext<'_> {
    pub fn io(&self) -> &dyn FileIo {
        self.io
    }

    /// Runs the post-processors over `content` and writes it below the output root.
    pub fn write(&self, relative: &Path, content: String) -> Result<()> {
        let content = self
            .post_processors
            .iter()
            .fold(content, |content, process| process(content, relative));
        trace!(file = %relative.display(), bytes = content.len(), "writing");
        self.io.write(&self.output.join(relative), &content)
    }
}

/// The input of a [`crate::Writer`]: one stage's items plus the site around them.
pub struct WriteContext<'a, M> {
    pub items: &'a [SharedItem<M>],
    pub site: &'a SiteContext<'a>,
    /// The stage folder; list and partition outputs are written below it.
    pub prefix: &'a Path,
}

/// Position of one page in a paginated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginator {
    /// Starts at 1.
    pub index: usize,
    pub items_per_page: usize,
    pub number_of_pages: usize,
    pub previous: Option<PathBuf>,
    pub next: Option<PathBuf>,
}

impl Paginator {
    pub fn previous_url(&self) -> Option<String> {
        self.previous.as_deref().map(url_for)
    }

    pub fn next_url(&self) -> Option<String> {
        self.next.as_deref().map(url_for)
    }
}

pub struct ItemContext<'a, M> {
    pub item: &'a Item<M>,
    /// The stage's items, sorted.
    pub items: &'a [SharedItem<M>],
    pub all_items: &'a [ErasedItem],
    pub previous: Option<&'a Item<M>>,
    pub next: Option<&'a Item<M>>,
    /// Absolute paths of unhandled files next to the item's source, e.g. its images.
    pub resources: Vec<PathBuf>,
}

pub struct ListContext<'a, M> {
    pub items: &'a [SharedItem<M>],
    pub all_items: &'a [ErasedItem],
    pub paginator: Option<Paginator>,
    pub output_path: PathBuf,
}

pub struct PartitionContext<'a, K, M> {
    pub key: &'a K,
    pub items: &'a [SharedItem<M>],
    pub all_items: &'a [ErasedItem],
    pub paginator: Option<Paginator>,
    pub output_path: PathBuf,
}

/// Context of a page that belongs to no stage, see [`crate::Site::create_page`].
pub struct PageContext<'a> {
    pub all_items: &'a [ErasedItem],
    pub output_path: PathBuf,
}

/// Contexts a feed can be rendered from.
pub trait FeedContext<M> {
    fn items(&self) -> &[SharedItem<M>];
    fn output_path(&self) -> &Path;
}

impl<M> FeedContext<M> for ListContext<'_, M> {
    fn items(&self) -> &[SharedItem<M>] {
        self.items
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl<K, M> FeedContext<M> for PartitionContext<'_, K, M> {
    fn items(&self) -> &[SharedItem<M>] {
        self.items
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;

    #[test]
    fn test_write_applies_post_processors_in_order() {
        let io = MemoryIo::new("/site");
        let registry = FileRegistry::default();
        let post_processors: Vec<PostProcessor> = vec![
            Arc::new(|content: String, _: &Path| content.to_uppercase()),
            Arc::new(|content: String, path: &Path| format!("{content} @ {}", path.display())),
        ];
        let site = SiteContext {
            input: Path::new("/site/content"),
            output: Path::new("/site/deploy"),
            registry: &registry,
            all_items: &[],
            io: &io,
            post_processors: &post_processors,
        };

        site.write(Path::new("a/index.html"), "hello".to_string()).unwrap();

        assert_eq!(
            io.written()[Path::new("/site/deploy/a/index.html")],
            "HELLO @ a/index.html"
        );
    }

    #[test]
    fn test_paginator_urls() {
        let paginator = Paginator {
            index: 2,
            items_per_page: 5,
            number_of_pages: 3,
            previous: Some(PathBuf::from("articles/page/1/index.html")),
            next: None,
        };
        assert_eq!(paginator.previous_url().as_deref(), Some("/articles/page/1/"));
        assert!(paginator.next_url().is_none());
    }
}
