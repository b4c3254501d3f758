//! Processing stages: what to read, how to keep it, and how to write it.

use crate::context::{PageContext, SiteContext, WriteContext};
use crate::error::{Result, TesseraError};
use crate::frontmatter::{decode_metadata, parse_date};
use crate::io::FileIo;
use crate::item::{ErasedItem, Item, Metadata, SharedItem};
use crate::paths::{ItemWriteMode, extension_of, make_output_path};
use crate::reader::Reader;
use crate::registry::{Claim, FileRecord};
use crate::writer::Writer;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rayon::prelude::*;
use std::any::type_name;
use std::cmp::Ordering;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

type Processor<M> = Arc<dyn Fn(&mut Item<M>) + Send + Sync>;
type Predicate<M> = Arc<dyn Fn(&Item<M>) -> bool + Send + Sync>;
type Comparator<M> = Arc<dyn Fn(&Item<M>, &Item<M>) -> Ordering + Send + Sync>;
type FetchFuture<M> = Pin<Box<dyn Future<Output = Result<Vec<Item<M>>>> + Send>>;
type Fetcher<M> = Box<dyn Fn() -> FetchFuture<M> + Send + Sync>;

/// What happens to files whose item a stage filters out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludedItems {
    /// The file is handled: no later stage sees it and it is not copied.
    Claim,
    /// The file stays available to later stages and to the final copy.
    Release,
}

/// A file-driven stage. Build it with the methods below and hand it to
/// [`crate::Site::register`].
///
/// A folder ending in `/**` or `/*` is expanded at registration into one stage per
/// subfolder, so item lists and neighbours never cross subfolders.
pub struct Stage<M> {
    folder: Option<PathBuf>,
    readers: Vec<Arc<dyn Reader>>,
    processors: Vec<Processor<M>>,
    filter: Option<(Predicate<M>, ExcludedItems)>,
    write_mode: ItemWriteMode,
    sort: Option<Comparator<M>>,
    writers: Vec<Arc<dyn Writer<M>>>,
}

impl<M> Clone for Stage<M> {
    fn clone(&self) -> Self {
        Self {
            folder: self.folder.clone(),
            readers: self.readers.clone(),
            processors: self.processors.clone(),
            filter: self.filter.clone(),
            write_mode: self.write_mode,
            sort: self.sort.clone(),
            writers: self.writers.clone(),
        }
    }
}

impl<M> Default for Stage<M> {
    fn default() -> Self {
        Self {
            folder: None,
            readers: Vec::new(),
            processors: Vec::new(),
            filter: None,
            write_mode: ItemWriteMode::default(),
            sort: None,
            writers: Vec::new(),
        }
    }
}

impl<M: Metadata> Stage<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the stage to files below `folder`, relative to the input folder.
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn reader(mut self, reader: impl Reader + 'static) -> Self {
        self.readers.push(Arc::new(reader));
        self
    }

    /// Runs on every converted item before filtering. Processors run in the order they were added.
    pub fn item_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(&mut Item<M>) + Send + Sync + 'static,
    {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn filter<F>(mut self, predicate: F, excluded: ExcludedItems) -> Self
    where
        F: Fn(&Item<M>) -> bool + Send + Sync + 'static,
    {
        self.filter = Some((Arc::new(predicate), excluded));
        self
    }

    pub fn write_mode(mut self, write_mode: ItemWriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Replaces the default newest-first order. The sort is stable.
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Item<M>, &Item<M>) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(compare));
        self
    }

    pub fn writer(mut self, writer: impl Writer<M> + 'static) -> Self {
        self.writers.push(Arc::new(writer));
        self
    }

    pub(crate) fn folder_path(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub(crate) fn supports(&self, extension: &str) -> bool {
        self.readers.iter().any(|reader| reader.supports(extension))
    }

    pub(crate) fn with_folder(&self, folder: PathBuf) -> Self {
        let mut stage = self.clone();
        stage.folder = Some(folder);
        stage
    }

    fn reader_for(&self, record: &FileRecord) -> Option<&Arc<dyn Reader>> {
        let extension = extension_of(&record.relative_path);
        self.readers.iter().find(|reader| reader.supports(&extension))
    }

    fn convert(&self, record: &FileRecord, reader: &dyn Reader, io: &dyn FileIo) -> Result<Item<M>> {
        let partial = reader.convert(&record.path)?;
        let frontmatter = partial.frontmatter.unwrap_or_default();

        let metadata =
            decode_metadata::<M>(&frontmatter).map_err(|error| TesseraError::MetadataDecode {
                path: record.relative_path.clone(),
                type_name: type_name::<M>(),
                message: error.to_string(),
            })?;

        let created = io.creation_date(&record.path);
        let date = match frontmatter.get("date") {
            Some(value) => parse_date(value).ok_or_else(|| TesseraError::InvalidDate {
                path: record.relative_path.clone(),
                value: value.clone(),
            })?,
            None => created.unwrap_or_else(Utc::now),
        };
        let created = created.unwrap_or(date);
        let last_modified = io.modification_date(&record.path).unwrap_or(created);

        let title = frontmatter
            .get("title")
            .cloned()
            .or(partial.title)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| {
                record
                    .relative_path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_default()
            });

        let mut item = Item {
            source_path: Some(record.path.clone()),
            relative_source: record.relative_path.clone(),
            relative_destination: make_output_path(&record.relative_path, self.write_mode),
            title,
            body: partial.body,
            date,
            created,
            last_modified,
            metadata,
        };
        for processor in &self.processors {
            processor(&mut item);
        }
        Ok(item)
    }

    fn sort(&self, items: &mut [SharedItem<M>]) {
        match &self.sort {
            Some(compare) => items.sort_by(|left, right| compare(&**left, &**right)),
            None => items.sort_by(|left, right| right.date.cmp(&left.date)),
        }
    }
}

/// One unit of work the site runs: a read phase, then a write phase.
pub(crate) trait Step: Send + Sync {
    fn read(&mut self, site: &SiteContext<'_>) -> Result<StepOutput>;

    fn write(&self, site: &SiteContext<'_>) -> Result<()>;
}

#[derive(Default)]
pub(crate) struct StepOutput {
    pub claims: Vec<Claim>,
    pub items: Vec<ErasedItem>,
}

pub(crate) struct StageStep<M> {
    stage: Stage<M>,
    items: Vec<SharedItem<M>>,
}

impl<M> StageStep<M> {
    pub(crate) fn new(stage: Stage<M>) -> Self {
        Self {
            stage,
            items: Vec::new(),
        }
    }
}

enum Converted<M> {
    Accepted(usize, SharedItem<M>, bool),
    Rejected(usize),
    Failed(usize),
}

impl<M: Metadata> Step for StageStep<M> {
    fn read(&mut self, site: &SiteContext<'_>) -> Result<StepOutput> {
        let stage = &self.stage;
        let candidates: Vec<(usize, &FileRecord, &Arc<dyn Reader>)> = site
            .registry
            .candidates(stage.folder_path(), |extension| stage.supports(extension))
            .filter_map(|(index, record)| {
                stage
                    .reader_for(record)
                    .map(|reader| (index, record, reader))
            })
            .collect();

        let converted: Vec<Converted<M>> = candidates
            .par_iter()
            .map(|&(index, record, reader)| {
                match stage.convert(record, &**reader, site.io) {
                    Ok(item) => {
                        let accepted = stage
                            .filter
                            .as_ref()
                            .is_none_or(|(predicate, _)| predicate(&item));
                        if accepted {
                            Converted::Accepted(index, Arc::new(item), reader.copies_source())
                        } else {
                            Converted::Rejected(index)
                        }
                    }
                    Err(error) => {
                        warn!(
                            file = %record.relative_path.display(),
                            metadata = type_name::<M>(),
                            "skipping file: {error}"
                        );
                        Converted::Failed(index)
                    }
                }
            })
            .collect();

        let claim_excluded = matches!(stage.filter, Some((_, ExcludedItems::Claim)));
        let mut output = StepOutput::default();
        let mut items = Vec::new();
        for outcome in converted {
            match outcome {
                Converted::Accepted(index, item, copy_source) => {
                    output
                        .claims
                        .push(Claim::item(index, item.clone(), copy_source));
                    items.push(item);
                }
                Converted::Rejected(index) if claim_excluded => {
                    output.claims.push(Claim::handled(index));
                }
                Converted::Rejected(_) => {}
                Converted::Failed(index) => output.claims.push(Claim::handled(index)),
            }
        }

        stage.sort(&mut items);
        debug!(
            folder = %stage.folder_path().unwrap_or(Path::new("")).display(),
            items = items.len(),
            "stage read"
        );

        output.items = items.iter().map(|item| item.clone() as ErasedItem).collect();
        self.items = items;
        Ok(output)
    }

    fn write(&self, site: &SiteContext<'_>) -> Result<()> {
        let context = WriteContext {
            items: &self.items,
            site,
            prefix: self.stage.folder_path().unwrap_or(Path::new("")),
        };
        self.stage
            .writers
            .par_iter()
            .try_for_each(|writer| writer.write(&context))
    }
}

/// A stage whose items come from a supplier instead of source files, e.g. a
/// remote API. Fetched items never touch the file registry.
pub struct FetchStage<M> {
    fetch: Fetcher<M>,
    folder: PathBuf,
    sort: Option<Comparator<M>>,
    writers: Vec<Arc<dyn Writer<M>>>,
    items: Vec<SharedItem<M>>,
}

impl<M: Metadata> FetchStage<M> {
    /// `fetch` is awaited once per build on a single-threaded runtime.
    pub fn new<F, Fut, E>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<Item<M>>, E>> + Send + 'static,
        E: Display + 'static,
    {
        let fetch = Arc::new(fetch);
        Self {
            fetch: Box::new(move || {
                let fetch = Arc::clone(&fetch);
                Box::pin(async move {
                    fetch().await.map_err(|error| TesseraError::Fetch {
                        message: error.to_string(),
                    })
                }) as FetchFuture<M>
            }),
            folder: PathBuf::new(),
            sort: None,
            writers: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Output prefix for list and partition writers.
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Item<M>, &Item<M>) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(compare));
        self
    }

    pub fn writer(mut self, writer: impl Writer<M> + 'static) -> Self {
        self.writers.push(Arc::new(writer));
        self
    }
}

impl<M: Metadata> Step for FetchStage<M> {
    fn read(&mut self, _site: &SiteContext<'_>) -> Result<StepOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|error| TesseraError::Fetch {
                message: format!("could not start the fetch runtime: {error}"),
            })?;

        let mut items: Vec<SharedItem<M>> = runtime
            .block_on((self.fetch)())?
            .into_iter()
            .map(Arc::new)
            .collect();

        match &self.sort {
            Some(compare) => items.sort_by(|left, right| compare(&**left, &**right)),
            None => items.sort_by(|left, right| right.date.cmp(&left.date)),
        }
        debug!(items = items.len(), "fetched");

        let output = StepOutput {
            claims: Vec::new(),
            items: items.iter().map(|item| item.clone() as ErasedItem).collect(),
        };
        self.items = items;
        Ok(output)
    }

    fn write(&self, site: &SiteContext<'_>) -> Result<()> {
        let context = WriteContext {
            items: &self.items,
            site,
            prefix: &self.folder,
        };
        self.writers
            .par_iter()
            .try_for_each(|writer| writer.write(&context))
    }
}

type CustomRead = Box<dyn FnMut(&SiteContext<'_>) -> Result<Vec<ErasedItem>> + Send + Sync>;
type CustomWrite = Box<dyn Fn(&SiteContext<'_>) -> Result<()> + Send + Sync>;

/// Free-form read and write hooks. Items returned by the read hook join the
/// site-wide item list.
pub struct CustomStep {
    read: CustomRead,
    write: CustomWrite,
}

impl CustomStep {
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: FnMut(&SiteContext<'_>) -> Result<Vec<ErasedItem>> + Send + Sync + 'static,
        W: Fn(&SiteContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            read: Box::new(read),
            write: Box::new(write),
        }
    }

    pub fn write_only<W>(write: W) -> Self
    where
        W: Fn(&SiteContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(|_: &SiteContext<'_>| Ok(Vec::new()), write)
    }
}

impl Step for CustomStep {
    fn read(&mut self, site: &SiteContext<'_>) -> Result<StepOutput> {
        Ok(StepOutput {
            claims: Vec::new(),
            items: (self.read)(site)?,
        })
    }

    fn write(&self, site: &SiteContext<'_>) -> Result<()> {
        (self.write)(site)
    }
}

type PageRenderer = Box<dyn Fn(&PageContext<'_>) -> Result<String> + Send + Sync>;

/// One file rendered from the whole site, see [`crate::Site::create_page`].
pub(crate) struct PageStep {
    path: PathBuf,
    render: PageRenderer,
}

impl PageStep {
    pub(crate) fn new(path: PathBuf, render: PageRenderer) -> Self {
        Self { path, render }
    }
}

impl Step for PageStep {
    fn read(&mut self, _site: &SiteContext<'_>) -> Result<StepOutput> {
        Ok(StepOutput::default())
    }

    fn write(&self, site: &SiteContext<'_>) -> Result<()> {
        let content = (self.render)(&PageContext {
            all_items: site.all_items,
            output_path: self.path.clone(),
        })?;
        site.write(&self.path, content)
    }
}

/// Item processor for files named like `2021-01-27-my-post.md`: the prefix
/// becomes the item date and is dropped from the destination.
pub fn publication_date_in_filename<M>(item: &mut Item<M>) {
    let stem = item.filename_without_extension();
    let Some(prefix) = stem.get(..10) else {
        return;
    };
    let Ok(day) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") else {
        return;
    };
    item.date = Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN));

    let slug = stem[10..].trim_start_matches('-');
    if slug.is_empty() {
        return;
    }
    let renamed = match item.relative_source.extension() {
        Some(extension) => item
            .relative_source
            .with_file_name(format!("{slug}.{}", extension.to_string_lossy())),
        None => item.relative_source.with_file_name(slug),
    };
    item.relative_destination = make_output_path(&renamed, ItemWriteMode::MoveToSubfolder);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::EmptyMetadata;

    #[test]
    fn test_publication_date_in_filename() {
        let mut item = Item::new("post", Utc::now(), EmptyMetadata {});
        item.relative_source = PathBuf::from("articles/2021-01-27-Post With Date.md");

        publication_date_in_filename(&mut item);

        assert_eq!(item.date, Utc.with_ymd_and_hms(2021, 1, 27, 0, 0, 0).unwrap());
        assert_eq!(
            item.relative_destination,
            PathBuf::from("articles/post-with-date/index.html")
        );
    }

    #[test]
    fn test_publication_date_in_filename_ignores_plain_names() {
        let date = Utc.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap();
        let mut item = Item::new("about", date, EmptyMetadata {})
            .with_destination("about/index.html");
        item.relative_source = PathBuf::from("about.md");

        publication_date_in_filename(&mut item);

        assert_eq!(item.date, date);
        assert_eq!(item.relative_destination, PathBuf::from("about/index.html"));
    }

    #[test]
    fn test_stage_clone_with_folder() {
        let stage: Stage<EmptyMetadata> = Stage::new()
            .folder("photos/**")
            .reader(crate::reader::AssetReader::images());
        let expanded = stage.with_folder(PathBuf::from("photos/2024"));
        assert_eq!(expanded.folder_path(), Some(Path::new("photos/2024")));
        assert!(expanded.supports("jpg"));
        assert!(!expanded.supports("md"));
    }
}
