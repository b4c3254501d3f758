//! Writers turn a stage's items into output files.
//!
//! Each writer takes a renderer, a plain function from a context to a `String`,
//! and decides which files to produce: one per item, one list (optionally
//! paginated), or one list per partition key.

use crate::context::{ItemContext, ListContext, Paginator, PartitionContext, WriteContext};
use crate::error::Result;
use crate::item::{Item, SharedItem};
use crate::paths::{KEY_PLACEHOLDER, PAGE_PLACEHOLDER, slugify, substitute};
use chrono::Datelike;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait Writer<M>: Send + Sync {
    fn write(&self, context: &WriteContext<'_, M>) -> Result<()>;
}

type ItemRenderer<M> = Box<dyn Fn(&ItemContext<'_, M>) -> Result<String> + Send + Sync>;
type ListRenderer<M> = Box<dyn Fn(&ListContext<'_, M>) -> Result<String> + Send + Sync>;
type PartitionRenderer<K, M> =
    Box<dyn Fn(&PartitionContext<'_, K, M>) -> Result<String> + Send + Sync>;
type Partitioner<K, M> = Box<dyn Fn(&Item<M>) -> Vec<K> + Send + Sync>;

/// Writes every item to its own `relative_destination`.
pub struct ItemWriter<M> {
    render: ItemRenderer<M>,
}

impl<M> ItemWriter<M> {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&ItemContext<'_, M>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            render: Box::new(render),
        }
    }
}

impl<M: Send + Sync> Writer<M> for ItemWriter<M> {
    fn write(&self, context: &WriteContext<'_, M>) -> Result<()> {
        let items = context.items;
        items
            .par_iter()
            .enumerate()
            .try_for_each(|(index, item)| {
                let resources = item
                    .relative_source
                    .parent()
                    .map(|folder| context.site.registry.resources_in(folder))
                    .unwrap_or_default();
                let item_context = ItemContext {
                    item,
                    items,
                    all_items: context.site.all_items,
                    previous: index.checked_sub(1).map(|previous| &*items[previous]),
                    next: items.get(index + 1).map(|next| &**next),
                    resources,
                };
                let content = (self.render)(&item_context)?;
                context.site.write(&item.relative_destination, content)
            })
    }
}

/// Output paths shared by the list and partitioned writers.
#[derive(Debug, Clone)]
struct PageLayout {
    output: PathBuf,
    per_page: Option<usize>,
    paginated_output: PathBuf,
}

impl PageLayout {
    fn keyed(&self, key: &str) -> Self {
        Self {
            output: substitute(&self.output, KEY_PLACEHOLDER, key),
            per_page: self.per_page,
            paginated_output: substitute(&self.paginated_output, KEY_PLACEHOLDER, key),
        }
    }

    fn page_path(&self, prefix: &Path, page: usize) -> PathBuf {
        prefix.join(substitute(
            &self.paginated_output,
            PAGE_PLACEHOLDER,
            &page.to_string(),
        ))
    }
}

/// The pagination algorithm behind [`ListWriter`] and [`PartitionedWriter`].
///
/// Without pagination one file is written to `output`. With `n` items per page
/// the items are split into `ceil(len / n)` pages, at least one. Every page is
/// written to `paginated_output` with `[page]` filled in, and the first page is
/// written to `output` as well. All paths are relative to the stage folder.
fn write_pages<M, F>(
    context: &WriteContext<'_, M>,
    items: &[SharedItem<M>],
    layout: &PageLayout,
    render: F,
) -> Result<()>
where
    M: Send + Sync,
    F: Fn(&[SharedItem<M>], Option<Paginator>, PathBuf) -> Result<String> + Sync,
{
    let output_path = context.prefix.join(&layout.output);

    let Some(per_page) = layout.per_page else {
        let content = render(items, None, output_path.clone())?;
        return context.site.write(&output_path, content);
    };

    let per_page = per_page.max(1);
    let mut pages: Vec<&[SharedItem<M>]> = items.chunks(per_page).collect();
    if pages.is_empty() {
        pages.push(&[]);
    }
    let number_of_pages = pages.len();

    let paginator_for = |page: usize| Paginator {
        index: page,
        items_per_page: per_page,
        number_of_pages,
        previous: (page > 1).then(|| layout.page_path(context.prefix, page - 1)),
        next: (page < number_of_pages).then(|| layout.page_path(context.prefix, page + 1)),
    };

    let first = render(pages[0], Some(paginator_for(1)), output_path.clone())?;
    context.site.write(&output_path, first)?;

    pages
        .par_iter()
        .enumerate()
        .try_for_each(|(index, page_items)| {
            let page = index + 1;
            let page_path = layout.page_path(context.prefix, page);
            let content = render(*page_items, Some(paginator_for(page)), page_path.clone())?;
            context.site.write(&page_path, content)
        })
}

/// Writes the stage's items as one list, optionally paginated.
pub struct ListWriter<M> {
    render: ListRenderer<M>,
    layout: PageLayout,
}

impl<M> ListWriter<M> {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&ListContext<'_, M>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            render: Box::new(render),
            layout: PageLayout {
                output: PathBuf::from("index.html"),
                per_page: None,
                paginated_output: PathBuf::from("page/[page]/index.html"),
            },
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.layout.output = output.into();
        self
    }

    pub fn paginate(mut self, per_page: usize) -> Self {
        self.layout.per_page = Some(per_page);
        self
    }

    /// Path template of every page; `[page]` is replaced by the page number.
    pub fn paginated_output(mut self, paginated_output: impl Into<PathBuf>) -> Self {
        self.layout.paginated_output = paginated_output.into();
        self
    }
}

impl<M: Send + Sync> Writer<M> for ListWriter<M> {
    fn write(&self, context: &WriteContext<'_, M>) -> Result<()> {
        write_pages(
            context,
            context.items,
            &self.layout,
            |items, paginator, output_path| {
                (self.render)(&ListContext {
                    items,
                    all_items: context.site.all_items,
                    paginator,
                    output_path,
                })
            },
        )
    }
}

/// Writes one list per key, e.g. one page per tag.
///
/// The partitioner maps an item to the keys it belongs to; an item may land in
/// several partitions or in none. Partitions keep the stage order of their items
/// and are written in key order. `[key]` in the output paths is replaced by the
/// slugified key.
pub struct PartitionedWriter<M, K> {
    partition: Partitioner<K, M>,
    render: PartitionRenderer<K, M>,
    layout: PageLayout,
}

impl<M, K> PartitionedWriter<M, K>
where
    K: Ord + Display + Send + Sync + 'static,
{
    pub fn new<P, F>(partition: P, render: F) -> Self
    where
        P: Fn(&Item<M>) -> Vec<K> + Send + Sync + 'static,
        F: Fn(&PartitionContext<'_, K, M>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            partition: Box::new(partition),
            render: Box::new(render),
            layout: PageLayout {
                output: PathBuf::from("[key]/index.html"),
                per_page: None,
                paginated_output: PathBuf::from("[key]/page/[page]/index.html"),
            },
        }
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.layout.output = output.into();
        self
    }

    pub fn paginate(mut self, per_page: usize) -> Self {
        self.layout.per_page = Some(per_page);
        self
    }

    pub fn paginated_output(mut self, paginated_output: impl Into<PathBuf>) -> Self {
        self.layout.paginated_output = paginated_output.into();
        self
    }

    fn partitions(&self, items: &[SharedItem<M>]) -> BTreeMap<K, Vec<SharedItem<M>>> {
        let mut partitions: BTreeMap<K, Vec<SharedItem<M>>> = BTreeMap::new();
        for item in items {
            for key in (self.partition)(item) {
                let bucket = partitions.entry(key).or_default();
                if !bucket.iter().any(|existing| Arc::ptr_eq(existing, item)) {
                    bucket.push(item.clone());
                }
            }
        }
        partitions
    }
}

impl<M, K> Writer<M> for PartitionedWriter<M, K>
where
    M: Send + Sync,
    K: Ord + Display + Send + Sync + 'static,
{
    fn write(&self, context: &WriteContext<'_, M>) -> Result<()> {
        let partitions: Vec<(K, Vec<SharedItem<M>>)> =
            self.partitions(context.items).into_iter().collect();

        partitions.par_iter().try_for_each(|(key, bucket)| {
            let layout = self.layout.keyed(&slugify(&key.to_string()));
            write_pages(context, bucket.as_slice(), &layout, |items, paginator, output_path| {
                (self.render)(&PartitionContext {
                    key,
                    items,
                    all_items: context.site.all_items,
                    paginator,
                    output_path,
                })
            })
        })
    }
}

/// A [`PartitionedWriter`] with one partition per tag, written to `tag/[key]/index.html`.
pub fn tag_writer<M, T, F>(tags: T, render: F) -> PartitionedWriter<M, String>
where
    T: Fn(&Item<M>) -> Vec<String> + Send + Sync + 'static,
    F: Fn(&PartitionContext<'_, String, M>) -> Result<String> + Send + Sync + 'static,
{
    PartitionedWriter::new(tags, render)
        .output("tag/[key]/index.html")
        .paginated_output("tag/[key]/page/[page]/index.html")
}

/// A [`PartitionedWriter`] with one partition per publication year.
pub fn year_writer<M, F>(render: F) -> PartitionedWriter<M, i32>
where
    M: 'static,
    F: Fn(&PartitionContext<'_, i32, M>) -> Result<String> + Send + Sync + 'static,
{
    PartitionedWriter::new(|item: &Item<M>| vec![item.date.year()], render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SiteContext;
    use crate::io::MemoryIo;
    use crate::item::EmptyMetadata;
    use crate::registry::FileRegistry;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, year: i32) -> SharedItem<EmptyMetadata> {
        let date = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        Arc::new(
            Item::new(title, date, EmptyMetadata {})
                .with_destination(format!("articles/{title}/index.html")),
        )
    }

    fn run<W: Writer<EmptyMetadata>>(
        writer: &W,
        items: &[SharedItem<EmptyMetadata>],
    ) -> BTreeMap<PathBuf, String> {
        let io = MemoryIo::new("/site");
        let registry = FileRegistry::default();
        let site = SiteContext {
            input: Path::new("/site/content"),
            output: Path::new("/site/deploy"),
            registry: &registry,
            all_items: &[],
            io: &io,
            post_processors: &[],
        };
        writer
            .write(&WriteContext {
                items,
                site: &site,
                prefix: Path::new("articles"),
            })
            .unwrap();
        io.written_under(Path::new("/site/deploy"))
    }

    fn titles(items: &[SharedItem<EmptyMetadata>]) -> String {
        items
            .iter()
            .map(|item| item.title.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn test_item_writer_neighbours() {
        let items = vec![item("c", 2025), item("b", 2024), item("a", 2023)];
        let writer = ItemWriter::new(|context: &ItemContext<'_, EmptyMetadata>| {
            Ok(format!(
                "{}<{}>{}",
                context.previous.map(|item| item.title.as_str()).unwrap_or("-"),
                context.item.title,
                context.next.map(|item| item.title.as_str()).unwrap_or("-"),
            ))
        });

        let written = run(&writer, &items);
        assert_eq!(written[Path::new("articles/c/index.html")], "-<c>b");
        assert_eq!(written[Path::new("articles/b/index.html")], "c<b>a");
        assert_eq!(written[Path::new("articles/a/index.html")], "b<a>-");
    }

    #[test]
    fn test_list_writer_without_pagination() {
        let items = vec![item("b", 2024), item("a", 2023)];
        let writer = ListWriter::new(|context: &ListContext<'_, EmptyMetadata>| {
            Ok(titles(context.items))
        });

        let written = run(&writer, &items);
        assert_eq!(written.len(), 1);
        assert_eq!(written[Path::new("articles/index.html")], "b,a");
    }

    #[test]
    fn test_list_writer_pagination() {
        let items: Vec<_> = ["e", "d", "c", "b", "a"]
            .iter()
            .map(|title| item(title, 2024))
            .collect();
        let writer = ListWriter::new(|context: &ListContext<'_, EmptyMetadata>| {
            let paginator = context.paginator.as_ref().unwrap();
            Ok(format!(
                "{}/{} {} prev={:?} next={:?}",
                paginator.index,
                paginator.number_of_pages,
                titles(context.items),
                paginator.previous_url(),
                paginator.next_url(),
            ))
        })
        .paginate(2);

        let written = run(&writer, &items);
        assert_eq!(written.len(), 4);
        assert_eq!(
            written[Path::new("articles/index.html")],
            written[Path::new("articles/page/1/index.html")]
        );
        assert_eq!(
            written[Path::new("articles/page/1/index.html")],
            "1/3 e,d prev=None next=Some(\"/articles/page/2/\")"
        );
        assert_eq!(
            written[Path::new("articles/page/2/index.html")],
            "2/3 c,b prev=Some(\"/articles/page/1/\") next=Some(\"/articles/page/3/\")"
        );
        assert_eq!(
            written[Path::new("articles/page/3/index.html")],
            "3/3 a prev=Some(\"/articles/page/2/\") next=None"
        );
    }

    #[test]
    fn test_pagination_of_nothing_writes_one_empty_page() {
        let writer = ListWriter::new(|context: &ListContext<'_, EmptyMetadata>| {
            let paginator = context.paginator.as_ref().unwrap();
            Ok(format!("{} of {}: [{}]", paginator.index, paginator.number_of_pages, titles(context.items)))
        })
        .paginate(10);

        let written = run(&writer, &[]);
        assert_eq!(written[Path::new("articles/index.html")], "1 of 1: []");
        assert_eq!(written[Path::new("articles/page/1/index.html")], "1 of 1: []");
    }

    #[test]
    fn test_partitioned_writer_keys_and_order() {
        let items = vec![item("c", 2025), item("b", 2024), item("a", 2024)];
        let writer = year_writer(|context: &PartitionContext<'_, i32, EmptyMetadata>| {
            Ok(format!("{}: {}", context.key, titles(context.items)))
        });

        let written = run(&writer, &items);
        assert_eq!(written[Path::new("articles/2024/index.html")], "2024: b,a");
        assert_eq!(written[Path::new("articles/2025/index.html")], "2025: c");
    }

    #[test]
    fn test_tag_writer_slugifies_keys() {
        let items = vec![item("a", 2024), item("b", 2024)];
        let writer = tag_writer(
            |item: &Item<EmptyMetadata>| match item.title.as_str() {
                "a" => vec!["one".to_string(), "With Space".to_string()],
                _ => vec!["one".to_string(), "one".to_string()],
            },
            |context: &PartitionContext<'_, String, EmptyMetadata>| Ok(titles(context.items)),
        );

        let written = run(&writer, &items);
        assert_eq!(written[Path::new("articles/tag/one/index.html")], "a,b");
        assert_eq!(written[Path::new("articles/tag/with-space/index.html")], "a");
    }

    #[test]
    fn test_partitioned_writer_without_items_writes_nothing() {
        let writer = year_writer(|_: &PartitionContext<'_, i32, EmptyMetadata>| Ok(String::new()));
        assert!(run(&writer, &[]).is_empty());
    }
}
