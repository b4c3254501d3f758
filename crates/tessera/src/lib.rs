//! A static site generator built from stages.
//!
//! A [`Site`] scans its input folder once, lets each registered stage claim the
//! files it can read and turn them into typed [`Item`]s, and then renders every
//! stage through its writers. Files nobody claimed are copied through as-is.

pub mod config;
pub mod context;
pub mod error;
pub mod feeds;
pub mod frontmatter;
pub mod io;
pub mod item;
pub mod markdown;
pub mod paths;
pub mod postprocess;
pub mod reader;
pub mod registry;
pub mod site;
pub mod sitemap;
pub mod stage;
pub mod theme;
pub mod writer;
pub mod xml;

pub use config::{PageConfig, SectionConfig, SiteConfig};
pub use context::{
    FeedContext, ItemContext, ListContext, PageContext, Paginator, PartitionContext,
    SiteContext, WriteContext,
};
pub use error::{Result, TesseraError};
pub use feeds::AtomFeed;
pub use frontmatter::Frontmatter;
pub use io::{DiskIo, FileIo, MemoryIo};
pub use item::{AnyItem, EmptyMetadata, ErasedItem, Item, ItemSummary, Metadata, SharedItem};
pub use markdown::MarkdownReader;
pub use paths::{ItemWriteMode, slugify};
pub use postprocess::minify_html;
pub use reader::{AssetReader, PartialItem, Reader};
pub use site::Site;
pub use sitemap::Sitemap;
pub use stage::{CustomStep, ExcludedItems, FetchStage, Stage, publication_date_in_filename};
pub use theme::TemplateRenderer;
pub use writer::{ItemWriter, ListWriter, PartitionedWriter, Writer, tag_writer, year_writer};
