use crate::paths::url_for;
use chrono::{DateTime, Datelike, Utc};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Typed frontmatter. Anything serde can build from a string-keyed map qualifies.
pub trait Metadata: DeserializeOwned + Send + Sync + 'static {}

impl<T: DeserializeOwned + Send + Sync + 'static> Metadata for T {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyMetadata {}

/// One unit of published content.
#[derive(Debug, Clone)]
pub struct Item<M> {
    /// Absolute source path; `None` for fetched items.
    pub source_path: Option<PathBuf>,
    pub relative_source: PathBuf,
    pub relative_destination: PathBuf,
    pub title: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub metadata: M,
}

pub type SharedItem<M> = Arc<Item<M>>;

pub type ErasedItem = Arc<dyn AnyItem>;

impl<M> Item<M> {
    /// An item that does not come from a source file, e.g. one built from an API response.
    pub fn new(title: impl Into<String>, date: DateTime<Utc>, metadata: M) -> Self {
        Self {
            source_path: None,
            relative_source: PathBuf::new(),
            relative_destination: PathBuf::new(),
            title: title.into(),
            body: String::new(),
            date,
            created: date,
            last_modified: date,
            metadata,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.relative_destination = destination.into();
        self
    }

    pub fn filename_without_extension(&self) -> String {
        self.relative_source
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn url(&self) -> String {
        url_for(&self.relative_destination)
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// The view of an item that other stages get to see.
pub trait AnyItem: Send + Sync {
    fn relative_source(&self) -> &Path;
    fn relative_destination(&self) -> &Path;
    fn title(&self) -> &str;
    fn body(&self) -> &str;
    fn date(&self) -> DateTime<Utc>;
    fn last_modified(&self) -> DateTime<Utc>;

    fn url(&self) -> String {
        url_for(self.relative_destination())
    }
}

impl<M: Send + Sync> AnyItem for Item<M> {
    fn relative_source(&self) -> &Path {
        &self.relative_source
    }

    fn relative_destination(&self) -> &Path {
        &self.relative_destination
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn date(&self) -> DateTime<Utc> {
        self.date
    }

    fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }
}

impl<M: Serialize> Serialize for Item<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Item", 9)?;
        state.serialize_field("relative_source", &self.relative_source)?;
        state.serialize_field("relative_destination", &self.relative_destination)?;
        state.serialize_field("url", &self.url())?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("body", &self.body)?;
        state.serialize_field("date", &self.date)?;
        state.serialize_field("created", &self.created)?;
        state.serialize_field("last_modified", &self.last_modified)?;
        state.serialize_field("metadata", &self.metadata)?;
        state.end()
    }
}

/// Serializable snapshot of an [`AnyItem`], for templates that list the whole site.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub title: String,
    pub url: String,
    pub relative_source: PathBuf,
    pub relative_destination: PathBuf,
    pub date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl From<&dyn AnyItem> for ItemSummary {
    fn from(item: &dyn AnyItem) -> Self {
        Self {
            title: item.title().to_string(),
            url: item.url(),
            relative_source: item.relative_source().to_path_buf(),
            relative_destination: item.relative_destination().to_path_buf(),
            date: item.date(),
            last_modified: item.last_modified(),
        }
    }
}

/// Date descending, the order every item list uses unless a stage says otherwise.
pub fn newest_first<I: AnyItem + ?Sized>(left: &I, right: &I) -> std::cmp::Ordering {
    right.date().cmp(&left.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fetched_item_defaults() {
        let date = Utc.with_ymd_and_hms(2024, 7, 3, 0, 0, 0).unwrap();
        let item = Item::new("Remote", date, EmptyMetadata {})
            .with_body("<p>remote</p>")
            .with_destination("videos/remote/index.html");

        assert_eq!(item.url(), "/videos/remote/");
        assert_eq!(item.year(), 2024);
        assert_eq!(item.created, date);
        assert!(item.source_path.is_none());
    }

    #[test]
    fn test_item_serializes_url_and_metadata() {
        #[derive(Serialize)]
        struct Tagged {
            tags: Vec<String>,
        }

        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let item = Item::new(
            "Hello",
            date,
            Tagged {
                tags: vec!["rust".to_string()],
            },
        )
        .with_destination("hello/index.html");

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["url"], "/hello/");
        assert_eq!(value["metadata"]["tags"][0], "rust");
    }

    #[test]
    fn test_newest_first() {
        let old = Item::new(
            "old",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            EmptyMetadata {},
        );
        let new = Item::new(
            "new",
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            EmptyMetadata {},
        );
        let mut items = vec![old, new];
        items.sort_by(|left, right| newest_first(left, right));
        assert_eq!(items[0].title, "new");
    }
}
