use crate::context::FeedContext;
use crate::error::Result;
use crate::item::Item;
use crate::xml::XmlWriter;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

type Summary<M> = Box<dyn Fn(&Item<M>) -> Option<String> + Send + Sync>;

/// Renders an Atom feed from a list or partition context.
///
/// ```ignore
/// let feed = AtomFeed::new("Example", "https://example.com").author("Jane");
/// ListWriter::new(move |context| feed.render(context)).output("feed.xml")
/// ```
pub struct AtomFeed<M> {
    title: String,
    base_url: String,
    author: Option<String>,
    summary: Option<Summary<M>>,
}

impl<M> AtomFeed<M> {
    pub fn new(title: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            author: None,
            summary: None,
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Entries with a summary link to the item instead of embedding its body.
    pub fn summary<F>(mut self, summary: F) -> Self
    where
        F: Fn(&Item<M>) -> Option<String> + Send + Sync + 'static,
    {
        self.summary = Some(Box::new(summary));
        self
    }

    pub fn render<C: FeedContext<M>>(&self, context: &C) -> Result<String> {
        let items = context.items();
        // Newest modification keeps repeated builds byte-identical.
        let updated = items
            .iter()
            .map(|item| item.last_modified)
            .max()
            .unwrap_or_else(Utc::now);

        let mut xml = XmlWriter::new();
        xml.open("feed", &[("xmlns", "http://www.w3.org/2005/Atom")]);
        xml.element("id", &[], &self.absolute(&path_url(context.output_path())));
        xml.element("title", &[], &self.title);
        if let Some(author) = &self.author {
            xml.open("author", &[]);
            xml.element("name", &[], author);
            xml.close("author");
        }
        xml.empty("link", &[("rel", "self"), ("href", &self.base_url)]);
        xml.element("updated", &[], &timestamp(updated));

        for item in items {
            let link = self.absolute(&item.url());
            xml.open("entry", &[]);
            xml.element("id", &[], &link);
            xml.element("title", &[], &item.title);
            xml.element("updated", &[], &timestamp(item.last_modified));

            match self.summary.as_ref().and_then(|summary| summary(item)) {
                Some(summary) => {
                    xml.element("summary", &[], &summary);
                    xml.empty("link", &[("rel", "alternate"), ("href", &link)]);
                }
                None => xml.element("content", &[("type", "html")], &item.body),
            }
            xml.close("entry");
        }

        xml.close("feed");
        Ok(xml.finish())
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn path_url(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ListContext;
    use crate::item::{EmptyMetadata, SharedItem};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn items() -> Vec<SharedItem<EmptyMetadata>> {
        let newer = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let older = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![
            Arc::new(
                Item::new("Fish & Chips", newer, EmptyMetadata {})
                    .with_body("<p>tasty</p>")
                    .with_destination("articles/fish/index.html"),
            ),
            Arc::new(
                Item::new("Older", older, EmptyMetadata {})
                    .with_body("<p>old</p>")
                    .with_destination("articles/older/index.html"),
            ),
        ]
    }

    fn context(items: &[SharedItem<EmptyMetadata>]) -> ListContext<'_, EmptyMetadata> {
        ListContext {
            items,
            all_items: &[],
            paginator: None,
            output_path: PathBuf::from("articles/feed.xml"),
        }
    }

    #[test]
    fn test_feed_with_content() {
        let items = items();
        let feed = AtomFeed::new("Example", "https://example.com/").author("Jane");
        let xml = feed.render(&context(&items)).unwrap();

        assert!(xml.contains("<id>https://example.com/articles/feed.xml</id>"));
        assert!(xml.contains("<name>Jane</name>"));
        assert!(xml.contains("<link rel=\"self\" href=\"https://example.com\"/>"));
        assert!(xml.contains("<updated>2025-01-01T00:00:00Z</updated>"));
        assert!(xml.contains("<id>https://example.com/articles/fish/</id>"));
        assert!(xml.contains("<title>Fish &amp; Chips</title>"));
        assert!(xml.contains("<content type=\"html\">&lt;p&gt;tasty&lt;/p&gt;</content>"));
        assert!(xml.find("Fish").unwrap() < xml.find("Older").unwrap());
    }

    #[test]
    fn test_feed_with_summary() {
        let items = items();
        let feed = AtomFeed::new("Example", "https://example.com")
            .summary(|item: &Item<EmptyMetadata>| Some(format!("About {}", item.title)));
        let xml = feed.render(&context(&items)).unwrap();

        assert!(xml.contains("<summary>About Older</summary>"));
        assert!(
            xml.contains("<link rel=\"alternate\" href=\"https://example.com/articles/older/\"/>")
        );
        assert!(!xml.contains("<content"));
    }

    #[test]
    fn test_feed_is_deterministic() {
        let items = items();
        let feed = AtomFeed::new("Example", "https://example.com");
        assert_eq!(
            feed.render(&context(&items)).unwrap(),
            feed.render(&context(&items)).unwrap()
        );
    }
}
