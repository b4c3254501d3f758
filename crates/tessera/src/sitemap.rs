use crate::context::PageContext;
use crate::error::Result;
use crate::xml::XmlWriter;

/// Renders `sitemap.xml` from every item of the site, for use with
/// [`crate::Site::create_page`].
pub struct Sitemap {
    base_url: String,
    extra_urls: Vec<String>,
}

impl Sitemap {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            extra_urls: vec!["/".to_string()],
        }
    }

    /// Lists a url that belongs to no item, such as a list page.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.extra_urls.push(url.into());
        self
    }

    pub fn render(&self, context: &PageContext<'_>) -> Result<String> {
        let mut xml = XmlWriter::new();
        xml.open(
            "urlset",
            &[("xmlns", "http://www.sitemaps.org/schemas/sitemap/0.9")],
        );

        for url in &self.extra_urls {
            xml.open("url", &[]);
            xml.element("loc", &[], &self.absolute(url));
            xml.close("url");
        }

        for item in context.all_items {
            xml.open("url", &[]);
            xml.element("loc", &[], &self.absolute(&item.url()));
            xml.element(
                "lastmod",
                &[],
                &item.last_modified().format("%Y-%m-%d").to_string(),
            );
            xml.close("url");
        }

        xml.close("urlset");
        Ok(xml.finish())
    }

    fn absolute(&self, url: &str) -> String {
        format!("{}/{}", self.base_url, url.trim_start_matches('/'))
    }
}
