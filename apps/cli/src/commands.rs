use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tessera_ssg::{
    AtomFeed, ExcludedItems, Item, ItemWriter, ListWriter, MarkdownReader, SectionConfig, Site,
    SiteConfig, Sitemap, Stage, TemplateRenderer, publication_date_in_filename, tag_writer,
    year_writer,
};
use tracing::info;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Frontmatter understood by configured sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

fn escape_toml_string(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for character in input.chars() {
        match character {
            '\\' => output.push_str("\\\\"),
            '"' => output.push_str("\\\""),
            '\n' => output.push_str("\\n"),
            '\t' => output.push_str("\\t"),
            control if control < '\u{0020}' => {
                output.push_str(&format!("\\u{:04X}", control as u32));
            }
            other => output.push(other),
        }
    }
    output
}

const ARTICLE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ item.title }} | {{ site.title }}</title></head>
<body>
<article>
<h1>{{ item.title }}</h1>
<time>{{ item.date | date(format="%Y-%m-%d") }}</time>
{{ item.body | safe }}
</article>
{% if previous %}<a href="{{ previous.url | safe }}">{{ previous.title }}</a>{% endif %}
{% if next %}<a href="{{ next.url | safe }}">{{ next.title }}</a>{% endif %}
</body>
</html>
"#;

const LIST_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ site.title }}</title></head>
<body>
<ul>
{% for item in items %}<li><a href="{{ item.url | safe }}">{{ item.title }}</a></li>
{% endfor %}</ul>
{% if paginator and paginator.next %}<a href="{{ paginator.next | safe }}">Older</a>{% endif %}
</body>
</html>
"#;

const TAG_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{ key }} | {{ site.title }}</title></head>
<body>
<h1>{{ key }}</h1>
<ul>
{% for item in items %}<li><a href="{{ item.url | safe }}">{{ item.title }}</a></li>
{% endfor %}</ul>
</body>
</html>
"#;

pub fn new_site(name: &str) -> CommandResult {
    let site_dir = Path::new(name);

    if site_dir.exists() {
        return Err(format!("Directory '{name}' already exists").into());
    }

    fs::create_dir_all(site_dir.join("content").join("articles"))?;
    fs::create_dir_all(site_dir.join("templates"))?;

    let escaped_name = escape_toml_string(name);
    let config = format!(
        r#"title = "{escaped_name}"
base_url = "http://localhost:3000"

[[sections]]
folder = "articles"
publication_date_in_filename = true
skip_drafts = true
item_template = "article.html"
list_template = "list.html"
paginate = 10
tag_template = "tag.html"
feed = "feed.xml"
"#
    );
    fs::write(site_dir.join(tessera_ssg::config::CONFIG_FILE), config)?;

    fs::write(site_dir.join("templates").join("article.html"), ARTICLE_TEMPLATE)?;
    fs::write(site_dir.join("templates").join("list.html"), LIST_TEMPLATE)?;
    fs::write(site_dir.join("templates").join("tag.html"), TAG_TEMPLATE)?;

    let post_content = r#"---
tags: welcome, first post
summary: A first article.
---
# Hello World

This is your first article. Start writing!

```rust
fn main() {
    println!("Hello, world!");
}
```
"#;
    fs::write(
        site_dir
            .join("content")
            .join("articles")
            .join("2024-01-01-hello-world.md"),
        post_content,
    )?;
    fs::write(
        site_dir.join("content").join("style.css"),
        "body { font-family: sans-serif; }\n",
    )?;

    println!("Created new site: {name}");
    println!("  cd {name}");
    println!("  tessera build");

    Ok(())
}

pub fn build_site(root: Option<&Path>, base_url: Option<&str>) -> CommandResult {
    let start = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir()?,
    };

    info!(root = %start.display(), "building site");
    let started = Instant::now();

    let (root, mut config) = SiteConfig::discover(&start)?;
    if let Some(url) = base_url {
        config = config.with_base_url(url);
    }

    let renderer = Arc::new(
        TemplateRenderer::from_directory(&root.join(&config.templates))?
            .with_global("site", &config),
    );

    let mut site = Site::from_loaded_config(root, config.clone())?;
    for section in &config.sections {
        site = site.register(section_stage(section, &config, &renderer));
    }

    for page in &config.pages {
        let renderer = Arc::clone(&renderer);
        let template = page.template.clone();
        site = site.create_page(page.output.clone(), move |context| {
            renderer.render_page(&template, context)
        });
    }

    if !config.base_url.is_empty() {
        let sitemap = Sitemap::new(&config.base_url);
        site = site.create_page("sitemap.xml", move |context| sitemap.render(context));
    }

    let site = site.run()?;

    info!(
        items = site.all_items().len(),
        output = %site.output().display(),
        "built site in {:.2?}",
        started.elapsed()
    );

    Ok(())
}

fn section_stage(
    section: &SectionConfig,
    config: &SiteConfig,
    renderer: &Arc<TemplateRenderer>,
) -> Stage<PageMetadata> {
    let mut stage = Stage::<PageMetadata>::new()
        .reader(MarkdownReader::new())
        .write_mode(section.write_mode);

    if let Some(folder) = &section.folder {
        stage = stage.folder(folder.clone());
    }
    if section.publication_date_in_filename {
        stage = stage.item_processor(publication_date_in_filename);
    }
    if section.skip_drafts {
        stage = stage.filter(
            |item: &Item<PageMetadata>| !item.metadata.draft,
            ExcludedItems::Claim,
        );
    }

    if let Some(template) = section.item_template.clone() {
        let renderer = Arc::clone(renderer);
        stage = stage.writer(ItemWriter::<PageMetadata>::new(move |context| {
            renderer.render_item(&template, context)
        }));
    }

    if let Some(template) = section.list_template.clone() {
        let renderer = Arc::clone(renderer);
        let mut writer =
            ListWriter::<PageMetadata>::new(move |context| renderer.render_list(&template, context));
        if let Some(output) = &section.list_output {
            writer = writer.output(output.clone());
        }
        if let Some(per_page) = section.paginate {
            writer = writer.paginate(per_page);
        }
        stage = stage.writer(writer);
    }

    if let Some(template) = section.tag_template.clone() {
        let renderer = Arc::clone(renderer);
        stage = stage.writer(tag_writer(
            |item: &Item<PageMetadata>| item.metadata.tags.clone(),
            move |context| renderer.render_partition(&template, context),
        ));
    }

    if let Some(template) = section.year_template.clone() {
        let renderer = Arc::clone(renderer);
        stage = stage.writer(year_writer::<PageMetadata, _>(move |context| {
            renderer.render_partition(&template, context)
        }));
    }

    if let Some(output) = section.feed.clone() {
        let mut feed = AtomFeed::new(config.title.clone(), config.base_url.clone())
            .summary(|item: &Item<PageMetadata>| item.metadata.summary.clone());
        if let Some(author) = &config.author {
            feed = feed.author(author.clone());
        }
        stage = stage.writer(ListWriter::new(move |context| feed.render(context)).output(output));
    }

    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_toml_string() {
        assert_eq!(escape_toml_string("My \"Site\"\n"), "My \\\"Site\\\"\\n");
    }

    #[test]
    fn test_new_site_builds() {
        let dir = TempDir::new().unwrap();
        let site_dir = dir.path().join("blog");
        new_site(&site_dir.to_string_lossy()).unwrap();

        build_site(Some(&site_dir), None).unwrap();

        let deploy = site_dir.join("deploy");
        let article =
            fs::read_to_string(deploy.join("articles/hello-world/index.html")).unwrap();
        assert!(article.contains("<h1>Hello World</h1>"));
        assert!(article.contains("2024-01-01"));

        let list = fs::read_to_string(deploy.join("articles/index.html")).unwrap();
        assert!(list.contains("href=\"/articles/hello-world/\""));
        assert!(deploy.join("articles/page/1/index.html").exists());
        assert!(deploy.join("articles/tag/welcome/index.html").exists());
        assert!(deploy.join("articles/tag/first-post/index.html").exists());

        let feed = fs::read_to_string(deploy.join("articles/feed.xml")).unwrap();
        assert!(feed.contains("<summary>A first article.</summary>"));
        assert!(deploy.join("sitemap.xml").exists());
        assert!(deploy.join("style.css").exists());
    }

    #[test]
    fn test_new_site_refuses_existing_folder() {
        let dir = TempDir::new().unwrap();
        assert!(new_site(&dir.path().to_string_lossy()).is_err());
    }
}
