//! Tera templates as renderers.
//!
//! Every rendering context is exposed to templates under the same names:
//! `items`, `all_items`, `paginator` (with `previous`/`next` as urls),
//! `output_path` and `url`, plus `item`, `previous`, `next` and `resources` for
//! item pages and `key` for partitions. Globals added with
//! [`TemplateRenderer::with_global`] are available everywhere.

use crate::context::{ItemContext, ListContext, PageContext, Paginator, PartitionContext};
use crate::error::{Result, TesseraError};
use crate::item::{ErasedItem, Item, ItemSummary, SharedItem};
use crate::paths::url_for;
use serde::Serialize;
use serde_json::{Value, json};
use std::error::Error as _;
use std::path::Path;
use tera::{Context, Tera};

pub struct TemplateRenderer {
    tera: Tera,
    globals: Context,
}

impl TemplateRenderer {
    /// Loads every `.html` template below `templates_dir`, names relative to it.
    pub fn from_directory(templates_dir: &Path) -> Result<Self> {
        let pattern = templates_dir.join("**").join("*.html");
        let tera = Tera::new(&pattern.to_string_lossy())?;
        Ok(Self::from_tera(tera))
    }

    pub fn from_templates(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())?;
        Ok(Self::from_tera(tera))
    }

    pub fn from_tera(tera: Tera) -> Self {
        Self {
            tera,
            globals: Context::new(),
        }
    }

    pub fn with_global(mut self, key: &str, value: &impl Serialize) -> Self {
        self.globals.insert(key, value);
        self
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|template| template == name)
    }

    pub fn render_item<M: Serialize>(
        &self,
        template: &str,
        context: &ItemContext<'_, M>,
    ) -> Result<String> {
        let mut tera_context = self.globals.clone();
        tera_context.insert("item", context.item);
        tera_context.insert("items", &plain(context.items));
        tera_context.insert("all_items", &summaries(context.all_items));
        tera_context.insert("previous", &context.previous);
        tera_context.insert("next", &context.next);
        let resources: Vec<String> = context
            .resources
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        tera_context.insert("resources", &resources);
        tera_context.insert("output_path", &context.item.relative_destination);
        tera_context.insert("url", &context.item.url());
        self.render(template, &tera_context, &context.item.relative_destination)
    }

    pub fn render_list<M: Serialize>(
        &self,
        template: &str,
        context: &ListContext<'_, M>,
    ) -> Result<String> {
        let tera_context = self.listing(
            context.items,
            context.all_items,
            context.paginator.as_ref(),
            &context.output_path,
        );
        self.render(template, &tera_context, &context.output_path)
    }

    pub fn render_partition<K: Serialize, M: Serialize>(
        &self,
        template: &str,
        context: &PartitionContext<'_, K, M>,
    ) -> Result<String> {
        let mut tera_context = self.listing(
            context.items,
            context.all_items,
            context.paginator.as_ref(),
            &context.output_path,
        );
        tera_context.insert("key", context.key);
        self.render(template, &tera_context, &context.output_path)
    }

    pub fn render_page(&self, template: &str, context: &PageContext<'_>) -> Result<String> {
        let mut tera_context = self.globals.clone();
        tera_context.insert("all_items", &summaries(context.all_items));
        tera_context.insert("output_path", &context.output_path);
        tera_context.insert("url", &url_for(&context.output_path));
        self.render(template, &tera_context, &context.output_path)
    }

    fn listing<M: Serialize>(
        &self,
        items: &[SharedItem<M>],
        all_items: &[ErasedItem],
        paginator: Option<&Paginator>,
        output_path: &Path,
    ) -> Context {
        let mut tera_context = self.globals.clone();
        tera_context.insert("items", &plain(items));
        tera_context.insert("all_items", &summaries(all_items));
        tera_context.insert("paginator", &paginator.map(paginator_value));
        tera_context.insert("output_path", output_path);
        tera_context.insert("url", &url_for(output_path));
        tera_context
    }

    fn render(&self, template: &str, context: &Context, output_path: &Path) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|error| TesseraError::Render {
                path: output_path.to_path_buf(),
                message: error_chain(&error),
            })
    }
}

fn plain<M>(items: &[SharedItem<M>]) -> Vec<&Item<M>> {
    items.iter().map(|item| &**item).collect()
}

fn summaries(items: &[ErasedItem]) -> Vec<ItemSummary> {
    items
        .iter()
        .map(|item| ItemSummary::from(&**item))
        .collect()
}

fn paginator_value(paginator: &Paginator) -> Value {
    json!({
        "index": paginator.index,
        "items_per_page": paginator.items_per_page,
        "number_of_pages": paginator.number_of_pages,
        "previous": paginator.previous_url(),
        "next": paginator.next_url(),
    })
}

/// Tera nests the interesting part of an error in its source chain.
fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
