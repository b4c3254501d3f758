use crate::config::SiteConfig;
use crate::context::{PageContext, PostProcessor, SiteContext};
use crate::error::{IoContext, Result};
use crate::io::{DiskIo, FileIo};
use crate::item::{ErasedItem, Metadata, newest_first};
use crate::postprocess::minify_html;
use crate::registry::{FileRecord, FileRegistry};
use crate::stage::{CustomStep, FetchStage, PageStep, Stage, StageStep, Step};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The build of one site: its source tree, its registered steps and their items.
///
/// Steps read one after another, in registration order, so an earlier stage gets
/// first pick of the files. Writing happens only after every step has read, and
/// runs in parallel.
pub struct Site {
    root: PathBuf,
    input: PathBuf,
    output: PathBuf,
    registry: FileRegistry,
    steps: Vec<Box<dyn Step>>,
    all_items: Vec<ErasedItem>,
    post_processors: Vec<PostProcessor>,
    io: Arc<dyn FileIo>,
    config: Option<SiteConfig>,
}

impl Site {
    /// `input` and `output` are relative to the project root, found by walking
    /// up from the current directory.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Self> {
        Self::with_io(input, output, DiskIo)
    }

    pub fn with_io(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        io: impl FileIo + 'static,
    ) -> Result<Self> {
        let start = std::env::current_dir().io_context("reading", Path::new("."))?;
        let root = io.resolve_root(&start)?;
        Self::at(root, input.as_ref(), output.as_ref(), &[], Arc::new(io))
    }

    /// Builds a site from `tessera.toml`, found by walking up from `start`.
    /// A `minify = true` config registers [`minify_html`] as a post-processor.
    pub fn from_config(start: impl AsRef<Path>) -> Result<Self> {
        let (root, config) = SiteConfig::discover(start.as_ref())?;
        Self::from_loaded_config(root, config)
    }

    pub fn from_loaded_config(root: PathBuf, config: SiteConfig) -> Result<Self> {
        let mut site = Self::at(
            root,
            &config.input,
            &config.output,
            &config.ignore,
            Arc::new(DiskIo),
        )?;
        if config.minify {
            site = site.post_process(minify_html);
        }
        site.config = Some(config);
        Ok(site)
    }

    fn at(
        root: PathBuf,
        input: &Path,
        output: &Path,
        ignore: &[String],
        io: Arc<dyn FileIo>,
    ) -> Result<Self> {
        let input = root.join(input);
        let output = root.join(output);
        let registry = FileRegistry::scan(io.as_ref(), &input, ignore)?;

        Ok(Self {
            root,
            input,
            output,
            registry,
            steps: Vec::new(),
            all_items: Vec::new(),
            post_processors: Vec::new(),
            io,
            config: None,
        })
    }

    /// Registers a file-driven stage. A folder ending in `/**` or `/*` registers
    /// one copy of the stage per subfolder holding files the stage can read.
    pub fn register<M: Metadata>(mut self, stage: Stage<M>) -> Self {
        let glob_prefix = stage.folder_path().and_then(glob_prefix);
        match glob_prefix {
            Some(prefix) => {
                let subfolders = self
                    .registry
                    .subfolders(&prefix, |extension| stage.supports(extension));
                debug!(
                    prefix = %prefix.display(),
                    count = subfolders.len(),
                    "expanding folder glob"
                );
                for folder in subfolders {
                    self.steps
                        .push(Box::new(StageStep::new(stage.with_folder(folder))));
                }
            }
            None => self.steps.push(Box::new(StageStep::new(stage))),
        }
        self
    }

    pub fn register_fetch<M: Metadata>(mut self, stage: FetchStage<M>) -> Self {
        self.steps.push(Box::new(stage));
        self
    }

    pub fn register_step(mut self, step: CustomStep) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Writes one file at `path`, relative to the output folder, rendered from all items.
    pub fn create_page<F>(mut self, path: impl Into<PathBuf>, render: F) -> Self
    where
        F: Fn(&PageContext<'_>) -> Result<String> + Send + Sync + 'static,
    {
        self.steps
            .push(Box::new(PageStep::new(path.into(), Box::new(render))));
        self
    }

    /// Transforms every rendered file before it is written, in registration order.
    /// Files copied verbatim are not post-processed.
    pub fn post_process<F>(mut self, transform: F) -> Self
    where
        F: Fn(String, &Path) -> String + Send + Sync + 'static,
    {
        self.post_processors.push(Arc::new(transform));
        self
    }

    /// Runs the build. Fetch stages start their own runtime, so this must not be
    /// called from inside an async context.
    pub fn run(mut self) -> Result<Self> {
        let started = Instant::now();

        for step in &mut self.steps {
            let output = {
                let context = SiteContext {
                    input: &self.input,
                    output: &self.output,
                    registry: &self.registry,
                    all_items: &self.all_items,
                    io: self.io.as_ref(),
                    post_processors: &self.post_processors,
                };
                step.read(&context)?
            };
            self.registry.apply(output.claims);
            self.all_items.extend(output.items);
        }
        self.all_items
            .sort_by(|left, right| newest_first(&**left, &**right));
        info!(
            items = self.all_items.len(),
            elapsed = ?started.elapsed(),
            "read phase finished"
        );

        let writing = Instant::now();
        self.io.delete_path(&self.output)?;
        let context = SiteContext {
            input: &self.input,
            output: &self.output,
            registry: &self.registry,
            all_items: &self.all_items,
            io: self.io.as_ref(),
            post_processors: &self.post_processors,
        };
        self.steps
            .par_iter()
            .try_for_each(|step| step.write(&context))?;
        info!(elapsed = ?writing.elapsed(), "write phase finished");

        let copying = Instant::now();
        let unhandled: Vec<&FileRecord> = self.registry.unhandled().collect();
        unhandled.par_iter().try_for_each(|record| {
            let destination = self.output.join(&record.relative_path);
            if let Some(parent) = destination.parent() {
                self.io.mkpath(parent)?;
            }
            self.io.copy(&record.path, &destination)
        })?;
        info!(
            files = unhandled.len(),
            elapsed = ?copying.elapsed(),
            "copied static files"
        );

        info!(elapsed = ?started.elapsed(), "build finished");
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Every item of every step, newest first. Complete once [`Site::run`] has returned.
    pub fn all_items(&self) -> &[ErasedItem] {
        &self.all_items
    }

    pub fn config(&self) -> Option<&SiteConfig> {
        self.config.as_ref()
    }
}

/// The folder a `/**` or `/*` glob expands below.
fn glob_prefix(folder: &Path) -> Option<PathBuf> {
    let folder = folder.to_string_lossy();
    let prefix = folder
        .strip_suffix("**")
        .or_else(|| folder.strip_suffix('*'))?;
    match prefix {
        "" => Some(PathBuf::new()),
        prefix => prefix.strip_suffix('/').map(PathBuf::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_prefix() {
        assert_eq!(glob_prefix(Path::new("photos/**")), Some(PathBuf::from("photos")));
        assert_eq!(glob_prefix(Path::new("photos/*")), Some(PathBuf::from("photos")));
        assert_eq!(glob_prefix(Path::new("a/b/**")), Some(PathBuf::from("a/b")));
        assert_eq!(glob_prefix(Path::new("**")), Some(PathBuf::new()));
        assert_eq!(glob_prefix(Path::new("photos")), None);
        assert_eq!(glob_prefix(Path::new("photos**")), None);
    }
}
