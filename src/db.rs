//! PanoDb: the photo table, the job queue and the external tools behind one handle

use crate::config::Config;
use crate::error::Result;
use crate::queue::{Job, JobQueue, JobRunner};
use crate::scanner::MetadataSource;
use crate::store::PhotoStore;
use crate::tools::{Converter, Launcher, StitchOptions, ToolRunner};
use raw_pano_common::PhotoRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub struct PanoDb {
    store: PhotoStore,
    queue: JobQueue,
    converter: Converter,
    launcher: Launcher,
}

impl PanoDb {
    /// Open `root` with the given collaborators.
    ///
    /// Must be called inside a tokio runtime; the queue's worker runs there.
    pub fn open(
        root: &Path,
        config: &Config,
        source: Box<dyn MetadataSource>,
        converter: Converter,
        runner: Arc<dyn JobRunner>,
    ) -> Result<Self> {
        info!("initialising photo database for {}", root.display());
        let store = PhotoStore::open(root, config, source)?;
        let queue = JobQueue::on_current_runtime(runner, config.idle_timeout())?;
        Ok(Self {
            store,
            queue,
            converter,
            launcher: Launcher::new(&config.image_viewer, &config.editor),
        })
    }

    /// Open `root` with darktable, Hugin and the configured metadata backend
    pub fn with_tools(root: &Path, config: &Config) -> Result<Self> {
        let converter = Converter::darktable(config.style_dir().as_deref());
        let runner = Arc::new(ToolRunner::darktable_hugin(converter.clone()));
        Self::open(root, config, config.metadata_backend.source(), converter, runner)
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn styles(&self) -> &[String] {
        self.converter.styles()
    }

    pub fn get(&self, name: &str) -> Result<&PhotoRecord> {
        self.store.get(name)
    }

    pub fn scan(&mut self) -> Result<()> {
        self.store.scan()
    }

    pub fn save(&self) -> Result<()> {
        self.store.save()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.store.reset()
    }

    pub fn get_sequence(&self, name: &str) -> Result<Vec<String>> {
        self.store.get_sequence(name)
    }

    pub fn find_panoramas(&self, name: &str) -> Result<Vec<PathBuf>> {
        self.store.find_panoramas(name)
    }

    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        self.store.link(from, to)
    }

    pub fn unlink(&mut self, name: &str) -> Result<Option<String>> {
        self.store.unlink(name)
    }

    pub fn discard(&mut self, name: &str) -> Result<PathBuf> {
        self.store.discard(name)
    }

    /// Queue development of `name` into `Jpeg/<name>.jpg`.
    ///
    /// An existing JPEG is left alone unless `overwrite` is set.
    pub fn convert_jpeg(&self, name: &str, style: Option<&str>, overwrite: bool) -> Result<()> {
        if let Some(style) = style {
            self.converter.check_style(style)?;
        }
        let input = self.store.photo_path(name)?;
        let output = self.store.jpeg_path(name);
        info!("converting {} to jpeg: {}", input.display(), output.display());

        let job = Job::convert(name, input, output, style.map(str::to_string), overwrite);
        self.queue.enqueue(job)?;
        info!("queued photo for conversion: {}", name);
        Ok(())
    }

    /// Queue stitching of the sequence `name` belongs to into `Panoramas/`
    pub fn create_panorama(&self, name: &str, options: StitchOptions) -> Result<()> {
        if let Some(style) = &options.style {
            self.converter.check_style(style)?;
        }
        let photos = self.store.get_sequence(name)?;
        let inputs = self.store.sequence_paths(name)?;
        info!("creating panorama for {} from {} photos", name, photos.len());

        let job = Job::stitch(photos, inputs, &self.store.layout().pano_dir, options);
        self.queue.enqueue(job)?;
        info!("queued panorama: {}", name);
        Ok(())
    }

    /// Apply finished jobs to the table.
    ///
    /// Refreshes the flags of every input photo still present and returns
    /// the names of the drained jobs. Jobs whose refresh failed go back to
    /// the completed list and the first error is returned once every job
    /// was tried.
    pub fn post_process(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;
        for done in self.queue.drain_completed() {
            info!("post-processing queue element {}", done.name);
            let mut result = Ok(());
            for photo in &done.photos {
                if self.store.contains(photo) {
                    result = result.and(self.store.refresh_derived_flags(photo));
                }
            }
            match result {
                Ok(()) => names.push(done.name),
                Err(e) => {
                    error!("post-processing {} failed: {}", done.name, e);
                    first_error.get_or_insert(e);
                    failed.push(done);
                }
            }
        }
        self.queue.restore_completed(failed);
        match first_error {
            Some(e) => Err(e),
            None => Ok(names),
        }
    }

    /// Names of the queued and running jobs
    pub fn pending_jobs(&self) -> Vec<String> {
        self.queue.pending()
    }

    /// Wait for the worker to finish everything queued so far
    pub async fn wait_idle(&self) -> Result<()> {
        self.queue.wait_idle().await
    }

    pub fn open_photo(&self, name: &str) -> Result<Vec<PathBuf>> {
        let path = self.store.photo_path(name)?;
        Ok(self.launcher.open_viewer(&[path]))
    }

    /// Every raw of the sequence `name` belongs to
    pub fn open_photos(&self, name: &str) -> Result<Vec<PathBuf>> {
        let paths = self.store.sequence_paths(name)?;
        info!("opening photos in sequence for {}", name);
        Ok(self.launcher.open_viewer(&paths))
    }

    pub fn open_jpeg(&self, name: &str) -> Result<Vec<PathBuf>> {
        self.store.get(name)?;
        Ok(self.launcher.open_viewer(&[self.store.jpeg_path(name)]))
    }

    pub fn open_panoramas(&self, name: &str) -> Result<Vec<PathBuf>> {
        let panoramas = self.store.find_panoramas(name)?;
        info!("opening panoramas for {}", name);
        Ok(self.launcher.open_viewer(&panoramas))
    }

    /// Edit the raw and pick up the sidecar the editor leaves behind
    pub fn open_editor(&mut self, name: &str) -> Result<bool> {
        let path = self.store.photo_path(name)?;
        self.launcher.open_editor(&path);
        self.store.refresh_xmp(name)
    }
}
