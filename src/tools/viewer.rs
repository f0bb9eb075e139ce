//! Image viewer and editor launching. Failures are logged, never returned.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Launcher {
    viewer: String,
    editor: String,
}

impl Launcher {
    pub fn new(viewer: impl Into<String>, editor: impl Into<String>) -> Self {
        Self {
            viewer: viewer.into(),
            editor: editor.into(),
        }
    }

    /// Show the existing files among `paths` in the image viewer without waiting for it.
    ///
    /// Returns the paths handed to the viewer.
    pub fn open_viewer<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<PathBuf> {
        let existing: Vec<PathBuf> = paths
            .iter()
            .map(|p| p.as_ref().to_path_buf())
            .filter(|p| p.is_file())
            .collect();

        if existing.is_empty() {
            let requested: Vec<_> = paths.iter().map(|p| p.as_ref().display().to_string()).collect();
            error!("photo(s) not found: {:?}", requested);
            return existing;
        }

        info!("opening photo(s): {:?}", existing);
        if let Err(e) = Command::new(&self.viewer).args(&existing).spawn() {
            error!("failed to start {}: {}", self.viewer, e);
        }
        existing
    }

    /// Open `path` in the raw editor and wait until it is closed
    pub fn open_editor(&self, path: &Path) {
        info!("opening {} in {}", path.display(), self.editor);
        match Command::new(&self.editor).arg(path).status() {
            Ok(status) if !status.success() => {
                error!("{} exited with code {:?}", self.editor, status.code());
            }
            Ok(_) => {}
            Err(e) => error!("failed to start {}: {}", self.editor, e),
        }
    }
}
