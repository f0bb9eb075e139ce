//! Raw development with darktable

use super::run;
use crate::error::{PanoError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A program that develops one raw file into `output`
pub trait ConvertTool: Send + Sync {
    fn develop(&self, input: &Path, output: &Path, style: Option<&str>) -> Result<()>;
}

/// `darktable-cli <input> <output> [--style-overwrite --style <style>]`
pub struct DarktableCli;

impl ConvertTool for DarktableCli {
    fn develop(&self, input: &Path, output: &Path, style: Option<&str>) -> Result<()> {
        let mut args = vec![input.as_os_str().to_owned(), output.as_os_str().to_owned()];
        if let Some(style) = style {
            args.push("--style-overwrite".into());
            args.push("--style".into());
            args.push(style.into());
        }
        run("darktable-cli", args).map(|_| ())
    }
}

/// Converts raws through a [`ConvertTool`], skipping existing outputs and
/// checking that the output appeared.
#[derive(Clone)]
pub struct Converter {
    tool: Arc<dyn ConvertTool>,
    styles: Vec<String>,
}

impl Converter {
    pub fn new(tool: Arc<dyn ConvertTool>, styles: Vec<String>) -> Self {
        Self { tool, styles }
    }

    /// darktable-cli with the styles found in `style_dir`
    pub fn darktable(style_dir: Option<&Path>) -> Self {
        let styles = style_dir.map(available_styles).unwrap_or_default();
        info!("darktable styles available: {:?}", styles);
        Self::new(Arc::new(DarktableCli), styles)
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    pub fn check_style(&self, style: &str) -> Result<()> {
        if self.styles.iter().any(|s| s == style) {
            Ok(())
        } else {
            error!("invalid darktable style: {}", style);
            Err(PanoError::InvalidStyle(style.to_string()))
        }
    }

    /// Develop `input` into `output`.
    ///
    /// Does nothing when `output` exists and `overwrite` is false. With
    /// `overwrite` the old output is removed first. The tool's exit status
    /// is only logged; the call succeeds when the output file exists.
    pub fn convert(
        &self,
        input: &Path,
        output: &Path,
        style: Option<&str>,
        overwrite: bool,
    ) -> Result<()> {
        if !overwrite && output.is_file() {
            info!("conversion skipped, target exists: {}", output.display());
            return Ok(());
        }

        if let Some(style) = style {
            self.check_style(style)?;
        }

        if output.is_file() {
            debug!("removing previous output {}", output.display());
            std::fs::remove_file(output)?;
        }

        info!(
            "converting {} to {} with style {:?}",
            input.display(),
            output.display(),
            style
        );
        if let Err(e) = self.tool.develop(input, output, style) {
            warn!("conversion tool failed for {}: {}", input.display(), e);
        }

        if !output.is_file() {
            error!("conversion failed: {}", output.display());
            return Err(PanoError::ConversionFailed(output.to_path_buf()));
        }
        info!("conversion successful: {}", output.display());
        Ok(())
    }
}

/// Stems of the `.dtstyle` files in `dir`, sorted
pub fn available_styles(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut styles: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "dtstyle"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    styles.sort();
    styles
}

/// Path of the JPEG rendition of `name` inside `jpeg_dir`
pub fn jpeg_path(jpeg_dir: &Path, name: &str) -> PathBuf {
    jpeg_dir.join(format!("{name}.jpg"))
}
