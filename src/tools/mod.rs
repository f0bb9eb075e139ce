//! External tools
//!
//! darktable develops raws, the Hugin tool chain stitches panoramas and the
//! image viewer/editor are launched for display. Everything here blocks the
//! calling thread for the tool's full runtime.
//!
//! Conversion and stitching judge success by the file they must produce:
//! tool exit codes are logged, and a missing output is `ConversionFailed`
//! or `StitchFailed`.

pub mod darktable;
pub mod hugin;
pub mod viewer;

pub use darktable::{available_styles, ConvertTool, Converter, DarktableCli};
pub use hugin::{HuginStitcher, Projection, StitchOptions, Stitcher, PROJECTIONS};
pub use viewer::Launcher;

use crate::error::{PanoError, Result};
use crate::queue::{Job, JobRunner, Task};
use std::ffi::{OsStr, OsString};
use std::process::{Command, Output};
use std::sync::Arc;
use tracing::{info, warn};

/// Run a command to completion, logging its output.
///
/// Fails with `CommandFailed` if the program cannot be started or exits
/// with a non-zero status.
pub fn run<I, S>(program: &str, args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let cmdline = format!(
        "{} {}",
        program,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    info!("running command: {}", cmdline);

    let output = Command::new(program)
        .args(&args)
        .output()
        .map_err(|e| PanoError::CommandFailed(format!("{}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        info!("command output: {}", stdout.trim());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        warn!("command error: {}", stderr.trim());
    }

    if !output.status.success() {
        return Err(PanoError::CommandFailed(format!(
            "{} exited with code {:?}",
            program,
            output.status.code()
        )));
    }

    Ok(output)
}

/// Run one pipeline stage. A failure is logged and left to the caller's
/// output check.
pub fn run_stage<I, S>(program: &str, args: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if let Err(e) = run(program, args) {
        warn!("{} failed: {}", program, e);
    }
}

/// Runs queued jobs with the real conversion and stitching tools
pub struct ToolRunner {
    converter: Converter,
    stitcher: Arc<dyn Stitcher>,
}

impl ToolRunner {
    pub fn new(converter: Converter, stitcher: Arc<dyn Stitcher>) -> Self {
        Self {
            converter,
            stitcher,
        }
    }

    /// darktable-cli for conversion and Hugin for stitching
    pub fn darktable_hugin(converter: Converter) -> Self {
        let stitcher = Arc::new(HuginStitcher::new(converter.clone()));
        Self::new(converter, stitcher)
    }
}

impl JobRunner for ToolRunner {
    fn run(&self, job: &Job) -> Result<()> {
        match &job.task {
            Task::Convert {
                input,
                output,
                style,
                overwrite,
            } => self
                .converter
                .convert(input, output, style.as_deref(), *overwrite),
            Task::Stitch {
                inputs,
                output_dir,
                options,
            } => self.stitcher.stitch(inputs, output_dir, options).map(|_| ()),
        }
    }
}
