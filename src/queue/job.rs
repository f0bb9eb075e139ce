use crate::error::Result;
use crate::tools::StitchOptions;
use raw_pano_common::sequence_identity;
use std::path::PathBuf;

/// Work a job performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Convert {
        input: PathBuf,
        output: PathBuf,
        style: Option<String>,
        overwrite: bool,
    },
    Stitch {
        inputs: Vec<PathBuf>,
        output_dir: PathBuf,
        options: StitchOptions,
    },
}

/// A unit of queued work and the photos it consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    name: String,
    pub photos: Vec<String>,
    pub task: Task,
}

impl Job {
    pub fn convert(
        photo: impl Into<String>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        style: Option<String>,
        overwrite: bool,
    ) -> Self {
        let photo = photo.into();
        Self {
            name: photo.clone(),
            photos: vec![photo],
            task: Task::Convert {
                input: input.into(),
                output: output.into(),
                style,
                overwrite,
            },
        }
    }

    /// Stitch `inputs`, the raw files of `photos` in sequence order
    pub fn stitch(
        photos: Vec<String>,
        inputs: Vec<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: StitchOptions,
    ) -> Self {
        Self {
            name: sequence_identity(&photos),
            photos,
            task: Task::Stitch {
                inputs,
                output_dir: output_dir.into(),
                options,
            },
        }
    }

    /// Display name: the photo for a conversion, `first-last` for a stitch
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        match self.task {
            Task::Convert { .. } => "convert",
            Task::Stitch { .. } => "stitch",
        }
    }
}

/// A finished job whose effects on the photo table are not applied yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub name: String,
    pub photos: Vec<String>,
}

impl From<Job> for CompletedJob {
    fn from(job: Job) -> Self {
        Self {
            name: job.name,
            photos: job.photos,
        }
    }
}

/// Executes one job to completion on the worker
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: &Job) -> Result<()>;
}
