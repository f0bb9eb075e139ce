use crate::scanner::MetadataBackend;
use crate::tools::Projection;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "raw-pano")]
#[command(about = "Group raw photos into panorama sequences, develop and stitch them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Photo directory
    #[arg(short, long, default_value = ".", global = true)]
    pub root: PathBuf,

    /// Largest gap in seconds between shots of one sequence
    #[arg(short = 't', long, global = true)]
    pub time_threshold: Option<i64>,

    /// Metadata reader (exif/exiv2)
    #[arg(long, global = true)]
    pub metadata: Option<MetadataBackend>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List photos with their links and renditions
    List {
        /// Only photos that belong to a sequence
        #[arg(short, long)]
        sequences: bool,
    },

    /// Rescan the directory and rebuild the links
    Scan {
        /// Delete the saved table first
        #[arg(long)]
        reset: bool,
    },

    /// Show the sequence a photo belongs to
    Seq {
        #[arg(required = true)]
        name: String,
    },

    /// Make TO follow FROM
    Link {
        #[arg(required = true)]
        from: String,
        #[arg(required = true)]
        to: String,
    },

    /// Cut the link after a photo
    Unlink {
        #[arg(required = true)]
        name: String,
    },

    /// Move a raw to Trash/ and drop it from the table
    Discard {
        #[arg(required = true)]
        name: String,
    },

    /// Develop raws into Jpeg/
    Convert {
        #[arg(required = true)]
        names: Vec<String>,

        /// darktable style
        #[arg(short, long)]
        style: Option<String>,

        /// Replace existing JPEGs
        #[arg(long)]
        overwrite: bool,
    },

    /// Stitch the sequence of a photo into Panoramas/
    Stitch {
        #[arg(required = true)]
        name: String,

        /// darktable style applied to the inputs
        #[arg(short, long)]
        style: Option<String>,

        /// Open the Hugin GUI before rendering
        #[arg(short, long)]
        adjust: bool,

        /// Projection name or index, repeatable (default: rectilinear)
        #[arg(short, long = "projection")]
        projections: Vec<Projection>,

        /// Prefix for the output file names
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// List the panoramas of a photo's sequence
    Panoramas {
        #[arg(required = true)]
        name: String,
    },

    /// Show a photo in the image viewer
    Open {
        #[arg(required = true)]
        name: String,

        /// What to show
        #[arg(long, default_value = "raw")]
        target: OpenTarget,
    },

    /// Edit a raw in darktable
    Edit {
        #[arg(required = true)]
        name: String,
    },

    /// Show or change the configuration
    Config {
        /// Image viewer command
        #[arg(long)]
        set_viewer: Option<String>,

        /// Raw editor command
        #[arg(long)]
        set_editor: Option<String>,

        /// darktable style directory
        #[arg(long)]
        set_style_dir: Option<PathBuf>,

        /// Persist the --time-threshold/--metadata values
        #[arg(long)]
        save: bool,

        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OpenTarget {
    /// The raw file
    #[default]
    Raw,
    /// The developed JPEG
    Jpeg,
    /// Every raw of the sequence
    Sequence,
    /// The stitched panoramas
    Panoramas,
}
