mod exif;
mod exiv2;

pub use exif::ExifReader;
pub use exiv2::Exiv2;

use crate::error::{PanoError, Result};
use clap::ValueEnum;
use raw_pano_common::PhotoRecord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Reads the capture metadata of one raw file as flat tag → value pairs
pub trait MetadataSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// Read EXIF in-process
    #[default]
    Exif,
    /// Shell out to `exiv2`
    Exiv2,
}

impl MetadataBackend {
    pub fn source(&self) -> Box<dyn MetadataSource> {
        match self {
            MetadataBackend::Exif => Box::new(ExifReader),
            MetadataBackend::Exiv2 => Box::new(Exiv2),
        }
    }
}

/// Raw files directly inside `folder`, sorted by path
pub fn scan_folder(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(PanoError::NotADirectory(folder.to_path_buf()));
    }

    let mut paths = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy();
            if extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext_str)) {
                debug!("found raw image: {}", path.display());
                paths.push(path.to_path_buf());
            }
        }
    }

    paths.sort();

    Ok(paths)
}

/// Photo identity of a raw file: its stem
pub fn photo_name(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}

/// Build one unlinked record per path, reading metadata in parallel.
///
/// Fails on the first file whose metadata cannot be read or lacks a
/// capture key.
pub fn read_records(
    paths: &[PathBuf],
    source: &dyn MetadataSource,
    capture_keys: &[String],
) -> Result<Vec<PhotoRecord>> {
    paths
        .par_iter()
        .map(|path| -> Result<PhotoRecord> {
            let name = photo_name(path).ok_or_else(|| PanoError::metadata(path, "no file name"))?;
            let metadata = source.extract(path)?;
            let record = PhotoRecord::from_metadata(name, path, &metadata, capture_keys)
                .map_err(|e| PanoError::metadata(path, e))?;
            debug!("metadata extracted for {}", record.name);
            Ok(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn extensions() -> Vec<String> {
        vec!["raw".to_string(), "nef".to_string()]
    }

    struct Fixed;

    impl MetadataSource for Fixed {
        fn extract(&self, path: &Path) -> Result<HashMap<String, String>> {
            if path.to_string_lossy().contains("broken") {
                return Err(PanoError::metadata(path, "unreadable"));
            }
            Ok(HashMap::from([
                ("FNumber".to_string(), "F8".to_string()),
                ("DateTimeOriginal".to_string(), "2024:06:01 12:00:00".to_string()),
            ]))
        }
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"), &extensions());
        assert!(matches!(result, Err(PanoError::NotADirectory(_))));
    }

    #[test]
    fn test_scan_folder_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in ["c.NEF", "a.nef", "b.raw", "notes.txt", "a.nef.xmp"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("Trash.nef")).unwrap();
        std::fs::create_dir(dir.path().join("Trash")).unwrap();
        File::create(dir.path().join("Trash").join("d.nef")).unwrap();

        let paths = scan_folder(dir.path(), &extensions()).unwrap();
        let names: Vec<String> = paths.iter().filter_map(|p| photo_name(p)).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_photo_name() {
        assert_eq!(photo_name(Path::new("/p/DSC_0001.NEF")).as_deref(), Some("DSC_0001"));
    }

    #[test]
    fn test_read_records_keeps_order() {
        let paths: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("/p/IMG{i}.nef"))).collect();
        let keys = vec!["FNumber".to_string()];

        let records = read_records(&paths, &Fixed, &keys).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["IMG0", "IMG1", "IMG2", "IMG3", "IMG4", "IMG5", "IMG6", "IMG7"]);
    }

    #[test]
    fn test_read_records_reports_unreadable_file() {
        let paths = vec![PathBuf::from("/p/ok.nef"), PathBuf::from("/p/broken.nef")];
        let keys = vec!["FNumber".to_string()];

        let err = read_records(&paths, &Fixed, &keys).unwrap_err();
        assert!(matches!(err, PanoError::MetadataUnavailable { .. }));
    }

    #[test]
    fn test_read_records_missing_key() {
        let paths = vec![PathBuf::from("/p/ok.nef")];
        let keys = vec!["WhiteBalance".to_string()];

        let err = read_records(&paths, &Fixed, &keys).unwrap_err();
        assert!(err.to_string().contains("WhiteBalance"));
    }
}
