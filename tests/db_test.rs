//! PanoDb tests
//!
//! Queued conversions and stitches flowing back into the photo table

use raw_pano::config::Config;
use raw_pano::db::PanoDb;
use raw_pano::error::{PanoError, Result};
use raw_pano::scanner::{photo_name, MetadataSource};
use raw_pano::tools::{ConvertTool, Converter, StitchOptions, Stitcher, ToolRunner};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct FileTime;

impl MetadataSource for FileTime {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>> {
        let time = std::fs::read_to_string(path)?;
        Ok(HashMap::from([
            ("DateTimeOriginal".to_string(), time.trim().to_string()),
            ("FNumber".to_string(), "F8".to_string()),
        ]))
    }
}

/// Writes the output file and counts its calls
#[derive(Default)]
struct Touch {
    calls: AtomicUsize,
}

impl ConvertTool for Touch {
    fn develop(&self, _input: &Path, output: &Path, _style: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, b"jpeg")?;
        Ok(())
    }
}

/// Writes one rectilinear panorama named like the real stitcher does
struct FakeStitcher;

impl Stitcher for FakeStitcher {
    fn stitch(&self, inputs: &[PathBuf], output_dir: &Path, options: &StitchOptions) -> Result<Vec<PathBuf>> {
        let names: Vec<String> = inputs.iter().filter_map(|p| photo_name(p)).collect();
        let output = output_dir.join(format!("{}-rectilinear.tif", options.output_prefix(&names)));
        std::fs::write(&output, b"tif")?;
        Ok(vec![output])
    }
}

fn shoot_sequence(dir: &Path) {
    for (name, time) in [
        ("IMG1.NEF", "2024:06:01 12:00:00"),
        ("IMG2.NEF", "2024:06:01 12:00:05"),
        ("IMG3.NEF", "2024:06:01 12:00:10"),
        ("IMG4.NEF", "2024:06:01 13:00:00"),
    ] {
        std::fs::write(dir.join(name), time).expect("Failed to write photo");
    }
}

fn open(dir: &Path, tool: Arc<Touch>) -> PanoDb {
    let config = Config {
        capture_keys: vec!["FNumber".to_string()],
        worker_idle_timeout_ms: 20,
        ..Default::default()
    };
    let converter = Converter::new(tool, vec!["vivid".to_string()]);
    let runner = Arc::new(ToolRunner::new(converter.clone(), Arc::new(FakeStitcher)));
    PanoDb::open(dir, &config, Box::new(FileTime), converter, runner).expect("Failed to open db")
}

/// Converted photos get their JPEG flag after post-processing
#[tokio::test]
async fn test_convert_jpeg() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let tool = Arc::new(Touch::default());
    let mut db = open(dir.path(), tool.clone());

    db.convert_jpeg("IMG1", None, false).unwrap();
    db.convert_jpeg("IMG4", Some("vivid"), false).unwrap();
    assert_eq!(db.pending_jobs(), vec!["IMG1", "IMG4"]);

    db.wait_idle().await.unwrap();
    assert_eq!(db.post_process().unwrap(), vec!["IMG1", "IMG4"]);
    assert!(db.post_process().unwrap().is_empty());

    assert!(dir.path().join("Jpeg").join("IMG1.jpg").is_file());
    assert!(db.get("IMG1").unwrap().has_jpeg);
    assert!(db.get("IMG4").unwrap().has_jpeg);
    assert!(!db.get("IMG2").unwrap().has_jpeg);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
}

/// An existing JPEG is not developed again
#[tokio::test]
async fn test_convert_jpeg_skips_existing() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let tool = Arc::new(Touch::default());
    let mut db = open(dir.path(), tool.clone());

    db.convert_jpeg("IMG2", None, false).unwrap();
    db.convert_jpeg("IMG2", None, false).unwrap();
    db.wait_idle().await.unwrap();
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

    db.convert_jpeg("IMG2", None, true).unwrap();
    db.wait_idle().await.unwrap();
    assert_eq!(tool.calls.load(Ordering::SeqCst), 2);
    assert_eq!(db.post_process().unwrap(), vec!["IMG2", "IMG2", "IMG2"]);
}

/// Unknown styles are refused before anything is queued
#[tokio::test]
async fn test_invalid_style() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let db = open(dir.path(), Arc::new(Touch::default()));

    assert!(matches!(
        db.convert_jpeg("IMG1", Some("sepia"), false),
        Err(PanoError::InvalidStyle(_))
    ));
    let options = StitchOptions {
        style: Some("sepia".to_string()),
        ..Default::default()
    };
    assert!(matches!(db.create_panorama("IMG1", options), Err(PanoError::InvalidStyle(_))));
    assert!(matches!(
        db.convert_jpeg("IMG9", None, false),
        Err(PanoError::UnknownIdentity(_))
    ));
    assert!(db.pending_jobs().is_empty());
}

/// A stitched sequence is found and flagged on every member
#[tokio::test]
async fn test_create_panorama() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let mut db = open(dir.path(), Arc::new(Touch::default()));

    db.create_panorama("IMG2", StitchOptions::default()).unwrap();
    assert_eq!(db.pending_jobs(), vec!["IMG1-IMG3"]);
    db.wait_idle().await.unwrap();

    assert_eq!(db.post_process().unwrap(), vec!["IMG1-IMG3"]);
    for name in ["IMG1", "IMG2", "IMG3"] {
        assert!(db.get(name).unwrap().has_pano, "{name} should have a panorama");
    }
    assert!(!db.get("IMG4").unwrap().has_pano);

    let panoramas = db.find_panoramas("IMG3").unwrap();
    assert_eq!(panoramas.len(), 1);
    assert!(panoramas[0].ends_with("IMG1-IMG3-none-n-rectilinear.tif"));
}

/// Photos discarded while a job ran are skipped on post-processing
#[tokio::test]
async fn test_post_process_skips_discarded() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let mut db = open(dir.path(), Arc::new(Touch::default()));

    db.create_panorama("IMG1", StitchOptions::default()).unwrap();
    db.wait_idle().await.unwrap();
    db.discard("IMG2").unwrap();

    assert_eq!(db.post_process().unwrap(), vec!["IMG1-IMG3"]);
    assert!(!db.store().contains("IMG2"));
    // the walk stops at the discarded photo, so IMG1 alone has no panorama
    assert_eq!(db.get_sequence("IMG1").unwrap(), vec!["IMG1"]);
    assert!(!db.get("IMG1").unwrap().has_pano);
}

/// A failed refresh keeps every finished job for the next post-processing
#[tokio::test]
async fn test_post_process_failure_keeps_jobs() {
    let dir = tempdir().expect("Failed to create temp dir");
    shoot_sequence(dir.path());
    let mut db = open(dir.path(), Arc::new(Touch::default()));

    db.convert_jpeg("IMG1", None, false).unwrap();
    db.convert_jpeg("IMG4", None, false).unwrap();
    db.wait_idle().await.unwrap();

    // panoramas can't be listed while the directory is a plain file
    let pano_dir = dir.path().join("Panoramas");
    std::fs::remove_dir(&pano_dir).unwrap();
    std::fs::write(&pano_dir, b"not a directory").unwrap();
    assert!(db.post_process().is_err());
    assert!(!db.get("IMG1").unwrap().has_jpeg);

    std::fs::remove_file(&pano_dir).unwrap();
    std::fs::create_dir(&pano_dir).unwrap();
    assert_eq!(db.post_process().unwrap(), vec!["IMG1", "IMG4"]);
    assert!(db.get("IMG1").unwrap().has_jpeg);
    assert!(db.get("IMG4").unwrap().has_jpeg);
}
