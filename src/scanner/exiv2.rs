use super::MetadataSource;
use crate::error::{PanoError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

/// `exiv2 -g Exif.Photo -Pkv <path>`
pub struct Exiv2;

impl MetadataSource for Exiv2 {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>> {
        let output = Command::new("exiv2")
            .args(["-g", "Exif.Photo", "-Pkv"])
            .arg(path)
            .output()
            .map_err(|e| PanoError::metadata(path, format!("exiv2: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PanoError::metadata(
                path,
                format!("exiv2 failed (code {:?}): {}", output.status.code(), stderr.trim()),
            ));
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `Exif.Photo.<Tag>  <value>` lines into tag → value
fn parse_output(stdout: &str) -> HashMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(char::is_whitespace)?;
            let key = key.rsplit('.').next().unwrap_or(key);
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
