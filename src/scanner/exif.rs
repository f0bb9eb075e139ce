use super::MetadataSource;
use crate::error::{PanoError, Result};
use exif::{Field, In, Reader, Tag, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// In-process EXIF reader for TIFF based raws (NEF and friends)
pub struct ExifReader;

impl MetadataSource for ExifReader {
    fn extract(&self, path: &Path) -> Result<HashMap<String, String>> {
        let file = File::open(path).map_err(|e| PanoError::metadata(path, e))?;
        let mut bufreader = BufReader::new(file);
        let exif = Reader::new()
            .read_from_container(&mut bufreader)
            .map_err(|e| PanoError::metadata(path, e))?;

        let mut data = HashMap::new();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            data.entry(tag_name(field.tag))
                .or_insert_with(|| field_value(field));
        }
        Ok(data)
    }
}

/// Tag name as exiv2 prints it
fn tag_name(tag: Tag) -> String {
    if tag == Tag::PhotographicSensitivity {
        "ISOSpeedRatings".to_string()
    } else {
        tag.to_string()
    }
}

/// ASCII values verbatim, so DateTimeOriginal keeps its `YYYY:MM:DD` form
fn field_value(field: &Field) -> String {
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|p| String::from_utf8_lossy(p).trim().to_string())
            .unwrap_or_default(),
        _ => field.display_value().to_string(),
    }
}
