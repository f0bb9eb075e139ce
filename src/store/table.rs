//! CSV form of the photo table
//!
//! One header row, one row per photo. Columns: `FileName`, `Path`,
//! `HasJpeg`, `HasPano`, `HasXmp`, `TimeGroup`, `Prev`, `Next`, every
//! capture attribute, then `DateTimeOriginal`. An empty `Prev`/`Next` means
//! no link. Any column not in the fixed set is read back as a capture
//! attribute.

use crate::error::{PanoError, Result};
use raw_pano_common::{CaptureAttributes, PhotoRecord, DATE_KEY, NAME_KEY, TIMEGROUP_KEY};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

const PATH_KEY: &str = "Path";
const HAS_JPEG_KEY: &str = "HasJpeg";
const HAS_PANO_KEY: &str = "HasPano";
const HAS_XMP_KEY: &str = "HasXmp";
const PREV_KEY: &str = "Prev";
const NEXT_KEY: &str = "Next";

const LEADING_COLUMNS: &[&str] = &[
    NAME_KEY,
    PATH_KEY,
    HAS_JPEG_KEY,
    HAS_PANO_KEY,
    HAS_XMP_KEY,
    TIMEGROUP_KEY,
    PREV_KEY,
    NEXT_KEY,
];

/// Write `records` to `path`, replacing it only once the new file is complete
pub fn write_table<'a, I>(path: &Path, records: I) -> Result<()>
where
    I: IntoIterator<Item = &'a PhotoRecord>,
    I::IntoIter: Clone,
{
    let records = records.into_iter();
    let attribute_keys: BTreeSet<&str> = records
        .clone()
        .flat_map(|r| r.capture_attributes.keys().map(String::as_str))
        .collect();

    let tmp_path = tmp_path(path);
    {
        let mut writer = csv::Writer::from_path(&tmp_path)?;

        let header: Vec<&str> = LEADING_COLUMNS
            .iter()
            .copied()
            .chain(attribute_keys.iter().copied())
            .chain(std::iter::once(DATE_KEY))
            .collect();
        writer.write_record(&header)?;

        for record in records {
            let mut row: Vec<String> = vec![
                record.name.clone(),
                record.path.to_string_lossy().to_string(),
                record.has_jpeg.to_string(),
                record.has_pano.to_string(),
                record.has_xmp.to_string(),
                record.time_group.to_string(),
                record.prev.clone().unwrap_or_default(),
                record.next.clone().unwrap_or_default(),
            ];
            for key in &attribute_keys {
                row.push(record.capture_attributes.get(*key).cloned().unwrap_or_default());
            }
            row.push(record.capture_time.to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a table written by [`write_table`]
pub fn read_table(path: &Path) -> Result<Vec<PhotoRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let column = |key: &str| headers.iter().position(|h| h == key);
    let required = |key: &str| {
        column(key).ok_or_else(|| PanoError::invalid_table(path, format!("missing column {key}")))
    };

    let name_col = required(NAME_KEY)?;
    let path_col = required(PATH_KEY)?;
    let group_col = required(TIMEGROUP_KEY)?;
    let prev_col = required(PREV_KEY)?;
    let next_col = required(NEXT_KEY)?;
    let date_col = required(DATE_KEY)?;
    let jpeg_col = column(HAS_JPEG_KEY);
    let pano_col = column(HAS_PANO_KEY);
    let xmp_col = column(HAS_XMP_KEY);

    let attribute_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !LEADING_COLUMNS.contains(h) && *h != DATE_KEY)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let field = |col: usize| row.get(col).unwrap_or("");
        let flag = |col: Option<usize>| match col {
            Some(col) => parse_bool(field(col))
                .ok_or_else(|| PanoError::invalid_table(path, format!("row {}: bad flag {:?}", line + 1, field(col)))),
            None => Ok(false),
        };
        let integer = |col: usize| {
            field(col).trim().parse::<i64>().map_err(|_| {
                PanoError::invalid_table(path, format!("row {}: bad number {:?}", line + 1, field(col)))
            })
        };

        let name = field(name_col).to_string();
        if name.is_empty() {
            return Err(PanoError::invalid_table(path, format!("row {}: empty name", line + 1)));
        }
        if !seen.insert(name.clone()) {
            return Err(PanoError::DuplicateIdentity(name));
        }

        let capture_attributes: CaptureAttributes = attribute_cols
            .iter()
            .map(|(col, key)| (key.clone(), field(*col).to_string()))
            .collect();

        records.push(PhotoRecord {
            path: PathBuf::from(field(path_col)),
            capture_attributes,
            capture_time: integer(date_col)?,
            time_group: integer(group_col)?,
            prev: link(field(prev_col)),
            next: link(field(next_col)),
            has_jpeg: flag(jpeg_col)?,
            has_pano: flag(pano_col)?,
            has_xmp: flag(xmp_col)?,
            name,
        });
    }

    Ok(records)
}

fn link(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" | "" => Some(false),
        _ => None,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
