//! Photo table
//!
//! Holds every raw photo in the root directory, the Prev/Next links that
//! chain them into sequences and the derived flags telling which renditions
//! exist. The table is persisted as `.db.csv` in the root.

mod table;

pub use table::{read_table, write_table};

use crate::config::Config;
use crate::error::{PanoError, Result};
use crate::scanner::{self, MetadataSource};
use crate::tools::darktable::jpeg_path;
use raw_pano_common::{first_duplicate, group, sequence_identity, PhotoRecord};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const TABLE_FILE_NAME: &str = ".db.csv";

/// Directories under the photo root
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub jpeg_dir: PathBuf,
    pub pano_dir: PathBuf,
    pub trash_dir: PathBuf,
    pub table_path: PathBuf,
}

impl Layout {
    /// Resolve `root` and create the output directories
    pub fn create(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            error!("directory not found: {}", root.display());
            return Err(PanoError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let layout = Self {
            jpeg_dir: root.join("Jpeg"),
            pano_dir: root.join("Panoramas"),
            trash_dir: root.join("Trash"),
            table_path: root.join(TABLE_FILE_NAME),
            root,
        };
        for dir in [&layout.jpeg_dir, &layout.pano_dir, &layout.trash_dir] {
            std::fs::create_dir_all(dir)?;
            debug!("directory ready: {}", dir.display());
        }
        Ok(layout)
    }
}

pub struct PhotoStore {
    layout: Layout,
    records: BTreeMap<String, PhotoRecord>,
    time_threshold: i64,
    raw_extensions: Vec<String>,
    capture_keys: Vec<String>,
    source: Box<dyn MetadataSource>,
}

impl PhotoStore {
    /// Open the store at `root`: load `.db.csv` when present, otherwise scan
    /// the directory and save the result.
    pub fn open(root: &Path, config: &Config, source: Box<dyn MetadataSource>) -> Result<Self> {
        let layout = Layout::create(root)?;
        let mut store = Self {
            layout,
            records: BTreeMap::new(),
            time_threshold: config.time_threshold,
            raw_extensions: config.raw_extensions.clone(),
            capture_keys: config.capture_keys.clone(),
            source,
        };

        if store.layout.table_path.is_file() {
            info!("database file found, loading existing data");
            store.load()?;
        } else {
            info!("database file not found, scanning directory");
            store.scan()?;
            store.save()?;
        }
        Ok(store)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Rebuild the table from the raw files in the root.
    ///
    /// The current table is kept if the scan fails.
    pub fn scan(&mut self) -> Result<()> {
        info!("starting directory scan for raw images");
        let paths = scanner::scan_folder(&self.layout.root, &self.raw_extensions)?;
        let mut records = scanner::read_records(&paths, self.source.as_ref(), &self.capture_keys)?;

        records.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(name) = first_duplicate(&records) {
            error!("duplicate file names found during scan: {}", name);
            return Err(PanoError::DuplicateIdentity(name.to_string()));
        }

        group(&mut records, self.time_threshold);
        for record in records.iter().filter(|r| r.next.is_some()) {
            debug!("linked {} to {}", record.name, record.next.as_deref().unwrap_or_default());
        }

        self.records = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        self.refresh_all_flags();
        info!("directory scan completed: {} photos", self.records.len());
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        write_table(&self.layout.table_path, self.records.values())?;
        info!("database saved to {}", self.layout.table_path.display());
        Ok(())
    }

    pub fn load(&mut self) -> Result<()> {
        let records = read_table(&self.layout.table_path)?;
        self.records = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        info!("database loaded from {}", self.layout.table_path.display());
        Ok(())
    }

    /// Delete the persisted table and empty the in-memory one
    pub fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.layout.table_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.records.clear();
        info!("database cleared");
        Ok(())
    }

    /// Throw away the table and rebuild it from the directory
    pub fn reset(&mut self) -> Result<()> {
        self.clear()?;
        self.scan()?;
        self.save()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Records in name order
    pub fn records(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.records.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Result<&PhotoRecord> {
        self.records
            .get(name)
            .ok_or_else(|| PanoError::UnknownIdentity(name.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut PhotoRecord> {
        self.records
            .get_mut(name)
            .ok_or_else(|| PanoError::UnknownIdentity(name.to_string()))
    }

    pub fn photo_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.get(name)?.path.clone())
    }

    pub fn jpeg_path(&self, name: &str) -> PathBuf {
        jpeg_path(&self.layout.jpeg_dir, name)
    }

    /// darktable sidecar next to the raw
    pub fn xmp_path(&self, name: &str) -> Result<PathBuf> {
        let mut path = self.photo_path(name)?.into_os_string();
        path.push(".xmp");
        Ok(PathBuf::from(path))
    }

    /// Names of the sequence `name` belongs to, first to last.
    ///
    /// A link to a photo that is no longer in the table ends the walk.
    pub fn get_sequence(&self, name: &str) -> Result<Vec<String>> {
        let record = self.get(name)?;
        let mut visited: HashSet<&str> = HashSet::from([name]);

        let mut before = self.walk(record.prev.as_deref(), |r| r.prev.as_deref(), &mut visited);
        before.reverse();
        let after = self.walk(record.next.as_deref(), |r| r.next.as_deref(), &mut visited);

        let mut sequence: Vec<String> = before.into_iter().map(str::to_string).collect();
        sequence.push(name.to_string());
        sequence.extend(after.into_iter().map(str::to_string));
        debug!("sequence for {}: {:?}", name, sequence);
        Ok(sequence)
    }

    fn walk<'a>(
        &'a self,
        mut current: Option<&'a str>,
        step: impl Fn(&'a PhotoRecord) -> Option<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) -> Vec<&'a str> {
        let mut names = Vec::new();
        while let Some(name) = current {
            let Some(record) = self.records.get(name) else {
                debug!("dangling link to {}", name);
                break;
            };
            if !visited.insert(record.name.as_str()) {
                break;
            }
            names.push(record.name.as_str());
            current = step(record);
        }
        names
    }

    /// Raw paths of the sequence `name` belongs to, in sequence order
    pub fn sequence_paths(&self, name: &str) -> Result<Vec<PathBuf>> {
        self.get_sequence(name)?
            .iter()
            .map(|n| self.photo_path(n))
            .collect()
    }

    /// Make `to` follow `from`.
    ///
    /// Previous partners of both photos are detached so links stay
    /// symmetric. Linking a photo to itself or closing a loop is refused.
    pub fn link(&mut self, from: &str, to: &str) -> Result<()> {
        self.get(from)?;
        self.get(to)?;

        let invalid = |reason| PanoError::InvalidLink {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };
        if from == to {
            return Err(invalid("a photo cannot follow itself"));
        }
        let mut visited = HashSet::new();
        let downstream = self.walk(Some(to), |r| r.next.as_deref(), &mut visited);
        if downstream.contains(&from) {
            return Err(invalid("the link would close a loop"));
        }

        let old_next = self.get_mut(from)?.next.take();
        if let Some(old) = old_next {
            if let Some(partner) = self.records.get_mut(&old) {
                if partner.prev.as_deref() == Some(from) {
                    partner.prev = None;
                }
            }
        }
        let old_prev = self.get_mut(to)?.prev.take();
        if let Some(old) = old_prev {
            if let Some(partner) = self.records.get_mut(&old) {
                if partner.next.as_deref() == Some(to) {
                    partner.next = None;
                }
            }
        }

        self.get_mut(from)?.next = Some(to.to_string());
        self.get_mut(to)?.prev = Some(from.to_string());
        info!("linked {} to {}", from, to);
        Ok(())
    }

    /// Cut the link after `name`. Returns the photo that followed it.
    pub fn unlink(&mut self, name: &str) -> Result<Option<String>> {
        let next = self.get_mut(name)?.next.take();
        if let Some(next) = &next {
            if let Some(partner) = self.records.get_mut(next) {
                if partner.prev.as_deref() == Some(name) {
                    partner.prev = None;
                }
            }
        }
        info!("unlinked {}", name);
        Ok(next)
    }

    /// Move the raw to `Trash/`, drop its row and save.
    ///
    /// A file already in `Trash/` is never replaced; the raw gets a
    /// numbered name instead.
    ///
    /// Links from neighbours are left as they are; walks stop at them.
    pub fn discard(&mut self, name: &str) -> Result<PathBuf> {
        let photo_path = self.photo_path(name)?;
        let file_name = photo_path
            .file_name()
            .ok_or_else(|| PanoError::UnknownIdentity(name.to_string()))?;
        // an earlier discard may have left a raw with the same file name
        let trash_path = free_path(&self.layout.trash_dir, Path::new(file_name));

        std::fs::rename(&photo_path, &trash_path)?;
        self.records.remove(name);
        info!("discarded photo {}, moved to {}", name, trash_path.display());
        self.save()?;
        Ok(trash_path)
    }

    /// Panorama files in `Panoramas/` named after the sequence of `name`
    pub fn find_panoramas(&self, name: &str) -> Result<Vec<PathBuf>> {
        let prefix = sequence_identity(&self.get_sequence(name)?);
        let mut panoramas: Vec<PathBuf> = match std::fs::read_dir(&self.layout.pano_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
                })
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        panoramas.sort();
        debug!("panoramas found for {}: {:?}", name, panoramas);
        Ok(panoramas)
    }

    /// Recompute `has_jpeg` and `has_xmp` for `name` and `has_pano` for its
    /// whole sequence from the files on disk
    pub fn refresh_derived_flags(&mut self, name: &str) -> Result<()> {
        let has_jpeg = self.jpeg_path(name).is_file();
        let has_xmp = self.xmp_path(name)?.is_file();
        let has_pano = !self.find_panoramas(name)?.is_empty();
        let sequence = self.get_sequence(name)?;

        let record = self.get_mut(name)?;
        record.has_jpeg = has_jpeg;
        record.has_xmp = has_xmp;
        for member in &sequence {
            if let Some(record) = self.records.get_mut(member) {
                record.has_pano = has_pano;
            }
        }
        info!(
            "updated flags for {}: jpeg={} pano={} xmp={}",
            name, has_jpeg, has_pano, has_xmp
        );
        Ok(())
    }

    /// Only `has_xmp`, after the editor may have written a sidecar
    pub fn refresh_xmp(&mut self, name: &str) -> Result<bool> {
        let has_xmp = self.xmp_path(name)?.is_file();
        self.get_mut(name)?.has_xmp = has_xmp;
        Ok(has_xmp)
    }

    fn refresh_all_flags(&mut self) {
        let flags: Vec<(String, bool, bool, bool)> = self
            .records
            .values()
            .map(|r| {
                let has_pano = self
                    .find_panoramas(&r.name)
                    .map(|p| !p.is_empty())
                    .unwrap_or(false);
                let has_xmp = self.xmp_path(&r.name).map(|p| p.is_file()).unwrap_or(false);
                (r.name.clone(), self.jpeg_path(&r.name).is_file(), has_pano, has_xmp)
            })
            .collect();

        for (name, has_jpeg, has_pano, has_xmp) in flags {
            if let Some(record) = self.records.get_mut(&name) {
                record.has_jpeg = has_jpeg;
                record.has_pano = has_pano;
                record.has_xmp = has_xmp;
            }
        }
    }
}

/// `dir/file_name`, or `dir/{stem}-{n}.{ext}` with the first free `n`
fn free_path(dir: &Path, file_name: &Path) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = file_name.file_stem().unwrap_or_default().to_string_lossy();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
