use crate::error::AppError;
use crate::walker::is_descriptor;
use exif::{In, Reader, Tag};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a tree holds, descriptors excluded.
#[derive(Debug, Default, PartialEq)]
pub struct Inventory {
    pub total_files: usize,
    /// Lower-cased extension (empty for none) -> file count.
    pub extensions: BTreeMap<String, usize>,
    /// JPEGs whose EXIF already carries `DateTimeOriginal`.
    pub embedded_capture_dates: usize,
    pub unreadable: Vec<PathBuf>,
}

pub fn has_embedded_capture_date(path: &Path) -> Result<bool, AppError> {
    let mut reader = BufReader::new(File::open(path)?);
    let exif = Reader::new().read_from_container(&mut reader)?;
    Ok(exif.get_field(Tag::DateTimeOriginal, In::PRIMARY).is_some())
}

pub fn inventory(root: &Path) -> Result<Inventory, AppError> {
    if !root.is_dir() {
        return Err(AppError::RootNotFound(root.to_path_buf()));
    }
    let mut inventory = Inventory::default();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Walk error under {:?}: {}", root, e);
                if let Some(path) = e.path() {
                    inventory.unreadable.push(path.to_path_buf());
                }
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || is_descriptor(path) {
            continue;
        }

        inventory.total_files += 1;
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext == "jpg" || ext == "jpeg" {
            match has_embedded_capture_date(path) {
                Ok(true) => inventory.embedded_capture_dates += 1,
                Ok(false) => {}
                Err(e) => log::trace!("No EXIF in {:?}: {}", path, e),
            }
        }
        *inventory.extensions.entry(ext).or_default() += 1;
    }

    log::debug!("Inventory of {:?}: {:?}", root, inventory);
    Ok(inventory)
}
