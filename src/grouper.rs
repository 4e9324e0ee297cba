use crate::error::AppError;
use crate::report::{Event, Reporter};
use crate::resolver::{self, SidecarListing};
use crate::walker;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Normalized identity shared by files that depict the same logical photo.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    /// Lower-cased descriptor title, or the lower-cased file stem when the
    /// title is missing or empty.
    pub fn for_media(path: &Path, title: Option<&str>) -> Self {
        let key = match title {
            Some(title) if !title.trim().is_empty() => title.to_lowercase(),
            _ => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        };
        GroupKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        GroupKey(key.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    pub file_path: PathBuf,
    pub base_name: String,
    pub capture_timestamp: Option<i64>,
    pub descriptor_path: Option<PathBuf>,
}

/// Snapshot of one tree: records per key, each list in walk order.
#[derive(Debug, Default)]
pub struct Grouping {
    groups: BTreeMap<GroupKey, Vec<MediaRecord>>,
    unreadable: Vec<PathBuf>,
}

impl Grouping {
    pub fn insert(&mut self, key: GroupKey, record: MediaRecord) {
        self.groups.entry(key).or_default().push(record);
    }

    pub fn get(&self, key: &GroupKey) -> Option<&[MediaRecord]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &[MediaRecord])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn record_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Directories the walk could not read; the grouping is partial if any.
    pub fn unreadable(&self) -> &[PathBuf] {
        &self.unreadable
    }
}

/// Reads the sidecar listing of every directory in `dirs`. A directory that
/// cannot be listed is reported, returned in the second list, and gets an
/// empty listing so its files are grouped by name.
fn read_listings<'a>(
    dirs: BTreeSet<&'a Path>,
    reporter: &dyn Reporter,
) -> (HashMap<&'a Path, SidecarListing>, Vec<PathBuf>) {
    let read: Vec<(&Path, Result<SidecarListing, AppError>)> = dirs
        .into_par_iter()
        .map(|dir| (dir, SidecarListing::read(dir)))
        .collect();

    let mut listings = HashMap::with_capacity(read.len());
    let mut unreadable = Vec::new();
    for (dir, listing) in read {
        let listing = listing.unwrap_or_else(|e| {
            reporter.report(Event::WalkFailed {
                path: Some(dir.to_path_buf()),
                reason: e.to_string(),
            });
            unreadable.push(dir.to_path_buf());
            SidecarListing::default()
        });
        listings.insert(dir, listing);
    }
    (listings, unreadable)
}

/// Walks `root` and groups its media files by [`GroupKey`]. Descriptor lookup
/// runs on a pool of `workers` threads; the result keeps walk order.
pub fn group(root: &Path, workers: usize, reporter: &dyn Reporter) -> Result<Grouping, AppError> {
    if !root.is_dir() {
        return Err(AppError::RootNotFound(root.to_path_buf()));
    }

    let (paths_tx, paths_rx) = crossbeam_channel::unbounded();
    let (walk, paths) = std::thread::scope(|scope| {
        let walker = scope.spawn(move || walker::start_walking(root, paths_tx, reporter));
        let paths: Vec<PathBuf> = paths_rx.iter().collect();
        (walker.join(), paths)
    });
    let walk = walk.map_err(|_| AppError::Generic("walker thread panicked".into()))??;
    log::info!("Resolving descriptors for {} files with {} workers", paths.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let (records, unlisted): (Vec<(GroupKey, MediaRecord)>, Vec<PathBuf>) = pool.install(|| {
        let directories: BTreeSet<&Path> = paths.iter().filter_map(|p| p.parent()).collect();
        let (listings, unlisted) = read_listings(directories, reporter);

        let records: Vec<(GroupKey, MediaRecord)> = paths
            .par_iter()
            .map(|path| {
                let listing = path.parent().and_then(|dir| listings.get(dir));
                let resolved = listing.and_then(|l| resolver::resolve_in(l, path, reporter));
                let descriptor = resolved.as_ref().map(|r| &r.descriptor);
                let key = GroupKey::for_media(path, descriptor.and_then(|d| d.title.as_deref()));
                let record = MediaRecord {
                    file_path: path.clone(),
                    base_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    capture_timestamp: descriptor.and_then(|d| d.capture_timestamp),
                    descriptor_path: resolved.as_ref().map(|r| r.path.clone()),
                };
                (key, record)
            })
            .collect();
        (records, unlisted)
    });

    let mut unreadable = walk.unreadable;
    unreadable.extend(unlisted);
    let mut grouping = Grouping {
        unreadable,
        ..Grouping::default()
    };
    for (key, record) in records {
        grouping.insert(key, record);
    }
    log::info!(
        "Grouped {} files under {:?} into {} keys",
        grouping.record_count(),
        root,
        grouping.len()
    );
    Ok(grouping)
}
