use crate::descriptor::ResolvedDescriptor;
use crate::error::AppError;
use crate::report::{Event, Reporter};
use crate::resolver::{self, SidecarListing};
use crate::walker::is_descriptor;
use crate::writer::MetadataWriter;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryStats {
    pub directory: PathBuf,
    pub initial: usize,
    pub updated: usize,
    pub unprocessed: usize,
}

fn media_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && !is_descriptor(&entry.path()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// First capture time among a directory's descriptors; stands in for files of
/// that directory whose descriptor has none.
fn directory_timestamp(resolved: &[Option<ResolvedDescriptor>]) -> Option<i64> {
    resolved
        .iter()
        .flatten()
        .find_map(|r| r.descriptor.capture_timestamp)
}

/// `media_root/a/b.jpg` -> `processed_root/a/b.jpg`
pub fn processed_path(media_root: &Path, processed_root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(media_root) {
        Ok(relative) => processed_root.join(relative),
        Err(_) => processed_root.join(path.file_name().unwrap_or(path.as_os_str())),
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    // rename cannot cross filesystems
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Writes sidecar metadata into every media file under `media_root`, one
/// directory at a time, and moves updated files into the same relative
/// location under `processed_root`.
pub fn merge(
    writer: &MetadataWriter,
    media_root: &Path,
    processed_root: &Path,
    reporter: &dyn Reporter,
) -> Result<Vec<DirectoryStats>, AppError> {
    if !media_root.is_dir() {
        return Err(AppError::RootNotFound(media_root.to_path_buf()));
    }
    log::info!("Starting metadata update for folder: {:?}", media_root);
    let mut results = Vec::new();

    for entry in WalkDir::new(media_root).sort_by_file_name() {
        let dir = match entry {
            Ok(entry) if entry.file_type().is_dir() => entry.into_path(),
            Ok(_) => continue,
            Err(e) => {
                reporter.report(Event::WalkFailed {
                    path: e.path().map(Path::to_path_buf),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if dir.starts_with(processed_root) {
            continue;
        }

        let scanned = media_files(&dir).and_then(|files| Ok((files, SidecarListing::read(&dir)?)));
        let (files, listing) = match scanned {
            Ok(found) => found,
            Err(e) => {
                reporter.report(Event::WalkFailed {
                    path: Some(dir.clone()),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if files.is_empty() {
            continue;
        }

        let resolved: Vec<Option<ResolvedDescriptor>> = files
            .iter()
            .map(|file| resolver::resolve_in(&listing, file, reporter))
            .collect();
        let fallback = directory_timestamp(&resolved);
        let mut stats = DirectoryStats {
            directory: dir.clone(),
            initial: files.len(),
            ..DirectoryStats::default()
        };
        let mut updated = Vec::new();

        for (file, resolved) in files.iter().zip(&resolved) {
            log::debug!(
                "Media file: {:?}, descriptor: {:?}",
                file,
                resolved.as_ref().map(|r| &r.path)
            );

            if resolved.is_none() && fallback.is_none() {
                reporter.report(Event::FileSkipped {
                    path: file.clone(),
                    reason: "no descriptor or directory timestamp".to_string(),
                });
                stats.unprocessed += 1;
                continue;
            }

            match writer.apply(file, resolved.as_ref().map(|r| &r.descriptor), fallback) {
                Ok(applied) => {
                    stats.updated += 1;
                    reporter.report(Event::FileUpdated {
                        path: applied.path.clone(),
                    });
                    updated.push(applied.path);
                }
                Err(e) => {
                    reporter.report(Event::FileSkipped {
                        path: file.clone(),
                        reason: e.to_string(),
                    });
                    stats.unprocessed += 1;
                }
            }
        }

        log::info!("Moving updated files to: {:?}", processed_root);
        for path in updated {
            let target = processed_path(media_root, processed_root, &path);
            match move_file(&path, &target) {
                Ok(()) => reporter.report(Event::FileMoved {
                    from: path,
                    to: target,
                }),
                Err(e) => reporter.report(Event::MoveFailed {
                    from: path,
                    to: target,
                    reason: e.to_string(),
                }),
            }
        }

        results.push(stats);
    }

    for stats in &results {
        log::info!("Directory: {:?}", stats.directory);
        log::info!("  Initial file count: {}", stats.initial);
        log::info!("  Updated file count: {}", stats.updated);
        log::info!("  Unprocessed file count: {}", stats.unprocessed);
    }
    log::info!("Metadata update and file move completed.");
    Ok(results)
}
