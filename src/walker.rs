use crate::error::AppError;
use crate::report::{Event, Reporter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct WalkSummary {
    pub files: usize,
    pub unreadable: Vec<PathBuf>,
}

pub fn is_descriptor(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Sends every media file under `root` to `paths_tx`, in file-name order.
/// An unreadable directory is reported and only its subtree is skipped.
pub fn start_walking(
    root: &Path,
    paths_tx: crossbeam_channel::Sender<PathBuf>,
    reporter: &dyn Reporter,
) -> Result<WalkSummary, AppError> {
    log::info!("Starting file discovery in {:?}", root);
    let mut summary = WalkSummary::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf);
                if let Some(path) = &path {
                    summary.unreadable.push(path.clone());
                }
                reporter.report(Event::WalkFailed {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
            continue;
        }
        let path = entry.path();
        if is_descriptor(path) {
            log::trace!("Skipping descriptor: {:?}", path);
            continue;
        }

        log::debug!("Discovered media file: {:?}", path);
        paths_tx.send(path.to_path_buf())?;
        summary.files += 1;
    }

    log::info!(
        "File discovery in {:?} complete: {} media files",
        root,
        summary.files
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_skips_descriptors_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("album")).unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg.json"), b"{}").unwrap();
        fs::write(dir.path().join("album").join("c.mp4"), b"x").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = MemoryReporter::default();

        let summary = start_walking(dir.path(), tx, &reporter).unwrap();
        let paths: Vec<PathBuf> = rx.iter().collect();

        assert_eq!(summary.files, 3);
        assert!(summary.unreadable.is_empty());
        assert_eq!(
            paths,
            vec![
                dir.path().join("a.jpg"),
                dir.path().join("album").join("c.mp4"),
                dir.path().join("b.jpg"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_skips_only_its_subtree() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("z.jpg"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // permissions are not enforced (running as root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = MemoryReporter::default();

        let summary = start_walking(dir.path(), tx, &reporter);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let summary = summary.unwrap();
        let paths: Vec<PathBuf> = rx.iter().collect();

        assert_eq!(paths, vec![dir.path().join("a.jpg"), dir.path().join("z.jpg")]);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.unreadable, vec![locked.clone()]);
        assert!(matches!(
            reporter.events().as_slice(),
            [Event::WalkFailed { path: Some(p), .. }] if *p == locked
        ));
    }

    #[test]
    fn test_is_descriptor() {
        assert!(is_descriptor(Path::new("a.jpg.json")));
        assert!(is_descriptor(Path::new("a.JSON")));
        assert!(!is_descriptor(Path::new("a.jpg")));
        assert!(!is_descriptor(Path::new("json")));
    }
}
