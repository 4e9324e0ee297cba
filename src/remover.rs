use crate::error::AppError;
use crate::report::{Event, Reporter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum RemovalOutcome {
    Removed,
    /// Already gone, e.g. removed by an earlier run.
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub path: PathBuf,
    pub outcome: RemovalOutcome,
}

impl Removal {
    pub fn succeeded(&self) -> bool {
        self.outcome == RemovalOutcome::Removed
    }
}

/// Deletes each path independently. A failure is recorded and the batch
/// carries on.
pub fn remove<'a, I>(paths: I, reporter: &dyn Reporter) -> Vec<Removal>
where
    I: IntoIterator<Item = &'a Path>,
{
    paths
        .into_iter()
        .map(|path| {
            log::debug!("Removing duplicate: {:?}", path);
            let outcome = match fs::remove_file(path) {
                Ok(()) => {
                    reporter.report(Event::Removed {
                        path: path.to_path_buf(),
                    });
                    RemovalOutcome::Removed
                }
                Err(source) => {
                    let not_found = source.kind() == ErrorKind::NotFound;
                    let reason = AppError::Deletion {
                        path: path.to_path_buf(),
                        source,
                    }
                    .to_string();
                    reporter.report(Event::RemovalFailed {
                        path: path.to_path_buf(),
                        reason: reason.clone(),
                        not_found,
                    });
                    if not_found {
                        RemovalOutcome::NotFound
                    } else {
                        RemovalOutcome::Failed(reason)
                    }
                }
            };
            Removal {
                path: path.to_path_buf(),
                outcome,
            }
        })
        .collect()
}
