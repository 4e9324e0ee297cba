use crate::grouper::GroupKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// Something worth telling the operator about while a run is in progress.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DescriptorParseFailed { path: PathBuf, reason: String },
    WalkFailed { path: Option<PathBuf>, reason: String },
    DuplicateFound { key: GroupKey, reference: PathBuf, candidate: PathBuf },
    Removed { path: PathBuf },
    RemovalFailed { path: PathBuf, reason: String, not_found: bool },
    FileUpdated { path: PathBuf },
    FileSkipped { path: PathBuf, reason: String },
    FileMoved { from: PathBuf, to: PathBuf },
    MoveFailed { from: PathBuf, to: PathBuf, reason: String },
}

/// Sink for run events. Passed explicitly to every stage.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Forwards events to the `log` facade.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: Event) {
        match event {
            Event::DescriptorParseFailed { path, reason } => {
                log::error!("Failed to load descriptor {:?}: {}", path, reason)
            }
            Event::WalkFailed { path: Some(path), reason } => {
                log::error!("Could not read {:?}: {}", path, reason)
            }
            Event::WalkFailed { path: None, reason } => log::error!("Walk error: {}", reason),
            Event::DuplicateFound { key, reference, candidate } => {
                log::info!("Duplicate found [{}]: {:?} -> {:?}", key, reference, candidate)
            }
            Event::Removed { path } => log::info!("Removed duplicate: {:?}", path),
            Event::RemovalFailed { path, reason, not_found: true } => {
                log::warn!("Already removed {:?}: {}", path, reason)
            }
            Event::RemovalFailed { path, reason, .. } => {
                log::error!("Failed to remove {:?}: {}", path, reason)
            }
            Event::FileUpdated { path } => log::info!("Updated metadata for {:?}", path),
            Event::FileSkipped { path, reason } => log::warn!("Skipping {:?}: {}", path, reason),
            Event::FileMoved { from, to } => log::info!("Moved file: {:?} -> {:?}", from, to),
            Event::MoveFailed { from, to, reason } => {
                log::error!("Failed to move {:?} to {:?}: {}", from, to, reason)
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<Event>>,
}

impl MemoryReporter {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// End-of-run totals for a dedupe pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub groups_compared: usize,
    pub duplicates_matched: usize,
    pub removed: usize,
    pub removal_failed: usize,
    pub unreadable_directories: Vec<PathBuf>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Groups compared:      {}", self.groups_compared)?;
        writeln!(f, "Duplicates matched:   {}", self.duplicates_matched)?;
        writeln!(f, "Deletions succeeded:  {}", self.removed)?;
        write!(f, "Deletions failed:     {}", self.removal_failed)?;
        if !self.unreadable_directories.is_empty() {
            write!(
                f,
                "\nUnreadable directories ({}, results are partial):",
                self.unreadable_directories.len()
            )?;
            for dir in &self.unreadable_directories {
                write!(f, "\n  {}", dir.display())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_unreadable_directories() {
        let summary = RunSummary {
            groups_compared: 4,
            duplicates_matched: 2,
            removed: 3,
            removal_failed: 1,
            unreadable_directories: vec![PathBuf::from("/t/a"), PathBuf::from("/t/b")],
        };

        assert_eq!(
            summary.to_string(),
            "Groups compared:      4\n\
             Duplicates matched:   2\n\
             Deletions succeeded:  3\n\
             Deletions failed:     1\n\
             Unreadable directories (2, results are partial):\n  /t/a\n  /t/b"
        );
    }

    #[test]
    fn test_summary_without_unreadable_directories() {
        let text = RunSummary::default().to_string();
        assert!(text.ends_with("Deletions failed:     0"));
        assert!(!text.contains("Unreadable"));
    }

    #[test]
    fn test_memory_reporter_keeps_order() {
        let reporter = MemoryReporter::default();
        reporter.report(Event::Removed { path: PathBuf::from("a") });
        reporter.report(Event::Removed { path: PathBuf::from("b") });
        assert_eq!(
            reporter.events(),
            vec![
                Event::Removed { path: PathBuf::from("a") },
                Event::Removed { path: PathBuf::from("b") },
            ]
        );
    }
}
