use crate::error::AppError;
use crate::grouper;
use crate::matcher::{self, MatchSet};
use crate::remover;
use crate::report::{Reporter, RunSummary};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    MatchOnly,
    MatchAndRemove,
}

/// Groups both trees, matches them and, in `MatchAndRemove` mode, deletes the
/// duplicates from the candidate tree.
pub fn run(
    reference: &Path,
    candidate: &Path,
    mode: RunMode,
    workers: usize,
    reporter: &dyn Reporter,
) -> Result<(MatchSet, RunSummary), AppError> {
    log::info!("Starting duplicate detection...");
    let reference_groups = grouper::group(reference, workers, reporter)?;
    let candidate_groups = grouper::group(candidate, workers, reporter)?;

    let matches = matcher::find_duplicates(&reference_groups, &candidate_groups, reporter);

    let mut summary = RunSummary {
        groups_compared: matches.groups_compared,
        duplicates_matched: matches.len(),
        unreadable_directories: reference_groups
            .unreadable()
            .iter()
            .chain(candidate_groups.unreadable())
            .cloned()
            .collect(),
        ..RunSummary::default()
    };

    if mode == RunMode::MatchAndRemove {
        log::info!("Starting duplicate removal...");
        let paths = matches.paths();
        for removal in remover::remove(paths.iter().map(|p| p.as_path()), reporter) {
            if removal.succeeded() {
                summary.removed += 1;
            } else {
                summary.removal_failed += 1;
            }
        }
        log::info!("Duplicate removal completed.");
    }

    Ok((matches, summary))
}
