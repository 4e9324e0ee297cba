use crate::grouper::{GroupKey, Grouping, MediaRecord};
use crate::report::{Event, Reporter};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One candidate-tree file judged to duplicate a reference-tree file.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub key: GroupKey,
    pub reference: PathBuf,
    pub candidate: PathBuf,
    pub candidate_descriptor: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct MatchSet {
    matches: Vec<DuplicateMatch>,
    seen: BTreeSet<PathBuf>,
    pub groups_compared: usize,
}

impl MatchSet {
    fn push(&mut self, key: &GroupKey, reference: &MediaRecord, candidate: &MediaRecord) -> bool {
        if !self.seen.insert(candidate.file_path.clone()) {
            return false;
        }
        self.matches.push(DuplicateMatch {
            key: key.clone(),
            reference: reference.file_path.clone(),
            candidate: candidate.file_path.clone(),
            candidate_descriptor: candidate.descriptor_path.clone(),
        });
        true
    }

    pub fn matches(&self) -> &[DuplicateMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Every path to delete: matched media files and their descriptors.
    pub fn paths(&self) -> BTreeSet<PathBuf> {
        self.matches
            .iter()
            .flat_map(|m| std::iter::once(m.candidate.clone()).chain(m.candidate_descriptor.clone()))
            .collect()
    }
}

/// Two records describe the same shot only if both carry a timestamp and the
/// timestamps are equal.
fn same_capture(a: &MediaRecord, b: &MediaRecord) -> bool {
    matches!((a.capture_timestamp, b.capture_timestamp), (Some(x), Some(y)) if x == y)
}

/// Pairs each duplicate candidate with the reference record it duplicates.
fn pair_group<'a>(
    candidates: &'a [MediaRecord],
    references: &'a [MediaRecord],
) -> Vec<(&'a MediaRecord, &'a MediaRecord)> {
    match (candidates, references) {
        // One file with this name on each side: the same photo.
        ([candidate], [reference]) => vec![(candidate, reference)],
        (_, [reference]) => candidates
            .iter()
            .filter(|c| same_capture(c, reference))
            .map(|c| (c, reference))
            .collect(),
        ([candidate], _) => references
            .iter()
            .find(|r| same_capture(candidate, r))
            .map(|r| (candidate, r))
            .into_iter()
            .collect(),
        _ => candidates
            .iter()
            .filter_map(|c| references.iter().find(|r| same_capture(c, r)).map(|r| (c, r)))
            .collect(),
    }
}

/// Finds the files in `candidate` that duplicate files in `reference`.
/// Only keys present in both groupings are compared.
pub fn find_duplicates(
    reference: &Grouping,
    candidate: &Grouping,
    reporter: &dyn Reporter,
) -> MatchSet {
    let mut set = MatchSet::default();

    for (key, candidates) in candidate.iter() {
        let Some(references) = reference.get(key) else {
            continue;
        };
        set.groups_compared += 1;
        if candidates.len() > 1 || references.len() > 1 {
            log::debug!(
                "{}: {} reference / {} candidate records",
                key,
                references.len(),
                candidates.len()
            );
        }

        for (dup, original) in pair_group(candidates, references) {
            if set.push(key, original, dup) {
                reporter.report(Event::DuplicateFound {
                    key: key.clone(),
                    reference: original.file_path.clone(),
                    candidate: dup.file_path.clone(),
                });
            }
        }
    }

    log::info!(
        "Found {} duplicates across {} shared groups",
        set.len(),
        set.groups_compared
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;

    fn record(path: &str, ts: Option<i64>) -> MediaRecord {
        MediaRecord {
            file_path: PathBuf::from(path),
            base_name: path.rsplit('/').next().unwrap().to_string(),
            capture_timestamp: ts,
            descriptor_path: Some(PathBuf::from(format!("{}.json", path))),
        }
    }

    fn grouping(records: &[(&str, &str, Option<i64>)]) -> Grouping {
        let mut grouping = Grouping::default();
        for (key, path, ts) in records {
            grouping.insert(GroupKey::from(*key), record(path, *ts));
        }
        grouping
    }

    fn candidates(set: &MatchSet) -> Vec<&str> {
        set.matches()
            .iter()
            .map(|m| m.candidate.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_one_to_one_ignores_timestamps() {
        let reference = grouping(&[("a", "/albums/a.jpg", Some(100))]);
        let candidate = grouping(&[("a", "/photos/a.jpg", Some(999))]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert_eq!(candidates(&set), vec!["/photos/a.jpg"]);
        assert_eq!(set.groups_compared, 1);
    }

    #[test]
    fn test_one_to_one_without_timestamps() {
        let reference = grouping(&[("a", "/albums/a.jpg", None)]);
        let candidate = grouping(&[("a", "/photos/a.jpg", None)]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert_eq!(candidates(&set), vec!["/photos/a.jpg"]);
    }

    #[test]
    fn test_many_candidates_one_reference() {
        let reference = grouping(&[("a", "/albums/a.jpg", Some(100))]);
        let candidate = grouping(&[
            ("a", "/photos/a.jpg", Some(100)),
            ("a", "/photos/a(1).jpg", Some(200)),
        ]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert_eq!(candidates(&set), vec!["/photos/a.jpg"]);
    }

    #[test]
    fn test_one_candidate_many_references() {
        let reference = grouping(&[
            ("a", "/albums/x/a.jpg", Some(100)),
            ("a", "/albums/y/a.jpg", Some(200)),
        ]);
        let candidate = grouping(&[("a", "/photos/a.jpg", Some(200))]);
        let reporter = MemoryReporter::default();

        let set = find_duplicates(&reference, &candidate, &reporter);

        assert_eq!(candidates(&set), vec!["/photos/a.jpg"]);
        assert_eq!(set.matches()[0].reference, PathBuf::from("/albums/y/a.jpg"));
        assert_eq!(reporter.events().len(), 1);
    }

    #[test]
    fn test_one_candidate_many_references_without_match() {
        let reference = grouping(&[
            ("a", "/albums/x/a.jpg", Some(100)),
            ("a", "/albums/y/a.jpg", Some(200)),
        ]);
        let candidate = grouping(&[("a", "/photos/a.jpg", Some(300))]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert!(set.is_empty());
        assert_eq!(set.groups_compared, 1);
    }

    #[test]
    fn test_many_to_many_first_reference_wins() {
        let reference = grouping(&[
            ("a", "/albums/x/a.jpg", Some(100)),
            ("a", "/albums/y/a.jpg", Some(200)),
            ("a", "/albums/z/a.jpg", Some(200)),
        ]);
        let candidate = grouping(&[
            ("a", "/photos/a.jpg", Some(200)),
            ("a", "/photos/a(1).jpg", Some(300)),
        ]);
        let reporter = MemoryReporter::default();

        let set = find_duplicates(&reference, &candidate, &reporter);

        assert_eq!(candidates(&set), vec!["/photos/a.jpg"]);
        assert_eq!(set.matches()[0].reference, PathBuf::from("/albums/y/a.jpg"));
        assert_eq!(
            reporter.events(),
            vec![Event::DuplicateFound {
                key: GroupKey::from("a"),
                reference: PathBuf::from("/albums/y/a.jpg"),
                candidate: PathBuf::from("/photos/a.jpg"),
            }]
        );
    }

    #[test]
    fn test_absent_timestamps_never_match_in_ambiguous_groups() {
        let reference = grouping(&[("a", "/albums/a.jpg", None)]);
        let candidate = grouping(&[
            ("a", "/photos/a.jpg", None),
            ("a", "/photos/a(1).jpg", None),
        ]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert!(set.is_empty());
    }

    #[test]
    fn test_keys_in_one_tree_only_contribute_nothing() {
        let reference = grouping(&[("a", "/albums/a.jpg", Some(1)), ("b", "/albums/b.jpg", Some(2))]);
        let candidate = grouping(&[("c", "/photos/c.jpg", Some(1)), ("b", "/photos/b.jpg", Some(2))]);

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert_eq!(candidates(&set), vec!["/photos/b.jpg"]);
        assert_eq!(set.groups_compared, 1);
    }

    #[test]
    fn test_paths_include_descriptors_without_duplicates() {
        let reference = grouping(&[("a", "/albums/a.jpg", Some(1))]);
        let mut candidate = grouping(&[("a", "/photos/a.jpg", Some(1))]);
        candidate.insert(
            GroupKey::from("a"),
            MediaRecord {
                descriptor_path: None,
                ..record("/photos/sub/a.jpg", Some(1))
            },
        );

        let set = find_duplicates(&reference, &candidate, &MemoryReporter::default());
        let paths: Vec<PathBuf> = set.paths().into_iter().collect();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("/photos/a.jpg"),
                PathBuf::from("/photos/a.jpg.json"),
                PathBuf::from("/photos/sub/a.jpg"),
            ]
        );
    }

    #[test]
    fn test_matching_is_deterministic() {
        let reference = grouping(&[
            ("a", "/albums/a.jpg", Some(1)),
            ("b", "/albums/b.jpg", Some(5)),
            ("b", "/albums/b2.jpg", Some(6)),
        ]);
        let candidate = grouping(&[
            ("b", "/photos/b.jpg", Some(6)),
            ("a", "/photos/a.jpg", None),
        ]);

        let first = find_duplicates(&reference, &candidate, &MemoryReporter::default());
        let second = find_duplicates(&reference, &candidate, &MemoryReporter::default());

        assert_eq!(first.matches(), second.matches());
        assert_eq!(candidates(&first), vec!["/photos/a.jpg", "/photos/b.jpg"]);
    }
}
