use crate::descriptor::{Descriptor, ResolvedDescriptor};
use crate::error::AppError;
use crate::report::{Event, Reporter};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

lazy_static! {
    /// `name(12)` -> (`name`, `12`)
    static ref COUNTER: Regex = Regex::new(r"^(.*?)\((\d+)\)$").unwrap();
}

/// Names of the `.json` files in one directory, sorted so that lookups do not
/// depend on the order the filesystem lists them in.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SidecarListing {
    names: Vec<String>,
}

impl SidecarListing {
    pub fn read(dir: &Path) -> Result<Self, AppError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if name.ends_with(".json") {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(Self { names })
    }

    #[cfg(test)]
    pub fn from_names(names: &[&str]) -> Self {
        let mut names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        names.sort();
        Self { names }
    }

    /// Finds the sidecar for `media_name`. Patterns are tried in priority
    /// order; within a pattern the first name in sorted order wins.
    pub fn find(&self, media_name: &str) -> Option<&str> {
        sidecar_patterns(media_name)
            .iter()
            .find_map(|pattern| self.names.iter().find(|name| pattern.matches(name)))
            .map(String::as_str)
    }
}

enum SidecarPattern {
    Exact(String),
    Like(Regex),
}

impl SidecarPattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            SidecarPattern::Exact(exact) => name == exact,
            SidecarPattern::Like(re) => re.is_match(name),
        }
    }
}

fn sidecar_patterns(media_name: &str) -> Vec<SidecarPattern> {
    let path = Path::new(media_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(media_name);
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut sources = vec![format!(r"(?i)^{}\.[^()]+\.json$", regex::escape(media_name))];

    if let Some(caps) = COUNTER.captures(stem) {
        let base = regex::escape(&caps[1]);
        let counter = &caps[2];
        sources.push(format!(r"(?i)^{}\..+?\({}\)\.json$", base, counter));
        sources.push(format!(
            r"(?i)^{}\({}\){}\..+?\.json$",
            base,
            counter,
            regex::escape(&ext)
        ));
    }

    std::iter::once(SidecarPattern::Exact(format!("{}.json", media_name)))
        .chain(
            sources
                .iter()
                .filter_map(|src| Regex::new(src).ok())
                .map(SidecarPattern::Like),
        )
        .collect()
}

/// Locates and parses the sidecar for `media_path` by listing its directory.
#[cfg(test)]
pub fn resolve(media_path: &Path, reporter: &dyn Reporter) -> Option<ResolvedDescriptor> {
    let dir = media_path.parent()?;
    match SidecarListing::read(dir) {
        Ok(listing) => resolve_in(&listing, media_path, reporter),
        Err(e) => {
            reporter.report(Event::WalkFailed {
                path: Some(dir.to_path_buf()),
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Locates and parses the sidecar for `media_path` in a listing of its
/// directory. Callers read each [`SidecarListing`] once per directory.
pub fn resolve_in(
    listing: &SidecarListing,
    media_path: &Path,
    reporter: &dyn Reporter,
) -> Option<ResolvedDescriptor> {
    let media_name = media_path.file_name()?.to_str()?;
    let found = listing.find(media_name)?;
    let path = media_path.with_file_name(found);
    log::trace!("Descriptor for {:?}: {:?}", media_path, path);

    match Descriptor::from_file(&path) {
        Ok(descriptor) => Some(ResolvedDescriptor { path, descriptor }),
        Err(e) => {
            reporter.report(Event::DescriptorParseFailed {
                path,
                reason: e.to_string(),
            });
            None
        }
    }
}
