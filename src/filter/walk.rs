use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::filter::classifier::PathClassifier;
use crate::filter::rules::Verdict;

const REPORT_EVERY: usize = 1000;

/// Paths chosen for indexing, and how many were looked at.
#[derive(Debug, Default)]
pub struct Enqueued {
    pub paths: Vec<String>,
    pub seen: usize,
    pub ignored: usize,
}

/// Regular files under `root`, in walk order. Hidden entries are included
/// only with `dotfiles`. VCS ignore files are not consulted; the classifier
/// decides.
pub fn walk_files(root: &Path, dotfiles: bool) -> impl Iterator<Item = Result<PathBuf>> {
    WalkBuilder::new(root)
        .hidden(!dotfiles)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
}

/// Walk `root`, classify each file and collect the ones to index.
/// Unreadable entries and paths that cannot be sent over the worker
/// protocol are skipped with a warning.
pub fn enqueue(root: &Path, dotfiles: bool, classifier: &mut dyn PathClassifier) -> Result<Enqueued> {
    let mut out = Enqueued::default();
    for entry in walk_files(root, dotfiles) {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "walk error");
                continue;
            }
        };
        out.seen += 1;
        if out.seen % REPORT_EVERY == 0 {
            info!(seen = out.seen, enqueued = out.paths.len(), "enqueueing");
        }

        let Some(name) = path.to_str() else {
            warn!(path = %path.display(), "skipping non-UTF-8 path");
            out.ignored += 1;
            continue;
        };
        if name.contains('\n') {
            warn!(path = %name.escape_debug(), "skipping path containing a newline");
            out.ignored += 1;
            continue;
        }

        match classifier.classify(name)? {
            Verdict::Index => out.paths.push(name.to_string()),
            Verdict::Ignore => {
                debug!(path = name, "ignored");
                out.ignored += 1;
            }
        }
    }
    info!(seen = out.seen, enqueued = out.paths.len(), ignored = out.ignored, "enqueue finished");
    Ok(out)
}
