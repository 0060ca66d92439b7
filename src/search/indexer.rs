use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::analysis::tokenizer::FileTokenizer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::settings::Settings;
use crate::core::stats::BuildStats;
use crate::filter::classifier::{self, PathClassifier};
use crate::filter::walk;
use crate::index::filename::FilenameSet;
use crate::index::stopword::{Stopword, StopwordDetector};
use crate::index::token::TokenSet;
use crate::parallel::scheduler::Scheduler;
use crate::parallel::worker::{spawn_pool, WorkerLink};
use crate::storage::file_lock::IndexLock;
use crate::storage::index_writer::IndexWriter;
use crate::storage::layout::IndexLayout;

const VOCABULARY_ZSTD_LEVEL: i32 = 19;

/// Builds the index for `config.root` into `config.index_dir`, replacing
/// whatever index was there.
pub struct Indexer {
    config: Config,
}

impl Indexer {
    pub fn new(config: Config) -> Self {
        Indexer { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Full build with the configured classifier and thread workers.
    pub fn build(&self) -> Result<BuildStats> {
        let mut classifier = classifier::from_config(&self.config)?;
        let tokenizer = FileTokenizer::from_config(&self.config);
        self.build_with(classifier.as_mut(), |count| {
            spawn_pool(count, &tokenizer, self.config.worker_idle_timeout)
        })
    }

    /// Build with a caller-supplied classifier and worker pool.
    pub fn build_with<L, S>(&self, classifier: &mut dyn PathClassifier, spawn: S) -> Result<BuildStats>
    where
        L: WorkerLink,
        S: FnOnce(usize) -> Result<Vec<L>>,
    {
        let started = Instant::now();
        let layout = IndexLayout::create(&self.config.index_dir)?;
        let _lock = IndexLock::acquire(&layout, true)?;
        let mut stats = BuildStats::default();

        let root = self.config.root.canonicalize().map_err(|e| {
            Error::new(ErrorKind::NotFound, format!("{}: {}", self.config.root.display(), e))
        })?;
        info!(root = %root.display(), index = %layout.base_dir.display(), "building index");

        let enqueued = walk::enqueue(&root, self.config.index_dotfiles, classifier)?;
        stats.files_seen = enqueued.seen;
        stats.files_ignored = enqueued.ignored;
        stats.files_enqueued = enqueued.paths.len();

        let mut tokens = TokenSet::with_max_chain_length(self.config.max_chain_length);
        let mut names = FilenameSet::with_max_chain_length(self.config.max_chain_length);

        let workers = self.config.worker_count.clamp(1, enqueued.paths.len().max(1));
        let mut scheduler = Scheduler::new(spawn(workers)?, self.config.tick_timeout);
        for path in enqueued.paths {
            scheduler.enqueue(path);
        }
        info!(workers = scheduler.worker_count(), files = scheduler.queued(), "tokenizing");
        let run = scheduler.run(&mut tokens, &mut names);
        let shutdown = scheduler.shutdown();
        let outcome = run?;
        shutdown?;

        stats.files_indexed = outcome.indexed;
        stats.files_skipped = outcome.skipped;
        stats.scheduler_ticks = outcome.ticks;
        stats.token_count = tokens.len() as u64;
        stats.occurrence_count = tokens.occurrence_count();

        let stopwords = if self.config.use_stopwords {
            StopwordDetector::from_config(&self.config).apply(&mut tokens)
        } else {
            Vec::new()
        };
        stats.stopword_count = stopwords.len();
        tokens.normalize();

        let writer = IndexWriter::new(self.config.codec);
        let fnames = writer.write_set(names.inner(), &layout.filename_db())?;
        let toks = writer.write_set(tokens.inner(), &layout.token_db())?;
        stats.filename_buckets = fnames.buckets;
        stats.token_buckets = toks.buckets;
        stats.filename_db_bytes = fnames.bytes;
        stats.token_db_bytes = toks.bytes;

        write_vocabulary(&layout, &tokens, self.config.compress_vocabulary)?;
        write_stopwords(&layout.stopwords(), &stopwords)?;

        let settings = Settings {
            case_sensitive: self.config.case_sensitive,
            compressed: self.config.compress_vocabulary,
            stopwords: self.config.use_stopwords,
        };
        settings.save(&layout.settings())?;
        File::create(layout.timestamp())?;

        stats.elapsed = started.elapsed();
        info!(
            indexed = stats.files_indexed,
            skipped = stats.files_skipped,
            tokens = stats.token_count,
            stopwords = stats.stopword_count,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "index built"
        );
        Ok(stats)
    }
}

/// Sorted non-stop tokens, one per line. The other vocabulary variant is
/// removed so a query never reads a stale one.
fn write_vocabulary(layout: &IndexLayout, tokens: &TokenSet, compressed: bool) -> Result<()> {
    let mut vocab: Vec<&str> = tokens
        .inner()
        .iter()
        .filter(|t| !t.stop)
        .map(|t| t.name.as_str())
        .collect();
    vocab.sort_unstable();

    let path = layout.vocabulary(compressed);
    let tmp = NamedTempFile::new_in(&layout.base_dir)?;
    let tmp = if compressed {
        let mut enc = zstd::stream::write::Encoder::new(BufWriter::new(tmp), VOCABULARY_ZSTD_LEVEL)?;
        write_lines(&mut enc, &vocab)?;
        enc.finish()?.into_inner().map_err(|e| e.into_error())?
    } else {
        let mut out = BufWriter::new(tmp);
        write_lines(&mut out, &vocab)?;
        out.into_inner().map_err(|e| e.into_error())?
    };
    tmp.as_file().sync_all()?;
    tmp.persist(&path)?;

    let stale = layout.vocabulary(!compressed);
    if stale.exists() {
        if let Err(e) = fs::remove_file(&stale) {
            warn!(path = %stale.display(), error = %e, "could not remove old vocabulary");
        }
    }
    Ok(())
}

fn write_lines<W: Write>(out: &mut W, lines: &[&str]) -> Result<()> {
    for line in lines {
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// `token count percent` per stopword, most frequent first.
fn write_stopwords(path: &Path, stopwords: &[Stopword]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for s in stopwords {
        writeln!(out, "{} {} {:.3}", s.name, s.count, s.percent)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::token::TokenSet;
    use tempfile::TempDir;

    #[test]
    fn vocabulary_skips_stopwords() {
        let dir = TempDir::new().unwrap();
        let layout = IndexLayout::create(dir.path()).unwrap();
        let mut tokens = TokenSet::new();
        for w in ["zeta", "alpha", "the"] {
            tokens.record(w, 1, 1);
        }
        tokens.inner_mut().get_mut("the").unwrap().stop = true;

        write_vocabulary(&layout, &tokens, false).unwrap();
        assert_eq!(fs::read_to_string(layout.vocabulary(false)).unwrap(), "alpha\nzeta\n");

        write_vocabulary(&layout, &tokens, true).unwrap();
        assert!(!layout.vocabulary(false).exists());
        let raw = zstd::decode_all(File::open(layout.vocabulary(true)).unwrap()).unwrap();
        assert_eq!(raw, b"alpha\nzeta\n");
    }
}
