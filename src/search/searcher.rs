use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::core::error::Result;
use crate::core::settings::Settings;
use crate::query::evaluator::{fold, Evaluator};
use crate::query::grep::{batches, GrepPipeline, NameMode};
use crate::query::matcher::VocabularyMatcher;
use crate::query::parser::Query;
use crate::storage::file_lock::IndexLock;
use crate::storage::format::TableKind;
use crate::storage::index_reader::{DumpEntry, IndexReader};
use crate::storage::layout::IndexLayout;

/// A query with its matched tokens and resulting paths.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub query: Query,
    /// Sorted, deduplicated paths.
    pub files: Vec<String>,
}

/// An opened index, ready for queries.
pub struct Searcher {
    layout: IndexLayout,
    settings: Settings,
    tokens: IndexReader,
    names: IndexReader,
    vocabulary: VocabularyMatcher,
    _lock: Option<IndexLock>,
}

impl Searcher {
    /// Open the index under `index_dir`. With `subtoken`, patterns may
    /// match inside tokens instead of whole tokens.
    pub fn open(index_dir: &Path, subtoken: bool) -> Result<Self> {
        let layout = IndexLayout::open(index_dir)?;
        let lock = IndexLock::acquire_shared(&layout)?;
        let settings = Settings::load(&layout.settings())?;

        let names = IndexReader::open(&layout.filename_db(), TableKind::Filename)?;
        let tokens = IndexReader::open(&layout.token_db(), TableKind::Token)?;
        let vocabulary = VocabularyMatcher::load(
            &layout.vocabulary(settings.compressed),
            settings.compressed,
            settings.case_sensitive,
            subtoken,
        )?;
        debug!(tokens = vocabulary.len(), codec = ?tokens.header.codec, "index opened");

        Ok(Searcher { layout, settings, tokens, names, vocabulary, _lock: lock })
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    fn evaluator(&self) -> Evaluator<'_, VocabularyMatcher, IndexReader, IndexReader> {
        Evaluator::new(&self.vocabulary, &self.tokens, &self.names)
    }

    /// Evaluate `query` to the paths it selects.
    pub fn search(&self, mut query: Query) -> Result<SearchResult> {
        let files = self.evaluator().evaluate(&mut query)?;
        Ok(SearchResult { query, files })
    }

    /// Vocabulary tokens each pattern of `query` matches, without
    /// consulting the index files.
    pub fn matching_tokens(&self, mut query: Query) -> Result<Query> {
        self.evaluator().match_tokens(&mut query)?;
        Ok(query)
    }

    /// Per-clause file hashes and the folded result, for verbose output.
    pub fn explain(&self, mut query: Query) -> Result<(Query, Vec<String>)> {
        let eval = self.evaluator();
        eval.match_tokens(&mut query)?;
        eval.collect_files(&mut query)?;
        let lines = query
            .clauses
            .iter()
            .map(|c| {
                let hashes: Vec<String> = c.results.iter().map(|h| format!("{:04x}", h)).collect();
                format!("{:<4} {}: {}", c.op, c.pattern, hashes.join(" "))
            })
            .chain(std::iter::once({
                let hashes: Vec<String> = fold(&query).iter().map(|h| format!("{:04x}", h)).collect();
                format!("file hashes -- {}", hashes.join(" "))
            }))
            .collect();
        Ok((query, lines))
    }

    /// grep pipelines for `result`, one per batch of files.
    pub fn pipelines(&self, result: &SearchResult, names: NameMode) -> Vec<GrepPipeline> {
        batches(&result.files)
            .map(|batch| {
                GrepPipeline::build(
                    &result.query,
                    batch,
                    &self.layout.timestamp(),
                    names,
                    self.settings.case_sensitive,
                )
            })
            .collect()
    }

    /// Run the highlighting pass over `result`, writing matching lines.
    pub fn grep<W: Write>(&self, result: &SearchResult, names: NameMode, cwd: &Path, out: &mut W) -> Result<()> {
        for pipeline in self.pipelines(result, names) {
            pipeline.run(cwd, names, out)?;
        }
        Ok(())
    }

    /// Write both index files as JSON lines.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        for reader in [&self.names, &self.tokens] {
            for (t, table) in reader.tables().iter().enumerate() {
                let line = serde_json::to_string(&TableLine {
                    kind: reader.kind().name(),
                    table: t,
                    offset: table.offset,
                    buckets: table.buckets,
                    max_buffer: reader.header.max_buffer,
                })?;
                writeln!(out, "{}", line)?;
            }
            reader.dump(|entry: DumpEntry| {
                writeln!(out, "{}", serde_json::to_string(&entry)?)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TableLine {
    kind: &'static str,
    table: usize,
    offset: usize,
    buckets: usize,
    max_buffer: u32,
}
