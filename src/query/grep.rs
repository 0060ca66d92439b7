use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::core::error::{Error, ErrorKind, Result};
use crate::query::parser::{Operator, Query};

/// Files handed to one pipeline run.
pub const BATCH_SIZE: usize = 100;

/// How the first grep reports file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMode {
    /// Matching lines only (`-h`).
    Hide,
    /// `path:line` (grep's default for several files).
    Prefix,
    /// Names of matching files only (`-l`).
    Only,
}

impl NameMode {
    fn flag(self) -> Option<&'static str> {
        match self {
            NameMode::Hide => Some("-h"),
            NameMode::Prefix => None,
            NameMode::Only => Some("-l"),
        }
    }
}

/// A chain of `grep` processes that highlights query matches in the
/// result files. Each AND or NOT clause starts a new stage; OR clauses add
/// patterns to the current stage. Only the first stage reads files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepPipeline {
    stages: Vec<Vec<String>>,
}

impl GrepPipeline {
    /// `query` must have had its tokens matched. `timestamp` is an empty
    /// file added to every batch so grep always prints names.
    pub fn build(query: &Query, files: &[String], timestamp: &Path, names: NameMode, case_sensitive: bool) -> Self {
        let mut stages: Vec<Vec<String>> = Vec::new();
        for clause in &query.clauses {
            let new_stage = stages.is_empty() || matches!(clause.op, Operator::And | Operator::Not | Operator::Near);
            if new_stage {
                let mut args = Vec::new();
                if stages.is_empty() {
                    if let Some(flag) = names.flag() {
                        args.push(flag.to_string());
                    }
                }
                if !case_sensitive {
                    args.push("-i".to_string());
                }
                if clause.op == Operator::Not && !stages.is_empty() {
                    args.push("-v".to_string());
                }
                stages.push(args);
            }
            if let Some(stage) = stages.last_mut() {
                for token in &clause.tokens {
                    stage.push("-e".to_string());
                    stage.push(token.clone());
                }
            }
        }
        // A stage whose clause matched no tokens would hand grep no pattern.
        let has_pattern = |args: &Vec<String>| args.iter().any(|a| a == "-e");
        if !stages.first().is_some_and(has_pattern) {
            return GrepPipeline { stages: Vec::new() };
        }
        let first = stages.remove(0);
        stages.retain(has_pattern);
        stages.insert(0, first);

        if let Some(first) = stages.first_mut() {
            first.push("--".to_string());
            first.push(timestamp.to_string_lossy().into_owned());
            first.extend(files.iter().cloned());
        }
        GrepPipeline { stages }
    }

    pub fn stages(&self) -> &[Vec<String>] {
        &self.stages
    }

    /// Shell rendering of the pipeline.
    pub fn render(&self) -> String {
        self.stages
            .iter()
            .map(|args| {
                let mut cmd = String::from("grep");
                for arg in args {
                    cmd.push(' ');
                    cmd.push_str(&shell_quote(arg));
                }
                cmd
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Run the pipeline and copy its output to `out`, rewriting paths
    /// under `cwd` as relative paths.
    pub fn run<W: Write>(&self, cwd: &Path, names: NameMode, out: &mut W) -> Result<()> {
        if self.stages.is_empty() {
            return Ok(());
        }
        debug!(pipeline = %self.render(), "running grep");

        let mut children: Vec<Child> = Vec::with_capacity(self.stages.len());
        let mut upstream = None;
        for args in &self.stages {
            let mut cmd = Command::new("grep");
            cmd.args(args).stdout(Stdio::piped());
            if let Some(stdout) = upstream.take() {
                cmd.stdin(Stdio::from(stdout));
            }
            let mut child = cmd
                .spawn()
                .map_err(|e| Error::new(ErrorKind::Subprocess, format!("spawn grep: {}", e)))?;
            upstream = child.stdout.take();
            children.push(child);
        }

        let stdout = upstream.ok_or_else(|| Error::new(ErrorKind::Subprocess, "grep has no output".to_string()))?;
        let prefix = format!("{}/", cwd.display());
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            let shown = match names {
                NameMode::Hide => line.as_str(),
                _ => line.strip_prefix(&prefix).unwrap_or(&line),
            };
            writeln!(out, "{}", shown)?;
        }
        for mut child in children {
            // grep exits 1 when nothing matched; that is not a failure here.
            child.wait()?;
        }
        Ok(())
    }
}

/// Split `files` into pipeline-sized batches.
pub fn batches(files: &[String]) -> impl Iterator<Item = &[String]> {
    files.chunks(BATCH_SIZE)
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=:,+".contains(c)) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(text: &str, tokens: &[&[&str]]) -> Query {
        let mut q = Query::parse(text).unwrap();
        for (c, t) in q.clauses.iter_mut().zip(tokens) {
            c.tokens = t.iter().map(|s| s.to_string()).collect();
        }
        q
    }

    #[test]
    fn stages_follow_operators() {
        let q = matched("foo OR bar NOT baz", &[&["foo"], &["bar", "bars"], &["baz"]]);
        let files = vec!["/a/one.txt".to_string()];
        let p = GrepPipeline::build(&q, &files, Path::new("/h/.gln/timestamp"), NameMode::Prefix, false);
        assert_eq!(
            p.render(),
            "grep -i -e foo -e bar -e bars -- /h/.gln/timestamp /a/one.txt | grep -i -v -e baz"
        );
    }

    #[test]
    fn name_mode_and_case() {
        let q = matched("foo AND bar", &[&["foo"], &["bar"]]);
        let p = GrepPipeline::build(&q, &[], Path::new("/t"), NameMode::Only, true);
        assert_eq!(p.stages()[0][0], "-l");
        assert_eq!(p.render(), "grep -l -e foo -- /t | grep -e bar");
    }

    #[test]
    fn unmatched_clauses_drop_out() {
        let q = matched("foo NOT bar", &[&["foo"], &[]]);
        let p = GrepPipeline::build(&q, &[], Path::new("/t"), NameMode::Hide, true);
        assert_eq!(p.render(), "grep -h -e foo -- /t");

        let q = matched("foo", &[&[]]);
        assert!(GrepPipeline::build(&q, &[], Path::new("/t"), NameMode::Hide, true).stages().is_empty());
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("plain/path.txt"), "plain/path.txt");
        assert_eq!(shell_quote("my file"), "'my file'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn batching() {
        let files: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let sizes: Vec<usize> = batches(&files).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[cfg(unix)]
    #[test]
    fn runs_grep() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let ts = dir.path().join("timestamp");
        std::fs::write(&a, "needle here\nhay\nneedle and pin\n").unwrap();
        std::fs::write(&ts, "").unwrap();

        let q = matched("needle NOT pin", &[&["needle"], &["pin"]]);
        let files = vec![a.to_string_lossy().into_owned()];
        let p = GrepPipeline::build(&q, &files, &ts, NameMode::Prefix, false);
        let mut out = Vec::new();
        p.run(dir.path(), NameMode::Prefix, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a.txt:needle here\n");
    }
}
