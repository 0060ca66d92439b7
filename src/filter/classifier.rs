use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::filter::rules::{expand_home, RuleSet, Verdict};

/// Decides, per discovered path, whether it gets indexed.
pub trait PathClassifier {
    fn classify(&mut self, path: &str) -> Result<Verdict>;
}

/// In-process regex rules.
pub struct RuleClassifier {
    rules: RuleSet,
}

impl RuleClassifier {
    pub fn new(rules: RuleSet) -> Self {
        RuleClassifier { rules }
    }
}

impl PathClassifier for RuleClassifier {
    fn classify(&mut self, path: &str) -> Result<Verdict> {
        Ok(self.rules.classify(path))
    }
}

/// An external filter program, fed one path per line and answering
/// `ignore` or `index` per line.
pub struct CommandClassifier {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    reply: String,
}

impl CommandClassifier {
    pub fn spawn(program: &Path) -> Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| Error::new(ErrorKind::Subprocess, format!("spawn {}: {}", program.display(), e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::new(ErrorKind::Subprocess, "filter pipes unavailable".to_string()));
        };
        debug!(program = %program.display(), pid = child.id(), "filter started");
        Ok(CommandClassifier { child, stdin: Some(stdin), stdout: BufReader::new(stdout), reply: String::new() })
    }
}

impl PathClassifier for CommandClassifier {
    fn classify(&mut self, path: &str) -> Result<Verdict> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Subprocess, "filter already closed".to_string()))?;
        writeln!(stdin, "{}", path)?;
        stdin.flush()?;

        self.reply.clear();
        if self.stdout.read_line(&mut self.reply)? == 0 {
            return Err(Error::new(ErrorKind::Subprocess, "filter exited".to_string()));
        }
        match self.reply.trim_end_matches('\n').parse() {
            Ok(verdict) => Ok(verdict),
            Err(_) => {
                warn!(path, reply = %self.reply.trim_end(), "unexpected filter reply, ignoring path");
                Ok(Verdict::Ignore)
            }
        }
    }
}

impl Drop for CommandClassifier {
    fn drop(&mut self) {
        // Closing stdin ends the filter's read loop.
        self.stdin.take();
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "filter did not exit cleanly");
        }
    }
}

/// Classifier for a build: an external program if configured, else the
/// rules file, else the default rules.
pub fn from_config(config: &Config) -> Result<Box<dyn PathClassifier>> {
    if let Some(program) = &config.filter_command {
        return Ok(Box::new(CommandClassifier::spawn(program)?));
    }
    let rules = match &config.filter_file {
        Some(file) => RuleSet::load(&expand_home(file))?,
        None => RuleSet::defaults(),
    };
    debug!(rules = rules.len(), "path rules loaded");
    Ok(Box::new(RuleClassifier::new(rules)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_classifier_uses_rules() {
        let mut c = RuleClassifier::new(RuleSet::defaults());
        assert_eq!(c.classify("/x/.hg/store").unwrap(), Verdict::Ignore);
        assert_eq!(c.classify("/x/lib.rs").unwrap(), Verdict::Index);
    }

    #[cfg(unix)]
    #[test]
    fn command_classifier_speaks_line_protocol() {
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("filter.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nwhile read p; do\n  case \"$p\" in\n    *.log) echo ignore ;;\n    *.bin) echo maybe ;;\n    *) echo index ;;\n  esac\ndone\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut c = CommandClassifier::spawn(&script).unwrap();
        assert_eq!(c.classify("/var/app.log").unwrap(), Verdict::Ignore);
        assert_eq!(c.classify("/src/main.rs").unwrap(), Verdict::Index);
        assert_eq!(c.classify("/src/blob.bin").unwrap(), Verdict::Ignore);
    }

    #[test]
    fn missing_program_is_subprocess_error() {
        let err = CommandClassifier::spawn(Path::new("/nonexistent/gln_filter")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Subprocess);
    }

    #[test]
    fn config_with_rules_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("rules");
        std::fs::write(&file, "\\.txt$\n").unwrap();
        let config = Config { filter_file: Some(file), ..Config::default() };
        let mut c = from_config(&config).unwrap();
        assert_eq!(c.classify("/a/b.txt").unwrap(), Verdict::Ignore);
        assert_eq!(c.classify("/a/.git/x").unwrap(), Verdict::Index);
    }
}
