use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::core::error::{Error, ErrorKind, Result};

/// What to do with a discovered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ignore,
    Index,
}

impl FromStr for Verdict {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ignore" => Ok(Verdict::Ignore),
            "index" => Ok(Verdict::Index),
            other => Err(Error::new(ErrorKind::InvalidInput, format!("unknown action {:?}", other))),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Verdict::Ignore => "ignore",
            Verdict::Index => "index",
        })
    }
}

/// Paths ignored when no rules file is given.
pub const DEFAULT_IGNORE: &[&str] = &[
    r"\.git/", r"\.hg/", r"CVS/",
    r"~$",
    r"\.mp3$", r"\.pdf$", r"\.jpg$", r"\.ogg$", r"\.ppt$", r"\.zip$", r"\.chm$",
];

/// Ordered regex rules; the first match decides, unmatched paths are indexed.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<(Regex, Verdict)>,
}

impl RuleSet {
    pub fn empty() -> Self {
        RuleSet { rules: Vec::new() }
    }

    pub fn defaults() -> Self {
        let mut set = RuleSet::empty();
        for pat in DEFAULT_IGNORE {
            // Built-in patterns are known to compile.
            if let Ok(re) = compile(pat) {
                set.rules.push((re, Verdict::Ignore));
            }
        }
        set
    }

    pub fn add(&mut self, pattern: &str, verdict: Verdict) -> Result<()> {
        self.rules.push((compile(pattern)?, verdict));
        Ok(())
    }

    /// Parse a rules file:
    ///
    /// ```text
    /// # comment
    /// \.o$
    /// "My Documents/" ignore
    /// \.rs$ index
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut set = RuleSet::empty();
        for (n, line) in text.lines().enumerate() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (pattern, rest) = if let Some(quoted) = line.strip_prefix('"') {
                let end = quoted.find('"').ok_or_else(|| {
                    Error::new(ErrorKind::Parse, format!("line {}: unterminated pattern", n + 1))
                })?;
                (&quoted[..end], quoted[end + 1..].trim_start())
            } else {
                match line.split_once(' ') {
                    Some((pattern, rest)) => (pattern, rest),
                    None => (line, ""),
                }
            };
            let verdict = match rest.trim() {
                "" => Verdict::Ignore,
                action => action.parse()?,
            };
            set.add(pattern, verdict)?;
        }
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn classify(&self, path: &str) -> Verdict {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(_, verdict)| *verdict)
            .unwrap_or(Verdict::Index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_skip_vcs_and_media() {
        let rules = RuleSet::defaults();
        assert_eq!(rules.classify("/src/.git/config"), Verdict::Ignore);
        assert_eq!(rules.classify("/src/notes.txt~"), Verdict::Ignore);
        assert_eq!(rules.classify("/music/Song.MP3"), Verdict::Ignore);
        assert_eq!(rules.classify("/src/main.rs"), Verdict::Index);
    }

    #[test]
    fn parses_rules_file() {
        let text = "# build output\n\\.o$\n\n\"My Documents/\" ignore\n\\.rs$ index\ntarget/ ignore\n";
        let rules = RuleSet::parse(text).unwrap();
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.classify("/a/b.o"), Verdict::Ignore);
        assert_eq!(rules.classify("/home/my documents/x.txt"), Verdict::Ignore);
        assert_eq!(rules.classify("/a/target/x.rs"), Verdict::Index);
        assert_eq!(rules.classify("/a/target/x.d"), Verdict::Ignore);
        assert_eq!(rules.classify("/a/readme"), Verdict::Index);
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(RuleSet::parse("\"open\n").unwrap_err().kind(), ErrorKind::Parse);
        assert_eq!(RuleSet::parse("x skip\n").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert!(RuleSet::parse("(unclosed\n").is_err());
    }

    #[test]
    fn home_expansion() {
        let plain = Path::new("/etc/gln_filter");
        assert_eq!(expand_home(plain), plain);
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home(Path::new("~/rules")), PathBuf::from(home).join("rules"));
        }
    }
}
