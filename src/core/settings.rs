use std::fs;
use std::io::Write;
use std::path::Path;
use crate::core::error::{Error, ErrorKind, Result};

/// Flags persisted next to the index and read back before querying.
///
/// Stored as `key value` lines, one flag per line, values `0` or `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    pub case_sensitive: bool,
    pub compressed: bool,   // vocabulary file is zstd-compressed
    pub stopwords: bool,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::NotFound, format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut settings = Settings::default();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let flag = match value {
                "0" => false,
                "1" => true,
                _ => {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        format!("bad settings value for {}: {}", key, value),
                    ))
                }
            };
            match key {
                "case_sensitive" => settings.case_sensitive = flag,
                "compressed" => settings.compressed = flag,
                "stopwords" => settings.stopwords = flag,
                _ => {}
            }
        }
        Ok(settings)
    }

    pub fn render(&self) -> String {
        format!(
            "case_sensitive {}\ncompressed {}\nstopwords {}\n",
            self.case_sensitive as u8, self.compressed as u8, self.stopwords as u8
        )
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(self.render().as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_known_flags() {
        let s = Settings::parse("case_sensitive 1\ncompressed 0\nfuture_flag 1\n").unwrap();
        assert!(s.case_sensitive);
        assert!(!s.compressed);
        assert!(!s.stopwords);
    }

    #[test]
    fn render_round_trips() {
        let s = Settings { case_sensitive: false, compressed: true, stopwords: true };
        assert_eq!(Settings::parse(&s.render()).unwrap(), s);
    }

    #[test]
    fn bad_value_is_rejected() {
        let err = Settings::parse("compressed yes\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }
}
