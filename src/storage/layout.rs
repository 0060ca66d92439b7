use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind, Result};

pub const INDEX_DIR_NAME: &str = ".gln";

/// Files making up one index, all under `<index_dir>/.gln/`.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    pub base_dir: PathBuf,
}

impl IndexLayout {
    /// Layout for writing, creating the directory if needed.
    pub fn create(index_dir: &Path) -> Result<Self> {
        let base_dir = index_dir.join(INDEX_DIR_NAME);
        fs::create_dir_all(&base_dir)?;
        Ok(IndexLayout { base_dir })
    }

    /// Layout of an existing index.
    pub fn open(index_dir: &Path) -> Result<Self> {
        let base_dir = index_dir.join(INDEX_DIR_NAME);
        if !base_dir.is_dir() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("no index at {}", base_dir.display()),
            ));
        }
        Ok(IndexLayout { base_dir })
    }

    pub fn filename_db(&self) -> PathBuf {
        self.base_dir.join("fname.db")
    }

    pub fn token_db(&self) -> PathBuf {
        self.base_dir.join("token.db")
    }

    /// Vocabulary, one token per line.
    pub fn vocabulary(&self, compressed: bool) -> PathBuf {
        if compressed {
            self.base_dir.join("tokens.zst")
        } else {
            self.base_dir.join("tokens")
        }
    }

    pub fn stopwords(&self) -> PathBuf {
        self.base_dir.join("stopwords")
    }

    pub fn settings(&self) -> PathBuf {
        self.base_dir.join("settings")
    }

    pub fn timestamp(&self) -> PathBuf {
        self.base_dir.join("timestamp")
    }

    pub fn lock(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_then_open() {
        let dir = TempDir::new().unwrap();
        assert_eq!(IndexLayout::open(dir.path()).unwrap_err().kind(), ErrorKind::NotFound);

        let layout = IndexLayout::create(dir.path()).unwrap();
        assert!(layout.base_dir.ends_with(".gln"));
        assert!(layout.token_db().ends_with(".gln/token.db"));
        assert!(layout.vocabulary(true).ends_with("tokens.zst"));

        let reopened = IndexLayout::open(dir.path()).unwrap();
        assert_eq!(reopened.base_dir, layout.base_dir);
    }
}
