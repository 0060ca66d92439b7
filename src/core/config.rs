use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::compression::compress::Codec;
use crate::core::types::{DEFAULT_WORKERS, MAX_WORD_LEN, MAX_WORKERS, MIN_WORD_LEN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub index_dir: PathBuf,         // index lives in <index_dir>/.gln/
    pub root: PathBuf,              // root of indexed content

    // Worker pool
    pub worker_count: usize,
    pub worker_idle_timeout: Duration,
    pub tick_timeout: Duration,

    // Tokenizing
    pub case_sensitive: bool,
    pub min_word_len: usize,
    pub max_word_len: usize,
    pub index_dotfiles: bool,

    // Output
    pub codec: Codec,
    pub compress_vocabulary: bool,
    pub max_chain_length: usize,

    // Stop words
    pub use_stopwords: bool,
    pub stopword_flat_count: usize,
    pub stopword_change_factor: f64,
    pub stopword_min_percent: f64,

    // Path classification
    pub filter_file: Option<PathBuf>,
    pub filter_command: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        Config {
            index_dir: home,
            root: PathBuf::from("."),

            worker_count: default_worker_count(),
            worker_idle_timeout: Duration::from_secs(60),
            tick_timeout: Duration::from_millis(10),

            case_sensitive: false,
            min_word_len: MIN_WORD_LEN,
            max_word_len: MAX_WORD_LEN,
            index_dotfiles: false,

            codec: Codec::Zstd,
            compress_vocabulary: false,
            max_chain_length: 50,

            use_stopwords: false,
            stopword_flat_count: 5,
            stopword_change_factor: 0.75,
            stopword_min_percent: 1.0,

            filter_file: None,
            filter_command: None,
        }
    }
}

fn default_worker_count() -> usize {
    let cpus = num_cpus::get();
    if cpus == 0 { DEFAULT_WORKERS } else { cpus.clamp(1, MAX_WORKERS) }
}
