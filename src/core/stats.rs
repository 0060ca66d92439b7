use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Summary of one index build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildStats {
    // Enqueue
    pub files_seen: usize,
    pub files_ignored: usize,
    pub files_enqueued: usize,

    // Tokenizing
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub scheduler_ticks: u64,

    // Vocabulary
    pub token_count: u64,
    pub occurrence_count: u64,
    pub stopword_count: usize,

    // Output
    pub filename_buckets: usize,
    pub token_buckets: usize,
    pub filename_db_bytes: u64,
    pub token_db_bytes: u64,

    pub elapsed: Duration,
}

/// Progress reporting with a naive ETA based on the average rate so far.
#[derive(Debug)]
pub struct Progress {
    started: Instant,
    total: usize,
    next: usize,
    every: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Progress {
            started: Instant::now(),
            total,
            next: (total / 100).max(1),
            every: (total / 100).max(1),
        }
    }

    /// Returns a report line each time `done` passes another 1% of `total`.
    pub fn advance(&mut self, done: usize) -> Option<String> {
        if done < self.next {
            return None;
        }
        self.next = done + self.every;
        let pct = 100.0 * done as f64 / self.total.max(1) as f64;
        Some(format!(
            "{:.2}%, {} of {} files, eta {}",
            pct,
            done,
            self.total,
            format_eta(self.started.elapsed(), done, self.total)
        ))
    }
}

/// Estimate the time remaining, e.g. "1h 20m 14s".
pub fn format_eta(elapsed: Duration, done: usize, total: usize) -> String {
    if done == 0 {
        return "?".to_string();
    }
    let rate = elapsed.as_secs_f64() / done as f64;
    let rem = (rate * total.saturating_sub(done) as f64) as u64;
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h ", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m ", m));
    }
    out.push_str(&format!("{}s", s));
    out
}
