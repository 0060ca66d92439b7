use tracing::{debug, info};

use crate::core::config::Config;
use crate::index::token::TokenSet;

/// A token chosen as a stopword.
#[derive(Debug, Clone, PartialEq)]
pub struct Stopword {
    pub name: String,
    pub count: u64,
    pub percent: f64,
}

/// Finds the plateau in a descending frequency ranking and marks every
/// token ranked above it (and above the percentage floor) as a stopword.
#[derive(Debug, Clone, Copy)]
pub struct StopwordDetector {
    pub flat_count: usize,
    /// Percentage-point change below which two neighbours count as flat.
    pub change_factor: f64,
    pub min_percent: f64,
}

impl Default for StopwordDetector {
    fn default() -> Self {
        StopwordDetector {
            flat_count: 5,
            change_factor: 0.75,
            min_percent: 1.0,
        }
    }
}

impl StopwordDetector {
    pub fn from_config(config: &Config) -> Self {
        StopwordDetector {
            flat_count: config.stopword_flat_count,
            change_factor: config.stopword_change_factor,
            min_percent: config.stopword_min_percent,
        }
    }

    /// Index at which the plateau starts, for counts sorted descending.
    pub fn plateau(&self, counts: &[u64]) -> Option<usize> {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return None;
        }
        let pct = |c: u64| c as f64 * 100.0 / total as f64;

        let mut flats = 0;
        for i in 1..counts.len() {
            let delta = (pct(counts[i - 1]) - pct(counts[i])).abs();
            if delta < self.change_factor {
                flats += 1;
                if flats > self.flat_count {
                    return Some(i);
                }
            }
        }
        None
    }

    /// Which ranks are stopwords, for counts sorted descending.
    pub fn select(&self, counts: &[u64]) -> Vec<bool> {
        let total: u64 = counts.iter().sum();
        let mut stop = vec![false; counts.len()];
        let Some(stop_at) = self.plateau(counts) else {
            return stop;
        };
        for (i, &c) in counts.iter().enumerate().take(stop_at) {
            stop[i] = c as f64 * 100.0 / total as f64 >= self.min_percent;
        }
        stop
    }

    /// Rank `tokens`, set the stop flag on the chosen ones and return them
    /// most frequent first.
    pub fn apply(&self, tokens: &mut TokenSet) -> Vec<Stopword> {
        let mut ranked: Vec<(u64, String)> = tokens
            .inner()
            .iter()
            .map(|t| (t.count, t.name.clone()))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let counts: Vec<u64> = ranked.iter().map(|(c, _)| *c).collect();
        let total: u64 = counts.iter().sum();
        let chosen = self.select(&counts);
        debug!(tokens = ranked.len(), plateau = ?self.plateau(&counts), "ranked tokens");

        let mut stopwords = Vec::new();
        for ((count, name), stop) in ranked.into_iter().zip(chosen) {
            if !stop {
                continue;
            }
            if let Some(token) = tokens.inner_mut().get_mut(name.as_str()) {
                token.stop = true;
            }
            stopwords.push(Stopword {
                percent: count as f64 * 100.0 / total as f64,
                name,
                count,
            });
        }
        info!(count = stopwords.len(), "stopwords chosen");
        stopwords
    }
}
