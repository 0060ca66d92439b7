pub mod classifier;
pub mod rules;
pub mod walk;

pub use classifier::{CommandClassifier, PathClassifier, RuleClassifier};
pub use rules::{RuleSet, Verdict};
