//! Evaluation verdicts and the bounded research → evaluate → enhance loop

pub mod bounded;
pub mod verdict;

pub use bounded::{BoundedReviewLoop, LoopOutcome, LoopState, LoopSummary, ReviewSteps};
pub use verdict::{Grade, ReviewVerdict, SearchQuery};
