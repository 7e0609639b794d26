//! Bounded Review Loop
//!
//! ```text
//! Researching ─► Evaluating ─┬─ pass ───────────────► Escalated
//!                   ▲        ├─ fail, budget left ─► Enhancing ─┐
//!                   │        └─ fail, budget spent ─► Exhausted │
//!                   └───────────────────────────────────────────┘
//! ```
//!
//! Neither terminal state is an error: an exhausted loop simply hands the
//! best-effort findings on to composition.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::verdict::ReviewVerdict;
use crate::types::{AppError, AppResult};

/// The three steps the loop coordinates, over some run state `S`
#[async_trait]
pub trait ReviewSteps<S: Send + Sync>: Send + Sync {
    /// Initial research; runs once before the first evaluation
    async fn research(&self, state: &mut S) -> AppResult<()>;

    /// Grade the current findings. `Ok(None)` means no judgment was produced.
    async fn evaluate(&self, state: &S) -> AppResult<Option<ReviewVerdict>>;

    /// Additional research driven by the latest (failing or absent) verdict
    async fn enhance(&self, state: &mut S, verdict: Option<&ReviewVerdict>) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Researching,
    Evaluating,
    Enhancing,
    Escalated,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    /// An evaluation passed
    Escalated,
    /// The iteration budget ran out without a pass
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopSummary {
    pub outcome: LoopOutcome,
    pub evaluations: u32,
    pub enhancements: u32,
    pub last_verdict: Option<ReviewVerdict>,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedReviewLoop {
    max_iterations: u32,
}

impl BoundedReviewLoop {
    pub fn new(max_iterations: u32) -> AppResult<Self> {
        if max_iterations == 0 {
            return Err(AppError::InvalidRequest(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_iterations })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub async fn run<S, R>(&self, steps: &R, state: &mut S) -> LoopSummary
    where
        S: Send + Sync,
        R: ReviewSteps<S> + ?Sized,
    {
        let mut current = LoopState::Researching;
        let mut evaluations = 0u32;
        let mut enhancements = 0u32;
        let mut last_verdict: Option<ReviewVerdict> = None;

        loop {
            debug!(state = ?current, evaluations, enhancements, "Review loop step");
            current = match current {
                LoopState::Researching => {
                    if let Err(e) = steps.research(state).await {
                        warn!(error = %e, "Initial research failed, continuing with what exists");
                    }
                    LoopState::Evaluating
                }
                LoopState::Evaluating => {
                    evaluations += 1;
                    last_verdict = match steps.evaluate(state).await {
                        Ok(verdict) => verdict,
                        Err(e) => {
                            warn!(error = %e, "Evaluation failed, treating as fail");
                            None
                        }
                    };

                    match &last_verdict {
                        Some(v) if v.passed() => {
                            info!(iteration = evaluations, "Research evaluation passed, escalating");
                            LoopState::Escalated
                        }
                        verdict => {
                            if verdict.is_none() {
                                info!(iteration = evaluations, "No research evaluation found, loop will continue");
                            } else {
                                info!(iteration = evaluations, "Research evaluation failed, loop will continue");
                            }
                            if evaluations >= self.max_iterations {
                                LoopState::Exhausted
                            } else {
                                LoopState::Enhancing
                            }
                        }
                    }
                }
                LoopState::Enhancing => {
                    enhancements += 1;
                    if let Err(e) = steps.enhance(state, last_verdict.as_ref()).await {
                        warn!(error = %e, "Enhancement search failed, re-evaluating current findings");
                    }
                    LoopState::Evaluating
                }
                LoopState::Escalated | LoopState::Exhausted => break,
            };
        }

        let outcome = if current == LoopState::Escalated {
            LoopOutcome::Escalated
        } else {
            info!(max_iterations = self.max_iterations, "Review budget exhausted, using best-effort findings");
            LoopOutcome::Exhausted
        };

        LoopSummary {
            outcome,
            evaluations,
            enhancements,
            last_verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::verdict::Grade;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Draft {
        text: String,
    }

    /// Replays a fixed script of evaluator results
    struct Scripted {
        verdicts: Mutex<VecDeque<AppResult<Option<ReviewVerdict>>>>,
        fail_research: bool,
        fail_enhance: bool,
    }

    impl Scripted {
        fn new(script: Vec<AppResult<Option<ReviewVerdict>>>) -> Self {
            Self {
                verdicts: Mutex::new(script.into()),
                fail_research: false,
                fail_enhance: false,
            }
        }

        fn grades(grades: &[Grade]) -> Self {
            Self::new(
                grades
                    .iter()
                    .map(|g| {
                        Ok(Some(match g {
                            Grade::Pass => ReviewVerdict::pass("good"),
                            Grade::Fail => ReviewVerdict::fail("thin", vec![]),
                        }))
                    })
                    .collect(),
            )
        }

        fn remaining(&self) -> usize {
            self.verdicts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReviewSteps<Draft> for Scripted {
        async fn research(&self, state: &mut Draft) -> AppResult<()> {
            if self.fail_research {
                return Err(AppError::Internal("search offline".into()));
            }
            state.text.push_str("research");
            Ok(())
        }

        async fn evaluate(&self, _state: &Draft) -> AppResult<Option<ReviewVerdict>> {
            self.verdicts.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn enhance(&self, state: &mut Draft, _verdict: Option<&ReviewVerdict>) -> AppResult<()> {
            if self.fail_enhance {
                return Err(AppError::Internal("follow-up search offline".into()));
            }
            state.text.push_str("+enhance");
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_escalates_on_first_pass() {
        let steps = Scripted::grades(&[Grade::Fail, Grade::Pass, Grade::Fail]);
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(3).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Escalated);
        assert_eq!(summary.evaluations, 2);
        assert_eq!(summary.enhancements, 1);
        assert_eq!(steps.remaining(), 1, "third verdict must never be consulted");
        assert!(summary.last_verdict.unwrap().passed());
    }

    #[tokio::test]
    async fn test_exhausts_without_final_enhance() {
        let steps = Scripted::grades(&[Grade::Fail, Grade::Fail]);
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(2).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Exhausted);
        assert_eq!(summary.evaluations, 2);
        assert_eq!(summary.enhancements, 1);
        assert_eq!(draft.text, "research+enhance");
    }

    #[tokio::test]
    async fn test_single_iteration_never_enhances() {
        let steps = Scripted::grades(&[Grade::Fail]);
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(1).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Exhausted);
        assert_eq!(summary.evaluations, 1);
        assert_eq!(summary.enhancements, 0);
        assert_eq!(draft.text, "research");
    }

    #[tokio::test]
    async fn test_missing_verdict_counts_as_fail() {
        let steps = Scripted::new(vec![
            Ok(None),
            Err(AppError::LLMApi("timeout".into())),
            Ok(Some(ReviewVerdict::pass("fine"))),
        ]);
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(5).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Escalated);
        assert_eq!(summary.evaluations, 3);
        assert_eq!(summary.enhancements, 2);
    }

    #[tokio::test]
    async fn test_research_failure_does_not_abort() {
        let mut steps = Scripted::grades(&[Grade::Pass]);
        steps.fail_research = true;
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(3).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Escalated);
        assert_eq!(summary.evaluations, 1);
        assert!(draft.text.is_empty());
    }

    #[tokio::test]
    async fn test_enhance_failure_does_not_abort() {
        let mut steps = Scripted::grades(&[Grade::Fail, Grade::Pass]);
        steps.fail_enhance = true;
        let mut draft = Draft::default();
        let summary = BoundedReviewLoop::new(3).unwrap().run(&steps, &mut draft).await;

        assert_eq!(summary.outcome, LoopOutcome::Escalated);
        assert_eq!(summary.evaluations, 2);
        assert_eq!(summary.enhancements, 1);
        assert_eq!(draft.text, "research");
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(matches!(BoundedReviewLoop::new(0), Err(AppError::InvalidRequest(_))));
        assert_eq!(BoundedReviewLoop::new(4).unwrap().max_iterations(), 4);
    }
}
