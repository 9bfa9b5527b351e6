//! Sequential import session: one part in flight at a time, strict index
//! order, explicit retry/skip decisions on failure.
//!
//! The state machine in this module is pure — it never touches the network
//! or the filesystem — so every transition is unit-testable. The async side
//! (submitting parts, pacing delays, asking for decisions) lives in
//! [`driver`].

pub mod driver;

use thiserror::Error;

/// Retries allowed per part before the retry option is withdrawn.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Part `index` is the single in-flight submission.
    Processing { index: usize },
    /// Part `index` failed; the loop is paused until a decision arrives.
    /// `retries` counts the retries already spent on this part.
    AwaitingDecision { index: usize, retries: u32 },
    /// Every part went through successfully.
    Completed,
    /// The session was finalised on its successful subset.
    ManuallyCompleted,
}

/// Operator decision after a part failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry,
    Skip,
    /// Finalise now on the parts that already succeeded.
    CompleteNow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartOutcome {
    Success { rows_processed: u32, total_rows: u32 },
    Failure { message: String },
}

/// One line of the session's results log. A part that fails twice and then
/// succeeds contributes three entries with attempts 1, 2 and 3.
#[derive(Debug, Clone)]
pub struct PartResult {
    pub index: usize,
    pub part_name: String,
    pub attempt: u32,
    pub outcome: PartOutcome,
}

/// What the driver must send next: part `index`, in append mode or not.
/// Only the very first part may replace existing data; every later part is
/// an append on top of what the previous parts loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub index: usize,
    pub part_name: String,
    pub append: bool,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import session needs at least one part")]
    NoParts,
    #[error("{operation} is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("retry limit reached for part {index}")]
    RetryLimitReached { index: usize },
    #[error("manual completion requires at least one successful part")]
    ManualCompletionUnavailable,
}

/// State of one import session over a fixed list of parts.
pub struct ImportSession {
    part_names: Vec<String>,
    append_mode: bool,
    state: SessionState,
    retries: u32,
    processed: Vec<String>,
    skipped: Vec<String>,
    results: Vec<PartResult>,
    submissions: Vec<usize>,
}

impl ImportSession {
    pub fn new(part_names: Vec<String>, append_mode: bool) -> Result<ImportSession, ImportError> {
        if part_names.is_empty() {
            return Err(ImportError::NoParts);
        }
        Ok(ImportSession {
            part_names,
            append_mode,
            state: SessionState::Idle,
            retries: 0,
            processed: Vec::new(),
            skipped: Vec::new(),
            results: Vec::new(),
            submissions: Vec::new(),
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn total_parts(&self) -> usize {
        self.part_names.len()
    }

    pub fn processed_parts(&self) -> &[String] {
        &self.processed
    }

    pub fn skipped_parts(&self) -> &[String] {
        &self.skipped
    }

    pub fn results(&self) -> &[PartResult] {
        &self.results
    }

    /// Every submitted index in submission order, retries included.
    pub fn submissions(&self) -> &[usize] {
        &self.submissions
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SessionState::Completed | SessionState::ManuallyCompleted
        )
    }

    /// Whether a retry is still allowed for the failed part.
    pub fn can_retry(&self) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingDecision { retries, .. } if retries < MAX_RETRIES
        )
    }

    /// Manual completion needs at least one success and an unfinished loop.
    pub fn can_complete_manually(&self) -> bool {
        !self.processed.is_empty() && !self.is_terminal()
    }

    pub fn start(&mut self) -> Result<(), ImportError> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Processing { index: 0 };
                Ok(())
            }
            ref state => Err(ImportError::InvalidState {
                operation: "start",
                state: state.clone(),
            }),
        }
    }

    /// Claims the current part for submission and records the order. The
    /// single-flight rule is structural: there is exactly one `Processing`
    /// index and it must be claimed before an outcome can be reported.
    pub fn submit(&mut self) -> Result<Submission, ImportError> {
        match self.state {
            SessionState::Processing { index } => {
                self.submissions.push(index);
                Ok(Submission {
                    index,
                    part_name: self.part_names[index].clone(),
                    append: self.append_mode || index > 0,
                })
            }
            ref state => Err(ImportError::InvalidState {
                operation: "submit",
                state: state.clone(),
            }),
        }
    }

    pub fn on_success(&mut self, rows_processed: u32, total_rows: u32) -> Result<(), ImportError> {
        match self.state {
            SessionState::Processing { index } => {
                let name = self.part_names[index].clone();
                self.results.push(PartResult {
                    index,
                    part_name: name.clone(),
                    attempt: self.retries + 1,
                    outcome: PartOutcome::Success {
                        rows_processed,
                        total_rows,
                    },
                });
                self.processed.push(name);
                self.retries = 0;
                self.advance(index);
                Ok(())
            }
            ref state => Err(ImportError::InvalidState {
                operation: "on_success",
                state: state.clone(),
            }),
        }
    }

    pub fn on_failure(&mut self, message: impl Into<String>) -> Result<(), ImportError> {
        match self.state {
            SessionState::Processing { index } => {
                self.results.push(PartResult {
                    index,
                    part_name: self.part_names[index].clone(),
                    attempt: self.retries + 1,
                    outcome: PartOutcome::Failure {
                        message: message.into(),
                    },
                });
                self.state = SessionState::AwaitingDecision {
                    index,
                    retries: self.retries,
                };
                Ok(())
            }
            ref state => Err(ImportError::InvalidState {
                operation: "on_failure",
                state: state.clone(),
            }),
        }
    }

    pub fn decide(&mut self, decision: Decision) -> Result<(), ImportError> {
        let (index, retries) = match self.state {
            SessionState::AwaitingDecision { index, retries } => (index, retries),
            ref state => {
                return Err(ImportError::InvalidState {
                    operation: "decide",
                    state: state.clone(),
                })
            }
        };

        match decision {
            Decision::Retry => {
                if retries >= MAX_RETRIES {
                    return Err(ImportError::RetryLimitReached { index });
                }
                self.retries = retries + 1;
                self.state = SessionState::Processing { index };
                Ok(())
            }
            Decision::Skip => {
                self.skipped.push(self.part_names[index].clone());
                self.retries = 0;
                self.advance(index);
                Ok(())
            }
            Decision::CompleteNow => self.complete_manually(),
        }
    }

    /// Ends the session on the successful subset.
    pub fn complete_manually(&mut self) -> Result<(), ImportError> {
        if !self.can_complete_manually() {
            return Err(ImportError::ManualCompletionUnavailable);
        }
        self.state = SessionState::ManuallyCompleted;
        Ok(())
    }

    fn advance(&mut self, index: usize) {
        if index + 1 < self.part_names.len() {
            self.state = SessionState::Processing { index: index + 1 };
        } else if self.skipped.is_empty() {
            self.state = SessionState::Completed;
        } else {
            // The loop ran out of parts with some of them skipped: the
            // successful subset is what the session ends on.
            self.state = SessionState::ManuallyCompleted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("data_part{i}.txt")).collect()
    }

    fn session(n: usize) -> ImportSession {
        let mut session = ImportSession::new(parts(n), false).unwrap();
        session.start().unwrap();
        session
    }

    #[test]
    fn empty_sessions_are_rejected() {
        assert!(matches!(
            ImportSession::new(Vec::new(), false),
            Err(ImportError::NoParts)
        ));
    }

    #[test]
    fn happy_path_submits_in_order_and_completes() {
        let mut session = session(3);
        for expected in 0..3 {
            let submission = session.submit().unwrap();
            assert_eq!(submission.index, expected);
            session.on_success(10, 10 * (expected as u32 + 1)).unwrap();
        }
        assert_eq!(*session.state(), SessionState::Completed);
        assert_eq!(session.submissions(), &[0, 1, 2]);
        assert_eq!(session.processed_parts().len(), 3);
    }

    #[test]
    fn only_the_first_part_may_replace() {
        let mut session = session(3);
        assert!(!session.submit().unwrap().append);
        session.on_success(1, 1).unwrap();
        assert!(session.submit().unwrap().append);
        session.on_success(1, 2).unwrap();
        assert!(session.submit().unwrap().append);

        let mut append_session = ImportSession::new(parts(2), true).unwrap();
        append_session.start().unwrap();
        assert!(append_session.submit().unwrap().append);
    }

    #[test]
    fn skip_resumes_at_the_next_index_and_never_resubmits() {
        let mut session = session(3);
        session.submit().unwrap();
        session.on_success(1, 1).unwrap();

        session.submit().unwrap();
        session.on_failure("server error").unwrap();
        session.decide(Decision::Skip).unwrap();

        let submission = session.submit().unwrap();
        assert_eq!(submission.index, 2);
        session.on_success(1, 2).unwrap();

        assert!(session.is_terminal());
        assert_eq!(session.submissions(), &[0, 1, 2]);
        assert_eq!(session.skipped_parts(), &["data_part2.txt".to_string()]);
        // Ends on the successful subset, not as a clean completion.
        assert_eq!(*session.state(), SessionState::ManuallyCompleted);
    }

    #[test]
    fn retry_is_bounded() {
        let mut session = session(2);
        session.submit().unwrap();
        session.on_failure("boom").unwrap();

        for _ in 0..MAX_RETRIES {
            assert!(session.can_retry());
            session.decide(Decision::Retry).unwrap();
            session.submit().unwrap();
            session.on_failure("boom").unwrap();
        }

        assert!(!session.can_retry());
        assert!(matches!(
            session.decide(Decision::Retry),
            Err(ImportError::RetryLimitReached { index: 0 })
        ));
        // Skip still works once retries are exhausted.
        session.decide(Decision::Skip).unwrap();
        assert_eq!(session.submissions(), &[0, 0, 0, 0]);
    }

    #[test]
    fn failing_twice_then_succeeding_logs_three_attempts() {
        let mut session = session(3);
        session.submit().unwrap();
        session.on_success(10, 10).unwrap();

        session.submit().unwrap();
        session.on_failure("timeout").unwrap();
        session.decide(Decision::Retry).unwrap();
        session.submit().unwrap();
        session.on_failure("timeout").unwrap();
        session.decide(Decision::Retry).unwrap();
        session.submit().unwrap();
        session.on_success(10, 20).unwrap();

        session.submit().unwrap();
        session.on_success(10, 30).unwrap();

        assert_eq!(*session.state(), SessionState::Completed);
        assert_eq!(session.processed_parts().len(), 3);
        assert_eq!(session.submissions(), &[0, 1, 1, 1, 2]);

        let part2: Vec<_> = session.results().iter().filter(|r| r.index == 1).collect();
        assert_eq!(part2.len(), 3);
        assert!(matches!(part2[0].outcome, PartOutcome::Failure { .. }));
        assert!(matches!(part2[1].outcome, PartOutcome::Failure { .. }));
        assert!(matches!(
            part2[2].outcome,
            PartOutcome::Success { total_rows: 20, .. }
        ));
        assert_eq!(part2[2].attempt, 3);
    }

    #[test]
    fn manual_completion_needs_a_success() {
        let mut session = session(3);
        session.submit().unwrap();
        session.on_failure("boom").unwrap();
        assert!(matches!(
            session.decide(Decision::CompleteNow),
            Err(ImportError::ManualCompletionUnavailable)
        ));

        session.decide(Decision::Skip).unwrap();
        session.submit().unwrap();
        session.on_success(5, 5).unwrap();

        session.submit().unwrap();
        session.on_failure("boom").unwrap();
        session.decide(Decision::CompleteNow).unwrap();
        assert_eq!(*session.state(), SessionState::ManuallyCompleted);
        assert_eq!(session.processed_parts().len(), 1);
    }

    #[test]
    fn outcomes_require_a_claimed_submission() {
        let mut session = ImportSession::new(parts(1), false).unwrap();
        assert!(matches!(
            session.submit(),
            Err(ImportError::InvalidState { .. })
        ));
        session.start().unwrap();
        session.submit().unwrap();
        session.on_success(1, 1).unwrap();
        assert!(session.on_success(1, 1).is_err());
        assert!(session.on_failure("x").is_err());
    }
}
