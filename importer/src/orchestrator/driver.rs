//! Async side of an import session: submits parts one at a time, paces
//! submissions with fixed delays and routes failures to a decision handler.

use async_trait::async_trait;
use common::model::responses::ProcessFilesResponse;
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientError;
use crate::orchestrator::{Decision, ImportError, ImportSession, SessionState, Submission};

/// A part file staged for upload.
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub name: String,
    pub path: PathBuf,
}

/// Sends one part to the processing backend. Implemented by the HTTP client;
/// tests substitute a scripted fake.
#[async_trait]
pub trait PartSubmitter {
    async fn submit_part(
        &self,
        part: &PartUpload,
        submission: &Submission,
    ) -> Result<ProcessFilesResponse, ClientError>;
}

/// Context handed to the decision handler after a part failure.
#[derive(Debug)]
pub struct FailureContext<'a> {
    pub part_name: &'a str,
    pub index: usize,
    pub total: usize,
    pub message: &'a str,
    pub can_retry: bool,
    pub can_complete: bool,
}

/// Chooses what to do with a failed part: prompt the operator, or a policy
/// for unattended runs.
#[async_trait]
pub trait DecisionHandler {
    async fn decide(&mut self, context: &FailureContext<'_>) -> Decision;
}

#[async_trait]
impl DecisionHandler for Box<dyn DecisionHandler + Send> {
    async fn decide(&mut self, context: &FailureContext<'_>) -> Decision {
        (**self).decide(context).await
    }
}

/// Skips every failed part; the policy for non-interactive runs.
pub struct SkipOnFailure;

#[async_trait]
impl DecisionHandler for SkipOnFailure {
    async fn decide(&mut self, context: &FailureContext<'_>) -> Decision {
        warn!("skipping failed part {}: {}", context.part_name, context.message);
        Decision::Skip
    }
}

/// Pacing of the loop. The delays exist to keep progress human-followable
/// and to give the backend breathing room between appends.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub part_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            part_delay: Duration::from_millis(500),
            retry_delay: Duration::from_secs(2),
        }
    }
}

type SuccessHook<'a> = Box<dyn FnMut(&Submission, &ProcessFilesResponse) + Send + 'a>;

/// Runs a session to a terminal state over the given parts.
pub struct ImportDriver<'a, S, D> {
    submitter: S,
    decisions: D,
    config: DriverConfig,
    on_success: Option<SuccessHook<'a>>,
}

impl<'a, S: PartSubmitter, D: DecisionHandler> ImportDriver<'a, S, D> {
    pub fn new(submitter: S, decisions: D, config: DriverConfig) -> Self {
        ImportDriver {
            submitter,
            decisions,
            config,
            on_success: None,
        }
    }

    /// Called after every successful part; the CLI appends a history
    /// notification here.
    pub fn on_success(mut self, hook: SuccessHook<'a>) -> Self {
        self.on_success = Some(hook);
        self
    }

    pub async fn run(
        &mut self,
        parts: &[PartUpload],
        append_mode: bool,
    ) -> Result<ImportSession, ImportError> {
        let names = parts.iter().map(|p| p.name.clone()).collect();
        let mut session = ImportSession::new(names, append_mode)?;
        session.start()?;
        let total = session.total_parts();

        while !session.is_terminal() {
            let state = session.state().clone();
            match state {
                SessionState::Processing { index } => {
                    let submission = session.submit()?;
                    if session.submissions().len() > 1 {
                        tokio::time::sleep(self.config.part_delay).await;
                    }
                    info!(
                        "processing part {}/{}: {}",
                        submission.index + 1,
                        total,
                        submission.part_name
                    );

                    match self.submitter.submit_part(&parts[index], &submission).await {
                        Ok(response) if response.success => {
                            if let Some(hook) = self.on_success.as_mut() {
                                hook(&submission, &response);
                            }
                            session.on_success(response.rows_processed, response.total_rows)?;
                        }
                        Ok(response) => {
                            session.on_failure(response.message)?;
                        }
                        Err(error) => {
                            session.on_failure(error.to_string())?;
                        }
                    }
                }
                SessionState::AwaitingDecision { index, .. } => {
                    let message = session
                        .results()
                        .last()
                        .map(|r| match &r.outcome {
                            super::PartOutcome::Failure { message } => message.clone(),
                            super::PartOutcome::Success { .. } => String::new(),
                        })
                        .unwrap_or_default();
                    let context = FailureContext {
                        part_name: &parts[index].name,
                        index,
                        total,
                        message: &message,
                        can_retry: session.can_retry(),
                        can_complete: session.can_complete_manually(),
                    };
                    let decision = self.decisions.decide(&context).await;

                    match decision {
                        Decision::Retry => match session.decide(Decision::Retry) {
                            Ok(()) => tokio::time::sleep(self.config.retry_delay).await,
                            Err(e) => {
                                warn!("retry refused ({e}); skipping part {}", parts[index].name);
                                session.decide(Decision::Skip)?;
                            }
                        },
                        Decision::CompleteNow => {
                            if let Err(e) = session.decide(Decision::CompleteNow) {
                                warn!(
                                    "manual completion refused ({e}); skipping part {}",
                                    parts[index].name
                                );
                                session.decide(Decision::Skip)?;
                            }
                        }
                        Decision::Skip => session.decide(Decision::Skip)?,
                    }
                }
                SessionState::Idle | SessionState::Completed | SessionState::ManuallyCompleted => {
                    break;
                }
            }
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PartOutcome;
    use std::sync::Mutex;

    /// Scripted backend: one entry per submission, in order.
    struct ScriptedSubmitter {
        script: Mutex<Vec<Result<ProcessFilesResponse, ClientError>>>,
        seen: Mutex<Vec<(usize, bool)>>,
    }

    impl ScriptedSubmitter {
        fn new(script: Vec<Result<ProcessFilesResponse, ClientError>>) -> Self {
            ScriptedSubmitter {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    fn ok(rows: u32, total: u32) -> Result<ProcessFilesResponse, ClientError> {
        Ok(ProcessFilesResponse {
            success: true,
            message: "ok".into(),
            rows_processed: rows,
            total_rows: total,
            duplicates_found: None,
        })
    }

    fn fail(message: &str) -> Result<ProcessFilesResponse, ClientError> {
        Err(ClientError::Server {
            status: 500,
            message: message.to_string(),
        })
    }

    #[async_trait]
    impl PartSubmitter for &ScriptedSubmitter {
        async fn submit_part(
            &self,
            _part: &PartUpload,
            submission: &Submission,
        ) -> Result<ProcessFilesResponse, ClientError> {
            self.seen
                .lock()
                .unwrap()
                .push((submission.index, submission.append));
            self.script.lock().unwrap().remove(0)
        }
    }

    /// Scripted operator: one decision per failure, in order.
    struct ScriptedDecisions(Vec<Decision>);

    #[async_trait]
    impl DecisionHandler for ScriptedDecisions {
        async fn decide(&mut self, _context: &FailureContext<'_>) -> Decision {
            self.0.remove(0)
        }
    }

    fn uploads(n: usize) -> Vec<PartUpload> {
        (1..=n)
            .map(|i| PartUpload {
                name: format!("data_part{i}.txt"),
                path: PathBuf::from(format!("/tmp/data_part{i}.txt")),
            })
            .collect()
    }

    fn fast() -> DriverConfig {
        DriverConfig {
            part_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retry_then_success_reaches_completed() {
        let submitter = ScriptedSubmitter::new(vec![
            ok(10, 10),
            fail("part 2 exploded"),
            fail("part 2 exploded again"),
            ok(10, 20),
            ok(10, 30),
        ]);
        let decisions = ScriptedDecisions(vec![Decision::Retry, Decision::Retry]);

        let mut driver = ImportDriver::new(&submitter, decisions, fast());
        let session = driver.run(&uploads(3), false).await.unwrap();

        assert_eq!(*session.state(), SessionState::Completed);
        assert_eq!(session.submissions(), &[0, 1, 1, 1, 2]);
        let failures = session
            .results()
            .iter()
            .filter(|r| matches!(r.outcome, PartOutcome::Failure { .. }))
            .count();
        assert_eq!(failures, 2);

        // Part 0 replaced, retries of part 1 and part 2 all appended.
        let seen = submitter.seen.lock().unwrap();
        assert_eq!(*seen, vec![(0, false), (1, true), (1, true), (1, true), (2, true)]);
    }

    #[tokio::test]
    async fn skip_never_resubmits_the_failed_part() {
        let submitter = ScriptedSubmitter::new(vec![ok(5, 5), fail("boom"), ok(5, 10)]);
        let decisions = ScriptedDecisions(vec![Decision::Skip]);

        let mut driver = ImportDriver::new(&submitter, decisions, fast());
        let session = driver.run(&uploads(3), false).await.unwrap();

        assert_eq!(session.submissions(), &[0, 1, 2]);
        assert_eq!(session.skipped_parts(), &["data_part2.txt".to_string()]);
        assert_eq!(*session.state(), SessionState::ManuallyCompleted);
    }

    #[tokio::test]
    async fn success_hook_fires_once_per_successful_part() {
        let submitter = ScriptedSubmitter::new(vec![ok(5, 5), fail("boom"), ok(5, 10)]);
        let decisions = ScriptedDecisions(vec![Decision::Skip]);

        let notified = Mutex::new(Vec::new());
        let mut driver = ImportDriver::new(&submitter, decisions, fast()).on_success(Box::new(
            |submission, response| {
                notified
                    .lock()
                    .unwrap()
                    .push((submission.part_name.clone(), response.rows_processed));
            },
        ));
        let session = driver.run(&uploads(3), false).await.unwrap();
        drop(driver);

        assert_eq!(session.processed_parts().len(), 2);
        assert_eq!(
            *notified.lock().unwrap(),
            vec![
                ("data_part1.txt".to_string(), 5),
                ("data_part3.txt".to_string(), 5)
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_retries_fall_back_to_skip() {
        let submitter = ScriptedSubmitter::new(vec![
            ok(1, 1),
            fail("x"),
            fail("x"),
            fail("x"),
            fail("x"),
            ok(1, 2),
        ]);
        // Four retry requests; the fourth is refused (limit is 3) and the
        // driver downgrades it to a skip.
        let decisions = ScriptedDecisions(vec![
            Decision::Retry,
            Decision::Retry,
            Decision::Retry,
            Decision::Retry,
        ]);

        let mut driver = ImportDriver::new(&submitter, decisions, fast());
        let session = driver.run(&uploads(3), false).await.unwrap();

        assert_eq!(session.submissions(), &[0, 1, 1, 1, 1, 2]);
        assert_eq!(session.skipped_parts().len(), 1);
        assert!(session.is_terminal());
    }

    #[tokio::test]
    async fn complete_now_ends_the_session_early() {
        let submitter = ScriptedSubmitter::new(vec![ok(5, 5), fail("boom")]);
        let decisions = ScriptedDecisions(vec![Decision::CompleteNow]);

        let mut driver = ImportDriver::new(&submitter, decisions, fast());
        let session = driver.run(&uploads(4), false).await.unwrap();

        assert_eq!(*session.state(), SessionState::ManuallyCompleted);
        assert_eq!(session.processed_parts().len(), 1);
        assert_eq!(session.submissions(), &[0, 1]);
    }
}
