//! services/learner/src/session/quiz.rs
//!
//! Quiz evaluation for the current artifact, and the fire-and-forget progress
//! write that follows the first correct answer.

use crate::session::{SessionError, SessionEvent};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vocab_core::domain::{CredentialToken, LearningArtifact, ProgressRecord, QuizOutcome};
use vocab_core::ports::ProgressService;

//=========================================================================================
// ProgressRecorder
//=========================================================================================

/// Sends progress records in the background. Failures are logged and dropped;
/// nothing is retried. A refused token is the one exception: it is reported
/// back as `SessionEvent::ProgressRejected` so the session can sign out.
pub struct ProgressRecorder {
    progress: Arc<dyn ProgressService>,
    events: mpsc::UnboundedSender<SessionEvent>,
    epoch: u64,
    pending: Vec<JoinHandle<()>>,
}

impl ProgressRecorder {
    pub fn new(
        progress: Arc<dyn ProgressService>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            progress,
            events,
            epoch: 0,
            pending: Vec::new(),
        }
    }

    /// Tags later rejections with the identity epoch they were written under.
    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    pub fn emit(&mut self, token: CredentialToken, record: ProgressRecord) {
        self.pending.retain(|handle| !handle.is_finished());
        let progress = self.progress.clone();
        let events = self.events.clone();
        let epoch = self.epoch;
        self.pending.push(tokio::spawn(async move {
            match progress.append_progress(&token, &record).await {
                Ok(()) => info!("Recorded progress for {}", record.date),
                Err(e) if e.is_auth_failure() => {
                    warn!("Progress write refused ({}); the token is no longer valid.", e);
                    let _ = events.send(SessionEvent::ProgressRejected { epoch });
                }
                Err(e) => warn!("{}", SessionError::ProgressWriteFailed(e.to_string())),
            }
        }));
    }

    /// Waits for every outstanding write to finish.
    pub async fn flush(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                error!("Progress write task did not complete: {}", e);
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }
}

//=========================================================================================
// QuizRound
//=========================================================================================

/// One artifact and the learner's standing on it.
#[derive(Debug, Clone)]
pub struct QuizRound {
    artifact: LearningArtifact,
    outcome: QuizOutcome,
    attempts: u32,
}

impl QuizRound {
    pub fn new(artifact: LearningArtifact) -> Self {
        Self {
            artifact,
            outcome: QuizOutcome::Unanswered,
            attempts: 0,
        }
    }

    pub fn artifact(&self) -> &LearningArtifact {
        &self.artifact
    }

    pub fn outcome(&self) -> QuizOutcome {
        self.outcome
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Checks `choice` against the answer key by exact match.
    ///
    /// The first correct answer emits one progress record. Once correct, the
    /// round is settled: further calls return `Correct` and emit nothing.
    pub fn evaluate(
        &mut self,
        choice: &str,
        recorder: &mut ProgressRecorder,
        token: &CredentialToken,
    ) -> Result<QuizOutcome, SessionError> {
        if self.outcome == QuizOutcome::Correct {
            debug!("Round for '{}' already answered correctly.", self.artifact.word);
            return Ok(QuizOutcome::Correct);
        }
        if !self.artifact.quiz.has_option(choice) {
            return Err(SessionError::InvalidChoice(choice.to_string()));
        }

        self.attempts += 1;
        if choice == self.artifact.quiz.answer() {
            self.outcome = QuizOutcome::Correct;
            info!(
                "Correct answer for '{}' after {} attempt(s).",
                self.artifact.word, self.attempts
            );
            recorder.emit(
                token.clone(),
                ProgressRecord::for_correct_answer(Local::now().date_naive()),
            );
        } else {
            self.outcome = QuizOutcome::Incorrect;
        }
        Ok(self.outcome)
    }
}
