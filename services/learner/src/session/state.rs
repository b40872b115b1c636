//! services/learner/src/session/state.rs
//!
//! Defines the shared service handles and the per-session phase.

use crate::config::Config;
use crate::session::lifecycle::RequestId;
use crate::session::SessionError;
use std::sync::Arc;
use vocab_core::domain::{QuizOutcome, Word};
use vocab_core::ports::{ContentGenerationService, IdentityService, ProgressService};

//=========================================================================================
// AppServices (Shared Across All Sessions)
//=========================================================================================

/// The backend ports and configuration, created once at startup and handed to
/// every session.
#[derive(Clone)]
pub struct AppServices {
    pub identity: Arc<dyn IdentityService>,
    pub generation: Arc<dyn ContentGenerationService>,
    pub progress: Arc<dyn ProgressService>,
    pub config: Arc<Config>,
}

//=========================================================================================
// SessionPhase (Specific to One Session)
//=========================================================================================

/// Where an `Errored` phase came from, which decides what `retry` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorOrigin {
    Loading,
    Generation { word: Word },
}

/// The current phase of the learner's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Loading,
    Ready,
    Generating { word: Word, request: RequestId },
    Answering,
    Answered(QuizOutcome),
    Errored {
        error: SessionError,
        origin: ErrorOrigin,
    },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Unauthenticated => "signed out",
            SessionPhase::Loading => "loading",
            SessionPhase::Ready => "ready",
            SessionPhase::Generating { .. } => "generating",
            SessionPhase::Answering => "answering",
            SessionPhase::Answered(_) => "answered",
            SessionPhase::Errored { .. } => "errored",
        }
    }
}

/// Free-tier usage as far as this session can see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHint {
    pub used_this_session: u32,
    pub daily_limit: u32,
}

impl QuotaHint {
    pub fn remaining(&self) -> u32 {
        self.daily_limit.saturating_sub(self.used_this_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_never_underflows() {
        let hint = QuotaHint {
            used_this_session: 7,
            daily_limit: 5,
        };
        assert_eq!(hint.remaining(), 0);
    }
}
