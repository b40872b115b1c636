//! services/learner/src/session/lifecycle.rs
//!
//! The session lifecycle controller. It owns the session's identity, the
//! current quiz round and every in-flight request, and applies results as
//! they arrive. Network work runs on spawned tasks that report back over a
//! channel, so user actions such as logout never wait on the network.

use crate::session::{
    identity::{IdentityResolver, Session},
    pipeline::ContentPipeline,
    quiz::{ProgressRecorder, QuizRound},
    state::{AppServices, ErrorOrigin, QuotaHint, SessionPhase},
    SessionError,
};
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vocab_core::domain::{
    CredentialToken, Credentials, LearningArtifact, ProgressSummary, QuizOutcome, Tier,
    UserProfile, Word,
};

/// Tags one pipeline invocation. Strictly increasing within a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A result reported back by a spawned network task.
#[derive(Debug)]
pub enum SessionEvent {
    ProfileResolved {
        epoch: u64,
        result: Result<UserProfile, SessionError>,
    },
    ArtifactReady {
        request: RequestId,
        result: Result<LearningArtifact, SessionError>,
    },
    SignedIn {
        ticket: u64,
        result: Result<CredentialToken, SessionError>,
    },
    ProgressListed {
        ticket: u64,
        result: Result<ProgressSummary, SessionError>,
    },
    /// A background progress write was refused with an authorization failure.
    ProgressRejected { epoch: u64 },
}

struct InFlight {
    request: RequestId,
    word: Word,
    cancel: CancellationToken,
}

/// A pending sign-in or progress listing.
struct Ticket {
    id: u64,
    cancel: CancellationToken,
}

pub struct SessionController {
    session_id: Uuid,
    services: AppServices,
    resolver: IdentityResolver,
    pipeline: ContentPipeline,
    recorder: ProgressRecorder,
    session: Session,
    phase: SessionPhase,
    round: Option<QuizRound>,
    /// Bumped on every login/logout; results from an older epoch are dropped.
    epoch: u64,
    epoch_cancel: CancellationToken,
    loading: Option<u64>,
    generating: Option<InFlight>,
    signing_in: Option<Ticket>,
    listing: Option<Ticket>,
    last_request: u64,
    last_ticket: u64,
    quota_exhausted: Option<String>,
    words_this_session: u32,
    failure: Option<SessionError>,
    summary: Option<ProgressSummary>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

//=========================================================================================
// Construction and Accessors
//=========================================================================================

impl SessionController {
    /// Creates a controller, resuming from the configured token if there is one.
    pub fn new(services: AppServices) -> Self {
        let session = match &services.config.initial_token {
            Some(raw) => Session::with_token(CredentialToken::new(raw.clone())),
            None => Session::default(),
        };
        Self::with_session(services, session)
    }

    /// Creates a controller that will resolve the given token on `start`.
    pub fn resume(services: AppServices, token: CredentialToken) -> Self {
        Self::with_session(services, Session::with_token(token))
    }

    fn with_session(services: AppServices, session: Session) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let phase = if session.has_token() {
            SessionPhase::Loading
        } else {
            SessionPhase::Unauthenticated
        };
        let session_id = Uuid::new_v4();
        debug!("Created session {}", session_id);
        Self {
            session_id,
            resolver: IdentityResolver::new(services.identity.clone()),
            pipeline: ContentPipeline::new(services.generation.clone()),
            recorder: ProgressRecorder::new(services.progress.clone(), events_tx.clone()),
            services,
            session,
            phase,
            round: None,
            epoch: 0,
            epoch_cancel: CancellationToken::new(),
            loading: None,
            generating: None,
            signing_in: None,
            listing: None,
            last_request: 0,
            last_ticket: 0,
            quota_exhausted: None,
            words_this_session: 0,
            failure: None,
            summary: None,
            events_tx,
            events_rx,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.session.profile()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// The artifact being quizzed, if any.
    pub fn artifact(&self) -> Option<&LearningArtifact> {
        self.round.as_ref().map(QuizRound::artifact)
    }

    pub fn outcome(&self) -> QuizOutcome {
        self.round
            .as_ref()
            .map(QuizRound::outcome)
            .unwrap_or_default()
    }

    /// True while a profile, sign-in, listing or generation request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.loading.is_some()
            || self.generating.is_some()
            || self.signing_in.is_some()
            || self.listing.is_some()
    }

    /// Usage against the configured free-tier cap. `None` for paid accounts.
    pub fn quota_hint(&self) -> Option<QuotaHint> {
        match self.session.profile() {
            Some(profile) if profile.tier == Tier::Free => Some(QuotaHint {
                used_this_session: self.words_this_session,
                daily_limit: self.services.config.free_tier_daily_words,
            }),
            _ => None,
        }
    }

    /// The failure of the last sign-in or progress request, once.
    pub fn take_failure(&mut self) -> Option<SessionError> {
        self.failure.take()
    }

    /// The last progress listing that arrived, once.
    pub fn take_progress_summary(&mut self) -> Option<ProgressSummary> {
        self.summary.take()
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.last_ticket += 1;
        Ticket {
            id: self.last_ticket,
            cancel: self.epoch_cancel.child_token(),
        }
    }
}

fn claim(slot: &mut Option<Ticket>, id: u64) -> bool {
    if slot.as_ref().map(|t| t.id) == Some(id) {
        *slot = None;
        true
    } else {
        false
    }
}

//=========================================================================================
// Identity Transitions
//=========================================================================================

impl SessionController {
    /// Starts resolving the held token in the background.
    ///
    /// Returns `false`, and moves to `Unauthenticated`, when there is no token.
    pub fn begin_resolve(&mut self) -> bool {
        let token = match self.session.bearer() {
            Ok(token) => token.clone(),
            Err(_) => {
                self.phase = SessionPhase::Unauthenticated;
                return false;
            }
        };
        self.phase = SessionPhase::Loading;
        let epoch = self.epoch;
        self.loading = Some(epoch);

        let resolver = self.resolver.clone();
        let tx = self.events_tx.clone();
        let cancel = self.epoch_cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!("Profile resolution abandoned."),
                result = resolver.resolve(Some(&token)) => {
                    let _ = tx.send(SessionEvent::ProfileResolved { epoch, result });
                }
            }
        });
        true
    }

    /// Resolves the held token and waits for the answer.
    pub async fn start(&mut self) -> Result<UserProfile, SessionError> {
        if !self.begin_resolve() {
            info!("Session {} has no stored token.", self.session_id);
            return Err(SessionError::Unauthenticated);
        }
        self.settle().await;
        match &self.phase {
            SessionPhase::Ready => self
                .session
                .profile()
                .cloned()
                .ok_or(SessionError::Unauthenticated),
            SessionPhase::Errored { error, .. } => Err(error.clone()),
            SessionPhase::Unauthenticated => Err(SessionError::Unauthenticated),
            other => Err(SessionError::InvalidState {
                action: "start",
                phase: other.name(),
            }),
        }
    }

    /// Exchanges credentials for a token in the background. On success any
    /// previous identity and its pending work are dropped and the new
    /// profile is loaded.
    pub fn begin_login(&mut self, email: &str, password: &str) {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        info!("Session {} signing in as {}", self.session_id, credentials.email);
        let resolver = self.resolver.clone();
        self.spawn_sign_in(async move { resolver.login(&credentials).await });
    }

    /// Creates the account, then logs in with the same credentials.
    pub fn begin_signup(&mut self, email: &str, password: &str, tier: Tier) {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let resolver = self.resolver.clone();
        self.spawn_sign_in(async move {
            let profile = resolver.signup(&credentials, tier).await?;
            info!("Created {} account {}", profile.tier, profile.id);
            resolver.login(&credentials).await
        });
    }

    fn spawn_sign_in<F>(&mut self, attempt: F)
    where
        F: Future<Output = Result<CredentialToken, SessionError>> + Send + 'static,
    {
        self.failure = None;
        let ticket = self.issue_ticket();
        let id = ticket.id;
        let cancel = ticket.cancel.clone();
        if let Some(previous) = self.signing_in.replace(ticket) {
            previous.cancel.cancel();
        }
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!("Sign-in attempt {} abandoned.", id),
                result = attempt => {
                    let _ = tx.send(SessionEvent::SignedIn { ticket: id, result });
                }
            }
        });
    }

    /// Signs in and waits until the profile has loaded or the attempt failed.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), SessionError> {
        self.begin_login(email, password);
        self.settle().await;
        self.take_failure().map_or(Ok(()), Err)
    }

    /// Signs up, then waits like `login`.
    pub async fn signup(
        &mut self,
        email: &str,
        password: &str,
        tier: Tier,
    ) -> Result<(), SessionError> {
        self.begin_signup(email, password, tier);
        self.settle().await;
        self.take_failure().map_or(Ok(()), Err)
    }

    /// Clears the token and profile immediately. Anything still in flight is
    /// cancelled and its result will be ignored.
    pub fn logout(&mut self) {
        self.sign_out();
        info!("Session {} logged out.", self.session_id);
    }

    fn sign_out(&mut self) {
        self.reset();
        self.session.clear();
        self.phase = SessionPhase::Unauthenticated;
    }

    fn reset(&mut self) {
        self.epoch_cancel.cancel();
        self.epoch_cancel = CancellationToken::new();
        self.epoch += 1;
        self.recorder.set_epoch(self.epoch);
        self.loading = None;
        self.generating = None;
        self.signing_in = None;
        self.listing = None;
        self.round = None;
        self.summary = None;
        self.quota_exhausted = None;
        self.words_this_session = 0;
    }

    fn ensure_signed_in(&self, action: &'static str) -> Result<(), SessionError> {
        if !self.session.has_token() {
            return Err(SessionError::Unauthenticated);
        }
        if self.session.profile().is_none() {
            return Err(SessionError::InvalidState {
                action,
                phase: self.phase.name(),
            });
        }
        Ok(())
    }
}

//=========================================================================================
// Learning Transitions
//=========================================================================================

impl SessionController {
    /// Requests a new artifact for `raw`. Also serves as "try another word":
    /// the current artifact and outcome are discarded, and any generation
    /// still running for an earlier word is cancelled.
    pub fn submit_word(&mut self, raw: &str) -> Result<RequestId, SessionError> {
        self.ensure_signed_in("learn")?;
        let word = Word::parse(raw)?;
        if let Some(detail) = &self.quota_exhausted {
            return Err(SessionError::QuotaExceeded(detail.clone()));
        }
        let token = self.session.bearer()?.clone();

        if let Some(previous) = self.generating.take() {
            debug!(
                "Request {} for '{}' superseded by '{}'",
                previous.request, previous.word, word
            );
            previous.cancel.cancel();
        }
        self.round = None;

        self.last_request += 1;
        let request = RequestId(self.last_request);
        let cancel = self.epoch_cancel.child_token();
        let pipeline = self.pipeline.clone();
        let tx = self.events_tx.clone();
        let task_word = word.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = task_cancel.cancelled() => debug!("Generation {} cancelled.", request),
                result = pipeline.generate(&token, &task_word) => {
                    let _ = tx.send(SessionEvent::ArtifactReady { request, result });
                }
            }
        });

        info!("Session {} requested '{}' as {}", self.session_id, word, request);
        self.generating = Some(InFlight {
            request,
            word: word.clone(),
            cancel,
        });
        self.phase = SessionPhase::Generating { word, request };
        Ok(request)
    }

    /// Evaluates the learner's choice for the current artifact.
    pub fn answer(&mut self, choice: &str) -> Result<QuizOutcome, SessionError> {
        if !matches!(
            self.phase,
            SessionPhase::Answering | SessionPhase::Answered(_)
        ) {
            return Err(SessionError::InvalidState {
                action: "answer",
                phase: self.phase.name(),
            });
        }
        let token = self.session.bearer()?.clone();
        let round = self.round.as_mut().ok_or(SessionError::InvalidState {
            action: "answer",
            phase: "without a quiz",
        })?;
        let outcome = round.evaluate(choice, &mut self.recorder, &token)?;
        self.phase = SessionPhase::Answered(outcome);
        Ok(outcome)
    }

    /// Re-issues whatever failed: the profile read after a loading error, or
    /// the same word after a generation error. Quota errors stay failed.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        match self.phase.clone() {
            SessionPhase::Errored { error, origin } => {
                if !error.is_retryable() {
                    return Err(error);
                }
                match origin {
                    ErrorOrigin::Loading => {
                        if self.begin_resolve() {
                            Ok(())
                        } else {
                            Err(SessionError::Unauthenticated)
                        }
                    }
                    ErrorOrigin::Generation { word } => {
                        self.submit_word(word.as_str()).map(|_| ())
                    }
                }
            }
            SessionPhase::Unauthenticated => Err(SessionError::Unauthenticated),
            other => Err(SessionError::InvalidState {
                action: "retry",
                phase: other.name(),
            }),
        }
    }

    /// Starts loading the learner's recorded progress for the dashboard.
    pub fn request_progress(&mut self) -> Result<(), SessionError> {
        self.ensure_signed_in("view progress")?;
        let token = self.session.bearer()?.clone();
        let user_id = self
            .session
            .profile()
            .map(|p| p.id)
            .ok_or(SessionError::Unauthenticated)?;

        self.failure = None;
        let ticket = self.issue_ticket();
        let id = ticket.id;
        let cancel = ticket.cancel.clone();
        if let Some(previous) = self.listing.replace(ticket) {
            previous.cancel.cancel();
        }
        let progress = self.services.progress.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!("Progress listing {} abandoned.", id),
                result = progress.list_progress(&token, user_id) => {
                    let result = result.map_err(|e| {
                        if e.is_auth_failure() {
                            SessionError::Unauthenticated
                        } else {
                            SessionError::ProgressUnavailable(e.to_string())
                        }
                    });
                    let _ = tx.send(SessionEvent::ProgressListed { ticket: id, result });
                }
            }
        });
        Ok(())
    }

    /// Loads the learner's recorded progress and waits for it.
    pub async fn progress_summary(&mut self) -> Result<ProgressSummary, SessionError> {
        self.request_progress()?;
        self.settle().await;
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.summary
            .take()
            .ok_or_else(|| SessionError::ProgressUnavailable("listing was abandoned".to_string()))
    }

    /// Waits for outstanding progress writes and applies anything they reported.
    pub async fn flush_progress(&mut self) {
        self.recorder.flush().await;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }
}

//=========================================================================================
// Event Handling
//=========================================================================================

impl SessionController {
    /// Waits for the next result from a spawned task.
    ///
    /// Cancel safe, so it can sit in a `select!` next to user input.
    pub async fn recv_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Applies a result if it belongs to the current request. Returns whether
    /// the session changed; stale results are dropped.
    pub fn apply(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::ProfileResolved { epoch, result } => {
                if self.loading != Some(epoch) {
                    debug!("Discarding profile from stale epoch {}", epoch);
                    return false;
                }
                self.loading = None;
                match result {
                    Ok(profile) => {
                        self.session.set_profile(profile);
                        self.phase = SessionPhase::Ready;
                    }
                    Err(SessionError::Unauthenticated) => {
                        info!("Token rejected; session {} signed out.", self.session_id);
                        self.sign_out();
                    }
                    Err(error) => {
                        self.phase = SessionPhase::Errored {
                            error,
                            origin: ErrorOrigin::Loading,
                        };
                    }
                }
                true
            }
            SessionEvent::ArtifactReady { request, result } => {
                let in_flight = match self.generating.take() {
                    Some(in_flight) if in_flight.request == request => in_flight,
                    other => {
                        self.generating = other;
                        debug!("Discarding result of superseded request {}", request);
                        return false;
                    }
                };
                match result {
                    Ok(artifact) => {
                        self.words_this_session += 1;
                        self.round = Some(QuizRound::new(artifact));
                        self.phase = SessionPhase::Answering;
                    }
                    Err(SessionError::Unauthenticated) => {
                        info!("Token rejected during generation; session {} signed out.", self.session_id);
                        self.sign_out();
                    }
                    Err(error) => {
                        if let SessionError::QuotaExceeded(detail) = &error {
                            warn!("Quota reached for session {}: {}", self.session_id, detail);
                            self.quota_exhausted = Some(detail.clone());
                        }
                        self.phase = SessionPhase::Errored {
                            error,
                            origin: ErrorOrigin::Generation {
                                word: in_flight.word,
                            },
                        };
                    }
                }
                true
            }
            SessionEvent::SignedIn { ticket, result } => {
                if !claim(&mut self.signing_in, ticket) {
                    debug!("Discarding superseded sign-in attempt {}", ticket);
                    return false;
                }
                match result {
                    Ok(token) => {
                        self.reset();
                        self.session.install(token);
                        info!("Session {} signed in.", self.session_id);
                        self.begin_resolve();
                    }
                    Err(error) => {
                        info!("Sign-in for session {} failed: {}", self.session_id, error);
                        self.failure = Some(error);
                    }
                }
                true
            }
            SessionEvent::ProgressListed { ticket, result } => {
                if !claim(&mut self.listing, ticket) {
                    debug!("Discarding superseded progress listing {}", ticket);
                    return false;
                }
                match result {
                    Ok(summary) => self.summary = Some(summary),
                    Err(SessionError::Unauthenticated) => {
                        warn!("Progress listing refused; signing out session {}", self.session_id);
                        self.sign_out();
                        self.failure = Some(SessionError::Unauthenticated);
                    }
                    Err(error) => self.failure = Some(error),
                }
                true
            }
            SessionEvent::ProgressRejected { epoch } => {
                if epoch != self.epoch || !self.session.has_token() {
                    debug!("Discarding progress rejection from stale epoch {}", epoch);
                    return false;
                }
                warn!("Progress write refused; signing out session {}", self.session_id);
                self.sign_out();
                true
            }
        }
    }

    /// Applies results until nothing is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            match self.events_rx.recv().await {
                Some(event) => {
                    self.apply(event);
                }
                None => break,
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.epoch_cancel.cancel();
    }
}
