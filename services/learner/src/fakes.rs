//! services/learner/src/fakes.rs
//!
//! In-memory implementations of the core ports for tests. Each fake records
//! its calls and can be told to fail or to hold a response until released.

use crate::config::Config;
use crate::session::AppServices;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use vocab_core::domain::{
    CredentialToken, Credentials, LearningArtifact, ProgressRecord, ProgressSummary, Quiz, Tier,
    UserProfile, Word,
};
use vocab_core::ports::{
    ContentGenerationService, IdentityService, PortError, PortResult, ProgressService,
};

/// The artifact from the "apple" walkthrough.
pub fn apple_artifact() -> LearningArtifact {
    LearningArtifact {
        word: Word::parse("apple").unwrap(),
        sentence: "The apple is red.".to_string(),
        quiz: Quiz::new(
            "Which one is an apple?",
            vec!["apple".to_string(), "car".to_string(), "book".to_string()],
            "apple",
        )
        .unwrap(),
        image_url: "/img/apple.png".to_string(),
    }
}

//=========================================================================================
// FakeIdentity
//=========================================================================================

struct Account {
    password: String,
    profile: UserProfile,
    token: CredentialToken,
}

#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    next_id: AtomicI64,
    profile_calls: AtomicUsize,
    profile_failure: Mutex<Option<PortError>>,
    gate: Mutex<Option<Arc<Notify>>>,
    login_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeIdentity {
    /// Creates an account and returns the token a login would issue.
    pub fn register(&self, email: &str, password: &str, tier: Tier) -> CredentialToken {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CredentialToken::new(format!("token-{}", id));
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                profile: UserProfile {
                    id,
                    email: email.to_string(),
                    tier,
                },
                token: token.clone(),
            },
        );
        token
    }

    pub fn revoke_all(&self) {
        for account in self.accounts.lock().unwrap().values_mut() {
            account.token = CredentialToken::new(format!("revoked-{}", account.profile.id));
        }
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_profile(&self, err: PortError) {
        *self.profile_failure.lock().unwrap() = Some(err);
    }

    /// Makes profile fetches wait until the returned handle is notified.
    pub fn hold_profiles(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Makes logins wait until the returned handle is notified.
    pub fn hold_logins(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.login_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn login(&self, credentials: &Credentials) -> PortResult<CredentialToken> {
        let gate = self.login_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => Ok(account.token.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn signup(&self, credentials: &Credentials, tier: Tier) -> PortResult<UserProfile> {
        if self.accounts.lock().unwrap().contains_key(&credentials.email) {
            return Err(PortError::Rejected("Email already registered".to_string()));
        }
        self.register(&credentials.email, &credentials.password, tier);
        let accounts = self.accounts.lock().unwrap();
        accounts
            .get(&credentials.email)
            .map(|a| a.profile.clone())
            .ok_or_else(|| PortError::Unexpected("account vanished".to_string()))
    }

    async fn fetch_profile(&self, token: &CredentialToken) -> PortResult<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.profile_failure.lock().unwrap().take() {
            return Err(err);
        }
        let accounts = self.accounts.lock().unwrap();
        accounts
            .values()
            .find(|a| &a.token == token)
            .map(|a| a.profile.clone())
            .ok_or(PortError::Unauthorized)
    }
}

//=========================================================================================
// FakeGeneration
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Sentence,
    Quiz,
    Image,
}

#[derive(Clone)]
struct Script {
    sentence: String,
    question: String,
    options: Vec<String>,
    answer: String,
    image_url: String,
}

struct Failure {
    error: PortError,
    once: bool,
}

#[derive(Default)]
pub struct FakeGeneration {
    scripts: Mutex<HashMap<String, Script>>,
    failures: Mutex<HashMap<(String, Stage), Failure>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGeneration {
    pub fn script(
        &self,
        word: &str,
        sentence: &str,
        question: &str,
        options: &[&str],
        answer: &str,
        image_url: &str,
    ) {
        self.scripts.lock().unwrap().insert(
            word.to_string(),
            Script {
                sentence: sentence.to_string(),
                question: question.to_string(),
                options: options.iter().map(|o| o.to_string()).collect(),
                answer: answer.to_string(),
                image_url: image_url.to_string(),
            },
        );
    }

    pub fn fail(&self, word: &str, stage: Stage, error: PortError) {
        self.failures
            .lock()
            .unwrap()
            .insert((word.to_string(), stage), Failure { error, once: false });
    }

    pub fn fail_once(&self, word: &str, stage: Stage, error: PortError) {
        self.failures
            .lock()
            .unwrap()
            .insert((word.to_string(), stage), Failure { error, once: true });
    }

    /// Holds the sentence call for `word` until the returned handle is notified.
    pub fn hold(&self, word: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(word.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failure(&self, word: &Word, stage: Stage) -> PortResult<()> {
        let mut failures = self.failures.lock().unwrap();
        let key = (word.as_str().to_string(), stage);
        match failures.get(&key) {
            Some(failure) if failure.once => {
                let err = failure.error.clone();
                failures.remove(&key);
                Err(err)
            }
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    fn script_for(&self, word: &Word) -> Script {
        if let Some(script) = self.scripts.lock().unwrap().get(word.as_str()) {
            return script.clone();
        }
        let mut options = vec![word.as_str().to_string()];
        options.extend(
            ["apple", "house", "car", "dog", "school"]
                .iter()
                .filter(|d| **d != word.as_str())
                .take(2)
                .map(|d| d.to_string()),
        );
        Script {
            sentence: format!("I can see a {}.", word),
            question: "I can see a ______.".to_string(),
            options,
            answer: word.as_str().to_string(),
            image_url: format!("/images/cartoon_illustration_of_{}.png", word),
        }
    }
}

#[async_trait]
impl ContentGenerationService for FakeGeneration {
    async fn generate_sentence(&self, _token: &CredentialToken, word: &Word) -> PortResult<String> {
        self.record(format!("sentence:{}", word));
        let gate = self.gates.lock().unwrap().get(word.as_str()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_failure(word, Stage::Sentence)?;
        Ok(self.script_for(word).sentence)
    }

    async fn generate_quiz(
        &self,
        _token: &CredentialToken,
        word: &Word,
        sentence: &str,
    ) -> PortResult<Quiz> {
        self.record(format!("quiz:{}:{}", word, sentence));
        self.check_failure(word, Stage::Quiz)?;
        let script = self.script_for(word);
        Quiz::new(script.question, script.options, script.answer)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn generate_image(&self, _token: &CredentialToken, word: &Word) -> PortResult<String> {
        self.record(format!("image:{}", word));
        self.check_failure(word, Stage::Image)?;
        Ok(self.script_for(word).image_url)
    }
}

//=========================================================================================
// FakeProgress
//=========================================================================================

#[derive(Default)]
pub struct FakeProgress {
    records: Mutex<Vec<ProgressRecord>>,
    write_failure: Mutex<Option<PortError>>,
    list_failure: Mutex<Option<PortError>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
    write_attempts: AtomicUsize,
}

impl FakeProgress {
    pub fn records(&self) -> Vec<ProgressRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, err: PortError) {
        *self.write_failure.lock().unwrap() = Some(err);
    }

    pub fn fail_listing(&self, err: PortError) {
        *self.list_failure.lock().unwrap() = Some(err);
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Makes listings wait until the returned handle is notified.
    pub fn hold_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl ProgressService for FakeProgress {
    async fn append_progress(
        &self,
        _token: &CredentialToken,
        record: &ProgressRecord,
    ) -> PortResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.write_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_progress(
        &self,
        _token: &CredentialToken,
        _user_id: i64,
    ) -> PortResult<ProgressSummary> {
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.list_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(ProgressSummary::from_records(self.records()))
    }
}

//=========================================================================================
// FakeBackend
//=========================================================================================

/// All three fakes wired into one `AppServices`.
#[derive(Default)]
pub struct FakeBackend {
    pub identity: Arc<FakeIdentity>,
    pub generation: Arc<FakeGeneration>,
    pub progress: Arc<FakeProgress>,
}

impl FakeBackend {
    pub fn services(&self) -> AppServices {
        self.services_with(|_| None)
    }

    pub fn services_with<F>(&self, lookup: F) -> AppServices
    where
        F: Fn(&str) -> Option<String>,
    {
        AppServices {
            identity: self.identity.clone(),
            generation: self.generation.clone(),
            progress: self.progress.clone(),
            config: Arc::new(Config::from_lookup(lookup).unwrap()),
        }
    }
}
