//! crates/vocab_core/src/domain.rs
//!
//! Defines the pure, core data structures for the learning client.
//! These structs are independent of any transport or serialization format.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Validation failures for domain values built from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("A word must contain at least one non-whitespace character")]
    EmptyWord,
    #[error("A quiz must offer at least one option")]
    NoOptions,
    #[error("Quiz option '{0}' appears more than once")]
    DuplicateOption(String),
    #[error("Quiz answer '{0}' is not one of the options")]
    AnswerNotAnOption(String),
    #[error("Unknown tier '{0}'")]
    UnknownTier(String),
}

//=========================================================================================
// Identity
//=========================================================================================

/// Access class of a user. Gates generation quotas and dashboard access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Free,
    Paid,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "paid" => Ok(Tier::Paid),
            other => Err(DomainError::UnknownTier(other.to_string())),
        }
    }
}

/// An opaque bearer token issued by the backend on login.
///
/// The `Debug` impl is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialToken(String);

impl CredentialToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialToken(***)")
    }
}

/// A snapshot of the authenticated user, fetched once per session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub tier: Tier,
}

/// Used only for login/signup. Contains the plain password.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

//=========================================================================================
// Learning Content
//=========================================================================================

/// A target vocabulary word: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Word(String);

impl Word {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyWord);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A multiple-choice question whose answer is guaranteed to be one of its
/// unique, ordered options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    question: String,
    options: Vec<String>,
    answer: String,
}

impl Quiz {
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        answer: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let answer = answer.into();
        if options.is_empty() {
            return Err(DomainError::NoOptions);
        }
        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if !seen.insert(option.as_str()) {
                return Err(DomainError::DuplicateOption(option.clone()));
            }
        }
        if !seen.contains(answer.as_str()) {
            return Err(DomainError::AnswerNotAnOption(answer));
        }
        Ok(Self {
            question: question.into(),
            options,
            answer,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn has_option(&self, choice: &str) -> bool {
        self.options.iter().any(|o| o == choice)
    }
}

/// The combined sentence + quiz + image for one learning round.
/// Only ever built once all three pieces are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningArtifact {
    pub word: Word,
    pub sentence: String,
    pub quiz: Quiz,
    pub image_url: String,
}

/// The learner's standing on the current artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizOutcome {
    #[default]
    Unanswered,
    Correct,
    Incorrect,
}

//=========================================================================================
// Progress
//=========================================================================================

/// Score reported for a correctly answered quiz.
pub const FULL_QUIZ_SCORE: u32 = 100;

/// A single learning-progress entry written to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub date: NaiveDate,
    pub words_learned: u32,
    pub quiz_score: u32,
}

impl ProgressRecord {
    /// The record emitted when a learner answers one quiz correctly.
    pub fn for_correct_answer(date: NaiveDate) -> Self {
        Self {
            date,
            words_learned: 1,
            quiz_score: FULL_QUIZ_SCORE,
        }
    }
}

/// Aggregated progress shown on the parent dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub words_learned: u32,
    pub average_score: f64,
    pub records: Vec<ProgressRecord>,
}

impl ProgressSummary {
    pub fn from_records(records: Vec<ProgressRecord>) -> Self {
        let words_learned = records.iter().map(|r| r.words_learned).sum();
        let average_score = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| f64::from(r.quiz_score)).sum::<f64>() / records.len() as f64
        };
        Self {
            words_learned,
            average_score,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn word_is_trimmed() {
        assert_eq!(Word::parse("  apple \n").unwrap().as_str(), "apple");
    }

    #[test]
    fn blank_word_is_rejected() {
        assert_eq!(Word::parse("   "), Err(DomainError::EmptyWord));
        assert_eq!(Word::parse(""), Err(DomainError::EmptyWord));
    }

    #[test]
    fn quiz_accepts_answer_among_unique_options() {
        let quiz = Quiz::new(
            "Which one is an apple?",
            options(&["apple", "car", "book"]),
            "apple",
        )
        .unwrap();
        assert_eq!(quiz.options(), &options(&["apple", "car", "book"])[..]);
        assert!(quiz.has_option("car"));
        assert!(!quiz.has_option("Car"));
    }

    #[test]
    fn quiz_rejects_duplicates_and_missing_answer() {
        assert_eq!(
            Quiz::new("q", options(&["dog", "dog", "cat"]), "dog"),
            Err(DomainError::DuplicateOption("dog".to_string()))
        );
        assert_eq!(
            Quiz::new("q", options(&["dog", "cat"]), "fish"),
            Err(DomainError::AnswerNotAnOption("fish".to_string()))
        );
        assert_eq!(Quiz::new("q", Vec::new(), "fish"), Err(DomainError::NoOptions));
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("PAID".parse::<Tier>().unwrap(), Tier::Paid);
        assert_eq!(" free".parse::<Tier>().unwrap(), Tier::Free);
        assert!("gold".parse::<Tier>().is_err());
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = CredentialToken::new("secret-value");
        assert!(!format!("{:?}", token).contains("secret-value"));
        assert_eq!(token.expose(), "secret-value");
    }

    #[test]
    fn summary_averages_scores() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let summary = ProgressSummary::from_records(vec![
            ProgressRecord::for_correct_answer(day),
            ProgressRecord {
                date: day,
                words_learned: 2,
                quiz_score: 50,
            },
        ]);
        assert_eq!(summary.words_learned, 3);
        assert!((summary.average_score - 75.0).abs() < f64::EPSILON);
        assert_eq!(ProgressSummary::from_records(Vec::new()).average_score, 0.0);
    }
}
