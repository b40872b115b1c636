pub mod domain;
pub mod ports;

pub use domain::{
    CredentialToken, Credentials, DomainError, LearningArtifact, ProgressRecord, ProgressSummary,
    Quiz, QuizOutcome, Tier, UserProfile, Word, FULL_QUIZ_SCORE,
};
pub use ports::{
    ContentGenerationService, IdentityService, PortError, PortResult, ProgressService,
};
