//! services/learner/src/session/pipeline.rs
//!
//! The content request pipeline: turns one word into a complete learning
//! artifact by coordinating the sentence, quiz and image generation calls.

use crate::session::SessionError;
use futures::future::try_join;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use vocab_core::domain::{CredentialToken, LearningArtifact, Word};
use vocab_core::ports::{ContentGenerationService, PortError};

#[derive(Clone)]
pub struct ContentPipeline {
    generation: Arc<dyn ContentGenerationService>,
}

impl ContentPipeline {
    pub fn new(generation: Arc<dyn ContentGenerationService>) -> Self {
        Self { generation }
    }

    /// Generates the sentence, then the quiz built from that sentence, while the
    /// illustration is requested concurrently. Returns only once all three have
    /// succeeded; the first failure drops the remaining calls.
    pub async fn generate(
        &self,
        token: &CredentialToken,
        word: &Word,
    ) -> Result<LearningArtifact, SessionError> {
        let start = Instant::now();
        info!("Generating learning content for '{}'", word);

        let sentence_then_quiz = async {
            let sentence = self.generation.generate_sentence(token, word).await?;
            if sentence.trim().is_empty() {
                return Err(PortError::Unexpected("Backend returned an empty sentence".to_string()));
            }
            let quiz = self.generation.generate_quiz(token, word, &sentence).await?;
            Ok::<_, PortError>((sentence, quiz))
        };
        let image = self.generation.generate_image(token, word);

        let ((sentence, quiz), image_url) =
            try_join(sentence_then_quiz, image).await.map_err(|e| {
                warn!("Generation for '{}' failed: {}", word, e);
                classify_generation_error(e)
            })?;

        if image_url.trim().is_empty() {
            return Err(SessionError::GenerationFailed(
                "Backend returned an empty image URL".to_string(),
            ));
        }

        info!("⏱️ Generation for '{}' took: {:?}", word, start.elapsed());
        Ok(LearningArtifact {
            word: word.clone(),
            sentence,
            quiz,
            image_url,
        })
    }
}

/// 401 means the token is gone, 403 on a generation call is the tier quota.
pub fn classify_generation_error(err: PortError) -> SessionError {
    match err {
        PortError::Unauthorized => SessionError::Unauthenticated,
        PortError::Forbidden(detail) => SessionError::QuotaExceeded(detail),
        other => SessionError::GenerationFailed(other.to_string()),
    }
}
