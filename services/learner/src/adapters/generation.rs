//! services/learner/src/adapters/generation.rs
//!
//! This module contains the adapter for the backend's content generation
//! endpoints (sentence, quiz and illustration).
//! It implements the `ContentGenerationService` port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use vocab_core::domain::{CredentialToken, Quiz, Word};
use vocab_core::ports::{ContentGenerationService, PortError, PortResult};

/// An adapter that implements the `ContentGenerationService` port over HTTP.
#[derive(Clone)]
pub struct HttpGenerationAdapter {
    client: BackendClient,
}

impl HttpGenerationAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    // FastAPI reads bare `str` parameters from the query string, newer
    // handlers read the JSON body. Both carry the same fields.
    fn sentence_request(&self, token: &CredentialToken, word: &Word) -> RequestBuilder {
        let payload = WordPayload {
            word: word.as_str(),
        };
        BackendClient::authorized(self.client.post("/generate_sentence"), token)
            .query(&payload)
            .json(&payload)
    }

    fn quiz_request(&self, token: &CredentialToken, word: &Word, sentence: &str) -> RequestBuilder {
        let payload = QuizPayload {
            word: word.as_str(),
            sentence,
        };
        BackendClient::authorized(self.client.post("/generate_quiz"), token)
            .query(&payload)
            .json(&payload)
    }

    fn image_request(&self, token: &CredentialToken, word: &Word) -> RequestBuilder {
        let payload = WordPayload {
            word: word.as_str(),
        };
        BackendClient::authorized(self.client.post("/generate_image"), token)
            .query(&payload)
            .json(&payload)
    }
}

#[derive(Serialize)]
struct WordPayload<'a> {
    word: &'a str,
}

#[derive(Serialize)]
struct QuizPayload<'a> {
    word: &'a str,
    sentence: &'a str,
}

#[derive(Deserialize)]
struct SentenceRecord {
    sentence: String,
}

#[derive(Deserialize)]
struct QuizRecord {
    question: String,
    options: Vec<String>,
    answer: String,
}
impl QuizRecord {
    fn to_domain(self) -> PortResult<Quiz> {
        Quiz::new(self.question, self.options, self.answer)
            .map_err(|e| PortError::Unexpected(format!("Malformed quiz: {}", e)))
    }
}

#[derive(Deserialize)]
struct ImageRecord {
    image_url: String,
}

#[async_trait]
impl ContentGenerationService for HttpGenerationAdapter {
    async fn generate_sentence(&self, token: &CredentialToken, word: &Word) -> PortResult<String> {
        let request = self.sentence_request(token, word);
        let record: SentenceRecord = self.client.send_json(request).await?;
        Ok(record.sentence.trim().to_string())
    }

    async fn generate_quiz(
        &self,
        token: &CredentialToken,
        word: &Word,
        sentence: &str,
    ) -> PortResult<Quiz> {
        let request = self.quiz_request(token, word, sentence);
        let record: QuizRecord = self.client.send_json(request).await?;
        record.to_domain()
    }

    async fn generate_image(&self, token: &CredentialToken, word: &Word) -> PortResult<String> {
        let request = self.image_request(token, word);
        let record: ImageRecord = self.client.send_json(request).await?;
        Ok(record.image_url)
    }
}
