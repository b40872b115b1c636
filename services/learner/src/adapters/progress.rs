//! services/learner/src/adapters/progress.rs
//!
//! This module contains the adapter for the backend's progress endpoints.
//! It implements the `ProgressService` port from the `core` crate.

use crate::adapters::http::BackendClient;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use vocab_core::domain::{CredentialToken, ProgressRecord, ProgressSummary};
use vocab_core::ports::{PortResult, ProgressService};

/// An adapter that implements the `ProgressService` port over HTTP.
#[derive(Clone)]
pub struct HttpProgressAdapter {
    client: BackendClient,
}

impl HttpProgressAdapter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProgressRow {
    date: NaiveDate,
    words_learned: u32,
    quiz_score: u32,
}
impl ProgressRow {
    fn from_domain(record: &ProgressRecord) -> Self {
        Self {
            date: record.date,
            words_learned: record.words_learned,
            quiz_score: record.quiz_score,
        }
    }

    fn to_domain(self) -> ProgressRecord {
        ProgressRecord {
            date: self.date,
            words_learned: self.words_learned,
            quiz_score: self.quiz_score,
        }
    }
}

/// What the backend keeps per learner when it stores running totals instead
/// of one row per correct answer.
#[derive(Deserialize, Debug, PartialEq)]
struct ProgressTotals {
    words_learned: u32,
    average_score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProgressEntry {
    Dated(ProgressRow),
    Totals(ProgressTotals),
}

/// The listing may be an array, a single entry, or `null` for a learner with
/// nothing recorded yet.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProgressListing {
    Many(Vec<ProgressEntry>),
    One(ProgressEntry),
}

impl ProgressListing {
    fn into_summary(listing: Option<Self>) -> ProgressSummary {
        let entries = match listing {
            Some(ProgressListing::Many(entries)) => entries,
            Some(ProgressListing::One(entry)) => vec![entry],
            None => Vec::new(),
        };
        let mut records = Vec::new();
        let mut totals = Vec::new();
        for entry in entries {
            match entry {
                ProgressEntry::Dated(row) => records.push(row.to_domain()),
                ProgressEntry::Totals(t) => totals.push(t),
            }
        }
        if totals.is_empty() {
            return ProgressSummary::from_records(records);
        }
        // Totals already count everything the backend has seen.
        let words_learned = totals.iter().map(|t| t.words_learned).sum();
        let average_score =
            totals.iter().map(|t| t.average_score).sum::<f64>() / totals.len() as f64;
        ProgressSummary {
            words_learned,
            average_score,
            records,
        }
    }
}

#[async_trait]
impl ProgressService for HttpProgressAdapter {
    async fn append_progress(
        &self,
        token: &CredentialToken,
        record: &ProgressRecord,
    ) -> PortResult<()> {
        let request = BackendClient::authorized(self.client.post("/progress/"), token)
            .json(&ProgressRow::from_domain(record));
        self.client.send_empty(request).await
    }

    async fn list_progress(
        &self,
        token: &CredentialToken,
        user_id: i64,
    ) -> PortResult<ProgressSummary> {
        let path = format!("/progress/{}", user_id);
        let request = BackendClient::authorized(self.client.get(&path), token);
        let listing: Option<ProgressListing> = self.client.send_json(request).await?;
        Ok(ProgressListing::into_summary(listing))
    }
}
