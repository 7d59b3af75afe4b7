//! HTTP implementation of the store seams against the clinic backend.

use super::{PriorityClassifier, QueueStore, StoreError, StoreResult};
use crate::config::{QueueConfig, SessionContext};
use crate::constants::{
    entry_path, mark_complete_path, patient_path, CURRENT_QUEUE_PATH, PRIORITIZE_PATH,
    SESSION_TOKEN_HEADER,
};
use async_trait::async_trait;
use queue_types::{EntryId, Patient, PatientIdentifier, Priority, QueueEntry};
use queue_wire::{CurrentQueue, PatientRecord, Prioritize};
use reqwest::{Method, RequestBuilder, StatusCode};
use std::time::Duration;

/// Longest response body quoted in a [`StoreError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Queue store and classifier backed by the clinic REST API.
#[derive(Clone, Debug)]
pub struct HttpQueueStore {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: SessionContext,
}

impl HttpQueueStore {
    /// Build a client for `cfg.api_base_url()` that authenticates as `session`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(cfg: &QueueConfig, session: SessionContext) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: cfg.api_base_url().to_string(),
            timeout: cfg.request_timeout(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match self.session.session_token() {
            Some(token) => builder.header(SESSION_TOKEN_HEADER, format!("Token {token}")),
            None => builder,
        }
    }

    /// Send, map non-success statuses to errors, and return the body text.
    async fn send(&self, builder: RequestBuilder, what: &str) -> StoreResult<String> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl QueueStore for HttpQueueStore {
    async fn fetch_queue(&self) -> StoreResult<Vec<QueueEntry>> {
        let body = self
            .send(self.request(Method::GET, CURRENT_QUEUE_PATH), "current queue")
            .await?;
        Ok(CurrentQueue::parse(&body)?)
    }

    async fn mark_complete(&self, id: EntryId) -> StoreResult<()> {
        self.send(
            self.request(Method::POST, &mark_complete_path(id)),
            &format!("queue entry {id}"),
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, id: EntryId) -> StoreResult<()> {
        self.send(
            self.request(Method::DELETE, &entry_path(id)),
            &format!("queue entry {id}"),
        )
        .await?;
        Ok(())
    }

    async fn resolve_patient(&self, identifier: &PatientIdentifier) -> StoreResult<Patient> {
        let body = self
            .send(
                self.request(Method::GET, &patient_path(identifier)),
                &format!("patient {identifier}"),
            )
            .await?;
        Ok(PatientRecord::parse(&body)?)
    }
}

#[async_trait]
impl PriorityClassifier for HttpQueueStore {
    async fn reprioritize(&self, patient: &PatientIdentifier) -> StoreResult<Priority> {
        let payload = Prioritize::render_request(patient)?;
        let builder = self
            .request(Method::POST, PRIORITIZE_PATH)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        let body = self.send(builder, &format!("patient {patient}")).await?;
        Ok(Prioritize::parse_response(&body)?)
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(500);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("  short  "), "short");
    }

    #[test]
    fn test_new_uses_config_base_url() {
        let cfg = QueueConfig::with_defaults("http://127.0.0.1:9/").expect("config");
        let store = HttpQueueStore::new(&cfg, SessionContext::default()).expect("client");
        assert_eq!(store.base_url(), "http://127.0.0.1:9");
    }
}
