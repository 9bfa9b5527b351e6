//! Thin HTTP client for the processing backend.
//!
//! Requests share one 5-minute timeout; a request that outlives it is
//! reported as a failure like any other, and the orchestrator offers the
//! usual retry/skip choice. Error bodies are decoded best-effort: JSON
//! `detail`/`message`/`error` fields when present, raw text otherwise.

use async_trait::async_trait;
use common::model::responses::{CheckResponse, ErrorBody, OutcomeResponse, ProcessFilesResponse};
use log::debug;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::orchestrator::driver::{PartSubmitter, PartUpload};
use crate::orchestrator::Submission;

/// Matches the abort timeout the dashboard used for its import calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("the request timed out; try a smaller file or more parts")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Network(error.to_string())
        }
    }
}

pub struct BackendClient {
    base_url: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Result<BackendClient, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(BackendClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Pre-flight liveness check.
    pub async fn health(&self) -> bool {
        match self.http.get(self.url("/api/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Whether the backend already holds data (drives the append prompt).
    pub async fn check_data(&self) -> Result<bool, ClientError> {
        let response = self.http.get(self.url("/api/csv/check")).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json::<CheckResponse>().await?.exists)
    }

    /// Uploads one data part with the mapping file.
    pub async fn process_part(
        &self,
        data_path: &Path,
        data_name: &str,
        mapping_path: &Path,
        mapping_name: &str,
        append: bool,
    ) -> Result<ProcessFilesResponse, ClientError> {
        let data_bytes = tokio::fs::read(data_path).await?;
        let mapping_bytes = tokio::fs::read(mapping_path).await?;
        debug!(
            "submitting {data_name} ({} bytes, append={append})",
            data_bytes.len()
        );

        let form = Form::new()
            .part(
                "dataFiles",
                Part::bytes(data_bytes).file_name(data_name.to_string()),
            )
            .part(
                "mappingFile",
                Part::bytes(mapping_bytes).file_name(mapping_name.to_string()),
            )
            .text("appendMode", if append { "true" } else { "false" });

        let response = self
            .http
            .post(self.url("/api/process_files"))
            .multipart(form)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    /// Snapshots the stored records into a named table.
    pub async fn load_data(&self, table_name: &str) -> Result<OutcomeResponse, ClientError> {
        let form = Form::new().text("table_name", table_name.to_string());
        let response = self
            .http
            .post(self.url("/api/load_data"))
            .multipart(form)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    /// Drops every stored record.
    pub async fn purge(&self) -> Result<OutcomeResponse, ClientError> {
        let response = self.http.delete(self.url("/api/csv/purge")).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turns a non-2xx reply into [`ClientError::Server`] with the best message
/// the body offers.
async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Server {
        status: status.as_u16(),
        message: extract_error_message(status.as_u16(), &body),
    })
}

fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.best_message() {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

/// The mapping file rides along with every part submission.
pub struct SessionUploader<'a> {
    pub client: &'a BackendClient,
    pub mapping_path: &'a Path,
    pub mapping_name: &'a str,
}

#[async_trait]
impl PartSubmitter for SessionUploader<'_> {
    async fn submit_part(
        &self,
        part: &PartUpload,
        submission: &Submission,
    ) -> Result<ProcessFilesResponse, ClientError> {
        self.client
            .process_part(
                &part.path,
                &part.name,
                self.mapping_path,
                self.mapping_name,
                submission.append,
            )
            .await
    }
}
