//! HTTP-backed stage implementations.
//!
//! Each stage POSTs a JSON document to a worker service and maps transport
//! failures onto [`StageError`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::StagesConfig;
use super::error::StageError;
use super::traits::{FinalizeStage, PartialProcessor};
use super::types::FinalizeInput;
use crate::session::{BatchIndex, Payload, SessionContext};

#[derive(Serialize)]
struct PartialRequest<'a> {
    session_id: &'a str,
    participant: &'a str,
    generation: u64,
    index: BatchIndex,
    payload: Payload,
}

#[derive(Serialize)]
struct FinalizeRequestBody<'a> {
    session_id: &'a str,
    participant: &'a str,
    generation: u64,
    last_index: BatchIndex,
    payload: Payload,
    missing_batches: Vec<BatchIndex>,
    processed_batches: Vec<BatchIndex>,
}

fn build_client(timeout: Duration) -> Result<Client, StageError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StageError::Unavailable(format!("failed to create HTTP client: {}", e)))
}

/// Shared POST logic for both stages.
async fn post_json<T: Serialize>(
    client: &Client,
    url: &str,
    timeout: Duration,
    body: &T,
) -> Result<Response, StageError> {
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            StageError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            StageError::Unavailable(e.to_string())
        } else {
            StageError::Failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(StageError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect::<String>(),
        });
    }

    Ok(response)
}

/// Sends each partial batch to a worker over HTTP.
pub struct HttpPartialProcessor {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpPartialProcessor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StageError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            timeout,
        })
    }

    /// Build from `[stages]`; fails if `partial_url` is not set.
    pub fn from_config(config: &StagesConfig) -> Result<Self, StageError> {
        let url = config
            .partial_url
            .as_deref()
            .ok_or_else(|| StageError::Unavailable("stages.partial_url is not set".into()))?;
        Self::new(url, config.timeout())
    }
}

#[async_trait]
impl PartialProcessor for HttpPartialProcessor {
    fn name(&self) -> &str {
        "http"
    }

    async fn process_partial(
        &self,
        ctx: &SessionContext,
        index: BatchIndex,
        payload: Payload,
    ) -> Result<(), StageError> {
        let body = PartialRequest {
            session_id: &ctx.session_id,
            participant: &ctx.participant,
            generation: ctx.generation,
            index,
            payload,
        };

        debug!(url = %self.url, session_id = %ctx.session_id, index, "Posting partial batch");
        post_json(&self.client, &self.url, self.timeout, &body)
            .await
            .inspect_err(|e| warn!(index, error = %e, "Partial worker call failed"))?;
        Ok(())
    }
}

/// Sends the finalize request to a worker over HTTP and returns its JSON reply.
pub struct HttpFinalizeStage {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpFinalizeStage {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, StageError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            timeout,
        })
    }

    /// Build from `[stages]`; fails if `finalize_url` is not set.
    pub fn from_config(config: &StagesConfig) -> Result<Self, StageError> {
        let url = config
            .finalize_url
            .as_deref()
            .ok_or_else(|| StageError::Unavailable("stages.finalize_url is not set".into()))?;
        Self::new(url, config.timeout())
    }
}

#[async_trait]
impl FinalizeStage for HttpFinalizeStage {
    fn name(&self) -> &str {
        "http"
    }

    async fn finalize(
        &self,
        ctx: &SessionContext,
        input: FinalizeInput,
    ) -> Result<Value, StageError> {
        let body = FinalizeRequestBody {
            session_id: &ctx.session_id,
            participant: &ctx.participant,
            generation: ctx.generation,
            last_index: input.last_index,
            payload: input.payload,
            missing_batches: input.missing_batches,
            processed_batches: input.processed_batches,
        };

        debug!(url = %self.url, session_id = %ctx.session_id, "Posting finalize request");
        let response = post_json(&self.client, &self.url, self.timeout, &body).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| StageError::InvalidResponse(e.to_string()))
    }
}
