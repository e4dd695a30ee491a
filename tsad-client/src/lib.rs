//! Thin RPC client the manager uses to reach a worker's `/detector` HTTP
//! surface (§6, §4.9 ControlPlane). One async method per verb, typed
//! request/response structs, a 30s per-call timeout (§5).

pub mod error;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tsad_core::source::Source;
use tsad_detector::{SeriesDetail, SeriesForecast, Summary, TaskDetail};

pub use error::ClientError;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct SubmitTaskRequest<'a> {
    name: &'a str,
    data_source: &'a Source,
    config: &'a str,
}

#[derive(Debug, Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct ForecastRequest<'a> {
    name: &'a str,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// One task to submit in a batch, paired with its name and raw config
/// string (§6 `POST submit_batch_tasks`).
pub struct BatchItem {
    pub name: String,
    pub source: Source,
    pub config: String,
}

/// Talks to a single worker's `http://host:port/detector` surface.
pub struct WorkerClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorkerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/detector/{path}", self.base_url.trim_end_matches('/'))
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ClientError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }

    async fn post_command<Req: Serialize>(&self, path: &str, body: &Req) -> Result<(), ClientError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .timeout(CONTROL_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        Ok(())
    }

    async fn get_json<Resp: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<Resp, ClientError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(&url)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(|source| ClientError::Request { url: url.clone(), source })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { url, status, body });
        }

        response
            .json()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }

    pub async fn submit_task(&self, name: &str, source: &Source, config: &str) -> Result<(), ClientError> {
        self.post_command("submit_task", &SubmitTaskRequest { name, data_source: source, config })
            .await
    }

    /// Returns one result per item, in order: `"ok"` or the worker's error
    /// string (§6 `POST submit_batch_tasks`).
    pub async fn submit_batch_tasks(&self, batch: &[BatchItem]) -> Result<Vec<String>, ClientError> {
        let requests: Vec<SubmitTaskRequest> = batch
            .iter()
            .map(|item| SubmitTaskRequest { name: &item.name, data_source: &item.source, config: &item.config })
            .collect();

        self.post_json("submit_batch_tasks", &requests).await
    }

    pub async fn cancel_task(&self, name: &str) -> Result<(), ClientError> {
        self.post_command("cancel_task", &NameRequest { name }).await
    }

    pub async fn retrain_task(&self, name: &str) -> Result<(), ClientError> {
        self.post_command("retrain_task", &NameRequest { name }).await
    }

    pub async fn forecast_task(
        &self,
        name: &str,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesForecast>, ClientError> {
        self.post_json("forecast_task", &ForecastRequest { name, begin, end }).await
    }

    pub async fn query_task_detail(&self, name: &str) -> Result<TaskDetail, ClientError> {
        self.get_json(&format!("query_task_detail?name={}", urlencoding_light(name))).await
    }

    pub async fn all_task_detail(&self) -> Result<Vec<TaskDetail>, ClientError> {
        self.get_json("all_task_detail").await
    }

    pub async fn all_ts_detail(&self) -> Result<Vec<SeriesDetail>, ClientError> {
        self.get_json("all_ts_detail").await
    }

    pub async fn summary(&self) -> Result<Summary, ClientError> {
        self.get_json("summary").await
    }
}

/// Percent-encodes the handful of characters that matter in a task name
/// used as a query parameter; task names are operator-chosen identifiers,
/// not arbitrary user text, so a full `urlencoding` dependency isn't worth
/// carrying for this one call site.
fn urlencoding_light(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
