use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::agents::api::AgentsApi;
use crate::agents::types::{Agent, MessageRole, Run, SortOrder, Thread, ThreadMessage};
use crate::config::GatewayConfig;
use crate::errors::ParlanceError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Interval between run status polls.
const RUN_POLL_INTERVAL_MS: u64 = 500;

/// HTTP implementation of [`AgentsApi`] against an assistants-style REST
/// service: agents under `assistants/{id}`, threads under `threads/{id}`
/// with nested `messages` and `runs` resources.
pub struct HttpAgentsClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    run_timeout: Duration,
    poll_interval: Duration,
}

impl HttpAgentsClient {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            run_timeout: timeout,
            poll_interval: Duration::from_millis(RUN_POLL_INTERVAL_MS),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Override how often run status is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the budget for waiting on a run, independent of the
    /// per-request timeout.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {}", key)),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ParlanceError> {
        let resp = self
            .with_auth(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| ParlanceError::Service(format!("agent service request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ParlanceError> {
        let resp = self
            .with_auth(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| ParlanceError::Service(format!("agent service request failed: {}", e)))?;
        Self::parse_response(resp).await
    }

    async fn parse_response<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ParlanceError> {
        let resp = Self::check_status(resp).await?;
        resp.json::<T>().await.map_err(|e| {
            ParlanceError::Service(format!("failed to parse agent service response: {}", e))
        })
    }

    /// Map non-success statuses onto the error taxonomy, consuming the
    /// response body for detail. On success, returns the response unchanged.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ParlanceError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let error_text = resp
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let detail = extract_error_message(&error_text);

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("agent service rate limit hit (retry-after: {:?})", retry_after);
            return Err(ParlanceError::RateLimit { retry_after });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!("agent service rejected credentials ({}): {}", status, detail);
            return Err(ParlanceError::Auth(format!(
                "agent service rejected credentials: {}",
                detail
            )));
        }

        Err(ParlanceError::Service(format!(
            "agent service error ({}): {}",
            status.as_u16(),
            detail
        )))
    }
}

/// Pull a human-readable message out of an `{"error": {...}}` body, falling
/// back to the raw text.
fn extract_error_message(body: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<Value>(body)
        && let Some(err) = error_json.get("error")
    {
        if let Some(message) = err.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
        return err.to_string();
    }
    body.to_string()
}

#[derive(Deserialize)]
struct MessagePage {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[async_trait]
impl AgentsApi for HttpAgentsClient {
    async fn get_agent(&self, agent_id: &str) -> Result<Agent, ParlanceError> {
        self.get_json(&format!("assistants/{}", agent_id)).await
    }

    async fn create_thread(&self) -> Result<Thread, ParlanceError> {
        let thread: Thread = self.post_json("threads", &json!({})).await?;
        debug!("created thread {}", thread.id);
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, ParlanceError> {
        self.get_json(&format!("threads/{}", thread_id)).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage, ParlanceError> {
        self.post_json(
            &format!("threads/{}/messages", thread_id),
            &json!({ "role": role, "content": content }),
        )
        .await
    }

    async fn create_and_process_run(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<Run, ParlanceError> {
        let mut run: Run = self
            .post_json(
                &format!("threads/{}/runs", thread_id),
                &json!({ "assistant_id": agent_id }),
            )
            .await?;

        let deadline = tokio::time::Instant::now() + self.run_timeout;
        while !run.status.is_terminal() {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "run {} still {} after {:?}, giving up polling",
                    run.id, run.status, self.run_timeout
                );
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            run = self
                .get_json(&format!("threads/{}/runs/{}", thread_id, run.id))
                .await?;
        }

        Ok(run)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        order: SortOrder,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ParlanceError> {
        let page: MessagePage = self
            .get_json(&format!(
                "threads/{}/messages?order={}&limit={}",
                thread_id,
                order.as_query(),
                limit
            ))
            .await?;
        Ok(page.data)
    }
}
