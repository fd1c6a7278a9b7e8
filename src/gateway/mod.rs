use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::agents::{AgentsApi, MessageRole, Run, RunStatus, SortOrder};
use crate::chats::{Chat, ChatStore};
use crate::config::GatewayConfig;
use crate::errors::ParlanceError;
use crate::ratelimit::RateLimiter;

/// Persona and formatting directive prefixed to every outbound message.
const BASE_INSTRUCTIONS: &str = "You are a helpful AI assistant. When you answer, use normal text for normal content, but format tables, bold, and other rich content as Markdown. Be concise but informative. If you're unsure about something, say so.";

/// How many recent messages to scan for the assistant's reply.
const RECENT_MESSAGES_LIMIT: u32 = 10;

/// Reply when a completed run produced no assistant message.
pub const NO_RESPONSE_SENTINEL: &str =
    "[No Response] I didn't generate a response. Please try rephrasing your question.";
/// Marker opening every failed-run reply.
pub const SERVICE_ERROR_MARKER: &str = "[Service Error]";
/// Reply when the remote run expired before completing.
pub const TIMEOUT_SENTINEL: &str =
    "[Timeout] Your request took too long to process. Please try a simpler question.";
/// Reply when the run succeeded but the response could not be fetched.
pub const RETRIEVAL_ERROR_SENTINEL: &str =
    "[Error] I had trouble retrieving my response. Please try again.";

/// Optional personalization hints appended to the instruction block.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_name: Option<String>,
    pub preferences: Option<String>,
}

/// Snapshot returned by [`ConversationGateway::health_status`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub endpoint: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_model: Option<String>,
}

/// One transcript entry from [`ConversationGateway::conversation_summary`].
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Mediates all traffic between local chats and one remote agent.
///
/// Owns thread lifecycle, retry with exponential backoff, per-chat rate
/// limiting, and run-status interpretation. Conversational failures degrade
/// to sentinel text the caller can store and display; only rate-limit and
/// authentication conditions surface as errors, for the layer above to
/// translate into 429 and 401.
pub struct ConversationGateway {
    config: GatewayConfig,
    client: Arc<dyn AgentsApi>,
    chats: Arc<dyn ChatStore>,
    limiter: Arc<dyn RateLimiter>,
}

impl ConversationGateway {
    /// Validate configuration and probe the remote agent before accepting
    /// traffic. Probe failures abort construction: credential rejections
    /// stay [`ParlanceError::Auth`], anything else becomes
    /// [`ParlanceError::Service`].
    pub async fn connect(
        config: GatewayConfig,
        client: Arc<dyn AgentsApi>,
        chats: Arc<dyn ChatStore>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, ParlanceError> {
        config.validate()?;

        match client.get_agent(&config.agent_id).await {
            Ok(agent) => {
                info!(
                    "connected to agent {} ({})",
                    config.agent_id,
                    agent.name.as_deref().unwrap_or("unnamed")
                );
            }
            Err(e @ ParlanceError::Auth(_)) => {
                error!("agent authentication failed during connect: {}", e);
                return Err(e);
            }
            Err(e) => {
                error!("agent connectivity probe failed: {}", e);
                return Err(ParlanceError::Service(format!(
                    "failed to connect to agent {}: {}",
                    config.agent_id, e
                )));
            }
        }

        Ok(Self {
            config,
            client,
            chats,
            limiter,
        })
    }

    /// Send `text` on behalf of `chat` and return the agent's reply.
    ///
    /// The caller validates `text` (non-empty, length-capped) beforehand and
    /// persists the returned reply as a chat message. The only error
    /// variants this returns are [`ParlanceError::RateLimit`] and
    /// [`ParlanceError::Auth`]; every other failure comes back as sentinel
    /// text describing what went wrong.
    pub async fn send_message(
        &self,
        text: &str,
        chat: &mut Chat,
        user_context: Option<&UserContext>,
    ) -> Result<String, ParlanceError> {
        self.limiter.check(&chat.id)?;

        match self.send_with_retry(text, chat, user_context).await {
            Ok(reply) => Ok(reply),
            Err(e @ (ParlanceError::RateLimit { .. } | ParlanceError::Auth(_))) => Err(e),
            Err(e) => {
                error!("unrecovered send failure for chat {}: {}", chat.id, e);
                Ok(format!(
                    "[Error] Sorry, I encountered an unexpected error: {}",
                    e
                ))
            }
        }
    }

    async fn send_with_retry(
        &self,
        text: &str,
        chat: &mut Chat,
        user_context: Option<&UserContext>,
    ) -> Result<String, ParlanceError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.dispatch(text, chat, user_context).await {
                Ok(reply) => {
                    debug!("send succeeded for chat {} on attempt {}", chat.id, attempt);
                    return Ok(reply);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(
                        "send attempt {}/{} failed for chat {}: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        chat.id,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = self.backoff_delay(attempt);
                        debug!("retrying chat {} in {:?}", chat.id, delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ParlanceError::Service("all send attempts failed".to_string())))
    }

    /// Exponential backoff capped at the configured maximum, with up to 25%
    /// jitter to avoid thundering herds.
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let base = (self.config.retry_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32))
        .min(self.config.max_retry_delay_ms as f64) as u64;
        let jitter = (base as f64 * 0.25 * fastrand::f64()) as u64;
        Duration::from_millis(base + jitter)
    }

    /// One full send: ensure a live thread, post the message, run the agent,
    /// interpret the outcome.
    async fn dispatch(
        &self,
        text: &str,
        chat: &mut Chat,
        user_context: Option<&UserContext>,
    ) -> Result<String, ParlanceError> {
        let thread_id = self.ensure_thread(chat).await?;

        let content = compose_prompt(text, user_context);
        self.client
            .create_message(&thread_id, MessageRole::User, &content)
            .await?;
        debug!("posted user message to thread {}", thread_id);

        let run = self
            .client
            .create_and_process_run(&thread_id, &self.config.agent_id)
            .await?;
        Ok(self.interpret_run(&run, &thread_id).await)
    }

    /// Return a live thread id for `chat`, creating and persisting a
    /// replacement whenever the recorded one is missing or unfetchable.
    async fn ensure_thread(&self, chat: &mut Chat) -> Result<String, ParlanceError> {
        if let Some(thread_id) = chat.thread_id.clone() {
            match self.client.get_thread(&thread_id).await {
                Ok(_) => {
                    debug!("reusing thread {} for chat {}", thread_id, chat.id);
                    return Ok(thread_id);
                }
                Err(e) => {
                    // Replacement on any fetch failure; the dropped id and
                    // cause stay in the logs.
                    debug!(
                        "thread {} unavailable for chat {} ({}), replacing",
                        thread_id, chat.id, e
                    );
                }
            }
        }

        let thread_id = self.replace_thread(chat).await?;
        info!("created thread {} for chat {}", thread_id, chat.id);
        Ok(thread_id)
    }

    /// Open a fresh remote thread and persist its id on the chat before
    /// anything is sent against it.
    async fn replace_thread(&self, chat: &mut Chat) -> Result<String, ParlanceError> {
        let thread = self.client.create_thread().await?;
        chat.thread_id = Some(thread.id.clone());
        self.chats.save(chat).await?;
        Ok(thread.id)
    }

    /// Map a finished (or timed-out) run onto the conversational contract.
    async fn interpret_run(&self, run: &Run, thread_id: &str) -> String {
        match run.status {
            RunStatus::Completed => self.latest_assistant_reply(thread_id).await,
            RunStatus::Failed => {
                let detail = run
                    .last_error
                    .as_ref()
                    .map_or("unknown error", |e| e.message.as_str());
                error!("run {} failed on thread {}: {}", run.id, thread_id, detail);
                format!(
                    "{} I'm having trouble processing your request. Please try again later. ({})",
                    SERVICE_ERROR_MARKER, detail
                )
            }
            RunStatus::Expired => {
                warn!("run {} expired on thread {}", run.id, thread_id);
                TIMEOUT_SENTINEL.to_string()
            }
            status => {
                warn!("run {} on thread {} still {}", run.id, thread_id, status);
                format!(
                    "[Status: {}] I'm still processing your request. Please wait a moment.",
                    status
                )
            }
        }
    }

    /// Fetch the newest assistant-authored text from the thread. Listing
    /// failures stay out of the retry loop; re-dispatching after a completed
    /// run would submit the user message twice.
    async fn latest_assistant_reply(&self, thread_id: &str) -> String {
        match self
            .client
            .list_messages(thread_id, SortOrder::Descending, RECENT_MESSAGES_LIMIT)
            .await
        {
            Ok(messages) => {
                for message in messages {
                    if message.role == MessageRole::Assistant && !message.content.is_empty() {
                        debug!(
                            "assistant reply on thread {}: {} chars",
                            thread_id,
                            message.content.len()
                        );
                        return message.content;
                    }
                }
                warn!("no assistant response found on thread {}", thread_id);
                NO_RESPONSE_SENTINEL.to_string()
            }
            Err(e) => {
                error!("failed to retrieve reply from thread {}: {}", thread_id, e);
                RETRIEVAL_ERROR_SENTINEL.to_string()
            }
        }
    }

    /// Start the conversation over on a fresh remote thread. Local message
    /// history is untouched; that decision stays with the caller.
    pub async fn clear_conversation(&self, chat: &mut Chat) -> bool {
        match self.replace_thread(chat).await {
            Ok(thread_id) => {
                info!("cleared conversation for chat {}, new thread {}", chat.id, thread_id);
                true
            }
            Err(e) => {
                error!("failed to clear conversation for chat {}: {}", chat.id, e);
                false
            }
        }
    }

    /// Oldest-to-newest transcript of a remote thread, at most `limit`
    /// entries with text. Empty on any failure.
    pub async fn conversation_summary(&self, thread_id: &str, limit: u32) -> Vec<SummaryEntry> {
        match self
            .client
            .list_messages(thread_id, SortOrder::Ascending, limit)
            .await
        {
            Ok(messages) => messages
                .into_iter()
                .filter(|m| !m.content.is_empty())
                .map(|m| SummaryEntry {
                    role: m.role,
                    content: m.content,
                    timestamp: m.created_at,
                })
                .collect(),
            Err(e) => {
                error!("failed to fetch summary for thread {}: {}", thread_id, e);
                Vec::new()
            }
        }
    }

    /// Re-probe the agent and report a health snapshot. Never errs; probe
    /// failures are collected into the snapshot instead.
    pub async fn health_status(&self) -> HealthStatus {
        let mut status = HealthStatus {
            healthy: false,
            endpoint: self.config.endpoint.clone(),
            agent_id: self.config.agent_id.clone(),
            timestamp: Utc::now(),
            errors: Vec::new(),
            agent_name: None,
            agent_model: None,
        };

        match self.client.get_agent(&self.config.agent_id).await {
            Ok(agent) => {
                status.healthy = true;
                status.agent_name = agent.name;
                status.agent_model = agent.model;
            }
            Err(e) => {
                warn!("health probe failed: {}", e);
                status.errors.push(e.to_string());
            }
        }

        status
    }
}

/// Instruction block plus the raw user text, with optional personalization
/// hints folded into the instructions.
fn compose_prompt(text: &str, user_context: Option<&UserContext>) -> String {
    let mut instructions = BASE_INSTRUCTIONS.to_string();

    if let Some(context) = user_context {
        let mut hints = Vec::new();
        if let Some(name) = &context.user_name {
            hints.push(format!("User name: {}", name));
        }
        if let Some(preferences) = &context.preferences {
            hints.push(format!("User preferences: {}", preferences));
        }
        if !hints.is_empty() {
            instructions.push_str("\n\nUser context: ");
            instructions.push_str(&hints.join(", "));
        }
    }

    format!("{}\n\n{}", instructions, text)
}
