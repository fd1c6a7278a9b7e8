// Shared test helpers — not all items used by every test binary.
#![allow(unused)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parlance::agents::HttpAgentsClient;
use parlance::chats::MemoryChatStore;
use parlance::config::GatewayConfig;
use parlance::gateway::ConversationGateway;
use parlance::ratelimit::KeyedRateLimiter;

pub const AGENT_ID: &str = "agent-junior";

pub fn test_config(endpoint: &str) -> GatewayConfig {
    GatewayConfig {
        endpoint: endpoint.to_string(),
        agent_id: AGENT_ID.to_string(),
        api_key: Some("integration-key".to_string()),
        max_retries: 2,
        retry_delay_ms: 10,
        max_retry_delay_ms: 40,
        backoff_multiplier: 2.0,
        timeout_secs: 2,
        rate_limit_per_minute: 120,
    }
}

/// Stand up a gateway against a mock server, using the real HTTP client
/// with fast polling.
pub async fn connect_gateway(
    server: &MockServer,
    store: Arc<MemoryChatStore>,
) -> ConversationGateway {
    connect_gateway_with_limit(server, store, 120).await
}

pub async fn connect_gateway_with_limit(
    server: &MockServer,
    store: Arc<MemoryChatStore>,
    per_minute: u32,
) -> ConversationGateway {
    let config = test_config(&server.uri());
    let client = Arc::new(
        HttpAgentsClient::from_config(&config).with_poll_interval(Duration::from_millis(10)),
    );
    let limiter = Arc::new(KeyedRateLimiter::per_minute(per_minute));
    ConversationGateway::connect(config, client, store, limiter)
        .await
        .expect("gateway should connect")
}

pub async fn mount_agent(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/assistants/{}", AGENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": AGENT_ID,
            "name": "Junior",
            "model": "prime-4"
        })))
        .mount(server)
        .await;
}

/// POST /threads returning a fixed id, plus GET for the same thread.
pub async fn mount_thread(server: &MockServer, thread_id: &str) {
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": thread_id})))
        .mount(server)
        .await;
    mount_thread_lookup(server, thread_id).await;
}

pub async fn mount_thread_lookup(server: &MockServer, thread_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/threads/{}", thread_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": thread_id})))
        .mount(server)
        .await;
}

pub async fn mount_message_create(server: &MockServer, thread_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/threads/{}/messages", thread_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg-local",
            "role": "user",
            "content": "accepted"
        })))
        .mount(server)
        .await;
}

/// POST /threads/{id}/runs resolving immediately to the given status.
pub async fn mount_run(server: &MockServer, thread_id: &str, run_id: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/threads/{}/runs", thread_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": run_id,
            "status": status
        })))
        .mount(server)
        .await;
}

/// Newest-first replies for the post-run fetch (order=desc).
pub async fn mount_replies(server: &MockServer, thread_id: &str, newest_first: &[(&str, &str)]) {
    let data: Vec<_> = newest_first
        .iter()
        .map(|(role, text)| json!({"id": "m", "role": role, "content": text}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/threads/{}/messages", thread_id)))
        .and(query_param("order", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
        .mount(server)
        .await;
}

/// Oldest-first transcript for summary calls (order=asc).
pub async fn mount_transcript(server: &MockServer, thread_id: &str, oldest_first: &[(&str, &str)]) {
    let data: Vec<_> = oldest_first
        .iter()
        .map(|(role, text)| json!({"id": "m", "role": role, "content": text}))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/threads/{}/messages", thread_id)))
        .and(query_param("order", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": data})))
        .mount(server)
        .await;
}

/// Everything needed for one happy-path exchange on `thread_id`.
pub async fn mount_full_exchange(server: &MockServer, thread_id: &str, reply: &str) {
    mount_agent(server).await;
    mount_thread(server, thread_id).await;
    mount_message_create(server, thread_id).await;
    mount_run(server, thread_id, "run-1", "completed").await;
    mount_replies(server, thread_id, &[("assistant", reply)]).await;
}
