use std::collections::HashMap;

use super::*;

fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn lookup(map: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_applied_on_empty_input() {
    let config: GatewayConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.retry_delay_ms, 1000);
    assert_eq!(config.max_retry_delay_ms, 10_000);
    assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.timeout_secs, 30);
    assert_eq!(config.rate_limit_per_minute, 30);
    assert!(config.endpoint.is_empty());
    assert!(config.api_key.is_none());
}

#[test]
fn test_camel_case_keys_deserialize() {
    let config: GatewayConfig = serde_json::from_str(
        r#"{
            "endpoint": "https://agents.example.com",
            "agentId": "agent-7",
            "apiKey": "sk-secret",
            "maxRetries": 5,
            "retryDelayMs": 250,
            "timeoutSecs": 10,
            "rateLimitPerMinute": 60
        }"#,
    )
    .unwrap();
    assert_eq!(config.agent_id, "agent-7");
    assert_eq!(config.api_key.as_deref(), Some("sk-secret"));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.retry_delay_ms, 250);
    assert_eq!(config.timeout_secs, 10);
    assert_eq!(config.rate_limit_per_minute, 60);
}

#[test]
fn test_validate_requires_endpoint_and_agent_id() {
    let config = GatewayConfig::default();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ParlanceError::Config(_)));

    let config = GatewayConfig {
        endpoint: "https://agents.example.com".to_string(),
        ..GatewayConfig::default()
    };
    assert!(config.validate().is_err());

    let config = GatewayConfig {
        endpoint: "https://agents.example.com".to_string(),
        agent_id: "agent-7".to_string(),
        ..GatewayConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_malformed_endpoint() {
    let config = GatewayConfig {
        endpoint: "not a url".to_string(),
        agent_id: "agent-7".to_string(),
        ..GatewayConfig::default()
    };
    let err = config.validate().unwrap_err();
    match err {
        ParlanceError::Config(msg) => assert!(msg.contains("invalid endpoint URL")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_from_env_reads_all_settings() {
    let env = env_map(&[
        (ENV_ENDPOINT, "https://agents.example.com"),
        (ENV_AGENT_ID, "agent-7"),
        (ENV_API_KEY, "sk-secret"),
        (ENV_MAX_RETRIES, "5"),
        (ENV_RETRY_DELAY_MS, "500"),
        (ENV_TIMEOUT_SECS, "15"),
        (ENV_RATE_LIMIT, "90"),
    ]);
    let config = GatewayConfig::from_env_with(&lookup(&env));
    assert_eq!(config.endpoint, "https://agents.example.com");
    assert_eq!(config.agent_id, "agent-7");
    assert_eq!(config.api_key.as_deref(), Some("sk-secret"));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.retry_delay_ms, 500);
    assert_eq!(config.timeout_secs, 15);
    assert_eq!(config.rate_limit_per_minute, 90);
}

#[test]
fn test_from_env_keeps_defaults_for_unparsable_numbers() {
    let env = env_map(&[
        (ENV_ENDPOINT, "https://agents.example.com"),
        (ENV_AGENT_ID, "agent-7"),
        (ENV_MAX_RETRIES, "many"),
        (ENV_TIMEOUT_SECS, ""),
    ]);
    let config = GatewayConfig::from_env_with(&lookup(&env));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.timeout_secs, 30);
}

#[test]
fn test_from_env_ignores_blank_api_key() {
    let env = env_map(&[(ENV_API_KEY, "   ")]);
    let config = GatewayConfig::from_env_with(&lookup(&env));
    assert!(config.api_key.is_none());
}

#[test]
fn test_enabled_requires_all_credentials() {
    let env = env_map(&[
        (ENV_ENDPOINT, "https://agents.example.com"),
        (ENV_AGENT_ID, "agent-7"),
        (ENV_API_KEY, "sk-secret"),
    ]);
    assert!(GatewayConfig::enabled_with(&lookup(&env)));

    for missing in [ENV_ENDPOINT, ENV_AGENT_ID, ENV_API_KEY] {
        let mut partial = env.clone();
        partial.remove(missing);
        assert!(
            !GatewayConfig::enabled_with(&lookup(&partial)),
            "should be disabled without {}",
            missing
        );
    }
}

#[test]
fn test_enabled_rejects_blank_values() {
    let env = env_map(&[
        (ENV_ENDPOINT, "https://agents.example.com"),
        (ENV_AGENT_ID, "  "),
        (ENV_API_KEY, "sk-secret"),
    ]);
    assert!(!GatewayConfig::enabled_with(&lookup(&env)));
}

#[test]
fn test_debug_redacts_api_key() {
    let config = GatewayConfig {
        endpoint: "https://agents.example.com".to_string(),
        agent_id: "agent-7".to_string(),
        api_key: Some("sk-super-secret".to_string()),
        ..GatewayConfig::default()
    };
    let rendered = format!("{:?}", config);
    assert!(!rendered.contains("sk-super-secret"));
    assert!(rendered.contains("[REDACTED]"));
    assert!(rendered.contains("agent-7"));
}
