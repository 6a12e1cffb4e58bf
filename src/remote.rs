//! Blocking JSON-over-HTTP client for the external model services.
//!
//! Every call runs with a timeout and is retried at most `max_retries`
//! times on transport failures (connection refused, DNS, timeouts).
//! HTTP status errors are returned immediately.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ServiceError};

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token. Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after a transport failure.
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 1,
        }
    }
}

/// JSON POST client bound to one service.
pub(crate) struct JsonClient {
    service: &'static str,
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl JsonClient {
    pub(crate) fn new(service: &'static str, config: &ServiceConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                service: service.into(),
            })?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Ok(Self {
            service,
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `{base_url}/{path}` and parse the JSON response.
    pub(crate) fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = self
                .agent
                .post(&url)
                .set("Authorization", &format!("Bearer {}", self.api_key))
                .set("Content-Type", "application/json")
                .send_json(body.clone());

            match result {
                Ok(resp) => {
                    return resp.into_json().map_err(|e| ServiceError::Parse {
                        service: self.service,
                        message: e.to_string(),
                    });
                }
                Err(ureq::Error::Status(status, resp)) => {
                    let message = resp
                        .into_string()
                        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
                    return Err(ServiceError::Status {
                        service: self.service,
                        status,
                        message,
                    });
                }
                Err(ureq::Error::Transport(t)) => {
                    if attempts > self.max_retries {
                        return Err(ServiceError::Transport {
                            service: self.service,
                            url,
                            attempts,
                            message: t.to_string(),
                        });
                    }
                    tracing::warn!(
                        service = self.service,
                        attempt = attempts,
                        error = %t,
                        "transport failure, retrying"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> ServiceConfig {
        ServiceConfig {
            base_url: "http://127.0.0.1:1".into(), // nothing listens here
            api_key: Some("test-key".into()),
            timeout_secs: 2,
            max_retries: 1,
        }
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let config = ServiceConfig::default();
        assert!(matches!(
            JsonClient::new("chat", &config),
            Err(ConfigError::MissingApiKey { .. })
        ));
        let config = ServiceConfig {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(JsonClient::new("chat", &config).is_err());
    }

    #[test]
    fn transport_failure_retries_once_then_fails() {
        let client = JsonClient::new("embeddings", &unreachable_config()).unwrap();
        let err = client.post("/embeddings", &serde_json::json!({})).unwrap_err();
        match err {
            ServiceError::Transport { attempts, url, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(url, "http://127.0.0.1:1/embeddings");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn api_key_is_not_serialized() {
        let json = serde_json::to_string(&unreachable_config()).unwrap();
        assert!(!json.contains("test-key"));
    }
}
