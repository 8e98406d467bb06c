use std::time::Duration;

use async_trait::async_trait;
use jimeng_core::backend::ImageBackend;
use jimeng_core::config::BackendConfig;
use jimeng_core::error::BridgeError;
use jimeng_core::types::CanonicalGenerationRequest;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

const ERROR_BODY_MAX_CHARS: usize = 400;

/// Talks to a jimeng-api compatible server over its OpenAI-style images route.
pub(crate) struct HttpImageBackend {
    client: Client,
    base_url: String,
}

impl HttpImageBackend {
    pub(crate) fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.effective_timeout_seconds()))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn generate(
        &self,
        request: &CanonicalGenerationRequest,
        token: &str,
    ) -> Result<Vec<String>, BridgeError> {
        let url = format!("{}/v1/images/generations", self.base_url);
        debug!(
            "backend request: url={} model={} size={:?}x{:?} with_image={}",
            url,
            request.model,
            request.width,
            request.height,
            request.file_path.is_some()
        );

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    BridgeError::GenerationBackend(format!("timeout: {err}"))
                } else {
                    BridgeError::GenerationBackend(format!("request failed: {err}"))
                }
            })?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|err| BridgeError::GenerationBackend(format!("read response failed: {err}")))?;

        if !status.is_success() {
            warn!("backend http {}", status.as_u16());
            return Err(BridgeError::GenerationBackend(format!(
                "http {}: {}",
                status.as_u16(),
                error_message(&body_text)
            )));
        }

        let value: Value = serde_json::from_str(&body_text)
            .map_err(|err| BridgeError::GenerationBackend(format!("parse response failed: {err}")))?;
        Ok(image_urls(&value))
    }
}

fn image_urls(value: &Value) -> Vec<String> {
    value
        .get("data")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("url").and_then(|u| u.as_str()))
                .filter(|u| !u.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Prefers the structured `error.message` / `message` of a JSON error body.
fn error_message(body_text: &str) -> String {
    let structured = serde_json::from_str::<Value>(body_text).ok().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    let text = structured.unwrap_or_else(|| body_text.trim().to_string());
    if text.chars().count() <= ERROR_BODY_MAX_CHARS {
        return text;
    }
    let mut out: String = text.chars().take(ERROR_BODY_MAX_CHARS).collect();
    out.push_str("...(truncated)");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_come_from_data_array() {
        let value = json!({
            "created": 1,
            "data": [
                { "url": "https://img.test/1.png" },
                { "b64_json": "xxx" },
                { "url": "" },
                { "url": "https://img.test/2.png" }
            ]
        });
        assert_eq!(
            image_urls(&value),
            vec![
                "https://img.test/1.png".to_string(),
                "https://img.test/2.png".to_string()
            ]
        );
        assert!(image_urls(&json!({ "data": null })).is_empty());
    }

    #[test]
    fn error_message_prefers_structured_fields() {
        assert_eq!(
            error_message(r#"{"error":{"message":"token expired"}}"#),
            "token expired"
        );
        assert_eq!(error_message(r#"{"message":"积分不足"}"#), "积分不足");
        assert_eq!(error_message(" gateway down \n"), "gateway down");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let msg = error_message(&"x".repeat(1000));
        assert!(msg.ends_with("...(truncated)"));
        assert_eq!(msg.chars().count(), ERROR_BODY_MAX_CHARS + "...(truncated)".len());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://jimeng-api:8000/".to_string(),
            ..BackendConfig::default()
        };
        let backend = HttpImageBackend::new(&config).unwrap();
        assert_eq!(backend.base_url, "http://jimeng-api:8000");
    }
}
