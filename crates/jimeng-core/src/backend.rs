use std::time::Duration;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::CanonicalGenerationRequest;

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Returns the generated image URLs.
    async fn generate(
        &self,
        request: &CanonicalGenerationRequest,
        token: &str,
    ) -> Result<Vec<String>, BridgeError>;
}

/// Runs one backend call under `timeout`. An empty URL list, a timeout or a
/// backend failure all end the request; nothing is retried.
pub async fn generate_with_timeout(
    backend: &dyn ImageBackend,
    request: &CanonicalGenerationRequest,
    token: &str,
    timeout: Duration,
) -> Result<Vec<String>, BridgeError> {
    let urls = tokio::time::timeout(timeout, backend.generate(request, token))
        .await
        .map_err(|_| {
            BridgeError::GenerationBackend(format!("timed out after {}ms", timeout.as_millis()))
        })??;
    if urls.is_empty() {
        return Err(BridgeError::GenerationBackend("未能生成图像URL".to_string()));
    }
    Ok(urls)
}
