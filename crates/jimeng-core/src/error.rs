use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("prompt参数不能为空")]
    EmptyPrompt,
    #[error("arguments参数格式错误: {reason}")]
    MalformedArguments { raw: String, reason: String },
    #[error("请求失败：请在LobeChat插件设置中配置JIMENG_API_TOKEN，或在请求头Authorization字段中提供Bearer Token")]
    MissingCredential,
    #[error("图像生成失败: {0}")]
    GenerationBackend(String),
    /// Raised by image-detection collaborators. Callers log it and carry on
    /// without a detection result.
    #[error("image detection failed: {0}")]
    Detection(String),
}

impl BridgeError {
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::EmptyPrompt => "empty_prompt",
            BridgeError::MalformedArguments { .. } => "malformed_arguments",
            BridgeError::MissingCredential => "missing_credential",
            BridgeError::GenerationBackend(_) => "generation_failed",
            BridgeError::Detection(_) => "detection_failed",
        }
    }

    pub fn malformed(raw: impl Into<String>, reason: impl ToString) -> Self {
        BridgeError::MalformedArguments {
            raw: raw.into(),
            reason: reason.to_string(),
        }
    }
}
