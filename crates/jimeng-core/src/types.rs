use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Base64,
    Url,
    Placeholder,
    File,
    Uploaded,
}

/// One image reference found in a prompt or attached as an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedImageReference {
    /// Exact substring matched in the source text (or the upload's file name).
    pub original: String,
    pub path: String,
    pub kind: ImageKind,
    #[serde(rename = "aspectRatio", default)]
    pub aspect_ratio: Option<String>,
}

impl DetectedImageReference {
    pub fn new(original: impl Into<String>, path: impl Into<String>, kind: ImageKind) -> Self {
        Self {
            original: original.into(),
            path: path.into(),
            kind,
            aspect_ratio: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPromptResult {
    pub model: Option<String>,
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: Option<String>,
    #[serde(rename = "cleanedPrompt")]
    pub cleaned_prompt: String,
}

/// The parameter set handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGenerationRequest {
    pub prompt: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// A file attached to the request outside the prompt text (multipart upload).
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}
