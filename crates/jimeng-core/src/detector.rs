use crate::error::BridgeError;
use crate::image_refs::{detect_uploaded, extract_image_references, infer_aspect_ratio};
use crate::normalize::RequestFields;
use crate::sanitize::sanitize_prompt;
use crate::types::{DetectedImageReference, UploadedFile};

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionInput<'a> {
    pub prompt: &'a str,
    /// Ratio the caller already chose; suppresses inference.
    pub explicit_aspect_ratio: Option<&'a str>,
    pub uploads: &'a [UploadedFile],
}

/// What an image-detection pass attaches to a request before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
    pub references: Vec<DetectedImageReference>,
    pub cleaned_prompt: Option<String>,
    pub file_path: Option<String>,
    pub aspect_ratio: Option<String>,
}

impl DetectionResult {
    pub fn into_fields(self) -> RequestFields {
        RequestFields {
            prompt: self.cleaned_prompt,
            model: None,
            aspect_ratio: self.aspect_ratio,
            file_path: self.file_path,
        }
    }
}

pub trait ImageDetection: Send + Sync {
    fn detect(&self, input: DetectionInput<'_>) -> Result<DetectionResult, BridgeError>;
}

/// In-process detector: pulls image references out of the prompt, scrubs the
/// rest with the sanitizer and guesses a ratio for the primary reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptImageDetector;

impl ImageDetection for PromptImageDetector {
    fn detect(&self, input: DetectionInput<'_>) -> Result<DetectionResult, BridgeError> {
        let (mut references, residual) = extract_image_references(input.prompt);
        references.extend(detect_uploaded(input.uploads));

        let cleaned = sanitize_prompt(&residual);
        let aspect_ratio = match (input.explicit_aspect_ratio, references.first()) {
            (Some(_), _) | (None, None) => None,
            (None, Some(primary)) => infer_aspect_ratio(primary, input.uploads),
        };
        if let Some(primary) = references.first_mut() {
            primary.aspect_ratio = aspect_ratio.clone();
        }
        let file_path = references.first().map(|r| r.path.clone());

        Ok(DetectionResult {
            references,
            cleaned_prompt: (!cleaned.is_empty()).then_some(cleaned),
            file_path,
            aspect_ratio,
        })
    }
}
