//! Turns one inbound call into a [`CanonicalGenerationRequest`].
//!
//! Field precedence, highest first: a pre-attached detection result, fields
//! the caller declared explicitly, fields the extraction pipeline found in
//! the prompt, then the configured defaults.

use tracing::debug;

use crate::config::GenerationConfig;
use crate::detector::DetectionResult;
use crate::dimensions::{self, Dimensions};
use crate::error::BridgeError;
use crate::image_refs::{detect_uploaded, extract_image_references};
use crate::params::parse_prompt;
use crate::patterns::FILLER_PREFIX;
use crate::types::{CanonicalGenerationRequest, UploadedFile};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFields {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub file_path: Option<String>,
}

impl RequestFields {
    /// Blank strings count as absent.
    pub fn new(
        prompt: Option<&str>,
        model: Option<&str>,
        aspect_ratio: Option<&str>,
        file_path: Option<&str>,
    ) -> Self {
        Self {
            prompt: non_empty(prompt),
            model: non_empty(model),
            aspect_ratio: non_empty(aspect_ratio),
            file_path: non_empty(file_path),
        }
    }
}

/// Per-field `detected`, else `explicit`, else `extracted`.
pub fn resolve_fields(
    detected: &RequestFields,
    explicit: &RequestFields,
    extracted: &RequestFields,
) -> RequestFields {
    fn pick(a: &Option<String>, b: &Option<String>, c: &Option<String>) -> Option<String> {
        a.as_ref().or(b.as_ref()).or(c.as_ref()).cloned()
    }
    RequestFields {
        prompt: pick(&detected.prompt, &explicit.prompt, &extracted.prompt),
        model: pick(&detected.model, &explicit.model, &extracted.model),
        aspect_ratio: pick(
            &detected.aspect_ratio,
            &explicit.aspect_ratio,
            &extracted.aspect_ratio,
        ),
        file_path: pick(&detected.file_path, &explicit.file_path, &extracted.file_path),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    /// LobeChat plugin calls, Dify tool calls and direct calls sharing one
    /// endpoint; the prompt goes through the extraction pipeline.
    Compat,
    /// Dify's dedicated endpoint: prompt used verbatim.
    Dify,
    /// Upload-oriented ComfyUI endpoint: prompt used verbatim, square default.
    ComfyUi,
}

impl CallingConvention {
    pub fn extracts_from_prompt(self) -> bool {
        matches!(self, CallingConvention::Compat)
    }

    pub fn default_ratio(self, defaults: &GenerationConfig) -> &str {
        match self {
            CallingConvention::ComfyUi => &defaults.upload_default_ratio,
            CallingConvention::Compat | CallingConvention::Dify => &defaults.default_ratio,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeInput<'a> {
    pub convention: CallingConvention,
    pub prompt: &'a str,
    pub explicit: RequestFields,
    pub detection: Option<DetectionResult>,
    pub uploads: &'a [UploadedFile],
    /// Width/height the caller pinned directly; bypasses the table.
    pub explicit_dimensions: Option<Dimensions>,
}

impl<'a> NormalizeInput<'a> {
    pub fn new(convention: CallingConvention, prompt: &'a str) -> Self {
        Self {
            convention,
            prompt,
            explicit: RequestFields::default(),
            detection: None,
            uploads: &[],
            explicit_dimensions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    defaults: GenerationConfig,
}

impl Normalizer {
    pub fn new(defaults: GenerationConfig) -> Self {
        Self { defaults }
    }

    pub fn normalize(
        &self,
        input: NormalizeInput<'_>,
    ) -> Result<CanonicalGenerationRequest, BridgeError> {
        let extracts = input.convention.extracts_from_prompt();
        let extracted = if extracts {
            let (mut references, residual) = extract_image_references(input.prompt);
            references.extend(detect_uploaded(input.uploads));
            let parsed = parse_prompt(&residual);
            debug!(
                "prompt pipeline: references={} model={:?} ratio={:?}",
                references.len(),
                parsed.model,
                parsed.aspect_ratio
            );
            RequestFields {
                prompt: non_empty(Some(&parsed.cleaned_prompt)),
                model: parsed.model,
                aspect_ratio: parsed.aspect_ratio,
                file_path: references.first().map(|r| r.path.clone()),
            }
        } else {
            RequestFields {
                prompt: non_empty(Some(input.prompt)),
                file_path: detect_uploaded(input.uploads)
                    .into_iter()
                    .next()
                    .map(|r| r.path),
                ..RequestFields::default()
            }
        };
        let detected = input
            .detection
            .map(DetectionResult::into_fields)
            .unwrap_or_default();
        let resolved = resolve_fields(&detected, &input.explicit, &extracted);

        let prompt = match resolved.prompt.as_deref() {
            Some(p) if extracts => strip_filler(p),
            Some(p) => p.trim().to_string(),
            None => String::new(),
        };
        if prompt.is_empty() {
            return Err(BridgeError::EmptyPrompt);
        }

        let model = resolved
            .model
            .unwrap_or_else(|| self.defaults.default_model.clone());
        let ratio = resolved
            .aspect_ratio
            .unwrap_or_else(|| input.convention.default_ratio(&self.defaults).to_string());
        let size = input
            .explicit_dimensions
            .or_else(|| dimensions::lookup(&model, &ratio));

        Ok(CanonicalGenerationRequest {
            prompt,
            model,
            width: size.map(|d| d.width),
            height: size.map(|d| d.height),
            file_path: resolved.file_path,
        })
    }
}

/// Drops one leading filler word, then trims.
pub fn strip_filler(prompt: &str) -> String {
    let trimmed = prompt.trim();
    trimmed
        .strip_prefix(FILLER_PREFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
