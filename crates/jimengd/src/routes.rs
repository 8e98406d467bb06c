use std::time::Instant;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use jimeng_core::backend::generate_with_timeout;
use jimeng_core::detector::{DetectionInput, DetectionResult};
use jimeng_core::error::BridgeError;
use jimeng_core::normalize::{CallingConvention, NormalizeInput};
use jimeng_core::render::{format_image_results, OutputFormat};
use jimeng_core::types::{CanonicalGenerationRequest, UploadedFile};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::request::{self, CallShape, CompatCall, ComfyForm, DifyRequest};
use crate::token::{bearer_token, mask_token, resolve_token, TokenSource, LOBE_SETTINGS_HEADER};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FormatQuery {
    #[serde(default)]
    format: Option<String>,
}

/// Shared endpoint for LobeChat plugin calls, Dify tool calls and direct calls.
pub(crate) async fn generate_image(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let content_type = header_text(&headers, CONTENT_TYPE);
    info!(
        "[{request_id}] generateImage content_type={:?} body_bytes={}",
        content_type,
        body.len()
    );

    let parsed = request::parse_body(&body, content_type);
    let body_json = parsed.as_ref().ok().and_then(|b| b.json.as_ref());
    let (token, source) = require_token(resolve_token(
        &headers,
        body_json,
        state.fallback_token.as_deref(),
    ))
    .map_err(|err| {
        err.with_debug(json!({
            "hasAuthHeader": headers.contains_key(AUTHORIZATION),
            "hasLobeSettings": headers.contains_key(LOBE_SETTINGS_HEADER),
            "hasBodySettings": body_json.and_then(|b| b.get("settings")).is_some(),
            "contentType": content_type,
        }))
    })?;

    let call = request::parse_compat_call(&parsed?)?;
    info!(
        "[{request_id}] shape={} token={} source={:?}",
        call.shape.as_str(),
        mask_token(&token),
        source
    );
    if call.prompt.trim().is_empty() {
        warn!("[{request_id}] empty prompt");
        return Err(ApiError::from(BridgeError::EmptyPrompt)
            .with_debug(json!({ "shape": call.shape.as_str() })));
    }

    let detection = if is_lobe_flavored(&headers, call.shape) {
        detect_images(&state, request_id, &call)
    } else {
        None
    };
    let canonical = state.normalizer.normalize(NormalizeInput {
        convention: CallingConvention::Compat,
        prompt: &call.prompt,
        explicit: call.explicit.clone(),
        detection,
        uploads: &[],
        explicit_dimensions: None,
    })?;

    let format = OutputFormat::from_query(query.format.as_deref());
    generate_and_render(&state, request_id, &canonical, &token, &call.prompt, format).await
}

/// Dedicated Dify endpoint: bearer token only, prompt used as given.
pub(crate) async fn dify_generate_image(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let token = bearer_token(&headers).ok_or(BridgeError::MissingCredential)?;
    let inbound = request::parse_body(&body, header_text(&headers, CONTENT_TYPE))?;
    let dify = DifyRequest::from_body(&inbound)?;
    let prompt = dify.prompt.clone().unwrap_or_default();
    info!(
        "[{request_id}] dify generateImage token={} prompt_chars={}",
        mask_token(&token),
        prompt.chars().count()
    );

    let mut input = NormalizeInput::new(CallingConvention::Dify, &prompt);
    input.explicit = dify.explicit_fields();
    let canonical = state.normalizer.normalize(input)?;

    let format = OutputFormat::from_query(query.format.as_deref());
    generate_and_render(&state, request_id, &canonical, &token, &prompt, format).await
}

/// Upload-oriented endpoint used by ComfyUI nodes. Always answers plain text.
pub(crate) async fn comfyui_generate_image(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let headers = req.headers().clone();
    let is_multipart = header_text(&headers, CONTENT_TYPE)
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    let (form, body_json) = if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|err| BridgeError::malformed("multipart/form-data", err.body_text()))?;
        (read_multipart(multipart).await?, None)
    } else {
        let bytes = axum::body::to_bytes(req.into_body(), state.upload_limit_bytes)
            .await
            .map_err(|err| BridgeError::malformed("request body", err))?;
        let inbound = request::parse_body(&bytes, header_text(&headers, CONTENT_TYPE))?;
        let form = inbound.json.as_ref().map(ComfyForm::from_json).unwrap_or_default();
        (form, inbound.json)
    };
    info!(
        "[{request_id}] comfyui generateImage multipart={} upload={} init_image={}",
        is_multipart,
        form.image.as_ref().map(|f| f.filename.as_str()).unwrap_or("-"),
        form.init_image.is_some()
    );

    let (token, source) = require_token(resolve_token(
        &headers,
        body_json.as_ref(),
        state.fallback_token.as_deref(),
    ))?;
    debug!("[{request_id}] token={} source={:?}", mask_token(&token), source);
    if form.prompt.trim().is_empty() {
        return Err(BridgeError::EmptyPrompt.into());
    }

    let uploads = form.uploads();
    let canonical = state.normalizer.normalize(NormalizeInput {
        convention: CallingConvention::ComfyUi,
        prompt: &form.prompt,
        explicit: form.explicit_fields(),
        detection: None,
        uploads: &uploads,
        explicit_dimensions: form.explicit_dimensions(),
    })?;

    generate_and_render(
        &state,
        request_id,
        &canonical,
        &token,
        &form.prompt,
        OutputFormat::Plain,
    )
    .await
}

pub(crate) async fn manifest(State(state): State<AppState>) -> Response {
    serve_manifest(&state, "manifest.json").await
}

pub(crate) async fn manifest_lobechat(State(state): State<AppState>) -> Response {
    serve_manifest(&state, "manifest-lobechat.json").await
}

async fn serve_manifest(state: &AppState, name: &str) -> Response {
    let path = state.manifest_dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(CONTENT_TYPE, "application/json")], bytes).into_response(),
        Err(err) => {
            warn!("read manifest failed: path={} err={err}", path.display());
            (StatusCode::NOT_FOUND, format!("找不到 {name} 文件")).into_response()
        }
    }
}

async fn generate_and_render(
    state: &AppState,
    request_id: Uuid,
    request: &CanonicalGenerationRequest,
    token: &str,
    display_prompt: &str,
    format: OutputFormat,
) -> Result<Response, ApiError> {
    info!(
        "[{request_id}] generating model={} size={:?}x{:?} with_image={}",
        request.model,
        request.width,
        request.height,
        request.file_path.is_some()
    );
    let started = Instant::now();
    let urls = generate_with_timeout(state.backend.as_ref(), request, token, state.backend_timeout)
        .await
        .map_err(|err| {
            error!("[{request_id}] generation failed: {err}");
            err
        })?;
    info!(
        "[{request_id}] generated images={} elapsed_ms={}",
        urls.len(),
        started.elapsed().as_millis()
    );

    let body = format_image_results(&urls, display_prompt, format);
    Ok(([(CONTENT_TYPE, format.content_type())], body).into_response())
}

fn detect_images(state: &AppState, request_id: Uuid, call: &CompatCall) -> Option<DetectionResult> {
    let input = DetectionInput {
        prompt: &call.prompt,
        explicit_aspect_ratio: call.explicit.aspect_ratio.as_deref(),
        uploads: &[],
    };
    match state.detector.detect(input) {
        Ok(result) => {
            debug!(
                "[{request_id}] detected images={} ratio={:?}",
                result.references.len(),
                result.aspect_ratio
            );
            Some(result)
        }
        Err(err) => {
            warn!("[{request_id}] image detection skipped: {err}");
            None
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ComfyForm, BridgeError> {
    let mut form = ComfyForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or("image").to_string();
            let content_type = field.content_type().map(str::to_string);
            let content = field.bytes().await.map_err(multipart_error)?;
            form.image = Some(UploadedFile {
                filename,
                content_type,
                content: content.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.set_text_field(&name, value);
        }
    }
    Ok(form)
}

fn multipart_error(err: MultipartError) -> BridgeError {
    BridgeError::malformed("multipart/form-data", err.body_text())
}

fn require_token(found: Option<(String, TokenSource)>) -> Result<(String, TokenSource), ApiError> {
    found.ok_or_else(|| ApiError::from(BridgeError::MissingCredential))
}

fn is_lobe_flavored(headers: &HeaderMap, shape: CallShape) -> bool {
    shape == CallShape::LobeChat
        || headers.contains_key(LOBE_SETTINGS_HEADER)
        || header_text(headers, USER_AGENT).is_some_and(|ua| ua.contains("node"))
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
