//! Inbound body shapes for each calling convention.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jimeng_core::dimensions::Dimensions;
use jimeng_core::error::BridgeError;
use jimeng_core::normalize::RequestFields;
use jimeng_core::types::UploadedFile;
use serde::Deserialize;
use serde_json::Value;

/// Raw request body: always readable as text, parsed as JSON when possible.
#[derive(Debug, Clone, Default)]
pub(crate) struct InboundBody {
    pub(crate) text: String,
    pub(crate) json: Option<Value>,
    /// The content type named JSON.
    pub(crate) declared_json: bool,
}

/// Text bodies that are not JSON are kept as text. A body that claims to be
/// JSON and is not is rejected.
pub(crate) fn parse_body(bytes: &[u8], content_type: Option<&str>) -> Result<InboundBody, BridgeError> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let declared_json = is_json_content_type(content_type);
    if text.trim().is_empty() {
        return Ok(InboundBody {
            text,
            json: None,
            declared_json,
        });
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => Ok(InboundBody {
            text,
            json: Some(value),
            declared_json,
        }),
        Err(err) if declared_json => Err(BridgeError::malformed(text, err)),
        Err(_) => Ok(InboundBody {
            text,
            json: None,
            declared_json,
        }),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallShape {
    LobeChat,
    Direct,
    Dify,
    RawText,
    Unrecognized,
}

impl CallShape {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CallShape::LobeChat => "lobechat",
            CallShape::Direct => "direct",
            CallShape::Dify => "dify",
            CallShape::RawText => "raw_text",
            CallShape::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompatCall {
    pub(crate) shape: CallShape,
    pub(crate) prompt: String,
    pub(crate) explicit: RequestFields,
}

/// Recognizes a body sent to the shared endpoint. Shapes are tried in order:
/// LobeChat plugin call, direct call, Dify tool call, bare text. A text body
/// that happens to be a JSON object of no known shape is still bare text.
pub(crate) fn parse_compat_call(body: &InboundBody) -> Result<CompatCall, BridgeError> {
    let Some(json @ Value::Object(obj)) = &body.json else {
        return Ok(CompatCall {
            shape: CallShape::RawText,
            prompt: body.text.trim().to_string(),
            explicit: RequestFields::default(),
        });
    };

    let is_lobe = truthy(obj.get("id"))
        && obj.get("apiName").and_then(|v| v.as_str()) == Some("generateImage")
        && truthy(obj.get("arguments"));
    if is_lobe {
        let args = match obj.get("arguments") {
            Some(Value::String(raw)) => decode_arguments(raw)?,
            Some(other) => other.clone(),
            None => Value::Null,
        };
        return Ok(call_from_fields(CallShape::LobeChat, &args));
    }

    if obj
        .get("prompt")
        .and_then(|v| v.as_str())
        .is_some_and(|p| !p.is_empty())
    {
        return Ok(call_from_fields(CallShape::Direct, json));
    }

    if let Some(Value::String(raw)) = obj.get("arguments") {
        let args = decode_arguments(raw)?;
        return Ok(call_from_fields(CallShape::Dify, &args));
    }

    let prompt = if body.declared_json {
        String::new()
    } else {
        body.text.trim().to_string()
    };
    Ok(CompatCall {
        shape: CallShape::Unrecognized,
        prompt,
        explicit: RequestFields::default(),
    })
}

fn decode_arguments(raw: &str) -> Result<Value, BridgeError> {
    serde_json::from_str(raw).map_err(|err| BridgeError::malformed(raw, err))
}

fn call_from_fields(shape: CallShape, fields: &Value) -> CompatCall {
    let field = |key: &str| fields.get(key).and_then(|v| v.as_str());
    CompatCall {
        shape,
        prompt: field("prompt").unwrap_or_default().to_string(),
        explicit: RequestFields::new(None, field("model"), field("aspect_ratio"), field("filePath")),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Body of the dedicated Dify endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DifyRequest {
    #[serde(default)]
    pub(crate) prompt: Option<String>,
    #[serde(default)]
    pub(crate) model: Option<String>,
    #[serde(default)]
    pub(crate) aspect_ratio: Option<String>,
    #[serde(default, rename = "filePath")]
    pub(crate) file_path: Option<String>,
}

impl DifyRequest {
    pub(crate) fn from_body(body: &InboundBody) -> Result<Self, BridgeError> {
        match &body.json {
            Some(value @ Value::Object(_)) => {
                serde_json::from_value(value.clone()).map_err(|err| BridgeError::malformed(&body.text, err))
            }
            _ => Ok(Self::default()),
        }
    }

    pub(crate) fn explicit_fields(&self) -> RequestFields {
        RequestFields::new(
            None,
            self.model.as_deref(),
            self.aspect_ratio.as_deref(),
            self.file_path.as_deref(),
        )
    }
}

/// Fields of the upload-oriented endpoint, from either a multipart form or
/// a JSON body.
#[derive(Debug, Clone, Default)]
pub(crate) struct ComfyForm {
    pub(crate) prompt: String,
    pub(crate) model: Option<String>,
    pub(crate) aspect_ratio: Option<String>,
    pub(crate) width: Option<String>,
    pub(crate) height: Option<String>,
    pub(crate) init_image: Option<String>,
    pub(crate) image: Option<UploadedFile>,
}

impl ComfyForm {
    pub(crate) fn from_json(value: &Value) -> Self {
        let field = |key: &str| scalar_text(value.get(key));
        Self {
            prompt: field("prompt").unwrap_or_default(),
            model: field("model"),
            aspect_ratio: field("aspect_ratio"),
            width: field("width"),
            height: field("height"),
            init_image: field("init_image"),
            image: None,
        }
    }

    /// Applies one text field of a multipart form; unknown names are ignored.
    pub(crate) fn set_text_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "prompt" => {
                self.prompt = value;
                return;
            }
            "model" => &mut self.model,
            "aspect_ratio" => &mut self.aspect_ratio,
            "width" => &mut self.width,
            "height" => &mut self.height,
            "init_image" => &mut self.init_image,
            _ => return,
        };
        *slot = Some(value).filter(|v| !v.trim().is_empty());
    }

    /// Width and height win over the table only when both are positive integers.
    pub(crate) fn explicit_dimensions(&self) -> Option<Dimensions> {
        let parse = |v: &Option<String>| {
            v.as_deref()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
        };
        Some(Dimensions {
            width: parse(&self.width)?,
            height: parse(&self.height)?,
        })
    }

    /// The uploaded file as a data URI, else `init_image` as one.
    pub(crate) fn image_data_uri(&self) -> Option<String> {
        if let Some(image) = self.image.as_ref().filter(|f| !f.content.is_empty()) {
            let mime = image
                .content_type
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or("application/octet-stream");
            return Some(format!("data:{mime};base64,{}", STANDARD.encode(&image.content)));
        }
        let init = self.init_image.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        if init.starts_with("data:") {
            Some(init.to_string())
        } else {
            Some(format!("data:image/png;base64,{init}"))
        }
    }

    pub(crate) fn explicit_fields(&self) -> RequestFields {
        let file_path = self.image_data_uri();
        RequestFields::new(
            None,
            self.model.as_deref(),
            self.aspect_ratio.as_deref(),
            file_path.as_deref(),
        )
    }

    pub(crate) fn uploads(&self) -> Vec<UploadedFile> {
        self.image.iter().cloned().collect()
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(raw: &str, content_type: &str) -> InboundBody {
        parse_body(raw.as_bytes(), Some(content_type)).unwrap()
    }

    #[test]
    fn invalid_json_is_rejected_only_for_json_content_type() {
        let err = parse_body(b"{oops", Some("application/json")).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedArguments { ref raw, .. } if raw == "{oops"));

        let text = body("一只猫 3:4", "text/plain");
        assert!(text.json.is_none());
        assert_eq!(text.text, "一只猫 3:4");
    }

    #[test]
    fn lobechat_arguments_as_string() {
        let raw = json!({
            "id": "call_1",
            "apiName": "generateImage",
            "arguments": "{\"prompt\":\"画一只猫\",\"filePath\":\"https://x.test/a.png\"}"
        })
        .to_string();
        let call = parse_compat_call(&body(&raw, "text/plain")).unwrap();
        assert_eq!(call.shape, CallShape::LobeChat);
        assert_eq!(call.prompt, "画一只猫");
        assert_eq!(call.explicit.file_path.as_deref(), Some("https://x.test/a.png"));
    }

    #[test]
    fn lobechat_arguments_as_object() {
        let raw = json!({
            "id": 7,
            "apiName": "generateImage",
            "arguments": { "prompt": "狗", "model": "jimeng-3.0" }
        })
        .to_string();
        let call = parse_compat_call(&body(&raw, "application/json")).unwrap();
        assert_eq!(call.shape, CallShape::LobeChat);
        assert_eq!(call.explicit.model.as_deref(), Some("jimeng-3.0"));
    }

    #[test]
    fn broken_lobechat_arguments_keep_the_raw_value() {
        let raw = json!({ "id": "x", "apiName": "generateImage", "arguments": "{prompt:" }).to_string();
        let err = parse_compat_call(&body(&raw, "application/json")).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedArguments { ref raw, .. } if raw == "{prompt:"));
    }

    #[test]
    fn direct_call_honors_explicit_fields() {
        let raw = json!({ "prompt": "一只猫", "aspect_ratio": "4:3", "model": "" }).to_string();
        let call = parse_compat_call(&body(&raw, "application/json")).unwrap();
        assert_eq!(call.shape, CallShape::Direct);
        assert_eq!(call.explicit.aspect_ratio.as_deref(), Some("4:3"));
        assert_eq!(call.explicit.model, None);
    }

    #[test]
    fn dify_arguments_string() {
        let raw = json!({ "arguments": "{\"prompt\":\"海边日落\"}" }).to_string();
        let call = parse_compat_call(&body(&raw, "application/json")).unwrap();
        assert_eq!(call.shape, CallShape::Dify);
        assert_eq!(call.prompt, "海边日落");

        let raw = json!({ "arguments": "not json" }).to_string();
        assert!(parse_compat_call(&body(&raw, "application/json")).is_err());
    }

    #[test]
    fn lobechat_shape_wins_over_direct_prompt() {
        let raw = json!({
            "id": "a",
            "apiName": "generateImage",
            "prompt": "outer",
            "arguments": { "prompt": "inner" }
        })
        .to_string();
        let call = parse_compat_call(&body(&raw, "application/json")).unwrap();
        assert_eq!(call.prompt, "inner");
    }

    #[test]
    fn unrecognized_object_has_no_prompt() {
        let call = parse_compat_call(&body(r#"{"foo":1}"#, "application/json")).unwrap();
        assert_eq!(call.shape, CallShape::Unrecognized);
        assert!(call.prompt.is_empty());
    }

    #[test]
    fn unrecognized_text_object_keeps_its_text() {
        let call = parse_compat_call(&body(" {\"foo\":\"一只猫\"} ", "text/plain")).unwrap();
        assert_eq!(call.shape, CallShape::Unrecognized);
        assert_eq!(call.prompt, r#"{"foo":"一只猫"}"#);
    }

    #[test]
    fn raw_text_is_trimmed() {
        let call = parse_compat_call(&body("  生成一只猫 \n", "text/plain")).unwrap();
        assert_eq!(call.shape, CallShape::RawText);
        assert_eq!(call.prompt, "生成一只猫");
    }

    #[test]
    fn dify_request_rejects_wrong_types() {
        let ok = DifyRequest::from_body(&body(r#"{"prompt":"猫","filePath":"a.png"}"#, "application/json"))
            .unwrap();
        assert_eq!(ok.explicit_fields().file_path.as_deref(), Some("a.png"));
        assert!(DifyRequest::from_body(&body(r#"{"prompt":5}"#, "application/json")).is_err());
    }

    #[test]
    fn comfy_dimensions_need_both_sides() {
        let mut form = ComfyForm::from_json(&json!({ "prompt": "猫", "width": 1024, "height": "768" }));
        assert_eq!(
            form.explicit_dimensions(),
            Some(Dimensions {
                width: 1024,
                height: 768
            })
        );
        form.height = Some("0".to_string());
        assert_eq!(form.explicit_dimensions(), None);
        form.height = None;
        assert_eq!(form.explicit_dimensions(), None);
    }

    #[test]
    fn comfy_image_prefers_upload_then_init_image() {
        let mut form = ComfyForm::from_json(&json!({ "prompt": "猫", "init_image": "QUJD" }));
        assert_eq!(form.image_data_uri().as_deref(), Some("data:image/png;base64,QUJD"));

        form.init_image = Some("data:image/jpeg;base64,QUJD".to_string());
        assert_eq!(form.image_data_uri().as_deref(), Some("data:image/jpeg;base64,QUJD"));

        form.image = Some(UploadedFile {
            filename: "ref.png".to_string(),
            content_type: Some("image/png".to_string()),
            content: b"ABC".to_vec(),
        });
        assert_eq!(form.image_data_uri().as_deref(), Some("data:image/png;base64,QUJD"));
        assert_eq!(form.uploads().len(), 1);
    }

    #[test]
    fn comfy_multipart_text_fields() {
        let mut form = ComfyForm::default();
        form.set_text_field("prompt", "猫".to_string());
        form.set_text_field("model", " ".to_string());
        form.set_text_field("aspect_ratio", "3:4".to_string());
        form.set_text_field("seed", "42".to_string());
        assert_eq!(form.prompt, "猫");
        assert_eq!(form.model, None);
        assert_eq!(form.aspect_ratio.as_deref(), Some("3:4"));
    }
}
