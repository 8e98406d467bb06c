use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

pub(crate) const LOBE_SETTINGS_HEADER: &str = "x-lobe-plugin-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenSource {
    LobeSettings,
    Authorization,
    BodySettings,
    Fallback,
}

/// Tries the LobeChat settings header, the bearer header, the body's
/// `settings` object and finally the configured fallback.
pub(crate) fn resolve_token(
    headers: &HeaderMap,
    body: Option<&Value>,
    fallback: Option<&str>,
) -> Option<(String, TokenSource)> {
    if let Some(raw) = headers.get(LOBE_SETTINGS_HEADER) {
        match raw
            .to_str()
            .ok()
            .map(serde_json::from_str::<Value>)
        {
            Some(Ok(settings)) => {
                if let Some(token) = settings_token(&settings) {
                    return Some((token, TokenSource::LobeSettings));
                }
            }
            Some(Err(err)) => warn!("parse {LOBE_SETTINGS_HEADER} failed: {err}"),
            None => warn!("{LOBE_SETTINGS_HEADER} is not valid utf-8"),
        }
    }
    if let Some(token) = bearer_token(headers) {
        return Some((token, TokenSource::Authorization));
    }
    if let Some(token) = body.and_then(|b| b.get("settings")).and_then(settings_token) {
        return Some((token, TokenSource::BodySettings));
    }
    let token = fallback.map(str::trim).filter(|t| !t.is_empty())?;
    debug!("using fallback token");
    Some((token.to_string(), TokenSource::Fallback))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn settings_token(settings: &Value) -> Option<String> {
    ["JIMENG_API_TOKEN", "apiToken"]
        .iter()
        .filter_map(|key| settings.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

pub(crate) fn mask_token(token: &str) -> String {
    token.chars().take(10).collect::<String>() + "..."
}
