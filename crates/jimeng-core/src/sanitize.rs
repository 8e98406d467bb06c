use crate::patterns::{EDGE_PUNCTUATION, PUNCTUATION_RUN, SANITIZE_PATTERNS, WHITESPACE_RUN};

/// Strips leftover model/ratio/"refer to the image" phrasing, then collapses
/// comma/period runs into one "，" and whitespace runs into one space.
///
/// Passes repeat until the text stops changing: removing a phrase can join
/// its neighbours into a model name or ratio ("即梦参考图3.1" becomes
/// "即梦3.1"). Every pass only shortens the text or normalizes separators,
/// so the loop ends. Idempotent.
pub fn sanitize_prompt(text: &str) -> String {
    let mut cleaned = sanitize_pass(text);
    loop {
        let next = sanitize_pass(&cleaned);
        if next == cleaned {
            return cleaned;
        }
        cleaned = next;
    }
}

fn sanitize_pass(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in SANITIZE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").trim().to_string();
    }
    let cleaned = PUNCTUATION_RUN.replace_all(&cleaned, "，");
    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, " ");
    EDGE_PUNCTUATION.replace_all(cleaned.trim(), "").into_owned()
}
