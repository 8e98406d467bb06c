//! Read-only recognition tables shared by every request.
//!
//! Ordering is part of the contract: model keywords are tried in
//! [`MODEL_KEYWORDS`] order and the first canonical id with any matching
//! variant wins, regardless of where in the text the variant sits. Image
//! pattern classes run in [`IMAGE_PATTERNS`] order, one full pass each.

use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;

/// Canonical model id to surface spellings, newest first.
pub const MODEL_KEYWORDS: &[(&str, &[&str])] = &[
    ("jimeng-3.1", &["即梦3.1", "jimeng-3.1", "jimeng 3.1"]),
    ("jimeng-3.0", &["即梦3.0", "jimeng-3.0", "jimeng 3.0"]),
    ("jimeng-2.1", &["即梦2.1", "jimeng-2.1", "jimeng 2.1"]),
    (
        "jimeng-2.0-pro",
        &[
            "即梦2.0pro",
            "即梦2.0 pro",
            "jimeng-2.0-pro",
            "jimeng 2.0-pro",
            "jimeng 2.0 pro",
        ],
    ),
    ("jimeng-2.0", &["即梦2.0", "jimeng-2.0", "jimeng 2.0"]),
];

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg"];

/// Leading word dropped once from the final prompt ("用" = "using").
pub const FILLER_PREFIX: &str = "用";

pub struct ModelMatcher {
    pub id: &'static str,
    pub variants: Vec<Regex>,
}

pub static MODEL_MATCHERS: LazyLock<Vec<ModelMatcher>> = LazyLock::new(|| {
    MODEL_KEYWORDS
        .iter()
        .map(|&(id, variants)| ModelMatcher {
            id,
            variants: variants
                .iter()
                .map(|variant| case_insensitive_literal(variant))
                .collect(),
        })
        .collect()
});

/// `<a><sep><b>` with an optional "比例"/"宽高比"/"ratio" word on either side.
pub static RATIO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)(?:(?:宽高比|比例|(?:aspect\s+)?ratio)\s*[:：]?\s*)?([0-9]{1,2})[:：比]([0-9]{1,2})(?:\s*(?:比例|ratio))?",
    )
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePatternClass {
    Url,
    DataUri,
    FilePath,
    Placeholder,
    Markdown,
}

pub struct ImagePattern {
    pub class: ImagePatternClass,
    pub regex: Regex,
    /// Capture group holding the reference path; the whole match when `None`.
    pub path_group: Option<usize>,
}

pub static IMAGE_PATTERNS: LazyLock<Vec<ImagePattern>> = LazyLock::new(|| {
    vec![
        ImagePattern {
            class: ImagePatternClass::Url,
            regex: compile(r"(?i)https?://[^\s)]+\.(?:jpg|jpeg|png|gif|bmp|webp|svg)(?:\?[^\s)]*)?"),
            path_group: None,
        },
        ImagePattern {
            class: ImagePatternClass::DataUri,
            regex: compile(r"(?i)data:image/[^;\s]+;base64,[A-Za-z0-9+/=]+"),
            path_group: None,
        },
        ImagePattern {
            class: ImagePatternClass::FilePath,
            regex: compile(r#"(?i)(?:file://|\./|/)?([^\s()\[\]"']*\.(?:jpg|jpeg|png|gif|bmp|webp|svg))"#),
            path_group: Some(1),
        },
        ImagePattern {
            class: ImagePatternClass::Placeholder,
            regex: PLACEHOLDER_PATTERN.clone(),
            path_group: None,
        },
        ImagePattern {
            class: ImagePatternClass::Markdown,
            regex: compile(r"!\[[^\]]*\]\(([^)]+)\)"),
            path_group: Some(1),
        },
    ]
});

pub static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\[图片\]|\[image\]|\[img\]"));

/// Leftover model, ratio and "refer to the image" phrasing, applied in order.
pub static SANITIZE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    // model mentions; "模型：<name>" goes first so the name is not stripped alone
    let mut patterns = vec![
        compile(r"(?i)(?:模型|model)[：:]\s*[^\s,，。]+"),
        model_keyword_pattern(),
    ];
    patterns.extend(
        [
            r"(?i)即梦[0-9][0-9.]*[pro]*|jimeng[-0-9.]+[pro]*",
            r"使用.*?模型",
            // ratio mentions; the longer 宽高比 form goes before the bare ratio
            r"宽高比[：:]?\s*[0-9]+[：:比][0-9]+",
            r"比例[：:]?\s*[0-9]+[：:比][0-9]+",
            r"(?i)(?:aspect\s+)?ratio[：:]?\s*[0-9]+[：:][0-9]+",
            r"[0-9]+[：:比][0-9]+\s*比例?",
            // image references
            r"参考.*?图片?",
            r"根据.*?图片?",
            r"按照.*?图片?",
            r"基于.*?图片?",
            r"参考提供的",
            r"参考这张",
            r"根据上传的",
            r"(?i)(?:refer(?:ring)?\s+to|based\s+on|according\s+to)\s.*?\b(?:image|picture|photo)s?\b",
        ]
        .iter()
        .map(|p| compile(p)),
    );
    patterns
});

/// Every [`MODEL_KEYWORDS`] spelling in one alternation, longest first so
/// "jimeng 2.0 pro" is not cut short at "jimeng 2.0".
fn model_keyword_pattern() -> Regex {
    let mut variants: Vec<&str> = MODEL_KEYWORDS
        .iter()
        .flat_map(|(_, variants)| variants.iter().copied())
        .collect();
    variants.sort_by_key(|v| Reverse(v.len()));
    let alternation = variants
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    compile(&format!("(?i){alternation}"))
}

pub static PUNCTUATION_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"[，,。]+"));
pub static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));
pub static EDGE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^[，,。\s]+|[，,。\s]+$"));

fn case_insensitive_literal(literal: &str) -> Regex {
    compile(&format!("(?i){}", regex::escape(literal)))
}

// Every pattern above is a literal checked by the tests below.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid builtin pattern {pattern}: {err}"))
}
