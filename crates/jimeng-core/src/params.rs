use crate::patterns::{MODEL_MATCHERS, RATIO_PATTERN};
use crate::sanitize::sanitize_prompt;
use crate::types::ParsedPromptResult;

/// Finds the first canonical model (in table order) with any variant present
/// and removes every occurrence of that variant.
pub fn extract_model(text: &str) -> (Option<&'static str>, String) {
    for matcher in MODEL_MATCHERS.iter() {
        for variant in &matcher.variants {
            if variant.is_match(text) {
                let cleaned = variant.replace_all(text, "").trim().to_string();
                return (Some(matcher.id), cleaned);
            }
        }
    }
    (None, text.trim().to_string())
}

/// First ratio-like span only; digits are passed through as written.
pub fn extract_aspect_ratio(text: &str) -> (Option<String>, String) {
    let Some(caps) = RATIO_PATTERN.captures(text) else {
        return (None, text.trim().to_string());
    };
    let (Some(whole), Some(a), Some(b)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return (None, text.trim().to_string());
    };
    let mut cleaned = String::with_capacity(text.len());
    cleaned.push_str(&text[..whole.start()]);
    cleaned.push_str(&text[whole.end()..]);
    (
        Some(format!("{}:{}", a.as_str(), b.as_str())),
        cleaned.trim().to_string(),
    )
}

/// Model, then ratio, then the sanitizer.
pub fn parse_prompt(text: &str) -> ParsedPromptResult {
    let (model, after_model) = extract_model(text);
    let (aspect_ratio, after_ratio) = extract_aspect_ratio(&after_model);
    ParsedPromptResult {
        model: model.map(str::to_string),
        aspect_ratio,
        cleaned_prompt: sanitize_prompt(&after_ratio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::MODEL_KEYWORDS;

    #[test]
    fn model_ratio_and_filler_text() {
        let parsed = parse_prompt("即梦3.1 生成 比例16:9 猫");
        assert_eq!(parsed.model.as_deref(), Some("jimeng-3.1"));
        assert_eq!(parsed.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(parsed.cleaned_prompt, "生成 猫");
    }

    #[test]
    fn every_keyword_variant_maps_to_its_model() {
        for (id, variants) in MODEL_KEYWORDS {
            for variant in *variants {
                let text = format!("画一只猫 {variant} 水彩");
                let (model, cleaned) = extract_model(&text);
                assert_eq!(model, Some(*id), "variant {variant}");
                assert_eq!(cleaned, "画一只猫  水彩", "variant {variant}");
            }
        }
    }

    #[test]
    fn model_match_is_case_insensitive() {
        let (model, cleaned) = extract_model("JIMENG-3.0 a cat");
        assert_eq!(model, Some("jimeng-3.0"));
        assert_eq!(cleaned, "a cat");
    }

    #[test]
    fn table_order_beats_text_position() {
        // 2.0 appears first in the text but 3.0 comes first in the table
        let (model, cleaned) = extract_model("jimeng-2.0 vs jimeng-3.0");
        assert_eq!(model, Some("jimeng-3.0"));
        assert_eq!(cleaned, "jimeng-2.0 vs");
    }

    #[test]
    fn no_model_leaves_text_trimmed() {
        let (model, cleaned) = extract_model("  jimeng 一只狗 ");
        assert_eq!(model, None);
        assert_eq!(cleaned, "jimeng 一只狗");
    }

    #[test]
    fn only_the_first_ratio_is_taken() {
        let (ratio, cleaned) = extract_aspect_ratio("海报 4:3 或者 16:9");
        assert_eq!(ratio.as_deref(), Some("4:3"));
        assert_eq!(cleaned, "海报  或者 16:9");
    }

    #[test]
    fn ratio_separators_and_words() {
        assert_eq!(extract_aspect_ratio("9：16 竖图").0.as_deref(), Some("9:16"));
        assert_eq!(extract_aspect_ratio("3比2").0.as_deref(), Some("3:2"));
        assert_eq!(extract_aspect_ratio("雪山 21:9比例").1, "雪山");
        assert_eq!(extract_aspect_ratio("比例：1:1 头像").1, "头像");
        assert_eq!(extract_aspect_ratio("ratio 2:3 portrait").1, "portrait");
    }

    #[test]
    fn ratio_digits_pass_through_verbatim() {
        let (ratio, _) = extract_aspect_ratio("09:16");
        assert_eq!(ratio.as_deref(), Some("09:16"));
    }

    #[test]
    fn no_ratio_is_not_an_error() {
        let (ratio, cleaned) = extract_aspect_ratio(" 一只猫 ");
        assert_eq!(ratio, None);
        assert_eq!(cleaned, "一只猫");
    }

    #[test]
    fn parsing_the_cleaned_prompt_finds_nothing_new() {
        for input in [
            "即梦3.1 生成 比例16:9 猫",
            "jimeng 2.0 pro，宽高比 3:4，一只猫。。",
            "用jimeng-2.1 画 4比3 的山水",
            "a fox in snow",
            "即梦参考图3.1 猫",
            "16参考图:9 猫",
        ] {
            let first = parse_prompt(input);
            let second = parse_prompt(&first.cleaned_prompt);
            assert_eq!(second.model, None, "input: {input}");
            assert_eq!(second.aspect_ratio, None, "input: {input}");
            assert_eq!(second.cleaned_prompt, first.cleaned_prompt, "input: {input}");
        }
    }
}
