#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Plain,
}

impl OutputFormat {
    /// `?format=plain` selects plain output; everything else gets markdown.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("plain") => OutputFormat::Plain,
            _ => OutputFormat::Markdown,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "text/markdown; charset=utf-8",
            OutputFormat::Plain => "text/plain; charset=utf-8",
        }
    }
}

pub fn format_image_results(urls: &[String], prompt: &str, format: OutputFormat) -> String {
    if urls.is_empty() {
        return "未能生成图像".to_string();
    }
    if format == OutputFormat::Plain {
        return urls.join("\n");
    }

    let mut lines = vec![
        "## 🎨 即梦AI生成结果".to_string(),
        format!("**提示词:** {prompt}"),
        format!("**生成数量:** {} 张图片", urls.len()),
        String::new(),
    ];
    for (idx, url) in urls.iter().enumerate() {
        let title = format!("生成图片 {}", idx + 1);
        lines.push(format!("### {title}"));
        lines.push(format!("![{title}]({url})"));
        lines.push(String::new());
    }
    lines.push("---".to_string());
    lines.push("💡 **提示:** 图片链接有时效性，请及时保存所需图片。".to_string());
    lines.join("\n")
}
