use std::cmp::Reverse;
use std::path::Path;

use crate::patterns::{ImagePatternClass, IMAGE_EXTENSIONS, IMAGE_PATTERNS, PLACEHOLDER_PATTERN};
use crate::types::{DetectedImageReference, ImageKind, UploadedFile};

/// Scans `text` with every image pattern class and returns the references in
/// discovery order (all URL matches, then data URIs, file paths, placeholders,
/// markdown images) together with the text left after removing them.
///
/// Matches from different classes may overlap, e.g. a markdown image wrapping
/// a local path yields both a `file` and a markdown reference.
pub fn extract_image_references(text: &str) -> (Vec<DetectedImageReference>, String) {
    let mut references = Vec::new();
    for pattern in IMAGE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let original = whole.as_str();
            // Remote URLs are not bare file paths; the URL pass already has them.
            if pattern.class == ImagePatternClass::FilePath && has_remote_scheme(original) {
                continue;
            }
            let path = pattern
                .path_group
                .and_then(|group| caps.get(group))
                .map(|m| m.as_str())
                .unwrap_or(original);
            references.push(DetectedImageReference::new(
                original,
                path,
                classify(original),
            ));
        }
    }
    let residual = remove_originals(text, &references);
    (references, residual)
}

pub fn classify(original: &str) -> ImageKind {
    let lower = original.to_ascii_lowercase();
    if lower.starts_with("data:image") {
        ImageKind::Base64
    } else if lower.starts_with("http") {
        ImageKind::Url
    } else if is_placeholder(original) {
        ImageKind::Placeholder
    } else {
        ImageKind::File
    }
}

/// File names with an allow-listed image extension, case-insensitive.
pub fn is_image_filename(name: &str) -> bool {
    let Some(ext) = Path::new(name).extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let dotted = format!(".{}", ext.to_ascii_lowercase());
    IMAGE_EXTENSIONS.contains(&dotted.as_str())
}

pub fn detect_uploaded(files: &[UploadedFile]) -> Vec<DetectedImageReference> {
    files
        .iter()
        .filter(|f| is_image_filename(&f.filename))
        .map(|f| DetectedImageReference::new(&f.filename, &f.filename, ImageKind::Uploaded))
        .collect()
}

/// Placeholder ratio guess; no image bytes are read.
pub fn infer_aspect_ratio(
    reference: &DetectedImageReference,
    uploads: &[UploadedFile],
) -> Option<String> {
    match reference.kind {
        ImageKind::Url if reference.path.starts_with("http") => Some("16:9".to_string()),
        ImageKind::Uploaded => uploads
            .iter()
            .any(|f| f.filename == reference.original && !f.content.is_empty())
            .then(|| "1:1".to_string()),
        _ => None,
    }
}

fn is_placeholder(original: &str) -> bool {
    PLACEHOLDER_PATTERN
        .find(original)
        .is_some_and(|m| m.start() == 0 && m.end() == original.len())
}

fn has_remote_scheme(original: &str) -> bool {
    let lower = original.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// Longest originals go first so a markdown image is removed whole before the
// URL or path inside it.
fn remove_originals(text: &str, references: &[DetectedImageReference]) -> String {
    let mut originals: Vec<&str> = references.iter().map(|r| r.original.as_str()).collect();
    originals.sort_by_key(|o| Reverse(o.len()));

    let mut working = text.trim().to_string();
    for original in originals {
        if let Some(idx) = working.find(original) {
            working.replace_range(idx..idx + original.len(), "");
            working = working.trim().to_string();
        }
    }
    working
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_reference_is_extracted_once() {
        let (refs, residual) = extract_image_references("参考这张图片 https://x.test/a.png 画一只猫");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ImageKind::Url);
        assert_eq!(refs[0].path, "https://x.test/a.png");
        assert_eq!(refs[0].original, "https://x.test/a.png");
        assert_eq!(refs[0].aspect_ratio, None);
        assert!(!residual.contains("https://"));
        assert!(residual.starts_with("参考这张图片"));
        assert!(residual.ends_with("画一只猫"));
    }

    #[test]
    fn url_query_string_is_kept() {
        let (refs, residual) = extract_image_references("https://cdn.test/p/cat.JPG?sig=abc&w=2 换成水彩");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, "https://cdn.test/p/cat.JPG?sig=abc&w=2");
        assert_eq!(residual, "换成水彩");
    }

    #[test]
    fn data_uri_is_base64_kind() {
        let (refs, residual) = extract_image_references("data:image/png;base64,iVBORw0KGgo= 变成夜景");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ImageKind::Base64);
        assert_eq!(refs[0].path, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(residual, "变成夜景");
    }

    #[test]
    fn local_paths_capture_inner_group() {
        let (refs, residual) = extract_image_references("把 file:///tmp/cat.webp 改成油画");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ImageKind::File);
        assert_eq!(refs[0].original, "file:///tmp/cat.webp");
        assert_eq!(refs[0].path, "/tmp/cat.webp");
        assert_eq!(residual, "把  改成油画");
    }

    #[test]
    fn placeholders_in_both_languages() {
        let (refs, residual) = extract_image_references("[图片] 和 [IMG] 合成一张");
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.kind == ImageKind::Placeholder));
        assert_eq!(refs[0].path, "[图片]");
        assert_eq!(refs[1].path, "[IMG]");
        assert_eq!(residual, "和  合成一张");
    }

    #[test]
    fn markdown_target_becomes_path_and_overlap_is_kept() {
        let (refs, residual) = extract_image_references("![猫](./cat.png) 加一顶帽子");
        assert_eq!(refs.len(), 2);
        // file pass runs before the markdown pass
        assert_eq!(refs[0].original, "./cat.png");
        assert_eq!(refs[0].path, "cat.png");
        assert_eq!(refs[1].original, "![猫](./cat.png)");
        assert_eq!(refs[1].path, "./cat.png");
        assert_eq!(residual, "加一顶帽子");
    }

    #[test]
    fn markdown_wrapping_url_is_removed_whole() {
        let (refs, residual) = extract_image_references("![ref](https://x.test/b.jpeg) 同样风格");
        assert_eq!(refs[0].kind, ImageKind::Url);
        assert_eq!(refs[0].path, "https://x.test/b.jpeg");
        assert_eq!(refs.last().map(|r| r.path.as_str()), Some("https://x.test/b.jpeg"));
        assert_eq!(residual, "同样风格");
    }

    #[test]
    fn discovery_order_follows_pass_order_not_text_order() {
        let (refs, _) =
            extract_image_references("data:image/jpeg;base64,AAAA 然后 https://x.test/late.png");
        assert_eq!(refs[0].kind, ImageKind::Url);
        assert_eq!(refs[1].kind, ImageKind::Base64);
    }

    #[test]
    fn plain_text_has_no_references() {
        let (refs, residual) = extract_image_references("  一只橘猫在窗台上  ");
        assert!(refs.is_empty());
        assert_eq!(residual, "一只橘猫在窗台上");
    }

    #[test]
    fn upload_allow_list_is_case_insensitive() {
        assert!(is_image_filename("photo.JPEG"));
        assert!(is_image_filename("icon.svg"));
        assert!(!is_image_filename("notes.txt"));
        assert!(!is_image_filename("png"));

        let files = vec![
            UploadedFile {
                filename: "a.PNG".to_string(),
                content_type: Some("image/png".to_string()),
                content: vec![1, 2, 3],
            },
            UploadedFile {
                filename: "b.pdf".to_string(),
                ..Default::default()
            },
        ];
        let refs = detect_uploaded(&files);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, ImageKind::Uploaded);
        assert_eq!(refs[0].original, "a.PNG");
        assert_eq!(infer_aspect_ratio(&refs[0], &files).as_deref(), Some("1:1"));
    }

    #[test]
    fn ratio_inference_stub() {
        let url = DetectedImageReference::new("https://x/a.png", "https://x/a.png", ImageKind::Url);
        assert_eq!(infer_aspect_ratio(&url, &[]).as_deref(), Some("16:9"));
        let file = DetectedImageReference::new("./a.png", "a.png", ImageKind::File);
        assert_eq!(infer_aspect_ratio(&file, &[]), None);
        let empty_upload = DetectedImageReference::new("x.png", "x.png", ImageKind::Uploaded);
        let files = vec![UploadedFile {
            filename: "x.png".to_string(),
            ..Default::default()
        }];
        assert_eq!(infer_aspect_ratio(&empty_upload, &files), None);
    }
}
