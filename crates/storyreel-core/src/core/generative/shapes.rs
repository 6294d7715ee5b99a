//! Response Shape Probing
//!
//! Providers disagree on where they put the interesting value. Each probe
//! walks a fixed list of JSON pointers and returns the first non-empty hit.

use serde_json::Value;

/// Characters of a raw body kept when no error message can be extracted
pub const ERROR_BODY_PREVIEW_CHARS: usize = 500;

const TEXT_POINTERS: &[&str] = &["/output_text", "/text", "/content/0/text"];

const TASK_ID_POINTERS: &[&str] = &["/id", "/task_id", "/taskId", "/data/task_id", "/data/id"];

const STATUS_POINTERS: &[&str] = &["/status", "/task_status", "/data/status", "/state"];

const VIDEO_URL_POINTERS: &[&str] = &[
    "/video_url",
    "/data/video_url",
    "/data/0/url",
    "/output/video_url",
    "/output/0",
    "/result/video_url",
    "/url",
];

const AUDIO_URL_POINTERS: &[&str] = &["/url", "/audio_url", "/data/0/url", "/data/url"];

const AUDIO_BASE64_POINTERS: &[&str] = &["/audio", "/audio_base64", "/data/0/b64_json", "/data/audio"];

const ERROR_POINTERS: &[&str] = &["/error/message", "/error", "/message", "/detail", "/msg", "/data/error"];

/// Image payload found in a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageHit {
    Url(String),
    Base64 { mime_type: String, data: String },
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_str(root: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| root.pointer(pointer).and_then(non_empty_str))
}

/// Native `candidates[0].content.parts[]`
fn candidate_parts(root: &Value) -> &[Value] {
    root.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Extracts generated text
pub fn probe_text(root: &Value) -> Option<String> {
    let native: Vec<&str> = candidate_parts(root)
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if !native.is_empty() {
        let joined = native.concat();
        if !joined.trim().is_empty() {
            return Some(joined);
        }
    }

    if let Some(content) = root.pointer("/choices/0/message/content") {
        if let Some(text) = non_empty_str(content) {
            return Some(text);
        }
        if let Some(blocks) = content.as_array() {
            let joined: String = blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if !joined.trim().is_empty() {
                return Some(joined);
            }
        }
    }

    first_str(root, TEXT_POINTERS)
}

/// Extracts an image URL or base64 payload
pub fn probe_image(root: &Value) -> Option<ImageHit> {
    if let Some(url) = root.pointer("/data/0/url").and_then(non_empty_str) {
        return Some(ImageHit::Url(url));
    }
    if let Some(data) = root.pointer("/data/0/b64_json").and_then(non_empty_str) {
        return Some(ImageHit::Base64 {
            mime_type: "image/png".to_string(),
            data,
        });
    }

    for part in candidate_parts(root) {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let Some(data) = inline.get("data").and_then(non_empty_str) else {
            continue;
        };
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(non_empty_str)
            .unwrap_or_else(|| "image/png".to_string());
        return Some(ImageHit::Base64 { mime_type, data });
    }

    if let Some(url) = root.pointer("/url").and_then(non_empty_str) {
        return Some(ImageHit::Url(url));
    }
    if let Some(image_url) = root.pointer("/image_url") {
        let url = non_empty_str(image_url).or_else(|| image_url.get("url").and_then(non_empty_str));
        if let Some(url) = url {
            return Some(ImageHit::Url(url));
        }
    }
    root.pointer("/output/0")
        .and_then(non_empty_str)
        .map(ImageHit::Url)
}

/// Extracts an audio URL or base64 payload from a JSON speech/sfx response
pub fn probe_audio(root: &Value) -> Option<ImageHit> {
    if let Some(url) = first_str(root, AUDIO_URL_POINTERS) {
        return Some(ImageHit::Url(url));
    }
    first_str(root, AUDIO_BASE64_POINTERS).map(|data| ImageHit::Base64 {
        mime_type: "audio/mpeg".to_string(),
        data,
    })
}

/// Extracts a job id (string or number)
pub fn probe_task_id(root: &Value) -> Option<String> {
    TASK_ID_POINTERS.iter().find_map(|pointer| {
        let value = root.pointer(pointer)?;
        non_empty_str(value).or_else(|| value.as_u64().map(|n| n.to_string()))
    })
}

/// Extracts a job status string
pub fn probe_status(root: &Value) -> Option<String> {
    first_str(root, STATUS_POINTERS)
}

/// Extracts a finished video URL
pub fn probe_video_url(root: &Value) -> Option<String> {
    first_str(root, VIDEO_URL_POINTERS)
}

/// Best human-readable message from an error body
pub fn extract_error_message(body: &str) -> String {
    if let Ok(root) = serde_json::from_str::<Value>(body) {
        if let Some(message) = first_str(&root, ERROR_POINTERS) {
            return message;
        }
    }
    body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect()
}

// =============================================================================
// Tests
// =============================================================================
