//! Media Assets
//!
//! Media handle parsing and reference-image normalization.

pub mod compress;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

pub use compress::{compress, compress_async, compress_within, EncodedImage};

/// Prefix marking a handle into the blob registry
pub const BLOB_PREFIX: &str = "blob:";

/// Parsed form of a [`MediaRef`](crate::core::MediaRef)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Handle into the binary blob registry
    Blob(String),
    /// Inline `data:` URL payload
    Inline { mime_type: String, bytes: Vec<u8> },
    /// Remote http(s) URL, passed through untouched
    Remote(String),
    /// Empty, malformed or unsupported reference
    Unusable,
}

impl MediaSource {
    /// Parses a media handle
    pub fn parse(media: &str) -> Self {
        let media = media.trim();
        if media.is_empty() {
            return MediaSource::Unusable;
        }

        if let Some(handle) = media.strip_prefix(BLOB_PREFIX) {
            return if handle.is_empty() {
                MediaSource::Unusable
            } else {
                MediaSource::Blob(handle.to_string())
            };
        }

        if media.starts_with("data:") {
            return match decode_data_url(media) {
                Some((mime_type, bytes)) if !bytes.is_empty() => {
                    MediaSource::Inline { mime_type, bytes }
                }
                _ => MediaSource::Unusable,
            };
        }

        if media.starts_with("https://") || media.starts_with("http://") {
            return MediaSource::Remote(media.to_string());
        }

        MediaSource::Unusable
    }
}

/// Builds a blob handle reference
pub fn blob_ref(handle: &str) -> String {
    format!("{}{}", BLOB_PREFIX, handle)
}

/// Encodes bytes as a base64 `data:` URL
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Decodes a base64 `data:` URL into `(mime_type, bytes)`
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    let bytes = BASE64.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), bytes))
}

/// Decodes a bare base64 payload
pub fn decode_base64(payload: &str) -> Option<Vec<u8>> {
    BASE64.decode(payload.trim()).ok()
}

/// Encodes bytes as bare base64
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}
