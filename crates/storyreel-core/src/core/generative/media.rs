//! Reference Media Resolution
//!
//! Turns [`MediaRef`] handles into payloads a dialect can put on the wire.
//! Inline images above the compression threshold are normalized first.
//! Unusable references resolve to `None` and are dropped by callers.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::assets::{compress_async, encode_base64, EncodedImage, MediaSource};
use crate::core::settings::CompressionSettings;
use crate::core::storage::BlobStore;
use crate::core::MediaRef;

/// A reference image ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Base64 payload with its mime type
    Inline { mime_type: String, data: String },
    /// Remote URL, passed through untouched
    Remote(String),
}

impl ImagePayload {
    /// URL form: a `data:` URL for inline payloads
    pub fn to_url(&self) -> String {
        match self {
            ImagePayload::Inline { mime_type, data } => format!("data:{};base64,{}", mime_type, data),
            ImagePayload::Remote(url) => url.clone(),
        }
    }
}

/// Resolves media handles against the blob registry
#[derive(Clone)]
pub struct MediaResolver {
    blobs: Arc<dyn BlobStore>,
    compression: CompressionSettings,
}

impl std::fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResolver")
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl MediaResolver {
    pub fn new(blobs: Arc<dyn BlobStore>, compression: CompressionSettings) -> Self {
        Self { blobs, compression }
    }

    /// Resolves one reference; `None` when it cannot be used
    pub async fn resolve(&self, media: &MediaRef) -> Option<ImagePayload> {
        let (mime_type, bytes) = match MediaSource::parse(media) {
            MediaSource::Remote(url) => return Some(ImagePayload::Remote(url)),
            MediaSource::Inline { mime_type, bytes } => (mime_type, bytes),
            MediaSource::Blob(handle) => match self.blobs.get(&handle).await {
                Ok(Some(blob)) => (blob.mime_type, blob.bytes),
                Ok(None) => {
                    warn!("Reference blob {} not found, skipping", handle);
                    return None;
                }
                Err(e) => {
                    warn!("Failed to read reference blob {}: {}", handle, e);
                    return None;
                }
            },
            MediaSource::Unusable => {
                debug!("Skipping unusable reference");
                return None;
            }
        };

        let image = self.maybe_compress(EncodedImage::new(bytes, mime_type)).await;
        Some(ImagePayload::Inline {
            data: encode_base64(&image.bytes),
            mime_type: image.mime_type,
        })
    }

    /// Resolves references in order, dropping unusable ones
    pub async fn resolve_all<'a>(
        &self,
        media: impl IntoIterator<Item = &'a MediaRef>,
    ) -> Vec<ImagePayload> {
        let mut payloads = Vec::new();
        for item in media {
            if let Some(payload) = self.resolve(item).await {
                payloads.push(payload);
            }
        }
        payloads
    }

    async fn maybe_compress(&self, image: EncodedImage) -> EncodedImage {
        if image.len() <= self.compression.threshold_bytes {
            return image;
        }
        compress_async(image, self.compression.max_edge, self.compression.budget()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::{blob_ref, data_url};
    use crate::core::storage::MemoryBlobStore;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn resolver(threshold_bytes: usize) -> (Arc<dyn BlobStore>, MediaResolver) {
        let blobs = MemoryBlobStore::shared();
        let compression = CompressionSettings {
            threshold_bytes,
            max_edge: 64,
            budget_ms: 10_000,
        };
        (blobs.clone(), MediaResolver::new(blobs, compression))
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_remote_passthrough() {
        let (_, resolver) = resolver(1024);
        let payload = resolver
            .resolve(&"https://cdn/x.png".to_string())
            .await
            .unwrap();
        assert_eq!(payload, ImagePayload::Remote("https://cdn/x.png".into()));
    }

    #[tokio::test]
    async fn test_small_inline_untouched() {
        let (_, resolver) = resolver(1024 * 1024);
        let payload = resolver
            .resolve(&data_url("image/png", &[1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(
            payload,
            ImagePayload::Inline {
                mime_type: "image/png".into(),
                data: encode_base64(&[1, 2, 3]),
            }
        );
    }

    #[tokio::test]
    async fn test_large_blob_compressed() {
        let (blobs, resolver) = resolver(16);
        let handle = blobs.put(png_bytes(256, 128), "image/png").await.unwrap();
        let payload = resolver.resolve(&blob_ref(&handle)).await.unwrap();
        match payload {
            ImagePayload::Inline { mime_type, .. } => assert_eq!(mime_type, "image/jpeg"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unusable_dropped() {
        let (_, resolver) = resolver(1024);
        let refs = vec![
            String::new(),
            "blob:missing".to_string(),
            "https://cdn/ok.png".to_string(),
        ];
        let payloads = resolver.resolve_all(&refs).await;
        assert_eq!(payloads, vec![ImagePayload::Remote("https://cdn/ok.png".into())]);
    }

    #[test]
    fn test_to_url() {
        let inline = ImagePayload::Inline {
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        };
        assert_eq!(inline.to_url(), "data:image/png;base64,AAAA");
    }
}
