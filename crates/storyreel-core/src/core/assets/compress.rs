//! Reference Image Compression
//!
//! Best-effort size normalization applied to reference images before they
//! are submitted to a provider. Never fails: on decode failure or when the
//! time budget runs out the original bytes are returned unchanged.

use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// JPEG quality used for every re-encode
pub const JPEG_QUALITY: u8 = 85;

/// Opaque fill behind transparent pixels
pub const BACKGROUND_FILL: [u8; 3] = [255, 255, 255];

/// Default time budget for one compression
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(3);

/// Encoded image bytes with their mime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Wraps raw bytes, sniffing the mime type from the header
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        Self::new(bytes, mime_type)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
enum Skip {
    Decode(String),
    Encode(String),
    OverBudget(&'static str),
    NothingToDo,
}

/// Compresses with the default time budget.
pub fn compress(image: &EncodedImage, max_edge: u32) -> EncodedImage {
    compress_within(image, max_edge, DEFAULT_BUDGET)
}

/// Downscales so the longer edge is at most `max_edge`, flattens over an
/// opaque background and re-encodes as JPEG at [`JPEG_QUALITY`].
pub fn compress_within(image: &EncodedImage, max_edge: u32, budget: Duration) -> EncodedImage {
    let started = Instant::now();
    match try_compress(image, max_edge, started, budget) {
        Ok(compressed) => {
            debug!(
                "Compressed reference image {} -> {} bytes",
                image.len(),
                compressed.len()
            );
            compressed
        }
        Err(skip) => {
            debug!("Reference image left unchanged: {:?}", skip);
            image.clone()
        }
    }
}

/// Runs [`compress_within`] on the blocking pool, abandoning it once the
/// budget has elapsed.
pub async fn compress_async(image: EncodedImage, max_edge: u32, budget: Duration) -> EncodedImage {
    let fallback = image.clone();
    let task = tokio::task::spawn_blocking(move || compress_within(&image, max_edge, budget));

    match tokio::time::timeout(budget, task).await {
        Ok(Ok(compressed)) => compressed,
        Ok(Err(e)) => {
            debug!("Compression task failed: {}", e);
            fallback
        }
        Err(_) => {
            debug!("Compression exceeded {:?} budget", budget);
            fallback
        }
    }
}

fn try_compress(
    image: &EncodedImage,
    max_edge: u32,
    started: Instant,
    budget: Duration,
) -> Result<EncodedImage, Skip> {
    if max_edge == 0 || image.is_empty() {
        return Err(Skip::NothingToDo);
    }

    let decoded = image::load_from_memory(&image.bytes).map_err(|e| Skip::Decode(e.to_string()))?;
    check_budget(started, budget, "decode")?;

    let resized = fit_within(decoded, max_edge);
    check_budget(started, budget, "resize")?;

    let flattened = flatten(&resized);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&flattened)
        .map_err(|e| Skip::Encode(e.to_string()))?;
    check_budget(started, budget, "encode")?;

    Ok(EncodedImage::new(bytes, "image/jpeg"))
}

fn check_budget(started: Instant, budget: Duration, stage: &'static str) -> Result<(), Skip> {
    if started.elapsed() > budget {
        Err(Skip::OverBudget(stage))
    } else {
        Ok(())
    }
}

/// Downscales preserving aspect ratio; never upscales.
fn fit_within(image: DynamicImage, max_edge: u32) -> DynamicImage {
    if image.width().max(image.height()) <= max_edge {
        return image;
    }
    image.resize(max_edge, max_edge, FilterType::Triangle)
}

/// Alpha-blends every pixel over [`BACKGROUND_FILL`].
fn flatten(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let px = rgba.get_pixel(x, y).0;
        let alpha = px[3] as u32;
        let blend = |channel: u8, fill: u8| -> u8 {
            ((channel as u32 * alpha + fill as u32 * (255 - alpha)) / 255) as u8
        };
        Rgb([
            blend(px[0], BACKGROUND_FILL[0]),
            blend(px[1], BACKGROUND_FILL[1]),
            blend(px[2], BACKGROUND_FILL[2]),
        ])
    })
}

// =============================================================================
// Tests
// =============================================================================
