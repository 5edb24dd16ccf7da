//! Raster image compression for staged uploads.
//!
//! Implements [`Compressor`] over the `image` crate: decode, shrink to fit
//! the constraint box, re-encode. PNG input stays PNG; everything else
//! becomes JPEG at the requested quality. Output never exceeds the input:
//! when re-encoding does not help, the original bytes pass through
//! unchanged.

use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use updrop_uploads::{CompressError, CompressionConstraints, Compressor, StagedFile};

/// Compressor decoding and re-encoding raster images on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompressor;

impl ImageCompressor {
    pub fn new() -> Self {
        Self
    }
}

impl Compressor for ImageCompressor {
    fn compress(
        &self,
        file: Arc<StagedFile>,
        constraints: CompressionConstraints,
    ) -> Pin<Box<dyn Future<Output = Result<StagedFile, CompressError>> + Send + '_>> {
        Box::pin(async move {
            // Decode and encode are CPU-bound; keep them off the async
            // workers.
            tokio::task::spawn_blocking(move || compress_blocking(&file, constraints))
                .await
                .map_err(|e| CompressError::Join(e.to_string()))?
        })
    }
}

fn compress_blocking(
    file: &StagedFile,
    constraints: CompressionConstraints,
) -> Result<StagedFile, CompressError> {
    let format =
        image::guess_format(&file.data).map_err(|e| CompressError::Decode(e.to_string()))?;
    let img =
        image::load_from_memory(&file.data).map_err(|e| CompressError::Decode(e.to_string()))?;

    let img = fit_within(img, constraints.max_width, constraints.max_height);
    let encoded = encode(&img, format, constraints.quality)?;

    if encoded.len() as u64 >= file.size_bytes() {
        // Transcoding did not help; keep the source bytes.
        debug!(name = %file.name, "compression skipped: output not smaller");
        return Ok(file.clone());
    }

    debug!(
        name = %file.name,
        original = file.data.len(),
        compressed = encoded.len(),
        "compressed image"
    );
    Ok(StagedFile::new(file.name.clone(), encoded))
}

/// Shrinks the image to fit the constraint box, preserving aspect ratio.
/// Never upscales.
fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() <= max_width && img.height() <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: f32,
) -> Result<Vec<u8>, CompressError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => {
            img.write_to(&mut out, ImageFormat::Png)
                .map_err(|e| CompressError::Encode(e.to_string()))?;
        }
        _ => {
            let quality = (quality.clamp(0.0, 1.0) * 100.0).round() as u8;
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
            // JPEG carries no alpha channel.
            encoder
                .encode_image(&img.to_rgb8())
                .map_err(|e| CompressError::Encode(e.to_string()))?;
        }
    }
    Ok(out.into_inner())
}
