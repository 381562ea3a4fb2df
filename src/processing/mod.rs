//! Per-file conversion: load, fit, composite, export

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ConversionConfig;
use crate::error::{Result, LetterboxError, ErrorContext};

pub mod canvas;
pub mod formats;
pub mod resize;

pub use canvas::*;
pub use formats::*;
pub use resize::*;

/// Converts single images onto the fixed canvas
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    max_file_size: u64,
    max_decode_bytes: u64,
}

impl ConversionEngine {
    /// Create an engine with default limits
    pub fn new() -> Self {
        Self::with_config(&ConversionConfig::default())
    }

    /// Create an engine with the limits from `config`
    pub fn with_config(config: &ConversionConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_decode_bytes: config.max_decode_bytes,
        }
    }

    /// Convert `input_path` and write the PNG canvas to `output_path`
    ///
    /// Decoding, resampling and encoding run on the blocking pool; the
    /// returned future completes only once the output is on disk.
    pub async fn convert_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
    ) -> Result<ConvertedImage> {
        let engine = self.clone();
        let input_path = input_path.as_ref().to_path_buf();
        let output_path = output_path.as_ref().to_path_buf();
        let context = input_path.clone();

        tokio::task::spawn_blocking(move || engine.convert_file_blocking(&input_path, &output_path))
            .await
            .map_err(|e| {
                let message = if e.is_panic() {
                    "decoder panicked".to_string()
                } else {
                    format!("conversion task failed: {}", e)
                };
                LetterboxError::decode(message, Some(context))
            })?
    }

    /// Synchronous form of [`ConversionEngine::convert_file`]
    pub fn convert_file_blocking(&self, input_path: &Path, output_path: &Path) -> Result<ConvertedImage> {
        debug!("Converting file: {:?} -> {:?}", input_path, output_path);

        let image = self.load_image(input_path)?;
        let (original_width, original_height) = (image.width(), image.height());

        let resized = fit_within(&image, FIT_BOX_WIDTH, FIT_BOX_HEIGHT);
        let placed = (resized.width(), resized.height());
        let canvas = compose_on_canvas(&resized);

        let output_size = save_png(&canvas, output_path)?;

        Ok(ConvertedImage {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            original_width,
            original_height,
            placed_width: placed.0,
            placed_height: placed.1,
            output_size,
        })
    }

    /// Decode an image, sniffing the format from content first
    fn load_image(&self, path: &Path) -> Result<image::DynamicImage> {
        debug!("Loading image: {:?}", path);

        let file_size = std::fs::metadata(path)
            .with_file_context(path.to_path_buf())?
            .len();

        if file_size > self.max_file_size {
            return Err(LetterboxError::resource_exhausted(
                format!("file is {} bytes, limit is {} bytes", file_size, self.max_file_size),
                Some(path.to_path_buf()),
            ));
        }

        let mut reader = image::io::Reader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .with_file_context(path.to_path_buf())?;

        // Content sniffing found nothing; trust the extension
        if reader.format().is_none() {
            if let Ok(format) = detect_format_from_path(path) {
                reader.set_format(format.into());
            }
        }

        let mut limits = image::io::Limits::default();
        limits.max_alloc = Some(self.max_decode_bytes);
        reader.limits(limits);

        // Truncated content surfaces as an I/O error from most decoders
        let image = reader
            .decode()
            .map_err(|e| match e {
                image::ImageError::IoError(source)
                    if matches!(
                        source.kind(),
                        std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
                    ) =>
                {
                    LetterboxError::decode(format!("truncated or malformed data: {}", source), None)
                }
                other => other.into(),
            })
            .with_file_context(path.to_path_buf())?;

        debug!("Loaded image: {}x{} ({} bytes)", image.width(), image.height(), file_size);

        Ok(image)
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode `canvas` as PNG at `output_path`, overwriting, and return the written size
fn save_png(canvas: &image::RgbImage, output_path: &Path) -> Result<u64> {
    debug!("Saving image: {:?}", output_path);

    canvas
        .save_with_format(output_path, image::ImageFormat::Png)
        .map_err(|e| match e {
            image::ImageError::IoError(source) => LetterboxError::Io {
                source,
                file: Some(output_path.to_path_buf()),
            },
            other => LetterboxError::Io {
                source: std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
                file: Some(output_path.to_path_buf()),
            },
        })?;

    let metadata = std::fs::metadata(output_path)
        .with_file_context(output_path.to_path_buf())?;

    Ok(metadata.len())
}

/// Outcome of a successful single-file conversion
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub original_width: u32,
    pub original_height: u32,
    pub placed_width: u32,
    pub placed_height: u32,
    pub output_size: u64,
}
