//! Input format allowlist and detection

use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{Result, LetterboxError};

/// Extension of every converted file
pub const OUTPUT_EXTENSION: &str = "png";

/// Input formats accepted by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
    Gif,
    Tiff,
}

impl ImageFormat {
    /// Map a lower- or mixed-case extension to a supported format
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            "gif" => Some(Self::Gif),
            "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Every accepted input format
    pub fn all() -> [Self; 5] {
        [Self::Png, Self::Jpeg, Self::Bmp, Self::Gif, Self::Tiff]
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Supported input extensions, lower-case
pub fn supported_input_formats() -> &'static [&'static str] {
    &["png", "jpg", "jpeg", "bmp", "gif", "tiff"]
}

/// Check if a file extension is supported for input
pub fn is_supported_input_format(extension: &str) -> bool {
    supported_input_formats()
        .iter()
        .any(|&fmt| fmt.eq_ignore_ascii_case(extension))
}

/// Suffix after the final `.`, if any
pub fn extension_of(filename: &str) -> Option<&str> {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 && dot_pos + 1 < filename.len() => {
            Some(&filename[dot_pos + 1..])
        }
        _ => None,
    }
}

/// Detect image format from file extension
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<ImageFormat> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    ImageFormat::from_extension(extension)
        .ok_or_else(|| LetterboxError::decode(
            format!("unsupported extension '{}'", extension),
            Some(path.to_path_buf()),
        ))
}
