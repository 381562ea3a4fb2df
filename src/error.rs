//! Error types and handling for Letterbox

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Letterbox operations
pub type Result<T> = std::result::Result<T, LetterboxError>;

/// Main error type for Letterbox operations
#[derive(Debug, Error)]
pub enum LetterboxError {
    /// Source directory missing, not a directory, or unreadable
    #[error("Cannot read source directory {path:?}: {source}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination directory could not be created
    #[error("Cannot create destination directory {path:?}: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O errors while reading an input or writing an output
    #[error("I/O error: {source} (file: {file:?})")]
    Io {
        #[source]
        source: std::io::Error,
        file: Option<PathBuf>,
    },

    /// Image content could not be decoded or encoded
    #[error("Image decode error: {message} (file: {file:?})")]
    Decode {
        message: String,
        file: Option<PathBuf>,
    },

    /// Decoder limits or file size limits exceeded
    #[error("Resource limit exceeded: {message} (file: {file:?})")]
    ResourceExhausted {
        message: String,
        file: Option<PathBuf>,
    },

    /// Output name already written in this batch
    #[error("Output {output:?} was already produced in this batch (file: {file:?})")]
    OutputConflict {
        output: PathBuf,
        file: Option<PathBuf>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// Worker or runtime failures
    #[error("System error: {message}")]
    SystemError { message: String },
}

/// Classification of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The file content could not be decoded
    Decode,
    /// Reading the input or writing the output failed
    Io,
    /// The file or its decoded pixels exceed configured limits
    ResourceExhausted,
    /// Another input in the same batch already claimed the output name
    Conflict,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Io => "io",
            Self::ResourceExhausted => "resource exhausted",
            Self::Conflict => "conflict",
        };
        f.write_str(name)
    }
}

impl LetterboxError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::Decode {
            message: message.into(),
            file,
        }
    }

    /// Create a new resource exhaustion error
    pub fn resource_exhausted<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
            file,
        }
    }

    /// Create a new output conflict error
    pub fn output_conflict(output: PathBuf, file: Option<PathBuf>) -> Self {
        Self::OutputConflict { output, file }
    }

    /// Create a new system error
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::SystemError {
            message: message.into(),
        }
    }

    /// Per-file failure classification, `None` for batch-fatal errors
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Io { .. } => Some(FailureKind::Io),
            Self::Decode { .. } => Some(FailureKind::Decode),
            Self::ResourceExhausted { .. } => Some(FailureKind::ResourceExhausted),
            Self::OutputConflict { .. } => Some(FailureKind::Conflict),
            Self::DirectoryAccess { .. }
            | Self::DestinationUnavailable { .. }
            | Self::ConfigError { .. }
            | Self::SerdeError(_)
            | Self::SystemError { .. } => None,
        }
    }

    /// Check if this error is recoverable (the batch can continue)
    pub fn is_recoverable(&self) -> bool {
        self.failure_kind().is_some()
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { file, .. }
            | Self::Decode { file, .. }
            | Self::ResourceExhausted { file, .. }
            | Self::OutputConflict { file, .. } => file.as_ref(),

            Self::DirectoryAccess { path, .. } | Self::DestinationUnavailable { path, .. } => {
                Some(path)
            }

            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::DirectoryAccess { path, source } => {
                format!("The source folder {} could not be read: {}", path.display(), source)
            }
            Self::DestinationUnavailable { path, source } => {
                format!(
                    "The destination folder {} could not be created: {}",
                    path.display(),
                    source
                )
            }
            Self::Io { source, .. } => format!("File system error: {}", source),
            Self::Decode { message, .. } => {
                format!("Not a readable image ({}). Supported: PNG, JPEG, BMP, GIF, TIFF", message)
            }
            Self::ResourceExhausted { message, .. } => {
                format!("Image is too large to convert: {}", message)
            }
            Self::OutputConflict { output, .. } => {
                format!("Another image in this batch was already saved as {}", output.display())
            }
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for LetterboxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            file: None,
        }
    }
}

// Limits and I/O failures keep their own tier; everything else is undecodable content
impl From<image::ImageError> for LetterboxError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(source) => Self::Io { source, file: None },
            image::ImageError::Limits(limits) => Self::resource_exhausted(limits.to_string(), None),
            other => Self::decode(other.to_string(), None),
        }
    }
}

impl From<toml::de::Error> for LetterboxError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for LetterboxError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

/// Error context extension for adding file path information
pub trait ErrorContext<T> {
    /// Add file context to an error
    fn with_file_context(self, file: PathBuf) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<LetterboxError>,
{
    fn with_file_context(self, file: PathBuf) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();

            match &mut error {
                LetterboxError::Io { file: ref mut f, .. }
                | LetterboxError::Decode { file: ref mut f, .. }
                | LetterboxError::ResourceExhausted { file: ref mut f, .. }
                | LetterboxError::OutputConflict { file: ref mut f, .. } => {
                    if f.is_none() {
                        *f = Some(file);
                    }
                }
                _ => {}
            }

            error
        })
    }
}
