//! Source directory scanning and allowlist filtering

use std::path::{Path, PathBuf};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::CandidateOrder;
use crate::error::{Result, LetterboxError};
use crate::processing::formats::{extension_of, is_supported_input_format};

/// A file in the source directory eligible for conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    /// Filename as listed, without directory
    pub filename: String,
    /// Lower-cased extension
    pub extension: String,
}

impl CandidateFile {
    /// Build a candidate if `filename` carries an allowlisted extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = extension_of(filename).filter(|ext| is_supported_input_format(ext))?;

        Some(Self {
            filename: filename.to_string(),
            extension: extension.to_ascii_lowercase(),
        })
    }

    /// Full path of this candidate inside `directory`
    pub fn path_in(&self, directory: &Path) -> PathBuf {
        directory.join(&self.filename)
    }
}

/// List allowlisted image files in `source_directory`, in listing order
///
/// Subdirectories, hidden entries and unrecognized extensions are skipped.
/// An empty result is not an error.
pub async fn scan<P: AsRef<Path>>(source_directory: P) -> Result<Vec<CandidateFile>> {
    let source_directory = source_directory.as_ref();
    let access_error = |source| LetterboxError::DirectoryAccess {
        path: source_directory.to_path_buf(),
        source,
    };

    let metadata = fs::metadata(source_directory).await.map_err(access_error)?;
    if !metadata.is_dir() {
        return Err(access_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut entries = fs::read_dir(source_directory).await.map_err(access_error)?;
    let mut candidates = Vec::new();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return Err(access_error(e)),
        };

        let path = entry.path();
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 filename: {:?}", path);
            continue;
        };

        // Follows symlinks, so a link to an image counts as an image
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping unreadable entry {:?}: {}", path, e);
                continue;
            }
        };

        if !metadata.is_file() || is_hidden(&filename, &metadata) {
            continue;
        }

        match CandidateFile::from_filename(&filename) {
            Some(candidate) => candidates.push(candidate),
            None => debug!("Ignoring unsupported file: {}", filename),
        }
    }

    info!("Found {} candidate images in {:?}", candidates.len(), source_directory);
    Ok(candidates)
}

/// [`scan`], then apply `order`
pub async fn scan_ordered<P: AsRef<Path>>(
    source_directory: P,
    order: CandidateOrder,
) -> Result<Vec<CandidateFile>> {
    let mut candidates = scan(source_directory).await?;
    if order == CandidateOrder::Lexicographic {
        candidates.sort_by(|a, b| a.filename.cmp(&b.filename));
    }
    Ok(candidates)
}

#[cfg(windows)]
fn is_hidden(filename: &str, metadata: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    filename.starts_with('.')
        || metadata.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0
}

#[cfg(not(windows))]
fn is_hidden(filename: &str, _metadata: &std::fs::Metadata) -> bool {
    filename.starts_with('.')
}
