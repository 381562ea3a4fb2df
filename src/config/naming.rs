//! Output naming and collision handling

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::error::{Result, LetterboxError};
use crate::processing::formats::OUTPUT_EXTENSION;

/// Order in which scanned candidates are handed to the converter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrder {
    /// Whatever order the platform's directory listing yields
    #[default]
    Listing,
    /// Sorted by filename, byte-wise
    Lexicographic,
}

/// What to do when two inputs map to the same output filename
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Overwrite silently; the last successful write wins
    #[default]
    LastWins,
    /// Fail the later input with a conflict
    Error,
    /// Write the later input as `<stem>-<n>.png`
    Rename,
}

/// Strip the final extension from a filename
pub fn basename(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => &filename[..dot_pos],
        _ => filename,
    }
}

/// Output filename for an input, before collision handling
pub fn output_filename(input_name: &str) -> String {
    format!("{}.{}", basename(input_name), OUTPUT_EXTENSION)
}

/// Tracks output names written during one batch
#[derive(Debug, Clone)]
pub struct OutputNamer {
    policy: CollisionPolicy,
    written: HashSet<String>,
}

impl OutputNamer {
    /// Create a namer for a new batch
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            written: HashSet::new(),
        }
    }

    /// Pick the output filename for `input_name` without claiming it
    ///
    /// Files left over from earlier runs are never treated as collisions;
    /// only names written by this batch count.
    pub fn resolve(&self, input_name: &str) -> Result<String> {
        let candidate = output_filename(input_name);

        if !self.written.contains(&candidate) {
            return Ok(candidate);
        }

        match self.policy {
            CollisionPolicy::LastWins => Ok(candidate),
            CollisionPolicy::Error => Err(LetterboxError::output_conflict(
                candidate.into(),
                None,
            )),
            CollisionPolicy::Rename => {
                let stem = basename(input_name);
                let renamed = (1u32..)
                    .map(|n| format!("{}-{}.{}", stem, n, OUTPUT_EXTENSION))
                    .find(|name| !self.written.contains(name))
                    .unwrap_or(candidate);
                Ok(renamed)
            }
        }
    }

    /// Record a successfully written output
    pub fn commit(&mut self, output_name: String) {
        self.written.insert(output_name);
    }
}
