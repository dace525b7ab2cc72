// ============================================================
// Layer 3 — Manifest Domain Type
// ============================================================
// A manifest is a line-oriented text file listing interview
// recordings and their binary PHQ label:
//
//   Participant_ID  PHQ_Score  PHQ_Binary  ...     ← header, skipped
//   301             4          0
//   302             12         1
//
// Field 0 is the file stem, field 2 is the label (0 or 1).
// Everything after field 2 is ignored.
//
// The audio file for an entry lives at
//   {audio_dir}/{stem}_AUDIO.wav
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Suffix appended to every stem to find its recording
pub const AUDIO_SUFFIX: &str = "_AUDIO.wav";

/// Index of the label column in each data line
const LABEL_FIELD: usize = 2;

/// Why a manifest could not be turned into entries.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest line {line}: expected at least {expected} fields, found {found}")]
    MissingField {
        line:     usize,
        expected: usize,
        found:    usize,
    },

    #[error("manifest line {line}: label '{value}' is not 0 or 1")]
    InvalidLabel { line: usize, value: String },
}

/// One labelled recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// File stem, e.g. "301"
    pub stem: String,

    /// Ground truth: 1 = positive screen, 0 = negative
    pub label: u8,
}

impl ManifestEntry {
    pub fn new(stem: impl Into<String>, label: u8) -> Self {
        Self { stem: stem.into(), label }
    }

    /// Build the recording path for this entry under `audio_dir`.
    pub fn audio_path(&self, audio_dir: &Path) -> PathBuf {
        audio_dir.join(format!("{}{}", self.stem, AUDIO_SUFFIX))
    }
}

/// Parse manifest text. The first line is a header and is always dropped;
/// whitespace-only lines are not data lines and are skipped.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries = Vec::new();

    // enumerate() is zero-based, +1 for human line numbers
    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        if fields.len() <= LABEL_FIELD {
            return Err(ManifestError::MissingField {
                line:     line_no,
                expected: LABEL_FIELD + 1,
                found:    fields.len(),
            });
        }

        let raw   = fields[LABEL_FIELD];
        let label = match raw.parse::<u8>() {
            Ok(v @ (0 | 1)) => v,
            _ => {
                return Err(ManifestError::InvalidLabel {
                    line:  line_no,
                    value: raw.to_string(),
                })
            }
        };

        entries.push(ManifestEntry::new(fields[0], label));
    }

    Ok(entries)
}

/// Read and parse a manifest file from disk.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&text)
}
