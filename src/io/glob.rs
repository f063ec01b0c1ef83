//! Expansion of file patterns for the delimited-file source.
//!
//! A path without glob metacharacters is returned as-is (so a missing file
//! surfaces as an open error, not as "no matches").

use crate::error::SourceError;
use glob::glob;
use std::path::PathBuf;

/// Whether `pattern` contains glob metacharacters.
pub fn is_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expand `pattern` into the sorted list of matching files (directories skipped).
///
/// # Errors
/// Returns [`SourceError::Glob`] for an invalid pattern or an unreadable entry.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    if !is_pattern(pattern) {
        return Ok(vec![PathBuf::from(pattern)]);
    }
    let paths = glob(pattern).map_err(|e| SourceError::Glob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| SourceError::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        if path.is_file() {
            result.push(path);
        }
    }

    // Sort for deterministic row numbering across shards
    result.sort();
    Ok(result)
}
