//! Raw path validation and splitting.

use shortpath_common::PathError;
use shortpath_common::constants::{MAX_PATH_DEPTH, MAX_SEGMENT_LENGTH, RESERVED_PREFIXES, max_path_length};

/// Limits a shortcut path has to respect
#[derive(Debug, Clone)]
pub struct PathRules {
    /// Maximum number of segments
    pub max_depth: usize,
    /// Maximum characters per segment
    pub max_segment_length: usize,
    /// First segments that belong to the service's own routes
    pub reserved_prefixes: Vec<String>,
}

impl Default for PathRules {
    fn default() -> Self {
        Self {
            max_depth: MAX_PATH_DEPTH,
            max_segment_length: MAX_SEGMENT_LENGTH,
            reserved_prefixes: RESERVED_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

fn is_path_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'/'
}

impl PathRules {
    pub fn max_path_length(&self) -> usize {
        max_path_length(self.max_depth, self.max_segment_length)
    }

    /// Split `path` into its non-empty segments, rejecting anything that could
    /// never be stored. Repeated, leading and trailing slashes collapse.
    pub fn validate(&self, path: &str) -> Result<Vec<String>, PathError> {
        if path.trim().is_empty() {
            return Err(PathError::EmptyPath);
        }

        // Cheap bound before splitting attacker-controlled input
        if path.len() > self.max_path_length() {
            return Err(PathError::PathTooLong);
        }

        if !path.bytes().all(is_path_byte) {
            return Err(PathError::InvalidPathChars);
        }

        let segments: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        let Some(first) = segments.first() else {
            return Err(PathError::EmptyPath);
        };

        if segments.len() > self.max_depth {
            return Err(PathError::TooManyPathSegments);
        }

        if segments.iter().any(|s| s.len() > self.max_segment_length) {
            return Err(PathError::SegmentTooLong);
        }

        if self.reserved_prefixes.iter().any(|prefix| prefix == first) {
            return Err(PathError::InvalidPrefix);
        }

        Ok(segments)
    }
}

/// Canonical form of a validated path, as handed back to clients
pub fn shortcut(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}
