//! Dot-delimited paths addressing values inside the settings document.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Segment matching any key in validator patterns.
pub const WILDCARD: &str = "*";

/// Parsed, non-empty configuration path such as `audio.volume`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    raw: String,
    segments: Vec<String>,
}

impl ConfigPath {
    /// Parse a dot-delimited path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPath`] for an empty path, an empty
    /// segment (`a..b`, `.a`, `a.`), or a wildcard segment.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        if raw.is_empty() {
            return Err(invalid(raw, "path is empty"));
        }
        let segments = raw
            .split('.')
            .map(|segment| {
                if segment.is_empty() {
                    Err(invalid(raw, "path contains an empty segment"))
                } else if segment == WILDCARD {
                    Err(invalid(raw, "wildcards are only valid in validator patterns"))
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// Build a path from already-split segments (used when walking documents).
    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        Self {
            raw: segments.join("."),
            segments,
        }
    }

    /// The path as originally written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments borrowed as string slices for registry lookups.
    #[must_use]
    pub fn segment_refs(&self) -> Vec<&str> {
        self.segments.iter().map(String::as_str).collect()
    }

    /// Top-level section the path points into.
    #[must_use]
    pub fn section(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Every segment except the last.
    #[must_use]
    pub fn parents(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, parents)) => parents,
            None => &[],
        }
    }

    /// Final segment (the key written by `set`).
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }
}

impl Display for ConfigPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

impl FromStr for ConfigPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ConfigPath {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn invalid(raw: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidPath {
        path: raw.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_paths() {
        let path = ConfigPath::parse("ui.colors.primary").expect("valid path");
        assert_eq!(path.segments(), ["ui", "colors", "primary"]);
        assert_eq!(path.section(), "ui");
        assert_eq!(path.parents(), ["ui", "colors"]);
        assert_eq!(path.leaf(), "primary");
        assert_eq!(path.to_string(), "ui.colors.primary");
    }

    #[test]
    fn single_segment_has_no_parents() {
        let path: ConfigPath = "audio".parse().expect("valid path");
        assert!(path.parents().is_empty());
        assert_eq!(path.leaf(), "audio");
    }

    #[test]
    fn rejects_malformed_paths() {
        for raw in ["", ".", "a..b", ".a", "a.", "audio.*"] {
            let err = ConfigPath::parse(raw).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidPath { .. }),
                "expected invalid path for {raw:?}"
            );
        }
    }

    #[test]
    fn from_segments_joins_with_dots() {
        let path = ConfigPath::from_segments(vec!["audio".into(), "volume".into()]);
        assert_eq!(path.as_str(), "audio.volume");
        assert_eq!(path, ConfigPath::parse("audio.volume").unwrap());
    }
}
