//! Release version handling.
//!
//! Candidate and current versions are plain `MAJOR.MINOR.PATCH` triples.
//! Tags carry a `v` prefix and each beta minor gets a `release/vMAJOR.MINOR.x`
//! branch.

use crate::error::{Result, VersionError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version regex is valid"));

/// A validated `MAJOR.MINOR.PATCH` version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion(semver::Version);

/// Check that `version` is a bare `MAJOR.MINOR.PATCH` triple
pub fn validate_format(version: &str) -> Result<()> {
    if VERSION_RE.is_match(version) {
        Ok(())
    } else {
        Err(VersionError::InvalidVersion {
            version: version.to_string(),
        }
        .into())
    }
}

impl ReleaseVersion {
    /// Parse and validate a version string
    pub fn parse(input: &str) -> Result<Self> {
        validate_format(input)?;
        // Leading zeros are accepted; only components that overflow u64 fail.
        let mut parts = input.split('.').map(str::parse::<u64>);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch))) => {
                Ok(Self(semver::Version::new(major, minor, patch)))
            }
            _ => Err(VersionError::InvalidVersion {
                version: input.to_string(),
            }
            .into()),
        }
    }

    /// Tag name for this version (`v0.85.0`)
    pub fn tag_name(&self) -> String {
        format!("v{}", self.0)
    }

    /// Release branch derived from major.minor (`release/v0.85.x`)
    pub fn release_branch(&self, prefix: &str) -> String {
        format!("{}v{}.{}.x", prefix, self.0.major, self.0.minor)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).map_err(|e| e.to_string())
    }
}

impl From<ReleaseVersion> for String {
    fn from(value: ReleaseVersion) -> Self {
        value.to_string()
    }
}

/// Pick the highest `vX.Y.Z` tag below `candidate` that shares its major version
///
/// Tags that are not plain version tags are ignored.
pub fn resolve_previous_version<S: AsRef<str>>(
    candidate: &ReleaseVersion,
    tags: &[S],
) -> Result<ReleaseVersion> {
    tags.iter()
        .filter_map(|tag| tag.as_ref().strip_prefix('v'))
        .filter_map(|raw| ReleaseVersion::parse(raw).ok())
        .filter(|version| version.0.major == candidate.0.major && version < candidate)
        .max()
        .ok_or_else(|| {
            VersionError::NoPreviousVersion {
                candidate: candidate.to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_triples() {
        for input in ["0.85.0", "1.0.0", "10.200.3000", "0.0.0"] {
            assert!(validate_format(input).is_ok(), "{input} should be accepted");
        }
    }

    #[test]
    fn rejects_partial_prefixed_and_prerelease_versions() {
        for input in ["0.85", "v0.85.0", "0.85.0-rc1", "", "0.85.0 ", "a.b.c", "1.2.3.4"] {
            assert!(validate_format(input).is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn parse_accepts_leading_zeros_and_rejects_overflow() {
        let version = ReleaseVersion::parse("00.085.0").unwrap();
        assert_eq!(version.to_string(), "0.85.0");
        assert_eq!(version.tag_name(), "v0.85.0");
        assert!(ReleaseVersion::parse("0.85.99999999999999999999").is_err());
    }

    #[test]
    fn derives_tag_and_branch() {
        let version = ReleaseVersion::parse("0.85.0").unwrap();
        assert_eq!(version.tag_name(), "v0.85.0");
        assert_eq!(version.release_branch("release/"), "release/v0.85.x");
    }

    #[test]
    fn previous_version_uses_same_major_and_skips_noise() {
        let candidate = ReleaseVersion::parse("0.85.0").unwrap();
        let tags = ["v0.83.0", "v0.84.1", "v0.84.0", "v1.0.0", "v0.86.0", "pdata/v1.0.0", "v0.84.2-rc1"];
        let previous = resolve_previous_version(&candidate, &tags).unwrap();
        assert_eq!(previous.to_string(), "0.84.1");
    }

    #[test]
    fn previous_version_missing_is_an_error() {
        let candidate = ReleaseVersion::parse("1.0.0").unwrap();
        assert!(resolve_previous_version(&candidate, &["v0.9.0"]).is_err());
    }
}
