//! Support classification of an observed platform version.
//!
//! A variant declares the versions it was verified on (`supported_versions`)
//! and the ranges it is expected to work on (`supported_version_ranges`).
//! [`classify`] turns those declarations and the host's version into a
//! [`SupportLevel`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Confidence that a variant works on the observed platform version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Unsupported,
    Experimental,
    Compatible,
    Supported,
}

impl SupportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Experimental => "experimental",
            Self::Compatible => "compatible",
            Self::Supported => "supported",
        }
    }

    /// One-line explanation for the user.
    pub fn message(&self, platform: &str, observed: &str) -> String {
        match self {
            Self::Supported => format!("{platform} {observed} is officially supported"),
            Self::Compatible => format!("{platform} {observed} is within the supported range"),
            Self::Experimental => format!(
                "{platform} {observed} is newer than any tested release; installation may not work"
            ),
            Self::Unsupported => format!("{platform} {observed} is not supported by this variant"),
        }
    }

    pub fn recommended_action(&self) -> &'static str {
        match self {
            Self::Supported | Self::Compatible => "proceed with installation",
            Self::Experimental => "proceed, and report problems if the installation fails",
            Self::Unsupported => "use an alternative variant or install manually",
        }
    }
}

impl fmt::Display for SupportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive version range a variant is expected to work on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: String,
    pub max: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

impl VersionRange {
    #[cfg(test)]
    pub fn new(min: impl Into<String>, max: impl Into<String>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
            kind: None,
            confidence: None,
        }
    }

    fn contains(&self, observed: &str) -> bool {
        match Encoding::shared(&[observed, &self.min, &self.max]) {
            Some(_) => {
                compare_numeric(&self.min, observed) != Ordering::Greater
                    && compare_numeric(observed, &self.max) != Ordering::Greater
            }
            None => self.min.as_str() <= observed && observed <= self.max.as_str(),
        }
    }

    /// True when `observed` is numerically beyond the upper bound. The
    /// lexical path never answers true.
    fn is_below(&self, observed: &str) -> bool {
        Encoding::shared(&[observed, &self.max]).is_some()
            && compare_numeric(observed, &self.max) == Ordering::Greater
    }
}

/// How a version string is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    /// `22.04`
    Dotted,
    /// `11`
    Integer,
}

impl Encoding {
    fn of(version: &str) -> Option<Self> {
        match version.split_once('.') {
            Some((major, minor)) => {
                let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
                (numeric(major) && numeric(minor)).then_some(Self::Dotted)
            }
            None => version.parse::<u64>().ok().map(|_| Self::Integer),
        }
    }

    /// The encoding all `versions` share, `None` if any differs or is lexical.
    fn shared(versions: &[&str]) -> Option<Self> {
        let first = Self::of(versions.first()?)?;
        versions[1..]
            .iter()
            .all(|v| Self::of(v) == Some(first))
            .then_some(first)
    }
}

fn numeric_parts(version: &str) -> (u64, u64) {
    let mut parts = version.splitn(2, '.').map(|p| p.parse::<u64>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

/// Callers must check both sides share a numeric [`Encoding`] first.
fn compare_numeric(a: &str, b: &str) -> Ordering {
    numeric_parts(a).cmp(&numeric_parts(b))
}

/// Classify `observed` with forward compatibility allowed.
pub fn classify<S: AsRef<str>>(observed: &str, explicit: &[S], ranges: &[VersionRange]) -> SupportLevel {
    classify_with_policy(observed, explicit, ranges, true)
}

/// Classify `observed` against an explicit allow-list and ranges.
///
/// When `forward_compatible` is false, a version newer than every range is
/// `Unsupported` instead of `Experimental`.
pub fn classify_with_policy<S: AsRef<str>>(
    observed: &str,
    explicit: &[S],
    ranges: &[VersionRange],
    forward_compatible: bool,
) -> SupportLevel {
    let observed = observed.trim();

    if explicit.iter().any(|v| v.as_ref().trim() == observed) {
        return SupportLevel::Supported;
    }

    if ranges.iter().any(|r| r.contains(observed)) {
        return SupportLevel::Compatible;
    }

    // Newer than tested means above the highest range, not inside a gap
    if forward_compatible && !ranges.is_empty() && ranges.iter().all(|r| r.is_below(observed)) {
        return SupportLevel::Experimental;
    }

    SupportLevel::Unsupported
}
