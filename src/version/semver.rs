//! Version string parsing and comparison
//!
//! Parsing is total: any input yields either a known version or [`SemVer::Unknown`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Serialize, Serializer};

/// First `major.minor.patch` group anywhere in the text, with optional pre-release and build
static FULL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?",
    )
    .expect("version pattern is valid")
});

/// A bare partial version such as `1`, `v1.2` or `1.2.x`
static PARTIAL_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[vV]?(\d+)(?:\.(\d+))?(?:\.[xX*])?\s*$").expect("version pattern is valid")
});

/// A parsed version, or the raw text that could not be parsed.
///
/// Ordering (see [`compare`]) only looks at major, minor and patch. Equality is
/// structural: two unknowns are equal only when their raw text is identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemVer {
    Known(Version),
    Unknown { raw: String },
}

impl SemVer {
    /// Parse free-form text such as `v1.2.3`, `1.0.63 (Claude Code)` or `ext@2.0.1`.
    pub fn parse(raw: &str) -> Self {
        parse_full(raw)
            .or_else(|| parse_partial(raw))
            .map(SemVer::Known)
            .unwrap_or_else(|| SemVer::unknown(raw))
    }

    pub fn unknown(raw: &str) -> Self {
        SemVer::Unknown {
            raw: raw.to_string(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, SemVer::Known(_))
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            SemVer::Known(version) => Some(version),
            SemVer::Unknown { .. } => None,
        }
    }

    fn triple(&self) -> Option<(u64, u64, u64)> {
        self.as_version().map(|v| (v.major, v.minor, v.patch))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemVer::Known(version) => write!(f, "{}", version),
            SemVer::Unknown { .. } => f.write_str("unknown"),
        }
    }
}

/// Known versions serialize as their string form, unknown ones as `null`.
impl Serialize for SemVer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SemVer::Known(version) => serializer.serialize_str(&version.to_string()),
            SemVer::Unknown { .. } => serializer.serialize_none(),
        }
    }
}

fn parse_full(raw: &str) -> Option<Version> {
    let caps = FULL_VERSION.captures(raw)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();

    let mut version = Version::new(number(1)?, number(2)?, number(3)?);
    if let Some(pre) = caps.get(4) {
        version.pre = Prerelease::new(pre.as_str()).unwrap_or(Prerelease::EMPTY);
    }
    if let Some(build) = caps.get(5) {
        version.build = BuildMetadata::new(build.as_str()).unwrap_or(BuildMetadata::EMPTY);
    }
    Some(version)
}

fn parse_partial(raw: &str) -> Option<Version> {
    let caps = PARTIAL_VERSION.captures(raw)?;
    let major = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let minor = match caps.get(2) {
        Some(m) => m.as_str().parse::<u64>().ok()?,
        None => 0,
    };
    Some(Version::new(major, minor, 0))
}

/// Compare two versions over (major, minor, patch).
///
/// Unknown sorts below every known version; two unknowns compare equal.
pub fn compare(a: &SemVer, b: &SemVer) -> Ordering {
    match (a.triple(), b.triple()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Whether `candidate` is strictly newer than `baseline`
pub fn is_newer(candidate: &SemVer, baseline: &SemVer) -> bool {
    compare(candidate, baseline) == Ordering::Greater
}

/// Whether an update from `current` to `latest` should be offered.
///
/// Only answers `true` when both sides were parsed.
pub fn update_available(current: &SemVer, latest: &SemVer) -> bool {
    current.is_known() && latest.is_known() && is_newer(latest, current)
}
