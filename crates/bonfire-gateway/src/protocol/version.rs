//! Protocol version negotiation

use std::fmt;
use std::str::FromStr;

use super::ProtocolError;

/// A protocol version: `major` selects the envelope schema, `revision`
/// marks backwards-compatible additions within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u32,
    pub revision: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, revision: u32) -> Self {
        Self { major, revision }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.revision)
    }
}

/// A client-requested version, `major[.revision[.patch]]`
///
/// The revision is optional. A patch component is accepted for semantic
/// version strings and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequestedVersion {
    major: u32,
    revision: Option<u32>,
}

impl FromStr for RequestedVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidVersion(s.to_string());
        let trimmed = s.trim();
        let raw = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let mut parts = raw.splitn(3, '.');
        let major = parts
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let revision = parts
            .next()
            .map(|r| r.parse::<u32>().map_err(|_| invalid()))
            .transpose()?;
        if let Some(patch) = parts.next() {
            patch.parse::<u32>().map_err(|_| invalid())?;
        }

        Ok(Self { major, revision })
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let requested: RequestedVersion = s.parse()?;
        Ok(Self::new(requested.major, requested.revision.unwrap_or(0)))
    }
}

/// Matches requested versions against the ordered supported set
#[derive(Debug, Clone)]
pub struct VersionResolver {
    /// Ascending, deduplicated, never empty
    supported: Vec<ProtocolVersion>,
}

impl VersionResolver {
    /// Build a resolver; returns `None` if `supported` is empty
    pub fn new(supported: impl IntoIterator<Item = ProtocolVersion>) -> Option<Self> {
        let mut supported: Vec<_> = supported.into_iter().collect();
        supported.sort_unstable();
        supported.dedup();
        (!supported.is_empty()).then_some(Self { supported })
    }

    /// Parse the configured version strings (e.g. `["1.0", "2.0"]`)
    pub fn from_config<S: AsRef<str>>(versions: &[S]) -> Result<Self, ProtocolError> {
        let parsed = versions
            .iter()
            .map(|v| v.as_ref().parse::<ProtocolVersion>())
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(parsed).ok_or_else(|| ProtocolError::InvalidVersion(String::new()))
    }

    pub fn latest(&self) -> ProtocolVersion {
        // `new` guarantees at least one entry
        self.supported[self.supported.len() - 1]
    }

    pub fn supported(&self) -> &[ProtocolVersion] {
        &self.supported
    }

    /// Resolve the `version` query parameter
    ///
    /// Absent (or empty) selects the latest version. A bare major selects the
    /// highest revision of that major. `major.revision` selects the highest
    /// revision of that major that is at least `revision`.
    pub fn resolve(&self, requested: Option<&str>) -> Result<ProtocolVersion, ProtocolError> {
        let raw = match requested.map(str::trim) {
            None | Some("") => return Ok(self.latest()),
            Some(raw) => raw,
        };

        let wanted: RequestedVersion = raw.parse()?;
        let min_revision = wanted.revision.unwrap_or(0);

        self.supported
            .iter()
            .rev()
            .find(|v| v.major == wanted.major && v.revision >= min_revision)
            .copied()
            .ok_or_else(|| ProtocolError::UnsupportedVersion(raw.to_string()))
    }
}
