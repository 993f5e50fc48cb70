//! Engine version profile and generator backend selection

use crate::error::{GeneratorError, Result};
use std::fmt;
use std::str::FromStr;

/// Release channel of an engine build
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReleaseType {
    /// `a`
    Alpha,
    /// `b`
    Beta,
    /// `c` (China releases)
    China,
    /// `f`
    Final,
    /// `p`
    Patch,
    /// `x`
    Experimental,
}

impl ReleaseType {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'a' => Some(ReleaseType::Alpha),
            'b' => Some(ReleaseType::Beta),
            'c' => Some(ReleaseType::China),
            'f' => Some(ReleaseType::Final),
            'p' => Some(ReleaseType::Patch),
            'x' => Some(ReleaseType::Experimental),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            ReleaseType::Alpha => 'a',
            ReleaseType::Beta => 'b',
            ReleaseType::China => 'c',
            ReleaseType::Final => 'f',
            ReleaseType::Patch => 'p',
            ReleaseType::Experimental => 'x',
        }
    }
}

/// Engine version such as `2021.3.5f1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnityVersion {
    /// Major version (`5`, `2021`, `6000`)
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Patch version
    pub patch: u16,
    /// Release channel and build number, if given
    pub release: Option<(ReleaseType, u16)>,
}

impl UnityVersion {
    /// Create a version without a release suffix
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            release: None,
        }
    }

    /// Whether this version is at least `major.minor`
    pub fn at_least(&self, major: u16, minor: u16) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    fn is_known_major(major: u16) -> bool {
        matches!(major, 3..=5 | 2017..=2023 | 6000)
    }
}

impl FromStr for UnityVersion {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || GeneratorError::UnknownEngineVersion(s.to_string());
        let text = s.trim();

        let mut parts = text.splitn(3, '.');
        let major: u16 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(unknown)?;
        let minor: u16 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(unknown)?;

        let (patch, release) = match parts.next() {
            None => (0, None),
            Some(rest) => {
                let split = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                let patch: u16 = rest[..split].parse().map_err(|_| unknown())?;
                let suffix = &rest[split..];
                let release = if suffix.is_empty() {
                    None
                } else {
                    let mut chars = suffix.chars();
                    let kind = chars
                        .next()
                        .and_then(ReleaseType::from_char)
                        .ok_or_else(unknown)?;
                    let build: u16 = chars.as_str().parse().map_err(|_| unknown())?;
                    Some((kind, build))
                };
                (patch, release)
            }
        };

        if !Self::is_known_major(major) {
            return Err(unknown());
        }

        Ok(Self {
            major,
            minor,
            patch,
            release,
        })
    }
}

impl fmt::Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some((kind, build)) = self.release {
            write!(f, "{}{}", kind.as_char(), build)?;
        }
        Ok(())
    }
}

/// Asset tool the caller generates trees for
///
/// Validated and recorded on the profile, and logged when a generator is
/// created. Every backend currently receives identical trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorBackend {
    /// AssetStudio
    AssetStudio,
    /// AssetsTools
    AssetsTools,
    /// AssetRipper
    AssetRipper,
}

impl GeneratorBackend {
    /// Canonical backend name
    pub fn name(self) -> &'static str {
        match self {
            GeneratorBackend::AssetStudio => "AssetStudio",
            GeneratorBackend::AssetsTools => "AssetsTools",
            GeneratorBackend::AssetRipper => "AssetRipper",
        }
    }
}

impl FromStr for GeneratorBackend {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        [
            GeneratorBackend::AssetStudio,
            GeneratorBackend::AssetsTools,
            GeneratorBackend::AssetRipper,
        ]
        .into_iter()
        .find(|backend| backend.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| GeneratorError::UnknownBackend(s.to_string()))
    }
}

impl fmt::Display for GeneratorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Version and backend a generator is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineProfile {
    /// Target engine version
    pub version: UnityVersion,
    /// Generator backend
    pub backend: GeneratorBackend,
}

impl EngineProfile {
    /// Create a profile from already-parsed parts
    pub fn new(version: UnityVersion, backend: GeneratorBackend) -> Self {
        Self { version, backend }
    }

    /// Parse a version string and backend name
    pub fn parse(version: &str, backend: &str) -> Result<Self> {
        Ok(Self {
            version: version.parse()?,
            backend: backend.parse()?,
        })
    }
}
