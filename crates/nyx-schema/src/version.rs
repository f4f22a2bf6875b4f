//! Package identifier versions and their ordering.
//!
//! A package identifier carries its version as a trailing suffix after the
//! last [`VERSION_SEPARATOR`]: `binutils-2.41` is `binutils` at `2.41`. An
//! identifier without a separator has no version at all and is modelled as
//! [`PackageVersion::Unversioned`] rather than a missing value.
//!
//! Ordering follows semantic-version precedence but is lenient about the
//! shapes found in the wild: `1.2` equals `1.2.0`, `1.2.3.4` is accepted, and
//! a trailing tag such as `1.0rc1` is a pre-release that sorts below `1.0`.
//! The exception is a post-release tag (`post`, `rev`, `r`, `pl` or `p`
//! followed by an optional number, as in `1.0.post1` or `9.5p1`, or a bare
//! number as in `1.0-2`), which sorts above its release.

use std::cmp::Ordering;
use std::fmt;

use semver::Prerelease;

use crate::VERSION_SEPARATOR;

/// Version suffix parsed from a package identifier.
#[derive(Debug, Clone)]
pub enum PackageVersion {
    /// The identifier carried a version suffix (`gcc-13.2.0` -> `13.2.0`).
    Versioned(String),
    /// The identifier had no separator and therefore no version.
    Unversioned,
}

impl PackageVersion {
    /// The raw version string, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Versioned(v) => Some(v),
            Self::Unversioned => None,
        }
    }

    /// Whether the identifier carried a version suffix.
    pub fn is_versioned(&self) -> bool {
        matches!(self, Self::Versioned(_))
    }

    /// Join `name` with this version the way build directories and archives
    /// are named: `name-version`, or just `name` when unversioned.
    pub fn qualify(&self, name: &str) -> String {
        match self {
            Self::Versioned(v) => format!("{name}{VERSION_SEPARATOR}{v}"),
            Self::Unversioned => name.to_string(),
        }
    }

    fn key(&self) -> Option<PrecedenceKey> {
        self.as_str().map(PrecedenceKey::parse)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned(v) => f.write_str(v),
            Self::Unversioned => f.write_str("unversioned"),
        }
    }
}

/// Ascending precedence. Unversioned sorts below every versioned value.
impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.key(), other.key()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

/// Spellings of a post-release tag, longest first.
const POST_RELEASE_TAGS: [&str; 5] = ["post", "rev", "pl", "r", "p"];

/// What follows the numeric release components.
#[derive(Debug)]
enum Suffix {
    Pre(String),
    Final,
    Post(u64),
}

impl Suffix {
    fn parse(tag: &str) -> Self {
        let tag = tag.trim_start_matches(['-', '.', '_']);
        if tag.is_empty() {
            return Self::Final;
        }
        let lower = tag.to_ascii_lowercase();
        if let Ok(n) = lower.parse() {
            return Self::Post(n);
        }
        for spelling in POST_RELEASE_TAGS {
            let Some(rest) = lower.strip_prefix(spelling) else {
                continue;
            };
            let rest = rest.trim_start_matches(['-', '.', '_']);
            if rest.is_empty() {
                return Self::Post(0);
            }
            if let Ok(n) = rest.parse() {
                return Self::Post(n);
            }
        }
        Self::Pre(tag.to_string())
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pre(_) => 0,
            Self::Final => 1,
            Self::Post(_) => 2,
        }
    }
}

/// Numeric release components plus an optional pre- or post-release tag.
#[derive(Debug)]
struct PrecedenceKey {
    release: Vec<u64>,
    suffix: Suffix,
}

impl PrecedenceKey {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim_start_matches(['v', 'V']);
        // Build metadata never participates in precedence.
        let raw = raw.split_once('+').map_or(raw, |(head, _)| head);

        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let (core, tag) = raw.split_at(split);

        let release = core
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u64>().unwrap_or(u64::MAX))
            .collect();

        Self {
            release,
            suffix: Suffix::parse(tag),
        }
    }
}

impl Ord for PrecedenceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).copied().unwrap_or(0);
            let b = other.release.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match (&self.suffix, &other.suffix) {
            (Suffix::Pre(a), Suffix::Pre(b)) => match (Prerelease::new(a), Prerelease::new(b)) {
                (Ok(pa), Ok(pb)) => pa.cmp(&pb),
                _ => a.cmp(b),
            },
            (Suffix::Post(a), Suffix::Post(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for PrecedenceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PrecedenceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PrecedenceKey {}

/// Parse the version suffix of a package identifier.
///
/// The identifier is split on its last separator. A leading separator with
/// nothing before it (`-foo`) does not count as a version suffix.
pub fn parse_version(identifier: &str) -> PackageVersion {
    match identifier.rsplit_once(VERSION_SEPARATOR) {
        Some((name, version)) if !name.is_empty() => PackageVersion::Versioned(version.to_string()),
        _ => PackageVersion::Unversioned,
    }
}

/// The identifier with its version suffix removed.
pub fn package_name(identifier: &str) -> &str {
    match identifier.rsplit_once(VERSION_SEPARATOR) {
        Some((name, _)) if !name.is_empty() => name,
        _ => identifier,
    }
}

/// Newest-first comparator over package identifiers.
///
/// Returns [`Ordering::Less`] when `a` is the newer version, so sorting a
/// candidate list with it puts the most recent release first.
pub fn compare_identifiers(a: &str, b: &str) -> Ordering {
    parse_version(b).cmp(&parse_version(a))
}

/// Sort package identifiers so the newest version comes first.
pub fn sort_newest_first<S: AsRef<str>>(identifiers: &mut [S]) {
    identifiers.sort_by(|a, b| compare_identifiers(a.as_ref(), b.as_ref()));
}
