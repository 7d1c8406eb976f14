//! Package version parsing, ordering, and bump helpers.
//!
//! Versions are dotted numeric releases with an optional pre-release tag and
//! an optional post-release number:
//! - `1.2.3`, `1.2`, `2.0`
//! - `1.2.3-alpha.2`, `1.2.3a2`, `1.2.3-rc.1`
//! - `1.2.3.post1`
//!
//! Ordering pads missing release segments with zeros (`1.0 == 1.0.0`),
//! sorts pre-releases before their release (`alpha` < `beta` < `rc`), and
//! post-releases after it.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::error::ParseError;

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct Version {
    release: Vec<u64>,
    pre: Option<Prerelease>,
    post: Option<u64>,
}

/// Pre-release phase tag with ordering `alpha` < `beta` < `rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreTag {
    Alpha,
    Beta,
    Rc,
}

impl fmt::Display for PreTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreTag::Alpha => f.write_str("alpha"),
            PreTag::Beta => f.write_str("beta"),
            PreTag::Rc => f.write_str("rc"),
        }
    }
}

/// A pre-release marker, e.g. `alpha.2` in `1.0.0-alpha.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prerelease {
    pub tag: PreTag,
    pub number: u64,
}

impl Version {
    /// Build a release version from raw segments. Empty input yields `0`.
    pub fn from_release(segments: Vec<u64>) -> Self {
        let release = if segments.is_empty() {
            vec![0]
        } else {
            segments
        };
        Self {
            release,
            pre: None,
            post: None,
        }
    }

    /// Parse version text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let s = text.trim();
        if s.is_empty() {
            return Err(ParseError::new(text, 0, "empty version"));
        }

        let mut release = Vec::new();
        let mut pos = 0;
        let bytes = s.as_bytes();

        loop {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos == start {
                return Err(ParseError::new(text, pos, "expected a number"));
            }
            let segment: u64 = s[start..pos]
                .parse()
                .map_err(|_| ParseError::new(text, start, "numeric segment too large"))?;
            release.push(segment);

            if pos < bytes.len() && bytes[pos] == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
                pos += 1;
                continue;
            }
            break;
        }

        let mut version = Self {
            release,
            pre: None,
            post: None,
        };

        if pos == bytes.len() {
            return Ok(version);
        }

        // Optional separator before the pre/post tag.
        let tag_start = if matches!(bytes[pos], b'-' | b'.' | b'_') {
            pos + 1
        } else {
            pos
        };
        let rest = &s[tag_start..];
        let (word, after_word) = split_alpha(rest);
        if word.is_empty() {
            return Err(ParseError::new(text, pos, "unexpected trailing characters"));
        }

        let number_text = after_word.strip_prefix(['.', '-']).unwrap_or(after_word);
        let number = if number_text.is_empty() {
            0
        } else {
            number_text.parse::<u64>().map_err(|_| {
                ParseError::new(
                    text,
                    tag_start + word.len(),
                    "expected a number after the release tag",
                )
            })?
        };

        match word.to_ascii_lowercase().as_str() {
            "alpha" | "a" => version.pre = Some(Prerelease { tag: PreTag::Alpha, number }),
            "beta" | "b" => version.pre = Some(Prerelease { tag: PreTag::Beta, number }),
            "rc" | "c" | "preview" => version.pre = Some(Prerelease { tag: PreTag::Rc, number }),
            "post" | "rev" => version.post = Some(number),
            _ => {
                return Err(ParseError::new(
                    text,
                    tag_start,
                    format!("unknown release tag `{word}`"),
                ))
            }
        }

        Ok(version)
    }

    /// Release segments as parsed (trailing zeros preserved).
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn major(&self) -> u64 {
        self.release.first().copied().unwrap_or(0)
    }

    pub fn minor(&self) -> u64 {
        self.release.get(1).copied().unwrap_or(0)
    }

    pub fn patch(&self) -> u64 {
        self.release.get(2).copied().unwrap_or(0)
    }

    pub fn pre(&self) -> Option<&Prerelease> {
        self.pre.as_ref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// The version with pre/post markers stripped.
    pub fn stable(&self) -> Version {
        Version {
            release: self.release.clone(),
            pre: None,
            post: None,
        }
    }

    pub fn next_major(&self) -> Version {
        Version::from_release(vec![self.major() + 1, 0, 0])
    }

    pub fn next_minor(&self) -> Version {
        Version::from_release(vec![self.major(), self.minor() + 1, 0])
    }

    pub fn next_patch(&self) -> Version {
        Version::from_release(vec![self.major(), self.minor(), self.patch() + 1])
    }

    /// The first version excluded by a caret constraint on `self`.
    ///
    /// Bumps the leftmost non-zero release segment and zeroes the rest, so
    /// `1.2.3` -> `2.0.0`, `0.3.1` -> `0.4.0`, `0.0.3` -> `0.0.4`.
    pub fn next_breaking(&self) -> Version {
        let mut segments = self.release.clone();
        let bump_at = segments
            .iter()
            .position(|&s| s != 0)
            .unwrap_or(segments.len() - 1);
        segments[bump_at] += 1;
        for segment in segments.iter_mut().skip(bump_at + 1) {
            *segment = 0;
        }
        Version::from_release(segments)
    }

    /// Release segments zero-padded to `len`, for ordering and equality.
    fn padded(&self, len: usize) -> impl Iterator<Item = u64> + '_ {
        self.release
            .iter()
            .copied()
            .chain(std::iter::repeat(0))
            .take(len)
    }

    /// Phase rank used for ordering: pre-release < release < post-release.
    fn phase(&self) -> (u8, Option<Prerelease>, u64) {
        match (&self.pre, &self.post) {
            (Some(pre), _) => (0, Some(*pre), 0),
            (None, None) => (1, None, 0),
            (None, Some(post)) => (2, None, *post),
        }
    }
}

fn split_alpha(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    s.split_at(end)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for (a, b) in self.padded(len).zip(other.padded(len)) {
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.phase().cmp(&other.phase())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Trailing zeros are stripped so `1.0` and `1.0.0` hash identically.
        let trimmed = self
            .release
            .iter()
            .rposition(|&s| s != 0)
            .map_or(&self.release[..0], |i| &self.release[..=i]);
        trimmed.hash(state);
        self.phase().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.release {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        if let Some(pre) = &self.pre {
            if pre.number == 0 {
                write!(f, "-{}", pre.tag)?;
            } else {
                write!(f, "-{}.{}", pre.tag, pre.number)?;
            }
        }
        if let Some(post) = &self.post {
            write!(f, ".post{post}")?;
        }
        Ok(())
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::str::FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn basic_ordering() {
        assert!(v("1.0") < v("2.0"));
        assert!(v("1.0.1") < v("1.1.0"));
        assert!(v("0.9") < v("0.10"));
    }

    #[test]
    fn trailing_zeros_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("2"), v("2.0.0"));
    }

    #[test]
    fn prerelease_before_release() {
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-beta") < v("1.0.0-rc.1"));
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.2"));
    }

    #[test]
    fn post_release_after_release() {
        assert!(v("1.0.0") < v("1.0.0.post1"));
        assert!(v("1.0.0.post1") < v("1.0.1"));
    }

    #[test]
    fn compact_prerelease_spelling() {
        assert_eq!(v("1.2.3a2"), v("1.2.3-alpha.2"));
        assert_eq!(v("1.2.3rc1"), v("1.2.3-rc.1"));
        assert_eq!(v("1.2.3b4"), v("1.2.3-beta.4"));
    }

    #[test]
    fn next_breaking_leading_zeros() {
        assert_eq!(v("1.2.3").next_breaking(), v("2.0.0"));
        assert_eq!(v("0.3.1").next_breaking(), v("0.4.0"));
        assert_eq!(v("0.0.3").next_breaking(), v("0.0.4"));
        assert_eq!(v("0.0").next_breaking(), v("0.1"));
    }

    #[test]
    fn display_roundtrip() {
        for text in ["1.2.3", "1.2", "1.2.3-alpha.2", "1.2.3-rc.1", "1.2.3.post1"] {
            assert_eq!(v(text).to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("1.2.x").is_err());
        let err = Version::parse("1.0-nightly").unwrap_err();
        assert!(err.message.contains("nightly"));
    }
}
