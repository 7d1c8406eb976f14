//! Version constraint parsing and set algebra.
//!
//! A constraint is a finite union of ranges in canonical form: ranges are
//! sorted by lower bound, non-overlapping, and merged when they touch.
//! Supported syntax: `*`, `1.2.*`, `^1.2`, `~1.2`, `~=1.2` (compatible
//! release), comparison operators, comma-separated conjunction, and
//! `||`-separated union.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::ParseError;
use crate::version::Version;

/// One endpoint of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A contiguous version interval. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Range {
    fn any() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    fn exact(version: Version) -> Self {
        Self {
            lower: Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            upper: Some(Bound {
                version,
                inclusive: true,
            }),
        }
    }

    /// A range that admits no version at all.
    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn is_any(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Pure bound check, without the pre-release admission policy.
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(ref lower) = self.lower {
            match version.cmp(&lower.version) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(ref upper) = self.upper {
            match version.cmp(&upper.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Whether either endpoint names a pre-release version.
    fn has_prerelease_bound(&self) -> bool {
        self.lower.as_ref().is_some_and(|b| b.version.is_prerelease())
            || self.upper.as_ref().is_some_and(|b| b.version.is_prerelease())
    }

    fn intersect(&self, other: &Range) -> Range {
        let lower = match (&self.lower, &other.lower) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(if cmp_lower(a, b) == Ordering::Greater {
                a.clone()
            } else {
                b.clone()
            }),
        };
        let upper = match (&self.upper, &other.upper) {
            (None, b) => b.clone(),
            (a, None) => a.clone(),
            (Some(a), Some(b)) => Some(if cmp_upper(a, b) == Ordering::Less {
                a.clone()
            } else {
                b.clone()
            }),
        };
        Range { lower, upper }
    }
}

/// Lower-bound ordering: unbounded first, then by version, inclusive before
/// exclusive at the same version.
fn cmp_lower(a: &Bound, b: &Bound) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| match (a.inclusive, b.inclusive) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        })
}

/// Upper-bound ordering: exclusive before inclusive at the same version.
fn cmp_upper(a: &Bound, b: &Bound) -> Ordering {
    a.version
        .cmp(&b.version)
        .then_with(|| match (a.inclusive, b.inclusive) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            _ => Ordering::Equal,
        })
}

fn cmp_lower_opt(a: &Option<Bound>, b: &Option<Bound>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp_lower(a, b),
    }
}

/// Whether two canonically-ordered ranges form one contiguous interval.
///
/// `left` ends where `right` begins (or later): they merge unless there is a
/// gap, including the single-point gap left by two exclusive bounds.
fn touches(left: &Range, right: &Range) -> bool {
    let (Some(hi), Some(lo)) = (&left.upper, &right.lower) else {
        return true;
    };
    match hi.version.cmp(&lo.version) {
        Ordering::Greater => true,
        Ordering::Equal => hi.inclusive || lo.inclusive,
        Ordering::Less => false,
    }
}

/// A finite union of version ranges in canonical form.
///
/// The empty union admits no version; a single unbounded range admits all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    ranges: Vec<Range>,
}

impl VersionConstraint {
    /// The universal constraint (`*`).
    pub fn any() -> Self {
        Self {
            ranges: vec![Range::any()],
        }
    }

    /// The contradictory constraint admitting no version.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// A constraint admitting exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            ranges: vec![Range::exact(version)],
        }
    }

    fn from_ranges(ranges: Vec<Range>) -> Self {
        Self {
            ranges: canonicalize(ranges),
        }
    }

    fn range(lower: Option<Bound>, upper: Option<Bound>) -> Self {
        Self::from_ranges(vec![Range { lower, upper }])
    }

    /// Parse constraint text.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut union = VersionConstraint::empty();
        for (offset, part) in split_with_offsets(text, "||") {
            let part_trimmed = part.trim();
            if part_trimmed.is_empty() {
                return Err(ParseError::new(text, offset, "empty constraint alternative"));
            }
            let mut conjunction = VersionConstraint::any();
            for (inner_offset, piece) in split_with_offsets(part, ",") {
                let piece_trimmed = piece.trim();
                if piece_trimmed.is_empty() {
                    return Err(ParseError::new(text, offset + inner_offset, "empty constraint"));
                }
                let leading = piece.len() - piece.trim_start().len();
                let simple = parse_simple(piece_trimmed).map_err(|e| {
                    ParseError::new(text, offset + inner_offset + leading + e.position, e.message)
                })?;
                conjunction = conjunction.intersect(&simple);
            }
            union = union.union(&conjunction);
        }
        Ok(union)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_any(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0].is_any()
    }

    /// The single version admitted by an exact constraint, if it is one.
    pub fn as_exact(&self) -> Option<&Version> {
        match self.ranges.as_slice() {
            [range] => match (&range.lower, &range.upper) {
                (Some(lo), Some(hi))
                    if lo.inclusive && hi.inclusive && lo.version == hi.version =>
                {
                    Some(&lo.version)
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Membership test with the pre-release admission policy: a pre-release
    /// only matches when the containing range itself names a pre-release.
    pub fn allows(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| {
            r.contains(version) && (!version.is_prerelease() || r.has_prerelease_bound())
        })
    }

    /// Pure membership test, ignoring the pre-release policy.
    pub fn allows_unrestricted(&self, version: &Version) -> bool {
        self.ranges.iter().any(|r| r.contains(version))
    }

    /// Whether any range names a pre-release bound, opting matches in.
    pub fn mentions_prerelease(&self) -> bool {
        self.ranges.iter().any(Range::has_prerelease_bound)
    }

    /// `other` is entirely contained in `self`.
    pub fn allows_all(&self, other: &VersionConstraint) -> bool {
        other.difference(self).is_empty()
    }

    /// `self` and `other` share at least one version.
    pub fn allows_any(&self, other: &VersionConstraint) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn intersect(&self, other: &VersionConstraint) -> VersionConstraint {
        let mut out = Vec::new();
        for a in &self.ranges {
            for b in &other.ranges {
                let r = a.intersect(b);
                if !r.is_empty() {
                    out.push(r);
                }
            }
        }
        VersionConstraint::from_ranges(out)
    }

    pub fn union(&self, other: &VersionConstraint) -> VersionConstraint {
        let mut ranges = self.ranges.clone();
        ranges.extend(other.ranges.iter().cloned());
        VersionConstraint::from_ranges(ranges)
    }

    /// Every version not admitted by `self`.
    pub fn complement(&self) -> VersionConstraint {
        if self.ranges.is_empty() {
            return VersionConstraint::any();
        }
        let mut out = Vec::new();
        let mut cursor: Option<Bound> = None;
        let mut unbounded_start = true;
        for range in &self.ranges {
            if let Some(ref lo) = range.lower {
                let gap = Range {
                    lower: if unbounded_start { None } else { cursor.clone() },
                    upper: Some(Bound {
                        version: lo.version.clone(),
                        inclusive: !lo.inclusive,
                    }),
                };
                if !gap.is_empty() {
                    out.push(gap);
                }
            }
            match &range.upper {
                Some(hi) => {
                    cursor = Some(Bound {
                        version: hi.version.clone(),
                        inclusive: !hi.inclusive,
                    });
                    unbounded_start = false;
                }
                None => return VersionConstraint::from_ranges(out),
            }
        }
        out.push(Range {
            lower: cursor,
            upper: None,
        });
        VersionConstraint::from_ranges(out)
    }

    /// Versions admitted by `self` but not by `other`.
    pub fn difference(&self, other: &VersionConstraint) -> VersionConstraint {
        self.intersect(&other.complement())
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }
}

/// Sort, drop empties, and merge touching ranges.
fn canonicalize(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort_by(|a, b| {
        cmp_lower_opt(&a.lower, &b.lower).then_with(|| match (&a.upper, &b.upper) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => cmp_upper(x, y),
        })
    });

    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if touches(last, &range) => {
                let wider = match (&last.upper, &range.upper) {
                    (None, _) => None,
                    (_, None) => None,
                    (Some(a), Some(b)) => Some(if cmp_upper(a, b) == Ordering::Greater {
                        a.clone()
                    } else {
                        b.clone()
                    }),
                };
                last.upper = wider;
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Split `text` by `sep`, yielding each part with its byte offset.
fn split_with_offsets<'a>(text: &'a str, sep: &'a str) -> impl Iterator<Item = (usize, &'a str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(found) = text[start..].find(sep) {
        parts.push((start, &text[start..start + found]));
        start += found + sep.len();
    }
    parts.push((start, &text[start..]));
    parts.into_iter()
}

/// Parse one operator-or-shorthand constraint with no unions or commas.
fn parse_simple(text: &str) -> Result<VersionConstraint, ParseError> {
    if text == "*" {
        return Ok(VersionConstraint::any());
    }

    if let Some(rest) = text.strip_prefix('^') {
        let version = Version::parse(rest.trim()).map_err(|e| reposition(e, text, 1))?;
        return Ok(VersionConstraint::range(
            Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            Some(Bound {
                version: version.next_breaking(),
                inclusive: false,
            }),
        ));
    }

    if let Some(rest) = text.strip_prefix("~=") {
        let version = Version::parse(rest.trim()).map_err(|e| reposition(e, text, 2))?;
        if version.release().len() < 2 {
            return Err(ParseError::new(
                text,
                2,
                "compatible-release constraints need at least two segments",
            ));
        }
        return Ok(VersionConstraint::range(
            Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            Some(Bound {
                version: bump_release_at(&version, version.release().len() - 2),
                inclusive: false,
            }),
        ));
    }

    if let Some(rest) = text.strip_prefix('~') {
        let version = Version::parse(rest.trim()).map_err(|e| reposition(e, text, 1))?;
        let bump_at = if version.release().len() >= 2 { 1 } else { 0 };
        return Ok(VersionConstraint::range(
            Some(Bound {
                version: version.clone(),
                inclusive: true,
            }),
            Some(Bound {
                version: bump_release_at(&version, bump_at),
                inclusive: false,
            }),
        ));
    }

    for (op, len) in [(">=", 2), ("<=", 2), (">", 1), ("<", 1)] {
        if let Some(rest) = text.strip_prefix(op) {
            let version = Version::parse(rest.trim()).map_err(|e| reposition(e, text, len))?;
            let bound = |inclusive| {
                Some(Bound {
                    version: version.clone(),
                    inclusive,
                })
            };
            return Ok(match op {
                ">=" => VersionConstraint::range(bound(true), None),
                ">" => VersionConstraint::range(bound(false), None),
                "<=" => VersionConstraint::range(None, bound(true)),
                _ => VersionConstraint::range(None, bound(false)),
            });
        }
    }

    if let Some(rest) = text.strip_prefix("!=") {
        return Ok(parse_equality(rest.trim(), text, 2)?.complement());
    }
    if let Some(rest) = text.strip_prefix("==") {
        return parse_equality(rest.trim(), text, 2);
    }
    if let Some(rest) = text.strip_prefix('=') {
        return parse_equality(rest.trim(), text, 1);
    }
    parse_equality(text, text, 0)
}

/// An exact version or a `1.2.*` wildcard, as a constraint.
fn parse_equality(
    body: &str,
    full: &str,
    offset: usize,
) -> Result<VersionConstraint, ParseError> {
    if body == "*" {
        return Ok(VersionConstraint::any());
    }
    if let Some(stem) = body.strip_suffix(".*") {
        let version = Version::parse(stem).map_err(|e| reposition(e, full, offset))?;
        if version.is_prerelease() {
            return Err(ParseError::new(
                full,
                offset,
                "wildcards cannot follow a pre-release tag",
            ));
        }
        let upper = bump_release_at(&version, version.release().len() - 1);
        return Ok(VersionConstraint::range(
            Some(Bound {
                version,
                inclusive: true,
            }),
            Some(Bound {
                version: upper,
                inclusive: false,
            }),
        ));
    }
    let version = Version::parse(body).map_err(|e| reposition(e, full, offset))?;
    Ok(VersionConstraint::exact(version))
}

/// Bump the release segment at `index` and drop everything after it.
fn bump_release_at(version: &Version, index: usize) -> Version {
    let mut segments: Vec<u64> = version.release()[..=index].to_vec();
    segments[index] += 1;
    Version::from_release(segments)
}

fn reposition(e: ParseError, full: &str, offset: usize) -> ParseError {
    ParseError::new(full, offset + e.position, e.message)
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return f.write_str("<empty>");
        }
        let mut first = true;
        for range in &self.ranges {
            if !first {
                f.write_str(" || ")?;
            }
            first = false;
            match (&range.lower, &range.upper) {
                (None, None) => f.write_str("*")?,
                (Some(lo), Some(hi)) if lo.inclusive && hi.inclusive && lo.version == hi.version => {
                    write!(f, "=={}", lo.version)?
                }
                (lo, hi) => {
                    if let Some(lo) = lo {
                        write!(f, "{}{}", if lo.inclusive { ">=" } else { ">" }, lo.version)?;
                        if hi.is_some() {
                            f.write_str(",")?;
                        }
                    }
                    if let Some(hi) = hi {
                        write!(f, "{}{}", if hi.inclusive { "<=" } else { "<" }, hi.version)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(text: &str) -> VersionConstraint {
        VersionConstraint::parse(text).unwrap()
    }

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn caret_bounds() {
        assert_eq!(c("^1.2").to_string(), ">=1.2,<2.0");
        assert_eq!(c("^0.3").to_string(), ">=0.3,<0.4");
        assert_eq!(c("^0.0.3").to_string(), ">=0.0.3,<0.0.4");
    }

    #[test]
    fn tilde_bounds() {
        assert_eq!(c("~1.2.3").to_string(), ">=1.2.3,<1.3");
        assert_eq!(c("~1.2").to_string(), ">=1.2,<1.3");
        assert_eq!(c("~1").to_string(), ">=1,<2");
    }

    #[test]
    fn compatible_release_bounds() {
        assert_eq!(c("~=2.7").to_string(), ">=2.7,<3");
        assert_eq!(c("~=1.4.5").to_string(), ">=1.4.5,<1.5");
        assert!(VersionConstraint::parse("~=1").is_err());
    }

    #[test]
    fn wildcard_bounds() {
        assert_eq!(c("1.2.*").to_string(), ">=1.2,<1.3");
        assert!(c("1.2.*").allows(&v("1.2.9")));
        assert!(!c("1.2.*").allows(&v("1.3.0")));
        assert!(c("*").is_any());
    }

    #[test]
    fn exact_and_not_equal() {
        assert!(c("1.2.3").allows(&v("1.2.3")));
        assert!(!c("1.2.3").allows(&v("1.2.4")));
        let ne = c("!=1.2.3");
        assert!(!ne.allows(&v("1.2.3")));
        assert!(ne.allows(&v("1.2.4")));
        assert!(ne.allows(&v("1.0.0")));
    }

    #[test]
    fn union_and_conjunction() {
        let u = c("~2.7 || ^3.6");
        assert_eq!(u.to_string(), ">=2.7,<2.8 || >=3.6,<4.0");
        assert!(u.allows(&v("2.7.18")));
        assert!(u.allows(&v("3.9.1")));
        assert!(!u.allows(&v("3.0.0")));

        let conj = c(">=1.2,<2.0");
        assert!(conj.allows(&v("1.5")));
        assert!(!conj.allows(&v("2.0")));
    }

    #[test]
    fn intersect_disjoint_carets_is_empty() {
        let a = c("^1.2");
        let b = c("^2.0");
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn intersect_recanonicalizes() {
        let a = c(">=1.0 || >=3.0");
        let b = c("<2.0 || <4.0");
        let i = a.intersect(&b);
        assert!(i.allows(&v("1.5")));
        assert!(i.allows(&v("3.5")));
        assert!(!i.allows(&v("4.0")));
    }

    #[test]
    fn union_merges_touching_ranges() {
        let u = c("<1.0").union(&c(">=1.0"));
        assert!(u.is_any());
        let gap = c("<1.0").union(&c(">1.0"));
        assert!(!gap.is_any());
        assert!(!gap.allows(&v("1.0")));
    }

    #[test]
    fn complement_roundtrip() {
        let a = c(">=1.2,<2.0 || >=3.0");
        let comp = a.complement();
        assert!(comp.allows(&v("1.0")));
        assert!(comp.allows(&v("2.5")));
        assert!(!comp.allows(&v("1.5")));
        assert!(a.union(&comp).is_any());
        assert!(a.intersect(&comp).is_empty());
    }

    #[test]
    fn containment() {
        assert!(c("^1.0").allows_all(&c("~1.2")));
        assert!(!c("~1.2").allows_all(&c("^1.0")));
        assert!(c("^1.0").allows_any(&c(">=1.9")));
        assert!(!c("^1.0").allows_any(&c(">=2.0")));
    }

    #[test]
    fn prereleases_excluded_by_default() {
        let caret = c("^1.0");
        assert!(!caret.allows(&v("1.1.0-alpha.1")));
        assert!(caret.allows_unrestricted(&v("1.1.0-alpha.1")));

        let explicit = c(">=1.1.0-alpha");
        assert!(explicit.allows(&v("1.1.0-beta")));

        let pinned = c("1.1.0-alpha.1");
        assert!(pinned.allows(&v("1.1.0-alpha.1")));
    }

    #[test]
    fn parse_error_position() {
        let err = VersionConstraint::parse("^1.2 || >=bogus").unwrap_err();
        assert_eq!(err.text, "^1.2 || >=bogus");
        assert_eq!(err.position, 10);
    }

    #[test]
    fn exact_accessor() {
        assert_eq!(c("==1.2.3").as_exact(), Some(&v("1.2.3")));
        assert_eq!(c("1.2.3").as_exact(), Some(&v("1.2.3")));
        assert!(c("^1.2").as_exact().is_none());
    }
}
