//! Version constraints over Matomo-style version strings.
//!
//! A `VersionSpec` is parsed from the spec document and distinguishes an
//! exact single pin (no catalog query needed) from a pattern or "latest"
//! constraint that must be resolved against a remote catalog. Selection
//! prefers the highest matching version; a plain release sorts above a
//! pre-release with the same numeric components (`5.0.0` > `5.0.0-rc3`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionSpecError {
    #[error("version spec must not be empty")]
    Empty,
}

/// A constraint over version strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionSpec {
    /// Any version; resolves to whatever the catalog reports as latest.
    Latest,
    /// Exactly one version. Resolution needs no network access.
    Exact(String),
    /// A glob pattern such as `5.*`.
    Pattern(String),
}

impl VersionSpec {
    /// The single version this spec pins, if it pins exactly one.
    pub fn pinned(&self) -> Option<&str> {
        match self {
            VersionSpec::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Whether `candidate` satisfies this constraint.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            VersionSpec::Latest => true,
            VersionSpec::Exact(v) => v == candidate,
            VersionSpec::Pattern(p) => glob_match(p, candidate),
        }
    }

    /// Choose the best (highest) matching version from a candidate set.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter(|c| self.matches(c))
            .max_by(|a, b| cmp_versions(a, b))
    }
}

impl FromStr for VersionSpec {
    type Err = VersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionSpecError::Empty);
        }
        if s == "latest" || s == "*" {
            return Ok(VersionSpec::Latest);
        }
        if s.contains('*') {
            return Ok(VersionSpec::Pattern(s.to_owned()));
        }
        Ok(VersionSpec::Exact(s.to_owned()))
    }
}

impl TryFrom<String> for VersionSpec {
    type Error = VersionSpecError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionSpec> for String {
    fn from(spec: VersionSpec) -> String {
        spec.to_string()
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Latest => f.write_str("latest"),
            VersionSpec::Exact(v) | VersionSpec::Pattern(v) => f.write_str(v),
        }
    }
}

/// Order two version strings by dotted numeric components.
///
/// Each dot-separated segment is compared by its numeric prefix first; on a
/// tie, a segment without a trailing suffix ranks above one that has one,
/// so `5.0.0` sorts above `5.0.0-rc3`.
pub fn cmp_versions(a: &str, b: &str) -> Ordering {
    let sa: Vec<(u64, &str)> = a.split('.').map(split_segment).collect();
    let sb: Vec<(u64, &str)> = b.split('.').map(split_segment).collect();
    let len = sa.len().max(sb.len());
    for i in 0..len {
        let (na, ta) = sa.get(i).copied().unwrap_or((0, ""));
        let (nb, tb) = sb.get(i).copied().unwrap_or((0, ""));
        match na.cmp(&nb) {
            Ordering::Equal => {}
            other => return other,
        }
        match (ta.is_empty(), tb.is_empty()) {
            (true, true) => {}
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => match ta.cmp(tb) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
    Ordering::Equal
}

fn split_segment(seg: &str) -> (u64, &str) {
    let digits = seg.bytes().take_while(u8::is_ascii_digit).count();
    let num = seg[..digits].parse().unwrap_or(0);
    (num, &seg[digits..])
}

/// Match `text` against a pattern where `*` matches any run of characters.
/// Everything else in the pattern, dots included, is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let anchored = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
    match regex::Regex::new(&anchored) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}
