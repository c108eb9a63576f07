//! Version label parsing and ordering
//!
//! Two label forms are accepted:
//!
//! - `MAJOR.MINOR[.PATCH...]` is a release
//! - `MAJOR.MINOR[.PATCH...]-preN` is the N-th pre-release of that release
//!
//! Every label maps to an ordering key: the numeric components followed by
//! either `N` or [`RELEASE_SENTINEL`], so a release always sorts after all of
//! its pre-releases. Keys are compared lexicographically. Labels of different
//! arity are compared as if the shorter one were right-padded with zeros; when
//! that still ties, the shorter label sorts first (`1.0 < 1.0.0`).
//!
//! The store materializes the same order as a derived column, see
//! [`crate::store::sort_key`]. The two must agree exactly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{PublishError, Result};

/// Ordering component appended to release labels
pub const RELEASE_SENTINEL: i64 = i32::MAX as i64;

/// Maximum number of numeric components in a label
pub const MAX_COMPONENTS: usize = 8;

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^((?:0|[1-9][0-9]*)(?:\.(?:0|[1-9][0-9]*))+)(?:-pre([1-9][0-9]*))?$")
            .expect("version label pattern is valid")
    })
}

/// A parsed version label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    components: Vec<u32>,
    pre_release: Option<u32>,
}

impl Version {
    /// Create a release from numeric components
    pub fn release(components: Vec<u32>) -> Result<Self> {
        Self::from_parts(components, None)
    }

    fn from_parts(components: Vec<u32>, pre_release: Option<u32>) -> Result<Self> {
        if components.len() < 2 || components.len() > MAX_COMPONENTS {
            return Err(PublishError::InvalidVersion(format!(
                "expected between 2 and {} numeric components, got {}",
                MAX_COMPONENTS,
                components.len()
            )));
        }
        if let Some(n) = pre_release {
            if n == 0 || i64::from(n) >= RELEASE_SENTINEL {
                return Err(PublishError::InvalidVersion(format!(
                    "pre-release number {} out of range",
                    n
                )));
            }
        }
        Ok(Self {
            components,
            pre_release,
        })
    }

    /// Parse a label such as `1.2`, `1.2.3` or `1.3-pre2`
    pub fn parse(label: &str) -> Result<Self> {
        let invalid = || PublishError::InvalidVersion(format!("'{}'", label));
        let caps = label_pattern().captures(label).ok_or_else(invalid)?;

        let components = caps[1]
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;

        let pre_release = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u32>().map_err(|_| invalid())?),
            None => None,
        };

        Self::from_parts(components, pre_release)
    }

    /// Whether a label carries a `-preN` suffix, without fully parsing it
    pub fn has_pre_release_suffix(label: &str) -> bool {
        label.contains("-pre")
    }

    /// Numeric components
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// Pre-release counter, if any
    pub fn pre_release(&self) -> Option<u32> {
        self.pre_release
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// The ordering key: components followed by the pre-release counter or
    /// the release sentinel
    pub fn sort_key(&self) -> Vec<i64> {
        let mut key: Vec<i64> = self.components.iter().map(|c| i64::from(*c)).collect();
        key.push(self.pre_release.map(i64::from).unwrap_or(RELEASE_SENTINEL));
        key
    }

    /// The release this label belongs to (drops any pre-release suffix)
    pub fn to_release(&self) -> Self {
        Self {
            components: self.components.clone(),
            pre_release: None,
        }
    }

    /// Suggested next release label
    ///
    /// A pre-release suggests the release it precedes. A release increments
    /// its last component.
    pub fn next_release(&self) -> Self {
        if self.is_pre_release() {
            return self.to_release();
        }
        let mut components = self.components.clone();
        if let Some(last) = components.last_mut() {
            *last = last.saturating_add(1);
        }
        Self {
            components,
            pre_release: None,
        }
    }

    /// Suggested next pre-release label
    ///
    /// A pre-release suggests the next draft of the same release. A release
    /// suggests the first draft of the next release.
    pub fn next_pre_release(&self) -> Self {
        match self.pre_release {
            Some(n) => Self {
                components: self.components.clone(),
                pre_release: Some(n.saturating_add(1).min(RELEASE_SENTINEL as u32 - 1)),
            },
            None => Self {
                pre_release: Some(1),
                ..self.next_release()
            },
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))?;
        if let Some(n) = self.pre_release {
            write!(f, "-pre{}", n)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = PublishError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.components.len().max(other.components.len());
        for i in 0..width {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        let rank = |v: &Version| v.pre_release.map(i64::from).unwrap_or(RELEASE_SENTINEL);
        rank(self)
            .cmp(&rank(other))
            .then_with(|| self.components.len().cmp(&other.components.len()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parsing() {
        let release = v("1.2.3");
        assert_eq!(release.components(), &[1, 2, 3]);
        assert!(!release.is_pre_release());

        let pre = v("1.3-pre2");
        assert_eq!(pre.components(), &[1, 3]);
        assert_eq!(pre.pre_release(), Some(2));
        assert_eq!(pre.to_string(), "1.3-pre2");
    }

    #[test]
    fn test_pre_releases_sort_before_release() {
        assert!(v("1.0-pre1") < v("1.0-pre2"));
        assert!(v("1.0-pre2") < v("1.0"));
        assert!(v("1.0-pre10") < v("1.0"));
        assert!(v("1.0") < v("1.1-pre1"));
    }

    #[test]
    fn test_numeric_not_lexical_ordering() {
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99.99"));
    }

    #[test]
    fn test_mixed_arity_is_zero_padded() {
        assert!(v("1.0") < v("1.0.0"));
        assert!(v("1.0.1") > v("1.0"));
        assert!(v("1.0.0-pre1") < v("1.0"));
        assert!(v("1.1") > v("1.0.5"));
        assert_ne!(v("1.0").cmp(&v("1.0.0")), Ordering::Equal);
    }

    #[test]
    fn test_sort_key() {
        assert_eq!(v("1.2").sort_key(), vec![1, 2, RELEASE_SENTINEL]);
        assert_eq!(v("1.2-pre3").sort_key(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejects_malformed_labels() {
        for label in [
            "", "1", "v1.0", "1.0.", "1..0", "01.0", "1.0-pre", "1.0-pre0", "1.0-pre01",
            "1.0-rc1", "1.0-pre1-pre2", "1.a", "1.0.0.0.0.0.0.0.0", "4294967296.0",
            "1.0-pre2147483647",
        ] {
            assert!(Version::parse(label).is_err(), "accepted {:?}", label);
        }
        assert!(Version::parse("1.0-pre2147483646").is_ok());
        assert!(Version::parse("0.0").is_ok());
    }

    #[test]
    fn test_suggestions() {
        assert_eq!(v("1.2").next_release().to_string(), "1.3");
        assert_eq!(v("1.2").next_pre_release().to_string(), "1.3-pre1");
        assert_eq!(v("1.3-pre2").next_release().to_string(), "1.3");
        assert_eq!(v("1.3-pre2").next_pre_release().to_string(), "1.3-pre3");
        assert_eq!(v("2.0.9").next_release().to_string(), "2.0.10");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.0-pre1")).unwrap();
        assert_eq!(json, "\"1.0-pre1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0-pre1"));
        assert!(serde_json::from_str::<Version>("\"nope\"").is_err());
    }

    #[test]
    fn test_sorting_a_history() {
        let mut labels = vec![v("1.1"), v("1.0"), v("1.1-pre1"), v("1.0-pre2"), v("1.0-pre1")];
        labels.sort();
        let sorted: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        assert_eq!(sorted, vec!["1.0-pre1", "1.0-pre2", "1.0", "1.1-pre1", "1.1"]);
    }
}
