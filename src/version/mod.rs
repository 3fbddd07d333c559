// src/version/mod.rs

//! Epoch, version and release of metadata entries
//!
//! Version ordering comes from the `rpm` crate; this module only splits
//! `epoch:version-release` strings the way repository metadata records them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Epoch, version and release of a dependency or package
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
}

impl Evr {
    /// Split an `[epoch:]version[-release]` string
    ///
    /// An empty string yields no components at all. Otherwise the epoch
    /// defaults to `"0"` when it is missing or not numeric, the version runs
    /// up to the first `-` and the release is everything after it.
    ///
    /// - "1.2.3" -> epoch="0", version="1.2.3", release=None
    /// - "2:1.2.3-4.el8" -> epoch="2", version="1.2.3", release="4.el8"
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }

        let (epoch, rest) = match s.find(':') {
            Some(colon) => {
                let epoch = &s[..colon];
                let numeric = !epoch.is_empty() && epoch.bytes().all(|c| c.is_ascii_digit());
                (numeric.then(|| epoch.to_string()), &s[colon + 1..])
            }
            None => (None, s),
        };

        let (version, release) = match rest.find('-') {
            Some(dash) => (
                rest[..dash].to_string(),
                Some(rest[dash + 1..].to_string()),
            ),
            None => (rest.to_string(), None),
        };

        Self {
            epoch: Some(epoch.unwrap_or_else(|| "0".to_string())),
            version: Some(version),
            release,
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch.as_deref().filter(|e| *e != "0") {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}", self.version.as_deref().unwrap_or(""))?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}
