//! Object identifiers.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Enterprise subtree used when no base OID is configured.
pub const DEFAULT_ENTERPRISE_OID: &str = ".1.3.6.1.4.1.99999";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OidParseError {
    #[error("invalid OID component {component:?} in {input:?}")]
    InvalidComponent { input: String, component: String },
}

/// A dotted sequence of non-negative integers.
///
/// Ordering is component-wise numeric with a proper prefix sorting first,
/// which is the SNMP walk order (`.5.2.1` < `.5.10.1`).
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new OID with `suffix` appended.
    pub fn child(&self, suffix: &[u32]) -> Self {
        let mut arcs = Vec::with_capacity(self.0.len() + suffix.len());
        arcs.extend_from_slice(&self.0);
        arcs.extend_from_slice(suffix);
        Self(arcs)
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl FromStr for Oid {
    type Err = OidParseError;

    /// Accepts `1.3.6`, `.1.3.6`, surrounding whitespace and trailing dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.').trim_end_matches('.');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        trimmed
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| OidParseError::InvalidComponent {
                        input: s.to_string(),
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for arc in &self.0 {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self(arcs.to_vec())
    }
}
