use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Opaque token assigned by the job-launching service at submit time.
///
/// Identifies one command across its launch response, every subsequent
/// status poll and every push notification about it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate an id received from an untrusted source (push frame,
    /// response body). Blank ids are rejected.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("correlation id must not be blank".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_string() {
        let id = CorrelationId::new("cmd1");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("cmd1"));
    }

    #[test]
    fn parse_trims_whitespace() {
        let id = CorrelationId::parse("  cmd1 ").unwrap();
        assert_eq!(id.as_str(), "cmd1");
    }

    #[test]
    fn parse_rejects_blank() {
        assert_matches::assert_matches!(
            CorrelationId::parse("   "),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn hash_lookup_by_str() {
        let mut map = std::collections::HashMap::new();
        map.insert(CorrelationId::from("cmd1"), 1);
        assert_eq!(map.get("cmd1"), Some(&1));
    }
}
