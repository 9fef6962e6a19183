//! Request DTOs
//!
//! Incoming JSON bodies and the checks applied before they reach the cache.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

/// Body of `PUT /set`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    /// Seconds until expiry. Absent means the configured default, 0 means never.
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Expiry requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedTtl {
    Default,
    Never,
    After(Duration),
}

impl SetRequest {
    /// Rejects keys and values the slot format or the server limits cannot hold.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.key.is_empty() {
            "key cannot be empty".to_string()
        } else if self.key.len() > MAX_KEY_LENGTH {
            format!("key exceeds {MAX_KEY_LENGTH} bytes")
        } else if self.value.len() > MAX_VALUE_SIZE {
            format!("value exceeds {MAX_VALUE_SIZE} bytes")
        } else {
            return Ok(());
        };
        Err(CacheError::InvalidRequest(reason))
    }

    pub fn requested_ttl(&self) -> RequestedTtl {
        match self.ttl {
            None => RequestedTtl::Default,
            Some(0) => RequestedTtl::Never,
            Some(secs) => RequestedTtl::After(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, value: &str, ttl: Option<u64>) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        }
    }

    #[test]
    fn test_ttl_defaults_when_absent() {
        let req: SetRequest = serde_json::from_str(r#"{"key": "k", "value": "v"}"#).unwrap();
        assert_eq!(req.requested_ttl(), RequestedTtl::Default);
    }

    #[test]
    fn test_ttl_zero_never_expires() {
        let req: SetRequest =
            serde_json::from_str(r#"{"key": "k", "value": "v", "ttl": 0}"#).unwrap();
        assert_eq!(req.requested_ttl(), RequestedTtl::Never);
    }

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(
            request("k", "v", Some(90)).requested_ttl(),
            RequestedTtl::After(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_validate_rejects_bad_keys() {
        assert!(matches!(
            request("", "v", None).validate(),
            Err(CacheError::InvalidRequest(_))
        ));
        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(request(&long_key, "v", None).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_value() {
        let value = "x".repeat(MAX_VALUE_SIZE + 1);
        assert!(request("k", &value, None).validate().is_err());
    }

    #[test]
    fn test_validate_accepts_boundaries() {
        let key = "k".repeat(MAX_KEY_LENGTH);
        assert!(request(&key, "", Some(1)).validate().is_ok());
    }
}
