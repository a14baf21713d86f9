//! Session configuration.
//!
//! Where the permission snapshot comes from and how long it is trusted.
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::retry::RetryConfig;

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// How long a fetched snapshot is trusted before `load()` refetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Stale immediately: every `load()` fetches.
    AlwaysRefetch,
    /// Trusted for a fixed time after the fetch.
    MaxAge(Duration),
    /// Trusted until `invalidate()`.
    UntilInvalidated,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::MaxAge(Duration::from_secs(60))
    }
}

impl CachePolicy {
    /// Parse the `CONSOLE_SNAPSHOT_MAX_AGE_SECS` form.
    ///
    /// `0` means always refetch, `never` means until invalidated, and any
    /// other number is a max age in seconds.
    ///
    /// # Example
    ///
    /// ```
    /// use console_session::CachePolicy;
    /// use std::time::Duration;
    ///
    /// assert_eq!(CachePolicy::parse("0"), Some(CachePolicy::AlwaysRefetch));
    /// assert_eq!(CachePolicy::parse("never"), Some(CachePolicy::UntilInvalidated));
    /// assert_eq!(CachePolicy::parse("30"), Some(CachePolicy::MaxAge(Duration::from_secs(30))));
    /// assert_eq!(CachePolicy::parse("soon"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "never" => Some(CachePolicy::UntilInvalidated),
            other => match other.parse::<u64>().ok()? {
                0 => Some(CachePolicy::AlwaysRefetch),
                secs => Some(CachePolicy::MaxAge(Duration::from_secs(secs))),
            },
        }
    }

    /// Whether a snapshot fetched at `fetched_at` may still be served at `now`.
    pub fn is_fresh(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            CachePolicy::AlwaysRefetch => false,
            CachePolicy::UntilInvalidated => true,
            CachePolicy::MaxAge(max_age) => match (now - fetched_at).to_std() {
                Ok(age) => age < *max_age,
                // fetched_at in the future: clock moved backwards, refetch
                Err(_) => false,
            },
        }
    }
}

/// Session configuration for the snapshot store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Console API endpoint.
    pub endpoint: ServiceEndpoint,

    /// Path of the permission snapshot resource.
    pub permissions_path: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum fetch attempts per `load()`.
    pub max_retries: u32,

    /// Snapshot caching policy.
    pub cache_policy: CachePolicy,
}

impl Default for SessionConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            endpoint: ServiceEndpoint {
                base_url: "http://localhost:8000".to_string(),
                api_token: None,
            },
            permissions_path: "/api/admin/auth/permissions".to_string(),
            timeout_secs: 15,
            max_retries: 3,
            cache_policy: CachePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONSOLE_API_URL`: console API URL (default: http://localhost:8000)
    /// - `CONSOLE_API_TOKEN`: bearer token sent with the snapshot request
    /// - `CONSOLE_PERMISSIONS_PATH`: snapshot path (default: /api/admin/auth/permissions)
    /// - `CONSOLE_FETCH_TIMEOUT_SECS`: request timeout in seconds (default: 15)
    /// - `CONSOLE_FETCH_MAX_RETRIES`: attempts per load (default: 3)
    /// - `CONSOLE_SNAPSHOT_MAX_AGE_SECS`: `0`, `never`, or seconds (default: 60)
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            endpoint: ServiceEndpoint {
                base_url: lookup("CONSOLE_API_URL").unwrap_or(default.endpoint.base_url),
                api_token: lookup("CONSOLE_API_TOKEN").filter(|t| !t.is_empty()),
            },
            permissions_path: lookup("CONSOLE_PERMISSIONS_PATH").unwrap_or(default.permissions_path),
            timeout_secs: lookup("CONSOLE_FETCH_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            max_retries: lookup("CONSOLE_FETCH_MAX_RETRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_retries),
            cache_policy: lookup("CONSOLE_SNAPSHOT_MAX_AGE_SECS")
                .and_then(|s| CachePolicy::parse(&s))
                .unwrap_or(default.cache_policy),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry settings for snapshot fetches.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries.max(1),
            ..RetryConfig::default()
        }
    }

    /// Full URL of the snapshot resource.
    pub fn permissions_url(&self) -> String {
        self.endpoint.url(&self.permissions_path)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "CONSOLE_API_URL".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CONSOLE_FETCH_MAX_RETRIES".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the console API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL (e.g., "https://console.example.com").
    pub base_url: String,

    /// Bearer token for the snapshot request.
    pub api_token: Option<String>,
}

impl ServiceEndpoint {
    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Check if token authentication is available.
    pub fn has_auth(&self) -> bool {
        self.api_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.cache_policy, CachePolicy::MaxAge(Duration::from_secs(60)));
        assert!(!config.endpoint.has_auth());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("CONSOLE_API_URL", "https://console.example.com/"),
            ("CONSOLE_API_TOKEN", "secret"),
            ("CONSOLE_PERMISSIONS_PATH", "/v2/me/permissions"),
            ("CONSOLE_FETCH_TIMEOUT_SECS", "5"),
            ("CONSOLE_FETCH_MAX_RETRIES", "not-a-number"),
            ("CONSOLE_SNAPSHOT_MAX_AGE_SECS", "never"),
        ]));

        assert_eq!(config.permissions_url(), "https://console.example.com/v2/me/permissions");
        assert_eq!(config.endpoint.api_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.cache_policy, CachePolicy::UntilInvalidated);
    }

    #[test]
    fn test_empty_token_is_no_token() {
        let config = SessionConfig::from_lookup(lookup(&[("CONSOLE_API_TOKEN", "")]));
        assert!(!config.endpoint.has_auth());
    }

    #[test]
    fn test_validate() {
        let mut config = SessionConfig::default();
        config.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "CONSOLE_FETCH_MAX_RETRIES"
        ));

        let mut config = SessionConfig::default();
        config.endpoint.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_has_at_least_one_attempt() {
        let mut config = SessionConfig::default();
        config.max_retries = 0;
        assert_eq!(config.retry().max_attempts, 1);
    }

    #[test]
    fn test_cache_policy_freshness() {
        let now = Utc::now();
        let policy = CachePolicy::MaxAge(Duration::from_secs(60));
        assert!(policy.is_fresh(now - ChronoDuration::seconds(30), now));
        assert!(!policy.is_fresh(now - ChronoDuration::seconds(90), now));
        assert!(!policy.is_fresh(now + ChronoDuration::seconds(5), now));

        assert!(!CachePolicy::AlwaysRefetch.is_fresh(now, now));
        assert!(CachePolicy::UntilInvalidated.is_fresh(now - ChronoDuration::days(3), now));
    }

    #[test]
    fn test_service_endpoint_url() {
        let endpoint = ServiceEndpoint {
            base_url: "https://console.example.com/".to_string(),
            api_token: None,
        };
        assert_eq!(
            endpoint.url("/api/admin/auth/permissions"),
            "https://console.example.com/api/admin/auth/permissions"
        );
    }
}
