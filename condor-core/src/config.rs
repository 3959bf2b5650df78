//! Configuration types

use crate::{CondorResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What bulk resolution does when one derived value fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkPolicy {
    /// Stop at the first failure and return it
    #[default]
    Abort,
    /// Record the failure in the report and carry on with the next dependency
    Skip,
}

impl FromStr for BulkPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(BulkPolicy::Abort),
            "skip" => Ok(BulkPolicy::Skip),
            other => Err(ConfigError::InvalidValue {
                field: "bulk_policy".to_string(),
                value: other.to_string(),
                reason: "expected 'abort' or 'skip'".to_string(),
            }),
        }
    }
}

/// Resolution settings shared by every session a manager drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of keys simultaneously in progress in one session.
    pub max_depth: usize,
    /// Failure handling for bulk resolution.
    pub bulk_policy: BulkPolicy,
    /// Log each failure skipped during bulk resolution.
    pub log_failures: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 1024,
            bulk_policy: BulkPolicy::Abort,
            log_failures: true,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-progress depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the bulk failure policy.
    pub fn with_bulk_policy(mut self, policy: BulkPolicy) -> Self {
        self.bulk_policy = policy;
        self
    }

    pub fn with_log_failures(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CONDOR_MAX_DEPTH`: in-progress depth limit (default: 1024)
    /// - `CONDOR_BULK_POLICY`: `abort` or `skip` (default: abort)
    /// - `CONDOR_LOG_FAILURES`: `true` or `false` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_depth: std::env::var("CONDOR_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_depth),
            bulk_policy: std::env::var("CONDOR_BULK_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bulk_policy),
            log_failures: std::env::var("CONDOR_LOG_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_failures),
        }
    }

    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> CondorResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - max_depth > 0
    pub fn validate(&self) -> CondorResult<()> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_depth".to_string(),
                value: self.max_depth.to_string(),
                reason: "max_depth must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
