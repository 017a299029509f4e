//! Service configuration: YAML file, then `INTAKE_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::verify::{VerifyLimits, VerifyLimitsOverrides};

/// What a second stream for an already promoted transaction does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Re-verify and re-promote under the same key.
    #[default]
    Allow,
    /// Fail with `AlreadyPromoted`.
    Reject,
}

impl std::str::FromStr for ReplayPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidValue {
                key: "replay",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeConfig {
    /// Promotion target, e.g. `memory://`, `file:///var/lib/intake`, `s3://bucket/prefix`.
    pub store_url: String,
    /// Bucket reported in receipts (and used as the bucket for non-s3 backends).
    pub bucket: String,
    /// Where staged archives live. `None` means the system temp dir.
    pub temp_dir: Option<PathBuf>,
    pub stream_timeout_secs: u64,
    pub promote_timeout_secs: u64,
    pub replay: ReplayPolicy,
    /// Registered manifests older than this are forgotten. `None` keeps them forever.
    pub manifest_ttl_secs: Option<u64>,
    pub limits: VerifyLimitsOverrides,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            store_url: "memory://".to_string(),
            bucket: "upload-test".to_string(),
            temp_dir: None,
            stream_timeout_secs: 300,
            promote_timeout_secs: 300,
            replay: ReplayPolicy::default(),
            manifest_ttl_secs: None,
            limits: VerifyLimitsOverrides::default(),
        }
    }
}

impl IntakeConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Apply `INTAKE_*` variables from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `INTAKE_*` variables from `lookup`.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("INTAKE_STORE_URL") {
            self.store_url = v;
        }
        if let Some(v) = lookup("INTAKE_BUCKET") {
            self.bucket = v;
        }
        if let Some(v) = lookup("INTAKE_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("INTAKE_STREAM_TIMEOUT_SECS") {
            self.stream_timeout_secs = parse_secs("INTAKE_STREAM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("INTAKE_PROMOTE_TIMEOUT_SECS") {
            self.promote_timeout_secs = parse_secs("INTAKE_PROMOTE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("INTAKE_REPLAY") {
            self.replay = v.parse()?;
        }
        if let Some(v) = lookup("INTAKE_MANIFEST_TTL_SECS") {
            self.manifest_ttl_secs = Some(parse_secs("INTAKE_MANIFEST_TTL_SECS", &v)?);
        }
        Ok(self)
    }

    pub fn limits(&self) -> VerifyLimits {
        VerifyLimits::default().apply(self.limits.clone())
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    pub fn promote_timeout(&self) -> Duration {
        Duration::from_secs(self.promote_timeout_secs)
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let cfg = IntakeConfig::default();
        assert_eq!(cfg.store_url, "memory://");
        assert_eq!(cfg.bucket, "upload-test");
        assert_eq!(cfg.replay, ReplayPolicy::Allow);
        assert_eq!(cfg.stream_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.limits(), VerifyLimits::default());
    }

    #[test]
    fn yaml_partial_with_limits() {
        let cfg = IntakeConfig::from_yaml_str(
            "bucket: archives\nreplay: reject\nlimits:\n  max_entries: 10\n",
        )
        .unwrap();
        assert_eq!(cfg.bucket, "archives");
        assert_eq!(cfg.store_url, "memory://");
        assert_eq!(cfg.replay, ReplayPolicy::Reject);
        assert_eq!(cfg.limits().max_entries, 10);
        assert_eq!(cfg.limits().max_compression_ratio, 100);
    }

    #[test]
    fn yaml_unknown_limit_key_is_rejected() {
        let err = IntakeConfig::from_yaml_str("limits:\n  max_entires: 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("INTAKE_STORE_URL", "file:///srv/intake"),
            ("INTAKE_REPLAY", "REJECT"),
            ("INTAKE_MANIFEST_TTL_SECS", "3600"),
        ]
        .into_iter()
        .collect();
        let cfg = IntakeConfig::from_yaml_str("store_url: s3://b/p\n")
            .unwrap()
            .with_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.store_url, "file:///srv/intake");
        assert_eq!(cfg.replay, ReplayPolicy::Reject);
        assert_eq!(cfg.manifest_ttl_secs, Some(3600));
    }

    #[test]
    fn env_bad_number() {
        let err = IntakeConfig::default()
            .with_env_from(|k| (k == "INTAKE_STREAM_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("INTAKE_STREAM_TIMEOUT_SECS"));
    }
}
