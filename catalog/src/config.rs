//! Application configuration.
//!
//! Every section has defaults, so a missing file or a partial document is a
//! valid configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! database:
//!   path: /var/lib/riskcheck/riskcheck.db
//! scan:
//!   probe_timeout_secs: 20
//!   global_timeout_secs: 45
//!   checks: [antivirus, updates, firewall]
//! probes:
//!   firewall:
//!     program: /usr/sbin/ufw
//!     args: [status]
//!     timeout_secs: 5
//! logging:
//!   filter: riskcheck=debug,info
//!   directory: /var/log/riskcheck
//! ```

use std::collections::{BTreeMap, HashSet};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use riskcheck_core::CheckType;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Largest accepted per-probe budget, in seconds.
pub const MAX_PROBE_TIMEOUT_SECS: u64 = 600;

/// Largest accepted whole-scan deadline, in seconds.
pub const MAX_GLOBAL_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("riskcheck.db"),
        }
    }
}

/// Scan timing and the set of enabled checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub probe_timeout_secs: u64,
    pub global_timeout_secs: u64,
    pub checks: Vec<CheckType>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 30,
            global_timeout_secs: 60,
            checks: CheckType::ALL.to_vec(),
        }
    }
}

/// Replacement command for one check's built-in probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOverride {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProbeOverride {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for `riskcheck.log` and the error-only `error.log`.
    /// Unset means stderr only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

/// Top-level application configuration.
///
/// # Examples
///
/// ```
/// use riskcheck_catalog::AppConfig;
/// use riskcheck_core::CheckType;
///
/// let config = AppConfig::from_yaml_str("scan:\n  checks: [firewall]\n").unwrap();
/// assert_eq!(config.scan.checks, vec![CheckType::Firewall]);
/// assert_eq!(config.scan.probe_timeout_secs, 30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scan: ScanSettings,
    /// Probe overrides keyed by check type name.
    pub probes: BTreeMap<String, ProbeOverride>,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](CatalogError::IoError) if the file cannot be read,
    /// or [`YamlError`](CatalogError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](CatalogError::IoError) if the file cannot be
    /// written, or [`YamlError`](CatalogError::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks value ranges and cross-references.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](CatalogError::InvalidConfig) naming the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        let scan = &self.scan;
        if scan.probe_timeout_secs == 0 || scan.probe_timeout_secs > MAX_PROBE_TIMEOUT_SECS {
            return Err(invalid(format!(
                "scan.probe_timeout_secs must be between 1 and {MAX_PROBE_TIMEOUT_SECS}, got {}",
                scan.probe_timeout_secs
            )));
        }
        if scan.global_timeout_secs == 0 || scan.global_timeout_secs > MAX_GLOBAL_TIMEOUT_SECS {
            return Err(invalid(format!(
                "scan.global_timeout_secs must be between 1 and {MAX_GLOBAL_TIMEOUT_SECS}, got {}",
                scan.global_timeout_secs
            )));
        }
        if scan.checks.is_empty() {
            return Err(invalid("scan.checks must enable at least one check"));
        }
        let mut seen = HashSet::new();
        for check in &scan.checks {
            if !seen.insert(check) {
                return Err(invalid(format!("scan.checks lists '{check}' more than once")));
            }
        }

        for (name, probe) in &self.probes {
            if name.parse::<CheckType>().is_err() {
                return Err(invalid(format!("probes.{name} is not a known check type")));
            }
            if probe.program.trim().is_empty() {
                return Err(invalid(format!("probes.{name}.program cannot be empty")));
            }
            if let Some(secs) = probe.timeout_secs {
                if secs == 0 || secs > MAX_PROBE_TIMEOUT_SECS {
                    return Err(invalid(format!(
                        "probes.{name}.timeout_secs must be between 1 and {MAX_PROBE_TIMEOUT_SECS}, got {secs}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.scan.probe_timeout_secs)
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.scan.global_timeout_secs)
    }

    /// Probe overrides resolved to their check types, in check order.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](CatalogError::InvalidConfig) for a key that
    /// is not a check type.
    pub fn probe_overrides(&self) -> Result<Vec<(CheckType, &ProbeOverride)>> {
        let mut overrides = self
            .probes
            .iter()
            .map(|(name, probe)| {
                name.parse::<CheckType>()
                    .map(|check| (check, probe))
                    .map_err(|e| invalid(format!("probes.{name}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        overrides.sort_by_key(|(check, _)| *check);
        Ok(overrides)
    }
}

fn invalid(message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
database:
  path: /tmp/riskcheck-test.db
scan:
  probe_timeout_secs: 5
  global_timeout_secs: 12
  checks: [antivirus, firewall]
probes:
  firewall:
    program: sh
    args: ["-c", "echo 'Status: active'"]
    timeout_secs: 2
logging:
  filter: debug
  directory: /tmp/riskcheck-logs
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config = AppConfig::from_yaml_str(sample_yaml()).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/riskcheck-test.db"));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.global_timeout(), Duration::from_secs(12));
        assert_eq!(config.scan.checks, vec![CheckType::Antivirus, CheckType::Firewall]);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(
            config.logging.directory.as_deref(),
            Some(Path::new("/tmp/riskcheck-logs"))
        );

        let overrides = config.probe_overrides().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, CheckType::Firewall);
        assert_eq!(overrides[0].1.timeout(), Some(Duration::from_secs(2)));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = AppConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scan.checks.len(), 6);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.logging.directory, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = AppConfig::default();
        config.scan.probe_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(CatalogError::InvalidConfig(_))));

        let mut config = AppConfig::default();
        config.scan.probe_timeout_secs = MAX_PROBE_TIMEOUT_SECS + 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scan.global_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_timeouts_rejected() {
        let yaml = "scan:\n  global_timeout_secs: 18446744073709551615\n";
        let err = AppConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("scan.global_timeout_secs"));

        let yaml = "probes:\n  firewall:\n    program: sh\n    timeout_secs: 18446744073709551615\n";
        let err = AppConfig::from_yaml_str(yaml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("probes.firewall.timeout_secs"));

        let mut config = AppConfig::default();
        config.scan.global_timeout_secs = MAX_GLOBAL_TIMEOUT_SECS;
        config.probes.insert(
            "firewall".to_string(),
            ProbeOverride {
                program: "sh".to_string(),
                args: Vec::new(),
                timeout_secs: Some(MAX_PROBE_TIMEOUT_SECS),
            },
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_duplicate_checks_rejected() {
        let config =
            AppConfig::from_yaml_str("scan:\n  checks: [backup, backup]\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_override_rejected() {
        let yaml = "probes:\n  antivirsu:\n    program: sh\n";
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("probes.antivirsu"));
        assert!(config.probe_overrides().is_err());
    }

    #[test]
    fn test_unknown_check_in_list_is_yaml_error() {
        let err = AppConfig::from_yaml_str("scan:\n  checks: [toaster]\n").unwrap_err();
        assert!(matches!(err, CatalogError::YamlError(_)));
    }

    #[test]
    fn test_load_or_default_and_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riskcheck.yml");

        assert_eq!(AppConfig::load_or_default(&path).unwrap(), AppConfig::default());

        let original = AppConfig::from_yaml_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
