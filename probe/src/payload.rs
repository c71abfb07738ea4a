//! Typed probe payloads and their parsers.
//!
//! A probe prints one of three shapes on stdout:
//!
//! - a JSON envelope, `{"status":"success","data":{...}}` or
//!   `{"status":"error","error":"...","details":...}`;
//! - bare JSON data (e.g. `Get-MpComputerStatus | ConvertTo-Json`);
//! - for the firewall check only, the plain-text output of
//!   `netsh advfirewall show allprofiles state`, `ufw status` or
//!   `firewall-cmd --state`.
//!
//! PowerShell serializes booleans inconsistently (`true`, `1`, `"True"`) and
//! unrolls single-element arrays into a bare object, so both are accepted.
//!
//! # Examples
//!
//! ```
//! use riskcheck_core::CheckType;
//! use riskcheck_probe::payload::{CheckPayload, parse_payload};
//!
//! let stdout = r#"{"status":"success","data":{"RealTimeProtectionEnabled":"True"}}"#;
//! match parse_payload(CheckType::Antivirus, stdout).unwrap() {
//!     CheckPayload::Antivirus(av) => assert!(av.real_time_protection_enabled),
//!     other => panic!("unexpected payload: {other:?}"),
//! }
//! ```

use std::sync::LazyLock;

use regex::Regex;
use riskcheck_core::CheckType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a probe's stdout could not be turned into a [`CheckPayload`].
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("empty probe output")]
    Empty,
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized text output")]
    UnrecognizedText,
    /// The probe ran but reported its own failure through the envelope.
    #[error("{message}")]
    Reported { message: String, details: Value },
}

/// Windows Defender style antivirus status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntivirusPayload {
    #[serde(alias = "RealTimeProtectionEnabled", deserialize_with = "lenient_bool")]
    pub real_time_protection_enabled: bool,
    #[serde(
        default,
        alias = "AntivirusEnabled",
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub antivirus_enabled: Option<bool>,
    #[serde(default, alias = "ProductName", skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(
        default,
        alias = "AntivirusSignatureVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub signature_version: Option<String>,
    #[serde(default, alias = "QuickScanEndTime", skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<String>,
}

/// Pending operating system updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesPayload {
    #[serde(alias = "PendingCount")]
    pub pending_count: u32,
    #[serde(
        default,
        alias = "RebootRequired",
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub reboot_required: Option<bool>,
    #[serde(default, alias = "LastInstall", skip_serializing_if = "Option::is_none")]
    pub last_install: Option<String>,
}

/// One firewall profile (Domain/Private/Public, or a Linux backend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallProfile {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Enabled", deserialize_with = "lenient_bool")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPayload {
    pub profiles: Vec<FirewallProfile>,
}

impl FirewallPayload {
    pub fn enabled_profiles(&self) -> impl Iterator<Item = &FirewallProfile> {
        self.profiles.iter().filter(|p| p.enabled)
    }
}

/// One sub-probe of an aggregated check (backup, encryption, network).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCheck {
    #[serde(alias = "Name")]
    pub name: String,
    /// False when the feature being queried does not exist on this host.
    #[serde(default = "default_true", alias = "Available", deserialize_with = "lenient_bool")]
    pub available: bool,
    #[serde(default, alias = "Error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, alias = "Data", skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl SubCheck {
    /// Returned data, with the feature present and no sub-probe error.
    pub fn is_usable(&self) -> bool {
        self.available && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCheckPayload {
    pub checks: Vec<SubCheck>,
}

impl SubCheckPayload {
    pub fn usable(&self) -> impl Iterator<Item = &SubCheck> {
        self.checks.iter().filter(|c| c.is_usable())
    }

    pub fn unusable(&self) -> impl Iterator<Item = &SubCheck> {
        self.checks.iter().filter(|c| !c.is_usable())
    }
}

/// A parsed payload, tagged by the check that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckPayload {
    Antivirus(AntivirusPayload),
    Updates(UpdatesPayload),
    Firewall(FirewallPayload),
    Backup(SubCheckPayload),
    Encryption(SubCheckPayload),
    Network(SubCheckPayload),
}

/// Parses a probe's stdout according to `check_type`.
pub fn parse_payload(check_type: CheckType, stdout: &str) -> Result<CheckPayload, PayloadError> {
    let text = stdout.trim();
    if text.is_empty() {
        return Err(PayloadError::Empty);
    }
    if check_type == CheckType::Firewall && !text.starts_with(['{', '[']) {
        return parse_firewall_text(text).map(CheckPayload::Firewall);
    }

    let data = unwrap_envelope(serde_json::from_str(text)?)?;
    let payload = match check_type {
        CheckType::Antivirus => CheckPayload::Antivirus(serde_json::from_value(data)?),
        CheckType::Updates => CheckPayload::Updates(serde_json::from_value(data)?),
        CheckType::Firewall => CheckPayload::Firewall(FirewallPayload {
            profiles: keyed_list(data, "profiles", "Profiles")?,
        }),
        CheckType::Backup => CheckPayload::Backup(sub_checks(data)?),
        CheckType::Encryption => CheckPayload::Encryption(sub_checks(data)?),
        CheckType::Network => CheckPayload::Network(sub_checks(data)?),
    };
    Ok(payload)
}

fn sub_checks(data: Value) -> Result<SubCheckPayload, serde_json::Error> {
    Ok(SubCheckPayload {
        checks: keyed_list(data, "checks", "Checks")?,
    })
}

fn unwrap_envelope(value: Value) -> Result<Value, PayloadError> {
    let mut map = match value {
        Value::Object(map) if is_envelope(&map) => map,
        other => return Ok(other),
    };

    let status = map
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase();
    if status == "error" || status == "failed" || !map.contains_key("data") {
        let message = map
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("probe reported an error")
            .to_string();
        return Err(PayloadError::Reported {
            message,
            details: map.remove("details").unwrap_or(Value::Null),
        });
    }
    Ok(map.remove("data").unwrap_or(Value::Null))
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.get("status").is_some_and(Value::is_string)
        && (map.contains_key("data") || map.contains_key("error"))
}

/// Reads a list that may sit under `key`, be the value itself, or have been
/// unrolled into a single object.
fn keyed_list<T: DeserializeOwned>(
    data: Value,
    key: &str,
    alias: &str,
) -> Result<Vec<T>, serde_json::Error> {
    match data {
        Value::Object(mut map) => match map.remove(key).or_else(|| map.remove(alias)) {
            Some(inner) => one_or_many(inner),
            None => one_or_many(Value::Object(map)),
        },
        other => one_or_many(other),
    }
}

fn one_or_many<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_json::Error> {
    match value {
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        other => serde_json::from_value(other),
    }
}

static PROFILE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\w+)\s+Profile Settings:?\s*$").expect("static regex must compile")
});
static NETSH_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*State\s+(ON|OFF)\s*$").expect("static regex must compile"));
static UFW_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*Status:\s*(active|inactive)\s*$").expect("static regex must compile")
});
static FIREWALLD_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(running|not running)\s*$").expect("static regex must compile")
});

/// Parses netsh, ufw or firewalld text into firewall profiles.
pub fn parse_firewall_text(text: &str) -> Result<FirewallPayload, PayloadError> {
    let mut profiles = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = PROFILE_HEADER.captures(line) {
            current = Some(caps[1].to_string());
        } else if let Some(caps) = NETSH_STATE.captures(line) {
            profiles.push(FirewallProfile {
                name: current.take().unwrap_or_else(|| "default".to_string()),
                enabled: caps[1].eq_ignore_ascii_case("on"),
            });
        } else if let Some(caps) = UFW_STATUS.captures(line) {
            profiles.push(FirewallProfile {
                name: "ufw".to_string(),
                enabled: caps[1].eq_ignore_ascii_case("active"),
            });
        } else if let Some(caps) = FIREWALLD_STATE.captures(line) {
            profiles.push(FirewallProfile {
                name: "firewalld".to_string(),
                enabled: caps[1].eq_ignore_ascii_case("running"),
            });
        }
    }

    if profiles.is_empty() {
        return Err(PayloadError::UnrecognizedText);
    }
    Ok(FirewallPayload { profiles })
}

fn default_true() -> bool {
    true
}

fn bool_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "enabled" => Some(true),
            "false" | "0" | "no" | "off" | "disabled" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    bool_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a boolean, got {value}")))
}

fn lenient_opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    bool_from_value(&value)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a boolean, got {value}")))
}
