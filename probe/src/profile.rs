//! Per-check message and suggestion table.

use riskcheck_core::{CheckType, LaunchFailure};

/// Human-facing text for one check type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckProfile {
    pub check_type: CheckType,
    pub label: &'static str,
    pub healthy: &'static str,
    pub unhealthy: &'static str,
    /// Shown when only some sub-checks returned data.
    pub partial: &'static str,
    pub suggestions: &'static [&'static str],
}

static PROFILES: [CheckProfile; 6] = [
    CheckProfile {
        check_type: CheckType::Antivirus,
        label: "Antivirus",
        healthy: "Real-time antivirus protection is enabled",
        unhealthy: "Real-time antivirus protection is disabled",
        partial: "Antivirus status is incomplete",
        suggestions: &[
            "Turn on real-time protection in Windows Security",
            "Install a supported antivirus product if none is active",
        ],
    },
    CheckProfile {
        check_type: CheckType::Updates,
        label: "Updates",
        healthy: "All available updates are installed",
        unhealthy: "Updates are waiting to be installed",
        partial: "Update status is incomplete",
        suggestions: &[
            "Install pending updates and restart when asked",
            "Enable automatic updates",
        ],
    },
    CheckProfile {
        check_type: CheckType::Firewall,
        label: "Firewall",
        healthy: "Firewall is enabled",
        unhealthy: "No firewall profile is enabled",
        partial: "Firewall status is incomplete",
        suggestions: &["Enable the firewall for every network profile"],
    },
    CheckProfile {
        check_type: CheckType::Backup,
        label: "Backup",
        healthy: "Backup features are configured",
        unhealthy: "No backup information could be collected",
        partial: "Some backup features could not be checked",
        suggestions: &[
            "Configure File History or another scheduled backup",
            "Keep at least one recent backup offline",
        ],
    },
    CheckProfile {
        check_type: CheckType::Encryption,
        label: "Encryption",
        healthy: "Disk encryption status collected for all drives",
        unhealthy: "Disk encryption status could not be collected",
        partial: "Disk encryption status is incomplete",
        suggestions: &["Enable BitLocker or device encryption on every fixed drive"],
    },
    CheckProfile {
        check_type: CheckType::Network,
        label: "Network",
        healthy: "Network configuration collected",
        unhealthy: "Network configuration could not be collected",
        partial: "Network configuration is incomplete",
        suggestions: &[
            "Review active network adapters and DNS servers",
            "Disable network adapters that are not in use",
        ],
    },
];

/// Looks up the profile for `check_type`.
pub fn profile(check_type: CheckType) -> &'static CheckProfile {
    let index = match check_type {
        CheckType::Antivirus => 0,
        CheckType::Updates => 1,
        CheckType::Firewall => 2,
        CheckType::Backup => 3,
        CheckType::Encryption => 4,
        CheckType::Network => 5,
    };
    &PROFILES[index]
}

/// Suggestions for a probe that could not be started.
pub fn launch_suggestions(failure: LaunchFailure) -> &'static [&'static str] {
    match failure {
        LaunchFailure::NotFound => &[
            "Make sure the required system utility is installed",
            "Check that PowerShell is available on this machine",
        ],
        LaunchFailure::PermissionDenied => &["Run riskcheck as administrator"],
        LaunchFailure::Other => &[
            "Retry the system scan",
            "Run `riskcheck diagnose` to check the environment",
        ],
    }
}

pub const TIMEOUT_SUGGESTIONS: &[&str] = &[
    "Retry the system scan",
    "Raise scan.probe_timeout_secs in the configuration",
];

pub const INVALID_DATA_SUGGESTIONS: &[&str] = &[
    "Retry the system scan",
    "Run `riskcheck diagnose` to check the environment",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_check_has_matching_profile() {
        for check in CheckType::ALL {
            let profile = profile(check);
            assert_eq!(profile.check_type, check);
            assert!(!profile.suggestions.is_empty());
        }
    }
}
