//! Built-in probe commands for the current platform.
//!
//! On Windows every check is a PowerShell one-shot (plus `netsh` for the
//! firewall) launched by absolute System32 path. Elsewhere the checks are
//! POSIX `sh` scripts that query common Linux tooling. Both print the payload
//! shapes documented in [`crate::payload`].

use riskcheck_core::CheckType;

use crate::definition::{ProbeCommand, ProbeSet};

#[cfg(windows)]
pub(crate) const POWERSHELL_EXE: &str = r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe";
#[cfg(windows)]
const NETSH_EXE: &str = r"C:\Windows\System32\netsh.exe";

#[cfg(not(windows))]
pub(crate) const SH: &str = "/bin/sh";

/// The default probe for every check type, in canonical order.
pub fn default_probes() -> ProbeSet {
    ProbeSet::for_all_checks(default_command)
}

/// The built-in command for one check.
#[cfg(windows)]
pub fn default_command(check_type: CheckType) -> ProbeCommand {
    match check_type {
        CheckType::Firewall => ProbeCommand::new(NETSH_EXE, ["advfirewall", "show", "allprofiles", "state"]),
        CheckType::Antivirus => powershell(ANTIVIRUS_PS.to_string()),
        CheckType::Updates => powershell(UPDATES_PS.to_string()),
        CheckType::Backup => powershell(format!("{SUB_CHECK_PS}\n{BACKUP_PS}")),
        CheckType::Encryption => powershell(ENCRYPTION_PS.to_string()),
        CheckType::Network => powershell(format!("{SUB_CHECK_PS}\n{NETWORK_PS}")),
    }
}

/// The built-in command for one check.
#[cfg(not(windows))]
pub fn default_command(check_type: CheckType) -> ProbeCommand {
    let script = match check_type {
        CheckType::Antivirus => ANTIVIRUS_SH,
        CheckType::Updates => UPDATES_SH,
        CheckType::Firewall => FIREWALL_SH,
        CheckType::Backup => BACKUP_SH,
        CheckType::Encryption => ENCRYPTION_SH,
        CheckType::Network => NETWORK_SH,
    };
    ProbeCommand::new(SH, ["-c", script])
}

#[cfg(windows)]
pub(crate) fn powershell(script: String) -> ProbeCommand {
    ProbeCommand::new(
        POWERSHELL_EXE,
        [
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-ExecutionPolicy".to_string(),
            "Bypass".to_string(),
            "-Command".to_string(),
            script,
        ],
    )
}

#[cfg(windows)]
const ANTIVIRUS_PS: &str = "Get-MpComputerStatus | Select-Object AntivirusEnabled,RealTimeProtectionEnabled,AntivirusSignatureVersion,QuickScanEndTime | ConvertTo-Json -Compress";

#[cfg(windows)]
const UPDATES_PS: &str = r#"
$ErrorActionPreference = 'Stop'
try {
    $searcher = (New-Object -ComObject Microsoft.Update.Session).CreateUpdateSearcher()
    $pending = $searcher.Search('IsInstalled=0 and IsHidden=0').Updates.Count
    $reboot = Test-Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\WindowsUpdate\Auto Update\RebootRequired'
    @{ status = 'success'; data = @{ pending_count = $pending; reboot_required = $reboot } } | ConvertTo-Json -Compress
} catch {
    @{ status = 'error'; error = 'Update check failed'; details = $_.Exception.Message } | ConvertTo-Json -Compress
}
"#;

#[cfg(windows)]
const SUB_CHECK_PS: &str = r#"
function Invoke-SubCheck([string]$Name, [scriptblock]$Body) {
    try { @{ name = $Name; data = (& $Body) } }
    catch { @{ name = $Name; available = $false; error = $_.Exception.Message } }
}
"#;

#[cfg(windows)]
const BACKUP_PS: &str = r#"
$checks = @(
    (Invoke-SubCheck 'file_history' { @{ service = [string](Get-Service -Name fhsvc -ErrorAction Stop).Status } }),
    (Invoke-SubCheck 'restore_points' { @{ count = @(Get-ComputerRestorePoint -ErrorAction Stop).Count } }),
    (Invoke-SubCheck 'shadow_copies' { @{ count = @(Get-CimInstance Win32_ShadowCopy -ErrorAction Stop).Count } })
)
@{ status = 'success'; data = @{ checks = $checks } } | ConvertTo-Json -Depth 6 -Compress
"#;

#[cfg(windows)]
const ENCRYPTION_PS: &str = r#"
$ErrorActionPreference = 'Stop'
try {
    $checks = @(Get-BitLockerVolume | ForEach-Object {
        @{ name = $_.MountPoint; data = @{
            protection_status = [string]$_.ProtectionStatus
            volume_status = [string]$_.VolumeStatus
            encryption_percentage = $_.EncryptionPercentage
        } }
    })
    @{ status = 'success'; data = @{ checks = $checks } } | ConvertTo-Json -Depth 6 -Compress
} catch {
    @{ status = 'error'; error = 'Encryption check failed'; details = $_.Exception.Message } | ConvertTo-Json -Compress
}
"#;

#[cfg(windows)]
const NETWORK_PS: &str = r#"
$checks = @(
    (Invoke-SubCheck 'adapters' { @{ up = @(Get-NetAdapter -ErrorAction Stop | Where-Object { $_.Status -eq 'Up' }).Count } }),
    (Invoke-SubCheck 'dns_servers' { @{ servers = @(Get-DnsClientServerAddress -AddressFamily IPv4 -ErrorAction Stop | ForEach-Object { $_.ServerAddresses }) } }),
    (Invoke-SubCheck 'connections' { @{ established = @(Get-NetTCPConnection -State Established -ErrorAction Stop).Count } })
)
@{ status = 'success'; data = @{ checks = $checks } } | ConvertTo-Json -Depth 6 -Compress
"#;

#[cfg(not(windows))]
const ANTIVIRUS_SH: &str = r#"
if pgrep -x clamd >/dev/null 2>&1 || pgrep -x clamonacc >/dev/null 2>&1; then
    echo '{"real_time_protection_enabled":true,"product_name":"ClamAV"}'
else
    echo '{"real_time_protection_enabled":false}'
fi
"#;

#[cfg(not(windows))]
const UPDATES_SH: &str = r#"
if command -v apt-get >/dev/null 2>&1; then
    n=$(apt-get -s upgrade 2>/dev/null | grep -c '^Inst ')
elif command -v dnf >/dev/null 2>&1; then
    n=$(dnf -q check-update 2>/dev/null | grep -c '^[[:alnum:]]')
else
    echo '{"status":"error","error":"no supported package manager found"}'
    exit 0
fi
reboot=false
[ -f /var/run/reboot-required ] && reboot=true
printf '{"pending_count":%s,"reboot_required":%s}\n' "${n:-0}" "$reboot"
"#;

#[cfg(not(windows))]
const FIREWALL_SH: &str = r#"
if command -v ufw >/dev/null 2>&1; then
    ufw status
elif command -v firewall-cmd >/dev/null 2>&1; then
    firewall-cmd --state
else
    echo '{"profiles":[]}'
fi
"#;

#[cfg(not(windows))]
const BACKUP_SH: &str = r#"
sep=''
printf '{"checks":['
for tool in timeshift borg restic rsnapshot deja-dup; do
    if command -v "$tool" >/dev/null 2>&1; then available=true; else available=false; fi
    printf '%s{"name":"%s","available":%s}' "$sep" "$tool" "$available"
    sep=','
done
printf ']}\n'
"#;

#[cfg(not(windows))]
const ENCRYPTION_SH: &str = r#"
if ! command -v lsblk >/dev/null 2>&1; then
    echo '{"status":"error","error":"lsblk is not available"}'
    exit 0
fi
crypt=$(lsblk -rno TYPE 2>/dev/null | grep -c '^crypt$')
luks=false
[ "${crypt:-0}" -gt 0 ] && luks=true
swap=false
swapon --show=NAME --noheadings 2>/dev/null | grep -q '^/dev/\(mapper\|dm-\)' && swap=true
printf '{"checks":[{"name":"luks_volumes","available":%s,"data":{"count":%s}},{"name":"encrypted_swap","available":%s}]}\n' "$luks" "${crypt:-0}" "$swap"
"#;

#[cfg(not(windows))]
const NETWORK_SH: &str = r#"
printf '{"checks":['
if command -v ip >/dev/null 2>&1; then
    up=$(ip -brief link show up 2>/dev/null | grep -vc '^lo ')
    printf '{"name":"adapters","data":{"up":%s}}' "${up:-0}"
else
    printf '{"name":"adapters","available":false}'
fi
if [ -r /etc/resolv.conf ]; then
    dns=$(grep -c '^nameserver' /etc/resolv.conf)
    printf ',{"name":"dns_servers","data":{"count":%s}}' "${dns:-0}"
else
    printf ',{"name":"dns_servers","available":false}'
fi
if command -v ss >/dev/null 2>&1; then
    listening=$(ss -Htln 2>/dev/null | wc -l)
    printf ',{"name":"listening_ports","data":{"tcp":%s}}' "$listening"
else
    printf ',{"name":"listening_ports","available":false}'
fi
printf ']}\n'
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_probes_cover_every_check() {
        let probes = default_probes();
        assert_eq!(probes.check_types(), CheckType::ALL.to_vec());
        assert!(probes.iter().all(|p| p.timeout.is_none()));
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_script_output_parses() {
        use crate::runner::{CancelFlag, run_probe};
        use riskcheck_core::CheckStatus;
        use std::time::Duration;

        let probes = default_probes();
        let backup = probes.get(CheckType::Backup).unwrap();
        let outcome = run_probe(backup, Duration::from_secs(10), &CancelFlag::new());
        let result = crate::normalize(CheckType::Backup, &outcome);
        assert_ne!(result.message, crate::normalize::INVALID_STATUS_DATA);
        assert!(matches!(
            result.status,
            CheckStatus::Success | CheckStatus::Partial | CheckStatus::Error
        ));
    }
}
