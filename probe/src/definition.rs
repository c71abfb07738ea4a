//! Probe definitions: which external command answers which check.

use std::time::Duration;

use riskcheck_core::CheckType;
use thiserror::Error;

/// An external program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProbeCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Binds one check type to the command that inspects it.
///
/// `timeout` overrides the scan-wide per-probe budget for this probe only.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use riskcheck_core::CheckType;
/// use riskcheck_probe::{ProbeCommand, ProbeDefinition};
///
/// let probe = ProbeDefinition::new(
///     CheckType::Firewall,
///     ProbeCommand::new("ufw", ["status"]),
/// )
/// .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(probe.name(), "firewall");
/// assert_eq!(probe.budget(Duration::from_secs(30)), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeDefinition {
    pub check_type: CheckType,
    pub command: ProbeCommand,
    pub timeout: Option<Duration>,
}

impl ProbeDefinition {
    pub fn new(check_type: CheckType, command: ProbeCommand) -> Self {
        Self {
            check_type,
            command,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &'static str {
        self.check_type.as_str()
    }

    /// The effective time budget, falling back to `default`.
    pub fn budget(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }
}

/// Errors raised while assembling a [`ProbeSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeSetError {
    #[error("probe set must contain at least one probe")]
    Empty,
    #[error("duplicate probe for check type: {0}")]
    Duplicate(CheckType),
}

/// A non-empty list of probes with at most one probe per check type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSet {
    probes: Vec<ProbeDefinition>,
}

impl ProbeSet {
    pub fn new(probes: Vec<ProbeDefinition>) -> Result<Self, ProbeSetError> {
        if probes.is_empty() {
            return Err(ProbeSetError::Empty);
        }
        for (index, probe) in probes.iter().enumerate() {
            if probes[..index]
                .iter()
                .any(|earlier| earlier.check_type == probe.check_type)
            {
                return Err(ProbeSetError::Duplicate(probe.check_type));
            }
        }
        Ok(Self { probes })
    }

    /// One probe per entry of [`CheckType::ALL`], in that order.
    pub(crate) fn for_all_checks(mut command: impl FnMut(CheckType) -> ProbeCommand) -> Self {
        let probes = CheckType::ALL
            .into_iter()
            .map(|check| ProbeDefinition::new(check, command(check)))
            .collect();
        Self { probes }
    }

    pub fn probes(&self) -> &[ProbeDefinition] {
        &self.probes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeDefinition> {
        self.probes.iter()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn get(&self, check_type: CheckType) -> Option<&ProbeDefinition> {
        self.probes.iter().find(|p| p.check_type == check_type)
    }

    pub fn check_types(&self) -> Vec<CheckType> {
        self.probes.iter().map(|p| p.check_type).collect()
    }

    /// Replaces the probe for the same check type, or appends it.
    pub fn with_override(mut self, definition: ProbeDefinition) -> Self {
        match self
            .probes
            .iter_mut()
            .find(|p| p.check_type == definition.check_type)
        {
            Some(existing) => *existing = definition,
            None => self.probes.push(definition),
        }
        self
    }

    /// Keeps only the probes whose check type is listed in `checks`.
    pub fn retain_checks(mut self, checks: &[CheckType]) -> Result<Self, ProbeSetError> {
        self.probes.retain(|p| checks.contains(&p.check_type));
        if self.probes.is_empty() {
            return Err(ProbeSetError::Empty);
        }
        Ok(self)
    }
}

impl<'a> IntoIterator for &'a ProbeSet {
    type Item = &'a ProbeDefinition;
    type IntoIter = std::slice::Iter<'a, ProbeDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.probes.iter()
    }
}
