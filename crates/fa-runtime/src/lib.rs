#![forbid(unsafe_code)]

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    /// Duplicate search keys are rejected.
    Strict,
    /// Duplicate search keys are reported and the lowest position wins.
    #[default]
    Hardened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Allow,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub kind: IssueKind,
    pub subject: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts_unix_ms: u64,
    pub mode: RuntimeMode,
    pub action: DecisionAction,
    pub issue: CompatibilityIssue,
}

/// Append-only record of every advisory decision taken during a call chain.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLedger {
    records: Vec<DecisionRecord>,
}

impl EvidenceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: DecisionRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one issue kind, oldest first.
    pub fn issues(&self, kind: IssueKind) -> impl Iterator<Item = &DecisionRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| record.issue.kind == kind)
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("system clock is before UNIX_EPOCH")]
    ClockSkew,
    #[error("invalid runtime policy: {0}")]
    InvalidPolicy(#[from] serde_json::Error),
}

fn now_unix_ms() -> Result<u64, RuntimeError> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| RuntimeError::ClockSkew)?
        .as_millis();
    Ok(ms as u64)
}

/// Caller-facing configuration for the join and search kernels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimePolicy {
    pub mode: RuntimeMode,
    /// Upper bound on how many duplicated keys a warning spells out.
    pub max_reported_duplicates: usize,
}

impl RuntimePolicy {
    pub const DEFAULT_MAX_REPORTED_DUPLICATES: usize = 8;

    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            max_reported_duplicates: Self::DEFAULT_MAX_REPORTED_DUPLICATES,
        }
    }

    #[must_use]
    pub fn hardened() -> Self {
        Self {
            mode: RuntimeMode::Hardened,
            max_reported_duplicates: Self::DEFAULT_MAX_REPORTED_DUPLICATES,
        }
    }

    /// Parse a policy from JSON; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, RuntimeError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Decide what to do about a search space holding `duplicate_keys`
    /// repeated keys. The decision is logged and appended to `ledger`.
    ///
    /// `sample` is a rendering of some of the repeated keys; only the first
    /// `max_reported_duplicates` entries end up in the record.
    pub fn decide_duplicate_keys(
        &self,
        subject: impl Into<String>,
        duplicate_keys: usize,
        sample: &[String],
        ledger: &mut EvidenceLedger,
    ) -> DecisionAction {
        let subject = subject.into();
        let shown = &sample[..sample.len().min(self.max_reported_duplicates)];
        let action = match self.mode {
            RuntimeMode::Strict => DecisionAction::Reject,
            RuntimeMode::Hardened => DecisionAction::Allow,
        };

        tracing::warn!(
            subject = %subject,
            duplicate_keys,
            mode = ?self.mode,
            action = ?action,
            "duplicate keys in search space; the lowest position wins"
        );

        ledger.push(DecisionRecord {
            ts_unix_ms: now_unix_ms().unwrap_or_default(),
            mode: self.mode,
            action,
            issue: CompatibilityIssue {
                kind: IssueKind::DuplicateKeys,
                subject,
                detail: format!("duplicate_keys={duplicate_keys} sample=[{}]", shown.join(", ")),
            },
        });
        action
    }
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self::hardened()
    }
}
