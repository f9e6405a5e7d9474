#![forbid(unsafe_code)]

//! Fixture-driven conformance harness.
//!
//! Each fixture names one operation, its inputs, and the expected outputs or
//! expected error text. Fixtures live as JSON under `fixtures/`; the built-in
//! set ships inside the crate so the suite runs without a checkout.

use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;

use fa_columnar::{KeySet, ValueArray, ValueColumn};
use fa_index::{align, left_align, right_align, zero_up};
use fa_interval::{IntervalSet, in1d_intervals, interval_lookup, search_intervals};
use fa_join::{find_with_policy, lookup_with_policy};
use fa_runtime::{EvidenceLedger, IssueKind, RuntimeMode, RuntimePolicy};
use fa_types::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_FIXTURES: &str = include_str!("../fixtures/core_cases.json");

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        Self {
            fixture_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("fixture format error: {0}")]
    FixtureFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureOperation {
    ZeroUp,
    Align,
    RightAlign,
    LeftAlign,
    Find,
    Lookup,
    SearchIntervals,
    In1dIntervals,
    IntervalLookup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFixture {
    pub case_id: String,
    #[serde(default)]
    pub mode: RuntimeMode,
    pub operation: FixtureOperation,
    #[serde(default)]
    pub values: Option<KeySet>,
    #[serde(default)]
    pub arrays: Option<Vec<KeySet>>,
    #[serde(default)]
    pub left: Option<KeySet>,
    #[serde(default)]
    pub right: Option<KeySet>,
    #[serde(default)]
    pub query: Option<KeySet>,
    #[serde(default)]
    pub space: Option<KeySet>,
    #[serde(default)]
    pub keys: Option<KeySet>,
    #[serde(default)]
    pub lookup_values: Option<ValueColumn>,
    #[serde(default)]
    pub arguments: Option<KeySet>,
    #[serde(default)]
    pub fill_value: Option<Scalar>,
    #[serde(default)]
    pub vals: Option<KeySet>,
    #[serde(default)]
    pub low: Option<KeySet>,
    #[serde(default)]
    pub high: Option<KeySet>,
    #[serde(default)]
    pub tiebreak: Option<ValueArray>,
    #[serde(default)]
    pub symmetric: Option<bool>,
    #[serde(default)]
    pub expected_dense: Option<Vec<Vec<i64>>>,
    #[serde(default)]
    pub expected_keep: Option<Vec<bool>>,
    #[serde(default)]
    pub expected_filtered: Option<Vec<i64>>,
    #[serde(default)]
    pub expected_reference: Option<Vec<i64>>,
    #[serde(default)]
    pub expected_positions: Option<Vec<i64>>,
    #[serde(default)]
    pub expected_duplicate_signal: Option<bool>,
    #[serde(default)]
    pub expected_values: Option<ValueColumn>,
    #[serde(default)]
    pub expected_found: Option<Vec<bool>>,
    #[serde(default)]
    pub expected_interval_hits: Option<Vec<bool>>,
    #[serde(default)]
    pub expected_error_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub mode: RuntimeMode,
    pub operation: FixtureOperation,
    pub status: CaseStatus,
    pub mismatch: Option<String>,
    pub evidence_records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == CaseStatus::Pass)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> Vec<&CaseResult> {
        self.results
            .iter()
            .filter(|r| r.status == CaseStatus::Fail)
            .collect()
    }

    #[must_use]
    pub fn is_green(&self) -> bool {
        self.failed().is_empty()
    }
}

enum Outcome {
    Matched,
    Mismatch(String),
    Failed(String),
}

fn require<'a, T>(field: &'a Option<T>, name: &str) -> Result<&'a T, HarnessError> {
    field
        .as_ref()
        .ok_or_else(|| HarnessError::FixtureFormat(format!("missing field `{name}`")))
}

fn check<T: PartialEq + Debug>(what: &str, actual: &T, expected: Option<&T>) -> Option<String> {
    match expected {
        Some(expected) if expected != actual => Some(format!(
            "{what}: expected {expected:?}, actual {actual:?}"
        )),
        _ => None,
    }
}

fn first_mismatch(checks: impl IntoIterator<Item = Option<String>>) -> Outcome {
    checks
        .into_iter()
        .flatten()
        .next()
        .map_or(Outcome::Matched, Outcome::Mismatch)
}

fn policy_for(mode: RuntimeMode) -> RuntimePolicy {
    match mode {
        RuntimeMode::Strict => RuntimePolicy::strict(),
        RuntimeMode::Hardened => RuntimePolicy::hardened(),
    }
}

fn evaluate(
    fixture: &CaseFixture,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<Outcome, HarnessError> {
    let default_fill = Scalar::Int64(-1);
    let fill = fixture.fill_value.as_ref().unwrap_or(&default_fill);

    let outcome = match fixture.operation {
        FixtureOperation::ZeroUp => match zero_up(require(&fixture.values, "values")?) {
            Err(err) => Outcome::Failed(err.to_string()),
            Ok(dense) => first_mismatch([check(
                "dense",
                &vec![dense],
                fixture.expected_dense.as_ref(),
            )]),
        },
        FixtureOperation::Align => {
            let arrays: Vec<&KeySet> = require(&fixture.arrays, "arrays")?.iter().collect();
            match align(&arrays) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(dense) => {
                    first_mismatch([check("dense", &dense, fixture.expected_dense.as_ref())])
                }
            }
        }
        FixtureOperation::RightAlign | FixtureOperation::LeftAlign => {
            let left = require(&fixture.left, "left")?;
            let right = require(&fixture.right, "right")?;
            let result = if fixture.operation == FixtureOperation::RightAlign {
                right_align(left, right)
            } else {
                left_align(left, right)
            };
            match result {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(pair) => first_mismatch([
                    check("keep", &pair.keep, fixture.expected_keep.as_ref()),
                    check("filtered", &pair.filtered, fixture.expected_filtered.as_ref()),
                    check(
                        "reference",
                        &pair.reference,
                        fixture.expected_reference.as_ref(),
                    ),
                ]),
            }
        }
        FixtureOperation::Find => {
            let query = require(&fixture.query, "query")?;
            let space = require(&fixture.space, "space")?;
            match find_with_policy(query, space, policy, ledger) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(positions) => {
                    let signalled = ledger.issues(IssueKind::DuplicateKeys).next().is_some();
                    first_mismatch([
                        check(
                            "positions",
                            &positions,
                            fixture.expected_positions.as_ref(),
                        ),
                        check(
                            "duplicate_signal",
                            &signalled,
                            fixture.expected_duplicate_signal.as_ref(),
                        ),
                    ])
                }
            }
        }
        FixtureOperation::Lookup => {
            let keys = require(&fixture.keys, "keys")?;
            let values = require(&fixture.lookup_values, "lookup_values")?;
            let arguments = require(&fixture.arguments, "arguments")?;
            match lookup_with_policy(keys, values, arguments, fill, policy, ledger) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(out) => {
                    let signalled = ledger.issues(IssueKind::DuplicateKeys).next().is_some();
                    first_mismatch([
                        check("values", &out, fixture.expected_values.as_ref()),
                        check(
                            "duplicate_signal",
                            &signalled,
                            fixture.expected_duplicate_signal.as_ref(),
                        ),
                    ])
                }
            }
        }
        FixtureOperation::SearchIntervals
        | FixtureOperation::In1dIntervals
        | FixtureOperation::IntervalLookup => {
            let low = require(&fixture.low, "low")?.clone();
            let high = require(&fixture.high, "high")?.clone();
            match IntervalSet::new(low, high) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(intervals) => evaluate_interval_case(fixture, &intervals, fill)?,
            }
        }
    };
    Ok(outcome)
}

fn evaluate_interval_case(
    fixture: &CaseFixture,
    intervals: &IntervalSet,
    fill: &Scalar,
) -> Result<Outcome, HarnessError> {
    let outcome = match fixture.operation {
        FixtureOperation::SearchIntervals => {
            let vals = require(&fixture.vals, "vals")?;
            match search_intervals(vals, intervals, fixture.tiebreak.as_ref()) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(positions) => first_mismatch([check(
                    "positions",
                    &positions,
                    fixture.expected_positions.as_ref(),
                )]),
            }
        }
        FixtureOperation::In1dIntervals => {
            let vals = require(&fixture.vals, "vals")?;
            let symmetric = fixture.symmetric.unwrap_or(false);
            match in1d_intervals(vals, intervals, symmetric) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(membership) => first_mismatch([
                    check("found", &membership.found, fixture.expected_found.as_ref()),
                    check(
                        "interval_hits",
                        &membership.interval_hits,
                        fixture.expected_interval_hits.clone().map(Some).as_ref(),
                    ),
                ]),
            }
        }
        FixtureOperation::IntervalLookup => {
            let values = require(&fixture.lookup_values, "lookup_values")?;
            let arguments = require(&fixture.arguments, "arguments")?;
            match interval_lookup(
                intervals,
                values,
                arguments,
                fill,
                fixture.tiebreak.as_ref(),
            ) {
                Err(err) => Outcome::Failed(err.to_string()),
                Ok(out) => {
                    first_mismatch([check("values", &out, fixture.expected_values.as_ref())])
                }
            }
        }
        other => {
            return Err(HarnessError::FixtureFormat(format!(
                "{other:?} is not an interval operation"
            )));
        }
    };
    Ok(outcome)
}

/// Run one fixture under the policy its `mode` selects.
pub fn run_fixture(fixture: &CaseFixture) -> Result<CaseResult, HarnessError> {
    let policy = policy_for(fixture.mode);
    let mut ledger = EvidenceLedger::new();
    let outcome = evaluate(fixture, &policy, &mut ledger)?;

    let mismatch = match (outcome, fixture.expected_error_contains.as_deref()) {
        (Outcome::Matched, None) => None,
        (Outcome::Matched, Some(expected)) => Some(format!(
            "expected an error containing {expected:?} but the operation succeeded"
        )),
        (Outcome::Mismatch(detail), _) => Some(detail),
        (Outcome::Failed(message), Some(expected)) if message.contains(expected) => None,
        (Outcome::Failed(message), _) => Some(format!("operation failed: {message}")),
    };

    Ok(CaseResult {
        case_id: fixture.case_id.clone(),
        mode: fixture.mode,
        operation: fixture.operation,
        status: if mismatch.is_none() {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        },
        mismatch,
        evidence_records: ledger.records().len(),
    })
}

pub fn run_fixtures(fixtures: &[CaseFixture]) -> Result<SuiteReport, HarnessError> {
    let results = fixtures
        .iter()
        .map(run_fixture)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SuiteReport { results })
}

/// Parse a JSON array of fixtures.
pub fn load_fixtures(raw: &str) -> Result<Vec<CaseFixture>, HarnessError> {
    Ok(serde_json::from_str(raw)?)
}

pub fn builtin_fixtures() -> Result<Vec<CaseFixture>, HarnessError> {
    load_fixtures(BUILTIN_FIXTURES)
}

/// Load every `*.json` fixture file under the configured root, in file name
/// order, and run them all.
pub fn run_suite(config: &HarnessConfig) -> Result<SuiteReport, HarnessError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(&config.fixture_root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut fixtures = Vec::new();
    for path in paths {
        fixtures.extend(load_fixtures(&fs::read_to_string(&path)?)?);
    }
    run_fixtures(&fixtures)
}
