#![forbid(unsafe_code)]

//! Positional equality joins built on sort and group-by.
//!
//! [`find`] reports where each query row sits in a search space and
//! [`lookup`] evaluates a finite keys → values function. Neither builds a hash
//! table: the space and query are concatenated, grouped once, and the lowest
//! space position of every group is broadcast back to the query rows.

use fa_columnar::{ColumnError, KeySet, ValueColumn};
use fa_groupby::{GroupBy, GroupByError};
use fa_runtime::{DecisionAction, EvidenceLedger, RuntimePolicy};
use fa_types::{DType, Scalar};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum JoinError {
    #[error("{argument} has {actual} columns, expected {expected}")]
    ArityMismatch {
        argument: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{argument} column {column} has dtype {actual}, expected {expected}")]
    DtypeMismatch {
        argument: &'static str,
        column: usize,
        expected: DType,
        actual: DType,
    },
    #[error("values has {actual} entries but keys has {expected}")]
    ValuesLengthMismatch { expected: usize, actual: usize },
    #[error("search space holds {count} duplicated keys")]
    DuplicateKeys { count: usize },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
}

/// Not-found marker in every index result.
pub const NOT_FOUND: i64 = -1;

fn validate_find_arguments(query: &KeySet, space: &KeySet) -> Result<(), JoinError> {
    if query.arity() != space.arity() {
        return Err(JoinError::ArityMismatch {
            argument: "query",
            expected: space.arity(),
            actual: query.arity(),
        });
    }
    for (column, (q, s)) in query.columns().iter().zip(space.columns()).enumerate() {
        if q.dtype() != s.dtype() {
            return Err(JoinError::DtypeMismatch {
                argument: "query",
                column,
                expected: s.dtype(),
                actual: q.dtype(),
            });
        }
    }
    Ok(())
}

fn render_row(keys: &KeySet, row: usize) -> String {
    let parts: Vec<String> = keys
        .columns()
        .iter()
        .filter_map(|column| column.get(row).map(|value| value.to_string()))
        .collect();
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", parts.join(", "))
    }
}

/// Position of every query row in `space`, or [`NOT_FOUND`].
///
/// Uses the default (hardened) policy: duplicated space keys are logged and
/// the lowest space position wins.
pub fn find(query: &KeySet, space: &KeySet) -> Result<Vec<i64>, JoinError> {
    let mut ledger = EvidenceLedger::new();
    find_with_policy(query, space, &RuntimePolicy::default(), &mut ledger)
}

/// [`find`] with an explicit policy; duplicate-key decisions land in `ledger`.
pub fn find_with_policy(
    query: &KeySet,
    space: &KeySet,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<Vec<i64>, JoinError> {
    validate_find_arguments(query, space)?;
    let _span = tracing::debug_span!(
        "find",
        query_rows = query.len(),
        space_rows = space.len(),
        arity = space.arity()
    )
    .entered();

    let space_size = space.len();
    let combined = KeySet::concat(&[space, query])?;
    // Every space origin id is below every query origin id.
    let origin: Vec<usize> = (0..combined.len()).collect();
    let grouping = GroupBy::new(&combined)?;

    let from_space: Vec<usize> = origin
        .iter()
        .map(|&pos| usize::from(pos < space_size))
        .collect();
    let multiplicity = grouping.sum(&from_space)?;
    let duplicated: Vec<usize> = multiplicity
        .iter()
        .enumerate()
        .filter_map(|(group, &count)| (count > 1).then_some(group))
        .collect();
    if !duplicated.is_empty() {
        let sample: Vec<String> = duplicated
            .iter()
            .take(policy.max_reported_duplicates)
            .map(|&group| render_row(grouping.unique_keys(), group))
            .collect();
        let action = policy.decide_duplicate_keys("find", duplicated.len(), &sample, ledger);
        if action == DecisionAction::Reject {
            return Err(JoinError::DuplicateKeys {
                count: duplicated.len(),
            });
        }
    }

    let first_origin = grouping.min(&origin)?;
    let chosen: Vec<i64> = first_origin
        .into_iter()
        .map(|pos| {
            if pos >= space_size {
                NOT_FOUND
            } else {
                pos as i64
            }
        })
        .collect();
    let mut positions = grouping.broadcast(&chosen, true)?;
    Ok(positions.split_off(space_size))
}

/// Evaluate the function `keys → values` at every row of `arguments`;
/// arguments absent from `keys` yield `fill` (cast to the values' dtype).
///
/// Encoded values are looked up through their codes and come back encoded
/// with the same category table; misses take the table's missing code.
pub fn lookup(
    keys: &KeySet,
    values: &ValueColumn,
    arguments: &KeySet,
    fill: &Scalar,
) -> Result<ValueColumn, JoinError> {
    let mut ledger = EvidenceLedger::new();
    lookup_with_policy(
        keys,
        values,
        arguments,
        fill,
        &RuntimePolicy::default(),
        &mut ledger,
    )
}

pub fn lookup_with_policy(
    keys: &KeySet,
    values: &ValueColumn,
    arguments: &KeySet,
    fill: &Scalar,
    policy: &RuntimePolicy,
    ledger: &mut EvidenceLedger,
) -> Result<ValueColumn, JoinError> {
    let _span = tracing::debug_span!(
        "lookup",
        keys = keys.len(),
        arguments = arguments.len(),
        arity = keys.arity()
    )
    .entered();
    if values.len() != keys.len() {
        return Err(JoinError::ValuesLengthMismatch {
            expected: keys.len(),
            actual: values.len(),
        });
    }
    let idx = find_with_policy(arguments, keys, policy, ledger)?;
    Ok(values.gather(&idx, fill)?)
}
