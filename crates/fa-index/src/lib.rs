#![forbid(unsafe_code)]

//! Dense re-indexing of sparse identifiers.
//!
//! Every function assigns ranks in ascending value order, so equal values get
//! equal indices and the produced range `[0, distinct)` has no gaps.

use fa_columnar::{ColumnError, KeySet};
use fa_groupby::{GroupBy, GroupByError, in1d, unique};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    #[error("align requires at least one input array")]
    NoInputs,
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
}

/// Result of aligning one array against a reference array that defines the
/// index universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedPair {
    /// Which elements of the filtered input appear in the reference.
    pub keep: Vec<bool>,
    /// Dense indices of the surviving elements of the filtered input.
    pub filtered: Vec<i64>,
    /// Dense indices of the reference, element for element.
    pub reference: Vec<i64>,
}

/// Map sparse values to 0-up indices ordered by ascending value.
pub fn zero_up(values: &KeySet) -> Result<Vec<i64>, IndexError> {
    let _span = tracing::debug_span!("zero_up", rows = values.len()).entered();
    let grouping = GroupBy::new(values)?;
    let ranks: Vec<i64> = (0..grouping.ngroups() as i64).collect();
    Ok(grouping.broadcast(&ranks, true)?)
}

/// Map several arrays onto one shared dense index. A value present in more
/// than one input receives the same index in every output.
pub fn align(arrays: &[&KeySet]) -> Result<Vec<Vec<i64>>, IndexError> {
    if arrays.is_empty() {
        return Err(IndexError::NoInputs);
    }
    let _span = tracing::debug_span!(
        "align",
        inputs = arrays.len(),
        rows = arrays.iter().map(|a| a.len()).sum::<usize>()
    )
    .entered();

    let combined = KeySet::concat(arrays)?;
    let mut dense = zero_up(&combined)?;

    // Segments are peeled off the tail, so walk the inputs in reverse.
    let mut out = Vec::with_capacity(arrays.len());
    for array in arrays.iter().rev() {
        let tail = dense.split_off(dense.len() - array.len());
        out.push(tail);
    }
    out.reverse();
    Ok(out)
}

/// Align `left` to the index universe implied by `right`, discarding left
/// values that never occur in `right`.
pub fn right_align(left: &KeySet, right: &KeySet) -> Result<AlignedPair, IndexError> {
    let _span =
        tracing::debug_span!("right_align", left_rows = left.len(), right_rows = right.len())
            .entered();

    let universe = unique(right)?;
    let keep = in1d(left, &universe)?;
    let survivors = left.filter(&keep)?;
    let mut aligned = align(&[&survivors, right])?;
    let reference = aligned.pop().unwrap_or_default();
    let filtered = aligned.pop().unwrap_or_default();

    Ok(AlignedPair {
        keep,
        filtered,
        reference,
    })
}

/// Mirror of [`right_align`]: `left` defines the universe and `right` is
/// filtered. In the result, `keep` and `filtered` describe `right`.
pub fn left_align(left: &KeySet, right: &KeySet) -> Result<AlignedPair, IndexError> {
    right_align(right, left)
}
