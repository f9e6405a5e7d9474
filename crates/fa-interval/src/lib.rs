#![forbid(unsafe_code)]

//! Interval-containment joins.
//!
//! For every query value (or row, for multi-axis intervals) find the best
//! closed interval containing it. Per axis, lower bounds, values and upper
//! bounds are concatenated in that block order and sorted once; a stable sort
//! places a value equal to a lower bound after it and a value equal to an
//! upper bound before it, so every value ranked strictly between an
//! interval's two bound ranks lies inside the closed interval. Those bands of
//! ranks are expanded into candidate (value, interval) hits, intersected
//! across axes, and ties are resolved by the smallest tiebreak.

use std::mem::size_of;

use bumpalo::{Bump, collections::Vec as BumpVec};
use fa_columnar::{ColumnError, KeySet, ValueArray, ValueColumn};
use fa_groupby::{
    GroupBy, GroupByError, arange, argsort, gen_ranges_into, in1d, invert_permutation,
};
use fa_types::{DType, Scalar};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntervalError {
    #[error("{argument} has {actual} axes, expected {expected}")]
    ArityMismatch {
        argument: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{argument} has {actual} entries, expected {expected}")]
    LengthMismatch {
        argument: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{argument} axis {axis} has dtype {actual}, expected {expected}")]
    DtypeMismatch {
        argument: &'static str,
        axis: usize,
        expected: DType,
        actual: DType,
    },
    #[error("{argument} axis {axis} has non-numeric dtype {dtype}")]
    NonNumeric {
        argument: &'static str,
        axis: usize,
        dtype: DType,
    },
    #[error("upper bound is below lower bound for interval {interval} on axis {axis}")]
    UpperBelowLower { axis: usize, interval: usize },
    #[error("tiebreak has {actual} entries but there are {expected} intervals")]
    TiebreakLength { expected: usize, actual: usize },
    #[error("tiebreak must be numeric, found {dtype}")]
    NonNumericTiebreak { dtype: DType },
    #[error("values has {actual} entries but there are {expected} intervals")]
    ValuesLengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
}

/// Not-found marker in every index result.
pub const NOT_FOUND: i64 = -1;

/// Closed intervals `[low, high]` indexed by interval id. With more than one
/// axis an interval is a box and containment must hold on every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSet {
    low: KeySet,
    high: KeySet,
}

impl IntervalSet {
    /// Validate and build an interval set. Fails with
    /// [`IntervalError::UpperBelowLower`] when any upper bound is below its
    /// lower bound (NaN bounds included).
    pub fn new(low: KeySet, high: KeySet) -> Result<Self, IntervalError> {
        if high.arity() != low.arity() {
            return Err(IntervalError::ArityMismatch {
                argument: "high",
                expected: low.arity(),
                actual: high.arity(),
            });
        }
        if high.len() != low.len() {
            return Err(IntervalError::LengthMismatch {
                argument: "high",
                expected: low.len(),
                actual: high.len(),
            });
        }
        for (axis, (lo, hi)) in low.columns().iter().zip(high.columns()).enumerate() {
            if !lo.dtype().is_numeric() {
                return Err(IntervalError::NonNumeric {
                    argument: "low",
                    axis,
                    dtype: lo.dtype(),
                });
            }
            if hi.dtype() != lo.dtype() {
                return Err(IntervalError::DtypeMismatch {
                    argument: "high",
                    axis,
                    expected: lo.dtype(),
                    actual: hi.dtype(),
                });
            }
            if let Some(interval) = hi.first_below(lo)? {
                return Err(IntervalError::UpperBelowLower { axis, interval });
            }
        }
        Ok(Self { low, high })
    }

    /// Number of intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.low.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.low.is_empty()
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.low.arity()
    }

    #[must_use]
    pub fn low(&self) -> &KeySet {
        &self.low
    }

    #[must_use]
    pub fn high(&self) -> &KeySet {
        &self.high
    }
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for IntervalExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IntervalExecutionTrace {
    used_arena: bool,
    band_elements: usize,
    estimated_bytes: usize,
}

/// Sorted view of one axis: where each interval's bounds landed.
struct AxisBands {
    perm: Vec<usize>,
    starts: Vec<usize>,
    ends: Vec<usize>,
}

impl AxisBands {
    fn build(low: &ValueArray, vals: &ValueArray, high: &ValueArray) -> Result<Self, IntervalError> {
        let combined = KeySet::single(ValueArray::concat(&[low, vals, high])?);
        let perm = argsort(&combined);
        let ranks = invert_permutation(&perm);
        let boundary = low.len() + vals.len();
        Ok(Self {
            starts: ranks[..low.len()].to_vec(),
            ends: ranks[boundary..].to_vec(),
            perm,
        })
    }

    fn has_interior(&self, interval: usize) -> bool {
        self.ends[interval] > self.starts[interval] + 1
    }
}

/// Candidate (value, interval) pairs found on one axis.
#[derive(Debug, Default)]
struct Candidates {
    values: Vec<usize>,
    intervals: Vec<usize>,
}

fn validate_search_arguments(
    vals: &KeySet,
    intervals: &IntervalSet,
    tiebreak: Option<&ValueArray>,
) -> Result<(), IntervalError> {
    if vals.arity() != intervals.arity() {
        return Err(IntervalError::ArityMismatch {
            argument: "vals",
            expected: intervals.arity(),
            actual: vals.arity(),
        });
    }
    for (axis, (v, lo)) in vals.columns().iter().zip(intervals.low.columns()).enumerate() {
        if v.dtype() != lo.dtype() {
            return Err(IntervalError::DtypeMismatch {
                argument: "vals",
                axis,
                expected: lo.dtype(),
                actual: v.dtype(),
            });
        }
    }
    if let Some(tiebreak) = tiebreak {
        if tiebreak.len() != intervals.len() {
            return Err(IntervalError::TiebreakLength {
                expected: intervals.len(),
                actual: tiebreak.len(),
            });
        }
        if !tiebreak.dtype().is_numeric() {
            return Err(IntervalError::NonNumericTiebreak {
                dtype: tiebreak.dtype(),
            });
        }
    }
    Ok(())
}

fn estimate_candidate_bytes(band_elements: usize) -> usize {
    // pair id + rank per band element, plus the surviving (value, interval) pair.
    band_elements.saturating_mul(size_of::<usize>().saturating_mul(4))
}

/// Keep the band ranks that belong to the values block, translated to value
/// positions and tagged with their interval id.
fn collect_axis_hits(
    axis: &AxisBands,
    eligible: &[usize],
    segments: &[usize],
    ranks: &[usize],
    n_intervals: usize,
    n_vals: usize,
    out: &mut Candidates,
) {
    let boundary = n_intervals + n_vals;
    for (&segment, &rank) in segments.iter().zip(ranks) {
        let pos = axis.perm[rank];
        if pos >= n_intervals && pos < boundary {
            out.values.push(pos - n_intervals);
            out.intervals.push(eligible[segment]);
        }
    }
}

/// Per value, the candidate interval with the smallest tiebreak. Candidates
/// of one value must appear in ascending interval id so equal tiebreaks go
/// to the lowest id.
fn resolve_ties(
    n_vals: usize,
    values: &[usize],
    intervals: &[usize],
    tiebreak: &ValueArray,
) -> Result<Vec<i64>, IntervalError> {
    let mut containing = vec![NOT_FOUND; n_vals];
    if values.is_empty() {
        return Ok(containing);
    }
    let by_value = GroupBy::new(&KeySet::single(ValueArray::Int64(
        values.iter().map(|&v| v as i64).collect(),
    )))?;
    let candidate_tiebreak = tiebreak.take(intervals)?;
    for winner in by_value.argmin(&candidate_tiebreak)? {
        containing[values[winner]] = intervals[winner] as i64;
    }
    Ok(containing)
}

/// Keep only (value, interval) pairs seen on every axis, in ascending
/// (value, interval) order.
fn intersect_axes(per_axis: Vec<Candidates>) -> Result<Candidates, IntervalError> {
    let n_axes = per_axis.len();
    let mut all = Candidates::default();
    for axis in per_axis {
        all.values.extend(axis.values);
        all.intervals.extend(axis.intervals);
    }
    let pairs = KeySet::new(vec![
        ValueArray::Int64(all.values.iter().map(|&v| v as i64).collect()),
        ValueArray::Int64(all.intervals.iter().map(|&i| i as i64).collect()),
    ])?;
    let by_pair = GroupBy::new(&pairs)?;

    let mut hits = Candidates::default();
    for group in 0..by_pair.ngroups() {
        let members = by_pair.members(group);
        if members.len() != n_axes {
            continue;
        }
        if let Some(&first) = members.first() {
            hits.values.push(all.values[first]);
            hits.intervals.push(all.intervals[first]);
        }
    }
    Ok(hits)
}

/// Id of the best closed interval containing every value (row), or
/// [`NOT_FOUND`]. The best interval has the smallest `tiebreak`; without a
/// tiebreak the lowest interval id wins.
pub fn search_intervals(
    vals: &KeySet,
    intervals: &IntervalSet,
    tiebreak: Option<&ValueArray>,
) -> Result<Vec<i64>, IntervalError> {
    search_intervals_with_options(vals, intervals, tiebreak, IntervalExecutionOptions::default())
}

pub fn search_intervals_with_options(
    vals: &KeySet,
    intervals: &IntervalSet,
    tiebreak: Option<&ValueArray>,
    options: IntervalExecutionOptions,
) -> Result<Vec<i64>, IntervalError> {
    let (containing, _) = search_intervals_with_trace(vals, intervals, tiebreak, options)?;
    Ok(containing)
}

fn search_intervals_with_trace(
    vals: &KeySet,
    intervals: &IntervalSet,
    tiebreak: Option<&ValueArray>,
    options: IntervalExecutionOptions,
) -> Result<(Vec<i64>, IntervalExecutionTrace), IntervalError> {
    validate_search_arguments(vals, intervals, tiebreak)?;
    let _span = tracing::debug_span!(
        "search_intervals",
        values = vals.len(),
        intervals = intervals.len(),
        axes = intervals.arity()
    )
    .entered();

    let n_intervals = intervals.len();
    let n_vals = vals.len();
    let default_tiebreak;
    let tiebreak = match tiebreak {
        Some(tiebreak) => tiebreak,
        None => {
            default_tiebreak = arange(n_intervals);
            &default_tiebreak
        }
    };

    let bands = (0..intervals.arity())
        .map(|axis| {
            AxisBands::build(
                &intervals.low.columns()[axis],
                &vals.columns()[axis],
                &intervals.high.columns()[axis],
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    // An interval can only hold a value if its band is non-empty on every axis.
    let eligible: Vec<usize> = (0..n_intervals)
        .filter(|&interval| bands.iter().all(|axis| axis.has_interior(interval)))
        .collect();
    let band_starts: Vec<Vec<usize>> = bands
        .iter()
        .map(|axis| eligible.iter().map(|&i| axis.starts[i] + 1).collect())
        .collect();
    let band_ends: Vec<Vec<usize>> = bands
        .iter()
        .map(|axis| eligible.iter().map(|&i| axis.ends[i]).collect())
        .collect();

    let band_elements: usize = band_starts
        .iter()
        .zip(&band_ends)
        .flat_map(|(starts, ends)| starts.iter().zip(ends).map(|(s, e)| e - s))
        .sum();
    let estimated_bytes = estimate_candidate_bytes(band_elements);
    let use_arena = options.use_arena && estimated_bytes <= options.arena_budget_bytes;
    if options.use_arena && !use_arena {
        tracing::debug!(
            estimated_bytes,
            budget = options.arena_budget_bytes,
            "candidate scratch exceeds arena budget; using global allocator"
        );
    }

    let mut per_axis: Vec<Candidates> = Vec::with_capacity(bands.len());
    if use_arena {
        let arena = Bump::new();
        for (axis, bounds) in bands.iter().zip(band_starts.iter().zip(&band_ends)) {
            let mut segments = BumpVec::<usize>::new_in(&arena);
            let mut ranks = BumpVec::<usize>::new_in(&arena);
            gen_ranges_into(bounds.0, bounds.1, &mut segments, &mut ranks)?;
            let mut found = Candidates::default();
            collect_axis_hits(
                axis,
                &eligible,
                &segments,
                &ranks,
                n_intervals,
                n_vals,
                &mut found,
            );
            per_axis.push(found);
        }
    } else {
        for (axis, bounds) in bands.iter().zip(band_starts.iter().zip(&band_ends)) {
            let mut segments = Vec::new();
            let mut ranks = Vec::new();
            gen_ranges_into(bounds.0, bounds.1, &mut segments, &mut ranks)?;
            let mut found = Candidates::default();
            collect_axis_hits(
                axis,
                &eligible,
                &segments,
                &ranks,
                n_intervals,
                n_vals,
                &mut found,
            );
            per_axis.push(found);
        }
    }

    let hits = if per_axis.len() == 1 {
        per_axis.pop().unwrap_or_default()
    } else {
        intersect_axes(per_axis)?
    };
    let containing = resolve_ties(n_vals, &hits.values, &hits.intervals, tiebreak)?;

    Ok((
        containing,
        IntervalExecutionTrace {
            used_arena: use_arena,
            band_elements,
            estimated_bytes,
        },
    ))
}

/// Per-value containment flags, plus per-interval hit flags when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalMembership {
    /// Whether each value lies in at least one interval.
    pub found: Vec<bool>,
    /// Whether each interval won at least one value (`symmetric` only).
    pub interval_hits: Option<Vec<bool>>,
}

pub fn in1d_intervals(
    vals: &KeySet,
    intervals: &IntervalSet,
    symmetric: bool,
) -> Result<IntervalMembership, IntervalError> {
    let _span = tracing::debug_span!(
        "in1d_intervals",
        values = vals.len(),
        intervals = intervals.len(),
        symmetric
    )
    .entered();
    let containing = search_intervals(vals, intervals, None)?;
    let found = containing.iter().map(|&idx| idx != NOT_FOUND).collect();
    let interval_hits = if symmetric {
        let ids = KeySet::single(arange(intervals.len()));
        let winners = KeySet::single(ValueArray::Int64(containing));
        Some(in1d(&ids, &winners)?)
    } else {
        None
    };
    Ok(IntervalMembership {
        found,
        interval_hits,
    })
}

/// Evaluate a function defined piecewise over intervals: the value of the
/// best containing interval, or `fill` (cast to the values' dtype) when no
/// interval contains the argument. Encoded values stay encoded and miss with
/// their own missing code.
pub fn interval_lookup(
    intervals: &IntervalSet,
    values: &ValueColumn,
    arguments: &KeySet,
    fill: &Scalar,
    tiebreak: Option<&ValueArray>,
) -> Result<ValueColumn, IntervalError> {
    let _span = tracing::debug_span!(
        "interval_lookup",
        arguments = arguments.len(),
        intervals = intervals.len(),
        axes = intervals.arity()
    )
    .entered();
    if values.len() != intervals.len() {
        return Err(IntervalError::ValuesLengthMismatch {
            expected: intervals.len(),
            actual: values.len(),
        });
    }
    let idx = search_intervals(arguments, intervals, tiebreak)?;
    Ok(values.gather(&idx, fill)?)
}

#[cfg(test)]
mod tests {
    use fa_columnar::{Categorical, KeySet, ValueArray, ValueColumn};
    use fa_types::{DType, Scalar};

    use super::{
        Candidates, IntervalError, IntervalExecutionOptions, IntervalSet, in1d_intervals,
        intersect_axes, interval_lookup, search_intervals, search_intervals_with_options,
        search_intervals_with_trace,
    };

    fn ints(values: Vec<i64>) -> KeySet {
        KeySet::single(ValueArray::Int64(values))
    }

    fn intervals(low: Vec<i64>, high: Vec<i64>) -> IntervalSet {
        IntervalSet::new(ints(low), ints(high)).expect("intervals")
    }

    #[test]
    fn single_containing_interval_is_found() {
        let set = intervals(vec![0, 8], vec![10, 20]);
        assert_eq!(
            search_intervals(&ints(vec![5]), &set, None).expect("search"),
            vec![0]
        );
    }

    #[test]
    fn overlap_resolves_to_lowest_interval_id() {
        let set = intervals(vec![0, 8], vec![10, 20]);
        assert_eq!(
            search_intervals(&ints(vec![9]), &set, None).expect("search"),
            vec![0]
        );
    }

    #[test]
    fn tiebreak_overrides_interval_order() {
        let set = intervals(vec![0, 8], vec![10, 20]);
        let tiebreak = ValueArray::from(vec![5.0_f64, 1.0]);
        assert_eq!(
            search_intervals(&ints(vec![9, 2, 15]), &set, Some(&tiebreak)).expect("search"),
            vec![1, 0, 1]
        );
    }

    #[test]
    fn equal_tiebreaks_fall_back_to_lowest_id() {
        let set = intervals(vec![0, 0, 0], vec![9, 9, 9]);
        let tiebreak = ValueArray::from(vec![3_i64, 1, 1]);
        assert_eq!(
            search_intervals(&ints(vec![4]), &set, Some(&tiebreak)).expect("search"),
            vec![1]
        );
    }

    #[test]
    fn bounds_are_inclusive() {
        let set = intervals(vec![10], vec![20]);
        assert_eq!(
            search_intervals(&ints(vec![9, 10, 20, 21]), &set, None).expect("search"),
            vec![-1, 0, 0, -1]
        );
    }

    #[test]
    fn degenerate_interval_contains_its_point() {
        let set = intervals(vec![7, 3], vec![7, 3]);
        assert_eq!(
            search_intervals(&ints(vec![3, 7, 5]), &set, None).expect("search"),
            vec![1, 0, -1]
        );
    }

    #[test]
    fn float_bounds_and_values() {
        let set = IntervalSet::new(
            KeySet::single(ValueArray::from(vec![0.5_f64, -2.0])),
            KeySet::single(ValueArray::from(vec![1.5_f64, 0.0])),
        )
        .expect("intervals");
        let vals = KeySet::single(ValueArray::from(vec![-0.0_f64, 1.5, 0.25, f64::NAN]));
        assert_eq!(
            search_intervals(&vals, &set, None).expect("search"),
            vec![1, 0, -1, -1]
        );
    }

    #[test]
    fn no_intervals_means_nothing_found() {
        let set = intervals(Vec::new(), Vec::new());
        assert_eq!(
            search_intervals(&ints(vec![1, 2]), &set, None).expect("search"),
            vec![-1, -1]
        );
    }

    #[test]
    fn upper_below_lower_is_a_domain_error() {
        let err = IntervalSet::new(ints(vec![0, 8]), ints(vec![10, 4])).expect_err("domain");
        assert_eq!(err, IntervalError::UpperBelowLower { axis: 0, interval: 1 });
    }

    #[test]
    fn string_bounds_are_rejected() {
        let err = IntervalSet::new(
            KeySet::single(ValueArray::from(vec!["a"])),
            KeySet::single(ValueArray::from(vec!["b"])),
        )
        .expect_err("non-numeric");
        assert_eq!(
            err,
            IntervalError::NonNumeric {
                argument: "low",
                axis: 0,
                dtype: DType::Utf8
            }
        );
    }

    #[test]
    fn mismatched_bound_lengths_are_rejected() {
        let err = IntervalSet::new(ints(vec![0, 1]), ints(vec![5])).expect_err("length");
        assert!(matches!(err, IntervalError::LengthMismatch { argument: "high", .. }));
    }

    #[test]
    fn value_dtype_must_match_bounds() {
        let set = intervals(vec![0], vec![1]);
        let err = search_intervals(&KeySet::single(ValueArray::from(vec![0.5_f64])), &set, None)
            .expect_err("dtype");
        assert_eq!(
            err,
            IntervalError::DtypeMismatch {
                argument: "vals",
                axis: 0,
                expected: DType::Int64,
                actual: DType::Float64
            }
        );
    }

    #[test]
    fn single_axis_values_against_boxes_are_rejected() {
        let boxes = IntervalSet::new(
            KeySet::new(vec![ValueArray::from(vec![0_i64]), ValueArray::from(vec![0_i64])])
                .expect("low"),
            KeySet::new(vec![ValueArray::from(vec![5_i64]), ValueArray::from(vec![5_i64])])
                .expect("high"),
        )
        .expect("boxes");
        let err = search_intervals(&ints(vec![1]), &boxes, None).expect_err("arity");
        assert_eq!(
            err,
            IntervalError::ArityMismatch {
                argument: "vals",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn tiebreak_length_is_checked() {
        let set = intervals(vec![0, 8], vec![10, 20]);
        let err = search_intervals(&ints(vec![1]), &set, Some(&ValueArray::from(vec![1_i64])))
            .expect_err("tiebreak");
        assert_eq!(
            err,
            IntervalError::TiebreakLength {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn boxes_require_containment_on_every_axis() {
        let low = KeySet::new(vec![
            ValueArray::from(vec![0_i64, 5]),
            ValueArray::from(vec![0_i64, 5]),
        ])
        .expect("low");
        let high = KeySet::new(vec![
            ValueArray::from(vec![10_i64, 15]),
            ValueArray::from(vec![10_i64, 15]),
        ])
        .expect("high");
        let boxes = IntervalSet::new(low, high).expect("boxes");
        let vals = KeySet::new(vec![
            ValueArray::from(vec![1_i64, 12, 7, 12, 1]),
            ValueArray::from(vec![1_i64, 12, 7, 1, 20]),
        ])
        .expect("vals");
        assert_eq!(
            search_intervals(&vals, &boxes, None).expect("search"),
            vec![0, 1, 0, -1, -1]
        );
    }

    #[test]
    fn axis_intersection_keeps_pairs_seen_on_every_axis_in_order() {
        let x = Candidates {
            values: vec![1, 0, 1],
            intervals: vec![2, 0, 0],
        };
        let y = Candidates {
            values: vec![1, 1],
            intervals: vec![2, 0],
        };
        let hits = intersect_axes(vec![x, y]).expect("intersect");
        assert_eq!(hits.values, vec![1, 1]);
        assert_eq!(hits.intervals, vec![0, 2]);
    }

    #[test]
    fn identical_boxes_with_equal_tiebreak_go_to_lowest_id() {
        let low = KeySet::new(vec![
            ValueArray::from(vec![0_i64, 0, 0]),
            ValueArray::from(vec![0_i64, 0, 0]),
        ])
        .expect("low");
        let high = KeySet::new(vec![
            ValueArray::from(vec![9_i64, 9, 9]),
            ValueArray::from(vec![9_i64, 9, 9]),
        ])
        .expect("high");
        let boxes = IntervalSet::new(low, high).expect("boxes");
        let vals = KeySet::new(vec![
            ValueArray::from(vec![4_i64]),
            ValueArray::from(vec![4_i64]),
        ])
        .expect("vals");
        let tiebreak = ValueArray::from(vec![2_i64, 1, 1]);
        assert_eq!(
            search_intervals(&vals, &boxes, Some(&tiebreak)).expect("search"),
            vec![1]
        );
    }

    #[test]
    fn boxes_with_no_candidates_still_return_full_result() {
        let low = KeySet::new(vec![
            ValueArray::from(vec![0_i64]),
            ValueArray::from(vec![100_i64]),
        ])
        .expect("low");
        let high = KeySet::new(vec![
            ValueArray::from(vec![10_i64]),
            ValueArray::from(vec![200_i64]),
        ])
        .expect("high");
        let boxes = IntervalSet::new(low, high).expect("boxes");
        let vals = KeySet::new(vec![
            ValueArray::from(vec![5_i64, 50]),
            ValueArray::from(vec![5_i64, 50]),
        ])
        .expect("vals");
        assert_eq!(
            search_intervals(&vals, &boxes, None).expect("search"),
            vec![-1, -1]
        );
    }

    #[test]
    fn arena_and_global_paths_agree() {
        let set = intervals(vec![0, 3, 6, 0], vec![4, 9, 12, 20]);
        let vals = ints((0..25).collect());
        let global = search_intervals_with_options(
            &vals,
            &set,
            None,
            IntervalExecutionOptions {
                use_arena: false,
                arena_budget_bytes: 0,
            },
        )
        .expect("global");
        let arena = search_intervals_with_options(
            &vals,
            &set,
            None,
            IntervalExecutionOptions::default(),
        )
        .expect("arena");
        assert_eq!(arena, global);
    }

    #[test]
    fn arena_falls_back_when_budget_is_too_small() {
        let set = intervals(vec![0], vec![100]);
        let vals = ints((0..50).collect());
        let options = IntervalExecutionOptions {
            use_arena: true,
            arena_budget_bytes: 1,
        };
        let (out, trace) =
            search_intervals_with_trace(&vals, &set, None, options).expect("fallback");
        assert!(!trace.used_arena);
        assert_eq!(trace.band_elements, 50);
        assert!(trace.estimated_bytes > options.arena_budget_bytes);
        assert!(out.iter().all(|&idx| idx == 0));
    }

    #[test]
    fn membership_flags_values_and_intervals() {
        let set = intervals(vec![0, 8, 30], vec![10, 20, 40]);
        let plain = in1d_intervals(&ints(vec![5, 25]), &set, false).expect("membership");
        assert_eq!(plain.found, vec![true, false]);
        assert_eq!(plain.interval_hits, None);

        let sym = in1d_intervals(&ints(vec![5, 25, 15]), &set, true).expect("membership");
        assert_eq!(sym.found, vec![true, false, true]);
        assert_eq!(sym.interval_hits, Some(vec![true, true, false]));
    }

    #[test]
    fn interval_lookup_evaluates_piecewise_function() {
        let set = intervals(vec![0, 10], vec![9, 19]);
        let out = interval_lookup(
            &set,
            &ValueColumn::from(ValueArray::from(vec![1.5_f64, 2.5])),
            &ints(vec![3, 12, 40]),
            &Scalar::Int64(-1),
            None,
        )
        .expect("lookup");
        assert_eq!(
            out,
            ValueColumn::Raw(ValueArray::Float64(vec![1.5, 2.5, -1.0]))
        );
    }

    #[test]
    fn interval_lookup_rewraps_categorical_values() {
        let set = intervals(vec![0, 10], vec![9, 19]);
        let labels = Categorical::from_codes(
            vec![1, 0],
            vec!["cold".into(), "warm".into()],
            Categorical::DEFAULT_NA_VALUE,
        )
        .expect("categorical");
        let out = interval_lookup(
            &set,
            &ValueColumn::from(labels),
            &ints(vec![15, 99, 0]),
            &Scalar::Int64(-1),
            None,
        )
        .expect("lookup");
        let ValueColumn::Encoded(out) = out else {
            panic!("categorical values must stay encoded");
        };
        assert_eq!(out.decode(), vec!["cold", "N/A", "warm"]);
    }

    #[test]
    fn interval_lookup_checks_values_length() {
        let set = intervals(vec![0], vec![1]);
        let err = interval_lookup(
            &set,
            &ValueColumn::from(ValueArray::from(vec![1_i64, 2])),
            &ints(vec![0]),
            &Scalar::Int64(-1),
            None,
        )
        .expect_err("length");
        assert_eq!(
            err,
            IntervalError::ValuesLengthMismatch {
                expected: 1,
                actual: 2
            }
        );
    }
}
