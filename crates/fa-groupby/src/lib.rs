#![forbid(unsafe_code)]

//! Order-based primitives: stable sort, group-by with reductions and
//! broadcast, membership testing and range expansion.
//!
//! Everything here is built from sorting; no hash tables. Callers compose
//! these into joins and searches whose tie-breaking follows directly from the
//! stability of [`argsort`].

use std::cmp::Ordering;
use std::iter::repeat_n;
use std::ops::Add;

use fa_columnar::{ColumnError, KeySet, ValueArray};
use fa_types::DType;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GroupByError {
    #[error("per-member array has length {actual}, group-by covers {expected} rows")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("per-group array has length {actual}, group-by has {expected} groups")]
    GroupCountMismatch { expected: usize, actual: usize },
    #[error("reduction requires a numeric array, found {dtype}")]
    NonNumeric { dtype: DType },
    #[error("range bound arrays differ in length: starts={starts}, ends={ends}")]
    RangeLengthMismatch { starts: usize, ends: usize },
    #[error("range {pair} ends at {end} before it starts at {start}")]
    InvertedRange {
        pair: usize,
        start: usize,
        end: usize,
    },
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Stable ascending sort of the rows of `keys`; returns original positions in
/// sorted order. Equal rows keep their original relative order.
#[must_use]
pub fn argsort(keys: &KeySet) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..keys.len()).collect();
    match keys.columns() {
        [ValueArray::Int64(v)] => perm.sort_by_key(|&i| v[i]),
        [ValueArray::UInt64(v)] => perm.sort_by_key(|&i| v[i]),
        _ => perm.sort_by(|&a, &b| keys.cmp_rows(a, b)),
    }
    perm
}

/// Rank of every original position under `perm`.
#[must_use]
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (rank, &pos) in perm.iter().enumerate() {
        inverse[pos] = rank;
    }
    inverse
}

/// `0, 1, .., n - 1` as an Int64 array.
#[must_use]
pub fn arange(n: usize) -> ValueArray {
    ValueArray::Int64((0..n as i64).collect())
}

/// Partition of a key set into runs of equal rows.
///
/// Groups are numbered in ascending key order. Members of a group appear in
/// `permutation` in their original relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    permutation: Vec<usize>,
    segments: Vec<usize>,
    group_ids: Vec<usize>,
    unique_keys: KeySet,
}

impl GroupBy {
    pub fn new(keys: &KeySet) -> Result<Self, GroupByError> {
        let permutation = argsort(keys);
        let mut segments = Vec::new();
        let mut group_ids = vec![0; keys.len()];

        for (rank, &pos) in permutation.iter().enumerate() {
            if rank == 0 || keys.cmp_rows(permutation[rank - 1], pos) != Ordering::Equal {
                segments.push(rank);
            }
            group_ids[pos] = segments.len() - 1;
        }

        let firsts: Vec<usize> = segments.iter().map(|&start| permutation[start]).collect();
        let unique_keys = keys.take(&firsts)?;

        Ok(Self {
            permutation,
            segments,
            group_ids,
            unique_keys,
        })
    }

    /// Number of grouped rows.
    #[must_use]
    pub fn size(&self) -> usize {
        self.permutation.len()
    }

    #[must_use]
    pub fn ngroups(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn unique_keys(&self) -> &KeySet {
        &self.unique_keys
    }

    #[must_use]
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Offset of each group's first member within `permutation`.
    #[must_use]
    pub fn segments(&self) -> &[usize] {
        &self.segments
    }

    /// Group id of every original position.
    #[must_use]
    pub fn group_ids(&self) -> &[usize] {
        &self.group_ids
    }

    /// Original positions of one group's members, in original relative order.
    #[must_use]
    pub fn members(&self, group: usize) -> &[usize] {
        let start = self.segments[group];
        let end = self
            .segments
            .get(group + 1)
            .copied()
            .unwrap_or(self.permutation.len());
        &self.permutation[start..end]
    }

    fn check_members(&self, actual: usize) -> Result<(), GroupByError> {
        if actual != self.size() {
            return Err(GroupByError::LengthMismatch {
                expected: self.size(),
                actual,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn count(&self) -> Vec<usize> {
        (0..self.ngroups())
            .map(|group| self.members(group).len())
            .collect()
    }

    pub fn sum<T>(&self, values: &[T]) -> Result<Vec<T>, GroupByError>
    where
        T: Copy + Default + Add<Output = T>,
    {
        self.check_members(values.len())?;
        Ok((0..self.ngroups())
            .map(|group| {
                self.members(group)
                    .iter()
                    .fold(T::default(), |acc, &pos| acc + values[pos])
            })
            .collect())
    }

    /// Smallest member value per group; the earliest member wins ties.
    pub fn min<T>(&self, values: &[T]) -> Result<Vec<T>, GroupByError>
    where
        T: Copy + PartialOrd,
    {
        self.check_members(values.len())?;
        Ok((0..self.ngroups())
            .map(|group| {
                let members = self.members(group);
                members[1..]
                    .iter()
                    .fold(values[members[0]], |best, &pos| {
                        if values[pos] < best { values[pos] } else { best }
                    })
            })
            .collect())
    }

    /// Original position of the smallest member value per group.
    ///
    /// Ties resolve to the earliest member, which is the lowest original
    /// position since the sort is stable.
    pub fn argmin(&self, values: &ValueArray) -> Result<Vec<usize>, GroupByError> {
        if !values.dtype().is_numeric() {
            return Err(GroupByError::NonNumeric {
                dtype: values.dtype(),
            });
        }
        self.check_members(values.len())?;
        Ok((0..self.ngroups())
            .map(|group| {
                let members = self.members(group);
                members[1..].iter().fold(members[0], |best, &pos| {
                    if values.cmp_at(pos, best) == Ordering::Less {
                        pos
                    } else {
                        best
                    }
                })
            })
            .collect())
    }

    /// Replicate one value per group to every member.
    ///
    /// With `permute` the output is in original position order; without it
    /// the output follows sorted (grouped) order.
    pub fn broadcast<T: Clone>(
        &self,
        per_group: &[T],
        permute: bool,
    ) -> Result<Vec<T>, GroupByError> {
        if per_group.len() != self.ngroups() {
            return Err(GroupByError::GroupCountMismatch {
                expected: self.ngroups(),
                actual: per_group.len(),
            });
        }
        let out = if permute {
            self.group_ids
                .iter()
                .map(|&group| per_group[group].clone())
                .collect()
        } else {
            (0..self.ngroups())
                .flat_map(|group| repeat_n(per_group[group].clone(), self.members(group).len()))
                .collect()
        };
        Ok(out)
    }
}

/// Ascending distinct rows of `keys`.
pub fn unique(keys: &KeySet) -> Result<KeySet, GroupByError> {
    Ok(GroupBy::new(keys)?.unique_keys)
}

/// For every row of `a`, whether it appears among the rows of `b`.
pub fn in1d(a: &KeySet, b: &KeySet) -> Result<Vec<bool>, GroupByError> {
    let combined = KeySet::concat(&[b, a])?;
    let grouping = GroupBy::new(&combined)?;
    let from_b: Vec<usize> = (0..combined.len())
        .map(|pos| usize::from(pos < b.len()))
        .collect();
    let present: Vec<bool> = grouping
        .sum(&from_b)?
        .into_iter()
        .map(|hits| hits > 0)
        .collect();
    let mut flags = grouping.broadcast(&present, true)?;
    Ok(flags.split_off(b.len()))
}

/// Expand paired bounds into every integer of each half-open `[start, end)`,
/// appending the originating pair id to `segments` and the integer to `flat`.
///
/// Returns the number of appended elements. Bounds are validated before
/// anything is written.
pub fn gen_ranges_into<S, F>(
    starts: &[usize],
    ends: &[usize],
    segments: &mut S,
    flat: &mut F,
) -> Result<usize, GroupByError>
where
    S: Extend<usize>,
    F: Extend<usize>,
{
    if starts.len() != ends.len() {
        return Err(GroupByError::RangeLengthMismatch {
            starts: starts.len(),
            ends: ends.len(),
        });
    }
    let mut total = 0_usize;
    for (pair, (&start, &end)) in starts.iter().zip(ends).enumerate() {
        if end < start {
            return Err(GroupByError::InvertedRange { pair, start, end });
        }
        total += end - start;
    }

    for (pair, (&start, &end)) in starts.iter().zip(ends).enumerate() {
        segments.extend(repeat_n(pair, end - start));
        flat.extend(start..end);
    }
    Ok(total)
}

/// Owned-buffer form of [`gen_ranges_into`]: `(pair ids, flattened integers)`.
pub fn gen_ranges(
    starts: &[usize],
    ends: &[usize],
) -> Result<(Vec<usize>, Vec<usize>), GroupByError> {
    let mut segments = Vec::new();
    let mut flat = Vec::new();
    gen_ranges_into(starts, ends, &mut segments, &mut flat)?;
    Ok((segments, flat))
}
