#![forbid(unsafe_code)]

use std::cmp::Ordering;

use fa_types::{DType, Scalar, TypeError, cast_scalar, cmp_f64};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("column dtype mismatch: left={left}, right={right}")]
    DtypeMismatch { left: DType, right: DType },
    #[error("key set arity mismatch: left={left}, right={right}")]
    ArityMismatch { left: usize, right: usize },
    #[error("key set must contain at least one column")]
    EmptyKeySet,
    #[error("cannot concatenate an empty list of arrays")]
    EmptyConcat,
    #[error("position {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("categorical code {code} outside [0, {categories})")]
    InvalidCategoricalCode { code: i64, categories: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Typed, contiguous array of one dtype.
///
/// Every join and search in the workspace operates on these; comparisons
/// between positions never cross dtypes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum ValueArray {
    Bool(Vec<bool>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
}

macro_rules! map_variant {
    ($array:expr, $data:ident => $body:expr) => {
        match $array {
            ValueArray::Bool($data) => ValueArray::Bool($body),
            ValueArray::Int64($data) => ValueArray::Int64($body),
            ValueArray::UInt64($data) => ValueArray::UInt64($body),
            ValueArray::Float64($data) => ValueArray::Float64($body),
            ValueArray::Utf8($data) => ValueArray::Utf8($body),
        }
    };
}

fn gather<T: Clone>(data: &[T], positions: &[usize]) -> Result<Vec<T>, ColumnError> {
    positions
        .iter()
        .map(|&pos| {
            data.get(pos).cloned().ok_or(ColumnError::IndexOutOfBounds {
                index: pos,
                len: data.len(),
            })
        })
        .collect()
}

fn select<T: Clone>(data: &[T], mask: &[bool]) -> Vec<T> {
    data.iter()
        .zip(mask)
        .filter_map(|(value, &keep)| keep.then(|| value.clone()))
        .collect()
}

impl ValueArray {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::UInt64(_) => DType::UInt64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Utf8(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Scalar> {
        match self {
            Self::Bool(v) => v.get(idx).copied().map(Scalar::Bool),
            Self::Int64(v) => v.get(idx).copied().map(Scalar::Int64),
            Self::UInt64(v) => v.get(idx).copied().map(Scalar::UInt64),
            Self::Float64(v) => v.get(idx).copied().map(Scalar::Float64),
            Self::Utf8(v) => v.get(idx).cloned().map(Scalar::Utf8),
        }
    }

    #[must_use]
    pub fn as_int64(&self) -> Option<&[i64]> {
        match self {
            Self::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Compare two positions of this array. Both must be in bounds.
    #[must_use]
    pub fn cmp_at(&self, left: usize, right: usize) -> Ordering {
        match self {
            Self::Bool(v) => v[left].cmp(&v[right]),
            Self::Int64(v) => v[left].cmp(&v[right]),
            Self::UInt64(v) => v[left].cmp(&v[right]),
            Self::Float64(v) => cmp_f64(v[left], v[right]),
            Self::Utf8(v) => v[left].cmp(&v[right]),
        }
    }

    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        Ok(map_variant!(self, data => gather(data, positions)?))
    }

    pub fn filter(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        if mask.len() != self.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: mask.len(),
            });
        }
        Ok(map_variant!(self, data => select(data, mask)))
    }

    pub fn slice(&self, start: usize, len: usize) -> Result<Self, ColumnError> {
        let end = start.saturating_add(len);
        if end > self.len() {
            return Err(ColumnError::IndexOutOfBounds {
                index: end,
                len: self.len(),
            });
        }
        Ok(map_variant!(self, data => data[start..end].to_vec()))
    }

    /// Block-ordered concatenation: every element of `parts[k]` precedes every
    /// element of `parts[k + 1]`.
    pub fn concat(parts: &[&Self]) -> Result<Self, ColumnError> {
        let first = parts.first().ok_or(ColumnError::EmptyConcat)?;
        let dtype = first.dtype();
        for part in parts {
            if part.dtype() != dtype {
                return Err(ColumnError::DtypeMismatch {
                    left: dtype,
                    right: part.dtype(),
                });
            }
        }

        let mut out = Self::empty(dtype);
        for part in parts {
            match (&mut out, part) {
                (Self::Bool(acc), Self::Bool(v)) => acc.extend_from_slice(v),
                (Self::Int64(acc), Self::Int64(v)) => acc.extend_from_slice(v),
                (Self::UInt64(acc), Self::UInt64(v)) => acc.extend_from_slice(v),
                (Self::Float64(acc), Self::Float64(v)) => acc.extend_from_slice(v),
                (Self::Utf8(acc), Self::Utf8(v)) => acc.extend_from_slice(v),
                (acc, v) => {
                    return Err(ColumnError::DtypeMismatch {
                        left: acc.dtype(),
                        right: v.dtype(),
                    });
                }
            }
        }
        Ok(out)
    }

    #[must_use]
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Bool => Self::Bool(Vec::new()),
            DType::Int64 => Self::Int64(Vec::new()),
            DType::UInt64 => Self::UInt64(Vec::new()),
            DType::Float64 => Self::Float64(Vec::new()),
            DType::Utf8 => Self::Utf8(Vec::new()),
        }
    }

    /// `len` copies of `fill`, cast to `dtype`.
    pub fn full(dtype: DType, len: usize, fill: &Scalar) -> Result<Self, ColumnError> {
        let out = match cast_scalar(fill, dtype)? {
            Scalar::Bool(v) => Self::Bool(vec![v; len]),
            Scalar::Int64(v) => Self::Int64(vec![v; len]),
            Scalar::UInt64(v) => Self::UInt64(vec![v; len]),
            Scalar::Float64(v) => Self::Float64(vec![v; len]),
            Scalar::Utf8(v) => Self::Utf8(vec![v; len]),
        };
        Ok(out)
    }

    /// Gather `self[idx]` for every non-negative entry of `indices`, writing
    /// `fill` (cast to this dtype) wherever the entry is negative.
    pub fn take_or_fill(&self, indices: &[i64], fill: &Scalar) -> Result<Self, ColumnError> {
        let mut out = Self::full(self.dtype(), indices.len(), fill)?;
        let len = self.len();
        for (slot, &idx) in indices.iter().enumerate() {
            let Ok(src) = usize::try_from(idx) else {
                continue;
            };
            if src >= len {
                return Err(ColumnError::IndexOutOfBounds { index: src, len });
            }
            match (&mut out, self) {
                (Self::Bool(dst), Self::Bool(v)) => dst[slot] = v[src],
                (Self::Int64(dst), Self::Int64(v)) => dst[slot] = v[src],
                (Self::UInt64(dst), Self::UInt64(v)) => dst[slot] = v[src],
                (Self::Float64(dst), Self::Float64(v)) => dst[slot] = v[src],
                (Self::Utf8(dst), Self::Utf8(v)) => dst[slot].clone_from(&v[src]),
                (dst, v) => {
                    return Err(ColumnError::DtypeMismatch {
                        left: dst.dtype(),
                        right: v.dtype(),
                    });
                }
            }
        }
        Ok(out)
    }

    /// First position where `self[i] >= other[i]` does not hold.
    ///
    /// Floats use IEEE comparison here, so a NaN on either side is a violation.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn first_below(&self, other: &Self) -> Result<Option<usize>, ColumnError> {
        if self.len() != other.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        let found = match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.iter().zip(b).position(|(x, y)| x < y),
            (Self::Int64(a), Self::Int64(b)) => a.iter().zip(b).position(|(x, y)| x < y),
            (Self::UInt64(a), Self::UInt64(b)) => a.iter().zip(b).position(|(x, y)| x < y),
            (Self::Float64(a), Self::Float64(b)) => a.iter().zip(b).position(|(x, y)| !(x >= y)),
            (Self::Utf8(a), Self::Utf8(b)) => a.iter().zip(b).position(|(x, y)| x < y),
            _ => {
                return Err(ColumnError::DtypeMismatch {
                    left: self.dtype(),
                    right: other.dtype(),
                });
            }
        };
        Ok(found)
    }
}

impl From<Vec<bool>> for ValueArray {
    fn from(values: Vec<bool>) -> Self {
        Self::Bool(values)
    }
}

impl From<Vec<i64>> for ValueArray {
    fn from(values: Vec<i64>) -> Self {
        Self::Int64(values)
    }
}

impl From<Vec<u64>> for ValueArray {
    fn from(values: Vec<u64>) -> Self {
        Self::UInt64(values)
    }
}

impl From<Vec<f64>> for ValueArray {
    fn from(values: Vec<f64>) -> Self {
        Self::Float64(values)
    }
}

impl From<Vec<String>> for ValueArray {
    fn from(values: Vec<String>) -> Self {
        Self::Utf8(values)
    }
}

impl From<Vec<&str>> for ValueArray {
    fn from(values: Vec<&str>) -> Self {
        Self::Utf8(values.into_iter().map(str::to_owned).collect())
    }
}

/// One or more co-indexed columns; row `i` is the tuple of every column's
/// element `i`. A single array is a key set of arity 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ValueArray>", into = "Vec<ValueArray>")]
pub struct KeySet {
    columns: Vec<ValueArray>,
}

impl KeySet {
    pub fn new(columns: Vec<ValueArray>) -> Result<Self, ColumnError> {
        let first = columns.first().ok_or(ColumnError::EmptyKeySet)?;
        let len = first.len();
        for column in &columns[1..] {
            if column.len() != len {
                return Err(ColumnError::LengthMismatch {
                    left: len,
                    right: column.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn single(column: ValueArray) -> Self {
        Self {
            columns: vec![column],
        }
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns[0].len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[ValueArray] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, axis: usize) -> Option<&ValueArray> {
        self.columns.get(axis)
    }

    #[must_use]
    pub fn dtypes(&self) -> Vec<DType> {
        self.columns.iter().map(ValueArray::dtype).collect()
    }

    /// Lexicographic comparison of two rows.
    #[must_use]
    pub fn cmp_rows(&self, left: usize, right: usize) -> Ordering {
        for column in &self.columns {
            let ord = column.cmp_at(left, right);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let columns = self
            .columns
            .iter()
            .map(|column| column.take(positions))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    pub fn filter(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        let columns = self
            .columns
            .iter()
            .map(|column| column.filter(mask))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    pub fn slice(&self, start: usize, len: usize) -> Result<Self, ColumnError> {
        let columns = self
            .columns
            .iter()
            .map(|column| column.slice(start, len))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }

    /// Block-ordered, column-wise concatenation. All parts must share arity
    /// and per-column dtypes.
    pub fn concat(parts: &[&Self]) -> Result<Self, ColumnError> {
        let first = parts.first().ok_or(ColumnError::EmptyConcat)?;
        for part in parts {
            if part.arity() != first.arity() {
                return Err(ColumnError::ArityMismatch {
                    left: first.arity(),
                    right: part.arity(),
                });
            }
        }
        let columns = (0..first.arity())
            .map(|axis| {
                let column_parts: Vec<&ValueArray> =
                    parts.iter().map(|part| &part.columns[axis]).collect();
                ValueArray::concat(&column_parts)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns })
    }
}

impl From<ValueArray> for KeySet {
    fn from(column: ValueArray) -> Self {
        Self::single(column)
    }
}

impl TryFrom<Vec<ValueArray>> for KeySet {
    type Error = ColumnError;

    fn try_from(columns: Vec<ValueArray>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<KeySet> for Vec<ValueArray> {
    fn from(keys: KeySet) -> Self {
        keys.columns
    }
}

/// Dictionary-encoded strings: integer codes into a category table, with one
/// category reserved as the missing marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCategorical")]
pub struct Categorical {
    codes: Vec<i64>,
    categories: Vec<String>,
    na_code: i64,
}

/// Unchecked wire form of [`Categorical`].
#[derive(Deserialize)]
struct RawCategorical {
    codes: Vec<i64>,
    categories: Vec<String>,
    na_code: i64,
}

fn check_codes(codes: &[i64], categories: usize) -> Result<(), ColumnError> {
    match codes
        .iter()
        .find(|&&code| usize::try_from(code).map_or(true, |c| c >= categories))
    {
        Some(&code) => Err(ColumnError::InvalidCategoricalCode { code, categories }),
        None => Ok(()),
    }
}

impl TryFrom<RawCategorical> for Categorical {
    type Error = ColumnError;

    /// The table already carries its missing category, so both the codes and
    /// `na_code` must index into it.
    fn try_from(raw: RawCategorical) -> Result<Self, Self::Error> {
        check_codes(&[raw.na_code], raw.categories.len())?;
        check_codes(&raw.codes, raw.categories.len())?;
        Ok(Self {
            codes: raw.codes,
            categories: raw.categories,
            na_code: raw.na_code,
        })
    }
}

impl Categorical {
    pub const DEFAULT_NA_VALUE: &'static str = "N/A";

    /// Build from codes and a category table. `na_value` is appended to the
    /// table when absent; its position becomes the missing code.
    pub fn from_codes(
        codes: Vec<i64>,
        mut categories: Vec<String>,
        na_value: &str,
    ) -> Result<Self, ColumnError> {
        check_codes(&codes, categories.len())?;

        let na_pos = match categories.iter().position(|c| c == na_value) {
            Some(pos) => pos,
            None => {
                categories.push(na_value.to_owned());
                categories.len() - 1
            }
        };

        Ok(Self {
            codes,
            categories,
            na_code: na_pos as i64,
        })
    }

    #[must_use]
    pub fn codes(&self) -> &[i64] {
        &self.codes
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn na_code(&self) -> i64 {
        self.na_code
    }

    #[must_use]
    pub fn na_value(&self) -> &str {
        // na_code indexes the table; checked by from_codes and on deserialize.
        &self.categories[self.na_code as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    #[must_use]
    pub fn is_na(&self) -> Vec<bool> {
        self.codes.iter().map(|&c| c == self.na_code).collect()
    }

    #[must_use]
    pub fn decode(&self) -> Vec<&str> {
        self.codes
            .iter()
            .map(|&c| self.categories[c as usize].as_str())
            .collect()
    }
}

/// Function values for a lookup: either a plain array or an encoded one whose
/// codes are gathered and then re-wrapped with the original category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueColumn {
    Raw(ValueArray),
    Encoded(Categorical),
}

impl ValueColumn {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(values) => values.len(),
            Self::Encoded(cat) => cat.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `self[idx]` where `idx >= 0`, else the fill value. Encoded columns
    /// ignore `fill` and use their own missing code.
    pub fn gather(&self, indices: &[i64], fill: &Scalar) -> Result<Self, ColumnError> {
        match self {
            Self::Raw(values) => Ok(Self::Raw(values.take_or_fill(indices, fill)?)),
            Self::Encoded(cat) => {
                let codes = ValueArray::Int64(cat.codes.clone());
                let gathered = match codes.take_or_fill(indices, &Scalar::Int64(cat.na_code))? {
                    ValueArray::Int64(gathered) => gathered,
                    other => {
                        return Err(ColumnError::DtypeMismatch {
                            left: DType::Int64,
                            right: other.dtype(),
                        });
                    }
                };
                Ok(Self::Encoded(Categorical {
                    codes: gathered,
                    categories: cat.categories.clone(),
                    na_code: cat.na_code,
                }))
            }
        }
    }
}

impl From<ValueArray> for ValueColumn {
    fn from(values: ValueArray) -> Self {
        Self::Raw(values)
    }
}

impl From<Categorical> for ValueColumn {
    fn from(values: Categorical) -> Self {
        Self::Encoded(values)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use fa_types::{DType, Scalar};

    use super::{Categorical, ColumnError, KeySet, ValueArray, ValueColumn};

    #[test]
    fn concat_preserves_block_order() {
        let a = ValueArray::from(vec![3_i64, 1]);
        let b = ValueArray::from(vec![2_i64]);
        let out = ValueArray::concat(&[&a, &b]).expect("concat");
        assert_eq!(out, ValueArray::Int64(vec![3, 1, 2]));
    }

    #[test]
    fn concat_rejects_mixed_dtypes() {
        let a = ValueArray::from(vec![1_i64]);
        let b = ValueArray::from(vec![1.0_f64]);
        let err = ValueArray::concat(&[&a, &b]).expect_err("mixed");
        assert_eq!(
            err,
            ColumnError::DtypeMismatch {
                left: DType::Int64,
                right: DType::Float64
            }
        );
    }

    #[test]
    fn take_or_fill_writes_fill_for_negative_indices() {
        let values = ValueArray::from(vec![100_i64, 200, 300]);
        let out = values
            .take_or_fill(&[1, -1, 2], &Scalar::Int64(-1))
            .expect("gather");
        assert_eq!(out, ValueArray::Int64(vec![200, -1, 300]));
    }

    #[test]
    fn take_or_fill_rejects_out_of_bounds() {
        let values = ValueArray::from(vec![1.5_f64]);
        let err = values
            .take_or_fill(&[3], &Scalar::Int64(-1))
            .expect_err("oob");
        assert_eq!(err, ColumnError::IndexOutOfBounds { index: 3, len: 1 });
    }

    #[test]
    fn first_below_finds_inverted_bounds() {
        let high = ValueArray::from(vec![10_i64, 4, 20]);
        let low = ValueArray::from(vec![0_i64, 8, 20]);
        assert_eq!(high.first_below(&low).expect("same shape"), Some(1));
        assert_eq!(low.first_below(&low).expect("same shape"), None);
    }

    #[test]
    fn first_below_treats_nan_as_violation() {
        let high = ValueArray::from(vec![f64::NAN]);
        let low = ValueArray::from(vec![0.0_f64]);
        assert_eq!(high.first_below(&low).expect("same shape"), Some(0));
    }

    #[test]
    fn key_set_requires_equal_column_lengths() {
        let err = KeySet::new(vec![
            ValueArray::from(vec![1_i64, 2]),
            ValueArray::from(vec!["a"]),
        ])
        .expect_err("ragged");
        assert_eq!(err, ColumnError::LengthMismatch { left: 2, right: 1 });
        assert_eq!(KeySet::new(Vec::new()), Err(ColumnError::EmptyKeySet));
    }

    #[test]
    fn key_set_rows_compare_lexicographically() {
        let keys = KeySet::new(vec![
            ValueArray::from(vec![1_i64, 1, 0]),
            ValueArray::from(vec!["b", "a", "z"]),
        ])
        .expect("keys");
        assert_eq!(keys.cmp_rows(0, 1), Ordering::Greater);
        assert_eq!(keys.cmp_rows(2, 1), Ordering::Less);
        assert_eq!(keys.cmp_rows(0, 0), Ordering::Equal);
    }

    #[test]
    fn key_set_concat_checks_arity() {
        let one = KeySet::single(ValueArray::from(vec![1_i64]));
        let two = KeySet::new(vec![
            ValueArray::from(vec![1_i64]),
            ValueArray::from(vec![2_i64]),
        ])
        .expect("two");
        let err = KeySet::concat(&[&one, &two]).expect_err("arity");
        assert_eq!(err, ColumnError::ArityMismatch { left: 1, right: 2 });
    }

    #[test]
    fn key_set_round_trips_through_json() {
        let keys = KeySet::new(vec![
            ValueArray::from(vec![1_i64, 2]),
            ValueArray::from(vec!["x", "y"]),
        ])
        .expect("keys");
        let json = serde_json::to_string(&keys).expect("serialize");
        let back: KeySet = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, keys);
        assert!(serde_json::from_str::<KeySet>("[]").is_err());
    }

    #[test]
    fn categorical_appends_missing_category() {
        let cat = Categorical::from_codes(vec![0, 1, 0], vec!["lo".into(), "hi".into()], "N/A")
            .expect("categorical");
        assert_eq!(cat.na_code(), 2);
        assert_eq!(cat.na_value(), "N/A");
        assert_eq!(cat.decode(), vec!["lo", "hi", "lo"]);
    }

    #[test]
    fn categorical_reuses_existing_missing_category() {
        let cat = Categorical::from_codes(vec![1], vec!["N/A".into(), "x".into()], "N/A")
            .expect("categorical");
        assert_eq!(cat.na_code(), 0);
        assert_eq!(cat.categories().len(), 2);
    }

    #[test]
    fn categorical_rejects_codes_outside_table() {
        let err = Categorical::from_codes(vec![2], vec!["a".into()], "N/A").expect_err("code");
        assert_eq!(
            err,
            ColumnError::InvalidCategoricalCode {
                code: 2,
                categories: 1
            }
        );
    }

    #[test]
    fn categorical_deserialize_rejects_out_of_table_codes() {
        let err = serde_json::from_str::<Categorical>(
            r#"{"codes":[5],"categories":["a"],"na_code":9}"#,
        )
        .expect_err("codes outside table");
        assert!(err.to_string().contains("outside [0, 1)"));

        assert!(
            serde_json::from_str::<Categorical>(r#"{"codes":[0],"categories":["a"],"na_code":-1}"#)
                .is_err()
        );
        assert!(
            serde_json::from_str::<Categorical>(r#"{"codes":[3],"categories":["a","N/A"],"na_code":1}"#)
                .is_err()
        );
    }

    #[test]
    fn categorical_json_round_trip_keeps_table() {
        let cat = Categorical::from_codes(vec![1, 0], vec!["lo".into(), "hi".into()], "N/A")
            .expect("categorical");
        let json = serde_json::to_string(&cat).expect("serialize");
        let back: Categorical = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cat);
        assert_eq!(back.na_value(), "N/A");

        assert!(
            serde_json::from_str::<ValueColumn>(
                r#"{"kind":"encoded","codes":[0,7],"categories":["x","N/A"],"na_code":1}"#,
            )
            .is_err()
        );
    }

    #[test]
    fn encoded_gather_fills_with_missing_code() {
        let cat = Categorical::from_codes(vec![0, 1], vec!["a".into(), "b".into()], "N/A")
            .expect("categorical");
        let out = ValueColumn::from(cat)
            .gather(&[1, -1], &Scalar::Int64(-1))
            .expect("gather");
        let ValueColumn::Encoded(out) = out else {
            panic!("expected encoded output");
        };
        assert_eq!(out.decode(), vec!["b", "N/A"]);
        assert_eq!(out.is_na(), vec![false, true]);
    }
}
