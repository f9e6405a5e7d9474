#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    Int64,
    UInt64,
    Float64,
    Utf8,
}

impl DType {
    /// Numeric dtypes are the ones interval bounds may use.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::UInt64 | Self::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
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

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Ok(*v as f64),
            Self::UInt64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Utf8(v) => Err(TypeError::NonNumericValue {
                value: v.clone(),
                dtype: DType::Utf8,
            }),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot cast scalar of dtype {from} to {to}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to an integer dtype without loss")]
    LossyFloatToInt { value: f64 },
    #[error("expected 0/1 for bool cast but found {value}")]
    InvalidBool { value: String },
    #[error("value {value:?} has non-numeric dtype {dtype}")]
    NonNumericValue { value: String, dtype: DType },
}

/// Total order used by every sort in the workspace.
///
/// Numbers compare numerically with `-0.0 == 0.0`; NaN sorts after every
/// number and equals itself.
#[must_use]
pub fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn float_to_integer(value: f64) -> Result<f64, TypeError> {
    if !value.is_finite() || value != value.trunc() {
        return Err(TypeError::LossyFloatToInt { value });
    }
    Ok(value)
}

/// Cast a scalar to a target dtype, taking ownership so identity casts are free.
///
/// Int64 into UInt64 reinterprets the two's complement bits, so the `-1`
/// not-found sentinel becomes `u64::MAX` on unsigned columns.
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if from == target {
        return Ok(value);
    }

    match (target, &value) {
        (DType::Bool, Scalar::Int64(v)) => match *v {
            0 => Ok(Scalar::Bool(false)),
            1 => Ok(Scalar::Bool(true)),
            _ => Err(TypeError::InvalidBool {
                value: v.to_string(),
            }),
        },
        (DType::Bool, Scalar::UInt64(v)) => match *v {
            0 => Ok(Scalar::Bool(false)),
            1 => Ok(Scalar::Bool(true)),
            _ => Err(TypeError::InvalidBool {
                value: v.to_string(),
            }),
        },
        (DType::Int64, Scalar::Bool(v)) => Ok(Scalar::Int64(i64::from(*v))),
        (DType::Int64, Scalar::UInt64(v)) => i64::try_from(*v)
            .map(Scalar::Int64)
            .map_err(|_| TypeError::InvalidCast { from, to: target }),
        (DType::Int64, Scalar::Float64(v)) => {
            let v = float_to_integer(*v)?;
            if v < i64::MIN as f64 || v > i64::MAX as f64 {
                return Err(TypeError::LossyFloatToInt { value: v });
            }
            Ok(Scalar::Int64(v as i64))
        }
        (DType::UInt64, Scalar::Bool(v)) => Ok(Scalar::UInt64(u64::from(*v))),
        (DType::UInt64, Scalar::Int64(v)) => Ok(Scalar::UInt64(*v as u64)),
        (DType::UInt64, Scalar::Float64(v)) => {
            let v = float_to_integer(*v)?;
            if v < 0.0 || v > u64::MAX as f64 {
                return Err(TypeError::LossyFloatToInt { value: v });
            }
            Ok(Scalar::UInt64(v as u64))
        }
        (DType::Float64, Scalar::Bool(_) | Scalar::Int64(_) | Scalar::UInt64(_)) => {
            Ok(Scalar::Float64(value.to_f64()?))
        }
        _ => Err(TypeError::InvalidCast { from, to: target }),
    }
}

/// Cast a scalar reference to a target dtype (clones only when conversion is needed).
pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}
