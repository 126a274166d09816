// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The universal runtime cell.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::str::FromStr;

use ahash::RandomState;
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::NaiveDateTime;

use crate::error::{Result, WindrowError};
use crate::types::DataType;

/// A dynamically typed cell. Every arithmetic and comparison path branches
/// on the tag; there is no runtime reflection anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Decimal(BigDecimal),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    /// Sentinel produced by the `*` expression; it stands for "the whole
    /// row" and is consumed only by `COUNT(*)`. It is never null and never
    /// enters a distinct set.
    RowRef,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The runtime tag of this value mapped onto the declared type system.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => {
                DataType::Int64
            }
            Value::UInt8(_) | Value::UInt16(_) | Value::UInt32(_) | Value::UInt64(_) => {
                DataType::UInt64
            }
            Value::Float32(_) | Value::Float64(_) => DataType::Float64,
            Value::Decimal(_) => DataType::Decimal,
            Value::Str(_) => DataType::Text,
            Value::Bytes(_) => DataType::Blob,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Json(_) => DataType::Json,
            Value::RowRef => DataType::Null,
        }
    }

    fn to_i128(&self) -> Option<i128> {
        match self {
            Value::Int8(v) => Some(*v as i128),
            Value::Int16(v) => Some(*v as i128),
            Value::Int32(v) => Some(*v as i128),
            Value::Int64(v) => Some(*v as i128),
            Value::UInt8(v) => Some(*v as i128),
            Value::UInt16(v) => Some(*v as i128),
            Value::UInt32(v) => Some(*v as i128),
            Value::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.to_i128().is_some()
    }

    /// Strict conversion to a signed 64-bit integer; strings parse, other
    /// families fail with `None`.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Str(s) => i64::from_str(s.trim()).ok(),
            Value::Float32(v) => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            Value::Decimal(d) => d.to_i64(),
            other => other.to_i128().and_then(|v| i64::try_from(v).ok()),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Value::Str(s) => u64::from_str(s.trim()).ok(),
            Value::Float32(v) if *v >= 0.0 => Some(*v as u64),
            Value::Float64(v) if *v >= 0.0 => Some(*v as u64),
            Value::Decimal(d) => d.to_u64(),
            other => other.to_i128().and_then(|v| u64::try_from(v).ok()),
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Decimal(d) => d.to_f64(),
            Value::Str(s) => f64::from_str(s.trim()).ok(),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    pub fn to_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Decimal(d) => Some(d.clone()),
            Value::Float32(v) => BigDecimal::from_f64(*v as f64),
            Value::Float64(v) => BigDecimal::from_f64(*v),
            Value::Str(s) => BigDecimal::from_str(s.trim()).ok(),
            other => other.to_i128().map(BigDecimal::from),
        }
    }

    /// Lossy numeric coercion used by SUM and AVG: null stays null, any
    /// non-null value that cannot be read as a number becomes `0.0`.
    pub fn coerced_f64(&self) -> Option<f64> {
        if self.is_null() {
            return None;
        }
        Some(self.to_f64().unwrap_or(0.0))
    }

    /// Lossy coercion used by the BIT_* family: null stays null, any
    /// non-null value that cannot be read as an unsigned integer becomes 0.
    pub fn coerced_u64(&self) -> Option<u64> {
        if self.is_null() {
            return None;
        }
        Some(
            self.to_u64()
                .or_else(|| self.to_f64().map(|f| if f >= 0.0 { f as u64 } else { 0 }))
                .unwrap_or(0),
        )
    }

    /// Converts the value into a JSON document; used by JSON_ARRAYAGG and
    /// JSON_OBJECTAGG, which preserve SQL NULL as JSON null.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null | Value::RowRef => serde_json::Value::Null,
            Value::Json(j) => j,
            Value::Str(s) => serde_json::Value::String(s),
            Value::Bytes(b) => {
                serde_json::Value::String(String::from_utf8_lossy(&b).into_owned())
            }
            Value::Float32(v) => serde_json::Number::from_f64(v as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Float64(v) => serde_json::Number::from_f64(v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(t) => {
                serde_json::Value::String(t.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            other => match other.to_i128() {
                Some(v) if v >= 0 => serde_json::Value::Number((v as u64).into()),
                Some(v) => serde_json::Value::Number((v as i64).into()),
                None => serde_json::Value::Null,
            },
        }
    }

    /// Pairwise comparison with SQL numeric coercion across families.
    /// Comparing values from unrelated families is an error, which callers
    /// like MIN/MAX propagate as fatal.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => return Ok(Ordering::Less),
            (false, true) => return Ok(Ordering::Greater),
            (false, false) => {}
        }
        if let (Some(a), Some(b)) = (self.to_i128(), other.to_i128()) {
            return Ok(a.cmp(&b));
        }
        let numeric = |v: &Value| v.data_type().is_numeric();
        if numeric(self) && numeric(other) {
            // Decimal on either side promotes the comparison to decimal,
            // otherwise both sides coerce to f64.
            if matches!(self, Value::Decimal(_)) || matches!(other, Value::Decimal(_)) {
                if let (Some(a), Some(b)) = (self.to_decimal(), other.to_decimal()) {
                    return Ok(a.cmp(&b));
                }
            }
            if let (Some(a), Some(b)) = (self.to_f64(), other.to_f64()) {
                return Ok(a.total_cmp(&b));
            }
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            _ => Err(WindrowError::Execution(format!(
                "cannot compare {} with {}",
                self.data_type(),
                other.data_type()
            ))),
        }
    }

    /// Infallible ordering used only by the buffer sort: values that the
    /// SQL comparator refuses to relate fall back to an arbitrary but
    /// consistent order on the type tag.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|_| self.tag_rank().cmp(&other.tag_rank()))
    }

    fn tag_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::UInt8(_)
            | Value::UInt16(_)
            | Value::UInt32(_)
            | Value::UInt64(_) => 1,
            Value::Float32(_) | Value::Float64(_) => 2,
            Value::Decimal(_) => 3,
            Value::Str(_) => 4,
            Value::Bytes(_) => 5,
            Value::Timestamp(_) => 6,
            Value::Json(_) => 7,
            Value::RowRef => 8,
        }
    }

    /// Numeric addition for RANGE frame boundary arithmetic.
    pub fn add(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        numeric_binop(self, other, i128::checked_add, |a, b| a + b, |a, b| a + b)
    }

    /// Numeric subtraction for RANGE frame boundary arithmetic.
    pub fn sub(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        numeric_binop(self, other, i128::checked_sub, |a, b| a - b, |a, b| a - b)
    }

    fn write_hash<H: Hasher>(&self, state: &mut H) -> Result<()> {
        match self {
            Value::Null => state.write_u8(0),
            Value::Int8(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::UInt8(_)
            | Value::UInt16(_)
            | Value::UInt32(_)
            | Value::UInt64(_) => {
                // One tag for the whole integer family so that e.g.
                // Int8(1) and UInt64(1) collapse to one distinct key.
                state.write_u8(1);
                match self.to_i128() {
                    Some(i) => state.write_i128(i),
                    None => unreachable!(),
                }
            }
            Value::Float32(v) => {
                state.write_u8(2);
                state.write_u64((*v as f64).to_bits());
            }
            Value::Float64(v) => {
                state.write_u8(2);
                state.write_u64(v.to_bits());
            }
            Value::Decimal(d) => {
                state.write_u8(3);
                d.normalized().to_string().hash(state);
            }
            Value::Str(s) => {
                state.write_u8(4);
                s.hash(state);
            }
            Value::Bytes(b) => {
                state.write_u8(5);
                b.hash(state);
            }
            Value::Timestamp(t) => {
                state.write_u8(6);
                state.write_i64(t.and_utc().timestamp_micros());
            }
            Value::Json(j) => {
                state.write_u8(7);
                j.to_string().hash(state);
            }
            Value::RowRef => {
                return Err(WindrowError::HashFailure(
                    "row references are not hashable".to_string(),
                ))
            }
        }
        Ok(())
    }
}

fn numeric_binop(
    lhs: &Value,
    rhs: &Value,
    ints: fn(i128, i128) -> Option<i128>,
    floats: fn(f64, f64) -> f64,
    decimals: fn(BigDecimal, BigDecimal) -> BigDecimal,
) -> Result<Value> {
    if let (Some(a), Some(b)) = (lhs.to_i128(), rhs.to_i128()) {
        return match ints(a, b) {
            Some(v) => Ok(narrow_i128(v)),
            None => Err(WindrowError::Execution(
                "integer overflow in frame boundary arithmetic".to_string(),
            )),
        };
    }
    if matches!(lhs, Value::Decimal(_)) || matches!(rhs, Value::Decimal(_)) {
        if let (Some(a), Some(b)) = (lhs.to_decimal(), rhs.to_decimal()) {
            return Ok(Value::Decimal(decimals(a, b)));
        }
    }
    if let (Some(a), Some(b)) = (lhs.to_f64(), rhs.to_f64()) {
        return Ok(Value::Float64(floats(a, b)));
    }
    Err(WindrowError::Execution(format!(
        "invalid operands {} and {} for numeric arithmetic",
        lhs.data_type(),
        rhs.data_type()
    )))
}

fn narrow_i128(v: i128) -> Value {
    match i64::try_from(v) {
        Ok(v) => Value::Int64(v),
        Err(_) => match u64::try_from(v) {
            Ok(v) => Value::UInt64(v),
            Err(_) => Value::Decimal(BigDecimal::from(v)),
        },
    }
}

/// Structural hash of a tuple of values under the given hasher seed, used
/// for DISTINCT tracking. Null inputs are the caller's business (they must
/// never enter a distinct set); unhashable values report [WindrowError::HashFailure].
pub fn hash_of(values: &[Value], state: &RandomState) -> Result<u64> {
    let mut hasher = state.build_hasher();
    for v in values {
        v.write_hash(&mut hasher)?;
    }
    Ok(hasher.finish())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Json(v) => write!(f, "{v}"),
            Value::RowRef => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_family_numeric_compare() -> Result<()> {
        assert_eq!(
            Value::Int64(2).compare(&Value::UInt8(2))?,
            Ordering::Equal
        );
        assert_eq!(
            Value::Float64(1.5).compare(&Value::Int64(2))?,
            Ordering::Less
        );
        let d = Value::Decimal(BigDecimal::from_str("2.50").unwrap());
        assert_eq!(d.compare(&Value::Float64(2.5))?, Ordering::Equal);
        assert!(Value::Str("a".into()).compare(&Value::Int64(1)).is_err());
        Ok(())
    }

    #[test]
    fn coercion_failures_become_zero() {
        assert_eq!(Value::Str("oak".into()).coerced_f64(), Some(0.0));
        assert_eq!(Value::Str("2.5".into()).coerced_f64(), Some(2.5));
        assert_eq!(Value::Null.coerced_f64(), None);
        assert_eq!(Value::Str("oak".into()).coerced_u64(), Some(0));
        assert_eq!(Value::Int64(-3).coerced_u64(), Some(0));
    }

    #[test]
    fn integer_family_hashes_collapse() -> Result<()> {
        let state = RandomState::with_seeds(1, 2, 3, 4);
        let a = hash_of(&[Value::Int8(7)], &state)?;
        let b = hash_of(&[Value::UInt64(7)], &state)?;
        let c = hash_of(&[Value::Int64(8)], &state)?;
        assert_eq!(a, b);
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn row_refs_are_not_hashable() {
        let state = RandomState::with_seeds(1, 2, 3, 4);
        assert!(matches!(
            hash_of(&[Value::RowRef], &state),
            Err(WindrowError::HashFailure(_))
        ));
    }

    #[test]
    fn frame_boundary_arithmetic() -> Result<()> {
        assert_eq!(Value::Int64(5).add(&Value::Int64(2))?, Value::Int64(7));
        assert_eq!(Value::Int64(5).sub(&Value::UInt8(2))?, Value::Int64(3));
        assert_eq!(
            Value::Float64(1.5).add(&Value::Int64(1))?,
            Value::Float64(2.5)
        );
        assert_eq!(Value::Null.add(&Value::Int64(1))?, Value::Null);
        Ok(())
    }
}
