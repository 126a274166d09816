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

//! Declared SQL types and their coercion rules.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;

use crate::error::{Result, WindrowError};
use crate::value::Value;

/// The declared type of an expression. Runtime cells are [Value]s and carry
/// their own tag; `DataType` is what expressions advertise before
/// evaluation and what drives comparison and conversion at the seams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Int64,
    UInt64,
    Float64,
    Decimal,
    /// Variable-length character type with a byte bound.
    Varchar(u64),
    Text,
    /// Variable-length binary type with a byte bound.
    Varbinary(u64),
    Blob,
    Timestamp,
    Json,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 | DataType::Decimal
        )
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Varchar(_) | DataType::Text)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, DataType::Varbinary(_) | DataType::Blob)
    }

    /// Whether two declared types belong to the same comparison family
    /// (all numerics coerce to one family).
    pub fn same_family(&self, other: &DataType) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return true;
        }
        if self.is_text() && other.is_text() {
            return true;
        }
        if self.is_binary() && other.is_binary() {
            return true;
        }
        self == other
    }

    /// SQL-coerced comparison of two values under this type. Nulls sort
    /// first and compare equal to each other, which is what partition
    /// boundary detection needs.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ok(Ordering::Equal),
            (true, false) => Ok(Ordering::Less),
            (false, true) => Ok(Ordering::Greater),
            (false, false) => a.compare(b),
        }
    }

    /// Converts a value into this type. Nulls pass through unchanged.
    pub fn convert(&self, v: Value) -> Result<Value> {
        if v.is_null() {
            return Ok(Value::Null);
        }
        match self {
            DataType::Null => Ok(Value::Null),
            DataType::Int64 => v
                .to_i64()
                .map(Value::Int64)
                .ok_or_else(|| conversion_error(&v, self)),
            DataType::UInt64 => v
                .to_u64()
                .map(Value::UInt64)
                .ok_or_else(|| conversion_error(&v, self)),
            DataType::Float64 => v
                .to_f64()
                .map(Value::Float64)
                .ok_or_else(|| conversion_error(&v, self)),
            DataType::Decimal => v
                .to_decimal()
                .map(Value::Decimal)
                .ok_or_else(|| conversion_error(&v, self)),
            DataType::Varchar(_) | DataType::Text => Ok(Value::Str(v.to_string())),
            DataType::Varbinary(_) | DataType::Blob => match v {
                Value::Bytes(b) => Ok(Value::Bytes(b)),
                Value::Str(s) => Ok(Value::Bytes(s.into_bytes())),
                other => Ok(Value::Bytes(other.to_string().into_bytes())),
            },
            DataType::Timestamp => match v {
                Value::Timestamp(t) => Ok(Value::Timestamp(t)),
                other => Err(conversion_error(&other, self)),
            },
            DataType::Json => Ok(Value::Json(v.into_json())),
        }
    }

    /// The zero of this type's numeric family, used where SQL semantics
    /// replace an unconvertible value with zero.
    pub fn zero(&self) -> Value {
        match self {
            DataType::UInt64 => Value::UInt64(0),
            DataType::Float64 => Value::Float64(0.0),
            DataType::Decimal => Value::Decimal(BigDecimal::from(0)),
            _ => Value::Int64(0),
        }
    }
}

fn conversion_error(v: &Value, to: &DataType) -> WindrowError {
    WindrowError::Execution(format!("cannot convert {v} to {to}"))
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Int64 => write!(f, "BIGINT"),
            DataType::UInt64 => write!(f, "BIGINT UNSIGNED"),
            DataType::Float64 => write!(f, "DOUBLE"),
            DataType::Decimal => write!(f, "DECIMAL"),
            DataType::Varchar(n) => write!(f, "VARCHAR({n})"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Varbinary(n) => write!(f, "VARBINARY({n})"),
            DataType::Blob => write!(f, "BLOB"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Json => write!(f, "JSON"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_families_coerce() {
        assert!(DataType::Int64.same_family(&DataType::Decimal));
        assert!(DataType::UInt64.same_family(&DataType::Float64));
        assert!(!DataType::Int64.same_family(&DataType::Text));
        assert!(DataType::Varchar(20).same_family(&DataType::Text));
    }

    #[test]
    fn compare_treats_nulls_as_equal() -> Result<()> {
        let t = DataType::Int64;
        assert_eq!(t.compare(&Value::Null, &Value::Null)?, Ordering::Equal);
        assert_eq!(t.compare(&Value::Null, &Value::Int64(1))?, Ordering::Less);
        assert_eq!(
            t.compare(&Value::Int64(2), &Value::Int64(1))?,
            Ordering::Greater
        );
        Ok(())
    }

    #[test]
    fn convert_between_numeric_families() -> Result<()> {
        assert_eq!(
            DataType::UInt64.convert(Value::Int64(42))?,
            Value::UInt64(42)
        );
        assert_eq!(
            DataType::Float64.convert(Value::Str("2.5".to_string()))?,
            Value::Float64(2.5)
        );
        assert!(DataType::UInt64.convert(Value::Int64(-1)).is_err());
        Ok(())
    }
}
