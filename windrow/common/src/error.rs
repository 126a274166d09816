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

//! Error types for the windrow engine.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::result;

use crate::types::DataType;

/// Result type for operations that could result in a [WindrowError].
pub type Result<T, E = WindrowError> = result::Result<T, E>;

/// A generic boxed error for wrapped collaborator failures.
pub type GenericError = Box<dyn Error + Send + Sync>;

/// Windrow error.
#[derive(Debug)]
pub enum WindrowError {
    /// An aggregation constructor was called with the wrong number of
    /// argument expressions.
    InvalidArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
    /// The scalar evaluation entry point was called on an aggregation that
    /// has not been bound to a window; aggregations are evaluated through
    /// the iterator machinery, never row-by-row.
    EvalOnAggregation(String),
    /// A framer was asked for its current interval before being bound to a
    /// partition.
    PartitionNotSet,
    /// A partition iterator was advanced past its last partition.
    NoPartitions,
    /// A RANGE frame requires exactly one ORDER BY expression; the window
    /// definition carried a different number.
    RangeInvalidOrderBy(usize),
    /// A RANGE frame offset does not belong to the same type family as the
    /// ORDER BY expression.
    RangeIntervalTypeMismatch {
        order_type: DataType,
        interval_type: DataType,
    },
    /// JSON_OBJECTAGG encountered a null key.
    JsonObjectAggNullKey,
    /// A structural hash could not be computed for a DISTINCT key.
    HashFailure(String),
    /// The task was cancelled through its context.
    Cancelled,
    /// Error returned during execution of the query.
    Execution(String),
    /// Internal error; this error should not happen and signals a bug.
    Internal(String),
    /// Error surfaced from a downstream collaborator (child iterator,
    /// expression evaluation), wrapped and propagated unchanged.
    External(GenericError),
}

impl WindrowError {
    /// Wraps an arbitrary collaborator error.
    pub fn from_external<E: Error + Send + Sync + 'static>(e: E) -> Self {
        WindrowError::External(Box::new(e))
    }
}

impl Display for WindrowError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            WindrowError::InvalidArgumentCount {
                function,
                expected,
                actual,
            } => write!(
                f,
                "{function} expects {expected} argument(s), {actual} given"
            ),
            WindrowError::EvalOnAggregation(name) => write!(
                f,
                "cannot evaluate aggregation {name} as a scalar expression; \
                 use the window evaluation path"
            ),
            WindrowError::PartitionNotSet => {
                write!(f, "attempted to access the interval of an unset partition")
            }
            WindrowError::NoPartitions => {
                write!(f, "attempted to advance past the last partition")
            }
            WindrowError::RangeInvalidOrderBy(n) => write!(
                f,
                "a RANGE frame requires exactly one ORDER BY expression, found {n}"
            ),
            WindrowError::RangeIntervalTypeMismatch {
                order_type,
                interval_type,
            } => write!(
                f,
                "invalid RANGE offset type {interval_type} for ORDER BY type {order_type}"
            ),
            WindrowError::JsonObjectAggNullKey => {
                write!(f, "JSON documents may not contain NULL member names")
            }
            WindrowError::HashFailure(desc) => {
                write!(f, "could not compute hash of value: {desc}")
            }
            WindrowError::Cancelled => write!(f, "task was cancelled"),
            WindrowError::Execution(desc) => write!(f, "Execution error: {desc}"),
            WindrowError::Internal(desc) => write!(
                f,
                "Internal error: {desc}. This was likely caused by a bug in \
                 windrow's code and we would welcome that you file a bug report"
            ),
            WindrowError::External(e) => write!(f, "External error: {e}"),
        }
    }
}

impl Error for WindrowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WindrowError::External(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<GenericError> for WindrowError {
    fn from(e: GenericError) -> Self {
        WindrowError::External(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = WindrowError::InvalidArgumentCount {
            function: "AVG".to_string(),
            expected: 1,
            actual: 3,
        };
        assert_eq!(e.to_string(), "AVG expects 1 argument(s), 3 given");

        let e = WindrowError::RangeInvalidOrderBy(2);
        assert!(e.to_string().contains("exactly one ORDER BY"));
    }

    #[test]
    fn external_source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let e = WindrowError::from_external(io);
        assert!(e.source().is_some());
        assert!(e.to_string().contains("disk on fire"));
    }
}
