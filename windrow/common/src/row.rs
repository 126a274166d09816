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

//! Rows and buffer intervals.

use std::fmt;

use crate::error::{Result, WindrowError};
use crate::value::Value;

/// An ordered, immutable sequence of values. Rows carry no schema at
/// runtime; schema is implicit in the expressions referencing them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Produces a new row with `value` appended; the receiver is consumed.
    /// This is how the materialization step attaches the emission-index
    /// sentinel cell.
    pub fn append(mut self, value: Value) -> Row {
        self.values.push(value);
        self
    }

    /// Splits off the last cell, returning the shortened row and the cell.
    /// Inverse of [Row::append]; used to strip the sentinel.
    pub fn split_tail(mut self) -> Result<(Row, Value)> {
        match self.values.pop() {
            Some(tail) => Ok((self, tail)),
            None => Err(WindrowError::Internal(
                "cannot split the tail off an empty row".to_string(),
            )),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// A half-open `[start, end)` index interval into a window buffer.
/// `start == end` denotes an empty frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowInterval {
    pub start: usize,
    pub end: usize,
}

impl WindowInterval {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, idx: usize) -> bool {
        idx >= self.start && idx < self.end
    }

    /// Whether this interval is fully inside `outer`. Framers must only
    /// ever produce sub-intervals of the partition that birthed them.
    pub fn within(&self, outer: &WindowInterval) -> bool {
        self.is_empty() || (self.start >= outer.start && self.end <= outer.end)
    }
}

impl fmt::Display for WindowInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
