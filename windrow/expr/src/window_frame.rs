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

//! Window definitions: PARTITION BY, ORDER BY and the frame clause.

use std::fmt;
use std::sync::Arc;

use windrow_common::{Result, WindrowError};

use crate::expression::Expression;
use crate::sort::SortField;

/// The unit of a frame clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
}

impl fmt::Display for FrameUnits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameUnits::Rows => write!(f, "ROWS"),
            FrameUnits::Range => write!(f, "RANGE"),
        }
    }
}

/// One endpoint of a frame clause. Offsets are expressions; the planner
/// hands us literals, but any constant-foldable expression works.
#[derive(Debug, Clone)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(Arc<dyn Expression>),
    CurrentRow,
    Following(Arc<dyn Expression>),
    UnboundedFollowing,
}

impl fmt::Display for FrameBound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameBound::UnboundedPreceding => write!(f, "UNBOUNDED PRECEDING"),
            FrameBound::Preceding(e) => write!(f, "{e} PRECEDING"),
            FrameBound::CurrentRow => write!(f, "CURRENT ROW"),
            FrameBound::Following(e) => write!(f, "{e} FOLLOWING"),
            FrameBound::UnboundedFollowing => write!(f, "UNBOUNDED FOLLOWING"),
        }
    }
}

/// A ROWS or RANGE frame clause.
#[derive(Debug, Clone)]
pub struct FrameSpec {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: FrameBound,
}

impl FrameSpec {
    pub fn new(units: FrameUnits, start: FrameBound, end: FrameBound) -> Self {
        Self { units, start, end }
    }

    /// Rejects the frame shapes SQL forbids outright. Start/end pairs that
    /// merely cross (e.g. 1 FOLLOWING to 1 PRECEDING) are legal and clamp
    /// to an empty frame at evaluation time.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.start, FrameBound::UnboundedFollowing) {
            return Err(WindrowError::Execution(format!(
                "frame start cannot be UNBOUNDED FOLLOWING: {self}"
            )));
        }
        if matches!(self.end, FrameBound::UnboundedPreceding) {
            return Err(WindrowError::Execution(format!(
                "frame end cannot be UNBOUNDED PRECEDING: {self}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} BETWEEN {} AND {}", self.units, self.start, self.end)
    }
}

/// The OVER (...) clause of a window function.
#[derive(Debug, Clone, Default)]
pub struct WindowDefinition {
    pub partition_by: Vec<Arc<dyn Expression>>,
    pub order_by: Vec<SortField>,
    pub frame: Option<FrameSpec>,
}

impl WindowDefinition {
    pub fn new(
        partition_by: Vec<Arc<dyn Expression>>,
        order_by: Vec<SortField>,
        frame: Option<FrameSpec>,
    ) -> Self {
        Self {
            partition_by,
            order_by,
            frame,
        }
    }
}

impl fmt::Display for WindowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OVER (")?;
        let mut need_space = false;
        if !self.partition_by.is_empty() {
            write!(f, "PARTITION BY ")?;
            for (i, e) in self.partition_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{e}")?;
            }
            need_space = true;
        }
        if !self.order_by.is_empty() {
            if need_space {
                write!(f, " ")?;
            }
            write!(f, "ORDER BY ")?;
            for (i, s) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{s}")?;
            }
            need_space = true;
        }
        if let Some(frame) = &self.frame {
            if need_space {
                write!(f, " ")?;
            }
            write!(f, "{frame}")?;
        }
        write!(f, ")")
    }
}
