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

//! The contracts every aggregate function fulfills: a buffer for GROUP BY
//! and partial aggregation, and a window-mode accumulator evaluated
//! against frame intervals of a materialized buffer.

use std::fmt::Debug;
use std::sync::Arc;

use windrow_common::{Result, Row, TaskContext, Value, WindowInterval};

use crate::expression::Expression;

/// Accumulates one group's worth of rows, one `update` per row.
///
/// Buffers are also the unit of partial aggregation: `merge` folds the
/// rows seen by another buffer into this one, and is defined to be exactly
/// `update` applied in sequence, so no implementation may substitute a
/// different merge algebra.
pub trait AggregationBuffer: Debug + Send {
    /// Folds one row into the buffer.
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()>;

    /// The aggregate value of everything folded in so far.
    fn eval(&mut self, ctx: &TaskContext) -> Result<Value>;

    /// Folds the input rows of a partial buffer into this one.
    fn merge(&mut self, ctx: &TaskContext, partial: &[Row]) -> Result<()> {
        for row in partial {
            self.update(ctx, row)?;
        }
        Ok(())
    }

    /// Releases any caches the buffer holds (e.g. a DISTINCT hash set).
    /// Must be idempotent; the default does nothing.
    fn dispose(&mut self) {}
}

/// Window-mode aggregate state, evaluated per frame interval over a shared
/// partition buffer.
pub trait Accumulator: Debug + Send {
    /// Discards any prior per-partition state and optionally precomputes
    /// auxiliary vectors (e.g. prefix sums) over the new partition.
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<()>;

    /// Computes the aggregate over `frame`, a sub-interval of the current
    /// partition. May be called many times per partition; ranking
    /// accumulators additionally advance an internal row cursor on each
    /// call, so callers must evaluate frames in partition order.
    fn evaluate(
        &mut self,
        ctx: &TaskContext,
        frame: WindowInterval,
        buffer: &[Row],
    ) -> Result<Value>;

    /// Releases per-partition state. Must be idempotent; the default does
    /// nothing.
    fn dispose(&mut self) {}
}

/// How a function wants to be framed when used over a window. Aggregates
/// follow the frame clause; ranking functions dictate their own framing
/// and ignore any frame clause, which is what SQL requires of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Respect the window definition (explicit frame clause, or the
    /// implicit UNBOUNDED PRECEDING .. CURRENT ROW frame under ORDER BY).
    #[default]
    Default,
    /// Always the whole partition, one frame per row (ROW_NUMBER, NTILE,
    /// LAG/LEAD).
    WholePartition,
    /// The current row's peer group (RANK, DENSE_RANK, PERCENT_RANK,
    /// CUME_DIST).
    PeerGroup,
}

/// An aggregate function bound to its argument expressions.
///
/// Aggregations are expressions so that planners can place them in
/// projection lists, but their scalar `eval` entry is a contract error:
/// values flow out of them only through buffers and accumulators.
pub trait AggregateExpr: Expression {
    /// The argument expressions, in declaration order.
    fn expressions(&self) -> Vec<Arc<dyn Expression>>;

    /// A fresh, empty buffer for GROUP BY or partial aggregation.
    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>>;

    /// A fresh window-mode accumulator.
    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>>;

    /// The framing this function requires, if any.
    fn framing(&self) -> Framing {
        Framing::Default
    }
}
