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

//! Aggregate function implementations.

use std::sync::Arc;

use windrow_common::{Result, Row, TaskContext, Value, WindowInterval, WindrowError};
use windrow_expr::{Accumulator, AggregateExpr};

pub mod bit_ops;
pub mod count;
pub mod group_concat;
pub mod json_agg;
pub mod min_max;
pub mod sum_avg;
pub mod variance;

pub use bit_ops::{BitAnd, BitOr, BitXor};
pub use count::{Count, CountDistinct};
pub use group_concat::GroupConcat;
pub use json_agg::{JsonArrayAgg, JsonObjectAgg};
pub use min_max::{AnyValue, First, Last, Max, Min};
pub use sum_avg::{Avg, Sum};
pub use variance::{StddevPop, StddevSamp, VarPop, VarSamp};

/// Implements [windrow_expr::Expression] for an aggregate type: the
/// declared type comes from the aggregate's `result_type`, and the scalar
/// evaluation entry is a contract error because aggregates only produce
/// values through buffers and accumulators.
macro_rules! impl_aggregate_expression {
    ($t:ty) => {
        impl windrow_expr::Expression for $t {
            fn data_type(&self) -> windrow_common::DataType {
                self.result_type()
            }

            fn resolved(&self) -> bool {
                windrow_expr::AggregateExpr::expressions(self)
                    .iter()
                    .all(|e| e.resolved())
            }

            fn eval(
                &self,
                _ctx: &windrow_common::TaskContext,
                _row: &windrow_common::Row,
            ) -> windrow_common::Result<windrow_common::Value> {
                Err(windrow_common::WindrowError::EvalOnAggregation(
                    self.to_string(),
                ))
            }
        }
    };
}
pub(crate) use impl_aggregate_expression;

/// Checks an aggregation constructor's argument count.
pub(crate) fn check_arity(
    function: &str,
    expected: usize,
    args: &[Arc<dyn windrow_expr::Expression>],
) -> Result<()> {
    if args.len() != expected {
        return Err(WindrowError::InvalidArgumentCount {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// The fallback window-mode accumulator: replays the frame through a
/// fresh [windrow_expr::AggregationBuffer]. Correct for every aggregate
/// whose buffer is correct; the additive functions override it with
/// prefix-sum acceleration instead.
#[derive(Debug)]
pub struct ScanAccumulator {
    aggregate: Arc<dyn AggregateExpr>,
    partition: Option<WindowInterval>,
}

impl ScanAccumulator {
    pub fn new(aggregate: Arc<dyn AggregateExpr>) -> Self {
        Self {
            aggregate,
            partition: None,
        }
    }
}

impl Accumulator for ScanAccumulator {
    fn start_partition(
        &mut self,
        _ctx: &TaskContext,
        partition: WindowInterval,
        _buffer: &[Row],
    ) -> Result<()> {
        self.partition = Some(partition);
        Ok(())
    }

    fn evaluate(
        &mut self,
        ctx: &TaskContext,
        frame: WindowInterval,
        buffer: &[Row],
    ) -> Result<Value> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if !frame.within(&partition) {
            return Err(WindrowError::Internal(format!(
                "frame {frame} escapes partition {partition}"
            )));
        }
        let mut buf = self.aggregate.new_buffer()?;
        for row in &buffer[frame.start..frame.end] {
            buf.update(ctx, row)?;
        }
        let value = buf.eval(ctx);
        buf.dispose();
        value
    }

    fn dispose(&mut self) {
        self.partition = None;
    }
}

/// Boxes a frame-scanning accumulator over a clone of `aggregate`.
pub(crate) fn scan_accumulator<T>(aggregate: &T) -> Result<Box<dyn Accumulator>>
where
    T: AggregateExpr + Clone + 'static,
{
    Ok(Box::new(ScanAccumulator::new(Arc::new(aggregate.clone()))))
}
