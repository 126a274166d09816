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

//! A window function expression couples an aggregate to a window
//! definition: it validates the frame clause against the ORDER BY,
//! resolves which framer drives the aggregate's accumulator, and carries
//! both through the partition iterator.

use std::fmt;
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value, WindrowError};
use windrow_expr::{
    Accumulator, AggregateExpr, Expression, FrameBound, FrameSpec, FrameUnits, Framing,
    SortField, WindowDefinition,
};

use super::framer::{Framer, RangeBound, RowsBound};

/// The framing resolved for one window function. Ranking functions ignore
/// the frame clause and dictate their own; aggregates follow the clause
/// or fall back to the implicit frame under ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerKind {
    Rows,
    Range,
    Partition,
    PeerGroup,
    Cumulative,
    GroupBy,
}

/// An aggregate bound to an OVER clause.
#[derive(Debug, Clone)]
pub struct WindowFunctionExpr {
    aggregate: Arc<dyn AggregateExpr>,
    window: Arc<WindowDefinition>,
    kind: FramerKind,
}

impl WindowFunctionExpr {
    pub fn try_new(
        aggregate: Arc<dyn AggregateExpr>,
        window: WindowDefinition,
    ) -> Result<Self> {
        if let Some(frame) = &window.frame {
            frame.validate()?;
            if frame.units == FrameUnits::Range {
                validate_range_frame(frame, &window.order_by)?;
            }
        }
        let kind = match aggregate.framing() {
            Framing::WholePartition => FramerKind::Partition,
            Framing::PeerGroup => FramerKind::PeerGroup,
            Framing::Default => match &window.frame {
                Some(frame) => match frame.units {
                    FrameUnits::Rows => FramerKind::Rows,
                    FrameUnits::Range => FramerKind::Range,
                },
                None if !window.order_by.is_empty() => FramerKind::Cumulative,
                None => FramerKind::Partition,
            },
        };
        Ok(Self {
            aggregate,
            window: Arc::new(window),
            kind,
        })
    }

    /// The GROUP BY framing of an aggregate: one frame per partition.
    pub(crate) fn group_by(
        aggregate: Arc<dyn AggregateExpr>,
        partition_by: Vec<Arc<dyn Expression>>,
    ) -> Self {
        Self {
            aggregate,
            window: Arc::new(WindowDefinition::new(partition_by, vec![], None)),
            kind: FramerKind::GroupBy,
        }
    }

    pub fn aggregate(&self) -> &Arc<dyn AggregateExpr> {
        &self.aggregate
    }

    pub fn partition_by(&self) -> &[Arc<dyn Expression>] {
        &self.window.partition_by
    }

    pub fn order_by(&self) -> &[SortField] {
        &self.window.order_by
    }

    pub fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        self.aggregate.create_accumulator()
    }

    /// Instantiates a fresh framer; frame bound offsets are evaluated
    /// here, with the context in hand.
    pub fn new_framer(&self, ctx: &TaskContext) -> Result<Framer> {
        Ok(match self.kind {
            FramerKind::Partition => Framer::partition(),
            FramerKind::PeerGroup => Framer::peer_group(),
            FramerKind::Cumulative => Framer::cumulative(),
            FramerKind::GroupBy => Framer::group_by(),
            FramerKind::Rows => {
                let frame = self.frame_spec()?;
                Framer::rows(
                    resolve_rows_bound(ctx, &frame.start)?,
                    resolve_rows_bound(ctx, &frame.end)?,
                )
            }
            FramerKind::Range => {
                let frame = self.frame_spec()?;
                Framer::range(
                    resolve_range_bound(ctx, &frame.start)?,
                    resolve_range_bound(ctx, &frame.end)?,
                )
            }
        })
    }

    fn frame_spec(&self) -> Result<&FrameSpec> {
        self.window.frame.as_ref().ok_or_else(|| {
            WindrowError::Internal(
                "explicit framing resolved without a frame clause".to_string(),
            )
        })
    }

    /// Whether this function emits one row per partition (GROUP BY mode)
    /// rather than one per input row.
    pub fn one_row_per_partition(&self) -> bool {
        self.kind == FramerKind::GroupBy
    }
}

impl fmt::Display for WindowFunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.kind == FramerKind::GroupBy {
            write!(f, "{}", self.aggregate)
        } else {
            write!(f, "{} {}", self.aggregate, self.window)
        }
    }
}

impl Expression for WindowFunctionExpr {
    fn data_type(&self) -> DataType {
        self.aggregate.data_type()
    }

    fn resolved(&self) -> bool {
        self.aggregate.resolved()
    }

    fn eval(&self, _ctx: &TaskContext, _row: &Row) -> Result<Value> {
        Err(WindrowError::EvalOnAggregation(self.to_string()))
    }
}

/// Binds `with_window` onto any aggregate handle, the way planners build
/// window functions: `sum.with_window(def)?`.
pub trait WithWindow {
    fn with_window(self, window: WindowDefinition) -> Result<WindowFunctionExpr>;
}

impl WithWindow for Arc<dyn AggregateExpr> {
    fn with_window(self, window: WindowDefinition) -> Result<WindowFunctionExpr> {
        WindowFunctionExpr::try_new(self, window)
    }
}

fn validate_range_frame(frame: &FrameSpec, order_by: &[SortField]) -> Result<()> {
    if order_by.len() != 1 {
        return Err(WindrowError::RangeInvalidOrderBy(order_by.len()));
    }
    let order_type = order_by[0].expr.data_type();
    for bound in [&frame.start, &frame.end] {
        if let FrameBound::Preceding(e) | FrameBound::Following(e) = bound {
            let interval_type = e.data_type();
            if !order_type.is_numeric() || !interval_type.same_family(&order_type) {
                return Err(WindrowError::RangeIntervalTypeMismatch {
                    order_type,
                    interval_type,
                });
            }
        }
    }
    Ok(())
}

fn resolve_rows_bound(ctx: &TaskContext, bound: &FrameBound) -> Result<RowsBound> {
    Ok(match bound {
        FrameBound::UnboundedPreceding => RowsBound::UnboundedPreceding,
        FrameBound::CurrentRow => RowsBound::CurrentRow,
        FrameBound::UnboundedFollowing => RowsBound::UnboundedFollowing,
        FrameBound::Preceding(e) => RowsBound::Preceding(rows_offset(ctx, e)?),
        FrameBound::Following(e) => RowsBound::Following(rows_offset(ctx, e)?),
    })
}

fn rows_offset(ctx: &TaskContext, e: &Arc<dyn Expression>) -> Result<u64> {
    e.eval(ctx, &Row::empty())?.to_u64().ok_or_else(|| {
        WindrowError::Execution(
            "ROWS frame offsets must be non-negative integers".to_string(),
        )
    })
}

fn resolve_range_bound(ctx: &TaskContext, bound: &FrameBound) -> Result<RangeBound> {
    Ok(match bound {
        FrameBound::UnboundedPreceding => RangeBound::UnboundedPreceding,
        FrameBound::CurrentRow => RangeBound::CurrentRow,
        FrameBound::UnboundedFollowing => RangeBound::UnboundedFollowing,
        FrameBound::Preceding(e) => {
            RangeBound::Preceding(e.eval(ctx, &Row::empty())?)
        }
        FrameBound::Following(e) => {
            RangeBound::Following(e.eval(ctx, &Row::empty())?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Sum;
    use crate::window::ranking::Rank;
    use windrow_common::DataType;
    use windrow_expr::{col, lit};

    fn sum_agg() -> Arc<dyn AggregateExpr> {
        Arc::new(Sum::new(col("z", 3, DataType::Int64)))
    }

    fn order_by_w() -> Vec<SortField> {
        vec![SortField::asc(col("w", 0, DataType::Int64))]
    }

    #[test]
    fn range_frames_require_exactly_one_order_key() {
        let frame = FrameSpec::new(
            FrameUnits::Range,
            FrameBound::Preceding(lit(Value::Int64(1))),
            FrameBound::CurrentRow,
        );
        let window = WindowDefinition::new(vec![], vec![], Some(frame));
        assert!(matches!(
            sum_agg().with_window(window),
            Err(WindrowError::RangeInvalidOrderBy(0))
        ));
    }

    #[test]
    fn range_offset_type_must_match_order_family() {
        let frame = FrameSpec::new(
            FrameUnits::Range,
            FrameBound::Preceding(lit(Value::Str("ivy".into()))),
            FrameBound::CurrentRow,
        );
        let window = WindowDefinition::new(vec![], order_by_w(), Some(frame));
        assert!(matches!(
            sum_agg().with_window(window),
            Err(WindrowError::RangeIntervalTypeMismatch { .. })
        ));
    }

    #[test]
    fn ranking_functions_override_the_frame_clause() -> Result<()> {
        let frame = FrameSpec::new(
            FrameUnits::Rows,
            FrameBound::Preceding(lit(Value::UInt64(1))),
            FrameBound::CurrentRow,
        );
        let rank: Arc<dyn AggregateExpr> = Arc::new(Rank::new());
        let expr = rank.with_window(WindowDefinition::new(
            vec![],
            order_by_w(),
            Some(frame),
        ))?;
        let ctx = TaskContext::new();
        assert!(matches!(expr.new_framer(&ctx)?, Framer::PeerGroup(_)));
        Ok(())
    }

    #[test]
    fn implicit_frame_under_order_by_is_cumulative() -> Result<()> {
        let ctx = TaskContext::new();
        let expr = sum_agg()
            .with_window(WindowDefinition::new(vec![], order_by_w(), None))?;
        assert!(matches!(expr.new_framer(&ctx)?, Framer::Cumulative(_)));

        let expr = sum_agg().with_window(WindowDefinition::default())?;
        assert!(matches!(expr.new_framer(&ctx)?, Framer::Partition(_)));
        Ok(())
    }

    #[test]
    fn scalar_eval_is_rejected() -> Result<()> {
        let ctx = TaskContext::new();
        let expr = sum_agg().with_window(WindowDefinition::default())?;
        assert!(matches!(
            expr.eval(&ctx, &Row::empty()),
            Err(WindrowError::EvalOnAggregation(_))
        ));
        Ok(())
    }

    #[test]
    fn display_includes_the_over_clause() -> Result<()> {
        let window = WindowDefinition::new(
            vec![col("x", 1, DataType::Text)],
            order_by_w(),
            None,
        );
        let expr = sum_agg().with_window(window)?;
        assert_eq!(expr.to_string(), "SUM(z) OVER (PARTITION BY x ORDER BY w ASC)");
        Ok(())
    }
}
