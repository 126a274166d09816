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

//! Ranking and positional window functions: ROW_NUMBER, RANK, DENSE_RANK,
//! PERCENT_RANK, CUME_DIST, NTILE, LAG and LEAD.
//!
//! These dictate their own framing (whole partition or peer group) and
//! keep a per-partition cursor that advances on every `evaluate` call, so
//! the partition iterator must evaluate frames in partition order — which
//! is the only order framers produce.

use std::fmt;
use std::sync::Arc;

use windrow_common::{
    DataType, Result, Row, TaskContext, Value, WindowInterval, WindrowError,
};
use windrow_expr::{
    Accumulator, AggregateExpr, AggregationBuffer, Expression, Framing,
};

use crate::aggregate::{check_arity, impl_aggregate_expression};

fn window_only_buffer(name: &str) -> WindrowError {
    WindrowError::Execution(format!(
        "{name} may only be used as a window function"
    ))
}

/// ROW_NUMBER(): the 1-based position of the row within its partition
/// after ordering.
#[derive(Debug, Clone, Default)]
pub struct RowNumber;

impl RowNumber {
    pub fn new() -> Self {
        Self
    }

    fn result_type(&self) -> DataType {
        DataType::UInt64
    }
}

impl fmt::Display for RowNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ROW_NUMBER()")
    }
}

impl_aggregate_expression!(RowNumber);

impl AggregateExpr for RowNumber {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Err(window_only_buffer("ROW_NUMBER"))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(RowNumberAccumulator { row_number: 0 }))
    }

    fn framing(&self) -> Framing {
        Framing::WholePartition
    }
}

#[derive(Debug)]
struct RowNumberAccumulator {
    row_number: u64,
}

impl Accumulator for RowNumberAccumulator {
    fn start_partition(
        &mut self,
        _ctx: &TaskContext,
        _partition: WindowInterval,
        _buffer: &[Row],
    ) -> Result<()> {
        self.row_number = 0;
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        _frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        self.row_number += 1;
        Ok(Value::UInt64(self.row_number))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankKind {
    Rank,
    DenseRank,
    PercentRank,
    CumeDist,
}

impl RankKind {
    fn name(self) -> &'static str {
        match self {
            RankKind::Rank => "RANK",
            RankKind::DenseRank => "DENSE_RANK",
            RankKind::PercentRank => "PERCENT_RANK",
            RankKind::CumeDist => "CUME_DIST",
        }
    }
}

macro_rules! rank_function {
    ($t:ident, $kind:expr, $result:expr) => {
        #[derive(Debug, Clone, Default)]
        pub struct $t;

        impl $t {
            pub fn new() -> Self {
                Self
            }

            fn result_type(&self) -> DataType {
                $result
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}()", $kind.name())
            }
        }

        impl_aggregate_expression!($t);

        impl AggregateExpr for $t {
            fn expressions(&self) -> Vec<Arc<dyn Expression>> {
                vec![]
            }

            fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
                Err(window_only_buffer($kind.name()))
            }

            fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
                Ok(Box::new(RankAccumulator {
                    kind: $kind,
                    partition: None,
                    last_peer: None,
                    dense_rank: 0,
                }))
            }

            fn framing(&self) -> Framing {
                Framing::PeerGroup
            }
        }
    };
}

rank_function!(Rank, RankKind::Rank, DataType::UInt64);
rank_function!(DenseRank, RankKind::DenseRank, DataType::UInt64);
rank_function!(PercentRank, RankKind::PercentRank, DataType::Float64);
rank_function!(CumeDist, RankKind::CumeDist, DataType::Float64);

/// Evaluated against peer-group frames: `frame.start` is the first row of
/// the current peer group, so ranks fall out of plain index arithmetic.
#[derive(Debug)]
struct RankAccumulator {
    kind: RankKind,
    partition: Option<WindowInterval>,
    last_peer: Option<WindowInterval>,
    dense_rank: u64,
}

impl Accumulator for RankAccumulator {
    fn start_partition(
        &mut self,
        _ctx: &TaskContext,
        partition: WindowInterval,
        _buffer: &[Row],
    ) -> Result<()> {
        self.partition = Some(partition);
        self.last_peer = None;
        self.dense_rank = 0;
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.last_peer != Some(frame) {
            self.last_peer = Some(frame);
            self.dense_rank += 1;
        }
        let rank = (frame.start - partition.start + 1) as u64;
        Ok(match self.kind {
            RankKind::Rank => Value::UInt64(rank),
            RankKind::DenseRank => Value::UInt64(self.dense_rank),
            RankKind::PercentRank => {
                let size = partition.len();
                if size <= 1 {
                    Value::Float64(0.0)
                } else {
                    Value::Float64((rank - 1) as f64 / (size - 1) as f64)
                }
            }
            RankKind::CumeDist => {
                let size = partition.len().max(1);
                Value::Float64((frame.end - partition.start) as f64 / size as f64)
            }
        })
    }

    fn dispose(&mut self) {
        self.partition = None;
        self.last_peer = None;
    }
}

/// NTILE(n): spreads the partition's rows over `n` buckets as evenly as
/// possible, earlier buckets one row larger.
#[derive(Debug, Clone)]
pub struct Ntile {
    buckets: Arc<dyn Expression>,
}

impl Ntile {
    pub fn try_new(args: Vec<Arc<dyn Expression>>) -> Result<Self> {
        check_arity("NTILE", 1, &args)?;
        let [buckets] = <[Arc<dyn Expression>; 1]>::try_from(args)
            .map_err(|_| WindrowError::Internal("NTILE arity".to_string()))?;
        Ok(Self { buckets })
    }

    fn result_type(&self) -> DataType {
        DataType::UInt64
    }
}

impl fmt::Display for Ntile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NTILE({})", self.buckets)
    }
}

impl_aggregate_expression!(Ntile);

impl AggregateExpr for Ntile {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.buckets.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Err(window_only_buffer("NTILE"))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(NtileAccumulator {
            buckets_expr: self.buckets.clone(),
            partition: None,
            buckets: 1,
            pos: 0,
        }))
    }

    fn framing(&self) -> Framing {
        Framing::WholePartition
    }
}

#[derive(Debug)]
struct NtileAccumulator {
    buckets_expr: Arc<dyn Expression>,
    partition: Option<WindowInterval>,
    buckets: usize,
    pos: usize,
}

impl Accumulator for NtileAccumulator {
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        _buffer: &[Row],
    ) -> Result<()> {
        let n = self
            .buckets_expr
            .eval(ctx, &Row::empty())?
            .to_u64()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                WindrowError::Execution(
                    "NTILE bucket count must be a positive integer".to_string(),
                )
            })?;
        self.buckets = n as usize;
        self.partition = Some(partition);
        self.pos = 0;
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        _frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        let size = partition.len();
        let i = self.pos;
        self.pos += 1;
        let quotient = size / self.buckets;
        let remainder = size % self.buckets;
        let bucket = if quotient == 0 {
            i + 1
        } else if i < remainder * (quotient + 1) {
            i / (quotient + 1) + 1
        } else {
            remainder + (i - remainder * (quotient + 1)) / quotient + 1
        };
        Ok(Value::UInt64(bucket as u64))
    }

    fn dispose(&mut self) {
        self.partition = None;
    }
}

macro_rules! lag_lead_function {
    ($t:ident, $name:literal, $lead:literal) => {
        /// Evaluates its argument on the row `offset` positions away
        /// within the partition; out-of-partition positions yield the
        /// default expression evaluated on the current row, or null.
        #[derive(Debug, Clone)]
        pub struct $t {
            expr: Arc<dyn Expression>,
            offset: Option<Arc<dyn Expression>>,
            default: Option<Arc<dyn Expression>>,
        }

        impl $t {
            pub fn try_new(args: Vec<Arc<dyn Expression>>) -> Result<Self> {
                if args.is_empty() || args.len() > 3 {
                    check_arity($name, 3, &args)?;
                }
                let mut args = args.into_iter();
                Ok(Self {
                    expr: match args.next() {
                        Some(e) => e,
                        None => {
                            return Err(WindrowError::Internal(
                                concat!($name, " arity").to_string(),
                            ))
                        }
                    },
                    offset: args.next(),
                    default: args.next(),
                })
            }

            fn result_type(&self) -> DataType {
                self.expr.data_type()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($name, "({})"), self.expr)?;
                Ok(())
            }
        }

        impl_aggregate_expression!($t);

        impl AggregateExpr for $t {
            fn expressions(&self) -> Vec<Arc<dyn Expression>> {
                let mut out = vec![self.expr.clone()];
                out.extend(self.offset.clone());
                out.extend(self.default.clone());
                out
            }

            fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
                Err(window_only_buffer($name))
            }

            fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
                Ok(Box::new(LagLeadAccumulator {
                    expr: self.expr.clone(),
                    offset_expr: self.offset.clone(),
                    default: self.default.clone(),
                    lead: $lead,
                    partition: None,
                    offset: 1,
                    pos: 0,
                }))
            }

            fn framing(&self) -> Framing {
                Framing::WholePartition
            }
        }
    };
}

lag_lead_function!(Lag, "LAG", false);
lag_lead_function!(Lead, "LEAD", true);

#[derive(Debug)]
struct LagLeadAccumulator {
    expr: Arc<dyn Expression>,
    offset_expr: Option<Arc<dyn Expression>>,
    default: Option<Arc<dyn Expression>>,
    lead: bool,
    partition: Option<WindowInterval>,
    offset: usize,
    pos: usize,
}

impl Accumulator for LagLeadAccumulator {
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        _buffer: &[Row],
    ) -> Result<()> {
        self.offset = match &self.offset_expr {
            None => 1,
            Some(e) => e.eval(ctx, &Row::empty())?.to_u64().ok_or_else(|| {
                WindrowError::Execution(
                    "LAG/LEAD offset must be a non-negative integer".to_string(),
                )
            })? as usize,
        };
        self.partition = Some(partition);
        self.pos = 0;
        Ok(())
    }

    fn evaluate(
        &mut self,
        ctx: &TaskContext,
        _frame: WindowInterval,
        buffer: &[Row],
    ) -> Result<Value> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        let current = partition.start + self.pos;
        self.pos += 1;
        let target = if self.lead {
            let t = current + self.offset;
            partition.contains(t).then_some(t)
        } else {
            current
                .checked_sub(self.offset)
                .filter(|t| partition.contains(*t))
        };
        match target {
            Some(t) => self.expr.eval(ctx, &buffer[t]),
            None => match &self.default {
                Some(d) => d.eval(ctx, &buffer[current]),
                None => Ok(Value::Null),
            },
        }
    }

    fn dispose(&mut self) {
        self.partition = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windrow_common::Value;
    use windrow_expr::{col, lit};

    fn rows(vals: &[i64]) -> Vec<Row> {
        vals.iter()
            .map(|v| Row::new(vec![Value::Int64(*v)]))
            .collect()
    }

    /// Drives an accumulator over per-row peer-group frames, the way the
    /// partition iterator would for a rank-family function.
    fn drive_peer_frames(
        acc: &mut dyn Accumulator,
        peers: &[(usize, usize)],
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<Vec<Value>> {
        let ctx = TaskContext::new();
        acc.start_partition(&ctx, partition, buffer)?;
        peers
            .iter()
            .map(|(s, e)| acc.evaluate(&ctx, WindowInterval::new(*s, *e), buffer))
            .collect()
    }

    #[test]
    fn row_number_is_a_bijection() -> Result<()> {
        let buffer = rows(&[5, 3, 8, 1]);
        let partition = WindowInterval::new(0, 4);
        let mut acc = RowNumber::new().create_accumulator()?;
        let frames: Vec<(usize, usize)> = (0..4).map(|_| (0, 4)).collect();
        let got = drive_peer_frames(acc.as_mut(), &frames, partition, &buffer)?;
        assert_eq!(
            got,
            vec![
                Value::UInt64(1),
                Value::UInt64(2),
                Value::UInt64(3),
                Value::UInt64(4)
            ]
        );
        Ok(())
    }

    #[test]
    fn rank_family_over_tied_order_keys() -> Result<()> {
        // ORDER BY keys [1, 1, 2, 3]: peers {0,1}, {2}, {3}.
        let buffer = rows(&[1, 1, 2, 3]);
        let partition = WindowInterval::new(0, 4);
        let peers = [(0, 2), (0, 2), (2, 3), (3, 4)];

        let mut acc = Rank::new().create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &peers, partition, &buffer)?,
            vec![
                Value::UInt64(1),
                Value::UInt64(1),
                Value::UInt64(3),
                Value::UInt64(4)
            ]
        );

        let mut acc = DenseRank::new().create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &peers, partition, &buffer)?,
            vec![
                Value::UInt64(1),
                Value::UInt64(1),
                Value::UInt64(2),
                Value::UInt64(3)
            ]
        );

        let mut acc = PercentRank::new().create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &peers, partition, &buffer)?,
            vec![
                Value::Float64(0.0),
                Value::Float64(0.0),
                Value::Float64(2.0 / 3.0),
                Value::Float64(1.0)
            ]
        );

        let mut acc = CumeDist::new().create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &peers, partition, &buffer)?,
            vec![
                Value::Float64(0.5),
                Value::Float64(0.5),
                Value::Float64(0.75),
                Value::Float64(1.0)
            ]
        );
        Ok(())
    }

    #[test]
    fn ntile_spreads_rows_evenly() -> Result<()> {
        let buffer = rows(&[1, 2, 3, 4, 5]);
        let partition = WindowInterval::new(0, 5);
        let frames: Vec<(usize, usize)> = (0..5).map(|_| (0, 5)).collect();

        let ntile = Ntile::try_new(vec![lit(Value::Int64(2))])?;
        let mut acc = ntile.create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &frames, partition, &buffer)?,
            vec![
                Value::UInt64(1),
                Value::UInt64(1),
                Value::UInt64(1),
                Value::UInt64(2),
                Value::UInt64(2)
            ]
        );

        // More buckets than rows: every row gets its own bucket.
        let ntile = Ntile::try_new(vec![lit(Value::Int64(9))])?;
        let mut acc = ntile.create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &frames, partition, &buffer)?,
            vec![
                Value::UInt64(1),
                Value::UInt64(2),
                Value::UInt64(3),
                Value::UInt64(4),
                Value::UInt64(5)
            ]
        );
        Ok(())
    }

    #[test]
    fn lag_and_lead_with_default() -> Result<()> {
        let buffer = rows(&[10, 20, 30]);
        let partition = WindowInterval::new(0, 3);
        let frames: Vec<(usize, usize)> = (0..3).map(|_| (0, 3)).collect();

        let lag = Lag::try_new(vec![
            col("c0", 0, DataType::Int64),
            lit(Value::Int64(1)),
            lit(Value::Int64(-1)),
        ])?;
        let mut acc = lag.create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &frames, partition, &buffer)?,
            vec![Value::Int64(-1), Value::Int64(10), Value::Int64(20)]
        );

        let lead = Lead::try_new(vec![col("c0", 0, DataType::Int64)])?;
        let mut acc = lead.create_accumulator()?;
        assert_eq!(
            drive_peer_frames(acc.as_mut(), &frames, partition, &buffer)?,
            vec![Value::Int64(20), Value::Int64(30), Value::Null]
        );

        assert!(matches!(
            Lag::try_new(vec![]),
            Err(WindrowError::InvalidArgumentCount { .. })
        ));
        Ok(())
    }

    #[test]
    fn ranks_never_decrease_within_a_partition() -> Result<()> {
        // ORDER BY keys [2, 2, 2, 5, 5, 7, 9, 9]; both rank flavors must
        // be non-decreasing and equal inside a peer group.
        let buffer = rows(&[2, 2, 2, 5, 5, 7, 9, 9]);
        let partition = WindowInterval::new(0, 8);
        let peers = [
            (0, 3),
            (0, 3),
            (0, 3),
            (3, 5),
            (3, 5),
            (5, 6),
            (6, 8),
            (6, 8),
        ];
        let mut rank_acc = Rank::new().create_accumulator()?;
        let ranks = drive_peer_frames(rank_acc.as_mut(), &peers, partition, &buffer)?;
        let mut dense_acc = DenseRank::new().create_accumulator()?;
        let dense = drive_peer_frames(dense_acc.as_mut(), &peers, partition, &buffer)?;
        for w in ranks.windows(2) {
            assert!(w[0].to_u64() <= w[1].to_u64());
        }
        for w in dense.windows(2) {
            assert!(w[0].to_u64() <= w[1].to_u64());
        }
        assert_eq!(ranks[0], ranks[2]);
        assert_eq!(ranks[6], ranks[7]);
        Ok(())
    }

    #[test]
    fn ranking_buffers_are_window_only() {
        assert!(RowNumber::new().new_buffer().is_err());
        assert!(Rank::new().new_buffer().is_err());
    }
}
