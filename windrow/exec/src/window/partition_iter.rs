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

//! The partition iterator: materializes its child, sorts by (partition
//! keys, order keys), detects partition boundaries, drives every
//! (accumulator, framer) pair of the block in lockstep over the shared
//! buffer, and restores the child's emission order on the way out.
//!
//! Emission order is preserved with a sentinel cell: every materialized
//! row gets its 0-based emission index appended as a final cell, the sort
//! carries it along, and it is stripped into an `output_ordering` table
//! that the produced rows are sorted back by.

use std::cmp::Ordering;
use std::collections::VecDeque;

use async_trait::async_trait;
use log::{debug, trace};

use windrow_common::utils::{compare_rows, compare_rows_total};
use windrow_common::{
    Result, Row, SortOptions, TaskContext, Value, WindowInterval, WindrowError,
};
use windrow_expr::{sort_options, Accumulator};

use crate::stream::RowStream;
use crate::window::framer::FramerInput;
use crate::window::window_expr::WindowFunctionExpr;

/// Evaluates a block of window functions that share partitioning and
/// ordering over one child stream.
pub struct WindowPartitionIter {
    functions: Vec<WindowFunctionExpr>,
    child: Box<dyn RowStream>,
    accumulators: Vec<Box<dyn Accumulator>>,
    outputs: Option<VecDeque<Row>>,
    closed: bool,
}

impl WindowPartitionIter {
    pub fn try_new(
        functions: Vec<WindowFunctionExpr>,
        child: Box<dyn RowStream>,
    ) -> Result<Self> {
        let Some(first) = functions.first() else {
            return Err(WindrowError::Execution(
                "a window block requires at least one function".to_string(),
            ));
        };
        for f in &functions[1..] {
            if !same_keys(f, first) {
                return Err(WindrowError::Execution(format!(
                    "window block functions must share partitioning and ordering: \
                     {f} does not match {first}"
                )));
            }
            if f.one_row_per_partition() != first.one_row_per_partition() {
                return Err(WindrowError::Execution(
                    "cannot mix grouped and windowed aggregations in one block"
                        .to_string(),
                ));
            }
        }
        Ok(Self {
            functions,
            child,
            accumulators: vec![],
            outputs: None,
            closed: false,
        })
    }

    async fn prepare(&mut self, ctx: &TaskContext) -> Result<()> {
        // Materialize, tagging each row with its emission index.
        let mut tagged = vec![];
        while let Some(row) = self.child.next(ctx).await? {
            ctx.check_cancelled()?;
            let index = tagged.len() as u64;
            tagged.push(row.append(Value::UInt64(index)));
        }
        debug!(
            "window block of {} function(s) materialized {} row(s)",
            self.functions.len(),
            tagged.len()
        );

        let mut accumulators = Vec::with_capacity(self.functions.len());
        for f in &self.functions {
            accumulators.push(f.create_accumulator()?);
        }
        let result = evaluate_block(ctx, &self.functions, &mut accumulators, tagged);
        // Keep the accumulators regardless of the outcome so that close
        // can dispose them in registration order.
        self.accumulators = accumulators;
        self.outputs = Some(result?.into());
        Ok(())
    }

    async fn release(&mut self, ctx: &TaskContext) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        trace!("window block closing; disposing {} accumulator(s)", self.accumulators.len());
        for acc in &mut self.accumulators {
            acc.dispose();
        }
        self.child.close(ctx).await
    }
}

#[async_trait]
impl RowStream for WindowPartitionIter {
    async fn next(&mut self, ctx: &TaskContext) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        if self.outputs.is_none() {
            if let Err(e) = self.prepare(ctx).await {
                // Dispose eagerly; rows already handed out are not
                // retracted, but nothing further is produced.
                if let Err(close_err) = self.release(ctx).await {
                    debug!("window block close after error also failed: {close_err}");
                }
                return Err(e);
            }
        }
        match self.outputs.as_mut() {
            Some(outputs) => Ok(outputs.pop_front()),
            None => Ok(None),
        }
    }

    async fn close(&mut self, ctx: &TaskContext) -> Result<()> {
        self.release(ctx).await
    }
}

fn same_keys(a: &WindowFunctionExpr, b: &WindowFunctionExpr) -> bool {
    let exprs = |f: &WindowFunctionExpr| {
        (
            f.partition_by()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>(),
            f.order_by()
                .iter()
                .map(|s| (s.expr.to_string(), s.options))
                .collect::<Vec<_>>(),
        )
    };
    exprs(a) == exprs(b)
}

/// Hands out partitions one at a time; advancing past the last one is the
/// terminal signal of the evaluation loop.
struct PartitionCursor {
    partitions: Vec<WindowInterval>,
    index: usize,
}

impl PartitionCursor {
    fn next(&mut self) -> Result<WindowInterval> {
        let Some(partition) = self.partitions.get(self.index) else {
            return Err(WindrowError::NoPartitions);
        };
        self.index += 1;
        Ok(*partition)
    }
}

fn evaluate_block(
    ctx: &TaskContext,
    functions: &[WindowFunctionExpr],
    accumulators: &mut [Box<dyn Accumulator>],
    tagged: Vec<Row>,
) -> Result<Vec<Row>> {
    let partition_by = functions[0].partition_by();
    let order_by = functions[0].order_by();
    let group_by_mode = functions[0].one_row_per_partition();

    // Sort keys are evaluated once per row; the sentinel tail cell sits
    // past every original column and is invisible to the expressions.
    struct Entry {
        row: Row,
        pkey: Vec<Value>,
        okey: Vec<Value>,
    }
    let mut entries = Vec::with_capacity(tagged.len());
    for row in tagged {
        let pkey = partition_by
            .iter()
            .map(|e| e.eval(ctx, &row))
            .collect::<Result<Vec<_>>>()?;
        let okey = order_by
            .iter()
            .map(|s| s.eval(ctx, &row))
            .collect::<Result<Vec<_>>>()?;
        entries.push(Entry { row, pkey, okey });
    }

    let p_options = vec![SortOptions::default(); partition_by.len()];
    let o_options = sort_options(order_by);
    entries.sort_by(|a, b| {
        compare_rows_total(&a.pkey, &b.pkey, &p_options)
            .then_with(|| compare_rows_total(&a.okey, &b.okey, &o_options))
    });

    // Strip the sentinel into the output ordering table.
    let mut buffer = Vec::with_capacity(entries.len());
    let mut output_ordering = Vec::with_capacity(entries.len());
    let mut pkeys = Vec::with_capacity(entries.len());
    let mut okeys = Vec::with_capacity(entries.len());
    for entry in entries {
        let (row, tail) = entry.row.split_tail()?;
        let index = tail.to_u64().ok_or_else(|| {
            WindrowError::Internal("corrupt emission-index sentinel".to_string())
        })? as usize;
        buffer.push(row);
        output_ordering.push(index);
        pkeys.push(entry.pkey);
        okeys.push(entry.okey);
    }

    // Detect partition boundaries; an empty input without partition keys
    // still makes one empty partition so that e.g. COUNT(*) yields 0.
    let mut partitions = vec![];
    if buffer.is_empty() {
        if partition_by.is_empty() {
            partitions.push(WindowInterval::new(0, 0));
        }
    } else {
        let mut start = 0;
        for i in 1..buffer.len() {
            if compare_rows(&pkeys[i - 1], &pkeys[i], &p_options)? != Ordering::Equal {
                partitions.push(WindowInterval::new(start, i));
                start = i;
            }
        }
        partitions.push(WindowInterval::new(start, buffer.len()));
    }
    debug!("window block detected {} partition(s)", partitions.len());

    let input = FramerInput {
        order_keys: &okeys,
        sort_options: &o_options,
    };
    let mut cursor = PartitionCursor {
        partitions,
        index: 0,
    };

    // One (accumulator, framer) pair per function, advanced in lockstep;
    // every framer of the block must exhaust the partition together.
    let mut outputs: Vec<(Vec<Value>, usize)> = vec![];
    loop {
        let partition = match cursor.next() {
            Ok(partition) => partition,
            Err(WindrowError::NoPartitions) => break,
            Err(e) => return Err(e),
        };
        ctx.check_cancelled()?;

        let mut framers = Vec::with_capacity(functions.len());
        for (f, acc) in functions.iter().zip(accumulators.iter_mut()) {
            acc.start_partition(ctx, partition, &buffer)?;
            let mut framer = f.new_framer(ctx)?;
            framer.start_partition(partition)?;
            framers.push(framer);
        }

        let mut emitted = 0usize;
        loop {
            let mut frames = Vec::with_capacity(framers.len());
            let mut finished = 0;
            for framer in &mut framers {
                match framer.next(&input)? {
                    Some(frame) => frames.push(frame),
                    None => finished += 1,
                }
            }
            if finished == framers.len() {
                break;
            }
            if finished > 0 {
                return Err(WindrowError::Internal(
                    "window block framers fell out of lockstep".to_string(),
                ));
            }
            let mut cells = Vec::with_capacity(frames.len());
            for (acc, frame) in accumulators.iter_mut().zip(&frames) {
                cells.push(acc.evaluate(ctx, *frame, &buffer)?);
            }
            let tail = if group_by_mode {
                // A grouped row stands for its whole partition; it goes
                // where the partition first appeared in emission order.
                output_ordering[partition.start..partition.end]
                    .iter()
                    .copied()
                    .min()
                    .unwrap_or(0)
            } else {
                output_ordering[partition.start + emitted]
            };
            outputs.push((cells, tail));
            emitted += 1;
        }
    }

    // Restore emission order and strip the tail.
    outputs.sort_by_key(|(_, tail)| *tail);
    Ok(outputs
        .into_iter()
        .map(|(cells, _)| Row::new(cells))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Count, Sum};
    use crate::stream::MemoryStream;
    use crate::window::window_expr::WithWindow;
    use std::sync::Arc;
    use windrow_common::DataType;
    use windrow_expr::{col, AggregateExpr, SortField, WindowDefinition};

    fn int_rows(vals: &[&[i64]]) -> Vec<Row> {
        vals.iter()
            .map(|cells| Row::new(cells.iter().map(|v| Value::Int64(*v)).collect()))
            .collect()
    }

    async fn drain(iter: &mut WindowPartitionIter, ctx: &TaskContext) -> Result<Vec<Row>> {
        let mut out = vec![];
        while let Some(row) = iter.next(ctx).await? {
            out.push(row);
        }
        iter.close(ctx).await?;
        Ok(out)
    }

    #[tokio::test]
    async fn running_sum_restores_emission_order() -> Result<()> {
        let ctx = TaskContext::new();
        // (id, key, z) deliberately interleaved so the partition sort
        // must scramble and the tail restore must unscramble.
        let rows = int_rows(&[
            &[1, 1, 4],
            &[2, 2, 10],
            &[3, 1, 6],
            &[4, 2, 20],
            &[5, 1, 2],
        ]);
        let sum: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 2, DataType::Int64)));
        let window = WindowDefinition::new(
            vec![col("key", 1, DataType::Int64)],
            vec![SortField::asc(col("id", 0, DataType::Int64))],
            None,
        );
        let mut iter = WindowPartitionIter::try_new(
            vec![sum.with_window(window)?],
            Box::new(MemoryStream::new(rows)),
        )?;
        let out = drain(&mut iter, &ctx).await?;
        let sums: Vec<Value> = out.iter().map(|r| r.get(0).cloned().unwrap()).collect();
        assert_eq!(
            sums,
            vec![
                Value::Float64(4.0),
                Value::Float64(10.0),
                Value::Float64(10.0),
                Value::Float64(30.0),
                Value::Float64(12.0),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn count_star_on_empty_input_synthesizes_a_partition() -> Result<()> {
        let ctx = TaskContext::new();
        let count: Arc<dyn AggregateExpr> = Arc::new(Count::star());
        let mut iter = WindowPartitionIter::try_new(
            vec![WindowFunctionExpr::group_by(count, vec![])],
            Box::new(MemoryStream::new(vec![])),
        )?;
        let out = drain(&mut iter, &ctx).await?;
        assert_eq!(out, vec![Row::new(vec![Value::Int64(0)])]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_with_partition_keys_produces_nothing() -> Result<()> {
        let ctx = TaskContext::new();
        let count: Arc<dyn AggregateExpr> = Arc::new(Count::star());
        let mut iter = WindowPartitionIter::try_new(
            vec![WindowFunctionExpr::group_by(
                count,
                vec![col("k", 0, DataType::Int64)],
            )],
            Box::new(MemoryStream::new(vec![])),
        )?;
        let out = drain(&mut iter, &ctx).await?;
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_blocks_are_rejected() -> Result<()> {
        let a: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 2, DataType::Int64)));
        let b: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 2, DataType::Int64)));
        let wa = a.with_window(WindowDefinition::new(
            vec![col("x", 1, DataType::Int64)],
            vec![],
            None,
        ))?;
        let wb = b.with_window(WindowDefinition::new(
            vec![col("y", 0, DataType::Int64)],
            vec![],
            None,
        ))?;
        assert!(WindowPartitionIter::try_new(
            vec![wa, wb],
            Box::new(MemoryStream::new(vec![]))
        )
        .is_err());
        Ok(())
    }

    #[tokio::test]
    async fn cancellation_aborts_materialization() -> Result<()> {
        let ctx = TaskContext::new();
        let sum: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 0, DataType::Int64)));
        let mut iter = WindowPartitionIter::try_new(
            vec![sum.with_window(WindowDefinition::default())?],
            Box::new(MemoryStream::new(int_rows(&[&[1], &[2]]))),
        )?;
        ctx.cancel();
        assert!(matches!(
            iter.next(&ctx).await,
            Err(WindrowError::Cancelled)
        ));
        Ok(())
    }
}
