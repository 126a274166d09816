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

//! The window iterator composes several partition iterators — one per
//! distinct (PARTITION BY, ORDER BY) block — over a single upstream
//! child, and projects their per-row results into the final column
//! layout dictated by the planner.

use std::collections::VecDeque;

use async_trait::async_trait;
use log::debug;

use windrow_common::{Result, Row, TaskContext, Value, WindrowError};

use crate::stream::{MemoryStream, RowStream};
use crate::window::partition_iter::WindowPartitionIter;
use crate::window::window_expr::WindowFunctionExpr;

/// Runs every block against a buffered copy of the same child (each block
/// re-sorts independently, so no sort coordination is needed), re-aligns
/// the block outputs row-by-row on the original emission order, and
/// places value `j` of block `b` at output column `output_ordinals[b][j]`.
pub struct WindowIter {
    child: Option<Box<dyn RowStream>>,
    blocks: Vec<Vec<WindowFunctionExpr>>,
    output_ordinals: Vec<Vec<usize>>,
    width: usize,
    outputs: Option<VecDeque<Row>>,
    closed: bool,
}

impl WindowIter {
    pub fn try_new(
        child: Box<dyn RowStream>,
        blocks: Vec<Vec<WindowFunctionExpr>>,
        output_ordinals: Vec<Vec<usize>>,
    ) -> Result<Self> {
        if blocks.len() != output_ordinals.len() {
            return Err(WindrowError::Execution(format!(
                "{} window block(s) but {} ordinal list(s)",
                blocks.len(),
                output_ordinals.len()
            )));
        }
        let mut seen = vec![];
        for (block, ordinals) in blocks.iter().zip(&output_ordinals) {
            if block.len() != ordinals.len() {
                return Err(WindrowError::Execution(format!(
                    "window block of {} function(s) mapped to {} ordinal(s)",
                    block.len(),
                    ordinals.len()
                )));
            }
            seen.extend_from_slice(ordinals);
        }
        let width = seen.len();
        let mut check = seen.clone();
        check.sort_unstable();
        check.dedup();
        if check.len() != width || check.iter().any(|o| *o >= width) {
            return Err(WindrowError::Execution(format!(
                "output ordinals must cover 0..{width} exactly once: {seen:?}"
            )));
        }
        Ok(Self {
            child: Some(child),
            blocks,
            output_ordinals,
            width,
            outputs: None,
            closed: false,
        })
    }

    async fn prepare(&mut self, ctx: &TaskContext) -> Result<()> {
        // Drain the upstream once; every block replays the same buffer.
        let mut rows = vec![];
        if let Some(child) = self.child.as_mut() {
            while let Some(row) = child.next(ctx).await? {
                ctx.check_cancelled()?;
                rows.push(row);
            }
            child.close(ctx).await?;
            self.child = None;
        }
        debug!(
            "window iterator fanning {} row(s) out to {} block(s)",
            rows.len(),
            self.blocks.len()
        );

        let blocks = std::mem::take(&mut self.blocks);
        let mut block_outputs: Vec<Vec<Row>> = Vec::with_capacity(blocks.len());
        for functions in blocks {
            let mut iter = WindowPartitionIter::try_new(
                functions,
                Box::new(MemoryStream::new(rows.clone())),
            )?;
            let mut out = vec![];
            let result: Result<()> = async {
                while let Some(row) = iter.next(ctx).await? {
                    out.push(row);
                }
                Ok(())
            }
            .await;
            iter.close(ctx).await?;
            result?;
            if out.len() != rows.len() {
                return Err(WindrowError::Execution(format!(
                    "window block produced {} row(s) for {} input row(s)",
                    out.len(),
                    rows.len()
                )));
            }
            block_outputs.push(out);
        }

        // Re-align by emission index and project into the final layout.
        let mut outputs = VecDeque::with_capacity(rows.len());
        for i in 0..rows.len() {
            let mut cells = vec![Value::Null; self.width];
            for (b, block_rows) in block_outputs.iter().enumerate() {
                for (j, ordinal) in self.output_ordinals[b].iter().enumerate() {
                    cells[*ordinal] = block_rows[i].get(j).cloned().ok_or_else(|| {
                        WindrowError::Internal(
                            "window block row narrower than its ordinal map".to_string(),
                        )
                    })?;
                }
            }
            outputs.push_back(Row::new(cells));
        }
        self.outputs = Some(outputs);
        Ok(())
    }
}

#[async_trait]
impl RowStream for WindowIter {
    async fn next(&mut self, ctx: &TaskContext) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        if self.outputs.is_none() {
            if let Err(e) = self.prepare(ctx).await {
                self.close(ctx).await.ok();
                return Err(e);
            }
        }
        match self.outputs.as_mut() {
            Some(outputs) => Ok(outputs.pop_front()),
            None => Ok(None),
        }
    }

    async fn close(&mut self, ctx: &TaskContext) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(child) = self.child.as_mut() {
            child.close(ctx).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Avg, Sum};
    use crate::window::window_expr::WithWindow;
    use std::sync::Arc;
    use windrow_common::DataType;
    use windrow_expr::{col, AggregateExpr, SortField, WindowDefinition};

    fn rows() -> Vec<Row> {
        [(1, 1, 10), (2, 2, 20), (3, 1, 30), (4, 2, 40)]
            .iter()
            .map(|(id, k, z)| {
                Row::new(vec![
                    Value::Int64(*id),
                    Value::Int64(*k),
                    Value::Int64(*z),
                ])
            })
            .collect()
    }

    #[tokio::test]
    async fn two_blocks_project_into_planner_layout() -> Result<()> {
        let ctx = TaskContext::new();
        let sum: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 2, DataType::Int64)));
        let avg: Arc<dyn AggregateExpr> = Arc::new(Avg::new(col("z", 2, DataType::Int64)));

        // Block 0: running sum per key; block 1: global average.
        let w1 = sum.with_window(WindowDefinition::new(
            vec![col("k", 1, DataType::Int64)],
            vec![SortField::asc(col("id", 0, DataType::Int64))],
            None,
        ))?;
        let w2 = avg.with_window(WindowDefinition::default())?;

        let mut iter = WindowIter::try_new(
            Box::new(MemoryStream::new(rows())),
            vec![vec![w1], vec![w2]],
            vec![vec![1], vec![0]],
        )?;

        let mut out = vec![];
        while let Some(row) = iter.next(&ctx).await? {
            out.push(row);
        }
        iter.close(&ctx).await?;

        let expected: Vec<Row> = [
            (25.0, 10.0),
            (25.0, 20.0),
            (25.0, 40.0),
            (25.0, 60.0),
        ]
        .iter()
        .map(|(avg, sum)| Row::new(vec![Value::Float64(*avg), Value::Float64(*sum)]))
        .collect();
        assert_eq!(out, expected);
        Ok(())
    }

    #[tokio::test]
    async fn bad_ordinal_maps_are_rejected() -> Result<()> {
        let sum: Arc<dyn AggregateExpr> = Arc::new(Sum::new(col("z", 2, DataType::Int64)));
        let w = sum.with_window(WindowDefinition::default())?;
        assert!(WindowIter::try_new(
            Box::new(MemoryStream::new(vec![])),
            vec![vec![w]],
            vec![vec![3]],
        )
        .is_err());
        Ok(())
    }
}
