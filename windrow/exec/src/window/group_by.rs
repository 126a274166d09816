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

//! Plain GROUP BY aggregation: the partition machinery driven by the
//! one-frame-per-partition framing, producing one row per group in
//! first-appearance order. Partial aggregation happens outside iterators
//! entirely, through [windrow_expr::AggregationBuffer] and its
//! update-as-merge rule.

use std::sync::Arc;

use async_trait::async_trait;

use windrow_common::{Result, Row, TaskContext};
use windrow_expr::{AggregateExpr, Expression};

use crate::stream::RowStream;
use crate::window::partition_iter::WindowPartitionIter;
use crate::window::window_expr::WindowFunctionExpr;

/// Evaluates a list of aggregates grouped by the given key expressions;
/// each output row holds the aggregate values of one group, in the
/// aggregates' declaration order.
pub struct GroupByIter {
    inner: WindowPartitionIter,
}

impl GroupByIter {
    pub fn try_new(
        group_by: Vec<Arc<dyn Expression>>,
        aggregates: Vec<Arc<dyn AggregateExpr>>,
        child: Box<dyn RowStream>,
    ) -> Result<Self> {
        let functions = aggregates
            .into_iter()
            .map(|a| WindowFunctionExpr::group_by(a, group_by.clone()))
            .collect();
        Ok(Self {
            inner: WindowPartitionIter::try_new(functions, child)?,
        })
    }
}

#[async_trait]
impl RowStream for GroupByIter {
    async fn next(&mut self, ctx: &TaskContext) -> Result<Option<Row>> {
        self.inner.next(ctx).await
    }

    async fn close(&mut self, ctx: &TaskContext) -> Result<()> {
        self.inner.close(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Avg, Count, Min};
    use crate::stream::MemoryStream;
    use windrow_common::{DataType, Value};
    use windrow_expr::col;

    fn rows(vals: &[(&str, i64)]) -> Vec<Row> {
        vals.iter()
            .map(|(k, v)| Row::new(vec![Value::Str((*k).into()), Value::Int64(*v)]))
            .collect()
    }

    async fn drain(iter: &mut GroupByIter, ctx: &TaskContext) -> Result<Vec<Row>> {
        let mut out = vec![];
        while let Some(row) = iter.next(ctx).await? {
            out.push(row);
        }
        iter.close(ctx).await?;
        Ok(out)
    }

    #[tokio::test]
    async fn groups_come_out_in_first_appearance_order() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[
            ("fir", 3),
            ("oak", 10),
            ("fir", 5),
            ("elm", 1),
            ("oak", 20),
        ]);
        let mut iter = GroupByIter::try_new(
            vec![col("k", 0, DataType::Text)],
            vec![
                Arc::new(Count::star()),
                Arc::new(Avg::new(col("v", 1, DataType::Int64))),
                Arc::new(Min::new(col("v", 1, DataType::Int64))),
            ],
            Box::new(MemoryStream::new(data)),
        )?;
        let out = drain(&mut iter, &ctx).await?;
        assert_eq!(
            out,
            vec![
                Row::new(vec![
                    Value::Int64(2),
                    Value::Float64(4.0),
                    Value::Int64(3)
                ]),
                Row::new(vec![
                    Value::Int64(2),
                    Value::Float64(15.0),
                    Value::Int64(10)
                ]),
                Row::new(vec![
                    Value::Int64(1),
                    Value::Float64(1.0),
                    Value::Int64(1)
                ]),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn aggregation_without_keys_yields_one_row() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[("fir", 3), ("oak", 10)]);
        let mut iter = GroupByIter::try_new(
            vec![],
            vec![Arc::new(Count::star())],
            Box::new(MemoryStream::new(data)),
        )?;
        let out = drain(&mut iter, &ctx).await?;
        assert_eq!(out, vec![Row::new(vec![Value::Int64(2)])]);
        Ok(())
    }
}
