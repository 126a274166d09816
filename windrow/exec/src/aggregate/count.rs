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

//! COUNT, COUNT(*) and COUNT(DISTINCT ...).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ahash::RandomState;

use windrow_common::value::hash_of;
use windrow_common::{DataType, Result, Row, TaskContext, Value, WindowInterval};
use windrow_expr::{
    Accumulator, AggregateExpr, AggregationBuffer, Expression, Star,
};

use super::{check_arity, impl_aggregate_expression};

/// COUNT(expr). Nulls are skipped; `COUNT(*)` counts every row because the
/// star expression evaluates to the never-null row-reference sentinel.
#[derive(Debug, Clone)]
pub struct Count {
    expr: Arc<dyn Expression>,
}

impl Count {
    pub fn new(expr: Arc<dyn Expression>) -> Self {
        Self { expr }
    }

    /// COUNT(*).
    pub fn star() -> Self {
        Self::new(Arc::new(Star))
    }

    fn result_type(&self) -> DataType {
        DataType::Int64
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "COUNT({})", self.expr)
    }
}

impl_aggregate_expression!(Count);

impl AggregateExpr for Count {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.expr.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(CountBuffer {
            expr: self.expr.clone(),
            count: 0,
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(CountAccumulator {
            expr: self.expr.clone(),
            partition: None,
            prefix: vec![],
        }))
    }
}

#[derive(Debug)]
struct CountBuffer {
    expr: Arc<dyn Expression>,
    count: i64,
}

impl AggregationBuffer for CountBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        if !self.expr.eval(ctx, row)?.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(Value::Int64(self.count))
    }
}

/// Window-mode COUNT backed by a per-partition prefix vector, making any
/// frame O(1) after a linear precomputation.
#[derive(Debug)]
struct CountAccumulator {
    expr: Arc<dyn Expression>,
    partition: Option<WindowInterval>,
    /// prefix[k] = number of counted rows in partition[0..=k].
    prefix: Vec<i64>,
}

impl Accumulator for CountAccumulator {
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<()> {
        self.partition = Some(partition);
        self.prefix.clear();
        self.prefix.reserve(partition.len());
        let mut running = 0i64;
        for row in &buffer[partition.start..partition.end] {
            if !self.expr.eval(ctx, row)?.is_null() {
                running += 1;
            }
            self.prefix.push(running);
        }
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        let partition = self.partition.ok_or(windrow_common::WindrowError::PartitionNotSet)?;
        if frame.is_empty() {
            return Ok(Value::Int64(0));
        }
        let lo = frame.start - partition.start;
        let hi = frame.end - partition.start;
        let below = if lo > 0 { self.prefix[lo - 1] } else { 0 };
        Ok(Value::Int64(self.prefix[hi - 1] - below))
    }

    fn dispose(&mut self) {
        self.partition = None;
        self.prefix = vec![];
    }
}

/// COUNT(DISTINCT e, ...). Rows are deduplicated by a structural hash of
/// the evaluated tuple; a row with any null argument is skipped entirely
/// and never enters the set. `COUNT(DISTINCT *)` counts rows, because the
/// row-reference sentinel cannot be hashed.
#[derive(Debug, Clone)]
pub struct CountDistinct {
    exprs: Vec<Arc<dyn Expression>>,
}

impl CountDistinct {
    pub fn try_new(exprs: Vec<Arc<dyn Expression>>) -> Result<Self> {
        if exprs.is_empty() {
            check_arity("COUNT(DISTINCT)", 1, &exprs)?;
        }
        Ok(Self { exprs })
    }

    fn result_type(&self) -> DataType {
        DataType::Int64
    }
}

impl fmt::Display for CountDistinct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "COUNT(DISTINCT ")?;
        for (i, e) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, ")")
    }
}

impl_aggregate_expression!(CountDistinct);

impl AggregateExpr for CountDistinct {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        self.exprs.clone()
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(CountDistinctBuffer {
            exprs: self.exprs.clone(),
            state: RandomState::new(),
            seen: HashSet::default(),
            star_rows: 0,
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        super::scan_accumulator(self)
    }
}

struct CountDistinctBuffer {
    exprs: Vec<Arc<dyn Expression>>,
    state: RandomState,
    seen: HashSet<u64>,
    /// Rows counted for the star form, which bypasses the distinct set.
    star_rows: i64,
}

impl fmt::Debug for CountDistinctBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CountDistinctBuffer")
            .field("seen", &self.seen.len())
            .field("star_rows", &self.star_rows)
            .finish()
    }
}

impl AggregationBuffer for CountDistinctBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let mut values = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            values.push(expr.eval(ctx, row)?);
        }
        if values.iter().any(Value::is_null) {
            return Ok(());
        }
        if values.len() == 1 && matches!(values[0], Value::RowRef) {
            self.star_rows += 1;
            return Ok(());
        }
        let key = hash_of(&values, &self.state)?;
        self.seen.insert(key);
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(Value::Int64(self.seen.len() as i64 + self.star_rows))
    }

    fn dispose(&mut self) {
        self.seen = HashSet::default();
        self.star_rows = 0;
    }
}
