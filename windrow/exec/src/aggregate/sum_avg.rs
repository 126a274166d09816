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

//! SUM and AVG, with the float/decimal dichotomy and prefix-sum
//! acceleration for window frames.
//!
//! Decimal inputs keep arbitrary precision and AVG rounds its quotient to
//! `scale(sum) + 4`, reproducing MySQL's scale propagation. Everything
//! else runs through f64. Non-null values that cannot be read as numbers
//! silently count as zero, which is also MySQL's behavior.

use std::fmt;
use std::sync::Arc;

use bigdecimal::{BigDecimal, FromPrimitive, RoundingMode};

use windrow_common::{
    DataType, Result, Row, TaskContext, Value, WindowInterval, WindrowError,
};
use windrow_expr::{Accumulator, AggregateExpr, AggregationBuffer, Expression};

use super::impl_aggregate_expression;

/// A running numeric sum. The mode is chosen by the first non-null input
/// and a later decimal input promotes a float sum.
#[derive(Debug, Clone)]
enum NumericSum {
    Float(f64),
    Decimal(BigDecimal),
}

impl NumericSum {
    fn from_value(v: &Value) -> Self {
        match v {
            Value::Decimal(d) => NumericSum::Decimal(d.clone()),
            other => NumericSum::Float(other.coerced_f64().unwrap_or(0.0)),
        }
    }

    fn accumulate(&mut self, v: &Value) {
        match self {
            NumericSum::Float(f) => match v {
                Value::Decimal(d) => {
                    let promoted =
                        BigDecimal::from_f64(*f).unwrap_or_else(|| BigDecimal::from(0));
                    *self = NumericSum::Decimal(promoted + d);
                }
                other => *f += other.coerced_f64().unwrap_or(0.0),
            },
            NumericSum::Decimal(d) => {
                *d += v.to_decimal().unwrap_or_else(|| BigDecimal::from(0));
            }
        }
    }

    fn into_value(self) -> Value {
        match self {
            NumericSum::Float(f) => Value::Float64(f),
            NumericSum::Decimal(d) => Value::Decimal(d),
        }
    }

    /// The quotient `self / count` with MySQL scale propagation on the
    /// decimal path.
    fn divide(self, count: i64) -> Value {
        match self {
            NumericSum::Float(f) => Value::Float64(f / count as f64),
            NumericSum::Decimal(d) => {
                let (_, exponent) = d.as_bigint_and_exponent();
                let scale = exponent.abs() + 4;
                let quotient = d / BigDecimal::from(count);
                Value::Decimal(quotient.with_scale_round(scale, RoundingMode::HalfUp))
            }
        }
    }
}

/// Shared update state for the SUM and AVG buffers.
#[derive(Debug, Default)]
struct NumericSumState {
    sum: Option<NumericSum>,
    non_null: i64,
}

impl NumericSumState {
    fn update(&mut self, ctx: &TaskContext, expr: &Arc<dyn Expression>, row: &Row) -> Result<()> {
        let v = expr.eval(ctx, row)?;
        if v.is_null() {
            return Ok(());
        }
        match &mut self.sum {
            None => self.sum = Some(NumericSum::from_value(&v)),
            Some(sum) => sum.accumulate(&v),
        }
        self.non_null += 1;
        Ok(())
    }
}

/// SUM(expr).
#[derive(Debug, Clone)]
pub struct Sum {
    expr: Arc<dyn Expression>,
}

impl Sum {
    pub fn new(expr: Arc<dyn Expression>) -> Self {
        Self { expr }
    }

    fn result_type(&self) -> DataType {
        if self.expr.data_type() == DataType::Decimal {
            DataType::Decimal
        } else {
            DataType::Float64
        }
    }
}

impl fmt::Display for Sum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SUM({})", self.expr)
    }
}

impl_aggregate_expression!(Sum);

impl AggregateExpr for Sum {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.expr.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(SumBuffer {
            expr: self.expr.clone(),
            state: NumericSumState::default(),
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(SumAccumulator {
            expr: self.expr.clone(),
            prefix: None,
        }))
    }
}

#[derive(Debug)]
struct SumBuffer {
    expr: Arc<dyn Expression>,
    state: NumericSumState,
}

impl AggregationBuffer for SumBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        self.state.update(ctx, &self.expr, row)
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(match self.state.sum.clone() {
            None => Value::Null,
            Some(sum) => sum.into_value(),
        })
    }
}

/// AVG(expr).
#[derive(Debug, Clone)]
pub struct Avg {
    expr: Arc<dyn Expression>,
}

impl Avg {
    pub fn new(expr: Arc<dyn Expression>) -> Self {
        Self { expr }
    }

    fn result_type(&self) -> DataType {
        if self.expr.data_type() == DataType::Decimal {
            DataType::Decimal
        } else {
            DataType::Float64
        }
    }
}

impl fmt::Display for Avg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AVG({})", self.expr)
    }
}

impl_aggregate_expression!(Avg);

impl AggregateExpr for Avg {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.expr.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(AvgBuffer {
            expr: self.expr.clone(),
            state: NumericSumState::default(),
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        Ok(Box::new(AvgAccumulator {
            expr: self.expr.clone(),
            prefix: None,
        }))
    }
}

#[derive(Debug)]
struct AvgBuffer {
    expr: Arc<dyn Expression>,
    state: NumericSumState,
}

impl AggregationBuffer for AvgBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        self.state.update(ctx, &self.expr, row)
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(match self.state.sum.clone() {
            None => Value::Null,
            Some(sum) => sum.divide(self.state.non_null),
        })
    }
}

/// Per-partition prefix vectors: `values[k]` is the sum of the coerced
/// inputs over `partition[0..=k]` ignoring nulls, and `non_null[k]` counts
/// the non-null inputs over the same range. Any frame then evaluates as a
/// difference of two prefix entries.
#[derive(Debug)]
struct SumPrefix {
    partition: WindowInterval,
    values: PrefixVec,
    non_null: Vec<i64>,
}

#[derive(Debug)]
enum PrefixVec {
    Float(Vec<f64>),
    Decimal(Vec<BigDecimal>),
}

impl SumPrefix {
    fn build(
        ctx: &TaskContext,
        expr: &Arc<dyn Expression>,
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<Self> {
        let mut inputs = Vec::with_capacity(partition.len());
        for row in &buffer[partition.start..partition.end] {
            inputs.push(expr.eval(ctx, row)?);
        }
        let decimal_mode = inputs.iter().any(|v| matches!(v, Value::Decimal(_)));

        let mut non_null = Vec::with_capacity(inputs.len());
        let mut running_non_null = 0i64;
        let values = if decimal_mode {
            let mut prefix = Vec::with_capacity(inputs.len());
            let mut running = BigDecimal::from(0);
            for v in &inputs {
                if !v.is_null() {
                    running += v.to_decimal().unwrap_or_else(|| BigDecimal::from(0));
                    running_non_null += 1;
                }
                prefix.push(running.clone());
                non_null.push(running_non_null);
            }
            PrefixVec::Decimal(prefix)
        } else {
            let mut prefix = Vec::with_capacity(inputs.len());
            let mut running = 0f64;
            for v in &inputs {
                if let Some(f) = v.coerced_f64() {
                    running += f;
                    running_non_null += 1;
                }
                prefix.push(running);
                non_null.push(running_non_null);
            }
            PrefixVec::Float(prefix)
        };
        Ok(Self {
            partition,
            values,
            non_null,
        })
    }

    /// The (sum, non-null count) of `frame`, or `None` when the frame
    /// holds no non-null input.
    fn sum_over(&self, frame: WindowInterval) -> Result<Option<(NumericSum, i64)>> {
        if frame.is_empty() {
            return Ok(None);
        }
        if !frame.within(&self.partition) {
            return Err(WindrowError::Internal(format!(
                "frame {frame} escapes partition {}",
                self.partition
            )));
        }
        let lo = frame.start - self.partition.start;
        let hi = frame.end - self.partition.start;
        let non_null =
            self.non_null[hi - 1] - if lo > 0 { self.non_null[lo - 1] } else { 0 };
        if non_null == 0 {
            return Ok(None);
        }
        let sum = match &self.values {
            PrefixVec::Float(p) => {
                NumericSum::Float(p[hi - 1] - if lo > 0 { p[lo - 1] } else { 0.0 })
            }
            PrefixVec::Decimal(p) => NumericSum::Decimal(
                &p[hi - 1] - if lo > 0 { p[lo - 1].clone() } else { BigDecimal::from(0) },
            ),
        };
        Ok(Some((sum, non_null)))
    }
}

#[derive(Debug)]
struct SumAccumulator {
    expr: Arc<dyn Expression>,
    prefix: Option<SumPrefix>,
}

impl Accumulator for SumAccumulator {
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<()> {
        self.prefix = Some(SumPrefix::build(ctx, &self.expr, partition, buffer)?);
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        let prefix = self.prefix.as_ref().ok_or(WindrowError::PartitionNotSet)?;
        Ok(match prefix.sum_over(frame)? {
            None => Value::Null,
            Some((sum, _)) => sum.into_value(),
        })
    }

    fn dispose(&mut self) {
        self.prefix = None;
    }
}

#[derive(Debug)]
struct AvgAccumulator {
    expr: Arc<dyn Expression>,
    prefix: Option<SumPrefix>,
}

impl Accumulator for AvgAccumulator {
    fn start_partition(
        &mut self,
        ctx: &TaskContext,
        partition: WindowInterval,
        buffer: &[Row],
    ) -> Result<()> {
        self.prefix = Some(SumPrefix::build(ctx, &self.expr, partition, buffer)?);
        Ok(())
    }

    fn evaluate(
        &mut self,
        _ctx: &TaskContext,
        frame: WindowInterval,
        _buffer: &[Row],
    ) -> Result<Value> {
        let prefix = self.prefix.as_ref().ok_or(WindrowError::PartitionNotSet)?;
        Ok(match prefix.sum_over(frame)? {
            None => Value::Null,
            Some((sum, non_null)) => sum.divide(non_null),
        })
    }

    fn dispose(&mut self) {
        self.prefix = None;
    }
}
