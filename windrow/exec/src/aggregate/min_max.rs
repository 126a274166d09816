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

//! MIN, MAX, FIRST, LAST and ANY_VALUE. All of them scan their frame
//! directly; none benefits from prefix acceleration. Comparison failures
//! in MIN/MAX are fatal and propagate.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value};
use windrow_expr::{Accumulator, AggregateExpr, AggregationBuffer, Expression};

use super::impl_aggregate_expression;

macro_rules! unary_scan_aggregate {
    ($t:ident, $name:literal, $buffer:ident) => {
        #[derive(Debug, Clone)]
        pub struct $t {
            expr: Arc<dyn Expression>,
        }

        impl $t {
            pub fn new(expr: Arc<dyn Expression>) -> Self {
                Self { expr }
            }

            fn result_type(&self) -> DataType {
                self.expr.data_type()
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($name, "({})"), self.expr)
            }
        }

        impl_aggregate_expression!($t);

        impl AggregateExpr for $t {
            fn expressions(&self) -> Vec<Arc<dyn Expression>> {
                vec![self.expr.clone()]
            }

            fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
                Ok(Box::new($buffer {
                    expr: self.expr.clone(),
                    value: Value::Null,
                }))
            }

            fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
                super::scan_accumulator(self)
            }
        }
    };
}

unary_scan_aggregate!(Min, "MIN", MinBuffer);
unary_scan_aggregate!(Max, "MAX", MaxBuffer);
unary_scan_aggregate!(First, "FIRST", FirstBuffer);
unary_scan_aggregate!(Last, "LAST", LastBuffer);
unary_scan_aggregate!(AnyValue, "ANY_VALUE", FirstBuffer);

#[derive(Debug)]
struct MinBuffer {
    expr: Arc<dyn Expression>,
    value: Value,
}

impl AggregationBuffer for MinBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let v = self.expr.eval(ctx, row)?;
        if v.is_null() {
            return Ok(());
        }
        if self.value.is_null() || v.compare(&self.value)? == Ordering::Less {
            self.value = v;
        }
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(self.value.clone())
    }
}

#[derive(Debug)]
struct MaxBuffer {
    expr: Arc<dyn Expression>,
    value: Value,
}

impl AggregationBuffer for MaxBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let v = self.expr.eval(ctx, row)?;
        if v.is_null() {
            return Ok(());
        }
        if self.value.is_null() || v.compare(&self.value)? == Ordering::Greater {
            self.value = v;
        }
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// Keeps the first non-null value seen. Also backs ANY_VALUE, whose choice
/// of row is implementation-defined.
#[derive(Debug)]
struct FirstBuffer {
    expr: Arc<dyn Expression>,
    value: Value,
}

impl AggregationBuffer for FirstBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        if !self.value.is_null() {
            return Ok(());
        }
        self.value = self.expr.eval(ctx, row)?;
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// Keeps the last non-null value seen, i.e. scanning back from the frame
/// end it answers with the first non-null hit.
#[derive(Debug)]
struct LastBuffer {
    expr: Arc<dyn Expression>,
    value: Value,
}

impl AggregationBuffer for LastBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let v = self.expr.eval(ctx, row)?;
        if !v.is_null() {
            self.value = v;
        }
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windrow_common::{WindowInterval, WindrowError};
    use windrow_expr::col;

    fn rows(vals: &[Value]) -> Vec<Row> {
        vals.iter().map(|v| Row::new(vec![v.clone()])).collect()
    }

    fn feed(
        agg: &dyn AggregateExpr,
        ctx: &TaskContext,
        rows: &[Row],
    ) -> Result<Value> {
        let mut buf = agg.new_buffer()?;
        for row in rows {
            buf.update(ctx, row)?;
        }
        buf.eval(ctx)
    }

    #[test]
    fn min_max_skip_nulls_and_empty_is_null() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[
            Value::Null,
            Value::Int64(4),
            Value::Int64(-2),
            Value::Null,
            Value::Int64(9),
        ]);
        let e = || col("c0", 0, DataType::Int64);
        assert_eq!(feed(&Min::new(e()), &ctx, &data)?, Value::Int64(-2));
        assert_eq!(feed(&Max::new(e()), &ctx, &data)?, Value::Int64(9));
        assert_eq!(feed(&Min::new(e()), &ctx, &[])?, Value::Null);
        Ok(())
    }

    #[test]
    fn min_comparison_failures_are_fatal() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[Value::Int64(1), Value::Str("alder".into())]);
        let min = Min::new(col("c0", 0, DataType::Int64));
        let mut buf = min.new_buffer()?;
        buf.update(&ctx, &data[0])?;
        assert!(matches!(
            buf.update(&ctx, &data[1]),
            Err(WindrowError::Execution(_))
        ));
        Ok(())
    }

    #[test]
    fn first_and_last_pick_non_null_ends() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[
            Value::Null,
            Value::Int64(7),
            Value::Int64(8),
            Value::Null,
        ]);
        let e = || col("c0", 0, DataType::Int64);
        assert_eq!(feed(&First::new(e()), &ctx, &data)?, Value::Int64(7));
        assert_eq!(feed(&Last::new(e()), &ctx, &data)?, Value::Int64(8));
        assert_eq!(feed(&AnyValue::new(e()), &ctx, &data)?, Value::Int64(7));
        Ok(())
    }

    #[test]
    fn window_mode_scans_the_frame_only() -> Result<()> {
        let ctx = TaskContext::new();
        let data = rows(&[
            Value::Int64(5),
            Value::Int64(1),
            Value::Int64(9),
            Value::Int64(3),
        ]);
        let max = Max::new(col("c0", 0, DataType::Int64));
        let mut acc = max.create_accumulator()?;
        acc.start_partition(&ctx, WindowInterval::new(0, 4), &data)?;
        assert_eq!(
            acc.evaluate(&ctx, WindowInterval::new(0, 2), &data)?,
            Value::Int64(5)
        );
        assert_eq!(
            acc.evaluate(&ctx, WindowInterval::new(1, 4), &data)?,
            Value::Int64(9)
        );
        assert_eq!(
            acc.evaluate(&ctx, WindowInterval::new(2, 2), &data)?,
            Value::Null
        );
        Ok(())
    }
}
