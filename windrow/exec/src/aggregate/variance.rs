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

//! VAR_POP, VAR_SAMP, STDDEV_POP and STDDEV_SAMP via Welford's
//! single-pass, numerically stable recurrence.

use std::fmt;
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value};
use windrow_expr::{Accumulator, AggregateExpr, AggregationBuffer, Expression};

use super::impl_aggregate_expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarianceKind {
    VarPop,
    VarSamp,
    StddevPop,
    StddevSamp,
}

impl VarianceKind {
    fn name(self) -> &'static str {
        match self {
            VarianceKind::VarPop => "VAR_POP",
            VarianceKind::VarSamp => "VAR_SAMP",
            VarianceKind::StddevPop => "STDDEV_POP",
            VarianceKind::StddevSamp => "STDDEV_SAMP",
        }
    }

    fn is_sample(self) -> bool {
        matches!(self, VarianceKind::VarSamp | VarianceKind::StddevSamp)
    }

    fn is_stddev(self) -> bool {
        matches!(self, VarianceKind::StddevPop | VarianceKind::StddevSamp)
    }
}

macro_rules! variance_aggregate {
    ($t:ident, $kind:expr) => {
        #[derive(Debug, Clone)]
        pub struct $t {
            expr: Arc<dyn Expression>,
        }

        impl $t {
            pub fn new(expr: Arc<dyn Expression>) -> Self {
                Self { expr }
            }

            fn result_type(&self) -> DataType {
                DataType::Float64
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", $kind.name(), self.expr)
            }
        }

        impl_aggregate_expression!($t);

        impl AggregateExpr for $t {
            fn expressions(&self) -> Vec<Arc<dyn Expression>> {
                vec![self.expr.clone()]
            }

            fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
                Ok(Box::new(VarianceBuffer {
                    expr: self.expr.clone(),
                    kind: $kind,
                    count: 0,
                    mean: 0.0,
                    m2: 0.0,
                }))
            }

            fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
                super::scan_accumulator(self)
            }
        }
    };
}

variance_aggregate!(VarPop, VarianceKind::VarPop);
variance_aggregate!(VarSamp, VarianceKind::VarSamp);
variance_aggregate!(StddevPop, VarianceKind::StddevPop);
variance_aggregate!(StddevSamp, VarianceKind::StddevSamp);

#[derive(Debug)]
struct VarianceBuffer {
    expr: Arc<dyn Expression>,
    kind: VarianceKind,
    count: u64,
    mean: f64,
    m2: f64,
}

impl AggregationBuffer for VarianceBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let v = self.expr.eval(ctx, row)?;
        let Some(x) = v.coerced_f64() else {
            return Ok(());
        };
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        let denominator = if self.kind.is_sample() {
            if self.count < 2 {
                return Ok(Value::Null);
            }
            (self.count - 1) as f64
        } else {
            if self.count == 0 {
                return Ok(Value::Null);
            }
            self.count as f64
        };
        let variance = self.m2 / denominator;
        Ok(Value::Float64(if self.kind.is_stddev() {
            variance.sqrt()
        } else {
            variance
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windrow_expr::col;

    fn feed(agg: &dyn AggregateExpr, vals: &[Value]) -> Result<Value> {
        let ctx = TaskContext::new();
        let mut buf = agg.new_buffer()?;
        for v in vals {
            buf.update(&ctx, &Row::new(vec![v.clone()]))?;
        }
        buf.eval(&ctx)
    }

    fn e() -> Arc<dyn Expression> {
        col("c0", 0, DataType::Float64)
    }

    fn floats(vals: &[f64]) -> Vec<Value> {
        vals.iter().copied().map(Value::Float64).collect()
    }

    fn assert_close(actual: Value, expected: f64) {
        match actual {
            Value::Float64(f) => assert!((f - expected).abs() < 1e-9, "{f} != {expected}"),
            other => panic!("expected float, got {other}"),
        }
    }

    #[test]
    fn population_and_sample_variance() -> Result<()> {
        let data = floats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_close(feed(&VarPop::new(e()), &data)?, 2.0);
        assert_close(feed(&VarSamp::new(e()), &data)?, 2.5);
        assert_close(feed(&StddevPop::new(e()), &data)?, 2.0f64.sqrt());
        assert_close(feed(&StddevSamp::new(e()), &data)?, 2.5f64.sqrt());
        Ok(())
    }

    #[test]
    fn nulls_are_skipped_and_small_frames_are_null() -> Result<()> {
        let data = [Value::Float64(1.0), Value::Null, Value::Float64(3.0)];
        assert_close(feed(&VarPop::new(e()), &data)?, 1.0);

        assert_eq!(feed(&VarPop::new(e()), &[])?, Value::Null);
        assert_eq!(
            feed(&VarSamp::new(e()), &[Value::Float64(1.0)])?,
            Value::Null
        );
        Ok(())
    }
}
