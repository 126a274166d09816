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

//! BIT_AND, BIT_OR and BIT_XOR over unsigned 64-bit integers.
//!
//! Nulls are skipped and a frame with no contributing rows yields the
//! operation's identity (all-ones for AND, zero for OR/XOR) rather than
//! null. Non-integer inputs coerce; unconvertible values count as zero.

use std::fmt;
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value};
use windrow_expr::{Accumulator, AggregateExpr, AggregationBuffer, Expression};

use super::impl_aggregate_expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    fn identity(self) -> u64 {
        match self {
            BitOp::And => u64::MAX,
            BitOp::Or | BitOp::Xor => 0,
        }
    }

    fn apply(self, acc: u64, v: u64) -> u64 {
        match self {
            BitOp::And => acc & v,
            BitOp::Or => acc | v,
            BitOp::Xor => acc ^ v,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BitOp::And => "BIT_AND",
            BitOp::Or => "BIT_OR",
            BitOp::Xor => "BIT_XOR",
        }
    }
}

macro_rules! bit_aggregate {
    ($t:ident, $op:expr) => {
        #[derive(Debug, Clone)]
        pub struct $t {
            expr: Arc<dyn Expression>,
        }

        impl $t {
            pub fn new(expr: Arc<dyn Expression>) -> Self {
                Self { expr }
            }

            fn result_type(&self) -> DataType {
                DataType::UInt64
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", $op.name(), self.expr)
            }
        }

        impl_aggregate_expression!($t);

        impl AggregateExpr for $t {
            fn expressions(&self) -> Vec<Arc<dyn Expression>> {
                vec![self.expr.clone()]
            }

            fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
                Ok(Box::new(BitBuffer {
                    expr: self.expr.clone(),
                    op: $op,
                    acc: $op.identity(),
                }))
            }

            fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
                super::scan_accumulator(self)
            }
        }
    };
}

bit_aggregate!(BitAnd, BitOp::And);
bit_aggregate!(BitOr, BitOp::Or);
bit_aggregate!(BitXor, BitOp::Xor);

#[derive(Debug)]
struct BitBuffer {
    expr: Arc<dyn Expression>,
    op: BitOp,
    acc: u64,
}

impl AggregationBuffer for BitBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        if let Some(v) = self.expr.eval(ctx, row)?.coerced_u64() {
            self.acc = self.op.apply(self.acc, v);
        }
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(Value::UInt64(self.acc))
    }
}
