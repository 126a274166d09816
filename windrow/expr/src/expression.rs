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

//! The scalar expression contract, plus the handful of implementations
//! the core needs for its own plumbing and tests. Richer expression trees
//! (arithmetic, functions, casts) are the planner's business and arrive
//! through this trait.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value, WindrowError};

/// A scalar expression evaluated one row at a time.
pub trait Expression: Debug + Display + Send + Sync {
    /// The type this expression declares before evaluation.
    fn data_type(&self) -> DataType;

    /// Whether the expression is fully bound to its inputs.
    fn resolved(&self) -> bool {
        true
    }

    /// Evaluates the expression against `row`.
    fn eval(&self, ctx: &TaskContext, row: &Row) -> Result<Value>;
}

/// A column reference by position.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    index: usize,
    data_type: DataType,
}

impl Column {
    pub fn new(name: &str, index: usize, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            index,
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Expression for Column {
    fn data_type(&self) -> DataType {
        self.data_type.clone()
    }

    fn eval(&self, _ctx: &TaskContext, row: &Row) -> Result<Value> {
        row.get(self.index).cloned().ok_or_else(|| {
            WindrowError::Execution(format!(
                "column {} (index {}) out of bounds for row of {} cells",
                self.name,
                self.index,
                row.len()
            ))
        })
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Creates a column expression.
pub fn col(name: &str, index: usize, data_type: DataType) -> Arc<dyn Expression> {
    Arc::new(Column::new(name, index, data_type))
}

/// A literal value.
#[derive(Debug, Clone)]
pub struct Literal {
    value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Expression for Literal {
    fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    fn eval(&self, _ctx: &TaskContext, _row: &Row) -> Result<Value> {
        Ok(self.value.clone())
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.value {
            Value::Str(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}

/// Creates a literal expression.
pub fn lit(value: Value) -> Arc<dyn Expression> {
    Arc::new(Literal::new(value))
}

/// The `*` argument of `COUNT(*)`. Evaluates to the row-reference
/// sentinel, which is never null, so every row counts.
#[derive(Debug, Clone, Default)]
pub struct Star;

impl Expression for Star {
    fn data_type(&self) -> DataType {
        DataType::Null
    }

    fn eval(&self, _ctx: &TaskContext, _row: &Row) -> Result<Value> {
        Ok(Value::RowRef)
    }
}

impl Display for Star {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_eval_and_bounds() -> Result<()> {
        let ctx = TaskContext::new();
        let row = Row::new(vec![Value::Int64(1), Value::Str("elm".into())]);
        let c = Column::new("c1", 1, DataType::Text);
        assert_eq!(c.eval(&ctx, &row)?, Value::Str("elm".into()));
        let out = Column::new("c9", 9, DataType::Text);
        assert!(out.eval(&ctx, &row).is_err());
        Ok(())
    }

    #[test]
    fn star_is_never_null() -> Result<()> {
        let ctx = TaskContext::new();
        let v = Star.eval(&ctx, &Row::empty())?;
        assert!(!v.is_null());
        Ok(())
    }

    #[test]
    fn literal_display_quotes_strings() {
        assert_eq!(lit(Value::Str("x,y".into())).to_string(), "'x,y'");
        assert_eq!(lit(Value::Int64(3)).to_string(), "3");
    }
}
