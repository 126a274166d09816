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

//! JSON_ARRAYAGG and JSON_OBJECTAGG.

use std::fmt;
use std::sync::Arc;

use windrow_common::{DataType, Result, Row, TaskContext, Value, WindrowError};
use windrow_expr::{Accumulator, AggregateExpr, AggregationBuffer, Expression};

use super::{check_arity, impl_aggregate_expression};

/// JSON_ARRAYAGG(expr). SQL NULL inputs are preserved as JSON nulls, and
/// an empty group aggregates to the empty array, not NULL.
#[derive(Debug, Clone)]
pub struct JsonArrayAgg {
    expr: Arc<dyn Expression>,
}

impl JsonArrayAgg {
    pub fn new(expr: Arc<dyn Expression>) -> Self {
        Self { expr }
    }

    fn result_type(&self) -> DataType {
        DataType::Json
    }
}

impl fmt::Display for JsonArrayAgg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "JSON_ARRAYAGG({})", self.expr)
    }
}

impl_aggregate_expression!(JsonArrayAgg);

impl AggregateExpr for JsonArrayAgg {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.expr.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(JsonArrayAggBuffer {
            expr: self.expr.clone(),
            values: vec![],
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        super::scan_accumulator(self)
    }
}

#[derive(Debug)]
struct JsonArrayAggBuffer {
    expr: Arc<dyn Expression>,
    values: Vec<serde_json::Value>,
}

impl AggregationBuffer for JsonArrayAggBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let v = self.expr.eval(ctx, row)?;
        self.values.push(v.into_json());
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        Ok(Value::Json(serde_json::Value::Array(self.values.clone())))
    }

    fn dispose(&mut self) {
        self.values = vec![];
    }
}

/// JSON_OBJECTAGG(key, value). A null key is an error; a duplicate key
/// keeps the last value, as MySQL does. An empty group aggregates to NULL.
#[derive(Debug, Clone)]
pub struct JsonObjectAgg {
    key: Arc<dyn Expression>,
    value: Arc<dyn Expression>,
}

impl JsonObjectAgg {
    pub fn try_new(args: Vec<Arc<dyn Expression>>) -> Result<Self> {
        check_arity("JSON_OBJECTAGG", 2, &args)?;
        let [key, value] = <[Arc<dyn Expression>; 2]>::try_from(args)
            .map_err(|_| WindrowError::Internal("JSON_OBJECTAGG arity".to_string()))?;
        Ok(Self { key, value })
    }

    fn result_type(&self) -> DataType {
        DataType::Json
    }
}

impl fmt::Display for JsonObjectAgg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "JSON_OBJECTAGG({}, {})", self.key, self.value)
    }
}

impl_aggregate_expression!(JsonObjectAgg);

impl AggregateExpr for JsonObjectAgg {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        vec![self.key.clone(), self.value.clone()]
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(JsonObjectAggBuffer {
            key: self.key.clone(),
            value: self.value.clone(),
            object: serde_json::Map::new(),
            empty: true,
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        super::scan_accumulator(self)
    }
}

#[derive(Debug)]
struct JsonObjectAggBuffer {
    key: Arc<dyn Expression>,
    value: Arc<dyn Expression>,
    object: serde_json::Map<String, serde_json::Value>,
    empty: bool,
}

impl AggregationBuffer for JsonObjectAggBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let key = self.key.eval(ctx, row)?;
        if key.is_null() {
            return Err(WindrowError::JsonObjectAggNullKey);
        }
        let value = self.value.eval(ctx, row)?;
        self.object.insert(key.to_string(), value.into_json());
        self.empty = false;
        Ok(())
    }

    fn eval(&mut self, _ctx: &TaskContext) -> Result<Value> {
        if self.empty {
            return Ok(Value::Null);
        }
        Ok(Value::Json(serde_json::Value::Object(self.object.clone())))
    }

    fn dispose(&mut self) {
        self.object = serde_json::Map::new();
        self.empty = true;
    }
}
