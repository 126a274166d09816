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

//! Sort fields: an expression paired with direction and null ordering.

use std::fmt;
use std::sync::Arc;

use windrow_common::{Result, Row, SortOptions, TaskContext, Value};

use crate::expression::Expression;

/// One entry of an ORDER BY list.
#[derive(Debug, Clone)]
pub struct SortField {
    /// Physical expression producing the sort key.
    pub expr: Arc<dyn Expression>,
    /// Direction and null placement.
    pub options: SortOptions,
}

impl SortField {
    pub fn new(expr: Arc<dyn Expression>, options: SortOptions) -> Self {
        Self { expr, options }
    }

    pub fn asc(expr: Arc<dyn Expression>) -> Self {
        Self::new(expr, SortOptions::asc())
    }

    pub fn desc(expr: Arc<dyn Expression>) -> Self {
        Self::new(expr, SortOptions::desc())
    }

    /// Evaluates the sort key for one row.
    pub fn eval(&self, ctx: &TaskContext, row: &Row) -> Result<Value> {
        self.expr.eval(ctx, row)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.expr,
            if self.options.descending {
                "DESC"
            } else {
                "ASC"
            }
        )
    }
}

/// Evaluates a list of sort fields against one row, yielding the sort-key
/// tuple.
pub fn evaluate_sort_key(
    fields: &[SortField],
    ctx: &TaskContext,
    row: &Row,
) -> Result<Vec<Value>> {
    fields.iter().map(|f| f.eval(ctx, row)).collect()
}

/// The sort options of each field, in order.
pub fn sort_options(fields: &[SortField]) -> Vec<SortOptions> {
    fields.iter().map(|f| f.options).collect()
}
