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

//! GROUP_CONCAT: list accumulation with DISTINCT, ORDER BY resorting, a
//! configurable separator, and a byte-length cap taken from the
//! `group_concat_max_len` session variable.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use ahash::RandomState;

use windrow_common::utils::compare_rows_total;
use windrow_common::{DataType, Result, Row, TaskContext, Value};
use windrow_common::context::DEFAULT_GROUP_CONCAT_MAX_LEN;
use windrow_expr::{
    evaluate_sort_key, sort_options, Accumulator, AggregateExpr, AggregationBuffer,
    Expression, SortField,
};

use super::{check_arity, impl_aggregate_expression};

/// The byte cap below which GROUP_CONCAT declares a sized VARCHAR or
/// VARBINARY; larger caps degrade to TEXT/BLOB.
const SIZED_TYPE_BOUNDARY: u64 = 512;

/// GROUP_CONCAT([DISTINCT] expr, ... [ORDER BY ...] [SEPARATOR 'x']).
#[derive(Debug, Clone)]
pub struct GroupConcat {
    distinct: bool,
    order_by: Vec<SortField>,
    separator: String,
    exprs: Vec<Arc<dyn Expression>>,
    /// An explicit byte cap; when absent, the session's
    /// `group_concat_max_len` applies at evaluation time.
    max_len: Option<u64>,
}

impl GroupConcat {
    pub fn try_new(
        distinct: bool,
        order_by: Vec<SortField>,
        separator: String,
        exprs: Vec<Arc<dyn Expression>>,
        max_len: Option<u64>,
    ) -> Result<Self> {
        if exprs.is_empty() {
            check_arity("GROUP_CONCAT", 1, &exprs)?;
        }
        Ok(Self {
            distinct,
            order_by,
            separator,
            exprs,
            max_len,
        })
    }

    fn result_type(&self) -> DataType {
        let cap = self.max_len.unwrap_or(DEFAULT_GROUP_CONCAT_MAX_LEN);
        let binary = self.exprs.iter().any(|e| e.data_type().is_binary());
        match (binary, cap <= SIZED_TYPE_BOUNDARY) {
            (true, true) => DataType::Varbinary(cap),
            (true, false) => DataType::Blob,
            (false, true) => DataType::Varchar(cap),
            (false, false) => DataType::Text,
        }
    }
}

impl fmt::Display for GroupConcat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "group_concat(")?;
        if self.distinct {
            write!(f, "distinct ")?;
        }
        for (i, e) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        if !self.order_by.is_empty() {
            write!(f, " order by ")?;
            for (i, s) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{s}")?;
            }
        }
        write!(f, " separator '{}')", self.separator)
    }
}

impl_aggregate_expression!(GroupConcat);

impl AggregateExpr for GroupConcat {
    fn expressions(&self) -> Vec<Arc<dyn Expression>> {
        self.exprs.clone()
    }

    fn new_buffer(&self) -> Result<Box<dyn AggregationBuffer>> {
        Ok(Box::new(GroupConcatBuffer {
            spec: self.clone(),
            state: RandomState::new(),
            seen: HashSet::default(),
            entries: vec![],
            binary: false,
        }))
    }

    fn create_accumulator(&self) -> Result<Box<dyn Accumulator>> {
        super::scan_accumulator(self)
    }
}

struct GroupConcatBuffer {
    spec: GroupConcat,
    state: RandomState,
    /// Hashes of evaluated strings already captured, when DISTINCT.
    seen: HashSet<u64>,
    /// Captured (original row, evaluated string) pairs; the row is kept so
    /// that an ORDER BY can resort the list at evaluation time.
    entries: Vec<(Row, String)>,
    binary: bool,
}

impl fmt::Debug for GroupConcatBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GroupConcatBuffer")
            .field("entries", &self.entries.len())
            .field("binary", &self.binary)
            .finish()
    }
}

impl AggregationBuffer for GroupConcatBuffer {
    fn update(&mut self, ctx: &TaskContext, row: &Row) -> Result<()> {
        let mut rendered = String::new();
        for expr in &self.spec.exprs {
            let v = expr.eval(ctx, row)?;
            if v.is_null() {
                return Ok(());
            }
            if matches!(v, Value::Bytes(_)) {
                self.binary = true;
            }
            rendered.push_str(&v.to_string());
        }
        if self.spec.distinct {
            let key = self.state.hash_one(&rendered);
            if !self.seen.insert(key) {
                return Ok(());
            }
        }
        self.entries.push((row.clone(), rendered));
        Ok(())
    }

    fn eval(&mut self, ctx: &TaskContext) -> Result<Value> {
        if self.entries.is_empty() {
            return Ok(Value::Null);
        }
        let max_len = self
            .spec
            .max_len
            .unwrap_or_else(|| ctx.session().group_concat_max_len())
            as usize;

        let mut entries = self.entries.clone();
        if !self.spec.order_by.is_empty() {
            let options = sort_options(&self.spec.order_by);
            let mut keyed = Vec::with_capacity(entries.len());
            for (row, rendered) in entries.drain(..) {
                let key = evaluate_sort_key(&self.spec.order_by, ctx, &row)?;
                keyed.push((key, rendered));
            }
            keyed.sort_by(|a, b| compare_rows_total(&a.0, &b.0, &options));
            entries = keyed
                .into_iter()
                .map(|(_, rendered)| (Row::empty(), rendered))
                .collect();
        }

        // The cap applies to bytes, not code points; the builder stops as
        // soon as it crosses the cap and is then cut back to exactly
        // max_len bytes.
        let mut out: Vec<u8> = Vec::new();
        for (_, rendered) in &entries {
            if !out.is_empty() {
                out.extend_from_slice(self.spec.separator.as_bytes());
            }
            out.extend_from_slice(rendered.as_bytes());
            if out.len() >= max_len {
                break;
            }
        }
        out.truncate(max_len);

        if self.binary {
            return Ok(Value::Bytes(out));
        }
        Ok(match String::from_utf8(out) {
            Ok(s) => Value::Str(s),
            // Truncation split a multi-byte character; fall back to the
            // binary form to preserve the exact byte length.
            Err(e) => Value::Bytes(e.into_bytes()),
        })
    }

    fn dispose(&mut self) {
        self.seen = HashSet::default();
        self.entries = vec![];
        self.binary = false;
    }
}
