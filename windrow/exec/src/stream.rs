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

//! The async row stream contract and the in-memory implementation used
//! for fan-out and tests.

use async_trait::async_trait;

use windrow_common::{Result, Row, TaskContext};

/// An async stream of rows. Pulling the next row is the engine's only
/// suspension point besides session-variable reads; `None` is the
/// terminal signal.
#[async_trait]
pub trait RowStream: Send {
    /// The next row, or `None` once the stream is exhausted.
    async fn next(&mut self, ctx: &TaskContext) -> Result<Option<Row>>;

    /// Releases the stream's resources. Called exactly once by the owner
    /// on every exit path; implementations should tolerate extra calls.
    async fn close(&mut self, _ctx: &TaskContext) -> Result<()> {
        Ok(())
    }
}

/// A stream over rows already resident in memory. Used by the window
/// iterator to replay one drained child into several partition iterators,
/// and by tests as a source.
#[derive(Debug)]
pub struct MemoryStream {
    rows: Vec<Row>,
    index: usize,
}

impl MemoryStream {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, index: 0 }
    }
}

#[async_trait]
impl RowStream for MemoryStream {
    async fn next(&mut self, ctx: &TaskContext) -> Result<Option<Row>> {
        ctx.check_cancelled()?;
        if self.index < self.rows.len() {
            let row = self.rows[self.index].clone();
            self.index += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }
}
