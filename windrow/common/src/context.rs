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

//! The per-task execution context: session variables and cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, WindrowError};
use crate::value::Value;

/// Default byte cap applied by GROUP_CONCAT when the session does not
/// override `group_concat_max_len`.
pub const DEFAULT_GROUP_CONCAT_MAX_LEN: u64 = 1024;

/// Session-scoped variables, keyed by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    vars: HashMap<String, Value>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: Value) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_lowercase(), value);
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(&name.to_lowercase())
    }

    /// The configured GROUP_CONCAT byte cap, a non-negative 64-bit
    /// integer. Unset or unreadable values fall back to the default.
    pub fn group_concat_max_len(&self) -> u64 {
        self.var("group_concat_max_len")
            .and_then(|v| v.to_u64())
            .unwrap_or(DEFAULT_GROUP_CONCAT_MAX_LEN)
    }
}

/// Execution context threaded through every call of the engine. Carries
/// the session variables and a cooperative cancellation flag; iterators
/// check the flag at materialization-loop iterations and at partition
/// boundaries.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    session: SessionConfig,
    cancelled: Arc<AtomicBool>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: SessionConfig) -> Self {
        Self {
            session,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Requests cooperative cancellation; safe to call from another clone
    /// of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(WindrowError::Cancelled)
        } else {
            Ok(())
        }
    }
}
