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

//! Shared value, row, type and error definitions for the windrow
//! aggregation and windowing engine.

pub mod context;
pub mod error;
pub mod row;
pub mod sort;
pub mod types;
pub mod utils;
pub mod value;

pub use context::{SessionConfig, TaskContext};
pub use error::{Result, WindrowError};
pub use row::{Row, WindowInterval};
pub use sort::SortOptions;
pub use types::DataType;
pub use value::Value;
