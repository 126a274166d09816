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

//! The windrow execution core: aggregate accumulators, window framers, and
//! the partition/window iterators that drive them over a row stream.
//!
//! The engine materializes the child stream once per window block, sorts
//! it by (partition keys, order keys), evaluates every aggregation of the
//! block over the shared buffer, and restores the original emission order
//! on the way out.

pub mod aggregate;
pub mod stream;
pub mod window;

pub use stream::{MemoryStream, RowStream};
