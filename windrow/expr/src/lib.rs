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

//! Contracts between the windrow execution core and the surrounding query
//! engine: scalar expressions, sort fields, window definitions, and the
//! accumulator traits that aggregate implementations fulfill.

pub mod accumulator;
pub mod expression;
pub mod sort;
pub mod window_frame;

pub use accumulator::{Accumulator, AggregateExpr, AggregationBuffer, Framing};
pub use expression::{col, lit, Column, Expression, Literal, Star};
pub use sort::{evaluate_sort_key, sort_options, SortField};
pub use window_frame::{FrameBound, FrameSpec, FrameUnits, WindowDefinition};
