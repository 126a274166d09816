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

//! Window execution: framers, the ranking function family, and the
//! iterators driving them.

pub mod framer;
pub mod group_by;
pub mod partition_iter;
pub mod ranking;
pub mod window_expr;
pub mod window_iter;

pub use framer::{Framer, FramerInput, RangeBound, RowsBound};
pub use group_by::GroupByIter;
pub use partition_iter::WindowPartitionIter;
pub use ranking::{
    CumeDist, DenseRank, Lag, Lead, Ntile, PercentRank, Rank, RowNumber,
};
pub use window_expr::{WindowFunctionExpr, WithWindow};
pub use window_iter::WindowIter;
