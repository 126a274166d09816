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

//! Tuple comparison and the forward scan used by RANGE frame boundaries.

use std::cmp::Ordering;

use crate::error::Result;
use crate::sort::SortOptions;
use crate::value::Value;

/// This function compares two tuples depending on the given sort options.
pub fn compare_rows(
    x: &[Value],
    y: &[Value],
    sort_options: &[SortOptions],
) -> Result<Ordering> {
    let zip_it = x.iter().zip(y.iter()).zip(sort_options.iter());
    // Preserving lexical ordering.
    for ((lhs, rhs), sort_options) in zip_it {
        // Consider all combinations of NULLS FIRST/LAST and ASC/DESC configurations.
        let result = match (lhs.is_null(), rhs.is_null(), sort_options.nulls_first) {
            (true, false, false) | (false, true, true) => Ordering::Greater,
            (true, false, true) | (false, true, false) => Ordering::Less,
            (false, false, _) => {
                if sort_options.descending {
                    rhs.compare(lhs)?
                } else {
                    lhs.compare(rhs)?
                }
            }
            (true, true, _) => continue,
        };
        if result != Ordering::Equal {
            return Ok(result);
        }
    }
    Ok(Ordering::Equal)
}

/// Infallible variant of [compare_rows] for use inside the buffer sort,
/// where a comparator cannot propagate errors. Values the SQL comparator
/// refuses to relate fall back to a consistent order on the type tag.
pub fn compare_rows_total(
    x: &[Value],
    y: &[Value],
    sort_options: &[SortOptions],
) -> Ordering {
    let zip_it = x.iter().zip(y.iter()).zip(sort_options.iter());
    for ((lhs, rhs), sort_options) in zip_it {
        let result = match (lhs.is_null(), rhs.is_null(), sort_options.nulls_first) {
            (true, false, false) | (false, true, true) => Ordering::Greater,
            (true, false, true) | (false, true, false) => Ordering::Less,
            (false, false, _) => {
                if sort_options.descending {
                    rhs.total_cmp(lhs)
                } else {
                    lhs.total_cmp(rhs)
                }
            }
            (true, true, _) => continue,
        };
        if result != Ordering::Equal {
            return result;
        }
    }
    Ordering::Equal
}

/// This function searches for a tuple of given values (`target`) among the
/// given rows (`items`) via a forward scan starting at `low`. It assumes
/// `items` is sorted according to the comparator underlying `compare_fn`
/// and returns the insertion index of `target`. Successive calls with a
/// non-decreasing `low` make a whole-partition sweep amortized linear.
pub fn search_in_rows<F>(
    items: &[Vec<Value>],
    target: &[Value],
    compare_fn: F,
    mut low: usize,
    high: usize,
) -> Result<usize>
where
    F: Fn(&[Value], &[Value]) -> Result<bool>,
{
    while low < high && compare_fn(&items[low], target)? {
        low += 1;
    }
    Ok(low)
}
