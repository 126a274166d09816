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

//! Framers produce, for each row of a partition, the half-open index
//! interval its aggregate is evaluated over. They are pure index
//! computations over the shared buffer and never touch row contents
//! except through the precomputed ORDER BY key columns.

use std::cmp::min;

use windrow_common::utils::{compare_rows, search_in_rows};
use windrow_common::{Result, SortOptions, Value, WindowInterval, WindrowError};

/// Read-only inputs shared by every framer of a partition iterator: the
/// ORDER BY key tuple of every buffered row (absolute indexing) and the
/// per-key sort options.
#[derive(Debug, Clone, Copy)]
pub struct FramerInput<'a> {
    pub order_keys: &'a [Vec<Value>],
    pub sort_options: &'a [SortOptions],
}

/// A resolved ROWS bound: offsets are plain row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

/// A resolved RANGE bound: offsets are values in the ORDER BY domain.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    UnboundedPreceding,
    Preceding(Value),
    CurrentRow,
    Following(Value),
    UnboundedFollowing,
}

/// The framer family. ROWS and RANGE cover the explicit frame clauses;
/// the rest are the fixed framings of GROUP BY, ranking functions, and
/// the implicit frame under ORDER BY.
#[derive(Debug)]
pub enum Framer {
    Rows(RowsFramer),
    Range(RangeFramer),
    Partition(PartitionFramer),
    GroupBy(GroupByFramer),
    PeerGroup(PeerGroupFramer),
    Cumulative(CumulativeFramer),
}

impl Framer {
    pub fn rows(start: RowsBound, end: RowsBound) -> Self {
        Framer::Rows(RowsFramer::new(start, end))
    }

    pub fn range(start: RangeBound, end: RangeBound) -> Self {
        Framer::Range(RangeFramer::new(start, end))
    }

    pub fn partition() -> Self {
        Framer::Partition(PartitionFramer::default())
    }

    pub fn group_by() -> Self {
        Framer::GroupBy(GroupByFramer::default())
    }

    pub fn peer_group() -> Self {
        Framer::PeerGroup(PeerGroupFramer::default())
    }

    pub fn cumulative() -> Self {
        Framer::Cumulative(CumulativeFramer::default())
    }

    /// Binds the framer to a partition, discarding all prior state.
    pub fn start_partition(&mut self, partition: WindowInterval) -> Result<()> {
        match self {
            Framer::Rows(f) => f.start_partition(partition),
            Framer::Range(f) => f.start_partition(partition),
            Framer::Partition(f) => f.start_partition(partition),
            Framer::GroupBy(f) => f.start_partition(partition),
            Framer::PeerGroup(f) => f.start_partition(partition),
            Framer::Cumulative(f) => f.start_partition(partition),
        }
        Ok(())
    }

    /// The next frame, or `None` once the partition is exhausted.
    pub fn next(&mut self, input: &FramerInput) -> Result<Option<WindowInterval>> {
        match self {
            Framer::Rows(f) => f.next(input),
            Framer::Range(f) => f.next(input),
            Framer::Partition(f) => f.next(input),
            Framer::GroupBy(f) => f.next(input),
            Framer::PeerGroup(f) => f.next(input),
            Framer::Cumulative(f) => f.next(input),
        }
    }

    /// The most recently produced frame. Asking before the framer was
    /// bound to a partition and produced a frame is an error.
    pub fn interval(&self) -> Result<WindowInterval> {
        let current = match self {
            Framer::Rows(f) => f.current,
            Framer::Range(f) => f.current,
            Framer::Partition(f) => f.current,
            Framer::GroupBy(f) => f.current,
            Framer::PeerGroup(f) => f.current,
            Framer::Cumulative(f) => f.current,
        };
        current.ok_or(WindrowError::PartitionNotSet)
    }

    /// Whether this framer emits one frame per partition rather than one
    /// per row.
    pub fn one_per_partition(&self) -> bool {
        matches!(self, Framer::GroupBy(_))
    }
}

/// ROWS framing: both endpoints are fixed row offsets from the current
/// row, clamped to the partition. Crossed bounds collapse to an empty
/// frame at the start index.
#[derive(Debug)]
pub struct RowsFramer {
    start: RowsBound,
    end: RowsBound,
    partition: Option<WindowInterval>,
    idx: usize,
    current: Option<WindowInterval>,
}

impl RowsFramer {
    fn new(start: RowsBound, end: RowsBound) -> Self {
        Self {
            start,
            end,
            partition: None,
            idx: 0,
            current: None,
        }
    }

    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.idx = partition.start;
        self.current = None;
    }

    fn next(&mut self, _input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.idx >= partition.end {
            return Ok(None);
        }
        let idx = self.idx;
        let start = match self.start {
            RowsBound::UnboundedPreceding => partition.start,
            RowsBound::Preceding(n) => {
                partition.start.max(idx.saturating_sub(n as usize))
            }
            RowsBound::CurrentRow => idx,
            RowsBound::Following(n) => min(idx + n as usize, partition.end),
            RowsBound::UnboundedFollowing => {
                return Err(WindrowError::Internal(
                    "frame start cannot be UNBOUNDED FOLLOWING".to_string(),
                ))
            }
        };
        let end = match self.end {
            RowsBound::UnboundedPreceding => {
                return Err(WindrowError::Internal(
                    "frame end cannot be UNBOUNDED PRECEDING".to_string(),
                ))
            }
            // end is exclusive, hence the +1 on the bound row.
            RowsBound::Preceding(n) => {
                partition.start.max((idx + 1).saturating_sub(n as usize))
            }
            RowsBound::CurrentRow => idx + 1,
            RowsBound::Following(n) => min(idx + n as usize + 1, partition.end),
            RowsBound::UnboundedFollowing => partition.end,
        };
        let start = min(start, end);
        self.idx += 1;
        let frame = WindowInterval::new(start, end);
        self.current = Some(frame);
        Ok(Some(frame))
    }
}

/// RANGE framing: endpoints are defined by a value inclusion predicate
/// over the single ORDER BY key. Both endpoints are non-decreasing over a
/// sorted partition, so each is found by a forward scan resuming where
/// the previous row's frame left off; a whole partition costs amortized
/// linear time.
#[derive(Debug)]
pub struct RangeFramer {
    start: RangeBound,
    end: RangeBound,
    partition: Option<WindowInterval>,
    idx: usize,
    last_start: usize,
    last_end: usize,
    current: Option<WindowInterval>,
}

impl RangeFramer {
    fn new(start: RangeBound, end: RangeBound) -> Self {
        Self {
            start,
            end,
            partition: None,
            idx: 0,
            last_start: 0,
            last_end: 0,
            current: None,
        }
    }

    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.idx = partition.start;
        self.last_start = partition.start;
        self.last_end = partition.start;
        self.current = None;
    }

    fn next(&mut self, input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.idx >= partition.end {
            return Ok(None);
        }
        let idx = self.idx;
        let start = match &self.start {
            RangeBound::UnboundedPreceding => partition.start,
            RangeBound::Preceding(delta) => {
                self.index_of_row::<true, true>(input, idx, Some(delta), partition)?
            }
            RangeBound::CurrentRow => {
                self.index_of_row::<true, true>(input, idx, None, partition)?
            }
            RangeBound::Following(delta) => {
                self.index_of_row::<true, false>(input, idx, Some(delta), partition)?
            }
            RangeBound::UnboundedFollowing => {
                return Err(WindrowError::Internal(
                    "frame start cannot be UNBOUNDED FOLLOWING".to_string(),
                ))
            }
        };
        let end = match &self.end {
            RangeBound::UnboundedPreceding => {
                return Err(WindrowError::Internal(
                    "frame end cannot be UNBOUNDED PRECEDING".to_string(),
                ))
            }
            RangeBound::Preceding(delta) => {
                self.index_of_row::<false, true>(input, idx, Some(delta), partition)?
            }
            RangeBound::CurrentRow => {
                self.index_of_row::<false, false>(input, idx, None, partition)?
            }
            RangeBound::Following(delta) => {
                self.index_of_row::<false, false>(input, idx, Some(delta), partition)?
            }
            RangeBound::UnboundedFollowing => partition.end,
        };
        let start = min(start, end);
        self.last_start = start;
        self.last_end = end;
        self.idx += 1;
        let frame = WindowInterval::new(start, end);
        self.current = Some(frame);
        Ok(Some(frame))
    }

    /// Finds one frame boundary. `SIDE` is true for the frame start and
    /// false for the end; `SEARCH_SIDE` is true when `delta` points
    /// toward preceding rows. The scan resumes from the matching boundary
    /// of the previous frame.
    fn index_of_row<const SIDE: bool, const SEARCH_SIDE: bool>(
        &self,
        input: &FramerInput,
        idx: usize,
        delta: Option<&Value>,
        partition: WindowInterval,
    ) -> Result<usize> {
        let current_row_key = input.order_keys.get(idx).ok_or_else(|| {
            WindrowError::Internal(format!("missing ORDER BY key for row {idx}"))
        })?;
        let target = if let Some(delta) = delta {
            let descending = input
                .sort_options
                .first()
                .ok_or_else(|| {
                    WindrowError::Internal(
                        "sort options unexpectedly absent in a RANGE frame".to_string(),
                    )
                })?
                .descending;
            current_row_key
                .iter()
                .map(|value| {
                    if value.is_null() {
                        return Ok(value.clone());
                    }
                    if SEARCH_SIDE == descending {
                        value.add(delta)
                    } else {
                        value.sub(delta)
                    }
                })
                .collect::<Result<Vec<Value>>>()?
        } else {
            current_row_key.clone()
        };
        let search_start = if SIDE { self.last_start } else { self.last_end };
        let compare_fn = |current: &[Value], target: &[Value]| {
            let cmp = compare_rows(current, target, input.sort_options)?;
            Ok(if SIDE { cmp.is_lt() } else { cmp.is_le() })
        };
        search_in_rows(
            input.order_keys,
            &target,
            compare_fn,
            search_start,
            partition.end,
        )
    }
}

/// Emits the whole partition once per row; the default when neither an
/// ORDER BY nor a frame clause constrains the window, and the framing of
/// ROW_NUMBER, NTILE and LAG/LEAD.
#[derive(Debug, Default)]
pub struct PartitionFramer {
    partition: Option<WindowInterval>,
    idx: usize,
    current: Option<WindowInterval>,
}

impl PartitionFramer {
    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.idx = partition.start;
        self.current = None;
    }

    fn next(&mut self, _input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.idx >= partition.end {
            return Ok(None);
        }
        self.idx += 1;
        self.current = Some(partition);
        Ok(Some(partition))
    }
}

/// Emits the partition exactly once, even when it is empty; the framing
/// of plain GROUP BY.
#[derive(Debug, Default)]
pub struct GroupByFramer {
    partition: Option<WindowInterval>,
    done: bool,
    current: Option<WindowInterval>,
}

impl GroupByFramer {
    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.done = false;
        self.current = None;
    }

    fn next(&mut self, _input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.done {
            return Ok(None);
        }
        self.done = true;
        self.current = Some(partition);
        Ok(Some(partition))
    }
}

/// Emits, for every row, the maximal run of rows whose ORDER BY tuple
/// ties with it; the framing of the rank family.
#[derive(Debug, Default)]
pub struct PeerGroupFramer {
    partition: Option<WindowInterval>,
    idx: usize,
    peer: WindowInterval,
    current: Option<WindowInterval>,
}

impl PeerGroupFramer {
    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.idx = partition.start;
        self.peer = WindowInterval::new(partition.start, partition.start);
        self.current = None;
    }

    fn next(&mut self, input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.idx >= partition.end {
            return Ok(None);
        }
        if self.idx >= self.peer.end {
            self.peer = peer_group_of(self.idx, partition, input)?;
        }
        self.idx += 1;
        self.current = Some(self.peer);
        Ok(Some(self.peer))
    }
}

/// Emits, for every row, the run from the partition start through the end
/// of the row's peer group: UNBOUNDED PRECEDING to CURRENT ROW, the
/// implicit frame when an ORDER BY exists without a frame clause.
#[derive(Debug, Default)]
pub struct CumulativeFramer {
    partition: Option<WindowInterval>,
    idx: usize,
    peer: WindowInterval,
    current: Option<WindowInterval>,
}

impl CumulativeFramer {
    fn start_partition(&mut self, partition: WindowInterval) {
        self.partition = Some(partition);
        self.idx = partition.start;
        self.peer = WindowInterval::new(partition.start, partition.start);
        self.current = None;
    }

    fn next(&mut self, input: &FramerInput) -> Result<Option<WindowInterval>> {
        let partition = self.partition.ok_or(WindrowError::PartitionNotSet)?;
        if self.idx >= partition.end {
            return Ok(None);
        }
        if self.idx >= self.peer.end {
            self.peer = peer_group_of(self.idx, partition, input)?;
        }
        self.idx += 1;
        let frame = WindowInterval::new(partition.start, self.peer.end);
        self.current = Some(frame);
        Ok(Some(frame))
    }
}

/// The maximal contiguous run within `partition` whose ORDER BY tuple
/// equals that of row `idx`. With no ORDER BY keys every row ties, so the
/// peer group is the whole partition.
fn peer_group_of(
    idx: usize,
    partition: WindowInterval,
    input: &FramerInput,
) -> Result<WindowInterval> {
    let key = input.order_keys.get(idx).ok_or_else(|| {
        WindrowError::Internal(format!("missing ORDER BY key for row {idx}"))
    })?;
    let mut end = idx + 1;
    while end < partition.end
        && compare_rows(&input.order_keys[end], key, input.sort_options)?.is_eq()
    {
        end += 1;
    }
    Ok(WindowInterval::new(idx, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn no_keys(n: usize) -> Vec<Vec<Value>> {
        vec![vec![]; n]
    }

    fn float_keys(vals: &[f64]) -> Vec<Vec<Value>> {
        vals.iter().map(|v| vec![Value::Float64(*v)]).collect()
    }

    fn drain(
        framer: &mut Framer,
        input: &FramerInput,
    ) -> Result<Vec<(usize, usize)>> {
        let mut out = vec![];
        while let Some(iv) = framer.next(input)? {
            out.push((iv.start, iv.end));
        }
        Ok(out)
    }

    #[test]
    fn interval_before_partition_is_an_error() {
        let framer = Framer::rows(RowsBound::UnboundedPreceding, RowsBound::CurrentRow);
        assert!(matches!(
            framer.interval(),
            Err(WindrowError::PartitionNotSet)
        ));
        let mut framer = Framer::partition();
        let keys = no_keys(3);
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &[],
        };
        assert!(framer.next(&input).is_err());
    }

    #[rstest]
    #[case::unbounded_to_current(
        RowsBound::UnboundedPreceding, RowsBound::CurrentRow,
        vec![(0, 1), (0, 2), (0, 3), (0, 4), (0, 5)]
    )]
    #[case::n_preceding_to_current(
        RowsBound::Preceding(2), RowsBound::CurrentRow,
        vec![(0, 1), (0, 2), (0, 3), (1, 4), (2, 5)]
    )]
    #[case::current_to_n_following(
        RowsBound::CurrentRow, RowsBound::Following(1),
        vec![(0, 2), (1, 3), (2, 4), (3, 5), (4, 5)]
    )]
    #[case::current_to_unbounded(
        RowsBound::CurrentRow, RowsBound::UnboundedFollowing,
        vec![(0, 5), (1, 5), (2, 5), (3, 5), (4, 5)]
    )]
    #[case::preceding_window(
        RowsBound::Preceding(2), RowsBound::Preceding(1),
        vec![(0, 0), (0, 1), (0, 2), (1, 3), (2, 4)]
    )]
    #[case::following_window(
        RowsBound::Following(1), RowsBound::Following(2),
        vec![(1, 3), (2, 4), (3, 5), (4, 5), (5, 5)]
    )]
    #[case::crossed_bounds_collapse(
        RowsBound::Following(1), RowsBound::Preceding(1),
        vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]
    )]
    fn rows_framer_bound_combinations(
        #[case] start: RowsBound,
        #[case] end: RowsBound,
        #[case] expected: Vec<(usize, usize)>,
    ) -> Result<()> {
        let keys = no_keys(5);
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &[],
        };
        let mut framer = Framer::rows(start, end);
        framer.start_partition(WindowInterval::new(0, 5))?;
        assert_eq!(drain(&mut framer, &input)?, expected);
        Ok(())
    }

    #[test]
    fn rows_framer_respects_partition_offset() -> Result<()> {
        let keys = no_keys(8);
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &[],
        };
        let mut framer =
            Framer::rows(RowsBound::Preceding(2), RowsBound::Following(2));
        framer.start_partition(WindowInterval::new(3, 7))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![(3, 6), (3, 7), (3, 7), (4, 7)]
        );
        Ok(())
    }

    #[test]
    fn range_framer_one_preceding_one_following() -> Result<()> {
        // Adapted teacher data: peers at 8.0 and 10.0 exercise ties.
        let keys = float_keys(&[5.0, 7.0, 8.0, 8.0, 9.0, 10.0, 10.0, 10.0, 11.0]);
        let options = [SortOptions::asc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer = Framer::range(
            RangeBound::Preceding(Value::Float64(1.0)),
            RangeBound::Following(Value::Float64(1.0)),
        );
        framer.start_partition(WindowInterval::new(0, 9))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![
                (0, 1),
                (1, 4),
                (1, 5),
                (1, 5),
                (2, 8),
                (4, 9),
                (4, 9),
                (4, 9),
                (5, 9)
            ]
        );
        Ok(())
    }

    #[test]
    fn range_framer_current_row_includes_peers() -> Result<()> {
        let keys = float_keys(&[1.0, 1.0, 2.0, 3.0]);
        let options = [SortOptions::asc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer =
            Framer::range(RangeBound::UnboundedPreceding, RangeBound::CurrentRow);
        framer.start_partition(WindowInterval::new(0, 4))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![(0, 2), (0, 2), (0, 3), (0, 4)]
        );
        Ok(())
    }

    #[test]
    fn range_framer_descending_flips_offset_arithmetic() -> Result<()> {
        let keys = float_keys(&[9.0, 7.0, 6.0, 2.0]);
        let options = [SortOptions::desc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer = Framer::range(
            RangeBound::Preceding(Value::Float64(2.0)),
            RangeBound::CurrentRow,
        );
        framer.start_partition(WindowInterval::new(0, 4))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![(0, 1), (0, 2), (1, 3), (3, 4)]
        );
        Ok(())
    }

    #[test]
    fn range_endpoints_are_monotonic() -> Result<()> {
        let keys = float_keys(&[1.0, 2.0, 2.0, 4.0, 7.0, 7.0, 9.0]);
        let options = [SortOptions::asc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer = Framer::range(
            RangeBound::Preceding(Value::Float64(2.0)),
            RangeBound::Following(Value::Float64(1.0)),
        );
        let partition = WindowInterval::new(0, 7);
        framer.start_partition(partition)?;
        let mut last = (0, 0);
        while let Some(iv) = framer.next(&input)? {
            assert!(iv.start >= last.0 && iv.end >= last.1);
            assert!(iv.within(&partition));
            last = (iv.start, iv.end);
        }
        Ok(())
    }

    #[test]
    fn peer_group_framer_groups_ties() -> Result<()> {
        let keys = float_keys(&[1.0, 1.0, 2.0, 3.0, 3.0]);
        let options = [SortOptions::asc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer = Framer::peer_group();
        framer.start_partition(WindowInterval::new(0, 5))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![(0, 2), (0, 2), (2, 3), (3, 5), (3, 5)]
        );
        assert_eq!(framer.interval()?, WindowInterval::new(3, 5));
        Ok(())
    }

    #[test]
    fn group_by_framer_emits_once_even_when_empty() -> Result<()> {
        let keys = no_keys(0);
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &[],
        };
        let mut framer = Framer::group_by();
        framer.start_partition(WindowInterval::new(0, 0))?;
        assert_eq!(framer.next(&input)?, Some(WindowInterval::new(0, 0)));
        assert_eq!(framer.next(&input)?, None);
        assert!(framer.one_per_partition());
        Ok(())
    }

    #[test]
    fn cumulative_framer_is_running_and_peer_inclusive() -> Result<()> {
        let keys = float_keys(&[1.0, 2.0, 2.0, 3.0]);
        let options = [SortOptions::asc()];
        let input = FramerInput {
            order_keys: &keys,
            sort_options: &options,
        };
        let mut framer = Framer::cumulative();
        framer.start_partition(WindowInterval::new(0, 4))?;
        assert_eq!(
            drain(&mut framer, &input)?,
            vec![(0, 1), (0, 3), (0, 3), (0, 4)]
        );
        Ok(())
    }
}
