// Copyright 2024 The Blockdiff Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Disjoint line intervals of file B claimed by relocated blocks.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::block_pair::MoveGroupId;

/// Set of disjoint intervals, each owned by one move group.
///
/// Overlapping or adjacent intervals of the same group are merged when
/// claimed. Intervals of different groups never overlap.
#[derive(Clone, Debug, Default)]
pub struct IntervalTracker {
    // start -> (end, owner)
    intervals: BTreeMap<usize, (usize, MoveGroupId)>,
}

impl IntervalTracker {
    /// Creates a tracker without claimed intervals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `range` for `group`. Returns false, leaving the tracker
    /// unchanged, if part of the range is owned by another group.
    pub fn claim(&mut self, range: Range<usize>, group: MoveGroupId) -> bool {
        if range.is_empty() {
            return true;
        }
        if self.overlaps_other_group(range.clone(), group) {
            return false;
        }
        let mut merged = range;
        // Intervals are disjoint, so their ends increase with their starts.
        let touching: Vec<usize> = self
            .intervals
            .range(..=merged.end)
            .rev()
            .take_while(|(_, (end, _))| *end >= merged.start)
            .filter(|(_, (_, owner))| *owner == group)
            .map(|(start, _)| *start)
            .collect();
        for start in touching {
            if let Some((end, _)) = self.intervals.remove(&start) {
                merged = merged.start.min(start)..merged.end.max(end);
            }
        }
        self.intervals.insert(merged.start, (merged.end, group));
        true
    }

    /// Group owning line `index`, if any.
    pub fn owner_of(&self, index: usize) -> Option<MoveGroupId> {
        let (_, (end, owner)) = self.intervals.range(..=index).next_back()?;
        (index < *end).then_some(*owner)
    }

    /// Whether line `index` has been claimed by any group.
    pub fn is_claimed(&self, index: usize) -> bool {
        self.owner_of(index).is_some()
    }

    /// Whether any line of `range` has been claimed.
    pub fn overlaps_any(&self, range: Range<usize>) -> bool {
        self.overlapping(range).next().is_some()
    }

    /// Whether any line of `range` is owned by a group other than `group`.
    pub fn overlaps_other_group(&self, range: Range<usize>, group: MoveGroupId) -> bool {
        self.overlapping(range).any(|(_, owner)| owner != group)
    }

    /// Claimed intervals in increasing order.
    pub fn intervals(&self) -> impl Iterator<Item = (Range<usize>, MoveGroupId)> + '_ {
        self.intervals
            .iter()
            .map(|(start, (end, owner))| (*start..*end, *owner))
    }

    fn overlapping(
        &self,
        range: Range<usize>,
    ) -> impl Iterator<Item = (Range<usize>, MoveGroupId)> + '_ {
        let start = range.start;
        // An empty range overlaps nothing.
        let end = if range.is_empty() { 0 } else { range.end };
        self.intervals
            .range(..end)
            .rev()
            .take_while(move |(_, (interval_end, _))| *interval_end > start)
            .map(|(interval_start, (interval_end, owner))| (*interval_start..*interval_end, *owner))
    }
}
