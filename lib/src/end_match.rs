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

//! Matching of the common prefix and suffix of two ranges.

use crate::block_pair::runs_of_matches;
use crate::block_pair::BlockPair;
use crate::block_pair::MatchKind;
use crate::range_pair::RangePair;
use crate::settings::DiffOptions;

/// How the two ranges compare as a whole.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeEquality {
    /// Some lines differ even after normalization.
    Different,
    /// All lines are exactly equal.
    Equal,
    /// All lines are equal after normalization, but some only then.
    NormalizedEqual,
}

/// Result of [`find_shared_ends()`].
#[derive(Clone, Debug)]
pub struct SharedEnds<'a> {
    /// Matched runs at the start of both ranges.
    pub prefix_pairs: Vec<BlockPair>,
    /// Matched runs at the end of both ranges.
    pub suffix_pairs: Vec<BlockPair>,
    /// What remains between the prefix and the suffix.
    pub middle: RangePair<'a>,
    /// Comparison of the whole ranges.
    pub equality: RangeEquality,
}

/// Finds the longest common prefix and suffix of the ranges, first by exact
/// equality, then extended by normalized equality if
/// `match-normalized-ends` is set. The prefix and the suffix never overlap.
pub fn find_shared_ends<'a>(range_pair: &RangePair<'a>, options: &DiffOptions) -> SharedEnds<'a> {
    let a_range = range_pair.a_range.clone();
    let b_range = range_pair.b_range.clone();
    let max_len = range_pair.a_len().min(range_pair.b_len());
    let kind_at = |a_index: usize, b_index: usize| {
        let a_line = range_pair.a_line(a_index);
        let b_line = range_pair.b_line(b_index);
        if a_line.hash() == b_line.hash() {
            Some(MatchKind::Exact)
        } else if options.match_normalized_ends
            && a_line.normalized_hash() == b_line.normalized_hash()
        {
            Some(MatchKind::Normalized)
        } else {
            None
        }
    };
    let prefix_kind = |i: usize| kind_at(a_range.start + i, b_range.start + i);
    let suffix_kind = |i: usize| kind_at(a_range.end - 1 - i, b_range.end - 1 - i);

    let mut prefix_kinds = vec![];
    while prefix_kinds.len() < max_len && prefix_kind(prefix_kinds.len()) == Some(MatchKind::Exact)
    {
        prefix_kinds.push(MatchKind::Exact);
    }
    let mut suffix_kinds = vec![];
    while prefix_kinds.len() + suffix_kinds.len() < max_len
        && suffix_kind(suffix_kinds.len()) == Some(MatchKind::Exact)
    {
        suffix_kinds.push(MatchKind::Exact);
    }
    if options.match_normalized_ends {
        while prefix_kinds.len() + suffix_kinds.len() < max_len {
            let Some(kind) = prefix_kind(prefix_kinds.len()) else {
                break;
            };
            prefix_kinds.push(kind);
        }
        while prefix_kinds.len() + suffix_kinds.len() < max_len {
            let Some(kind) = suffix_kind(suffix_kinds.len()) else {
                break;
            };
            suffix_kinds.push(kind);
        }
    }

    let prefix_len = prefix_kinds.len();
    let suffix_len = suffix_kinds.len();
    let prefix_pairs = runs_of_matches(
        prefix_kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| (a_range.start + i, b_range.start + i, *kind)),
    );
    let suffix_pairs = runs_of_matches(
        suffix_kinds
            .iter()
            .enumerate()
            .rev()
            .map(|(i, kind)| (a_range.end - 1 - i, b_range.end - 1 - i, *kind)),
    );
    let middle = range_pair.sub_range(
        a_range.start + prefix_len..a_range.end - suffix_len,
        b_range.start + prefix_len..b_range.end - suffix_len,
    );
    let equality = if !middle.is_empty() {
        RangeEquality::Different
    } else if prefix_kinds
        .iter()
        .chain(&suffix_kinds)
        .all(|kind| *kind == MatchKind::Exact)
    {
        RangeEquality::Equal
    } else {
        RangeEquality::NormalizedEqual
    };
    SharedEnds {
        prefix_pairs,
        suffix_pairs,
        middle,
        equality,
    }
}
