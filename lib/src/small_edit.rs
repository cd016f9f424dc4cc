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

//! Narrowing of small replaced regions.

use crate::block_pair::refine_unmatched;
use crate::block_pair::tile_with_anchors;
use crate::block_pair::BlockPair;
use crate::lcs::collect_candidates;
use crate::lcs::find_weighted_lcs;
use crate::range_pair::RangePair;
use crate::rarity::LineScorer;
use crate::rarity::SimilarityFactors;
use crate::settings::DiffOptions;

/// Unmatched regions with more lines than this on either side are left
/// alone.
pub const MAX_SMALL_EDIT_LINES: usize = 16;

/// Aligns every small unmatched pair of `pairs` using all of its lines, not
/// only the rare ones. Matched pairs are kept as they are.
pub fn refine_small_edits(
    range_pair: &RangePair,
    pairs: Vec<BlockPair>,
    options: &DiffOptions,
    factors: &SimilarityFactors,
) -> Vec<BlockPair> {
    refine_unmatched(pairs, |a_range, b_range| {
        let is_small = (1..=MAX_SMALL_EDIT_LINES).contains(&a_range.len())
            && (1..=MAX_SMALL_EDIT_LINES).contains(&b_range.len());
        if !is_small {
            return vec![BlockPair::unmatched(a_range, b_range)];
        }
        let gap = range_pair.sub_range(a_range.clone(), b_range.clone());
        let scorer = LineScorer::for_all_lines(&gap, options, factors);
        let candidates = collect_candidates(&gap, &scorer);
        let lcs = find_weighted_lcs(&candidates, b_range.clone());
        tile_with_anchors(
            a_range,
            b_range,
            lcs.into_iter().map(|index| {
                let candidate = &candidates[index];
                BlockPair::matched(candidate.a, candidate.b, 1, candidate.kind)
            }),
        )
    })
}
