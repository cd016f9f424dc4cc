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

//! Detection of blocks of lines that were moved.
//!
//! A pass looks at the lines left unmatched by the previous phases. Removed
//! lines of one unmatched pair are matched against added lines of another
//! unmatched pair. A match starts at a rare seed line and is extended in both
//! directions as far as the lines stay equal after normalization. When a seed
//! has several equally good candidates, the pass doesn't guess; it reports
//! the ambiguity, and a later pass may resolve it once other blocks have
//! claimed their lines.

use std::collections::HashMap;
use std::ops::Range;

use itertools::EitherOrBoth;
use itertools::Itertools as _;

use crate::block_pair::runs_of_matches;
use crate::block_pair::sort_by_a_index;
use crate::block_pair::BlockPair;
use crate::block_pair::MatchKind;
use crate::block_pair::MoveGroupId;
use crate::file::LineHash;
use crate::interval_tracker::IntervalTracker;
use crate::range_pair::RangePair;
use crate::rarity::LineScorer;
use crate::rarity::SimilarityFactors;
use crate::settings::DiffOptions;

/// Result of one move detection pass.
#[derive(Clone, Debug)]
pub struct MovePass {
    /// Tiling of the range pair, sorted by A index.
    pub pairs: Vec<BlockPair>,
    /// Number of lines matched by this pass.
    pub new_matched_lines: usize,
    /// Whether some seed had several equally good candidates.
    pub ambiguous: bool,
}

#[derive(Clone, Debug)]
struct MovedBlock {
    a_start: usize,
    b_start: usize,
    kinds: Vec<MatchKind>,
    score: f64,
    // Indices of the unmatched pairs the block was taken from.
    a_gap: usize,
    b_gap: usize,
}

impl MovedBlock {
    fn len(&self) -> usize {
        self.kinds.len()
    }

    fn a_range(&self) -> Range<usize> {
        self.a_start..self.a_start + self.len()
    }

    fn b_range(&self) -> Range<usize> {
        self.b_start..self.b_start + self.len()
    }
}

enum SeedOutcome {
    NoCandidate,
    Found(MovedBlock),
    // Several blocks with the same best score.
    Ambiguous,
}

struct BlockFinder<'a, 'b> {
    range_pair: &'b RangePair<'a>,
    pairs: &'b [BlockPair],
    seed_scorer: LineScorer<'a>,
    extension_scorer: LineScorer<'a>,
    // Unmatched B lines by normalized hash, with the index of their pair.
    b_lines_by_hash: HashMap<LineHash, Vec<(usize, usize)>>,
}

impl<'a, 'b> BlockFinder<'a, 'b> {
    fn new(
        range_pair: &'b RangePair<'a>,
        pairs: &'b [BlockPair],
        options: &DiffOptions,
        factors: &SimilarityFactors,
        tracker: &IntervalTracker,
    ) -> Self {
        let mut b_lines_by_hash: HashMap<LineHash, Vec<(usize, usize)>> = HashMap::new();
        for (index, pair) in pairs.iter().enumerate() {
            if pair.is_any_match() {
                continue;
            }
            for b in pair.b_range().filter(|b| !tracker.is_claimed(*b)) {
                b_lines_by_hash
                    .entry(range_pair.b_line(b).normalized_hash())
                    .or_default()
                    .push((b, index));
            }
        }
        BlockFinder {
            range_pair,
            pairs,
            seed_scorer: LineScorer::for_rare_lines(range_pair, options, factors),
            extension_scorer: LineScorer::for_all_lines(range_pair, options, factors),
            b_lines_by_hash,
        }
    }

    /// Grows the block seeded by pairing `a` with `b`, staying within
    /// `a_bounds` of pair `a_gap`, the B range of pair `b_gap`, and the
    /// unclaimed B lines.
    fn grow(
        &self,
        tracker: &IntervalTracker,
        (a, b): (usize, usize),
        (kind, score): (MatchKind, f64),
        a_bounds: Range<usize>,
        (a_gap, b_gap): (usize, usize),
    ) -> MovedBlock {
        let b_bounds = self.pairs[b_gap].b_range();
        let mut total = score;

        let mut before = vec![];
        let (mut a_start, mut b_start) = (a, b);
        while a_start > a_bounds.start
            && b_start > b_bounds.start
            && !tracker.is_claimed(b_start - 1)
        {
            let Some((kind, score)) = self.extension_scorer.score(a_start - 1, b_start - 1) else {
                break;
            };
            before.push(kind);
            total += score;
            a_start -= 1;
            b_start -= 1;
        }

        let mut kinds = before;
        kinds.reverse();
        kinds.push(kind);
        let (mut a_end, mut b_end) = (a + 1, b + 1);
        while a_end < a_bounds.end && b_end < b_bounds.end && !tracker.is_claimed(b_end) {
            let Some((kind, score)) = self.extension_scorer.score(a_end, b_end) else {
                break;
            };
            kinds.push(kind);
            total += score;
            a_end += 1;
            b_end += 1;
        }

        MovedBlock {
            a_start,
            b_start,
            kinds,
            score: total,
            a_gap,
            b_gap,
        }
    }

    /// Finds the best block seeded at line `a` of the unmatched pair
    /// `a_gap`.
    fn best_block(
        &self,
        tracker: &IntervalTracker,
        a: usize,
        a_bounds: Range<usize>,
        a_gap: usize,
    ) -> SeedOutcome {
        let Some(seeds) = self
            .b_lines_by_hash
            .get(&self.range_pair.a_line(a).normalized_hash())
        else {
            return SeedOutcome::NoCandidate;
        };
        let mut best: Option<MovedBlock> = None;
        let mut tied = false;
        for &(b, b_gap) in seeds {
            if b_gap == a_gap || tracker.is_claimed(b) {
                continue;
            }
            let Some(seed_score) = self.seed_scorer.score(a, b) else {
                continue;
            };
            let block = self.grow(
                tracker,
                (a, b),
                seed_score,
                a_bounds.clone(),
                (a_gap, b_gap),
            );
            match &best {
                Some(current) if block.score < current.score => {}
                Some(current) if block.score == current.score => tied = true,
                _ => {
                    best = Some(block);
                    tied = false;
                }
            }
        }
        match best {
            None => SeedOutcome::NoCandidate,
            Some(_) if tied => SeedOutcome::Ambiguous,
            Some(block) => SeedOutcome::Found(block),
        }
    }
}

/// Runs one move detection pass over `pairs`, which tile `range_pair`.
///
/// B lines claimed by moves are recorded in `tracker`, and never claimed
/// again by later passes.
pub fn detect_moves(
    range_pair: &RangePair,
    pairs: Vec<BlockPair>,
    options: &DiffOptions,
    factors: &SimilarityFactors,
    tracker: &mut IntervalTracker,
) -> MovePass {
    let finder = BlockFinder::new(range_pair, &pairs, options, factors, tracker);

    let mut next_group = pairs
        .iter()
        .filter_map(|pair| pair.move_id)
        .chain(tracker.intervals().map(|(_, group)| group))
        .map(|group| group.0 + 1)
        .max()
        .unwrap_or(0);
    let mut blocks: Vec<(MovedBlock, MoveGroupId)> = vec![];
    let mut ambiguous = false;
    for (a_gap, pair) in pairs.iter().enumerate() {
        if pair.is_any_match() {
            continue;
        }
        let a_end = pair.a_beyond();
        let mut floor = pair.a_index;
        let mut a = pair.a_index;
        // Last block found in this gap, which later fragments may extend.
        let mut previous: Option<(Range<usize>, usize, MoveGroupId)> = None;
        while a < a_end {
            let block = match finder.best_block(tracker, a, floor..a_end, a_gap) {
                SeedOutcome::Found(block) => block,
                SeedOutcome::NoCandidate => {
                    a += 1;
                    continue;
                }
                SeedOutcome::Ambiguous => {
                    ambiguous = true;
                    a += 1;
                    continue;
                }
            };
            let group = match &previous {
                Some((b_range, b_gap, group))
                    if *b_gap == block.b_gap && b_range.end <= block.b_start =>
                {
                    *group
                }
                _ => {
                    let group = MoveGroupId(next_group);
                    next_group += 1;
                    group
                }
            };
            if !tracker.claim(block.b_range(), group) {
                a += 1;
                continue;
            }
            a = block.a_range().end;
            floor = a;
            previous = Some((block.b_range(), block.b_gap, group));
            blocks.push((block, group));
        }
    }

    let new_matched_lines = blocks.iter().map(|(block, _)| block.len()).sum();
    let pairs = rebuild_pairs(pairs, &blocks);
    MovePass {
        pairs,
        new_matched_lines,
        ambiguous,
    }
}

/// Replaces the unmatched pairs with what remains of them after taking out
/// the moved blocks, and adds the moved blocks.
fn rebuild_pairs(pairs: Vec<BlockPair>, blocks: &[(MovedBlock, MoveGroupId)]) -> Vec<BlockPair> {
    let mut result = vec![];
    for (index, pair) in pairs.into_iter().enumerate() {
        if pair.is_any_match() {
            result.push(pair);
            continue;
        }
        let a_holes = blocks
            .iter()
            .filter(|(block, _)| block.a_gap == index)
            .map(|(block, _)| block.a_range())
            .collect_vec();
        let b_holes = blocks
            .iter()
            .filter(|(block, _)| block.b_gap == index)
            .map(|(block, _)| block.b_range())
            .collect_vec();
        let a_rest = subtract_ranges(pair.a_range(), a_holes);
        let b_rest = subtract_ranges(pair.b_range(), b_holes);
        let (a_end, b_end) = (pair.a_beyond(), pair.b_beyond());
        result.extend(
            a_rest
                .into_iter()
                .zip_longest(b_rest)
                .map(|segments| match segments {
                    EitherOrBoth::Both(a_range, b_range) => BlockPair::unmatched(a_range, b_range),
                    EitherOrBoth::Left(a_range) => BlockPair::unmatched(a_range, b_end..b_end),
                    EitherOrBoth::Right(b_range) => BlockPair::unmatched(a_end..a_end, b_range),
                }),
        );
    }
    for (block, group) in blocks {
        let matches = block
            .kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| (block.a_start + i, block.b_start + i, *kind));
        result.extend(
            runs_of_matches(matches)
                .into_iter()
                .map(|pair| pair.with_move(*group)),
        );
    }
    sort_by_a_index(&mut result);
    result
}

/// Parts of `range` not covered by any of the disjoint `holes`.
fn subtract_ranges(range: Range<usize>, mut holes: Vec<Range<usize>>) -> Vec<Range<usize>> {
    holes.sort_by_key(|hole| hole.start);
    let mut rest = vec![];
    let mut pos = range.start;
    for hole in holes {
        if pos < hole.start {
            rest.push(pos..hole.start);
        }
        pos = pos.max(hole.end);
    }
    if pos < range.end {
        rest.push(pos..range.end);
    }
    rest
}
