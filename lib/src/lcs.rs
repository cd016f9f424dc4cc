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

//! Similarity-weighted longest common subsequence alignment.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

use itertools::Itertools as _;

use crate::block_pair::refine_unmatched;
use crate::block_pair::tile_with_anchors;
use crate::block_pair::BlockPair;
use crate::block_pair::MatchKind;
use crate::file::LineHash;
use crate::range_pair::RangePair;
use crate::rarity::LineScorer;
use crate::rarity::SimilarityFactors;
use crate::settings::DiffOptions;

/// A possible pairing of line `a` of file A with line `b` of file B.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// Line index in file A.
    pub a: usize,
    /// Line index in file B.
    pub b: usize,
    /// Whether the lines are exactly equal or only after normalization.
    pub kind: MatchKind,
    /// Weight of the pairing, always positive.
    pub score: f64,
}

/// Collects the viable pairings within `range_pair`, ordered by A index, then
/// by B index.
pub fn collect_candidates(range_pair: &RangePair, scorer: &LineScorer) -> Vec<Candidate> {
    let mut b_lines_by_hash: HashMap<LineHash, Vec<usize>> = HashMap::new();
    for b in range_pair.b_range.clone() {
        b_lines_by_hash
            .entry(range_pair.b_line(b).normalized_hash())
            .or_default()
            .push(b);
    }
    let mut candidates = vec![];
    for a in range_pair.a_range.clone() {
        if scorer.is_excluded_a_line(a) {
            continue;
        }
        let Some(b_lines) = b_lines_by_hash.get(&range_pair.a_line(a).normalized_hash()) else {
            continue;
        };
        for &b in b_lines {
            if let Some((kind, score)) = scorer.score(a, b) {
                candidates.push(Candidate { a, b, kind, score });
            }
        }
    }
    candidates
}

/// Best chain of candidates ending at `candidate`.
#[derive(Clone, Copy, Debug)]
struct ChainEnd {
    score: f64,
    candidate: usize,
}

impl ChainEnd {
    /// Higher score wins. Ties go to the earlier candidate.
    fn cmp_preference(&self, other: &ChainEnd) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.candidate.cmp(&self.candidate))
    }
}

fn preferred(left: Option<ChainEnd>, right: Option<ChainEnd>) -> Option<ChainEnd> {
    match (left, right) {
        (Some(l), Some(r)) => {
            if r.cmp_preference(&l) == Ordering::Greater {
                Some(r)
            } else {
                Some(l)
            }
        }
        (l, None) => l,
        (None, r) => r,
    }
}

/// Fenwick tree answering "best chain ending before position `n`".
struct PrefixMaxTree {
    nodes: Vec<Option<ChainEnd>>,
}

impl PrefixMaxTree {
    fn new(len: usize) -> Self {
        PrefixMaxTree {
            nodes: vec![None; len + 1],
        }
    }

    fn update(&mut self, pos: usize, value: ChainEnd) {
        let mut i = pos + 1;
        while i < self.nodes.len() {
            self.nodes[i] = preferred(self.nodes[i], Some(value));
            i += i & i.wrapping_neg();
        }
    }

    /// Best value among positions `0..end`.
    fn query(&self, end: usize) -> Option<ChainEnd> {
        let mut best = None;
        let mut i = end;
        while i > 0 {
            best = preferred(best, self.nodes[i]);
            i -= i & i.wrapping_neg();
        }
        best
    }
}

/// Finds the order-preserving subset of `candidates` with the highest total
/// score. `candidates` must be sorted by A index, then B index, with B
/// indices within `b_range`. Returns indices into `candidates` in increasing
/// order.
pub fn find_weighted_lcs(candidates: &[Candidate], b_range: Range<usize>) -> Vec<usize> {
    let mut tree = PrefixMaxTree::new(b_range.len());
    let mut predecessors: Vec<Option<usize>> = vec![None; candidates.len()];
    let mut best: Option<ChainEnd> = None;
    let mut start = 0;
    for (_, group) in &candidates.iter().chunk_by(|candidate| candidate.a) {
        // Candidates sharing an A line can't chain, so query them all before
        // recording any of them.
        let ends = group
            .enumerate()
            .map(|(offset, candidate)| {
                let index = start + offset;
                let previous = tree.query(candidate.b - b_range.start);
                predecessors[index] = previous.map(|end| end.candidate);
                ChainEnd {
                    score: previous.map_or(0.0, |end| end.score) + candidate.score,
                    candidate: index,
                }
            })
            .collect_vec();
        start += ends.len();
        for end in ends {
            tree.update(candidates[end.candidate].b - b_range.start, end);
            best = preferred(best, Some(end));
        }
    }

    let mut chain = vec![];
    let mut next = best.map(|end| end.candidate);
    while let Some(index) = next {
        chain.push(index);
        next = predecessors[index];
    }
    chain.reverse();
    chain
}

/// Finds anchor lines for `range_pair` with the weighted LCS of its rare
/// lines, recursing into the gaps between anchors. Rarity is recomputed for
/// each gap.
fn find_anchors(
    range_pair: &RangePair,
    options: &DiffOptions,
    factors: &SimilarityFactors,
    anchors: &mut Vec<(usize, usize, MatchKind)>,
) {
    if range_pair.a_range.is_empty() || range_pair.b_range.is_empty() {
        return;
    }
    let scorer = LineScorer::for_rare_lines(range_pair, options, factors);
    let candidates = collect_candidates(range_pair, &scorer);
    let lcs = find_weighted_lcs(&candidates, range_pair.b_range.clone());
    if lcs.is_empty() {
        return;
    }

    let mut a_pos = range_pair.a_range.start;
    let mut b_pos = range_pair.b_range.start;
    for index in lcs {
        let candidate = &candidates[index];
        let gap = range_pair.sub_range(a_pos..candidate.a, b_pos..candidate.b);
        find_anchors(&gap, options, factors, anchors);
        anchors.push((candidate.a, candidate.b, candidate.kind));
        a_pos = candidate.a + 1;
        b_pos = candidate.b + 1;
    }
    let gap = range_pair.sub_range(
        a_pos..range_pair.a_range.end,
        b_pos..range_pair.b_range.end,
    );
    find_anchors(&gap, options, factors, anchors);
}

/// Aligns `range_pair`, returning a tiling of it made of one-line matches
/// and unmatched gaps.
pub fn align_range(
    range_pair: &RangePair,
    options: &DiffOptions,
    factors: &SimilarityFactors,
) -> Vec<BlockPair> {
    let mut anchors = vec![];
    find_anchors(range_pair, options, factors, &mut anchors);
    tile_with_anchors(
        range_pair.a_range.clone(),
        range_pair.b_range.clone(),
        anchors
            .into_iter()
            .map(|(a, b, kind)| BlockPair::matched(a, b, 1, kind)),
    )
}

/// Runs the LCS alignment over each unmatched pair of `pairs`, which tile
/// `range_pair`. If `pairs` is empty, the whole range is aligned.
pub fn perform_lcs(
    range_pair: &RangePair,
    pairs: Vec<BlockPair>,
    options: &DiffOptions,
    factors: &SimilarityFactors,
) -> Vec<BlockPair> {
    if pairs.is_empty() {
        return align_range(range_pair, options, factors);
    }
    refine_unmatched(pairs, |a_range, b_range| {
        align_range(&range_pair.sub_range(a_range, b_range), options, factors)
    })
}
