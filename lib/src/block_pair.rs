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

//! The unit of diff output, and the checks every list of them must pass.

#![allow(missing_docs)]

use std::fmt;
use std::ops::Range;

use itertools::Itertools as _;
use serde::Serialize;
use thiserror::Error;

/// Correlates all fragments of one relocated block.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct MoveGroupId(pub u32);

impl fmt::Display for MoveGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How two lines were found to be equal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MatchKind {
    /// The raw line contents are equal.
    Exact,
    /// The lines are only equal after whitespace normalization.
    Normalized,
}

/// One of the two files being compared.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Side {
    /// The old file.
    A,
    /// The new file.
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// A run of lines in file A paired with a run of lines in file B.
///
/// A matched pair has the same length on both sides. An unmatched pair
/// describes lines that were removed (`a_length > 0`), added
/// (`b_length > 0`), or replaced (both).
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct BlockPair {
    /// First line in file A.
    pub a_index: usize,
    /// Number of lines in file A.
    pub a_length: usize,
    /// First line in file B.
    pub b_index: usize,
    /// Number of lines in file B.
    pub b_length: usize,
    /// The lines are exactly equal.
    pub is_match: bool,
    /// The lines are equal after normalization, but not exactly.
    pub is_normalized_match: bool,
    /// The lines were relocated rather than kept in order.
    pub is_move: bool,
    /// Relocated block this pair is part of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_id: Option<MoveGroupId>,
}

impl BlockPair {
    /// Pairs two runs of lines that have nothing in common.
    pub fn unmatched(a_range: Range<usize>, b_range: Range<usize>) -> Self {
        BlockPair {
            a_index: a_range.start,
            a_length: a_range.len(),
            b_index: b_range.start,
            b_length: b_range.len(),
            is_match: false,
            is_normalized_match: false,
            is_move: false,
            move_id: None,
        }
    }

    /// Pairs `length` equal lines starting at `a_index` and `b_index`.
    pub fn matched(a_index: usize, b_index: usize, length: usize, kind: MatchKind) -> Self {
        BlockPair {
            a_index,
            a_length: length,
            b_index,
            b_length: length,
            is_match: kind == MatchKind::Exact,
            is_normalized_match: kind == MatchKind::Normalized,
            is_move: false,
            move_id: None,
        }
    }

    /// Marks this pair as a fragment of the relocated block `id`.
    pub fn with_move(self, id: MoveGroupId) -> Self {
        BlockPair {
            is_move: true,
            move_id: Some(id),
            ..self
        }
    }

    pub fn a_range(&self) -> Range<usize> {
        self.a_index..self.a_beyond()
    }

    pub fn b_range(&self) -> Range<usize> {
        self.b_index..self.b_beyond()
    }

    /// Index one past the last A line.
    pub fn a_beyond(&self) -> usize {
        self.a_index + self.a_length
    }

    /// Index one past the last B line.
    pub fn b_beyond(&self) -> usize {
        self.b_index + self.b_length
    }

    pub fn match_kind(&self) -> Option<MatchKind> {
        if self.is_match {
            Some(MatchKind::Exact)
        } else if self.is_normalized_match {
            Some(MatchKind::Normalized)
        } else {
            None
        }
    }

    /// Whether the pair matches lines, exactly or after normalization.
    pub fn is_any_match(&self) -> bool {
        self.is_match || self.is_normalized_match
    }
}

/// Sorts pairs in file A order. Pairs without A lines sort before the pair
/// starting at the same A index, ordered by B index among themselves.
pub fn sort_by_a_index(pairs: &mut [BlockPair]) {
    pairs.sort_by_key(|pair| (pair.a_index, pair.a_length, pair.b_index, pair.b_length));
}

/// Sorts pairs in file B order.
pub fn sort_by_b_index(pairs: &mut [BlockPair]) {
    pairs.sort_by_key(|pair| (pair.b_index, pair.b_length, pair.a_index, pair.a_length));
}

/// Number of A lines covered by matched pairs.
pub fn count_matched_lines(pairs: &[BlockPair]) -> usize {
    pairs
        .iter()
        .filter(|pair| pair.is_any_match())
        .map(|pair| pair.a_length)
        .sum()
}

/// Groups consecutive one-line matches into runs of the same kind.
///
/// `matches` are `(a_index, b_index, kind)` triples in increasing order on
/// both sides.
pub fn runs_of_matches(
    matches: impl IntoIterator<Item = (usize, usize, MatchKind)>,
) -> Vec<BlockPair> {
    let mut pairs: Vec<BlockPair> = vec![];
    for (a_index, b_index, kind) in matches {
        match pairs.last_mut() {
            Some(last)
                if last.a_beyond() == a_index
                    && last.b_beyond() == b_index
                    && last.match_kind() == Some(kind) =>
            {
                last.a_length += 1;
                last.b_length += 1;
            }
            _ => pairs.push(BlockPair::matched(a_index, b_index, 1, kind)),
        }
    }
    pairs
}

/// Completes the order-preserving `anchors` into a tiling of `a_range` and
/// `b_range` by inserting one unmatched pair per non-empty gap.
pub fn tile_with_anchors(
    a_range: Range<usize>,
    b_range: Range<usize>,
    anchors: impl IntoIterator<Item = BlockPair>,
) -> Vec<BlockPair> {
    let mut pairs = vec![];
    let mut a_pos = a_range.start;
    let mut b_pos = b_range.start;
    for anchor in anchors {
        if a_pos < anchor.a_index || b_pos < anchor.b_index {
            pairs.push(BlockPair::unmatched(
                a_pos..anchor.a_index,
                b_pos..anchor.b_index,
            ));
        }
        a_pos = anchor.a_beyond();
        b_pos = anchor.b_beyond();
        pairs.push(anchor);
    }
    if a_pos < a_range.end || b_pos < b_range.end {
        pairs.push(BlockPair::unmatched(a_pos..a_range.end, b_pos..b_range.end));
    }
    pairs
}

/// Replaces every unmatched pair with the tiling `refine` computes for its
/// ranges. Matched pairs are kept as they are.
pub fn refine_unmatched(
    pairs: Vec<BlockPair>,
    mut refine: impl FnMut(Range<usize>, Range<usize>) -> Vec<BlockPair>,
) -> Vec<BlockPair> {
    pairs
        .into_iter()
        .flat_map(|pair| {
            if pair.is_any_match() {
                vec![pair]
            } else {
                refine(pair.a_range(), pair.b_range())
            }
        })
        .collect()
}

/// Broken structural guarantee of a list of [`BlockPair`]s.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("Block pair at A{a_index}/B{b_index} covers no lines")]
    EmptyBlockPair { a_index: usize, b_index: usize },
    #[error("Block pair at A{a_index}/B{b_index} is both an exact and a normalized match")]
    ConflictingMatchKinds { a_index: usize, b_index: usize },
    #[error("Matched block pair at A{a_index}/B{b_index} has different lengths on each side")]
    UnevenMatch { a_index: usize, b_index: usize },
    #[error("Lines {}..{} of {side} are not covered by any block pair", .range.start, .range.end)]
    Gap { side: Side, range: Range<usize> },
    #[error("Line {index} of {side} is covered by more than one block pair")]
    Overlap { side: Side, index: usize },
    #[error("Lines {}..{} of {side} are outside of the compared range", .range.start, .range.end)]
    OutOfRange { side: Side, range: Range<usize> },
    #[error("Move detection reduced the matched lines from {before} to {after}")]
    MatchedLinesDecreased { before: usize, after: usize },
}

/// Checks that each pair is well formed, and that the pairs exactly tile
/// `a_range` and `b_range`. Zero-length sides don't take part in the tiling.
pub fn check_tiling(
    pairs: &[BlockPair],
    a_range: Range<usize>,
    b_range: Range<usize>,
) -> Result<(), InvariantViolation> {
    for pair in pairs {
        check_block_pair(pair)?;
    }
    check_side(
        Side::A,
        pairs.iter().map(BlockPair::a_range).collect(),
        a_range,
    )?;
    check_side(
        Side::B,
        pairs.iter().map(BlockPair::b_range).collect(),
        b_range,
    )
}

fn check_block_pair(pair: &BlockPair) -> Result<(), InvariantViolation> {
    let (a_index, b_index) = (pair.a_index, pair.b_index);
    if pair.a_length == 0 && pair.b_length == 0 {
        Err(InvariantViolation::EmptyBlockPair { a_index, b_index })
    } else if pair.is_match && pair.is_normalized_match {
        Err(InvariantViolation::ConflictingMatchKinds { a_index, b_index })
    } else if pair.is_any_match() && pair.a_length != pair.b_length {
        Err(InvariantViolation::UnevenMatch { a_index, b_index })
    } else {
        Ok(())
    }
}

fn check_side(
    side: Side,
    ranges: Vec<Range<usize>>,
    expected: Range<usize>,
) -> Result<(), InvariantViolation> {
    let mut pos = expected.start;
    let sorted = ranges
        .into_iter()
        .filter(|range| !range.is_empty())
        .sorted_by_key(|range| range.start);
    for range in sorted {
        if range.start < expected.start || range.end > expected.end {
            return Err(InvariantViolation::OutOfRange { side, range });
        }
        if range.start < pos {
            return Err(InvariantViolation::Overlap {
                side,
                index: range.start,
            });
        }
        if range.start > pos {
            return Err(InvariantViolation::Gap {
                side,
                range: pos..range.start,
            });
        }
        pos = range.end;
    }
    if pos < expected.end {
        return Err(InvariantViolation::Gap {
            side,
            range: pos..expected.end,
        });
    }
    Ok(())
}
