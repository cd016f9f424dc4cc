// Copyright 2021 The Blockdiff Authors
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

//! Move-aware line diff of two files.
//!
//! The diff runs as a pipeline of phases over the lines of both files:
//!
//! 1. The common prefix and suffix are matched.
//! 2. The rest is aligned by a weighted LCS of its rare lines.
//! 3. Small replaced regions are narrowed with an LCS of all their lines.
//! 4. Blocks of lines moved elsewhere are detected, pass after pass.
//!
//! Each phase takes and returns a list of [`BlockPair`]s which tiles the lines
//! it works on, so the final result accounts for every line of both files
//! exactly once.

use thiserror::Error;
use tracing::instrument;

use crate::block_pair::check_tiling;
use crate::block_pair::count_matched_lines;
use crate::block_pair::sort_by_a_index;
use crate::block_pair::sort_by_b_index;
use crate::block_pair::BlockPair;
use crate::block_pair::InvariantViolation;
use crate::end_match::find_shared_ends;
use crate::end_match::RangeEquality;
use crate::file::File;
use crate::interval_tracker::IntervalTracker;
use crate::lcs::perform_lcs;
use crate::moves::detect_moves;
use crate::observer::DiffObserver;
use crate::observer::DiffPhase;
use crate::observer::MovePassStats;
use crate::observer::PhaseStats;
use crate::observer::TracingObserver;
use crate::range_pair::FilePair;
use crate::range_pair::RangePair;
use crate::rarity::SimilarityFactors;
use crate::small_edit::refine_small_edits;
use crate::settings::DiffOptions;

/// Capability which is defined but not implemented.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum UnsupportedFeature {
    /// The files are only equal after whitespace normalization.
    #[error("Files which only differ in whitespace can't be diffed yet")]
    NormalizedOnlyDifference,
    /// Copies from anywhere in the old file were requested.
    #[error("Copy detection isn't implemented")]
    CopyDetection,
}

/// Error that may occur when computing a diff.
#[derive(Debug, Error)]
pub enum DiffError {
    /// A phase produced an invalid result. This is a bug.
    #[error("Internal error in diff computation")]
    Internal(#[from] InvariantViolation),
    /// The inputs or options require an unimplemented capability.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),
}

/// Alignment of two files, as block pairs sorted by A index.
#[derive(Clone, Debug, Default)]
pub struct BlockDiff {
    pairs: Vec<BlockPair>,
    move_passes: u32,
    move_ambiguity_unresolved: bool,
}

impl BlockDiff {
    /// Diffs `a` against `b`, logging progress with `tracing`.
    pub fn compute(a: &File, b: &File, options: &DiffOptions) -> Result<Self, DiffError> {
        Self::compute_with_observer(a, b, options, &mut TracingObserver)
    }

    /// Diffs `a` against `b`, reporting progress to `observer`.
    #[instrument(skip_all, fields(a_lines = a.line_count(), b_lines = b.line_count()))]
    pub fn compute_with_observer(
        a: &File,
        b: &File,
        options: &DiffOptions,
        observer: &mut dyn DiffObserver,
    ) -> Result<Self, DiffError> {
        if options.detect_copies {
            return Err(UnsupportedFeature::CopyDetection.into());
        }
        if a.is_empty() || b.is_empty() {
            let pairs = if a.is_empty() && b.is_empty() {
                vec![]
            } else {
                vec![BlockPair::unmatched(a.full_range(), b.full_range())]
            };
            return Ok(Self::from_pairs(pairs));
        }
        if a.has_same_lines(b) {
            return Ok(Self::default());
        }

        let root = FilePair::new(a, b).full_range_pair();
        let mut prefix_pairs = vec![];
        let mut suffix_pairs = vec![];
        let mut middle = root.clone();
        if options.match_ends {
            let ends = find_shared_ends(&root, options);
            match ends.equality {
                RangeEquality::Equal => return Ok(Self::default()),
                RangeEquality::NormalizedEqual => {
                    return Err(UnsupportedFeature::NormalizedOnlyDifference.into());
                }
                RangeEquality::Different => {}
            }
            prefix_pairs = ends.prefix_pairs;
            suffix_pairs = ends.suffix_pairs;
            middle = ends.middle;
            let matched_lines =
                count_matched_lines(&prefix_pairs) + count_matched_lines(&suffix_pairs);
            observer.phase_completed(&PhaseStats {
                phase: DiffPhase::MatchEnds,
                pairs: prefix_pairs.len() + suffix_pairs.len(),
                matched_lines,
            });
        }

        let factors = SimilarityFactors::from_options(options);
        let pairs = perform_lcs(&middle, vec![], options, &factors);
        check_phase(&middle, &pairs, DiffPhase::Lcs, observer)?;
        let mut pairs = refine_small_edits(&middle, pairs, options, &factors);
        check_phase(&middle, &pairs, DiffPhase::SmallEdits, observer)?;

        let mut move_passes = 0;
        let mut move_ambiguity_unresolved = false;
        if options.detect_block_moves {
            let detection =
                detect_moves_until_converged(&middle, pairs, options, &factors, observer)?;
            pairs = detection.pairs;
            move_passes = detection.passes;
            move_ambiguity_unresolved = detection.ambiguity_unresolved;
            check_phase(&middle, &pairs, DiffPhase::MoveDetection, observer)?;
        }

        let mut all_pairs = prefix_pairs;
        all_pairs.extend(pairs);
        all_pairs.extend(suffix_pairs);
        sort_by_a_index(&mut all_pairs);
        check_phase(&root, &all_pairs, DiffPhase::Assembly, observer)?;
        Ok(BlockDiff {
            pairs: all_pairs,
            move_passes,
            move_ambiguity_unresolved,
        })
    }

    fn from_pairs(pairs: Vec<BlockPair>) -> Self {
        BlockDiff {
            pairs,
            ..Self::default()
        }
    }

    /// Block pairs sorted by A index. Empty if the files are equal.
    pub fn pairs(&self) -> &[BlockPair] {
        &self.pairs
    }

    /// Consumes the diff, returning the pairs sorted by A index.
    pub fn into_pairs(self) -> Vec<BlockPair> {
        self.pairs
    }

    /// Block pairs sorted by B index, for consumers treating file B as the
    /// primary one.
    pub fn pairs_by_b_index(&self) -> Vec<BlockPair> {
        let mut pairs = self.pairs.clone();
        sort_by_b_index(&mut pairs);
        pairs
    }

    /// Number of move detection passes which ran.
    pub fn move_passes(&self) -> u32 {
        self.move_passes
    }

    /// Whether move detection stopped while some block still had several
    /// equally good destinations. Such blocks are left unmatched.
    pub fn move_ambiguity_unresolved(&self) -> bool {
        self.move_ambiguity_unresolved
    }
}

/// Diffs `a` against `b`, returning the block pairs sorted by A index.
pub fn diff_files(a: &File, b: &File, options: &DiffOptions) -> Result<Vec<BlockPair>, DiffError> {
    Ok(BlockDiff::compute(a, b, options)?.into_pairs())
}

fn check_phase(
    range_pair: &RangePair,
    pairs: &[BlockPair],
    phase: DiffPhase,
    observer: &mut dyn DiffObserver,
) -> Result<(), InvariantViolation> {
    check_tiling(
        pairs,
        range_pair.a_range.clone(),
        range_pair.b_range.clone(),
    )?;
    observer.phase_completed(&PhaseStats {
        phase,
        pairs: pairs.len(),
        matched_lines: count_matched_lines(pairs),
    });
    Ok(())
}

struct MoveDetection {
    pairs: Vec<BlockPair>,
    passes: u32,
    ambiguity_unresolved: bool,
}

/// Runs move detection passes until one finds no new moves, or the pass
/// limit is reached.
fn detect_moves_until_converged(
    range_pair: &RangePair,
    mut pairs: Vec<BlockPair>,
    options: &DiffOptions,
    factors: &SimilarityFactors,
    observer: &mut dyn DiffObserver,
) -> Result<MoveDetection, InvariantViolation> {
    let mut tracker = IntervalTracker::new();
    let mut matched_lines = count_matched_lines(&pairs);
    let mut passes = 0;
    let mut ambiguous = false;
    let max_passes = options.move_detection_passes();
    for pass_number in 1..=max_passes {
        let pass = detect_moves(range_pair, pairs, options, factors, &mut tracker);
        let after = count_matched_lines(&pass.pairs);
        if after < matched_lines {
            return Err(InvariantViolation::MatchedLinesDecreased {
                before: matched_lines,
                after,
            });
        }
        check_tiling(
            &pass.pairs,
            range_pair.a_range.clone(),
            range_pair.b_range.clone(),
        )?;
        observer.move_pass_completed(&MovePassStats {
            pass: pass_number,
            new_matched_lines: pass.new_matched_lines,
            matched_lines: after,
            ambiguous: pass.ambiguous,
        });
        pairs = pass.pairs;
        matched_lines = after;
        passes = pass_number;
        ambiguous = pass.ambiguous;
        if pass.new_matched_lines == 0 {
            break;
        }
        if pass_number == max_passes {
            tracing::info!(max_passes, "move detection stopped before converging");
        }
    }
    Ok(MoveDetection {
        pairs,
        passes,
        ambiguity_unresolved: ambiguous,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::block_pair::MatchKind;
    use crate::block_pair::MoveGroupId;

    #[derive(Default)]
    struct RecordingObserver {
        phases: Vec<DiffPhase>,
        move_passes: Vec<MovePassStats>,
    }

    impl DiffObserver for RecordingObserver {
        fn phase_completed(&mut self, stats: &PhaseStats) {
            self.phases.push(stats.phase);
        }

        fn move_pass_completed(&mut self, stats: &MovePassStats) {
            self.move_passes.push(stats.clone());
        }
    }

    #[test]
    fn test_empty_files() {
        let empty = File::from_lines(Vec::<&str>::new());
        let three = File::from_lines(["a", "b", "c"]);
        let options = DiffOptions::default();
        assert_eq!(diff_files(&empty, &empty, &options).unwrap(), vec![]);
        assert_eq!(
            diff_files(&empty, &three, &options).unwrap(),
            vec![BlockPair::unmatched(0..0, 0..3)]
        );
        assert_eq!(
            diff_files(&three, &empty, &options).unwrap(),
            vec![BlockPair::unmatched(0..3, 0..0)]
        );
    }

    #[test]
    fn test_identical_files() {
        let a = File::from_lines(["a", "b", "c"]);
        let b = File::from_lines(["a", "b", "c"]);
        assert_eq!(diff_files(&a, &b, &DiffOptions::default()).unwrap(), vec![]);
        let options = DiffOptions {
            match_ends: false,
            ..DiffOptions::default()
        };
        assert_eq!(diff_files(&a, &b, &options).unwrap(), vec![]);
    }

    #[test]
    fn test_deleted_line() {
        let a = File::from_lines(["foo", "bar", "baz"]);
        let b = File::from_lines(["foo", "baz"]);
        let mut observer = RecordingObserver::default();
        let diff =
            BlockDiff::compute_with_observer(&a, &b, &DiffOptions::default(), &mut observer)
                .unwrap();
        assert_eq!(
            diff.pairs(),
            [
                BlockPair::matched(0, 0, 1, MatchKind::Exact),
                BlockPair::unmatched(1..2, 1..1),
                BlockPair::matched(2, 1, 1, MatchKind::Exact),
            ]
        );
        assert_eq!(
            observer.phases,
            vec![
                DiffPhase::MatchEnds,
                DiffPhase::Lcs,
                DiffPhase::SmallEdits,
                DiffPhase::MoveDetection,
                DiffPhase::Assembly,
            ]
        );
        assert_eq!(observer.move_passes.len(), 1);
        assert_eq!(diff.move_passes(), 1);
    }

    #[test]
    fn test_normalized_only_difference_is_unsupported() {
        let a = File::from_lines(["a", "  b"]);
        let b = File::from_lines(["a", "b"]);
        assert_matches!(
            diff_files(&a, &b, &DiffOptions::default()),
            Err(DiffError::Unsupported(
                UnsupportedFeature::NormalizedOnlyDifference
            ))
        );
    }

    #[test]
    fn test_copy_detection_is_unsupported() {
        let a = File::from_lines(["a"]);
        let options = DiffOptions {
            detect_copies: true,
            ..DiffOptions::default()
        };
        assert_matches!(
            diff_files(&a, &a, &options),
            Err(DiffError::Unsupported(UnsupportedFeature::CopyDetection))
        );
    }

    #[test]
    fn test_moved_block() {
        let a = File::from_lines(["x", "moved1", "moved2", "y"]);
        let b = File::from_lines(["moved1", "moved2", "x", "y"]);
        let diff = BlockDiff::compute(&a, &b, &DiffOptions::default()).unwrap();
        assert_eq!(
            diff.pairs(),
            [
                BlockPair::matched(0, 2, 1, MatchKind::Exact).with_move(MoveGroupId(0)),
                BlockPair::matched(1, 0, 1, MatchKind::Exact),
                BlockPair::matched(2, 1, 1, MatchKind::Exact),
                BlockPair::matched(3, 3, 1, MatchKind::Exact),
            ]
        );
        assert_eq!(diff.move_passes(), 2);
        assert!(!diff.move_ambiguity_unresolved());
        assert_eq!(
            diff.pairs_by_b_index()
                .iter()
                .map(|pair| pair.b_index)
                .collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_without_move_detection() {
        let a = File::from_lines(["x", "moved1", "moved2", "y"]);
        let b = File::from_lines(["moved1", "moved2", "x", "y"]);
        let options = DiffOptions {
            detect_block_moves: false,
            ..DiffOptions::default()
        };
        let diff = BlockDiff::compute(&a, &b, &options).unwrap();
        assert!(diff.pairs().iter().all(|pair| !pair.is_move));
        assert_eq!(diff.move_passes(), 0);
    }

    #[test]
    fn test_pass_limit() {
        let a = File::from_lines(["x", "moved1", "moved2", "y"]);
        let b = File::from_lines(["moved1", "moved2", "x", "y"]);
        let options = DiffOptions {
            max_move_detection_passes: 1,
            ..DiffOptions::default()
        };
        let diff = BlockDiff::compute(&a, &b, &options).unwrap();
        assert_eq!(diff.move_passes(), 1);
        assert!(diff.pairs()[0].is_move);
    }

    #[test]
    fn test_unresolved_ambiguity_is_reported() {
        // The long lines outweigh `block` in the alignment, which leaves two
        // equally good destinations for it.
        let a = File::from_lines(["block", "first long line", "second long line"]);
        let b = File::from_lines(["first long line", "block", "second long line", "block"]);
        let options = DiffOptions {
            max_rare_line_occurrences_in_range: 2,
            require_same_rarity: false,
            ..DiffOptions::default()
        };
        let mut observer = RecordingObserver::default();
        let diff = BlockDiff::compute_with_observer(&a, &b, &options, &mut observer).unwrap();
        assert!(diff.move_ambiguity_unresolved());
        assert!(diff.pairs().iter().all(|pair| !pair.is_move));
        assert_eq!(
            observer.move_passes,
            vec![MovePassStats {
                pass: 1,
                new_matched_lines: 0,
                matched_lines: 2,
                ambiguous: true,
            }]
        );
    }
}
