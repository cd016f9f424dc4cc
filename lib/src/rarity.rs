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

//! Line rarity and the weights of candidate line pairings.
//!
//! Lines which occur only a few times in the range being aligned are good
//! alignment anchors. Pairings of such "rare" lines get the full weight,
//! others a reduced (possibly zero) one.

use std::collections::HashMap;

use crate::block_pair::MatchKind;
use crate::file::Line;
use crate::file::LineHash;
use crate::range_pair::RangePair;
use crate::settings::DiffOptions;

/// Weights of the four kinds of line pairings, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityFactors {
    /// Lines whose normalized form occurs more often than this in their file
    /// are never rare.
    pub max_rare_occurrences: u32,
    /// Rare lines, exactly equal.
    pub exact_rare: f64,
    /// Rare lines, equal after normalization.
    pub normalized_rare: f64,
    /// Other lines, exactly equal.
    pub exact_non_rare: f64,
    /// Other lines, equal after normalization.
    pub normalized_non_rare: f64,
}

impl SimilarityFactors {
    /// Derives the weights from the options.
    pub fn from_options(options: &DiffOptions) -> Self {
        let similarity = options.normalized_similarity();
        let half_delta = (1.0 - similarity) / 2.0;
        let mut factors = SimilarityFactors {
            max_rare_occurrences: options.rare_occurrences_in_file(),
            exact_rare: 1.0,
            normalized_rare: similarity,
            exact_non_rare: 1.0 - half_delta,
            normalized_non_rare: (similarity - half_delta).max(0.0),
        };
        if !options.align_normalized_lines {
            factors.normalized_rare = 0.0;
            factors.normalized_non_rare = 0.0;
        }
        if options.align_rare_lines {
            factors.exact_non_rare = 0.0;
            factors.normalized_non_rare = 0.0;
        }
        factors
    }

    /// Weight of a pairing of the given kind and rarity.
    pub fn weight(&self, kind: MatchKind, rare: bool) -> f64 {
        match (kind, rare) {
            (MatchKind::Exact, true) => self.exact_rare,
            (MatchKind::Normalized, true) => self.normalized_rare,
            (MatchKind::Exact, false) => self.exact_non_rare,
            (MatchKind::Normalized, false) => self.normalized_non_rare,
        }
    }
}

#[derive(Debug, Default)]
struct HashCounts {
    exact: HashMap<LineHash, u32>,
    normalized: HashMap<LineHash, u32>,
}

impl HashCounts {
    fn count<'a>(lines: impl IntoIterator<Item = &'a Line>) -> Self {
        let mut counts = HashCounts::default();
        for line in lines {
            *counts.exact.entry(line.hash()).or_insert(0) += 1;
            *counts.normalized.entry(line.normalized_hash()).or_insert(0) += 1;
        }
        counts
    }

    fn get(&self, kind: MatchKind, line: &Line) -> u32 {
        let found = match kind {
            MatchKind::Exact => self.exact.get(&line.hash()),
            MatchKind::Normalized => self.normalized.get(&line.normalized_hash()),
        };
        found.copied().unwrap_or(0)
    }
}

/// Occurrence counts of the lines of one [`RangePair`].
#[derive(Debug)]
pub struct RarityIndex<'a> {
    range_pair: RangePair<'a>,
    a_counts: HashCounts,
    b_counts: HashCounts,
    max_in_range: u32,
    max_in_file: u32,
    require_same_rarity: bool,
}

impl<'a> RarityIndex<'a> {
    /// Counts the lines within `range_pair`.
    pub fn new(
        range_pair: &RangePair<'a>,
        options: &DiffOptions,
        factors: &SimilarityFactors,
    ) -> Self {
        let a_file = range_pair.a_file();
        let b_file = range_pair.b_file();
        RarityIndex {
            a_counts: HashCounts::count(&a_file.lines()[range_pair.a_range.clone()]),
            b_counts: HashCounts::count(&b_file.lines()[range_pair.b_range.clone()]),
            range_pair: range_pair.clone(),
            max_in_range: options.rare_occurrences_in_range(),
            max_in_file: factors.max_rare_occurrences,
            require_same_rarity: options.require_same_rarity,
        }
    }

    /// Whether pairing line `a_index` of file A with line `b_index` of file
    /// B, which are equal as described by `kind`, is a rare pairing.
    pub fn is_rare_pairing(&self, a_index: usize, b_index: usize, kind: MatchKind) -> bool {
        let a_line = self.range_pair.a_line(a_index);
        let b_line = self.range_pair.b_line(b_index);
        let a_count = self.a_counts.get(kind, a_line);
        let b_count = self.b_counts.get(kind, b_line);
        if a_count > self.max_in_range || b_count > self.max_in_range {
            return false;
        }
        if self.require_same_rarity && a_count != b_count {
            return false;
        }
        let a_in_file = self
            .range_pair
            .a_file()
            .normalized_occurrences(a_line.normalized_hash());
        let b_in_file = self
            .range_pair
            .b_file()
            .normalized_occurrences(b_line.normalized_hash());
        a_in_file <= self.max_in_file && b_in_file <= self.max_in_file
    }
}

/// Scores candidate line pairings within one [`RangePair`].
#[derive(Debug)]
pub struct LineScorer<'a> {
    range_pair: RangePair<'a>,
    factors: SimilarityFactors,
    // None if every pairing counts as rare.
    rarity: Option<RarityIndex<'a>>,
    length_weighted: bool,
    omit_probably_common: bool,
}

impl<'a> LineScorer<'a> {
    /// Scorer weighting pairings by their rarity within `range_pair`.
    pub fn for_rare_lines(
        range_pair: &RangePair<'a>,
        options: &DiffOptions,
        factors: &SimilarityFactors,
    ) -> Self {
        LineScorer {
            range_pair: range_pair.clone(),
            factors: *factors,
            rarity: Some(RarityIndex::new(range_pair, options, factors)),
            length_weighted: options.length_weighted_similarity,
            omit_probably_common: options.omit_probably_common_lines,
        }
    }

    /// Scorer treating every pairing as rare, including those of probably
    /// common lines.
    pub fn for_all_lines(
        range_pair: &RangePair<'a>,
        options: &DiffOptions,
        factors: &SimilarityFactors,
    ) -> Self {
        LineScorer {
            range_pair: range_pair.clone(),
            factors: *factors,
            rarity: None,
            length_weighted: options.length_weighted_similarity,
            omit_probably_common: false,
        }
    }

    /// Whether line `a_index` of file A is never a candidate.
    pub fn is_excluded_a_line(&self, a_index: usize) -> bool {
        self.omit_probably_common && self.range_pair.a_line(a_index).is_probably_common()
    }

    /// Scores pairing line `a_index` of file A with line `b_index` of file
    /// B. Returns `None` if the lines aren't a viable pairing.
    pub fn score(&self, a_index: usize, b_index: usize) -> Option<(MatchKind, f64)> {
        let a_line = self.range_pair.a_line(a_index);
        let b_line = self.range_pair.b_line(b_index);
        if a_line.normalized_hash() != b_line.normalized_hash() {
            return None;
        }
        if self.is_excluded_a_line(a_index) {
            return None;
        }
        let kind = if a_line.hash() == b_line.hash() {
            MatchKind::Exact
        } else {
            MatchKind::Normalized
        };
        let rare = self
            .rarity
            .as_ref()
            .map_or(true, |rarity| rarity.is_rare_pairing(a_index, b_index, kind));
        let mut weight = self.factors.weight(kind, rare);
        if weight <= 0.0 {
            return None;
        }
        if self.length_weighted {
            weight *= a_line.normalized_len().min(b_line.normalized_len()).max(1) as f64;
        }
        Some((kind, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::File;
    use crate::range_pair::FilePair;

    #[test]
    fn test_default_factors() {
        let factors = SimilarityFactors::from_options(&DiffOptions::default());
        assert_eq!(
            factors,
            SimilarityFactors {
                max_rare_occurrences: 3,
                exact_rare: 1.0,
                normalized_rare: 0.5,
                exact_non_rare: 0.0,
                normalized_non_rare: 0.0,
            }
        );
    }

    #[test]
    fn test_factors_for_all_lines() {
        let options = DiffOptions {
            align_rare_lines: false,
            lcs_normalized_similarity: 0.5,
            ..DiffOptions::default()
        };
        let factors = SimilarityFactors::from_options(&options);
        assert_eq!(factors.exact_non_rare, 0.75);
        assert_eq!(factors.normalized_non_rare, 0.25);

        let options = DiffOptions {
            align_rare_lines: false,
            align_normalized_lines: false,
            ..options
        };
        let factors = SimilarityFactors::from_options(&options);
        assert_eq!(factors.normalized_rare, 0.0);
        assert_eq!(factors.normalized_non_rare, 0.0);
        assert_eq!(factors.exact_non_rare, 0.75);
    }

    #[test]
    fn test_factors_clamp_similarity() {
        let with_similarity = |value| {
            SimilarityFactors::from_options(&DiffOptions {
                align_rare_lines: false,
                lcs_normalized_similarity: value,
                ..DiffOptions::default()
            })
        };
        assert_eq!(with_similarity(-1.0), with_similarity(0.0));
        assert_eq!(with_similarity(2.0), with_similarity(1.0));
        assert_eq!(with_similarity(0.0).normalized_non_rare, 0.0);
        assert_eq!(with_similarity(1.0).exact_non_rare, 1.0);
    }

    #[test]
    fn test_rarity_with_threshold_one() {
        let a = File::from_lines(["alpha", "beta", "beta", "gamma", "delta"]);
        let b = File::from_lines(["alpha", "beta", "gamma", "gamma", "delta"]);
        let range_pair = FilePair::new(&a, &b).full_range_pair();
        let options = DiffOptions::default();
        let factors = SimilarityFactors::from_options(&options);
        let rarity = RarityIndex::new(&range_pair, &options, &factors);
        assert!(rarity.is_rare_pairing(0, 0, MatchKind::Exact));
        assert!(!rarity.is_rare_pairing(1, 1, MatchKind::Exact));
        assert!(!rarity.is_rare_pairing(3, 2, MatchKind::Exact));
        assert!(rarity.is_rare_pairing(4, 4, MatchKind::Exact));

        // Same answers when asked again.
        let again = RarityIndex::new(&range_pair, &options, &factors);
        for (a_index, b_index) in [(0, 0), (1, 1), (3, 2), (4, 4)] {
            assert_eq!(
                rarity.is_rare_pairing(a_index, b_index, MatchKind::Exact),
                again.is_rare_pairing(a_index, b_index, MatchKind::Exact)
            );
        }
    }

    #[test]
    fn test_rarity_requires_same_count() {
        let a = File::from_lines(["x", "x", "y"]);
        let b = File::from_lines(["x", "y"]);
        let range_pair = FilePair::new(&a, &b).full_range_pair();
        let factors = SimilarityFactors::from_options(&DiffOptions::default());
        let strict = DiffOptions {
            max_rare_line_occurrences_in_range: 2,
            ..DiffOptions::default()
        };
        let relaxed = DiffOptions {
            require_same_rarity: false,
            ..strict.clone()
        };
        let rarity = RarityIndex::new(&range_pair, &strict, &factors);
        assert!(!rarity.is_rare_pairing(0, 0, MatchKind::Exact));
        assert!(rarity.is_rare_pairing(2, 1, MatchKind::Exact));
        let rarity = RarityIndex::new(&range_pair, &relaxed, &factors);
        assert!(rarity.is_rare_pairing(0, 0, MatchKind::Exact));
    }

    #[test]
    fn test_rarity_file_cap() {
        // "x" is unique within the range, but frequent in file A.
        let a = File::from_lines(["x", "x", "x", "x", "q", "x"]);
        let b = File::from_lines(["p", "x"]);
        let range_pair = FilePair::new(&a, &b).full_range_pair().sub_range(4..6, 0..2);
        let options = DiffOptions::default();
        let factors = SimilarityFactors::from_options(&options);
        let rarity = RarityIndex::new(&range_pair, &options, &factors);
        assert!(!rarity.is_rare_pairing(5, 1, MatchKind::Exact));
    }

    #[test]
    fn test_score() {
        let a = File::from_lines(["fn foo() {", "}", "  let x = 1;", "dup", "dup"]);
        let b = File::from_lines(["fn foo() {", "}", "let x = 1;", "dup", "other"]);
        let range_pair = FilePair::new(&a, &b).full_range_pair();
        let options = DiffOptions::default();
        let factors = SimilarityFactors::from_options(&options);
        let scorer = LineScorer::for_rare_lines(&range_pair, &options, &factors);
        assert_eq!(scorer.score(0, 0), Some((MatchKind::Exact, 10.0)));
        // Probably common.
        assert_eq!(scorer.score(1, 1), None);
        assert_eq!(scorer.score(2, 2), Some((MatchKind::Normalized, 5.0)));
        // Not rare, so zero weight.
        assert_eq!(scorer.score(3, 3), None);
        assert_eq!(scorer.score(0, 1), None);

        let scorer = LineScorer::for_all_lines(&range_pair, &options, &factors);
        assert_eq!(scorer.score(1, 1), Some((MatchKind::Exact, 1.0)));
        assert_eq!(scorer.score(3, 3), Some((MatchKind::Exact, 3.0)));

        let unweighted = DiffOptions {
            length_weighted_similarity: false,
            ..DiffOptions::default()
        };
        let scorer = LineScorer::for_rare_lines(&range_pair, &unweighted, &factors);
        assert_eq!(scorer.score(0, 0), Some((MatchKind::Exact, 1.0)));
        assert_eq!(scorer.score(2, 2), Some((MatchKind::Normalized, 0.5)));
    }
}
