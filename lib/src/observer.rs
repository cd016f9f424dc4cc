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

//! Progress reporting of a running diff.

#![allow(missing_docs)]

use std::fmt;

/// Stage of the diff pipeline.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DiffPhase {
    /// Matching of the common prefix and suffix.
    MatchEnds,
    /// Alignment of the rare lines.
    Lcs,
    /// Narrowing of small replaced regions.
    SmallEdits,
    /// All move detection passes.
    MoveDetection,
    /// Concatenation and validation of the final result.
    Assembly,
}

impl fmt::Display for DiffPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiffPhase::MatchEnds => "match-ends",
            DiffPhase::Lcs => "lcs",
            DiffPhase::SmallEdits => "small-edits",
            DiffPhase::MoveDetection => "move-detection",
            DiffPhase::Assembly => "assembly",
        };
        f.write_str(name)
    }
}

/// Statistics of a completed phase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhaseStats {
    pub phase: DiffPhase,
    /// Number of block pairs the phase produced.
    pub pairs: usize,
    /// Number of matched lines after the phase.
    pub matched_lines: usize,
}

/// Statistics of a completed move detection pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MovePassStats {
    /// 1-based pass number.
    pub pass: u32,
    pub new_matched_lines: usize,
    pub matched_lines: usize,
    pub ambiguous: bool,
}

/// Receives progress events from the diff driver, between phases.
pub trait DiffObserver {
    /// Called after each phase that ran.
    fn phase_completed(&mut self, _stats: &PhaseStats) {}

    /// Called after each move detection pass.
    fn move_pass_completed(&mut self, _stats: &MovePassStats) {}
}

/// Logs the events with `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl DiffObserver for TracingObserver {
    fn phase_completed(&mut self, stats: &PhaseStats) {
        tracing::debug!(
            phase = %stats.phase,
            pairs = stats.pairs,
            matched_lines = stats.matched_lines,
            "diff phase completed"
        );
    }

    fn move_pass_completed(&mut self, stats: &MovePassStats) {
        tracing::info!(
            pass = stats.pass,
            new_matched_lines = stats.new_matched_lines,
            ambiguous = stats.ambiguous,
            "found {} moved lines",
            stats.new_matched_lines
        );
    }
}
