// Copyright 2020 The Blockdiff Authors
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

//! Options controlling how a diff is computed.

use serde::Deserialize;

use crate::config::ConfigError;

/// Config table holding the [`DiffOptions`].
pub const DIFF_TABLE_KEY: &str = "diff";

/// Upper bound of every occurrence count option.
const MAX_OCCURRENCE_LIMIT: i64 = 255;

/// Knobs of the diff algorithm. Out-of-range values are clamped by the
/// accessors rather than rejected.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiffOptions {
    /// Match the common prefix and suffix before aligning the rest.
    pub match_ends: bool,
    /// Extend the common prefix and suffix with lines that are only equal
    /// after normalization.
    pub match_normalized_ends: bool,
    /// Align lines that are only equal after normalization.
    pub align_normalized_lines: bool,
    /// Align only rare lines, instead of all lines.
    pub align_rare_lines: bool,
    /// How many times a line may occur in the aligned range and still be
    /// rare.
    pub max_rare_line_occurrences_in_range: i64,
    /// Lines whose normalized form occurs more often than this in their file
    /// are never rare.
    pub max_rare_line_occurrences_in_file: i64,
    /// A pairing is only rare if it occurs equally often on both sides.
    pub require_same_rarity: bool,
    /// Detect blocks of lines that were moved.
    pub detect_block_moves: bool,
    /// Detect blocks of lines copied from anywhere in the old file. Not
    /// supported.
    pub detect_copies: bool,
    /// Weight of a normalized line match relative to an exact one, from 0
    /// to 1.
    pub lcs_normalized_similarity: f64,
    /// Weight line matches by their length.
    pub length_weighted_similarity: bool,
    /// Never align on lines like `}` or blank lines.
    pub omit_probably_common_lines: bool,
    /// Maximum number of move detection passes.
    pub max_move_detection_passes: i64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions {
            match_ends: true,
            match_normalized_ends: true,
            align_normalized_lines: true,
            align_rare_lines: true,
            max_rare_line_occurrences_in_range: 1,
            max_rare_line_occurrences_in_file: 3,
            require_same_rarity: true,
            detect_block_moves: true,
            detect_copies: false,
            lcs_normalized_similarity: 0.5,
            length_weighted_similarity: true,
            omit_probably_common_lines: true,
            max_move_detection_passes: 8,
        }
    }
}

impl DiffOptions {
    /// Reads the `[diff]` table of `config`. Missing keys take their default
    /// values.
    pub fn from_config(config: &config::Config) -> Result<Self, ConfigError> {
        let options = config
            .get::<DiffOptions>(DIFF_TABLE_KEY)
            .optional()?
            .unwrap_or_default();
        Ok(options)
    }

    /// Occurrence limit for rare lines within an aligned range, in
    /// `[1, 255]`.
    pub fn rare_occurrences_in_range(&self) -> u32 {
        clamp_count(self.max_rare_line_occurrences_in_range)
    }

    /// Occurrence limit for rare lines within a whole file, in `[1, 255]`.
    pub fn rare_occurrences_in_file(&self) -> u32 {
        clamp_count(self.max_rare_line_occurrences_in_file)
    }

    /// Normalized line similarity in `[0, 1]`.
    pub fn normalized_similarity(&self) -> f64 {
        if self.lcs_normalized_similarity.is_nan() {
            0.0
        } else {
            self.lcs_normalized_similarity.clamp(0.0, 1.0)
        }
    }

    /// Bound of the move detection loop, in `[1, 255]`.
    pub fn move_detection_passes(&self) -> u32 {
        clamp_count(self.max_move_detection_passes)
    }
}

fn clamp_count(value: i64) -> u32 {
    // The clamped value always fits.
    value.clamp(1, MAX_OCCURRENCE_LIMIT) as u32
}

/// Turns a missing config value into `None`.
pub trait ConfigResultExt<T> {
    /// Maps [`ConfigError::NotFound`] to `Ok(None)`.
    fn optional(self) -> Result<Option<T>, ConfigError>;
}

impl<T> ConfigResultExt<T> for Result<T, ConfigError> {
    fn optional(self) -> Result<Option<T>, ConfigError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
