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

use std::io;
use std::io::Write as _;
use std::path::PathBuf;

use blockdiff_lib::block_pair::sort_by_a_index;
use blockdiff_lib::block_pair::sort_by_b_index;
use blockdiff_lib::block_pair::BlockPair;
use blockdiff_lib::block_pair::MatchKind;
use blockdiff_lib::config::ConfigError;
use blockdiff_lib::config::ConfigLayer;
use blockdiff_lib::config::ConfigSource;
use blockdiff_lib::config::ConfigValue;
use blockdiff_lib::diff::BlockDiff;
use blockdiff_lib::file::File;
use blockdiff_lib::settings::DiffOptions;
use clap::CommandFactory as _;
use serde::Serialize;
use tracing::instrument;

use crate::command_error::CommandError;
use crate::side_by_side::status_char;
use crate::side_by_side::write_side_by_side;
use crate::side_by_side::PrimaryFile;
use crate::side_by_side::SideBySideSettings;
use crate::ui::ColorChoice;
use crate::ui::Ui;

/// Compare two files line by line, recognizing blocks of moved lines
///
/// Options are read from `[diff]` and `[side-by-side]` tables of the config
/// file, and can be overridden by the flags below.
#[derive(clap::Parser, Clone, Debug)]
#[command(name = "blockdiff", max_term_width = 100)]
pub struct Args {
    /// The old file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub left: PathBuf,
    /// The new file
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub right: PathBuf,
    #[command(flatten)]
    pub diff_options: DiffOptionArgs,
    #[command(flatten)]
    pub format_args: FormatArgs,
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

/// Flags overriding the `[diff]` config table. Unset flags keep the
/// configured value.
#[derive(clap::Args, Clone, Debug, Default)]
#[command(next_help_heading = "Diff Options")]
pub struct DiffOptionArgs {
    /// Match the common prefix and suffix first
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub match_ends: Option<bool>,
    /// Extend the common prefix and suffix with reindented lines
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub match_normalized_ends: Option<bool>,
    /// Align lines which only differ in whitespace
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub align_normalized_lines: Option<bool>,
    /// Align only the rare lines
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub align_rare_lines: Option<bool>,
    /// How often a line may occur in the aligned range and still be rare
    #[arg(long, value_name = "N")]
    pub max_rare_line_occurrences_in_range: Option<i64>,
    /// How often a line may occur in its file and still be rare
    #[arg(long, value_name = "N")]
    pub max_rare_line_occurrences_in_file: Option<i64>,
    /// Only treat lines as rare if they occur equally often in both files
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub require_same_rarity: Option<bool>,
    /// Detect blocks of moved lines
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_block_moves: Option<bool>,
    /// Detect copied blocks (not supported)
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_copies: Option<bool>,
    /// Weight of a reindented line relative to an unchanged one, 0 to 1
    #[arg(long, value_name = "FLOAT")]
    pub lcs_normalized_similarity: Option<f64>,
    /// Weight lines by their length
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub length_weighted_similarity: Option<bool>,
    /// Never align on blank lines or lines like `}`
    #[arg(long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub omit_probably_common_lines: Option<bool>,
    /// Maximum number of move detection passes, 1 to 255
    #[arg(long, value_name = "N")]
    pub max_move_detection_passes: Option<i64>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// Both files next to each other
    #[default]
    SideBySide,
    /// The block pairs as a JSON document
    Json,
    /// One block pair per line
    Pairs,
}

#[derive(clap::Args, Clone, Debug, Default)]
#[command(next_help_heading = "Output Options")]
pub struct FormatArgs {
    /// How to print the diff
    #[arg(long, value_enum, default_value_t)]
    pub output: OutputFormat,
    /// The file whose lines are shown in order
    #[arg(long, value_enum)]
    pub primary: Option<PrimaryFile>,
    /// Width of the side-by-side output [default: terminal width]
    #[arg(long, value_name = "N")]
    pub columns: Option<usize>,
    /// Don't show line numbers
    #[arg(long)]
    pub no_line_numbers: bool,
    /// Truncate long lines instead of wrapping them
    #[arg(long)]
    pub truncate: bool,
    /// Number of columns between tab stops
    #[arg(long, value_name = "N")]
    pub tab_width: Option<usize>,
}

#[derive(clap::Args, Clone, Debug, Default)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// When to colorize diagnostics (always, never, auto)
    #[arg(long, value_name = "WHEN")]
    pub color: Option<ColorChoice>,
    /// Additional configuration options (can be repeated)
    #[arg(long, value_name = "TOML")]
    pub config_toml: Vec<String>,
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Config layer holding the values of the flags that were given.
    pub fn to_config_layer(&self) -> Result<ConfigLayer, ConfigError> {
        let DiffOptionArgs {
            match_ends,
            match_normalized_ends,
            align_normalized_lines,
            align_rare_lines,
            max_rare_line_occurrences_in_range,
            max_rare_line_occurrences_in_file,
            require_same_rarity,
            detect_block_moves,
            detect_copies,
            lcs_normalized_similarity,
            length_weighted_similarity,
            omit_probably_common_lines,
            max_move_detection_passes,
        } = &self.diff_options;
        let flag = |name: &'static str, value: Option<ConfigValue>| value.map(|v| (name, v));
        let count = |value: Option<usize>| {
            value.map(|n| ConfigValue::from(i64::try_from(n).unwrap_or(i64::MAX)))
        };
        let format_args = &self.format_args;
        let values = [
            flag("diff.match-ends", match_ends.map(Into::into)),
            flag("diff.match-normalized-ends", match_normalized_ends.map(Into::into)),
            flag("diff.align-normalized-lines", align_normalized_lines.map(Into::into)),
            flag("diff.align-rare-lines", align_rare_lines.map(Into::into)),
            flag(
                "diff.max-rare-line-occurrences-in-range",
                max_rare_line_occurrences_in_range.map(Into::into),
            ),
            flag(
                "diff.max-rare-line-occurrences-in-file",
                max_rare_line_occurrences_in_file.map(Into::into),
            ),
            flag("diff.require-same-rarity", require_same_rarity.map(Into::into)),
            flag("diff.detect-block-moves", detect_block_moves.map(Into::into)),
            flag("diff.detect-copies", detect_copies.map(Into::into)),
            flag(
                "diff.lcs-normalized-similarity",
                lcs_normalized_similarity.map(Into::into),
            ),
            flag(
                "diff.length-weighted-similarity",
                length_weighted_similarity.map(Into::into),
            ),
            flag(
                "diff.omit-probably-common-lines",
                omit_probably_common_lines.map(Into::into),
            ),
            flag(
                "diff.max-move-detection-passes",
                max_move_detection_passes.map(Into::into),
            ),
            flag(
                "side-by-side.primary",
                format_args.primary.map(|primary| match primary {
                    PrimaryFile::A => "a".into(),
                    PrimaryFile::B => "b".into(),
                }),
            ),
            flag("side-by-side.columns", count(format_args.columns)),
            flag("side-by-side.tab-width", count(format_args.tab_width)),
            flag(
                "side-by-side.line-numbers",
                format_args.no_line_numbers.then(|| false.into()),
            ),
            flag("side-by-side.wrap", format_args.truncate.then(|| false.into())),
            flag(
                "ui.color",
                self.global_args
                    .color
                    .map(|choice| choice.to_string().into()),
            ),
        ];
        ConfigLayer::from_values(ConfigSource::CommandArg, values.into_iter().flatten())
    }
}

pub fn default_app() -> clap::Command {
    Args::command()
}

#[derive(Serialize)]
struct JsonDiff<'a> {
    pairs: &'a [BlockPair],
    move_passes: u32,
    move_ambiguity_unresolved: bool,
}

fn write_pairs(out: &mut dyn io::Write, pairs: &[BlockPair]) -> io::Result<()> {
    for pair in pairs {
        write!(
            out,
            "{} A{}+{} B{}+{}",
            status_char(pair),
            pair.a_index,
            pair.a_length,
            pair.b_index,
            pair.b_length
        )?;
        if let Some(id) = pair.move_id {
            write!(out, " {id}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[instrument(skip_all)]
pub(crate) fn cmd_diff(ui: &Ui, config: &config::Config, args: &Args) -> Result<(), CommandError> {
    let options = DiffOptions::from_config(config)?;
    let settings = SideBySideSettings::from_config(config)?;
    let a = File::load(&args.left)?;
    let b = File::load(&args.right)?;
    let diff = BlockDiff::compute(&a, &b, &options)?;
    if diff.move_ambiguity_unresolved() {
        writeln!(
            ui.warning_default(),
            "Move detection stopped with ambiguous blocks after pass {}",
            diff.move_passes()
        )?;
    }

    let mut pairs = diff.pairs().to_vec();
    if pairs.is_empty() && !a.is_empty() {
        // Identical files. Show them as one matched block.
        pairs.push(BlockPair::matched(0, 0, a.line_count(), MatchKind::Exact));
    }
    match settings.primary {
        PrimaryFile::A => sort_by_a_index(&mut pairs),
        PrimaryFile::B => sort_by_b_index(&mut pairs),
    }

    let mut out = io::BufWriter::new(ui.stdout());
    match args.format_args.output {
        OutputFormat::SideBySide => {
            let columns = settings.columns.unwrap_or_else(|| ui.term_width());
            write_side_by_side(&mut out, &a, &b, &pairs, &settings, columns)?;
        }
        OutputFormat::Json => {
            let json = JsonDiff {
                pairs: &pairs,
                move_passes: diff.move_passes(),
                move_ambiguity_unresolved: diff.move_ambiguity_unresolved(),
            };
            serde_json::to_writer_pretty(&mut out, &json).map_err(io::Error::from)?;
            writeln!(out)?;
        }
        OutputFormat::Pairs => write_pairs(&mut out, &pairs)?,
    }
    out.flush()?;
    Ok(())
}
