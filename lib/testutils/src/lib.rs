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

use std::fs;
use std::path::Path;

use blockdiff_lib::block_pair::check_tiling;
use blockdiff_lib::block_pair::BlockPair;
use blockdiff_lib::block_pair::MatchKind;
use blockdiff_lib::config::ConfigLayer;
use blockdiff_lib::config::ConfigSource;
use blockdiff_lib::config::StackedConfig;
use blockdiff_lib::file::File;
use blockdiff_lib::settings::DiffOptions;
use itertools::Itertools as _;
use rand::seq::SliceRandom as _;
use rand::Rng as _;
use rand::SeedableRng as _;
use rand_chacha::ChaCha20Rng;
use tempfile::TempDir;

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("blockdiff-test-")
        .tempdir()
        .unwrap()
}

/// Builds a file from lines given without their terminating newlines.
pub fn file_from_lines(lines: &[&str]) -> File {
    File::from_lines(lines)
}

/// Parses `[diff]` options from a TOML snippet, such as
/// `"diff.detect-block-moves = false"`.
pub fn diff_options(text: &str) -> DiffOptions {
    let mut config = StackedConfig::empty();
    config.add_layer(ConfigLayer::parse(ConfigSource::User, text).unwrap());
    DiffOptions::from_config(&config.merge().unwrap()).unwrap()
}

/// Asserts that `pairs` tile both files, and returns them for chaining.
#[track_caller]
pub fn assert_tiling<'a>(pairs: &'a [BlockPair], a: &File, b: &File) -> &'a [BlockPair] {
    if let Err(err) = check_tiling(pairs, a.full_range(), b.full_range()) {
        panic!("{err}: {pairs:#?}");
    }
    pairs
}

/// Renders `pairs` one per line, in the compact form used by snapshots.
pub fn format_pairs(pairs: &[BlockPair]) -> String {
    pairs
        .iter()
        .map(|pair| {
            let kind = match pair.match_kind() {
                _ if pair.is_move && pair.is_normalized_match => "m",
                _ if pair.is_move => "M",
                Some(MatchKind::Normalized) => "~",
                Some(MatchKind::Exact) => "=",
                None => "!",
            };
            let group = pair
                .move_id
                .map(|id| format!(" {id}"))
                .unwrap_or_default();
            format!(
                "{kind} A{}+{} B{}+{}{group}",
                pair.a_index, pair.a_length, pair.b_index, pair.b_length
            )
        })
        .join("\n")
}

/// Generator of random file pairs with a reproducible sequence.
pub struct RandomFiles {
    rng: ChaCha20Rng,
}

impl RandomFiles {
    pub fn new(seed: u64) -> Self {
        RandomFiles {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Random lines drawn from a vocabulary of `vocabulary` distinct lines,
    /// some of them indented or blank.
    pub fn lines(&mut self, count: usize, vocabulary: usize) -> Vec<String> {
        (0..count)
            .map(|_| {
                let word = self.rng.gen_range(0..vocabulary.max(1));
                match self.rng.gen_range(0..10) {
                    0 => String::new(),
                    1 => "}".to_owned(),
                    2 => format!("    line {word}"),
                    _ => format!("line {word}"),
                }
            })
            .collect()
    }

    /// Copy of `lines` with some lines deleted, inserted, reindented, and
    /// one block moved elsewhere.
    pub fn edit(&mut self, lines: &[String]) -> Vec<String> {
        let mut edited: Vec<String> = vec![];
        for line in lines {
            match self.rng.gen_range(0..10) {
                0 => {}
                1 => {
                    edited.push(format!("inserted {}", self.rng.gen::<u16>()));
                    edited.push(line.clone());
                }
                2 => edited.push(format!("  {line}")),
                _ => edited.push(line.clone()),
            }
        }
        if edited.len() >= 4 {
            let start = self.rng.gen_range(0..edited.len() - 2);
            let len = self.rng.gen_range(1..=(edited.len() - start).min(5));
            let block = edited.drain(start..start + len).collect_vec();
            let target = self.rng.gen_range(0..=edited.len());
            edited.splice(target..target, block);
        }
        edited
    }

    /// A random file and an edited copy of it.
    pub fn file_pair(&mut self, count: usize, vocabulary: usize) -> (File, File) {
        let mut a_lines = self.lines(count, vocabulary);
        if self.rng.gen_bool(0.5) {
            a_lines.shuffle(&mut self.rng);
        }
        let b_lines = self.edit(&a_lines);
        (File::from_lines(&a_lines), File::from_lines(&b_lines))
    }
}

/// Asserts that every test module in `test_dir` is declared in `runner.rs`.
pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let runner_path = test_dir.join("runner.rs");
    let runner = fs::read_to_string(&runner_path).unwrap();
    for entry in fs::read_dir(test_dir).unwrap() {
        let path = entry.unwrap().path();
        let is_test_module = path.extension().is_some_and(|ext| ext == "rs")
            && path.file_stem().is_some_and(|name| name != "runner");
        if is_test_module {
            let name = path.file_stem().unwrap().to_str().unwrap();
            let search = format!("mod {name};");
            assert!(
                runner.contains(&search),
                "missing `{search}` declaration in {}",
                runner_path.display()
            );
        }
    }
}
