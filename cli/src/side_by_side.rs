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

//! Two-column rendering of a diff.
//!
//! Each row looks like `AAA aaaa C bbbb BBB`, where `AAA` and `BBB` are
//! 1-based line numbers and `C` is the status of the row:
//!
//! - `=` the lines are the same
//! - `~` the lines are the same after normalization
//! - `!` the lines are different
//! - `<` the line only exists in A
//! - `>` the line only exists in B
//! - `M` the line was moved
//! - `m` the line was moved and reindented
//!
//! The primary file's lines appear exactly once and in order. Lines of the
//! other file may appear out of order.

use std::cmp::max;
use std::io;
use std::io::Write;

use blockdiff_lib::block_pair::sort_by_a_index;
use blockdiff_lib::block_pair::sort_by_b_index;
use blockdiff_lib::block_pair::BlockPair;
use blockdiff_lib::config::ConfigError;
use blockdiff_lib::file::File;
use blockdiff_lib::settings::ConfigResultExt as _;
use serde::Deserialize;

const SIDE_BY_SIDE_TABLE_KEY: &str = "side-by-side";
const MIN_SIDE_WIDTH: usize = 10;
const CONTINUATION_MARK: &str = "\"";
const PLACEHOLDER: char = '░';

/// The file whose lines are shown in order.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryFile {
    A,
    #[default]
    B,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SideBySideSettings {
    /// Total width of a row. The terminal width if unset.
    pub columns: Option<usize>,
    pub line_numbers: bool,
    /// Wrap long lines onto continuation rows instead of truncating them.
    pub wrap: bool,
    pub tab_width: usize,
    pub primary: PrimaryFile,
}

impl Default for SideBySideSettings {
    fn default() -> Self {
        SideBySideSettings {
            columns: None,
            line_numbers: true,
            wrap: true,
            tab_width: 8,
            primary: PrimaryFile::B,
        }
    }
}

impl SideBySideSettings {
    pub fn from_config(config: &config::Config) -> Result<Self, ConfigError> {
        let settings = config
            .get::<SideBySideSettings>(SIDE_BY_SIDE_TABLE_KEY)
            .optional()?
            .unwrap_or_default();
        Ok(settings)
    }
}

/// Widths of the row fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Layout {
    a_digits: usize,
    b_digits: usize,
    side_width: usize,
}

impl Layout {
    fn new(a: &File, b: &File, settings: &SideBySideSettings, columns: usize) -> Self {
        // The status character and a space on either side of it.
        let mut available = columns.saturating_sub(3);
        let (a_digits, b_digits) = if settings.line_numbers {
            let a_digits = digit_count(max(2, a.line_count()));
            let b_digits = digit_count(max(2, b.line_count()));
            available = available.saturating_sub(a_digits + b_digits + 2);
            (a_digits, b_digits)
        } else {
            (0, 0)
        };
        Layout {
            a_digits,
            b_digits,
            side_width: max(available / 2, MIN_SIDE_WIDTH),
        }
    }
}

fn digit_count(n: usize) -> usize {
    n.to_string().len()
}

pub(crate) fn status_char(pair: &BlockPair) -> char {
    if pair.is_match {
        if pair.is_move {
            'M'
        } else {
            '='
        }
    } else if pair.is_normalized_match {
        if pair.is_move {
            'm'
        } else {
            '~'
        }
    } else if pair.a_length == 0 {
        '>'
    } else if pair.b_length == 0 {
        '<'
    } else {
        '!'
    }
}

/// Accumulates the displayed characters of a line into fixed-width chunks.
struct Chunker {
    width: usize,
    wrap: bool,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
    column: usize,
}

impl Chunker {
    /// Returns false once a truncated line is full.
    fn push(&mut self, c: char) -> bool {
        if self.current_len >= self.width {
            let full = std::mem::replace(&mut self.current, String::with_capacity(self.width));
            self.chunks.push(full);
            self.current_len = 0;
            if !self.wrap {
                return false;
            }
        }
        self.current.push(c);
        self.current_len += 1;
        self.column += 1;
        true
    }

    fn finish(mut self) -> Vec<String> {
        if self.current_len > 0 && (self.wrap || self.chunks.is_empty()) {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Splits the displayed form of `line` into chunks of at most `width`
/// characters. Without wrapping, only the first chunk is returned.
fn line_to_chunks(line: &[u8], width: usize, tab_width: usize, wrap: bool) -> Vec<String> {
    let tab_width = max(tab_width, 1);
    let mut chunker = Chunker {
        width,
        wrap,
        chunks: vec![],
        current: String::with_capacity(width),
        current_len: 0,
        column: 0,
    };
    for &byte in line {
        let keep_going = match byte {
            b' '..=b'~' => chunker.push(char::from(byte)),
            b'\t' => {
                let next_stop = (chunker.column / tab_width + 1) * tab_width;
                (chunker.column..next_stop).all(|_| chunker.push(' '))
            }
            b'\n' | b'\r' => true,
            _ => chunker.push(PLACEHOLDER),
        };
        if !keep_going {
            break;
        }
    }
    chunker.finish()
}

struct Renderer<'a> {
    a: &'a File,
    b: &'a File,
    settings: &'a SideBySideSettings,
    layout: Layout,
}

impl Renderer<'_> {
    fn write_pair(&self, out: &mut dyn Write, pair: &BlockPair) -> io::Result<()> {
        let status = status_char(pair);
        for i in 0..max(pair.a_length, pair.b_length) {
            let a_index = (i < pair.a_length).then(|| pair.a_index + i);
            let b_index = (i < pair.b_length).then(|| pair.b_index + i);
            self.write_lines(out, a_index, b_index, status)?;
        }
        Ok(())
    }

    fn write_lines(
        &self,
        out: &mut dyn Write,
        a_index: Option<usize>,
        b_index: Option<usize>,
        status: char,
    ) -> io::Result<()> {
        let width = self.layout.side_width;
        let chunks = |file: &File, index: Option<usize>| match index {
            Some(index) => line_to_chunks(
                file.line_bytes(index),
                width,
                self.settings.tab_width,
                self.settings.wrap,
            ),
            None => vec![],
        };
        let a_chunks = chunks(self.a, a_index);
        let b_chunks = chunks(self.b, b_index);
        // A blank line still takes a row.
        let rows = max(1, max(a_chunks.len(), b_chunks.len()));
        for n in 0..rows {
            let a_text = a_chunks.get(n).map_or("", String::as_str);
            let b_text = b_chunks.get(n).map_or("", String::as_str);
            let row = if self.settings.line_numbers {
                let line_number = |index: Option<usize>| match index {
                    Some(index) if n == 0 => (index + 1).to_string(),
                    Some(_) => CONTINUATION_MARK.to_owned(),
                    None => String::new(),
                };
                let a_number = line_number(a_index);
                let b_number = line_number(b_index);
                let a_digits = self.layout.a_digits;
                let b_digits = self.layout.b_digits;
                format!(
                    "{a_number:>a_digits$} {a_text:<width$} {status} {b_text:<width$} \
                     {b_number:<b_digits$}"
                )
            } else {
                format!("{a_text:<width$} {status} {b_text:<width$}")
            };
            writeln!(out, "{}", row.trim_end())?;
        }
        Ok(())
    }
}

/// Writes the side-by-side view of `pairs` to `out`, fitting the rows into
/// `columns` characters where possible.
pub fn write_side_by_side(
    out: &mut dyn Write,
    a: &File,
    b: &File,
    pairs: &[BlockPair],
    settings: &SideBySideSettings,
    columns: usize,
) -> io::Result<()> {
    let mut pairs = pairs.to_vec();
    match settings.primary {
        PrimaryFile::A => sort_by_a_index(&mut pairs),
        PrimaryFile::B => sort_by_b_index(&mut pairs),
    }
    let renderer = Renderer {
        a,
        b,
        settings,
        layout: Layout::new(a, b, settings, columns),
    };
    for pair in &pairs {
        renderer.write_pair(out, pair)?;
    }
    Ok(())
}
