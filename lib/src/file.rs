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

//! Immutable, line-indexed file contents with precomputed line hashes.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fs;
use std::io;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use blake2::Blake2b512;
use bstr::BStr;
use digest::Digest as _;
use rayon::prelude::*;

use crate::file_util::IoResultExt as _;
use crate::file_util::PathError;

/// Stable 64-bit hash of some line content.
pub type LineHash = u64;

/// Splits `text` into line ranges. Each range includes its trailing `\n`, if
/// any.
pub fn find_line_ranges(text: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = vec![];
    let mut start = 0;
    loop {
        match text[start..].iter().position(|b| *b == b'\n') {
            None => {
                break;
            }
            Some(i) => {
                ranges.push(start..start + i + 1);
                start += i + 1;
            }
        }
    }
    if start < text.len() {
        ranges.push(start..text.len());
    }
    ranges
}

/// Returns the normalized form of `line`: leading and trailing whitespace
/// removed, inner whitespace runs collapsed into a single space.
pub fn normalize_line(line: &[u8]) -> Vec<u8> {
    let mut normalized = Vec::with_capacity(line.len());
    for word in line
        .split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
    {
        if !normalized.is_empty() {
            normalized.push(b' ');
        }
        normalized.extend_from_slice(word);
    }
    normalized
}

/// Hashes `content` with BLAKE2b, truncated to 64 bits.
pub fn hash_line(content: &[u8]) -> LineHash {
    let digest = Blake2b512::digest(content);
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&digest[..8]);
    LineHash::from_le_bytes(bytes)
}

/// One physical line of a [`File`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Line {
    /// Content range in the file text, excluding the `\n` terminator.
    range: Range<usize>,
    hash: LineHash,
    normalized_hash: LineHash,
    normalized_len: usize,
    probably_common: bool,
}

impl Line {
    fn new(text: &[u8], range: Range<usize>) -> Self {
        let range = if text[range.clone()].ends_with(b"\n") {
            range.start..range.end - 1
        } else {
            range
        };
        let content = &text[range.clone()];
        let normalized = normalize_line(content);
        Line {
            range,
            hash: hash_line(content),
            normalized_hash: hash_line(&normalized),
            normalized_len: normalized.len(),
            probably_common: !normalized.iter().any(u8::is_ascii_alphanumeric),
        }
    }

    /// Hash of the exact line content.
    pub fn hash(&self) -> LineHash {
        self.hash
    }

    /// Hash of the normalized line content.
    pub fn normalized_hash(&self) -> LineHash {
        self.normalized_hash
    }

    /// Length in bytes of the normalized line content.
    pub fn normalized_len(&self) -> usize {
        self.normalized_len
    }

    /// Whether the line carries little information, like `}` or a blank line.
    /// Such lines are never used as alignment anchors when
    /// `omit-probably-common-lines` is set.
    pub fn is_probably_common(&self) -> bool {
        self.probably_common
    }

    /// Number of bytes of content, excluding the line terminator.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// The lines of one version of a file.
#[derive(Clone)]
pub struct File {
    text: Vec<u8>,
    lines: Vec<Line>,
    normalized_counts: HashMap<LineHash, u32>,
}

impl File {
    /// Splits `text` into lines.
    pub fn from_bytes(text: impl Into<Vec<u8>>) -> Self {
        let text = text.into();
        let ranges = find_line_ranges(&text);
        Self::from_text_and_ranges(text, ranges)
    }

    /// Reads the whole stream and splits it into lines.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut text = vec![];
        reader.read_to_end(&mut text)?;
        Ok(Self::from_bytes(text))
    }

    /// Reads the file at `path`.
    pub fn load(path: &Path) -> Result<Self, PathError> {
        let text = fs::read(path).context(path)?;
        Ok(Self::from_bytes(text))
    }

    /// Builds a file from already split lines. The lines shouldn't include
    /// their terminators.
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut text = vec![];
        let mut ranges = vec![];
        for line in lines {
            let start = text.len();
            text.extend_from_slice(line.as_ref());
            ranges.push(start..text.len());
            text.push(b'\n');
        }
        Self::from_text_and_ranges(text, ranges)
    }

    fn from_text_and_ranges(text: Vec<u8>, ranges: Vec<Range<usize>>) -> Self {
        let lines: Vec<Line> = ranges
            .into_par_iter()
            .map(|range| Line::new(&text, range))
            .collect();
        let mut normalized_counts = HashMap::new();
        for line in &lines {
            *normalized_counts.entry(line.normalized_hash).or_insert(0) += 1;
        }
        File {
            text,
            lines,
            normalized_counts,
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> &Line {
        &self.lines[index]
    }

    /// Content of the line at `index`, without its terminator.
    pub fn line_bytes(&self, index: usize) -> &[u8] {
        &self.text[self.lines[index].range.clone()]
    }

    /// Number of lines in the whole file sharing the normalized `hash`.
    pub fn normalized_occurrences(&self, hash: LineHash) -> u32 {
        self.normalized_counts.get(&hash).copied().unwrap_or(0)
    }

    /// Range covering every line of the file.
    pub fn full_range(&self) -> Range<usize> {
        0..self.lines.len()
    }

    /// Whether both files consist of exactly the same lines.
    pub fn has_same_lines(&self, other: &File) -> bool {
        self.lines.len() == other.lines.len()
            && (0..self.lines.len()).all(|i| self.line_bytes(i) == other.line_bytes(i))
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.line_count()).map(|i| BStr::new(self.line_bytes(i))))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Extracted to a function because type inference is ambiguous due to
    // `impl PartialEq<aho_corasick::util::search::Span> for std::ops::Range<usize>`
    fn no_ranges() -> Vec<Range<usize>> {
        vec![]
    }

    #[test]
    fn test_find_line_ranges_empty() {
        assert_eq!(find_line_ranges(b""), no_ranges());
    }

    #[test]
    fn test_find_line_ranges_blank_line() {
        assert_eq!(find_line_ranges(b"\n"), vec![0..1]);
    }

    #[test]
    fn test_find_line_ranges_missing_newline_at_eof() {
        assert_eq!(find_line_ranges(b"foo"), vec![0..3]);
    }

    #[test]
    fn test_find_line_ranges_multiple_lines() {
        assert_eq!(find_line_ranges(b"a\nbb\nccc\n"), vec![0..2, 2..5, 5..9]);
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line(b""), b"");
        assert_eq!(normalize_line(b"   \t"), b"");
        assert_eq!(normalize_line(b"  foo  bar\t(baz)\r"), b"foo bar (baz)");
    }

    #[test]
    fn test_hash_line_is_stable() {
        assert_eq!(hash_line(b"foo"), hash_line(b"foo"));
        assert_ne!(hash_line(b"foo"), hash_line(b"foo "));
    }

    #[test]
    fn test_empty_file() {
        let file = File::from_bytes(b"".to_vec());
        assert_eq!(file.line_count(), 0);
        assert!(file.is_empty());
        assert_eq!(file.full_range(), 0..0);
    }

    #[test]
    fn test_line_bytes_exclude_terminator() {
        let file = File::from_bytes(b"foo\nbar\r\nbaz".to_vec());
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.line_bytes(0), b"foo");
        assert_eq!(file.line_bytes(1), b"bar\r");
        assert_eq!(file.line_bytes(2), b"baz");
        // The final line without a newline is the same line as one with it.
        assert_eq!(
            file.line(2).hash(),
            File::from_bytes(b"baz\n".to_vec()).line(0).hash()
        );
    }

    #[test]
    fn test_from_lines_matches_from_bytes() {
        let split = File::from_lines(["foo", "", "  bar"]);
        let joined = File::from_bytes(b"foo\n\n  bar\n".to_vec());
        assert_eq!(split.lines(), joined.lines());
        assert!(split.has_same_lines(&joined));
    }

    #[test]
    fn test_normalized_hashes() {
        let file = File::from_lines(["  if (x) {", "if (x)   {", "if (y) {"]);
        assert_ne!(file.line(0).hash(), file.line(1).hash());
        assert_eq!(file.line(0).normalized_hash(), file.line(1).normalized_hash());
        assert_ne!(file.line(0).normalized_hash(), file.line(2).normalized_hash());
        assert_eq!(file.normalized_occurrences(file.line(0).normalized_hash()), 2);
        assert_eq!(file.line(0).normalized_len(), "if (x) {".len());
    }

    #[test]
    fn test_probably_common_lines() {
        let file = File::from_lines(["}", "  /*", "", "  x = 1;", "};"]);
        let common = file
            .lines()
            .iter()
            .map(|line| line.is_probably_common())
            .collect::<Vec<_>>();
        assert_eq!(common, vec![true, true, true, false, true]);
    }

    #[test]
    fn test_from_reader() {
        let file = File::from_reader(&b"a\nb\n"[..]).unwrap();
        assert_eq!(file.line_count(), 2);
        assert_eq!(format!("{file:?}"), r#"["a", "b"]"#);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = File::load(&temp_dir.path().join("nope")).unwrap_err();
        assert_eq!(err.error.kind(), io::ErrorKind::NotFound);
    }
}
