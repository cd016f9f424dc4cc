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

#![allow(missing_docs)]

use std::ops::Range;

use crate::file::File;
use crate::file::Line;

/// The two files of one diff invocation.
#[derive(Clone, Copy, Debug)]
pub struct FilePair<'a> {
    pub a: &'a File,
    pub b: &'a File,
}

impl<'a> FilePair<'a> {
    pub fn new(a: &'a File, b: &'a File) -> Self {
        FilePair { a, b }
    }

    /// The range pair spanning both files entirely.
    pub fn full_range_pair(&self) -> RangePair<'a> {
        RangePair::new(*self, self.a.full_range(), self.b.full_range())
    }
}

/// A range of lines in file A paired with a range of lines in file B. Every
/// diff phase works on one of these.
#[derive(Clone, Debug)]
pub struct RangePair<'a> {
    files: FilePair<'a>,
    pub a_range: Range<usize>,
    pub b_range: Range<usize>,
}

impl<'a> RangePair<'a> {
    pub fn new(files: FilePair<'a>, a_range: Range<usize>, b_range: Range<usize>) -> Self {
        debug_assert!(a_range.end <= files.a.line_count());
        debug_assert!(b_range.end <= files.b.line_count());
        RangePair {
            files,
            a_range,
            b_range,
        }
    }

    pub fn files(&self) -> FilePair<'a> {
        self.files
    }

    pub fn a_file(&self) -> &'a File {
        self.files.a
    }

    pub fn b_file(&self) -> &'a File {
        self.files.b
    }

    /// Narrows to the given ranges, which must be within the current ones.
    pub fn sub_range(&self, a_range: Range<usize>, b_range: Range<usize>) -> Self {
        debug_assert!(self.a_range.start <= a_range.start && a_range.end <= self.a_range.end);
        debug_assert!(self.b_range.start <= b_range.start && b_range.end <= self.b_range.end);
        RangePair::new(self.files, a_range, b_range)
    }

    pub fn a_len(&self) -> usize {
        self.a_range.len()
    }

    pub fn b_len(&self) -> usize {
        self.b_range.len()
    }

    /// Whether both ranges are empty.
    pub fn is_empty(&self) -> bool {
        self.a_range.is_empty() && self.b_range.is_empty()
    }

    /// Line `index` of file A. The index is file-relative.
    pub fn a_line(&self, index: usize) -> &'a Line {
        self.files.a.line(index)
    }

    /// Line `index` of file B. The index is file-relative.
    pub fn b_line(&self, index: usize) -> &'a Line {
        self.files.b.line(index)
    }
}
