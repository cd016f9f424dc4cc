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

//! Line diff which recognizes blocks of moved lines.
//!
//! Start with [`diff::BlockDiff::compute()`], which aligns two [`file::File`]s
//! into a list of [`block_pair::BlockPair`]s.

#![warn(missing_docs)]
#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub mod block_pair;
pub mod config;
pub mod diff;
pub mod end_match;
pub mod file;
pub mod file_util;
pub mod interval_tracker;
pub mod lcs;
pub mod moves;
pub mod observer;
pub mod range_pair;
pub mod rarity;
pub mod settings;
pub mod small_edit;
