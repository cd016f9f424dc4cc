// SPDX-FileCopyrightText: © 2020-2024 The Blockdiff Authors
// SPDX-License-Identifier: Apache-2.0

#![deny(unused_must_use)]

pub mod cli_util;
pub mod command_error;
pub mod commands;
pub mod config;
pub mod side_by_side;
pub mod ui;
