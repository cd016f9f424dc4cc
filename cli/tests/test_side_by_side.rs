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

use crate::common::TestEnvironment;

fn moved_block_env() -> TestEnvironment {
    let test_env = TestEnvironment::default();
    test_env.write_file("a.txt", &["x", "moved1", "moved2", "y"]);
    test_env.write_file("b.txt", &["moved1", "moved2", "x", "y"]);
    test_env
}

#[test]
fn test_side_by_side() {
    let test_env = TestEnvironment::default();
    test_env.write_file("a.txt", &["foo", "bar", "baz"]);
    test_env.write_file("b.txt", &["foo", "baz", "qux"]);
    let stdout = test_env.blockdiff_cmd_success(&["a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @r"
    1 foo                        = foo                        1
    2 bar                        <
    3 baz                        = baz                        2
                                 > qux                        3
    ");
}

#[test]
fn test_side_by_side_moved_block() {
    let test_env = moved_block_env();
    let stdout = test_env.blockdiff_cmd_success(&["--columns=40", "a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @r"
    2 moved1           = moved1           1
    3 moved2           = moved2           2
    1 x                M x                3
    4 y                = y                4
    ");

    let stdout = test_env.blockdiff_cmd_success(&[
        "--columns=40",
        "--primary=a",
        "--no-line-numbers",
        "a.txt",
        "b.txt",
    ]);
    insta::assert_snapshot!(stdout, @r"
    x                  M x
    moved1             = moved1
    moved2             = moved2
    y                  = y
    ");
}

#[test]
fn test_side_by_side_long_lines() {
    let test_env = TestEnvironment::default();
    test_env.write_file("a.txt", &["let total = first_value + second_value;"]);
    test_env.write_file("b.txt", &["let total = first_value - second_value;"]);
    let stdout = test_env.blockdiff_cmd_success(&["--columns=30", "a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @r#"
    1 let total = ! let total = 1
    "  first_valu !  first_valu "
    " e + second_ ! e - second_ "
    " value;      ! value;      "
    "#);

    let stdout =
        test_env.blockdiff_cmd_success(&["--columns=30", "--truncate", "a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @"1 let total = ! let total = 1");
}

#[test]
fn test_side_by_side_identical_files() {
    let test_env = TestEnvironment::default();
    test_env.write_file("a.txt", &["one", "two"]);
    test_env.write_file("b.txt", &["one", "two"]);
    let stdout = test_env.blockdiff_cmd_success(&["a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @r"
    1 one                        = one                        1
    2 two                        = two                        2
    ");
}

#[test]
fn test_side_by_side_empty_files() {
    let test_env = TestEnvironment::default();
    test_env.write_file("a.txt", &[]);
    test_env.write_file("b.txt", &[]);
    let stdout = test_env.blockdiff_cmd_success(&["a.txt", "b.txt"]);
    insta::assert_snapshot!(stdout, @"");
}
