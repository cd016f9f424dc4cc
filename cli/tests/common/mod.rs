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

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use regex::Captures;
use regex::Regex;
use tempfile::TempDir;

pub struct TestEnvironment {
    _temp_dir: TempDir,
    env_root: PathBuf,
    home_dir: PathBuf,
    config_path: PathBuf,
    env_vars: HashMap<String, String>,
    config_file_number: RefCell<i64>,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        let tmp_dir = testutils::new_temp_dir();
        let env_root = tmp_dir.path().canonicalize().unwrap();
        let home_dir = env_root.join("home");
        std::fs::create_dir(&home_dir).unwrap();
        let config_dir = env_root.join("config");
        std::fs::create_dir(&config_dir).unwrap();
        Self {
            _temp_dir: tmp_dir,
            env_root,
            home_dir,
            config_path: config_dir,
            env_vars: HashMap::new(),
            config_file_number: RefCell::new(0),
        }
    }
}

impl TestEnvironment {
    pub fn blockdiff_cmd(&self, args: &[&str]) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("blockdiff").unwrap();
        cmd.current_dir(&self.env_root);
        cmd.args(args);
        cmd.env_clear();
        cmd.env("RUST_BACKTRACE", "1");
        cmd.env("HOME", self.home_dir.to_str().unwrap());
        cmd.env("BLOCKDIFF_CONFIG", self.config_path.to_str().unwrap());
        cmd.env("COLUMNS", "60");
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run a `blockdiff` command, check that it was successful, and return its
    /// stdout
    #[track_caller]
    pub fn blockdiff_cmd_success(&self, args: &[&str]) -> String {
        let assert = self.blockdiff_cmd(args).assert().success().stderr("");
        self.normalize_output(&get_stdout_string(&assert))
    }

    /// Run a `blockdiff` command, check that it was successful, and return its
    /// stdout and stderr
    #[track_caller]
    pub fn blockdiff_cmd_ok(&self, args: &[&str]) -> (String, String) {
        let assert = self.blockdiff_cmd(args).assert().success();
        let stdout = self.normalize_output(&get_stdout_string(&assert));
        let stderr = self.normalize_output(&get_stderr_string(&assert));
        (stdout, stderr)
    }

    /// Run a `blockdiff` command, check that it failed with code 1, and return
    /// its stderr
    #[must_use]
    #[track_caller]
    pub fn blockdiff_cmd_failure(&self, args: &[&str]) -> String {
        let assert = self.blockdiff_cmd(args).assert().code(1).stdout("");
        self.normalize_output(&get_stderr_string(&assert))
    }

    /// Run a `blockdiff` command and check that it failed with code 2 (for
    /// invalid usage)
    #[must_use]
    #[track_caller]
    pub fn blockdiff_cmd_cli_error(&self, args: &[&str]) -> String {
        let assert = self.blockdiff_cmd(args).assert().code(2).stdout("");
        self.normalize_output(&get_stderr_string(&assert))
    }

    pub fn env_root(&self) -> &Path {
        &self.env_root
    }

    pub fn set_config_path(&mut self, config_path: PathBuf) {
        self.config_path = config_path;
    }

    /// Writes `lines` to the file `name` in the environment root, each line
    /// terminated by a newline.
    pub fn write_file(&self, name: &str, lines: &[&str]) {
        let content: String = lines.iter().map(|line| format!("{line}\n")).collect();
        std::fs::write(self.env_root.join(name), content).unwrap();
    }

    pub fn add_config(&self, content: &str) {
        if self.config_path.is_file() {
            panic!("add_config not supported when config_path is a file");
        }
        // Concatenating two valid TOML files does not (generally) result in a valid
        // TOML file, so we create a new file every time instead.
        let mut config_file_number = self.config_file_number.borrow_mut();
        *config_file_number += 1;
        let config_file_number = *config_file_number;
        std::fs::write(
            self.config_path
                .join(format!("config{config_file_number:04}.toml")),
            content,
        )
        .unwrap();
    }

    pub fn add_env_var(&mut self, key: &str, val: &str) {
        self.env_vars.insert(key.to_string(), val.to_string());
    }

    pub fn normalize_output(&self, text: &str) -> String {
        let text = text.replace("blockdiff.exe", "blockdiff");
        let regex = Regex::new(&format!(
            r"{}(\S+)",
            regex::escape(&self.env_root.display().to_string())
        ))
        .unwrap();
        regex
            .replace_all(&text, |caps: &Captures| {
                format!("$TEST_ENV{}", caps[1].replace('\\', "/"))
            })
            .to_string()
    }
}

pub fn get_stdout_string(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[track_caller]
pub fn get_stderr_string(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stderr.clone()).unwrap()
}

/// Returns a string with the last line removed.
///
/// Use this to remove the root error message containing platform-specific
/// content for example.
pub fn strip_last_line(s: &str) -> &str {
    s.trim_end_matches('\n')
        .rsplit_once('\n')
        .map_or(s, |(h, _)| &s[..h.len() + 1])
}
