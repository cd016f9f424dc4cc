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

use std::env;
use std::fmt;
use std::io;
use std::io::IsTerminal as _;
use std::io::StderrLock;
use std::io::StdoutLock;
use std::io::Write;
use std::str::FromStr;

use crossterm::style::Color;
use crossterm::style::Stylize as _;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColorChoice {
    Always,
    Never,
    #[default]
    Auto,
}

impl FromStr for ColorChoice {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            "auto" => Ok(ColorChoice::Auto),
            _ => Err("must be one of always, never, or auto"),
        }
    }
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColorChoice::Always => "always",
            ColorChoice::Never => "never",
            ColorChoice::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

fn color_setting(config: &config::Config) -> ColorChoice {
    config
        .get_string("ui.color")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn use_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    }
}

/// Terminal output of the command. Diff output goes to stdout, diagnostics
/// to stderr.
#[derive(Debug)]
pub struct Ui {
    color: bool,
}

impl Ui {
    /// Ui with the settings that apply before any config is loaded.
    pub fn null() -> Ui {
        Ui {
            color: use_color(ColorChoice::Auto),
        }
    }

    pub fn with_config(config: &config::Config) -> Ui {
        Ui {
            color: use_color(color_setting(config)),
        }
    }

    /// Reconfigures the underlying outputs with the new configuration.
    pub fn reset(&mut self, config: &config::Config) {
        self.color = use_color(color_setting(config));
    }

    /// Whether diagnostics are colorized.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Locked stdout stream.
    pub fn stdout(&self) -> StdoutLock<'static> {
        io::stdout().lock()
    }

    /// Locked stderr stream.
    pub fn stderr(&self) -> StderrLock<'static> {
        io::stderr().lock()
    }

    /// Writer to print an error with the given heading.
    pub fn error_with_heading(&self, heading: &str) -> HeadingWriter {
        self.heading_writer(heading, Some(Color::Red))
    }

    /// Writer to print a hint with the default "Hint: " heading.
    pub fn hint_default(&self) -> HeadingWriter {
        self.heading_writer("Hint: ", Some(Color::Cyan))
    }

    /// Writer to print a hint without a heading.
    pub fn hint_no_heading(&self) -> HeadingWriter {
        self.heading_writer("", Some(Color::Cyan))
    }

    /// Writer to print a warning with the default "Warning: " heading.
    pub fn warning_default(&self) -> HeadingWriter {
        self.heading_writer("Warning: ", Some(Color::Yellow))
    }

    /// Writer to print uncolored diagnostics with the given heading.
    pub fn stderr_with_heading(&self, heading: &str) -> HeadingWriter {
        self.heading_writer(heading, None)
    }

    fn heading_writer(&self, heading: &str, color: Option<Color>) -> HeadingWriter {
        let heading = match color {
            Some(color) if self.color && !heading.is_empty() => {
                heading.with(color).bold().to_string()
            }
            _ => heading.to_owned(),
        };
        HeadingWriter {
            output: self.stderr(),
            heading: Some(heading),
        }
    }

    /// Width of the terminal, or 80 if it can't be determined.
    pub fn term_width(&self) -> usize {
        term_width().unwrap_or(80).into()
    }
}

/// Writer which prints its heading before the first write.
pub struct HeadingWriter {
    output: StderrLock<'static>,
    heading: Option<String>,
}

impl Write for HeadingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(heading) = self.heading.take() {
            self.output.write_all(heading.as_bytes())?;
        }
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

fn term_width() -> Option<u16> {
    if let Some(cols) = env::var("COLUMNS").ok().and_then(|s| s.parse().ok()) {
        Some(cols)
    } else {
        crossterm::terminal::size().ok().map(|(cols, _)| cols)
    }
}
