// Copyright 2022 The Blockdiff Authors
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
use std::ffi::OsString;
use std::fmt::Debug;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::SystemTime;

use blockdiff_lib::config::StackedConfig;
use clap::Command;
use clap::FromArgMatches as _;
use tracing::instrument;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::prelude::*;

use crate::command_error::config_error_with_message;
use crate::command_error::handle_command_result;
use crate::command_error::internal_error_with_message;
use crate::command_error::CommandError;
use crate::commands::Args;
use crate::config::config_from_environment;
use crate::config::default_config_layers;
use crate::config::parse_config_args;
use crate::config::ConfigEnv;
use crate::ui::Ui;

struct ChromeTracingFlushGuard {
    _inner: Option<Rc<tracing_chrome::FlushGuard>>,
}

impl Debug for ChromeTracingFlushGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { _inner } = self;
        f.debug_struct("ChromeTracingFlushGuard")
            .finish_non_exhaustive()
    }
}

/// Handle to initialize or change tracing subscription.
#[derive(Debug)]
pub struct TracingSubscription {
    reload_log_filter: tracing_subscriber::reload::Handle<
        tracing_subscriber::EnvFilter,
        tracing_subscriber::Registry,
    >,
    _chrome_tracing_flush_guard: ChromeTracingFlushGuard,
}

impl TracingSubscription {
    /// Initializes tracing with the default configuration. This should be
    /// called as early as possible.
    pub fn init() -> Self {
        let filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(tracing::metadata::LevelFilter::ERROR.into())
            .from_env_lossy();
        let (filter, reload_log_filter) = tracing_subscriber::reload::Layer::new(filter);

        let (chrome_tracing_layer, chrome_tracing_flush_guard) =
            match env::var("BLOCKDIFF_TRACE") {
                Ok(filename) => {
                    let filename = if filename.is_empty() {
                        let timestamp = SystemTime::now()
                            .duration_since(SystemTime::UNIX_EPOCH)
                            .map(|elapsed| elapsed.as_secs())
                            .unwrap_or_default();
                        format!("blockdiff-trace-{timestamp}.json")
                    } else {
                        filename
                    };
                    let include_args = env::var("BLOCKDIFF_TRACE_INCLUDE_ARGS").is_ok();
                    let (layer, guard) = ChromeLayerBuilder::new()
                        .file(filename)
                        .include_args(include_args)
                        .build();
                    (
                        Some(layer),
                        ChromeTracingFlushGuard {
                            _inner: Some(Rc::new(guard)),
                        },
                    )
                }
                Err(_) => (None, ChromeTracingFlushGuard { _inner: None }),
            };

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::Layer::default()
                    .with_writer(std::io::stderr)
                    .with_filter(filter),
            )
            .with(chrome_tracing_layer)
            .init();
        TracingSubscription {
            reload_log_filter,
            _chrome_tracing_flush_guard: chrome_tracing_flush_guard,
        }
    }

    pub fn enable_debug_logging(&self) -> Result<(), CommandError> {
        self.reload_log_filter
            .modify(|filter| {
                *filter = tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::metadata::LevelFilter::DEBUG.into())
                    .from_env_lossy();
            })
            .map_err(|err| internal_error_with_message("failed to enable debug logging", err))?;
        tracing::info!("debug logging enabled");
        Ok(())
    }
}

/// Parses the command line, enabling debug logging as soon as it's asked for.
pub fn parse_args(
    app: &Command,
    tracing_subscription: &TracingSubscription,
    args_os: impl IntoIterator<Item = OsString>,
) -> Result<Args, CommandError> {
    let matches = app
        .clone()
        .arg_required_else_help(true)
        .try_get_matches_from(args_os)?;
    let args = Args::from_arg_matches(&matches)?;
    if args.global_args.debug {
        tracing_subscription.enable_debug_logging()?;
    }
    Ok(args)
}

/// CLI command builder and runner.
#[must_use]
pub struct CliRunner {
    tracing_subscription: TracingSubscription,
    app: Command,
}

impl CliRunner {
    /// Initializes CLI environment and returns a builder. This should be called
    /// as early as possible.
    pub fn init() -> Self {
        let tracing_subscription = TracingSubscription::init();
        CliRunner {
            tracing_subscription,
            app: crate::commands::default_app(),
        }
    }

    /// Set the version to be displayed by `blockdiff --version`.
    pub fn version(mut self, version: &str) -> Self {
        self.app = self.app.version(version.to_string());
        self
    }

    #[instrument(skip_all)]
    fn run_internal(self, ui: &mut Ui, mut config: StackedConfig) -> Result<(), CommandError> {
        let config_env = ConfigEnv::from_environment()?;
        config_env.reload_user_config(&mut config)?;
        ui.reset(&config.merge()?);

        let args = parse_args(&self.app, &self.tracing_subscription, env::args_os())?;
        let config_args = parse_config_args(&args.global_args.config_toml)
            .map_err(|err| config_error_with_message("Invalid `--config-toml`", err))?;
        for layer in config_args {
            config.add_layer(layer);
        }
        config.add_layer(args.to_config_layer()?);
        let merged = config.merge()?;
        ui.reset(&merged);
        tracing::debug!(layers = config.layers().len(), "loaded config");

        crate::commands::cmd_diff(ui, &merged, &args)
    }

    #[must_use]
    #[instrument(skip(self))]
    pub fn run(self) -> ExitCode {
        let mut ui = Ui::null();
        let result = default_config_layers()
            .and_then(config_from_environment)
            .map_err(|err| config_error_with_message("Failed to load the default config", err))
            .and_then(|config| self.run_internal(&mut ui, config));
        handle_command_result(&ui, result)
    }
}
