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
use std::path::Path;
use std::path::PathBuf;

use blockdiff_lib::config::ConfigError;
use blockdiff_lib::config::ConfigLayer;
use blockdiff_lib::config::ConfigSource;
use blockdiff_lib::config::ConfigValue;
use blockdiff_lib::config::StackedConfig;
use itertools::Itertools as _;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ConfigEnvError {
    #[error(
        "Both {0} and {1} exist. Please consolidate your configs in one of them."
    )]
    AmbiguousSource(PathBuf, PathBuf),
}

#[derive(Clone, Debug)]
enum ConfigPath {
    /// Existing config file or directory path.
    Existing(PathBuf),
    /// Could not find any config file, but one could live at the specified
    /// location.
    New(PathBuf),
    /// Could not find any config file.
    Unavailable,
}

impl ConfigPath {
    fn new(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) if path.exists() => ConfigPath::Existing(path),
            Some(path) => ConfigPath::New(path),
            None => ConfigPath::Unavailable,
        }
    }

    fn as_path(&self) -> Option<&Path> {
        match self {
            ConfigPath::Existing(path) | ConfigPath::New(path) => Some(path),
            ConfigPath::Unavailable => None,
        }
    }
}

// The struct exists so that we can mock certain global values in unit tests.
#[derive(Clone, Default, Debug)]
struct UnresolvedConfigEnv {
    config_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    blockdiff_config: Option<String>,
}

impl UnresolvedConfigEnv {
    fn resolve(self) -> Result<ConfigPath, ConfigEnvError> {
        if let Some(path) = self.blockdiff_config {
            return Ok(ConfigPath::new(Some(PathBuf::from(path))));
        }
        let platform_config_path = ConfigPath::new(self.config_dir.map(|mut config_dir| {
            config_dir.push("blockdiff");
            config_dir.push("config.toml");
            config_dir
        }));
        let home_config_path = ConfigPath::new(self.home_dir.map(|mut home_dir| {
            home_dir.push(".blockdiff.toml");
            home_dir
        }));
        use ConfigPath::*;
        match (platform_config_path, home_config_path) {
            (Existing(platform_config_path), Existing(home_config_path)) => Err(
                ConfigEnvError::AmbiguousSource(platform_config_path, home_config_path),
            ),
            (Existing(path), _) | (_, Existing(path)) => Ok(Existing(path)),
            (New(path), _) | (_, New(path)) => Ok(New(path)),
            (Unavailable, Unavailable) => Ok(Unavailable),
        }
    }
}

/// Locations of the config files.
#[derive(Clone, Debug)]
pub struct ConfigEnv {
    user_config_path: ConfigPath,
}

impl ConfigEnv {
    /// Initializes configuration loader based on environment variables.
    pub fn from_environment() -> Result<Self, ConfigEnvError> {
        let env = UnresolvedConfigEnv {
            config_dir: dirs::config_dir(),
            home_dir: dirs::home_dir(),
            blockdiff_config: env::var("BLOCKDIFF_CONFIG").ok(),
        };
        Ok(ConfigEnv {
            user_config_path: env.resolve()?,
        })
    }

    /// Returns a path to the user-specific config file or directory.
    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_path()
    }

    /// Returns a path to the existing user-specific config file or directory.
    fn existing_user_config_path(&self) -> Option<&Path> {
        match &self.user_config_path {
            ConfigPath::Existing(path) => Some(path),
            _ => None,
        }
    }

    /// Loads user-specific config files into the given `config`. The old
    /// user-config layers will be replaced if any.
    #[instrument(skip(config))]
    pub fn reload_user_config(&self, config: &mut StackedConfig) -> Result<(), ConfigError> {
        config.remove_layers(ConfigSource::User);
        if let Some(path) = self.existing_user_config_path() {
            if path.is_dir() {
                config.load_dir(ConfigSource::User, path)?;
            } else {
                config.load_file(ConfigSource::User, path)?;
            }
        }
        Ok(())
    }
}

/// Initializes stacked config with the given `default_layers` and layers
/// derived from environment variables.
///
/// Layers are stacked as follows (lowest precedence first):
///
/// 1. Default
/// 2. Base environment variables
/// 3. User config `~/.config/blockdiff/config.toml` or `$BLOCKDIFF_CONFIG`
/// 4. Command-line arguments `--config-toml` and option flags
///
/// This function sets up 1 and 2.
pub fn config_from_environment(
    default_layers: impl IntoIterator<Item = ConfigLayer>,
) -> Result<StackedConfig, ConfigError> {
    let mut config = StackedConfig::empty();
    for layer in default_layers {
        config.add_layer(layer);
    }
    config.add_layer(env_base_layer()?);
    Ok(config)
}

/// Environment variables that should be overridden by config values
fn env_base_layer() -> Result<ConfigLayer, ConfigError> {
    let mut values: Vec<(&str, ConfigValue)> = vec![];
    if !env::var("NO_COLOR").unwrap_or_default().is_empty() {
        // "User-level configuration files and per-instance command-line arguments
        // should override $NO_COLOR." https://no-color.org/
        values.push(("ui.color", "never".into()));
    }
    ConfigLayer::from_values(ConfigSource::EnvBase, values)
}

pub fn default_config_layers() -> Result<Vec<ConfigLayer>, ConfigError> {
    let layer = ConfigLayer::parse(ConfigSource::Default, include_str!("config/defaults.toml"))?;
    Ok(vec![layer])
}

/// Parses `--config-toml` arguments.
pub fn parse_config_args(toml_strs: &[String]) -> Result<Vec<ConfigLayer>, ConfigError> {
    // A layer is constructed per argument so that a full TOML document keeps
    // its own line numbers in error messages.
    toml_strs
        .iter()
        .map(|text| ConfigLayer::parse(ConfigSource::CommandArg, text))
        .try_collect()
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use assert_matches::assert_matches;
    use blockdiff_lib::settings::DiffOptions;

    use super::*;

    #[test]
    fn test_default_config_matches_default_options() {
        let mut config = StackedConfig::empty();
        for layer in default_config_layers().unwrap() {
            config.add_layer(layer);
        }
        let config = config.merge().unwrap();
        assert_eq!(
            DiffOptions::from_config(&config).unwrap(),
            DiffOptions::default()
        );
        assert_eq!(config.get_string("ui.color").unwrap(), "auto");
    }

    #[test]
    fn test_parse_config_args() {
        let layers = parse_config_args(&[
            "diff.match-ends = false".to_owned(),
            "[side-by-side]\ncolumns = 100".to_owned(),
        ])
        .unwrap();
        assert_eq!(layers.len(), 2);
        assert!(layers
            .iter()
            .all(|layer| layer.source == ConfigSource::CommandArg));
        assert_matches!(
            parse_config_args(&["diff.match-ends =".to_owned()]),
            Err(ConfigError::FileParse { .. })
        );
    }

    #[test]
    fn test_reload_user_config_from_dir() -> anyhow::Result<()> {
        let tmp = setup_config_fs(&vec!["config/a.toml", "config/b.toml"])?;
        std::fs::write(tmp.path().join("config/b.toml"), "diff.match-ends = false")?;
        let env = UnresolvedConfigEnv {
            blockdiff_config: Some(tmp.path().join("config").to_str().unwrap().to_owned()),
            ..Default::default()
        };
        let config_env = ConfigEnv {
            user_config_path: env.resolve()?,
        };
        let mut config = StackedConfig::empty();
        config.add_layer(ConfigLayer::parse(
            ConfigSource::Default,
            "diff.match-ends = true",
        )?);
        config_env.reload_user_config(&mut config)?;
        config_env.reload_user_config(&mut config)?;
        let sources = config.layers().iter().map(|layer| layer.source).collect_vec();
        assert_eq!(
            sources,
            [ConfigSource::Default, ConfigSource::User, ConfigSource::User]
        );
        assert!(!config.merge()?.get_bool("diff.match-ends")?);
        Ok(())
    }

    #[test]
    fn test_config_path_home_dir_existing() -> anyhow::Result<()> {
        TestCase {
            files: vec!["home/.blockdiff.toml"],
            env: UnresolvedConfigEnv {
                home_dir: Some("home".into()),
                ..Default::default()
            },
            want: Want::Existing("home/.blockdiff.toml"),
        }
        .run()
    }

    #[test]
    fn test_config_path_config_dir_existing() -> anyhow::Result<()> {
        TestCase {
            files: vec!["config/blockdiff/config.toml"],
            env: UnresolvedConfigEnv {
                config_dir: Some("config".into()),
                ..Default::default()
            },
            want: Want::Existing("config/blockdiff/config.toml"),
        }
        .run()
    }

    #[test]
    fn test_config_path_new_prefer_config_dir() -> anyhow::Result<()> {
        TestCase {
            files: vec![],
            env: UnresolvedConfigEnv {
                config_dir: Some("config".into()),
                home_dir: Some("home".into()),
                ..Default::default()
            },
            want: Want::New("config/blockdiff/config.toml"),
        }
        .run()
    }

    #[test]
    fn test_config_path_env_var_existing() -> anyhow::Result<()> {
        TestCase {
            files: vec!["custom.toml", "config/blockdiff/config.toml"],
            env: UnresolvedConfigEnv {
                config_dir: Some("config".into()),
                blockdiff_config: Some("custom.toml".into()),
                ..Default::default()
            },
            want: Want::Existing("custom.toml"),
        }
        .run()
    }

    #[test]
    fn test_config_path_env_var_new() -> anyhow::Result<()> {
        TestCase {
            files: vec![],
            env: UnresolvedConfigEnv {
                blockdiff_config: Some("custom.toml".into()),
                ..Default::default()
            },
            want: Want::New("custom.toml"),
        }
        .run()
    }

    #[test]
    fn test_config_path_none() -> anyhow::Result<()> {
        TestCase {
            files: vec![],
            env: Default::default(),
            want: Want::None,
        }
        .run()
    }

    #[test]
    fn test_config_path_ambiguous() -> anyhow::Result<()> {
        let tmp = setup_config_fs(&vec!["home/.blockdiff.toml", "config/blockdiff/config.toml"])?;
        let env = UnresolvedConfigEnv {
            home_dir: Some(tmp.path().join("home")),
            config_dir: Some(tmp.path().join("config")),
            ..Default::default()
        };
        assert_matches!(env.resolve(), Err(ConfigEnvError::AmbiguousSource(_, _)));
        Ok(())
    }

    fn setup_config_fs(files: &Vec<&'static str>) -> anyhow::Result<tempfile::TempDir> {
        let tmp = testutils::new_temp_dir();
        for file in files {
            let path = tmp.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path)?;
        }
        Ok(tmp)
    }

    enum Want {
        None,
        New(&'static str),
        Existing(&'static str),
    }

    struct TestCase {
        files: Vec<&'static str>,
        env: UnresolvedConfigEnv,
        want: Want,
    }

    impl TestCase {
        fn resolve(&self, root: &Path) -> Result<ConfigEnv, ConfigEnvError> {
            let env = UnresolvedConfigEnv {
                config_dir: self.env.config_dir.as_ref().map(|p| root.join(p)),
                home_dir: self.env.home_dir.as_ref().map(|p| root.join(p)),
                blockdiff_config: self
                    .env
                    .blockdiff_config
                    .as_ref()
                    .map(|p| root.join(p).to_str().unwrap().to_string()),
            };
            Ok(ConfigEnv {
                user_config_path: env.resolve()?,
            })
        }

        fn run(&self) -> anyhow::Result<()> {
            let tmp = setup_config_fs(&self.files)?;
            let env = self
                .resolve(tmp.path())
                .map_err(|e| anyhow!("resolve: {e}"))?;
            let (want_existing, want_any) = match self.want {
                Want::None => (None, None),
                Want::New(want) => (None, Some(tmp.path().join(want))),
                Want::Existing(want) => (Some(tmp.path().join(want)), Some(tmp.path().join(want))),
            };
            let got = env.existing_user_config_path();
            if got != want_existing.as_deref() {
                return Err(anyhow!(
                    "existing_user_config_path: got {got:?}, want {want_existing:?}"
                ));
            }
            let got = env.user_config_path();
            if got != want_any.as_deref() {
                return Err(anyhow!("user_config_path: got {got:?}, want {want_any:?}"));
            }
            Ok(())
        }
    }
}
