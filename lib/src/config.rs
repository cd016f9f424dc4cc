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

//! Configuration store helpers.

use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use itertools::Itertools as _;

use crate::file_util::IoResultExt as _;

/// Generic config value.
pub type ConfigValue = config::Value;

/// Error that can occur when accessing configuration.
pub type ConfigError = config::ConfigError;

/// Source of configuration variables in order of precedence.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ConfigSource {
    /// Default values (which has the lowest precedence.)
    Default,
    /// Base environment variables.
    EnvBase,
    /// User configuration files.
    User,
    /// Command-line arguments (which has the highest precedence.)
    CommandArg,
}

/// Set of configuration variables with source information.
#[derive(Clone, Debug)]
pub struct ConfigLayer {
    /// Source type of this layer.
    pub source: ConfigSource,
    /// Source file path of this layer if any.
    pub path: Option<PathBuf>,
    /// Configuration variables.
    pub data: config::Config,
}

impl ConfigLayer {
    /// Creates new layer with the configuration variables `data`.
    pub fn with_data(source: ConfigSource, data: config::Config) -> Self {
        ConfigLayer {
            source,
            path: None,
            data,
        }
    }

    /// Parses TOML document `text` into new layer.
    pub fn parse(source: ConfigSource, text: &str) -> Result<Self, ConfigError> {
        let data = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(Self::with_data(source, data))
    }

    /// Creates new layer from dotted `name = value` pairs.
    pub fn from_values<I, K, V>(source: ConfigSource, values: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ConfigValue>,
    {
        let data = values
            .into_iter()
            .try_fold(config::Config::builder(), |builder, (name, value)| {
                builder.set_override(name.as_ref(), value)
            })?
            .build()?;
        Ok(Self::with_data(source, data))
    }

    fn load_from_file(source: ConfigSource, path: PathBuf) -> Result<Self, ConfigError> {
        let data = config::Config::builder()
            .add_source(
                config::File::from(path.clone())
                    // Not required, so that /dev/null can disable the user file.
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .build()?;
        Ok(ConfigLayer {
            source,
            path: Some(path),
            data,
        })
    }

    fn load_from_dir(source: ConfigSource, path: &Path) -> Result<Vec<Self>, ConfigError> {
        let mut file_paths: Vec<_> = path
            .read_dir()
            .and_then(|dir_entries| {
                dir_entries
                    .map(|entry| Ok(entry?.path()))
                    .filter_ok(|path| {
                        path.is_file() && path.extension().is_some_and(|ext| ext == "toml")
                    })
                    .try_collect()
            })
            .context(path)
            .map_err(|err| ConfigError::Foreign(err.into()))?;
        file_paths.sort_unstable();
        file_paths
            .into_iter()
            .map(|path| Self::load_from_file(source, path))
            .try_collect()
    }
}

/// Stack of configuration layers which can be merged as needed.
#[derive(Clone, Debug)]
pub struct StackedConfig {
    /// Layers sorted by `source` (the lowest precedence one first.)
    layers: Vec<ConfigLayer>,
}

impl StackedConfig {
    /// Creates an empty stack of configuration layers.
    pub fn empty() -> Self {
        StackedConfig { layers: vec![] }
    }

    /// Loads config file from the specified `path`, inserts it at the position
    /// specified by `source`. The file should exist.
    pub fn load_file(
        &mut self,
        source: ConfigSource,
        path: impl Into<PathBuf>,
    ) -> Result<(), ConfigError> {
        let layer = ConfigLayer::load_from_file(source, path.into())?;
        self.add_layer(layer);
        Ok(())
    }

    /// Loads the `*.toml` files of the specified directory `path` in name
    /// order, inserts them at the position specified by `source`. The
    /// directory should exist.
    pub fn load_dir(
        &mut self,
        source: ConfigSource,
        path: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let layers = ConfigLayer::load_from_dir(source, path.as_ref())?;
        let index = self.insert_point(source);
        self.layers.splice(index..index, layers);
        Ok(())
    }

    /// Inserts new layer at the position specified by `layer.source`.
    pub fn add_layer(&mut self, layer: ConfigLayer) {
        let index = self.insert_point(layer.source);
        self.layers.insert(index, layer);
    }

    /// Removes layers of the specified `source`.
    pub fn remove_layers(&mut self, source: ConfigSource) {
        self.layers.drain(self.layer_range(source));
    }

    fn layer_range(&self, source: ConfigSource) -> Range<usize> {
        // Linear search since the size of Vec wouldn't be large.
        let start = self
            .layers
            .iter()
            .take_while(|layer| layer.source < source)
            .count();
        let count = self.layers[start..]
            .iter()
            .take_while(|layer| layer.source == source)
            .count();
        start..(start + count)
    }

    fn insert_point(&self, source: ConfigSource) -> usize {
        // Search from end since layers are usually added in order.
        let skip = self
            .layers
            .iter()
            .rev()
            .take_while(|layer| layer.source > source)
            .count();
        self.layers.len() - skip
    }

    /// Layers sorted by precedence.
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Creates new merged config. Values of later layers win.
    pub fn merge(&self) -> Result<config::Config, ConfigError> {
        self.layers
            .iter()
            .fold(config::Config::builder(), |builder, layer| {
                builder.add_source(layer.data.clone())
            })
            .build()
    }
}
