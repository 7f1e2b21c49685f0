// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//

//! Groupwise configuration

use std::collections::HashMap;
use std::result;
use std::sync::LazyLock;

use crate::error::{GroupwiseError, Result};

use datafusion::{arrow::datatypes::DataType, common::config_err};

/// Number of hash partitions used for the group-by shuffle
pub const GROUPWISE_SHUFFLE_PARTITIONS: &str = "groupwise.shuffle_partitions";
/// Upper bound of partition units processed at the same time
pub const GROUPWISE_MAX_CONCURRENT_TASKS: &str = "groupwise.max_concurrent_tasks";

pub type ParseResult<T> = result::Result<T, String>;

static CONFIG_ENTRIES: LazyLock<HashMap<String, ConfigEntry>> = LazyLock::new(|| {
    let entries = vec![
        ConfigEntry::new(GROUPWISE_SHUFFLE_PARTITIONS.to_string(),
                         "Sets the number of hash partitions used to shuffle datasets by the grouping key, 0 disables the shuffle".to_string(),
                         DataType::UInt32, Some(200.to_string())),
        ConfigEntry::new(GROUPWISE_MAX_CONCURRENT_TASKS.to_string(),
                         "Maximum number of partitions grouped and aggregated concurrently".to_string(),
                         DataType::UInt16, Some(std::thread::available_parallelism().map(|v| v.get()).unwrap_or(1).to_string())),
    ];
    entries
        .into_iter()
        .map(|e| (e.name.clone(), e))
        .collect::<HashMap<_, _>>()
});

/// Configuration option meta-data
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    name: String,
    description: String,
    data_type: DataType,
    default_value: Option<String>,
}

impl ConfigEntry {
    fn new(
        name: String,
        description: String,
        data_type: DataType,
        default_value: Option<String>,
    ) -> Self {
        Self {
            name,
            description,
            data_type,
            default_value,
        }
    }
}

/// Session level defaults for the group-join-apply transform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupwiseConfig {
    /// Settings stored in map for easy serde
    settings: HashMap<String, String>,
}

impl GroupwiseConfig {
    /// Create a new configuration based on key-value pairs
    pub fn with_settings(settings: HashMap<String, String>) -> Result<Self> {
        let supported_entries = GroupwiseConfig::valid_entries();
        for (name, entry) in supported_entries {
            if let Some(v) = settings.get(name) {
                // validate that we can parse the user-supplied value
                Self::parse_value(v.as_str(), entry.data_type.clone()).map_err(|e| GroupwiseError::Configuration(format!("Failed to parse user-supplied value '{v}' for configuration setting '{name}': {e}")))?;
            } else if let Some(v) = entry.default_value.clone() {
                Self::parse_value(v.as_str(), entry.data_type.clone()).map_err(|e| GroupwiseError::Configuration(format!("Failed to parse default value '{v}' for configuration setting '{name}': {e}")))?;
            }
        }
        for name in settings.keys() {
            if !supported_entries.contains_key(name) {
                return Err(GroupwiseError::Configuration(format!(
                    "configuration key `{name}` does not exist"
                )));
            }
        }

        Ok(Self { settings })
    }

    pub fn parse_value(val: &str, data_type: DataType) -> ParseResult<()> {
        match data_type {
            DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                val.parse::<usize>().map_err(|e| format!("{e:?}"))?;
            }
            DataType::Boolean => {
                val.parse::<bool>().map_err(|e| format!("{e:?}"))?;
            }
            DataType::Utf8 => {}
            _ => {
                return Err(format!("not support data type: {data_type}"));
            }
        }

        Ok(())
    }

    // All available configuration options
    pub fn valid_entries() -> &'static HashMap<String, ConfigEntry> {
        &CONFIG_ENTRIES
    }

    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    /// Hash partition count for the group-by shuffle, `0` when disabled
    pub fn shuffle_partitions(&self) -> usize {
        self.get_usize_setting(GROUPWISE_SHUFFLE_PARTITIONS)
    }

    /// Maximum number of partition units processed at once, at least one
    pub fn max_concurrent_tasks(&self) -> usize {
        self.get_usize_setting(GROUPWISE_MAX_CONCURRENT_TASKS).max(1)
    }

    fn get_usize_setting(&self, key: &str) -> usize {
        self.settings
            .get(key)
            .or_else(|| {
                Self::valid_entries()
                    .get(key)
                    .and_then(|e| e.default_value.as_ref())
            })
            // values are validated when they enter the settings map
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl datafusion::config::ExtensionOptions for GroupwiseConfig {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn cloned(&self) -> Box<dyn datafusion::config::ExtensionOptions> {
        Box::new(self.clone())
    }

    fn set(&mut self, key: &str, value: &str) -> datafusion::error::Result<()> {
        let entries = Self::valid_entries();
        let k = format!("{}.{key}", <GroupwiseConfig as datafusion::config::ConfigExtension>::PREFIX);

        match entries.get(&k) {
            Some(entry) => {
                if let Err(e) = Self::parse_value(value, entry.data_type.clone()) {
                    return config_err!(
                        "Failed to parse value '{}' for configuration setting '{}': {}",
                        value,
                        k,
                        e
                    );
                }
                self.settings.insert(k, value.to_string());
                Ok(())
            }
            None => config_err!("configuration key `{}` does not exist", key),
        }
    }

    fn entries(&self) -> Vec<datafusion::config::ConfigEntry> {
        Self::valid_entries()
            .iter()
            .map(|(key, value)| datafusion::config::ConfigEntry {
                key: key.clone(),
                value: self
                    .settings
                    .get(key)
                    .cloned()
                    .or(value.default_value.clone()),
                description: &value.description,
            })
            .collect()
    }
}

impl datafusion::config::ConfigExtension for GroupwiseConfig {
    const PREFIX: &'static str = "groupwise";
}
