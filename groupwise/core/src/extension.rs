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

use crate::config::{
    GroupwiseConfig, GROUPWISE_MAX_CONCURRENT_TASKS, GROUPWISE_SHUFFLE_PARTITIONS,
};
use datafusion::execution::context::SessionConfig;

/// [SessionConfig] extension with methods needed
/// for Groupwise configuration
pub trait SessionConfigExt {
    /// Creates session config which has
    /// groupwise configuration initialized
    fn new_with_groupwise() -> SessionConfig;

    /// update [SessionConfig] with Groupwise specific settings
    fn upgrade_for_groupwise(self) -> SessionConfig;

    /// return groupwise specific configuration or
    /// creates one if does not exist
    fn groupwise_config(&self) -> GroupwiseConfig;

    /// retrieves number of hash partitions used by the group-by shuffle
    fn groupwise_shuffle_partitions(&self) -> usize;

    /// sets number of hash partitions used by the group-by shuffle,
    /// `0` disables the shuffle
    fn with_groupwise_shuffle_partitions(self, partitions: usize) -> Self;

    /// retrieves maximum number of partitions processed concurrently
    fn groupwise_max_concurrent_tasks(&self) -> usize;

    /// sets maximum number of partitions processed concurrently
    fn with_groupwise_max_concurrent_tasks(self, tasks: usize) -> Self;
}

impl SessionConfigExt for SessionConfig {
    fn new_with_groupwise() -> SessionConfig {
        SessionConfig::new()
            .with_option_extension(GroupwiseConfig::default())
            .with_information_schema(true)
    }

    fn upgrade_for_groupwise(self) -> SessionConfig {
        // if groupwise config is not provided
        // one is created and session config is updated
        let groupwise_config = self.groupwise_config();
        self.with_option_extension(groupwise_config)
    }

    fn groupwise_config(&self) -> GroupwiseConfig {
        self.options()
            .extensions
            .get::<GroupwiseConfig>()
            .cloned()
            .unwrap_or_default()
    }

    fn groupwise_shuffle_partitions(&self) -> usize {
        self.groupwise_config().shuffle_partitions()
    }

    fn with_groupwise_shuffle_partitions(self, partitions: usize) -> Self {
        if self.options().extensions.get::<GroupwiseConfig>().is_some() {
            self.set_usize(GROUPWISE_SHUFFLE_PARTITIONS, partitions)
        } else {
            self.with_option_extension(GroupwiseConfig::default())
                .set_usize(GROUPWISE_SHUFFLE_PARTITIONS, partitions)
        }
    }

    fn groupwise_max_concurrent_tasks(&self) -> usize {
        self.groupwise_config().max_concurrent_tasks()
    }

    fn with_groupwise_max_concurrent_tasks(self, tasks: usize) -> Self {
        if self.options().extensions.get::<GroupwiseConfig>().is_some() {
            self.set_usize(GROUPWISE_MAX_CONCURRENT_TASKS, tasks)
        } else {
            self.with_option_extension(GroupwiseConfig::default())
                .set_usize(GROUPWISE_MAX_CONCURRENT_TASKS, tasks)
        }
    }
}
