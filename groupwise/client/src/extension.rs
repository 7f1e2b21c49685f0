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

use std::sync::Arc;

use datafusion::prelude::{DataFrame, SessionConfig, SessionContext};
use groupwise_core::{
    dataset::Dataset,
    extension::SessionConfigExt,
    function::GroupFunction,
    key::GroupBy,
    udaf::{udaf_with_function, UdafOptions},
};

/// [SessionContext] extension which provides group-wise user defined
/// aggregation over DataFusion data frames
#[async_trait::async_trait]
pub trait SessionContextExt {
    /// Create a context with the groupwise configuration extension registered
    fn groupwise() -> SessionContext;

    /// Create a context from `config`, registering the groupwise
    /// configuration extension when missing
    fn groupwise_with_config(config: SessionConfig) -> SessionContext;

    /// Applies `func` to the groups of every key of `by` present in all
    /// `datasets`, see [groupwise_core::udaf::udaf]
    async fn udaf<B, F>(
        &self,
        by: B,
        func: F,
        datasets: Vec<Dataset>,
        options: UdafOptions,
    ) -> datafusion::error::Result<DataFrame>
    where
        B: Into<GroupBy> + Send,
        F: GroupFunction + 'static;
}

#[async_trait::async_trait]
impl SessionContextExt for SessionContext {
    fn groupwise() -> SessionContext {
        SessionContext::new_with_config(SessionConfig::new_with_groupwise())
    }

    fn groupwise_with_config(config: SessionConfig) -> SessionContext {
        SessionContext::new_with_config(config.upgrade_for_groupwise())
    }

    async fn udaf<B, F>(
        &self,
        by: B,
        func: F,
        datasets: Vec<Dataset>,
        options: UdafOptions,
    ) -> datafusion::error::Result<DataFrame>
    where
        B: Into<GroupBy> + Send,
        F: GroupFunction + 'static,
    {
        let by = by.into();
        log::debug!("Group-join-apply by {by} requested on session {}", self.session_id());
        Ok(udaf_with_function(self, by, Arc::new(func), datasets, options).await?)
    }
}
