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

//! Groupwise Prelude (common imports)

pub use groupwise_core::{
    aggregate::{Aggregate, SCALAR_VALUE_COLUMN},
    config::{GroupwiseConfig, GROUPWISE_MAX_CONCURRENT_TASKS, GROUPWISE_SHUFFLE_PARTITIONS},
    dataset::Dataset,
    error::{GroupwiseError, Result},
    extension::SessionConfigExt,
    function::{GroupFunction, Kwargs},
    key::GroupBy,
    udaf::UdafOptions,
};

pub use crate::extension::SessionContextExt;
