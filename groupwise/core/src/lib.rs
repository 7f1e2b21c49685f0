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

#![doc = include_str!("../README.md")]

/// Aggregate results of group functions and their output rows.
pub mod aggregate;
/// Configuration options and settings for the transform.
pub mod config;
/// Transform inputs.
pub mod dataset;
/// Error types and result definitions for Groupwise operations.
pub mod error;
/// Extension traits for DataFusion session configuration.
pub mod extension;
/// User supplied group functions and keyword arguments.
pub mod function;
/// Key grouping and key-wise inner join of co-located partitions.
pub mod group;
/// Grouping keys and key values.
pub mod key;
/// Record batch reconstruction from output rows.
pub mod output;
/// Co-location of keys across datasets.
pub mod partition;
/// The group-join-apply transform.
pub mod udaf;
/// General utility functions.
pub mod utils;
