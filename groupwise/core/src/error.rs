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

//! Groupwise error types

use std::{
    error::Error,
    fmt::{Display, Formatter},
    result,
};

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;

/// Result type alias for Groupwise operations.
pub type Result<T> = result::Result<T, GroupwiseError>;

/// Groupwise error types.
#[derive(Debug)]
pub enum GroupwiseError {
    /// General error with a descriptive message.
    General(String),
    /// Internal error indicating a bug or unexpected state.
    Internal(String),
    /// Invalid transform input or configuration.
    Configuration(String),
    /// Error from Arrow operations.
    ArrowError(Box<ArrowError>),
    /// Error from DataFusion operations.
    DataFusionError(Box<DataFusionError>),
    /// Tokio task join error.
    TokioError(tokio::task::JoinError),
}

impl From<String> for GroupwiseError {
    fn from(e: String) -> Self {
        GroupwiseError::General(e)
    }
}

impl From<ArrowError> for GroupwiseError {
    fn from(e: ArrowError) -> Self {
        match e {
            ArrowError::ExternalError(e)
                if e.downcast_ref::<GroupwiseError>().is_some() =>
            {
                match e.downcast::<GroupwiseError>() {
                    Ok(e) => *e,
                    Err(e) => GroupwiseError::ArrowError(Box::new(
                        ArrowError::ExternalError(e),
                    )),
                }
            }
            ArrowError::ExternalError(e)
                if e.downcast_ref::<DataFusionError>().is_some() =>
            {
                match e.downcast::<DataFusionError>() {
                    Ok(e) => GroupwiseError::DataFusionError(e),
                    Err(e) => GroupwiseError::ArrowError(Box::new(
                        ArrowError::ExternalError(e),
                    )),
                }
            }
            other => GroupwiseError::ArrowError(Box::new(other)),
        }
    }
}

impl From<DataFusionError> for GroupwiseError {
    fn from(e: DataFusionError) -> Self {
        match e {
            DataFusionError::ArrowError(e, _) => Self::from(e),
            DataFusionError::External(e)
                if e.downcast_ref::<GroupwiseError>().is_some() =>
            {
                match e.downcast::<GroupwiseError>() {
                    Ok(e) => *e,
                    Err(e) => GroupwiseError::DataFusionError(Box::new(
                        DataFusionError::External(e),
                    )),
                }
            }
            _ => GroupwiseError::DataFusionError(Box::new(e)),
        }
    }
}

impl From<tokio::task::JoinError> for GroupwiseError {
    fn from(e: tokio::task::JoinError) -> Self {
        GroupwiseError::TokioError(e)
    }
}

impl From<GroupwiseError> for DataFusionError {
    fn from(e: GroupwiseError) -> Self {
        match e {
            GroupwiseError::DataFusionError(e) => *e,
            GroupwiseError::ArrowError(e) => DataFusionError::ArrowError(*e, None),
            GroupwiseError::Configuration(desc) => DataFusionError::Configuration(desc),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

impl Display for GroupwiseError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GroupwiseError::General(desc) => write!(f, "General error: {desc}"),
            GroupwiseError::Internal(desc) => {
                write!(f, "Internal Groupwise error: {desc}")
            }
            GroupwiseError::Configuration(desc) => {
                write!(f, "Configuration error: {desc}")
            }
            GroupwiseError::ArrowError(desc) => write!(f, "Arrow error: {desc}"),
            GroupwiseError::DataFusionError(desc) => {
                write!(f, "DataFusion error: {desc}")
            }
            GroupwiseError::TokioError(desc) => write!(f, "Tokio join error: {desc}"),
        }
    }
}

impl Error for GroupwiseError {}
