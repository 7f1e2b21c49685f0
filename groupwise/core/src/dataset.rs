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

//! Inputs of the transform: DataFusion data frames or raw record collections.

use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};

use crate::error::{GroupwiseError, Result};

/// A distributed dataset taking part in a group-join-apply transform
#[derive(Debug)]
pub enum Dataset {
    /// A DataFusion data frame
    Frame(DataFrame),
    /// Raw record batches, one inner vector per partition
    Records {
        schema: SchemaRef,
        partitions: Vec<Vec<RecordBatch>>,
    },
}

impl Dataset {
    /// Single partition record collection, schema taken from the first batch
    pub fn from_batches(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches.first().map(|b| b.schema()).ok_or_else(|| {
            GroupwiseError::Configuration(
                "cannot determine the schema of an empty record collection".to_string(),
            )
        })?;
        Ok(Self::from_partitions(schema, vec![batches]))
    }

    pub fn from_partitions(schema: SchemaRef, partitions: Vec<Vec<RecordBatch>>) -> Self {
        Dataset::Records { schema, partitions }
    }

    /// Resolves the dataset to a data frame, record collections are
    /// registered as in-memory tables of `ctx`
    pub fn into_dataframe(self, ctx: &SessionContext) -> Result<DataFrame> {
        match self {
            Dataset::Frame(df) => Ok(df),
            Dataset::Records { schema, partitions } => {
                let partitions = if partitions.is_empty() {
                    vec![vec![]]
                } else {
                    partitions
                };
                let table = MemTable::try_new(schema, partitions)?;
                Ok(ctx.read_table(Arc::new(table))?)
            }
        }
    }
}

impl From<DataFrame> for Dataset {
    fn from(df: DataFrame) -> Self {
        Dataset::Frame(df)
    }
}
