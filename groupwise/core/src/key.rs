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

//! Grouping keys and the key values extracted from record batches.

use std::fmt::{Display, Formatter};

use datafusion::arrow::array::ArrayRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;

use crate::error::{GroupwiseError, Result};

/// Field or fields whose values define group membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupBy {
    /// Group by a single field
    Single(String),
    /// Group by an ordered list of fields, key values are tuples in this order
    Composite(Vec<String>),
}

impl GroupBy {
    /// Field names in key order
    pub fn names(&self) -> &[String] {
        match self {
            GroupBy::Single(name) => std::slice::from_ref(name),
            GroupBy::Composite(names) => names,
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }

    /// Fails for an empty field list.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(GroupwiseError::Configuration(
                "at least one group by field is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Column indices of the key fields within `batch`
    pub fn indices(&self, batch: &RecordBatch) -> Result<Vec<usize>> {
        let schema = batch.schema();
        self.names()
            .iter()
            .map(|name| schema.index_of(name).map_err(GroupwiseError::from))
            .collect()
    }
}

impl Display for GroupBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupBy::Single(name) => write!(f, "{name}"),
            GroupBy::Composite(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

impl From<&str> for GroupBy {
    fn from(name: &str) -> Self {
        GroupBy::Single(name.to_string())
    }
}

impl From<String> for GroupBy {
    fn from(name: String) -> Self {
        GroupBy::Single(name)
    }
}

impl From<Vec<String>> for GroupBy {
    fn from(names: Vec<String>) -> Self {
        GroupBy::Composite(names)
    }
}

impl From<Vec<&str>> for GroupBy {
    fn from(names: Vec<&str>) -> Self {
        GroupBy::Composite(names.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for GroupBy {
    fn from(names: [&str; N]) -> Self {
        GroupBy::Composite(names.into_iter().map(str::to_string).collect())
    }
}

/// Value of a grouping key for one group, one entry per key field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue(Vec<ScalarValue>);

impl KeyValue {
    pub fn new(values: Vec<ScalarValue>) -> Self {
        Self(values)
    }

    /// Reads the key of row `row` from the key `columns`
    pub fn try_from_row(columns: &[&ArrayRef], row: usize) -> Result<Self> {
        let values = columns
            .iter()
            .map(|c| ScalarValue::try_from_array(c, row))
            .collect::<datafusion::error::Result<Vec<_>>>()?;
        Ok(Self(values))
    }

    pub fn values(&self) -> &[ScalarValue] {
        &self.0
    }

    /// Pairs key field names with values, positionally
    pub fn named<'a>(
        &'a self,
        by: &'a GroupBy,
    ) -> impl Iterator<Item = (&'a String, &'a ScalarValue)> {
        by.names().iter().zip(self.0.iter())
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            values => {
                let values = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "({})", values.join(", "))
            }
        }
    }
}
