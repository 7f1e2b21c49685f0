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

//! Aggregate results returned by group functions and their normalization
//! into output rows.

use std::collections::BTreeMap;

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;

use crate::error::Result;
use crate::key::{GroupBy, KeyValue};

/// Column name used for scalar aggregates
pub const SCALAR_VALUE_COLUMN: &str = "value";

/// Value returned by a group function for one group.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// A single value, emitted in the `value` column
    Scalar(ScalarValue),
    /// A single row of named values. An empty row emits the key alone.
    Row(Vec<(String, ScalarValue)>),
    /// Any number of rows, each emitted with the key attached
    Table(RecordBatch),
}

impl Aggregate {
    /// Converts the aggregate of the group identified by `key` into output rows.
    ///
    /// Key fields are written after the aggregate's own fields and replace
    /// any field with the same name.
    pub fn into_rows(self, by: &GroupBy, key: &KeyValue) -> Result<Vec<OutputRow>> {
        let rows = match self {
            Aggregate::Scalar(value) => {
                let mut row = OutputRow::default();
                row.insert(SCALAR_VALUE_COLUMN, value);
                vec![row]
            }
            Aggregate::Row(fields) => {
                vec![fields.into_iter().collect::<OutputRow>()]
            }
            Aggregate::Table(batch) => {
                let schema = batch.schema();
                let mut rows = Vec::with_capacity(batch.num_rows());
                for row_idx in 0..batch.num_rows() {
                    let mut row = OutputRow::default();
                    for (field, column) in schema.fields().iter().zip(batch.columns()) {
                        row.insert(
                            field.name(),
                            ScalarValue::try_from_array(column, row_idx)?,
                        );
                    }
                    rows.push(row);
                }
                rows
            }
        };

        Ok(rows
            .into_iter()
            .map(|mut row| {
                for (name, value) in key.named(by) {
                    row.insert(name, value.clone());
                }
                row
            })
            .collect())
    }
}

impl From<ScalarValue> for Aggregate {
    fn from(value: ScalarValue) -> Self {
        Aggregate::Scalar(value)
    }
}

impl From<RecordBatch> for Aggregate {
    fn from(batch: RecordBatch) -> Self {
        Aggregate::Table(batch)
    }
}

impl<K: Into<String>> From<Vec<(K, ScalarValue)>> for Aggregate {
    fn from(fields: Vec<(K, ScalarValue)>) -> Self {
        Aggregate::Row(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One output record, columns ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputRow(BTreeMap<String, ScalarValue>);

impl OutputRow {
    pub fn insert(&mut self, name: impl Into<String>, value: ScalarValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScalarValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, ScalarValue)> for OutputRow {
    fn from_iter<T: IntoIterator<Item = (K, ScalarValue)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
