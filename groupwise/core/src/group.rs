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

//! Key grouping of co-located dataset partitions and the key-wise inner join
//! across datasets.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use datafusion::arrow::array::UInt32Array;
use datafusion::arrow::compute::{concat_batches, take_record_batch};
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;

use crate::error::{GroupwiseError, Result};
use crate::key::{GroupBy, KeyValue};

/// Rows of one dataset partition grouped by key, keys in order of first
/// appearance.
#[derive(Debug)]
pub struct PartitionGroups {
    batch: RecordBatch,
    index: HashMap<KeyValue, usize>,
    groups: Vec<(KeyValue, Vec<u32>)>,
}

impl PartitionGroups {
    pub fn try_new(schema: &SchemaRef, batches: &[RecordBatch], by: &GroupBy) -> Result<Self> {
        let batch = concat_batches(schema, batches)?;
        let key_columns = by
            .indices(&batch)?
            .into_iter()
            .map(|i| batch.column(i))
            .collect::<Vec<_>>();

        let mut index: HashMap<KeyValue, usize> = HashMap::new();
        let mut groups: Vec<(KeyValue, Vec<u32>)> = vec![];
        for row in 0..batch.num_rows() {
            let key = KeyValue::try_from_row(&key_columns, row)?;
            let row = u32::try_from(row).map_err(|_| {
                GroupwiseError::Internal(format!(
                    "partition with {} rows exceeds the addressable row count",
                    batch.num_rows()
                ))
            })?;
            match index.entry(key) {
                Entry::Occupied(e) => groups[*e.get()].1.push(row),
                Entry::Vacant(e) => {
                    groups.push((e.key().clone(), vec![row]));
                    e.insert(groups.len() - 1);
                }
            }
        }

        Ok(Self {
            batch,
            index,
            groups,
        })
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyValue> {
        self.groups.iter().map(|(k, _)| k)
    }

    /// Row indices of `key` within this partition
    pub fn rows(&self, key: &KeyValue) -> Option<&[u32]> {
        self.index.get(key).map(|&i| self.groups[i].1.as_slice())
    }

    /// Copies `rows` into a new local table
    pub fn take(&self, rows: &[u32]) -> Result<RecordBatch> {
        let indices = UInt32Array::from(rows.to_vec());
        Ok(take_record_batch(&self.batch, &indices)?)
    }
}

/// A key present in every dataset with the matching row indices of each
/// dataset, in dataset order.
#[derive(Debug)]
pub struct JoinedRows<'a> {
    pub key: &'a KeyValue,
    pub rows: Vec<&'a [u32]>,
}

impl JoinedRows<'_> {
    /// Materializes one local table per dataset
    pub fn materialize(self, groupings: &[PartitionGroups]) -> Result<JoinedGroup> {
        if self.rows.len() != groupings.len() {
            return Err(GroupwiseError::Internal(format!(
                "joined group has {} row sets but {} datasets were grouped",
                self.rows.len(),
                groupings.len()
            )));
        }
        let tables = groupings
            .iter()
            .zip(self.rows)
            .map(|(grouping, rows)| grouping.take(rows))
            .collect::<Result<Vec<_>>>()?;
        Ok(JoinedGroup {
            key: self.key.clone(),
            tables,
        })
    }
}

/// Key value with one local table per input dataset, in input order
#[derive(Debug, Clone)]
pub struct JoinedGroup {
    pub key: KeyValue,
    pub tables: Vec<RecordBatch>,
}

/// Inner joins the groupings of co-located partitions by key.
///
/// The join folds pairwise in dataset order: keys of the first grouping
/// survive only when every following grouping contains them.
pub fn inner_join(groupings: &[PartitionGroups]) -> Vec<JoinedRows<'_>> {
    let Some((first, others)) = groupings.split_first() else {
        return vec![];
    };

    let joined = first
        .groups
        .iter()
        .map(|(key, rows)| JoinedRows {
            key,
            rows: vec![rows.as_slice()],
        })
        .collect::<Vec<_>>();

    others.iter().fold(joined, |joined, other| {
        joined
            .into_iter()
            .filter_map(|mut j| {
                let rows = other.rows(j.key)?;
                j.rows.push(rows);
                Some(j)
            })
            .collect()
    })
}
