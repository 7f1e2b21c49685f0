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

//! User supplied group functions and the keyword arguments forwarded to them.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;

use crate::aggregate::Aggregate;
use crate::error::{GroupwiseError, Result};

/// Aggregation applied to every joined group.
///
/// `tables` holds one local table per input dataset, in input order. Each
/// table carries all columns of its dataset, key columns included.
/// Implemented for closures of the same shape.
pub trait GroupFunction: Send + Sync {
    fn call(&self, tables: &[RecordBatch], kwargs: &Kwargs) -> Result<Aggregate>;
}

impl<F> GroupFunction for F
where
    F: Fn(&[RecordBatch], &Kwargs) -> Result<Aggregate> + Send + Sync,
{
    fn call(&self, tables: &[RecordBatch], kwargs: &Kwargs) -> Result<Aggregate> {
        self(tables, kwargs)
    }
}

pub type GroupFunctionRef = Arc<dyn GroupFunction>;

/// Named arguments passed unchanged to every [GroupFunction] invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs(BTreeMap<String, ScalarValue>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.0.get(name)
    }

    /// Like [Kwargs::get] but fails when the argument was not supplied
    pub fn require(&self, name: &str) -> Result<&ScalarValue> {
        self.get(name).ok_or_else(|| {
            GroupwiseError::General(format!("missing keyword argument '{name}'"))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScalarValue)> {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Kwargs
where
    K: Into<String>,
    V: Into<ScalarValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
