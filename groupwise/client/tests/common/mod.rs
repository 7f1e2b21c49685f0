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

use datafusion::arrow::array::{Array, ArrayRef, AsArray, Int64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Int64Type};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;
use datafusion::prelude::{DataFrame, SessionContext};
use groupwise::prelude::{SessionContextExt, UdafOptions};

/// session context with groupwise configuration and test logging
#[allow(dead_code)]
pub fn groupwise_context() -> SessionContext {
    let _ = env_logger::builder().is_test(true).try_init();
    SessionContext::groupwise()
}

#[allow(dead_code)]
pub fn strings(values: Vec<&str>) -> ArrayRef {
    Arc::new(StringArray::from(values))
}

#[allow(dead_code)]
pub fn ints(values: Vec<i64>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

#[allow(dead_code)]
pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    RecordBatch::try_from_iter(columns).expect("valid test batch")
}

#[allow(dead_code)]
pub fn frame(ctx: &SessionContext, columns: Vec<(&str, ArrayRef)>) -> DataFrame {
    ctx.read_batch(batch(columns)).expect("test data frame")
}

/// options for a shuffle partition count, `None` keeps the session default
#[allow(dead_code)]
pub fn options(partitions: Option<usize>) -> UdafOptions {
    match partitions {
        Some(n) => UdafOptions::new().with_partitions(n),
        None => UdafOptions::new(),
    }
}

/// Sum of every Int64 column of `table`
#[allow(dead_code)]
pub fn column_sums(table: &RecordBatch) -> Vec<(String, ScalarValue)> {
    let schema = table.schema();
    schema
        .fields()
        .iter()
        .zip(table.columns())
        .filter(|(field, _)| field.data_type() == &DataType::Int64)
        .map(|(field, column)| {
            let sum = datafusion::arrow::compute::sum(column.as_primitive::<Int64Type>());
            (field.name().clone(), ScalarValue::Int64(sum))
        })
        .collect()
}

/// First value of the Int64 column `name`
#[allow(dead_code)]
pub fn first_int(table: &RecordBatch, name: &str) -> Option<i64> {
    table
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .filter(|c| !c.is_empty() && c.is_valid(0))
        .map(|c| c.value(0))
}
