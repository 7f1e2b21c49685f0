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

//! Reconstruction of record batches from normalized output rows.

use std::collections::BTreeMap;
use std::sync::Arc;

use datafusion::arrow::array::{new_empty_array, ArrayRef};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::common::ScalarValue;

use crate::aggregate::OutputRow;
use crate::error::{GroupwiseError, Result};

/// Infers the output schema of `partitions`.
///
/// Columns are the union of all row columns, sorted by name. A column takes
/// the type of its first non-null value, or [DataType::Null] when every
/// value is null. All fields are nullable.
pub fn infer_schema<'a>(rows: impl IntoIterator<Item = &'a OutputRow>) -> SchemaRef {
    let mut types: BTreeMap<&str, DataType> = BTreeMap::new();
    for row in rows {
        for (name, value) in row.iter() {
            let data_type = types.entry(name.as_str()).or_insert(DataType::Null);
            if *data_type == DataType::Null && !value.is_null() {
                *data_type = value.data_type();
            }
        }
    }

    let fields = types
        .into_iter()
        .map(|(name, data_type)| Field::new(name, data_type, true))
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

/// Builds one record batch with `schema` from `rows`.
///
/// Row values are matched to fields by name and cast to the field type.
/// Fields a row lacks are null. A row column that the schema does not
/// contain is an error.
pub fn rows_to_batch(schema: SchemaRef, rows: &[OutputRow]) -> Result<RecordBatch> {
    for row in rows {
        if let Some(name) = row.columns().find(|c| schema.index_of(c).is_err()) {
            return Err(GroupwiseError::Configuration(format!(
                "output column '{name}' is not part of the output schema {schema}"
            )));
        }
    }

    let columns = schema
        .fields()
        .iter()
        .map(|field| build_column(field, rows))
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(schema, columns, &options)?)
}

fn build_column(field: &Field, rows: &[OutputRow]) -> Result<ArrayRef> {
    if rows.is_empty() {
        return Ok(new_empty_array(field.data_type()));
    }

    let null = ScalarValue::try_from(field.data_type())?;
    let values = rows
        .iter()
        .map(|row| match row.get(field.name()) {
            Some(value) if value.is_null() => Ok(null.clone()),
            Some(value) if value.data_type() == *field.data_type() => Ok(value.clone()),
            Some(value) => value.cast_to(field.data_type()).map_err(|e| {
                GroupwiseError::General(format!(
                    "cannot convert value {value} of column '{}' to {}: {e}",
                    field.name(),
                    field.data_type()
                ))
            }),
            None if field.is_nullable() => Ok(null.clone()),
            None => Err(GroupwiseError::Configuration(format!(
                "non-nullable output column '{}' is missing a value",
                field.name()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ScalarValue::iter_to_array(values)?)
}
