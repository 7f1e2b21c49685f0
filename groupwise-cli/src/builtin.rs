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

//! Built-in group functions offered on the command line.

use clap::ValueEnum;
use datafusion::arrow::array::{Array, AsArray, Float64Array};
use datafusion::arrow::compute::{self, cast};
use datafusion::arrow::datatypes::{DataType, Float64Type};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::ScalarValue;
use groupwise::prelude::{Aggregate, GroupBy, GroupFunction, Kwargs, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuiltinAggregate {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl BuiltinAggregate {
    fn reduce(&self, values: &Float64Array) -> Option<f64> {
        let count = values.len() - values.null_count();
        match self {
            BuiltinAggregate::Sum => compute::sum(values),
            BuiltinAggregate::Min => compute::min(values),
            BuiltinAggregate::Max => compute::max(values),
            BuiltinAggregate::Count => Some(count as f64),
            BuiltinAggregate::Mean => compute::sum(values).map(|sum| sum / count as f64),
        }
    }
}

/// Applies a [BuiltinAggregate] to every numeric non-key column of each
/// table of a joined group. Columns of the `i`-th dataset (`i > 0`) are
/// suffixed with `_{i}`.
#[derive(Debug, Clone)]
pub struct BuiltinFunction {
    aggregate: BuiltinAggregate,
    by: GroupBy,
}

impl BuiltinFunction {
    pub fn new(aggregate: BuiltinAggregate, by: GroupBy) -> Self {
        Self { aggregate, by }
    }

    fn column_name(name: &str, dataset: usize) -> String {
        if dataset == 0 {
            name.to_string()
        } else {
            format!("{name}_{dataset}")
        }
    }

    fn aggregate_table(
        &self,
        dataset: usize,
        table: &RecordBatch,
        fields: &mut Vec<(String, ScalarValue)>,
    ) -> Result<()> {
        if self.aggregate == BuiltinAggregate::Count {
            fields.push((
                Self::column_name("count", dataset),
                ScalarValue::Int64(Some(table.num_rows() as i64)),
            ));
            return Ok(());
        }

        let schema = table.schema();
        for (field, column) in schema.fields().iter().zip(table.columns()) {
            if self.by.names().contains(field.name()) || !field.data_type().is_numeric() {
                continue;
            }
            let values = cast(column, &DataType::Float64)?;
            let value = self.aggregate.reduce(values.as_primitive::<Float64Type>());
            fields.push((
                Self::column_name(field.name(), dataset),
                ScalarValue::Float64(value),
            ));
        }
        Ok(())
    }
}

impl GroupFunction for BuiltinFunction {
    fn call(&self, tables: &[RecordBatch], _kwargs: &Kwargs) -> Result<Aggregate> {
        let mut fields = vec![];
        for (dataset, table) in tables.iter().enumerate() {
            self.aggregate_table(dataset, table, &mut fields)?;
        }
        Ok(Aggregate::Row(fields))
    }
}
