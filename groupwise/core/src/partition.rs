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

//! Co-location of equal keys across datasets.
//!
//! Datasets are shuffled by the engine with a physical hash repartition on
//! the key columns, so partition `i` of every dataset holds the same key
//! values. When the shuffle is disabled the collected batches are bucketed
//! locally with the engine's [BatchPartitioner], which uses the same hash
//! function.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::execution::context::TaskContext;
use datafusion::logical_expr::{cast, ident};
use datafusion::physical_expr::PhysicalExpr;
use datafusion::physical_plan::expressions::Column;
use datafusion::physical_plan::metrics;
use datafusion::physical_plan::repartition::{BatchPartitioner, RepartitionExec};
use datafusion::physical_plan::{
    execute_stream, execute_stream_partitioned, ExecutionPlan, Partitioning,
    SendableRecordBatchStream,
};
use datafusion::prelude::DataFrame;
use futures::StreamExt;
use log::debug;

use crate::error::Result;
use crate::key::GroupBy;
use crate::utils;

/// Casts the key columns of every dataset after the first to the key types of
/// the first dataset, so that equal keys hash and compare equal.
pub fn align_key_types(frames: Vec<DataFrame>, by: &GroupBy) -> Result<Vec<DataFrame>> {
    let Some(first) = frames.first() else {
        return Ok(frames);
    };
    let key_types = key_data_types(first, by)?;

    frames
        .into_iter()
        .enumerate()
        .map(|(i, mut df)| -> Result<DataFrame> {
            if i == 0 {
                return Ok(df);
            }
            for (name, data_type) in by.names().iter().zip(&key_types) {
                let current = df
                    .schema()
                    .field_with_unqualified_name(name)?
                    .data_type()
                    .clone();
                if &current != data_type {
                    debug!(
                        "Casting key column '{name}' of dataset {i} from {current} to {data_type}"
                    );
                    df = df.with_column(name, cast(ident(name), data_type.clone()))?;
                }
            }
            Ok(df)
        })
        .collect()
}

fn key_data_types(df: &DataFrame, by: &GroupBy) -> Result<Vec<DataType>> {
    by.names()
        .iter()
        .map(|name| -> Result<DataType> {
            Ok(df
                .schema()
                .field_with_unqualified_name(name)?
                .data_type()
                .clone())
        })
        .collect()
}

/// A dataset planned for execution
pub struct PlannedDataset {
    pub schema: SchemaRef,
    plan: Arc<dyn ExecutionPlan>,
    task_ctx: Arc<TaskContext>,
}

/// Plans `df`, hash repartitioned on the key into `n_partitions` partitions
/// unless `n_partitions` is zero.
/// The hash repartition wraps the optimized physical plan.
pub async fn plan_dataset(
    df: DataFrame,
    by: &GroupBy,
    n_partitions: usize,
) -> Result<PlannedDataset> {
    let task_ctx = Arc::new(df.task_ctx());
    let mut plan = df.create_physical_plan().await?;
    if n_partitions > 0 {
        let exprs = key_exprs(by, &plan.schema())?;
        plan = Arc::new(RepartitionExec::try_new(
            plan,
            Partitioning::Hash(exprs, n_partitions),
        )?);
    }
    Ok(PlannedDataset {
        schema: plan.schema(),
        plan,
        task_ctx,
    })
}

/// Physical column expressions of the key fields within `schema`
fn key_exprs(by: &GroupBy, schema: &SchemaRef) -> Result<Vec<Arc<dyn PhysicalExpr>>> {
    by.names()
        .iter()
        .map(|name| -> Result<Arc<dyn PhysicalExpr>> {
            Ok(Arc::new(Column::new_with_schema(name, schema)?) as Arc<dyn PhysicalExpr>)
        })
        .collect()
}

impl PlannedDataset {
    /// True when the plan output is hash partitioned on exactly the key
    /// columns into `n_partitions` partitions
    fn is_partitioned_by(&self, by: &GroupBy, n_partitions: usize) -> bool {
        match self.plan.properties().output_partitioning() {
            Partitioning::Hash(exprs, count)
                if *count == n_partitions && exprs.len() == by.len() =>
            {
                exprs.iter().zip(by.names()).all(|(expr, name)| {
                    expr.as_any()
                        .downcast_ref::<Column>()
                        .map(|c| c.name() == name.as_str())
                        .unwrap_or(false)
                })
            }
            _ => false,
        }
    }

    /// Executes the plan and buckets its output by key hash into
    /// `n_buckets` buckets
    async fn bucket(self, by: &GroupBy, n_buckets: usize) -> Result<Vec<Vec<RecordBatch>>> {
        let exprs = key_exprs(by, &self.schema)?;

        let mut partitioner = BatchPartitioner::try_new(
            Partitioning::Hash(exprs, n_buckets),
            metrics::Time::new(),
        )?;

        let mut buckets: Vec<Vec<RecordBatch>> = vec![vec![]; n_buckets];
        let mut stream = execute_stream(self.plan, self.task_ctx)?;
        while let Some(result) = stream.next().await {
            partitioner.partition(result?, |bucket, batch| {
                buckets[bucket].push(batch);
                Ok(())
            })?;
        }
        Ok(buckets)
    }
}

/// Data of one partition unit, one entry per dataset in dataset order
pub enum PartitionInput {
    /// Engine output partitions, not yet executed
    Streams(Vec<SendableRecordBatchStream>),
    /// Locally bucketed batches
    Batches(Vec<Vec<RecordBatch>>),
}

impl PartitionInput {
    pub async fn collect(self) -> Result<Vec<Vec<RecordBatch>>> {
        match self {
            PartitionInput::Streams(streams) => {
                let mut tables = Vec::with_capacity(streams.len());
                for mut stream in streams {
                    tables.push(utils::collect_stream(&mut stream).await?);
                }
                Ok(tables)
            }
            PartitionInput::Batches(batches) => Ok(batches),
        }
    }
}

/// A set of co-located partitions, one per dataset, holding the same keys
pub struct PartitionUnit {
    pub index: usize,
    pub schemas: Vec<SchemaRef>,
    pub input: PartitionInput,
}

/// Splits the planned datasets into partition units.
///
/// `n_partitions` is the requested shuffle partition count (zero when the
/// shuffle is disabled), `n_buckets` the unit count used when the datasets
/// must be bucketed locally.
pub async fn co_locate(
    planned: Vec<PlannedDataset>,
    by: &GroupBy,
    n_partitions: usize,
    n_buckets: usize,
) -> Result<Vec<PartitionUnit>> {
    let schemas = planned.iter().map(|p| p.schema.clone()).collect::<Vec<_>>();

    if n_partitions > 0 && planned.iter().all(|p| p.is_partitioned_by(by, n_partitions)) {
        let mut units = (0..n_partitions)
            .map(|_| Vec::with_capacity(planned.len()))
            .collect::<Vec<_>>();
        for dataset in planned {
            let streams = execute_stream_partitioned(dataset.plan, dataset.task_ctx)?;
            for (i, stream) in streams.into_iter().enumerate() {
                units[i].push(stream);
            }
        }
        return Ok(units
            .into_iter()
            .enumerate()
            .map(|(index, streams)| PartitionUnit {
                index,
                schemas: schemas.clone(),
                input: PartitionInput::Streams(streams),
            })
            .collect());
    }

    let n_buckets = n_buckets.max(1);
    debug!("Bucketing {} dataset(s) locally into {n_buckets} bucket(s) by {by}", planned.len());
    let mut units = (0..n_buckets)
        .map(|_| Vec::with_capacity(planned.len()))
        .collect::<Vec<_>>();
    for dataset in planned {
        for (i, batches) in dataset.bucket(by, n_buckets).await?.into_iter().enumerate() {
            units[i].push(batches);
        }
    }
    Ok(units
        .into_iter()
        .enumerate()
        .map(|(index, batches)| PartitionUnit {
            index,
            schemas: schemas.clone(),
            input: PartitionInput::Batches(batches),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
    use datafusion::prelude::SessionContext;

    fn frame(ctx: &SessionContext, users: Vec<i32>) -> Result<DataFrame> {
        let values = users.iter().map(|u| *u as i64 * 10).collect::<Vec<_>>();
        let batch = RecordBatch::try_from_iter(vec![
            ("user", Arc::new(Int32Array::from(users)) as ArrayRef),
            ("values", Arc::new(Int64Array::from(values)) as ArrayRef),
        ])?;
        Ok(ctx.read_batch(batch)?)
    }

    async fn unit_keys(units: Vec<PartitionUnit>) -> Result<Vec<Vec<Vec<i64>>>> {
        let mut result = vec![];
        for unit in units {
            let mut per_dataset = vec![];
            for batches in unit.input.collect().await? {
                let mut keys = vec![];
                for batch in batches {
                    let column = datafusion::arrow::compute::cast(
                        batch.column(0),
                        &DataType::Int64,
                    )?;
                    let column = column
                        .as_any()
                        .downcast_ref::<Int64Array>()
                        .expect("int64 keys");
                    keys.extend(column.iter().flatten());
                }
                keys.sort();
                keys.dedup();
                per_dataset.push(keys);
            }
            result.push(per_dataset);
        }
        Ok(result)
    }

    #[tokio::test]
    async fn aligns_key_types_to_first_dataset() -> Result<()> {
        let ctx = SessionContext::new();
        let first = ctx.read_batch(RecordBatch::try_from_iter(vec![(
            "user",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )])?)?;
        let second = frame(&ctx, vec![1, 2])?;

        let by = GroupBy::from("user");
        let aligned = align_key_types(vec![first, second], &by)?;
        let second = &aligned[1];
        assert_eq!(
            &DataType::Int64,
            second.schema().field_with_unqualified_name("user")?.data_type()
        );
        assert!(second.schema().field_with_unqualified_name("values").is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn missing_key_column_fails() -> Result<()> {
        let ctx = SessionContext::new();
        let first = frame(&ctx, vec![1])?;
        let second = ctx.read_batch(RecordBatch::try_from_iter(vec![(
            "other",
            Arc::new(StringArray::from(vec!["x"])) as ArrayRef,
        )])?)?;
        assert!(align_key_types(vec![first, second], &GroupBy::from("user")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn engine_shuffle_co_locates_keys() -> Result<()> {
        let ctx = SessionContext::new();
        let by = GroupBy::from("user");
        let mut planned = vec![];
        for users in [vec![1, 2, 3, 4, 5, 1], vec![5, 4, 3, 9]] {
            planned.push(plan_dataset(frame(&ctx, users)?, &by, 4).await?);
        }
        assert!(planned.iter().all(|p| p.is_partitioned_by(&by, 4)));

        let units = co_locate(planned, &by, 4, 4).await?;
        assert_eq!(4, units.len());
        assert!(units
            .iter()
            .all(|u| matches!(u.input, PartitionInput::Streams(_))));
        assert_co_located(unit_keys(units).await?);
        Ok(())
    }

    #[tokio::test]
    async fn local_bucketing_co_locates_keys() -> Result<()> {
        let ctx = SessionContext::new();
        let by = GroupBy::from("user");
        let mut planned = vec![];
        for users in [vec![1, 2, 3, 4, 5, 1], vec![5, 4, 3, 9]] {
            planned.push(plan_dataset(frame(&ctx, users)?, &by, 0).await?);
        }
        assert!(!planned[0].is_partitioned_by(&by, 3));

        let units = co_locate(planned, &by, 0, 3).await?;
        assert_eq!(3, units.len());
        assert!(units
            .iter()
            .all(|u| matches!(u.input, PartitionInput::Batches(_))));
        assert_co_located(unit_keys(units).await?);
        Ok(())
    }

    /// every key lives in exactly one unit, for every dataset
    fn assert_co_located(units: Vec<Vec<Vec<i64>>>) {
        let mut seen = std::collections::HashMap::new();
        for (unit, datasets) in units.iter().enumerate() {
            for keys in datasets {
                for key in keys {
                    let previous = seen.insert(*key, unit);
                    assert!(previous.is_none() || previous == Some(unit));
                }
            }
        }
        assert_eq!(6, seen.len());
    }
}
