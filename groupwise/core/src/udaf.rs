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

//! The group-join-apply transform.

use std::sync::Arc;
use std::time::Instant;

use datafusion::arrow::datatypes::{Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{DataFrame, SessionContext};
use log::{debug, error, info};
use tokio::task::JoinSet;

use crate::aggregate::OutputRow;
use crate::dataset::Dataset;
use crate::error::{GroupwiseError, Result};
use crate::extension::SessionConfigExt;
use crate::function::{GroupFunction, GroupFunctionRef, Kwargs};
use crate::group::{inner_join, PartitionGroups};
use crate::key::GroupBy;
use crate::output::{infer_schema, rows_to_batch};
use crate::partition::{align_key_types, co_locate, plan_dataset, PartitionUnit};

/// Per call options of [udaf]
#[derive(Debug, Clone, Default)]
pub struct UdafOptions {
    n_partitions: Option<usize>,
    schema: Option<SchemaRef>,
    kwargs: Kwargs,
}

impl UdafOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash partitions of the group-by shuffle, `0` disables the shuffle.
    /// Defaults to the session's `groupwise.shuffle_partitions`.
    pub fn with_partitions(mut self, n_partitions: usize) -> Self {
        self.n_partitions = Some(n_partitions);
        self
    }

    /// Explicit output schema, inferred from the output rows when absent
    pub fn with_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Adds a keyword argument forwarded to every function invocation
    pub fn with_kwarg(
        mut self,
        name: impl Into<String>,
        value: impl Into<datafusion::common::ScalarValue>,
    ) -> Self {
        self.kwargs.insert(name, value);
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn n_partitions(&self) -> Option<usize> {
        self.n_partitions
    }

    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }
}

/// Applies `func` to every key of `by` present in all `datasets`.
///
/// Each invocation receives the rows of that key from every dataset, as one
/// record batch per dataset in dataset order, plus the keyword arguments of
/// `options`. Keys missing from any dataset are skipped. The normalized
/// results, with the key columns attached, are returned as an in-memory data
/// frame of `ctx`. A failing invocation fails the whole call.
pub async fn udaf(
    ctx: &SessionContext,
    by: impl Into<GroupBy>,
    func: impl GroupFunction + 'static,
    datasets: Vec<Dataset>,
    options: UdafOptions,
) -> Result<DataFrame> {
    udaf_with_function(ctx, by.into(), Arc::new(func), datasets, options).await
}

/// [udaf] for an already shared group function
pub async fn udaf_with_function(
    ctx: &SessionContext,
    by: GroupBy,
    func: GroupFunctionRef,
    datasets: Vec<Dataset>,
    options: UdafOptions,
) -> Result<DataFrame> {
    by.validate()?;
    if datasets.is_empty() {
        return Err(GroupwiseError::Configuration(
            "at least one dataset is required".to_string(),
        ));
    }

    let now = Instant::now();
    let config = ctx.copied_config();
    let n_partitions = options
        .n_partitions
        .unwrap_or_else(|| config.groupwise_shuffle_partitions());
    let n_buckets = if n_partitions > 0 {
        n_partitions
    } else {
        config.target_partitions()
    };
    info!(
        "Applying group function by {by} over {} dataset(s), shuffle partitions: {n_partitions}",
        datasets.len()
    );

    let (key_schema, units) = plan_units(ctx, &by, datasets, n_partitions, n_buckets).await?;
    let outputs = apply_units(
        units,
        Arc::new(by),
        func,
        Arc::new(options.kwargs),
        config.groupwise_max_concurrent_tasks(),
    )
    .await?;

    let schema = match options.schema {
        Some(schema) => schema,
        None if outputs.iter().all(|rows| rows.is_empty()) => key_schema,
        None => infer_schema(outputs.iter().flatten()),
    };

    let mut num_rows = 0;
    let mut partitions = vec![];
    for rows in outputs.iter().filter(|rows| !rows.is_empty()) {
        num_rows += rows.len();
        partitions.push(vec![rows_to_batch(schema.clone(), rows)?]);
    }
    if partitions.is_empty() {
        partitions.push(vec![]);
    }

    info!(
        "Applied group function in {} ms, {num_rows} output row(s) in {} partition(s)",
        now.elapsed().as_millis(),
        partitions.len()
    );

    let table = MemTable::try_new(schema, partitions)?;
    Ok(ctx.read_table(Arc::new(table))?)
}

/// Plans the datasets and splits them into co-located partition units.
/// Returns the key columns of the first dataset alongside the units.
async fn plan_units(
    ctx: &SessionContext,
    by: &GroupBy,
    datasets: Vec<Dataset>,
    n_partitions: usize,
    n_buckets: usize,
) -> Result<(SchemaRef, Vec<PartitionUnit>)> {
    let frames = datasets
        .into_iter()
        .map(|d| d.into_dataframe(ctx))
        .collect::<Result<Vec<_>>>()?;
    let frames = align_key_types(frames, by)?;

    let mut planned = Vec::with_capacity(frames.len());
    for df in frames {
        planned.push(plan_dataset(df, by, n_partitions).await?);
    }
    let Some(first) = planned.first() else {
        return Err(GroupwiseError::Configuration(
            "at least one dataset is required".to_string(),
        ));
    };
    let key_schema = key_schema(&first.schema, by)?;

    let units = co_locate(planned, by, n_partitions, n_buckets).await?;
    Ok((key_schema, units))
}

/// Schema holding only the key columns, used for empty results
fn key_schema(schema: &SchemaRef, by: &GroupBy) -> Result<SchemaRef> {
    let fields = by
        .names()
        .iter()
        .map(|name| -> Result<Field> {
            let field = schema.field_with_name(name)?;
            Ok(Field::new(name, field.data_type().clone(), true))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(Schema::new(fields)))
}

/// Runs the partition units with at most `max_tasks` in flight. Output rows
/// are returned per unit, in unit order.
async fn apply_units(
    units: Vec<PartitionUnit>,
    by: Arc<GroupBy>,
    func: GroupFunctionRef,
    kwargs: Arc<Kwargs>,
    max_tasks: usize,
) -> Result<Vec<Vec<OutputRow>>> {
    let mut outputs: Vec<Vec<OutputRow>> = (0..units.len()).map(|_| vec![]).collect();
    let mut pending = units.into_iter();
    // dropping the set on error aborts the units still running
    let mut running = JoinSet::new();

    let spawn = |running: &mut JoinSet<Result<(usize, Vec<OutputRow>)>>,
                 unit: PartitionUnit| {
        let by = by.clone();
        let func = func.clone();
        let kwargs = kwargs.clone();
        running.spawn(async move {
            let index = unit.index;
            let rows = apply_unit(unit, by, func, kwargs).await?;
            Ok((index, rows))
        });
    };

    for unit in pending.by_ref().take(max_tasks.max(1)) {
        spawn(&mut running, unit);
    }
    while let Some(joined) = running.join_next().await {
        let (index, rows) = joined??;
        outputs[index] = rows;
        if let Some(unit) = pending.next() {
            spawn(&mut running, unit);
        }
    }

    Ok(outputs)
}

/// Collects the unit's input, then groups, joins and applies `func` on the
/// blocking thread pool.
async fn apply_unit(
    unit: PartitionUnit,
    by: Arc<GroupBy>,
    func: GroupFunctionRef,
    kwargs: Arc<Kwargs>,
) -> Result<Vec<OutputRow>> {
    let PartitionUnit {
        index,
        schemas,
        input,
    } = unit;
    let tables = input.collect().await?;

    tokio::task::spawn_blocking(move || {
        apply_groups(index, &schemas, &tables, &by, func.as_ref(), &kwargs)
    })
    .await?
}

fn apply_groups(
    index: usize,
    schemas: &[SchemaRef],
    tables: &[Vec<RecordBatch>],
    by: &GroupBy,
    func: &dyn GroupFunction,
    kwargs: &Kwargs,
) -> Result<Vec<OutputRow>> {
    let groupings = schemas
        .iter()
        .zip(tables)
        .map(|(schema, batches)| PartitionGroups::try_new(schema, batches, by))
        .collect::<Result<Vec<_>>>()?;

    let joined = inner_join(&groupings);
    debug!(
        "Partition {index}: {} of {} key(s) present in every dataset",
        joined.len(),
        groupings.first().map(|g| g.len()).unwrap_or_default()
    );

    let mut rows = vec![];
    for joined_rows in joined {
        let group = joined_rows.materialize(&groupings)?;
        let aggregate = func.call(&group.tables, kwargs).inspect_err(|e| {
            error!(
                "Group function failed for key {} in partition {index}: {e}",
                group.key
            )
        })?;
        rows.extend(aggregate.into_rows(by, &group.key)?);
    }
    Ok(rows)
}
