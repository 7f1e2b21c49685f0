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

use std::time::Instant;

use clap::Parser;
use datafusion::arrow::util::pretty::pretty_format_batches;
use datafusion::prelude::{SessionConfig, SessionContext};
use groupwise::prelude::{
    Dataset, GroupBy, Result, SessionConfigExt, SessionContextExt,
    UdafOptions,
};
use groupwise_cli::{
    builtin::{BuiltinAggregate, BuiltinFunction},
    source::read_file,
    GROUPWISE_CLI_VERSION,
};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser, PartialEq)]
#[clap(author, version, about, long_about= None)]
struct Args {
    #[clap(
        short,
        long,
        required = true,
        value_delimiter = ',',
        help = "Group by field(s), comma separated for a composite key"
    )]
    by: Vec<String>,

    #[clap(short, long, value_enum, help = "Aggregation applied to every joined group")]
    agg: BuiltinAggregate,

    #[clap(
        required = true,
        num_args = 1..,
        help = "CSV or Parquet files, joined by key in the given order"
    )]
    files: Vec<String>,

    #[clap(
        short,
        long,
        help = "Shuffle partition count, 0 disables the shuffle. Default: groupwise.shuffle_partitions"
    )]
    partitions: Option<usize>,

    #[clap(
        long,
        help = "The max concurrent partition tasks. Default: all available cores",
        value_parser(parse_valid_concurrent_tasks_size)
    )]
    concurrent_tasks: Option<usize>,

    #[clap(
        short,
        long,
        help = "Reduce printing other than the results and work quietly"
    )]
    quiet: bool,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.quiet {
        println!("Groupwise CLI v{GROUPWISE_CLI_VERSION}");
    }

    let mut config = SessionConfig::new_with_groupwise();
    if let Some(concurrent_tasks) = args.concurrent_tasks {
        config = config.with_groupwise_max_concurrent_tasks(concurrent_tasks);
    }
    let ctx = SessionContext::groupwise_with_config(config);

    let mut datasets = Vec::with_capacity(args.files.len());
    for path in &args.files {
        datasets.push(Dataset::from(read_file(&ctx, path).await?));
    }

    let by = GroupBy::from(args.by);
    let mut options = UdafOptions::new();
    if let Some(partitions) = args.partitions {
        options = options.with_partitions(partitions);
    }

    let now = Instant::now();
    let func = BuiltinFunction::new(args.agg, by.clone());
    let df = ctx.udaf(by, func, datasets, options).await?;
    let batches = df.collect().await?;
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();

    let table = pretty_format_batches(&batches)?;
    println!("{table}");
    if !args.quiet {
        println!(
            "{rows} row(s) fetched. Elapsed {:.3} seconds.",
            now.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

fn parse_valid_concurrent_tasks_size(size: &str) -> std::result::Result<usize, String> {
    match size.parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(format!("Invalid concurrent_tasks size '{size}'")),
    }
}
