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

//! Reading input files as datasets.

use std::path::Path;

use datafusion::prelude::{CsvReadOptions, DataFrame, ParquetReadOptions, SessionContext};
use groupwise::prelude::{GroupwiseError, Result};

/// Input file formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(FileFormat::Csv),
            Some("parquet") => Ok(FileFormat::Parquet),
            _ => Err(GroupwiseError::Configuration(format!(
                "unsupported input file '{path}', expected a .csv or .parquet file"
            ))),
        }
    }
}

/// Reads `path` into a [DataFrame] of `ctx`
pub async fn read_file(ctx: &SessionContext, path: &str) -> Result<DataFrame> {
    let df = match FileFormat::from_path(path)? {
        FileFormat::Csv => ctx.read_csv(path, CsvReadOptions::new()).await?,
        FileFormat::Parquet => ctx.read_parquet(path, ParquetReadOptions::default()).await?,
    };
    log::debug!("Read {path} with schema {}", df.schema());
    Ok(df)
}
