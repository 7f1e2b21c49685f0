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

mod common;

#[cfg(test)]
mod single {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::common::{
        batch, column_sums, first_int, frame, groupwise_context, ints, options, strings,
    };
    use datafusion::arrow::record_batch::RecordBatch;
    use datafusion::assert_batches_sorted_eq;
    use datafusion::common::ScalarValue;
    use datafusion::prelude::{DataFrame, SessionContext};
    use groupwise::prelude::*;

    fn users(ctx: &SessionContext) -> DataFrame {
        frame(
            ctx,
            vec![
                ("user", strings(vec!["a", "a", "a", "b"])),
                ("values", ints(vec![1, 1, 1, 4])),
            ],
        )
    }

    fn sum(tables: &[RecordBatch], _: &Kwargs) -> Result<Aggregate> {
        Ok(Aggregate::from(column_sums(&tables[0])))
    }

    #[rstest::rstest]
    #[case::default_partitions(None)]
    #[case::few_partitions(Some(3))]
    #[case::single_partition(Some(1))]
    #[case::local_bucketing(Some(0))]
    #[tokio::test]
    async fn should_aggregate_each_key(
        #[case] partitions: Option<usize>,
    ) -> datafusion::error::Result<()> {
        let ctx = groupwise_context();
        let result = ctx
            .udaf("user", sum, vec![users(&ctx).into()], options(partitions))
            .await?
            .collect()
            .await?;

        let expected = [
            "+------+--------+",
            "| user | values |",
            "+------+--------+",
            "| a    | 3      |",
            "| b    | 4      |",
            "+------+--------+",
        ];
        assert_batches_sorted_eq!(expected, &result);
        Ok(())
    }

    #[rstest::rstest]
    #[case::shuffled(Some(4))]
    #[case::local_bucketing(Some(0))]
    #[tokio::test]
    async fn should_aggregate_raw_records(
        #[case] partitions: Option<usize>,
    ) -> datafusion::error::Result<()> {
        let ctx = groupwise_context();
        // key `a` is spread over both input partitions
        let first = batch(vec![
            ("user", strings(vec!["a", "b"])),
            ("values", ints(vec![1, 4])),
        ]);
        let second = batch(vec![
            ("user", strings(vec!["a", "a"])),
            ("values", ints(vec![1, 1])),
        ]);
        let dataset = Dataset::from_partitions(first.schema(), vec![vec![first], vec![second]]);

        let result = ctx
            .udaf("user", sum, vec![dataset], options(partitions))
            .await?
            .collect()
            .await?;

        let expected = [
            "+------+--------+",
            "| user | values |",
            "+------+--------+",
            "| a    | 3      |",
            "| b    | 4      |",
            "+------+--------+",
        ];
        assert_batches_sorted_eq!(expected, &result);
        Ok(())
    }

    #[tokio::test]
    async fn should_emit_scalars_in_value_column() -> datafusion::error::Result<()> {
        let ctx = groupwise_context();
        let func = |_: &[RecordBatch], _: &Kwargs| -> Result<Aggregate> {
            Ok(Aggregate::from(ScalarValue::from(3_i64)))
        };
        let result = ctx
            .udaf("user", func, vec![users(&ctx).into()], UdafOptions::new())
            .await?
            .collect()
            .await?;

        let expected = [
            "+------+-------+",
            "| user | value |",
            "+------+-------+",
            "| a    | 3     |",
            "| b    | 3     |",
            "+------+-------+",
        ];
        assert_batches_sorted_eq!(expected, &result);
        Ok(())
    }

    #[tokio::test]
    async fn should_forward_keyword_arguments() -> datafusion::error::Result<()> {
        let ctx = groupwise_context();
        let calls = Arc::new(AtomicUsize::new(0));
        let expected_kwargs = Kwargs::new()
            .with("addition", 2_i64)
            .with("label", "extra");

        let func = {
            let calls = calls.clone();
            let expected_kwargs = expected_kwargs.clone();
            move |tables: &[RecordBatch], kwargs: &Kwargs| -> Result<Aggregate> {
                calls.fetch_add(1, Ordering::SeqCst);
                assert_eq!(&expected_kwargs, kwargs);
                let addition = match kwargs.require("addition")? {
                    ScalarValue::Int64(Some(v)) => *v,
                    other => {
                        return Err(GroupwiseError::General(format!(
                            "unexpected addition {other}"
                        )))
                    }
                };
                let values = column_sums(&tables[0])
                    .into_iter()
                    .map(|(name, value)| match value {
                        ScalarValue::Int64(v) => (name, ScalarValue::Int64(v.map(|v| v + addition))),
                        other => (name, other),
                    })
                    .collect::<Vec<_>>();
                Ok(Aggregate::from(values))
            }
        };

        let result = ctx
            .udaf(
                "user",
                func,
                vec![users(&ctx).into()],
                UdafOptions::new().with_kwargs(expected_kwargs.clone()),
            )
            .await?
            .collect()
            .await?;

        let expected = [
            "+------+--------+",
            "| user | values |",
            "+------+--------+",
            "| a    | 5      |",
            "| b    | 6      |",
            "+------+--------+",
        ];
        assert_batches_sorted_eq!(expected, &result);
        assert_eq!(2, calls.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test]
    async fn should_pass_all_columns_of_the_group() -> datafusion::error::Result<()> {
        let ctx = groupwise_context();
        let func = |tables: &[RecordBatch], _: &Kwargs| -> Result<Aggregate> {
            let table = &tables[0];
            Ok(Aggregate::from(vec![
                ("columns", ScalarValue::from(table.num_columns() as i64)),
                ("rows", ScalarValue::from(table.num_rows() as i64)),
                ("first", ScalarValue::Int64(first_int(table, "values"))),
            ]))
        };
        let result = ctx
            .udaf("user", func, vec![users(&ctx).into()], UdafOptions::new())
            .await?
            .collect()
            .await?;

        let expected = [
            "+---------+-------+------+------+",
            "| columns | first | rows | user |",
            "+---------+-------+------+------+",
            "| 2       | 1     | 3    | a    |",
            "| 2       | 4     | 1    | b    |",
            "+---------+-------+------+------+",
        ];
        assert_batches_sorted_eq!(expected, &result);
        Ok(())
    }

    #[tokio::test]
    async fn should_fail_when_function_fails() {
        let ctx = groupwise_context();
        let func = |tables: &[RecordBatch], _: &Kwargs| -> Result<Aggregate> {
            match first_int(&tables[0], "values") {
                Some(4) => Err(GroupwiseError::General("cannot aggregate 4".to_string())),
                _ => Ok(Aggregate::from(ScalarValue::from(1_i64))),
            }
        };
        let result = ctx
            .udaf("user", func, vec![users(&ctx).into()], UdafOptions::new())
            .await;

        let err = result.expect_err("function failure to abort the transform");
        assert!(err.to_string().contains("cannot aggregate 4"), "{err}");
    }

    #[tokio::test]
    async fn should_fail_on_missing_key_column() {
        let ctx = groupwise_context();
        let result = ctx
            .udaf("member", sum, vec![users(&ctx).into()], UdafOptions::new())
            .await;
        assert!(result.is_err());
    }
}
