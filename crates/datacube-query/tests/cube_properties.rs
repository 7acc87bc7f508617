use datacube_columnar::{ColumnInput, ColumnType, Table};
use datacube_query::{Aggregate, CubeQuery, DimensionValues, TableQueryExt};
use proptest::prelude::*;

fn arb_rows() -> impl Strategy<Value = Vec<(u8, u8, i16)>> {
    prop::collection::vec((0u8..3, 0u8..4, -50i16..50), 1..60)
}

fn build(rows: &[(u8, u8, i16)]) -> Table {
    Table::from_columns([
        ColumnInput::new(
            "a",
            rows.iter().map(|(a, _, _)| format!("a{a}")),
            ColumnType::Nominal,
        ),
        ColumnInput::new("b", rows.iter().map(|(_, b, _)| f64::from(*b)), ColumnType::Numeric),
        ColumnInput::new("v", rows.iter().map(|(_, _, v)| f64::from(*v)), ColumnType::Numeric),
    ])
    .unwrap()
}

fn query<'p>() -> CubeQuery<'p> {
    CubeQuery::new()
        .dim("a")
        .dim("b")
        .val(Aggregate::count())
        .val(Aggregate::sum("v"))
        .val(Aggregate::max("v"))
}

fn codes(values: &DimensionValues) -> Vec<u32> {
    values.codes().map(<[u32]>::to_vec).unwrap_or_default()
}

proptest! {
    #[test]
    fn dense_cells_conserve_the_row_count(rows in arb_rows()) {
        let table = build(&rows);
        let response = table.query(&query()).unwrap();

        let total: f64 = response.aggregate(0).unwrap().values.iter().sum();
        prop_assert_eq!(total, rows.len() as f64);
        let cells: usize = response.dimensions().map(|d| d.unique.unwrap()).product();
        prop_assert_eq!(response.rows(), cells);
    }

    #[test]
    fn sparse_matches_the_touched_dense_cells(rows in arb_rows()) {
        let table = build(&rows);
        let q = query().codes(true);
        let dense = table.query(&q).unwrap();
        let sparse = table.sparse_query(&q).unwrap();

        let touched: Vec<usize> = dense
            .aggregate(0)
            .unwrap()
            .values
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0.0)
            .map(|(i, _)| i)
            .collect();
        prop_assert!(sparse.rows() <= dense.rows());
        prop_assert_eq!(sparse.rows(), touched.len());

        for (d, s) in dense.dimensions().zip(sparse.dimensions()) {
            let d = codes(&d.values);
            let expected: Vec<u32> = touched.iter().map(|&i| d[i]).collect();
            prop_assert_eq!(codes(&s.values), expected);
        }
        for (d, s) in dense.aggregates().zip(sparse.aggregates()) {
            let expected: Vec<f64> = touched.iter().map(|&i| d.values[i]).collect();
            prop_assert_eq!(&s.values, &expected);
        }
    }

    #[test]
    fn avg_and_variance_follow_sum_and_count(rows in arb_rows()) {
        let table = build(&rows);
        let q = CubeQuery::new()
            .dim("a")
            .val(Aggregate::count())
            .val(Aggregate::sum("v"))
            .val(Aggregate::avg("v"))
            .val(Aggregate::variance("v", false));
        let response = table.sparse_query(&q).unwrap();

        let count = &response.aggregate(0).unwrap().values;
        let sum = &response.aggregate(1).unwrap().values;
        let avg = &response.aggregate(2).unwrap().values;
        let variance = &response.aggregate(3).unwrap().values;
        for i in 0..response.rows() {
            prop_assert_eq!(avg[i], sum[i] / count[i]);
            prop_assert!(variance[i] > -1e-6);
        }
    }
}
