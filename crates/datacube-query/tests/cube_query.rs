use datacube_columnar::{ColumnInput, ColumnType, Table, Value};
use datacube_query::{
    dense_query, sparse_query, Aggregate, CubeQuery, Dimension, DimensionValues, QueryError, QueryOptions,
    QueryResponse, TableQueryExt,
};
use pretty_assertions::assert_eq;

fn sales() -> Table {
    Table::from_columns([
        ColumnInput::new("a", ["x", "y", "x"], ColumnType::Nominal),
        ColumnInput::new("v", [1.0, 2.0, 3.0], ColumnType::Numeric),
    ])
    .unwrap()
}

fn labels(response: &QueryResponse, dim: usize) -> Vec<String> {
    match &response.dimension(dim).unwrap().values {
        DimensionValues::Labels(values) => values.iter().map(Value::to_string).collect(),
        DimensionValues::Codes(codes) => panic!("expected labels, got codes {codes:?}"),
    }
}

fn values(response: &QueryResponse, val: usize) -> Vec<f64> {
    response.aggregate(val).unwrap().values.clone()
}

#[test]
fn counts_rows_per_value() {
    let response = sales()
        .query(&CubeQuery::new().dim("a").val(Aggregate::count()))
        .unwrap();

    assert_eq!(labels(&response, 0), vec!["x", "y"]);
    assert_eq!(values(&response, 0), vec![2.0, 1.0]);
    assert_eq!(response.dimension(0).unwrap().name, "a");
    assert_eq!(response.aggregate(0).unwrap().name, "count");
}

#[test]
fn computes_every_operator() {
    let query = CubeQuery::new()
        .dim("a")
        .val(Aggregate::sum("v"))
        .val(Aggregate::avg("v"))
        .val(Aggregate::min("v"))
        .val(Aggregate::max("v"))
        .val(Aggregate::variance("v", true))
        .val(Aggregate::stdev("v", false));
    let response = sales().query(&query).unwrap();

    assert_eq!(values(&response, 0), vec![4.0, 2.0]);
    assert_eq!(values(&response, 1), vec![2.0, 2.0]);
    assert_eq!(values(&response, 2), vec![1.0, 2.0]);
    assert_eq!(values(&response, 3), vec![3.0, 2.0]);
    assert_eq!(values(&response, 4), vec![1.0, 0.0]);
    assert_eq!(values(&response, 5), vec![1.0, 0.0]);
    let names: Vec<&str> = response.aggregates().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["sum(v)", "avg(v)", "min(v)", "max(v)", "variance(v)", "stdev(v)"]
    );
}

#[test]
fn dense_cubes_include_untouched_cells() {
    let table = Table::from_columns([
        ColumnInput::new("a", ["x", "y"], ColumnType::Nominal),
        ColumnInput::new("b", ["p", "q"], ColumnType::Nominal),
        ColumnInput::new("v", [5.0, 7.0], ColumnType::Numeric),
    ])
    .unwrap();
    let query = CubeQuery::new()
        .dim("a")
        .dim("b")
        .val(Aggregate::count())
        .val(Aggregate::sum("v"))
        .val(Aggregate::min("v"))
        .val(Aggregate::avg("v"));
    let response = table.query(&query).unwrap();

    assert_eq!(response.rows(), 4);
    assert_eq!(labels(&response, 0), vec!["x", "y", "x", "y"]);
    assert_eq!(labels(&response, 1), vec!["p", "p", "q", "q"]);
    assert_eq!(values(&response, 0), vec![1.0, 0.0, 0.0, 1.0]);
    assert_eq!(values(&response, 1), vec![5.0, 0.0, 0.0, 7.0]);

    let min = values(&response, 2);
    assert_eq!(min[0], 5.0);
    assert!(min[1].is_nan() && min[2].is_nan());
    let avg = values(&response, 3);
    assert!(avg[1].is_nan());
    assert_eq!(avg[3], 7.0);

    for dim in response.dimensions() {
        assert_eq!(dim.unique, Some(2));
    }
}

#[test]
fn sparse_cubes_only_report_touched_cells() {
    let table = Table::from_columns([
        ColumnInput::new("a", ["x", "y", "y"], ColumnType::Nominal),
        ColumnInput::new("b", ["p", "q", "q"], ColumnType::Nominal),
        ColumnInput::new("v", [5.0, 7.0, 1.0], ColumnType::Numeric),
    ])
    .unwrap();
    let query = CubeQuery::new()
        .dim("a")
        .dim("b")
        .val(Aggregate::count())
        .val(Aggregate::max("v"));
    let response = table.sparse_query(&query).unwrap();

    assert_eq!(response.rows(), 2);
    assert_eq!(labels(&response, 0), vec!["x", "y"]);
    assert_eq!(labels(&response, 1), vec!["p", "q"]);
    assert_eq!(values(&response, 0), vec![1.0, 2.0]);
    assert_eq!(values(&response, 1), vec![5.0, 7.0]);
    assert!(response.dimensions().all(|dim| dim.unique.is_none()));
}

#[test]
fn multi_valued_rows_fan_out() {
    let table = Table::from_columns([ColumnInput::new(
        "tags",
        ["food", "dog", "tree, food", "food", "dog"],
        ColumnType::Nominal,
    )])
    .unwrap();
    let query = CubeQuery::new().dim("tags").val(Aggregate::count());

    let dense = table.query(&query).unwrap();
    assert_eq!(labels(&dense, 0), vec!["dog", "food", "tree"]);
    assert_eq!(values(&dense, 0), vec![2.0, 3.0, 1.0]);

    let sparse = table.sparse_query(&query).unwrap();
    assert_eq!(labels(&sparse, 0), vec!["dog", "food", "tree"]);
    assert_eq!(values(&sparse, 0), vec![2.0, 3.0, 1.0]);
}

#[test]
fn filters_restrict_the_rows() {
    let query = CubeQuery::new()
        .dim("a")
        .val(Aggregate::count())
        .val(Aggregate::sum("v"))
        .filter(|table, row| table.column("v").and_then(|c| c.get_string(row)).as_deref() != Some("1"));
    let response = sales().query(&query).unwrap();

    assert_eq!(labels(&response, 0), vec!["x", "y"]);
    assert_eq!(values(&response, 0), vec![1.0, 1.0]);
    assert_eq!(values(&response, 1), vec![3.0, 2.0]);
}

#[test]
fn bin_and_quantile_dimensions() {
    let table = Table::from_columns([ColumnInput::new(
        "v",
        [1.0, 4.0, 12.0, 15.0, 29.0, 30.0],
        ColumnType::Numeric,
    )])
    .unwrap();

    let binned = table
        .query(&CubeQuery::new().dim(Dimension::bin("v", 10.0)).val(Aggregate::count()))
        .unwrap();
    assert_eq!(labels(&binned, 0), vec!["0", "10", "20"]);
    assert_eq!(values(&binned, 0), vec![2.0, 2.0, 2.0]);

    let quantiles = table
        .query(&CubeQuery::new().dim(Dimension::quantile("v", 2)).val(Aggregate::count()))
        .unwrap();
    assert_eq!(labels(&quantiles, 0), vec!["0", "1"]);
    assert_eq!(values(&quantiles, 0).iter().sum::<f64>(), 6.0);
}

#[test]
fn filtering_out_every_row_depends_on_the_dimension_kind() {
    let table = Table::from_columns([
        ColumnInput::new("a", ["x", "y"], ColumnType::Nominal),
        ColumnInput::new("v", [3.0, 17.0], ColumnType::Numeric),
    ])
    .unwrap();

    let by_column = table
        .query(&CubeQuery::new().dim("a").val(Aggregate::count()).filter(|_, _| false))
        .unwrap();
    assert_eq!(values(&by_column, 0), vec![0.0, 0.0]);

    let err = table
        .query(
            &CubeQuery::new()
                .dim(Dimension::bin("v", 10.0))
                .val(Aggregate::count())
                .filter(|_, _| false),
        )
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::EmptyDimension {
            dimension: "v".to_string()
        }
    );

    let bounded = table
        .query(
            &CubeQuery::new()
                .dim(Dimension::bin("v", 10.0).min(0.0).max(20.0))
                .val(Aggregate::count())
                .filter(|_, _| false),
        )
        .unwrap();
    assert_eq!(values(&bounded, 0), vec![0.0, 0.0]);
}

#[test]
fn quantiles_over_repeated_values() {
    let table = Table::from_columns([ColumnInput::new(
        "v",
        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0],
        ColumnType::Numeric,
    )])
    .unwrap();

    let three = table
        .query(&CubeQuery::new().dim(Dimension::quantile("v", 3)).val(Aggregate::count()))
        .unwrap();
    assert_eq!(values(&three, 0), vec![7.0, 0.0, 3.0]);

    let four = table
        .query(&CubeQuery::new().dim(Dimension::quantile("v", 4)).val(Aggregate::count()))
        .unwrap();
    assert_eq!(values(&four, 0), vec![0.0, 7.0, 0.0, 3.0]);
}

#[test]
fn code_flag_returns_raw_codes() {
    let query = CubeQuery::new().dim("a").val(Aggregate::count()).codes(true);

    let dense = sales().query(&query).unwrap();
    assert_eq!(dense.dimension(0).unwrap().values, DimensionValues::Codes(vec![0, 1]));
    assert_eq!(dense.dimension(0).unwrap().unique, Some(2));

    let sparse = sales().sparse_query(&query).unwrap();
    assert_eq!(sparse.dimension(0).unwrap().values, DimensionValues::Codes(vec![0, 1]));
}

#[test]
fn numeric_strings_and_multi_valued_targets() {
    let table = Table::from_columns([
        ColumnInput::new("a", ["x", "x", "y"], ColumnType::Nominal),
        ColumnInput::new("v", ["2", "3", "1, 2"], ColumnType::Unknown),
    ])
    .unwrap();
    let response = table
        .query(&CubeQuery::new().dim("a").val(Aggregate::sum("v")))
        .unwrap();

    let sums = values(&response, 0);
    assert_eq!(sums[0], 5.0);
    assert!(sums[1].is_nan());
}

#[test]
fn queries_without_dimensions_collapse_to_one_cell() {
    let response = sales()
        .query(&CubeQuery::new().val(Aggregate::count()).val(Aggregate::sum("v")))
        .unwrap();
    assert_eq!(response.rows(), 1);
    assert_eq!(values(&response, 0), vec![3.0]);
    assert_eq!(values(&response, 1), vec![6.0]);
}

#[test]
fn sparse_queries_without_aggregates_are_empty() {
    let response = sales().sparse_query(&CubeQuery::new().dim("a")).unwrap();
    assert_eq!(response.rows(), 0);
    assert_eq!(response.columns.len(), 1);

    let dense = sales().query(&CubeQuery::new().dim("a")).unwrap();
    assert_eq!(labels(&dense, 0), vec!["x", "y"]);
}

#[test]
fn repeated_queries_are_identical() {
    let table = sales();
    let query = CubeQuery::new().dim("a").val(Aggregate::count()).val(Aggregate::sum("v"));
    assert_eq!(table.query(&query).unwrap(), table.query(&query).unwrap());
    assert_eq!(table.sparse_query(&query).unwrap(), table.sparse_query(&query).unwrap());
}

#[test]
fn validation_errors() {
    let err = Table::new().query(&CubeQuery::new().val(Aggregate::count())).unwrap_err();
    assert_eq!(err, QueryError::EmptyTable);

    let err = sales()
        .query(&CubeQuery::new().dim("a").val(Aggregate::sum("missing")))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::ColumnNotFound {
            column: "missing".to_string()
        }
    );

    let empty = Table::from_columns([ColumnInput::new("a", Vec::<&str>::new(), ColumnType::Nominal)]).unwrap();
    let err = empty.query(&CubeQuery::new().dim("a")).unwrap_err();
    assert_eq!(
        err,
        QueryError::EmptyDimension {
            dimension: "a".to_string()
        }
    );
}

#[test]
fn dense_limit_does_not_bind_sparse_queries() {
    let table = sales();
    let options = QueryOptions {
        max_dense_cells: 3,
        ..QueryOptions::default()
    };
    let query = CubeQuery::new().dim("a").dim("v").val(Aggregate::count());

    let err = dense_query(&table, &query, &options).unwrap_err();
    assert_eq!(err, QueryError::DimensionCardinalityOverflow { cells: 6, limit: 3 });

    let response = sparse_query(&table, &query, &options).unwrap();
    assert_eq!(response.rows(), 3);
}
