//! Cube queries over dictionary-encoded tables.
//!
//! A [`CubeQuery`] groups the rows of a [`Table`] along one or more [`Dimension`]s and
//! computes [`Aggregate`]s for every cell of the resulting cube. Two executors share the
//! same planning and row pass:
//!
//! - [`dense_query`] materializes every cell of the cube (bounded by
//!   [`QueryOptions::max_dense_cells`]).
//! - [`sparse_query`] materializes only the cells a row contributed to, in flattened-index
//!   order.
//!
//! ```
//! use datacube_columnar::{ColumnInput, ColumnType, Table};
//! use datacube_query::{Aggregate, CubeQuery, TableQueryExt};
//!
//! let table = Table::from_columns([
//!     ColumnInput::new("a", ["x", "y", "x"], ColumnType::Nominal),
//!     ColumnInput::new("v", [1.0, 2.0, 3.0], ColumnType::Numeric),
//! ])?;
//! let response = table.query(&CubeQuery::new().dim("a").val(Aggregate::count()))?;
//! assert_eq!(response.aggregate(0).unwrap().values, vec![2.0, 1.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

mod aggregate;
mod config;
mod dense;
mod dimension;
mod error;
mod plan;
mod query;
mod sparse;

pub use crate::aggregate::{AccumulatorKind, AccumulatorSet, Aggregate, Requirement, Target};
pub use crate::config::QueryOptions;
pub use crate::dense::dense_query;
pub use crate::dimension::{Bin, BoundDimension, DimCode, Dimension, Quantile, Slot};
pub use crate::error::{QueryError, QueryResult};
pub use crate::query::{
    AggregateColumn, CubeQuery, DimensionColumn, DimensionValues, QueryResponse, ResultColumn,
    RowPredicate,
};
pub use crate::sparse::sparse_query;

use datacube_columnar::Table;

/// Cube queries as methods on [`Table`].
pub trait TableQueryExt {
    /// Dense query with default options.
    fn query(&self, query: &CubeQuery<'_>) -> QueryResult<QueryResponse> {
        self.dense_query(query)
    }

    fn dense_query(&self, query: &CubeQuery<'_>) -> QueryResult<QueryResponse> {
        self.dense_query_with(query, &QueryOptions::default())
    }

    fn sparse_query(&self, query: &CubeQuery<'_>) -> QueryResult<QueryResponse> {
        self.sparse_query_with(query, &QueryOptions::default())
    }

    fn dense_query_with(&self, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse>;

    fn sparse_query_with(&self, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse>;
}

impl TableQueryExt for Table {
    fn dense_query_with(&self, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse> {
        dense_query(self, query, options)
    }

    fn sparse_query_with(&self, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse> {
        sparse_query(self, query, options)
    }
}
