/// Validation failures reported by the cube executors.
///
/// Every variant is raised before the first accumulation pass; a query that validates always
/// runs to completion.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("query issued against a table with no columns")]
    EmptyTable,

    #[error("unknown column: {column}")]
    ColumnNotFound { column: String },

    #[error("invalid bin step {step} for column {column}")]
    InvalidBinStep { column: String, step: f64 },

    #[error("invalid bin range [{min}, {max}] for column {column}")]
    InvalidBinRange { column: String, min: f64, max: f64 },

    #[error("quantile over column {column} needs at least one bin")]
    InvalidQuantileCount { column: String },

    #[error("dimension {dimension} has no values to group by")]
    EmptyDimension { dimension: String },

    #[error("cube cardinality {cells} exceeds the configured limit of {limit}")]
    DimensionCardinalityOverflow { cells: u128, limit: u64 },
}

pub type QueryResult<T> = Result<T, QueryError>;
