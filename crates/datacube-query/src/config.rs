use serde::{Deserialize, Serialize};

/// Resource limits applied while validating a query.
///
/// Deserializes with defaults for missing fields so hosts can embed it in their own config:
/// `{"max_dense_cells": 1000000}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Upper bound on the number of cells a dense query may materialize.
    pub max_dense_cells: u64,
    /// Upper bound on the number of bins a `bin`/`quantile` dimension may produce.
    pub max_bins: u64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_dense_cells: 1 << 24,
            max_bins: 1 << 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options: QueryOptions = serde_json::from_str(r#"{"max_dense_cells": 64}"#).unwrap();
        assert_eq!(options.max_dense_cells, 64);
        assert_eq!(options.max_bins, QueryOptions::default().max_bins);
    }
}
