use crate::config::QueryOptions;
use crate::error::QueryResult;
use crate::plan::{fold, CellBuffer, Mode, Plan};
use crate::query::{CubeQuery, QueryResponse};
use datacube_columnar::Table;
use std::collections::{BTreeMap, BTreeSet};

/// Per-cell values for the touched cells only, keyed by flattened index.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SparseBuffer(BTreeMap<u64, f64>);

impl CellBuffer for SparseBuffer {
    fn with_fill(_cells: u64, _fill: f64) -> Self {
        Self::default()
    }

    fn add(&mut self, cell: u64, value: f64) {
        *self.0.entry(cell).or_insert(0.0) += value;
    }

    fn fold_min(&mut self, cell: u64, value: f64) {
        self.0
            .entry(cell)
            .and_modify(|slot| *slot = fold(*slot, value, f64::min))
            .or_insert(value);
    }

    fn fold_max(&mut self, cell: u64, value: f64) {
        self.0
            .entry(cell)
            .and_modify(|slot| *slot = fold(*slot, value, f64::max))
            .or_insert(value);
    }
}

/// Run `query` materializing only the cells at least one row contributed to.
///
/// Rows come out in ascending flattened-index order. A query without aggregates touches no
/// cells and returns empty columns.
pub fn sparse_query(table: &Table, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse> {
    let mut filtered = None;
    let plan = Plan::build(table, query, options, Mode::Sparse, &mut filtered)?;
    let acc = plan.accumulate::<SparseBuffer>();

    let keys: Vec<u64> = acc
        .count
        .iter()
        .chain(acc.columns.iter().flatten().flatten())
        .flat_map(|SparseBuffer(map)| map.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let accumulators = acc.materialize(keys.len(), |SparseBuffer(map)| {
        keys.iter().map(|key| map.get(key).copied().unwrap_or(0.0)).collect()
    });

    let mut dim_codes = vec![Vec::with_capacity(keys.len()); plan.dims.len()];
    let mut coords = vec![0u32; plan.dims.len()];
    for &key in &keys {
        plan.shape.unflatten(key, &mut coords);
        for (codes, &coord) in dim_codes.iter_mut().zip(&coords) {
            codes.push(coord);
        }
    }

    log::debug!(
        "sparse cube touched {} of {} cells",
        keys.len(),
        plan.shape.cells
    );
    Ok(QueryResponse {
        columns: plan.respond(query, dim_codes, &accumulators),
    })
}
