use crate::config::QueryOptions;
use crate::error::QueryResult;
use crate::plan::{fold, CellBuffer, Mode, Plan};
use crate::query::{CubeQuery, QueryResponse};
use datacube_columnar::Table;

/// Flat per-cell array covering the whole cube.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct DenseBuffer(Vec<f64>);

impl CellBuffer for DenseBuffer {
    fn with_fill(cells: u64, fill: f64) -> Self {
        DenseBuffer(vec![fill; cells as usize])
    }

    fn add(&mut self, cell: u64, value: f64) {
        self.0[cell as usize] += value;
    }

    fn fold_min(&mut self, cell: u64, value: f64) {
        let slot = &mut self.0[cell as usize];
        *slot = fold(*slot, value, f64::min);
    }

    fn fold_max(&mut self, cell: u64, value: f64) {
        let slot = &mut self.0[cell as usize];
        *slot = fold(*slot, value, f64::max);
    }
}

/// Codes of one axis for every cube cell, in flattened-index order.
///
/// Counts up to the axis stride, then advances the code, wrapping at the extent.
fn replay_axis(stride: u64, extent: u64, cells: u64) -> Vec<u32> {
    let mut codes = Vec::with_capacity(cells as usize);
    let (mut code, mut run) = (0u64, 0u64);
    for _ in 0..cells {
        codes.push(code as u32);
        run += 1;
        if run == stride {
            run = 0;
            code = (code + 1) % extent;
        }
    }
    codes
}

/// Run `query` materializing every cell of the cube, touched or not.
///
/// Cells no row reached report a count and sum of 0 and a `NaN` min/max.
pub fn dense_query(table: &Table, query: &CubeQuery<'_>, options: &QueryOptions) -> QueryResult<QueryResponse> {
    let mut filtered = None;
    let plan = Plan::build(table, query, options, Mode::Dense, &mut filtered)?;
    let cells = plan.shape.cells;

    let accumulators = plan
        .accumulate::<DenseBuffer>()
        .materialize(cells as usize, |DenseBuffer(values)| values);

    let dim_codes = plan
        .shape
        .coefficients
        .iter()
        .zip(&plan.shape.extents)
        .map(|(&stride, &extent)| replay_axis(stride, extent, cells))
        .collect();

    log::debug!("dense cube materialized {cells} cells");
    Ok(QueryResponse {
        columns: plan.respond(query, dim_codes, &accumulators),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_matches_flattened_order() {
        // extents [2, 3]: axis 0 varies fastest.
        assert_eq!(replay_axis(1, 2, 6), vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(replay_axis(2, 3, 6), vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn min_and_max_start_untouched() {
        let mut buffer = DenseBuffer::with_fill(2, f64::NAN);
        buffer.fold_min(0, 4.0);
        buffer.fold_min(0, -2.0);
        assert_eq!(buffer.0[0], -2.0);
        assert!(buffer.0[1].is_nan());

        let mut buffer = DenseBuffer::with_fill(1, f64::NAN);
        buffer.fold_max(0, -5.0);
        buffer.fold_max(0, -7.0);
        assert_eq!(buffer.0, vec![-5.0]);
    }
}
