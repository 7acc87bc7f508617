//! Query planning and the row pass shared by the dense and sparse executors.
//!
//! A [`Plan`] is built once per query: it validates the request, binds every dimension,
//! fixes the cube shape and resolves each aggregate target to a slot. The executors then
//! run [`Plan::accumulate`] over their own [`CellBuffer`] and only differ in how the
//! filled buffers are materialized.

use crate::aggregate::{AccumulatorKind, AccumulatorSet, DeriveContext, Materialized, Target, COLUMN_SLOTS};
use crate::config::QueryOptions;
use crate::dimension::{BoundDimension, DimCode};
use crate::error::{QueryError, QueryResult};
use crate::query::{AggregateColumn, CubeQuery, DimensionColumn, DimensionValues, ResultColumn};
use datacube_columnar::{Cell, Table, Value};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Dense,
    Sparse,
}

/// Extents of every axis plus the mixed-radix coefficients used to flatten coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CubeShape {
    pub(crate) extents: Vec<u64>,
    pub(crate) coefficients: Vec<u64>,
    pub(crate) cells: u64,
}

impl CubeShape {
    pub(crate) fn new(extents: Vec<u64>, limit: u64) -> QueryResult<Self> {
        let cells = extents
            .iter()
            .fold(1u128, |acc, &extent| acc.saturating_mul(u128::from(extent)));
        if cells > u128::from(limit) {
            return Err(QueryError::DimensionCardinalityOverflow { cells, limit });
        }

        let mut coefficients = Vec::with_capacity(extents.len());
        let mut stride = 1u64;
        for &extent in &extents {
            coefficients.push(stride);
            // Bounded by `cells`, which fits in u64 after the check above.
            stride = stride.saturating_mul(extent);
        }

        Ok(Self {
            extents,
            coefficients,
            cells: cells as u64,
        })
    }

    /// Flattened index of a cube coordinate.
    pub(crate) fn flatten(&self, coords: impl IntoIterator<Item = u32>) -> u64 {
        self.coefficients
            .iter()
            .zip(coords)
            .map(|(p, code)| p * u64::from(code))
            .sum()
    }

    /// Recover the per-axis coordinates of a flattened index into `coords`.
    pub(crate) fn unflatten(&self, mut index: u64, coords: &mut [u32]) {
        for (k, &p) in self.coefficients.iter().enumerate().rev() {
            coords[k] = (index / p) as u32;
            index %= p;
        }
    }
}

/// Per-cell storage for one accumulator.
pub(crate) trait CellBuffer {
    /// A buffer covering `cells` cells, each starting at `fill`.
    fn with_fill(cells: u64, fill: f64) -> Self;

    fn add(&mut self, cell: u64, value: f64);

    fn fold_min(&mut self, cell: u64, value: f64);

    fn fold_max(&mut self, cell: u64, value: f64);
}

/// `NaN` marks a cell no row has reached yet.
pub(crate) fn fold(current: f64, value: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if current.is_nan() {
        value
    } else {
        pick(current, value)
    }
}

/// Buffers for the accumulators a plan requested, indexed by target slot and kind.
#[derive(Debug)]
pub(crate) struct AccumulatorTable<B> {
    pub(crate) count: Option<B>,
    pub(crate) columns: Vec<[Option<B>; COLUMN_SLOTS]>,
}

impl<B> AccumulatorTable<B> {
    /// Convert every buffer into a value vector aligned to the materialized cells.
    pub(crate) fn materialize(self, len: usize, mut finish: impl FnMut(B) -> Vec<f64>) -> Materialized {
        let count = self.count.map(&mut finish);
        let columns = self
            .columns
            .into_iter()
            .map(|slots| slots.map(|buffer| buffer.map(&mut finish)))
            .collect();
        Materialized { len, count, columns }
    }
}

struct TargetPlan<'t> {
    kinds: AccumulatorSet,
    cells: &'t [Cell],
    numeric: Vec<f64>,
}

impl TargetPlan<'_> {
    /// Numeric value of a row; multi-valued cells have no single value.
    fn value(&self, row: usize) -> f64 {
        match &self.cells[row] {
            Cell::Single(code) => self.numeric[*code as usize],
            Cell::Multi(_) => f64::NAN,
        }
    }
}

pub(crate) struct Plan<'t> {
    pub(crate) mode: Mode,
    rows: usize,
    pub(crate) dims: Vec<BoundDimension<'t>>,
    pub(crate) shape: CubeShape,
    code: bool,
    count: bool,
    targets: Vec<TargetPlan<'t>>,
    target_ids: HashMap<String, usize>,
}

impl<'t> Plan<'t> {
    /// Validate `query` against `table` and bind it.
    ///
    /// When the query carries a filter, the filtered table is stored in `filtered` and the
    /// plan borrows from it.
    pub(crate) fn build(
        table: &'t Table,
        query: &CubeQuery<'_>,
        options: &QueryOptions,
        mode: Mode,
        filtered: &'t mut Option<Table>,
    ) -> QueryResult<Self> {
        if table.cols() == 0 {
            return Err(QueryError::EmptyTable);
        }
        let referenced = query
            .dims
            .iter()
            .map(|dim| dim.column_name())
            .chain(query.vals.iter().filter_map(|val| val.column()));
        for name in referenced {
            if table.column(name).is_none() {
                return Err(QueryError::ColumnNotFound {
                    column: name.to_string(),
                });
            }
        }

        let source: &'t Table = match &query.filter {
            Some(predicate) => filtered.insert(table.filter(|t, row| predicate(t, row))),
            None => table,
        };

        let dims = query
            .dims
            .iter()
            .map(|dim| dim.bind(source, options))
            .collect::<QueryResult<Vec<_>>>()?;
        let limit = match mode {
            Mode::Dense => options.max_dense_cells.min(usize::MAX as u64),
            Mode::Sparse => u64::MAX,
        };
        let shape = CubeShape::new(dims.iter().map(|dim| dim.extent() as u64).collect(), limit)?;

        let mut count = false;
        let mut targets: Vec<TargetPlan<'t>> = Vec::new();
        let mut target_ids = HashMap::new();
        for requirement in query.vals.iter().flat_map(|val| val.requirements()) {
            let name = match requirement.target {
                Target::Rows => {
                    count |= requirement.kinds.contains(AccumulatorKind::Count);
                    continue;
                }
                Target::Column(name) => name,
            };
            if let Some(&id) = target_ids.get(name) {
                let target: &mut TargetPlan<'t> = &mut targets[id];
                target.kinds = target.kinds.union(requirement.kinds);
                continue;
            }
            let column = source.column(name).ok_or_else(|| QueryError::ColumnNotFound {
                column: name.to_string(),
            })?;
            target_ids.insert(name.to_string(), targets.len());
            targets.push(TargetPlan {
                kinds: requirement.kinds,
                cells: column.cells(),
                numeric: column.lut().iter().map(Value::as_f64).collect(),
            });
        }

        let plan = Self {
            mode,
            rows: source.rows(),
            dims,
            shape,
            code: query.code,
            count,
            targets,
            target_ids,
        };
        log::debug!(
            "{:?} cube query over {} rows: {} dims, {} cells, {} passes",
            plan.mode,
            plan.rows,
            plan.dims.len(),
            plan.shape.cells,
            plan.passes(),
        );
        Ok(plan)
    }

    /// One pass per distinct target column, or a single pass when only rows are counted.
    fn passes(&self) -> usize {
        match self.targets.len() {
            0 => usize::from(self.count),
            n => n,
        }
    }

    fn allocate<B: CellBuffer>(&self) -> AccumulatorTable<B> {
        let cells = self.shape.cells;
        let count = self.count.then(|| B::with_fill(cells, 0.0));
        let columns = self
            .targets
            .iter()
            .map(|target| {
                let mut slots: [Option<B>; COLUMN_SLOTS] = [None, None, None, None];
                for kind in target.kinds.iter() {
                    let fill = match kind {
                        AccumulatorKind::Min | AccumulatorKind::Max => f64::NAN,
                        _ => 0.0,
                    };
                    if let Some(slot) = kind.column_slot() {
                        slots[slot] = Some(B::with_fill(cells, fill));
                    }
                }
                slots
            })
            .collect();
        AccumulatorTable { count, columns }
    }

    /// Flattened cells a row contributes to, or `false` when a dimension excludes it.
    ///
    /// Multi-valued axes pair positionally; single values repeat in every slot and a
    /// shorter list leaves its remaining slots at coordinate 0. A binned piece outside its
    /// dimension drops only its own slot.
    fn row_cells<'a>(&'a self, row: usize, codes: &mut Vec<DimCode<'a>>, out: &mut Vec<u64>) -> bool {
        codes.clear();
        out.clear();
        let mut width = 1;
        for dim in &self.dims {
            let code = dim.code(row);
            match code {
                DimCode::Excluded => return false,
                DimCode::Multi(list) => width = width.max(list.len()),
                DimCode::Partial(list) => width = width.max(list.len()),
                DimCode::Single(_) => {}
            }
            codes.push(code);
        }

        for slot in 0..width {
            let index = codes
                .iter()
                .zip(&self.shape.coefficients)
                .try_fold(0u64, |index, (code, &p)| {
                    let coord = match code {
                        DimCode::Single(code) => *code,
                        DimCode::Multi(list) => list.get(slot).copied().unwrap_or(0),
                        DimCode::Partial(list) => match list.get(slot) {
                            Some(piece) => (*piece)?,
                            None => 0,
                        },
                        DimCode::Excluded => 0,
                    };
                    Some(index + p * u64::from(coord))
                });
            out.extend(index);
        }
        true
    }

    /// Run every pass over the source rows and fill the requested accumulators.
    pub(crate) fn accumulate<B: CellBuffer>(&self) -> AccumulatorTable<B> {
        let mut acc = self.allocate::<B>();
        let mut codes = Vec::with_capacity(self.dims.len());
        let mut cells = Vec::new();

        for pass in 0..self.passes() {
            let target = self.targets.get(pass);
            for row in 0..self.rows {
                if !self.row_cells(row, &mut codes, &mut cells) {
                    continue;
                }
                let value = target.map(|t| t.value(row));
                for &cell in &cells {
                    if pass == 0 {
                        if let Some(count) = &mut acc.count {
                            count.add(cell, 1.0);
                        }
                    }
                    let Some(v) = value else { continue };
                    let [sum, ssq, min, max] = &mut acc.columns[pass];
                    if let Some(sum) = sum {
                        sum.add(cell, v);
                    }
                    if let Some(ssq) = ssq {
                        ssq.add(cell, v * v);
                    }
                    if let Some(min) = min {
                        min.fold_min(cell, v);
                    }
                    if let Some(max) = max {
                        max.fold_max(cell, v);
                    }
                }
            }
        }
        acc
    }

    /// Assemble the response from per-dimension codes and the materialized accumulators.
    pub(crate) fn respond(
        &self,
        query: &CubeQuery<'_>,
        dim_codes: Vec<Vec<u32>>,
        accumulators: &Materialized,
    ) -> Vec<ResultColumn> {
        let unique = |dim: &BoundDimension<'_>| match self.mode {
            Mode::Dense => Some(dim.extent()),
            Mode::Sparse => None,
        };

        let mut columns: Vec<ResultColumn> = self
            .dims
            .iter()
            .zip(dim_codes)
            .map(|(dim, codes)| {
                let values = if self.code {
                    DimensionValues::Codes(codes)
                } else {
                    let lut = dim.lut();
                    DimensionValues::Labels(codes.iter().map(|&c| lut[c as usize].clone()).collect())
                };
                ResultColumn::Dimension(DimensionColumn {
                    name: dim.name().to_string(),
                    values,
                    unique: unique(dim),
                })
            })
            .collect();

        let mut ctx = DeriveContext::new(accumulators, &self.target_ids);
        columns.extend(query.vals.iter().map(|val| {
            ResultColumn::Aggregate(AggregateColumn {
                name: val.to_string(),
                values: val.derive(&mut ctx),
            })
        }));
        columns
    }
}
