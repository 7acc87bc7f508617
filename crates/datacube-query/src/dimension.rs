use crate::config::QueryOptions;
use crate::error::{QueryError, QueryResult};
use datacube_columnar::{Cell, Column, Table, Value};
use std::cmp::Ordering;
use std::sync::Arc;

/// A grouping axis of a cube query.
#[derive(Clone, Debug, PartialEq)]
pub enum Dimension {
    /// Group by the column's own dictionary.
    Column(String),
    Bin(Bin),
    Quantile(Quantile),
}

impl Dimension {
    pub fn column(name: impl Into<String>) -> Self {
        Dimension::Column(name.into())
    }

    pub fn bin(column: impl Into<String>, step: f64) -> Bin {
        Bin::new(column, step)
    }

    pub fn quantile(column: impl Into<String>, bins: usize) -> Quantile {
        Quantile::new(column, bins)
    }

    /// Name of the source column.
    pub fn column_name(&self) -> &str {
        match self {
            Dimension::Column(name) => name,
            Dimension::Bin(bin) => &bin.column,
            Dimension::Quantile(quantile) => &quantile.column,
        }
    }

    /// Resolve the dimension against `table` into per-row codes plus the label lookup table.
    pub fn bind<'t>(&self, table: &'t Table, options: &QueryOptions) -> QueryResult<BoundDimension<'t>> {
        let column = lookup(table, self.column_name())?;
        let bound = match self {
            Dimension::Column(_) => BoundDimension {
                name: column.name().to_string(),
                lut: Arc::clone(column.lut()),
                codes: DimCodes::Column(column.cells()),
            },
            Dimension::Bin(bin) => bin.bind_column(column, options)?,
            Dimension::Quantile(quantile) => quantile.bind_column(column, options)?,
        };

        if bound.lut.is_empty() {
            return Err(QueryError::EmptyDimension {
                dimension: bound.name,
            });
        }
        Ok(bound)
    }
}

impl From<&str> for Dimension {
    fn from(name: &str) -> Self {
        Dimension::Column(name.to_string())
    }
}

impl From<String> for Dimension {
    fn from(name: String) -> Self {
        Dimension::Column(name)
    }
}

impl From<Bin> for Dimension {
    fn from(bin: Bin) -> Self {
        Dimension::Bin(bin)
    }
}

impl From<Quantile> for Dimension {
    fn from(quantile: Quantile) -> Self {
        Dimension::Quantile(quantile)
    }
}

fn lookup<'t>(table: &'t Table, name: &str) -> QueryResult<&'t Column> {
    table.column(name).ok_or_else(|| QueryError::ColumnNotFound {
        column: name.to_string(),
    })
}

/// Fixed-width binning of a numeric column.
///
/// Bounds left unset are derived from the data, rounded outwards to a multiple of `step`.
/// Deriving them needs at least one finite value among the rows present, so a derived-bounds
/// bin over a table filtered down to no rows fails with [`QueryError::EmptyDimension`], where a
/// column dimension would yield an all-zero cube. Set both `min` and `max` to keep the cube
/// shape stable across filters.
#[derive(Clone, Debug, PartialEq)]
pub struct Bin {
    pub column: String,
    pub step: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bin {
    pub fn new(column: impl Into<String>, step: f64) -> Self {
        Self {
            column: column.into(),
            step,
            min: None,
            max: None,
        }
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Bin index of a single value, `None` when it falls outside `[min, max]`.
    fn index(value: f64, min: f64, max: f64, step: f64, bins: usize) -> Option<u32> {
        if !(value >= min && value <= max) {
            return None;
        }
        if value == max {
            return Some((bins - 1) as u32);
        }
        let idx = ((value - min) / step).floor() as usize;
        Some(idx.min(bins - 1) as u32)
    }

    fn bind_column<'t>(&self, column: &'t Column, options: &QueryOptions) -> QueryResult<BoundDimension<'t>> {
        let step = self.step;
        if !(step.is_finite() && step > 0.0) {
            return Err(QueryError::InvalidBinStep {
                column: self.column.clone(),
                step,
            });
        }

        let numeric: Vec<f64> = column.lut().iter().map(Value::as_f64).collect();
        let (min, max) = match (self.min, self.max) {
            (Some(min), Some(max)) => (min, max),
            (min, max) => {
                let Some((lo, hi)) = observed_range(column, &numeric) else {
                    return Err(QueryError::EmptyDimension {
                        dimension: self.column.clone(),
                    });
                };
                (
                    min.unwrap_or_else(|| (lo / step).floor() * step),
                    max.unwrap_or_else(|| (hi / step).ceil() * step),
                )
            }
        };
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(QueryError::InvalidBinRange {
                column: self.column.clone(),
                min,
                max,
            });
        }

        let span = ((max - min) / step).ceil().max(1.0);
        if span > options.max_bins as f64 {
            return Err(QueryError::DimensionCardinalityOverflow {
                cells: span as u128,
                limit: options.max_bins,
            });
        }
        let bins = span as usize;

        let code_bins: Vec<Option<u32>> = numeric
            .iter()
            .map(|&v| Self::index(v, min, max, step, bins))
            .collect();
        // Labels are `min + i * step`, computed per bin.
        let lut: Arc<[Value]> = (0..bins)
            .map(|i| Value::number(min + i as f64 * step))
            .collect();

        Ok(BoundDimension {
            name: column.name().to_string(),
            lut,
            codes: DimCodes::Derived(remap_cells(column.cells(), &code_bins)),
        })
    }
}

/// Smallest and largest finite value present in the column's rows.
fn observed_range(column: &Column, numeric: &[f64]) -> Option<(f64, f64)> {
    let mut range: Option<(f64, f64)> = None;
    for cell in column.cells() {
        for &code in cell.codes() {
            let v = numeric[code as usize];
            if !v.is_finite() {
                continue;
            }
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
    }
    range
}

/// Equal-population binning of a column.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantile {
    pub column: String,
    pub bins: usize,
}

impl Quantile {
    pub fn new(column: impl Into<String>, bins: usize) -> Self {
        Self {
            column: column.into(),
            bins,
        }
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    /// Decoded quantile boundaries `q[0..=n]` for the column as stored in `table`.
    pub fn boundaries(&self, table: &Table) -> QueryResult<Vec<Value>> {
        let column = lookup(table, &self.column)?;
        let q = self.boundary_codes(column)?;
        Ok(q.iter().map(|&code| column.lut()[code as usize].clone()).collect())
    }

    fn boundary_codes(&self, column: &Column) -> QueryResult<Vec<u32>> {
        let n = self.bins;
        if n == 0 {
            return Err(QueryError::InvalidQuantileCount {
                column: self.column.clone(),
            });
        }

        // Codes ascend with values because the lookup table is sorted.
        let sorted = column.sorted_codes();
        let Some(&first) = sorted.first() else {
            return Err(QueryError::EmptyDimension {
                dimension: self.column.clone(),
            });
        };

        let last = sorted.len() - 1;
        let mut q = Vec::with_capacity(n + 1);
        q.push(first);
        q.extend((1..=n).map(|i| sorted[i * last / n]));
        Ok(q)
    }

    fn bind_column<'t>(&self, column: &'t Column, options: &QueryOptions) -> QueryResult<BoundDimension<'t>> {
        if self.bins as u64 > options.max_bins {
            return Err(QueryError::DimensionCardinalityOverflow {
                cells: self.bins as u128,
                limit: options.max_bins,
            });
        }
        let q = self.boundary_codes(column)?;
        let n = self.bins;

        let code_bins: Vec<Option<u32>> = (0..column.lut().len() as u32)
            .map(|code| {
                let at = search(&q, code);
                Some(at.saturating_sub(1).min(n - 1) as u32)
            })
            .collect();
        let lut: Arc<[Value]> = (0..n).map(|i| Value::number(i as f64)).collect();

        Ok(BoundDimension {
            name: column.name().to_string(),
            lut,
            codes: DimCodes::Derived(remap_cells(column.cells(), &code_bins)),
        })
    }
}

/// Midpoint bisection over the boundary codes.
///
/// Returns the first exact match the bisection reaches, which is not necessarily the first
/// equal boundary, or the insertion point on a miss.
fn search(q: &[u32], code: u32) -> usize {
    let (mut low, mut high) = (0isize, q.len() as isize - 1);
    while low <= high {
        let mid = (low + high) >> 1;
        match q[mid as usize].cmp(&code) {
            Ordering::Less => low = mid + 1,
            Ordering::Greater => high = mid - 1,
            Ordering::Equal => return mid as usize,
        }
    }
    low as usize
}

/// Per-row code of a derived dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The row does not take part in the cube.
    Excluded,
    Single(u32),
    /// One entry per piece of a multi-valued row; `None` marks a piece outside the dimension.
    Multi(Box<[Option<u32>]>),
}

fn remap_cells(cells: &[Cell], code_bins: &[Option<u32>]) -> Vec<Slot> {
    cells
        .iter()
        .map(|cell| match cell {
            Cell::Single(code) => code_bins[*code as usize].map_or(Slot::Excluded, Slot::Single),
            Cell::Multi(codes) => {
                let bins: Box<[Option<u32>]> = codes.iter().map(|c| code_bins[*c as usize]).collect();
                if bins.iter().all(Option::is_none) {
                    Slot::Excluded
                } else {
                    Slot::Multi(bins)
                }
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
enum DimCodes<'t> {
    Column(&'t [Cell]),
    Derived(Vec<Slot>),
}

/// Code of one row along one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimCode<'a> {
    Excluded,
    Single(u32),
    Multi(&'a [u32]),
    /// Multi-valued row of a derived dimension; `None` pieces skip their fan-out slot.
    Partial(&'a [Option<u32>]),
}

/// A dimension resolved against a concrete table.
#[derive(Clone, Debug)]
pub struct BoundDimension<'t> {
    name: String,
    lut: Arc<[Value]>,
    codes: DimCodes<'t>,
}

impl<'t> BoundDimension<'t> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels of the axis; a code is a position in this slice.
    pub fn lut(&self) -> &Arc<[Value]> {
        &self.lut
    }

    pub fn extent(&self) -> usize {
        self.lut.len()
    }

    pub fn code(&self, row: usize) -> DimCode<'_> {
        match &self.codes {
            DimCodes::Column(cells) => match &cells[row] {
                Cell::Single(code) => DimCode::Single(*code),
                Cell::Multi(codes) => DimCode::Multi(codes),
            },
            DimCodes::Derived(slots) => match &slots[row] {
                Slot::Excluded => DimCode::Excluded,
                Slot::Single(code) => DimCode::Single(*code),
                Slot::Multi(codes) => DimCode::Partial(codes),
            },
        }
    }
}
