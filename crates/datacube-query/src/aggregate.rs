use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A raw accumulator the executor can fill during a row pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccumulatorKind {
    Count,
    Sum,
    SumSquares,
    Min,
    Max,
}

impl AccumulatorKind {
    pub const ALL: [AccumulatorKind; 5] = [
        AccumulatorKind::Count,
        AccumulatorKind::Sum,
        AccumulatorKind::SumSquares,
        AccumulatorKind::Min,
        AccumulatorKind::Max,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Slot in a per-column accumulator row. `Count` is only kept for the row target.
    pub(crate) fn column_slot(self) -> Option<usize> {
        match self {
            AccumulatorKind::Count => None,
            AccumulatorKind::Sum => Some(0),
            AccumulatorKind::SumSquares => Some(1),
            AccumulatorKind::Min => Some(2),
            AccumulatorKind::Max => Some(3),
        }
    }
}

pub(crate) const COLUMN_SLOTS: usize = 4;

/// A small set of [`AccumulatorKind`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccumulatorSet(u8);

impl AccumulatorSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(kinds: &[AccumulatorKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, &kind| set.with(kind))
    }

    pub fn with(self, kind: AccumulatorKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, kind: AccumulatorKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = AccumulatorKind> {
        AccumulatorKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

/// What an accumulator is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target<'a> {
    /// Every contributing row (the `*` wildcard).
    Rows,
    Column(&'a str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement<'a> {
    pub target: Target<'a>,
    pub kinds: AccumulatorSet,
}

/// An aggregate (value) operator of a cube query.
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregate {
    Count,
    Sum(String),
    Min(String),
    Max(String),
    Avg(String),
    /// Population variance `ssq/cnt - avg²`.
    ///
    /// `sample` is accepted for API compatibility but no Bessel correction is applied.
    Variance { column: String, sample: bool },
    /// Square root of [`Aggregate::Variance`]; `sample` is likewise not applied.
    Stdev { column: String, sample: bool },
}

impl Aggregate {
    pub fn count() -> Self {
        Aggregate::Count
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Aggregate::Sum(column.into())
    }

    pub fn min(column: impl Into<String>) -> Self {
        Aggregate::Min(column.into())
    }

    pub fn max(column: impl Into<String>) -> Self {
        Aggregate::Max(column.into())
    }

    pub fn avg(column: impl Into<String>) -> Self {
        Aggregate::Avg(column.into())
    }

    pub fn variance(column: impl Into<String>, sample: bool) -> Self {
        Aggregate::Variance {
            column: column.into(),
            sample,
        }
    }

    pub fn stdev(column: impl Into<String>, sample: bool) -> Self {
        Aggregate::Stdev {
            column: column.into(),
            sample,
        }
    }

    /// The column the operator aggregates over, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Aggregate::Count => None,
            Aggregate::Sum(column)
            | Aggregate::Min(column)
            | Aggregate::Max(column)
            | Aggregate::Avg(column)
            | Aggregate::Variance { column, .. }
            | Aggregate::Stdev { column, .. } => Some(column),
        }
    }

    /// Accumulators the executor must fill before [`Aggregate::derive`] can run.
    pub fn requirements(&self) -> Vec<Requirement<'_>> {
        use AccumulatorKind::*;

        let rows_count = Requirement {
            target: Target::Rows,
            kinds: AccumulatorSet::of(&[Count]),
        };
        fn on<'a>(column: &'a str, kinds: &[AccumulatorKind]) -> Requirement<'a> {
            Requirement {
                target: Target::Column(column),
                kinds: AccumulatorSet::of(kinds),
            }
        }

        match self {
            Aggregate::Count => vec![rows_count],
            Aggregate::Sum(column) => vec![on(column, &[Sum])],
            Aggregate::Min(column) => vec![on(column, &[Min])],
            Aggregate::Max(column) => vec![on(column, &[Max])],
            Aggregate::Avg(column) => vec![rows_count, on(column, &[Sum])],
            Aggregate::Variance { column, .. } | Aggregate::Stdev { column, .. } => {
                vec![rows_count, on(column, &[Sum, SumSquares])]
            }
        }
    }

    /// Compute the operator's per-cell output from the filled accumulators.
    pub(crate) fn derive(&self, ctx: &mut DeriveContext<'_>) -> Vec<f64> {
        match self {
            Aggregate::Count => ctx.count().to_vec(),
            Aggregate::Sum(column) => ctx.column(column, AccumulatorKind::Sum).to_vec(),
            Aggregate::Min(column) => ctx.column(column, AccumulatorKind::Min).to_vec(),
            Aggregate::Max(column) => ctx.column(column, AccumulatorKind::Max).to_vec(),
            Aggregate::Avg(column) => ctx.avg(column).to_vec(),
            Aggregate::Variance { column, .. } => ctx.variance(column),
            Aggregate::Stdev { column, .. } => {
                let mut values = ctx.variance(column);
                for v in &mut values {
                    *v = v.sqrt();
                }
                values
            }
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Count => f.write_str("count"),
            Aggregate::Sum(c) => write!(f, "sum({c})"),
            Aggregate::Min(c) => write!(f, "min({c})"),
            Aggregate::Max(c) => write!(f, "max({c})"),
            Aggregate::Avg(c) => write!(f, "avg({c})"),
            Aggregate::Variance { column, .. } => write!(f, "variance({column})"),
            Aggregate::Stdev { column, .. } => write!(f, "stdev({column})"),
        }
    }
}

/// Filled accumulators aligned to the cells a query materializes.
///
/// Dense queries align to every cube cell; sparse queries align to the touched cells only.
#[derive(Debug, Default)]
pub(crate) struct Materialized {
    pub(crate) len: usize,
    pub(crate) count: Option<Vec<f64>>,
    pub(crate) columns: Vec<[Option<Vec<f64>>; COLUMN_SLOTS]>,
}

pub(crate) struct DeriveContext<'a> {
    accumulators: &'a Materialized,
    target_ids: &'a HashMap<String, usize>,
    avg_cache: HashMap<usize, Arc<[f64]>>,
    missing: Vec<f64>,
}

impl<'a> DeriveContext<'a> {
    pub(crate) fn new(accumulators: &'a Materialized, target_ids: &'a HashMap<String, usize>) -> Self {
        Self {
            accumulators,
            target_ids,
            avg_cache: HashMap::new(),
            missing: vec![f64::NAN; accumulators.len],
        }
    }

    fn count(&self) -> &[f64] {
        self.accumulators.count.as_deref().unwrap_or(&self.missing)
    }

    fn column(&self, column: &str, kind: AccumulatorKind) -> &[f64] {
        let slot = self
            .target_ids
            .get(column)
            .zip(kind.column_slot())
            .and_then(|(&target, slot)| self.accumulators.columns.get(target)?[slot].as_deref());
        slot.unwrap_or(&self.missing)
    }

    /// Per-cell mean, computed once per target column and shared by every operator needing it.
    fn avg(&mut self, column: &str) -> Arc<[f64]> {
        let Some(&target) = self.target_ids.get(column) else {
            return self.missing.as_slice().into();
        };
        if let Some(avg) = self.avg_cache.get(&target) {
            return Arc::clone(avg);
        }

        let avg: Arc<[f64]> = self
            .column(column, AccumulatorKind::Sum)
            .iter()
            .zip(self.count())
            .map(|(sum, cnt)| sum / cnt)
            .collect();
        self.avg_cache.insert(target, Arc::clone(&avg));
        avg
    }

    fn variance(&mut self, column: &str) -> Vec<f64> {
        let avg = self.avg(column);
        self.column(column, AccumulatorKind::SumSquares)
            .iter()
            .zip(self.count())
            .zip(avg.iter())
            .map(|((ssq, cnt), avg)| ssq / cnt - avg * avg)
            .collect()
    }
}
