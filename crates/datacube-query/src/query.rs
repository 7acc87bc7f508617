use crate::aggregate::Aggregate;
use crate::dimension::Dimension;
use datacube_columnar::{Table, Value};
use std::fmt;

/// Row predicate applied before the cube is built.
pub type RowPredicate<'p> = Box<dyn Fn(&Table, usize) -> bool + 'p>;

/// A cube query: group rows by `dims`, compute `vals` for every cell.
#[derive(Default)]
pub struct CubeQuery<'p> {
    pub dims: Vec<Dimension>,
    pub vals: Vec<Aggregate>,
    pub filter: Option<RowPredicate<'p>>,
    /// Return raw dimension codes instead of decoded labels.
    pub code: bool,
}

impl<'p> CubeQuery<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dim(mut self, dim: impl Into<Dimension>) -> Self {
        self.dims.push(dim.into());
        self
    }

    pub fn val(mut self, val: Aggregate) -> Self {
        self.vals.push(val);
        self
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Table, usize) -> bool + 'p,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn codes(mut self, code: bool) -> Self {
        self.code = code;
        self
    }
}

impl fmt::Debug for CubeQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeQuery")
            .field("dims", &self.dims)
            .field("vals", &self.vals)
            .field("filter", &self.filter.as_ref().map(|_| ".."))
            .field("code", &self.code)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DimensionValues {
    Labels(Vec<Value>),
    Codes(Vec<u32>),
}

impl DimensionValues {
    pub fn len(&self) -> usize {
        match self {
            DimensionValues::Labels(values) => values.len(),
            DimensionValues::Codes(codes) => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Option<&[Value]> {
        match self {
            DimensionValues::Labels(values) => Some(values),
            DimensionValues::Codes(_) => None,
        }
    }

    pub fn codes(&self) -> Option<&[u32]> {
        match self {
            DimensionValues::Codes(codes) => Some(codes),
            DimensionValues::Labels(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DimensionColumn {
    pub name: String,
    pub values: DimensionValues,
    /// Number of distinct labels on the axis; set by dense queries only.
    pub unique: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregateColumn {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResultColumn {
    Dimension(DimensionColumn),
    Aggregate(AggregateColumn),
}

impl ResultColumn {
    pub fn name(&self) -> &str {
        match self {
            ResultColumn::Dimension(column) => &column.name,
            ResultColumn::Aggregate(column) => &column.name,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultColumn::Dimension(column) => column.values.len(),
            ResultColumn::Aggregate(column) => column.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column-oriented query output: one column per dimension, then one per aggregate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    pub columns: Vec<ResultColumn>,
}

impl QueryResponse {
    /// Number of cube cells in the response.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, ResultColumn::len)
    }

    pub fn dimension(&self, index: usize) -> Option<&DimensionColumn> {
        self.dimensions().nth(index)
    }

    pub fn aggregate(&self, index: usize) -> Option<&AggregateColumn> {
        self.aggregates().nth(index)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &DimensionColumn> {
        self.columns.iter().filter_map(|column| match column {
            ResultColumn::Dimension(dim) => Some(dim),
            ResultColumn::Aggregate(_) => None,
        })
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &AggregateColumn> {
        self.columns.iter().filter_map(|column| match column {
            ResultColumn::Aggregate(val) => Some(val),
            ResultColumn::Dimension(_) => None,
        })
    }
}
