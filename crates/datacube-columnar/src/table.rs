#![forbid(unsafe_code)]

use crate::encoding::encode_values;
use crate::types::{Cell, ColumnType, Value};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("duplicate column: {column}")]
    DuplicateColumn { column: String },

    #[error("row count mismatch for column {column}: expected {expected} rows, got {actual}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid table input: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TableResult<T> = Result<T, TableError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

/// One column of construction input: `{"name": .., "values": [..], "type": ..}`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ColumnInput {
    pub name: String,
    pub values: Vec<Value>,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnInput {
    pub fn new(
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            column_type,
        }
    }
}

/// A decoded row of a column.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue<'a> {
    Single(&'a Value),
    Multi(Vec<&'a Value>),
}

impl fmt::Display for CellValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Single(value) => write!(f, "{value}"),
            CellValue::Multi(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

/// A dictionary-encoded column.
///
/// The lookup table is immutable once built and shared (by `Arc`) with every filtered copy
/// of the owning table; the per-row cells are owned by this column alone.
#[derive(Clone, Debug)]
pub struct Column {
    schema: ColumnSchema,
    index: usize,
    lut: Arc<[Value]>,
    cells: Vec<Cell>,
    sorted_codes: OnceLock<Arc<[u32]>>,
}

impl Column {
    fn from_parts(schema: ColumnSchema, index: usize, lut: Arc<[Value]>, cells: Vec<Cell>) -> Self {
        Self {
            schema,
            index,
            lut,
            cells,
            sorted_codes: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.schema.column_type
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Position of the column inside its table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Sorted distinct values; a code is a position in this slice.
    pub fn lut(&self) -> &Arc<[Value]> {
        &self.lut
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, row: usize) -> Option<&Cell> {
        self.cells.get(row)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<CellValue<'_>> {
        Some(match self.cells.get(row)? {
            Cell::Single(code) => CellValue::Single(&self.lut[*code as usize]),
            Cell::Multi(codes) => {
                CellValue::Multi(codes.iter().map(|c| &self.lut[*c as usize]).collect())
            }
        })
    }

    /// String form of a row; multi-valued rows are joined with `", "`.
    pub fn get_string(&self, row: usize) -> Option<String> {
        self.get(row).map(|v| v.to_string())
    }

    /// Every atomic code of the column in ascending order.
    ///
    /// Computed on first use and cached on the column. Because the lookup table is sorted,
    /// ascending codes are also ascending values.
    pub fn sorted_codes(&self) -> &[u32] {
        self.sorted_codes.get_or_init(|| {
            let mut codes: Vec<u32> = self.cells.iter().flat_map(|c| c.codes().iter().copied()).collect();
            codes.sort_unstable();
            codes.into()
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(inputs: impl IntoIterator<Item = ColumnInput>) -> TableResult<Self> {
        let mut table = Self::new();
        for input in inputs {
            table.add_column(input.name, input.values, input.column_type)?;
        }
        Ok(table)
    }

    /// Build a table from a JSON array of `{"name", "values", "type"}` objects.
    pub fn from_json(json: &str) -> TableResult<Self> {
        let inputs: Vec<ColumnInput> = serde_json::from_str(json)?;
        Self::from_columns(inputs)
    }

    /// Encode `values` and append them as a new column at the next free position.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
        column_type: ColumnType,
    ) -> TableResult<&Column> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(TableError::DuplicateColumn { column: name });
        }
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(TableError::RowCountMismatch {
                column: name,
                expected: self.rows,
                actual: values.len(),
            });
        }

        self.rows = values.len();
        let (lut, cells) = encode_values(&name, values, column_type);
        let index = self.columns.len();
        self.by_name.insert(name.clone(), index);
        self.columns.push(Column::from_parts(
            ColumnSchema { name, column_type },
            index,
            lut,
            cells,
        ));
        Ok(&self.columns[index])
    }

    /// Remove a column by name, shifting later columns down one position.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let index = self.by_name.remove(name)?;
        let removed = self.columns.remove(index);
        for column in &mut self.columns[index..] {
            column.index -= 1;
            self.by_name.insert(column.schema.name.clone(), column.index);
        }
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Some(removed)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(*self.by_name.get(name)?)
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn get(&self, column: &str, row: usize) -> Option<CellValue<'_>> {
        self.column(column)?.get(row)
    }

    /// Keep the rows accepted by `predicate`, in their original order.
    ///
    /// The result shares every lookup table with `self` and owns fresh cell arrays, so it can
    /// outlive or be sent away from the source table.
    #[doc(alias = "where")]
    pub fn filter<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&Table, usize) -> bool,
    {
        let selected: Vec<usize> = (0..self.rows).filter(|&row| predicate(self, row)).collect();
        log::trace!("filter kept {} of {} rows", selected.len(), self.rows);

        let columns = self
            .columns
            .iter()
            .map(|column| {
                let cells = selected.iter().map(|&row| column.cells[row].clone()).collect();
                Column::from_parts(column.schema.clone(), column.index, Arc::clone(&column.lut), cells)
            })
            .collect();

        Table {
            columns,
            by_name: self.by_name.clone(),
            rows: selected.len(),
        }
    }
}
