//! Dictionary-encoded columnar storage for datacube.
//!
//! This crate focuses on:
//! - Dictionary encoding of raw values against a sorted lookup table (LUT), including
//!   multi-valued cells (comma separated input values).
//! - A `Table` of equally long columns with O(1) name/position lookups.
//! - Predicate filtering that produces independent tables sharing the immutable LUTs.

#![forbid(unsafe_code)]

mod encoding;
mod table;
mod types;

pub use crate::table::{
    CellValue, Column, ColumnInput, ColumnSchema, Table, TableError, TableResult,
};
pub use crate::types::{Cell, ColumnType, Value};
