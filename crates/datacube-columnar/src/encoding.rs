#![forbid(unsafe_code)]

use crate::types::{cmp_lexicographic, cmp_numeric, Cell, ColumnType, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A raw row after null substitution and quote/comma handling.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum NormalizedRow {
    Single(Value),
    Multi(Vec<Value>),
}

/// Normalize one raw input value.
///
/// Never fails: malformed quoting falls back to treating the text as-is.
pub(crate) fn normalize(value: Value, column_type: ColumnType) -> NormalizedRow {
    match value {
        Value::Null if column_type != ColumnType::Numeric => NormalizedRow::Single(Value::empty()),
        Value::String(text) => normalize_text(text),
        other => NormalizedRow::Single(other),
    }
}

fn normalize_text(text: Arc<str>) -> NormalizedRow {
    if let Some(inner) = strip_quotes(&text) {
        return NormalizedRow::Single(Value::from(inner));
    }
    if !text.contains(',') {
        return NormalizedRow::Single(Value::String(text));
    }
    NormalizedRow::Multi(text.split(',').map(|part| Value::from(part.trim())).collect())
}

fn strip_quotes(text: &str) -> Option<&str> {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Dictionary under construction.
///
/// Values are interned in first-seen order and remapped onto the sorted order once all
/// rows have been seen.
struct DictBuilder {
    dictionary: Vec<Value>,
    dict_map: HashMap<Value, u32>,
    rows: Vec<Cell>,
}

impl DictBuilder {
    fn with_capacity(rows: usize) -> Self {
        Self {
            dictionary: Vec::new(),
            dict_map: HashMap::new(),
            rows: Vec::with_capacity(rows),
        }
    }

    fn intern(&mut self, value: Value) -> u32 {
        if let Some(idx) = self.dict_map.get(&value) {
            return *idx;
        }

        let idx = self.dictionary.len() as u32;
        self.dictionary.push(value.clone());
        self.dict_map.insert(value, idx);
        idx
    }

    fn push(&mut self, row: NormalizedRow) {
        let cell = match row {
            NormalizedRow::Single(value) => Cell::Single(self.intern(value)),
            NormalizedRow::Multi(values) => {
                Cell::Multi(values.into_iter().map(|v| self.intern(v)).collect())
            }
        };
        self.rows.push(cell);
    }

    fn finish(self) -> (Arc<[Value]>, Vec<Cell>) {
        let numeric = self.dictionary.first().is_some_and(Value::is_number);

        let mut order: Vec<u32> = (0..self.dictionary.len() as u32).collect();
        if numeric {
            order.sort_by(|&a, &b| cmp_numeric(&self.dictionary[a as usize], &self.dictionary[b as usize]));
        } else {
            order.sort_by(|&a, &b| {
                cmp_lexicographic(&self.dictionary[a as usize], &self.dictionary[b as usize])
            });
        }

        let mut remap = vec![0u32; order.len()];
        for (sorted, &provisional) in order.iter().enumerate() {
            remap[provisional as usize] = sorted as u32;
        }

        let lut: Arc<[Value]> = order
            .iter()
            .map(|&provisional| self.dictionary[provisional as usize].clone())
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|cell| match cell {
                Cell::Single(code) => Cell::Single(remap[code as usize]),
                Cell::Multi(codes) => Cell::Multi(codes.iter().map(|&c| remap[c as usize]).collect()),
            })
            .collect();

        (lut, rows)
    }
}

/// Dictionary-encode a column of raw values into a sorted lookup table plus one cell per row.
pub(crate) fn encode_values(
    name: &str,
    values: Vec<Value>,
    column_type: ColumnType,
) -> (Arc<[Value]>, Vec<Cell>) {
    let mut builder = DictBuilder::with_capacity(values.len());
    let mut nulls = 0usize;
    for value in values {
        if value.is_null() {
            nulls += 1;
        }
        builder.push(normalize(value, column_type));
    }

    if nulls > 0 && column_type == ColumnType::Numeric {
        log::warn!(
            "numeric column {name} has {nulls} missing value(s); they aggregate as NaN"
        );
    }

    builder.finish()
}
