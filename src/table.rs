//! Column-oriented result tables.
//!
//! A [`Table`] is an ordered list of named, equal-length columns. A column
//! holds either plain [`Value`]s or an ordered categorical encoding (sorted
//! category list plus one code per row). Every extraction produces a table;
//! a table with zero rows is a valid result, not an error.

use std::collections::{HashMap, HashSet};
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

use crate::datatype::Value;
use crate::error::{ExtractError, Result};

pub type ValueHasher = BuildHasherDefault<SeaHasher>;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Values(Vec<Value>),
    /// Codes index into `categories`; `None` marks a null cell.
    Categorical {
        categories: Vec<Value>,
        codes: Vec<Option<u32>>,
        ordered: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Values(values),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn data(&self) -> &ColumnData {
        &self.data
    }
    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Values(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn is_categorical(&self) -> bool {
        matches!(self.data, ColumnData::Categorical { .. })
    }
    pub fn categories(&self) -> Option<&[Value]> {
        match &self.data {
            ColumnData::Categorical { categories, .. } => Some(categories),
            ColumnData::Values(_) => None,
        }
    }
    pub fn get(&self, row: usize) -> Option<Value> {
        match &self.data {
            ColumnData::Values(v) => v.get(row).cloned(),
            ColumnData::Categorical { categories, codes, .. } => codes.get(row).map(|code| match code {
                Some(c) => categories[*c as usize].clone(),
                None => Value::Null,
            }),
        }
    }
    /// Decoded cell values, in row order.
    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).filter_map(|row| self.get(row)).collect()
    }
    /// Number of distinct cell values, null included.
    pub fn distinct_count(&self) -> usize {
        match &self.data {
            ColumnData::Values(v) => {
                let distinct: HashSet<&Value, ValueHasher> = v.iter().collect();
                distinct.len()
            }
            ColumnData::Categorical { codes, .. } => {
                let distinct: HashSet<&Option<u32>, ValueHasher> = codes.iter().collect();
                distinct.len()
            }
        }
    }
    /// Re-encodes the column as an ordered categorical with sorted categories.
    pub fn make_categorical(&mut self) {
        if let ColumnData::Categorical { ordered, .. } = &self.data {
            if *ordered {
                return;
            }
            self.data = ColumnData::Values(self.values());
        }
        let ColumnData::Values(values) = &self.data else {
            return;
        };
        let distinct: HashSet<&Value, ValueHasher> = values.iter().filter(|v| !v.is_null()).collect();
        let mut categories: Vec<Value> = distinct.into_iter().cloned().collect();
        categories.sort();
        let index: HashMap<&Value, u32, ValueHasher> = categories
            .iter()
            .enumerate()
            .map(|(i, v)| (v, i as u32))
            .collect();
        let codes = values
            .iter()
            .map(|v| if v.is_null() { None } else { index.get(v).copied() })
            .collect();
        self.data = ColumnData::Categorical {
            categories,
            codes,
            ordered: true,
        };
    }
    /// Replaces every cell by its real representation, dropping any categorical encoding.
    pub fn make_real(&mut self) {
        let values = self.values().iter().map(Value::to_real).collect();
        self.data = ColumnData::Values(values);
    }
    fn take(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Values(v) => ColumnData::Values(rows.iter().map(|r| v[*r].clone()).collect()),
            ColumnData::Categorical { categories, codes, ordered } => ColumnData::Categorical {
                categories: categories.clone(),
                codes: rows.iter().map(|r| codes[*r]).collect(),
                ordered: *ordered,
            },
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// A table without columns or rows.
    pub fn empty() -> Self {
        Self::default()
    }
    pub fn new(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut table = Table::empty();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }
    /// A table with the given columns and no rows.
    pub fn with_schema<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            columns: names.iter().map(|n| Column::new(n.as_ref(), Vec::new())).collect(),
            rows: 0,
        }
    }
    pub fn row_count(&self) -> usize {
        self.rows
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name()).collect()
    }
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
    pub fn value(&self, row: usize, column: &str) -> Option<Value> {
        self.column(column).and_then(|c| c.get(row))
    }

    /// Adds a column, or replaces an existing one of the same name in place.
    /// The first column of an empty table sets the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(ExtractError::Invariant(format!(
                "column '{}' has {} rows, table has {}",
                name,
                values.len(),
                self.rows
            )));
        }
        let column = Column::new(name, values);
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Assigns a constant-valued column, replacing any column of that name.
    pub fn assign_constant(&mut self, name: &str, value: Value) {
        let values = vec![value; self.rows];
        let column = Column::new(name, values);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c.name != name);
        before != self.columns.len()
    }

    pub fn filter_rows(&self, keep: impl Fn(usize) -> bool) -> Table {
        let rows: Vec<usize> = (0..self.rows).filter(|r| keep(*r)).collect();
        Table {
            columns: self.columns.iter().map(|c| c.take(&rows)).collect(),
            rows: rows.len(),
        }
    }

    /// Wide to long: every column except `value_column` becomes an identifier,
    /// and the value column turns into a `(var_name, value_name)` pair where
    /// `var_name` holds the former column name.
    pub fn melt(&self, value_column: &str, var_name: &str, value_name: &str) -> Table {
        let Some(values) = self.column(value_column) else {
            return Table::empty();
        };
        let mut columns: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| c.name != value_column)
            .cloned()
            .collect();
        columns.push(Column::new(var_name, vec![Value::from(value_column); self.rows]));
        columns.push(Column::new(value_name, values.values()));
        Table {
            columns,
            rows: self.rows,
        }
    }

    /// Stacks tables vertically. Columns are unioned in order of first
    /// appearance; cells missing from a table are null. Categorical
    /// encodings are decoded, since their category sets may differ.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !names.contains(&column.name) {
                    names.push(column.name.clone());
                }
            }
        }
        let rows: usize = tables.iter().map(|t| t.rows).sum();
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|n| Column::new(n, Vec::with_capacity(rows)))
            .collect();
        for table in &tables {
            for column in columns.iter_mut() {
                let ColumnData::Values(out) = &mut column.data else {
                    continue;
                };
                match table.column(&column.name) {
                    Some(source) => out.extend(source.values()),
                    None => out.extend(std::iter::repeat_n(Value::Null, table.rows)),
                }
            }
        }
        Table { columns, rows }
    }

    /// blake3 digest over names, encodings and decoded cells, as a hex string.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = Vec::new();
        hasher.update(&(self.rows as u64).to_le_bytes());
        for column in &self.columns {
            buffer.clear();
            buffer.extend_from_slice(column.name.as_bytes());
            buffer.push(if column.is_categorical() { 1 } else { 0 });
            if let Some(categories) = column.categories() {
                for category in categories {
                    category.write_bytes(&mut buffer);
                }
            }
            for value in column.values() {
                value.write_bytes(&mut buffer);
            }
            hasher.update(&buffer);
        }
        hasher.finalize().to_hex().to_string()
    }
}
