use std::collections::BTreeSet;

use tracing::debug;

use crate::table::Table;

/// Columns never considered for categorical encoding: row and result
/// identifiers, raw times and the value columns of the result schema.
pub const DEFAULT_CATEGORICALS_COLUMN_EXCLUSION_SET: &[&str] = &[
    "rowId",
    "vectorId",
    "scalarId",
    "statId",
    "eventNumber",
    "simtimeRaw",
    "value",
    "scalarValue",
    "statCount",
    "statMean",
    "statStddev",
    "statSum",
    "statSqrsum",
    "statMin",
    "statMax",
];

/// How a pipeline normalizes column types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalization {
    /// Requested for encoding; still subject to the threshold.
    pub categorical: Vec<String>,
    pub excluded: BTreeSet<String>,
    /// Coerced to reals after the categorical pass.
    pub numeric: Vec<String>,
}

impl Normalization {
    /// Adds columns that must never be encoded, e.g. the value alias.
    pub fn excluding<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut normalization = self.clone();
        normalization.excluded.extend(columns.into_iter().map(Into::into));
        normalization
    }
    pub fn apply(&self, table: &mut Table) {
        normalize(table, &self.categorical, &self.excluded, &self.numeric);
    }
}

/// Encodes low-cardinality columns as ordered categoricals.
///
/// A column not excluded is encoded when its distinct count is below
/// `rows / 4`, the threshold being fixed once for the whole table. Columns in
/// `extra_columns` get no exemption from the threshold; the ones left out are
/// only reported. Finally every column in `numeric_columns` is coerced to reals.
pub fn normalize(
    table: &mut Table,
    extra_columns: &[String],
    excluded_columns: &BTreeSet<String>,
    numeric_columns: &[String],
) {
    let excluded = |name: &str| {
        excluded_columns.contains(name) || DEFAULT_CATEGORICALS_COLUMN_EXCLUSION_SET.contains(&name)
    };
    let threshold = table.row_count() as f64 / 4.0;
    let selected: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !excluded(c.name()))
        .filter(|c| (c.distinct_count() as f64) < threshold)
        .map(|c| c.name().to_string())
        .collect();
    debug!(?excluded_columns, ?selected, threshold, "categorical columns");
    let passed_over: Vec<&String> = extra_columns.iter().filter(|e| !selected.contains(e)).collect();
    if !passed_over.is_empty() {
        debug!(?passed_over, threshold, "requested categorical columns left as they are");
    }
    for name in &selected {
        if let Some(column) = table.column_mut(name) {
            column.make_categorical();
        }
    }
    for name in numeric_columns {
        if let Some(column) = table.column_mut(name) {
            column.make_real();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::Value;

    fn table(rows: usize, distinct: usize) -> Table {
        let values = (0..rows).map(|i| Value::Integer((i % distinct) as i64)).collect();
        let copy = (0..rows).map(|i| Value::Integer((i % distinct) as i64)).collect();
        Table::new(vec![("c".to_string(), values), ("eventNumber".to_string(), copy)]).unwrap()
    }

    #[test]
    fn threshold_is_strict() {
        // 100 rows: 24 distinct is below 25, 25 is not
        let mut below = table(100, 24);
        normalize(&mut below, &[], &BTreeSet::new(), &[]);
        assert!(below.column("c").unwrap().is_categorical());
        let mut at = table(100, 25);
        normalize(&mut at, &[], &BTreeSet::new(), &[]);
        assert!(!at.column("c").unwrap().is_categorical());
    }

    #[test]
    fn excluded_columns_are_never_encoded() {
        let mut t = table(100, 2);
        normalize(&mut t, &["eventNumber".to_string()], &BTreeSet::from(["c".to_string()]), &[]);
        assert!(!t.column("c").unwrap().is_categorical());
        assert!(!t.column("eventNumber").unwrap().is_categorical());
    }

    #[test]
    fn requested_columns_still_obey_the_threshold() {
        // 8 rows with 8 distinct host ids: 8 is not below 2
        let hosts = (0..8).map(|i| Value::from(format!("host{}", i))).collect();
        let mut t = Table::new(vec![("hostId".to_string(), hosts)]).unwrap();
        normalize(&mut t, &["hostId".to_string()], &BTreeSet::new(), &[]);
        assert!(!t.column("hostId").unwrap().is_categorical());

        let mut low = table(8, 1);
        normalize(&mut low, &["c".to_string()], &BTreeSet::new(), &[]);
        assert!(low.column("c").unwrap().is_categorical());
    }

    #[test]
    fn numeric_coercion_runs_after_encoding() {
        let mut t = Table::new(vec![("rate".to_string(), vec![Value::from("10"); 8])]).unwrap();
        normalize(&mut t, &[], &BTreeSet::new(), &["rate".to_string()]);
        let rate = t.column("rate").unwrap();
        assert!(!rate.is_categorical());
        assert_eq!(rate.get(0), Some(Value::Real(10.0)));
    }

    #[test]
    fn empty_table_encodes_nothing() {
        let mut t = Table::with_schema(&["moduleName"]);
        normalize(&mut t, &[], &BTreeSet::new(), &[]);
        assert!(!t.column("moduleName").unwrap().is_categorical());
    }
}
