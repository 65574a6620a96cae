//! Query text for the OMNeT++ SQLite result schema.
//!
//! Names are embedded as string literals with single quotes doubled, aliases
//! as quoted identifiers. Every function is pure.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

pub const RUN_ATTR_QUERY: &str = "
    select runId, attrName, attrValue
        from runAttr
";

pub const RUN_PARAM_QUERY: &str = "
    select runId, paramKey, paramValue
        from runParam
";

pub const SIGNAL_NAMES_QUERY: &str = "
    select distinct vectorName
        from vector
";

/// Identifying columns to select next to the value.
///
/// `name` and `id` refer to the name/id column of the queried table
/// (`vectorName`/`vectorId`, `scalarName`/`scalarId`, `statName`/`statId`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Columns {
    pub run_id: bool,
    pub module_name: bool,
    pub event_number: bool,
    pub simtime_raw: bool,
    pub name: bool,
    pub id: bool,
}

/// Inclusive rectangle `(x0, y0, x1, y1)`, given as four numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Restriction {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Restriction {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self> {
        if ![x0, y0, x1, y1].iter().all(|b| b.is_finite()) {
            return Err(ExtractError::Config(format!(
                "restriction bounds must be finite numbers, got ({}, {}, {}, {})",
                x0, y0, x1, y1
            )));
        }
        Ok(Self { x0, y0, x1, y1 })
    }
    pub fn x_range(&self) -> (f64, f64) {
        (self.x0.min(self.x1), self.x0.max(self.x1))
    }
    pub fn y_range(&self) -> (f64, f64) {
        (self.y0.min(self.y1), self.y0.max(self.y1))
    }
    #[cfg(test)]
    fn contains(&self, x: f64, y: f64) -> bool {
        let (xl, xh) = self.x_range();
        let (yl, yh) = self.y_range();
        xl <= x && x <= xh && yl <= y && y <= yh
    }
}

impl TryFrom<Vec<f64>> for Restriction {
    type Error = ExtractError;
    fn try_from(bounds: Vec<f64>) -> Result<Self> {
        match bounds.as_slice() {
            [x0, y0, x1, y1] => Restriction::new(*x0, *y0, *x1, *y1),
            _ => Err(ExtractError::Config(format!(
                "restriction needs exactly four bounds (x0, y0, x1, y1), got {}",
                bounds.len()
            ))),
        }
    }
}

impl From<Restriction> for Vec<f64> {
    fn from(r: Restriction) -> Self {
        vec![r.x0, r.y0, r.x1, r.y1]
    }
}

pub fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn vector_columns(columns: Columns) -> Vec<String> {
    let mut select = Vec::new();
    if columns.run_id { select.push("v.runId".to_string()); }
    if columns.id { select.push("v.vectorId".to_string()); }
    if columns.module_name { select.push("v.moduleName".to_string()); }
    if columns.name { select.push("v.vectorName".to_string()); }
    if columns.event_number { select.push("vd.eventNumber".to_string()); }
    if columns.simtime_raw { select.push("vd.simtimeRaw".to_string()); }
    select
}

fn signal_select(condition: &str, value_label: &str, columns: Columns) -> String {
    let mut select = vector_columns(columns);
    select.push(format!("vd.value as {}", identifier(value_label)));
    format!(
        "
    select {}
        from vectorData vd
        join vector v
        on v.vectorId = vd.vectorId
        where v.vectorName {}
    ",
        select.join(", "),
        condition
    )
}

pub fn signal_query(signal: &str, value_label: &str, columns: Columns) -> String {
    signal_select(&format!("= {}", literal(signal)), value_label, columns)
}

pub fn signal_like_query(pattern: &str, value_label: &str, columns: Columns) -> String {
    signal_select(&format!("like {}", literal(pattern)), value_label, columns)
}

fn scalar_select(condition: &str, value_label: &str, columns: Columns) -> String {
    let mut select = Vec::new();
    if columns.run_id { select.push("s.runId".to_string()); }
    if columns.id { select.push("s.scalarId".to_string()); }
    if columns.module_name { select.push("s.moduleName".to_string()); }
    if columns.name { select.push("s.scalarName".to_string()); }
    select.push(format!("s.scalarValue as {}", identifier(value_label)));
    format!(
        "
    select {}
        from scalar s
        where s.scalarName {}
    ",
        select.join(", "),
        condition
    )
}

pub fn scalar_query(scalar: &str, value_label: &str, columns: Columns) -> String {
    scalar_select(&format!("= {}", literal(scalar)), value_label, columns)
}

pub fn scalar_like_query(pattern: &str, value_label: &str, columns: Columns) -> String {
    scalar_select(&format!("like {}", literal(pattern)), value_label, columns)
}

/// The mean is the value column; the remaining summary columns keep their names.
pub fn statistic_query(statistic: &str, value_label: &str, columns: Columns) -> String {
    let mut select = Vec::new();
    if columns.run_id { select.push("st.runId".to_string()); }
    if columns.id { select.push("st.statId".to_string()); }
    if columns.module_name { select.push("st.moduleName".to_string()); }
    if columns.name { select.push("st.statName".to_string()); }
    select.push("st.statCount".to_string());
    select.push(format!("st.statMean as {}", identifier(value_label)));
    for summary in ["statStddev", "statSum", "statSqrsum", "statMin", "statMax"] {
        select.push(format!("st.{}", summary));
    }
    format!(
        "
    select {}
        from statistic st
        where st.statName = {}
    ",
        select.join(", "),
        literal(statistic)
    )
}

pub struct PositionQuery<'a> {
    pub x_signal: &'a str,
    pub x_label: &'a str,
    pub y_signal: &'a str,
    pub y_label: &'a str,
    pub signal: &'a str,
    pub value_label: &'a str,
    pub restriction: Option<Restriction>,
}

/// Joins the signal to the x and y signals recorded by the same module at
/// the same event.
pub fn position_query(q: &PositionQuery<'_>, columns: Columns) -> String {
    let columns = Columns { name: false, id: false, ..columns };
    let mut select = vector_columns(columns);
    select.push(format!("px.value as {}", identifier(q.x_label)));
    select.push(format!("py.value as {}", identifier(q.y_label)));
    select.push(format!("vd.value as {}", identifier(q.value_label)));
    let mut query = format!(
        "
    select {}
        from vectorData vd
        join vector v
        on v.vectorId = vd.vectorId
        join vector vx
        on vx.runId = v.runId and vx.moduleName = v.moduleName and vx.vectorName = {}
        join vectorData px
        on px.vectorId = vx.vectorId and px.eventNumber = vd.eventNumber
        join vector vy
        on vy.runId = v.runId and vy.moduleName = v.moduleName and vy.vectorName = {}
        join vectorData py
        on py.vectorId = vy.vectorId and py.eventNumber = vd.eventNumber
        where v.vectorName = {}
    ",
        select.join(", "),
        literal(q.x_signal),
        literal(q.y_signal),
        literal(q.signal)
    );
    if let Some(r) = q.restriction {
        let (xl, xh) = r.x_range();
        let (yl, yh) = r.y_range();
        query.push_str(&format!(
            "    and px.value between {:?} and {:?} and py.value between {:?} and {:?}\n",
            xl, xh, yl, yh
        ));
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_quoted() {
        let q = signal_query("it's", "a\"b", Columns::default());
        assert!(q.contains("'it''s'"));
        assert!(q.contains("\"a\"\"b\""));
    }

    #[test]
    fn flags_select_columns() {
        let q = scalar_query("x", "v", Columns { module_name: true, run_id: true, ..Columns::default() });
        assert!(q.contains("s.runId, s.moduleName, s.scalarValue"));
        assert!(!q.contains("s.scalarId"));
    }

    #[test]
    fn restriction_rejects_wrong_arity_and_non_finite() {
        assert!(Restriction::try_from(vec![0.0, 1.0, 2.0]).is_err());
        assert!(Restriction::new(0.0, f64::NAN, 1.0, 1.0).is_err());
        let r = Restriction::new(10.0, 10.0, 0.0, 0.0).unwrap();
        assert!(r.contains(0.0, 10.0));
        assert!(!r.contains(-0.5, 5.0));
    }

    #[test]
    fn restriction_is_applied_to_the_joined_positions() {
        let q = position_query(
            &PositionQuery {
                x_signal: "posX",
                x_label: "x",
                y_signal: "posY",
                y_label: "y",
                signal: "cbr",
                value_label: "cbr",
                restriction: Some(Restriction::new(0.0, 0.0, 10.0, 10.0).unwrap()),
            },
            Columns { module_name: true, ..Columns::default() },
        );
        assert!(q.contains("px.value between 0.0 and 10.0"));
        assert!(q.contains("py.value between 0.0 and 10.0"));
    }
}
