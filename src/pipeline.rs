//! Per-file extraction pipelines, one for each [`ExtractorSpec`] case.
//!
//! Every pipeline reads its data, merges the allow-listed run tags as
//! constant columns, drops the `rowId` column and normalizes column types.
//! Nothing here fails: problems are logged and produce an empty table.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::{error, warn};

use crate::categorical::Normalization;
use crate::datatype::Value;
use crate::extractor::{
    BulkScalarSpec, BulkSignalSpec, ExtractorSpec, MatchingSpec, PositionSpec, RawScalarSpec,
    RawSignalSpec, RawStatisticSpec, SqlSpec,
};
use crate::reader::SqliteReader;
use crate::sql::{self, Columns, PositionQuery, SIGNAL_NAMES_QUERY};
use crate::table::Table;
use crate::tags::{apply_tags, TagSelection};
use crate::task::TaskContext;
use crate::template::AliasTemplate;

const ROW_ID: &str = "rowId";
const VARIABLE: &str = "variable";
const VALUE: &str = "value";

/// Extracts one file according to `spec`.
pub fn run(file: &str, spec: &ExtractorSpec, context: &TaskContext) -> Table {
    let reader = SqliteReader::new(file);
    match spec {
        ExtractorSpec::Sql(s) => read_sql(&reader, s),
        ExtractorSpec::RawSignal(s) => read_signal(&reader, s, context),
        ExtractorSpec::RawScalar(s) => read_scalar(&reader, s, context),
        ExtractorSpec::RawStatistic(s) => read_statistic(&reader, s, context),
        ExtractorSpec::Position(s) => read_position(&reader, s, context),
        ExtractorSpec::Matching(s) => read_matching(&reader, s, context),
        ExtractorSpec::BulkSignal(s) => read_bulk_signals(&reader, s, context),
        ExtractorSpec::BulkScalar(s) => read_bulk_scalars(&reader, s, context),
    }
}

/// The query result, or `None` when the query failed. A failed query has
/// no columns; a query matching no rows still has its schema.
fn query(reader: &SqliteReader, query: &str) -> Option<Table> {
    let table = reader.execute(query);
    if table.column_count() == 0 { None } else { Some(table) }
}

fn tag(reader: &SqliteReader, table: &mut Table, selection: &TagSelection, context: &TaskContext) {
    let tags = reader.extract_tags(context.tag_service.as_ref(), &context.tag_maps);
    apply_tags(table, &tags, &selection.allow_list());
}

/// Query, tags, `rowId` removal, then normalization with the value columns
/// kept out of the categorical pass.
fn read_tagged(
    reader: &SqliteReader,
    statement: &str,
    selection: &TagSelection,
    normalization: Normalization,
    context: &TaskContext,
) -> Table {
    let Some(mut table) = query(reader, statement) else {
        return Table::empty();
    };
    tag(reader, &mut table, selection, context);
    table.drop_column(ROW_ID);
    normalization.apply(&mut table);
    table
}

fn read_sql(reader: &SqliteReader, spec: &SqlSpec) -> Table {
    let Some(mut table) = query(reader, &spec.query) else {
        return Table::empty();
    };
    table.drop_column(ROW_ID);
    spec.source.normalization().apply(&mut table);
    if table.is_empty() {
        warn!(file = %reader.db_file(), query = %spec.query.trim(), "extraction yields no data");
        return Table::empty();
    }
    table
}

fn read_signal(reader: &SqliteReader, spec: &RawSignalSpec, context: &TaskContext) -> Table {
    let statement = sql::signal_query(&spec.signal, &spec.alias, spec.columns.columns());
    let normalization = spec.source.normalization().excluding([&spec.alias]);
    read_tagged(reader, &statement, &spec.tags, normalization, context)
}

fn read_scalar(reader: &SqliteReader, spec: &RawScalarSpec, context: &TaskContext) -> Table {
    let columns = Columns {
        run_id: spec.run_id,
        module_name: spec.module_name,
        name: spec.scalar_name,
        id: spec.scalar_id,
        ..Columns::default()
    };
    let statement = sql::scalar_query(&spec.signal, &spec.alias, columns);
    let normalization = spec.source.normalization().excluding([&spec.alias]);
    read_tagged(reader, &statement, &spec.tags, normalization, context)
}

fn read_statistic(reader: &SqliteReader, spec: &RawStatisticSpec, context: &TaskContext) -> Table {
    let columns = Columns {
        run_id: spec.run_id,
        module_name: spec.module_name,
        name: spec.stat_name,
        id: spec.stat_id,
        ..Columns::default()
    };
    let statement = sql::statistic_query(&spec.signal, &spec.alias, columns);
    let normalization = spec.source.normalization().excluding([&spec.alias]);
    read_tagged(reader, &statement, &spec.tags, normalization, context)
}

fn read_position(reader: &SqliteReader, spec: &PositionSpec, context: &TaskContext) -> Table {
    let statement = sql::position_query(
        &PositionQuery {
            x_signal: &spec.x_signal,
            x_label: &spec.x_alias,
            y_signal: &spec.y_signal,
            y_label: &spec.y_alias,
            signal: &spec.signal,
            value_label: &spec.alias,
            restriction: spec.restriction,
        },
        spec.columns.columns(),
    );
    let normalization = spec
        .source
        .normalization()
        .excluding([&spec.alias, &spec.x_alias, &spec.y_alias]);
    read_tagged(reader, &statement, &spec.tags, normalization, context)
}

fn compile(reader: &SqliteReader, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            error!(file = %reader.db_file(), pattern, error = %e, "invalid pattern");
            None
        }
    }
}

/// Every signal whose name contains a match of the pattern is read on its
/// own, under the alias rendered from the match. The per-signal tables are
/// melted into `variable`/`value` form and stacked.
fn read_matching(reader: &SqliteReader, spec: &MatchingSpec, context: &TaskContext) -> Table {
    let Some(regex) = compile(reader, &spec.pattern) else {
        return Table::empty();
    };
    let Some(catalog) = query(reader, SIGNAL_NAMES_QUERY) else {
        return Table::empty();
    };
    let names: BTreeSet<String> = catalog
        .column("vectorName")
        .map(|c| c.values())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();

    let mut matched = Vec::new();
    for name in &names {
        match spec.alias_pattern.substitute(&regex, name) {
            None => {}
            Some(Ok(alias)) => matched.push((name.as_str(), alias)),
            Some(Err(e)) => {
                error!(file = %reader.db_file(), signal = %name, error = %e, "signal skipped");
            }
        }
    }
    if matched.is_empty() {
        warn!(file = %reader.db_file(), pattern = %spec.pattern, "no signal matches");
        return Table::empty();
    }

    let tags = reader.extract_tags(context.tag_service.as_ref(), &context.tag_maps);
    let allowed = spec.tags.allow_list();
    let mut parts = Vec::with_capacity(matched.len());
    for (signal, alias) in &matched {
        let statement = sql::signal_query(signal, alias, spec.columns.columns());
        let Some(mut table) = query(reader, &statement) else {
            continue;
        };
        table.drop_column(ROW_ID);
        apply_tags(&mut table, &tags, &allowed);
        parts.push(table.melt(alias, VARIABLE, VALUE));
    }
    if parts.is_empty() {
        return Table::empty();
    }
    let mut table = Table::concat(parts);
    spec.source.normalization().apply(&mut table);
    table
}

fn read_bulk_signals(reader: &SqliteReader, spec: &BulkSignalSpec, context: &TaskContext) -> Table {
    let columns = Columns {
        name: true,
        ..spec.columns.columns()
    };
    let statement = sql::signal_like_query(&spec.pattern, &spec.alias, columns);
    let bulk = Bulk {
        name_column: "vectorName",
        alias: &spec.alias,
        alias_match_pattern: &spec.alias_match_pattern,
        alias_pattern: &spec.alias_pattern,
        tags: &spec.tags,
        normalization: spec.source.normalization(),
    };
    bulk.read(reader, &statement, context)
}

fn read_bulk_scalars(reader: &SqliteReader, spec: &BulkScalarSpec, context: &TaskContext) -> Table {
    let columns = Columns {
        run_id: spec.run_id,
        module_name: spec.module_name,
        name: true,
        id: spec.scalar_id,
        ..Columns::default()
    };
    let statement = sql::scalar_like_query(&spec.pattern, &spec.alias, columns);
    let bulk = Bulk {
        name_column: "scalarName",
        alias: &spec.alias,
        alias_match_pattern: &spec.alias_match_pattern,
        alias_pattern: &spec.alias_pattern,
        tags: &spec.tags,
        normalization: spec.source.normalization(),
    };
    bulk.read(reader, &statement, context)
}

/// Shared tail of the bulk pipelines: one query for all names, then a
/// `variable` column derived per row from the name column.
struct Bulk<'a> {
    name_column: &'a str,
    alias: &'a str,
    alias_match_pattern: &'a str,
    alias_pattern: &'a AliasTemplate,
    tags: &'a TagSelection,
    normalization: Normalization,
}

impl Bulk<'_> {
    fn read(&self, reader: &SqliteReader, statement: &str, context: &TaskContext) -> Table {
        let Some(regex) = compile(reader, self.alias_match_pattern) else {
            return Table::empty();
        };
        let Some(mut table) = query(reader, statement) else {
            return Table::empty();
        };
        if table.is_empty() {
            warn!(file = %reader.db_file(), "extraction yields no data");
            return Table::empty();
        }
        tag(reader, &mut table, self.tags, context);
        table.drop_column(ROW_ID);

        let Some(names) = table.column(self.name_column).map(|c| c.values()) else {
            error!(file = %reader.db_file(), column = self.name_column, "name column missing");
            return Table::empty();
        };
        let mut failures = 0usize;
        let variables: Vec<Value> = names
            .into_iter()
            .map(|name| {
                let Some(text) = name.as_str() else {
                    return name;
                };
                match self.alias_pattern.substitute(&regex, text) {
                    Some(Ok(alias)) => Value::Text(alias),
                    Some(Err(e)) => {
                        if failures == 0 {
                            error!(file = %reader.db_file(), signal = text, error = %e, "alias substitution failed");
                        }
                        failures += 1;
                        name
                    }
                    None => name,
                }
            })
            .collect();
        if failures > 1 {
            error!(file = %reader.db_file(), failures, "rows kept their original name");
        }
        if let Err(e) = table.push_column(VARIABLE, variables) {
            error!(file = %reader.db_file(), error = %e, "no data could be extracted");
            return Table::empty();
        }
        table.drop_column(self.name_column);
        self.normalization.excluding([self.alias]).apply(&mut table);
        table
    }
}
