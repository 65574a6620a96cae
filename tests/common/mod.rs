#![allow(dead_code)]

use std::path::Path;

use rusqlite::{Connection, params};

const SCHEMA: &str = "
    create table run (runId integer primary key, runName text, simtimeExp integer, runDate text);
    create table runAttr (runId integer, attrName text, attrValue text);
    create table runParam (runId integer, paramKey text, paramValue text);
    create table vector (
        vectorId integer primary key,
        runId integer,
        moduleName text,
        vectorName text,
        vectorCount integer
    );
    create table vectorData (vectorId integer, eventNumber integer, simtimeRaw integer, value real);
    create table scalar (scalarId integer primary key, runId integer, moduleName text, scalarName text, scalarValue real);
    create table statistic (
        statId integer primary key,
        runId integer,
        moduleName text,
        statName text,
        statCount integer,
        statMean real,
        statStddev real,
        statSum real,
        statSqrsum real,
        statMin real,
        statMax real
    );
";

/// A result file in the OMNeT++ SQLite layout with a single run.
pub struct ResultFile {
    connection: Connection,
    path: String,
}

impl ResultFile {
    /// Creates `name` in `dir` with run 1 and the usual run attributes.
    pub fn create(dir: &Path, name: &str, configname: &str) -> Self {
        let path = dir.join(name).to_string_lossy().into_owned();
        let connection = Connection::open(&path).expect("open fixture");
        connection.execute_batch(SCHEMA).expect("schema");
        connection
            .execute("insert into run values (1, ?1, -12, '20240101-12:00:00')", params![name])
            .expect("run");
        let file = Self { connection, path };
        file.attribute("configname", configname);
        file.attribute("repetition", "0");
        file.attribute("iterationvars", "$rate=10, $mode=\"dense\"");
        file.attribute("network", "Highway");
        file
    }
    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn attribute(&self, name: &str, value: &str) {
        self.connection
            .execute("insert into runAttr values (1, ?1, ?2)", params![name, value])
            .expect("attribute");
    }
    pub fn parameter(&self, key: &str, value: &str) {
        self.connection
            .execute("insert into runParam values (1, ?1, ?2)", params![key, value])
            .expect("parameter");
    }
    /// Records a vector; samples are `(eventNumber, value)` with
    /// `simtimeRaw = eventNumber * 1000`.
    pub fn vector(&self, module: &str, name: &str, samples: &[(i64, f64)]) -> i64 {
        self.connection
            .execute(
                "insert into vector (runId, moduleName, vectorName, vectorCount) values (1, ?1, ?2, ?3)",
                params![module, name, samples.len() as i64],
            )
            .expect("vector");
        let id = self.connection.last_insert_rowid();
        for (event, value) in samples {
            self.connection
                .execute(
                    "insert into vectorData values (?1, ?2, ?3, ?4)",
                    params![id, event, event * 1000, value],
                )
                .expect("vector data");
        }
        id
    }
    pub fn scalar(&self, module: &str, name: &str, value: f64) {
        self.connection
            .execute(
                "insert into scalar (runId, moduleName, scalarName, scalarValue) values (1, ?1, ?2, ?3)",
                params![module, name, value],
            )
            .expect("scalar");
    }
    pub fn statistic(&self, module: &str, name: &str, samples: &[f64]) {
        let count = samples.len() as f64;
        let sum: f64 = samples.iter().sum();
        let sqrsum: f64 = samples.iter().map(|s| s * s).sum();
        let mean = sum / count;
        let stddev = (sqrsum / count - mean * mean).max(0.0).sqrt();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        self.connection
            .execute(
                "insert into statistic (runId, moduleName, statName, statCount, statMean, statStddev, statSum, statSqrsum, statMin, statMax)
                 values (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![module, name, samples.len() as i64, mean, stddev, sum, sqrsum, min, max],
            )
            .expect("statistic");
    }
}

/// 100 throughput samples spread over three modules.
pub fn throughput_file(dir: &Path, name: &str) -> ResultFile {
    let file = ResultFile::create(dir, name, "Base");
    for (m, module) in ["net.node[0].app", "net.node[1].app", "net.node[2].app"].iter().enumerate() {
        let samples: Vec<(i64, f64)> = (0..100)
            .filter(|i| i % 3 == m as i64)
            .map(|i| (i, i as f64 * 0.5))
            .collect();
        file.vector(module, "throughput", &samples);
    }
    file
}

pub fn path_expression(dir: &Path, pattern: &str) -> String {
    format!("{}/{}", dir.to_string_lossy(), pattern)
}
