mod common;

use std::collections::BTreeMap;

use common::{ResultFile, path_expression, throughput_file};
use simextract::datatype::Value;
use simextract::extractor::{
    Extractor, ExtractorSpec, RawScalarSpec, RawSignalSpec, RawStatisticSpec, SignalColumns, SourceSpec, SqlSpec,
};
use simextract::tags::{TagRegexMaps, TagRule, TagSelection};

fn tag_maps() -> TagRegexMaps {
    let rule = |key: &str| {
        vec![TagRule {
            key: key.to_string(),
            value: None,
        }]
    };
    TagRegexMaps {
        attributes: BTreeMap::from([
            ("configname".to_string(), rule("^configname$")),
            ("repetition".to_string(), rule("^repetition$")),
            ("network".to_string(), rule("^network$")),
        ]),
        iterationvars: BTreeMap::from([("rate".to_string(), rule("^rate$"))]),
        parameters: BTreeMap::new(),
    }
}

fn throughput_spec(input: String) -> ExtractorSpec {
    ExtractorSpec::RawSignal(RawSignalSpec {
        source: SourceSpec::new(input.as_str()),
        tags: TagSelection::default(),
        columns: SignalColumns::default(),
        signal: "throughput".to_string(),
        alias: "thr".to_string(),
    })
}

#[test]
fn prepare_yields_one_task_per_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["a.vec", "b.vec", "c.vec"] {
        ResultFile::create(dir.path(), name, "Base");
    }
    let spec = throughput_spec(path_expression(dir.path(), r".*\.vec"));
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    assert_eq!(prepared.len(), 3);
    for (task, attribution) in &prepared {
        assert_eq!(attribution.source_files().len(), 1);
        assert!(attribution.source_files().contains(task.source_file()));
        assert_eq!(attribution.aliases().iter().collect::<Vec<_>>(), vec!["thr"]);
    }
}

#[test]
fn throughput_over_two_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    throughput_file(dir.path(), "full.vec");
    let empty = ResultFile::create(dir.path(), "quiet.vec", "Base");
    empty.vector("net.node[0].app", "latency", &[(1, 0.1)]);

    let spec = throughput_spec(path_expression(dir.path(), r".*\.vec"));
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    assert_eq!(prepared.len(), 2);

    let full = prepared[0].0.compute();
    assert_eq!(full.row_count(), 100);
    assert!(full.column("moduleName").expect("moduleName").is_categorical());
    assert_eq!(full.column("moduleName").and_then(|c| c.categories()).map(|c| c.len()), Some(3));
    assert!(!full.column("thr").expect("thr").is_categorical());
    assert!(!full.column("eventNumber").expect("eventNumber").is_categorical());
    assert_eq!(full.value(0, "configname"), Some(Value::from("Base")));
    // network is not in the minimal allow-list
    assert!(!full.has_column("network"));
    assert!(!full.has_column("rowId"));

    let quiet = prepared[1].0.compute();
    assert!(quiet.is_empty());
}

#[test]
fn repeated_computation_is_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    throughput_file(dir.path(), "full.vec");
    let spec = throughput_spec(path_expression(dir.path(), r"full\.vec"));
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    let task = &prepared[0].0;
    let first = task.compute();
    for _ in 0..3 {
        let again = task.clone().compute();
        assert_eq!(again.digest(), first.digest());
        assert_eq!(again, first);
    }
}

#[test]
fn additional_and_full_tag_sets() {
    let dir = tempfile::tempdir().expect("tempdir");
    throughput_file(dir.path(), "full.vec");
    let mut spec = throughput_spec(path_expression(dir.path(), r"full\.vec"));
    if let ExtractorSpec::RawSignal(s) = &mut spec {
        s.tags = TagSelection {
            base_tags: None,
            additional_tags: vec!["rate".to_string()],
            minimal_tags: false,
        };
    }
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    let table = prepared[0].0.compute();
    assert_eq!(table.value(5, "network"), Some(Value::from("Highway")));
    assert_eq!(table.value(5, "rate"), Some(Value::from("10")));
    assert_eq!(table.value(5, "repetition"), Some(Value::from("0")));
}

#[test]
fn missing_file_degrades_to_empty_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = throughput_file(dir.path(), "full.vec");
    let spec = throughput_spec(path_expression(dir.path(), r"full\.vec"));
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    let path = file.path().to_string();
    drop(file);
    std::fs::remove_file(&path).expect("remove");
    let table = prepared[0].0.compute();
    assert!(table.is_empty());
    assert_eq!(table.column_count(), 0);
}

#[test]
fn scalars_and_statistics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = ResultFile::create(dir.path(), "run.sca", "Base");
    file.scalar("net.node[0].app", "packetsSent", 12.0);
    file.scalar("net.node[1].app", "packetsSent", 15.0);
    file.statistic("net.node[0].app", "delay", &[1.0, 2.0, 3.0]);

    let scalar = ExtractorSpec::RawScalar(RawScalarSpec {
        source: SourceSpec::new(path_expression(dir.path(), r"run\.sca").as_str()),
        tags: TagSelection::default(),
        signal: "packetsSent".to_string(),
        alias: "sent".to_string(),
        module_name: true,
        run_id: true,
        scalar_name: true,
        scalar_id: false,
    });
    let prepared = Extractor::with_regex_tags(scalar, tag_maps()).expect("extractor").prepare().expect("prepare");
    let table = prepared[0].0.compute();
    assert_eq!(table.row_count(), 2);
    assert!(table.has_column("scalarName") && !table.has_column("scalarId"));
    assert_eq!(table.value(1, "sent"), Some(Value::Real(15.0)));

    let statistic = ExtractorSpec::RawStatistic(RawStatisticSpec {
        source: SourceSpec::new(path_expression(dir.path(), r"run\.sca").as_str()),
        tags: TagSelection::default(),
        signal: "delay".to_string(),
        alias: "delay".to_string(),
        module_name: true,
        run_id: false,
        stat_name: false,
        stat_id: false,
    });
    let prepared = Extractor::with_regex_tags(statistic, tag_maps()).expect("extractor").prepare().expect("prepare");
    let table = prepared[0].0.compute();
    assert_eq!(table.value(0, "delay"), Some(Value::Real(2.0)));
    assert_eq!(table.value(0, "statCount"), Some(Value::Integer(3)));
    assert_eq!(table.value(0, "statMax"), Some(Value::Real(3.0)));
    assert!(!table.has_column("runId"));
}

#[test]
fn sql_extraction_skips_tags() {
    let dir = tempfile::tempdir().expect("tempdir");
    throughput_file(dir.path(), "full.vec");
    let mut source = SourceSpec::new(path_expression(dir.path(), r"full\.vec").as_str());
    source.numerical_columns = vec!["n".to_string()];
    let spec = ExtractorSpec::Sql(SqlSpec {
        source,
        query: "select vectorName, count(*) as n from vector group by vectorName".to_string(),
    });
    let prepared = Extractor::with_regex_tags(spec, tag_maps()).expect("extractor").prepare().expect("prepare");
    let table = prepared[0].0.compute();
    assert_eq!(table.column_names(), vec!["vectorName", "n"]);
    assert_eq!(table.value(0, "n"), Some(Value::Real(3.0)));

    let none = ExtractorSpec::Sql(SqlSpec {
        source: SourceSpec::new(path_expression(dir.path(), r"full\.vec").as_str()),
        query: "select * from vector where 0".to_string(),
    });
    let prepared = Extractor::with_regex_tags(none, tag_maps()).expect("extractor").prepare().expect("prepare");
    assert!(prepared[0].0.compute().is_empty());
}
