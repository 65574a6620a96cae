//! Recipes: named extractors plus the tag rules they share, read with the
//! `config` crate from any format it understands.
//!
//! ```toml
//! workers = 4
//!
//! [tag_maps.attributes]
//! configname = [{ key = "^configname$" }]
//!
//! [extractors.throughput]
//! kind = "!RawExtractor"
//! input_files = ["results/.*\\.vec"]
//! signal = "throughput:vector"
//! alias = "thr"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::Deserialize;
use tracing::info;

use crate::dataset::InputFiles;
use crate::error::{ExtractError, Result};
use crate::extractor::{
    BulkScalarSpec, BulkSignalSpec, Extractor, ExtractorSpec, MatchingSpec, PositionSpec, RawScalarSpec,
    RawSignalSpec, RawStatisticSpec, SqlSpec,
};
use crate::tags::{RegexTagService, TagRegexMaps, TagService};

/// The document as read, before the extractor kinds are resolved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeDocument {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub tag_maps: TagRegexMaps,
    #[serde(default)]
    pub extractors: BTreeMap<String, serde_json::Value>,
}

// ------------- Registry -------------
pub type Constructor = fn(serde_json::Value) -> Result<ExtractorSpec>;

/// Maps extractor kind names to constructors of the matching spec case.
#[derive(Clone)]
pub struct Registry {
    constructors: HashMap<&'static str, Constructor>,
}

macro_rules! constructor {
    ($spec:ty, $case:path) => {
        |fields: serde_json::Value| -> Result<ExtractorSpec> {
            Ok($case(serde_json::from_value::<$spec>(fields)?))
        }
    };
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("SqlExtractor", constructor!(SqlSpec, ExtractorSpec::Sql));
        registry.register("RawExtractor", constructor!(RawSignalSpec, ExtractorSpec::RawSignal));
        registry.register("RawScalarExtractor", constructor!(RawScalarSpec, ExtractorSpec::RawScalar));
        registry.register("RawStatisticExtractor", constructor!(RawStatisticSpec, ExtractorSpec::RawStatistic));
        registry.register("PositionExtractor", constructor!(PositionSpec, ExtractorSpec::Position));
        registry.register("MatchingExtractor", constructor!(MatchingSpec, ExtractorSpec::Matching));
        registry.register("PatternMatchingBulkExtractor", constructor!(BulkSignalSpec, ExtractorSpec::BulkSignal));
        registry.register(
            "PatternMatchingBulkScalarExtractor",
            constructor!(BulkScalarSpec, ExtractorSpec::BulkScalar),
        );
        registry
    }
}

lazy_static! {
    static ref DEFAULT_REGISTRY: Registry = Registry::default();
}

// (kind or "*", accepted spelling, field it stands for)
const FIELD_ALIASES: &[(&str, &str, &str)] = &[
    ("*", "moduleName", "module_name"),
    ("*", "simtimeRaw", "simtime_raw"),
    ("*", "eventNumber", "event_number"),
    ("*", "runId", "run_id"),
    ("*", "scalarName", "scalar_name"),
    ("*", "scalarId", "scalar_id"),
    ("*", "statName", "stat_name"),
    ("*", "statId", "stat_id"),
    ("RawScalarExtractor", "scalar", "signal"),
    ("RawStatisticExtractor", "statistic", "signal"),
];

/// Field names in `given` that the built spec neither has nor accepts as an
/// alias. Flattened field groups make serde skip these silently.
fn unknown_fields(kind: &str, spec: &ExtractorSpec, given: &[String]) -> Result<Vec<String>> {
    let known = match serde_json::to_value(spec)? {
        serde_json::Value::Object(fields) => fields,
        _ => serde_json::Map::new(),
    };
    let is_alias = |name: &str| {
        FIELD_ALIASES
            .iter()
            .any(|(k, alias, field)| (*k == "*" || *k == kind) && *alias == name && known.contains_key(*field))
    };
    Ok(given
        .iter()
        .filter(|name| !known.contains_key(name.as_str()) && !is_alias(name))
        .cloned()
        .collect())
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }
    pub fn register(&mut self, kind: &'static str, constructor: Constructor) {
        self.constructors.insert(kind, constructor);
    }
    pub fn kinds(&self) -> impl Iterator<Item = &&'static str> {
        self.constructors.keys()
    }
    /// Builds the spec of `kind`; a leading `!` on the kind is ignored.
    pub fn build(&self, kind: &str, fields: serde_json::Value) -> Result<ExtractorSpec> {
        let kind = kind.strip_prefix('!').unwrap_or(kind);
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| ExtractError::Config(format!("unknown extractor kind '{}'", kind)))?;
        let given: Vec<String> = match &fields {
            serde_json::Value::Object(fields) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        };
        let spec = constructor(fields).map_err(|e| ExtractError::Config(format!("{}: {}", kind, e)))?;
        let unknown = unknown_fields(kind, &spec, &given)?;
        if !unknown.is_empty() {
            return Err(ExtractError::Config(format!(
                "{}: unknown field(s) {}",
                kind,
                unknown.join(", ")
            )));
        }
        spec.validate()?;
        Ok(spec)
    }
    /// Builds one `{kind: ..., fields...}` entry.
    pub fn build_entry(&self, name: &str, entry: serde_json::Value) -> Result<ExtractorSpec> {
        let serde_json::Value::Object(mut fields) = entry else {
            return Err(ExtractError::Config(format!("extractor '{}' must be a table", name)));
        };
        let kind = match fields.remove("kind") {
            Some(serde_json::Value::String(kind)) => kind,
            _ => {
                return Err(ExtractError::Config(format!("extractor '{}' has no kind", name)));
            }
        };
        self.build(&kind, serde_json::Value::Object(fields))
            .map_err(|e| ExtractError::Config(format!("extractor '{}': {}", name, e)))
    }
}

// ------------- Recipe -------------
#[derive(Debug, Clone)]
pub struct Recipe {
    workers: Option<usize>,
    tag_maps: TagRegexMaps,
    extractors: BTreeMap<String, ExtractorSpec>,
}

impl Recipe {
    /// Reads a recipe file; `SIMEXTRACT_WORKERS` in the environment
    /// overrides the worker count.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("SIMEXTRACT").try_parsing(true))
            .build()?;
        info!(path, "recipe loaded");
        Self::from_document(config.try_deserialize()?, &DEFAULT_REGISTRY)
    }
    pub fn parse(text: &str, format: FileFormat) -> Result<Self> {
        let config = Config::builder().add_source(File::from_str(text, format)).build()?;
        Self::from_document(config.try_deserialize()?, &DEFAULT_REGISTRY)
    }
    /// Resolves every extractor of the document. Any bad entry fails the
    /// whole recipe.
    pub fn from_document(document: RecipeDocument, registry: &Registry) -> Result<Self> {
        document.tag_maps.validate()?;
        let mut extractors = BTreeMap::new();
        for (name, entry) in document.extractors {
            let spec = registry.build_entry(&name, entry)?;
            extractors.insert(name, spec);
        }
        if document.workers == Some(0) {
            return Err(ExtractError::Config("workers must be at least 1".into()));
        }
        Ok(Self {
            workers: document.workers,
            tag_maps: document.tag_maps,
            extractors,
        })
    }
    pub fn workers(&self) -> Option<usize> {
        self.workers
    }
    pub fn tag_maps(&self) -> &TagRegexMaps {
        &self.tag_maps
    }
    pub fn extractors(&self) -> &BTreeMap<String, ExtractorSpec> {
        &self.extractors
    }
    /// Points one extractor at other input files.
    pub fn override_input_files(&mut self, name: &str, input_files: impl Into<InputFiles>) -> Result<()> {
        let spec = self
            .extractors
            .get_mut(name)
            .ok_or_else(|| ExtractError::Config(format!("no extractor named '{}'", name)))?;
        spec.source_mut().input_files = input_files.into();
        Ok(())
    }
    /// The named extractor, deriving tags with the regex rules of the recipe.
    pub fn extractor(&self, name: &str) -> Result<Extractor> {
        self.extractor_with(name, Arc::new(RegexTagService))
    }
    pub fn extractor_with(&self, name: &str, tag_service: Arc<dyn TagService>) -> Result<Extractor> {
        let spec = self
            .extractors
            .get(name)
            .ok_or_else(|| ExtractError::Config(format!("no extractor named '{}'", name)))?;
        Extractor::new(spec.clone(), self.tag_maps.clone(), tag_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = r#"
        workers = 2

        [tag_maps.attributes]
        configname = [{ key = "^configname$" }]

        [extractors.thr]
        kind = "!RawExtractor"
        input_files = "results/.*\\.vec"
        signal = "throughput:vector"
        alias = "thr"
        simtime_raw = false

        [extractors.sinr]
        kind = "PatternMatchingBulkExtractor"
        input_files = ["a/.*", "b/.*"]
        pattern = "sinr%"
        alias = "sinr"
        alias_match_pattern = 'sinr_(?P<idx>\d+)'
        alias_pattern = "s{idx}"
    "#;

    #[test]
    fn kinds_resolve_with_or_without_bang() {
        let recipe = Recipe::parse(RECIPE, FileFormat::Toml).unwrap();
        assert_eq!(recipe.workers(), Some(2));
        let ExtractorSpec::RawSignal(thr) = &recipe.extractors()["thr"] else {
            panic!("expected a raw signal extractor");
        };
        assert!(!thr.columns.simtime_raw && thr.columns.module_name);
        assert_eq!(recipe.extractors()["sinr"].kind(), "PatternMatchingBulkExtractor");
        assert!(recipe.tag_maps().attributes.contains_key("configname"));
    }

    #[test]
    fn unknown_kinds_and_missing_fields_fail_the_recipe() {
        let unknown = RECIPE.replace("!RawExtractor", "FancyExtractor");
        assert!(matches!(Recipe::parse(&unknown, FileFormat::Toml), Err(ExtractError::Config(_))));
        let missing = RECIPE.replace("alias = \"thr\"", "");
        assert!(Recipe::parse(&missing, FileFormat::Toml).is_err());
        let bad_regex = RECIPE.replace(r"sinr_(?P<idx>\d+)", "sinr_(");
        assert!(Recipe::parse(&bad_regex, FileFormat::Toml).is_err());
    }

    #[test]
    fn misspelt_fields_fail_the_recipe() {
        let misspelt = RECIPE.replace("simtime_raw = false", "modul_name = false");
        let Err(ExtractError::Config(message)) = Recipe::parse(&misspelt, FileFormat::Toml) else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("modul_name"), "{}", message);
    }

    #[test]
    fn aliases_count_as_known_fields() {
        let registry = Registry::default();
        let scalar = serde_json::json!({
            "input_files": "runs/.*",
            "scalar": "packetsSent",
            "alias": "sent",
            "moduleName": false,
            "scalarId": true,
        });
        let ExtractorSpec::RawScalar(spec) = registry.build("RawScalarExtractor", scalar).unwrap() else {
            panic!("expected a raw scalar extractor");
        };
        assert!(!spec.module_name && spec.scalar_id);
        // "scalar" only stands for the signal of scalar extractions
        let signal = serde_json::json!({
            "input_files": "runs/.*",
            "signal": "throughput",
            "scalar": "packetsSent",
            "alias": "thr",
        });
        assert!(matches!(registry.build("RawExtractor", signal), Err(ExtractError::Config(_))));
    }

    #[test]
    fn input_files_can_be_overridden() {
        let mut recipe = Recipe::parse(RECIPE, FileFormat::Toml).unwrap();
        recipe.override_input_files("thr", "elsewhere/.*").unwrap();
        assert_eq!(
            recipe.extractors()["thr"].source().input_files,
            InputFiles::One("elsewhere/.*".into())
        );
        assert!(recipe.override_input_files("nope", "x").is_err());
    }
}
