//! Extraction policies.
//!
//! An [`ExtractorSpec`] is a closed union with one case per extraction shape;
//! each case carries exactly the fields it needs. An [`Extractor`] couples a
//! spec with the tag configuration and turns it into one lazy task per
//! resolved input file.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribution::ResultAttribution;
use crate::categorical::Normalization;
use crate::dataset::{FileSet, InputFiles};
use crate::error::{ExtractError, Result};
use crate::sql::{Columns, Restriction};
use crate::tags::{default_true, RegexTagService, TagRegexMaps, TagSelection, TagService};
use crate::task::{LazyTask, TaskContext};
use crate::template::AliasTemplate;

// ------------- Shared field groups -------------
/// Where the data comes from and how its columns are normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub input_files: InputFiles,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns_excluded: BTreeSet<String>,
    #[serde(default)]
    pub numerical_columns: Vec<String>,
}

impl SourceSpec {
    pub fn new(input_files: impl Into<InputFiles>) -> Self {
        Self {
            input_files: input_files.into(),
            categorical_columns: Vec::new(),
            categorical_columns_excluded: BTreeSet::new(),
            numerical_columns: Vec::new(),
        }
    }
    pub fn normalization(&self) -> Normalization {
        Normalization {
            categorical: self.categorical_columns.clone(),
            excluded: self.categorical_columns_excluded.clone(),
            numeric: self.numerical_columns.clone(),
        }
    }
}

/// Identifying columns of vector based extractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalColumns {
    #[serde(default = "default_true", alias = "moduleName")]
    pub module_name: bool,
    #[serde(default = "default_true", alias = "simtimeRaw")]
    pub simtime_raw: bool,
    #[serde(default = "default_true", alias = "eventNumber")]
    pub event_number: bool,
}

impl Default for SignalColumns {
    fn default() -> Self {
        Self {
            module_name: true,
            simtime_raw: true,
            event_number: true,
        }
    }
}

impl SignalColumns {
    pub fn columns(&self) -> Columns {
        Columns {
            module_name: self.module_name,
            simtime_raw: self.simtime_raw,
            event_number: self.event_number,
            ..Columns::default()
        }
    }
}

// ------------- Cases -------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignalSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(flatten)]
    pub columns: SignalColumns,
    pub signal: String,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawScalarSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(alias = "scalar")]
    pub signal: String,
    pub alias: String,
    #[serde(default = "default_true", alias = "moduleName")]
    pub module_name: bool,
    #[serde(default = "default_true", alias = "runId")]
    pub run_id: bool,
    #[serde(default, alias = "scalarName")]
    pub scalar_name: bool,
    #[serde(default, alias = "scalarId")]
    pub scalar_id: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatisticSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(alias = "statistic")]
    pub signal: String,
    pub alias: String,
    #[serde(default = "default_true", alias = "moduleName")]
    pub module_name: bool,
    #[serde(default = "default_true", alias = "runId")]
    pub run_id: bool,
    #[serde(default, alias = "statName")]
    pub stat_name: bool,
    #[serde(default, alias = "statId")]
    pub stat_id: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(flatten)]
    pub columns: SignalColumns,
    pub x_signal: String,
    pub x_alias: String,
    pub y_signal: String,
    pub y_alias: String,
    pub signal: String,
    pub alias: String,
    #[serde(default)]
    pub restriction: Option<Restriction>,
}

/// Signals discovered by regex search over the signal catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(flatten)]
    pub columns: SignalColumns,
    pub pattern: String,
    pub alias_pattern: AliasTemplate,
    pub alias: String,
}

/// Signals selected by one SQL `like` pattern. The name column is always
/// read, since the `variable` column is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSignalSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    #[serde(flatten)]
    pub columns: SignalColumns,
    pub pattern: String,
    pub alias: String,
    pub alias_match_pattern: String,
    pub alias_pattern: AliasTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkScalarSpec {
    #[serde(flatten)]
    pub source: SourceSpec,
    #[serde(flatten)]
    pub tags: TagSelection,
    pub pattern: String,
    pub alias: String,
    pub alias_match_pattern: String,
    pub alias_pattern: AliasTemplate,
    #[serde(default = "default_true", alias = "moduleName")]
    pub module_name: bool,
    #[serde(default, alias = "runId")]
    pub run_id: bool,
    #[serde(default, alias = "scalarId")]
    pub scalar_id: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExtractorSpec {
    #[serde(rename = "SqlExtractor")]
    Sql(SqlSpec),
    #[serde(rename = "RawExtractor")]
    RawSignal(RawSignalSpec),
    #[serde(rename = "RawScalarExtractor")]
    RawScalar(RawScalarSpec),
    #[serde(rename = "RawStatisticExtractor")]
    RawStatistic(RawStatisticSpec),
    #[serde(rename = "PositionExtractor")]
    Position(PositionSpec),
    #[serde(rename = "MatchingExtractor")]
    Matching(MatchingSpec),
    #[serde(rename = "PatternMatchingBulkExtractor")]
    BulkSignal(BulkSignalSpec),
    #[serde(rename = "PatternMatchingBulkScalarExtractor")]
    BulkScalar(BulkScalarSpec),
}

impl ExtractorSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractorSpec::Sql(_) => "SqlExtractor",
            ExtractorSpec::RawSignal(_) => "RawExtractor",
            ExtractorSpec::RawScalar(_) => "RawScalarExtractor",
            ExtractorSpec::RawStatistic(_) => "RawStatisticExtractor",
            ExtractorSpec::Position(_) => "PositionExtractor",
            ExtractorSpec::Matching(_) => "MatchingExtractor",
            ExtractorSpec::BulkSignal(_) => "PatternMatchingBulkExtractor",
            ExtractorSpec::BulkScalar(_) => "PatternMatchingBulkScalarExtractor",
        }
    }
    pub fn source(&self) -> &SourceSpec {
        match self {
            ExtractorSpec::Sql(s) => &s.source,
            ExtractorSpec::RawSignal(s) => &s.source,
            ExtractorSpec::RawScalar(s) => &s.source,
            ExtractorSpec::RawStatistic(s) => &s.source,
            ExtractorSpec::Position(s) => &s.source,
            ExtractorSpec::Matching(s) => &s.source,
            ExtractorSpec::BulkSignal(s) => &s.source,
            ExtractorSpec::BulkScalar(s) => &s.source,
        }
    }
    pub fn source_mut(&mut self) -> &mut SourceSpec {
        match self {
            ExtractorSpec::Sql(s) => &mut s.source,
            ExtractorSpec::RawSignal(s) => &mut s.source,
            ExtractorSpec::RawScalar(s) => &mut s.source,
            ExtractorSpec::RawStatistic(s) => &mut s.source,
            ExtractorSpec::Position(s) => &mut s.source,
            ExtractorSpec::Matching(s) => &mut s.source,
            ExtractorSpec::BulkSignal(s) => &mut s.source,
            ExtractorSpec::BulkScalar(s) => &mut s.source,
        }
    }
    /// The name of the value column, if the case has one.
    pub fn alias(&self) -> Option<&str> {
        match self {
            ExtractorSpec::Sql(_) => None,
            ExtractorSpec::RawSignal(s) => Some(&s.alias),
            ExtractorSpec::RawScalar(s) => Some(&s.alias),
            ExtractorSpec::RawStatistic(s) => Some(&s.alias),
            ExtractorSpec::Position(s) => Some(&s.alias),
            ExtractorSpec::Matching(s) => Some(&s.alias),
            ExtractorSpec::BulkSignal(s) => Some(&s.alias),
            ExtractorSpec::BulkScalar(s) => Some(&s.alias),
        }
    }
    /// Load-time checks: discovery regexes must compile and define every
    /// group the alias template names.
    pub fn validate(&self) -> Result<()> {
        let (pattern, template) = match self {
            ExtractorSpec::Matching(s) => (&s.pattern, &s.alias_pattern),
            ExtractorSpec::BulkSignal(s) => (&s.alias_match_pattern, &s.alias_pattern),
            ExtractorSpec::BulkScalar(s) => (&s.alias_match_pattern, &s.alias_pattern),
            ExtractorSpec::Sql(s) if s.query.trim().is_empty() => {
                return Err(ExtractError::Config("SqlExtractor needs a query".into()));
            }
            _ => return Ok(()),
        };
        let regex = Regex::new(pattern)
            .map_err(|e| ExtractError::Config(format!("{}: invalid pattern: {}", self.kind(), e)))?;
        template.check_against(&regex)
    }
}

// ------------- Extractor -------------
#[derive(Debug, Clone)]
pub struct Extractor {
    spec: ExtractorSpec,
    context: TaskContext,
}

impl Extractor {
    pub fn new(spec: ExtractorSpec, tag_maps: TagRegexMaps, tag_service: Arc<dyn TagService>) -> Result<Self> {
        spec.validate()?;
        tag_maps.validate()?;
        Ok(Self {
            spec,
            context: TaskContext::new(tag_maps, tag_service),
        })
    }
    /// An extractor deriving its tags with the bundled regex rules.
    pub fn with_regex_tags(spec: ExtractorSpec, tag_maps: TagRegexMaps) -> Result<Self> {
        Self::new(spec, tag_maps, Arc::new(RegexTagService))
    }
    pub fn spec(&self) -> &ExtractorSpec {
        &self.spec
    }
    pub fn set_tag_maps(&mut self, tag_maps: TagRegexMaps) -> Result<()> {
        tag_maps.validate()?;
        self.context = TaskContext::new(tag_maps, Arc::clone(&self.context.tag_service));
        Ok(())
    }
    pub fn set_input_files(&mut self, input_files: InputFiles) {
        self.spec.source_mut().input_files = input_files;
    }
    /// One `(task, attribution)` pair per resolved input file. Every task
    /// owns a copy of the spec, so later changes to this extractor do not
    /// reach tasks already built.
    pub fn prepare(&self) -> Result<Vec<(LazyTask, ResultAttribution)>> {
        let file_set = FileSet::resolve(&self.spec.source().input_files)?;
        debug!(kind = self.spec.kind(), files = file_set.len(), "preparing tasks");
        Ok(file_set
            .files()
            .iter()
            .map(|file| {
                let task = LazyTask::new(file.clone(), self.spec.clone(), self.context.clone());
                let attribution = ResultAttribution::for_file(file.clone(), self.spec.alias());
                (task, attribution)
            })
            .collect())
    }
}
