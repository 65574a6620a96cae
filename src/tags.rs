//! Run-identifying tags.
//!
//! Tags are `(name, value)` pairs derived from a run's attributes, its
//! iteration variables and its parameters. A [`TagService`] produces them;
//! [`apply_tags`] merges an allow-listed subset into a table as constant
//! columns.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datatype::Value;
use crate::error::{ExtractError, Result};
use crate::table::Table;

pub const BASE_TAGS_EXTRACTION_MINIMAL: &[&str] = &[
    "configname",
    "experiment",
    "measurement",
    "replication",
    "repetition",
    "runnumber",
];

pub const BASE_TAGS_EXTRACTION_FULL: &[&str] = &[
    "configname",
    "datetime",
    "experiment",
    "inifile",
    "iterationvars",
    "measurement",
    "network",
    "processid",
    "replication",
    "repetition",
    "resultdir",
    "runnumber",
    "seedset",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    value: Value,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
    /// The tag as a single-entry mapping `{name: value}`.
    pub fn get_mapping(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([(self.name.clone(), self.value.clone())])
    }
}

/// A rule for one tag: `key` is searched in the attribute, iteration variable
/// or parameter name; `value`, when given, is searched in the matching value
/// and its first capture group (or the whole match) becomes the tag value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

pub type TagRegexMap = BTreeMap<String, Vec<TagRule>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRegexMaps {
    #[serde(default)]
    pub attributes: TagRegexMap,
    #[serde(default)]
    pub iterationvars: TagRegexMap,
    #[serde(default)]
    pub parameters: TagRegexMap,
}

impl TagRegexMaps {
    /// Checks that every rule compiles.
    pub fn validate(&self) -> Result<()> {
        for map in [&self.attributes, &self.iterationvars, &self.parameters] {
            for (tag, rules) in map {
                for rule in rules {
                    for pattern in std::iter::once(&rule.key).chain(rule.value.iter()) {
                        Regex::new(pattern).map_err(|e| {
                            ExtractError::Config(format!("tag '{}': {}", tag, e))
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

pub trait TagService: Send + Sync {
    /// Returns the ordered tags of one run. `attributes` and `parameters`
    /// read the run's attribute and parameter tables on demand.
    fn extract(
        &self,
        attributes: &dyn Fn() -> Result<Table>,
        parameters: &dyn Fn() -> Result<Table>,
        maps: &TagRegexMaps,
    ) -> Result<Vec<Tag>>;
}

/// Tags from regex rules: attribute tags first, then iteration variable
/// tags, then parameter tags, each in map order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexTagService;

impl TagService for RegexTagService {
    fn extract(
        &self,
        attributes: &dyn Fn() -> Result<Table>,
        parameters: &dyn Fn() -> Result<Table>,
        maps: &TagRegexMaps,
    ) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        if !maps.attributes.is_empty() || !maps.iterationvars.is_empty() {
            let pairs = name_value_pairs(&attributes()?, "attrName", "attrValue")?;
            tags.extend(match_rules(&maps.attributes, &pairs)?);
            let blob = pairs
                .iter()
                .find(|(name, _)| name == "iterationvars")
                .map(|(_, value)| value.as_str())
                .unwrap_or_default();
            tags.extend(match_rules(&maps.iterationvars, &parse_iteration_variables(blob))?);
        }
        if !maps.parameters.is_empty() {
            let pairs = name_value_pairs(&parameters()?, "paramKey", "paramValue")?;
            tags.extend(match_rules(&maps.parameters, &pairs)?);
        }
        Ok(tags)
    }
}

fn name_value_pairs(table: &Table, name: &str, value: &str) -> Result<Vec<(String, String)>> {
    let (Some(names), Some(values)) = (table.column(name), table.column(value)) else {
        return Err(ExtractError::Tag(format!(
            "expected columns '{}' and '{}', found {:?}",
            name,
            value,
            table.column_names()
        )));
    };
    Ok(names
        .values()
        .into_iter()
        .zip(values.values())
        .filter(|(n, _)| !n.is_null())
        .map(|(n, v)| (n.to_string(), if v.is_null() { String::new() } else { v.to_string() }))
        .collect())
}

/// Splits `$rate=10, $seed=3` into `[("rate", "10"), ("seed", "3")]`.
pub fn parse_iteration_variables(blob: &str) -> Vec<(String, String)> {
    blob.split(',')
        .filter_map(|assignment| assignment.split_once('='))
        .map(|(name, value)| {
            (
                name.trim().trim_start_matches('$').to_string(),
                value.trim().trim_matches('"').to_string(),
            )
        })
        .collect()
}

fn match_rules(map: &TagRegexMap, pairs: &[(String, String)]) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    'tags: for (tag, rules) in map {
        for rule in rules {
            let key = Regex::new(&rule.key)?;
            let Some((_, value)) = pairs.iter().find(|(name, _)| key.is_match(name)) else {
                continue;
            };
            let extracted = match &rule.value {
                None => Some(value.clone()),
                Some(pattern) => Regex::new(pattern)?.captures(value).and_then(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_string())
                }),
            };
            if let Some(v) = extracted {
                tags.push(Tag::new(tag.as_str(), v));
                continue 'tags;
            }
        }
    }
    Ok(tags)
}

// ------------- Tag selection -------------
/// Which tags an extractor merges into its tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelection {
    #[serde(default)]
    pub base_tags: Option<Vec<String>>,
    #[serde(default)]
    pub additional_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub minimal_tags: bool,
}

impl Default for TagSelection {
    fn default() -> Self {
        Self {
            base_tags: None,
            additional_tags: Vec::new(),
            minimal_tags: true,
        }
    }
}

impl TagSelection {
    pub fn allow_list(&self) -> AllowList {
        AllowList::resolve(self.base_tags.as_deref(), &self.additional_tags, self.minimal_tags)
    }
}

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Base tags plus additional tags; without (non-empty) base tags the
    /// minimal or full default set stands in.
    pub fn resolve(base_tags: Option<&[String]>, additional_tags: &[String], minimal: bool) -> Self {
        let mut allowed: BTreeSet<String> = match base_tags {
            Some(base) if !base.is_empty() => base.iter().cloned().collect(),
            _ if minimal => BASE_TAGS_EXTRACTION_MINIMAL.iter().map(|t| t.to_string()).collect(),
            _ => BASE_TAGS_EXTRACTION_FULL.iter().map(|t| t.to_string()).collect(),
        };
        allowed.extend(additional_tags.iter().cloned());
        Self(allowed)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Merges every allowed tag into the table as a constant column, in the
/// order the tags are given. A repeated name overwrites the earlier column.
pub fn apply_tags(table: &mut Table, tags: &[Tag], allowed: &AllowList) {
    let mut applied = Vec::new();
    for tag in tags {
        for (name, value) in tag.get_mapping() {
            if allowed.contains(&name) {
                table.assign_constant(&name, value);
                applied.push(name);
            }
        }
    }
    debug!(?applied, "applied tags");
}
