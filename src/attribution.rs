//! Provenance records travelling alongside every lazy task.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// The files a dataset was extracted from, the aliases given to its data,
/// and any further attributes a later stage wants to attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAttribution {
    source_files: BTreeSet<String>,
    aliases: BTreeSet<String>,
    #[serde(flatten)]
    attributes: BTreeMap<String, serde_json::Value>,
}

impl ResultAttribution {
    pub fn new() -> Self {
        Self::default()
    }
    /// The attribution of one extracted file.
    pub fn for_file(source_file: impl Into<String>, alias: Option<&str>) -> Self {
        let mut attribution = Self::new();
        attribution.add_source_file(source_file);
        if let Some(alias) = alias {
            attribution.add_alias(alias);
        }
        attribution
    }
    pub fn source_files(&self) -> &BTreeSet<String> {
        &self.source_files
    }
    pub fn add_source_file(&mut self, source_file: impl Into<String>) {
        self.source_files.insert(source_file.into());
    }
    /// Unions every given file into the set.
    pub fn add_source_files<I, S>(&mut self, source_files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_files.extend(source_files.into_iter().map(Into::into));
    }
    pub fn remove_source_file(&mut self, source_file: &str) -> bool {
        self.source_files.remove(source_file)
    }
    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }
    pub fn add_alias(&mut self, alias: impl Into<String>) {
        self.aliases.insert(alias.into());
    }
    pub fn add_aliases<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
    }
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }
    /// Folds another attribution into this one, e.g. when datasets are merged.
    pub fn merge(&mut self, other: &ResultAttribution) {
        self.add_source_files(other.source_files.iter().cloned());
        self.add_aliases(other.aliases.iter().cloned());
        for (key, value) in &other.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
    }
}

impl fmt::Display for ResultAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}
