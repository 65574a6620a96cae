//! Resolution of input path expressions into concrete result files.
//!
//! An expression is a directory followed by a regular expression in the final
//! segment, e.g. `results/run-\d+\.vec`. Every regular file in the directory
//! whose full path string matches the whole expression from the start is
//! selected. The match need not extend to the end of the path.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractError, Result};

/// One path expression or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputFiles {
    One(String),
    Many(Vec<String>),
}

impl InputFiles {
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            InputFiles::One(p) => vec![p.as_str()],
            InputFiles::Many(ps) => ps.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for InputFiles {
    fn from(p: &str) -> Self {
        InputFiles::One(p.to_string())
    }
}

impl From<Vec<String>> for InputFiles {
    fn from(ps: Vec<String>) -> Self {
        InputFiles::Many(ps)
    }
}

#[derive(Debug, Clone)]
pub struct FileSet {
    input: InputFiles,
    files: Vec<String>,
}

impl FileSet {
    /// Expands every expression. Files of one expression are sorted; the
    /// order of the expressions themselves is kept.
    pub fn resolve(input: &InputFiles) -> Result<Self> {
        let mut files = Vec::new();
        for expression in input.expressions() {
            files.extend(evaluate_regex_path(expression)?);
        }
        debug!(count = files.len(), "resolved input files");
        Ok(Self {
            input: input.clone(),
            files,
        })
    }
    pub fn input(&self) -> &InputFiles {
        &self.input
    }
    pub fn files(&self) -> &[String] {
        &self.files
    }
    pub fn len(&self) -> usize {
        self.files.len()
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn evaluate_regex_path(expression: &str) -> Result<Vec<String>> {
    let path = Path::new(expression);
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    let regex = Regex::new(&format!("^(?:{})", expression))?;
    let listing = if directory.as_os_str().is_empty() { Path::new(".") } else { directory };
    let entries = fs::read_dir(listing).map_err(|e| {
        ExtractError::Io(format!("cannot list directory '{}': {}", listing.display(), e))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        // relative expressions without a directory match against the bare name
        let candidate = if directory.as_os_str().is_empty() {
            entry.file_name().to_string_lossy().into_owned()
        } else {
            directory.join(entry.file_name()).to_string_lossy().into_owned()
        };
        if !regex.is_match(&candidate) {
            continue;
        }
        // follows symlinks, so a link to a file counts as a file
        match fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => files.push(candidate),
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_from_start_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["run-1.vec", "run-2.vec", "run-2.vec-journal", "other.vec"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("run-3.vec")).unwrap();
        let expression = format!("{}/run-\\d\\.vec", dir.path().display());
        let files = evaluate_regex_path(&expression).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| Path::new(f).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // not anchored at the end, so the journal file is selected too
        assert_eq!(names, vec!["run-1.vec", "run-2.vec", "run-2.vec-journal"]);
    }

    #[test]
    fn list_keeps_expression_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.sca", "b.sca"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let input = InputFiles::Many(vec![
            format!("{}/b\\.sca", dir.path().display()),
            format!("{}/a\\.sca", dir.path().display()),
        ]);
        let set = FileSet::resolve(&input).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.files()[0].ends_with("b.sca"));
        assert!(set.files()[1].ends_with("a.sca"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(evaluate_regex_path("/definitely/not/here/x.*").is_err());
    }
}
