use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::attribution::ResultAttribution;
use crate::error::{ExtractError, Result};
use crate::recipe::Recipe;
use crate::table::Table;
use crate::task::LazyTask;

pub const DEFAULT_WORKERS: usize = 4;

/// The prepared tasks of a recipe, by extractor name.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    tasks: BTreeMap<String, Vec<(LazyTask, ResultAttribution)>>,
}

/// One computed table and where it came from.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub extractor: String,
    pub table: Table,
    pub attribution: ResultAttribution,
}

impl ExecutionPlan {
    pub fn from_recipe(recipe: &Recipe) -> Result<Self> {
        let mut tasks = BTreeMap::new();
        for name in recipe.extractors().keys() {
            let prepared = recipe.extractor(name)?.prepare()?;
            if prepared.is_empty() {
                warn!(extractor = %name, "no input files");
            }
            tasks.insert(name.clone(), prepared);
        }
        Ok(Self { tasks })
    }
    pub fn insert(&mut self, name: impl Into<String>, prepared: Vec<(LazyTask, ResultAttribution)>) {
        self.tasks.insert(name.into(), prepared);
    }
    pub fn tasks(&self) -> &BTreeMap<String, Vec<(LazyTask, ResultAttribution)>> {
        &self.tasks
    }
    pub fn len(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Computes every task on blocking threads, at most `workers` at a time.
    /// Results come back in plan order. A task that panics contributes an
    /// empty table.
    pub async fn materialize(&self, workers: usize) -> Result<Vec<Extracted>> {
        if workers == 0 {
            return Err(ExtractError::Config("workers must be at least 1".into()));
        }
        let started = std::time::Instant::now();
        let permits = Arc::new(Semaphore::new(workers));
        let permits = &permits;
        let jobs = self.tasks.iter().flat_map(|(name, prepared)| {
            prepared.iter().map(move |(task, attribution)| {
                let permits = Arc::clone(permits);
                let task = task.clone();
                async move {
                    let file = task.source_file().to_string();
                    let table = match permits.acquire_owned().await {
                        Ok(permit) => {
                            let computed = tokio::task::spawn_blocking(move || {
                                let table = task.compute();
                                drop(permit);
                                table
                            })
                            .await;
                            computed.unwrap_or_else(|e| {
                                warn!(file = %file, error = %e, "task did not complete");
                                Table::empty()
                            })
                        }
                        Err(e) => {
                            warn!(file = %file, error = %e, "no worker available");
                            Table::empty()
                        }
                    };
                    Extracted {
                        extractor: name.clone(),
                        table,
                        attribution: attribution.clone(),
                    }
                }
            })
        });
        let extracted = join_all(jobs).await;
        let rows: usize = extracted.iter().map(|e| e.table.row_count()).sum();
        info!(
            tasks = extracted.len(),
            rows,
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "materialized"
        );
        Ok(extracted)
    }

    /// Runs [`materialize`](Self::materialize) on a fresh multi-threaded runtime.
    pub fn materialize_blocking(&self, workers: usize) -> Result<Vec<Extracted>> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        runtime.block_on(self.materialize(workers))
    }
}
