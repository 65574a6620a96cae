use std::fmt;
use std::sync::Arc;

use tracing::{debug, info_span};

use crate::extractor::ExtractorSpec;
use crate::pipeline;
use crate::table::Table;
use crate::tags::{TagRegexMaps, TagService};

/// Tag configuration shared by every task of an extractor.
#[derive(Clone)]
pub struct TaskContext {
    pub tag_maps: Arc<TagRegexMaps>,
    pub tag_service: Arc<dyn TagService>,
}

impl TaskContext {
    pub fn new(tag_maps: TagRegexMaps, tag_service: Arc<dyn TagService>) -> Self {
        Self {
            tag_maps: Arc::new(tag_maps),
            tag_service,
        }
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("tag_maps", &self.tag_maps)
            .finish_non_exhaustive()
    }
}

/// A deferred extraction of one file.
///
/// The task owns everything it needs, so it can be moved to any worker and
/// computed there. Computing never fails: a file that cannot be read yields
/// an empty table.
#[derive(Debug, Clone)]
pub struct LazyTask {
    file: String,
    spec: ExtractorSpec,
    context: TaskContext,
}

impl LazyTask {
    pub fn new(file: String, spec: ExtractorSpec, context: TaskContext) -> Self {
        Self { file, spec, context }
    }
    pub fn source_file(&self) -> &str {
        &self.file
    }
    pub fn spec(&self) -> &ExtractorSpec {
        &self.spec
    }
    pub fn compute(&self) -> Table {
        let span = info_span!("task", file = %self.file, kind = self.spec.kind());
        let _entered = span.enter();
        let table = pipeline::run(&self.file, &self.spec, &self.context);
        debug!(rows = table.row_count(), columns = table.column_count(), "task complete");
        table
    }
}
