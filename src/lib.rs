//! Simextract – parallel extraction of simulation results into analysis tables.
//!
//! Simulation runs store their results in SQLite files laid out in the
//! OMNeT++ result schema: run attributes and parameters, vectors (time
//! series recorded per module), scalars and statistics. Simextract turns a
//! declarative description of *what* to pull out of such files into a list
//! of independent per-file tasks, each producing one table.
//!
//! * An [`extractor::ExtractorSpec`] names one extraction shape: raw SQL, a
//!   single signal, scalar or statistic, a position-joined signal, or signals
//!   discovered by regex and renamed through an [`template::AliasTemplate`].
//! * [`extractor::Extractor::prepare`] resolves the input path expressions
//!   (see [`dataset`]) and yields one [`task::LazyTask`] with its
//!   [`attribution::ResultAttribution`] per file.
//! * Computing a task runs the matching [`pipeline`]: query through a
//!   [`reader::SqliteReader`], merge the allow-listed run [`tags`], then
//!   encode low-cardinality columns as categoricals (see [`categorical`]).
//!
//! A file that cannot be read never aborts a run; its task yields an empty
//! table and the failure is logged through `tracing`.
//!
//! ## Recipes
//! Extractors are usually declared in a recipe file read by [`recipe::Recipe`]
//! and executed by a [`plan::ExecutionPlan`]:
//! ```no_run
//! use simextract::{plan::ExecutionPlan, recipe::Recipe};
//! let recipe = Recipe::from_file("recipe.toml")?;
//! let plan = ExecutionPlan::from_recipe(&recipe)?;
//! for extracted in plan.materialize_blocking(4)? {
//!     println!("{} {} rows", extracted.attribution, extracted.table.row_count());
//! }
//! # Ok::<(), simextract::error::ExtractError>(())
//! ```

pub mod attribution;
pub mod categorical;
pub mod dataset;
pub mod datatype;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod plan;
pub mod reader;
pub mod recipe;
pub mod sql;
pub mod table;
pub mod tags;
pub mod task;
pub mod template;

pub use error::{ExtractError, Result};
pub use extractor::{Extractor, ExtractorSpec};
pub use table::Table;
