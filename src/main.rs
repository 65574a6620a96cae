use std::process;

use clap::Parser;

use simextract::plan::{DEFAULT_WORKERS, ExecutionPlan};
use simextract::recipe::Recipe;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Run the extractors of a recipe over simulation result files.
#[derive(Parser, Debug)]
#[command(name = "simextract")]
struct Args {
    /// Recipe file (TOML, YAML or JSON)
    #[arg(value_name = "RECIPE")]
    recipe: String,

    /// Number of tasks run at the same time. Overrides `workers` of the recipe.
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Replaces the input files of one extractor; may be repeated.
    #[arg(long = "override-extractor", value_name = "NAME=PATH", value_parser = parse_override)]
    overrides: Vec<(String, String)>,
}

fn parse_override(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name.to_string(), path.to_string())),
        _ => Err(format!("expected NAME=PATH, got '{}'", arg)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut recipe = match Recipe::from_file(&args.recipe) {
        Ok(recipe) => recipe,
        Err(e) => {
            error!(recipe = %args.recipe, error = %e, "could not load recipe");
            process::exit(1);
        }
    };
    for (name, path) in &args.overrides {
        if let Err(e) = recipe.override_input_files(name, path.as_str()) {
            error!(error = %e, "could not override input files");
            process::exit(1);
        }
    }

    let plan = match ExecutionPlan::from_recipe(&recipe) {
        Ok(plan) => plan,
        Err(e) => {
            error!(error = %e, "could not prepare extraction");
            process::exit(1);
        }
    };
    let workers = args.workers.or(recipe.workers()).unwrap_or(DEFAULT_WORKERS);
    info!(tasks = plan.len(), workers, "starting extraction");

    match plan.materialize(workers).await {
        Ok(extracted) => {
            for e in &extracted {
                info!(
                    extractor = %e.extractor,
                    rows = e.table.row_count(),
                    columns = ?e.table.column_names(),
                    digest = %e.table.digest(),
                    attribution = %e.attribution,
                    "extracted"
                );
            }
        }
        Err(e) => {
            error!(error = %e, "extraction failed");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_and_repeated_overrides() {
        let args = Args::try_parse_from([
            "simextract",
            "recipe.toml",
            "--workers",
            "3",
            "--override-extractor",
            "thr=runs/.*\\.vec",
            "--override-extractor",
            "sent=runs/a=b\\.sca",
        ])
        .expect("args");
        assert_eq!(args.recipe, "recipe.toml");
        assert_eq!(args.workers, Some(3));
        assert_eq!(
            args.overrides,
            vec![
                ("thr".to_string(), "runs/.*\\.vec".to_string()),
                ("sent".to_string(), "runs/a=b\\.sca".to_string()),
            ]
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(Args::try_parse_from(["simextract"]).is_err());
        assert!(Args::try_parse_from(["simextract", "r.toml", "--workers", "many"]).is_err());
        assert!(Args::try_parse_from(["simextract", "r.toml", "--override-extractor", "thr"]).is_err());
        let args = Args::try_parse_from(["simextract", "r.toml"]).expect("args");
        assert_eq!(args.workers, None);
        assert!(args.overrides.is_empty());
    }
}
