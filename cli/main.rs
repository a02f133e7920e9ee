#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::process;

use holdout::config::{ExperimentConfig, ThresholdoutConfig};
use holdout::crossval::CrossValidation;
use holdout::data::load_dataset;
use holdout::experiment::Experiment;
use holdout::logistic::LogisticPredictor;
use holdout::thresholdout::ReleaseBranch;

#[derive(Parser)]
#[command(
    name = "holdout",
    about = "K-fold cross-validation with a reusable thresholdout holdout set",
    long_about = "Partitions a labeled TSV dataset into K cross-validation folds plus a protected \
                  holdout fold, cross-validates a ridge-penalised logistic model, and answers \
                  generalization-error queries against the holdout through thresholdout."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ExperimentArgs {
    /// Path to a TSV file with a header row, a binary label column and numeric feature columns
    data: String,

    /// Optional TOML experiment configuration; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// Number of cross-validation folds K (the holdout is fold K+1)
    #[arg(long, value_name = "K")]
    folds: Option<usize>,

    /// Seed of the fold assignment
    #[arg(long)]
    seed: Option<u64>,

    /// Name of the label column
    #[arg(long, value_name = "COLUMN")]
    label: Option<String>,

    /// Comma-separated feature columns, in model order
    #[arg(long, value_delimiter = ',', value_name = "COLUMNS")]
    features: Option<Vec<String>>,

    /// Ridge penalty of the logistic model
    #[arg(long)]
    ridge: Option<f64>,

    /// Identifier under which the cross-validation result is reported
    #[arg(long, default_value = "logistic")]
    model_id: String,
}

#[derive(Args)]
struct QueryArgs {
    #[command(flatten)]
    experiment: ExperimentArgs,

    /// Thresholdout threshold (tau)
    #[arg(long)]
    threshold: Option<f64>,

    /// Thresholdout noise scale (sigma)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Seed of the thresholdout noise draws; defaults to the fold seed
    #[arg(long)]
    query_seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validate the logistic model and report train/test error
    #[command(about = "Run K-fold cross-validation on the non-holdout rows")]
    Crossval(ExperimentArgs),

    /// Cross-validate, then release a thresholdout estimate of generalization error
    #[command(about = "Query the holdout through thresholdout")]
    Query(QueryArgs),

    /// Display version and build information
    #[command(about = "Display version and build information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Crossval(args)) => crossval(args),
        Some(Commands::Query(args)) => query(args),
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn resolve_config(args: &ExperimentArgs) -> Result<ExperimentConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(folds) = args.folds {
        config.folds = folds;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(label) = &args.label {
        config.label_column = label.clone();
    }
    if let Some(features) = &args.features {
        config.feature_columns = Some(features.clone());
    }
    if let Some(ridge) = args.ridge {
        config.model.ridge = ridge;
    }
    config.validate()?;
    Ok(config)
}

type ExperimentRun = (Experiment, CrossValidation<LogisticPredictor>);

fn run_experiment(
    args: &ExperimentArgs,
    config: &ExperimentConfig,
) -> Result<ExperimentRun, Box<dyn std::error::Error>> {
    let dataset = load_dataset(
        &args.data,
        &config.label_column,
        config.feature_columns.as_deref(),
    )?;
    let mut experiment = Experiment::from_config(dataset, config)?;
    let result = experiment.cross_validate(&args.model_id, &config.model)?;
    Ok((experiment, result))
}

fn crossval(args: ExperimentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    let (experiment, result) = run_experiment(&args, &config)?;

    println!(
        "rows: {} cross-validation, {} holdout ({} folds, seed {})",
        experiment.partition().len(),
        experiment.holdout_len(),
        config.folds,
        experiment.seed()
    );
    println!("replicate\tn_train\tn_test\ttrain_err\ttest_err");
    for record in &result.records {
        println!(
            "{}\t{}\t{}\t{:.6}\t{:.6}",
            record.replicate, record.n_train, record.n_test, record.train_err, record.test_err
        );
    }
    for (model_id, summary) in experiment.summaries() {
        println!(
            "model {model_id}: train_err {:.6}, test_err {:.6}, final_err {:.6}",
            summary.train_err, summary.test_err, summary.final_err
        );
    }
    Ok(())
}

fn query(args: QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = resolve_config(&args.experiment)?;
    let base = config.thresholdout;
    let threshold = args
        .threshold
        .or(base.map(|t| t.threshold))
        .ok_or("a threshold is required (--threshold or [thresholdout] in the config)")?;
    let tolerance = args
        .tolerance
        .or(base.map(|t| t.tolerance))
        .ok_or("a tolerance is required (--tolerance or [thresholdout] in the config)")?;
    config.thresholdout = Some(ThresholdoutConfig {
        threshold,
        tolerance,
        seed: args.query_seed.or(base.and_then(|t| t.seed)),
    });
    config.validate()?;
    let params = config
        .thresholdout_params()
        .ok_or("thresholdout parameters are missing")?;

    let (experiment, result) = run_experiment(&args.experiment, &config)?;
    let release = experiment.thresholdout(&result.final_estimate, &params)?;

    let branch = match release.branch() {
        ReleaseBranch::Cheap => "training estimate",
        ReleaseBranch::Expensive => "noised holdout estimate",
    };
    println!(
        "model {}: released generalization error {:.6} ({branch})",
        args.experiment.model_id,
        release.value()
    );
    Ok(())
}

fn print_version_info() {
    let version = env!("CARGO_PKG_VERSION");
    let build_timestamp: u64 = env!("HOLDOUT_BUILD_TIMESTAMP").parse().unwrap_or(0);

    println!("holdout {}", version);

    if build_timestamp > 0 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let age_hours = now.saturating_sub(build_timestamp) as f64 / 3600.0;
        println!("Built: {:.1} hours ago", age_hours);
    }
}
