#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, Parser, Subcommand};
use ndarray::Array1;
use parabola::data::{DEFAULT_TARGET_COLUMN, load_prediction_data, load_training_data};
use parabola::model::{FittedModel, ModelError, RegressorConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(
    name = "parabola",
    version,
    about = "Fit linear, log, and quadratic terms to tabular data and print the discovered equation",
    long_about = "Expands each input feature into raw, log(x + 1e-8), pairwise-product and squared \
                  terms, fits the coefficients by least squares or ridge regression, and prints the \
                  resulting equation."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a model from training data
    #[command(about = "Fit a model (outputs: model.toml)")]
    Fit(FitArgs),

    /// Apply a fitted model to new data
    #[command(about = "Apply a fitted model to new data (outputs: predictions.tsv)")]
    Predict(PredictArgs),
}

#[derive(Args)]
struct FitArgs {
    /// Path to a tab-separated file with a header row
    training_data: PathBuf,

    /// Name of the target column
    #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
    target: String,

    /// Optional TOML file with a base configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leave out the log(x + 1e-8) terms
    #[arg(long)]
    no_log: bool,

    /// Fit with ridge regularization using this penalty
    #[arg(long, value_name = "ALPHA")]
    ridge_alpha: Option<f64>,

    /// Standardize every feature with training mean and standard deviation
    #[arg(long)]
    standardize: bool,

    /// Fit against log(y + 1e-8) and exponentiate predictions
    #[arg(long)]
    log_target: bool,

    /// Where to write the fitted model
    #[arg(long, default_value = "model.toml")]
    output: PathBuf,
}

#[derive(Args)]
struct PredictArgs {
    /// Path to a tab-separated file with the same feature columns used for fitting
    test_data: PathBuf,

    /// Path to a fitted model file (.toml)
    #[arg(long)]
    model: PathBuf,

    /// Name of a target column to ignore if present
    #[arg(long, default_value = DEFAULT_TARGET_COLUMN)]
    target: String,

    /// Where to write the predictions
    #[arg(long, default_value = "predictions.tsv")]
    output: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Fit(args) => fit_command(args),
        Commands::Predict(args) => predict_command(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Merges the optional config file with the command-line flags.
fn resolve_config(args: &FitArgs) -> Result<RegressorConfig, ModelError> {
    let mut config = match &args.config {
        Some(path) => RegressorConfig::load(path)?,
        None => RegressorConfig::default(),
    };

    if args.no_log {
        config.use_log = false;
    }
    if let Some(alpha) = args.ridge_alpha {
        config.use_ridge = true;
        config.ridge_alpha = alpha;
    }
    if args.standardize {
        config.standardize_inputs = true;
    }
    if args.log_target {
        config.log_target = true;
    }

    config.validate()?;
    Ok(config)
}

fn fit_command(args: FitArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading training data from: {}", args.training_data.display());
    let data = load_training_data(&args.training_data, &args.target)?;
    println!(
        "Loaded {} samples with {} features: {}",
        data.y.len(),
        data.feature_names.len(),
        data.feature_names.join(", ")
    );

    let config = resolve_config(&args)?;
    log::info!("Using configuration: {:?}", config);

    let model = config.fit_with_names(data.x.view(), data.y.view(), data.feature_names)?;
    model.describe();

    model.save(&args.output)?;
    println!("Model saved to: {}", args.output.display());

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading model from: {}", args.model.display());
    let model = FittedModel::load(&args.model)?;
    println!("Model expects features: {}", model.feature_names.join(", "));

    println!("Loading test data from: {}", args.test_data.display());
    let data = load_prediction_data(&args.test_data, &args.target)?;
    if data.feature_names != model.feature_names {
        return Err(format!(
            "Feature columns [{}] do not match the model's features [{}].",
            data.feature_names.join(", "),
            model.feature_names.join(", ")
        )
        .into());
    }

    let predictions = model.predict(data.x.view())?;
    save_predictions(&predictions, &args.output)?;
    println!(
        "{} predictions saved to: {}",
        predictions.len(),
        args.output.display()
    );

    Ok(())
}

/// Save predictions to a TSV file
fn save_predictions(predictions: &Array1<f64>, output_path: &Path) -> Result<(), std::io::Error> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(output_path)?);
    writeln!(file, "prediction")?;

    for &pred in predictions.iter() {
        writeln!(file, "{:.6}", pred)?;
    }

    file.flush()
}
