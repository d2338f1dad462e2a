#![forbid(unsafe_code)]

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use choice_harness::dataset::{load_examples, load_questions};
use choice_harness::experiment::{
    summarize_dir, ExampleOrder, ExperimentContext, ExperimentSummary, Graded, GradedExperiment,
    ModelSpec, Partition, SelfConsistency,
};
use choice_harness::extract::extract_letter;
use choice_harness::gateway::{GatewayConfig, ProviderGateway, TracingUsageSink};
use choice_harness::prompts::DEFAULT_ROLE;

#[derive(Parser)]
#[command(name = "choice", version, about = "Multiple-choice prompting experiments")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Question set (JSON array)
    #[arg(long, global = true, default_value = "aws_questions_with_ids.json")]
    questions: PathBuf,
    /// Few-shot example pool (JSON array)
    #[arg(long, global = true, default_value = "few_shot_examples.json")]
    examples: PathBuf,
    /// Directory for result and summary files
    #[arg(long, global = true, default_value = ".")]
    out_dir: PathBuf,
    /// Minimum spacing between provider calls
    #[arg(long, global = true, default_value_t = 1000)]
    interval_ms: u64,
    /// Retries for retryable provider errors (0 disables)
    #[arg(long, global = true, default_value_t = 0)]
    max_retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Zero- and few-shot prompting
    FewShot {
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long, value_delimiter = ',', default_values_t = [0, 2, 5, 10])]
        shots: Vec<usize>,
    },
    /// Same five examples in three orders
    OrderEffect {
        #[arg(long, value_delimiter = ',', default_value = "gpt-3.5-turbo")]
        models: Vec<String>,
    },
    /// Standard prompt against a persona-primed prompt
    Role {
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        /// File holding the persona text (defaults to the built-in trainer persona)
        #[arg(long)]
        role_file: Option<PathBuf>,
    },
    /// Majority vote over repeated samples
    SelfConsistency {
        #[arg(long, value_delimiter = ',')]
        models: Vec<String>,
        #[arg(long, default_value_t = 3)]
        runs: usize,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
    },
    /// Extract the answer letter from text (offline)
    Extract {
        /// Text to inspect; read from stdin when omitted
        #[arg(long)]
        text: Option<String>,
    },
    /// Tally every result file in a directory
    Summarize {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        Commands::Extract { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            match extract_letter(Some(&text)) {
                Some(letter) => println!("{letter}"),
                None => println!("?"),
            }
        }
        Commands::Summarize { dir } => {
            let summaries = summarize_dir(&dir)?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::FewShot { models, shots } => {
            let experiment = GradedExperiment::few_shot(parse_models(&models)?, &shots);
            run_graded(&global, experiment).await?;
        }
        Commands::OrderEffect { models } => {
            let experiment =
                GradedExperiment::order_effect(parse_models(&models)?, ExampleOrder::defaults());
            run_graded(&global, experiment).await?;
        }
        Commands::Role { models, role_file } => {
            let role = match role_file {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
                None => DEFAULT_ROLE.to_string(),
            };
            let experiment = GradedExperiment::role_priming(parse_models(&models)?, role);
            run_graded(&global, experiment).await?;
        }
        Commands::SelfConsistency {
            models,
            runs,
            temperature,
        } => {
            let experiment = SelfConsistency {
                models: parse_models(&models)?,
                runs,
                temperature,
            };
            let gateway = build_gateway(&global)?;
            let questions = load_questions(&global.questions)?;
            let ctx = ExperimentContext::new(&gateway, &questions, &[])
                .with_out_dir(&global.out_dir);
            let partitions = experiment.run(&ctx).await?;
            finish(&global.out_dir, SelfConsistency::NAME, &ctx, &partitions)?;
        }
    }

    Ok(())
}

/// Empty means both default models.
fn parse_models(specs: &[String]) -> Result<Vec<ModelSpec>, Box<dyn std::error::Error>> {
    if specs.is_empty() {
        return Ok(ModelSpec::defaults());
    }
    Ok(specs
        .iter()
        .map(|s| ModelSpec::parse(s))
        .collect::<Result<Vec<_>, _>>()?)
}

fn build_gateway(
    global: &GlobalArgs,
) -> Result<ProviderGateway<TracingUsageSink>, Box<dyn std::error::Error>> {
    let config = GatewayConfig {
        max_retries: global.max_retries,
        min_interval: Duration::from_millis(global.interval_ms),
        ..GatewayConfig::default()
    };
    Ok(ProviderGateway::from_env(Arc::new(TracingUsageSink), config)?)
}

async fn run_graded(
    global: &GlobalArgs,
    experiment: GradedExperiment,
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = build_gateway(global)?;
    let questions = load_questions(&global.questions)?;
    let examples = if experiment.needs_examples() {
        load_examples(&global.examples)?
    } else {
        Vec::new()
    };

    let ctx =
        ExperimentContext::new(&gateway, &questions, &examples).with_out_dir(&global.out_dir);
    let partitions = experiment.run(&ctx).await?;
    finish(&global.out_dir, experiment.name, &ctx, &partitions)
}

/// Result files are already on disk; add the summary.
fn finish<R: Graded>(
    out_dir: &Path,
    experiment: &str,
    ctx: &ExperimentContext<'_>,
    partitions: &[Partition<R>],
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = ExperimentSummary::new(experiment, ctx.run_id, partitions);
    summary.write(out_dir)?;
    summary.report();
    Ok(())
}
