use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use sales_analyst::datagen;
use sales_analyst::evaluation::EvaluationHarness;
use sales_analyst::feedback;
use sales_analyst::utils::init_logger;
use sales_analyst::{Config, EvaluationSummary, PipelineExecutor};

#[derive(Parser)]
#[command(name = "sales-analyst")]
#[command(about = "Staged sales analysis with run metrics and self-evaluation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis pipeline once
    Run {
        /// Tag recorded with the run's metrics
        #[arg(long, default_value = "manual")]
        tag: String,
        /// Dataset to analyze (default: <data dir>/<dataset hint>.csv)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
    /// Run the evaluation scenarios, then print the summary
    Evaluate,
    /// Print the aggregate summary of the metrics log
    Summary,
    /// Print the feedback the next run's planner will receive
    Feedback {
        /// Number of most recent runs to consider (default: SALES_FEEDBACK_WINDOW)
        #[arg(long)]
        max_runs: Option<usize>,
    },
    /// Write the synthetic Q3 2024 dataset
    GenerateData {
        #[arg(long, default_value_t = datagen::DEFAULT_SEED)]
        seed: u64,
        /// Write the oversized variant instead
        #[arg(long)]
        large: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.paths.logs_dir())?;
    info!(
        data_dir = %config.paths.data_dir.display(),
        outputs_dir = %config.paths.outputs_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Run { tag, dataset } => {
            let executor = PipelineExecutor::from_config(config)?;
            let outcome = executor.run_with_feedback(&tag, dataset.as_deref()).await?;
            if outcome.success {
                println!(
                    "Run '{}' finished in {:.2}s. Report: {}",
                    outcome.run_tag, outcome.duration_seconds, outcome.report_file
                );
            } else {
                println!(
                    "Run '{}' failed: {}. Report: {}",
                    outcome.run_tag,
                    outcome.error_message.as_deref().unwrap_or("unknown error"),
                    outcome.report_file
                );
            }
        }
        Commands::Evaluate => {
            let harness = EvaluationHarness::new(PipelineExecutor::from_config(config)?);
            println!("\n=== Running Evaluation Scenarios ===");
            for report in harness.run_all().await {
                println!("{}", report);
            }
            println!("\n=== Metrics Summary ===");
            print_summary(harness.summary().await?);
        }
        Commands::Summary => {
            print_summary(EvaluationSummary::from_log(&config.paths.metrics_log()).await?);
        }
        Commands::Feedback { max_runs } => {
            let window = max_runs.unwrap_or(config.eval.feedback_window);
            println!("{}", feedback::summarize(&config.paths.metrics_log(), window).await);
        }
        Commands::GenerateData { seed, large } => {
            let (path, table) = if large {
                (
                    config.paths.large_dataset(),
                    datagen::generate_large(seed, datagen::LARGE_COPIES)?,
                )
            } else {
                (config.paths.raw_dataset(), datagen::generate(seed)?)
            };
            datagen::write_dataset(&path, &table)?;
            println!("Generated {} rows of sample data", table.rows.len());
            println!("   Saved to: {}", path.display());
        }
    }

    Ok(())
}

fn print_summary(summary: Option<EvaluationSummary>) {
    match summary {
        Some(summary) => print!("{}", summary),
        None => println!("No metrics file. Run the pipeline or the evaluation first."),
    }
}
