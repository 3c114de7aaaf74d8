use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use turtleworks_app::{run_demo, Demo, LogObserver, ModelKind, ModelReport, RunOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "turtleworks",
    version,
    about = "Run Turtleworks demo models headlessly"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a model and print its summary.
    Run {
        #[command(flatten)]
        run: RunArgs,
        /// Print the summary as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Run a model and print the final world state as JSON.
    Snapshot {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Model to run.
    #[arg(long, value_enum, env = "TURTLEWORKS_MODEL", default_value_t = ModelKind::Pairing)]
    model: ModelKind,
    /// Seed for the random source; drawn from entropy when absent.
    #[arg(long, env = "TURTLEWORKS_SEED")]
    seed: Option<u64>,
    /// Upper bound on `go` steps.
    #[arg(long, env = "TURTLEWORKS_MAX_STEPS", default_value_t = 1_000)]
    max_steps: u64,
    /// Log progress every N steps (0 disables).
    #[arg(long, env = "TURTLEWORKS_LOG_EVERY", default_value_t = 100)]
    log_every: u64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { run, json } => {
            let (_, outcome) = execute(&run)?;
            if json {
                let text = serde_json::to_string_pretty(&outcome)
                    .context("failed to serialize run outcome")?;
                println!("{text}");
            } else {
                print_outcome(&outcome);
            }
        }
        Command::Snapshot { run } => {
            let (world, _) = execute(&run)?;
            let text = serde_json::to_string_pretty(&world.snapshot())
                .context("failed to serialize world snapshot")?;
            println!("{text}");
        }
    }
    Ok(())
}

fn execute(args: &RunArgs) -> Result<(turtleworks_core::World, RunOutcome)> {
    let mut demo = Demo::new(args.model);
    let mut observer = LogObserver::new(args.log_every);
    run_demo(&mut demo, args.seed, args.max_steps, &mut observer)
        .with_context(|| format!("{} model failed", args.model))
}

fn print_outcome(outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!("model:   {}", summary.model);
    println!("seed:    {}", summary.seed);
    println!("steps:   {} ({:?})", summary.steps, summary.end);
    match summary.ticks {
        Some(ticks) => println!("ticks:   {ticks}"),
        None => println!("ticks:   not started"),
    }
    println!("turtles: {}  links: {}", summary.turtles, summary.links);
    match &outcome.report {
        ModelReport::Pairing(report) => {
            println!(
                "carriers: {}/{} ({:.1}%), known: {}, couples: {}",
                report.carriers, report.people, report.percent_carriers, report.known, report.couples
            );
        }
        ModelReport::Kicks(report) => {
            println!("rounds: {}  kicks: {}  goals: {}", report.rounds, report.kicks, report.goals);
            let row = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
            println!(
                "best start row: {}  widest-angle row: {}",
                row(report.best_start),
                row(report.analytic)
            );
        }
    }
}
