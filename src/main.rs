use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gridworld::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "gridworld")]
#[command(version, long_about = None)]
#[command(about = "Solve a grid world and print every step of the solution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Exact solution by value iteration
    ValueIteration(SolveArgs),

    /// Sample based solution by Q-learning
    QLearning(SolveArgs),
}

#[derive(clap::Args)]
struct SolveArgs {
    /// Grid configuration as JSON
    #[arg(short, long)]
    config: PathBuf,

    /// Seed for exploration, for reproducible Q-learning runs
    #[arg(long)]
    seed: Option<u64>,

    /// Query as x,y,step,type with type one of stateValue, bestPolicy, bestQValue
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// Attach a picture of the grid to every answer
    #[arg(long)]
    visualize: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (family, args) = match cli.command {
        Commands::ValueIteration(args) => (AgentFamily::Mdp, args),
        Commands::QLearning(args) => (AgentFamily::Rl, args),
    };

    let response = solve(family, &args)?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn solve(family: AgentFamily, args: &SolveArgs) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read {}", args.config.display()))?;
    let config = GridConfig::from_json_str(&text)?;
    config.check_required(family)?;

    let env = Arc::new(
        Environment::new(&config.prepared_for(family)).context("failed to initialize grid")?,
    );
    let mut solver = Solver::new(family, env)?.with_visualized_answers(args.visualize);
    if let Some(seed) = args.seed {
        solver = solver.with_seed(seed);
    }

    let queries = args
        .queries
        .iter()
        .map(|q| parse_query(family, q))
        .collect::<Result<Vec<_>>>()?;
    solver.set_relevant_queries(queries);

    solver.run()?;

    Ok(json!({
        "message": solver.completion_message(),
        "iterations": solver.iterations_json()?,
        "queries": solver.queries(),
    }))
}

fn parse_query(family: AgentFamily, s: &str) -> Result<Query> {
    let parts = s.split(',').map(str::trim).collect::<Vec<_>>();
    let &[x, y, step, query_type] = parts.as_slice() else {
        anyhow::bail!("query '{s}' is not of the form x,y,step,type");
    };

    let query_type = query_type.parse::<QueryType>().map_err(anyhow::Error::msg)?;
    Ok(Query::new(
        x.parse().with_context(|| format!("bad x in query '{s}'"))?,
        y.parse().with_context(|| format!("bad y in query '{s}'"))?,
        step.parse()
            .with_context(|| format!("bad step in query '{s}'"))?,
        family,
        query_type,
    )?)
}
