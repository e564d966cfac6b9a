//! Quill CLI - let a decision engine drive GitHub repository changes.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use quill_core::{BranchName, LoopBudget, RepoId, ToolLoop};
use quill_github::{Auth, CommitAuthor, GitHubClient};

mod config;
mod engine;
mod output;

use config::Config;
use engine::CommandEngine;

#[derive(Parser)]
#[command(name = "quill", version, about = "Decision-engine-driven GitHub repository changes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a goal against a repository.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Target repository as owner/name.
    #[arg(long)]
    repo: String,

    /// Natural-language goal handed to the decision engine.
    #[arg(long)]
    goal: String,

    /// Base branch (defaults to the repository's default branch).
    #[arg(long)]
    base: Option<String>,

    /// Decision engine command, whitespace-split (overrides config).
    #[arg(long)]
    engine: Option<String>,

    /// Maximum number of executed decisions (overrides config).
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Wall-clock limit for the whole run, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to the config file.
    #[arg(long, default_value = "quill.toml")]
    config: PathBuf,

    /// Print the final report as JSON instead of colored text.
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run(args).await,
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let repo: RepoId = args.repo.parse()?;
    let config = Config::load(&args.config)?;

    let engine_command = args.engine.map_or(config.engine.command, |cmd| {
        Some(cmd.split_whitespace().map(str::to_string).collect())
    });
    let engine_command = engine_command.context(
        "no decision engine configured - pass --engine or set [engine] command in quill.toml",
    )?;
    let engine = CommandEngine::new(
        engine_command,
        Duration::from_secs(config.engine.timeout_secs),
    )?;

    let auth = Auth::auto();
    let client = match &config.github.api_url {
        Some(url) => GitHubClient::with_base_url(&auth, url),
        None => GitHubClient::new(&auth),
    }?;

    let base = match args.base {
        Some(base) => base,
        None => client
            .get_default_branch(&repo.owner, &repo.name)
            .await
            .context("failed to resolve the default branch")?,
    };
    let base = BranchName::new(base)?;

    let mut budget = LoopBudget::new(args.max_iterations.unwrap_or(config.run.max_iterations));
    if let Some(secs) = args.timeout {
        budget = budget.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    let author = CommitAuthor {
        name: config.run.author_name.clone(),
        email: config.run.author_email.clone(),
        date: None,
    };

    if !args.json {
        output::info(&format!("running against {repo} (base '{base}')"));
    }

    let report = ToolLoop::new(&client, &engine, repo, args.goal.as_str(), base)
        .with_budget(budget)
        .with_author(author)
        .run()
        .await;

    if args.json {
        output::essential(&serde_json::to_string_pretty(&report)?);
    } else {
        output::print_report(&report);
    }

    if report.is_completed() {
        Ok(())
    } else {
        anyhow::bail!("run ended with a fatal error")
    }
}
