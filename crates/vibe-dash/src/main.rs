//! vibe: dashboard CLI for AI-assisted coding projects.
//! Thin wrapper over the state engine: parse a verb, run it, map the
//! outcome to an exit code.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use vibe_engine::StateEngine;
use vibe_store::StorageLayout;

mod cli;
mod commands;
mod exit;
mod output;
mod signals;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();
    init_logging(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, print) = exit::classify(&err);
            if print {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(args: &cli::Cli) {
    let default = if args.verbose {
        "debug"
    } else {
        args.command.default_log_level()
    };
    let filter = std::env::var("VIBE_DASH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: cli::Cli) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    signals::install(cancel.clone());

    let layout = StorageLayout::resolve(args.config_dir)?;
    let engine = StateEngine::open(layout, cancel).await?;

    let result = dispatch(&engine, args.command).await;
    // Pending stage transitions are committed even when the verb failed.
    engine.shutdown().await;
    result
}

async fn dispatch(engine: &StateEngine, command: cli::Command) -> anyhow::Result<()> {
    use cli::Command;

    match command {
        Command::Add(opts) => commands::add(engine, opts).await,
        Command::Remove(target) => commands::remove(engine, target).await,
        Command::List(opts) => commands::list(engine, opts),
        Command::Status(opts) => commands::status(engine, opts).await,
        Command::Rename(opts) => commands::rename(engine, opts).await,
        Command::Favorite(opts) => commands::favorite(engine, opts).await,
        Command::Note(opts) => commands::note(engine, opts).await,
        Command::Hibernate(target) => commands::hibernate(engine, target).await,
        Command::Activate(target) => commands::activate(engine, target).await,
        Command::Refresh => commands::refresh(engine).await,
        Command::Exists(target) => commands::exists(engine, target).await,
        Command::Config(command) => commands::config(engine, command).await,
        Command::Reset(opts) => commands::reset(engine, opts).await,
        Command::Watch => commands::watch(engine).await,
    }
}
