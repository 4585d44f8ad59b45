//! Live-view script loader CLI.
//!
//! Replays navigations against a script bundle and prints the execution
//! requests the loader issues, one JSON object per line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use script_loader::core::types::{LoadState, Selection};
use script_loader::exit_codes;
use script_loader::io::catalog::{ScriptCatalog, load_bundle};
use script_loader::io::config::load_config;
use script_loader::io::context::{SessionContext, SessionResults};
use script_loader::io::executor::StdoutExecutor;
use script_loader::io::navigation::{UrlParams, parse_navigation};
use script_loader::loader::{LoaderDeps, ScriptLoader};
use script_loader::logging;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "script-loader",
    version,
    about = "Resolve which live-view script runs for a sequence of navigations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mount the loader, replay URLs as navigations, print execution requests.
    Replay {
        /// TOML script bundle (`[scripts."<id>"]` tables with `pxl` and `vis`).
        #[arg(long)]
        scripts: PathBuf,

        /// Loader config (TOML). Missing file means defaults.
        #[arg(long, default_value = "loader.toml")]
        config: PathBuf,

        /// URLs or paths to navigate to, in order.
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Replay {
            scripts,
            config,
            urls,
        } => cmd_replay(scripts, config, urls).await,
    }
}

async fn cmd_replay(scripts_path: PathBuf, config_path: PathBuf, urls: Vec<String>) -> Result<i32> {
    let cfg = load_config(&config_path)?;
    logging::init(&cfg.log_filter);

    let scripts = load_bundle(&scripts_path)?;
    let defaults = match &cfg.defaults {
        Some(defaults) => defaults.resolve(&scripts)?,
        None => Selection::default(),
    };
    // Reject bad URLs before mounting.
    for url in &urls {
        parse_navigation(url)?;
    }

    let navigation = UrlParams::new(cfg.navigation_capacity);
    let executor = Arc::new(StdoutExecutor::default());
    let loader = ScriptLoader::mount(LoaderDeps {
        navigation: navigation.clone(),
        catalog: Arc::new(ScriptCatalog::ready(scripts)),
        context: Arc::new(SessionContext::new(defaults)),
        results: Arc::new(SessionResults::default()),
        executor: executor.clone(),
    });

    for url in &urls {
        navigation.set_url(url)?;
        loader.idle().await;
    }

    let settle = Duration::from_millis(cfg.settle_timeout_ms);
    let state = match tokio::time::timeout(settle, loader.wait_for_state(LoadState::is_terminal)).await {
        Ok(state) => state,
        Err(_) => {
            warn!(state = loader.state().as_str(), "load state did not settle");
            loader.state()
        }
    };
    loader.idle().await;
    loader.unmount().await;

    let executed = executor.count();
    info!(executed, state = state.as_str(), "replay finished");
    eprintln!("load state: {}", state.as_str());
    if executed == 0 {
        return Ok(exit_codes::NOTHING_EXECUTED);
    }
    Ok(exit_codes::OK)
}
