//! CatalogScout server — entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;

use catalog_scout::router::RunRequest;
use catalog_scout::ScoutConfig;
use catalog_scout_server::{rest, AppState, EngineChoice};

#[derive(Parser)]
#[command(
    name = "catalog-scout-server",
    about = "CatalogScout — resolve catalog categories, extract listings, route goals",
    version
)]
struct Cli {
    /// Page engine for the browser path.
    #[arg(long, value_enum, default_value = "auto", global = true)]
    engine: EngineChoice,

    /// Catalog root URL (overrides SCOUT_BASE_URL).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// JSON endpoint root for the HTTP fallback (overrides SCOUT_FALLBACK_URL).
    /// Pass an empty string to disable the fallback.
    #[arg(long, global = true)]
    fallback_url: Option<String>,

    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    headful: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API over HTTP (default).
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:5001")]
        addr: SocketAddr,
    },

    /// Print the catalog's categories as JSON.
    Categories,

    /// Search one category and print the result as JSON.
    Search {
        /// Free-text category query.
        query: String,

        /// Maximum number of items (0 = no limit).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run a goal and print the response with its trace as JSON.
    ///
    /// The goal is parsed as JSON when it looks like an object, else taken
    /// as free text.
    Run {
        goal: String,

        /// Attempt budget.
        #[arg(long)]
        steps: Option<i64>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   catalog-scout-server completions bash > ~/.local/share/bash-completion/completions/catalog-scout-server
    ///   catalog-scout-server completions zsh > ~/.zfunc/_catalog-scout-server
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn resolve_config(cli: &Cli) -> ScoutConfig {
    let mut config = ScoutConfig::from_env();
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if let Some(url) = &cli.fallback_url {
        config.fallback_url = url.clone();
    }
    if cli.headful {
        config.headless = false;
    }
    config
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli);
    let command = cli.command.unwrap_or(Commands::Serve {
        addr: SocketAddr::from(([127, 0, 0, 1], 5001)),
    });

    match command {
        Commands::Serve { addr } => {
            let mut config = config;
            // One-shot CLI runs fall back to a running server; `serve` falls
            // back to itself unless told otherwise.
            if cli.fallback_url.is_none() && std::env::var("SCOUT_FALLBACK_URL").is_err() {
                config.fallback_url = format!("http://{addr}/");
            }
            let state = AppState::build(config, cli.engine)?;
            tracing::info!("CatalogScout server");
            tracing::info!("Engine: {}", state.browser.engine());
            rest::start(addr, Arc::new(state)).await?;
        }

        Commands::Categories => {
            let state = AppState::build(config, cli.engine)?;
            let names = state.browser.taxonomy().get().await.names();
            print_json(&json!({
                "status": "success",
                "count": names.len(),
                "categories": names,
            }))?;
        }

        Commands::Search { query, limit } => {
            let state = AppState::build(config, cli.engine)?;
            let result = match state.browser.search(&query, limit).await {
                Ok(result) => result,
                Err(e) => catalog_scout::SearchResult::error(query.as_str(), "Search failed")
                    .with_meta("code", e.code())
                    .with_meta("detail", e.to_string()),
            };
            print_json(&result.to_value())?;
            if !result.is_answer() {
                std::process::exit(1);
            }
        }

        Commands::Run { goal, steps } => {
            let state = AppState::build(config, cli.engine)?;
            let goal = if goal.trim_start().starts_with('{') {
                serde_json::from_str(&goal)?
            } else {
                serde_json::Value::String(goal)
            };
            let response = state.router.run(RunRequest { goal, steps }).await;
            print_json(&serde_json::to_value(&response)?)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "catalog-scout-server",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}
