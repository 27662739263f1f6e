//! tree-ops: operator commands for tree update proposals.
//!
//! `namehashes` prints the registry's instance name hashes; `search-params`
//! reads chain history and forecasts the next proposal's batch parameters.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod chain;
mod config;
mod error;
mod forecast;
mod namehash;
mod report;
mod rpc;

use chain::TreesContract;
use config::OpsConfig;
use forecast::ForecastParams;
use rpc::EthRpcClient;

// =================== CLI ===================

#[derive(Parser, Debug)]
#[command(name = "tree-ops", version, about = "Tree update proposal helper")]
struct Cli {
    /// TOML config file (built-in mainnet deployment when omitted)
    #[arg(long, global = true, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Print a single JSON document instead of the console report
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the list of instances and their name hashes
    Namehashes,

    /// Print the name hash of each given name
    Namehash {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print search params for the next tree update proposal
    #[command(name = "search-params", alias = "searchParams")]
    SearchParams(SearchArgs),
}

#[derive(Args, Debug, Default)]
struct SearchArgs {
    /// JSON-RPC endpoint (overrides config and environment)
    #[arg(long)]
    rpc_url: Option<String>,

    /// First block of the observation window
    #[arg(long)]
    from_block: Option<u64>,

    /// Days until the proposal executes
    #[arg(long)]
    proposal_days: Option<u64>,

    /// Batch step = daily rate / divisor
    #[arg(long)]
    step_divisor: Option<u64>,

    /// Query logs in windows of this many blocks
    #[arg(long)]
    log_chunk_size: Option<u64>,
}

impl SearchArgs {
    fn apply(self, cfg: &mut OpsConfig) {
        if let Some(url) = self.rpc_url {
            cfg.rpc.url = Some(url);
        }
        if let Some(v) = self.from_block {
            cfg.forecast.from_block = v;
        }
        if let Some(v) = self.proposal_days {
            cfg.forecast.proposal_days = v;
        }
        if let Some(v) = self.step_divisor {
            cfg.forecast.step_divisor = v;
        }
        if let Some(v) = self.log_chunk_size {
            cfg.rpc.log_chunk_size = Some(v);
        }
    }
}

// =================== Main ===================

fn init_tracing() {
    // TREE_OPS_LOG, then RUST_LOG; stdout is reserved for the report
    let filter = std::env::var("TREE_OPS_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Host part only, so API keys embedded in the URL path stay out of the logs.
fn endpoint_host(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<unparsed>".to_string())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn search_params(cfg: &OpsConfig, json: bool) -> Result<()> {
    let client = EthRpcClient::from_config(&cfg.rpc)?;
    let trees = TreesContract::new(&client, cfg.forecast.trees_address);
    let params = ForecastParams::from(&cfg.forecast);

    info!(
        endpoint = %endpoint_host(&client.primary_url),
        fallbacks = client.fallback_urls.len(),
        trees = %trees.address(),
        instances = params.instances.len(),
        from_block = params.from_block,
        proposal_days = params.proposal_days,
        "Estimating tree update search params"
    );

    let report = forecast::run(&client, &trees, &params).await?;
    if json {
        print_json(&report::forecast_json(&report)?)?;
    } else {
        print!("{}", report::render_forecast(&report));
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = OpsConfig::load(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Namehashes => {
            let sections = report::namehash_sections(&cfg.registry)?;
            if cli.json {
                print_json(&report::namehashes_json(&sections))?;
            } else {
                print!("{}", report::render_namehashes(&sections));
            }
        }
        Commands::Namehash { names } => {
            let lines = report::hash_names(names.iter().map(String::as_str))?;
            if cli.json {
                print_json(&serde_json::to_value(&lines)?)?;
            } else {
                print!("{}", report::render_hash_lines(&lines));
            }
        }
        Commands::SearchParams(args) => {
            // forecast knobs only; the hashing commands never read them
            cfg.apply_env_overrides()?;
            args.apply(&mut cfg);
            cfg.validate()?;
            search_params(&cfg, cli.json).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; a missing file is not an error
    let _ = dotenv::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
