mod config;
mod constants;
mod domain;
mod models;
mod queue;
mod services;

use anyhow::Result;
use clap::Parser;
use log::error;
use std::path::PathBuf;

use config::Config;
use domain::engine::Engine;
use domain::state::CrossPostState;
use services::Publisher;
use services::linkedin::LinkedinPublisher;
use services::relay::NakEventSource;
use services::twitter::TwitterPublisher;

#[derive(Debug, Parser)]
#[command(
    name = "syndicator",
    about = "Cross-posts a Nostr feed to X and LinkedIn"
)]
struct Args {
    /// Run the full pipeline and record state, but suppress real publish
    /// calls
    #[arg(long)]
    dry_run: bool,

    /// Emit step-by-step diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process the pre-authored queue instead of scanning the live feed
    #[arg(long)]
    queue: bool,

    /// State file location
    #[arg(long)]
    state: Option<PathBuf>,

    /// Queue file location
    #[arg(long)]
    queue_file: Option<PathBuf>,
}

fn default_data_path(file: &str) -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("syndicator").join(file))
        .unwrap_or_else(|| PathBuf::from(file))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Setup failures are the only path to a non-zero exit; individual
    // skips and publish failures are part of a completed run
    if let Err(e) = run(args).await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;

    let state_path = args
        .state
        .unwrap_or_else(|| default_data_path("state.json"));
    let queue_path = args
        .queue_file
        .unwrap_or_else(|| default_data_path("queue.json"));
    let mut state = CrossPostState::load(&state_path);

    let publishers: Vec<Box<dyn Publisher>> = vec![
        Box::new(TwitterPublisher::new(&config.twitter)),
        Box::new(LinkedinPublisher::new(&config.linkedin)),
    ];

    let report = if args.queue {
        queue::run_queue(&config, &publishers, args.dry_run, &mut state, &queue_path).await
    } else {
        let source = NakEventSource::new(&config.nak_bin, &config.relays, &config.search_relay);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: args.dry_run,
        };
        engine.run_scan(&mut state).await
    };

    state.save(&state_path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
