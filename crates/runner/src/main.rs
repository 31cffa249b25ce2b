use std::sync::Arc;

use anyhow::Context;
use meridian_core::csv::load_bars;
use meridian_live::{LiveManager, WsConnector};
use meridian_runner::{build_pipelines, live_feed, load_config, load_default_config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Meridian - chart series from bar history and live klines

USAGE:
    meridian [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --live              Stream closed klines after loading history
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: meridian=info)

EXAMPLES:
    # Summarize the embedded default configuration
    meridian

    # Load history from a config file and keep streaming
    meridian --config meridian.json --live
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meridian=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut live = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            "--live" => live = true,
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            load_config(path).with_context(|| format!("loading {path}"))?
        }
        None => {
            tracing::info!("Using embedded default configuration");
            load_default_config()?
        }
    };
    config.validate()?;

    let mut pipelines = build_pipelines(&config)?;

    for (pipeline, instrument) in pipelines.iter_mut().zip(&config.instruments) {
        if let Some(path) = &instrument.history {
            let bars = load_bars(path).with_context(|| format!("reading history {path}"))?;
            let outputs = pipeline.load_history(bars);
            let failed = outputs.iter().filter(|o| o.error.is_some()).count();
            tracing::info!(
                symbol = %pipeline.symbol(),
                indicators = outputs.len(),
                failed,
                "Indicators calculated"
            );
        }
        tracing::info!("{}", pipeline.summary());
    }

    if !(live || config.live.enabled) {
        return Ok(());
    }

    let manager = LiveManager::start(config.live.connection.clone(), Arc::new(WsConnector))?;
    let mut feeds = Vec::with_capacity(pipelines.len());
    for pipeline in pipelines {
        let subscription = manager.subscribe(pipeline.symbol(), pipeline.base())?;
        feeds.push(tokio::spawn(live_feed::drive(pipeline, subscription)));
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("Shutting down");
    manager.shutdown().await;

    for feed in feeds {
        let pipeline = feed.await?;
        tracing::info!("{}", pipeline.summary());
    }
    Ok(())
}
