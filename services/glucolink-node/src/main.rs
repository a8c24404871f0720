use anyhow::{bail, Context};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use glucolink_companion::LoggingChannel;
use glucolink_core::{logging, Config, TomlFileStore, TracingDiagnosticSink};
use glucolink_coordinator::{CoordinatorBuilder, LoopbackFactory, UnavailableSink};

mod replay;

use replay::{Replay, ReplayRecord};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    logging::init_from(&config.logging);

    info!(
        settings = %config.storage.settings_path.display(),
        min_interval_secs = config.throttle.min_interval_secs,
        min_delta = config.throttle.min_delta,
        "glucolink-node starting"
    );

    let factory = LoopbackFactory::new();
    let radio = factory.radio_feeder();
    let transmitter = factory.transmitter_feeder();
    let store = TomlFileStore::new(config.storage.settings_path.clone());

    let builder = CoordinatorBuilder::new(factory, store, Arc::new(LoggingChannel))
        .samples(Arc::new(UnavailableSink))
        .diagnostics(Arc::new(TracingDiagnosticSink))
        .config(config);
    let (handle, task) = glucolink_coordinator::spawn(builder)?;
    let replay = Replay::new(handle.clone(), radio, transmitter);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let record = match ReplayRecord::parse(line) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(error = %e, "Skipping replay line");
                        continue;
                    }
                };
                if let Some(output) = replay.apply(record).await? {
                    println!("{output}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }
    Ok(None)
}
