// src/main.rs

//! The main entry point for the SpinelKV server application.

use anyhow::{Result, anyhow};
use spinelkv::config::Config;
use spinelkv::server;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("SpinelKV version {VERSION}");
        return Ok(());
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    };

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    info!("Starting SpinelKV {VERSION}");
    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Reads `--config <path>` and `--port <n>`. A missing default config file
/// falls back to the built-in defaults; an explicitly named one must exist.
fn load_config(args: &[String]) -> Result<Config> {
    let explicit_path = flag_value(args, "--config")?;
    let config_path = explicit_path.unwrap_or(DEFAULT_CONFIG_PATH);

    let mut config = if explicit_path.is_none() && !Path::new(config_path).exists() {
        Config::default()
    } else {
        Config::from_file(config_path)?
    };

    if let Some(port) = flag_value(args, "--port")? {
        config.port = port
            .parse::<u16>()
            .map_err(|_| anyhow!("Invalid port number: {port}"))?;
        config.validate()?;
    }
    Ok(config)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|arg| arg == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|value| Some(value.as_str()))
            .ok_or_else(|| anyhow!("{flag} flag requires a value")),
        None => Ok(None),
    }
}
