//! Standalone benchmark runner.
//!
//! Settings come from `LOB_BENCH_*` environment variables, optionally loaded
//! from a `.env` file in the working directory.
//!
//! Usage:
//!   cargo run --release -p lob-bench
//!   LOB_BENCH_PAYLOAD_SIZE=64MiB LOB_BENCH_ITERATIONS=3 cargo run --release -p lob-bench

use anyhow::Result;
use bench_core::env_config::{parse_log_file, parse_log_level};
use lob_bench::config::{BenchConfig, ENV_LOG_FILE, ENV_LOG_LEVEL};
use lob_bench::driver::Bench;
use log::{info, LevelFilter};
use std::env;

fn resolve_log_level() -> LevelFilter {
    env::var(ENV_LOG_LEVEL)
        .ok()
        .as_deref()
        .and_then(parse_log_level)
        .unwrap_or(LevelFilter::Warn)
}

fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let log_level = resolve_log_level();
    let log_file = parse_log_file(env::var(ENV_LOG_FILE).ok().as_deref());
    bench_core::initialize_logger(log_level, log_file.as_deref())?;

    match dotenv {
        Ok(path) => info!("loaded settings from {}", path.display()),
        Err(err) if err.not_found() => {}
        Err(err) => log::warn!("ignoring unreadable .env file: {err}"),
    }

    let config = BenchConfig::from_env();
    info!(
        "payload {} bytes, read buffer {} bytes, {} iterations",
        config.payload_size, config.read_buffer_size, config.iterations
    );

    Bench::stdout(config).run()?;
    Ok(())
}
