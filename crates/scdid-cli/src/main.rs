#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod telemetry;

use clap::Parser;
use commands::{run_decode, run_next, run_pack};
use config::{CliArgs, Command, DecodeConfig, NextConfig};
use telemetry::init_tracing;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    init_tracing()?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Next(args) => {
            let config = NextConfig::try_from(args)?;
            if cfg!(debug_assertions) {
                tracing::debug!("Allocating with full config: {:#?}", config);
            }
            run_next(&config, &mut out).await
        }
        Command::Decode(args) => run_decode(&DecodeConfig::try_from(args)?, &mut out),
        Command::Pack(args) => run_pack(&args.ids, &mut out),
    }
}
