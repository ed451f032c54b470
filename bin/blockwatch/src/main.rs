//! # Blockwatch
//!
//! Blockwatch indexes the block history of Hyperledger Fabric channels.
//! `blockwatch` is a binary crate for a command line application running the
//! indexer; the pipeline itself lives in `blockwatch-core`.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod blocks;
use blocks::Blocks;

mod start;
use start::Start;

mod common;

#[derive(Debug, Parser)]
#[clap(about, version)]
struct Cli {
    #[clap(subcommand)]
    command: Subcommands,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Run the block listeners and ingest channel history into the local
    /// index.
    Start(Start),
    /// Query a page of ingested block history, newest first.
    Blocks(Blocks),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,blockwatch=debug,blockwatch_core=debug");
    }
    env_logger::init();

    match cli.command {
        Subcommands::Start(cmd) => cmd.run().await,
        Subcommands::Blocks(cmd) => cmd.run().await,
    }
}
