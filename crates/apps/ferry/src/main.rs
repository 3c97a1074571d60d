//! Ferry: one-way Exchange to Gmail mail mirror
//!
//! Runs as a short batch job from cron or a CI schedule: one invocation is
//! one pass. See the `fast`, `deep`, and `test` subcommands.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    config::init()?;

    let cli = cli::Cli::parse();
    commands::run(cli.command)
}
