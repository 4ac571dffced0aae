//! CLI to recover funds locked in Lightning channels.

mod cli;
mod config;
mod handlers;

use anyhow::Result;
use clap::Parser;
use lnrescue_common::logging::{self, LoggerConfig};
use tracing::debug;

use crate::{
    cli::{Cli, Commands, ZombieCommands},
    config::Config,
    handlers::{derive_key, force_close, scb_close, sweep, zombie},
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LoggerConfig::for_command(cli.command.name()).verbose(cli.verbose));

    let config = Config::load(cli.config.as_deref())?.with_overrides(&cli.overrides);
    debug!(?config, "loaded config");

    match cli.command {
        Commands::DeriveKey(args) => derive_key::handle_derive_key(args, &config),
        Commands::ForceClose(args) => force_close::handle_force_close(args, &config),
        Commands::ScbClose(args) => scb_close::handle_scb_close(args, &config),
        Commands::SweepTimeLock(args) => sweep::handle_sweep_time_lock(args, &config),
        Commands::Zombie(command) => match command {
            ZombieCommands::PrepareKeys(args) => zombie::handle_prepare_keys(args, &config),
            ZombieCommands::MakeOffer(args) => zombie::handle_make_offer(args, &config),
            ZombieCommands::SignOffer(args) => zombie::handle_sign_offer(args, &config),
        },
    }
}
