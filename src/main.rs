//! Pushhub CLI - VAPID key management for the push delivery engine.
//!
//! This is the binary entry point. See the `pushhub` library for the
//! delivery engine itself; an API layer embeds [`pushhub::PushHub`]
//! directly.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pushhub::{Config, ServerKeys};

#[derive(Parser)]
#[command(name = "pushhub", version, about = "Web push delivery engine key management")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the server VAPID keypair if it does not exist yet.
    Keygen,
    /// Print the public signing key (base64url) browsers subscribe with.
    PublicKey,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let keys = ServerKeys::load_or_generate(&config.public_key_path, &config.private_key_path)?;

    match cli.command {
        Command::Keygen => {
            // Persist the effective config so later runs find the same keys
            config.save()?;
            println!("public key:  {}", config.public_key_path.display());
            println!("private key: {}", config.private_key_path.display());
            println!("applicationServerKey: {}", keys.public_key_base64());
        }
        Command::PublicKey => {
            println!("{}", keys.public_key_base64());
        }
    }

    Ok(())
}
