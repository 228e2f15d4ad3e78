//! Operator key export.
//!
//! `keyexport transfer` unseals the keystore entry for an address and
//! prints the raw private key, for moving an account into other tooling.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capacity_node::keystore::export_private_key;
use capacity_node::types::parse_address;

#[derive(Parser)]
#[command(name = "keyexport", version, about = "export private keys from a keystore")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the private key for an address
    Transfer {
        /// Account address (hex, 0x optional)
        #[arg(long)]
        addr: String,

        /// Keystore directory
        #[arg(long)]
        keydir: PathBuf,

        /// Password unlocking the key file
        #[arg(long)]
        password: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().cmd {
        Commands::Transfer {
            addr,
            keydir,
            password,
        } => {
            let addr = parse_address(&addr).map_err(anyhow::Error::msg)?;
            let key = export_private_key(&keydir, &addr, &password)?;
            println!("privkey:{}", hex::encode(key.as_ref()));
            Ok(())
        }
    }
}
