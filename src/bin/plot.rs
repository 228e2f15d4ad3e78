//! Plot writer CLI.
//!
//! `plot write` precomputes and persists plot files for a plot id;
//! `plot calc` prints the plot id a given address owns. Progress is
//! emitted as one JSON line per file so wrapper UIs can track long runs.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use capacity_node::plotter::{self, PlotParams, PlotterConfig, DEFAULT_START_NONCE};
use capacity_node::poc;
use capacity_node::types::parse_address;

#[derive(Parser)]
#[command(name = "plot", version, about = "plot file writer for capacity mining")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write plot files for a plot id
    Write {
        /// Directory receiving the plot files
        #[arg(long = "dataPath")]
        data_path: PathBuf,

        /// Per-file size (IEC base-2: KB, MB, GB, TB)
        #[arg(long = "singSize")]
        sing_size: String,

        /// Total size to plot
        #[arg(long = "size")]
        size: String,

        /// First nonce of the plot
        #[arg(long = "startNonce", default_value_t = DEFAULT_START_NONCE)]
        start_nonce: u64,

        /// Plot id that owns the nonces
        #[arg(long = "plotID")]
        plot_id: u64,

        /// Worker thread override (default: two per logical core)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Print the plot id owned by an address
    Calc {
        /// Account address (hex, 0x optional)
        #[arg(long)]
        addr: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().cmd {
        Commands::Write {
            data_path,
            sing_size,
            size,
            start_nonce,
            plot_id,
            workers,
        } => {
            let cfg = PlotterConfig {
                data_path,
                sing_size,
                size,
                start_nonce,
                plot_id,
                workers,
            };
            let params = PlotParams::resolve(&cfg)?;
            plotter::run(&params, &|report| println!("{}", report.to_json_line()));
            Ok(())
        }
        Commands::Calc { addr } => {
            let addr = parse_address(&addr).map_err(anyhow::Error::msg)?;
            println!("plotID: {}", poc::plot_id_of_address(&addr));
            Ok(())
        }
    }
}
