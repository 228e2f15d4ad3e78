//! Proof-of-capacity consensus core.
//!
//! Miners precompute a plot, a range of 256 KiB "cells" derived from
//! their plot identifier with Shabal-256, one cell per nonce, and store
//! it scoop-major on disk. At each height the block's generation signature
//! picks one of 4096 scoops; the miner reads that scoop for every stored
//! nonce, derives a deadline from it, and may seal a block once its best
//! deadline has elapsed since the parent. Verifiers recompute a sealed
//! nonce's cell from scratch, so a seal proves the capacity was either
//! stored or regenerated in full.
//!
//! Module map:
//! - [`poc`]: the pure primitives (cells, scoops, targets, deadlines)
//! - [`plotter`]: bulk cell generation and scoop-major persistence
//! - [`miner`]: the seal scan over stored plots
//! - [`consensus`]: header/seal verification and the base-target controller
//! - [`chain`], [`header`]: the read-only chain shapes the engine consumes
//! - [`api`]: the capacity-block inspection route
//! - [`keystore`]: sealed key files for the operator export tool

pub mod api;
pub mod chain;
pub mod consensus;
pub mod header;
pub mod keystore;
pub mod miner;
pub mod plotter;
pub mod poc;
pub mod types;
pub mod util;

pub use chain::{BlockSummary, BlockSummarySource, ChainView, MemoryChain};
pub use consensus::{ConsensusError, Engine};
pub use header::{Block, BlockHeader};
pub use miner::{NonceRegistry, NonceWindow, Sealer};
pub use types::{Address, Hash32};
