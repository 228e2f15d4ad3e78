//! Consensus error types.

use thiserror::Error;

/// Errors returned by header and seal validation. Every variant is a
/// rejection; validation never panics on hostile input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Parent of the header being verified is unknown.
    #[error("unknown ancestor")]
    UnknownAncestor,

    #[error("extra-data too long: {have} > {max}")]
    ExtraDataTooLong { have: usize, max: usize },

    /// Header timestamp is ahead of this node's clock.
    #[error("future block")]
    FutureBlock,

    #[error("timestamp equals parent's")]
    ZeroBlockTime,

    #[error("invalid gasLimit: have {have}, max {max}")]
    GasLimitTooHigh { have: u64, max: u64 },

    #[error("invalid gasUsed: have {have}, gasLimit {limit}")]
    InvalidGasUsed { have: u64, limit: u64 },

    #[error("invalid gas limit: have {have}, want {parent} +- {bound}")]
    InvalidGasLimit { have: u64, parent: u64, bound: u64 },

    #[error("invalid block number")]
    InvalidNumber,

    /// Seal carries a plot id that is not derived from its coinbase.
    #[error("plotID mismatch")]
    PlotIdMismatch,

    /// Base target in the header is zero; deadlines are undefined.
    #[error("invalid base target")]
    InvalidBaseTarget,

    /// Recomputed deadline does not equal the sealed one.
    #[error("deadline compute error")]
    DeadlineMismatch,

    /// The sealed deadline had not elapsed at the claimed seal time.
    #[error("deadline not satisfy")]
    DeadlineNotSatisfied,

    /// Seal time is too far ahead of this node's clock.
    #[error("time mismatch")]
    TimeMismatch,

    #[error("too many uncles")]
    TooManyUncles,

    #[error("duplicate uncle")]
    DuplicateUncle,

    #[error("uncle is ancestor")]
    UncleIsAncestor,

    #[error("uncle's parent is not ancestor")]
    DanglingUncle,
}
