//! Block header and block shapes consumed by the capacity-proof engine.
//!
//! Serialization of headers on the wire belongs to the node's codec; the
//! engine only reads and writes the fields below. Header identity hashing
//! uses BLAKE3; the capacity proof itself never does.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Hash32};

/// A block header carrying the capacity-proof seal fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_hash: Hash32,
    pub number: u64,
    pub coinbase: Address,
    /// Unix seconds this block was sealed at.
    pub time: u64,
    /// The parent block's `time`; deadlines are measured from here.
    pub last_time: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub extra: Vec<u8>,

    /// 32-byte generation signature chained from the parent.
    pub gen_sig: Hash32,
    /// Plot identifier of the sealing account.
    pub plot_id: u64,
    /// The nonce whose stored scoop satisfied the deadline.
    pub nonce: u64,
    pub base_target: BigUint,
    pub deadline: BigUint,
}

impl BlockHeader {
    /// Header identity hash, used for parent lookups and block summaries.
    pub fn hash(&self) -> Hash32 {
        let encoded = serde_json::to_vec(self).expect("header is always serializable");
        *blake3::hash(&encoded).as_bytes()
    }
}

/// A block as seen by the engine: header, uncle headers and the transaction
/// count surfaced in summaries. Bodies stay with the chain database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub uncles: Vec<BlockHeader>,
    pub tx_count: u64,
}

impl Block {
    pub fn new(header: BlockHeader) -> Self {
        Self {
            header,
            uncles: Vec::new(),
            tx_count: 0,
        }
    }

    pub fn hash(&self) -> Hash32 {
        self.header.hash()
    }
}
