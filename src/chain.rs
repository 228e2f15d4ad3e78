//! Read-only chain access for the engine and the inspection API.
//!
//! The miner and verifier never own chain state; they look at recent
//! headers through [`ChainView`]. [`MemoryChain`] is the in-process
//! implementation used by tests and by nodes that keep hot headers in
//! memory in front of their database.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::header::{Block, BlockHeader};
use crate::types::{Address, Hash32};

/// Narrow, read-only view over recent headers.
pub trait ChainView: Send + Sync {
    /// Header at the given height on the canonical chain.
    fn header_by_number(&self, number: u64) -> Option<BlockHeader>;

    /// Header with the given identity hash at the given height.
    fn header(&self, hash: &Hash32, number: u64) -> Option<BlockHeader>;

    /// Full block with the given identity hash at the given height. Uncle
    /// verification needs the uncle lists of recent ancestors.
    fn block(&self, hash: &Hash32, number: u64) -> Option<Block>;
}

/// One row of the paginated capacity-block listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub coinbase: Address,
    /// Block identity hash.
    pub root: Hash32,
    pub number: u64,
    pub time: u64,
    pub tx_count: u64,
}

/// Source of block summaries for the inspection API.
pub trait BlockSummarySource: Send + Sync {
    fn head_number(&self) -> u64;
    fn summary_by_number(&self, number: u64) -> Option<BlockSummary>;
}

/// Paginated block listing, newest first. Page `0` holds the most recent
/// `count` blocks, page `1` the `count` before those, and so on down to
/// genesis.
pub fn poc_blocks(source: &dyn BlockSummarySource, page: u64, count: u64) -> Vec<BlockSummary> {
    if count == 0 {
        return Vec::new();
    }
    let head = source.head_number();
    let skip = page.saturating_mul(count);
    let mut out = Vec::with_capacity(count as usize);
    let mut number = match head.checked_sub(skip) {
        Some(n) => n,
        None => return out,
    };
    loop {
        if let Some(summary) = source.summary_by_number(number) {
            out.push(summary);
        }
        if out.len() as u64 == count || number == 0 {
            break;
        }
        number -= 1;
    }
    out
}

/// In-memory canonical chain of blocks, indexed by height and hash.
#[derive(Default)]
pub struct MemoryChain {
    inner: RwLock<MemoryChainInner>,
}

#[derive(Default)]
struct MemoryChainInner {
    blocks: Vec<Block>,
    by_hash: HashMap<Hash32, u64>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block at height `blocks.len()`. The caller is responsible
    /// for ordering; heights must be contiguous from zero.
    pub fn push(&self, block: Block) {
        let mut inner = self.inner.write();
        debug_assert_eq!(block.header.number, inner.blocks.len() as u64);
        inner.by_hash.insert(block.hash(), block.header.number);
        inner.blocks.push(block);
    }

    pub fn head(&self) -> Option<BlockHeader> {
        self.inner.read().blocks.last().map(|b| b.header.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().blocks.is_empty()
    }

    pub fn block_by_number(&self, number: u64) -> Option<Block> {
        self.inner.read().blocks.get(number as usize).cloned()
    }
}

impl ChainView for MemoryChain {
    fn header_by_number(&self, number: u64) -> Option<BlockHeader> {
        self.inner
            .read()
            .blocks
            .get(number as usize)
            .map(|b| b.header.clone())
    }

    fn header(&self, hash: &Hash32, number: u64) -> Option<BlockHeader> {
        self.block(hash, number).map(|b| b.header)
    }

    fn block(&self, hash: &Hash32, number: u64) -> Option<Block> {
        let inner = self.inner.read();
        let stored = *inner.by_hash.get(hash)?;
        if stored != number {
            return None;
        }
        inner.blocks.get(number as usize).cloned()
    }
}

impl BlockSummarySource for MemoryChain {
    fn head_number(&self) -> u64 {
        self.inner
            .read()
            .blocks
            .last()
            .map(|b| b.header.number)
            .unwrap_or(0)
    }

    fn summary_by_number(&self, number: u64) -> Option<BlockSummary> {
        let inner = self.inner.read();
        let block = inner.blocks.get(number as usize)?;
        Some(BlockSummary {
            coinbase: block.header.coinbase,
            root: block.hash(),
            number: block.header.number,
            time: block.header.time,
            tx_count: block.tx_count,
        })
    }
}
