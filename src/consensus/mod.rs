//! Capacity-proof consensus engine.
//!
//! Validates headers and their capacity seals, recomputes the base target
//! from recent history, and drives the sealing path. The engine holds no
//! chain state of its own; everything it needs arrives through
//! [`ChainView`].

pub mod base_target;
pub mod error;
pub mod reward;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::Mutex;

use crate::chain::ChainView;
use crate::header::{Block, BlockHeader};
use crate::miner::Sealer;
use crate::poc;
use crate::types::{now_unix, Address, Hash32};

pub use base_target::{calc_base_target, INIT_BASE_TARGET, TARGET_BLOCK_SECS};
pub use error::ConsensusError;
pub use reward::{apply_block_rewards, RewardLedger, BASE_BLOCK_REWARD};

/// Maximum bytes of header extra-data.
pub const MAXIMUM_EXTRA_DATA_SIZE: usize = 32;
/// Gas limit may move at most `parent / 1024` per block.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;
/// Gas limit floor.
pub const MIN_GAS_LIMIT: u64 = 5000;
/// Gas limit ceiling (2^63 - 1).
pub const MAX_GAS_LIMIT: u64 = i64::MAX as u64;
/// Maximum number of uncles in one block.
pub const MAX_UNCLES: usize = 2;
/// Seal times may run at most this far ahead of the verifier's clock.
pub const ALLOWED_FUTURE_SECS: u64 = 15;

/// The stateless engine value. Cheap to copy into worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine;

/// Handle for cancelling an in-flight [`Engine::verify_headers`] batch.
pub struct VerifyAbort {
    flag: Arc<AtomicBool>,
}

impl VerifyAbort {
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine
    }

    /// The account credited for a block: always the header's coinbase.
    pub fn author(&self, header: &BlockHeader) -> Address {
        header.coinbase
    }

    /// Verify a single header against the chain, optionally including its
    /// capacity seal. Known headers short-circuit to success.
    pub fn verify_header(
        &self,
        chain: &dyn ChainView,
        header: &BlockHeader,
        seal: bool,
    ) -> Result<(), ConsensusError> {
        if chain.header(&header.hash(), header.number).is_some() {
            return Ok(());
        }
        let parent = header
            .number
            .checked_sub(1)
            .and_then(|n| chain.header(&header.parent_hash, n))
            .ok_or(ConsensusError::UnknownAncestor)?;
        self.verify_against_parent(header, &parent, false, seal)
    }

    /// Verify a batch of headers on a worker pool. Results are delivered on
    /// the returned channel in submission order, one per header, so callers
    /// can zip them back to their inputs.
    pub fn verify_headers(
        &self,
        chain: Arc<dyn ChainView>,
        headers: Vec<BlockHeader>,
        seals: Vec<bool>,
    ) -> (VerifyAbort, mpsc::Receiver<Result<(), ConsensusError>>) {
        let (results_tx, results_rx) = mpsc::channel();
        let flag = Arc::new(AtomicBool::new(false));
        let abort = VerifyAbort { flag: flag.clone() };
        if headers.is_empty() {
            return (abort, results_rx);
        }

        let total = headers.len();
        let workers = num_cpus::get().clamp(1, total);
        let engine = *self;
        let headers = Arc::new(headers);
        let seals = Arc::new(seals);
        let slots: Arc<Mutex<Vec<Option<Result<(), ConsensusError>>>>> =
            Arc::new(Mutex::new(vec![None; total]));

        let (input_tx, input_rx) = mpsc::channel::<usize>();
        let input_rx = Arc::new(Mutex::new(input_rx));
        let (done_tx, done_rx) = mpsc::channel::<usize>();

        for _ in 0..workers {
            let chain = Arc::clone(&chain);
            let headers = Arc::clone(&headers);
            let seals = Arc::clone(&seals);
            let slots = Arc::clone(&slots);
            let input_rx = Arc::clone(&input_rx);
            let done_tx = done_tx.clone();
            let flag = Arc::clone(&flag);
            thread::spawn(move || loop {
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                let next = input_rx.lock().recv();
                let Ok(index) = next else { return };
                let result = engine.verify_header_worker(&*chain, &headers, &seals, index);
                slots.lock()[index] = Some(result);
                if done_tx.send(index).is_err() {
                    return;
                }
            });
        }
        drop(done_tx);
        for index in 0..total {
            let _ = input_tx.send(index);
        }
        drop(input_tx);

        // Release results strictly in submission order as indices finish.
        thread::spawn(move || {
            let mut checked = vec![false; total];
            let mut out = 0usize;
            while out < total {
                let Ok(index) = done_rx.recv() else { return };
                checked[index] = true;
                while out < total && checked[out] {
                    let result = slots.lock()[out].take().expect("finished index has result");
                    if results_tx.send(result).is_err() {
                        return;
                    }
                    out += 1;
                }
                if flag.load(Ordering::SeqCst) {
                    return;
                }
            }
        });

        (abort, results_rx)
    }

    fn verify_header_worker(
        &self,
        chain: &dyn ChainView,
        headers: &[BlockHeader],
        seals: &[bool],
        index: usize,
    ) -> Result<(), ConsensusError> {
        let header = &headers[index];
        let parent = if index == 0 {
            header
                .number
                .checked_sub(1)
                .and_then(|n| chain.header(&header.parent_hash, n))
        } else if headers[index - 1].hash() == header.parent_hash {
            Some(headers[index - 1].clone())
        } else {
            None
        };
        let Some(parent) = parent else {
            return Err(ConsensusError::UnknownAncestor);
        };
        if chain.header(&header.hash(), header.number).is_some() {
            return Ok(());
        }
        self.verify_against_parent(header, &parent, false, seals[index])
    }

    fn verify_against_parent(
        &self,
        header: &BlockHeader,
        parent: &BlockHeader,
        uncle: bool,
        seal: bool,
    ) -> Result<(), ConsensusError> {
        if header.extra.len() > MAXIMUM_EXTRA_DATA_SIZE {
            return Err(ConsensusError::ExtraDataTooLong {
                have: header.extra.len(),
                max: MAXIMUM_EXTRA_DATA_SIZE,
            });
        }

        if !uncle && header.time > now_unix() {
            return Err(ConsensusError::FutureBlock);
        }
        if header.time <= parent.time {
            return Err(ConsensusError::ZeroBlockTime);
        }

        if header.gas_limit > MAX_GAS_LIMIT {
            return Err(ConsensusError::GasLimitTooHigh {
                have: header.gas_limit,
                max: MAX_GAS_LIMIT,
            });
        }
        if header.gas_used > header.gas_limit {
            return Err(ConsensusError::InvalidGasUsed {
                have: header.gas_used,
                limit: header.gas_limit,
            });
        }
        let bound = parent.gas_limit / GAS_LIMIT_BOUND_DIVISOR;
        let diff = header.gas_limit.abs_diff(parent.gas_limit);
        if diff >= bound || header.gas_limit < MIN_GAS_LIMIT {
            return Err(ConsensusError::InvalidGasLimit {
                have: header.gas_limit,
                parent: parent.gas_limit,
                bound,
            });
        }

        if header.number != parent.number.wrapping_add(1) {
            return Err(ConsensusError::InvalidNumber);
        }

        if seal {
            self.verify_seal(header)?;
        }
        Ok(())
    }

    /// Verify the capacity seal of a header.
    ///
    /// Recomputes the sealed nonce's scoop from scratch, derives its
    /// deadline under the header's base target, and checks that the
    /// deadline matches, has elapsed since the parent, and that the seal
    /// time is not running ahead of this node's clock.
    pub fn verify_seal(&self, header: &BlockHeader) -> Result<(), ConsensusError> {
        let addr_plot_id = poc::plot_id_of_address(&header.coinbase);
        if header.plot_id != addr_plot_id {
            return Err(ConsensusError::PlotIdMismatch);
        }
        if header.base_target.is_zero() {
            return Err(ConsensusError::InvalidBaseTarget);
        }

        let gen_hash = poc::gen_hash(&header.gen_sig, header.number);
        let scoop = poc::scoop_id(&gen_hash) as usize;

        let cell = poc::gen_cell_verify(header.nonce, header.plot_id);
        let offset = poc::SCOOP_BYTES * scoop;
        let scoop_1 = &cell[offset..offset + poc::HASH_SIZE];
        let scoop_2 = &cell[offset + poc::HASH_SIZE..offset + poc::SCOOP_BYTES];

        let target = poc::calc_target(scoop_1, scoop_2, &header.gen_sig);
        let deadline = poc::calc_deadline(&target, &header.base_target);
        if deadline != header.deadline {
            return Err(ConsensusError::DeadlineMismatch);
        }
        if &deadline + BigUint::from(header.last_time) >= BigUint::from(header.time) {
            return Err(ConsensusError::DeadlineNotSatisfied);
        }
        if header.time.saturating_sub(ALLOWED_FUTURE_SECS) > now_unix() {
            return Err(ConsensusError::TimeMismatch);
        }
        Ok(())
    }

    /// Verify a block's uncles: at most two, each unseen, recent, not an
    /// ancestor, and itself a validly sealed header against its parent.
    pub fn verify_uncles(&self, chain: &dyn ChainView, block: &Block) -> Result<(), ConsensusError> {
        if block.uncles.len() > MAX_UNCLES {
            return Err(ConsensusError::TooManyUncles);
        }

        let mut seen: HashSet<Hash32> = HashSet::new();
        let mut ancestors: HashMap<Hash32, BlockHeader> = HashMap::new();

        let mut parent_hash = block.header.parent_hash;
        let mut number = block.header.number.checked_sub(1);
        for _ in 0..7 {
            let Some(n) = number else { break };
            let Some(ancestor) = chain.block(&parent_hash, n) else {
                break;
            };
            for u in &ancestor.uncles {
                seen.insert(u.hash());
            }
            let ancestor_hash = ancestor.hash();
            parent_hash = ancestor.header.parent_hash;
            number = n.checked_sub(1);
            ancestors.insert(ancestor_hash, ancestor.header);
        }
        ancestors.insert(block.hash(), block.header.clone());
        seen.insert(block.hash());

        for uncle in &block.uncles {
            let hash = uncle.hash();
            if !seen.insert(hash) {
                return Err(ConsensusError::DuplicateUncle);
            }
            if ancestors.contains_key(&hash) {
                return Err(ConsensusError::UncleIsAncestor);
            }
            if !ancestors.contains_key(&uncle.parent_hash)
                || uncle.parent_hash == block.header.parent_hash
            {
                return Err(ConsensusError::DanglingUncle);
            }
            let uncle_parent = ancestors[&uncle.parent_hash].clone();
            self.verify_against_parent(uncle, &uncle_parent, true, true)?;
        }
        Ok(())
    }

    /// Seal a candidate block: derive the base target for its height, run
    /// the plot scan, and wait for either a sealed header or a stop signal.
    ///
    /// Returns `None` when stopped, or when the miner gives up without a
    /// candidate (no plots, no authorization, or an empty nonce window).
    pub fn seal(
        &self,
        chain: &dyn ChainView,
        header: &BlockHeader,
        sealer: &Sealer,
        stop: &mpsc::Receiver<()>,
    ) -> Option<BlockHeader> {
        let base_target = calc_base_target(chain, header.number);
        let abort = AtomicBool::new(false);
        let (found_tx, found_rx) = mpsc::channel();

        thread::scope(|scope| {
            {
                let base_target = &base_target;
                let abort = &abort;
                let found_tx = found_tx.clone();
                scope.spawn(move || sealer.mine(header, base_target, abort, &found_tx));
            }
            drop(found_tx);

            loop {
                match stop.try_recv() {
                    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                        abort.store(true, Ordering::SeqCst);
                        return None;
                    }
                    Err(mpsc::TryRecvError::Empty) => {}
                }
                match found_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(sealed) => {
                        abort.store(true, Ordering::SeqCst);
                        return Some(sealed);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    // Miner exited without emitting.
                    Err(mpsc::RecvTimeoutError::Disconnected) => return None,
                }
            }
        })
    }
}
