//! Base-target difficulty controller.
//!
//! The base target plays the role difficulty plays under proof-of-work,
//! inverted: a larger base target shortens deadlines and speeds the chain
//! up. Each block's base target is derived from the mean base target and
//! mean deadline of the previous four blocks, steering toward the
//! 60-second block time, with per-step movement clamped to ±10% of the
//! recent mean so one outlier deadline cannot swing difficulty.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::chain::ChainView;

/// Base target for the first blocks, before enough history exists.
pub const INIT_BASE_TARGET: u64 = 5_000_000_000_000_000;

/// Target seconds between blocks.
pub const TARGET_BLOCK_SECS: u64 = 60;

/// Number of trailing blocks averaged by the controller.
const HISTORY_BLOCKS: u64 = 4;

/// Compute the base target for the block at `number`.
///
/// Blocks up to and including height 5 use [`INIT_BASE_TARGET`]. The
/// controller also falls back to the initial value when history is
/// missing or degenerate (all-zero base targets), so it always returns a
/// usable nonzero target.
pub fn calc_base_target(chain: &dyn ChainView, number: u64) -> BigUint {
    let init = BigUint::from(INIT_BASE_TARGET);
    if number <= 5 {
        return init;
    }

    let mut target_sum = BigUint::zero();
    let mut deadline_sum = BigUint::zero();
    for i in (number - HISTORY_BLOCKS)..number {
        let Some(header) = chain.header_by_number(i) else {
            tracing::warn!(
                target: "capacity_node::consensus",
                height = i,
                "base-target history missing, using initial target"
            );
            return init;
        };
        target_sum += header.base_target;
        deadline_sum += header.deadline;
    }

    let mean_target = target_sum / HISTORY_BLOCKS;
    let mean_deadline = deadline_sum / HISTORY_BLOCKS;
    if mean_target.is_zero() {
        return init;
    }

    let mut candidate = &mean_target * &mean_deadline / TARGET_BLOCK_SECS;

    let floor = &mean_target * 9u32 / 10u32;
    let ceiling = &mean_target * 11u32 / 10u32;
    if candidate < floor {
        candidate = floor;
    } else if candidate > ceiling {
        candidate = ceiling;
    }
    candidate
}
