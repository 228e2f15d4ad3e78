//! Block reward finalization.

use num_bigint::BigUint;

use crate::header::BlockHeader;
use crate::types::Address;

/// Base unit of the block subsidy.
pub const BASE_BLOCK_REWARD: u64 = 1_000_000_000_000_000_000;

/// Sink for reward credits; implemented by the node's state database.
pub trait RewardLedger {
    fn add_balance(&mut self, addr: &Address, amount: &BigUint);
}

/// Credit the sealing account and any uncle authors.
///
/// The author receives 7.5 base rewards plus 1/32 of a base reward per
/// included uncle. Each uncle author receives
/// `(uncle.number + 8 - header.number) / 8` base rewards; an uncle too far
/// behind the header earns nothing.
pub fn apply_block_rewards(
    ledger: &mut dyn RewardLedger,
    header: &BlockHeader,
    uncles: &[BlockHeader],
) {
    let base = BigUint::from(BASE_BLOCK_REWARD);
    let mut reward = &base * 15u32 / 2u32;

    for uncle in uncles {
        if let Some(depth_factor) = (uncle.number + 8).checked_sub(header.number) {
            let r = BigUint::from(depth_factor) * &base / 8u32;
            ledger.add_balance(&uncle.coinbase, &r);
        }
        reward += &base / 32u32;
    }

    ledger.add_balance(&header.coinbase, &reward);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TestLedger {
        balances: HashMap<Address, BigUint>,
    }

    impl RewardLedger for TestLedger {
        fn add_balance(&mut self, addr: &Address, amount: &BigUint) {
            *self.balances.entry(*addr).or_default() += amount;
        }
    }

    fn header_at(number: u64, coinbase: Address) -> BlockHeader {
        BlockHeader {
            parent_hash: [0u8; 32],
            number,
            coinbase,
            time: 0,
            last_time: 0,
            gas_limit: 8_000_000,
            gas_used: 0,
            extra: Vec::new(),
            gen_sig: [0u8; 32],
            plot_id: 0,
            nonce: 0,
            base_target: BigUint::from(1u32),
            deadline: BigUint::from(0u32),
        }
    }

    #[test]
    fn plain_block_pays_seven_and_a_half() {
        let mut ledger = TestLedger::default();
        let header = header_at(10, [1u8; 20]);
        apply_block_rewards(&mut ledger, &header, &[]);

        let expected = BigUint::from(BASE_BLOCK_REWARD) * 15u32 / 2u32;
        assert_eq!(ledger.balances[&[1u8; 20]], expected);
    }

    #[test]
    fn uncles_pay_depth_scaled_rewards_and_inclusion_bonus() {
        let mut ledger = TestLedger::default();
        let header = header_at(10, [1u8; 20]);
        let uncle_a = header_at(9, [2u8; 20]); // depth 1: 7/8 of base
        let uncle_b = header_at(8, [3u8; 20]); // depth 2: 6/8 of base
        apply_block_rewards(&mut ledger, &header, &[uncle_a, uncle_b]);

        let base = BigUint::from(BASE_BLOCK_REWARD);
        assert_eq!(ledger.balances[&[2u8; 20]], &base * 7u32 / 8u32);
        assert_eq!(ledger.balances[&[3u8; 20]], &base * 6u32 / 8u32);

        let expected_author = &base * 15u32 / 2u32 + (&base / 32u32) * 2u32;
        assert_eq!(ledger.balances[&[1u8; 20]], expected_author);
    }

    #[test]
    fn distant_uncle_earns_nothing_but_still_pays_bonus() {
        let mut ledger = TestLedger::default();
        let header = header_at(100, [1u8; 20]);
        let stale = header_at(10, [2u8; 20]);
        apply_block_rewards(&mut ledger, &header, &[stale]);

        assert!(!ledger.balances.contains_key(&[2u8; 20]));
        let base = BigUint::from(BASE_BLOCK_REWARD);
        assert_eq!(
            ledger.balances[&[1u8; 20]],
            &base * 15u32 / 2u32 + &base / 32u32
        );
    }
}
