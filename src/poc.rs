//! Proof-of-capacity primitives.
//!
//! Everything consensus-critical about the capacity proof lives here: plot
//! identifier derivation, generation signatures, scoop selection, cell
//! generation and the target/deadline computation. All functions are pure,
//! all multi-byte integer encodings are big-endian, and Shabal-256 is the
//! only digest used.

use num_bigint::BigUint;
use shabal::{Digest, Shabal256};

use crate::types::{Address, Hash32};

/// Size of one Shabal-256 digest.
pub const HASH_SIZE: usize = 32;
/// Number of 32-byte hashes in one cell.
pub const CELL_HASHES: usize = 8192;
/// Number of 64-byte scoops in one cell.
pub const SCOOPS_PER_CELL: usize = 4096;
/// One fully generated cell: 8192 × 32 bytes.
pub const CELL_BYTES: usize = CELL_HASHES * HASH_SIZE;
/// One scoop: two 32-byte halves.
pub const SCOOP_BYTES: usize = 64;

/// Derive the plot identifier owned by an account address.
///
/// The identifier is the big-endian interpretation of the address bytes
/// `[12..20]`, so it is stable for a given account.
pub fn plot_id_of_address(addr: &Address) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&addr[12..20]);
    u64::from_be_bytes(raw)
}

/// Generation signature of a block, chained from its parent:
/// `Shabal256(prev_gen_sig || BE64(prev_plot_id))`.
pub fn gen_signature(prev_gen_sig: &Hash32, prev_plot_id: u64) -> Hash32 {
    let mut hasher = Shabal256::new();
    hasher.update(prev_gen_sig);
    hasher.update(prev_plot_id.to_be_bytes());
    hasher.finalize().into()
}

/// Per-height generation hash: `Shabal256(gen_sig || BE64(number))`.
pub fn gen_hash(gen_sig: &Hash32, number: u64) -> Hash32 {
    let mut hasher = Shabal256::new();
    hasher.update(gen_sig);
    hasher.update(number.to_be_bytes());
    hasher.finalize().into()
}

/// Select the scoop every miner must read for this block.
///
/// Widens both tail bytes of the generation hash before combining them, so
/// the full `[0, 4096)` range is reachable. The final modulus keeps the
/// result in range no matter how the operands are promoted.
pub fn scoop_id(gen_hash: &Hash32) -> u32 {
    let raw = ((gen_hash[30] as u32) << 8) | gen_hash[31] as u32;
    raw % SCOOPS_PER_CELL as u32
}

/// Per-nonce mining target: `Shabal256(scoop_1 || scoop_2 || gen_sig)`.
pub fn calc_target(scoop_1: &[u8], scoop_2: &[u8], gen_sig: &Hash32) -> Hash32 {
    let mut hasher = Shabal256::new();
    hasher.update(scoop_1);
    hasher.update(scoop_2);
    hasher.update(gen_sig);
    hasher.finalize().into()
}

/// Deadline in seconds for a target: the low eight bytes of the target,
/// interpreted big-endian, divided by the base target.
///
/// `base_target` must be nonzero; callers validating untrusted headers
/// reject a zero base target before computing deadlines.
pub fn calc_deadline(target: &Hash32, base_target: &BigUint) -> BigUint {
    BigUint::from_bytes_be(&target[24..]) / base_target
}

fn cell_seed(nonce: u64, plot_id: u64) -> [u8; 16] {
    let mut seed = [0u8; 16];
    seed[..8].copy_from_slice(&plot_id.to_be_bytes());
    seed[8..].copy_from_slice(&nonce.to_be_bytes());
    seed
}

/// Generate the 256 KiB cell for one nonce, in plot-file slot order.
///
/// Slots are filled from the top down. Each slot hashes a window of the 128
/// slots above it; near the top, where fewer than 128 slots exist, the seed
/// is appended instead. A final whole-cell hash is XORed into every slot so
/// no byte of the cell can be produced without the complete computation.
pub fn gen_cell(nonce: u64, plot_id: u64) -> Vec<u8> {
    let seed = cell_seed(nonce, plot_id);
    let mut cell = vec![0u8; CELL_BYTES];
    let mut hasher = Shabal256::new();

    for i in (0..CELL_HASHES).rev() {
        if i == CELL_HASHES - 1 {
            hasher.update(seed);
        } else if i < CELL_HASHES - 128 {
            hasher.update(&cell[(i + 1) * HASH_SIZE..(i + 1 + 128) * HASH_SIZE]);
        } else {
            hasher.update(&cell[(i + 1) * HASH_SIZE..]);
            hasher.update(seed);
        }
        let digest: [u8; HASH_SIZE] = hasher.finalize_reset().into();
        cell[i * HASH_SIZE..(i + 1) * HASH_SIZE].copy_from_slice(&digest);
    }

    hasher.update(&cell);
    hasher.update(seed);
    let fin: [u8; HASH_SIZE] = hasher.finalize_reset().into();
    for chunk in cell.chunks_exact_mut(HASH_SIZE) {
        for (b, f) in chunk.iter_mut().zip(fin.iter()) {
            *b ^= f;
        }
    }
    cell
}

/// Generate a cell in verifier order: slots are permuted so that scoop `k`
/// sits at byte offset `64·k`, matching how the plotter interleaves the two
/// halves on disk.
///
/// Even output slots take input slot `i`, odd output slots take input slot
/// `8192 - i`; over `i ∈ [0, 8192)` every odd index lands in `[1, 8191]`,
/// so the mapping is a total permutation of the cell.
pub fn gen_cell_verify(nonce: u64, plot_id: u64) -> Vec<u8> {
    let cell = gen_cell(nonce, plot_id);
    let mut out = vec![0u8; CELL_BYTES];
    for i in 0..CELL_HASHES {
        let src = if i % 2 == 0 { i } else { CELL_HASHES - i };
        out[i * HASH_SIZE..(i + 1) * HASH_SIZE]
            .copy_from_slice(&cell[src * HASH_SIZE..(src + 1) * HASH_SIZE]);
    }
    out
}
