//! The seal scan: find the best stored nonce and wait out its deadline.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::header::BlockHeader;
use crate::miner::plots::{parse_plot_file_name, read_plot_dirs, read_scoop_slab};
use crate::miner::registry::NonceRegistry;
use crate::poc;
use crate::types::now_unix;

/// The best nonce seen so far during a scan.
struct Candidate {
    deadline: BigUint,
    plot_id: u64,
    nonce: u64,
}

impl Candidate {
    fn elapsed(&self, last_time: u64, now: u64) -> bool {
        &self.deadline + BigUint::from(last_time) < BigUint::from(now)
    }
}

/// Scans plot files for one candidate block at a time.
///
/// The plot directory list and the authorization registry are injected so
/// callers (and tests) control exactly which files the scan may touch.
pub struct Sealer {
    plot_list: PathBuf,
    registry: Arc<NonceRegistry>,
}

impl Sealer {
    pub fn new(plot_list: PathBuf, registry: Arc<NonceRegistry>) -> Self {
        Self {
            plot_list,
            registry,
        }
    }

    /// Scan every authorized stored nonce at this block's scoop, tracking
    /// the minimum deadline. As soon as the tracked minimum has elapsed
    /// (measured from the parent's seal time) the sealed header is sent on
    /// `found`; if the scan ends first, a 1 Hz wait loop takes over.
    ///
    /// Returns without emitting when aborted, when the node is not
    /// authorized for the coinbase's plot id, or when no eligible nonce
    /// exists at all.
    pub fn mine(
        &self,
        header: &BlockHeader,
        base_target: &BigUint,
        abort: &AtomicBool,
        found: &Sender<BlockHeader>,
    ) {
        let addr_plot_id = poc::plot_id_of_address(&header.coinbase);
        let Some(window) = self.registry.window(addr_plot_id) else {
            warn!(
                target: "capacity_node::miner",
                plot_id = addr_plot_id,
                "no authorized nonce window for plot id, skipping candidate"
            );
            return;
        };

        let scoop = poc::scoop_id(&poc::gen_hash(&header.gen_sig, header.number));
        let dirs = match read_plot_dirs(&self.plot_list) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(
                    target: "capacity_node::miner",
                    list = %self.plot_list.display(),
                    %err,
                    "cannot read plot directory list"
                );
                return;
            }
        };

        info!(
            target: "capacity_node::miner",
            number = header.number,
            scoop,
            plot_id = addr_plot_id,
            dirs = dirs.len(),
            "scanning plots"
        );

        let mut best: Option<Candidate> = None;
        for dir in &dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        target: "capacity_node::miner",
                        dir = %dir.display(),
                        %err,
                        "cannot read plot directory"
                    );
                    return;
                }
            };
            for entry in entries.flatten() {
                if abort.load(Ordering::SeqCst) {
                    info!(target: "capacity_node::miner", "nonce search aborted");
                    return;
                }
                let name = entry.file_name();
                let Some(plot) = parse_plot_file_name(&name.to_string_lossy()) else {
                    continue;
                };
                if plot.plot_id != addr_plot_id {
                    debug!(
                        target: "capacity_node::miner",
                        file_plot_id = plot.plot_id,
                        plot_id = addr_plot_id,
                        "skipping foreign plot file"
                    );
                    continue;
                }
                let slab = match read_scoop_slab(&entry.path(), scoop, plot.sing_count) {
                    Ok(slab) => slab,
                    Err(err) => {
                        warn!(
                            target: "capacity_node::miner",
                            file = %entry.path().display(),
                            %err,
                            "cannot read scoop slab, skipping file"
                        );
                        continue;
                    }
                };

                for j in 0..plot.sing_count {
                    if abort.load(Ordering::SeqCst) {
                        info!(target: "capacity_node::miner", "nonce search aborted");
                        return;
                    }
                    let nonce = plot.start_nonce.wrapping_add(j);
                    if !window.contains(nonce) {
                        continue;
                    }

                    let off = j as usize * poc::SCOOP_BYTES;
                    let target = poc::calc_target(
                        &slab[off..off + poc::HASH_SIZE],
                        &slab[off + poc::HASH_SIZE..off + poc::SCOOP_BYTES],
                        &header.gen_sig,
                    );
                    let deadline = poc::calc_deadline(&target, base_target);
                    if best.as_ref().map_or(true, |b| deadline < b.deadline) {
                        best = Some(Candidate {
                            deadline,
                            plot_id: plot.plot_id,
                            nonce,
                        });
                    }
                    if let Some(candidate) = &best {
                        if candidate.elapsed(header.last_time, now_unix()) {
                            self.emit(header, base_target, candidate, found);
                            return;
                        }
                    }
                }
            }
        }

        let Some(best) = best else {
            warn!(
                target: "capacity_node::miner",
                plot_id = addr_plot_id,
                "no eligible nonce in authorized window, not sealing"
            );
            return;
        };

        info!(
            target: "capacity_node::miner",
            nonce = best.nonce,
            deadline = %best.deadline,
            "scan complete, waiting for deadline"
        );
        loop {
            if abort.load(Ordering::SeqCst) {
                info!(target: "capacity_node::miner", "nonce search aborted");
                return;
            }
            if best.elapsed(header.last_time, now_unix()) {
                self.emit(header, base_target, &best, found);
                return;
            }
            thread::sleep(Duration::from_secs(1));
        }
    }

    fn emit(
        &self,
        header: &BlockHeader,
        base_target: &BigUint,
        candidate: &Candidate,
        found: &Sender<BlockHeader>,
    ) {
        let mut sealed = header.clone();
        sealed.nonce = candidate.nonce;
        sealed.plot_id = candidate.plot_id;
        sealed.time = now_unix();
        sealed.base_target = base_target.clone();
        sealed.deadline = candidate.deadline.clone();

        // A dropped receiver means the candidate was aborted under us;
        // either outcome is fine.
        match found.send(sealed) {
            Ok(()) => info!(
                target: "capacity_node::miner",
                nonce = candidate.nonce,
                deadline = %candidate.deadline,
                "nonce found and reported"
            ),
            Err(_) => info!(
                target: "capacity_node::miner",
                nonce = candidate.nonce,
                "nonce found but discarded"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::plots::plot_file_name;
    use crate::miner::registry::NonceWindow;
    use num_bigint::BigUint;
    use num_traits::One;
    use std::io::Write;
    use std::sync::mpsc;

    /// Write a plot file by hand in scoop-major order, straight from the
    /// cell definition, so the sealer is checked against first principles
    /// rather than against the plotter.
    fn write_plot_file(dir: &std::path::Path, plot_id: u64, start_nonce: u64, sing_count: u64) {
        let cells: Vec<Vec<u8>> = (0..sing_count)
            .map(|j| poc::gen_cell(start_nonce + j, plot_id))
            .collect();
        let path = dir.join(plot_file_name(plot_id, start_nonce, sing_count));
        let mut file = fs::File::create(path).unwrap();
        for k in 0..poc::SCOOPS_PER_CELL {
            for cell in &cells {
                let first = &cell[32 * (2 * k)..32 * (2 * k) + 32];
                let second_slot = poc::CELL_HASHES - (2 * k + 1);
                let second = &cell[second_slot * 32..(second_slot + 1) * 32];
                file.write_all(first).unwrap();
                file.write_all(second).unwrap();
            }
        }
    }

    fn setup(
        window: Option<NonceWindow>,
    ) -> (tempfile::TempDir, Sealer, BlockHeader, Arc<NonceRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let plots_dir = dir.path().join("plots");
        fs::create_dir(&plots_dir).unwrap();

        let mut coinbase = [0u8; 20];
        coinbase[12..].copy_from_slice(&9000u64.to_be_bytes());
        let plot_id = poc::plot_id_of_address(&coinbase);
        write_plot_file(&plots_dir, plot_id, 100, 2);

        let list = dir.path().join("PLOT");
        fs::write(&list, format!("{},", plots_dir.display())).unwrap();

        let registry = Arc::new(NonceRegistry::new());
        if let Some(w) = window {
            registry.authorize(plot_id, w);
        }
        let sealer = Sealer::new(list, Arc::clone(&registry));

        let header = BlockHeader {
            parent_hash: [0u8; 32],
            number: 3,
            coinbase,
            time: 0,
            last_time: now_unix() - 60,
            gas_limit: 8_000_000,
            gas_used: 0,
            extra: Vec::new(),
            gen_sig: [7u8; 32],
            plot_id: 0,
            nonce: 0,
            base_target: BigUint::one(),
            deadline: BigUint::one(),
        };
        (dir, sealer, header, registry)
    }

    /// Base target of 2^64 forces every deadline to zero, so the scan
    /// emits on the first authorized nonce it touches.
    fn instant_base_target() -> BigUint {
        BigUint::one() << 64
    }

    #[test]
    fn emits_first_authorized_nonce_when_deadline_elapsed() {
        let (_tmp, sealer, header, _) = setup(Some(NonceWindow {
            min_nonce: 0,
            max_nonce: u64::MAX,
        }));
        let (tx, rx) = mpsc::channel();
        sealer.mine(&header, &instant_base_target(), &AtomicBool::new(false), &tx);

        let sealed = rx.try_recv().expect("a seal was emitted");
        assert_eq!(sealed.nonce, 100);
        assert_eq!(sealed.plot_id, poc::plot_id_of_address(&header.coinbase));
        assert_eq!(sealed.base_target, instant_base_target());
        assert_eq!(sealed.deadline, BigUint::from(0u32));
        assert_eq!(sealed.gen_sig, header.gen_sig);
        assert!(sealed.time >= header.last_time);
    }

    #[test]
    fn window_filters_out_unauthorized_nonces() {
        let (_tmp, sealer, header, _) = setup(Some(NonceWindow {
            min_nonce: 101,
            max_nonce: 101,
        }));
        let (tx, rx) = mpsc::channel();
        sealer.mine(&header, &instant_base_target(), &AtomicBool::new(false), &tx);
        assert_eq!(rx.try_recv().expect("a seal was emitted").nonce, 101);
    }

    #[test]
    fn refuses_to_seal_without_any_candidate() {
        // Window does not overlap the stored nonces [100, 101].
        let (_tmp, sealer, header, _) = setup(Some(NonceWindow {
            min_nonce: 5,
            max_nonce: 6,
        }));
        let (tx, rx) = mpsc::channel();
        sealer.mine(&header, &instant_base_target(), &AtomicBool::new(false), &tx);
        drop(tx);
        assert!(rx.try_recv().is_err(), "no seal may be emitted");
    }

    #[test]
    fn unknown_plot_id_skips_candidate() {
        let (_tmp, sealer, header, _) = setup(None);
        let (tx, rx) = mpsc::channel();
        sealer.mine(&header, &instant_base_target(), &AtomicBool::new(false), &tx);
        drop(tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn abort_stops_the_scan_without_emitting() {
        let (_tmp, sealer, header, _) = setup(Some(NonceWindow {
            min_nonce: 0,
            max_nonce: u64::MAX,
        }));
        let (tx, rx) = mpsc::channel();
        let abort = AtomicBool::new(true);
        sealer.mine(&header, &instant_base_target(), &abort, &tx);
        drop(tx);
        assert!(rx.try_recv().is_err());
    }
}
