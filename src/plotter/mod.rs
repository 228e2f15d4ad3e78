//! Plot file generation.
//!
//! Precomputes every cell in a nonce range and persists it scoop-major so
//! the miner can later read one contiguous slab per block. Cell generation
//! fans out across CPU workers; all disk writes funnel through a single
//! writer thread fed over a bounded channel.

pub mod progress;
mod writer;

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender};
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::miner::plots::plot_file_name;
use crate::poc::{self, CELL_BYTES, CELL_HASHES, SCOOPS_PER_CELL, SCOOP_BYTES};
use crate::util::size::{parse_base2_size, SizeParseError};

pub use progress::ProgressReport;
use writer::{SectionWrite, WriteBatch};

/// Bytes of one precomputed cell.
pub const CELL_SIZE: u64 = CELL_BYTES as u64;
/// Nonces generated and queued per batch.
pub const NONCE_BATCH: u64 = 400;
/// Default first nonce of a new plot.
pub const DEFAULT_START_NONCE: u64 = 314159;
/// Bound on the write queue; producers block when the disk falls behind.
const WRITE_QUEUE_CAPACITY: usize = 100;
/// Zero-fill chunk used while preallocating files.
const PREALLOC_CHUNK: usize = 20 << 20;

fn default_start_nonce() -> u64 {
    DEFAULT_START_NONCE
}

/// Operator-facing plotter configuration, as parsed from flags or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotterConfig {
    /// Directory receiving the plot files. Must exist and be writable.
    pub data_path: PathBuf,

    /// Per-file size, IEC base-2 (`"1GB"`); truncated to whole cells.
    pub sing_size: String,

    /// Total bytes to plot; truncated to whole files.
    pub size: String,

    #[serde(default = "default_start_nonce")]
    pub start_nonce: u64,

    /// Plot identifier that owns every nonce written.
    pub plot_id: u64,

    /// Worker thread override; defaults to two per logical core.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl PlotterConfig {
    /// Load a plotter config from a JSON file, writing defaults for a new
    /// deployment if the file is missing.
    pub fn load_or_create<P: AsRef<Path>>(path: P, defaults: Self) -> Result<Self, String> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read plotter config: {}", e))?;
            serde_json::from_str(&content)
                .map_err(|e| format!("Failed to parse plotter config: {}", e))
        } else {
            defaults.save(path)?;
            Ok(defaults)
        }
    }

    /// Save the config to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize plotter config: {}", e))?;
        std::fs::write(path, content).map_err(|e| format!("Failed to write plotter config: {}", e))
    }
}

#[derive(Debug, Error)]
pub enum PlotterError {
    #[error("invalid size: {0}")]
    Size(#[from] SizeParseError),

    #[error("singSize {0} bytes is smaller than one 262144-byte cell")]
    SingSizeTooSmall(u64),

    #[error("total size {size} bytes holds no complete file of {sing_size} bytes")]
    TotalTooSmall { size: u64, sing_size: u64 },
}

/// Fully normalized plot geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotParams {
    pub data_path: PathBuf,
    pub plot_id: u64,
    pub start_nonce: u64,
    /// Nonces per file.
    pub sing_count: u64,
    /// Effective per-file byte size: `sing_count × 256 KiB`.
    pub file_size: u64,
    /// Number of files.
    pub count: u64,
    pub workers: usize,
}

impl PlotParams {
    /// Normalize a configuration: `sing_count = singSize / cell`,
    /// `count = size / singSize`, all integer truncations.
    pub fn resolve(cfg: &PlotterConfig) -> Result<Self, PlotterError> {
        let sing_size = parse_base2_size(&cfg.sing_size)?;
        let total = parse_base2_size(&cfg.size)?;

        let sing_count = sing_size / CELL_SIZE;
        if sing_count == 0 {
            return Err(PlotterError::SingSizeTooSmall(sing_size));
        }
        let count = total / sing_size;
        if count == 0 {
            return Err(PlotterError::TotalTooSmall {
                size: total,
                sing_size,
            });
        }

        let workers = cfg
            .workers
            .filter(|w| *w > 0)
            .unwrap_or_else(|| 2 * num_cpus::get());

        Ok(Self {
            data_path: cfg.data_path.clone(),
            plot_id: cfg.plot_id,
            start_nonce: cfg.start_nonce,
            sing_count,
            file_size: sing_count * CELL_SIZE,
            count,
            workers,
        })
    }

    /// First nonce of file `index`.
    pub fn file_start_nonce(&self, index: u64) -> u64 {
        self.start_nonce + index * self.sing_count
    }

    pub fn file_name(&self, index: u64) -> String {
        plot_file_name(self.plot_id, self.file_start_nonce(index), self.sing_count)
    }
}

/// Run a full plot job. Blocks until every file has been generated and the
/// writer has drained its queue. `on_progress` receives one report per
/// file; failed files report `code = -1` and abort only their own worker.
pub fn run(params: &PlotParams, on_progress: &(dyn Fn(&ProgressReport) + Sync)) {
    info!(
        target: "capacity_node::plotter",
        plot_id = params.plot_id,
        start_nonce = params.start_nonce,
        files = params.count,
        nonces_per_file = params.sing_count,
        workers = params.workers,
        "plotting"
    );

    let (tx, rx) = mpsc::sync_channel::<WriteBatch>(WRITE_QUEUE_CAPACITY);
    thread::scope(|scope| {
        scope.spawn(move || writer::run_writer(rx));
        for worker in 0..params.workers {
            let tx = tx.clone();
            scope.spawn(move || plot_worker(params, worker, tx, on_progress));
        }
        drop(tx);
        // Workers and writer join at scope exit; the writer leaves once
        // every producer has hung up and the queue is drained.
    });
}

/// Produce every file whose index lands on this worker.
fn plot_worker(
    params: &PlotParams,
    worker: usize,
    tx: SyncSender<WriteBatch>,
    on_progress: &(dyn Fn(&ProgressReport) + Sync),
) {
    for index in 0..params.count {
        if index as usize % params.workers != worker {
            continue;
        }
        let name = params.file_name(index);
        let path = params.data_path.join(&name);
        if let Err(err) = preallocate(&path, params.file_size) {
            on_progress(&ProgressReport::failed(&err, index, params.count, &name));
            return;
        }
        if !stream_file(params, index, &path, &tx) {
            return;
        }
        on_progress(&ProgressReport::ok(index, params.count, &name));
    }
}

/// Create a file and zero-fill it to its final size, 20 MiB at a time.
fn preallocate(path: &Path, size: u64) -> io::Result<()> {
    let mut file = File::create(path)?;
    let zeros = vec![0u8; PREALLOC_CHUNK.min(size as usize)];
    let mut remaining = size;
    while remaining > 0 {
        let chunk = remaining.min(zeros.len() as u64) as usize;
        file.write_all(&zeros[..chunk])?;
        remaining -= chunk as u64;
    }
    Ok(())
}

/// Generate one file's cells in batches and queue their scoop-major
/// sections. Returns `false` when the writer is gone and the worker
/// should stop.
fn stream_file(params: &PlotParams, index: u64, path: &Path, tx: &SyncSender<WriteBatch>) -> bool {
    let file_start = params.file_start_nonce(index);
    let full_batches = params.sing_count / NONCE_BATCH;
    let batches = if params.sing_count % NONCE_BATCH == 0 {
        full_batches
    } else {
        full_batches + 1
    };

    for batch in 0..batches {
        let batch_start = batch * NONCE_BATCH;
        let batch_len = NONCE_BATCH.min(params.sing_count - batch_start);

        let cells: Vec<Vec<u8>> = (0..batch_len)
            .map(|q| poc::gen_cell(file_start + batch_start + q, params.plot_id))
            .collect();

        // Interleave: scoop k of nonce q pairs slot 2k with slot
        // 8192-(2k+1), matching the verifier's cell permutation.
        let mut writes = Vec::with_capacity(SCOOPS_PER_CELL);
        for k in 0..SCOOPS_PER_CELL {
            let mut data = vec![0u8; SCOOP_BYTES * batch_len as usize];
            for (q, cell) in cells.iter().enumerate() {
                let dst = q * SCOOP_BYTES;
                data[dst..dst + 32].copy_from_slice(&cell[32 * (2 * k)..32 * (2 * k) + 32]);
                let second_slot = CELL_HASHES - (2 * k + 1);
                data[dst + 32..dst + 64]
                    .copy_from_slice(&cell[second_slot * 32..(second_slot + 1) * 32]);
            }
            let offset =
                SCOOP_BYTES as u64 * params.sing_count * k as u64 + SCOOP_BYTES as u64 * batch_start;
            writes.push(SectionWrite { offset, data });
        }

        let close = batch == batches - 1;
        if tx
            .send(WriteBatch {
                path: path.to_path_buf(),
                writes,
                close,
            })
            .is_err()
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn config(data_path: &Path, sing_size: &str, size: &str) -> PlotterConfig {
        PlotterConfig {
            data_path: data_path.to_path_buf(),
            sing_size: sing_size.to_string(),
            size: size.to_string(),
            start_nonce: 100,
            plot_id: 4242,
            workers: Some(2),
        }
    }

    #[test]
    fn normalization_matches_plot_geometry() {
        let cfg = config(Path::new("/tmp"), "1GB", "4GB");
        let params = PlotParams::resolve(&cfg).unwrap();
        assert_eq!(params.sing_count, 4096);
        assert_eq!(params.count, 4);
        assert_eq!(params.file_size, 1_073_741_824);
        assert_eq!(params.file_start_nonce(0), 100);
        assert_eq!(params.file_start_nonce(3), 100 + 3 * 4096);
        assert_eq!(params.file_name(0), "4242_100_4096");
    }

    #[test]
    fn truncation_drops_partial_cells_and_files() {
        // 300 KiB truncates to one cell per file; 1 MiB of 300 KiB files
        // truncates to three files.
        let cfg = config(Path::new("/tmp"), "300KB", "1MB");
        let params = PlotParams::resolve(&cfg).unwrap();
        assert_eq!(params.sing_count, 1);
        assert_eq!(params.file_size, CELL_SIZE);
        assert_eq!(params.count, 3);
    }

    #[test]
    fn degenerate_sizes_are_rejected() {
        let too_small = config(Path::new("/tmp"), "100KB", "1GB");
        assert!(matches!(
            PlotParams::resolve(&too_small),
            Err(PlotterError::SingSizeTooSmall(_))
        ));

        let no_files = config(Path::new("/tmp"), "1GB", "512MB");
        assert!(matches!(
            PlotParams::resolve(&no_files),
            Err(PlotterError::TotalTooSmall { .. })
        ));

        let junk = config(Path::new("/tmp"), "fast", "1GB");
        assert!(matches!(PlotParams::resolve(&junk), Err(PlotterError::Size(_))));
    }

    #[test]
    fn writes_expected_files_and_reports_each() {
        let dir = tempfile::tempdir().unwrap();
        // Two files of two nonces each.
        let cfg = PlotterConfig {
            data_path: dir.path().to_path_buf(),
            sing_size: "512KB".to_string(),
            size: "1MB".to_string(),
            start_nonce: 7,
            plot_id: 11,
            workers: Some(2),
        };
        let params = PlotParams::resolve(&cfg).unwrap();
        assert_eq!((params.sing_count, params.count), (2, 2));

        let reports = Mutex::new(Vec::new());
        run(&params, &|r: &ProgressReport| reports.lock().push(r.clone()));

        let mut reports = reports.into_inner();
        reports.sort_by_key(|r| r.current);
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.code == 0));
        assert_eq!(reports[0].name, "11_7_2");
        assert_eq!(reports[1].name, "11_9_2");

        for (name, start) in [("11_7_2", 7u64), ("11_9_2", 9u64)] {
            let bytes = std::fs::read(dir.path().join(name)).unwrap();
            assert_eq!(bytes.len() as u64, params.file_size);

            // Spot-check scoop 5 of each nonce against the cell definition.
            for j in 0..2u64 {
                let cell = poc::gen_cell(start + j, 11);
                let k = 5usize;
                let off = SCOOP_BYTES * params.sing_count as usize * k
                    + SCOOP_BYTES * j as usize;
                assert_eq!(
                    &bytes[off..off + 32],
                    &cell[32 * (2 * k)..32 * (2 * k) + 32]
                );
                let second_slot = CELL_HASHES - (2 * k + 1);
                assert_eq!(
                    &bytes[off + 32..off + 64],
                    &cell[second_slot * 32..(second_slot + 1) * 32]
                );
            }
        }
    }

    #[test]
    fn config_roundtrips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plotter.json");
        let defaults = config(Path::new("/data/plots"), "1GB", "4GB");

        // First call writes the defaults.
        let loaded = PlotterConfig::load_or_create(&path, defaults.clone()).unwrap();
        assert_eq!(loaded.start_nonce, defaults.start_nonce);
        assert!(path.exists());

        // Defaulted fields may be omitted on disk.
        std::fs::write(
            &path,
            r#"{"data_path":"/data/plots","sing_size":"1GB","size":"4GB","plot_id":9}"#,
        )
        .unwrap();
        let sparse = PlotterConfig::load_or_create(&path, defaults).unwrap();
        assert_eq!(sparse.start_nonce, DEFAULT_START_NONCE);
        assert_eq!(sparse.plot_id, 9);
        assert_eq!(sparse.workers, None);
    }

    #[test]
    fn missing_data_path_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("does-not-exist");
        let cfg = PlotterConfig {
            data_path: gone,
            sing_size: "256KB".to_string(),
            size: "256KB".to_string(),
            start_nonce: 0,
            plot_id: 1,
            workers: Some(1),
        };
        let params = PlotParams::resolve(&cfg).unwrap();

        let reports = Mutex::new(Vec::new());
        run(&params, &|r: &ProgressReport| reports.lock().push(r.clone()));

        let reports = reports.into_inner();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].code, -1);
        assert!(!reports[0].msg.is_empty());
    }
}
