//! Plotter round-trip: bytes on disk must equal the verifier's view.
//!
//! The verifier never reads plot files; it regenerates a cell in permuted
//! order and slices the scoop out. Consensus therefore depends on the
//! plotter's interleaved layout agreeing byte-for-byte with that
//! permutation, for every nonce and every scoop index.

use std::fs;

use capacity_node::miner::plots::{plot_file_name, read_scoop_slab};
use capacity_node::plotter::{self, PlotParams, PlotterConfig, ProgressReport};
use capacity_node::poc;
use parking_lot::Mutex;

const PLOT_ID: u64 = 123_456_789;
const START_NONCE: u64 = 5_000;

#[test]
fn plotted_scoops_match_verifier_cells() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PlotterConfig {
        data_path: dir.path().to_path_buf(),
        sing_size: "768KB".to_string(),
        size: "1536KB".to_string(),
        start_nonce: START_NONCE,
        plot_id: PLOT_ID,
        workers: Some(2),
    };
    let params = PlotParams::resolve(&cfg).unwrap();
    assert_eq!((params.sing_count, params.count), (3, 2));

    let reports = Mutex::new(Vec::new());
    plotter::run(&params, &|r: &ProgressReport| reports.lock().push(r.clone()));

    let reports = reports.into_inner();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.code == 0));

    for file_index in 0..params.count {
        let start = START_NONCE + file_index * params.sing_count;
        let path = dir.path().join(plot_file_name(PLOT_ID, start, params.sing_count));
        assert_eq!(
            fs::metadata(&path).unwrap().len(),
            params.sing_count * poc::CELL_BYTES as u64,
            "file size must be exactly sing_count × 256 KiB"
        );

        let verify_cells: Vec<Vec<u8>> = (0..params.sing_count)
            .map(|j| poc::gen_cell_verify(start + j, PLOT_ID))
            .collect();

        for scoop in [0u32, 1, 2, 1021, 2048, 4094, 4095] {
            let slab = read_scoop_slab(&path, scoop, params.sing_count).unwrap();
            for (j, cell) in verify_cells.iter().enumerate() {
                let got = &slab[j * poc::SCOOP_BYTES..(j + 1) * poc::SCOOP_BYTES];
                let want =
                    &cell[scoop as usize * poc::SCOOP_BYTES..(scoop as usize + 1) * poc::SCOOP_BYTES];
                assert_eq!(
                    got, want,
                    "file {} nonce {} scoop {}",
                    file_index,
                    start + j as u64,
                    scoop
                );
            }
        }
    }
}

#[test]
fn rerunning_overwrites_partial_files() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PlotterConfig {
        data_path: dir.path().to_path_buf(),
        sing_size: "256KB".to_string(),
        size: "256KB".to_string(),
        start_nonce: 42,
        plot_id: 7,
        workers: Some(1),
    };
    let params = PlotParams::resolve(&cfg).unwrap();
    let name = params.file_name(0);

    // A stale partial file from an interrupted run.
    fs::write(dir.path().join(&name), b"partial").unwrap();

    plotter::run(&params, &|_: &ProgressReport| {});

    // With a single nonce per file, the whole file is exactly the
    // verifier-ordered cell.
    let bytes = fs::read(dir.path().join(&name)).unwrap();
    assert_eq!(bytes, poc::gen_cell_verify(42, 7));
}
