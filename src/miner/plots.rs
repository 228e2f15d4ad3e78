//! Plot file discovery and scoop reads.
//!
//! Plot files are named `"{plot_id}_{start_nonce}_{sing_count}"` and laid
//! out scoop-major: all `sing_count` 64-byte scoops for scoop index 0,
//! then all scoops for index 1, and so on. The miner therefore reads one
//! contiguous slab per file per block.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::poc::SCOOP_BYTES;

/// Parsed plot file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotFileName {
    pub plot_id: u64,
    pub start_nonce: u64,
    pub sing_count: u64,
}

/// Canonical file name for a plot segment.
pub fn plot_file_name(plot_id: u64, start_nonce: u64, sing_count: u64) -> String {
    format!("{}_{}_{}", plot_id, start_nonce, sing_count)
}

/// Parse a plot file name; anything that is not three decimal fields is
/// not a plot file and yields `None`.
pub fn parse_plot_file_name(name: &str) -> Option<PlotFileName> {
    let mut parts = name.split('_');
    let plot_id = parts.next()?.parse().ok()?;
    let start_nonce = parts.next()?.parse().ok()?;
    let sing_count = parts.next()?.parse().ok()?;
    if parts.next().is_some() || sing_count == 0 {
        return None;
    }
    Some(PlotFileName {
        plot_id,
        start_nonce,
        sing_count,
    })
}

/// Read the plot directory list: a text file of comma-separated paths.
/// Producers conventionally emit a trailing comma; empty tokens are
/// dropped so both forms parse.
pub fn read_plot_dirs(list_path: &Path) -> io::Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(list_path)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Read the scoop-major slab for one scoop index: `sing_count` consecutive
/// 64-byte scoops starting at `scoop_id * 64 * sing_count`.
pub fn read_scoop_slab(path: &Path, scoop_id: u32, sing_count: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let offset = scoop_id as u64 * SCOOP_BYTES as u64 * sing_count;
    file.seek(SeekFrom::Start(offset))?;
    let mut slab = vec![0u8; (SCOOP_BYTES as u64 * sing_count) as usize];
    file.read_exact(&mut slab)?;
    Ok(slab)
}
