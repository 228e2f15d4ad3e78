//! Structured progress reporting for the plotter.
//!
//! One JSON line per finished (or failed) file, consumed by wrapper UIs
//! driving the CLI.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// `0` on success, `-1` on failure.
    pub code: i32,
    pub msg: String,
    /// Index of the file this report is about.
    pub current: u64,
    /// Total number of files in the plot run.
    pub total: u64,
    /// File name the report refers to.
    pub name: String,
}

impl ProgressReport {
    pub fn ok(current: u64, total: u64, name: &str) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            current,
            total,
            name: name.to_string(),
        }
    }

    pub fn failed(err: &dyn Display, current: u64, total: u64, name: &str) -> Self {
        Self {
            code: -1,
            msg: err.to_string(),
            current,
            total,
            name: name.to_string(),
        }
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).expect("progress report is always serializable")
    }
}
