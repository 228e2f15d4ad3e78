//! The single-threaded plot writer.
//!
//! All open plot file descriptors live on this thread. Cell-generating
//! workers only assemble byte buffers and queue them; the bounded channel
//! between the two provides backpressure when the disk falls behind.
//! Offsets within a file are disjoint, so write order never matters.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use tracing::error;

/// One positioned write inside a plot file.
pub(crate) struct SectionWrite {
    pub offset: u64,
    pub data: Vec<u8>,
}

/// A batch of positioned writes for one file. `close` marks the file's
/// final batch; the writer drops the descriptor after applying it.
pub(crate) struct WriteBatch {
    pub path: PathBuf,
    pub writes: Vec<SectionWrite>,
    pub close: bool,
}

/// Drain the write queue until every producer has hung up.
pub(crate) fn run_writer(rx: Receiver<WriteBatch>) {
    let mut open: HashMap<PathBuf, File> = HashMap::new();

    for batch in rx {
        if !open.contains_key(&batch.path) {
            match OpenOptions::new().write(true).open(&batch.path) {
                Ok(file) => {
                    open.insert(batch.path.clone(), file);
                }
                Err(err) => {
                    error!(
                        target: "capacity_node::plotter",
                        file = %batch.path.display(),
                        %err,
                        "cannot open plot file for writing"
                    );
                    continue;
                }
            }
        }
        let file = open.get_mut(&batch.path).expect("just inserted");

        let mut failed = false;
        for write in &batch.writes {
            if let Err(err) = file
                .seek(SeekFrom::Start(write.offset))
                .and_then(|_| file.write_all(&write.data))
            {
                error!(
                    target: "capacity_node::plotter",
                    file = %batch.path.display(),
                    offset = write.offset,
                    %err,
                    "plot write failed"
                );
                failed = true;
                break;
            }
        }

        if batch.close || failed {
            open.remove(&batch.path);
        }
    }
}
