//! Run reporting: console echo plus a persistent log file
//!
//! Every report line lands in `training.log` under the run's output
//! directory; the console copy can be silenced without losing the file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::{Error, Result};

pub struct ReportSink {
    console: bool,
    log: File,
}

impl ReportSink {
    /// Open `training.log` under `out_dir`, truncating any previous run's log
    pub fn open(out_dir: &Path, silent: bool) -> Result<Self> {
        let path = out_dir.join("training.log");
        let log = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| Error::StorageWrite { path, source })?;
        Ok(Self {
            console: !silent,
            log,
        })
    }

    /// Emit one line (or a multi-line block) to the console and the log
    pub fn line(&mut self, text: &str) -> Result<()> {
        if self.console {
            println!("{text}");
        }
        writeln!(self.log, "{text}")?;
        Ok(())
    }
}
