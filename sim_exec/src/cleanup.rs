//! # Cleanup
//!
//! Everything that has to be undone when the launcher exits, however it
//! exits: temporary files are removed and stray simulator processes killed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

use crate::process;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The cleanup list, actioned when dropped.
#[derive(Debug)]
pub struct Cleanup {
    /// Process names to kill on exit
    victims: Vec<String>,

    /// Whether processes should be killed at all
    kill_on_exit: bool,

    /// Files to delete on exit, removed when dropped
    temp_files: Vec<NamedTempFile>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Cleanup {
    /// Create a cleanup list which kills the given process names on exit.
    pub fn new(victims: Vec<String>) -> Self {
        Self {
            victims,
            kill_on_exit: true,
            temp_files: Vec::new(),
        }
    }

    /// Create a cleanup list which only removes files.
    pub fn files_only() -> Self {
        Self {
            victims: Vec::new(),
            kill_on_exit: false,
            temp_files: Vec::new(),
        }
    }

    /// Kill stray processes now, for example left over from a previous run.
    pub fn kill_now(&self) {
        info!("Killing stray simulator processes");
        process::kill_tasks(&self.victims);
    }

    /// Keep the file until the launcher exits.
    pub fn keep_until_exit(&mut self, file: NamedTempFile) {
        debug!("Will remove {:?} on exit", file.path());
        self.temp_files.push(file);
    }

    /// The number of files awaiting removal.
    pub fn num_temp_files(&self) -> usize {
        self.temp_files.len()
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if self.kill_on_exit {
            process::kill_tasks(&self.victims);
        }

        // NamedTempFile removes itself on drop
        self.temp_files.clear();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Catch Ctrl-C so that the launcher outlives the ground station it is
/// waiting on, and the cleanup still runs.
///
/// The returned flag is set once an interrupt has been received.
pub fn catch_interrupts() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();

    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    Ok(interrupted)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
