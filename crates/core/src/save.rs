//! Host save channel

use std::io;

/// Result of handing output to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written; `location` is whatever the host uses to identify it
    Saved { location: String },
    /// The user dismissed the save dialog. Not an error.
    Cancelled,
}

/// Destination for exported documents
///
/// A desktop host would show a save dialog; the CLI writes to a file.
pub trait SaveChannel {
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> io::Result<SaveOutcome>;

    /// Called with `(done, total)` pages while an export runs
    fn progress(&mut self, _done: usize, _total: usize) {}
}

/// Keeps saved output in memory
#[derive(Debug, Default)]
pub struct MemorySaveChannel {
    pub saved: Vec<(String, Vec<u8>)>,
    /// When set, every save is reported as cancelled
    pub cancel: bool,
    pub progress: Vec<(usize, usize)>,
}

impl SaveChannel for MemorySaveChannel {
    fn save(&mut self, bytes: &[u8], suggested_name: &str) -> io::Result<SaveOutcome> {
        if self.cancel {
            return Ok(SaveOutcome::Cancelled);
        }
        self.saved.push((suggested_name.to_string(), bytes.to_vec()));
        Ok(SaveOutcome::Saved { location: suggested_name.to_string() })
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.progress.push((done, total));
    }
}
