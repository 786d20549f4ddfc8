//! Render scheduler statistics

/// Counters accumulated over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks newly inserted into the queue
    pub enqueued: u64,

    /// Queued tasks upgraded to high priority
    pub promoted: u64,

    /// Pages rasterized successfully
    pub completed: u64,

    /// Rasterization failures
    pub failed: u64,

    /// Tasks dropped because the page was already ready or unknown
    pub skipped: u64,
}

impl SchedulerStats {
    /// Tasks that were inserted and have not run yet
    pub fn pending(&self) -> u64 {
        self.enqueued.saturating_sub(self.completed + self.failed + self.skipped)
    }
}
