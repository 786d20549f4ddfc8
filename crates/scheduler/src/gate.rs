//! Processing gate for long-running work
//!
//! Rendering and exporting may each interleave with user input, but never
//! with each other. Whichever class of work acquires the gate first holds it
//! until its guard is dropped.

use std::fmt;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

const IDLE: u8 = 0;

/// Long-running work classes that contend for the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Rendering = 1,
    Exporting = 2,
}

impl WorkKind {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(WorkKind::Rendering),
            2 => Some(WorkKind::Exporting),
            _ => None,
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKind::Rendering => write!(f, "rendering"),
            WorkKind::Exporting => write!(f, "exporting"),
        }
    }
}

/// Shared `is_processing` flag
///
/// Clones observe the same state.
///
/// # Example
///
/// ```
/// use pagemark_scheduler::{ProcessingGate, WorkKind};
///
/// let gate = ProcessingGate::new();
/// let guard = gate.try_acquire(WorkKind::Exporting).expect("gate is idle");
///
/// assert!(gate.is_processing());
/// assert!(gate.try_acquire(WorkKind::Rendering).is_none());
///
/// drop(guard);
/// assert!(!gate.is_processing());
/// ```
#[derive(Clone, Default)]
pub struct ProcessingGate {
    state: Arc<AtomicU8>,
}

impl ProcessingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate for `kind`
    ///
    /// Returns `None` while any work, including work of the same kind, holds it.
    pub fn try_acquire(&self, kind: WorkKind) -> Option<GateGuard> {
        self.state
            .compare_exchange(IDLE, kind as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { state: Arc::clone(&self.state), kind })
    }

    pub fn is_processing(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// The work currently holding the gate
    pub fn active(&self) -> Option<WorkKind> {
        WorkKind::from_raw(self.state.load(Ordering::Acquire))
    }
}

impl fmt::Debug for ProcessingGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingGate").field("active", &self.active()).finish()
    }
}

/// Proof of gate ownership. Releases the gate on drop.
#[derive(Debug)]
pub struct GateGuard {
    state: Arc<AtomicU8>,
    kind: WorkKind,
}

impl GateGuard {
    pub fn kind(&self) -> WorkKind {
        self.kind
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}
