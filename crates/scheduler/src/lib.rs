//! Pagemark Scheduler Library
//!
//! Cooperative building blocks for page rasterization and export.
//!
//! This crate provides a deduplicating render queue ordered by priority with
//! FIFO ordering within each level, a processing gate that keeps rendering and
//! exporting from interleaving, and yield policies that decide where a long
//! loop hands control back to the event loop. Nothing here spawns threads;
//! the caller drives every loop.
//!
//! # Example
//!
//! ```
//! use pagemark_scheduler::{DrainAll, Flow, ProcessingGate, RenderQueue, WorkKind, YieldPolicy};
//!
//! let mut queue = RenderQueue::new();
//! queue.enqueue(2, false);
//! queue.enqueue(3, false);
//! queue.enqueue(1, true);
//!
//! let gate = ProcessingGate::new();
//! let _guard = gate.try_acquire(WorkKind::Rendering).expect("nothing else is running");
//!
//! let mut policy = DrainAll;
//! policy.begin_slice();
//! let mut order = Vec::new();
//! while let Some(task) = queue.pop() {
//!     order.push(task.page_number);
//!     if policy.after_unit() == Flow::Suspend {
//!         break;
//!     }
//! }
//!
//! assert_eq!(order, vec![1, 2, 3]);
//! ```

mod gate;
mod queue;
mod stats;
mod yielding;

pub use gate::{GateGuard, ProcessingGate, WorkKind};
pub use queue::{Enqueued, PageNumber, Priority, RenderQueue, RenderTask};
pub use stats::SchedulerStats;
pub use yielding::{DrainAll, EveryN, Flow, FrameBudget, YieldPolicy, FRAME_60HZ, INPUT_RESERVE};
