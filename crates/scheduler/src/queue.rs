//! Page render queue
//!
//! Holds at most one task per page. Tasks are ordered by priority, and within
//! the same priority level by the order they were (re)inserted.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// 1-based page number, stable for the lifetime of a document
pub type PageNumber = u32;

/// Render task priority
///
/// Higher values are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Prefetch and background work
    #[default]
    Normal = 0,

    /// The page the user is looking at
    High = 1,
}

impl From<bool> for Priority {
    fn from(priority: bool) -> Self {
        if priority {
            Priority::High
        } else {
            Priority::Normal
        }
    }
}

/// A queued request to rasterize one page
#[derive(Debug, Clone)]
pub struct RenderTask {
    pub page_number: PageNumber,
    pub priority: Priority,

    /// Insertion order (used for FIFO within same priority)
    sequence: u64,
}

impl RenderTask {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialEq for RenderTask {
    fn eq(&self, other: &Self) -> bool {
        self.page_number == other.page_number
    }
}

impl Eq for RenderTask {}

impl PartialOrd for RenderTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RenderTask {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so the earlier sequence must compare greater
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other => other,
        }
    }
}

/// Outcome of [`RenderQueue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// No task existed for the page; a new one was queued
    Inserted,

    /// A normal-priority task was upgraded to high priority
    Promoted,

    /// A task with equal or higher priority was already queued
    AlreadyQueued,
}

/// Deduplicating priority queue of render tasks
///
/// Re-enqueuing a page that is already queued never creates a second task.
/// It can only raise the priority of the existing one, in which case the task
/// moves behind any other high-priority tasks already waiting.
///
/// # Example
///
/// ```
/// use pagemark_scheduler::{Enqueued, Priority, RenderQueue};
///
/// let mut queue = RenderQueue::new();
/// queue.enqueue(1, Priority::Normal);
/// queue.enqueue(2, Priority::Normal);
///
/// assert_eq!(queue.enqueue(2, Priority::High), Enqueued::Promoted);
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.pop().map(|task| task.page_number), Some(2));
/// ```
#[derive(Debug, Default)]
pub struct RenderQueue {
    heap: BinaryHeap<RenderTask>,
    next_sequence: u64,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task for `page_number` or promote the existing one
    pub fn enqueue(&mut self, page_number: PageNumber, priority: impl Into<Priority>) -> Enqueued {
        let priority = priority.into();

        let existing = self
            .heap
            .iter()
            .find(|task| task.page_number == page_number)
            .map(|task| task.priority);

        match existing {
            Some(current) if current >= priority => Enqueued::AlreadyQueued,
            Some(_) => {
                self.heap.retain(|task| task.page_number != page_number);
                self.push(page_number, priority);
                log::debug!("promoted render task for page {page_number} to {priority:?}");
                Enqueued::Promoted
            }
            None => {
                self.push(page_number, priority);
                Enqueued::Inserted
            }
        }
    }

    fn push(&mut self, page_number: PageNumber, priority: Priority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(RenderTask { page_number, priority, sequence });
    }

    /// Remove and return the next task to run
    pub fn pop(&mut self) -> Option<RenderTask> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&RenderTask> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, page_number: PageNumber) -> bool {
        self.heap.iter().any(|task| task.page_number == page_number)
    }

    /// Drop the queued task for a page, returning whether one existed
    pub fn remove(&mut self, page_number: PageNumber) -> bool {
        let before = self.heap.len();
        self.heap.retain(|task| task.page_number != page_number);
        before != self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Queued tasks in execution order
    pub fn tasks(&self) -> Vec<RenderTask> {
        let mut tasks: Vec<RenderTask> = self.heap.iter().cloned().collect();
        tasks.sort_by(|a, b| b.cmp(a));
        tasks
    }
}
