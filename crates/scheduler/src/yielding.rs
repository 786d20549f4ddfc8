//! Yield policies for cooperative work
//!
//! Long-running loops ask their policy after every unit of work (one page
//! render, one composited page) whether to keep going or hand control back
//! to the event loop. Production code uses a frame budget; tests drain
//! synchronously.

use std::time::{Duration, Instant};

/// One display refresh at 60 Hz
pub const FRAME_60HZ: Duration = Duration::from_micros(16_667);

/// Portion of each frame left for input and painting
pub const INPUT_RESERVE: Duration = Duration::from_millis(5);

/// Decision returned after each unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Suspend,
}

/// Decides where a cooperative loop hands control back to its caller
pub trait YieldPolicy {
    /// Called when a loop is (re)entered
    fn begin_slice(&mut self) {}

    /// Called after each completed unit of work
    fn after_unit(&mut self) -> Flow;
}

impl<P: YieldPolicy + ?Sized> YieldPolicy for &mut P {
    fn begin_slice(&mut self) {
        (**self).begin_slice();
    }

    fn after_unit(&mut self) -> Flow {
        (**self).after_unit()
    }
}

/// Never yields. Runs the loop to completion in one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainAll;

impl YieldPolicy for DrainAll {
    fn after_unit(&mut self) -> Flow {
        Flow::Continue
    }
}

/// Yields after every `n` units
#[derive(Debug, Clone)]
pub struct EveryN {
    n: u32,
    done: u32,
}

impl EveryN {
    /// A zero interval is treated as one
    pub fn new(n: u32) -> Self {
        Self { n: n.max(1), done: 0 }
    }

    /// Yield after each unit
    pub fn one() -> Self {
        Self::new(1)
    }
}

impl YieldPolicy for EveryN {
    fn begin_slice(&mut self) {
        self.done = 0;
    }

    fn after_unit(&mut self) -> Flow {
        self.done += 1;
        if self.done >= self.n {
            self.done = 0;
            Flow::Suspend
        } else {
            Flow::Continue
        }
    }
}

/// Time-boxed slices for work driven from a UI event loop
///
/// Each slice may run until `frame - reserve` has elapsed since
/// [`YieldPolicy::begin_slice`]. The reserve leaves the rest of the frame to
/// input handling and painting.
///
/// ```
/// use pagemark_scheduler::{Flow, FrameBudget, YieldPolicy};
/// use std::time::Duration;
///
/// let mut budget = FrameBudget::new(Duration::ZERO);
/// budget.begin_slice();
/// assert_eq!(budget.after_unit(), Flow::Suspend);
/// ```
#[derive(Debug, Clone)]
pub struct FrameBudget {
    frame: Duration,
    reserve: Duration,
    deadline: Instant,
    units: u32,
}

impl FrameBudget {
    /// The reserve is clamped to the frame length
    pub fn new(frame: Duration) -> Self {
        let mut budget = Self {
            frame,
            reserve: INPUT_RESERVE.min(frame),
            deadline: Instant::now(),
            units: 0,
        };
        budget.begin_slice();
        budget
    }

    pub fn with_reserve(mut self, reserve: Duration) -> Self {
        self.reserve = reserve.min(self.frame);
        self.begin_slice();
        self
    }

    /// Units completed in the current slice
    pub fn units(&self) -> u32 {
        self.units
    }

    pub fn time_left(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_spent(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::new(FRAME_60HZ)
    }
}

impl YieldPolicy for FrameBudget {
    fn begin_slice(&mut self) {
        self.deadline = Instant::now() + (self.frame - self.reserve);
        self.units = 0;
    }

    fn after_unit(&mut self) -> Flow {
        self.units += 1;
        if self.is_spent() {
            Flow::Suspend
        } else {
            Flow::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_all_never_suspends() {
        let mut policy = DrainAll;
        policy.begin_slice();
        assert!((0..1000).all(|_| policy.after_unit() == Flow::Continue));
    }

    #[test]
    fn test_every_n_suspends_on_interval() {
        let mut policy = EveryN::new(3);
        policy.begin_slice();

        let flows: Vec<_> = (0..6).map(|_| policy.after_unit()).collect();
        assert_eq!(
            flows,
            vec![
                Flow::Continue,
                Flow::Continue,
                Flow::Suspend,
                Flow::Continue,
                Flow::Continue,
                Flow::Suspend,
            ]
        );
    }

    #[test]
    fn test_every_n_resets_on_new_slice() {
        let mut policy = EveryN::new(2);
        policy.begin_slice();
        assert_eq!(policy.after_unit(), Flow::Continue);

        policy.begin_slice();
        assert_eq!(policy.after_unit(), Flow::Continue);
        assert_eq!(policy.after_unit(), Flow::Suspend);
    }

    #[test]
    fn test_every_zero_behaves_like_one() {
        let mut policy = EveryN::new(0);
        assert_eq!(policy.after_unit(), Flow::Suspend);
        assert_eq!(policy.after_unit(), Flow::Suspend);
    }

    #[test]
    fn test_frame_budget_generous_budget_continues() {
        let mut budget = FrameBudget::new(Duration::from_secs(60));
        budget.begin_slice();

        assert_eq!(budget.after_unit(), Flow::Continue);
        assert_eq!(budget.after_unit(), Flow::Continue);
        assert_eq!(budget.units(), 2);
        assert!(budget.time_left() > Duration::from_secs(50));

        budget.begin_slice();
        assert_eq!(budget.units(), 0);
    }

    #[test]
    fn test_frame_budget_exhausted_suspends() {
        let mut budget = FrameBudget::new(Duration::from_millis(1)).with_reserve(Duration::ZERO);
        budget.begin_slice();
        std::thread::sleep(Duration::from_millis(3));

        assert!(budget.is_spent());
        assert_eq!(budget.time_left(), Duration::ZERO);
        assert_eq!(budget.after_unit(), Flow::Suspend);
    }

    #[test]
    fn test_reserve_never_exceeds_frame() {
        let mut budget = FrameBudget::new(Duration::from_millis(2)).with_reserve(Duration::from_secs(1));
        budget.begin_slice();
        assert_eq!(budget.after_unit(), Flow::Suspend);
    }

    #[test]
    fn test_policy_through_mutable_reference() {
        let mut inner = EveryN::one();
        let policy: &mut dyn YieldPolicy = &mut inner;
        assert_eq!(policy.after_unit(), Flow::Suspend);
    }
}
