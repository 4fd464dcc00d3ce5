use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Millisecond clock, injectable so settle timing is testable
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    /// Still initializing; every change moves the baseline
    Seeding { last_change_ms: u64 },
    /// Baseline frozen, dirty tracking live
    Settled,
}

/// `Seeding -> (quiet for window) -> Settled`
#[derive(Debug, Clone)]
pub struct SettleDetector {
    state: SettleState,
    window_ms: u64,
}

impl SettleDetector {
    pub fn new(window: Duration, now_ms: u64) -> Self {
        Self {
            state: SettleState::Seeding {
                last_change_ms: now_ms,
            },
            window_ms: window.as_millis() as u64,
        }
    }

    pub fn state(&self) -> SettleState {
        self.state
    }

    /// Settled already, or quiet long enough to be
    pub fn is_settled_at(&self, now_ms: u64) -> bool {
        match self.state {
            SettleState::Settled => true,
            SettleState::Seeding { last_change_ms } => {
                now_ms.saturating_sub(last_change_ms) >= self.window_ms
            }
        }
    }

    /// Advance the machine; true exactly when this call froze the baseline
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if matches!(self.state, SettleState::Seeding { .. }) && self.is_settled_at(now_ms) {
            self.state = SettleState::Settled;
            tracing::debug!("document settled, baseline frozen");
            return true;
        }
        false
    }

    /// Record a change; true while seeding, meaning the baseline should be recaptured
    pub fn on_change(&mut self, now_ms: u64) -> bool {
        self.poll(now_ms);
        match &mut self.state {
            SettleState::Seeding { last_change_ms } => {
                *last_change_ms = now_ms;
                true
            }
            SettleState::Settled => false,
        }
    }

    /// Back to seeding, e.g. after hydrating another record
    pub fn reset(&mut self, now_ms: u64) {
        self.state = SettleState::Seeding {
            last_change_ms: now_ms,
        };
    }

    /// Skip the quiet window
    pub fn settle_now(&mut self) {
        self.state = SettleState::Settled;
    }
}
