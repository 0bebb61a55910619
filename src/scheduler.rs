// ABOUTME: Debounced regeneration scheduler for the markdownreveal application
// ABOUTME: Coalesces bursts of change events into one regeneration per quiet period

use log::{debug, error};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default quiet period: long enough to swallow the several events an
/// editor emits for one save, short enough to feel instant.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No pending timer
    Idle,
    /// A timer is waiting for the quiet period to elapse
    Armed,
    /// The job is running
    Running,
    /// The scheduler was stopped; no further jobs run
    Stopped,
}

/// What happened to a change event handed to [`RegenerationScheduler::trigger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new timer was armed
    Armed,
    /// The pending timer was cancelled and a new one armed
    Rearmed,
    /// The event was ignored (job in flight, or scheduler stopped)
    Dropped,
}

struct Slot {
    generation: u64,
    state: TimerState,
}

struct Inner {
    period: Duration,
    job: Box<dyn Fn() + Send + Sync>,
    slot: Mutex<Slot>,
}

/// Single-slot debounce timer owning one pending regeneration job.
///
/// Each timer is a short-lived thread; a timer whose generation is no
/// longer current when it wakes has been cancelled and exits quietly.
#[derive(Clone)]
pub struct RegenerationScheduler {
    inner: Arc<Inner>,
}

impl RegenerationScheduler {
    pub fn new<F>(period: Duration, job: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                period,
                job: Box::new(job),
                slot: Mutex::new(Slot {
                    generation: 0,
                    state: TimerState::Idle,
                }),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn state(&self) -> TimerState {
        self.inner.slot.lock().state
    }

    /// Handle one change event
    pub fn trigger(&self) -> Trigger {
        let mut slot = self.inner.slot.lock();
        let outcome = match slot.state {
            TimerState::Running | TimerState::Stopped => return Trigger::Dropped,
            TimerState::Armed => Trigger::Rearmed,
            TimerState::Idle => Trigger::Armed,
        };
        slot.generation += 1;
        slot.state = TimerState::Armed;
        let generation = slot.generation;
        drop(slot);

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("regenerate-timer".to_string())
            .spawn(move || Self::fire(inner, generation));
        if let Err(e) = spawned {
            error!("Failed to start regeneration timer: {}", e);
            let mut slot = self.inner.slot.lock();
            if slot.generation == generation && slot.state == TimerState::Armed {
                slot.state = TimerState::Idle;
            }
            return Trigger::Dropped;
        }
        debug!("Regeneration timer {} armed ({:?})", generation, outcome);
        outcome
    }

    fn fire(inner: Arc<Inner>, generation: u64) {
        thread::sleep(inner.period);
        {
            let mut slot = inner.slot.lock();
            if slot.generation != generation || slot.state != TimerState::Armed {
                return;
            }
            slot.state = TimerState::Running;
        }

        // A panicking job must not leave the slot Running forever
        if panic::catch_unwind(AssertUnwindSafe(|| (inner.job)())).is_err() {
            error!("Regeneration job {} panicked", generation);
        }

        let mut slot = inner.slot.lock();
        if slot.state == TimerState::Running {
            slot.state = TimerState::Idle;
        }
    }

    /// Cancel any pending timer and ignore all later events.
    /// A job already running finishes normally.
    pub fn stop(&self) {
        let mut slot = self.inner.slot.lock();
        slot.generation += 1;
        slot.state = TimerState::Stopped;
    }
}
