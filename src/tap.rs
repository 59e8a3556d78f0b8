//! Single/double/long tap disambiguation with a deferred decision timer.
//!
//! A tap-like release arms a timer. A press that arrives before it fires
//! cancels it and bumps the tap count; otherwise the timer reports a single
//! tap (count 1) or a double tap (count > 1). The timer fires on another
//! thread, so the pending state lives behind one mutex and the firing task
//! only proceeds if its generation is still the armed one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::events::DeviceKind;
use crate::geometry::Point;
use crate::tracker::{ActiveTouch, Ticks, ticks_from_millis};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs a task once after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// One sleeping thread per armed timer. Cancelled timers wake up, find they
/// were superseded and exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            task();
        });
    }
}

/// Receives the deferred decisions. Returns the handled flag.
pub trait TapHandler: Send + Sync {
    fn single_tap(&self, position: Point) -> bool;
    fn double_tap(&self, position: Point, taps: u32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapTiming {
    /// Max hold for a mouse click to count as a tap.
    pub short_click_ms: u64,
    /// Max hold for a touch/pen tap.
    pub short_tap_ms: u64,
    pub long_tap_ms: u64,
    /// Zero disables double-tap grouping.
    pub defer_ms: u64,
}

impl Default for TapTiming {
    fn default() -> Self {
        Self {
            short_click_ms: 250,
            short_tap_ms: 500,
            long_tap_ms: 500,
            defer_ms: 200,
        }
    }
}

impl TapTiming {
    fn short_threshold(&self, device: DeviceKind) -> Ticks {
        match device {
            DeviceKind::Mouse => ticks_from_millis(self.short_click_ms),
            DeviceKind::Touch | DeviceKind::Pen => ticks_from_millis(self.short_tap_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Deferred decision scheduled.
    Armed,
    /// Held long enough without moving; caller fires long-tap now.
    LongTap,
    NotATap,
}

#[derive(Debug)]
struct PendingTap {
    tap_count: u32,
    armed: Option<u64>,
    generation: u64,
}

impl Default for PendingTap {
    fn default() -> Self {
        Self {
            tap_count: 1,
            armed: None,
            generation: 0,
        }
    }
}

fn lock(state: &Mutex<PendingTap>) -> MutexGuard<'_, PendingTap> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TapDisambiguator {
    state: Arc<Mutex<PendingTap>>,
    scheduler: Arc<dyn Scheduler>,
    handler: Arc<dyn TapHandler>,
}

impl std::fmt::Debug for TapDisambiguator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = lock(&self.state);
        f.debug_struct("TapDisambiguator")
            .field("tap_count", &st.tap_count)
            .field("armed", &st.armed.is_some())
            .finish()
    }
}

impl TapDisambiguator {
    pub fn new(scheduler: Arc<dyn Scheduler>, handler: Arc<dyn TapHandler>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PendingTap::default())),
            scheduler,
            handler,
        }
    }

    pub fn tap_count(&self) -> u32 {
        lock(&self.state).tap_count
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.state).armed.is_some()
    }

    /// Cancels a pending decision (counting it as an earlier tap) or starts
    /// a new sequence. Returns the tap count for this press.
    pub fn on_press(&self) -> u32 {
        let mut st = lock(&self.state);
        if st.armed.take().is_some() {
            st.tap_count += 1;
        } else {
            st.tap_count = 1;
        }
        st.tap_count
    }

    pub fn on_release(
        &self,
        touch: &ActiveTouch,
        released_at: Point,
        now: Ticks,
        device: DeviceKind,
        timing: &TapTiming,
    ) -> ReleaseOutcome {
        let stationary = touch.is_stationary() && released_at == touch.pressed.position;
        if !stationary {
            return ReleaseOutcome::NotATap;
        }
        let held = touch.held_ticks(now);
        if held < timing.short_threshold(device) {
            self.arm(released_at, Duration::from_millis(timing.defer_ms));
            ReleaseOutcome::Armed
        } else if held >= ticks_from_millis(timing.long_tap_ms) {
            ReleaseOutcome::LongTap
        } else {
            ReleaseOutcome::NotATap
        }
    }

    fn arm(&self, position: Point, delay: Duration) {
        let generation = {
            let mut st = lock(&self.state);
            st.generation += 1;
            st.armed = Some(st.generation);
            st.generation
        };
        debug!("tap timer armed ({} ms)", delay.as_millis());

        let state = Arc::clone(&self.state);
        let handler = Arc::clone(&self.handler);
        self.scheduler.schedule(
            delay,
            Box::new(move || fire(&state, handler.as_ref(), generation, position)),
        );
    }
}

fn fire(state: &Mutex<PendingTap>, handler: &dyn TapHandler, generation: u64, position: Point) {
    let taps = {
        let mut st = lock(state);
        if st.armed != Some(generation) {
            return;
        }
        st.armed = None;
        std::mem::replace(&mut st.tap_count, 1)
    };

    let handled = if taps > 1 {
        handler.double_tap(position, taps)
    } else {
        handler.single_tap(position)
    };
    debug!("tap decision: {taps} tap(s) at ({:.1}, {:.1}), handled={handled}", position.x, position.y);
}
