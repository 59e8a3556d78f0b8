//! Release-time velocity estimation for fling/swipe classification.

use std::collections::{HashMap, VecDeque};

use crate::fingers::Slot;
use crate::geometry::Point;
use crate::tracker::{TICKS_PER_SECOND, Ticks, ticks_from_millis};

/// Samples kept per slot.
const HISTORY_SIZE: usize = 20;

/// Only samples this recent count towards the estimate.
pub const DEFAULT_WINDOW_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
struct Sample {
    position: Point,
    ticks: Ticks,
}

#[derive(Debug)]
pub struct VelocityTracker {
    history: HashMap<Slot, VecDeque<Sample>>,
    window: Ticks,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl VelocityTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            history: HashMap::new(),
            window: ticks_from_millis(window_ms.max(1)),
        }
    }

    pub fn set_window_ms(&mut self, window_ms: u64) {
        self.window = ticks_from_millis(window_ms.max(1));
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        self.history.remove(&slot);
    }

    pub fn add_sample(&mut self, slot: Slot, position: Point, ticks: Ticks) {
        let h = self.history.entry(slot).or_default();
        if h.len() == HISTORY_SIZE {
            h.pop_front();
        }
        h.push_back(Sample { position, ticks });
    }

    /// Velocity in position units per second from the oldest and newest
    /// samples inside the window ending at `now`. Zero with <2 samples.
    pub fn velocity_at(&self, slot: Slot, now: Ticks) -> (f64, f64) {
        let Some(h) = self.history.get(&slot) else {
            return (0.0, 0.0);
        };
        let mut recent = h.iter().filter(|s| now - s.ticks <= self.window);
        let Some(first) = recent.next() else {
            return (0.0, 0.0);
        };
        let Some(last) = recent.last() else {
            return (0.0, 0.0);
        };
        let dt = last.ticks - first.ticks;
        if dt <= 0 {
            return (0.0, 0.0);
        }
        let secs = dt as f64 / TICKS_PER_SECOND as f64;
        (
            (last.position.x - first.position.x) / secs,
            (last.position.y - first.position.y) / secs,
        )
    }
}
