//! Active touch set: the fingers currently down, in press order.

use std::time::Instant;

use crate::fingers::Slot;
use crate::geometry::Point;

/// Timestamps are 100ns ticks.
pub type Ticks = i64;

pub const TICKS_PER_SECOND: Ticks = 10_000_000;
pub const TICKS_PER_MS: Ticks = 10_000;

pub fn ticks_from_millis(ms: u64) -> Ticks {
    ms as Ticks * TICKS_PER_MS
}

/// Monotonic tick source for live input.
#[derive(Debug, Clone)]
pub struct TickClock {
    start_instant: Instant,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            start_instant: Instant::now(),
        }
    }

    pub fn now(&self) -> Ticks {
        (self.start_instant.elapsed().as_nanos() / 100) as Ticks
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    pub slot: Slot,
    pub position: Point,
    pub ticks: Ticks,
}

impl TouchSample {
    pub fn new(slot: Slot, position: Point, ticks: Ticks) -> Self {
        Self {
            slot,
            position,
            ticks,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveTouch {
    pub pressed: TouchSample,
    pub current: TouchSample,
}

impl ActiveTouch {
    /// True while the finger is still where it went down.
    pub fn is_stationary(&self) -> bool {
        self.current.position == self.pressed.position
    }

    pub fn held_ticks(&self, now: Ticks) -> Ticks {
        now - self.pressed.ticks
    }
}

/// Fingers currently down. Iteration follows press order, which the pinch
/// math depends on.
#[derive(Debug, Default)]
pub struct ActiveTouchSet {
    touches: Vec<ActiveTouch>,
}

impl ActiveTouchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.touches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touches.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Option<&ActiveTouch> {
        self.touches.iter().find(|t| t.current.slot == slot)
    }

    /// Inserts a pressed finger. A repeated press for a slot that is already
    /// down restarts it in place.
    pub fn press(&mut self, sample: TouchSample) {
        let touch = ActiveTouch {
            pressed: sample,
            current: sample,
        };
        match self.touches.iter_mut().find(|t| t.current.slot == sample.slot) {
            Some(existing) => *existing = touch,
            None => self.touches.push(touch),
        }
    }

    /// Replaces the latest sample. Returns false for slots that are not down.
    pub fn update(&mut self, sample: TouchSample) -> bool {
        match self.touches.iter_mut().find(|t| t.current.slot == sample.slot) {
            Some(t) => {
                t.current = sample;
                true
            }
            None => false,
        }
    }

    pub fn release(&mut self, slot: Slot) -> Option<ActiveTouch> {
        let idx = self.touches.iter().position(|t| t.current.slot == slot)?;
        Some(self.touches.remove(idx))
    }

    pub fn positions(&self) -> Vec<Point> {
        self.touches.iter().map(|t| t.current.position).collect()
    }
}
