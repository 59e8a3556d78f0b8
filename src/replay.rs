//! Replays a recorded JSON-lines touch trace against a simple viewport.
//!
//! Deferred tap decisions run on trace time rather than wall time, so a
//! replay is deterministic.

use anyhow::{Result, anyhow};
use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use touchview::{
    DeviceKind, GestureListener, Hooks, NotificationResult, Point, TouchController, ZoomDirection,
    config::Profile,
    tap::{Scheduler, Task},
    tracker::ticks_from_millis,
};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceEvent {
    Press {
        id: i64,
        x: f64,
        y: f64,
        t_ms: u64,
        #[serde(default)]
        device: DeviceKind,
    },
    Move {
        id: i64,
        x: f64,
        y: f64,
        t_ms: u64,
        #[serde(default = "in_contact")]
        contact: bool,
    },
    Release {
        id: i64,
        x: f64,
        y: f64,
        t_ms: u64,
        #[serde(default)]
        device: DeviceKind,
    },
}

fn in_contact() -> bool {
    true
}

impl TraceEvent {
    fn t_ms(&self) -> u64 {
        match self {
            TraceEvent::Press { t_ms, .. }
            | TraceEvent::Move { t_ms, .. }
            | TraceEvent::Release { t_ms, .. } => *t_ms,
        }
    }
}

pub fn parse_trace(txt: &str) -> Result<Vec<TraceEvent>> {
    let mut out = Vec::new();
    for (n, line) in txt.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ev: TraceEvent = serde_json::from_str(line)
            .map_err(|e| anyhow!("trace line {}: {e}", n + 1))?;
        if let Some(prev) = out.last().map(TraceEvent::t_ms)
            && ev.t_ms() < prev
        {
            return Err(anyhow!("trace line {}: timestamp goes backwards", n + 1));
        }
        out.push(ev);
    }
    Ok(out)
}

/// Timer queue driven by trace timestamps.
#[derive(Default)]
struct TraceClock {
    inner: Mutex<TraceQueue>,
}

#[derive(Default)]
struct TraceQueue {
    now_ms: u64,
    tasks: Vec<(u64, Task)>,
}

impl TraceClock {
    /// Advances to `t_ms`, running every task due by then.
    fn advance(&self, t_ms: u64) {
        let due: Vec<Task> = {
            let mut q = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            q.now_ms = q.now_ms.max(t_ms);
            let now = q.now_ms;
            let (due, later): (Vec<_>, Vec<_>) =
                std::mem::take(&mut q.tasks).into_iter().partition(|(at, _)| *at <= now);
            q.tasks = later;
            due.into_iter().map(|(_, task)| task).collect()
        };
        for task in due {
            task();
        }
    }

    fn drain(&self) {
        self.advance(u64::MAX);
    }
}

impl Scheduler for TraceClock {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut q = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let at = q.now_ms.saturating_add(delay.as_millis() as u64);
        q.tasks.push((at, task));
    }
}

/// Collects every notification as JSON.
#[derive(Default)]
struct GestureLog {
    entries: Mutex<Vec<Value>>,
}

impl GestureLog {
    fn push(&self, entry: Value) -> NotificationResult {
        debug!("gesture: {entry}");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        NotificationResult::UNHANDLED
    }

    fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl GestureListener for GestureLog {
    fn swiped(&self, vx: f64, vy: f64) -> NotificationResult {
        self.push(json!({"gesture": "swipe", "vx": vx, "vy": vy}))
    }

    fn flung(&self, vx: f64, vy: f64) -> NotificationResult {
        self.push(json!({"gesture": "fling", "vx": vx, "vy": vy}))
    }

    fn single_tapped(&self, p: Point) -> NotificationResult {
        self.push(json!({"gesture": "tap", "at": p}))
    }

    fn double_tapped(&self, p: Point, taps: u32) -> NotificationResult {
        self.push(json!({"gesture": "double_tap", "at": p, "taps": taps}))
    }

    fn long_tapped(&self, p: Point) -> NotificationResult {
        self.push(json!({"gesture": "long_tap", "at": p}))
    }

    fn zoom_requested(&self, direction: ZoomDirection, anchor: Point) -> NotificationResult {
        self.push(json!({"gesture": "zoom", "direction": direction, "at": anchor}))
    }
}

pub fn replay(profile: &Profile, events: &[TraceEvent]) -> Result<Value> {
    let clock = Arc::new(TraceClock::default());
    let log = Arc::new(GestureLog::default());
    let hooks = Hooks {
        listener: log.clone(),
        scheduler: clock.clone(),
        ..Hooks::default()
    };
    let (vp, map) = profile.viewport.build();
    let mut ctl = TouchController::with_hooks(profile.gesture_config(), vp, map, hooks);

    let mut handled = 0usize;
    for ev in events {
        clock.advance(ev.t_ms());
        let t = ticks_from_millis(ev.t_ms());
        let h = match *ev {
            TraceEvent::Press { id, x, y, device, .. } => {
                ctl.on_press(id, Point::new(x, y), t, device)?
            }
            TraceEvent::Move { id, x, y, contact, .. } => {
                ctl.on_move(id, Point::new(x, y), t, contact)?
            }
            TraceEvent::Release { id, x, y, device, .. } => {
                ctl.on_release(id, Point::new(x, y), t, device)?
            }
        };
        handled += usize::from(h);
    }
    clock.drain();
    ctl.apply_pending_zooms();

    Ok(json!({
        "events": events.len(),
        "handled": handled,
        "mode": ctl.mode(),
        "viewport": ctl.viewport(),
        "refreshes": ctl.map().refreshes,
        "gestures": log.take(),
    }))
}
