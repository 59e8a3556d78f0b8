//! Multitouch device discovery and protocol-B decoding (evdev 0.13).

use evdev::{AbsoluteAxisCode, Device, EventType, SynchronizationCode};
use log::debug;
use touchview::{Point, fingers::MAX_SLOTS};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

pub fn discover_multitouch() -> Vec<DeviceInfo> {
    let mut out = vec![];
    if let Ok(rd) = std::fs::read_dir("/dev/input") {
        for e in rd.flatten() {
            let p = e.path();
            let is_event_node = p
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("event"));
            if !is_event_node {
                continue;
            }
            if let Ok(dev) = Device::open(&p) {
                let has_abs = dev.supported_events().contains(EventType::ABSOLUTE);
                let has_mt = dev.supported_absolute_axes().is_some_and(|a| {
                    a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
                        && a.contains(AbsoluteAxisCode::ABS_MT_TRACKING_ID)
                        && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                        && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
                });
                if has_abs && has_mt {
                    out.push(DeviceInfo {
                        path: p.display().to_string(),
                        name: dev.name().unwrap_or("unknown").to_string(),
                    });
                }
            }
        }
    }
    out
}

/// One pointer transition, keyed by the kernel tracking id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Press { id: i32, position: Point },
    Move { id: i32, position: Point },
    Release { id: i32, position: Point },
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    tracking_id: Option<i32>,
    x: i32,
    y: i32,
    // set during a frame, consumed at SYN_REPORT
    began: bool,
    ended: Option<i32>,
    moved: bool,
}

impl SlotState {
    fn position(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Accumulates per-slot changes and turns each SYN_REPORT frame into
/// press/move/release events. Positions stay in raw device units.
#[derive(Debug)]
pub struct MtDecoder {
    slots: Vec<SlotState>,
    // None while the device addresses a slot beyond what we track
    cur_slot: Option<usize>,
}

impl Default for MtDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MtDecoder {
    pub fn new() -> Self {
        Self {
            slots: vec![SlotState::default(); MAX_SLOTS],
            cur_slot: Some(0),
        }
    }

    /// Feeds one raw event. Returns the frame's pointer events on SYN_REPORT.
    pub fn feed(&mut self, kind: EventType, code: u16, value: i32) -> Option<Vec<PointerEvent>> {
        if kind == EventType::ABSOLUTE {
            match code {
                c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => self.on_slot(value),
                c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => self.on_tracking_id(value),
                c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => self.on_pos(Some(value), None),
                c if c == AbsoluteAxisCode::ABS_MT_POSITION_Y.0 => self.on_pos(None, Some(value)),
                _ => {}
            }
            None
        } else if kind == EventType::SYNCHRONIZATION && code == SynchronizationCode::SYN_REPORT.0 {
            Some(self.on_syn_report())
        } else {
            None
        }
    }

    fn on_slot(&mut self, slot: i32) {
        self.cur_slot = usize::try_from(slot)
            .ok()
            .filter(|s| *s < self.slots.len());
        if self.cur_slot.is_none() {
            debug!("ignoring contacts in slot {slot}");
        }
    }

    fn slot_mut(&mut self) -> Option<&mut SlotState> {
        self.slots.get_mut(self.cur_slot?)
    }

    fn on_tracking_id(&mut self, tracking_id: i32) {
        let Some(s) = self.slot_mut() else {
            return;
        };
        if let Some(old) = s.tracking_id.take() {
            // a frame may both end a contact and start a new one in a slot
            if !s.began {
                s.ended = Some(old);
            }
        }
        if tracking_id >= 0 {
            s.tracking_id = Some(tracking_id);
            s.began = true;
        } else {
            s.began = false;
        }
        s.moved = false;
    }

    fn on_pos(&mut self, x: Option<i32>, y: Option<i32>) {
        let Some(s) = self.slot_mut() else {
            return;
        };
        if let Some(x) = x {
            s.moved |= s.x != x;
            s.x = x;
        }
        if let Some(y) = y {
            s.moved |= s.y != y;
            s.y = y;
        }
    }

    fn on_syn_report(&mut self) -> Vec<PointerEvent> {
        let mut out = Vec::new();
        for s in &mut self.slots {
            let position = s.position();
            if let Some(id) = s.ended.take() {
                out.push(PointerEvent::Release { id, position });
            }
            match s.tracking_id {
                Some(id) if s.began => out.push(PointerEvent::Press { id, position }),
                Some(id) if s.moved => out.push(PointerEvent::Move { id, position }),
                _ => {}
            }
            s.began = false;
            s.moved = false;
        }
        out
    }
}
