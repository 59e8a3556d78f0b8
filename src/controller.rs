//! Inbound press/move/release handling.
//!
//! [`TouchController`] owns every piece of gesture state and is driven from
//! one input thread. The only other thread is the deferred-tap timer; it
//! talks back through the tap disambiguator's lock and a zoom request
//! channel drained by the input thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use log::debug;
use serde::Serialize;

use crate::config::GestureConfig;
use crate::error::Result;
use crate::events::{
    DeviceKind, GestureListener, InfoProvider, NoInfo, NoopListener, ZoomDirection,
};
use crate::fingers::{FingerRegistry, PointerId};
use crate::geometry::Point;
use crate::gestures::{GestureMachine, GestureMode};
use crate::tap::{ReleaseOutcome, Scheduler, TapDisambiguator, TapHandler, ThreadScheduler};
use crate::tracker::{ActiveTouchSet, Ticks, TouchSample};
use crate::velocity::VelocityTracker;
use crate::viewport::{MapData, Viewport};

/// Subscribers and scheduling used by a controller.
pub struct Hooks {
    pub listener: Arc<dyn GestureListener>,
    pub info: Arc<dyn InfoProvider>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            listener: Arc::new(NoopListener),
            info: Arc::new(NoInfo),
            scheduler: Arc::new(ThreadScheduler),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomRequest {
    pub direction: ZoomDirection,
    pub anchor: Point,
}

impl ZoomRequest {
    pub fn scale_ratio(&self) -> f64 {
        match self.direction {
            ZoomDirection::ZoomIn => 2.0,
            ZoomDirection::ZoomOut => 0.5,
        }
    }
}

// Zoom-lock check plus the cancelable notification, shared with the timer.
struct ZoomGate {
    listener: Arc<dyn GestureListener>,
    locked: AtomicBool,
}

impl ZoomGate {
    fn request(&self, direction: ZoomDirection, anchor: Point) -> Option<ZoomRequest> {
        if self.locked.load(Ordering::Acquire) {
            return None;
        }
        if self.listener.zoom_requested(direction, anchor).handled {
            return None;
        }
        Some(ZoomRequest { direction, anchor })
    }
}

/// Default tap behavior: notify, then hit-test, then (double tap) zoom in.
struct DefaultTaps {
    listener: Arc<dyn GestureListener>,
    info: Arc<dyn InfoProvider>,
    zoom: Arc<ZoomGate>,
    zoom_tx: Sender<ZoomRequest>,
}

impl TapHandler for DefaultTaps {
    fn single_tap(&self, position: Point) -> bool {
        if self.listener.single_tapped(position).handled {
            return true;
        }
        self.info.info(position, 1).handled
    }

    fn double_tap(&self, position: Point, taps: u32) -> bool {
        if self.listener.double_tapped(position, taps).handled {
            return true;
        }
        if self.info.info(position, taps).handled {
            return true;
        }
        if let Some(req) = self.zoom.request(ZoomDirection::ZoomIn, position)
            && self.zoom_tx.send(req).is_err()
        {
            debug!("controller dropped; double-tap zoom discarded");
        }
        true
    }
}

pub struct TouchController<V: Viewport, M: MapData> {
    config: GestureConfig,
    fingers: FingerRegistry,
    touches: ActiveTouchSet,
    velocity: VelocityTracker,
    machine: GestureMachine,
    taps: TapDisambiguator,
    listener: Arc<dyn GestureListener>,
    zoom: Arc<ZoomGate>,
    zoom_rx: Receiver<ZoomRequest>,
    viewport: V,
    map: M,
}

impl<V: Viewport, M: MapData> TouchController<V, M> {
    pub fn new(config: GestureConfig, viewport: V, map: M) -> Self {
        Self::with_hooks(config, viewport, map, Hooks::default())
    }

    pub fn with_hooks(config: GestureConfig, viewport: V, map: M, hooks: Hooks) -> Self {
        let (zoom_tx, zoom_rx) = mpsc::channel();
        let zoom = Arc::new(ZoomGate {
            listener: Arc::clone(&hooks.listener),
            locked: AtomicBool::new(config.locks.zoom),
        });
        let handler = Arc::new(DefaultTaps {
            listener: Arc::clone(&hooks.listener),
            info: hooks.info,
            zoom: Arc::clone(&zoom),
            zoom_tx,
        });
        Self {
            velocity: VelocityTracker::new(config.velocity_window_ms),
            config,
            fingers: FingerRegistry::new(),
            touches: ActiveTouchSet::new(),
            machine: GestureMachine::new(),
            taps: TapDisambiguator::new(hooks.scheduler, handler),
            listener: hooks.listener,
            zoom,
            zoom_rx,
            viewport,
            map,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.zoom.locked.store(config.locks.zoom, Ordering::Release);
        self.velocity.set_window_ms(config.velocity_window_ms);
        self.config = config;
    }

    pub fn mode(&self) -> GestureMode {
        self.machine.mode()
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }

    pub fn is_tap_pending(&self) -> bool {
        self.taps.is_armed()
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn set_size(&mut self, width: f64, height: f64) {
        self.viewport.set_size(width, height);
    }

    pub fn on_press(
        &mut self,
        pointer: PointerId,
        position: Point,
        ticks: Ticks,
        _device: DeviceKind,
    ) -> Result<bool> {
        self.apply_pending_zooms();

        let Some(slot) = self.fingers.on_press(pointer) else {
            return Ok(false);
        };
        if self.touches.is_empty() {
            self.velocity.clear();
        } else {
            self.velocity.clear_slot(slot);
        }
        self.touches.press(TouchSample::new(slot, position, ticks));
        self.velocity.add_sample(slot, position, ticks);
        self.taps.on_press();

        let points = self.touches.positions();
        if self.listener.touch_started(&points).handled {
            return Ok(true);
        }
        self.machine.begin(&points, &self.viewport)?;
        Ok(true)
    }

    pub fn on_move(
        &mut self,
        pointer: PointerId,
        position: Point,
        ticks: Ticks,
        in_contact: bool,
    ) -> Result<bool> {
        self.apply_pending_zooms();

        if !in_contact {
            return Ok(self.listener.hovered(position).handled);
        }
        let Some(slot) = self.fingers.slot_for(pointer) else {
            return Ok(false);
        };
        if !self.touches.update(TouchSample::new(slot, position, ticks)) {
            return Ok(false);
        }
        self.velocity.add_sample(slot, position, ticks);

        let points = self.touches.positions();
        if self.listener.touch_moved(&points).handled {
            return Ok(true);
        }
        self.machine
            .on_move(&points, &self.config, &mut self.viewport, &self.map)
    }

    pub fn on_release(
        &mut self,
        pointer: PointerId,
        position: Point,
        ticks: Ticks,
        device: DeviceKind,
    ) -> Result<bool> {
        self.apply_pending_zooms();

        let Some(slot) = self.fingers.on_release(pointer) else {
            return Ok(false);
        };
        let Some(touch) = self.touches.release(slot) else {
            return Ok(false);
        };

        self.velocity.add_sample(slot, position, ticks);
        let (vx, vy) = self.velocity.velocity_at(slot, ticks);
        self.velocity.clear_slot(slot);
        let mut handled = self.classify_velocity(vx, vy);

        if !handled {
            let timing = self.config.tap_timing();
            if self.taps.on_release(&touch, position, ticks, device, &timing) == ReleaseOutcome::LongTap {
                debug!("long tap at ({:.1}, {:.1})", position.x, position.y);
                handled = self.listener.long_tapped(position).handled;
            }
        }

        let remaining = self.touches.positions();
        handled |= self.listener.touch_ended(&remaining, position).handled;

        if self.machine.on_lift(&remaining)? {
            let extent = self.viewport.extent();
            let resolution = self.viewport.resolution();
            debug!("gesture complete; refreshing data at resolution {resolution}");
            self.map.refresh_data(extent, resolution, true);
        }
        Ok(handled)
    }

    /// Zooms one step in around `anchor` unless locked or handled.
    pub fn zoom_in(&mut self, anchor: Point) -> bool {
        self.zoom_step(ZoomDirection::ZoomIn, anchor)
    }

    pub fn zoom_out(&mut self, anchor: Point) -> bool {
        self.zoom_step(ZoomDirection::ZoomOut, anchor)
    }

    /// Applies zooms queued by the tap timer. Returns how many ran.
    pub fn apply_pending_zooms(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(req) = self.zoom_rx.try_recv() {
            self.apply_zoom(req);
            applied += 1;
        }
        applied
    }

    fn zoom_step(&mut self, direction: ZoomDirection, anchor: Point) -> bool {
        if let Some(req) = self.zoom.request(direction, anchor) {
            self.apply_zoom(req);
        }
        true
    }

    fn apply_zoom(&mut self, req: ZoomRequest) {
        debug!("{:?} at ({:.1}, {:.1})", req.direction, req.anchor.x, req.anchor.y);
        self.viewport
            .transform(req.anchor, req.anchor, req.scale_ratio(), 0.0);
        self.viewport
            .apply_limiter(&self.map.envelope(), self.map.resolutions());
        let (extent, resolution) = (self.viewport.extent(), self.viewport.resolution());
        self.map.refresh_data(extent, resolution, true);
    }

    // fling beats swipe; both beat tap handling for the same release
    fn classify_velocity(&self, vx: f64, vy: f64) -> bool {
        let exceeds = |limit: f64| vx.abs() > limit || vy.abs() > limit;
        if exceeds(self.config.fling_velocity) {
            debug!("fling vx={vx:.0} vy={vy:.0}");
            self.listener.flung(vx, vy).handled
        } else if exceeds(self.config.swipe_velocity) {
            debug!("swipe vx={vx:.0} vy={vy:.0}");
            self.listener.swiped(vx, vy).handled
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locks;
    use crate::testing::{
        FixedInfo, ManualScheduler, Note, RecordingListener, RecordingMap, RecordingViewport,
    };
    use crate::tracker::TICKS_PER_MS;
    use std::time::Duration;

    type Ctl = TouchController<RecordingViewport, RecordingMap>;

    struct Rig {
        ctl: Ctl,
        listener: Arc<RecordingListener>,
        info: Arc<FixedInfo>,
        sched: Arc<ManualScheduler>,
    }

    fn rig_with(cfg: GestureConfig, listener: RecordingListener, info: FixedInfo) -> Rig {
        let listener = Arc::new(listener);
        let info = Arc::new(info);
        let sched = Arc::new(ManualScheduler::default());
        let hooks = Hooks {
            listener: listener.clone(),
            info: info.clone(),
            scheduler: sched.clone(),
        };
        let ctl = TouchController::with_hooks(
            cfg,
            RecordingViewport::default(),
            RecordingMap::default(),
            hooks,
        );
        Rig {
            ctl,
            listener,
            info,
            sched,
        }
    }

    fn rig() -> Rig {
        rig_with(
            GestureConfig::default(),
            RecordingListener::default(),
            FixedInfo::default(),
        )
    }

    fn ms(n: i64) -> Ticks {
        n * TICKS_PER_MS
    }

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    const TOUCH: DeviceKind = DeviceKind::Touch;

    #[test]
    fn drag_then_release() {
        let mut r = rig();
        assert!(r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap());
        assert_eq!(r.ctl.mode(), GestureMode::Dragging);
        assert!(r.ctl.on_move(1, p(50.0, 0.0), ms(300), true).unwrap());
        r.ctl.on_release(1, p(50.0, 0.0), ms(600), TOUCH).unwrap();

        let t = r.ctl.viewport().transforms();
        assert_eq!(t.len(), 1);
        assert_eq!((t[0].anchor, t[0].from), (p(50.0, 0.0), p(0.0, 0.0)));
        assert_eq!(r.ctl.mode(), GestureMode::None);
        assert_eq!(r.ctl.map().refreshes.len(), 1);
        assert!(!r.ctl.is_tap_pending());
    }

    #[test]
    fn pinch_spread_and_rotate_end_to_end() {
        let mut r = rig();
        r.ctl.on_press(10, p(0.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_press(11, p(10.0, 0.0), ms(5), TOUCH).unwrap();
        assert_eq!(r.ctl.mode(), GestureMode::Zooming);

        let (s, c) = 40f64.to_radians().sin_cos();
        r.ctl.on_move(11, p(20.0 * c, 20.0 * s), ms(300), true).unwrap();

        let t = r.ctl.viewport().transforms();
        assert_eq!(t.len(), 1);
        assert!((t[0].scale - 2.0).abs() < 1e-9, "scale = {}", t[0].scale);
        assert!((t[0].rotation - 40.0).abs() < 1e-9, "rotation = {}", t[0].rotation);

        r.ctl.on_release(11, p(20.0 * c, 20.0 * s), ms(400), TOUCH).unwrap();
        assert_eq!(r.ctl.mode(), GestureMode::Dragging);
        assert!(r.ctl.map().refreshes.is_empty());

        r.ctl.on_release(10, p(0.0, 0.0), ms(410), TOUCH).unwrap();
        assert_eq!(r.ctl.mode(), GestureMode::None);
        assert_eq!(r.ctl.map().refreshes.len(), 1);
        assert!(r.ctl.map().refreshes[0].2);
        assert_eq!(r.ctl.viewport().transforms().len(), 1);
    }

    #[test]
    fn pinch_at_exactly_unsnap_angle_stays_unrotated() {
        let mut r = rig();
        r.ctl.on_press(10, p(0.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_press(11, p(10.0, 0.0), ms(5), TOUCH).unwrap();

        // atan2 of a 30° pinch lands a hair under 30, so the unsnap
        // threshold is not reached
        let (s, c) = 30f64.to_radians().sin_cos();
        r.ctl.on_move(11, p(20.0 * c, 20.0 * s), ms(300), true).unwrap();
        let t = r.ctl.viewport().transforms();
        assert!((t[0].scale - 2.0).abs() < 1e-9, "scale = {}", t[0].scale);
        assert_eq!(t[0].rotation, 0.0);
        assert_eq!(r.ctl.viewport().rotation(), 0.0);

        let (s, c) = 31f64.to_radians().sin_cos();
        r.ctl.on_move(11, p(20.0 * c, 20.0 * s), ms(320), true).unwrap();
        let t = r.ctl.viewport().transforms();
        assert!((t[1].rotation - 31.0).abs() < 1e-9, "rotation = {}", t[1].rotation);
    }

    #[test]
    fn zoom_lock_forces_unit_scale_during_pinch() {
        let cfg = GestureConfig {
            locks: Locks {
                zoom: true,
                ..Locks::default()
            },
            ..GestureConfig::default()
        };
        let mut r = rig_with(cfg, RecordingListener::default(), FixedInfo::default());
        r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_press(2, p(10.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_move(2, p(40.0, 0.0), ms(100), true).unwrap();
        assert_eq!(r.ctl.viewport().transforms()[0].scale, 1.0);
    }

    #[test]
    fn single_tap_waits_for_defer_timer() {
        let mut r = rig();
        r.ctl.on_press(1, p(10.0, 10.0), 0, TOUCH).unwrap();
        r.ctl.on_release(1, p(10.0, 10.0), ms(80), TOUCH).unwrap();

        assert_eq!(r.listener.count("single"), 0);
        assert!(r.ctl.is_tap_pending());
        assert_eq!(r.sched.pending_delays(), vec![Duration::from_millis(200)]);

        r.sched.run_all();
        assert_eq!(r.listener.count("single"), 1);
        assert_eq!(r.listener.count("double"), 0);
        assert_eq!(r.info.calls(), vec![(p(10.0, 10.0), 1)]);
    }

    #[test]
    fn double_tap_replaces_single_and_zooms_in() {
        let mut r = rig();
        r.ctl.on_press(1, p(10.0, 10.0), 0, TOUCH).unwrap();
        r.ctl.on_release(1, p(10.0, 10.0), ms(60), TOUCH).unwrap();
        r.ctl.on_press(2, p(10.0, 10.0), ms(150), TOUCH).unwrap();
        r.ctl.on_release(2, p(10.0, 10.0), ms(210), TOUCH).unwrap();

        r.sched.run_all();
        assert_eq!(r.listener.count("single"), 0);
        assert!(r.listener.notes().contains(&Note::Double(p(10.0, 10.0), 2)));
        assert!(
            r.listener
                .notes()
                .contains(&Note::Zoom(ZoomDirection::ZoomIn, p(10.0, 10.0)))
        );

        let before = r.ctl.map().refreshes.len();
        assert_eq!(r.ctl.apply_pending_zooms(), 1);
        let t = r.ctl.viewport().transforms();
        let last = t[t.len() - 1];
        assert_eq!((last.anchor, last.scale), (p(10.0, 10.0), 2.0));
        assert_eq!(r.ctl.map().refreshes.len(), before + 1);
    }

    #[test]
    fn double_tap_hit_suppresses_zoom() {
        let mut r = rig_with(
            GestureConfig::default(),
            RecordingListener::default(),
            FixedInfo::hits(),
        );
        for (i, t) in [(1, 0), (2, 100)] {
            r.ctl.on_press(i, p(5.0, 5.0), ms(t), TOUCH).unwrap();
            r.ctl.on_release(i, p(5.0, 5.0), ms(t + 30), TOUCH).unwrap();
        }
        r.sched.run_all();
        assert_eq!(r.info.calls(), vec![(p(5.0, 5.0), 2)]);
        assert_eq!(r.listener.count("zoom"), 0);
        assert_eq!(r.ctl.apply_pending_zooms(), 0);
    }

    #[test]
    fn zoom_lock_blocks_double_tap_zoom() {
        let cfg = GestureConfig {
            locks: Locks {
                zoom: true,
                ..Locks::default()
            },
            ..GestureConfig::default()
        };
        let mut r = rig_with(cfg, RecordingListener::default(), FixedInfo::default());
        for (i, t) in [(1, 0), (2, 100)] {
            r.ctl.on_press(i, p(5.0, 5.0), ms(t), TOUCH).unwrap();
            r.ctl.on_release(i, p(5.0, 5.0), ms(t + 30), TOUCH).unwrap();
        }
        r.sched.run_all();
        assert_eq!(r.listener.count("double"), 1);
        assert_eq!(r.listener.count("zoom"), 0);
        assert_eq!(r.ctl.apply_pending_zooms(), 0);
    }

    #[test]
    fn long_press_fires_immediately_without_timer() {
        let mut r = rig();
        r.ctl.on_press(1, p(3.0, 3.0), 0, TOUCH).unwrap();
        r.ctl.on_release(1, p(3.0, 3.0), ms(650), TOUCH).unwrap();
        assert_eq!(r.listener.count("long"), 1);
        assert!(r.sched.pending_delays().is_empty());
        assert!(!r.ctl.is_tap_pending());
    }

    #[test]
    fn fast_release_flings_instead_of_tapping() {
        let mut r = rig();
        r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_move(1, p(100.0, 0.0), ms(5), true).unwrap();
        r.ctl.on_move(1, p(200.0, 0.0), ms(10), true).unwrap();
        r.ctl.on_release(1, p(200.0, 0.0), ms(10), TOUCH).unwrap();
        assert_eq!(r.listener.count("flung"), 1);
        assert_eq!(r.listener.count("swiped"), 0);
        assert!(r.sched.pending_delays().is_empty());
    }

    #[test]
    fn moderate_release_swipes() {
        let mut r = rig();
        r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap();
        r.ctl.on_move(1, p(0.0, 30.0), ms(10), true).unwrap();
        r.ctl.on_release(1, p(0.0, 30.0), ms(10), TOUCH).unwrap();
        assert_eq!(r.listener.count("swiped"), 1);
        assert_eq!(r.listener.count("flung"), 0);
    }

    #[test]
    fn handled_touch_start_skips_gesture() {
        let mut r = rig_with(
            GestureConfig::default(),
            RecordingListener::handling(&["started"]),
            FixedInfo::default(),
        );
        assert!(r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap());
        assert_eq!(r.ctl.mode(), GestureMode::None);
        assert!(!r.ctl.on_move(1, p(10.0, 0.0), ms(300), true).unwrap());
        assert!(r.ctl.viewport().transforms().is_empty());
        r.ctl.on_release(1, p(10.0, 0.0), ms(600), TOUCH).unwrap();
        assert_eq!(r.ctl.map().refreshes.len(), 1);
    }

    #[test]
    fn handled_move_suppresses_transform() {
        let mut r = rig_with(
            GestureConfig::default(),
            RecordingListener::handling(&["moved"]),
            FixedInfo::default(),
        );
        r.ctl.on_press(1, p(0.0, 0.0), 0, TOUCH).unwrap();
        assert!(r.ctl.on_move(1, p(10.0, 0.0), ms(300), true).unwrap());
        assert!(r.ctl.viewport().transforms().is_empty());
    }

    #[test]
    fn hover_never_joins_active_set() {
        let mut r = rig();
        assert!(!r.ctl.on_move(7, p(4.0, 4.0), 0, false).unwrap());
        assert_eq!(r.listener.notes(), vec![Note::Hovered(p(4.0, 4.0))]);
        assert_eq!(r.ctl.active_touches(), 0);
    }

    #[test]
    fn unknown_pointers_are_ignored() {
        let mut r = rig();
        assert!(!r.ctl.on_move(42, p(1.0, 1.0), 0, true).unwrap());
        assert!(!r.ctl.on_release(42, p(1.0, 1.0), 0, TOUCH).unwrap());
        assert!(r.listener.notes().is_empty());
    }

    #[test]
    fn excess_pointers_are_dropped() {
        let mut r = rig();
        for id in 0..crate::fingers::MAX_SLOTS as i64 {
            assert!(r.ctl.on_press(id, p(id as f64, 0.0), 0, TOUCH).unwrap());
        }
        assert!(!r.ctl.on_press(99, p(0.0, 9.0), 0, TOUCH).unwrap());
        assert_eq!(r.ctl.active_touches(), crate::fingers::MAX_SLOTS);
        assert!(!r.ctl.on_release(99, p(0.0, 9.0), 0, TOUCH).unwrap());
    }

    #[test]
    fn explicit_zoom_out_respects_listener() {
        let mut r = rig_with(
            GestureConfig::default(),
            RecordingListener::handling(&["zoom"]),
            FixedInfo::default(),
        );
        assert!(r.ctl.zoom_out(p(1.0, 1.0)));
        assert!(r.ctl.viewport().transforms().is_empty());

        let mut r = rig();
        let res = r.ctl.viewport().resolution();
        r.ctl.zoom_out(p(1.0, 1.0));
        assert_eq!(r.ctl.viewport().resolution(), res * 2.0);
    }

    #[test]
    fn reconfigure_updates_zoom_lock() {
        let mut r = rig();
        let mut cfg = r.ctl.config().clone();
        cfg.locks.zoom = true;
        r.ctl.set_config(cfg);
        r.ctl.zoom_in(p(0.0, 0.0));
        assert!(r.ctl.viewport().transforms().is_empty());
        assert_eq!(r.listener.count("zoom"), 0);
    }
}
