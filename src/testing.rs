//! Deterministic collaborators for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use crate::events::{GestureListener, InfoProvider, NotificationResult, ZoomDirection};
use crate::geometry::{Envelope, Point};
use crate::tap::{Scheduler, Task, TapHandler};
use crate::viewport::{MapData, SimpleViewport, Viewport};

/// Holds scheduled tasks until the test runs them.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<(Duration, Task)>>,
}

impl ManualScheduler {
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.tasks.lock().unwrap().iter().map(|(d, _)| *d).collect()
    }

    pub fn run_all(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        for (_, task) in tasks {
            task();
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.tasks.lock().unwrap().push((delay, task));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapCall {
    Single(Point),
    Double(Point, u32),
}

#[derive(Default)]
pub struct RecordingTaps {
    calls: Mutex<Vec<TapCall>>,
}

impl RecordingTaps {
    pub fn calls(&self) -> Vec<TapCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TapHandler for RecordingTaps {
    fn single_tap(&self, position: Point) -> bool {
        self.calls.lock().unwrap().push(TapCall::Single(position));
        true
    }

    fn double_tap(&self, position: Point, taps: u32) -> bool {
        self.calls.lock().unwrap().push(TapCall::Double(position, taps));
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformCall {
    pub anchor: Point,
    pub from: Point,
    pub scale: f64,
    pub rotation: f64,
}

/// A real viewport that also records every call.
#[derive(Debug)]
pub struct RecordingViewport {
    pub inner: SimpleViewport,
    transforms: Vec<TransformCall>,
    limits: usize,
    extent_limits: usize,
}

impl Default for RecordingViewport {
    fn default() -> Self {
        Self {
            inner: SimpleViewport::new(100.0, 100.0, Point::new(0.0, 0.0), 1.0),
            transforms: Vec::new(),
            limits: 0,
            extent_limits: 0,
        }
    }
}

impl RecordingViewport {
    pub fn transforms(&self) -> Vec<TransformCall> {
        self.transforms.clone()
    }

    pub fn limits(&self) -> usize {
        self.limits
    }

    pub fn extent_limits(&self) -> usize {
        self.extent_limits
    }
}

impl Viewport for RecordingViewport {
    fn set_size(&mut self, width: f64, height: f64) {
        self.inner.set_size(width, height);
    }

    fn transform(&mut self, anchor: Point, from: Point, scale_ratio: f64, rotation_delta: f64) {
        self.transforms.push(TransformCall {
            anchor,
            from,
            scale: scale_ratio,
            rotation: rotation_delta,
        });
        self.inner.transform(anchor, from, scale_ratio, rotation_delta);
    }

    fn limit_extent(&mut self, envelope: &Envelope) {
        self.extent_limits += 1;
        self.inner.limit_extent(envelope);
    }

    fn apply_limiter(&mut self, envelope: &Envelope, resolutions: &[f64]) {
        self.limits += 1;
        self.inner.apply_limiter(envelope, resolutions);
    }

    fn rotation(&self) -> f64 {
        self.inner.rotation()
    }

    fn resolution(&self) -> f64 {
        self.inner.resolution()
    }

    fn extent(&self) -> Envelope {
        self.inner.extent()
    }
}

#[derive(Debug)]
pub struct RecordingMap {
    envelope: Envelope,
    resolutions: Vec<f64>,
    pub refreshes: Vec<(Envelope, f64, bool)>,
}

impl Default for RecordingMap {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(-1e6, -1e6, 1e6, 1e6),
            resolutions: vec![1000.0, 100.0, 10.0, 1.0, 0.1, 0.01, 0.001],
            refreshes: Vec::new(),
        }
    }
}

impl MapData for RecordingMap {
    fn envelope(&self) -> Envelope {
        self.envelope
    }

    fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    fn refresh_data(&mut self, extent: Envelope, resolution: f64, final_interaction: bool) {
        self.refreshes.push((extent, resolution, final_interaction));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Started(usize),
    Moved(usize),
    Ended(usize, Point),
    Hovered(Point),
    Swiped,
    Flung,
    Single(Point),
    Double(Point, u32),
    Long(Point),
    Zoom(ZoomDirection, Point),
}

impl Note {
    fn key(&self) -> &'static str {
        match self {
            Note::Started(_) => "started",
            Note::Moved(_) => "moved",
            Note::Ended(..) => "ended",
            Note::Hovered(_) => "hovered",
            Note::Swiped => "swiped",
            Note::Flung => "flung",
            Note::Single(_) => "single",
            Note::Double(..) => "double",
            Note::Long(_) => "long",
            Note::Zoom(..) => "zoom",
        }
    }
}

/// Records notifications; reports `handled` for the keys it was told to.
#[derive(Default)]
pub struct RecordingListener {
    notes: Mutex<Vec<Note>>,
    handles: Mutex<HashSet<&'static str>>,
}

impl RecordingListener {
    pub fn handling(keys: &[&'static str]) -> Self {
        Self {
            notes: Mutex::default(),
            handles: Mutex::new(keys.iter().copied().collect()),
        }
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.notes().iter().filter(|n| n.key() == key).count()
    }

    fn record(&self, note: Note) -> NotificationResult {
        let handled = self.handles.lock().unwrap().contains(note.key());
        self.notes.lock().unwrap().push(note);
        NotificationResult::from(handled)
    }
}

impl GestureListener for RecordingListener {
    fn touch_started(&self, touches: &[Point]) -> NotificationResult {
        self.record(Note::Started(touches.len()))
    }

    fn touch_moved(&self, touches: &[Point]) -> NotificationResult {
        self.record(Note::Moved(touches.len()))
    }

    fn touch_ended(&self, touches: &[Point], released: Point) -> NotificationResult {
        self.record(Note::Ended(touches.len(), released))
    }

    fn hovered(&self, position: Point) -> NotificationResult {
        self.record(Note::Hovered(position))
    }

    fn swiped(&self, _vx: f64, _vy: f64) -> NotificationResult {
        self.record(Note::Swiped)
    }

    fn flung(&self, _vx: f64, _vy: f64) -> NotificationResult {
        self.record(Note::Flung)
    }

    fn single_tapped(&self, position: Point) -> NotificationResult {
        self.record(Note::Single(position))
    }

    fn double_tapped(&self, position: Point, taps: u32) -> NotificationResult {
        self.record(Note::Double(position, taps))
    }

    fn long_tapped(&self, position: Point) -> NotificationResult {
        self.record(Note::Long(position))
    }

    fn zoom_requested(&self, direction: ZoomDirection, anchor: Point) -> NotificationResult {
        self.record(Note::Zoom(direction, anchor))
    }
}

/// Hit-test stub with a fixed answer.
#[derive(Default)]
pub struct FixedInfo {
    pub handled: bool,
    calls: Mutex<Vec<(Point, u32)>>,
}

impl FixedInfo {
    pub fn hits() -> Self {
        Self {
            handled: true,
            calls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<(Point, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl InfoProvider for FixedInfo {
    fn info(&self, position: Point, taps: u32) -> NotificationResult {
        self.calls.lock().unwrap().push((position, taps));
        NotificationResult::from(self.handled)
    }
}
