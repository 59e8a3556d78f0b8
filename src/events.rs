//! Cancelable gesture notifications.
//!
//! Every notification returns a [`NotificationResult`]. The controller checks
//! it before running default behavior, so a subscriber that reports
//! `handled` suppresses the default.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationResult {
    pub handled: bool,
}

impl NotificationResult {
    pub const UNHANDLED: Self = Self { handled: false };
}

impl From<bool> for NotificationResult {
    fn from(handled: bool) -> Self {
        Self { handled }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Touch,
    Mouse,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    ZoomIn,
    ZoomOut,
}

/// Subscriber hooks. Every method defaults to "unhandled".
///
/// Tap notifications fire from the deferred-tap timer thread, hence the
/// `Send + Sync` bound.
#[allow(unused_variables)]
pub trait GestureListener: Send + Sync {
    fn touch_started(&self, touches: &[Point]) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn touch_moved(&self, touches: &[Point]) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn touch_ended(&self, touches: &[Point], released: Point) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn hovered(&self, position: Point) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn swiped(&self, vx: f64, vy: f64) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn flung(&self, vx: f64, vy: f64) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn single_tapped(&self, position: Point) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn double_tapped(&self, position: Point, taps: u32) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn long_tapped(&self, position: Point) -> NotificationResult {
        NotificationResult::UNHANDLED
    }

    fn zoom_requested(&self, direction: ZoomDirection, anchor: Point) -> NotificationResult {
        NotificationResult::UNHANDLED
    }
}

/// Listener that never handles anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl GestureListener for NoopListener {}

/// Hit-test collaborator queried by default tap behavior.
pub trait InfoProvider: Send + Sync {
    fn info(&self, position: Point, taps: u32) -> NotificationResult;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoInfo;

impl InfoProvider for NoInfo {
    fn info(&self, _position: Point, _taps: u32) -> NotificationResult {
        NotificationResult::UNHANDLED
    }
}
