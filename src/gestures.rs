//! Drag / pinch state machine turning touch-set changes into viewport
//! transforms.

use log::debug;
use serde::Serialize;

use crate::config::GestureConfig;
use crate::error::{GestureError, Result};
use crate::geometry::{Point, normalize_degrees};
use crate::pinch::{self, PinchSnapshot};
use crate::viewport::{MapData, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GestureMode {
    #[default]
    None,
    Dragging,
    Zooming,
}

#[derive(Debug, Clone, Copy)]
struct PinchState {
    center: Point,
    radius: f64,
    angle: f64,
    // unsnapped rotation accumulated over the pinch, (-180, 180]
    inner_rotation: f64,
}

impl PinchState {
    fn seed(snap: PinchSnapshot, inner_rotation: f64) -> Self {
        Self {
            center: snap.center,
            radius: snap.radius,
            angle: snap.angle_degrees,
            inner_rotation,
        }
    }
}

/// Continuity state of one touch sequence, from first press until the last
/// finger lifts.
#[derive(Debug, Clone, Copy)]
enum Session {
    Dragging { anchor: Point },
    Zooming(PinchState),
}

/// Rotation delta to hand to the viewport.
///
/// An unrotated viewport only starts rotating once the pinch has turned past
/// `unsnap`. A rotated one snaps back to exactly 0 once the pinch returns
/// within `resnap` of it.
pub fn snap_rotation(inner: f64, current: f64, unsnap: f64, resnap: f64) -> f64 {
    if current == 0.0 {
        if inner.abs() >= unsnap.abs() {
            inner
        } else {
            0.0
        }
    } else if inner.abs() <= resnap.abs() {
        -current
    } else {
        inner - current
    }
}

#[derive(Debug, Default)]
pub struct GestureMachine {
    session: Option<Session>,
}

impl GestureMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> GestureMode {
        match self.session {
            None => GestureMode::None,
            Some(Session::Dragging { .. }) => GestureMode::Dragging,
            Some(Session::Zooming(_)) => GestureMode::Zooming,
        }
    }

    /// Touch-start that no subscriber handled.
    pub fn begin(&mut self, touches: &[Point], viewport: &dyn Viewport) -> Result<()> {
        let session = match touches {
            [] => return Err(GestureError::InvalidArgument { needed: 1, got: 0 }),
            [only] => Session::Dragging { anchor: *only },
            _ => Session::Zooming(PinchState::seed(
                pinch::measure(touches)?,
                viewport.rotation(),
            )),
        };
        self.enter(session);
        Ok(())
    }

    /// Touch-move that no subscriber handled. Returns whether the move
    /// applied to the current mode.
    pub fn on_move(
        &mut self,
        touches: &[Point],
        cfg: &GestureConfig,
        viewport: &mut dyn Viewport,
        map: &dyn MapData,
    ) -> Result<bool> {
        match self.session.as_mut() {
            Some(Session::Dragging { anchor }) => {
                let [position] = touches else {
                    return Ok(false);
                };
                if !cfg.locks.pan {
                    viewport.transform(*position, *anchor, 1.0, 0.0);
                    viewport.limit_extent(&map.envelope());
                }
                *anchor = *position;
                Ok(true)
            }
            Some(Session::Zooming(prev)) => {
                if touches.len() < 2 {
                    return Ok(false);
                }
                let snap = pinch::measure(touches)?;

                let mut rotation_delta = 0.0;
                if !cfg.locks.rotation {
                    prev.inner_rotation =
                        normalize_degrees(prev.inner_rotation + snap.angle_degrees - prev.angle);
                    rotation_delta = snap_rotation(
                        prev.inner_rotation,
                        viewport.rotation(),
                        cfg.unsnap_rotation_deg,
                        cfg.resnap_rotation_deg,
                    );
                }

                let scale = if cfg.locks.zoom || prev.radius == 0.0 {
                    1.0
                } else {
                    snap.radius / prev.radius
                };

                viewport.transform(snap.center, prev.center, scale, rotation_delta);
                viewport.apply_limiter(&map.envelope(), map.resolutions());

                prev.center = snap.center;
                prev.radius = snap.radius;
                prev.angle = snap.angle_degrees;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A finger lifted; `remaining` are the fingers still down. Returns true
    /// when the sequence ended.
    pub fn on_lift(&mut self, remaining: &[Point]) -> Result<bool> {
        let Some(session) = self.session else {
            return Ok(remaining.is_empty());
        };
        match (session, remaining) {
            (_, []) => {
                self.enter_none();
                return Ok(true);
            }
            (_, [only]) => self.enter(Session::Dragging { anchor: *only }),
            (Session::Zooming(prev), _) => {
                // re-seed so the new first/second fingers don't cause a jump
                let snap = pinch::measure(remaining)?;
                self.session = Some(Session::Zooming(PinchState::seed(snap, prev.inner_rotation)));
            }
            (Session::Dragging { .. }, _) => {}
        }
        Ok(false)
    }

    fn enter(&mut self, session: Session) {
        let from = self.mode();
        self.session = Some(session);
        let to = self.mode();
        if from != to {
            debug!("gesture mode {from:?} -> {to:?}");
        }
    }

    fn enter_none(&mut self) {
        let from = self.mode();
        self.session = None;
        if from != GestureMode::None {
            debug!("gesture mode {from:?} -> None");
        }
    }
}
