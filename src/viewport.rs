//! Viewport and map collaborators, plus simple in-memory implementations.

use log::debug;
use serde::Serialize;

use crate::geometry::{Envelope, Point, normalize_degrees};

/// Owns extent, resolution and rotation; applies incremental transforms.
pub trait Viewport {
    fn set_size(&mut self, width: f64, height: f64);

    /// Moves the content under screen position `from` to `anchor`, then
    /// scales by `scale_ratio` (>1 zooms in) and rotates by
    /// `rotation_delta` degrees around `anchor`.
    fn transform(&mut self, anchor: Point, from: Point, scale_ratio: f64, rotation_delta: f64);

    fn limit_extent(&mut self, envelope: &Envelope);

    fn apply_limiter(&mut self, envelope: &Envelope, resolutions: &[f64]);

    fn rotation(&self) -> f64;

    fn resolution(&self) -> f64;

    fn extent(&self) -> Envelope;
}

/// Data-owning collaborator refreshed once a gesture settles.
pub trait MapData {
    fn envelope(&self) -> Envelope;

    fn resolutions(&self) -> &[f64];

    fn refresh_data(&mut self, extent: Envelope, resolution: f64, final_interaction: bool);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleViewport {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    /// World units per screen pixel.
    pub resolution: f64,
    /// Degrees in (-180, 180].
    pub rotation: f64,
}

impl SimpleViewport {
    pub fn new(width: f64, height: f64, center: Point, resolution: f64) -> Self {
        Self {
            width,
            height,
            center,
            resolution,
            rotation: 0.0,
        }
    }

    // world-space offset from the centre for a screen position
    fn world_offset(&self, screen: Point) -> Point {
        let dx = (screen.x - self.width / 2.0) * self.resolution;
        let dy = (self.height / 2.0 - screen.y) * self.resolution;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        Point::new(dx * cos - dy * sin, dx * sin + dy * cos)
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        let off = self.world_offset(screen);
        Point::new(self.center.x + off.x, self.center.y + off.y)
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        let wx = world.x - self.center.x;
        let wy = world.y - self.center.y;
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let dx = wx * cos + wy * sin;
        let dy = -wx * sin + wy * cos;
        Point::new(
            dx / self.resolution + self.width / 2.0,
            self.height / 2.0 - dy / self.resolution,
        )
    }
}

impl Viewport for SimpleViewport {
    fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    fn transform(&mut self, anchor: Point, from: Point, scale_ratio: f64, rotation_delta: f64) {
        let target = self.screen_to_world(from);
        if rotation_delta != 0.0 {
            self.rotation = normalize_degrees(self.rotation + rotation_delta);
        }
        if scale_ratio.is_finite() && scale_ratio > 0.0 && scale_ratio != 1.0 {
            self.resolution /= scale_ratio;
        }
        let off = self.world_offset(anchor);
        self.center = Point::new(target.x - off.x, target.y - off.y);
        debug!(
            "transform: scale={scale_ratio:.3} rotate={rotation_delta:.1} -> centre=({:.1}, {:.1}) res={} rot={:.1}",
            self.center.x, self.center.y, self.resolution, self.rotation
        );
    }

    fn limit_extent(&mut self, envelope: &Envelope) {
        self.center = envelope.clamp(self.center);
    }

    fn apply_limiter(&mut self, envelope: &Envelope, resolutions: &[f64]) {
        let min = resolutions.iter().copied().fold(f64::INFINITY, f64::min);
        let max = resolutions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min.is_finite() && max.is_finite() {
            let clamped = self.resolution.clamp(min, max);
            if clamped != self.resolution {
                debug!("resolution {} limited to {clamped}", self.resolution);
                self.resolution = clamped;
            }
        }
        self.limit_extent(envelope);
    }

    fn rotation(&self) -> f64 {
        self.rotation
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn extent(&self) -> Envelope {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(0.0, self.height),
            Point::new(self.width, self.height),
        ]
        .map(|c| self.screen_to_world(c));
        let mut env = Envelope::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in corners {
            env.min_x = env.min_x.min(c.x);
            env.min_y = env.min_y.min(c.y);
            env.max_x = env.max_x.max(c.x);
            env.max_y = env.max_y.max(c.y);
        }
        env
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimpleMap {
    pub envelope: Envelope,
    pub resolutions: Vec<f64>,
    pub refreshes: usize,
    pub last_refresh: Option<(Envelope, f64)>,
}

impl SimpleMap {
    pub fn new(envelope: Envelope, resolutions: Vec<f64>) -> Self {
        Self {
            envelope,
            resolutions,
            refreshes: 0,
            last_refresh: None,
        }
    }
}

impl MapData for SimpleMap {
    fn envelope(&self) -> Envelope {
        self.envelope
    }

    fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    fn refresh_data(&mut self, extent: Envelope, resolution: f64, final_interaction: bool) {
        debug!(
            "refresh data: extent=({:.1},{:.1})-({:.1},{:.1}) res={resolution} final={final_interaction}",
            extent.min_x, extent.min_y, extent.max_x, extent.max_y
        );
        self.refreshes += 1;
        self.last_refresh = Some((extent, resolution));
    }
}
