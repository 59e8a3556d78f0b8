//! Centroid, radius and angle of a multi-finger touch.
//!
//! Radius and angle are measured against the first two fingers in press
//! order, not averaged over all fingers. Zoom sensitivity and rotation feel
//! both depend on that.

use crate::error::{GestureError, Result};
use crate::geometry::{Point, normalize_degrees};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchSnapshot {
    pub center: Point,
    pub radius: f64,
    pub angle_degrees: f64,
}

pub fn measure(points: &[Point]) -> Result<PinchSnapshot> {
    if points.len() < 2 {
        return Err(GestureError::InvalidArgument {
            needed: 2,
            got: points.len(),
        });
    }

    let n = points.len() as f64;
    let sumx: f64 = points.iter().map(|p| p.x).sum();
    let sumy: f64 = points.iter().map(|p| p.y).sum();
    let center = Point::new(sumx / n, sumy / n);

    let (a, b) = (points[0], points[1]);
    let radius = center.distance(a);
    let angle_degrees = normalize_degrees((b.y - a.y).atan2(b.x - a.x).to_degrees());

    Ok(PinchSnapshot {
        center,
        radius,
        angle_degrees,
    })
}
