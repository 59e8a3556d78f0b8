//! Multi-touch gesture recognition turning raw pointer press/move/release
//! events into viewport transforms and tap/fling callbacks.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod fingers;
pub mod geometry;
pub mod gestures;
pub mod pinch;
pub mod tap;
pub mod tracker;
pub mod velocity;
pub mod viewport;

#[cfg(test)]
mod testing;

pub use controller::{Hooks, TouchController, ZoomRequest};
pub use error::GestureError;
pub use events::{DeviceKind, GestureListener, InfoProvider, NotificationResult, ZoomDirection};
pub use geometry::{Envelope, Point};
pub use gestures::GestureMode;
pub use viewport::{MapData, SimpleMap, SimpleViewport, Viewport};
