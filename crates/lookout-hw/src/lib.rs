//! lookout-hw — Hardware abstraction for webcam capture.
//!
//! Provides V4L2-based camera access producing RGB frames for the
//! recognition loop.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, PixelFormat};
pub use frame::Frame;
