//! lumina-hw — Camera capture and frame conversion.
//!
//! Provides V4L2-based camera access and conversion of the negotiated
//! pixel format to packed RGB8 frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, Facing, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
