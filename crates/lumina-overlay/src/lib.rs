//! lumina-overlay — Clinical overlay rendering on top of camera frames.
//!
//! Renderers draw through the [`DrawSurface`] trait so the same guide
//! geometry feeds the live raster surface and the recording surface used
//! for inspection.

pub mod composite;
pub mod renderers;
pub mod surface;

pub use composite::{
    composite, decode_data_uri, draw_base_frame, draw_base_frame_into, encode_jpeg_data_uri, encode_png, load_font, OverlayError,
};
pub use renderers::{render_overlays, OverlayConfig};
pub use surface::{Color, DrawCommand, DrawSurface, RasterSurface, RecordingSurface, Stroke};
