//! Landmark source abstraction and the ONNX face-mesh adapter.
//!
//! The face-mesh model takes a 192x192 RGB crop normalized to [-1, 1] and
//! produces 468 (or 478 with iris refinement) landmarks in input pixels plus
//! a face-presence logit.

use crate::landmarks::{LandmarkSet, Point};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const MESH_INPUT_SIZE: usize = 192;
const MESH_MEAN: f32 = 127.5;
const MESH_STD: f32 = 127.5;
const MESH_PRESENCE_THRESHOLD: f32 = 0.5;
const MESH_COORDS_PER_POINT: usize = 3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("frame size mismatch: expected {expected} bytes for {width}x{height} RGB, got {actual}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces face landmarks for RGB frames.
///
/// Implementations return at most one set per face; an empty vector means
/// no face was found. `timestamp_ms` is strictly increasing across calls.
pub trait LandmarkDetector: Send {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: u64,
    ) -> Result<Vec<LandmarkSet>, DetectorError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    new_w: usize,
    new_h: usize,
}

fn letterbox(width: usize, height: usize, target: usize) -> LetterboxInfo {
    let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as usize).clamp(1, target);
    let new_h = ((height as f32 * scale).round() as usize).clamp(1, target);
    LetterboxInfo {
        scale,
        pad_x: (target - new_w) as f32 / 2.0,
        pad_y: (target - new_h) as f32 / 2.0,
        new_w,
        new_h,
    }
}

/// Face-mesh landmark detector backed by an ONNX Runtime session.
pub struct FaceMeshDetector {
    session: Session,
    input_size: usize,
}

impl FaceMeshDetector {
    /// Load the face-mesh ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded face mesh model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "face mesh model requires landmark and presence outputs, got {}",
                output_names.len()
            )));
        }

        Ok(Self {
            session,
            input_size: MESH_INPUT_SIZE,
        })
    }

    /// Resize an RGB frame into a letterboxed NCHW tensor normalized to [-1, 1].
    fn preprocess(&self, rgb: &[u8], width: usize, height: usize) -> (Array4<f32>, LetterboxInfo) {
        let size = self.input_size;
        let lb = letterbox(width, height, size);
        let inv_scale = 1.0 / lb.scale;
        let pad_x_start = lb.pad_x.floor() as usize;
        let pad_y_start = lb.pad_y.floor() as usize;

        // Padding normalizes to 0.0.
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..lb.new_h {
            let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..lb.new_w {
                let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                for c in 0..3 {
                    let px = |row: usize, col: usize| rgb[(row * width + col) * 3 + c] as f32;
                    let val = px(y0, x0) * (1.0 - fx) * (1.0 - fy)
                        + px(y0, x1) * fx * (1.0 - fy)
                        + px(y1, x0) * (1.0 - fx) * fy
                        + px(y1, x1) * fx * fy;
                    tensor[[0, c, y + pad_y_start, x + pad_x_start]] = (val - MESH_MEAN) / MESH_STD;
                }
            }
        }

        (tensor, lb)
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: u64,
    ) -> Result<Vec<LandmarkSet>, DetectorError> {
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(DetectorError::FrameSize {
                width,
                height,
                expected,
                actual: rgb.len(),
            });
        }

        let (input, lb) = self.preprocess(rgb, width as usize, height as usize);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, presence) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("presence: {e}")))?;
        let logit = presence.first().copied().unwrap_or(f32::NEG_INFINITY);
        if sigmoid(logit) <= MESH_PRESENCE_THRESHOLD {
            tracing::trace!(timestamp_ms, "no face in frame");
            return Ok(Vec::new());
        }

        let (_, coords) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("landmarks: {e}")))?;
        let set = decode_landmarks(coords, &lb, width as f32, height as f32)?;
        tracing::trace!(timestamp_ms, points = set.len(), "face mesh detected");

        Ok(vec![set])
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Map raw `[x, y, z]` triplets in input pixels back to normalized frame coordinates.
fn decode_landmarks(
    coords: &[f32],
    lb: &LetterboxInfo,
    width: f32,
    height: f32,
) -> Result<LandmarkSet, DetectorError> {
    if coords.is_empty() || coords.len() % MESH_COORDS_PER_POINT != 0 {
        return Err(DetectorError::InferenceFailed(format!(
            "landmark tensor length {} is not a multiple of {MESH_COORDS_PER_POINT}",
            coords.len()
        )));
    }

    let points = coords
        .chunks_exact(MESH_COORDS_PER_POINT)
        .map(|c| {
            let x = (c[0] - lb.pad_x) / lb.scale / width;
            let y = (c[1] - lb.pad_y) / lb.scale / height;
            // Depth shares the x scale.
            let z = c[2] / lb.scale / width;
            Point {
                x: x as f64,
                y: y as f64,
                z: z as f64,
            }
        })
        .collect();

    Ok(LandmarkSet::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::FACE_MESH_POINTS;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_landscape() {
        let lb = letterbox(640, 480, 192);
        assert_relative_eq!(lb.scale, 0.3);
        assert_eq!(lb.new_w, 192);
        assert_eq!(lb.new_h, 144);
        assert_relative_eq!(lb.pad_x, 0.0);
        assert_relative_eq!(lb.pad_y, 24.0);
    }

    #[test]
    fn test_letterbox_tiny_frame_never_zero() {
        let lb = letterbox(1000, 1, 192);
        assert_eq!(lb.new_h, 1);
    }

    #[test]
    fn test_decode_maps_back_to_frame() {
        let lb = letterbox(640, 480, 192);
        // Frame pixel (320, 240) lands at (96, 96) in input space.
        let coords = [96.0, 96.0, 0.0, 0.0, 24.0, 0.0];
        let set = decode_landmarks(&coords, &lb, 640.0, 480.0).unwrap();
        assert_eq!(set.len(), 2);
        let p = set.get(0).unwrap();
        assert_relative_eq!(p.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(p.y, 0.5, epsilon = 1e-5);
        let q = set.get(1).unwrap();
        assert_relative_eq!(q.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(q.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_decode_full_mesh_length() {
        let lb = letterbox(192, 192, 192);
        let coords = vec![10.0f32; FACE_MESH_POINTS * 3];
        let set = decode_landmarks(&coords, &lb, 192.0, 192.0).unwrap();
        assert_eq!(set.len(), FACE_MESH_POINTS);
    }

    #[test]
    fn test_decode_rejects_ragged_tensor() {
        let lb = letterbox(192, 192, 192);
        assert!(matches!(
            decode_landmarks(&[1.0, 2.0], &lb, 192.0, 192.0),
            Err(DetectorError::InferenceFailed(_))
        ));
    }

    #[test]
    fn test_sigmoid_threshold() {
        assert!(sigmoid(0.0) <= MESH_PRESENCE_THRESHOLD);
        assert!(sigmoid(0.1) > MESH_PRESENCE_THRESHOLD);
        assert!(sigmoid(f32::NEG_INFINITY) <= MESH_PRESENCE_THRESHOLD);
    }

    #[test]
    fn test_load_missing_model() {
        assert!(matches!(
            FaceMeshDetector::load("/nonexistent/face_mesh.onnx"),
            Err(DetectorError::ModelNotFound(_))
        ));
    }
}
