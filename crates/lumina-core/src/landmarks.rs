//! Face-mesh landmark set and the index positions the engine depends on.
//!
//! Points are normalized to [0, 1] relative to the frame (x to the right,
//! y downwards). Index positions follow the 478-point MediaPipe face mesh
//! (468 mesh points plus 10 iris points).

use serde::{Deserialize, Serialize};

/// Brow reference between the eyebrows.
pub const GLABELLA: usize = 10;
/// Lowest point of the chin.
pub const CHIN: usize = 152;
/// Base of the nose, used as an annotation anchor.
pub const NOSE_BASE: usize = 2;
/// Outer top edge of the upper lip.
pub const UPPER_LIP_TOP: usize = 12;
/// Inner center of the upper lip.
pub const UPPER_LIP: usize = 13;
/// Inner center of the lower lip.
pub const LOWER_LIP: usize = 14;
/// Left mouth corner (commissure). Also stands in for the left canine tip.
pub const MOUTH_LEFT: usize = 61;
/// Right mouth corner (commissure). Also stands in for the right canine tip.
pub const MOUTH_RIGHT: usize = 291;
/// Left iris center (only present with iris refinement).
pub const LEFT_PUPIL: usize = 468;
/// Right iris center (only present with iris refinement).
pub const RIGHT_PUPIL: usize = 473;
/// Landmark inside the left dental segment, paired with [`MOUTH_LEFT`] for cant.
pub const LEFT_TEETH_MID: usize = 84;
/// Landmark inside the right dental segment, paired with [`MOUTH_RIGHT`] for cant.
pub const RIGHT_TEETH_MID: usize = 314;

/// Lower lip contour from the left to the right commissure (smile line).
pub const LOWER_LIP_CONTOUR: [usize; 11] = [61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291];

/// Upper inner lip contour from left to right, approximating the gingival line.
pub const UPPER_INNER_LIP: [usize; 11] = [78, 191, 80, 81, 82, 13, 312, 311, 310, 415, 308];

/// Points along the anterior teeth, left to right.
pub const ANTERIOR_TEETH: [usize; 7] = [82, 83, 84, 13, 314, 315, 316];

/// Total points produced by a face mesh with iris refinement.
pub const FACE_MESH_POINTS: usize = 478;

/// A single normalized landmark.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Relative depth; unused by the 2D measurements.
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Convert to pixel coordinates for a frame of the given size.
    pub fn to_pixels(self, width: f64, height: f64) -> (f32, f32) {
        ((self.x * width) as f32, (self.y * height) as f32)
    }
}

/// Ordered landmarks for one detected face.
///
/// Lookups are bounds-checked: a set produced by a detector without iris
/// refinement simply has no points at [`LEFT_PUPIL`] / [`RIGHT_PUPIL`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// A set of `len` points all placed at `fill`.
    pub fn filled(len: usize, fill: Point) -> Self {
        Self { points: vec![fill; len] }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `index`, or `None` when the detector did not produce it.
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Points for every index in `indices`, or `None` if any is missing.
    pub fn contour(&self, indices: &[usize]) -> Option<Vec<Point>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    /// Overwrite a point. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, point: Point) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = point;
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}
