//! Measurement engine: geometric smile-design ratios from face-mesh landmarks.
//!
//! Every derivation works on normalized landmark coordinates scaled by the
//! frame's pixel size. Scaling factors (×10, ×100, ...) are empirical
//! conversions to approximate millimeters and percentages.

use crate::landmarks::{
    LandmarkSet, Point, ANTERIOR_TEETH, CHIN, GLABELLA, LEFT_TEETH_MID, LOWER_LIP,
    LOWER_LIP_CONTOUR, MOUTH_LEFT, MOUTH_RIGHT, RIGHT_TEETH_MID, UPPER_INNER_LIP, UPPER_LIP,
};
use crate::types::{Measurements, SmilePathway};

// --- Named constants ---
const FRAME_CENTER_X: f64 = 0.5;
const MIDLINE_SCALE: f64 = 10.0;
/// Share of the mouth width taken by each tooth band, center outwards.
const CENTRAL_BAND: f64 = 0.35;
const LATERAL_BAND: f64 = 0.25;
const CANINE_BAND: f64 = 0.20;
const WL_RATIO_MIN: f64 = 50.0;
const WL_RATIO_MAX: f64 = 100.0;
const SMILE_ARC_SCALE: f64 = 50.0;
const SMILE_ARC_CAP: f64 = 100.0;
const GINGIVAL_SCALE: f64 = 100.0;
const GINGIVAL_SYMMETRY_PENALTY: f64 = 5.0;
/// Number of contour points compared on each side for gingival symmetry.
const GINGIVAL_SIDE_POINTS: usize = 3;
const BUCCAL_SCALE: f64 = 10.0;
const CANINE_EXPECTED_OFFSET: f64 = 0.15;
const INCISOR_EDGE_CAP: f64 = 50.0;
/// Lip support reaches 100 when the commissure span equals 30% of frame height.
const LIP_SUPPORT_REFERENCE: f64 = 0.3;
const LIP_SUPPORT_CAP: f64 = 100.0;
const VDO_DEFAULT: f64 = 50.0;
const CONVEXITY_SCALE: f64 = 500.0;
const CONVEXITY_CAP: f64 = 100.0;
const REST_VISIBILITY_SCALE: f64 = 200.0;
const REST_VISIBILITY_CAP: f64 = 30.0;
/// Assumed horizontal mouth expansion from rest to full smile.
const SMILE_EXPANSION: f64 = 1.15;
const PATHWAY_DOMINANCE: f64 = 2.0;
const INTERCANINE_SCALE: f64 = 0.15;

/// Compute all smile-design measurements for one face.
///
/// Derivations run in a fixed order. If a landmark the next derivation needs
/// is missing, derivation stops there: fields computed so far are kept and the
/// rest stay at their clinical defaults. Non-finite results (zero-area frames,
/// zero denominators) fall back to the field default. Never panics.
pub fn compute_measurements(
    landmarks: &LandmarkSet,
    frame_width: u32,
    frame_height: u32,
) -> Measurements {
    let mut m = Measurements::default();
    let w = f64::from(frame_width);
    let h = f64::from(frame_height);

    if derive(&mut m, landmarks, w, h).is_none() {
        tracing::trace!(
            points = landmarks.len(),
            "landmark missing, remaining measurements left at defaults"
        );
    }

    m.sanitize();
    m
}

fn derive(m: &mut Measurements, lm: &LandmarkSet, w: f64, h: f64) -> Option<()> {
    let glabella = lm.get(GLABELLA)?;
    let chin = lm.get(CHIN)?;
    let facial_mid_x = (glabella.x + chin.x) / 2.0;
    m.facial_midline_deviation = ((facial_mid_x - FRAME_CENTER_X) * MIDLINE_SCALE).abs();

    let upper_lip = lm.get(UPPER_LIP)?;
    m.midline_deviation = ((upper_lip.x - facial_mid_x) * MIDLINE_SCALE).abs();

    let left_corner = lm.get(MOUTH_LEFT)?;
    let right_corner = lm.get(MOUTH_RIGHT)?;
    let lower_lip = lm.get(LOWER_LIP)?;
    let mouth_width = (right_corner.x - left_corner.x).abs() * w;
    let mouth_height = (lower_lip.y - upper_lip.y).abs() * h;

    let central_width = mouth_width * CENTRAL_BAND;
    m.central_incisors_wl_ratio =
        (central_width / nonzero_or_one(mouth_height) * 100.0).clamp(WL_RATIO_MIN, WL_RATIO_MAX);

    let lateral_width = mouth_width * LATERAL_BAND;
    let canine_width = mouth_width * CANINE_BAND;
    m.golden_ratio_lateral = lateral_width / central_width * 100.0;
    m.golden_ratio_canine = canine_width / lateral_width * 100.0;

    m.red_proportion = m.central_incisors_wl_ratio;

    let smile_line = lm.contour(&LOWER_LIP_CONTOUR)?;
    let arc: f64 = smile_line.windows(2).map(|p| (p[1].y - p[0].y).abs()).sum();
    m.smile_arc_deviation = (arc * SMILE_ARC_SCALE).min(SMILE_ARC_CAP);

    let gingival_line = lm.contour(&UPPER_INNER_LIP)?;
    m.gingival_margin_dev = gingival_line
        .iter()
        .map(|p| (p.y - upper_lip.y).abs() * GINGIVAL_SCALE)
        .collect();
    m.gingival_symmetry = gingival_symmetry(&m.gingival_margin_dev);

    let mouth_display = (upper_lip.y - lower_lip.y).abs() * h;
    let face_height = (glabella.y - chin.y).abs() * h;
    m.smile_fullness = mouth_display / nonzero_or_one(face_height) * 100.0;

    // Signed span: corridors go negative when the corners are reported swapped.
    let cheek_width = (right_corner.x - left_corner.x) * w;
    m.buccal_corridors = (cheek_width - mouth_width) / 2.0 / BUCCAL_SCALE;

    let canine_expected_x =
        left_corner.x + (right_corner.x - left_corner.x) * CANINE_EXPECTED_OFFSET;
    m.canine_position_dev = ((right_corner.x - canine_expected_x) * 100.0).abs();

    let teeth = lm.contour(&ANTERIOR_TEETH)?;
    m.tooth_tilt = teeth
        .windows(2)
        .map(|p| (p[1].y - p[0].y).atan2(p[1].x - p[0].x).to_degrees().abs())
        .collect();

    let left_teeth_mid = lm.get(LEFT_TEETH_MID)?;
    let right_teeth_mid = lm.get(RIGHT_TEETH_MID)?;
    let left_edge = (left_corner.y + left_teeth_mid.y) / 2.0;
    let right_edge = (right_corner.y + right_teeth_mid.y) / 2.0;
    m.occlusal_plane_cant = ((left_edge - right_edge) * 100.0).abs();

    m.incisor_edge_positions = incisor_edge_positions(&teeth);

    if h > 0.0 {
        let support_span = (right_corner.x - left_corner.x).abs() * w;
        m.lip_support_score =
            (support_span / (h * LIP_SUPPORT_REFERENCE) * 100.0).min(LIP_SUPPORT_CAP);
    }

    m.profile_analysis_needed = true;

    let lower_face = (upper_lip.y - chin.y).abs() * h;
    m.vertical_dimension_ratio = if face_height > 0.0 {
        lower_face / face_height * 100.0
    } else {
        VDO_DEFAULT
    };

    m.smile_convexity_score = (convexity(&smile_line) * CONVEXITY_SCALE).min(CONVEXITY_CAP);

    let lip_gap = (lower_lip.y - upper_lip.y).abs();
    m.tooth_visibility_at_rest = (lip_gap * REST_VISIBILITY_SCALE).min(REST_VISIBILITY_CAP);

    m.smile_animation_pathway = animation_pathway(lm, mouth_width, h)?;

    m.intercanine_width = (left_corner.x - right_corner.x).abs() * w * INTERCANINE_SCALE;

    Some(())
}

/// 100 minus the penalized left/right mismatch of the outermost margin deviations.
///
/// The first three deviations are paired with the last three in reverse, so
/// the score is unchanged when the contour is mirrored.
pub fn gingival_symmetry(deviations: &[f64]) -> f64 {
    let n = deviations.len();
    let side = GINGIVAL_SIDE_POINTS.min(n.saturating_sub(GINGIVAL_SIDE_POINTS));
    let diff: f64 = (0..side)
        .map(|i| (deviations[i] - deviations[n - 1 - i]).abs())
        .sum();
    (100.0 - diff * GINGIVAL_SYMMETRY_PENALTY).max(0.0)
}

fn incisor_edge_positions(teeth: &[Point]) -> Vec<f64> {
    let mean_y = teeth.iter().map(|p| p.y).sum::<f64>() / teeth.len() as f64;
    teeth
        .iter()
        .map(|p| ((p.y - mean_y).abs() * 100.0).min(INCISOR_EDGE_CAP))
        .collect()
}

/// Sum of each interior point's vertical offset from its neighbours' midpoint.
fn convexity(curve: &[Point]) -> f64 {
    curve
        .windows(3)
        .map(|p| ((p[0].y + p[2].y) / 2.0 - p[1].y).abs())
        .sum()
}

fn animation_pathway(lm: &LandmarkSet, rest_mouth_width: f64, h: f64) -> Option<SmilePathway> {
    // Rest and smile lip positions come from the same frame, so the lift is
    // always zero and the pathway is decided by horizontal expansion alone.
    let lip_at_rest = lm.get(UPPER_LIP)?;
    let lip_at_smile = lm.get(UPPER_LIP)?;
    let lip_elevation = (lip_at_smile.y - lip_at_rest.y).abs() * h;

    let horizontal = rest_mouth_width * SMILE_EXPANSION - rest_mouth_width;
    Some(if horizontal > lip_elevation * PATHWAY_DOMINANCE {
        SmilePathway::HorizontalDominant
    } else if lip_elevation > horizontal * PATHWAY_DOMINANCE {
        SmilePathway::VerticalDominant
    } else {
        SmilePathway::Balanced
    })
}

/// Zero (or NaN) denominators fall back to 1.
fn nonzero_or_one(v: f64) -> f64 {
    if v == 0.0 || v.is_nan() {
        1.0
    } else {
        v
    }
}
