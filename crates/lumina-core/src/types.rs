use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How the lips move from rest to full smile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmilePathway {
    #[serde(rename = "Horizontal-Dominant")]
    HorizontalDominant,
    #[serde(rename = "Vertical-Dominant")]
    VerticalDominant,
    #[default]
    Balanced,
}

impl fmt::Display for SmilePathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HorizontalDominant => "Horizontal-Dominant",
            Self::VerticalDominant => "Vertical-Dominant",
            Self::Balanced => "Balanced",
        })
    }
}

/// Clinical smile-design measurements for one frame.
///
/// Distances are in approximate millimeters, ratios in percent. Every field
/// always holds a finite value: [`Measurements::default`] gives the clinically
/// neutral value used whenever a derivation cannot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    pub facial_midline_deviation: f64,
    #[serde(rename = "centralIncisorsWLRatio")]
    pub central_incisors_wl_ratio: f64,
    pub golden_ratio_lateral: f64,
    pub golden_ratio_canine: f64,
    /// Recurring Esthetic Dental proportion.
    pub red_proportion: f64,
    pub smile_arc_deviation: f64,
    /// One deviation per upper inner lip contour point.
    pub gingival_margin_dev: Vec<f64>,
    pub gingival_symmetry: f64,
    /// Dental midline offset from the facial midline.
    pub midline_deviation: f64,
    /// Vertical mouth opening over face height; above 100 signals excessive display.
    pub smile_fullness: f64,
    pub canine_position_dev: f64,
    pub buccal_corridors: f64,
    /// Angles in degrees between successive anterior teeth points.
    pub tooth_tilt: Vec<f64>,
    pub occlusal_plane_cant: f64,
    pub incisor_edge_positions: Vec<f64>,
    pub lip_support_score: f64,
    pub profile_analysis_needed: bool,
    /// Lower face height as a percentage of total face height.
    pub vertical_dimension_ratio: f64,
    pub smile_convexity_score: f64,
    pub tooth_visibility_at_rest: f64,
    pub smile_animation_pathway: SmilePathway,
    pub intercanine_width: f64,
}

impl Default for Measurements {
    fn default() -> Self {
        Self {
            facial_midline_deviation: 0.0,
            central_incisors_wl_ratio: 78.0,
            golden_ratio_lateral: 62.0,
            golden_ratio_canine: 62.0,
            red_proportion: 70.0,
            smile_arc_deviation: 0.0,
            gingival_margin_dev: vec![0.0; 6],
            gingival_symmetry: 95.0,
            midline_deviation: 0.0,
            smile_fullness: 85.0,
            canine_position_dev: 0.0,
            buccal_corridors: 2.5,
            tooth_tilt: vec![0.0; 6],
            occlusal_plane_cant: 0.0,
            incisor_edge_positions: vec![0.0; 6],
            lip_support_score: 85.0,
            profile_analysis_needed: true,
            vertical_dimension_ratio: 50.0,
            smile_convexity_score: 70.0,
            tooth_visibility_at_rest: 0.0,
            smile_animation_pathway: SmilePathway::Balanced,
            intercanine_width: 35.0,
        }
    }
}

impl Measurements {
    /// Replace every non-finite value with its default.
    pub fn sanitize(&mut self) {
        let d = Self::default();
        fix(&mut self.facial_midline_deviation, d.facial_midline_deviation);
        fix(&mut self.central_incisors_wl_ratio, d.central_incisors_wl_ratio);
        fix(&mut self.golden_ratio_lateral, d.golden_ratio_lateral);
        fix(&mut self.golden_ratio_canine, d.golden_ratio_canine);
        fix(&mut self.red_proportion, d.red_proportion);
        fix(&mut self.smile_arc_deviation, d.smile_arc_deviation);
        fix_all(&mut self.gingival_margin_dev);
        fix(&mut self.gingival_symmetry, d.gingival_symmetry);
        fix(&mut self.midline_deviation, d.midline_deviation);
        fix(&mut self.smile_fullness, d.smile_fullness);
        fix(&mut self.canine_position_dev, d.canine_position_dev);
        fix(&mut self.buccal_corridors, d.buccal_corridors);
        fix_all(&mut self.tooth_tilt);
        fix(&mut self.occlusal_plane_cant, d.occlusal_plane_cant);
        fix_all(&mut self.incisor_edge_positions);
        fix(&mut self.lip_support_score, d.lip_support_score);
        fix(&mut self.vertical_dimension_ratio, d.vertical_dimension_ratio);
        fix(&mut self.smile_convexity_score, d.smile_convexity_score);
        fix(&mut self.tooth_visibility_at_rest, d.tooth_visibility_at_rest);
        fix(&mut self.intercanine_width, d.intercanine_width);
    }

    /// Largest incisor edge deviation, 0 when none were measured.
    pub fn max_incisor_edge(&self) -> f64 {
        self.incisor_edge_positions.iter().copied().fold(0.0, f64::max)
    }
}

fn fix(value: &mut f64, default: f64) {
    if !value.is_finite() {
        *value = default;
    }
}

fn fix_all(values: &mut [f64]) {
    for v in values.iter_mut() {
        fix(v, 0.0);
    }
}

/// Full analysis of one frame, as shown live and persisted in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub measurements: Measurements,
    /// 0–100, higher is closer to the esthetic ideals.
    pub overall_harmony: u8,
    pub clinical_recommendations: Vec<String>,
    pub classification_notes: String,
    /// Confidence percentage keyed by short metric name ("W/L", "VDO", ...).
    pub measurement_confidence: BTreeMap<String, u8>,
}
