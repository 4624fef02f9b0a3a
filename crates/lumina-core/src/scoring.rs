//! Harmony scoring, threshold recommendations and smile classification.

use crate::landmarks::LandmarkSet;
use crate::measurement::compute_measurements;
use crate::types::{AnalysisResult, Measurements, SmilePathway};
use std::collections::BTreeMap;

// --- Clinical ideals ---
const IDEAL_WL_RATIO: f64 = 78.0;
const IDEAL_GOLDEN_RATIO: f64 = 62.0;
const GINGIVAL_SYMMETRY_FLOOR: f64 = 80.0;
const HARMONY_DEVIATION_CAP: f64 = 50.0;

/// Shown when no recommendation rule fires.
pub const WITHIN_PARAMETERS: &str =
    "✓ Smile analysis within esthetic parameters - Maintenance plan recommended";

const BALANCED_CLASSIFICATION: &str = "Balanced Smile Characteristics";

/// Fixed per-metric confidence percentages.
///
/// Not derived from the frame: the landmark source exposes no per-point
/// visibility yet. Replace with visibility-based values once it does.
pub const MEASUREMENT_CONFIDENCE: [(&str, u8); 9] = [
    ("W/L", 92),
    ("GR-L", 88),
    ("Sym", 85),
    ("Cant", 87),
    ("VDO", 90),
    ("Conv", 83),
    ("RestTooth", 86),
    ("Pathway", 89),
    ("IcW", 91),
];

/// Scoring output for one set of measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub overall_harmony: u8,
    pub recommendations: Vec<String>,
    pub classification_notes: String,
    pub confidence: BTreeMap<String, u8>,
}

/// Score measurements: harmony, recommendations, classification, confidence.
pub fn score(m: &Measurements) -> Score {
    Score {
        overall_harmony: overall_harmony(m),
        recommendations: recommendations(m),
        classification_notes: classification(m),
        confidence: MEASUREMENT_CONFIDENCE
            .iter()
            .map(|&(name, pct)| (name.to_string(), pct))
            .collect(),
    }
}

/// Measure and score one face in a frame of the given pixel size.
pub fn analyze(landmarks: &LandmarkSet, frame_width: u32, frame_height: u32) -> AnalysisResult {
    let measurements = compute_measurements(landmarks, frame_width, frame_height);
    let score = score(&measurements);
    AnalysisResult {
        measurements,
        overall_harmony: score.overall_harmony,
        clinical_recommendations: score.recommendations,
        classification_notes: score.classification_notes,
        measurement_confidence: score.confidence,
    }
}

/// 100 minus the mean of six deviations, rounded and clamped to [0, 100].
///
/// Only facial midline, W/L ratio, both golden ratios, gingival symmetry
/// shortfall and smile arc participate.
pub fn overall_harmony(m: &Measurements) -> u8 {
    let deviations = [
        m.facial_midline_deviation.min(HARMONY_DEVIATION_CAP),
        percent_off(m.central_incisors_wl_ratio, IDEAL_WL_RATIO),
        percent_off(m.golden_ratio_lateral, IDEAL_GOLDEN_RATIO),
        percent_off(m.golden_ratio_canine, IDEAL_GOLDEN_RATIO),
        if m.gingival_symmetry < GINGIVAL_SYMMETRY_FLOOR {
            GINGIVAL_SYMMETRY_FLOOR - m.gingival_symmetry
        } else {
            0.0
        },
        m.smile_arc_deviation.min(HARMONY_DEVIATION_CAP),
    ];
    let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
    let harmony = (100.0 - mean).round();
    if harmony.is_nan() {
        0
    } else {
        harmony.clamp(0.0, 100.0) as u8
    }
}

fn percent_off(value: f64, ideal: f64) -> f64 {
    (value - ideal).abs() / ideal * 100.0
}

/// Threshold rules in fixed order; each fires independently.
pub fn recommendations(m: &Measurements) -> Vec<String> {
    let mut out = Vec::new();

    if m.facial_midline_deviation > 2.0 {
        out.push("⚠ Facial midline deviation >2mm - Consider orthodontic midline correction".to_string());
    }
    if m.midline_deviation.abs() > 1.5 {
        out.push("⚠ Dental-facial midline discrepancy - Plan anterior repositioning".to_string());
    }
    if (m.central_incisors_wl_ratio - IDEAL_WL_RATIO).abs() > 12.0 {
        out.push(format!(
            "⚠ Central incisor W/L ratio {:.0}% (ideal 78%) - Dimensional adjustment needed",
            m.central_incisors_wl_ratio
        ));
    }
    if (m.golden_ratio_lateral - IDEAL_GOLDEN_RATIO).abs() > 10.0 {
        out.push("⚠ Golden ratio deviation - Consider lateral incisor width adjustment".to_string());
    }
    if m.gingival_symmetry < GINGIVAL_SYMMETRY_FLOOR {
        out.push(format!(
            "⚠ Gingival asymmetry {:.0}% - Plan periodontal contouring",
            m.gingival_symmetry
        ));
    }
    if m.smile_arc_deviation > 40.0 {
        out.push("⚠ Smile arc deviation - Orthodontic or restorative correction indicated".to_string());
    }
    if m.buccal_corridors > 4.5 {
        out.push(
            "⚠ Excessive buccal corridors - Consider smile arc expansion via implants or orthodontics"
                .to_string(),
        );
    }
    if m.smile_fullness < 60.0 {
        out.push("⚠ Limited smile fullness - Evaluate VDO and posterior support".to_string());
    }
    if m.smile_fullness > 100.0 {
        out.push(
            "⚠ Excessive gingival display - Consider orthognathic surgery or lip reposition".to_string(),
        );
    }
    if m.occlusal_plane_cant > 2.0 {
        out.push(format!(
            "⚠ Occlusal plane cant {:.1}° - Plan orthodontic plane correction",
            m.occlusal_plane_cant
        ));
    }
    if m.max_incisor_edge() > 5.0 {
        out.push("⚠ Incisor edge step detected - Individual tooth repositioning indicated".to_string());
    }
    if m.lip_support_score < 70.0 {
        out.push("⚠ Limited lip support - Evaluate vertical dimension and posterior support".to_string());
    }
    if m.vertical_dimension_ratio < 42.0 || m.vertical_dimension_ratio > 48.0 {
        out.push(format!(
            "⚠ VDO Ratio {:.1}% (ideal 43-45%) - Evaluate posterior support and VDO",
            m.vertical_dimension_ratio
        ));
    }
    if m.smile_convexity_score < 50.0 {
        out.push("⚠ Smile line lacks convexity - Consider orthodontic smile arc correction".to_string());
    }
    if m.tooth_visibility_at_rest > 25.0 {
        out.push(format!(
            "⚠ {:.0}% tooth show at rest - Typical gummy smile presentation",
            m.tooth_visibility_at_rest
        ));
    }
    if m.smile_animation_pathway == SmilePathway::VerticalDominant {
        out.push(
            "△ Smile shows primarily vertical movement - May benefit from buccal corridor expansion"
                .to_string(),
        );
    }

    if out.is_empty() {
        out.push(WITHIN_PARAMETERS.to_string());
    }
    out
}

/// Pipe-delimited smile classification label.
pub fn classification(m: &Measurements) -> String {
    let mut labels = Vec::new();
    if m.smile_fullness > 80.0 {
        labels.push("High/Gummy Smile");
    }
    if m.smile_fullness < 50.0 {
        labels.push("Low Smile");
    }
    if m.buccal_corridors > 4.0 {
        labels.push("Buccal Corridors Present");
    }
    if m.gingival_symmetry < GINGIVAL_SYMMETRY_FLOOR {
        labels.push("Asymmetrical Gingiva");
    }

    if labels.is_empty() {
        BALANCED_CLASSIFICATION.to_string()
    } else {
        labels.join(" | ")
    }
}
