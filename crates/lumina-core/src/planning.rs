//! Treatment-plan targets and their projected harmony.

use crate::types::Measurements;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Planning ideals ---
const IDEAL_WL: f64 = 78.0;
const IDEAL_GOLDEN: f64 = 62.0;
const IDEAL_GINGIVAL: f64 = 90.0;
const IDEAL_CONVEXITY: f64 = 75.0;
const IDEAL_VDO: f64 = 45.0;

/// Five adjustable targets a clinician plans toward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTargets {
    pub wl_ratio: f64,
    pub golden_ratio: f64,
    pub gingival_sym: f64,
    pub smile_convexity: f64,
    pub vdo_ratio: f64,
}

impl Default for PlanTargets {
    fn default() -> Self {
        Self {
            wl_ratio: 78.0,
            golden_ratio: 62.0,
            gingival_sym: 85.0,
            smile_convexity: 70.0,
            vdo_ratio: 45.0,
        }
    }
}

impl PlanTargets {
    /// Start a plan from a live analysis.
    pub fn from_measurements(m: &Measurements) -> Self {
        Self {
            wl_ratio: m.central_incisors_wl_ratio,
            golden_ratio: m.golden_ratio_lateral,
            gingival_sym: m.gingival_symmetry,
            smile_convexity: m.smile_convexity_score,
            vdo_ratio: m.vertical_dimension_ratio,
        }
    }

    /// Start a plan from an archived patient's measurement map.
    ///
    /// Accepts either the planner keys (`wlRatio`, ...) or the full
    /// measurement names (`centralIncisorsWLRatio`, ...). Missing, zero or
    /// non-finite entries fall back to the defaults.
    pub fn from_record(map: &BTreeMap<String, f64>) -> Self {
        let d = Self::default();
        let pick = |keys: [&str; 2], default: f64| {
            keys.iter()
                .filter_map(|k| map.get(*k).copied())
                .find(|v| v.is_finite() && *v != 0.0)
                .unwrap_or(default)
        };
        Self {
            wl_ratio: pick(["wlRatio", "centralIncisorsWLRatio"], d.wl_ratio),
            golden_ratio: pick(["goldenRatio", "goldenRatioLateral"], d.golden_ratio),
            gingival_sym: pick(["gingivalSym", "gingivalSymmetry"], d.gingival_sym),
            smile_convexity: pick(["smileConvexity", "smileConvexityScore"], d.smile_convexity),
            vdo_ratio: pick(["vdoRatio", "verticalDimensionRatio"], d.vdo_ratio),
        }
    }

    /// 100 minus the mean percentage deviation from the ideals, floored at 0.
    pub fn harmony(&self) -> f64 {
        let deviations = [
            off(self.wl_ratio, IDEAL_WL),
            off(self.golden_ratio, IDEAL_GOLDEN),
            off(self.gingival_sym, IDEAL_GINGIVAL),
            off(self.smile_convexity, IDEAL_CONVEXITY),
            off(self.vdo_ratio, IDEAL_VDO),
        ];
        let mean = deviations.iter().sum::<f64>() / deviations.len() as f64;
        let harmony = 100.0 - mean;
        if harmony.is_nan() {
            0.0
        } else {
            harmony.max(0.0)
        }
    }

    /// Harmony as stored with a saved plan: rounded, no decimals.
    pub fn harmony_label(&self) -> String {
        format!("{:.0}", self.harmony())
    }

    /// Procedures the targets call for.
    pub fn specs(&self) -> Vec<&'static str> {
        let mut specs = Vec::new();
        if self.wl_ratio < 75.0 {
            specs.push("⚠ Central incisor width expansion needed");
        }
        if self.golden_ratio < 60.0 {
            specs.push("⚠ Lateral incisor width adjustment required");
        }
        if self.gingival_sym < 80.0 {
            specs.push("⚠ Periodontal contouring for symmetry");
        }
        if self.smile_convexity < 60.0 {
            specs.push("⚠ Smile arc orthodontic correction");
        }
        if self.vdo_ratio > 48.0 {
            specs.push("⚠ Excessive vertical dimension - posterior support evaluation");
        }
        specs
    }
}

fn off(value: f64, ideal: f64) -> f64 {
    (value - ideal).abs() / ideal * 100.0
}
