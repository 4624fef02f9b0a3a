//! Persisted record shapes.
//!
//! Field names are camelCase on disk. Patient and plan records keep any
//! unknown fields so imported data round-trips unchanged.

use chrono::{DateTime, Local};
use lumina_core::{AnalysisResult, PlanTargets};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const RECENT_ANALYSES: usize = 5;

/// Metrics archived per patient, with their display labels.
pub const PATIENT_METRICS: [(&str, &str); 5] = [
    ("centralIncisorsWLRatio", "W/L Ratio"),
    ("goldenRatioLateral", "Golden Ratio"),
    ("gingivalSymmetry", "Gingival Sym"),
    ("smileConvexityScore", "Convexity"),
    ("verticalDimensionRatio", "VDO Ratio"),
];

pub(crate) fn date_label(at: &DateTime<Local>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

pub(crate) fn time_label(at: &DateTime<Local>) -> String {
    at.format("%-I:%M:%S %p").to_string()
}

/// A composited frame captured together with its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub date: String,
    pub time: String,
    /// `data:image/jpeg;base64,...`
    pub image: String,
    pub analysis: Option<AnalysisResult>,
}

impl Snapshot {
    pub fn new(image: String, analysis: Option<AnalysisResult>, at: DateTime<Local>) -> Self {
        Self {
            id: at.timestamp_millis(),
            date: date_label(&at),
            time: time_label(&at),
            image,
            analysis,
        }
    }
}

/// One archived patient analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: i64,
    pub date: String,
    pub patient_name: String,
    pub harmony: f64,
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PatientRecord {
    /// Archive a live analysis under the patient's name.
    pub fn from_analysis(
        patient_name: &str,
        analysis: &AnalysisResult,
        notes: &str,
        at: DateTime<Local>,
    ) -> Self {
        let m = &analysis.measurements;
        let measurements = [
            ("centralIncisorsWLRatio", m.central_incisors_wl_ratio),
            ("goldenRatioLateral", m.golden_ratio_lateral),
            ("gingivalSymmetry", m.gingival_symmetry),
            ("smileConvexityScore", m.smile_convexity_score),
            ("verticalDimensionRatio", m.vertical_dimension_ratio),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            id: at.timestamp_millis(),
            date: date_label(&at),
            patient_name: patient_name.to_string(),
            harmony: analysis.overall_harmony as f64,
            measurements,
            notes: notes.to_string(),
            extra: Map::new(),
        }
    }

    /// Stored value of `key`; missing metrics read as 0.
    pub fn metric(&self, key: &str) -> f64 {
        self.measurements.get(key).copied().unwrap_or(0.0)
    }

    /// Per-metric comparison against `later`, in [`PATIENT_METRICS`] order.
    pub fn compare(&self, later: &PatientRecord) -> Vec<MetricDelta> {
        PATIENT_METRICS
            .iter()
            .map(|&(key, label)| {
                let (first, second) = (self.metric(key), later.metric(key));
                MetricDelta {
                    key,
                    label,
                    first,
                    second,
                    delta: second - first,
                }
            })
            .collect()
    }
}

/// One metric of two archived patients side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub key: &'static str,
    pub label: &'static str,
    pub first: f64,
    pub second: f64,
    /// `second - first`
    pub delta: f64,
}

impl MetricDelta {
    /// Signed delta to one decimal; increases carry a leading `+`.
    pub fn delta_label(&self) -> String {
        if self.delta > 0.0 {
            format!("+{:.1}", self.delta)
        } else {
            format!("{:.1}", self.delta)
        }
    }
}

/// A saved treatment plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: i64,
    pub date: String,
    pub measurements: PlanTargets,
    /// Rounded harmony, stored as text.
    pub harmony: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreatmentPlan {
    pub fn new(targets: PlanTargets, at: DateTime<Local>) -> Self {
        Self {
            id: at.timestamp_millis(),
            date: date_label(&at),
            measurements: targets,
            harmony: targets.harmony_label(),
            extra: Map::new(),
        }
    }
}

/// Clinic profile shown on reports and prescriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClinicSettings {
    pub clinic_name: String,
    pub doctor_name: String,
    pub license_number: String,
    pub contact_info: String,
    pub theme: String,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            clinic_name: "Dental Clinic".to_string(),
            doctor_name: "Dr. Smith".to_string(),
            license_number: "DDS-12345".to_string(),
            contact_info: "info@clinic.com".to_string(),
            theme: "dark".to_string(),
        }
    }
}

impl ClinicSettings {
    /// Set one field by its camelCase name. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            "clinicName" => &mut self.clinic_name,
            "doctorName" => &mut self.doctor_name,
            "licenseNumber" => &mut self.license_number,
            "contactInfo" => &mut self.contact_info,
            "theme" => &mut self.theme,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }
}

/// Full data export. Sections absent on import are left untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ClinicSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patients: Option<Vec<PatientRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<Snapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plans: Option<Vec<TreatmentPlan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Summary figures over the archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: usize,
    pub treatment_plans: usize,
    /// Mean archived harmony, `None` for an empty archive.
    pub avg_harmony: Option<f64>,
    /// Most recent archived analyses, newest first.
    pub recent: Vec<PatientRecord>,
}

impl DashboardStats {
    pub fn compute(patients: &[PatientRecord], plans: &[TreatmentPlan]) -> Self {
        let avg_harmony = if patients.is_empty() {
            None
        } else {
            Some(patients.iter().map(|p| p.harmony).sum::<f64>() / patients.len() as f64)
        };
        Self {
            total_patients: patients.len(),
            treatment_plans: plans.len(),
            avg_harmony,
            recent: patients.iter().rev().take(RECENT_ANALYSES).cloned().collect(),
        }
    }
}
