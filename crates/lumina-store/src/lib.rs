//! lumina-store — Flat JSON persistence for captured analyses and clinic data.
//!
//! Each collection lives in its own `<dir>/<key>.json` file. Writes go to a
//! temporary sibling first and are renamed into place.

pub mod records;
pub mod store;

pub use records::{
    Backup, ClinicSettings, DashboardStats, MetricDelta, PatientRecord, Snapshot, TreatmentPlan, PATIENT_METRICS,
};
pub use store::{ImportSummary, Store, StoreError};
