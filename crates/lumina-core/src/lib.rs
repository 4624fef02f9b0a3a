//! lumina-core — Digital Smile Design analysis engine.
//!
//! Turns a normalized face-mesh landmark set into clinical smile measurements,
//! a harmony score with rule-based recommendations, and printable reports.
//! Landmarks come from an external face-mesh model behind [`LandmarkDetector`].

pub mod detector;
pub mod landmarks;
pub mod measurement;
pub mod planning;
pub mod report;
pub mod scoring;
pub mod types;

pub use detector::{DetectorError, FaceMeshDetector, LandmarkDetector};
pub use landmarks::{LandmarkSet, Point};
pub use measurement::compute_measurements;
pub use planning::PlanTargets;
pub use scoring::{analyze, score, Score};
pub use types::{AnalysisResult, Measurements, SmilePathway};
