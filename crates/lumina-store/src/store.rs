//! Key-per-file JSON store.

use crate::records::{Backup, ClinicSettings, DashboardStats, PatientRecord, Snapshot, TreatmentPlan};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Storage keys ---
pub const SNAPSHOTS_KEY: &str = "capturedSnapshots";
pub const PATIENTS_KEY: &str = "patientArchive";
pub const PLANS_KEY: &str = "treatmentPlans";
pub const SETTINGS_KEY: &str = "clinicSettings";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt entry '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid backup: {0}")]
    InvalidBackup(String),
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which sections an import restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub settings: bool,
    pub patients: bool,
    pub snapshots: bool,
    pub plans: bool,
}

/// Flat JSON store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read a key; a missing file yields the default value.
    fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StoreError> {
        let path = self.path(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })
    }

    /// Write a key atomically: temp file in the same directory, then rename.
    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        let data = serde_json::to_vec(value)?;
        let mut file = fs::File::create(&tmp).map_err(io_err(&tmp))?;
        file.write_all(&data).map_err(io_err(&tmp))?;
        file.sync_all().map_err(io_err(&tmp))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(io_err(&path))?;

        tracing::debug!(key, bytes = data.len(), "stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    // --- Snapshots ---

    pub fn snapshots(&self) -> Result<Vec<Snapshot>, StoreError> {
        self.read(SNAPSHOTS_KEY)
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut all = self.snapshots()?;
        all.push(snapshot);
        self.write(SNAPSHOTS_KEY, &all)
    }

    /// Remove a snapshot by id. Returns false when no snapshot matched.
    pub fn delete_snapshot(&self, id: i64) -> Result<bool, StoreError> {
        let mut all = self.snapshots()?;
        let before = all.len();
        all.retain(|s| s.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write(SNAPSHOTS_KEY, &all)?;
        Ok(true)
    }

    // --- Patient archive ---

    pub fn patients(&self) -> Result<Vec<PatientRecord>, StoreError> {
        self.read(PATIENTS_KEY)
    }

    pub fn add_patient(&self, record: PatientRecord) -> Result<(), StoreError> {
        let mut all = self.patients()?;
        all.push(record);
        self.write(PATIENTS_KEY, &all)
    }

    pub fn delete_patient(&self, id: i64) -> Result<bool, StoreError> {
        let mut all = self.patients()?;
        let before = all.len();
        all.retain(|p| p.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write(PATIENTS_KEY, &all)?;
        Ok(true)
    }

    // --- Treatment plans ---

    pub fn plans(&self) -> Result<Vec<TreatmentPlan>, StoreError> {
        self.read(PLANS_KEY)
    }

    pub fn add_plan(&self, plan: TreatmentPlan) -> Result<(), StoreError> {
        let mut all = self.plans()?;
        all.push(plan);
        self.write(PLANS_KEY, &all)
    }

    // --- Settings ---

    pub fn settings(&self) -> Result<ClinicSettings, StoreError> {
        self.read(SETTINGS_KEY)
    }

    pub fn save_settings(&self, settings: &ClinicSettings) -> Result<(), StoreError> {
        self.write(SETTINGS_KEY, settings)
    }

    pub fn dashboard(&self) -> Result<DashboardStats, StoreError> {
        Ok(DashboardStats::compute(&self.patients()?, &self.plans()?))
    }

    /// Delete patients, snapshots and plans. Settings are kept.
    pub fn clear_patient_data(&self) -> Result<(), StoreError> {
        self.remove(PATIENTS_KEY)?;
        self.remove(SNAPSHOTS_KEY)?;
        self.remove(PLANS_KEY)?;
        tracing::info!(dir = %self.dir.display(), "patient data cleared");
        Ok(())
    }

    /// Serialize every section as a pretty-printed backup document.
    pub fn export_backup(&self) -> Result<String, StoreError> {
        let backup = Backup {
            settings: Some(self.settings()?),
            patients: Some(self.patients()?),
            snapshots: Some(self.snapshots()?),
            plans: Some(self.plans()?),
            timestamp: Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        };
        Ok(serde_json::to_string_pretty(&backup)?)
    }

    /// Restore the sections present in a backup document.
    ///
    /// The whole document is validated before anything is written.
    pub fn import_backup(&self, json: &str) -> Result<ImportSummary, StoreError> {
        let backup: Backup =
            serde_json::from_str(json).map_err(|e| StoreError::InvalidBackup(e.to_string()))?;

        let mut summary = ImportSummary::default();
        if let Some(settings) = &backup.settings {
            self.save_settings(settings)?;
            summary.settings = true;
        }
        if let Some(patients) = &backup.patients {
            self.write(PATIENTS_KEY, patients)?;
            summary.patients = true;
        }
        if let Some(snapshots) = &backup.snapshots {
            self.write(SNAPSHOTS_KEY, snapshots)?;
            summary.snapshots = true;
        }
        if let Some(plans) = &backup.plans {
            self.write(PLANS_KEY, plans)?;
            summary.plans = true;
        }

        tracing::info!(?summary, "backup imported");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use lumina_core::{AnalysisResult, Measurements, PlanTargets};
    use std::collections::BTreeMap;

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    fn at(sec: u32) -> chrono::DateTime<Local> {
        Local.with_ymd_and_hms(2026, 5, 1, 10, 0, sec).unwrap()
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            measurements: Measurements::default(),
            overall_harmony: 91,
            clinical_recommendations: vec!["✓ ok".to_string()],
            classification_notes: "Balanced Smile Characteristics".to_string(),
            measurement_confidence: BTreeMap::new(),
        }
    }

    #[test]
    fn test_empty_store_defaults() {
        let (_dir, s) = store();
        assert!(s.snapshots().unwrap().is_empty());
        assert!(s.patients().unwrap().is_empty());
        assert_eq!(s.settings().unwrap(), ClinicSettings::default());
    }

    #[test]
    fn test_snapshot_add_and_delete() {
        let (_dir, s) = store();
        s.add_snapshot(Snapshot::new("data:image/jpeg;base64,AA".into(), Some(analysis()), at(1)))
            .unwrap();
        s.add_snapshot(Snapshot::new("data:image/jpeg;base64,BB".into(), None, at(2)))
            .unwrap();
        let all = s.snapshots().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].analysis.as_ref().map(|a| a.overall_harmony), Some(91));

        assert!(s.delete_snapshot(all[0].id).unwrap());
        assert!(!s.delete_snapshot(all[0].id).unwrap());
        assert_eq!(s.snapshots().unwrap().len(), 1);
    }

    #[test]
    fn test_files_use_fixed_keys_and_leave_no_temp() {
        let (_dir, s) = store();
        s.add_plan(TreatmentPlan::new(PlanTargets::default(), at(0))).unwrap();
        assert!(s.dir().join("treatmentPlans.json").exists());
        let leftovers: Vec<_> = fs::read_dir(s.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_corrupt_file_reported() {
        let (_dir, s) = store();
        fs::write(s.dir().join("patientArchive.json"), "{not json").unwrap();
        assert!(matches!(s.patients(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_clear_keeps_settings() {
        let (_dir, s) = store();
        let mut settings = ClinicSettings::default();
        settings.set("clinicName", "Bright Smiles");
        s.save_settings(&settings).unwrap();
        s.add_patient(PatientRecord::from_analysis("Ana", &analysis(), "", at(0))).unwrap();
        s.add_plan(TreatmentPlan::new(PlanTargets::default(), at(0))).unwrap();

        s.clear_patient_data().unwrap();
        assert!(s.patients().unwrap().is_empty());
        assert!(s.plans().unwrap().is_empty());
        assert_eq!(s.settings().unwrap().clinic_name, "Bright Smiles");
        // clearing twice is fine
        s.clear_patient_data().unwrap();
    }

    #[test]
    fn test_backup_round_trip_identical() {
        let (_dir, s) = store();
        s.add_patient(PatientRecord::from_analysis("Ana", &analysis(), "recall", at(0))).unwrap();
        s.add_snapshot(Snapshot::new("data:image/jpeg;base64,AA".into(), Some(analysis()), at(1)))
            .unwrap();
        s.add_plan(TreatmentPlan::new(PlanTargets::default(), at(2))).unwrap();

        let exported = s.export_backup().unwrap();

        let (_dir2, other) = store();
        let summary = other.import_backup(&exported).unwrap();
        assert_eq!(
            summary,
            ImportSummary { settings: true, patients: true, snapshots: true, plans: true }
        );

        let strip = |json: &str| {
            let mut v: serde_json::Value = serde_json::from_str(json).unwrap();
            v.as_object_mut().unwrap().remove("timestamp");
            v
        };
        assert_eq!(strip(&exported), strip(&other.export_backup().unwrap()));
    }

    #[test]
    fn test_import_only_present_sections() {
        let (_dir, s) = store();
        s.add_patient(PatientRecord::from_analysis("Ana", &analysis(), "", at(0))).unwrap();

        let summary = s
            .import_backup(r#"{"settings":{"clinicName":"Imported"},"plans":[]}"#)
            .unwrap();
        assert!(summary.settings && summary.plans);
        assert!(!summary.patients && !summary.snapshots);
        assert_eq!(s.patients().unwrap().len(), 1);
        assert_eq!(s.settings().unwrap().clinic_name, "Imported");
    }

    #[test]
    fn test_import_invalid_json_changes_nothing() {
        let (_dir, s) = store();
        s.add_patient(PatientRecord::from_analysis("Ana", &analysis(), "", at(0))).unwrap();
        assert!(matches!(s.import_backup("not json"), Err(StoreError::InvalidBackup(_))));
        assert!(matches!(
            s.import_backup(r#"{"patients":"oops"}"#),
            Err(StoreError::InvalidBackup(_))
        ));
        assert_eq!(s.patients().unwrap().len(), 1);
    }

    #[test]
    fn test_dashboard_from_store() {
        let (_dir, s) = store();
        s.add_patient(PatientRecord::from_analysis("Ana", &analysis(), "", at(0))).unwrap();
        s.add_plan(TreatmentPlan::new(PlanTargets::default(), at(0))).unwrap();
        let stats = s.dashboard().unwrap();
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.treatment_plans, 1);
        assert_eq!(stats.avg_harmony, Some(91.0));
    }
}
