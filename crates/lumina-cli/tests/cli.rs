use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Frontal smile at 640x480: harmony 88, classified "Low Smile".
fn write_fixture(dir: &Path) -> PathBuf {
    let mut points = vec![serde_json::json!({"x": 0.5, "y": 0.62}); 478];
    for (index, x, y) in [
        (10, 0.50, 0.10),
        (152, 0.50, 0.90),
        (61, 0.40, 0.62),
        (291, 0.60, 0.62),
        (13, 0.50, 0.60),
        (14, 0.50, 0.64),
    ] {
        points[index] = serde_json::json!({"x": x, "y": y});
    }
    let fixture = serde_json::json!({"width": 640, "height": 480, "landmarks": points});
    let path = dir.join("smile.json");
    std::fs::write(&path, fixture.to_string()).unwrap();
    path
}

fn lumina(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lumina").unwrap();
    cmd.arg("--data-dir").arg(data.path().join("store"));
    cmd
}

#[test]
fn test_analyze_summary() {
    let tmp = TempDir::new().unwrap();
    let fixture = write_fixture(tmp.path());
    lumina(&tmp)
        .args(["analyze", "--landmarks"])
        .arg(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overall harmony: 88/100 (✓ EXCELLENT)"))
        .stdout(predicate::str::contains("Classification:  Low Smile"));
}

#[test]
fn test_analyze_json() {
    let tmp = TempDir::new().unwrap();
    let fixture = write_fixture(tmp.path());
    let out = lumina(&tmp)
        .args(["analyze", "--json", "--landmarks"])
        .arg(&fixture)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["overallHarmony"], 88);
    assert_eq!(json["measurements"]["smileAnimationPathway"], "Horizontal-Dominant");
    assert_eq!(json["clinicalRecommendations"].as_array().unwrap().len(), 4);
}

#[test]
fn test_analyze_rejects_bad_fixture() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.json");
    std::fs::write(&path, "{\"points\": 3}").unwrap();
    lumina(&tmp)
        .args(["analyze", "--landmarks"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid landmark fixture"));
}

#[test]
fn test_report_to_file() {
    let tmp = TempDir::new().unwrap();
    let fixture = write_fixture(tmp.path());
    let out = tmp.path().join("report.txt");
    lumina(&tmp)
        .args(["report", "--landmarks"])
        .arg(&fixture)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("LUMINA ULTRA - CLINICAL DSD ANALYSIS REPORT"));
    assert!(text.contains("End of Report"));
}

#[test]
fn test_render_png() {
    let tmp = TempDir::new().unwrap();
    let fixture = write_fixture(tmp.path());
    let out = tmp.path().join("overlay.png");
    lumina(&tmp)
        .args(["render", "--mirror", "--gingival", "false", "--landmarks"])
        .arg(&fixture)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("640x480"));
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn test_settings_set_and_show() {
    let tmp = TempDir::new().unwrap();
    lumina(&tmp)
        .args(["settings", "set", "clinicName", "Bright Smiles"])
        .assert()
        .success();
    lumina(&tmp)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"clinicName\": \"Bright Smiles\""))
        .stdout(predicate::str::contains("\"doctorName\": \"Dr. Smith\""));
    lumina(&tmp)
        .args(["settings", "set", "favoriteColor", "teal"])
        .assert()
        .failure();
}

#[test]
fn test_patients_plan_and_dashboard() {
    let tmp = TempDir::new().unwrap();
    let fixture = write_fixture(tmp.path());
    lumina(&tmp)
        .args(["patients", "add", "--name", "Ana", "--landmarks"])
        .arg(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("harmony 88"));
    lumina(&tmp)
        .args(["patients", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana"));

    lumina(&tmp)
        .args(["plan", "--save"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Projected harmony: 98%"))
        .stdout(predicate::str::contains("Saved plan"));

    lumina(&tmp)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total patients:  1"))
        .stdout(predicate::str::contains("Treatment plans: 1"))
        .stdout(predicate::str::contains("Average harmony: 88%"));
}

#[test]
fn test_backup_round_trip_and_clear() {
    let src = TempDir::new().unwrap();
    let fixture = write_fixture(src.path());
    lumina(&src)
        .args(["patients", "add", "--name", "Ana", "--landmarks"])
        .arg(&fixture)
        .assert()
        .success();
    let backup = src.path().join("backup.json");
    lumina(&src).args(["backup", "export"]).arg(&backup).assert().success();

    let dst = TempDir::new().unwrap();
    lumina(&dst)
        .args(["backup", "import"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("patients=true"));
    lumina(&dst)
        .args(["patients", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ana"));

    lumina(&dst).arg("clear").assert().failure();
    lumina(&dst).args(["clear", "--yes"]).assert().success();
    lumina(&dst)
        .args(["patients", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No patients"));
}

#[test]
fn test_empty_snapshot_list_and_missing_delete() {
    let tmp = TempDir::new().unwrap();
    lumina(&tmp)
        .args(["snapshots", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No snapshots"));
    lumina(&tmp)
        .args(["snapshots", "delete", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no snapshot with id 42"));
}

#[test]
fn test_import_rejects_garbage() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("garbage.json");
    std::fs::write(&path, "not a backup").unwrap();
    lumina(&tmp)
        .args(["backup", "import"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid backup"));
}

#[test]
fn test_patients_compare() {
    let tmp = TempDir::new().unwrap();
    let archive = serde_json::json!({
        "patients": [
            {"id": 1, "date": "1/2/2026", "patientName": "Ana", "harmony": 80,
             "measurements": {"centralIncisorsWLRatio": 90, "goldenRatioLateral": 60,
                              "gingivalSymmetry": 85, "smileConvexityScore": 70,
                              "verticalDimensionRatio": 40}},
            {"id": 2, "date": "2/2/2026", "patientName": "Ben", "harmony": 92,
             "measurements": {"centralIncisorsWLRatio": 82.5, "goldenRatioLateral": 62,
                              "gingivalSymmetry": 95, "smileConvexityScore": 70}}
        ]
    });
    let path = tmp.path().join("archive.json");
    std::fs::write(&path, archive.to_string()).unwrap();
    lumina(&tmp).args(["backup", "import"]).arg(&path).assert().success();

    lumina(&tmp)
        .args(["patients", "compare", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Patient 1: Ana (1/2/2026) harmony 80/100"))
        .stdout(predicate::str::is_match(r"W/L Ratio\s+90\.0 → \s*82\.5\s+-7\.5").unwrap())
        .stdout(predicate::str::is_match(r"Golden Ratio\s+60\.0 → \s*62\.0\s+\+2\.0").unwrap())
        .stdout(predicate::str::is_match(r"Convexity\s+70\.0 → \s*70\.0\s+0\.0").unwrap())
        // missing metric reads as zero
        .stdout(predicate::str::is_match(r"VDO Ratio\s+40\.0 → \s*0\.0\s+-40\.0").unwrap())
        .stdout(predicate::str::contains("Harmony: 80 vs 92"));

    lumina(&tmp)
        .args(["patients", "compare", "1", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no patient with id 7"));
}
