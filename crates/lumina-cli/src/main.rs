use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use lumina_core::report::{harmony_grade, render_report, report_file_name, treatment_suggestions};
use lumina_core::{analyze, AnalysisResult, LandmarkSet, PlanTargets};
use lumina_overlay::{
    composite, decode_data_uri, draw_base_frame, encode_png, load_font, render_overlays, OverlayConfig,
    RasterSurface,
};
use lumina_hw::Facing;
use lumina_store::{ClinicSettings, PatientRecord, Store, TreatmentPlan};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// D-Bus proxy for the running daemon; generates `DsdProxy`.
#[zbus::proxy(
    interface = "org.lumina.Dsd1",
    default_service = "org.lumina.Dsd1",
    default_path = "/org/lumina/Dsd1"
)]
trait Dsd {
    async fn status(&self) -> zbus::Result<String>;
    async fn latest_analysis(&self) -> zbus::Result<String>;
    async fn report(&self) -> zbus::Result<String>;
    async fn snapshot(&self) -> zbus::Result<i64>;
    async fn overlays(&self) -> zbus::Result<String>;
    async fn set_overlays(
        &self,
        facial_guides: bool,
        dental_guides: bool,
        gingival: bool,
        measurements: bool,
        deviation: bool,
    ) -> zbus::Result<bool>;
    async fn facing(&self) -> zbus::Result<String>;
    async fn set_facing(&self, facing: &str) -> zbus::Result<String>;
    async fn switch_camera(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "lumina", about = "Lumina digital smile design CLI")]
struct Cli {
    /// Data directory (default: $LUMINA_DATA_DIR or ~/.local/share/lumina)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LandmarkInput {
    /// Landmark fixture: a JSON array of {x, y} points, or
    /// {"width", "height", "landmarks"}
    #[arg(short, long)]
    landmarks: PathBuf,
    /// Frame width in pixels (overrides the fixture)
    #[arg(long)]
    width: Option<u32>,
    /// Frame height in pixels (overrides the fixture)
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Args)]
struct OverlayFlags {
    #[arg(long)]
    facial_guides: Option<bool>,
    #[arg(long)]
    dental_guides: Option<bool>,
    #[arg(long)]
    gingival: Option<bool>,
    #[arg(long)]
    measurements: Option<bool>,
    #[arg(long)]
    deviation: Option<bool>,
}

impl OverlayFlags {
    fn apply(&self, mut config: OverlayConfig) -> OverlayConfig {
        let flags = [
            (&mut config.facial_guides, self.facial_guides),
            (&mut config.dental_guides, self.dental_guides),
            (&mut config.gingival, self.gingival),
            (&mut config.measurements, self.measurements),
            (&mut config.deviation, self.deviation),
        ];
        for (slot, flag) in flags {
            if let Some(on) = flag {
                *slot = on;
            }
        }
        config
    }

    fn is_empty(&self) -> bool {
        [self.facial_guides, self.dental_guides, self.gingival, self.measurements, self.deviation]
            .iter()
            .all(Option::is_none)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a landmark fixture and print the result
    Analyze {
        #[command(flatten)]
        input: LandmarkInput,
        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print or save the clinical report (from a fixture, or the daemon's latest analysis)
    Report {
        /// Landmark fixture; asks the daemon when omitted
        #[arg(short, long)]
        landmarks: Option<PathBuf>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Write to this file instead of stdout
        #[arg(short, long, conflicts_with = "save")]
        output: Option<PathBuf>,
        /// Write to lumina-dsd-report-<ms>.txt in the current directory
        #[arg(long)]
        save: bool,
    },
    /// Draw the overlays for a fixture onto an image (or a black frame) as PNG
    Render {
        #[command(flatten)]
        input: LandmarkInput,
        /// Base image; a black frame of the fixture size when omitted
        #[arg(short, long)]
        image: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Mirror base and overlays as for a front-facing camera
        #[arg(long)]
        mirror: bool,
        /// Font for text labels
        #[arg(long)]
        font: Option<PathBuf>,
        #[command(flatten)]
        overlays: OverlayFlags,
    },
    /// Manage captured snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Manage the patient archive
    Patients {
        #[command(subcommand)]
        action: PatientAction,
    },
    /// Project harmony for treatment targets
    Plan {
        /// Start from an archived patient's measurements
        #[arg(long)]
        patient: Option<i64>,
        #[arg(long)]
        wl_ratio: Option<f64>,
        #[arg(long)]
        golden_ratio: Option<f64>,
        #[arg(long)]
        gingival_sym: Option<f64>,
        #[arg(long)]
        smile_convexity: Option<f64>,
        #[arg(long)]
        vdo_ratio: Option<f64>,
        /// Save the plan to the store
        #[arg(long)]
        save: bool,
    },
    /// Export or import a full backup
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Delete all patients, snapshots and plans (settings are kept)
    Clear {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Show or change clinic settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Archive summary
    Dashboard,
    /// List V4L2 capture devices
    Devices,
    /// Show daemon status
    Status,
    /// Capture a snapshot from the running daemon
    Snapshot,
    /// Show or change the daemon's overlay toggles
    Overlays {
        #[command(flatten)]
        flags: OverlayFlags,
    },
    /// Show or change the daemon's camera facing
    Camera {
        #[command(subcommand)]
        action: CameraAction,
    },
}

#[derive(Subcommand)]
enum CameraAction {
    Show,
    /// Flip between front (mirrored) and back camera
    Switch,
    /// Set facing explicitly
    Set { facing: Facing },
}

#[derive(Subcommand)]
enum SnapshotAction {
    List,
    Delete { id: i64 },
    /// Write a snapshot image to a file (format from the extension)
    Export { id: i64, output: PathBuf },
}

#[derive(Subcommand)]
enum PatientAction {
    List,
    /// Analyze a fixture and archive it under a patient name
    Add {
        #[arg(short, long)]
        name: String,
        #[command(flatten)]
        input: LandmarkInput,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Delete { id: i64 },
    /// Compare two archived patients metric by metric
    Compare { first: i64, second: i64 },
}

#[derive(Subcommand)]
enum BackupAction {
    Export {
        /// Output file (stdout when omitted)
        output: Option<PathBuf>,
    },
    Import { input: PathBuf },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    /// Set one field (clinicName, doctorName, licenseNumber, contactInfo, theme)
    Set { key: String, value: String },
}

/// Landmark fixture file.
#[derive(Deserialize)]
#[serde(untagged)]
enum Fixture {
    Framed { width: u32, height: u32, landmarks: LandmarkSet },
    Bare(LandmarkSet),
}

fn load_landmarks(input: &LandmarkInput) -> Result<(LandmarkSet, u32, u32)> {
    read_fixture(&input.landmarks, input.width, input.height)
}

fn read_fixture(path: &Path, width: Option<u32>, height: Option<u32>) -> Result<(LandmarkSet, u32, u32)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let fixture: Fixture =
        serde_json::from_str(&text).with_context(|| format!("invalid landmark fixture {}", path.display()))?;
    let (landmarks, fw, fh) = match fixture {
        Fixture::Framed { width, height, landmarks } => (landmarks, Some(width), Some(height)),
        Fixture::Bare(landmarks) => (landmarks, None, None),
    };
    let width = width.or(fw).unwrap_or(640);
    let height = height.or(fh).unwrap_or(480);
    if width == 0 || height == 0 {
        bail!("frame dimensions must be positive, got {width}x{height}");
    }
    if landmarks.is_empty() {
        bail!("fixture {} has no landmarks", path.display());
    }
    tracing::debug!(points = landmarks.len(), width, height, "fixture loaded");
    Ok((landmarks, width, height))
}

fn data_dir(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| std::env::var_os("LUMINA_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| {
            let base = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from).unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            });
            base.join("lumina")
        })
}

fn print_analysis(analysis: &AnalysisResult) {
    let m = &analysis.measurements;
    println!(
        "Overall harmony: {}/100 ({})",
        analysis.overall_harmony,
        harmony_grade(analysis.overall_harmony)
    );
    println!("Classification:  {}", analysis.classification_notes);
    println!("W/L ratio:       {:.1}%", m.central_incisors_wl_ratio);
    println!("Golden ratio:    {:.1}%", m.golden_ratio_lateral);
    println!("Gingival symm.:  {:.1}%", m.gingival_symmetry);
    println!("Smile arc dev.:  {:.1}", m.smile_arc_deviation);
    println!("VDO ratio:       {:.1}%", m.vertical_dimension_ratio);
    println!("Pathway:         {}", m.smile_animation_pathway);
    println!("Recommendations:");
    for rec in &analysis.clinical_recommendations {
        println!("  {rec}");
    }
    println!("Treatment:");
    for line in treatment_suggestions(m) {
        println!("  {line}");
    }
}

fn print_plan(targets: &PlanTargets) {
    println!("W/L ratio:        {:.1}", targets.wl_ratio);
    println!("Golden ratio:     {:.1}", targets.golden_ratio);
    println!("Gingival symm.:   {:.1}", targets.gingival_sym);
    println!("Smile convexity:  {:.1}", targets.smile_convexity);
    println!("VDO ratio:        {:.1}", targets.vdo_ratio);
    println!("Projected harmony: {}%", targets.harmony_label());
    for spec in targets.specs() {
        println!("  {spec}");
    }
}

fn find_patient(patients: &[PatientRecord], id: i64) -> Result<&PatientRecord> {
    patients
        .iter()
        .find(|p| p.id == id)
        .with_context(|| format!("no patient with id {id}"))
}

fn print_comparison(first: &PatientRecord, second: &PatientRecord) {
    for (n, p) in [(1, first), (2, second)] {
        println!("Patient {n}: {} ({}) harmony {:.0}/100", p.patient_name, p.date, p.harmony);
    }
    println!();
    for d in first.compare(second) {
        println!("{:<14} {:>7.1} → {:>7.1}  {:>7}", d.label, d.first, d.second, d.delta_label());
    }
    println!();
    println!("Harmony: {:.0} vs {:.0}", first.harmony, second.harmony);
}

async fn daemon() -> Result<DsdProxy<'static>> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    DsdProxy::new(&conn).await.context("luminad is not reachable")
}

fn write_or_print(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = data_dir(cli.data_dir);

    match cli.command {
        Commands::Analyze { input, json } => {
            let (landmarks, width, height) = load_landmarks(&input)?;
            let analysis = analyze(&landmarks, width, height);
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }
        Commands::Report {
            landmarks,
            width,
            height,
            output,
            save,
        } => {
            let report = match landmarks {
                Some(path) => {
                    let (landmarks, width, height) = read_fixture(&path, width, height)?;
                    render_report(&analyze(&landmarks, width, height), Local::now().naive_local())
                }
                None => {
                    let report = daemon().await?.report().await?;
                    if report.is_empty() {
                        bail!("no analysis available yet; is a face in view?");
                    }
                    report
                }
            };
            let output = if save {
                Some(PathBuf::from(report_file_name(Local::now().timestamp_millis())))
            } else {
                output
            };
            write_or_print(output.as_deref(), &report)?;
        }
        Commands::Render {
            input,
            image,
            output,
            mirror,
            font,
            overlays,
        } => {
            let (landmarks, mut width, mut height) = load_landmarks(&input)?;
            let rgb = match image {
                Some(path) => {
                    let img = image::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?
                        .to_rgb8();
                    (width, height) = img.dimensions();
                    img.into_raw()
                }
                None => vec![0; width as usize * height as usize * 3],
            };
            let font = font.as_deref().map(load_font).transpose()?;

            let analysis = analyze(&landmarks, width, height);
            let base = draw_base_frame(&rgb, width, height, mirror)?;
            let mut surface = RasterSurface::new(width, height).with_font(font);
            render_overlays(&mut surface, &landmarks, &analysis, &overlays.apply(OverlayConfig::default()), mirror);
            let flat = composite(&base, surface.image())?;

            std::fs::write(&output, encode_png(&flat)?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Wrote {} ({width}x{height}, harmony {})",
                output.display(),
                analysis.overall_harmony
            );
        }
        Commands::Snapshots { action } => {
            let store = Store::open(&dir)?;
            match action {
                SnapshotAction::List => {
                    let snapshots = store.snapshots()?;
                    if snapshots.is_empty() {
                        println!("No snapshots");
                    }
                    for s in snapshots {
                        let harmony = s
                            .analysis
                            .as_ref()
                            .map(|a| a.overall_harmony.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!("{}  {} {}  harmony {}", s.id, s.date, s.time, harmony);
                    }
                }
                SnapshotAction::Delete { id } => {
                    if !store.delete_snapshot(id)? {
                        bail!("no snapshot with id {id}");
                    }
                    println!("Deleted snapshot {id}");
                }
                SnapshotAction::Export { id, output } => {
                    let snapshot = store
                        .snapshots()?
                        .into_iter()
                        .find(|s| s.id == id)
                        .with_context(|| format!("no snapshot with id {id}"))?;
                    decode_data_uri(&snapshot.image)?
                        .save(&output)
                        .with_context(|| format!("failed to write {}", output.display()))?;
                    println!("Wrote {}", output.display());
                }
            }
        }
        Commands::Patients { action } => {
            let store = Store::open(&dir)?;
            match action {
                PatientAction::List => {
                    let patients = store.patients()?;
                    if patients.is_empty() {
                        println!("No patients");
                    }
                    for p in patients {
                        println!("{}  {}  {}  harmony {:.0}", p.id, p.date, p.patient_name, p.harmony);
                    }
                }
                PatientAction::Add { name, input, notes } => {
                    let (landmarks, width, height) = load_landmarks(&input)?;
                    let analysis = analyze(&landmarks, width, height);
                    let record = PatientRecord::from_analysis(&name, &analysis, &notes, Local::now());
                    let id = record.id;
                    store.add_patient(record)?;
                    println!("Archived {name} as {id} (harmony {})", analysis.overall_harmony);
                }
                PatientAction::Delete { id } => {
                    if !store.delete_patient(id)? {
                        bail!("no patient with id {id}");
                    }
                    println!("Deleted patient {id}");
                }
                PatientAction::Compare { first, second } => {
                    let patients = store.patients()?;
                    print_comparison(find_patient(&patients, first)?, find_patient(&patients, second)?);
                }
            }
        }
        Commands::Plan {
            patient,
            wl_ratio,
            golden_ratio,
            gingival_sym,
            smile_convexity,
            vdo_ratio,
            save,
        } => {
            let needs_store = save || patient.is_some();
            let store = if needs_store { Some(Store::open(&dir)?) } else { None };

            let mut targets = match (patient, store.as_ref()) {
                (Some(id), Some(store)) => {
                    let patients = store.patients()?;
                    PlanTargets::from_record(&find_patient(&patients, id)?.measurements)
                }
                _ => PlanTargets::default(),
            };
            let overrides = [
                (&mut targets.wl_ratio, wl_ratio),
                (&mut targets.golden_ratio, golden_ratio),
                (&mut targets.gingival_sym, gingival_sym),
                (&mut targets.smile_convexity, smile_convexity),
                (&mut targets.vdo_ratio, vdo_ratio),
            ];
            for (slot, value) in overrides {
                if let Some(v) = value {
                    *slot = v;
                }
            }

            print_plan(&targets);
            if let (true, Some(store)) = (save, store.as_ref()) {
                let plan = TreatmentPlan::new(targets, Local::now());
                let id = plan.id;
                store.add_plan(plan)?;
                println!("Saved plan {id}");
            }
        }
        Commands::Backup { action } => {
            let store = Store::open(&dir)?;
            match action {
                BackupAction::Export { output } => {
                    write_or_print(output.as_deref(), &store.export_backup()?)?;
                }
                BackupAction::Import { input } => {
                    let text = std::fs::read_to_string(&input)
                        .with_context(|| format!("failed to read {}", input.display()))?;
                    let summary = store.import_backup(&text)?;
                    println!(
                        "Imported: settings={} patients={} snapshots={} plans={}",
                        summary.settings, summary.patients, summary.snapshots, summary.plans
                    );
                }
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to delete patient data without --yes");
            }
            Store::open(&dir)?.clear_patient_data()?;
            println!("All patient data cleared");
        }
        Commands::Settings { action } => {
            let store = Store::open(&dir)?;
            match action {
                SettingsAction::Show => {
                    println!("{}", serde_json::to_string_pretty(&store.settings()?)?);
                }
                SettingsAction::Set { key, value } => {
                    let mut settings: ClinicSettings = store.settings()?;
                    if !settings.set(&key, &value) {
                        bail!("unknown setting '{key}'");
                    }
                    store.save_settings(&settings)?;
                    println!("{key} = {value}");
                }
            }
        }
        Commands::Dashboard => {
            let stats = Store::open(&dir)?.dashboard()?;
            println!("Total patients:  {}", stats.total_patients);
            println!("Treatment plans: {}", stats.treatment_plans);
            match stats.avg_harmony {
                Some(avg) => println!("Average harmony: {avg:.0}%"),
                None => println!("Average harmony: -"),
            }
            if !stats.recent.is_empty() {
                println!("Recent analyses:");
                for p in &stats.recent {
                    println!("  {}  {}  {:.0}%", p.date, p.patient_name, p.harmony);
                }
            }
        }
        Commands::Devices => {
            let devices = lumina_hw::Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Status => {
            let status = daemon().await?.status().await?;
            let value: serde_json::Value = serde_json::from_str(&status)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Snapshot => {
            let id = daemon().await?.snapshot().await?;
            println!("Captured snapshot {id}");
        }
        Commands::Overlays { flags } => {
            let proxy = daemon().await?;
            let current: OverlayConfig = serde_json::from_str(&proxy.overlays().await?)?;
            let next = if flags.is_empty() {
                current
            } else {
                let next = flags.apply(current);
                proxy
                    .set_overlays(
                        next.facial_guides,
                        next.dental_guides,
                        next.gingival,
                        next.measurements,
                        next.deviation,
                    )
                    .await?;
                next
            };
            println!("{}", serde_json::to_string_pretty(&next)?);
        }
        Commands::Camera { action } => {
            let proxy = daemon().await?;
            let facing = match action {
                CameraAction::Show => proxy.facing().await?,
                CameraAction::Switch => proxy.switch_camera().await?,
                CameraAction::Set { facing } => proxy.set_facing(&facing.to_string()).await?,
            };
            println!("Camera facing: {facing}");
        }
    }

    Ok(())
}
