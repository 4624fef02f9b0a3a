//! The render loop.
//!
//! A dedicated OS thread pulls frames, runs the landmark detector and the
//! analysis pipeline, and redraws the base and overlay surfaces at a fixed
//! cadence. D-Bus handlers read the latest result through [`EngineHandle`].

use image::RgbaImage;
use lumina_core::{analyze, AnalysisResult, DetectorError, LandmarkDetector};
use lumina_hw::{Facing, FrameSource};
use lumina_overlay::{
    composite, draw_base_frame_into, encode_jpeg_data_uri, render_overlays, DrawSurface, OverlayConfig,
    OverlayError, RasterSurface,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no analysis available yet")]
    NoAnalysis,
    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),
    #[error("failed to spawn render thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Creates the landmark detector. Called until it succeeds.
pub type DetectorFactory = Box<dyn FnMut() -> Result<Box<dyn LandmarkDetector>, DetectorError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Detector not initialized yet.
    Idle,
    Running,
}

/// Runtime-adjustable settings, read by the render loop every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub overlays: OverlayConfig,
    pub facing: Facing,
}

/// What a single iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still waiting on the detector.
    Initializing,
    /// No ready frame; nothing drawn.
    NoFrame,
    /// Frame drawn, no face found.
    NoFace,
    /// Frame drawn and analyzed.
    Analyzed,
}

/// Surfaces and results shared with the export path.
///
/// The render thread is the only writer.
pub struct LiveState {
    pub state: LoopState,
    pub facing: Facing,
    pub frames_drawn: u64,
    pub frames_analyzed: u64,
    pub base: RgbaImage,
    pub overlay: RasterSurface,
    pub analysis: Option<AnalysisResult>,
}

impl LiveState {
    fn new(facing: Facing, font: Option<ab_glyph::FontArc>) -> Self {
        Self {
            state: LoopState::Idle,
            facing,
            frames_drawn: 0,
            frames_analyzed: 0,
            base: RgbaImage::new(0, 0),
            overlay: RasterSurface::new(0, 0).with_font(font),
            analysis: None,
        }
    }
}

fn lock(shared: &Mutex<LiveState>) -> MutexGuard<'_, LiveState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-frame driver. Owns the frame source and the detector.
pub struct RenderLoop {
    source: Box<dyn FrameSource>,
    factory: DetectorFactory,
    detector: Option<Box<dyn LandmarkDetector>>,
    init_retry: Duration,
    next_init: Option<Instant>,
    init_failures: u32,
    config: watch::Receiver<EngineConfig>,
    shared: Arc<Mutex<LiveState>>,
    epoch: Instant,
    last_timestamp: Option<u64>,
    source_failing: bool,
    detect_failing: bool,
}

impl RenderLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        factory: DetectorFactory,
        init_retry: Duration,
        config: watch::Receiver<EngineConfig>,
        font: Option<ab_glyph::FontArc>,
    ) -> Self {
        let facing = source.facing();
        Self {
            source,
            factory,
            detector: None,
            init_retry,
            next_init: None,
            init_failures: 0,
            config,
            shared: Arc::new(Mutex::new(LiveState::new(facing, font))),
            epoch: Instant::now(),
            last_timestamp: None,
            source_failing: false,
            detect_failing: false,
        }
    }

    pub fn shared(&self) -> Arc<Mutex<LiveState>> {
        Arc::clone(&self.shared)
    }

    pub fn state(&self) -> LoopState {
        if self.detector.is_some() {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    /// Run one iteration.
    pub fn step(&mut self) -> StepOutcome {
        if self.detector.is_none() && !self.try_init() {
            return StepOutcome::Initializing;
        }

        let config = *self.config.borrow();
        if config.facing != self.source.facing() {
            self.source.set_facing(config.facing);
        }

        // 1. A ready frame with nonzero dimensions.
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) if !frame.is_empty() => {
                self.source_failing = false;
                frame
            }
            Ok(_) => return StepOutcome::NoFrame,
            Err(e) => {
                if !self.source_failing {
                    tracing::warn!(error = %e, "frame source error; skipping frames");
                    self.source_failing = true;
                }
                return StepOutcome::NoFrame;
            }
        };
        let (width, height) = (frame.width, frame.height);
        let mirrored = config.facing.is_mirrored();

        // 2. Resize surfaces only when the frame size changes.
        {
            let mut live = lock(&self.shared);
            if live.overlay.width() != width || live.overlay.height() != height {
                tracing::debug!(width, height, "resizing surfaces");
                live.overlay.resize(width, height);
            }
        }

        // 3. Detect.
        let timestamp = self.next_timestamp();
        let Some(detector) = self.detector.as_mut() else {
            return StepOutcome::Initializing;
        };
        let faces = match detector.detect(&frame.data, width, height, timestamp) {
            Ok(faces) => {
                self.detect_failing = false;
                faces
            }
            Err(e) => {
                if !self.detect_failing {
                    tracing::warn!(error = %e, "landmark detection failed");
                    self.detect_failing = true;
                }
                Vec::new()
            }
        };

        let mut live = lock(&self.shared);
        live.facing = config.facing;

        // 4. Base frame, drawn into the existing buffer.
        if let Err(e) = draw_base_frame_into(&mut live.base, &frame.data, width, height, mirrored) {
            tracing::warn!(error = %e, "dropping malformed frame");
            return StepOutcome::NoFrame;
        }
        live.frames_drawn += 1;

        // 5. Overlay starts empty every frame.
        live.overlay.clear();

        // 6. One face at most.
        let Some(landmarks) = faces.first() else {
            tracing::trace!(timestamp, "no face");
            return StepOutcome::NoFace;
        };
        let analysis = analyze(landmarks, width, height);
        render_overlays(&mut live.overlay, landmarks, &analysis, &config.overlays, mirrored);
        tracing::trace!(timestamp, harmony = analysis.overall_harmony, "frame analyzed");
        live.analysis = Some(analysis);
        live.frames_analyzed += 1;
        StepOutcome::Analyzed
    }

    /// Attempt detector creation if the retry delay has passed.
    fn try_init(&mut self) -> bool {
        let now = Instant::now();
        if self.next_init.is_some_and(|at| now < at) {
            return false;
        }
        match (self.factory)() {
            Ok(detector) => {
                tracing::info!(attempts = self.init_failures + 1, "landmark detector ready");
                self.detector = Some(detector);
                lock(&self.shared).state = LoopState::Running;
                true
            }
            Err(e) => {
                if self.init_failures == 0 {
                    tracing::error!(error = %e, retry_ms = self.init_retry.as_millis() as u64, "landmark detector unavailable; retrying");
                } else {
                    tracing::debug!(error = %e, attempt = self.init_failures + 1, "detector init retry failed");
                }
                self.init_failures += 1;
                self.next_init = Some(now + self.init_retry);
                false
            }
        }
    }

    /// Milliseconds since the loop was created, strictly increasing.
    fn next_timestamp(&mut self) -> u64 {
        let now = self.epoch.elapsed().as_millis() as u64;
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    /// Release the detector. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(detector) = self.detector.take() {
            drop(detector);
            tracing::info!("landmark detector released");
        }
        lock(&self.shared).state = LoopState::Idle;
    }
}

/// Owns the render thread. Dropping it stops the loop.
pub struct RenderThread {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RenderThread {
    /// Stop at the next iteration boundary and wait for the thread to exit.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.join();
    }
}

/// Clone-safe handle for reading results and changing runtime settings.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Mutex<LiveState>>,
    config: Arc<watch::Sender<EngineConfig>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: LoopState,
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
    pub frames_drawn: u64,
    pub frames_analyzed: u64,
    pub has_analysis: bool,
    pub overlays: OverlayConfig,
}

impl EngineHandle {
    pub fn status(&self) -> EngineStatus {
        let live = lock(&self.shared);
        EngineStatus {
            state: live.state,
            facing: live.facing,
            width: live.base.width(),
            height: live.base.height(),
            frames_drawn: live.frames_drawn,
            frames_analyzed: live.frames_analyzed,
            has_analysis: live.analysis.is_some(),
            overlays: self.config.borrow().overlays,
        }
    }

    pub fn latest_analysis(&self) -> Option<AnalysisResult> {
        lock(&self.shared).analysis.clone()
    }

    /// Composite the current frame and encode it as a JPEG data URI.
    pub fn snapshot(&self, jpeg_quality: u8) -> Result<(String, AnalysisResult), EngineError> {
        let (flat, analysis) = {
            let live = lock(&self.shared);
            let analysis = live.analysis.clone().ok_or(EngineError::NoAnalysis)?;
            (composite(&live.base, live.overlay.image())?, analysis)
        };
        Ok((encode_jpeg_data_uri(&flat, jpeg_quality)?, analysis))
    }

    pub fn overlays(&self) -> OverlayConfig {
        self.config.borrow().overlays
    }

    pub fn set_overlays(&self, overlays: OverlayConfig) {
        self.config.send_modify(|c| c.overlays = overlays);
        tracing::info!(?overlays, "overlay toggles updated");
    }

    pub fn facing(&self) -> Facing {
        self.config.borrow().facing
    }

    /// Switch camera facing. Mirroring follows from the next frame.
    pub fn set_facing(&self, facing: Facing) {
        self.config.send_modify(|c| c.facing = facing);
        tracing::info!(%facing, "camera facing updated");
    }

    /// Flip between front and back facing and return the new mode.
    pub fn switch_camera(&self) -> Facing {
        let mut facing = Facing::default();
        self.config.send_modify(|c| {
            c.facing = c.facing.toggled();
            facing = c.facing;
        });
        tracing::info!(%facing, "camera switched");
        facing
    }
}

/// Create the engine config channel seeded with `initial`.
pub fn config_channel(initial: EngineConfig) -> (watch::Sender<EngineConfig>, watch::Receiver<EngineConfig>) {
    watch::channel(initial)
}

/// Run `render_loop` on a dedicated thread at a fixed cadence.
///
/// Iterations that overrun the interval start the next one immediately;
/// missed iterations are not replayed.
pub fn spawn(
    mut render_loop: RenderLoop,
    config_tx: watch::Sender<EngineConfig>,
    frame_interval: Duration,
) -> Result<(EngineHandle, RenderThread), EngineError> {
    let handle = EngineHandle {
        shared: render_loop.shared(),
        config: Arc::new(config_tx),
    };
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("lumina-render".into())
        .spawn(move || {
            tracing::info!(interval_ms = frame_interval.as_millis() as u64, "render thread started");
            while !thread_stop.load(Ordering::SeqCst) {
                let started = Instant::now();
                render_loop.step();
                let next = started + frame_interval;
                let now = Instant::now();
                if next > now {
                    std::thread::sleep(next - now);
                }
            }
            let state = render_loop.state();
            render_loop.shutdown();
            tracing::info!(?state, "render thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok((
        handle,
        RenderThread {
            stop,
            thread: Some(thread),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_core::landmarks::FACE_MESH_POINTS;
    use lumina_core::{LandmarkSet, Point};
    use lumina_hw::{CameraError, Frame};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    const W: u32 = 320;
    const H: u32 = 240;

    /// Left half red, right half blue.
    fn split_frame() -> Frame {
        let mut data = Vec::with_capacity((W * H * 3) as usize);
        for _ in 0..H {
            for x in 0..W {
                data.extend_from_slice(if x < W / 2 { &[255, 0, 0] } else { &[0, 0, 255] });
            }
        }
        Frame::from_rgb(data, W, H, 0).unwrap()
    }

    struct FakeSource {
        frames: VecDeque<Result<Option<Frame>, CameraError>>,
        facing: Facing,
    }

    impl FakeSource {
        fn endless(facing: Facing) -> Self {
            Self { frames: VecDeque::new(), facing }
        }
    }

    impl FrameSource for FakeSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
            self.frames.pop_front().unwrap_or_else(|| Ok(Some(split_frame())))
        }

        fn facing(&self) -> Facing {
            self.facing
        }

        fn set_facing(&mut self, facing: Facing) {
            self.facing = facing;
        }
    }

    #[derive(Default, Clone)]
    struct Probe {
        calls: Arc<Mutex<Vec<u64>>>,
        drops: Arc<AtomicUsize>,
    }

    struct FakeDetector {
        probe: Probe,
        faces: usize,
        fail: bool,
    }

    impl LandmarkDetector for FakeDetector {
        fn detect(&mut self, _rgb: &[u8], _w: u32, _h: u32, ts: u64) -> Result<Vec<LandmarkSet>, DetectorError> {
            self.probe.calls.lock().unwrap().push(ts);
            if self.fail {
                return Err(DetectorError::InferenceFailed("boom".into()));
            }
            let face = LandmarkSet::filled(FACE_MESH_POINTS, Point::new(0.5, 0.6));
            Ok(vec![face; self.faces])
        }
    }

    impl Drop for FakeDetector {
        fn drop(&mut self) {
            self.probe.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn factory(probe: &Probe, faces: usize, fail: bool) -> DetectorFactory {
        let probe = probe.clone();
        Box::new(move || {
            Ok(Box::new(FakeDetector { probe: probe.clone(), faces, fail }) as Box<dyn LandmarkDetector>)
        })
    }

    fn make_loop(source: FakeSource, factory: DetectorFactory, overlays: OverlayConfig) -> (RenderLoop, watch::Sender<EngineConfig>) {
        let facing = source.facing;
        let (tx, rx) = config_channel(EngineConfig { overlays, facing });
        (RenderLoop::new(Box::new(source), factory, Duration::ZERO, rx, None), tx)
    }

    fn overlay_is_blank(live: &LiveState) -> bool {
        live.overlay.image().pixels().all(|p| p.0[3] == 0)
    }

    #[test]
    fn test_idle_until_factory_succeeds() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let probe = Probe::default();
        let counter = Arc::clone(&attempts);
        let mut inner = factory(&probe, 1, false);
        let flaky: DetectorFactory = Box::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(DetectorError::ModelNotFound("face_landmarker.onnx".into()))
            } else {
                inner()
            }
        });
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), flaky, OverlayConfig::default());

        assert_eq!(rl.step(), StepOutcome::Initializing);
        assert_eq!(rl.step(), StepOutcome::Initializing);
        assert_eq!(rl.state(), LoopState::Idle);
        assert_eq!(rl.step(), StepOutcome::Analyzed);
        assert_eq!(rl.state(), LoopState::Running);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // factory is not called again once running
        rl.step();
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_init_retry_delay_respected() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let failing: DetectorFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DetectorError::ModelNotFound("missing".into()))
        });
        let (_tx, rx) = config_channel(EngineConfig { overlays: OverlayConfig::default(), facing: Facing::User });
        let mut rl = RenderLoop::new(
            Box::new(FakeSource::endless(Facing::User)),
            failing,
            Duration::from_secs(3600),
            rx,
            None,
        );
        rl.step();
        rl.step();
        rl.step();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_frame_skips_detection() {
        let probe = Probe::default();
        let mut source = FakeSource::endless(Facing::User);
        source.frames.push_back(Ok(None));
        source.frames.push_back(Err(CameraError::CaptureFailed("unplugged".into())));
        source.frames.push_back(Ok(Some(Frame::from_rgb(Vec::new(), 0, 0, 0).unwrap())));
        let (mut rl, _tx) = make_loop(source, factory(&probe, 1, false), OverlayConfig::default());

        assert_eq!(rl.step(), StepOutcome::NoFrame);
        assert_eq!(rl.step(), StepOutcome::NoFrame);
        assert_eq!(rl.step(), StepOutcome::NoFrame);
        assert!(probe.calls.lock().unwrap().is_empty());
        assert_eq!(rl.step(), StepOutcome::Analyzed);
    }

    #[test]
    fn test_analyzed_frame_updates_shared_state() {
        let probe = Probe::default();
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 1, false), OverlayConfig::default());
        assert_eq!(rl.step(), StepOutcome::Analyzed);

        let shared = rl.shared();
        let live = shared.lock().unwrap();
        assert_eq!(live.base.dimensions(), (W, H));
        assert_eq!((live.overlay.width(), live.overlay.height()), (W, H));
        assert_eq!(live.frames_analyzed, 1);
        assert!(live.analysis.is_some());
        assert!(!overlay_is_blank(&live));
    }

    #[test]
    fn test_front_facing_mirrors_base() {
        let probe = Probe::default();
        let (mut user, _t1) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 0, false), OverlayConfig::default());
        let (mut env, _t2) =
            make_loop(FakeSource::endless(Facing::Environment), factory(&probe, 0, false), OverlayConfig::default());
        assert_eq!(user.step(), StepOutcome::NoFace);
        assert_eq!(env.step(), StepOutcome::NoFace);

        assert_eq!(user.shared().lock().unwrap().base.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(env.shared().lock().unwrap().base.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_switch_camera_flips_mirroring_next_frame() {
        let probe = Probe::default();
        let (mut rl, tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 0, false), OverlayConfig::default());
        let handle = EngineHandle { shared: rl.shared(), config: Arc::new(tx) };

        rl.step();
        assert_eq!(rl.shared().lock().unwrap().base.get_pixel(0, 0).0, [0, 0, 255, 255]);

        assert_eq!(handle.switch_camera(), Facing::Environment);
        rl.step();
        assert_eq!(rl.source.facing(), Facing::Environment);
        assert_eq!(rl.shared().lock().unwrap().base.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(handle.status().facing, Facing::Environment);

        handle.set_facing(Facing::User);
        rl.step();
        assert_eq!(rl.shared().lock().unwrap().base.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_base_buffer_reused_across_frames() {
        let probe = Probe::default();
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 0, false), OverlayConfig::default());
        rl.step();
        let first = rl.shared().lock().unwrap().base.as_raw().as_ptr();
        rl.step();
        rl.step();
        assert_eq!(rl.shared().lock().unwrap().base.as_raw().as_ptr(), first);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let probe = Probe::default();
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 0, false), OverlayConfig::default());
        for _ in 0..20 {
            rl.step();
        }
        let calls = probe.calls.lock().unwrap();
        assert_eq!(calls.len(), 20);
        assert!(calls.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_detector_error_stays_in_loop() {
        let probe = Probe::default();
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 1, true), OverlayConfig::default());
        assert_eq!(rl.step(), StepOutcome::NoFace);
        assert_eq!(rl.step(), StepOutcome::NoFace);
        assert_eq!(rl.state(), LoopState::Running);
        assert_eq!(rl.shared().lock().unwrap().frames_drawn, 2);
    }

    #[test]
    fn test_overlay_cleared_when_face_lost() {
        let probe = Probe::default();
        let mut faces = 1;
        let p = probe.clone();
        let toggling: DetectorFactory = Box::new(move || {
            let det = FakeDetector { probe: p.clone(), faces, fail: false };
            faces = 0;
            Ok(Box::new(det) as Box<dyn LandmarkDetector>)
        });
        let (mut rl, _tx) = make_loop(FakeSource::endless(Facing::User), toggling, OverlayConfig::default());
        assert_eq!(rl.step(), StepOutcome::Analyzed);
        // swap in a detector that finds nothing
        rl.detector = None;
        assert_eq!(rl.step(), StepOutcome::NoFace);
        let shared = rl.shared();
        let live = shared.lock().unwrap();
        assert!(overlay_is_blank(&live));
        // the last analysis stays available for export
        assert!(live.analysis.is_some());
    }

    #[test]
    fn test_config_changes_apply_next_frame() {
        let probe = Probe::default();
        let off = OverlayConfig {
            facial_guides: false,
            dental_guides: false,
            gingival: false,
            measurements: false,
            deviation: false,
        };
        let (mut rl, tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 1, false), off);
        rl.step();
        assert!(overlay_is_blank(&rl.shared().lock().unwrap()));

        tx.send_modify(|c| c.overlays = OverlayConfig::default());
        rl.step();
        assert!(!overlay_is_blank(&rl.shared().lock().unwrap()));
    }

    #[test]
    fn test_snapshot_requires_analysis() {
        let probe = Probe::default();
        let (rl, tx) = make_loop(FakeSource::endless(Facing::User), factory(&probe, 1, false), OverlayConfig::default());
        let handle = EngineHandle { shared: rl.shared(), config: Arc::new(tx) };
        assert!(matches!(handle.snapshot(85), Err(EngineError::NoAnalysis)));
        assert!(handle.latest_analysis().is_none());
        assert_eq!(handle.status().state, LoopState::Idle);
    }

    #[test]
    fn test_thread_runs_and_releases_detector_once() {
        let probe = Probe::default();
        let (tx, rx) = config_channel(EngineConfig { overlays: OverlayConfig::default(), facing: Facing::User });
        let rl = RenderLoop::new(
            Box::new(FakeSource::endless(Facing::User)),
            factory(&probe, 1, false),
            Duration::ZERO,
            rx,
            None,
        );
        let (handle, thread) = spawn(rl, tx, Duration::from_millis(1)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while handle.latest_analysis().is_none() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let (uri, analysis) = handle.snapshot(80).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(analysis.overall_harmony <= 100);
        assert_eq!(handle.status().state, LoopState::Running);

        thread.stop();
        assert_eq!(probe.drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.status().state, LoopState::Idle);

        let calls_after_stop = probe.calls.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(probe.calls.lock().unwrap().len(), calls_after_stop);
    }
}
