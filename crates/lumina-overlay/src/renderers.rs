//! The five clinical overlay renderers.
//!
//! Each renderer reads normalized landmarks, scales them to the surface size
//! and draws its guides. A missing landmark skips only the element that
//! needs it.

use crate::surface::{Color, DrawSurface, Stroke};
use lumina_core::landmarks::{
    self, LandmarkSet, Point, ANTERIOR_TEETH, LOWER_LIP_CONTOUR, UPPER_INNER_LIP,
};
use lumina_core::{AnalysisResult, Measurements};
use serde::{Deserialize, Serialize};

// --- Palette ---
const CYAN: Color = Color::rgb(0, 255, 255);
const AMBER: Color = Color::rgb(255, 213, 0);
const RED: Color = Color::rgb(255, 0, 0);
const GREEN: Color = Color::rgb(0, 255, 0);
const FAINT_GREY: Color = Color::rgba(200, 200, 200, 51);
const TOOTH_AXIS: Color = Color::rgba(100, 200, 255, 77);
const GINGIVAL_REFERENCE: Color = Color::rgba(0, 200, 100, 102);
const MARKER_HIGH: Color = Color::rgba(255, 100, 100, 153);
const MARKER_MID: Color = Color::rgba(255, 200, 100, 153);
const MARKER_LOW: Color = Color::rgba(100, 255, 100, 153);
const LABEL: Color = Color::rgba(255, 255, 255, 230);
const INDICATOR_LABEL: Color = Color::rgba(255, 255, 255, 204);

// --- Geometry ---
const GUIDE_WIDTH: f32 = 2.0;
const THIN_WIDTH: f32 = 1.0;
const DENTAL_MIDLINE_EXTENT: f64 = 0.15;
const TOOTH_AXIS_EXTENT: f64 = 0.08;
const MARKER_RADIUS: f32 = 4.0;
const ANNOTATION_SIZE: f32 = 12.0;
const INDICATOR_SIZE: f32 = 11.0;
const INDICATOR_SPACING: f32 = 80.0;
const INDICATOR_BAR: (f32, f32) = (60.0, 3.0);

/// Which renderers run each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub facial_guides: bool,
    pub dental_guides: bool,
    pub gingival: bool,
    pub measurements: bool,
    pub deviation: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            facial_guides: true,
            dental_guides: true,
            gingival: true,
            measurements: true,
            deviation: true,
        }
    }
}

/// Draw every enabled overlay for one face, in fixed order.
pub fn render_overlays(
    surface: &mut dyn DrawSurface,
    landmarks: &LandmarkSet,
    analysis: &AnalysisResult,
    config: &OverlayConfig,
    mirrored: bool,
) {
    surface.set_mirrored(mirrored);
    if config.facial_guides {
        draw_facial_guides(surface, landmarks);
    }
    if config.dental_guides {
        draw_dental_guides(surface, landmarks);
    }
    if config.gingival {
        draw_gingival_analysis(surface, landmarks);
    }
    if config.measurements {
        draw_measurement_annotations(surface, landmarks, &analysis.measurements);
    }
    if config.deviation {
        draw_deviation_indicators(surface, &analysis.measurements);
    }
    surface.set_mirrored(false);
}

fn size(surface: &dyn DrawSurface) -> (f64, f64) {
    (surface.width() as f64, surface.height() as f64)
}

fn px(p: Point, (w, h): (f64, f64)) -> (f32, f32) {
    p.to_pixels(w, h)
}

fn line(surface: &mut dyn DrawSurface, lm: &LandmarkSet, from: usize, to: usize, stroke: &Stroke) {
    let wh = size(surface);
    if let (Some(a), Some(b)) = (lm.get(from), lm.get(to)) {
        surface.stroke_polyline(&[px(a, wh), px(b, wh)], stroke);
    }
}

fn contour(surface: &mut dyn DrawSurface, lm: &LandmarkSet, indices: &[usize], stroke: &Stroke) {
    let wh = size(surface);
    if let Some(points) = lm.contour(indices) {
        let path: Vec<(f32, f32)> = points.into_iter().map(|p| px(p, wh)).collect();
        surface.stroke_polyline(&path, stroke);
    }
}

/// Facial midline, interpupillary line and a faint horizontal at lip height.
pub fn draw_facial_guides(surface: &mut dyn DrawSurface, lm: &LandmarkSet) {
    let (w, h) = size(surface);

    line(surface, lm, landmarks::GLABELLA, landmarks::CHIN, &Stroke::solid(CYAN, GUIDE_WIDTH));
    line(
        surface,
        lm,
        landmarks::LEFT_PUPIL,
        landmarks::RIGHT_PUPIL,
        &Stroke::solid(AMBER, GUIDE_WIDTH),
    );

    if let Some(lip) = lm.get(landmarks::UPPER_LIP) {
        let y = (lip.y * h) as f32;
        surface.stroke_polyline(
            &[(0.0, y), (w as f32, y)],
            &Stroke::dashed(FAINT_GREY, THIN_WIDTH, 5.0, 5.0),
        );
    }
}

/// Smile path, commissure line, vertical dental midline and tooth-axis ticks.
pub fn draw_dental_guides(surface: &mut dyn DrawSurface, lm: &LandmarkSet) {
    let (w, h) = size(surface);

    contour(surface, lm, &LOWER_LIP_CONTOUR, &Stroke::solid(CYAN, GUIDE_WIDTH));
    line(
        surface,
        lm,
        landmarks::MOUTH_LEFT,
        landmarks::MOUTH_RIGHT,
        &Stroke::solid(AMBER, GUIDE_WIDTH),
    );

    if let (Some(upper), Some(lower)) = (lm.get(landmarks::UPPER_LIP), lm.get(landmarks::LOWER_LIP)) {
        surface.stroke_polyline(
            &[
                ((upper.x * w) as f32, ((upper.y - DENTAL_MIDLINE_EXTENT) * h) as f32),
                ((lower.x * w) as f32, ((lower.y + DENTAL_MIDLINE_EXTENT) * h) as f32),
            ],
            &Stroke::solid(CYAN, GUIDE_WIDTH),
        );
    }

    let tick = Stroke::solid(TOOTH_AXIS, THIN_WIDTH);
    for p in ANTERIOR_TEETH.iter().filter_map(|&i| lm.get(i)) {
        let x = (p.x * w) as f32;
        surface.stroke_polyline(
            &[
                (x, ((p.y - TOOTH_AXIS_EXTENT) * h) as f32),
                (x, ((p.y + TOOTH_AXIS_EXTENT) * h) as f32),
            ],
            &tick,
        );
    }
}

/// Marker color for a gingival point `deviation` (normalized units x 100).
pub fn gingival_marker_color(deviation: f64) -> Color {
    if deviation > 5.0 {
        MARKER_HIGH
    } else if deviation > 2.0 {
        MARKER_MID
    } else {
        MARKER_LOW
    }
}

/// Upper inner lip line, its horizontal reference and per-point deviation markers.
pub fn draw_gingival_analysis(surface: &mut dyn DrawSurface, lm: &LandmarkSet) {
    let wh = size(surface);
    let (w, h) = wh;

    contour(surface, lm, &UPPER_INNER_LIP, &Stroke::solid(RED, GUIDE_WIDTH));

    let Some(reference) = lm.get(landmarks::UPPER_LIP).map(|p| p.y) else {
        return;
    };

    let first = UPPER_INNER_LIP.first().and_then(|&i| lm.get(i));
    let last = UPPER_INNER_LIP.last().and_then(|&i| lm.get(i));
    if let (Some(first), Some(last)) = (first, last) {
        let y = (reference * h) as f32;
        surface.stroke_polyline(
            &[((first.x * w) as f32, y), ((last.x * w) as f32, y)],
            &Stroke::dashed(GINGIVAL_REFERENCE, THIN_WIDTH, 3.0, 3.0),
        );
    }

    for p in UPPER_INNER_LIP.iter().filter_map(|&i| lm.get(i)) {
        let deviation = (p.y - reference).abs() * 100.0;
        surface.fill_circle(px(p, wh), MARKER_RADIUS, gingival_marker_color(deviation));
    }
}

/// W/L, fullness and symmetry labels anchored near the mouth.
pub fn draw_measurement_annotations(surface: &mut dyn DrawSurface, lm: &LandmarkSet, m: &Measurements) {
    let (w, h) = size(surface);
    let labels = [
        (landmarks::UPPER_LIP, 0.05, format!("W/L: {:.0}%", m.central_incisors_wl_ratio)),
        (landmarks::LOWER_LIP, 0.08, format!("Fullness: {:.0}%", m.smile_fullness)),
        (landmarks::NOSE_BASE, 0.1, format!("Symmetry: {:.0}%", m.gingival_symmetry)),
    ];

    for (index, offset, text) in labels {
        if let Some(p) = lm.get(index) {
            let anchor = ((p.x * w) as f32, ((p.y + offset) * h) as f32);
            surface.fill_text(&text, anchor, ANNOTATION_SIZE, LABEL);
        }
    }
}

/// One metric of the deviation strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicator {
    pub label: &'static str,
    pub value: f64,
    pub ideal: f64,
    pub range: f64,
}

impl Indicator {
    /// Green within 25% of the range, amber within 50%, red beyond.
    pub fn color(&self) -> Color {
        let deviation = (self.value - self.ideal).abs();
        if deviation > self.range * 0.5 {
            RED
        } else if deviation > self.range * 0.25 {
            AMBER
        } else {
            GREEN
        }
    }
}

pub fn indicators(m: &Measurements) -> [Indicator; 4] {
    [
        Indicator { label: "W/L", value: m.central_incisors_wl_ratio, ideal: 78.0, range: 15.0 },
        Indicator { label: "GR-L", value: m.golden_ratio_lateral, ideal: 62.0, range: 8.0 },
        Indicator { label: "Symm", value: m.gingival_symmetry, ideal: 95.0, range: 10.0 },
        Indicator {
            label: "SFA",
            value: 100.0 - m.smile_arc_deviation.min(50.0),
            ideal: 90.0,
            range: 20.0,
        },
    ]
}

/// Colored deviation bars with labels along the top of the frame.
pub fn draw_deviation_indicators(surface: &mut dyn DrawSurface, m: &Measurements) {
    let center_x = surface.width() as f32 * 0.5;
    let top_y = surface.height() as f32 * 0.05;
    let (bar_w, bar_h) = INDICATOR_BAR;

    for (i, ind) in indicators(m).iter().enumerate() {
        let x = center_x - 120.0 + i as f32 * INDICATOR_SPACING;
        surface.fill_rect(x, top_y, bar_w, bar_h, ind.color());
        let cx = x + bar_w / 2.0;
        surface.fill_text(ind.label, (cx, top_y + 16.0), INDICATOR_SIZE, INDICATOR_LABEL);
        surface.fill_text(&format!("{:.0}%", ind.value), (cx, top_y + 27.0), INDICATOR_SIZE, INDICATOR_LABEL);
    }
}
