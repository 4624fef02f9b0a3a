//! Drawing surfaces the overlay renderers paint onto.
//!
//! Coordinates are frame pixels. When a surface is mirrored every primitive
//! is reflected about the vertical center line (`x -> width - x`). Text
//! anchors are reflected but glyphs are drawn unmirrored.

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{self, Blend};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    fn pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }
}

/// Line style for [`DrawSurface::stroke_polyline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
    /// `[on, off]` lengths in pixels; `None` draws a solid line.
    pub dash: Option<[f32; 2]>,
}

impl Stroke {
    pub const fn solid(color: Color, width: f32) -> Self {
        Self { color, width, dash: None }
    }

    pub const fn dashed(color: Color, width: f32, on: f32, off: f32) -> Self {
        Self {
            color,
            width,
            dash: Some([on, off]),
        }
    }
}

/// A 2D target for overlay primitives.
pub trait DrawSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Erase everything drawn so far.
    fn clear(&mut self);
    fn set_mirrored(&mut self, mirrored: bool);
    fn stroke_polyline(&mut self, points: &[(f32, f32)], stroke: &Stroke);
    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color);
    /// Draw `text` horizontally centered on `anchor`, with `anchor.1` as baseline.
    fn fill_text(&mut self, text: &str, anchor: (f32, f32), size: f32, color: Color);
}

fn mirror_x(x: f32, width: u32, mirrored: bool) -> f32 {
    if mirrored {
        width as f32 - x
    } else {
        x
    }
}

/// One recorded primitive, in final (already mirrored) surface coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Polyline { points: Vec<(f32, f32)>, stroke: Stroke },
    Circle { center: (f32, f32), radius: f32, color: Color },
    Rect { x: f32, y: f32, w: f32, h: f32, color: Color },
    Text { text: String, anchor: (f32, f32), size: f32, color: Color },
}

/// Surface that records draw calls instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    mirrored: bool,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl DrawSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], stroke: &Stroke) {
        let points = points
            .iter()
            .map(|&(x, y)| (mirror_x(x, self.width, self.mirrored), y))
            .collect();
        self.commands.push(DrawCommand::Polyline { points, stroke: *stroke });
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        let center = (mirror_x(center.0, self.width, self.mirrored), center.1);
        self.commands.push(DrawCommand::Circle { center, radius, color });
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let x = if self.mirrored { self.width as f32 - x - w } else { x };
        self.commands.push(DrawCommand::Rect { x, y, w, h, color });
    }

    fn fill_text(&mut self, text: &str, anchor: (f32, f32), size: f32, color: Color) {
        let anchor = (mirror_x(anchor.0, self.width, self.mirrored), anchor.1);
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            anchor,
            size,
            color,
        });
    }
}

/// Alpha-blending RGBA raster surface.
///
/// Text is drawn only when a font has been supplied.
pub struct RasterSurface {
    canvas: Blend<RgbaImage>,
    mirrored: bool,
    font: Option<FontArc>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Blend(RgbaImage::new(width, height)),
            mirrored: false,
            font: None,
        }
    }

    pub fn with_font(mut self, font: Option<FontArc>) -> Self {
        self.font = font;
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas.0
    }

    /// Resize, discarding the current contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.0.dimensions() != (width, height) {
            self.canvas = Blend(RgbaImage::new(width, height));
        }
    }

    fn segment(&mut self, a: (f32, f32), b: (f32, f32), stroke: &Stroke) {
        let color = stroke.color.pixel();
        if stroke.width <= 1.5 {
            drawing::draw_line_segment_mut(&mut self.canvas, a, b, color);
            return;
        }

        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len < f32::EPSILON {
            return;
        }
        let half = stroke.width / 2.0;
        let (nx, ny) = (-dy / len * half, dx / len * half);
        let quad = [
            Point::new((a.0 + nx).round() as i32, (a.1 + ny).round() as i32),
            Point::new((b.0 + nx).round() as i32, (b.1 + ny).round() as i32),
            Point::new((b.0 - nx).round() as i32, (b.1 - ny).round() as i32),
            Point::new((a.0 - nx).round() as i32, (a.1 - ny).round() as i32),
        ];
        if quad[0] == quad[3] {
            drawing::draw_line_segment_mut(&mut self.canvas, a, b, color);
        } else {
            drawing::draw_polygon_mut(&mut self.canvas, &quad, color);
        }
    }
}

/// Split a polyline into the visible pieces of an `[on, off]` dash pattern.
pub(crate) fn dash_segments(points: &[(f32, f32)], on: f32, off: f32) -> Vec<((f32, f32), (f32, f32))> {
    let mut out = Vec::new();
    if on <= 0.0 {
        return out;
    }
    let period = on + off.max(0.0);
    // Position within the current period; the pattern continues across vertices.
    let mut phase = 0.0f32;

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        if len < f32::EPSILON {
            continue;
        }
        let at = |t: f32| (a.0 + (b.0 - a.0) * t / len, a.1 + (b.1 - a.1) * t / len);

        let mut t = 0.0f32;
        while t < len {
            if phase < on {
                let end = (t + on - phase).min(len);
                out.push((at(t), at(end)));
                phase += end - t;
                t = end;
            } else {
                let end = (t + period - phase).min(len);
                phase += end - t;
                t = end;
            }
            if phase >= period {
                phase -= period;
            }
        }
    }
    out
}

impl DrawSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.canvas.0.width()
    }

    fn height(&self) -> u32 {
        self.canvas.0.height()
    }

    fn clear(&mut self) {
        for px in self.canvas.0.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], stroke: &Stroke) {
        let width = self.width();
        let mirrored: Vec<(f32, f32)> = points
            .iter()
            .map(|&(x, y)| (mirror_x(x, width, self.mirrored), y))
            .collect();

        match stroke.dash {
            Some([on, off]) => {
                for (a, b) in dash_segments(&mirrored, on, off) {
                    self.segment(a, b, stroke);
                }
            }
            None => {
                for pair in mirrored.windows(2) {
                    self.segment(pair[0], pair[1], stroke);
                }
            }
        }
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Color) {
        let x = mirror_x(center.0, self.width(), self.mirrored);
        drawing::draw_filled_circle_mut(
            &mut self.canvas,
            (x.round() as i32, center.1.round() as i32),
            radius.round().max(1.0) as i32,
            color.pixel(),
        );
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let (wi, hi) = (w.round() as u32, h.round() as u32);
        if wi == 0 || hi == 0 {
            return;
        }
        let x = if self.mirrored { self.width() as f32 - x - w } else { x };
        let rect = Rect::at(x.round() as i32, y.round() as i32).of_size(wi, hi);
        drawing::draw_filled_rect_mut(&mut self.canvas, rect, color.pixel());
    }

    fn fill_text(&mut self, text: &str, anchor: (f32, f32), size: f32, color: Color) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let scale = PxScale::from(size);
        let (text_w, _) = drawing::text_size(scale, font, text);
        let x = mirror_x(anchor.0, self.width(), self.mirrored) - text_w as f32 / 2.0;
        // Baseline sits roughly 0.8 em below the top of the glyph box.
        let y = anchor.1 - size * 0.8;
        drawing::draw_text_mut(
            &mut self.canvas,
            color.pixel(),
            x.round() as i32,
            y.round() as i32,
            scale,
            font,
            text,
        );
    }
}
