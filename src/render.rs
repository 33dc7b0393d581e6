use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::{info, warn};

use crate::buffer::{Bounds, GeometryBuffer, LineSegment};
use crate::config::Config;
use crate::error::Result;
use crate::math::Point2;
use crate::playback::{Playback, TickReport};
use crate::turtle::Theme;

const TEXT_ROWS: usize = 2;
const LINE_HEIGHT: usize = 8;

// 3x5 pixel font
fn glyph(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        'e' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'n' => [0b101, 0b111, 0b111, 0b111, 0b101],
        'o' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' => [0b111, 0b101, 0b111, 0b100, 0b100],
        's' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' => [0b111, 0b010, 0b010, 0b010, 0b010],
        _ => [0; 5],
    }
}

fn gray(level: f32) -> u32 {
    let v = (level.clamp(0.0, 1.0) * 255.0).round() as u32;
    (v << 16) | (v << 8) | v
}

/// Software line rasterizer standing in for a GPU line-segment upload.
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pixels: Vec<u32>,
    center: Point2,
    pixels_per_unit: f64,
    theme: Theme,
}

impl Canvas {
    pub fn new(width: usize, height: usize, pixels_per_unit: f64, theme: Theme) -> Self {
        let mut canvas = Canvas {
            width,
            height,
            pixels: vec![0; width * height],
            center: Point2::ORIGIN,
            pixels_per_unit,
            theme,
        };
        canvas.clear();
        canvas
    }

    pub fn from_config(config: &Config) -> Self {
        Canvas::new(config.width, config.height, config.pixels_per_unit, config.theme)
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn background(&self) -> u32 {
        match self.theme {
            Theme::Dark => 0x000000,
            Theme::Light => 0xFFFFFF,
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Line color for a segment width: `width * mix(0.5, 1.0, theme_color)`.
    pub fn shade(&self, width: f32) -> u32 {
        let mix = 0.5 + 0.5 * self.theme.color();
        gray(width * mix)
    }

    pub fn clear(&mut self) {
        let bg = self.background();
        self.pixels.fill(bg);
    }

    /// Centers the view on `bounds` and scales it to fill the canvas with a margin.
    pub fn fit(&mut self, bounds: Bounds) {
        let (w, h) = bounds.extent();
        self.center = bounds.center();
        let sx = if w > 0.0 { self.width as f64 / w } else { f64::INFINITY };
        let sy = if h > 0.0 { self.height as f64 / h } else { f64::INFINITY };
        let scale = sx.min(sy);
        if scale.is_finite() {
            self.pixels_per_unit = scale * 0.9;
        }
    }

    fn project(&self, p: Point2) -> (f64, f64) {
        let sx = self.width as f64 * 0.5 + (p.x - self.center.x) * self.pixels_per_unit;
        let sy = self.height as f64 * 0.5 - (p.y - self.center.y) * self.pixels_per_unit;
        (sx, sy)
    }

    pub fn to_screen(&self, p: Point2) -> (i64, i64) {
        let (sx, sy) = self.project(p);
        (sx.round() as i64, sy.round() as i64)
    }

    /// Liang-Barsky against the pixel rectangle. `None` when nothing of the line is visible.
    fn clip(&self, a: (f64, f64), b: (f64, f64)) -> Option<((f64, f64), (f64, f64))> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
            return None;
        }
        let xmax = self.width as f64 - 1.0;
        let ymax = self.height as f64 - 1.0;
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (p, q) in [(-dx, a.0), (dx, xmax - a.0), (-dy, a.1), (dy, ymax - a.1)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some(((a.0 + t0 * dx, a.1 + t0 * dy), (a.0 + t1 * dx, a.1 + t1 * dy)))
    }

    fn plot(&mut self, x: i64, y: i64, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    /// Bresenham over the visible part of `start..end`, after spinning both ends
    /// by `rotation` about the world origin.
    fn draw_line(&mut self, start: Point2, end: Point2, width: f32, rotation: f64) {
        let a = self.project(start.rotate(rotation));
        let b = self.project(end.rotate(rotation));
        let Some((a, b)) = self.clip(a, b) else {
            return;
        };
        let color = self.shade(width);
        let (mut x0, mut y0) = (a.0.round() as i64, a.1.round() as i64);
        let (x1, y1) = (b.0.round() as i64, b.1.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    pub fn draw_segment(&mut self, segment: &LineSegment, rotation: f64) {
        self.draw_line(segment.start, segment.end, segment.width, rotation);
    }

    /// Draws the vertex attributes of `buffer` from segment `from` on, the way a
    /// GPU line-segment upload would consume them.
    pub fn upload(&mut self, buffer: &GeometryBuffer, from: usize, rotation: f64) {
        let positions = buffer.vertex_positions(from);
        let widths = buffer.vertex_widths(from);
        for (ends, width) in positions.chunks_exact(6).zip(widths.chunks_exact(2)) {
            let start = Point2::new(ends[0] as f64, ends[1] as f64);
            let end = Point2::new(ends[3] as f64, ends[4] as f64);
            self.draw_line(start, end, width[0], rotation);
        }
    }

    pub fn redraw(
        &mut self,
        primary: &GeometryBuffer,
        secondary: &GeometryBuffer,
        secondary_rotation: f64,
    ) {
        self.clear();
        self.upload(primary, 0, 0.0);
        self.upload(secondary, 0, secondary_rotation);
    }

    fn draw_char(&mut self, x: usize, y: usize, ch: char, color: u32) {
        for (dy, row) in glyph(ch).iter().enumerate() {
            for dx in 0..3 {
                if row & (1 << (2 - dx)) != 0 {
                    self.plot((x + dx) as i64, (y + dy) as i64, color);
                }
            }
        }
    }

    pub fn draw_text(&mut self, x: usize, y: usize, text: &str, color: u32) {
        for (i, ch) in text.to_lowercase().chars().enumerate() {
            let offset = x + i * 4;
            if offset + 4 >= self.width {
                break;
            }
            self.draw_char(offset, y, ch, color);
        }
    }

    /// Clears the top-left strip and writes `lines` into it.
    pub fn draw_overlay(&mut self, lines: &[String]) {
        let bg = self.background();
        let fg = self.background() ^ 0xFFFFFF;
        let strip = (TEXT_ROWS * LINE_HEIGHT + 10).min(self.height);
        let strip_width = 200.min(self.width);
        for y in 0..strip {
            self.pixels[y * self.width..y * self.width + strip_width].fill(bg);
        }
        for (i, line) in lines.iter().take(TEXT_ROWS).enumerate() {
            self.draw_text(5, 5 + i * LINE_HEIGHT, line, fg);
        }
    }
}

pub fn overlay_lines(report: &TickReport) -> Vec<String> {
    vec![
        format!("step {} of {}", report.cursor, report.total),
        format!("gen {}", report.generation),
    ]
}

/// Applies one tick to `canvas`: incremental draw in steady state, full redraw
/// when the report says the uploaded geometry went stale or the frame spins.
pub fn present(canvas: &mut Canvas, playback: &Playback, report: &TickReport, last_spin: f64) {
    canvas.set_theme(playback.theme());
    if report.full_redraw || report.secondary_rotation != last_spin {
        canvas.redraw(
            playback.primary().buffer(),
            playback.secondary().buffer(),
            report.secondary_rotation,
        );
    } else {
        let primary = playback.primary().buffer();
        let secondary = playback.secondary().buffer();
        canvas.upload(primary, primary.len().saturating_sub(report.primary.len()), 0.0);
        canvas.upload(
            secondary,
            secondary.len().saturating_sub(report.secondary.len()),
            report.secondary_rotation,
        );
    }
    canvas.draw_overlay(&overlay_lines(report));
}

/// Opens a window and ticks `playback` once per frame until it is closed.
///
/// Keys: `R` reset, `T` toggle theme, `I` toggle instant, `C` fit to drawing.
pub fn spawn_visualizer(playback: Arc<Mutex<Playback>>, config: &Config) -> JoinHandle<Result<()>> {
    let config = config.clone();
    thread::spawn(move || -> Result<()> {
        let mut window = Window::new(
            "Penrose L-system",
            config.width,
            config.height,
            WindowOptions::default(),
        )?;
        window.set_target_fps(config.fps);

        let mut canvas = Canvas::from_config(&config);
        let mut last_spin = 0.0;
        info!(width = config.width, height = config.height, fps = config.fps, "visualizer started");

        while window.is_open() && !window.is_key_down(Key::Escape) {
            {
                let mut playback = playback.lock().unwrap_or_else(PoisonError::into_inner);

                if window.is_key_pressed(Key::R, KeyRepeat::No) {
                    playback.reset();
                }
                if window.is_key_pressed(Key::T, KeyRepeat::No) {
                    let theme = playback.theme().toggled();
                    playback.set_theme(theme);
                }
                if window.is_key_pressed(Key::I, KeyRepeat::No) {
                    let instant = !playback.controller().params().instant;
                    playback.set_instant(instant);
                }
                let fit = window.is_key_pressed(Key::C, KeyRepeat::No);

                let mut report = playback.tick();
                if fit {
                    match playback.primary().buffer().bounds() {
                        Some(bounds) => {
                            canvas.fit(bounds);
                            report.full_redraw = true;
                        }
                        None => warn!("nothing drawn yet, cannot fit view"),
                    }
                }
                present(&mut canvas, &playback, &report, last_spin);
                last_spin = report.secondary_rotation;
            }

            window.update_with_buffer(canvas.pixels(), canvas.width, canvas.height)?;
        }
        info!("visualizer closed");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::playback::PlaybackParams;

    fn horizontal(width: f32) -> LineSegment {
        LineSegment::new(Point2::new(-10.0, 0.0), Point2::new(10.0, 0.0), width)
    }

    #[test]
    fn segment_lands_on_center_row() {
        let mut canvas = Canvas::new(64, 64, 1.0, Theme::Dark);
        canvas.draw_segment(&horizontal(1.0), 0.0);
        assert_eq!(canvas.pixel(32, 32), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(22, 32), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(32, 20), Some(0x000000));
    }

    #[test]
    fn rotation_spins_about_origin() {
        let mut canvas = Canvas::new(64, 64, 1.0, Theme::Dark);
        canvas.draw_segment(&horizontal(1.0), std::f64::consts::FRAC_PI_2);
        assert_eq!(canvas.pixel(32, 24), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(24, 32), Some(0x000000));
    }

    #[test]
    fn light_theme_shades_at_half_intensity() {
        let canvas = Canvas::new(8, 8, 1.0, Theme::Light);
        assert_eq!(canvas.background(), 0xFFFFFF);
        assert_eq!(canvas.shade(1.0), gray(0.5));
        assert_eq!(Canvas::new(8, 8, 1.0, Theme::Dark).shade(0.5), gray(0.5));
    }

    #[test]
    fn offscreen_segments_leave_canvas_untouched() {
        let mut canvas = Canvas::new(16, 16, 1.0, Theme::Dark);
        let far = LineSegment::new(Point2::new(100.0, 100.0), Point2::new(200.0, 120.0), 1.0);
        canvas.draw_segment(&far, 0.0);
        let nan = LineSegment::new(Point2::new(f64::NAN, 0.0), Point2::new(1.0, 1.0), 1.0);
        canvas.draw_segment(&nan, 0.0);
        assert!(canvas.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn huge_segments_are_clipped_to_the_canvas() {
        let mut canvas = Canvas::new(16, 16, 1.0, Theme::Dark);
        canvas.draw_segment(&LineSegment::new(Point2::ORIGIN, Point2::new(2e8, 0.0), 1.0), 0.0);
        assert!((0..8).all(|x| canvas.pixel(x, 8) == Some(0x000000)));
        assert!((8..16).all(|x| canvas.pixel(x, 8) == Some(0xFFFFFF)));

        let across = LineSegment::new(Point2::new(-1e12, -4.0), Point2::new(1e12, -4.0), 1.0);
        canvas.draw_segment(&across, 0.0);
        assert!((0..16).all(|x| canvas.pixel(x, 12) == Some(0xFFFFFF)));
    }

    #[test]
    fn upload_draws_only_new_segments() {
        let mut buffer = GeometryBuffer::default();
        buffer.append(&[
            LineSegment::new(Point2::new(-10.0, 10.0), Point2::new(10.0, 10.0), 1.0),
            LineSegment::new(Point2::new(-10.0, -10.0), Point2::new(10.0, -10.0), 1.0),
        ]);
        let mut canvas = Canvas::new(64, 64, 1.0, Theme::Dark);
        canvas.upload(&buffer, 1, 0.0);
        assert_eq!(canvas.pixel(32, 42), Some(0xFFFFFF));
        assert_eq!(canvas.pixel(32, 22), Some(0x000000));

        canvas.redraw(&buffer, &GeometryBuffer::default(), 0.0);
        assert_eq!(canvas.pixel(32, 22), Some(0xFFFFFF));
    }

    #[test]
    fn fit_brings_drawing_into_view() {
        let mut canvas = Canvas::new(100, 100, 1.0, Theme::Dark);
        let bounds = Bounds { min: Point2::new(1000.0, 1000.0), max: Point2::new(1200.0, 1100.0) };
        canvas.fit(bounds);
        let (x, y) = canvas.to_screen(bounds.center());
        assert_eq!((x, y), (50, 50));
        let (x0, _) = canvas.to_screen(bounds.min);
        assert!(x0 >= 0);
    }

    #[test]
    fn present_draws_incrementally_and_overlays_progress() {
        let params = PlaybackParams { generations: 1, step_budget: 4, ..PlaybackParams::default() };
        let mut playback = Playback::new(Grammar::koch(), params, Theme::Dark);
        let mut canvas = Canvas::new(64, 64, 20.0, Theme::Dark);
        let report = playback.tick();
        present(&mut canvas, &playback, &report, 0.0);
        assert_eq!(overlay_lines(&report)[0], "step 4 of 8");
        assert!(canvas.pixels().iter().any(|&p| p != 0));
    }
}
