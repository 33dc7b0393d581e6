use serde::{Deserialize, Serialize};

use crate::math::Point2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Point2,
    pub end: Point2,
    pub width: f32,
}

impl LineSegment {
    pub fn new(start: Point2, end: Point2, width: f32) -> Self {
        LineSegment { start, end, width }
    }

    pub fn length(&self) -> f64 {
        self.start.dist(self.end)
    }

    pub fn heading(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }
}

/// Axis-aligned bounding box in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point2,
    pub max: Point2,
}

impl Bounds {
    pub fn center(&self) -> Point2 {
        Point2::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    pub fn extent(&self) -> (f64, f64) {
        (self.max.x - self.min.x, self.max.y - self.min.y)
    }

    fn include(&mut self, p: Point2) {
        self.min = Point2::new(self.min.x.min(p.x), self.min.y.min(p.y));
        self.max = Point2::new(self.max.x.max(p.x), self.max.y.max(p.y));
    }
}

/// Append-only segment store plus the production cursor it was built up to.
///
/// Segments are never rewritten in place; the only way back is [`GeometryBuffer::clear`].
#[derive(Clone, Debug, Default)]
pub struct GeometryBuffer {
    segments: Vec<LineSegment>,
    cursor: usize,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        GeometryBuffer::default()
    }

    /// Appends `segments` and returns the index of the first one, so callers
    /// can hand the freshly appended slice straight to [`GeometryBuffer::since`].
    pub fn append(&mut self, segments: &[LineSegment]) -> usize {
        let first = self.segments.len();
        self.segments.extend_from_slice(segments);
        first
    }

    pub fn push(&mut self, segment: LineSegment) {
        self.segments.push(segment);
    }

    /// Segments appended at or after `index`.
    pub fn since(&self, index: usize) -> &[LineSegment] {
        &self.segments[index.min(self.segments.len())..]
    }

    pub fn all(&self) -> &[LineSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor >= self.cursor, "cursor only moves forward between clears");
        self.cursor = cursor;
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.cursor = 0;
    }

    /// `[x, y, 0.0]` per vertex, two vertices per segment, starting at segment `from`.
    pub fn vertex_positions(&self, from: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.since(from).len() * 6);
        for seg in self.since(from) {
            out.extend_from_slice(&[seg.start.x as f32, seg.start.y as f32, 0.0]);
            out.extend_from_slice(&[seg.end.x as f32, seg.end.y as f32, 0.0]);
        }
        out
    }

    /// One width per vertex, matching [`GeometryBuffer::vertex_positions`].
    pub fn vertex_widths(&self, from: usize) -> Vec<f32> {
        self.since(from).iter().flat_map(|seg| [seg.width, seg.width]).collect()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.segments.first()?;
        let mut bounds = Bounds { min: first.start, max: first.start };
        for seg in &self.segments {
            bounds.include(seg.start);
            bounds.include(seg.end);
        }
        Some(bounds)
    }
}
