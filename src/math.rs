use std::f64::consts::PI;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const ORIGIN: Point2 = Point2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }

    /// Point reached by walking `length` units along `heading` (radians).
    pub fn step(&self, heading: f64, length: f64) -> Point2 {
        Point2::new(
            self.x + length * heading.cos(),
            self.y + length * heading.sin()
        )
    }

    pub fn rotate(&self, angle: f64) -> Point2 {
        let (s, c) = angle.sin_cos();
        Point2::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    pub fn dist(&self, other: Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub fn to_radians(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn to_degrees(radians: f64) -> f64 {
    radians * 180.0 / PI
}

/// Wraps an angle into (-PI, PI].
pub fn normalize_angle(theta: f64) -> f64 {
    let wrapped = (theta + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI { PI } else { wrapped }
}
