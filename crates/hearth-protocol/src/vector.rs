//! 2D vector math used for positions and movement.

use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A point or direction in the 2D world.
///
/// Stored as `f64` for simulation; the wire carries `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Length of the vector.
    pub fn magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Euclidean distance between two points.
    pub fn distance(self, other: Self) -> f64 {
        (other - self).magnitude()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            return Self::ZERO;
        }
        Self::new(self.x / mag, self.y / mag)
    }

    /// Vector pointing from `from` to `to`.
    pub fn direction(from: Self, to: Self) -> Self {
        to - from
    }

    /// Steps from `self` towards `dest` by at most `speed`.
    ///
    /// Lands exactly on `dest` when the remaining distance is no more than
    /// one step, so repeated calls never overshoot.
    pub fn move_towards(self, dest: Self, speed: f64) -> Self {
        let step = Self::direction(self, dest).normalize() * speed;
        if self.distance(dest) <= step.magnitude() {
            dest
        } else {
            self + step
        }
    }

    /// `true` if neither component is NaN or infinite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}
