//! Basic building blocks.
//!
//! The plane uses the mathematical orientation: the x-axis points right, the y-axis points up and
//! angles grow counter-clockwise.

use std::{
    f64::consts::PI,
    ops::{Add, Mul, Neg, Sub},
};

use nalgebra::{Point2, Rotation2, Vector2};

#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Position {
    x: f64,
    y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn distance(&self, position: Self) -> f64 {
        nalgebra::distance(&Point2::from(*self), &Point2::from(position))
    }

    pub fn norm(&self) -> f64 {
        Vector2::from(*self).norm()
    }

    pub fn dot(&self, other: Self) -> f64 {
        Vector2::from(*self).dot(&Vector2::from(other))
    }

    /// Z component of the cross product; positive if `other` lies counter-clockwise of `self`.
    pub fn cross(&self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn rotate_vector(&self, angle: Angle) -> Position {
        (Rotation2::new(angle.0) * Vector2::from(*self)).into()
    }

    pub fn rotate_about(&self, center: Position, angle: Angle) -> Position {
        center + (*self - center).rotate_vector(angle)
    }

    /// Nearest grid location. Only used where positions leave the simulation.
    pub fn rounded(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

impl From<Position> for Vector2<f64> {
    fn from(value: Position) -> Self {
        Vector2::new(value.x, value.y)
    }
}

impl From<Vector2<f64>> for Position {
    fn from(value: Vector2<f64>) -> Self {
        Position::new(value.x, value.y)
    }
}

impl From<Position> for Point2<f64> {
    fn from(value: Position) -> Self {
        Point2::new(value.x, value.y)
    }
}

impl From<Position> for (f64, f64) {
    fn from(value: Position) -> Self {
        (value.x, value.y)
    }
}

impl From<(f64, f64)> for Position {
    fn from(value: (f64, f64)) -> Self {
        Position::new(value.0, value.1)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// Angle in radians. Stored unwrapped; `to_deg` normalizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Angle(f64);

impl Angle {
    pub const fn new(radians: f64) -> Self {
        Self(radians)
    }

    pub fn from_deg(degree: f64) -> Self {
        Self(degree * PI / 180.0)
    }

    /// Degrees in `[0, 360)`.
    pub fn to_deg(self) -> f64 {
        let degree = (self.0 * (180.0 / PI)).rem_euclid(360.0);
        // rem_euclid may round up to exactly 360 for tiny negative inputs
        if degree >= 360.0 {
            0.0
        } else {
            degree
        }
    }

    pub fn radians(self) -> f64 {
        self.0
    }

    /// Unit vector pointing in this direction.
    pub fn unit_vector(self) -> Position {
        Position::new(self.0.cos(), self.0.sin())
    }

    /// Unit vector pointing 90 degrees counter-clockwise of this direction.
    pub fn left_normal(self) -> Position {
        Position::new(-self.0.sin(), self.0.cos())
    }
}

impl Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Angle(-self.0)
    }
}

impl Add for Angle {
    type Output = Angle;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Angle {
    type Output = Angle;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl From<Angle> for f64 {
    fn from(value: Angle) -> Self {
        value.0
    }
}

/// Axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Rectangle {
    min: Position,
    max: Position,
}

impl Rectangle {
    pub fn from_corners(c_1: Position, c_2: Position) -> Self {
        Self {
            min: Position::new(c_1.x.min(c_2.x), c_1.y.min(c_2.y)),
            max: Position::new(c_1.x.max(c_2.x), c_1.y.max(c_2.y)),
        }
    }

    pub fn from_center(center: Position, x_length: f64, y_length: f64) -> Self {
        let half = Position::new(x_length.abs() / 2.0, y_length.abs() / 2.0);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn min(&self) -> Position {
        self.min
    }

    pub fn max(&self) -> Position {
        self.max
    }

    pub fn center(&self) -> Position {
        (self.min + self.max) * 0.5
    }

    pub fn x_length(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn y_length(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Inclusive containment.
    pub fn contains(&self, position: Position) -> bool {
        position.x >= self.min.x
            && position.x <= self.max.x
            && position.y >= self.min.y
            && position.y <= self.max.y
    }

    /// Containment excluding the border.
    pub fn contains_strictly(&self, position: Position) -> bool {
        position.x > self.min.x
            && position.x < self.max.x
            && position.y > self.min.y
            && position.y < self.max.y
    }

    /// Point of the rectangle closest to `position`.
    pub fn clamp(&self, position: Position) -> Position {
        Position::new(
            position.x.clamp(self.min.x, self.max.x),
            position.y.clamp(self.min.y, self.max.y),
        )
    }

    pub fn translated(&self, offset: Position) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}
