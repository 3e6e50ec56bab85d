//! Beam cone of a ranging sensor and its intersection with triangle meshes.

use super::{Angle, Position};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct LineSegment {
    p1: Position,
    p2: Position,
}

impl LineSegment {
    pub fn new(p1: Position, p2: Position) -> Self {
        Self { p1, p2 }
    }

    pub fn p1(&self) -> Position {
        self.p1
    }

    pub fn p2(&self) -> Position {
        self.p2
    }

    /// Distance from `point` to the closest point of the segment.
    pub fn distance_to(&self, point: Position) -> f64 {
        let d = self.p2 - self.p1;
        let length_squared = d.dot(d);
        if length_squared == 0.0 {
            return self.p1.distance(point);
        }
        let t = ((point - self.p1).dot(d) / length_squared).clamp(0.0, 1.0);
        (self.p1 + d * t).distance(point)
    }

    /// Part of the segment on the non-negative side of the linear function `f`.
    fn clip(&self, f: impl Fn(Position) -> f64) -> Option<LineSegment> {
        let f1 = f(self.p1);
        let f2 = f(self.p2);
        match (f1 >= 0.0, f2 >= 0.0) {
            (true, true) => Some(*self),
            (false, false) => None,
            (true, false) => Some(LineSegment::new(self.p1, self.lerp(f1 / (f1 - f2)))),
            (false, true) => Some(LineSegment::new(self.lerp(f1 / (f1 - f2)), self.p2)),
        }
    }

    fn lerp(&self, t: f64) -> Position {
        self.p1 + (self.p2 - self.p1) * t
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    a: Position,
    b: Position,
    c: Position,
}

impl Triangle {
    pub fn new(a: Position, b: Position, c: Position) -> Self {
        Self { a, b, c }
    }

    pub fn vertices(&self) -> [Position; 3] {
        [self.a, self.b, self.c]
    }

    pub fn edges(&self) -> [LineSegment; 3] {
        [
            LineSegment::new(self.a, self.b),
            LineSegment::new(self.b, self.c),
            LineSegment::new(self.c, self.a),
        ]
    }

    /// Inclusive containment, independent of the vertex winding.
    pub fn contains(&self, point: Position) -> bool {
        let d1 = (self.b - self.a).cross(point - self.a);
        let d2 = (self.c - self.b).cross(point - self.b);
        let d3 = (self.a - self.c).cross(point - self.c);
        let has_negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_negative && has_positive)
    }
}

/// Infinite planar sector with its apex at the sensor. The half-width must be below 90 degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamCone {
    apex: Position,
    heading: Angle,
    half_width: Angle,
}

impl BeamCone {
    pub fn new(apex: Position, heading: Angle, half_width: Angle) -> Self {
        Self {
            apex,
            heading,
            half_width,
        }
    }

    pub fn apex(&self) -> Position {
        self.apex
    }

    fn left_boundary(&self) -> Position {
        (self.heading + self.half_width).unit_vector()
    }

    fn right_boundary(&self) -> Position {
        (self.heading - self.half_width).unit_vector()
    }

    pub fn contains(&self, point: Position) -> bool {
        let v = point - self.apex;
        self.right_boundary().cross(v) >= 0.0 && v.cross(self.left_boundary()) >= 0.0
    }

    /// Part of the segment lying inside the cone.
    pub fn clip(&self, segment: &LineSegment) -> Option<LineSegment> {
        let apex = self.apex;
        let right = self.right_boundary();
        let left = self.left_boundary();
        segment
            .clip(|p| right.cross(p - apex))
            .and_then(|s| s.clip(|p| (p - apex).cross(left)))
    }

    /// Distance from the apex to the closest point of the triangle inside the cone.
    pub fn distance_to_triangle(&self, triangle: &Triangle) -> Option<f64> {
        if triangle.contains(self.apex) {
            return Some(0.0);
        }
        // The closest point of the convex intersection lies on a clipped triangle edge
        triangle
            .edges()
            .iter()
            .filter_map(|edge| self.clip(edge))
            .map(|clipped| clipped.distance_to(self.apex))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn distance_to_closest<'a>(
        &self,
        triangles: impl IntoIterator<Item = &'a Triangle>,
    ) -> Option<f64> {
        triangles
            .into_iter()
            .filter_map(|t| self.distance_to_triangle(t))
            .min_by(|a, b| a.total_cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const EPSILON: f64 = 1e-9;

    fn cone(heading: f64) -> BeamCone {
        BeamCone::new(
            Position::new(0.0, 0.0),
            Angle::from_deg(heading),
            Angle::from_deg(10.0),
        )
    }

    #[test]
    fn test_line_segment_distance_to() {
        let segment = LineSegment::new(Position::new(0.0, 1.0), Position::new(4.0, 1.0));
        assert_abs_diff_eq!(segment.distance_to(Position::new(2.0, -1.0)), 2.0);
        assert_abs_diff_eq!(segment.distance_to(Position::new(7.0, 5.0)), 5.0);
    }

    #[test]
    fn test_triangle_contains() {
        let t = Triangle::new(
            Position::new(0.0, 0.0),
            Position::new(0.0, 2.0),
            Position::new(2.0, 0.0),
        );
        assert!(t.contains(Position::new(0.5, 0.5)));
        assert!(t.contains(Position::new(1.0, 1.0)));
        assert!(!t.contains(Position::new(1.5, 1.5)));
    }

    #[rstest]
    #[case::ahead(0.0, Position::new(30.0, 0.0), true)]
    #[case::at_border(0.0, Position::new(10.0, 10.0 * 10f64.to_radians().tan() - 1e-9), true)]
    #[case::beside(0.0, Position::new(10.0, 3.0), false)]
    #[case::behind(0.0, Position::new(-30.0, 0.0), false)]
    #[case::turned(90.0, Position::new(0.5, 30.0), true)]
    fn test_cone_contains(#[case] heading: f64, #[case] point: Position, #[case] expected: bool) {
        assert_eq!(cone(heading).contains(point), expected);
    }

    #[test]
    fn test_cone_distance_to_triangle_ahead() {
        let t = Triangle::new(
            Position::new(25.0, 0.0),
            Position::new(20.0, -5.0),
            Position::new(20.0, 5.0),
        );
        assert_abs_diff_eq!(cone(0.0).distance_to_triangle(&t).unwrap(), 20.0, epsilon = EPSILON);
    }

    #[test]
    fn test_cone_distance_to_triangle_partially_inside() {
        // Only the lower corner of the triangle reaches into the beam
        let t = Triangle::new(
            Position::new(10.0, 1.0),
            Position::new(10.0, 20.0),
            Position::new(30.0, 20.0),
        );
        let distance = cone(0.0).distance_to_triangle(&t).unwrap();
        assert_abs_diff_eq!(distance, Position::new(10.0, 1.0).norm(), epsilon = EPSILON);
    }

    #[test]
    fn test_cone_distance_to_triangle_edge_crossing_beam() {
        // An edge crossing the whole beam; the closest point is on the beam boundary
        let t = Triangle::new(
            Position::new(10.0, -50.0),
            Position::new(10.0, 50.0),
            Position::new(60.0, 0.0),
        );
        assert_abs_diff_eq!(cone(0.0).distance_to_triangle(&t).unwrap(), 10.0, epsilon = EPSILON);
    }

    #[test]
    fn test_cone_distance_to_triangle_outside() {
        let t = Triangle::new(
            Position::new(-5.0, 20.0),
            Position::new(5.0, 20.0),
            Position::new(0.0, 30.0),
        );
        assert_eq!(cone(0.0).distance_to_triangle(&t), None);
        assert_abs_diff_eq!(cone(90.0).distance_to_triangle(&t).unwrap(), 20.0, epsilon = EPSILON);
    }

    #[test]
    fn test_cone_apex_inside_triangle() {
        let t = Triangle::new(
            Position::new(-5.0, -5.0),
            Position::new(5.0, -5.0),
            Position::new(0.0, 5.0),
        );
        assert_eq!(cone(0.0).distance_to_triangle(&t), Some(0.0));
    }

    #[test]
    fn test_cone_distance_to_closest() {
        let near = Triangle::new(
            Position::new(15.0, -1.0),
            Position::new(15.0, 1.0),
            Position::new(17.0, 0.0),
        );
        let far = Triangle::new(
            Position::new(40.0, -1.0),
            Position::new(40.0, 1.0),
            Position::new(42.0, 0.0),
        );
        assert_abs_diff_eq!(
            cone(0.0).distance_to_closest([&far, &near]).unwrap(),
            15.0,
            epsilon = EPSILON
        );
        assert_eq!(cone(180.0).distance_to_closest([&far, &near]), None);
    }
}
