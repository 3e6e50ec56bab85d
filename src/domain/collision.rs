//! Collision detection based on basic shapes.

use super::{Position, Rectangle};

pub trait HasCollision {
    fn has_collision(&self, other: &dyn HasCollision) -> bool {
        self.shape().has_intersection(&other.shape())
    }

    fn shape(&self) -> Shape;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Rectangle(Rectangle),
    Circle { position: Position, radius: f64 },
}

impl Shape {
    fn has_intersection(&self, other: &Shape) -> bool {
        match (self, other) {
            (
                Shape::Circle { position, radius },
                Shape::Circle {
                    position: other_position,
                    radius: other_radius,
                },
            ) => position.distance(*other_position) < radius + other_radius,
            (Shape::Circle { position, radius }, Shape::Rectangle(rectangle))
            | (Shape::Rectangle(rectangle), Shape::Circle { position, radius }) => {
                rectangle.clamp(*position).distance(*position) < *radius
                    || rectangle.contains(*position)
            }
            (Shape::Rectangle(rectangle), Shape::Rectangle(other)) => {
                rectangle.min().x() <= other.max().x()
                    && other.min().x() <= rectangle.max().x()
                    && rectangle.min().y() <= other.max().y()
                    && other.min().y() <= rectangle.max().y()
            }
        }
    }
}

impl HasCollision for Shape {
    fn shape(&self) -> Shape {
        *self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn square() -> Shape {
        Shape::Rectangle(Rectangle::from_corners(
            Position::new(-1.0, -1.0),
            Position::new(1.0, 1.0),
        ))
    }

    #[rstest]
    #[case::overlapping_edge(Position::new(1.5, 0.0), 0.6, true)]
    #[case::near_corner(Position::new(1.5, 1.5), 0.6, false)]
    #[case::touching_corner(Position::new(1.3, 1.3), 0.5, true)]
    #[case::inside(Position::new(0.2, 0.1), 0.01, true)]
    #[case::far(Position::new(5.0, 0.0), 1.0, false)]
    fn test_circle_rectangle(
        #[case] position: Position,
        #[case] radius: f64,
        #[case] expected: bool,
    ) {
        let circle = Shape::Circle { position, radius };
        assert_eq!(circle.has_collision(&square()), expected);
        assert_eq!(square().has_collision(&circle), expected);
    }

    #[test]
    fn test_circle_circle() {
        let a = Shape::Circle {
            position: Position::new(0.0, 0.0),
            radius: 1.0,
        };
        let b = Shape::Circle {
            position: Position::new(1.5, 0.0),
            radius: 0.6,
        };
        let c = Shape::Circle {
            position: Position::new(3.0, 0.0),
            radius: 0.6,
        };
        assert!(a.has_collision(&b));
        assert!(!a.has_collision(&c));
    }

    #[test]
    fn test_rectangle_rectangle() {
        let other = Shape::Rectangle(Rectangle::from_center(Position::new(1.5, 1.5), 1.0, 1.0));
        let far = Shape::Rectangle(Rectangle::from_center(Position::new(3.0, 0.0), 1.0, 1.0));
        assert!(square().has_collision(&other));
        assert!(!square().has_collision(&far));
    }
}
