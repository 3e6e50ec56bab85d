//! Differential-drive kinematics.
//!
//! Curved motion rotates the pose about a rotation center at a signed offset along the left-hand
//! normal of the heading (positive = left). The heading changes by `factor * v / offset` degrees
//! per tick, with `v` the signed speed of the axle center. The center is derived once when a curve
//! starts and kept as long as the curve parameters do not change.

use log::debug;

use super::{ActuatorState, Angle, Mode, Position, SimConfig};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub position: Position,
    pub heading: Angle,
}

impl Pose {
    pub fn new(position: Position, heading: Angle) -> Self {
        Self { position, heading }
    }

    /// Transforms a point given in robot coordinates into world coordinates.
    pub fn to_world(&self, local: Position) -> Position {
        self.position + local.rotate_vector(self.heading)
    }
}

/// Parameters that determine the rotation center of a curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArcKey {
    Gear { mode: Mode, radius: f64 },
    Motors { left: f64, right: f64 },
}

/// Pose change of one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Motion {
    Idle,
    /// Signed distance along the heading.
    Straight(f64),
    Spin(Angle),
    Arc {
        key: ArcKey,
        offset: f64,
        increment: Angle,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationContext {
    center: Position,
    sign: f64,
    increment: Angle,
}

impl RotationContext {
    pub fn center(&self) -> Position {
        self.center
    }

    /// 1 for counter-clockwise rotation, -1 for clockwise.
    pub fn sign(&self) -> f64 {
        self.sign
    }

    pub fn increment(&self) -> Angle {
        self.increment
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Kinematics {
    axle_length: f64,
    nb_steps: f64,
    mot_turn_angle: f64,
    gear_turn_angle: f64,
    motor_rot_inc_factor: f64,
    gear_rot_inc_factor: f64,
}

impl Kinematics {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            axle_length: config.axle_length,
            nb_steps: config.nb_steps,
            mot_turn_angle: config.mot_turn_angle,
            gear_turn_angle: config.gear_turn_angle,
            motor_rot_inc_factor: config.motor_rot_inc_factor,
            gear_rot_inc_factor: config.gear_rot_inc_factor,
        }
    }

    pub fn gear_motion(&self, gear: &ActuatorState) -> Motion {
        if !gear.is_moving() {
            return Motion::Idle;
        }
        let speed = gear.speed() as f64;
        let direction = if gear.is_forward() { 1.0 } else { -1.0 };
        match gear.mode() {
            Mode::Forward => Motion::Straight(self.nb_steps * speed),
            Mode::Backward => Motion::Straight(-self.nb_steps * speed),
            Mode::MoveTo => Motion::Straight(direction * self.nb_steps * speed),
            Mode::Left => Motion::Spin(Angle::from_deg(self.gear_turn_angle * speed)),
            Mode::Right => Motion::Spin(Angle::from_deg(-self.gear_turn_angle * speed)),
            Mode::TurnTo => Motion::Spin(Angle::from_deg(direction * self.gear_turn_angle * speed)),
            Mode::LeftArc | Mode::RightArc => match gear.radius() {
                Some(radius) if radius != 0.0 => {
                    let offset = if gear.mode() == Mode::LeftArc {
                        radius.abs()
                    } else {
                        -radius.abs()
                    };
                    Motion::Arc {
                        key: ArcKey::Gear {
                            mode: gear.mode(),
                            radius,
                        },
                        offset,
                        increment: Angle::from_deg(
                            self.gear_rot_inc_factor * gear.signed_speed() / offset,
                        ),
                    }
                }
                _ => Motion::Idle,
            },
            Mode::Stopped | Mode::RotateTo => Motion::Idle,
        }
    }

    /// Motion from the signed wheel speeds of the left (A) and right (B) motor.
    pub fn motor_motion(&self, left: f64, right: f64) -> Motion {
        if left == 0.0 && right == 0.0 {
            Motion::Idle
        } else if left == right {
            Motion::Straight(self.nb_steps * left)
        } else if left == -right {
            Motion::Spin(Angle::from_deg(self.mot_turn_angle * right))
        } else {
            let offset = self.axle_length / 2.0 * (left + right) / (right - left);
            let center_speed = (left + right) / 2.0;
            Motion::Arc {
                key: ArcKey::Motors { left, right },
                offset,
                increment: Angle::from_deg(self.motor_rot_inc_factor * center_speed / offset),
            }
        }
    }

    /// Motion of a two-motor drivetrain. A single motor does not move the robot.
    pub fn motors_motion(
        &self,
        left: Option<&ActuatorState>,
        right: Option<&ActuatorState>,
    ) -> Motion {
        match (left, right) {
            (Some(left), Some(right)) => {
                self.motor_motion(left.signed_speed(), right.signed_speed())
            }
            _ => Motion::Idle,
        }
    }
}

/// Applies motions to a pose and caches the rotation center of the current curve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solver {
    context: Option<(ArcKey, RotationContext)>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, pose: &mut Pose, motion: Motion) {
        match motion {
            Motion::Idle => self.invalidate(),
            Motion::Straight(distance) => {
                self.invalidate();
                pose.position = pose.position + pose.heading.unit_vector() * distance;
            }
            Motion::Spin(angle) => {
                self.invalidate();
                pose.heading = pose.heading + angle;
            }
            Motion::Arc {
                key,
                offset,
                increment,
            } => {
                if self.context.as_ref().map(|(cached, _)| *cached) != Some(key) {
                    let center = pose.position + pose.heading.left_normal() * offset;
                    debug!("rotation center {:?} for {:?}", center, key);
                    self.context = Some((
                        key,
                        RotationContext {
                            center,
                            sign: 0.0,
                            increment,
                        },
                    ));
                }
                if let Some((_, context)) = &mut self.context {
                    context.increment = increment;
                    context.sign = increment.radians().signum();
                    pose.position = pose.position.rotate_about(context.center, increment);
                }
                pose.heading = pose.heading + increment;
            }
        }
    }

    /// Forces the next curve to derive a new rotation center.
    pub fn invalidate(&mut self) {
        self.context = None;
    }

    pub fn context(&self) -> Option<&RotationContext> {
        self.context.as_ref().map(|(_, context)| context)
    }

    pub fn center(&self) -> Option<Position> {
        self.context().map(RotationContext::center)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const EPSILON: f64 = 1e-9;

    fn kinematics() -> Kinematics {
        Kinematics::new(&SimConfig::default())
    }

    fn gear(mode: Mode, radius: Option<f64>, speed: u8) -> ActuatorState {
        let mut state = ActuatorState::new(speed);
        state.command(mode, radius);
        state
    }

    #[rstest]
    #[case::east(0.0, 50.0)]
    #[case::north_west(135.0, 30.0)]
    #[case::backward(250.0, -70.0)]
    #[case::unwrapped(-400.0, 10.0)]
    fn test_straight_advance(#[case] heading: f64, #[case] speed: f64) {
        let mut pose = Pose::new(Position::new(3.0, -2.0), Angle::from_deg(heading));
        let before = pose;
        Solver::new().apply(&mut pose, kinematics().motor_motion(speed, speed));
        let delta = pose.position - before.position;
        assert_abs_diff_eq!(delta.cross(before.heading.unit_vector()), 0.0, epsilon = EPSILON);
        assert_abs_diff_eq!(
            delta.dot(before.heading.unit_vector()),
            speed * 0.03,
            epsilon = EPSILON
        );
        assert_eq!(pose.heading, before.heading);
    }

    #[rstest]
    #[case::counter_clockwise(-40.0, 40.0, 3.2)]
    #[case::clockwise(25.0, -25.0, -2.0)]
    fn test_spin(#[case] left: f64, #[case] right: f64, #[case] degree: f64) {
        let mut pose = Pose::new(Position::new(1.0, 1.0), Angle::from_deg(10.0));
        let mut solver = Solver::new();
        for tick in 1..=5 {
            solver.apply(&mut pose, kinematics().motor_motion(left, right));
            assert_eq!(pose.position, Position::new(1.0, 1.0));
            assert_abs_diff_eq!(
                pose.heading.radians(),
                Angle::from_deg(10.0 + tick as f64 * degree).radians(),
                epsilon = EPSILON
            );
        }
        assert_eq!(solver.center(), None);
    }

    #[rstest]
    #[case::left(Mode::Left, 5.0)]
    #[case::right(Mode::Right, -5.0)]
    fn test_gear_spin(#[case] mode: Mode, #[case] degree: f64) {
        assert_eq!(
            kinematics().gear_motion(&gear(mode, None, 50)),
            Motion::Spin(Angle::from_deg(degree))
        );
    }

    #[test]
    fn test_gear_idle() {
        assert_eq!(kinematics().gear_motion(&gear(Mode::Stopped, None, 50)), Motion::Idle);
        assert_eq!(kinematics().gear_motion(&gear(Mode::Forward, None, 0)), Motion::Idle);
    }

    #[rstest]
    #[case::left(Mode::LeftArc, 114.0, 1.0)]
    #[case::right(Mode::RightArc, 114.0, -1.0)]
    #[case::left_backward(Mode::LeftArc, -114.0, -1.0)]
    #[case::right_backward(Mode::RightArc, -114.0, 1.0)]
    fn test_gear_arc_keeps_distance_to_center(
        #[case] mode: Mode,
        #[case] radius: f64,
        #[case] sign: f64,
    ) {
        let mut pose = Pose::new(Position::new(0.0, 0.0), Angle::from_deg(30.0));
        let mut solver = Solver::new();
        let state = gear(mode, Some(radius), 50);
        let mut center = None;
        for _ in 0..200 {
            let before = pose.heading;
            solver.apply(&mut pose, kinematics().gear_motion(&state));
            let context = *solver.context().unwrap();
            assert_eq!(*center.get_or_insert(context.center()), context.center());
            assert_abs_diff_eq!(
                context.center().distance(pose.position),
                radius.abs(),
                epsilon = 1e-6
            );
            assert_abs_diff_eq!(
                (pose.heading - before).radians(),
                Angle::from_deg(sign * 0.8 * 50.0 / radius.abs()).radians(),
                epsilon = EPSILON
            );
            assert_eq!(context.sign(), sign);
        }
        let expected_center =
            Angle::from_deg(30.0).left_normal() * (sign_of_side(mode) * radius.abs());
        assert_abs_diff_eq!(center.unwrap(), expected_center, epsilon = EPSILON);
    }

    fn sign_of_side(mode: Mode) -> f64 {
        if mode == Mode::LeftArc {
            1.0
        } else {
            -1.0
        }
    }

    #[test]
    fn test_center_kept_on_speed_change() {
        let mut pose = Pose::default();
        let mut solver = Solver::new();
        let mut state = gear(Mode::LeftArc, Some(100.0), 50);
        solver.apply(&mut pose, kinematics().gear_motion(&state));
        let center = solver.center();
        state.set_speed(80);
        solver.apply(&mut pose, kinematics().gear_motion(&state));
        assert_eq!(solver.center(), center);

        state.command(Mode::LeftArc, Some(120.0));
        solver.apply(&mut pose, kinematics().gear_motion(&state));
        assert_ne!(solver.center(), center);
    }

    #[test]
    fn test_center_recomputed_after_straight() {
        let mut pose = Pose::default();
        let mut solver = Solver::new();
        let arc = gear(Mode::LeftArc, Some(100.0), 50);
        solver.apply(&mut pose, kinematics().gear_motion(&arc));
        let center = solver.center().unwrap();
        solver.apply(&mut pose, kinematics().gear_motion(&gear(Mode::Forward, None, 50)));
        assert_eq!(solver.center(), None);
        solver.apply(&mut pose, kinematics().gear_motion(&arc));
        let moved = solver.center().unwrap();
        assert_abs_diff_eq!(moved.distance(center), 1.5, epsilon = 1e-6);
    }

    #[rstest]
    #[case::pivot_on_left_wheel(0.0, 50.0, 28.5)]
    #[case::pivot_on_right_wheel(50.0, 0.0, -28.5)]
    #[case::wide_left(40.0, 60.0, 142.5)]
    #[case::backward_right(-60.0, -40.0, -142.5)]
    #[case::counter_rotating(-20.0, 50.0, 28.5 * 30.0 / 70.0)]
    fn test_motor_arc_offset(#[case] left: f64, #[case] right: f64, #[case] expected: f64) {
        match kinematics().motor_motion(left, right) {
            Motion::Arc {
                offset, increment, ..
            } => {
                assert_abs_diff_eq!(offset, expected, epsilon = EPSILON);
                let center_speed = (left + right) / 2.0;
                assert_abs_diff_eq!(
                    increment.radians(),
                    Angle::from_deg(1.2 * center_speed / expected).radians(),
                    epsilon = EPSILON
                );
            }
            motion => panic!("expected an arc, got {motion:?}"),
        }
    }

    #[test]
    fn test_pivot_keeps_stopped_wheel_fixed() {
        let mut pose = Pose::new(Position::new(10.0, 10.0), Angle::from_deg(90.0));
        let mut solver = Solver::new();
        let left_wheel = pose.to_world(Position::new(0.0, 28.5));
        for _ in 0..50 {
            solver.apply(&mut pose, kinematics().motor_motion(0.0, 50.0));
            assert_abs_diff_eq!(
                pose.to_world(Position::new(0.0, 28.5)),
                left_wheel,
                epsilon = 1e-6
            );
        }
        assert!(pose.heading.radians() > Angle::from_deg(90.0).radians());
    }

    #[test]
    fn test_single_motor_is_idle() {
        let motor = gear(Mode::Forward, None, 50);
        assert_eq!(kinematics().motors_motion(Some(&motor), None), Motion::Idle);
        assert_eq!(
            kinematics().motors_motion(Some(&motor), Some(&motor)),
            Motion::Straight(1.5)
        );
    }
}
