//! Discrete state of a motor or a gear.

use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Stopped,
    Forward,
    Backward,
    /// Spin in place, counter-clockwise.
    Left,
    /// Spin in place, clockwise.
    Right,
    LeftArc,
    RightArc,
    MoveTo,
    TurnTo,
    RotateTo,
}

impl Mode {
    pub fn is_counting(self) -> bool {
        matches!(self, Mode::MoveTo | Mode::TurnTo | Mode::RotateTo)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MotorPort {
    /// Left wheel.
    A,
    /// Right wheel.
    B,
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorPort::A => write!(f, "A"),
            MotorPort::B => write!(f, "B"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActuatorState {
    mode: Mode,
    speed: u8,
    radius: Option<f64>,
    target_count: Option<i32>,
    count: f64,
    is_forward: bool,
    generation: u64,
}

impl ActuatorState {
    pub fn new(speed: u8) -> Self {
        Self {
            mode: Mode::Stopped,
            speed,
            radius: None,
            target_count: None,
            count: 0.0,
            is_forward: true,
            generation: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn radius(&self) -> Option<f64> {
        self.radius
    }

    pub fn target_count(&self) -> Option<i32> {
        self.target_count
    }

    /// Encoder count as reported to callers.
    pub fn count(&self) -> i32 {
        self.count.round() as i32
    }

    pub fn raw_count(&self) -> f64 {
        self.count
    }

    pub fn is_forward(&self) -> bool {
        self.is_forward
    }

    /// Incremented by every command that starts a new motion.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_moving(&self) -> bool {
        self.mode != Mode::Stopped && self.speed > 0
    }

    /// Speed with the sign of the current driving direction, 0 if stopped.
    pub fn signed_speed(&self) -> f64 {
        let speed = self.speed as f64;
        match self.mode {
            Mode::Stopped => 0.0,
            Mode::Backward => -speed,
            Mode::MoveTo | Mode::TurnTo | Mode::RotateTo if !self.is_forward => -speed,
            Mode::LeftArc | Mode::RightArc if self.radius.is_some_and(|r| r < 0.0) => -speed,
            _ => speed,
        }
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed;
    }

    /// Enters a continuous mode. Returns false if the actuator already is in that mode with the
    /// same radius.
    pub fn command(&mut self, mode: Mode, radius: Option<f64>) -> bool {
        if self.mode == mode && self.radius == radius && self.target_count.is_none() {
            return false;
        }
        self.mode = mode;
        self.radius = radius;
        self.target_count = None;
        self.generation += 1;
        true
    }

    /// Enters a counting mode that stops once the encoder count reaches `count`.
    pub fn count_to(&mut self, mode: Mode, count: i32) {
        self.mode = mode;
        self.radius = None;
        self.count = 0.0;
        self.target_count = Some(count);
        self.is_forward = count > 0;
        self.generation += 1;
    }

    pub fn stop(&mut self) {
        self.mode = Mode::Stopped;
        self.radius = None;
        self.target_count = None;
    }

    pub fn reset_count(&mut self) {
        self.count = 0.0;
    }

    pub(crate) fn add_count(&mut self, increment: f64) {
        self.count += increment;
    }

    /// True once the count has reached or crossed the target in the driving direction.
    pub fn target_reached(&self) -> bool {
        match self.target_count {
            Some(target) if self.is_forward => self.count >= target as f64,
            Some(target) => self.count <= target as f64,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_command_is_idempotent() {
        let mut state = ActuatorState::new(50);
        assert!(state.command(Mode::LeftArc, Some(40.0)));
        let generation = state.generation();
        assert!(!state.command(Mode::LeftArc, Some(40.0)));
        assert_eq!(state.generation(), generation);
        assert!(state.command(Mode::LeftArc, Some(50.0)));
        assert!(state.generation() > generation);
    }

    #[test]
    fn test_speed_zero_is_not_moving() {
        let mut state = ActuatorState::new(50);
        state.command(Mode::Forward, None);
        assert!(state.is_moving());
        state.set_speed(0);
        assert!(!state.is_moving());
        assert_eq!(state.mode(), Mode::Forward);
    }

    #[test]
    fn test_stop_clears_target() {
        let mut state = ActuatorState::new(50);
        state.count_to(Mode::MoveTo, -30);
        assert_eq!(state.target_count(), Some(-30));
        assert!(!state.is_forward());
        state.stop();
        assert_eq!(state.mode(), Mode::Stopped);
        assert_eq!(state.target_count(), None);
    }

    #[test]
    fn test_count_to_leaves_idempotence() {
        let mut state = ActuatorState::new(50);
        state.command(Mode::Forward, None);
        state.count_to(Mode::MoveTo, 10);
        assert!(state.command(Mode::MoveTo, None));
        assert_eq!(state.target_count(), None);
    }

    #[rstest]
    #[case::stopped(Mode::Stopped, None, 0, 0.0)]
    #[case::forward(Mode::Forward, None, 0, 40.0)]
    #[case::backward(Mode::Backward, None, 0, -40.0)]
    #[case::arc_forward(Mode::LeftArc, Some(60.0), 0, 40.0)]
    #[case::arc_backward(Mode::RightArc, Some(-60.0), 0, -40.0)]
    #[case::rotate_forward(Mode::RotateTo, None, 10, 40.0)]
    #[case::rotate_backward(Mode::RotateTo, None, -10, -40.0)]
    fn test_signed_speed(
        #[case] mode: Mode,
        #[case] radius: Option<f64>,
        #[case] count: i32,
        #[case] expected: f64,
    ) {
        let mut state = ActuatorState::new(40);
        if mode.is_counting() {
            state.count_to(mode, count);
        } else {
            state.command(mode, radius);
        }
        assert_eq!(state.signed_speed(), expected);
    }

    #[rstest]
    #[case::forward_below(10, 9.6, false)]
    #[case::forward_reached(10, 10.0, true)]
    #[case::backward_below(-10, -9.6, false)]
    #[case::backward_crossed(-10, -10.4, true)]
    #[case::zero(0, 0.0, true)]
    fn test_target_reached(#[case] target: i32, #[case] count: f64, #[case] expected: bool) {
        let mut state = ActuatorState::new(40);
        state.count_to(Mode::RotateTo, target);
        state.add_count(count);
        assert_eq!(state.target_reached(), expected);
    }
}
