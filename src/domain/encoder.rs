//! Encoder count bookkeeping and auto-stop of counting commands.

use log::debug;

use super::{ActuatorState, Mode};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncoderTracker {
    factor: f64,
}

impl EncoderTracker {
    /// `factor` is the count per tick and speed unit.
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Signed count increment of one tick.
    pub fn increment(&self, state: &ActuatorState) -> f64 {
        if !state.is_moving() {
            return 0.0;
        }
        match state.mode() {
            // Both wheels of a spinning gear turn in opposite directions
            Mode::Left | Mode::Right => 0.0,
            _ => self.factor * state.signed_speed(),
        }
    }

    /// Advances the count by one tick. Returns true if a counting command stopped.
    pub fn update(&self, state: &mut ActuatorState) -> bool {
        if state.mode() == Mode::Stopped {
            return false;
        }
        state.add_count(self.increment(state));
        self.settle(state)
    }

    /// Stops a counting command whose target is reached.
    pub fn settle(&self, state: &mut ActuatorState) -> bool {
        if state.mode().is_counting() && state.target_reached() {
            debug!(
                "{:?} reached count {} of target {:?}",
                state.mode(),
                state.count(),
                state.target_count()
            );
            state.stop();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn tracker() -> EncoderTracker {
        EncoderTracker::new(0.1)
    }

    #[rstest]
    #[case::forward(Mode::Forward, None, 5.0)]
    #[case::backward(Mode::Backward, None, -5.0)]
    #[case::left_arc(Mode::LeftArc, Some(60.0), 5.0)]
    #[case::backward_arc(Mode::RightArc, Some(-60.0), -5.0)]
    #[case::spin(Mode::Left, None, 0.0)]
    fn test_increment(#[case] mode: Mode, #[case] radius: Option<f64>, #[case] expected: f64) {
        let mut state = ActuatorState::new(50);
        state.command(mode, radius);
        assert_abs_diff_eq!(tracker().increment(&state), expected);
    }

    #[test]
    fn test_stopped_does_not_count() {
        let mut state = ActuatorState::new(50);
        assert!(!tracker().update(&mut state));
        assert_eq!(state.raw_count(), 0.0);

        state.command(Mode::Forward, None);
        state.set_speed(0);
        assert!(!tracker().update(&mut state));
        assert_eq!(state.raw_count(), 0.0);
    }

    #[rstest]
    #[case::forward(23, 50, 5)]
    #[case::backward(-23, 50, 5)]
    #[case::exact(20, 50, 4)]
    #[case::slow(3, 7, 5)]
    fn test_auto_stop(#[case] target: i32, #[case] speed: u8, #[case] ticks: usize) {
        let mut state = ActuatorState::new(speed);
        state.count_to(Mode::RotateTo, target);
        let mut stopped_after = None;
        for tick in 1..=100 {
            if tracker().update(&mut state) {
                stopped_after = Some(tick);
                break;
            }
            assert!(state.is_moving());
        }
        assert_eq!(stopped_after, Some(ticks));
        assert!(!state.is_moving());
        let step = tracker().factor * speed as f64;
        assert!((state.raw_count() - target as f64).abs() < step);
    }

    #[test]
    fn test_zero_target_settles_at_once() {
        let mut state = ActuatorState::new(50);
        state.count_to(Mode::MoveTo, 0);
        assert!(tracker().settle(&mut state));
        assert_eq!(state.mode(), Mode::Stopped);
    }

    #[test]
    fn test_reset_keeps_mode() {
        let mut state = ActuatorState::new(50);
        state.command(Mode::Forward, None);
        tracker().update(&mut state);
        tracker().update(&mut state);
        assert_eq!(state.count(), 10);
        state.reset_count();
        assert_eq!(state.count(), 0);
        assert_eq!(state.mode(), Mode::Forward);
    }
}
