//! Gear, motor and turtle handles.
//!
//! Handles are cheap to clone and may be used from any thread. Every command locks the robot
//! state once; blocking variants wait for the robot's change notification instead of spinning.

use std::{
    sync::{Arc, Mutex, PoisonError, Weak},
    time::{Duration, Instant},
};

use log::debug;

use super::{robot::Shared, ActuatorState, Mode, MotorPort, PartId, Pose, Robot, RobotError};

pub(crate) mod sealed {
    use super::super::{Robot, RobotError};

    pub trait Sealed {
        fn install(&self, robot: &Robot) -> Result<(), RobotError>;

        fn uninstall(&self, robot: &Robot) -> Result<(), RobotError>;
    }
}

/// Anything that can be attached to a robot.
pub trait Part: sealed::Sealed {}

struct Link {
    robot: Weak<Shared>,
    id: PartId,
}

/// Connection of a part handle to the robot it is attached to.
#[derive(Default)]
pub(crate) struct PartLink(Mutex<Option<Link>>);

impl PartLink {
    pub(crate) fn attach(
        &self,
        robot: &Robot,
        part: &'static str,
        install: impl FnOnce() -> Result<PartId, RobotError>,
    ) -> Result<(), RobotError> {
        let mut link = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if link.as_ref().is_some_and(|l| l.robot.strong_count() > 0) {
            return Err(RobotError::AlreadyAttached { part });
        }
        let id = install()?;
        *link = Some(Link {
            robot: robot.downgrade(),
            id,
        });
        Ok(())
    }

    pub(crate) fn detach(&self, robot: &Robot, part: &'static str) -> Result<(), RobotError> {
        let mut link = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match link.as_ref() {
            Some(l) if robot.is(&l.robot) => {
                robot.detach(l.id);
                *link = None;
                Ok(())
            }
            _ => Err(RobotError::NotAttached { part }),
        }
    }

    pub(crate) fn get(&self, part: &'static str) -> Result<(Robot, PartId), RobotError> {
        let link = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let l = link.as_ref().ok_or(RobotError::NotAttached { part })?;
        let robot = Robot::upgrade(&l.robot).ok_or(RobotError::RobotDropped)?;
        Ok((robot, l.id))
    }
}

/// Command logic shared by gears and motors.
#[derive(Clone)]
struct Actuator {
    link: Arc<PartLink>,
    name: &'static str,
}

impl Actuator {
    fn new(name: &'static str) -> Self {
        Self {
            link: Arc::new(PartLink::default()),
            name,
        }
    }

    fn attached(&self) -> Result<(Robot, PartId), RobotError> {
        self.link.get(self.name)
    }

    fn update<R>(
        &self,
        f: impl FnOnce(&mut ActuatorState) -> Result<R, RobotError>,
    ) -> Result<R, RobotError> {
        let (robot, id) = self.attached()?;
        robot.update_actuator(id, f)
    }

    fn read<R>(&self, f: impl FnOnce(&ActuatorState) -> R) -> Result<R, RobotError> {
        let (robot, id) = self.attached()?;
        robot.read_actuator(id, f)
    }

    /// Enters `mode` and returns the generation of the resulting motion.
    fn command(&self, mode: Mode, radius: Option<f64>) -> Result<u64, RobotError> {
        let name = self.name;
        self.update(|state| {
            if state.command(mode, radius) {
                debug!("{name} enters {mode:?} with radius {radius:?}");
            }
            Ok(state.generation())
        })
    }

    fn count_to(&self, mode: Mode, count: i32, blocking: bool) -> Result<(), RobotError> {
        let (robot, id) = self.attached()?;
        let name = self.name;
        let generation = robot.update_actuator(id, |state| {
            debug!("{name} enters {mode:?} until count {count}");
            state.count_to(mode, count);
            Ok(state.generation())
        })?;
        if blocking {
            robot.await_actuator(id, generation, None)?;
        }
        Ok(())
    }

    /// Keeps the motion of `generation` for `duration`, then stops it unless superseded.
    fn hold(&self, generation: u64, duration: Duration) -> Result<(), RobotError> {
        let (robot, id) = self.attached()?;
        robot.await_actuator(id, generation, Some(Instant::now() + duration))?;
        robot.update_actuator(id, |state| {
            if state.generation() == generation {
                state.stop();
            }
            Ok(())
        })
    }

    /// Enters `mode` and blocks until the robot stops it at the first tick where
    /// `reached(start, pose)` holds, or a newer command supersedes it.
    fn drive_until(
        &self,
        mode: Mode,
        reached: impl Fn(&Pose, &Pose) -> bool + Send + 'static,
    ) -> Result<(), RobotError> {
        let (robot, id) = self.attached()?;
        let name = self.name;
        let generation = robot.command_until(
            id,
            |state| {
                state.command(mode, None);
                debug!("{name} enters {mode:?} until its goal");
                Ok(state.generation())
            },
            reached,
        )?;
        robot.await_actuator(id, generation, None)
    }

    fn stop(&self) -> Result<(), RobotError> {
        self.update(|state| {
            state.stop();
            Ok(())
        })
    }

    fn set_speed(&self, speed: u8) -> Result<(), RobotError> {
        if speed > 100 {
            return Err(RobotError::InvalidSpeed(speed));
        }
        self.update(|state| {
            state.set_speed(speed);
            Ok(())
        })
    }

    fn reset_count(&self) -> Result<(), RobotError> {
        self.update(|state| {
            state.reset_count();
            Ok(())
        })
    }
}

/// Two motors driven as one unit.
#[derive(Clone)]
pub struct Gear {
    actuator: Actuator,
}

impl Default for Gear {
    fn default() -> Self {
        Self::new()
    }
}

impl Gear {
    pub fn new() -> Self {
        Self {
            actuator: Actuator::new("gear"),
        }
    }

    fn arc(&self, mode: Mode, radius: f64) -> Result<u64, RobotError> {
        let (robot, _) = self.actuator.attached()?;
        let minimum = robot.config().min_arc_radius();
        if radius.abs() < minimum {
            return Err(RobotError::RadiusTooSmall { radius, minimum });
        }
        self.actuator.command(mode, Some(radius))
    }

    pub fn forward(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Forward, None).map(|_| ())
    }

    pub fn forward_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Forward, None)?;
        self.actuator.hold(generation, duration)
    }

    pub fn backward(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Backward, None).map(|_| ())
    }

    pub fn backward_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Backward, None)?;
        self.actuator.hold(generation, duration)
    }

    /// Spins counter-clockwise in place.
    pub fn left(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Left, None).map(|_| ())
    }

    pub fn left_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Left, None)?;
        self.actuator.hold(generation, duration)
    }

    /// Spins clockwise in place.
    pub fn right(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Right, None).map(|_| ())
    }

    pub fn right_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Right, None)?;
        self.actuator.hold(generation, duration)
    }

    /// Drives on a circle with its center `radius` to the left. A negative radius drives
    /// backward. The radius must be at least half the axle length.
    pub fn left_arc(&self, radius: f64) -> Result<(), RobotError> {
        self.arc(Mode::LeftArc, radius).map(|_| ())
    }

    pub fn left_arc_for(&self, radius: f64, duration: Duration) -> Result<(), RobotError> {
        let generation = self.arc(Mode::LeftArc, radius)?;
        self.actuator.hold(generation, duration)
    }

    /// Like `left_arc` with the center to the right.
    pub fn right_arc(&self, radius: f64) -> Result<(), RobotError> {
        self.arc(Mode::RightArc, radius).map(|_| ())
    }

    pub fn right_arc_for(&self, radius: f64, duration: Duration) -> Result<(), RobotError> {
        let generation = self.arc(Mode::RightArc, radius)?;
        self.actuator.hold(generation, duration)
    }

    /// Drives straight until the encoder count reaches `count`; negative counts drive backward.
    pub fn move_to(&self, count: i32, blocking: bool) -> Result<(), RobotError> {
        self.actuator.count_to(Mode::MoveTo, count, blocking)
    }

    /// Spins until the encoder count reaches `count`; positive counts turn counter-clockwise.
    pub fn turn_to(&self, count: i32, blocking: bool) -> Result<(), RobotError> {
        self.actuator.count_to(Mode::TurnTo, count, blocking)
    }

    pub fn stop(&self) -> Result<(), RobotError> {
        self.actuator.stop()
    }

    /// Takes effect on the running motion. Speeds above 100 are rejected.
    pub fn set_speed(&self, speed: u8) -> Result<(), RobotError> {
        self.actuator.set_speed(speed)
    }

    pub fn speed(&self) -> Result<u8, RobotError> {
        self.actuator.read(ActuatorState::speed)
    }

    pub fn mode(&self) -> Result<Mode, RobotError> {
        self.actuator.read(ActuatorState::mode)
    }

    pub fn is_moving(&self) -> Result<bool, RobotError> {
        self.actuator.read(ActuatorState::is_moving)
    }

    pub fn motor_count(&self) -> Result<i32, RobotError> {
        self.actuator.read(ActuatorState::count)
    }

    pub fn reset_motor_count(&self) -> Result<(), RobotError> {
        self.actuator.reset_count()
    }
}

impl sealed::Sealed for Gear {
    fn install(&self, robot: &Robot) -> Result<(), RobotError> {
        self.actuator.link.attach(robot, "gear", || robot.attach_gear())
    }

    fn uninstall(&self, robot: &Robot) -> Result<(), RobotError> {
        self.actuator.link.detach(robot, "gear")
    }
}

impl Part for Gear {}

/// Single motor driving the wheel on its port.
#[derive(Clone)]
pub struct Motor {
    actuator: Actuator,
    port: MotorPort,
}

impl Motor {
    pub fn new(port: MotorPort) -> Self {
        Self {
            actuator: Actuator::new(match port {
                MotorPort::A => "motor A",
                MotorPort::B => "motor B",
            }),
            port,
        }
    }

    pub fn port(&self) -> MotorPort {
        self.port
    }

    pub fn forward(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Forward, None).map(|_| ())
    }

    pub fn forward_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Forward, None)?;
        self.actuator.hold(generation, duration)
    }

    pub fn backward(&self) -> Result<(), RobotError> {
        self.actuator.command(Mode::Backward, None).map(|_| ())
    }

    pub fn backward_for(&self, duration: Duration) -> Result<(), RobotError> {
        let generation = self.actuator.command(Mode::Backward, None)?;
        self.actuator.hold(generation, duration)
    }

    /// Turns the wheel until the encoder count reaches `count`, starting from 0.
    pub fn rotate_to(&self, count: i32, blocking: bool) -> Result<(), RobotError> {
        self.actuator.count_to(Mode::RotateTo, count, blocking)
    }

    pub fn stop(&self) -> Result<(), RobotError> {
        self.actuator.stop()
    }

    pub fn set_speed(&self, speed: u8) -> Result<(), RobotError> {
        self.actuator.set_speed(speed)
    }

    pub fn speed(&self) -> Result<u8, RobotError> {
        self.actuator.read(ActuatorState::speed)
    }

    pub fn mode(&self) -> Result<Mode, RobotError> {
        self.actuator.read(ActuatorState::mode)
    }

    pub fn is_moving(&self) -> Result<bool, RobotError> {
        self.actuator.read(ActuatorState::is_moving)
    }

    pub fn motor_count(&self) -> Result<i32, RobotError> {
        self.actuator.read(ActuatorState::count)
    }

    pub fn reset_motor_count(&self) -> Result<(), RobotError> {
        self.actuator.reset_count()
    }
}

impl sealed::Sealed for Motor {
    fn install(&self, robot: &Robot) -> Result<(), RobotError> {
        self.actuator
            .link
            .attach(robot, self.actuator.name, || robot.attach_motor(self.port))
    }

    fn uninstall(&self, robot: &Robot) -> Result<(), RobotError> {
        self.actuator.link.detach(robot, self.actuator.name)
    }
}

impl Part for Motor {}

const TURTLE_TURN_SPEED: u8 = 10;

// Accumulated per-tick increments fall short of the exact value by rounding errors
const GOAL_TOLERANCE: f64 = 1e-9;

/// Gear commanded by distance and angle, in the manner of turtle graphics.
///
/// Every command blocks until the motion is done, so the robot must be ticked from another
/// thread. Turns run at a fixed low speed and restore the configured speed afterwards.
#[derive(Clone, Default)]
pub struct Turtle {
    gear: Gear,
}

impl Turtle {
    pub fn new() -> Self {
        Self { gear: Gear::new() }
    }

    /// The underlying gear, for continuous motions.
    pub fn gear(&self) -> &Gear {
        &self.gear
    }

    pub fn set_speed(&self, speed: u8) -> Result<(), RobotError> {
        self.gear.set_speed(speed)
    }

    pub fn speed(&self) -> Result<u8, RobotError> {
        self.gear.speed()
    }

    /// Drives forward until the robot is `steps` away from where it started. Non-positive
    /// distances only stop the gear.
    pub fn forward(&self, steps: f64) -> Result<(), RobotError> {
        self.drive(Mode::Forward, steps)
    }

    pub fn backward(&self, steps: f64) -> Result<(), RobotError> {
        self.drive(Mode::Backward, steps)
    }

    /// Turns counter-clockwise in place by `degree`. Negative angles turn clockwise.
    pub fn left(&self, degree: f64) -> Result<(), RobotError> {
        if degree < 0.0 {
            return self.right(-degree);
        }
        let angle = degree.to_radians() - GOAL_TOLERANCE;
        self.turn(Mode::Left, degree, move |start, pose| {
            pose.heading.radians() - start.heading.radians() >= angle
        })
    }

    /// Turns clockwise in place by `degree`. Negative angles turn counter-clockwise.
    pub fn right(&self, degree: f64) -> Result<(), RobotError> {
        if degree < 0.0 {
            return self.left(-degree);
        }
        let angle = degree.to_radians() - GOAL_TOLERANCE;
        self.turn(Mode::Right, degree, move |start, pose| {
            start.heading.radians() - pose.heading.radians() >= angle
        })
    }

    fn drive(&self, mode: Mode, steps: f64) -> Result<(), RobotError> {
        if steps <= 0.0 {
            return self.gear.stop();
        }
        let steps = steps - GOAL_TOLERANCE;
        self.gear.actuator.drive_until(mode, move |start, pose| {
            start.position.distance(pose.position) >= steps
        })
    }

    fn turn(
        &self,
        mode: Mode,
        degree: f64,
        reached: impl Fn(&Pose, &Pose) -> bool + Send + 'static,
    ) -> Result<(), RobotError> {
        if degree == 0.0 {
            return Ok(());
        }
        let speed = self.gear.speed()?;
        self.gear.set_speed(TURTLE_TURN_SPEED)?;
        let turned = self.gear.actuator.drive_until(mode, reached);
        self.gear.set_speed(speed)?;
        turned
    }
}

impl sealed::Sealed for Turtle {
    fn install(&self, robot: &Robot) -> Result<(), RobotError> {
        sealed::Sealed::install(&self.gear, robot)
    }

    fn uninstall(&self, robot: &Robot) -> Result<(), RobotError> {
        sealed::Sealed::uninstall(&self.gear, robot)
    }
}

impl Part for Turtle {}
