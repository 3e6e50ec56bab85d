//! Differential-drive robot driven by a gear or by two motors, carrying sensors.
//!
//! All mutable state lives behind one mutex. The scene is locked after the robot state, never the
//! other way around.

use std::{
    collections::BTreeMap,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak},
    thread,
    time::Instant,
};

use log::{debug, info};
use thiserror::Error;

use super::{
    parts::{sealed::Sealed, Part},
    sensor::SensorEntry,
    ActuatorState, Angle, CollisionListener, ConfigError, Dispatcher, EncoderTracker,
    Environment, Event, Kinematics, Mode, Motion, MotorPort, Pose, Position, Scene, Shape, Side,
    SimConfig, Solver, Trigger,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RobotError {
    #[error("a gear cannot be combined with other drive parts")]
    ConfigurationConflict,
    #[error("motor port {0} is already in use")]
    PortInUse(MotorPort),
    #[error("{part} is not attached to a robot")]
    NotAttached { part: &'static str },
    #[error("{part} is already attached to a robot")]
    AlreadyAttached { part: &'static str },
    #[error("arc radius {radius} is below the minimum of {minimum}")]
    RadiusTooSmall { radius: f64, minimum: f64 },
    #[error("speed {0} is above 100")]
    InvalidSpeed(u8),
    #[error("robot no longer exists")]
    RobotDropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartId(u64);

enum Drivetrain {
    Empty,
    Gear {
        id: PartId,
        state: ActuatorState,
    },
    Motors {
        left: Option<(PartId, ActuatorState)>,
        right: Option<(PartId, ActuatorState)>,
    },
}

impl Drivetrain {
    fn motion(&self, kinematics: &Kinematics) -> Motion {
        match self {
            Drivetrain::Empty => Motion::Idle,
            Drivetrain::Gear { state, .. } => kinematics.gear_motion(state),
            Drivetrain::Motors { left, right } => kinematics.motors_motion(
                left.as_ref().map(|(_, state)| state),
                right.as_ref().map(|(_, state)| state),
            ),
        }
    }

    fn actuators_mut(&mut self) -> Vec<&mut ActuatorState> {
        match self {
            Drivetrain::Empty => Vec::new(),
            Drivetrain::Gear { state, .. } => vec![state],
            Drivetrain::Motors { left, right } => left
                .iter_mut()
                .chain(right.iter_mut())
                .map(|(_, state)| state)
                .collect(),
        }
    }

    fn actuator(&self, id: PartId) -> Option<&ActuatorState> {
        match self {
            Drivetrain::Empty => None,
            Drivetrain::Gear { id: gear, state } => (*gear == id).then_some(state),
            Drivetrain::Motors { left, right } => [left, right]
                .into_iter()
                .flatten()
                .find(|(motor, _)| *motor == id)
                .map(|(_, state)| state),
        }
    }

    fn actuator_mut(&mut self, id: PartId) -> Option<&mut ActuatorState> {
        match self {
            Drivetrain::Empty => None,
            Drivetrain::Gear { id: gear, state } => (*gear == id).then_some(state),
            Drivetrain::Motors { left, right } => [left, right]
                .into_iter()
                .flatten()
                .find(|(motor, _)| *motor == id)
                .map(|(_, state)| state),
        }
    }

    fn remove(&mut self, id: PartId) -> bool {
        let (removed, empty) = match self {
            Drivetrain::Gear { id: gear, .. } if *gear == id => (true, true),
            Drivetrain::Motors { left, right } => {
                let mut removed = false;
                for slot in [&mut *left, &mut *right] {
                    if slot.as_ref().is_some_and(|(motor, _)| *motor == id) {
                        *slot = None;
                        removed = true;
                    }
                }
                (removed, left.is_none() && right.is_none())
            }
            _ => (false, false),
        };
        if empty {
            *self = Drivetrain::Empty;
        }
        removed
    }
}

struct RobotState {
    pose: Pose,
    start: Pose,
    drivetrain: Drivetrain,
    sensors: BTreeMap<PartId, SensorEntry>,
    solver: Solver,
    collision: Option<(Arc<dyn CollisionListener>, Trigger)>,
    goal: Option<Goal>,
    ticks: u64,
    next_id: u64,
}

impl RobotState {
    fn allocate_id(&mut self) -> PartId {
        self.next_id += 1;
        PartId(self.next_id)
    }
}

/// Stops an actuator at the first tick whose pose satisfies `reached`.
struct Goal {
    id: PartId,
    generation: u64,
    start: Pose,
    reached: Box<dyn Fn(&Pose, &Pose) -> bool + Send>,
}

impl Goal {
    /// Returns the goal while it is still pending.
    fn check(self, drivetrain: &mut Drivetrain, pose: &Pose) -> Option<Self> {
        let actuator = drivetrain.actuator_mut(self.id)?;
        if actuator.generation() != self.generation || actuator.mode() == Mode::Stopped {
            return None;
        }
        if (self.reached)(&self.start, pose) {
            actuator.stop();
            debug!("part {:?} reached its goal at {:?}", self.id, pose.position);
            return None;
        }
        Some(self)
    }
}

pub(crate) struct Shared {
    state: Mutex<RobotState>,
    changed: Condvar,
    scene: Scene,
    config: SimConfig,
    kinematics: Kinematics,
    encoder: EncoderTracker,
    dispatcher: Dispatcher,
}

/// Handle to a simulated robot. Clones refer to the same robot.
#[derive(Clone)]
pub struct Robot {
    shared: Arc<Shared>,
}

impl Robot {
    pub fn new(config: SimConfig, scene: Scene) -> Result<Self, ConfigError> {
        Self::with_start(config, scene, Pose::default())
    }

    /// Robot placed at `start`, which is also the pose restored by `reset`.
    pub fn with_start(config: SimConfig, scene: Scene, start: Pose) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RobotState {
                    pose: start,
                    start,
                    drivetrain: Drivetrain::Empty,
                    sensors: BTreeMap::new(),
                    solver: Solver::new(),
                    collision: None,
                    goal: None,
                    ticks: 0,
                    next_id: 0,
                }),
                changed: Condvar::new(),
                scene,
                kinematics: Kinematics::new(&config),
                encoder: EncoderTracker::new(config.encoder_inc_factor),
                dispatcher: Dispatcher::new(config.listener_queue),
                config,
            }),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    pub fn scene(&self) -> &Scene {
        &self.shared.scene
    }

    fn lock(&self) -> MutexGuard<'_, RobotState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn poll_yield(&self) {
        let delay = self.shared.config.poll_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    pub fn add_part<P: Part>(&self, part: &P) -> Result<(), RobotError> {
        Sealed::install(part, self)
    }

    pub fn remove_part<P: Part>(&self, part: &P) -> Result<(), RobotError> {
        Sealed::uninstall(part, self)
    }

    /// Advances the simulation by the given number of ticks.
    pub fn advance(&self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn tick(&self) {
        let shared = &*self.shared;
        let mut guard = self.lock();
        let state = &mut *guard;
        let motion = state.drivetrain.motion(&shared.kinematics);
        state.solver.apply(&mut state.pose, motion);
        for actuator in state.drivetrain.actuators_mut() {
            shared.encoder.update(actuator);
        }
        state.ticks += 1;
        if let Some(goal) = state.goal.take() {
            state.goal = goal.check(&mut state.drivetrain, &state.pose);
        }

        let environment = shared.scene.read();
        if let Some((listener, trigger)) = &mut state.collision {
            let colliding = environment.has_collision(&self.body(&state.pose));
            shared.dispatcher.raise(trigger, colliding as u8 as f64, |side| {
                (side == Side::Above).then(|| Event::Collision(listener.clone()))
            });
        }
        for sensor in state.sensors.values() {
            sensor.evaluate(&environment, &state.pose, &shared.config, &shared.dispatcher);
        }
        drop(environment);
        drop(guard);
        shared.changed.notify_all();
    }

    fn body(&self, pose: &Pose) -> Shape {
        Shape::Circle {
            position: pose.to_world(Position::new(self.shared.config.collision_offset, 0.0)),
            radius: self.shared.config.collision_radius,
        }
    }

    pub fn pose(&self) -> Pose {
        let pose = self.lock().pose;
        self.poll_yield();
        pose
    }

    pub fn position(&self) -> Position {
        self.pose().position
    }

    /// Heading in degrees within `[0, 360)`, counter-clockwise from the x-axis.
    pub fn heading(&self) -> f64 {
        self.pose().heading.to_deg()
    }

    /// Position rounded to the grid, as shown by a host.
    pub fn location(&self) -> (i64, i64) {
        self.position().rounded()
    }

    pub fn set_position(&self, position: Position) {
        self.modify(|state| state.pose.position = position);
    }

    pub fn set_heading(&self, degree: f64) {
        self.modify(|state| state.pose.heading = Angle::from_deg(degree));
    }

    fn modify(&self, f: impl FnOnce(&mut RobotState)) {
        let mut state = self.lock();
        f(&mut state);
        state.solver.invalidate();
        drop(state);
        self.shared.changed.notify_all();
    }

    /// Stops all actuators and restores the start pose.
    pub fn reset(&self) {
        self.modify(|state| {
            state.pose = state.start;
            state.drivetrain.actuators_mut().into_iter().for_each(ActuatorState::stop);
        });
        debug!("robot reset to {:?}", self.lock().start);
    }

    pub fn stop_all(&self) {
        self.modify(|state| {
            state.drivetrain.actuators_mut().into_iter().for_each(ActuatorState::stop);
        });
    }

    /// Center of the curve currently driven, if any.
    pub fn rotation_center(&self) -> Option<Position> {
        self.lock().solver.center()
    }

    pub fn ticks(&self) -> u64 {
        self.lock().ticks
    }

    /// Replaces the previous collision listener. It is notified when the robot starts touching an
    /// obstacle.
    pub fn set_collision_listener(&self, listener: Arc<dyn CollisionListener>) {
        self.lock().collision = Some((listener, Trigger::with_initial(1.0, Side::Below)));
    }

    pub fn is_colliding(&self) -> bool {
        let pose = self.pose();
        self.shared.scene.read().has_collision(&self.body(&pose))
    }

    /// Blocks until all listener events raised so far have been delivered.
    pub fn flush_listeners(&self) {
        self.shared.dispatcher.flush();
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub(crate) fn is(&self, shared: &Weak<Shared>) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.shared), shared.as_ptr())
    }

    pub(crate) fn attach_gear(&self) -> Result<PartId, RobotError> {
        let mut state = self.lock();
        if !matches!(state.drivetrain, Drivetrain::Empty) {
            return Err(RobotError::ConfigurationConflict);
        }
        let id = state.allocate_id();
        state.drivetrain = Drivetrain::Gear {
            id,
            state: ActuatorState::new(self.shared.config.default_speed),
        };
        info!("gear attached");
        Ok(id)
    }

    pub(crate) fn attach_motor(&self, port: MotorPort) -> Result<PartId, RobotError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let in_use = match &state.drivetrain {
            Drivetrain::Gear { .. } => return Err(RobotError::ConfigurationConflict),
            Drivetrain::Empty => false,
            Drivetrain::Motors { left, right } => match port {
                MotorPort::A => left.is_some(),
                MotorPort::B => right.is_some(),
            },
        };
        if in_use {
            return Err(RobotError::PortInUse(port));
        }
        let id = state.allocate_id();
        if matches!(state.drivetrain, Drivetrain::Empty) {
            state.drivetrain = Drivetrain::Motors {
                left: None,
                right: None,
            };
        }
        if let Drivetrain::Motors { left, right } = &mut state.drivetrain {
            let slot = match port {
                MotorPort::A => left,
                MotorPort::B => right,
            };
            *slot = Some((id, ActuatorState::new(self.shared.config.default_speed)));
        }
        info!("motor attached on port {port}");
        Ok(id)
    }

    pub(crate) fn attach_sensor(&self, sensor: SensorEntry) -> PartId {
        let mut state = self.lock();
        let id = state.allocate_id();
        info!("sensor attached on port {}", sensor.port());
        state.sensors.insert(id, sensor);
        id
    }

    pub(crate) fn detach(&self, id: PartId) -> bool {
        let mut state = self.lock();
        let removed = state.sensors.remove(&id).is_some() || state.drivetrain.remove(id);
        if removed {
            state.solver.invalidate();
            info!("part {id:?} detached");
        }
        drop(state);
        self.shared.changed.notify_all();
        removed
    }

    pub(crate) fn update_actuator<R>(
        &self,
        id: PartId,
        f: impl FnOnce(&mut ActuatorState) -> Result<R, RobotError>,
    ) -> Result<R, RobotError> {
        let mut state = self.lock();
        let actuator = state
            .drivetrain
            .actuator_mut(id)
            .ok_or(RobotError::NotAttached { part: "actuator" })?;
        let result = f(&mut *actuator)?;
        self.shared.encoder.settle(actuator);
        drop(state);
        self.shared.changed.notify_all();
        Ok(result)
    }

    /// Applies a command and stops the actuator at the first tick where `reached(start, pose)`
    /// holds, `start` being the pose at the time of the command. Returns the command generation.
    pub(crate) fn command_until(
        &self,
        id: PartId,
        f: impl FnOnce(&mut ActuatorState) -> Result<u64, RobotError>,
        reached: impl Fn(&Pose, &Pose) -> bool + Send + 'static,
    ) -> Result<u64, RobotError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let actuator = state
            .drivetrain
            .actuator_mut(id)
            .ok_or(RobotError::NotAttached { part: "actuator" })?;
        let generation = f(&mut *actuator)?;
        self.shared.encoder.settle(actuator);
        state.goal = Some(Goal {
            id,
            generation,
            start: state.pose,
            reached: Box::new(reached),
        });
        drop(guard);
        self.shared.changed.notify_all();
        Ok(generation)
    }

    pub(crate) fn read_actuator<R>(
        &self,
        id: PartId,
        f: impl FnOnce(&ActuatorState) -> R,
    ) -> Result<R, RobotError> {
        let result = self
            .lock()
            .drivetrain
            .actuator(id)
            .map(f)
            .ok_or(RobotError::NotAttached { part: "actuator" })?;
        self.poll_yield();
        Ok(result)
    }

    /// Waits until the actuator stops, starts a newer motion or the deadline passes.
    pub(crate) fn await_actuator(
        &self,
        id: PartId,
        generation: u64,
        deadline: Option<Instant>,
    ) -> Result<(), RobotError> {
        let mut state = self.lock();
        loop {
            let actuator = state
                .drivetrain
                .actuator(id)
                .ok_or(RobotError::NotAttached { part: "actuator" })?;
            if actuator.generation() != generation || actuator.mode() == Mode::Stopped {
                return Ok(());
            }
            state = match deadline {
                None => self
                    .shared
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(());
                    }
                    self.shared
                        .changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Reads the robot pose and the scene for a sensor measurement.
    pub(crate) fn sense<R>(&self, f: impl FnOnce(&Environment, &Pose, &SimConfig) -> R) -> R {
        let pose = self.lock().pose;
        let result = f(&self.shared.scene.read(), &pose, &self.shared.config);
        self.poll_yield();
        result
    }
}
