//! Sensors mounted on the robot.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;

use super::{
    parts::{sealed, Part, PartLink},
    Angle, BeamCone, ColorCubes, ColorLabel, Dispatcher, Environment, Event, InfraredListener,
    LightListener, Pose, Position, Rgb, Robot, RobotError, Shape, Side, SimConfig, Trigger,
    UltrasonicListener,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorPort {
    S1,
    S2,
    S3,
    S4,
}

impl fmt::Display for SensorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Placement of a sensor in robot coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mount {
    pub offset: Position,
    pub angle: Angle,
}

impl Mount {
    pub fn new(offset: Position, angle: Angle) -> Self {
        Self { offset, angle }
    }

    /// Front right, front left, front center and rear.
    pub fn default_for(port: SensorPort) -> Self {
        match port {
            SensorPort::S1 => Self::new(Position::new(8.0, -7.0), Angle::new(0.0)),
            SensorPort::S2 => Self::new(Position::new(8.0, 7.0), Angle::new(0.0)),
            SensorPort::S3 => Self::new(Position::new(8.0, 0.0), Angle::new(0.0)),
            SensorPort::S4 => Self::new(Position::new(-35.0, 0.0), Angle::from_deg(180.0)),
        }
    }

    fn position(&self, pose: &Pose) -> Position {
        pose.to_world(self.offset)
    }

    fn heading(&self, pose: &Pose) -> Angle {
        pose.heading + self.angle
    }
}

/// Listener registration together with its trigger.
struct Slot<L: ?Sized>(Mutex<Option<(Arc<L>, Trigger)>>);

impl<L: ?Sized> Slot<L> {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn lock(&self) -> MutexGuard<'_, Option<(Arc<L>, Trigger)>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Base {
    port: SensorPort,
    mount: Mount,
    link: PartLink,
}

impl Base {
    fn new(port: SensorPort, mount: Mount) -> Self {
        Self {
            port,
            mount,
            link: PartLink::default(),
        }
    }
}

/// Registered sensor as seen by the robot.
#[derive(Clone)]
pub(crate) enum SensorEntry {
    Light(Arc<LightInner>),
    Color(Arc<ColorInner>),
    Ultrasonic(Arc<UltrasonicInner>),
    Infrared(Arc<InfraredInner>),
}

impl SensorEntry {
    pub(crate) fn port(&self) -> SensorPort {
        match self {
            SensorEntry::Light(inner) => inner.base.port,
            SensorEntry::Color(inner) => inner.base.port,
            SensorEntry::Ultrasonic(inner) => inner.base.port,
            SensorEntry::Infrared(inner) => inner.base.port,
        }
    }

    /// Raises the event of a trigger crossing of the registered listener, if any.
    pub(crate) fn evaluate(
        &self,
        environment: &Environment,
        pose: &Pose,
        config: &SimConfig,
        dispatcher: &Dispatcher,
    ) {
        let port = self.port();
        match self {
            SensorEntry::Light(inner) => {
                let mut slot = inner.listener.lock();
                if let Some((listener, trigger)) = slot.as_mut() {
                    let value = inner.measure(environment, pose);
                    dispatcher.raise(trigger, value as f64, |side| {
                        Some(Event::Light(listener.clone(), port, side, value))
                    });
                }
            }
            SensorEntry::Ultrasonic(inner) => {
                let mut slot = inner.listener.lock();
                let Some((listener, trigger)) = slot.as_mut() else {
                    return;
                };
                if let Some(distance) = inner.measure(environment, pose, config) {
                    dispatcher.raise(trigger, distance as f64, |side| {
                        Some(Event::Ultrasonic(listener.clone(), port, side, distance))
                    });
                }
            }
            SensorEntry::Infrared(inner) => {
                let mut slot = inner.listener.lock();
                if let Some((listener, trigger)) = slot.as_mut() {
                    let value = inner.measure(environment, pose, config) as u8;
                    dispatcher.raise(trigger, value as f64, |side| {
                        Some(Event::Infrared(listener.clone(), port, side))
                    });
                }
            }
            SensorEntry::Color(_) => {}
        }
    }
}

pub(crate) struct LightInner {
    base: Base,
    upwards: bool,
    listener: Slot<dyn LightListener>,
}

impl LightInner {
    fn measure(&self, environment: &Environment, pose: &Pose) -> i32 {
        let point = self.base.mount.position(pose);
        if self.upwards {
            environment.illumination(point) as i32
        } else {
            environment.floor_color(point).brightness()
        }
    }
}

/// Light sensor facing the floor, or the sky when created with `upwards`.
#[derive(Clone)]
pub struct LightSensor {
    inner: Arc<LightInner>,
}

impl LightSensor {
    pub fn new(port: SensorPort) -> Self {
        Self::with_mount(port, Mount::default_for(port), false)
    }

    /// Measures the illumination by the light sources instead of the floor brightness.
    pub fn upwards(port: SensorPort) -> Self {
        Self::with_mount(port, Mount::default_for(port), true)
    }

    pub fn with_mount(port: SensorPort, mount: Mount, upwards: bool) -> Self {
        Self {
            inner: Arc::new(LightInner {
                base: Base::new(port, mount),
                upwards,
                listener: Slot::new(),
            }),
        }
    }

    pub fn port(&self) -> SensorPort {
        self.inner.base.port
    }

    pub fn light_value(&self) -> Result<i32, RobotError> {
        let (robot, _) = self.inner.base.link.get("light sensor")?;
        Ok(robot.sense(|environment, pose, _| self.inner.measure(environment, pose)))
    }

    /// Replaces the previous listener, if any.
    pub fn add_listener(&self, listener: Arc<dyn LightListener>, trigger_level: i32) {
        *self.inner.listener.lock() = Some((listener, Trigger::new(trigger_level as f64)));
    }

    /// Registers the listener with the configured default trigger level.
    pub fn add_default_listener(&self, listener: Arc<dyn LightListener>) -> Result<(), RobotError> {
        let (robot, _) = self.inner.base.link.get("light sensor")?;
        self.add_listener(listener, robot.config().light_trigger_level);
        Ok(())
    }

    /// Returns the previous level, `None` without a listener.
    pub fn set_trigger_level(&self, trigger_level: i32) -> Option<i32> {
        self.inner
            .listener
            .lock()
            .as_mut()
            .map(|(_, trigger)| trigger.set_level(trigger_level as f64) as i32)
    }
}

pub(crate) struct ColorInner {
    base: Base,
    cubes: Arc<ColorCubes>,
}

impl ColorInner {
    fn measure(&self, environment: &Environment, pose: &Pose) -> Rgb {
        environment.floor_color(self.base.mount.position(pose))
    }
}

#[derive(Clone)]
pub struct ColorSensor {
    inner: Arc<ColorInner>,
}

impl ColorSensor {
    /// Classifies with the shared default color cubes.
    pub fn new(port: SensorPort) -> Self {
        Self::with_cubes(port, ColorCubes::shared_default())
    }

    pub fn with_cubes(port: SensorPort, cubes: Arc<ColorCubes>) -> Self {
        Self::with_mount(port, Mount::default_for(port), cubes)
    }

    pub fn with_mount(port: SensorPort, mount: Mount, cubes: Arc<ColorCubes>) -> Self {
        Self {
            inner: Arc::new(ColorInner {
                base: Base::new(port, mount),
                cubes,
            }),
        }
    }

    pub fn port(&self) -> SensorPort {
        self.inner.base.port
    }

    pub fn cubes(&self) -> &ColorCubes {
        &self.inner.cubes
    }

    pub fn color(&self) -> Result<Rgb, RobotError> {
        let (robot, _) = self.inner.base.link.get("color sensor")?;
        Ok(robot.sense(|environment, pose, _| self.inner.measure(environment, pose)))
    }

    pub fn color_label(&self) -> Result<ColorLabel, RobotError> {
        self.color().map(|color| self.inner.cubes.classify(color))
    }

    pub fn light_value(&self) -> Result<i32, RobotError> {
        self.color().map(|color| color.brightness())
    }
}

pub(crate) struct UltrasonicInner {
    base: Base,
    listener: Slot<dyn UltrasonicListener>,
}

impl UltrasonicInner {
    fn measure(&self, environment: &Environment, pose: &Pose, config: &SimConfig) -> Option<u32> {
        let cone = BeamCone::new(
            self.base.mount.position(pose),
            self.base.mount.heading(pose),
            config.beam_half_angle(),
        );
        // Zero means the sensor sits inside a target
        environment
            .distance_to_nearest_target(&cone)
            .map(|distance| distance.round() as u32)
            .filter(|&distance| distance > 0)
    }
}

/// Range sensor measuring the distance to the nearest target inside its beam.
#[derive(Clone)]
pub struct UltrasonicSensor {
    inner: Arc<UltrasonicInner>,
}

impl UltrasonicSensor {
    pub fn new(port: SensorPort) -> Self {
        Self::with_mount(port, Mount::default_for(port))
    }

    pub fn with_mount(port: SensorPort, mount: Mount) -> Self {
        Self {
            inner: Arc::new(UltrasonicInner {
                base: Base::new(port, mount),
                listener: Slot::new(),
            }),
        }
    }

    pub fn port(&self) -> SensorPort {
        self.inner.base.port
    }

    /// `None` if no target is inside the beam or the sensor is inside a target.
    pub fn distance(&self) -> Result<Option<u32>, RobotError> {
        let (robot, _) = self.inner.base.link.get("ultrasonic sensor")?;
        Ok(robot.sense(|environment, pose, config| self.inner.measure(environment, pose, config)))
    }

    /// Replaces the previous listener, if any. No events are raised while no target is in sight.
    pub fn add_listener(&self, listener: Arc<dyn UltrasonicListener>, trigger_level: u32) {
        *self.inner.listener.lock() = Some((listener, Trigger::new(trigger_level as f64)));
    }

    pub fn add_default_listener(
        &self,
        listener: Arc<dyn UltrasonicListener>,
    ) -> Result<(), RobotError> {
        let (robot, _) = self.inner.base.link.get("ultrasonic sensor")?;
        *self.inner.listener.lock() = Some((
            listener,
            Trigger::new(robot.config().ultrasonic_trigger_level),
        ));
        Ok(())
    }

    /// Returns the previous level, `None` without a listener.
    pub fn set_trigger_level(&self, trigger_level: u32) -> Option<u32> {
        self.inner
            .listener
            .lock()
            .as_mut()
            .map(|(_, trigger)| trigger.set_level(trigger_level as f64) as u32)
    }
}

pub(crate) struct InfraredInner {
    base: Base,
    listener: Slot<dyn InfraredListener>,
}

impl InfraredInner {
    fn measure(&self, environment: &Environment, pose: &Pose, config: &SimConfig) -> bool {
        environment.has_collision(&Shape::Circle {
            position: self.base.mount.position(pose),
            radius: config.infrared_radius,
        })
    }
}

/// Proximity sensor detecting obstacles within a small circle around it.
#[derive(Clone)]
pub struct InfraredSensor {
    inner: Arc<InfraredInner>,
}

impl InfraredSensor {
    pub fn new(port: SensorPort) -> Self {
        Self::with_mount(port, Mount::default_for(port))
    }

    pub fn with_mount(port: SensorPort, mount: Mount) -> Self {
        Self {
            inner: Arc::new(InfraredInner {
                base: Base::new(port, mount),
                listener: Slot::new(),
            }),
        }
    }

    pub fn port(&self) -> SensorPort {
        self.inner.base.port
    }

    /// 1 if an obstacle is detected, 0 otherwise.
    pub fn value(&self) -> Result<u8, RobotError> {
        let (robot, _) = self.inner.base.link.get("infrared sensor")?;
        Ok(robot.sense(|environment, pose, config| {
            self.inner.measure(environment, pose, config) as u8
        }))
    }

    /// Replaces the previous listener, if any. The sensor starts out passivated.
    pub fn add_listener(&self, listener: Arc<dyn InfraredListener>) {
        *self.inner.listener.lock() = Some((listener, Trigger::with_initial(1.0, Side::Below)));
    }
}

macro_rules! impl_sensor_part {
    ($sensor:ident, $variant:ident, $name:literal) => {
        impl sealed::Sealed for $sensor {
            fn install(&self, robot: &Robot) -> Result<(), RobotError> {
                self.inner.base.link.attach(robot, $name, || {
                    debug!("attaching {} on port {}", $name, self.inner.base.port);
                    Ok(robot.attach_sensor(SensorEntry::$variant(self.inner.clone())))
                })
            }

            fn uninstall(&self, robot: &Robot) -> Result<(), RobotError> {
                self.inner.base.link.detach(robot, $name)
            }
        }

        impl Part for $sensor {}
    };
}

impl_sensor_part!(LightSensor, Light, "light sensor");
impl_sensor_part!(ColorSensor, Color, "color sensor");
impl_sensor_part!(UltrasonicSensor, Ultrasonic, "ultrasonic sensor");
impl_sensor_part!(InfraredSensor, Infrared, "infrared sensor");
