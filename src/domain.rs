//! The domain module encapsulates the simulation core. It defines the `Robot`, its parts and the
//! `Environment` they sense, along with the rules governing their interactions.
//!
//! The module has no dependency on a host. A host calls `Robot::advance` once per fixed period
//! and mirrors the resulting pose into its own representation.

mod actuator;
mod basis;
mod collision;
mod color;
mod cone;
mod config;
mod driver;
mod encoder;
mod environment;
mod kinematics;
mod notifier;
mod parts;
mod robot;
mod sensor;

pub use actuator::{ActuatorState, Mode, MotorPort};
pub use basis::{Angle, Position, Rectangle};
pub use collision::{HasCollision, Shape};
pub use color::{ColorCube, ColorCubes, ColorLabel, Rgb};
pub use cone::{BeamCone, LineSegment, Triangle};
pub use config::{ConfigError, SimConfig};
pub use driver::TickDriver;
pub use encoder::EncoderTracker;
pub use environment::{
    Environment, Floor, Light, ObjectId, Obstacle, Scene, SceneError, Shadow, Target,
};
pub use kinematics::{ArcKey, Kinematics, Motion, Pose, RotationContext, Solver};
pub use notifier::{
    CollisionListener, Dispatcher, Event, InfraredListener, LightListener, Side, Trigger,
    UltrasonicListener,
};
pub use parts::{Gear, Motor, Part, Turtle};
pub use robot::{PartId, Robot, RobotError};
pub use sensor::{ColorSensor, InfraredSensor, LightSensor, Mount, SensorPort, UltrasonicSensor};
