//! Simulation of the robot in a scene with targets, lights and obstacles.
//!
//! The robot is advanced by one tick per fixed period. Its rounded pose is mirrored into the
//! transform of the robot entity.

use std::time::Duration;

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use robot_sim::domain::{
    ConfigError, Environment, Floor, Light, Obstacle, Position, Rectangle, Rgb, Robot, Scene,
    Shadow, SimConfig, Target,
};

use crate::resource::{RobotRes, SceneRes};

const SCENE_SEED: u64 = 42;
const ARENA_LENGTH: f64 = 1000.0;

/// Marks the entity representing the robot.
#[derive(Component)]
pub struct RobotBody;

pub struct Simulator {
    robot: Robot,
    scene: Scene,
    period: Duration,
}

impl Simulator {
    /// Builds the demo scene and a robot in it. Fails on an invalid configuration.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let period = config.period();
        let scene = Scene::new(demo_environment(&mut ChaCha8Rng::seed_from_u64(SCENE_SEED)));
        let robot = Robot::new(config, scene.clone())?;
        Ok(Self {
            robot,
            scene,
            period,
        })
    }
}

impl Plugin for Simulator {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_duration(self.period))
            .insert_resource(SceneRes::from(self.scene.clone()))
            .insert_resource(RobotRes::from(self.robot.clone()))
            .add_systems(Startup, spawn)
            .add_systems(FixedUpdate, simulate);
    }
}

fn spawn(mut commands: Commands) {
    commands.spawn((RobotBody, TransformBundle::default()));
}

fn simulate(robot: Res<RobotRes>, mut bodies: Query<&mut Transform, With<RobotBody>>) {
    robot.advance(1);

    let (x, y) = robot.location();
    let heading = robot.heading();
    for mut transform in &mut bodies {
        transform.translation = Vec3::new(x as f32, y as f32, 0.0);
        transform.rotation = Quat::from_rotation_z(heading.to_radians() as f32);
    }
}

/// Arena with a dark track on the floor, randomly placed obstacles and targets, and one light
/// with a shadow next to it.
fn demo_environment(rng: &mut impl Rng) -> Environment {
    let arena = Rectangle::from_corners(
        Position::new(-ARENA_LENGTH / 2.0, -ARENA_LENGTH / 2.0),
        Position::new(ARENA_LENGTH / 2.0, ARENA_LENGTH / 2.0),
    );

    let mut environment = Environment::new();
    environment.set_floor(
        Floor::new(Rgb::WHITE)
            .with_patch(
                Rectangle::from_center(Position::new(250.0, 0.0), 20.0, 400.0),
                Rgb::BLACK,
            )
            .with_patch(
                Rectangle::from_center(Position::new(-250.0, 150.0), 60.0, 60.0),
                Rgb::new(0, 0, 200),
            ),
    );

    for _ in 0..4 {
        let center = random_position(rng, &arena, 100.0);
        environment.add_obstacle(Obstacle::new(Rectangle::from_center(
            center,
            rng.random_range(20.0..60.0),
            rng.random_range(20.0..60.0),
        )));
    }

    for _ in 0..6 {
        let center = random_position(rng, &arena, 50.0);
        environment.add_target(Target::square(center, rng.random_range(10.0..40.0)));
    }

    let light = random_position(rng, &arena, 150.0);
    environment.add_light(Light::new(light, 50.0, 1.0));
    environment.add_shadow(Shadow::new(Rectangle::from_center(
        light + Position::new(120.0, 0.0),
        80.0,
        80.0,
    )));

    environment
}

fn random_position(rng: &mut impl Rng, area: &Rectangle, margin: f64) -> Position {
    Position::new(
        rng.random_range(area.min().x() + margin..area.max().x() - margin),
        rng.random_range(area.min().y() + margin..area.max().y() - margin),
    )
}
