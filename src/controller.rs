//! Controller steering the robot.
//!
//! A scripted demo program runs on its own thread against the blocking command API while the
//! simulator advances the robot. The app exits once the program has finished.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use bevy::{app::AppExit, prelude::*};

use robot_sim::domain::{
    CollisionListener, ColorSensor, Gear, LightListener, LightSensor, Robot, RobotError,
    SensorPort, UltrasonicListener, UltrasonicSensor,
};

use crate::resource::RobotRes;

static FINISHED: AtomicBool = AtomicBool::new(false);

pub struct Controller;

impl Plugin for Controller {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn)
            .add_systems(Update, finish);
    }
}

struct Reporter;

impl UltrasonicListener for Reporter {
    fn near(&self, port: SensorPort, distance: u32) {
        info!("target ahead on {port} at {distance}");
    }

    fn far(&self, port: SensorPort, distance: u32) {
        info!("nearest target on {port} is {distance} away");
    }
}

impl LightListener for Reporter {
    fn dark(&self, port: SensorPort, value: i32) {
        info!("dark floor below {port} ({value})");
    }
}

impl CollisionListener for Reporter {
    fn collide(&self) {
        warn!("robot hit an obstacle");
    }
}

fn spawn(robot: Res<RobotRes>) {
    let robot = robot.clone();
    let _ = thread::Builder::new()
        .name("controller".to_string())
        .spawn(move || {
            if let Err(err) = run(&robot) {
                error!("demo program failed: {err}");
            }
            FINISHED.store(true, Ordering::Relaxed);
        });
}

fn run(robot: &Robot) -> Result<(), RobotError> {
    let gear = Gear::new();
    let sonar = UltrasonicSensor::new(SensorPort::S3);
    let floor = LightSensor::new(SensorPort::S1);
    let color = ColorSensor::new(SensorPort::S2);
    robot.add_part(&gear)?;
    robot.add_part(&sonar)?;
    robot.add_part(&floor)?;
    robot.add_part(&color)?;

    let reporter = Arc::new(Reporter);
    sonar.add_default_listener(reporter.clone())?;
    floor.add_default_listener(reporter.clone())?;
    robot.set_collision_listener(reporter);

    gear.set_speed(80)?;
    gear.forward_for(Duration::from_secs(3))?;
    gear.left_for(Duration::from_secs(1))?;
    gear.left_arc_for(2.0 * robot.config().axle_length, Duration::from_secs(3))?;
    gear.reset_motor_count()?;
    gear.turn_to(-150, true)?;
    gear.move_to(300, true)?;

    info!(
        "demo finished at {:?} heading {:.1}, floor is {:?}",
        robot.location(),
        robot.heading(),
        color.color_label()?
    );
    match sonar.distance()? {
        Some(distance) => info!("nearest target is {distance} away"),
        None => info!("no target in sight"),
    }
    Ok(())
}

fn finish(mut exit: EventWriter<AppExit>) {
    if FINISHED.load(Ordering::Relaxed) {
        exit.send(AppExit);
    }
}
