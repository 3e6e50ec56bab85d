use std::time::Duration;

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};

use robot_sim::domain::{ConfigError, SimConfig};

mod controller;
mod resource;
mod simulator;

fn main() -> Result<(), ConfigError> {
    let simulator = simulator::Simulator::new(SimConfig::default())?;
    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(1))),
        )
        .add_plugins(LogPlugin::default())
        .add_plugins(controller::Controller)
        .add_plugins(simulator)
        .run();
    Ok(())
}
