//! Test utils.

use std::sync::Mutex;

use crate::domain::{
    CollisionListener, InfraredListener, LightListener, SensorPort, SimConfig, UltrasonicListener,
};

/// Default configuration without the polling courtesy sleep.
pub fn quiet_config() -> SimConfig {
    SimConfig {
        poll_yield: 0,
        ..SimConfig::default()
    }
}

/// Listener recording every callback as a line of text.
#[derive(Default)]
pub struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl LightListener for Recorder {
    fn bright(&self, port: SensorPort, value: i32) {
        self.push(format!("bright {port} {value}"));
    }

    fn dark(&self, port: SensorPort, value: i32) {
        self.push(format!("dark {port} {value}"));
    }
}

impl UltrasonicListener for Recorder {
    fn near(&self, port: SensorPort, distance: u32) {
        self.push(format!("near {port} {distance}"));
    }

    fn far(&self, port: SensorPort, distance: u32) {
        self.push(format!("far {port} {distance}"));
    }
}

impl InfraredListener for Recorder {
    fn activated(&self, port: SensorPort) {
        self.push(format!("activated {port}"));
    }

    fn passivated(&self, port: SensorPort) {
        self.push(format!("passivated {port}"));
    }
}

impl CollisionListener for Recorder {
    fn collide(&self) {
        self.push("collide".to_string());
    }
}
