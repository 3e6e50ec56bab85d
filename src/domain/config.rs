//! Named numeric constants of the simulation.
//!
//! The values are supplied by an external configuration source as a flat key/value map. Property
//! files or other formats are the caller's concern.

use std::{collections::BTreeMap, time::Duration};

use thiserror::Error;

use super::Angle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown configuration key {0:?}")]
    UnknownKey(String),
    #[error("missing configuration key {0:?}")]
    Missing(String),
    #[error("invalid value {value} for configuration key {key:?}")]
    InvalidValue { key: String, value: f64 },
}

/// All lengths are in world units, all angles in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Period of the fixed tick in milliseconds.
    pub simulation_period: u64,
    pub default_speed: u8,
    /// Distance between the two drive wheels.
    pub axle_length: f64,
    /// Advance per tick and speed unit.
    pub nb_steps: f64,
    /// Spin angle per tick and speed unit of two counter-rotating motors.
    pub mot_turn_angle: f64,
    /// Spin angle per tick and speed unit of a gear.
    pub gear_turn_angle: f64,
    pub motor_rot_inc_factor: f64,
    pub gear_rot_inc_factor: f64,
    /// Encoder counts per tick and speed unit.
    pub encoder_inc_factor: f64,
    pub beam_half_width: f64,
    pub collision_radius: f64,
    /// Offset of the collision circle center along the heading.
    pub collision_offset: f64,
    pub infrared_radius: f64,
    /// Sleep in milliseconds granted by polling getters.
    pub poll_yield: u64,
    pub listener_queue: usize,
    pub light_trigger_level: i32,
    pub ultrasonic_trigger_level: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            simulation_period: 30,
            default_speed: 50,
            axle_length: 57.0,
            nb_steps: 0.03,
            mot_turn_angle: 0.08,
            gear_turn_angle: 0.1,
            motor_rot_inc_factor: 1.2,
            gear_rot_inc_factor: 0.8,
            encoder_inc_factor: 0.1,
            beam_half_width: 10.0,
            collision_radius: 16.0,
            collision_offset: -13.0,
            infrared_radius: 5.0,
            poll_yield: 1,
            listener_queue: 64,
            light_trigger_level: 500,
            ultrasonic_trigger_level: 20.0,
        }
    }
}

impl SimConfig {
    /// Overlays the given key/value pairs on the defaults.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, &value) in map {
            config.set(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn set(&mut self, key: &str, value: f64) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        };
        if !value.is_finite() {
            return Err(invalid());
        }
        let whole = || {
            if value >= 0.0 && value.fract() == 0.0 {
                Ok(value as u64)
            } else {
                Err(invalid())
            }
        };
        match key {
            "simulationPeriod" => self.simulation_period = whole()?,
            "defaultSpeed" => {
                self.default_speed = u8::try_from(whole()?).map_err(|_| invalid())?;
            }
            "axleLength" => self.axle_length = value,
            "nbSteps" => self.nb_steps = value,
            "motTurnAngle" => self.mot_turn_angle = value,
            "gearTurnAngle" => self.gear_turn_angle = value,
            "motorRotIncFactor" => self.motor_rot_inc_factor = value,
            "gearRotIncFactor" => self.gear_rot_inc_factor = value,
            "encoderIncFactor" => self.encoder_inc_factor = value,
            "beamHalfWidth" => self.beam_half_width = value,
            "collisionRadius" => self.collision_radius = value,
            "collisionOffset" => self.collision_offset = value,
            "infraredRadius" => self.infrared_radius = value,
            "pollYield" => self.poll_yield = whole()?,
            "listenerQueue" => {
                self.listener_queue = usize::try_from(whole()?).map_err(|_| invalid())?;
            }
            "lightTriggerLevel" => {
                if value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
                    return Err(invalid());
                }
                self.light_trigger_level = value as i32;
            }
            "ultrasonicTriggerLevel" => self.ultrasonic_trigger_level = value,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |key: &str, value: f64, valid: bool| {
            if valid {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
            }
        };
        check(
            "simulationPeriod",
            self.simulation_period as f64,
            self.simulation_period > 0,
        )?;
        check(
            "defaultSpeed",
            self.default_speed as f64,
            self.default_speed <= 100,
        )?;
        check("axleLength", self.axle_length, self.axle_length > 0.0)?;
        check(
            "beamHalfWidth",
            self.beam_half_width,
            self.beam_half_width > 0.0 && self.beam_half_width < 90.0,
        )?;
        check(
            "collisionRadius",
            self.collision_radius,
            self.collision_radius >= 0.0,
        )?;
        check(
            "infraredRadius",
            self.infrared_radius,
            self.infrared_radius >= 0.0,
        )?;
        check(
            "listenerQueue",
            self.listener_queue as f64,
            self.listener_queue > 0,
        )
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.simulation_period)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_yield)
    }

    pub fn beam_half_angle(&self) -> Angle {
        Angle::from_deg(self.beam_half_width)
    }

    /// Smallest arc radius a gear can drive.
    pub fn min_arc_radius(&self) -> f64 {
        self.axle_length / 2.0
    }
}
