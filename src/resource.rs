//! The resource module encapsulates domain entities for use with Bevy.

use std::ops::Deref;

use bevy::ecs::system::Resource;

use robot_sim::domain;

#[derive(Resource, Clone)]
pub struct RobotRes(domain::Robot);

impl Deref for RobotRes {
    type Target = domain::Robot;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<domain::Robot> for RobotRes {
    fn from(value: domain::Robot) -> Self {
        Self(value)
    }
}

#[derive(Resource, Clone)]
pub struct SceneRes(domain::Scene);

impl Deref for SceneRes {
    type Target = domain::Scene;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<domain::Scene> for SceneRes {
    fn from(value: domain::Scene) -> Self {
        Self(value)
    }
}
