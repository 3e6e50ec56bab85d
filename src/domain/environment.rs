//! Scene with targets, lights, shadows, obstacles and the floor.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use thiserror::Error;

use super::{BeamCone, HasCollision, Position, Rectangle, Rgb, Shape, Triangle};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("target mesh needs at least two vertices, got {0}")]
    DegenerateMesh(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

/// Polygon detectable by ranging sensors.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    center: Position,
    mesh: Vec<Position>,
}

impl Target {
    /// Mesh vertices are relative to `center`.
    pub fn new(center: Position, mesh: Vec<Position>) -> Result<Self, SceneError> {
        if mesh.len() < 2 {
            return Err(SceneError::DegenerateMesh(mesh.len()));
        }
        Ok(Self { center, mesh })
    }

    /// Square of the given edge length around `center`.
    pub fn square(center: Position, length: f64) -> Self {
        let h = length / 2.0;
        Self {
            center,
            mesh: vec![
                Position::new(h, h),
                Position::new(-h, h),
                Position::new(-h, -h),
                Position::new(h, -h),
            ],
        }
    }

    pub fn center(&self) -> Position {
        self.center
    }

    pub fn set_center(&mut self, center: Position) {
        self.center = center;
    }

    pub fn mesh(&self) -> &[Position] {
        &self.mesh
    }

    /// Closed triangle fan around the center.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        let n = self.mesh.len();
        (0..n).map(move |i| {
            Triangle::new(
                self.center,
                self.center + self.mesh[i],
                self.center + self.mesh[(i + 1) % n],
            )
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    position: Position,
    height: f64,
    power: f64,
}

impl Light {
    pub fn new(position: Position, height: f64, power: f64) -> Self {
        Self {
            position,
            height,
            power,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Inverse-square falloff. Unbounded directly below the light at height 0.
    pub fn intensity_at(&self, point: Position) -> f64 {
        let d = point - self.position;
        1e7 * self.power / (d.dot(d) + self.height * self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow(Rectangle);

impl Shadow {
    pub fn new(rectangle: Rectangle) -> Self {
        Self(rectangle)
    }

    pub fn in_shadow(&self, point: Position) -> bool {
        self.0.contains_strictly(point)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle(Rectangle);

impl Obstacle {
    pub fn new(rectangle: Rectangle) -> Self {
        Self(rectangle)
    }

    pub fn rectangle(&self) -> Rectangle {
        self.0
    }
}

impl HasCollision for Obstacle {
    fn shape(&self) -> Shape {
        Shape::Rectangle(self.0)
    }
}

/// Background color with rectangular patches painted on top of it.
#[derive(Clone, Debug, PartialEq)]
pub struct Floor {
    background: Rgb,
    patches: Vec<(Rectangle, Rgb)>,
}

impl Default for Floor {
    fn default() -> Self {
        Self::new(Rgb::WHITE)
    }
}

impl Floor {
    pub fn new(background: Rgb) -> Self {
        Self {
            background,
            patches: Vec::new(),
        }
    }

    pub fn with_patch(mut self, rectangle: Rectangle, color: Rgb) -> Self {
        self.patches.push((rectangle, color));
        self
    }

    /// The patch painted last wins.
    pub fn color_at(&self, point: Position) -> Rgb {
        self.patches
            .iter()
            .rev()
            .find(|(rectangle, _)| rectangle.contains(point))
            .map(|(_, color)| *color)
            .unwrap_or(self.background)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Environment {
    targets: BTreeMap<ObjectId, Target>,
    lights: BTreeMap<ObjectId, Light>,
    shadows: BTreeMap<ObjectId, Shadow>,
    obstacles: BTreeMap<ObjectId, Obstacle>,
    floor: Floor,
    next_id: u64,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    pub fn add_target(&mut self, target: Target) -> ObjectId {
        let id = self.next_id();
        self.targets.insert(id, target);
        id
    }

    pub fn add_light(&mut self, light: Light) -> ObjectId {
        let id = self.next_id();
        self.lights.insert(id, light);
        id
    }

    pub fn add_shadow(&mut self, shadow: Shadow) -> ObjectId {
        let id = self.next_id();
        self.shadows.insert(id, shadow);
        id
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> ObjectId {
        let id = self.next_id();
        self.obstacles.insert(id, obstacle);
        id
    }

    /// Removes the object of any kind. Returns false if the id is unknown.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.targets.remove(&id).is_some()
            || self.lights.remove(&id).is_some()
            || self.shadows.remove(&id).is_some()
            || self.obstacles.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.lights.clear();
        self.shadows.clear();
        self.obstacles.clear();
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    pub fn target_mut(&mut self, id: ObjectId) -> Option<&mut Target> {
        self.targets.get_mut(&id)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.values()
    }

    pub fn floor(&self) -> &Floor {
        &self.floor
    }

    pub fn set_floor(&mut self, floor: Floor) {
        self.floor = floor;
    }

    pub fn illumination(&self, point: Position) -> f64 {
        if self.shadows.values().any(|s| s.in_shadow(point)) {
            return 0.0;
        }
        self.lights.values().map(|l| l.intensity_at(point)).sum()
    }

    pub fn distance_to_nearest_target(&self, cone: &BeamCone) -> Option<f64> {
        self.targets
            .values()
            .filter_map(|t| cone.distance_to_closest(&t.triangles().collect::<Vec<_>>()))
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn floor_color(&self, point: Position) -> Rgb {
        self.floor.color_at(point)
    }

    pub fn has_collision(&self, object: &dyn HasCollision) -> bool {
        self.obstacles.values().any(|o| o.has_collision(object))
    }
}

/// Shared handle to the environment, written by the scene owner and read by robots.
#[derive(Clone, Debug, Default)]
pub struct Scene(Arc<RwLock<Environment>>);

impl Scene {
    pub fn new(environment: Environment) -> Self {
        Self(Arc::new(RwLock::new(environment)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Environment> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Environment> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::super::Angle;
    use super::*;

    fn lamp(position: Position) -> Light {
        Light::new(position, 0.0, 1.0)
    }

    #[test]
    fn test_target_requires_two_vertices() {
        assert_eq!(
            Target::new(Position::default(), vec![Position::new(1.0, 0.0)]),
            Err(SceneError::DegenerateMesh(1))
        );
        assert!(Target::new(
            Position::default(),
            vec![Position::new(1.0, 0.0), Position::new(0.0, 1.0)]
        )
        .is_ok());
    }

    #[test]
    fn test_target_triangles() {
        let target = Target::new(
            Position::new(10.0, 0.0),
            vec![
                Position::new(1.0, 0.0),
                Position::new(0.0, 1.0),
                Position::new(-1.0, 0.0),
            ],
        )
        .unwrap();
        let triangles = target.triangles().collect::<Vec<_>>();
        assert_eq!(triangles.len(), 3);
        assert_eq!(
            triangles[2].vertices(),
            [
                Position::new(10.0, 0.0),
                Position::new(9.0, 0.0),
                Position::new(11.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_illumination_inverse_square() {
        let mut environment = Environment::new();
        environment.add_light(lamp(Position::default()));
        let near = environment.illumination(Position::new(10.0, 0.0));
        let far = environment.illumination(Position::new(0.0, -20.0));
        assert_abs_diff_eq!(near, 1e5);
        assert_abs_diff_eq!(near / far, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_illumination_sums_lights_and_height() {
        let mut environment = Environment::new();
        environment.add_light(Light::new(Position::new(-10.0, 0.0), 0.0, 1.0));
        environment.add_light(Light::new(Position::new(10.0, 0.0), 10.0, 2.0));
        assert_abs_diff_eq!(
            environment.illumination(Position::default()),
            1e5 + 2e7 / 200.0,
            epsilon = 1e-6
        );
    }

    #[rstest]
    #[case::inside(Position::new(5.0, 5.0), true)]
    #[case::on_border(Position::new(0.0, 5.0), false)]
    #[case::outside(Position::new(15.0, 5.0), false)]
    fn test_illumination_in_shadow(#[case] point: Position, #[case] dark: bool) {
        let mut environment = Environment::new();
        environment.add_light(Light::new(Position::new(5.0, 5.0), 1.0, 1000.0));
        environment.add_light(lamp(Position::new(20.0, 20.0)));
        environment.add_shadow(Shadow::new(Rectangle::from_corners(
            Position::new(0.0, 0.0),
            Position::new(10.0, 10.0),
        )));
        assert_eq!(environment.illumination(point) == 0.0, dark);
    }

    #[test]
    fn test_distance_to_nearest_target() {
        let mut environment = Environment::new();
        let cone = BeamCone::new(Position::default(), Angle::new(0.0), Angle::from_deg(10.0));
        assert_eq!(environment.distance_to_nearest_target(&cone), None);

        let far = environment.add_target(Target::square(Position::new(60.0, 0.0), 10.0));
        environment.add_target(Target::square(Position::new(0.0, 40.0), 10.0));
        assert_abs_diff_eq!(
            environment.distance_to_nearest_target(&cone).unwrap(),
            55.0,
            epsilon = 1e-9
        );

        environment.add_target(Target::square(Position::new(30.0, 0.0), 10.0));
        assert_abs_diff_eq!(
            environment.distance_to_nearest_target(&cone).unwrap(),
            25.0,
            epsilon = 1e-9
        );

        assert!(environment.remove(far));
        assert!(!environment.remove(far));
    }

    #[test]
    fn test_move_target() {
        let mut environment = Environment::new();
        let id = environment.add_target(Target::square(Position::new(60.0, 0.0), 10.0));
        if let Some(target) = environment.target_mut(id) {
            target.set_center(Position::new(20.0, 0.0));
        }
        let cone = BeamCone::new(Position::default(), Angle::new(0.0), Angle::from_deg(10.0));
        assert_abs_diff_eq!(
            environment.distance_to_nearest_target(&cone).unwrap(),
            15.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_floor_color() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let floor = Floor::new(Rgb::WHITE)
            .with_patch(
                Rectangle::from_corners(Position::new(0.0, 0.0), Position::new(10.0, 10.0)),
                red,
            )
            .with_patch(
                Rectangle::from_corners(Position::new(5.0, 5.0), Position::new(20.0, 20.0)),
                blue,
            );
        assert_eq!(floor.color_at(Position::new(1.0, 1.0)), red);
        assert_eq!(floor.color_at(Position::new(7.0, 7.0)), blue);
        assert_eq!(floor.color_at(Position::new(-1.0, 1.0)), Rgb::WHITE);
    }

    #[test]
    fn test_has_collision() {
        let mut environment = Environment::new();
        environment.add_obstacle(Obstacle::new(Rectangle::from_corners(
            Position::new(-1.0, -1.0),
            Position::new(1.0, 1.0),
        )));
        let near = Shape::Circle {
            position: Position::new(1.5, 0.0),
            radius: 1.0,
        };
        let far = Shape::Circle {
            position: Position::new(5.0, 0.0),
            radius: 1.0,
        };
        assert!(environment.has_collision(&near));
        assert!(!environment.has_collision(&far));
    }

    #[test]
    fn test_scene_concurrent_modification() {
        let scene = Scene::default();
        let cone = BeamCone::new(Position::default(), Angle::new(0.0), Angle::from_deg(10.0));
        let writer = {
            let scene = scene.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let id = scene
                        .write()
                        .add_target(Target::square(Position::new(20.0 + i as f64, 0.0), 4.0));
                    if i % 2 == 0 {
                        scene.write().remove(id);
                    }
                }
            })
        };
        for _ in 0..200 {
            if let Some(distance) = scene.read().distance_to_nearest_target(&cone) {
                assert!(distance >= 18.0 - 1e-9);
            }
        }
        writer.join().unwrap();
        assert_eq!(scene.read().targets().count(), 100);
    }
}
