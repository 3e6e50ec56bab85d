//! Color classification against axis-aligned cuboids in RGB space.

use std::{collections::BTreeMap, sync::Arc};

use once_cell::sync::Lazy;

use super::ConfigError;

static DEFAULT_COLOR_CUBES: Lazy<Arc<ColorCubes>> = Lazy::new(|| Arc::new(ColorCubes::default()));

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Brightness (HSB value) scaled to `0..=1000`.
    pub fn brightness(&self) -> i32 {
        let max = self.r.max(self.g).max(self.b) as i32;
        max * 1000 / 255
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColorLabel {
    #[default]
    Undefined,
    Black,
    Blue,
    Green,
    Yellow,
    Red,
    White,
}

impl ColorLabel {
    /// Classification priority.
    pub const CLASSIFIED: [ColorLabel; 6] = [
        ColorLabel::Black,
        ColorLabel::Blue,
        ColorLabel::Green,
        ColorLabel::Yellow,
        ColorLabel::Red,
        ColorLabel::White,
    ];

    pub fn id(self) -> usize {
        self as usize
    }

    fn key(self) -> &'static str {
        match self {
            ColorLabel::Undefined => "undefined",
            ColorLabel::Black => "black",
            ColorLabel::Blue => "blue",
            ColorLabel::Green => "green",
            ColorLabel::Yellow => "yellow",
            ColorLabel::Red => "red",
            ColorLabel::White => "white",
        }
    }
}

/// Inclusive bounds per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorCube {
    pub r_min: u8,
    pub r_max: u8,
    pub g_min: u8,
    pub g_max: u8,
    pub b_min: u8,
    pub b_max: u8,
}

impl ColorCube {
    pub const fn new(r_min: u8, r_max: u8, g_min: u8, g_max: u8, b_min: u8, b_max: u8) -> Self {
        Self {
            r_min,
            r_max,
            g_min,
            g_max,
            b_min,
            b_max,
        }
    }

    pub fn contains(&self, color: Rgb) -> bool {
        (self.r_min..=self.r_max).contains(&color.r)
            && (self.g_min..=self.g_max).contains(&color.g)
            && (self.b_min..=self.b_max).contains(&color.b)
    }
}

/// Ordered table of the cubes for Black, Blue, Green, Yellow, Red and White.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorCubes {
    cubes: [ColorCube; 6],
}

impl Default for ColorCubes {
    fn default() -> Self {
        Self {
            cubes: [
                ColorCube::new(0, 50, 0, 50, 0, 50),
                ColorCube::new(0, 50, 0, 50, 205, 255),
                ColorCube::new(0, 50, 205, 255, 0, 50),
                ColorCube::new(205, 255, 205, 255, 0, 50),
                ColorCube::new(205, 255, 0, 50, 0, 50),
                ColorCube::new(205, 255, 205, 255, 205, 255),
            ],
        }
    }
}

impl ColorCubes {
    const BOUNDS: [&'static str; 6] = ["rMin", "rMax", "gMin", "gMax", "bMin", "bMax"];

    /// Instance shared by all sensors that are not given their own table.
    pub fn shared_default() -> Arc<ColorCubes> {
        DEFAULT_COLOR_CUBES.clone()
    }

    /// Reads all 36 bounds from keys like `black.rMin`.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Result<Self, ConfigError> {
        let mut cubes = [ColorCube::new(0, 0, 0, 0, 0, 0); 6];
        for (cube, label) in cubes.iter_mut().zip(ColorLabel::CLASSIFIED) {
            let mut bounds = [0u8; 6];
            for (bound, name) in bounds.iter_mut().zip(Self::BOUNDS) {
                let key = format!("{}.{}", label.key(), name);
                let value = *map.get(&key).ok_or_else(|| ConfigError::Missing(key.clone()))?;
                if !(0.0..=255.0).contains(&value) || value.fract() != 0.0 {
                    return Err(ConfigError::InvalidValue { key, value });
                }
                *bound = value as u8;
            }
            *cube = ColorCube::new(
                bounds[0], bounds[1], bounds[2], bounds[3], bounds[4], bounds[5],
            );
        }
        Ok(Self { cubes })
    }

    /// Returns `None` for `ColorLabel::Undefined`.
    pub fn cube(&self, label: ColorLabel) -> Option<&ColorCube> {
        label.id().checked_sub(1).map(|idx| &self.cubes[idx])
    }

    pub fn with_cube(mut self, label: ColorLabel, cube: ColorCube) -> Self {
        if let Some(idx) = label.id().checked_sub(1) {
            self.cubes[idx] = cube;
        }
        self
    }

    /// First matching cube in priority order, `Undefined` if none matches.
    pub fn classify(&self, color: Rgb) -> ColorLabel {
        std::iter::zip(ColorLabel::CLASSIFIED, &self.cubes)
            .find(|(_, cube)| cube.contains(color))
            .map(|(label, _)| label)
            .unwrap_or(ColorLabel::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::black(Rgb::new(10, 20, 30), ColorLabel::Black)]
    #[case::blue(Rgb::new(0, 0, 255), ColorLabel::Blue)]
    #[case::green(Rgb::new(50, 205, 50), ColorLabel::Green)]
    #[case::yellow(Rgb::new(255, 255, 0), ColorLabel::Yellow)]
    #[case::red(Rgb::new(230, 10, 10), ColorLabel::Red)]
    #[case::white(Rgb::WHITE, ColorLabel::White)]
    #[case::gray(Rgb::new(128, 128, 128), ColorLabel::Undefined)]
    #[case::just_outside(Rgb::new(51, 0, 0), ColorLabel::Undefined)]
    fn test_classify(#[case] color: Rgb, #[case] expected: ColorLabel) {
        assert_eq!(ColorCubes::default().classify(color), expected);
    }

    #[test]
    fn test_classify_prefers_lowest_index() {
        let cubes = ColorCubes::default()
            .with_cube(ColorLabel::Blue, ColorCube::new(0, 255, 0, 255, 0, 255));
        assert_eq!(cubes.classify(Rgb::BLACK), ColorLabel::Black);
        assert_eq!(cubes.classify(Rgb::WHITE), ColorLabel::Blue);
    }

    #[test]
    fn test_classify_is_total() {
        let cubes = ColorCubes::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10_000 {
            let color = Rgb::new(rng.random(), rng.random(), rng.random());
            let label = cubes.classify(color);
            let matching = ColorLabel::CLASSIFIED
                .iter()
                .filter(|l| cubes.cube(**l).is_some_and(|c| c.contains(color)))
                .count();
            assert_eq!(label == ColorLabel::Undefined, matching == 0);
        }
    }

    #[test]
    fn test_labels_of_corners() {
        let cubes = ColorCubes::default();
        let labels = [0u8, 255]
            .iter()
            .flat_map(|r| [0u8, 255].map(move |g| (*r, g)))
            .flat_map(|(r, g)| [0u8, 255].map(move |b| Rgb::new(r, g, b)))
            .map(|c| cubes.classify(c))
            .collect::<Vec<_>>();
        insta::assert_debug_snapshot!(labels, @r###"
        [
            Black,
            Blue,
            Green,
            Undefined,
            Red,
            Undefined,
            Yellow,
            White,
        ]
        "###);
    }

    #[test]
    fn test_from_map() {
        let mut map = BTreeMap::new();
        for label in ColorLabel::CLASSIFIED {
            for (bound, value) in ColorCubes::BOUNDS.iter().zip([0.0, 10.0, 0.0, 10.0, 0.0, 10.0]) {
                map.insert(format!("{}.{}", label.key(), bound), value);
            }
        }
        let cubes = ColorCubes::from_map(&map).unwrap();
        assert_eq!(cubes.classify(Rgb::new(5, 5, 5)), ColorLabel::Black);
        assert_eq!(cubes.classify(Rgb::new(11, 5, 5)), ColorLabel::Undefined);

        map.remove("white.bMax");
        assert_eq!(
            ColorCubes::from_map(&map),
            Err(ConfigError::Missing("white.bMax".to_string()))
        );
    }

    #[test]
    fn test_brightness() {
        assert_eq!(Rgb::WHITE.brightness(), 1000);
        assert_eq!(Rgb::BLACK.brightness(), 0);
        assert_eq!(Rgb::new(0, 128, 64).brightness(), 501);
    }
}
