use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use turtleworks_index::Topology;

use crate::error::{WorldError, WorldResult};
use crate::rng::RandomSource;

/// A turtle breed declared up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreedSpec {
    /// Plural breed name, used to look the breed up.
    pub name: String,
    /// Variables owned by members of this breed only.
    #[serde(default)]
    pub variables: Vec<String>,
    /// Shape given to newly created members.
    #[serde(default)]
    pub default_shape: Option<String>,
}

/// A link breed declared up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBreedSpec {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<String>,
    /// Whether links of this breed point from `end1` to `end2`.
    #[serde(default)]
    pub directed: bool,
}

/// Static configuration for a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Leftmost patch column.
    pub min_pxcor: i32,
    /// Rightmost patch column.
    pub max_pxcor: i32,
    /// Bottom patch row.
    pub min_pycor: i32,
    /// Top patch row.
    pub max_pycor: i32,
    /// Whether the x axis wraps around (torus) or is bounded.
    pub wrap_x: bool,
    /// Whether the y axis wraps around (torus) or is bounded.
    pub wrap_y: bool,
    /// Display size of one patch in pixels. Not used by the simulation.
    pub patch_size: f64,
    /// Observer variables, in slot order.
    pub globals: Vec<String>,
    /// Globals set from outside the model that survive `clear_all`.
    pub interface_globals: Vec<String>,
    /// Variables shared by every turtle, after the builtins.
    pub turtles_own: Vec<String>,
    /// Variables shared by every patch, after the builtins.
    pub patches_own: Vec<String>,
    /// Variables shared by every link, after the builtins.
    pub links_own: Vec<String>,
    /// Turtle breeds registered at construction.
    pub breeds: Vec<BreedSpec>,
    /// Link breeds registered at construction.
    pub link_breeds: Vec<LinkBreedSpec>,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            min_pxcor: -16,
            max_pxcor: 16,
            min_pycor: -16,
            max_pycor: 16,
            wrap_x: true,
            wrap_y: true,
            patch_size: 13.0,
            globals: Vec::new(),
            interface_globals: Vec::new(),
            turtles_own: Vec::new(),
            patches_own: Vec::new(),
            links_own: Vec::new(),
            breeds: Vec::new(),
            link_breeds: Vec::new(),
            rng_seed: None,
        }
    }
}

impl WorldConfig {
    /// Config for a world of the given bounds with everything else defaulted.
    #[must_use]
    pub fn with_bounds(min_pxcor: i32, max_pxcor: i32, min_pycor: i32, max_pycor: i32) -> Self {
        Self {
            min_pxcor,
            max_pxcor,
            min_pycor,
            max_pycor,
            ..Self::default()
        }
    }

    /// Validates the configuration, returning the derived topology.
    pub fn validate(&self) -> WorldResult<Topology> {
        if !self.patch_size.is_finite() || self.patch_size <= 0.0 {
            return Err(WorldError::InvalidConfig(
                "patch_size must be positive".into(),
            ));
        }
        let topology = Topology::new(
            self.min_pxcor,
            self.max_pxcor,
            self.min_pycor,
            self.max_pycor,
            self.wrap_x,
            self.wrap_y,
        )?;
        if let Some(spec) = self.breeds.iter().find(|spec| spec.name.trim().is_empty()) {
            return Err(WorldError::InvalidConfig(format!(
                "breed with variables {:?} has no name",
                spec.variables
            )));
        }
        if self.link_breeds.iter().any(|spec| spec.name.trim().is_empty()) {
            return Err(WorldError::InvalidConfig(
                "link breeds must be named".into(),
            ));
        }
        Ok(topology)
    }

    /// Returns the configured random source, seeding from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> RandomSource {
        match self.rng_seed {
            Some(seed) => RandomSource::from_seed(seed),
            None => RandomSource::from_entropy(),
        }
    }
}

/// One entry of the shape catalog. Drawing elements are carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDef {
    /// Whether the shape turns with the turtle's heading.
    #[serde(default = "default_rotate")]
    pub rotate: bool,
    #[serde(default)]
    pub elements: Vec<serde_json::Value>,
}

fn default_rotate() -> bool {
    true
}

/// Shape catalog keyed by shape name. Stored and forwarded, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeCatalog {
    shapes: BTreeMap<String, ShapeDef>,
}

impl ShapeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, shape: ShapeDef) -> Option<ShapeDef> {
        self.shapes.insert(name.into(), shape)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ShapeDef> {
        self.shapes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.shapes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turtleworks_index::IndexError;

    #[test]
    fn default_config_is_valid_and_wrapping() {
        let config = WorldConfig::default();
        let topology = config.validate().expect("valid");
        assert_eq!(topology.width(), 33);
        assert!(topology.wrap_x() && topology.wrap_y());
    }

    #[test]
    fn validate_rejects_bad_bounds_and_patch_size() {
        let inverted = WorldConfig::with_bounds(2, -2, -1, 1);
        assert!(matches!(
            inverted.validate(),
            Err(WorldError::Index(IndexError::InvalidConfig(_)))
        ));
        let config = WorldConfig {
            patch_size: 0.0,
            ..WorldConfig::default()
        };
        assert!(matches!(config.validate(), Err(WorldError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: WorldConfig = serde_json::from_str(
            r#"{"min_pxcor": -1, "max_pxcor": 1, "min_pycor": -1, "max_pycor": 1,
                "breeds": [{"name": "ball", "variables": ["speed"]}], "rng_seed": 5}"#,
        )
        .expect("parse");
        assert_eq!(config.breeds[0].default_shape, None);
        assert_eq!(config.patch_size, 13.0);
        assert!(config.wrap_x);
        let mut a = config.seeded_rng();
        let mut b = config.seeded_rng();
        assert_eq!(a.uniform_int(100), b.uniform_int(100));
    }

    #[test]
    fn shape_catalog_round_trips_opaque_elements() {
        let catalog: ShapeCatalog = serde_json::from_str(
            r#"{"circle": {"rotate": false, "elements": [{"type": "circle", "r": 3}]},
                "default": {"elements": []}}"#,
        )
        .expect("parse");
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.get("circle").expect("circle").rotate);
        assert!(catalog.get("default").expect("default").rotate);
        let text = serde_json::to_string(&catalog).expect("serialize");
        let again: ShapeCatalog = serde_json::from_str(&text).expect("reparse");
        assert_eq!(again, catalog);
        assert_eq!(again.names().collect::<Vec<_>>(), ["circle", "default"]);
    }
}
