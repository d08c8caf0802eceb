// Build configuration for the geodata pipeline.
//
// Loaded from a JSON config file with CLI overrides on top; all values
// are world units except the angle (degrees).

use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BuilderSettings {
    /// Horizontal voxel size
    pub cell_size: f32,
    /// Vertical voxel size
    pub cell_height: f32,
    /// Actor capsule height
    pub actor_height: f32,
    /// Actor capsule radius
    pub actor_radius: f32,
    /// Steepest surface still counted as walkable, in degrees
    pub max_walkable_angle: f32,
    /// Climb height always allowed, even on steep surfaces
    pub min_walkable_climb: f32,
    /// Climb height never exceeded on flat surfaces
    pub max_walkable_climb: f32,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            cell_size: 16.0,
            cell_height: 8.0,
            actor_height: 48.0,
            actor_radius: 16.0,
            max_walkable_angle: 45.0,
            min_walkable_climb: 16.0,
            max_walkable_climb: 80.0,
        }
    }
}

impl BuilderSettings {
    /// Read settings from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&content)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: BuilderSettings = serde_json::from_str(r#"{"cell_size": 32.0}"#).unwrap();
        assert_eq!(settings.cell_size, 32.0);
        assert_eq!(settings.actor_height, 48.0);
        assert_eq!(settings.max_walkable_climb, 80.0);
    }
}
