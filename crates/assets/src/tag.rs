//! Deciding which meshes are water.
//!
//! An explicit [`SurfaceTag`] always wins. Untagged legacy meshes can fall
//! back to a material-color heuristic and a mesh-name heuristic; material
//! names are never consulted.

use serde::{Deserialize, Serialize};

use crate::scene::MeshDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceTag {
    Water,
    Solid,
    #[default]
    Untagged,
}

const WATER_NAMES: [&str; 3] = ["water", "agua", "ocean"];

/// How a mesh ended up classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterMatch {
    Tagged,
    BlueMaterial,
    Name,
    None,
}

impl WaterMatch {
    pub fn is_water(self) -> bool {
        !matches!(self, WaterMatch::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingPolicy {
    /// Apply the legacy heuristics to untagged meshes.
    pub legacy_heuristics: bool,
}

impl Default for TaggingPolicy {
    fn default() -> Self {
        Self {
            legacy_heuristics: true,
        }
    }
}

impl TaggingPolicy {
    pub fn classify(&self, mesh: &MeshDesc) -> WaterMatch {
        match mesh.tag {
            SurfaceTag::Water => WaterMatch::Tagged,
            SurfaceTag::Solid => WaterMatch::None,
            SurfaceTag::Untagged if !self.legacy_heuristics => WaterMatch::None,
            SurfaceTag::Untagged => {
                let [r, _, b, _] = mesh.material.base_color;
                if b > r + 0.2 && b > 0.4 {
                    WaterMatch::BlueMaterial
                } else if looks_like_water(&mesh.name) {
                    WaterMatch::Name
                } else {
                    WaterMatch::None
                }
            }
        }
    }
}

fn looks_like_water(name: &str) -> bool {
    let name = name.to_lowercase();
    WATER_NAMES.iter().any(|w| name.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MaterialDesc;

    fn mesh(name: &str, color: [f32; 4], tag: SurfaceTag) -> MeshDesc {
        MeshDesc {
            name: name.into(),
            material: MaterialDesc {
                name: "mat".into(),
                base_color: color,
            },
            tag,
            ..MeshDesc::default()
        }
    }

    const GREY: [f32; 4] = [0.5, 0.5, 0.5, 1.0];
    const BLUE: [f32; 4] = [0.1, 0.3, 0.8, 1.0];

    #[test]
    fn explicit_tags_win() {
        let policy = TaggingPolicy::default();
        assert_eq!(
            policy.classify(&mesh("rock", GREY, SurfaceTag::Water)),
            WaterMatch::Tagged
        );
        assert_eq!(
            policy.classify(&mesh("Water_Plane", BLUE, SurfaceTag::Solid)),
            WaterMatch::None
        );
    }

    #[test]
    fn untagged_meshes_use_heuristics() {
        let policy = TaggingPolicy::default();
        assert_eq!(
            policy.classify(&mesh("lake", BLUE, SurfaceTag::Untagged)),
            WaterMatch::BlueMaterial
        );
        assert_eq!(
            policy.classify(&mesh("Agua_01", GREY, SurfaceTag::Untagged)),
            WaterMatch::Name
        );
        assert_eq!(
            policy.classify(&mesh("OceanFloor", GREY, SurfaceTag::Untagged)),
            WaterMatch::Name
        );
        assert_eq!(
            policy.classify(&mesh("rock", GREY, SurfaceTag::Untagged)),
            WaterMatch::None
        );
        // Blue but too dark.
        assert_eq!(
            policy.classify(&mesh("rock", [0.0, 0.0, 0.35, 1.0], SurfaceTag::Untagged)),
            WaterMatch::None
        );
    }

    #[test]
    fn material_names_do_not_mark_water() {
        let policy = TaggingPolicy::default();
        let mut pier = mesh("pier", GREY, SurfaceTag::Untagged);
        pier.material.name = "WaterStain".into();
        assert_eq!(policy.classify(&pier), WaterMatch::None);
    }

    #[test]
    fn heuristics_can_be_disabled() {
        let policy = TaggingPolicy {
            legacy_heuristics: false,
        };
        assert!(!policy.classify(&mesh("water", BLUE, SurfaceTag::Untagged)).is_water());
        assert!(policy.classify(&mesh("water", BLUE, SurfaceTag::Water)).is_water());
    }
}
