//! Scene description files and the resolved scene handed to the renderer.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AssetError;
use crate::tag::{SurfaceTag, TaggingPolicy, WaterMatch};

/// Content-addressed mesh ID computed from the mesh description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn of(mesh: &MeshDesc) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(mesh.name.as_bytes());
        hasher.update(mesh.material.name.as_bytes());
        for c in mesh.material.base_color {
            hasher.update(c.to_le_bytes());
        }
        hasher.update(mesh.vertex_count.to_le_bytes());
        hasher.update(mesh.index_count.to_le_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        AssetId(u64::from_le_bytes(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    pub name: String,
    /// Linear RGBA.
    pub base_color: [f32; 4],
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: "default".into(),
            base_color: [0.8, 0.8, 0.8, 1.0],
        }
    }
}

/// Analytic stand-in geometry for a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Unbounded horizontal plane.
    Ground { height: f32 },
    Box { center: Vec3, half_extents: Vec3 },
    Sphere { center: Vec3, radius: f32 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshDesc {
    pub name: String,
    #[serde(default)]
    pub material: MaterialDesc,
    #[serde(default)]
    pub tag: SurfaceTag,
    #[serde(default)]
    pub vertex_count: u32,
    #[serde(default)]
    pub index_count: u32,
    #[serde(default)]
    pub shape: Option<Shape>,
}

impl MeshDesc {
    pub fn color(&self) -> Vec3 {
        let [r, g, b, _] = self.material.base_color;
        Vec3::new(r, g, b)
    }

    fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: &str| AssetError::InvalidMesh {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !self.material.base_color.iter().all(|c| c.is_finite()) {
            return Err(invalid("material color is not finite"));
        }
        match self.shape {
            Some(Shape::Sphere { radius, .. }) if !(radius > 0.0) => {
                Err(invalid("sphere radius must be positive"))
            }
            Some(Shape::Box { half_extents, .. })
                if !half_extents.is_finite() || half_extents.min_element() < 0.0 =>
            {
                Err(invalid("box extents must be finite and non-negative"))
            }
            Some(Shape::Ground { height }) if !height.is_finite() => {
                Err(invalid("ground height must be finite"))
            }
            _ => Ok(()),
        }
    }
}

/// On-disk scene description (JSON).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneFile {
    pub name: String,
    pub meshes: Vec<MeshDesc>,
}

impl SceneFile {
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    pub id: AssetId,
    pub desc: MeshDesc,
    pub water: WaterMatch,
    /// Water meshes are hidden; the procedural slab replaces them.
    pub visible: bool,
}

/// A fully resolved scene, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneData {
    pub name: String,
    pub meshes: Vec<SceneMesh>,
}

impl SceneData {
    pub fn resolve(file: SceneFile, policy: &TaggingPolicy) -> Result<Self, AssetError> {
        let mut meshes = Vec::with_capacity(file.meshes.len());
        for desc in file.meshes {
            desc.validate()?;
            let water = policy.classify(&desc);
            if matches!(water, WaterMatch::BlueMaterial | WaterMatch::Name) {
                tracing::debug!(mesh = %desc.name, ?water, "untagged mesh treated as water");
            }
            meshes.push(SceneMesh {
                id: AssetId::of(&desc),
                visible: !water.is_water(),
                water,
                desc,
            });
        }
        let hidden = meshes.iter().filter(|m| !m.visible).count();
        tracing::info!(
            scene = %file.name,
            meshes = meshes.len(),
            hidden,
            "scene resolved"
        );
        Ok(Self {
            name: file.name,
            meshes,
        })
    }

    pub fn visible_meshes(&self) -> impl Iterator<Item = &SceneMesh> {
        self.meshes.iter().filter(|m| m.visible)
    }

    pub fn water_meshes(&self) -> impl Iterator<Item = &SceneMesh> {
        self.meshes.iter().filter(|m| m.water.is_water())
    }

    pub fn get(&self, id: AssetId) -> Option<&SceneMesh> {
        self.meshes.iter().find(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "name": "harbour",
        "meshes": [
            { "name": "seabed", "shape": { "type": "ground", "height": -2.0 } },
            {
                "name": "pier",
                "material": { "name": "wood", "base_color": [0.5, 0.35, 0.2, 1.0] },
                "tag": "solid",
                "vertex_count": 24,
                "index_count": 36,
                "shape": { "type": "box", "center": [0.0, 0.0, 0.0], "half_extents": [1.0, 2.0, 1.0] }
            },
            { "name": "Water_Surface", "material": { "name": "m", "base_color": [0.1, 0.4, 0.9, 1.0] } },
            { "name": "lagoon", "tag": "water" }
        ]
    }"#;

    #[test]
    fn water_meshes_are_hidden() {
        let file = SceneFile::from_json(SCENE).unwrap();
        let scene = SceneData::resolve(file, &TaggingPolicy::default()).unwrap();
        assert_eq!(scene.meshes.len(), 4);
        let visible: Vec<&str> = scene.visible_meshes().map(|m| m.desc.name.as_str()).collect();
        assert_eq!(visible, ["seabed", "pier"]);
        assert_eq!(scene.water_meshes().count(), 2);
        assert_eq!(scene.meshes[3].water, WaterMatch::Tagged);
    }

    #[test]
    fn ids_are_content_addressed() {
        let a = MeshDesc {
            name: "rock".into(),
            ..MeshDesc::default()
        };
        let mut b = a.clone();
        assert_eq!(AssetId::of(&a), AssetId::of(&b));
        b.material.base_color[0] = 0.1;
        assert_ne!(AssetId::of(&a), AssetId::of(&b));

        let scene = SceneData::resolve(
            SceneFile {
                name: "s".into(),
                meshes: vec![a.clone()],
            },
            &TaggingPolicy::default(),
        )
        .unwrap();
        assert!(scene.get(AssetId::of(&a)).is_some());
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let file = SceneFile {
            name: "bad".into(),
            meshes: vec![MeshDesc {
                name: "ball".into(),
                shape: Some(Shape::Sphere {
                    center: Vec3::ZERO,
                    radius: 0.0,
                }),
                ..MeshDesc::default()
            }],
        };
        let err = SceneData::resolve(file, &TaggingPolicy::default()).unwrap_err();
        assert!(matches!(err, AssetError::InvalidMesh { name, .. } if name == "ball"));
    }

    #[test]
    fn save_and_reload() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = SceneFile::from_json(SCENE).unwrap();
        file.save(tmp.path()).unwrap();
        let json = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(SceneFile::from_json(&json).unwrap(), file);
    }
}
