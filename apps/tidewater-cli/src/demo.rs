use tidewater_assets::MemoryLoader;

pub const DEMO_ID: &str = "demo";

/// A cove: sandy seabed, a few rocks, a pier, and two water meshes the
/// procedural slab replaces (one tagged, one caught by the colour heuristic).
const DEMO_SCENE: &str = r#"{
    "name": "cove",
    "meshes": [
        {
            "name": "seabed",
            "material": { "name": "sand", "base_color": [0.76, 0.69, 0.5, 1.0] },
            "tag": "solid",
            "vertex_count": 4,
            "index_count": 6,
            "shape": { "type": "ground", "height": -3.0 }
        },
        {
            "name": "boulder",
            "material": { "name": "stone", "base_color": [0.42, 0.4, 0.37, 1.0] },
            "tag": "solid",
            "shape": { "type": "sphere", "center": [-2.5, -2.2, -1.0], "radius": 1.4 }
        },
        {
            "name": "pebble",
            "material": { "name": "stone", "base_color": [0.5, 0.47, 0.42, 1.0] },
            "shape": { "type": "sphere", "center": [1.8, -2.7, 1.5], "radius": 0.5 }
        },
        {
            "name": "pier_post",
            "material": { "name": "wood", "base_color": [0.45, 0.3, 0.18, 1.0] },
            "tag": "solid",
            "shape": { "type": "box", "center": [3.0, -0.5, -2.0], "half_extents": [0.3, 2.5, 0.3] }
        },
        { "name": "lagoon", "tag": "water", "shape": { "type": "ground", "height": 0.0 } },
        {
            "name": "tide_pool",
            "material": { "name": "pool", "base_color": [0.1, 0.35, 0.85, 1.0] },
            "shape": { "type": "box", "center": [-4.0, -0.2, 3.0], "half_extents": [1.0, 0.2, 1.0] }
        }
    ]
}"#;

pub fn demo_loader() -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    loader.insert(DEMO_ID, DEMO_SCENE);
    loader
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_assets::load_scene;

    #[test]
    fn demo_scene_hides_its_water() {
        let scene = load_scene(&demo_loader(), DEMO_ID).unwrap();
        assert_eq!(scene.meshes.len(), 6);
        assert_eq!(scene.water_meshes().count(), 2);
        assert_eq!(scene.visible_meshes().count(), 4);
    }
}
