use glam::Vec3;
use tidewater_common::Viewport;
use tidewater_shade::BufferSampler;

/// Full-screen buffers written by the scene pass and read by later passes.
///
/// Row-major, one entry per pixel. Pixels without geometry keep `hit == false`
/// and a depth of 1.
#[derive(Debug, Clone)]
pub struct SceneBuffers {
    viewport: Viewport,
    pub color: Vec<Vec3>,
    pub depth: Vec<f32>,
    pub position: Vec<Vec3>,
    pub normal: Vec<Vec3>,
    pub hit: Vec<bool>,
}

impl SceneBuffers {
    pub fn new(viewport: Viewport) -> Self {
        let mut buffers = Self {
            viewport,
            color: Vec::new(),
            depth: Vec::new(),
            position: Vec::new(),
            normal: Vec::new(),
            hit: Vec::new(),
        };
        buffers.clear();
        buffers
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Reallocate for a new size. Returns `false` if the size is unchanged.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.clear();
        true
    }

    pub fn clear(&mut self) {
        let n = self.viewport.pixel_count();
        self.color.clear();
        self.color.resize(n, Vec3::ZERO);
        self.depth.clear();
        self.depth.resize(n, 1.0);
        self.position.clear();
        self.position.resize(n, Vec3::ZERO);
        self.normal.clear();
        self.normal.resize(n, Vec3::Y);
        self.hit.clear();
        self.hit.resize(n, false);
    }

    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.viewport.width as usize + x as usize
    }

    pub fn sampler(&self) -> BufferSampler<'_> {
        BufferSampler {
            width: self.viewport.width,
            height: self.viewport.height,
            color: &self.color,
            depth: &self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use tidewater_shade::TextureSampler;

    #[test]
    fn resize_reallocates_and_clears() {
        let mut buffers = SceneBuffers::new(Viewport::new(4, 2));
        assert_eq!(buffers.color.len(), 8);
        buffers.color[3] = Vec3::ONE;
        assert!(!buffers.resize(Viewport::new(4, 2)));
        assert_eq!(buffers.color[3], Vec3::ONE);
        assert!(buffers.resize(Viewport::new(3, 3)));
        assert_eq!(buffers.depth, vec![1.0; 9]);
        assert!(buffers.hit.iter().all(|h| !h));
    }

    #[test]
    fn sampler_reads_pixel_under_uv() {
        let viewport = Viewport::new(4, 2);
        let mut buffers = SceneBuffers::new(viewport);
        let i = buffers.index(2, 1);
        buffers.color[i] = Vec3::X;
        buffers.depth[i] = 0.25;
        let sampler = buffers.sampler();
        assert_eq!(sampler.scene_color(viewport.pixel_uv(2, 1)), Vec3::X);
        assert_eq!(sampler.scene_depth(viewport.pixel_uv(2, 1)), 0.25);
        assert_eq!(sampler.scene_depth(Vec2::ZERO), 1.0);
    }
}
