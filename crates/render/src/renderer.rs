use glam::Vec3;
use tidewater_assets::Shape;
use tidewater_common::Viewport;
use tidewater_shade::{FragmentInput, Program, Value};
use tidewater_water::SlabFace;

use crate::buffers::SceneBuffers;
use crate::context::SceneContext;
use crate::error::FrameError;
use crate::image::Image;
use crate::raycast;

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads the scene context produced by the uniform-update phase and
/// turns it into output. It never mutates the context.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given context.
    fn render(&mut self, ctx: &SceneContext) -> Result<Self::Output, FrameError>;

    /// Reallocate per-frame resources for a new viewport.
    fn resize(&mut self, _viewport: Viewport) {}
}

const SUN: Vec3 = Vec3::new(0.5, 1.0, 0.5);
const AMBIENT: f32 = 0.35;

/// Reference renderer: ray-cast geometry, then the water and post fields
/// evaluated per pixel on the CPU.
#[derive(Debug, Clone)]
pub struct CpuRenderer {
    buffers: SceneBuffers,
    scratch: Vec<Vec3>,
    depth_scratch: Vec<f32>,
    registers: Vec<Value>,
}

impl CpuRenderer {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            buffers: SceneBuffers::new(viewport),
            scratch: Vec::new(),
            depth_scratch: Vec::new(),
            registers: Vec::new(),
        }
    }

    pub fn buffers(&self) -> &SceneBuffers {
        &self.buffers
    }

    /// Everything before post-processing: geometry, caustics, fog and water.
    ///
    /// The returned buffers are what the composite pass samples.
    pub fn render_scene(&mut self, ctx: &SceneContext) -> Result<&SceneBuffers, FrameError> {
        self.buffers.resize(ctx.viewport());
        self.buffers.clear();
        self.scene_pass(ctx);
        if let Some(program) = ctx.caustics_program() {
            self.caustics_pass(ctx, program);
        }
        self.fog_pass(ctx);
        self.water_pass(ctx)?;
        Ok(&self.buffers)
    }

    fn scene_pass(&mut self, ctx: &SceneContext) {
        let _span = tracing::info_span!("scene_pass").entered();
        let viewport = self.buffers.viewport();
        let camera = ctx.camera();
        let sun = SUN.normalize();
        let meshes: Vec<(&Shape, Vec3)> = ctx
            .scene()
            .visible_meshes()
            .filter_map(|m| m.desc.shape.as_ref().map(|s| (s, m.desc.color())))
            .collect();

        for y in 0..viewport.height {
            for x in 0..viewport.width {
                let i = self.buffers.index(x, y);
                let (origin, dir) = camera.ray_through(viewport.pixel_uv(x, y));
                let nearest = meshes
                    .iter()
                    .filter_map(|(shape, color)| {
                        raycast::intersect(shape, origin, dir).map(|hit| (hit, *color))
                    })
                    .min_by(|a, b| a.0.t.total_cmp(&b.0.t));
                match nearest {
                    Some((hit, color)) => {
                        let point = origin + dir * hit.t;
                        let diffuse = hit.normal.dot(sun).max(0.0);
                        self.buffers.color[i] = color * (AMBIENT + (1.0 - AMBIENT) * diffuse);
                        self.buffers.depth[i] = camera.project_depth(point);
                        self.buffers.position[i] = point;
                        self.buffers.normal[i] = hit.normal;
                        self.buffers.hit[i] = true;
                    }
                    None => self.buffers.color[i] = ctx.environment().background(dir),
                }
            }
        }
    }

    fn caustics_pass(&mut self, ctx: &SceneContext, program: &Program) {
        let _span = tracing::info_span!("caustics_pass").entered();
        let bound = match program.bind(ctx.uniforms()) {
            Ok(bound) => bound,
            Err(err) => {
                tracing::warn!(%err, "caustics skipped for this frame");
                return;
            }
        };
        let viewport = self.buffers.viewport();
        self.scratch.clone_from(&self.buffers.color);
        let sampler = self.buffers.sampler();
        for y in 0..viewport.height {
            for x in 0..viewport.width {
                let i = self.buffers.index(x, y);
                if !self.buffers.hit[i] {
                    continue;
                }
                let fragment = FragmentInput {
                    screen_uv: viewport.pixel_uv(x, y),
                    world_position: self.buffers.position[i],
                    world_normal: self.buffers.normal[i],
                    depth: self.buffers.depth[i],
                };
                self.scratch[i] = bound
                    .evaluate_with(&mut self.registers, &fragment, &sampler)
                    .as_vector();
            }
        }
        std::mem::swap(&mut self.buffers.color, &mut self.scratch);
    }

    fn fog_pass(&mut self, ctx: &SceneContext) {
        if ctx.environment().fog.is_none() {
            return;
        }
        let eye = ctx.camera().position;
        for (i, color) in self.buffers.color.iter_mut().enumerate() {
            if self.buffers.hit[i] {
                let distance = self.buffers.position[i].distance(eye);
                *color = ctx.environment().shade(*color, distance);
            }
        }
    }

    fn water_pass(&mut self, ctx: &SceneContext) -> Result<(), FrameError> {
        let _span = tracing::info_span!("water_pass").entered();
        let bound = ctx.water_program().bind(ctx.uniforms())?;
        let plane = ctx.surface().plane();
        let camera = ctx.camera();
        let viewport = self.buffers.viewport();
        self.scratch.clone_from(&self.buffers.color);
        self.depth_scratch.clone_from(&self.buffers.depth);

        let sampler = self.buffers.sampler();
        let mut covered = 0usize;
        for y in 0..viewport.height {
            for x in 0..viewport.width {
                let i = self.buffers.index(x, y);
                let screen_uv = viewport.pixel_uv(x, y);
                let (origin, dir) = camera.ray_through(screen_uv);
                let Some((t, face)) = plane.intersect(origin, dir) else {
                    continue;
                };
                let world_position = origin + dir * t;
                let depth = camera.project_depth(world_position);
                if depth >= self.buffers.depth[i] {
                    continue;
                }
                let fragment = FragmentInput {
                    screen_uv,
                    world_position,
                    world_normal: match face {
                        SlabFace::Top => Vec3::Y,
                        SlabFace::Bottom => Vec3::NEG_Y,
                    },
                    depth,
                };
                let color = bound
                    .evaluate_with(&mut self.registers, &fragment, &sampler)
                    .as_vector();
                self.scratch[i] = ctx.environment().shade(color, t);
                self.depth_scratch[i] = depth;
                covered += 1;
            }
        }
        std::mem::swap(&mut self.buffers.color, &mut self.scratch);
        std::mem::swap(&mut self.buffers.depth, &mut self.depth_scratch);
        tracing::debug!(covered, "water pass done");
        Ok(())
    }
}

impl Renderer for CpuRenderer {
    type Output = Image;

    fn render(&mut self, ctx: &SceneContext) -> Result<Image, FrameError> {
        let _span = tracing::info_span!("cpu_frame", frame = ctx.frame()).entered();
        self.render_scene(ctx)?;
        let colors = ctx
            .post()
            .composite(ctx.viewport(), ctx.uniforms(), &self.buffers.sampler());
        Ok(Image::from_linear(ctx.viewport(), &colors))
    }

    fn resize(&mut self, viewport: Viewport) {
        self.buffers.resize(viewport);
    }
}

/// Text summary of the frame state, for CLI output, logging and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, ctx: &SceneContext) -> Result<String, FrameError> {
        let camera = ctx.camera();
        let tracker = ctx.tracker();
        let viewport = ctx.viewport();
        let mut out = String::new();
        out.push_str(&format!(
            "=== Scene '{}' (frame={}, t={:.2}) ===\n",
            ctx.scene().name,
            ctx.frame(),
            ctx.elapsed()
        ));
        out.push_str(&format!("Viewport: {}x{}\n", viewport.width, viewport.height));
        out.push_str(&format!(
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}\n",
            camera.position.x,
            camera.position.y,
            camera.position.z,
            camera.target.x,
            camera.target.y,
            camera.target.z,
            camera.fov_degrees
        ));
        out.push_str(&format!(
            "Water: height={:.2} state={} overlay={:.2} transitions={}\n",
            tracker.water_height(),
            tracker.classification(),
            tracker.overlay_opacity(),
            tracker.transitions()
        ));
        match ctx.post().state() {
            tidewater_post::CompositorState::Ready { program, .. } => out.push_str(&format!(
                "Post: enabled ({} instructions)\n",
                program.instructions().len()
            )),
            tidewater_post::CompositorState::Disabled { reason } => {
                out.push_str(&format!("Post: disabled ({reason})\n"))
            }
        }
        out.push_str(&format!(
            "Meshes: {} visible, {} water\n",
            ctx.scene().visible_meshes().count(),
            ctx.scene().water_meshes().count()
        ));
        for mesh in &ctx.scene().meshes {
            out.push_str(&format!(
                "  [{:016x}] {} {:?}{}\n",
                mesh.id.0,
                mesh.desc.name,
                mesh.water,
                if mesh.visible { "" } else { " (hidden)" }
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use tidewater_assets::{SceneData, SceneFile, TaggingPolicy};
    use tidewater_common::CameraState;

    const SEABED: &str = r#"{
        "name": "cove",
        "meshes": [
            {
                "name": "seabed",
                "material": { "name": "sand", "base_color": [0.76, 0.7, 0.5, 1.0] },
                "tag": "solid",
                "shape": { "type": "ground", "height": -2.0 }
            },
            { "name": "lagoon", "tag": "water", "shape": { "type": "ground", "height": 0.0 } }
        ]
    }"#;

    fn context(viewport: Viewport) -> SceneContext {
        let file = SceneFile::from_json(SEABED).unwrap();
        let scene = SceneData::resolve(file, &TaggingPolicy::default()).unwrap();
        let config = SceneConfig {
            viewport,
            ..SceneConfig::default()
        };
        SceneContext::new(scene, &config).unwrap()
    }

    #[test]
    fn water_covers_the_seabed_from_above() {
        let viewport = Viewport::new(16, 9);
        let mut ctx = context(viewport);
        ctx.update(1.0, CameraState::default()).unwrap();
        let mut renderer = CpuRenderer::new(viewport);
        let buffers = renderer.render_scene(&ctx).unwrap();

        let centre = buffers.index(8, 4);
        assert!(buffers.hit[centre]);
        let seabed = ctx.camera().project_depth(buffers.position[centre]);
        assert!(buffers.depth[centre] < seabed);
        assert!(buffers.color.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn hidden_water_mesh_is_not_ray_cast() {
        let viewport = Viewport::new(8, 8);
        let mut ctx = context(viewport);
        // Straight down from above: the seabed, not the tagged lagoon plane, is the geometry hit.
        let camera = CameraState::default()
            .at(glam::Vec3::new(0.0, 5.0, 0.0))
            .looking_at(glam::Vec3::ZERO);
        ctx.update(0.0, camera).unwrap();
        let mut renderer = CpuRenderer::new(viewport);
        let buffers = renderer.render_scene(&ctx).unwrap();
        let i = buffers.index(4, 4);
        assert!((buffers.position[i].y + 2.0).abs() < 1e-3);
    }

    #[test]
    fn image_matches_viewport() {
        let viewport = Viewport::new(12, 6);
        let mut ctx = context(viewport);
        ctx.update(0.5, CameraState::default()).unwrap();
        let image = CpuRenderer::new(viewport).render(&ctx).unwrap();
        assert_eq!((image.width, image.height), (12, 6));
        assert_eq!(image.pixels.len(), 72);
    }

    #[test]
    fn debug_renderer_summarizes_state() {
        let mut ctx = context(Viewport::new(4, 4));
        ctx.update(0.0, CameraState::default().at(glam::Vec3::new(0.0, -1.0, 5.0)))
            .unwrap();
        let out = DebugTextRenderer::new().render(&ctx).unwrap();
        assert!(out.contains("Scene 'cove'"));
        assert!(out.contains("state=below"));
        assert!(out.contains("Meshes: 1 visible, 1 water"));
        assert!(out.contains("(hidden)"));
        assert!(out.contains("Post: enabled"));
    }
}
