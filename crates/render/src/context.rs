//! Host-owned per-scene state.
//!
//! Everything the frame needs lives here and is passed explicitly; fields and
//! programs are built once in [`SceneContext::new`] and only uniform values
//! change afterwards, in [`SceneContext::update`].

use tidewater_assets::SceneData;
use tidewater_common::{CameraState, Viewport};
use tidewater_post::PostCompositor;
use tidewater_shade::{Field, Program, UniformSet, compile, uniform};
use tidewater_underwater::{Environment, TrackerUpdate, UnderwaterTracker};
use tidewater_water::{
    DepthCompositor, WaterShading, WaterSurface, project_caustics_or_plain,
};

use crate::config::SceneConfig;
use crate::error::FrameError;

#[derive(Debug, Clone)]
pub struct SceneContext {
    config: SceneConfig,
    scene: SceneData,
    surface: WaterSurface,
    shading: WaterShading,
    water: Program,
    caustics: Option<Program>,
    post: PostCompositor,
    tracker: UnderwaterTracker,
    environment: Environment,
    camera: CameraState,
    viewport: Viewport,
    uniforms: UniformSet,
    elapsed: f32,
    frame: u64,
}

impl SceneContext {
    pub fn new(scene: SceneData, config: &SceneConfig) -> Result<Self, FrameError> {
        let _span = tracing::info_span!("scene_setup", scene = %scene.name).entered();
        let surface = WaterSurface::from_config(config.water.clone())?;
        let shading = DepthCompositor::from_config(&config.water).build(&surface)?;
        let water = compile(&shading.output)?;

        let caustics = if config.caustics {
            let base = Field::screen_uv().sample_scene_color()?;
            compile_caustics(&project_caustics_or_plain(&surface, &base))
        } else {
            None
        };

        let post = PostCompositor::new(config.passes.clone(), config.post);
        let tracker = UnderwaterTracker::new(surface.plane().height(), config.overlay);
        let environment = Environment::for_state(tracker.classification(), &config.environment);

        tracing::info!(
            water_height = surface.plane().height(),
            caustics = caustics.is_some(),
            post = post.is_enabled(),
            "scene context ready"
        );
        let mut context = Self {
            config: config.clone(),
            scene,
            surface,
            shading,
            water,
            caustics,
            post,
            tracker,
            environment,
            camera: config.camera,
            viewport: config.viewport,
            uniforms: UniformSet::new(),
            elapsed: 0.0,
            frame: 0,
        };
        context.write_uniforms()?;
        Ok(context)
    }

    /// The uniform-update phase: advance the underwater state and publish this
    /// frame's values. Nothing else mutates between presents.
    pub fn update(
        &mut self,
        elapsed: f32,
        mut camera: CameraState,
    ) -> Result<TrackerUpdate, FrameError> {
        if let Some(aspect) = self.viewport.aspect() {
            camera.aspect = aspect;
        }
        validate_camera(&camera)?;

        let dt = elapsed - self.elapsed;
        let update = self.tracker.update(camera.height(), dt);
        self.environment = Environment::for_state(update.classification, &self.config.environment);

        self.camera = camera;
        self.elapsed = elapsed;
        self.frame += 1;
        self.write_uniforms()?;
        tracing::debug!(
            frame = self.frame,
            elapsed,
            camera_height = camera.height(),
            classification = %update.classification,
            "uniforms updated"
        );
        Ok(update)
    }

    fn write_uniforms(&mut self) -> Result<(), FrameError> {
        self.uniforms.set(uniform::TIME, self.elapsed)?;
        self.uniforms.set(uniform::CAMERA_HEIGHT, self.camera.height())?;
        self.uniforms.set(uniform::CAMERA_NEAR, self.camera.near)?;
        self.uniforms.set(uniform::CAMERA_FAR, self.camera.far)?;
        self.tracker.write_uniforms(&mut self.uniforms)?;
        Ok(())
    }

    /// Adopt a new viewport. Zero-sized viewports are ignored.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        let Some(aspect) = viewport.aspect() else {
            tracing::warn!(
                width = viewport.width,
                height = viewport.height,
                "ignoring zero-sized viewport"
            );
            return false;
        };
        self.viewport = viewport;
        self.camera.aspect = aspect;
        true
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneData {
        &self.scene
    }

    pub fn surface(&self) -> &WaterSurface {
        &self.surface
    }

    pub fn shading(&self) -> &WaterShading {
        &self.shading
    }

    pub fn water_program(&self) -> &Program {
        &self.water
    }

    pub fn caustics_program(&self) -> Option<&Program> {
        self.caustics.as_ref()
    }

    pub fn post(&self) -> &PostCompositor {
        &self.post
    }

    pub fn tracker(&self) -> &UnderwaterTracker {
        &self.tracker
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Caustics are optional shading; a program that fails to compile is dropped.
fn compile_caustics(field: &Field) -> Option<Program> {
    match compile(field) {
        Ok(program) => Some(program),
        Err(err) => {
            tracing::warn!(%err, "caustics disabled, shading without them");
            None
        }
    }
}

fn validate_camera(camera: &CameraState) -> Result<(), FrameError> {
    let finite = camera.position.is_finite()
        && camera.target.is_finite()
        && camera.fov_degrees.is_finite()
        && camera.near.is_finite()
        && camera.far.is_finite();
    if !finite {
        return Err(FrameError::InvalidCamera("non-finite camera state".into()));
    }
    if camera.near <= 0.0 || camera.far <= camera.near {
        return Err(FrameError::InvalidCamera(format!(
            "clip planes near={} far={}",
            camera.near, camera.far
        )));
    }
    if camera.fov_degrees <= 0.0 || camera.fov_degrees >= 180.0 {
        return Err(FrameError::InvalidCamera(format!(
            "field of view {}",
            camera.fov_degrees
        )));
    }
    Ok(())
}
