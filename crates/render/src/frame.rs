//! The host frame tick.
//!
//! `FrameLoop` gates presentation on asset loading and routes the three
//! per-frame calls (`update`, `present_frame`, `on_resize`) to the scene
//! context and the renderer.

use tidewater_assets::{AssetLoader, LoadEvent, SceneData};
use tidewater_common::{CameraState, Viewport};
use tidewater_underwater::TrackerUpdate;

use crate::config::SceneConfig;
use crate::context::SceneContext;
use crate::error::FrameError;
use crate::renderer::{CpuRenderer, Renderer};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading { progress: f32 },
    Ready,
    Failed { reason: String },
}

pub struct FrameLoop<R: Renderer = CpuRenderer> {
    config: SceneConfig,
    renderer: R,
    state: LoadState,
    context: Option<SceneContext>,
}

impl FrameLoop<CpuRenderer> {
    /// A loop presenting through the CPU reference renderer.
    pub fn cpu(config: SceneConfig) -> Self {
        let renderer = CpuRenderer::new(config.viewport);
        Self::new(config, renderer)
    }
}

impl<R: Renderer> FrameLoop<R> {
    pub fn new(config: SceneConfig, renderer: R) -> Self {
        Self {
            config,
            renderer,
            state: LoadState::Loading { progress: 0.0 },
            context: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&SceneContext> {
        self.context.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Drive a load to completion, feeding every event through
    /// [`handle_load_event`](Self::handle_load_event).
    pub fn load(&mut self, loader: &dyn AssetLoader, identifier: &str) -> Result<(), FrameError> {
        let mut events = Vec::new();
        loader.load(identifier, &mut |event| events.push(event));
        for event in events {
            self.handle_load_event(event)?;
        }
        match &self.state {
            LoadState::Ready => Ok(()),
            LoadState::Loading { .. } => Err(FrameError::NotReady(format!(
                "loader finished '{identifier}' without a result"
            ))),
            LoadState::Failed { reason } => Err(FrameError::NotReady(reason.clone())),
        }
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) -> Result<(), FrameError> {
        match event {
            LoadEvent::Progress(p) => {
                if let LoadState::Loading { progress } = &mut self.state {
                    *progress = p.clamp(0.0, 1.0).max(*progress);
                    tracing::debug!(progress = *progress, "loading scene");
                }
                Ok(())
            }
            LoadEvent::Success(scene) => self.initialize(scene),
            LoadEvent::Failure(err) => {
                tracing::warn!(%err, "scene load failed");
                self.state = LoadState::Failed {
                    reason: err.to_string(),
                };
                self.context = None;
                Ok(())
            }
        }
    }

    /// Build the scene context. Fields and programs are fixed from here on.
    pub fn initialize(&mut self, scene: SceneData) -> Result<(), FrameError> {
        match SceneContext::new(scene, &self.config) {
            Ok(context) => {
                self.renderer.resize(context.viewport());
                self.context = Some(context);
                self.state = LoadState::Ready;
                Ok(())
            }
            Err(err) => {
                self.state = LoadState::Failed {
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Uniform-update phase for one frame.
    pub fn update(
        &mut self,
        elapsed: f32,
        camera: CameraState,
    ) -> Result<TrackerUpdate, FrameError> {
        ready_mut(&self.state, self.context.as_mut())?.update(elapsed, camera)
    }

    pub fn present_frame(&mut self) -> Result<R::Output, FrameError> {
        let context = ready(&self.state, self.context.as_ref())?;
        let _span = tracing::info_span!("present_frame", frame = context.frame()).entered();
        self.renderer.render(context)
    }

    /// Returns `false` (and changes nothing) for a zero-sized viewport.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        let viewport = Viewport::new(width, height);
        if viewport.is_empty() {
            tracing::warn!(width, height, "skipping resize to an empty viewport");
            return false;
        }
        self.config.viewport = viewport;
        if let Some(context) = &mut self.context {
            context.resize(viewport);
        }
        self.renderer.resize(viewport);
        tracing::debug!(width, height, "viewport resized");
        true
    }
}

fn not_ready(state: &LoadState) -> FrameError {
    match state {
        LoadState::Loading { progress } => {
            FrameError::NotReady(format!("scene loading ({:.0}%)", progress * 100.0))
        }
        LoadState::Failed { reason } => FrameError::NotReady(format!("scene failed: {reason}")),
        LoadState::Ready => FrameError::NotReady("scene context missing".into()),
    }
}

fn ready<'a>(
    state: &LoadState,
    context: Option<&'a SceneContext>,
) -> Result<&'a SceneContext, FrameError> {
    match (state, context) {
        (LoadState::Ready, Some(context)) => Ok(context),
        _ => Err(not_ready(state)),
    }
}

fn ready_mut<'a>(
    state: &LoadState,
    context: Option<&'a mut SceneContext>,
) -> Result<&'a mut SceneContext, FrameError> {
    match (state, context) {
        (LoadState::Ready, Some(context)) => Ok(context),
        _ => Err(not_ready(state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use glam::Vec3;
    use tidewater_assets::{AssetError, MemoryLoader, SceneFile};
    use tidewater_underwater::Classification;

    const COVE: &str = r#"{
        "name": "cove",
        "meshes": [
            {
                "name": "seabed",
                "material": { "name": "sand", "base_color": [0.76, 0.7, 0.5, 1.0] },
                "shape": { "type": "ground", "height": -2.0 }
            },
            {
                "name": "rock",
                "material": { "name": "stone", "base_color": [0.4, 0.4, 0.38, 1.0] },
                "shape": { "type": "sphere", "center": [1.0, -1.5, 0.0], "radius": 1.0 }
            }
        ]
    }"#;

    fn config() -> SceneConfig {
        SceneConfig {
            viewport: Viewport::new(24, 12),
            ..SceneConfig::default()
        }
    }

    fn ready_loop() -> FrameLoop {
        let mut frame_loop = FrameLoop::cpu(config());
        let mut loader = MemoryLoader::new();
        loader.insert("cove", COVE);
        frame_loop.load(&loader, "cove").unwrap();
        frame_loop
    }

    #[test]
    fn presenting_before_load_is_not_ready() {
        let mut frame_loop = FrameLoop::cpu(config());
        frame_loop.handle_load_event(LoadEvent::Progress(0.4)).unwrap();
        assert_eq!(frame_loop.state(), &LoadState::Loading { progress: 0.4 });
        assert!(matches!(frame_loop.present_frame(), Err(FrameError::NotReady(_))));
        assert!(matches!(
            frame_loop.update(0.0, CameraState::default()),
            Err(FrameError::NotReady(_))
        ));
    }

    #[test]
    fn failed_load_halts_the_loop() {
        let mut frame_loop = FrameLoop::cpu(config());
        frame_loop
            .handle_load_event(LoadEvent::Failure(AssetError::NotFound("cove".into())))
            .unwrap();
        assert!(matches!(frame_loop.state(), LoadState::Failed { .. }));
        assert!(frame_loop.present_frame().is_err());

        let loader = MemoryLoader::new();
        let mut frame_loop = FrameLoop::cpu(config());
        assert!(frame_loop.load(&loader, "missing").is_err());
        assert!(frame_loop.context().is_none());
    }

    #[test]
    fn camera_above_water_presents_the_scene_unchanged() {
        let mut frame_loop = ready_loop();
        let update = frame_loop.update(1.0, CameraState::default()).unwrap();
        assert_eq!(update.classification, Classification::Above);
        assert_eq!(update.overlay_opacity, 0.0);

        let image = frame_loop.present_frame().unwrap();
        let viewport = frame_loop.context().unwrap().viewport();
        let scene = Image::from_linear(viewport, &frame_loop.renderer().buffers().color);
        assert_eq!(image, scene);
    }

    #[test]
    fn camera_below_water_tints_and_raises_the_overlay() {
        let mut frame_loop = ready_loop();
        let camera = CameraState::default()
            .at(Vec3::new(0.0, -1.0, 6.0))
            .looking_at(Vec3::new(0.0, -1.0, 0.0));

        let first = frame_loop.update(0.1, camera).unwrap();
        assert_eq!(first.classification, Classification::Below);
        let image = frame_loop.present_frame().unwrap();
        let viewport = frame_loop.context().unwrap().viewport();
        let scene = Image::from_linear(viewport, &frame_loop.renderer().buffers().color);
        assert_ne!(image, scene);

        let second = frame_loop.update(0.2, camera).unwrap();
        assert!(second.overlay_opacity > first.overlay_opacity);
        assert!(second.overlay_opacity <= 0.95);
    }

    #[test]
    fn crossing_the_surface_counts_one_transition() {
        let mut frame_loop = ready_loop();
        let above = CameraState::default();
        let below = CameraState::default().at(Vec3::new(0.0, -0.5, 10.0));
        frame_loop.update(0.0, above).unwrap();
        let update = frame_loop.update(0.016, below).unwrap();
        assert!(update.changed);
        frame_loop.update(0.032, below).unwrap();
        assert_eq!(frame_loop.context().unwrap().tracker().transitions(), 1);
    }

    #[test]
    fn zero_sized_resize_is_skipped() {
        let mut frame_loop = ready_loop();
        assert!(!frame_loop.on_resize(0, 480));
        assert!(!frame_loop.on_resize(640, 0));
        let ctx = frame_loop.context().unwrap();
        assert_eq!(ctx.viewport(), Viewport::new(24, 12));
        assert!(ctx.camera().aspect.is_finite());

        assert!(frame_loop.on_resize(10, 5));
        frame_loop.update(0.0, CameraState::default()).unwrap();
        let image = frame_loop.present_frame().unwrap();
        assert_eq!((image.width, image.height), (10, 5));
        assert_eq!(frame_loop.context().unwrap().camera().aspect, 2.0);
    }

    #[test]
    fn scenes_can_be_initialized_directly() {
        let mut frame_loop = FrameLoop::cpu(config());
        let file = SceneFile::from_json(COVE).unwrap();
        let scene = SceneData::resolve(file, &config().tagging).unwrap();
        frame_loop.initialize(scene).unwrap();
        assert_eq!(frame_loop.state(), &LoadState::Ready);
    }
}
