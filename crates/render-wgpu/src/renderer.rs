use tidewater_common::Viewport;
use tidewater_render::{CpuRenderer, FrameError, Image, Renderer, SceneContext};

use crate::device::GpuContext;
use crate::error::GpuError;
use crate::pipeline::FieldPipeline;

enum PostPipeline {
    Unbuilt,
    Ready(FieldPipeline),
    Failed(String),
}

/// Scene passes on the CPU, post-process composite on the GPU.
///
/// The composite pipeline is built on the first frame. If the device rejects
/// it, or a frame fails on the GPU, the CPU composite presents instead.
pub struct GpuRenderer {
    gpu: GpuContext,
    cpu: CpuRenderer,
    post: PostPipeline,
    fallback_frames: u64,
}

impl GpuRenderer {
    pub fn new(gpu: GpuContext, viewport: Viewport) -> Self {
        Self {
            gpu,
            cpu: CpuRenderer::new(viewport),
            post: PostPipeline::Unbuilt,
            fallback_frames: 0,
        }
    }

    pub fn headless(viewport: Viewport) -> Result<Self, GpuError> {
        Ok(Self::new(GpuContext::headless()?, viewport))
    }

    pub fn adapter_name(&self) -> &str {
        &self.gpu.adapter_name
    }

    /// Whether the composite currently runs on the GPU.
    pub fn is_accelerated(&self) -> bool {
        matches!(self.post, PostPipeline::Ready(_))
    }

    /// Why the GPU composite is unavailable, if it is.
    pub fn disabled_reason(&self) -> Option<&str> {
        match &self.post {
            PostPipeline::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn fallback_frames(&self) -> u64 {
        self.fallback_frames
    }

    fn ensure_pipeline(&mut self, ctx: &SceneContext) {
        if !matches!(self.post, PostPipeline::Unbuilt) {
            return;
        }
        self.post = match ctx.post().program() {
            Some(program) => match FieldPipeline::new(&self.gpu.device, program, "post_composite") {
                Ok(pipeline) => PostPipeline::Ready(pipeline),
                Err(err) => {
                    tracing::warn!(%err, "GPU composite disabled, compositing on the CPU");
                    PostPipeline::Failed(err.to_string())
                }
            },
            None => PostPipeline::Failed("post-processing disabled".into()),
        };
    }
}

impl Renderer for GpuRenderer {
    type Output = Image;

    fn render(&mut self, ctx: &SceneContext) -> Result<Image, FrameError> {
        let _span = tracing::info_span!("gpu_frame", frame = ctx.frame()).entered();
        self.cpu.render_scene(ctx)?;
        self.ensure_pipeline(ctx);

        let viewport = ctx.viewport();
        if let PostPipeline::Ready(pipeline) = &self.post {
            let buffers = self.cpu.buffers();
            match pipeline.run(
                &self.gpu,
                viewport,
                ctx.uniforms(),
                &buffers.color,
                &buffers.depth,
            ) {
                Ok(pixels) => {
                    return Ok(Image {
                        width: viewport.width,
                        height: viewport.height,
                        pixels,
                    });
                }
                Err(err) => {
                    tracing::warn!(%err, "GPU composite failed, compositing on the CPU");
                    self.fallback_frames += 1;
                }
            }
        }

        let colors = ctx
            .post()
            .composite(viewport, ctx.uniforms(), &self.cpu.buffers().sampler());
        Ok(Image::from_linear(viewport, &colors))
    }

    fn resize(&mut self, viewport: Viewport) {
        self.cpu.resize(viewport);
    }
}
