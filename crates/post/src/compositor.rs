//! The terminal full-screen composite.
//!
//! The whole pass chain is folded into a single field so each frame costs
//! exactly one full-screen evaluation. If the chain or its field cannot be
//! built the compositor disables itself and frames present the scene color
//! unchanged.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tidewater_common::Viewport;
use tidewater_shade::{
    Field, FragmentInput, Program, TextureSampler, UniformSet, compile, emit_wgsl, hex_color,
    uniform,
};

use crate::chain::{MAX_BLUR_TAPS, PassChain, PassKind};
use crate::effects;
use crate::error::CompositorError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostConfig {
    pub blur_taps: u32,
    /// Blur direction in UV space.
    pub blur_direction: Vec2,
    /// Outermost tap offset, in UV units, while submerged.
    pub underwater_strength: f32,
    /// Outermost tap offset above water; only used with `blur_above`.
    pub above_strength: f32,
    pub blur_above: bool,
    /// Linear-depth band over which the blur ramps in.
    pub blur_depth_band: (f32, f32),
    pub vignette_k: f32,
    pub tint: u32,
    pub water_mask: bool,
    pub mask_color: u32,
    pub mask_depth_band: (f32, f32),
    /// Fade the underwater look in with the smoothed overlay opacity.
    pub use_overlay: bool,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            blur_taps: 8,
            blur_direction: Vec2::Y,
            underwater_strength: 0.01,
            above_strength: 0.0,
            blur_above: false,
            blur_depth_band: (0.0, 0.05),
            vignette_k: 1.2,
            tint: 0x74ccf4,
            water_mask: false,
            mask_color: 0x0487e2,
            mask_depth_band: (0.15, 0.3),
            use_overlay: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CompositorState {
    Ready { output: Field, program: Program },
    Disabled { reason: String },
}

#[derive(Debug, Clone)]
pub struct PostCompositor {
    chain: PassChain,
    config: PostConfig,
    state: CompositorState,
}

impl PostCompositor {
    /// Build the compositor, disabling it instead of failing.
    pub fn new(chain: PassChain, config: PostConfig) -> Self {
        let state = match build_output(&chain, &config) {
            Ok((output, program)) => CompositorState::Ready { output, program },
            Err(err) => {
                tracing::warn!(%err, "post-processing disabled, presenting scene color");
                CompositorState::Disabled {
                    reason: err.to_string(),
                }
            }
        };
        Self {
            chain,
            config,
            state,
        }
    }

    /// Build the compositor, returning the construction error.
    pub fn try_new(chain: PassChain, config: PostConfig) -> Result<Self, CompositorError> {
        let (output, program) = build_output(&chain, &config)?;
        Ok(Self {
            chain,
            config,
            state: CompositorState::Ready { output, program },
        })
    }

    pub fn chain(&self) -> &PassChain {
        &self.chain
    }

    pub fn config(&self) -> &PostConfig {
        &self.config
    }

    pub fn state(&self) -> &CompositorState {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, CompositorState::Ready { .. })
    }

    pub fn output(&self) -> Option<&Field> {
        match &self.state {
            CompositorState::Ready { output, .. } => Some(output),
            CompositorState::Disabled { .. } => None,
        }
    }

    pub fn program(&self) -> Option<&Program> {
        match &self.state {
            CompositorState::Ready { program, .. } => Some(program),
            CompositorState::Disabled { .. } => None,
        }
    }

    pub fn wgsl(&self) -> Option<String> {
        self.program().map(emit_wgsl)
    }

    /// One full-screen evaluation over `viewport`, row-major.
    ///
    /// Falls back to the sampled scene color when disabled or when the frame's
    /// uniforms do not satisfy the program.
    pub fn composite(
        &self,
        viewport: Viewport,
        uniforms: &UniformSet,
        textures: &dyn TextureSampler,
    ) -> Vec<Vec3> {
        let _span = tracing::info_span!("post_composite", enabled = self.is_enabled()).entered();
        let bound = match self.program().map(|p| p.bind(uniforms)) {
            Some(Ok(bound)) => Some(bound),
            Some(Err(err)) => {
                tracing::warn!(%err, "composite skipped for this frame");
                None
            }
            None => None,
        };

        let mut registers = Vec::new();
        let mut out = Vec::with_capacity(viewport.pixel_count());
        for y in 0..viewport.height {
            for x in 0..viewport.width {
                let uv = viewport.pixel_uv(x, y);
                let color = match &bound {
                    Some(bound) => bound
                        .evaluate_with(&mut registers, &FragmentInput::screen(uv), textures)
                        .as_vector(),
                    None => textures.scene_color(uv),
                };
                out.push(color);
            }
        }
        out
    }
}

fn build_output(
    chain: &PassChain,
    config: &PostConfig,
) -> Result<(Field, Program), CompositorError> {
    chain.validate()?;
    if config.blur_taps == 0 || config.blur_taps > MAX_BLUR_TAPS {
        return Err(CompositorError::InvalidTaps(config.blur_taps));
    }

    let underwater = uniform::underwater();
    let color = Field::screen_uv().sample_scene_color()?;

    let blurred = if chain.composite_reads(PassKind::DirectionalBlur) {
        let strength = if config.blur_above {
            underwater.select(config.underwater_strength, config.above_strength)?
        } else {
            Field::scalar(config.underwater_strength)
        };
        let ramp = effects::linear_scene_depth()?
            .remap_clamp(config.blur_depth_band.0, config.blur_depth_band.1)?;
        let spread = strength.mul(ramp)?;
        effects::directional_blur(config.blur_taps, config.blur_direction, &spread)?
    } else {
        color.clone()
    };

    let vignette = if chain.composite_reads(PassKind::Vignette) {
        effects::vignette(config.vignette_k)?
    } else {
        Field::scalar(1.0)
    };

    let mut submerged = blurred.mul(Field::color(config.tint))?.mul(vignette)?;
    if config.water_mask {
        let mask = effects::water_mask(config.mask_depth_band)?;
        submerged = submerged
            .mul(mask.one_minus()?)?
            .add(Field::color(config.mask_color).mul(&mask)?)?;
    }
    let surface = if config.blur_above { blurred } else { color };
    if config.use_overlay {
        submerged = surface.mix(&submerged, uniform::overlay_opacity())?;
    }
    let output = underwater.select(submerged, surface)?;
    let program = compile(&output)?;
    tracing::debug!(
        instructions = program.instructions().len(),
        blur = chain.composite_reads(PassKind::DirectionalBlur),
        tint = ?hex_color(config.tint),
        "built post-process composite"
    );
    Ok((output, program))
}
