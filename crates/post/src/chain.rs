//! Ordered render passes and their validation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CompositorError;

pub const MAX_BLUR_TAPS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    SceneColor,
    SceneDepth,
    DirectionalBlur,
    Vignette,
    /// Terminal pass producing the presented image.
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPass {
    pub name: String,
    pub kind: PassKind,
    /// Names of earlier passes whose outputs this pass reads.
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl RenderPass {
    pub fn new(name: impl Into<String>, kind: PassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
        }
    }

    pub fn reading(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassChain {
    passes: Vec<RenderPass>,
}

impl PassChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pass: RenderPass) -> Self {
        self.passes.push(pass);
        self
    }

    /// Color, depth, depth-driven blur and vignette feeding one composite.
    pub fn underwater() -> Self {
        Self::new()
            .with(RenderPass::new("color", PassKind::SceneColor))
            .with(RenderPass::new("depth", PassKind::SceneDepth))
            .with(RenderPass::new("blur", PassKind::DirectionalBlur).reading(&["color", "depth"]))
            .with(RenderPass::new("vignette", PassKind::Vignette))
            .with(
                RenderPass::new("composite", PassKind::Composite)
                    .reading(&["color", "blur", "vignette"]),
            )
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn contains(&self, kind: PassKind) -> bool {
        self.passes.iter().any(|p| p.kind == kind)
    }

    /// Whether the composite pass reads a pass of `kind`, directly or through its inputs.
    pub fn composite_reads(&self, kind: PassKind) -> bool {
        let Some(composite) = self.passes.iter().find(|p| p.kind == PassKind::Composite) else {
            return false;
        };
        let by_name: HashMap<&str, &RenderPass> =
            self.passes.iter().map(|p| (p.name.as_str(), p)).collect();
        let mut pending: Vec<&str> = composite.inputs.iter().map(String::as_str).collect();
        let mut seen = Vec::new();
        while let Some(name) = pending.pop() {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if let Some(pass) = by_name.get(name) {
                if pass.kind == kind {
                    return true;
                }
                pending.extend(pass.inputs.iter().map(String::as_str));
            }
        }
        false
    }

    pub fn validate(&self) -> Result<(), CompositorError> {
        let last = self.passes.last().ok_or(CompositorError::EmptyChain)?;
        let mut kinds: HashMap<&str, PassKind> = HashMap::new();
        let mut composites = 0;
        for pass in &self.passes {
            for input in &pass.inputs {
                if !kinds.contains_key(input.as_str()) {
                    return Err(CompositorError::UnknownInput {
                        pass: pass.name.clone(),
                        input: input.clone(),
                    });
                }
            }
            let reads = |kind: PassKind| {
                pass.inputs
                    .iter()
                    .any(|i| kinds.get(i.as_str()) == Some(&kind))
            };
            match pass.kind {
                PassKind::DirectionalBlur => {
                    if !reads(PassKind::SceneDepth) {
                        return Err(CompositorError::BlurWithoutDepth(pass.name.clone()));
                    }
                    if !reads(PassKind::SceneColor) {
                        return Err(CompositorError::MissingColorInput(pass.name.clone()));
                    }
                }
                PassKind::Composite => {
                    composites += 1;
                    if !reads(PassKind::SceneColor) {
                        return Err(CompositorError::MissingColorInput(pass.name.clone()));
                    }
                }
                _ => {}
            }
            if kinds.insert(pass.name.as_str(), pass.kind).is_some() {
                return Err(CompositorError::DuplicatePass(pass.name.clone()));
            }
        }
        match composites {
            0 => Err(CompositorError::MissingComposite),
            1 if last.kind == PassKind::Composite => Ok(()),
            1 => {
                let composite = self
                    .passes
                    .iter()
                    .find(|p| p.kind == PassKind::Composite)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                Err(CompositorError::CompositeNotTerminal(composite))
            }
            _ => Err(CompositorError::MultipleComposites),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underwater_chain_is_valid() {
        let chain = PassChain::underwater();
        assert_eq!(chain.validate(), Ok(()));
        assert!(chain.composite_reads(PassKind::DirectionalBlur));
        assert!(chain.composite_reads(PassKind::SceneDepth));
        assert!(chain.composite_reads(PassKind::Vignette));
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert_eq!(PassChain::new().validate(), Err(CompositorError::EmptyChain));
    }

    #[test]
    fn inputs_must_name_earlier_passes() {
        let chain = PassChain::new()
            .with(RenderPass::new("blur", PassKind::DirectionalBlur).reading(&["color", "depth"]))
            .with(RenderPass::new("color", PassKind::SceneColor));
        assert!(matches!(
            chain.validate(),
            Err(CompositorError::UnknownInput { pass, input }) if pass == "blur" && input == "color"
        ));
    }

    #[test]
    fn blur_requires_depth() {
        let chain = PassChain::new()
            .with(RenderPass::new("color", PassKind::SceneColor))
            .with(RenderPass::new("blur", PassKind::DirectionalBlur).reading(&["color"]))
            .with(RenderPass::new("out", PassKind::Composite).reading(&["color", "blur"]));
        assert_eq!(
            chain.validate(),
            Err(CompositorError::BlurWithoutDepth("blur".into()))
        );
    }

    #[test]
    fn composite_must_be_single_and_last() {
        let missing = PassChain::new().with(RenderPass::new("color", PassKind::SceneColor));
        assert_eq!(missing.validate(), Err(CompositorError::MissingComposite));

        let not_last = PassChain::new()
            .with(RenderPass::new("color", PassKind::SceneColor))
            .with(RenderPass::new("out", PassKind::Composite).reading(&["color"]))
            .with(RenderPass::new("vignette", PassKind::Vignette));
        assert_eq!(
            not_last.validate(),
            Err(CompositorError::CompositeNotTerminal("out".into()))
        );

        let twice = PassChain::new()
            .with(RenderPass::new("color", PassKind::SceneColor))
            .with(RenderPass::new("a", PassKind::Composite).reading(&["color"]))
            .with(RenderPass::new("b", PassKind::Composite).reading(&["color"]));
        assert_eq!(twice.validate(), Err(CompositorError::MultipleComposites));
    }

    #[test]
    fn composite_needs_scene_color_and_names_are_unique() {
        let no_color = PassChain::new()
            .with(RenderPass::new("vignette", PassKind::Vignette))
            .with(RenderPass::new("out", PassKind::Composite).reading(&["vignette"]));
        assert_eq!(
            no_color.validate(),
            Err(CompositorError::MissingColorInput("out".into()))
        );

        let duplicate = PassChain::new()
            .with(RenderPass::new("color", PassKind::SceneColor))
            .with(RenderPass::new("color", PassKind::SceneDepth))
            .with(RenderPass::new("out", PassKind::Composite).reading(&["color"]));
        assert_eq!(
            duplicate.validate(),
            Err(CompositorError::DuplicatePass("color".into()))
        );
    }

    #[test]
    fn chain_round_trips_through_json() {
        let json = serde_json::to_string(&PassChain::underwater()).unwrap();
        let back: PassChain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PassChain::underwater());
        assert!(json.contains("\"directional_blur\""));
    }
}
