//! Serialized graph descriptions.
//!
//! A [`GraphDesc`] names its nodes and wires them by id, so unlike a graph
//! built through [`Field`] operators it can describe a cycle. Building a field
//! from it runs a depth-first walk that rejects cycles, dangling references and
//! duplicate ids before any node is created.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::field::{Field, FieldType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NodeKind {
    Scalar { value: f32 },
    Vector { value: [f32; 3] },
    Color { hex: u32 },
    Boolean { value: bool },
    Uniform { name: String, ty: FieldType },
    ScreenUv,
    WorldPosition,
    WorldNormal,
    FragmentDepth,
    Add { a: String, b: String },
    Sub { a: String, b: String },
    Mul { a: String, b: String },
    Div { a: String, b: String },
    Pow { a: String, b: String },
    Distance { a: String, b: String },
    Mix { a: String, b: String, t: String },
    Saturate { x: String },
    OneMinus { x: String },
    Normalize { x: String },
    RemapClamp { x: String, lo: f32, hi: f32 },
    Less { a: String, b: String },
    Select { cond: String, a: String, b: String },
    Worley { p: String },
    SampleDepth { uv: String },
    SampleColor { uv: String },
    LinearizeDepth { depth: String, near: String, far: String },
}

impl NodeKind {
    fn inputs(&self) -> Vec<&String> {
        match self {
            NodeKind::Scalar { .. }
            | NodeKind::Vector { .. }
            | NodeKind::Color { .. }
            | NodeKind::Boolean { .. }
            | NodeKind::Uniform { .. }
            | NodeKind::ScreenUv
            | NodeKind::WorldPosition
            | NodeKind::WorldNormal
            | NodeKind::FragmentDepth => Vec::new(),
            NodeKind::Add { a, b }
            | NodeKind::Sub { a, b }
            | NodeKind::Mul { a, b }
            | NodeKind::Div { a, b }
            | NodeKind::Pow { a, b }
            | NodeKind::Distance { a, b }
            | NodeKind::Less { a, b } => vec![a, b],
            NodeKind::Mix { a, b, t } => vec![a, b, t],
            NodeKind::Saturate { x }
            | NodeKind::OneMinus { x }
            | NodeKind::Normalize { x }
            | NodeKind::RemapClamp { x, .. } => vec![x],
            NodeKind::Select { cond, a, b } => vec![cond, a, b],
            NodeKind::Worley { p } => vec![p],
            NodeKind::SampleDepth { uv } | NodeKind::SampleColor { uv } => vec![uv],
            NodeKind::LinearizeDepth { depth, near, far } => vec![depth, near, far],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDesc {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// A named-node graph, typically loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDesc {
    pub nodes: Vec<NodeDesc>,
    /// Id of the node whose value the graph produces.
    pub output: String,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

impl GraphDesc {
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::Description(e.to_string()))
    }

    /// Build the output field, sharing each node between all of its users.
    pub fn build(&self) -> Result<Field, GraphError> {
        let mut index = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if index.insert(node.id.as_str(), i).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        if !index.contains_key(self.output.as_str()) {
            return Err(GraphError::UnknownNode {
                referenced: self.output.clone(),
                by: "output".into(),
            });
        }

        let order = self.topological_order(&index)?;
        let mut built: HashMap<&str, Field> = HashMap::new();
        for i in order {
            let node = &self.nodes[i];
            let field = build_node(&node.kind, &built)?;
            built.insert(node.id.as_str(), field);
        }
        built
            .remove(self.output.as_str())
            .ok_or_else(|| GraphError::UnknownNode {
                referenced: self.output.clone(),
                by: "output".into(),
            })
    }

    /// Post-order over nodes reachable from the output.
    fn topological_order(&self, index: &HashMap<&str, usize>) -> Result<Vec<usize>, GraphError> {
        let mut state: HashMap<usize, Visit> = HashMap::new();
        let mut order = Vec::new();
        // Explicit stack of (node, next input to visit).
        let root = index[self.output.as_str()];
        let mut stack = vec![(root, 0usize)];
        state.insert(root, Visit::InProgress);

        while let Some((current, next)) = stack.pop() {
            let node = &self.nodes[current];
            let inputs = node.kind.inputs();
            if next == inputs.len() {
                state.insert(current, Visit::Done);
                order.push(current);
                continue;
            }
            stack.push((current, next + 1));
            let input = inputs[next];
            let child = *index.get(input.as_str()).ok_or_else(|| GraphError::UnknownNode {
                referenced: input.to_string(),
                by: node.id.clone(),
            })?;
            match state.get(&child) {
                Some(Visit::Done) => {}
                Some(Visit::InProgress) => {
                    return Err(GraphError::Cycle {
                        node: self.nodes[child].id.clone(),
                    });
                }
                None => {
                    state.insert(child, Visit::InProgress);
                    stack.push((child, 0));
                }
            }
        }
        Ok(order)
    }
}

fn build_node(kind: &NodeKind, built: &HashMap<&str, Field>) -> Result<Field, GraphError> {
    // Inputs were built earlier in topological order.
    let get = |id: &str| -> Result<Field, GraphError> {
        built.get(id).cloned().ok_or_else(|| GraphError::UnknownNode {
            referenced: id.to_string(),
            by: "graph".into(),
        })
    };
    match kind {
        NodeKind::Scalar { value } => Ok(Field::scalar(*value)),
        NodeKind::Vector { value } => Ok(Field::vector(Vec3::from_array(*value))),
        NodeKind::Color { hex } => Ok(Field::color(*hex)),
        NodeKind::Boolean { value } => Ok(Field::boolean(*value)),
        NodeKind::Uniform { name, ty } => Ok(Field::uniform(name.clone(), *ty)),
        NodeKind::ScreenUv => Ok(Field::screen_uv()),
        NodeKind::WorldPosition => Ok(Field::world_position()),
        NodeKind::WorldNormal => Ok(Field::world_normal()),
        NodeKind::FragmentDepth => Ok(Field::fragment_depth()),
        NodeKind::Add { a, b } => get(a)?.add(get(b)?),
        NodeKind::Sub { a, b } => get(a)?.sub(get(b)?),
        NodeKind::Mul { a, b } => get(a)?.mul(get(b)?),
        NodeKind::Div { a, b } => get(a)?.div(get(b)?),
        NodeKind::Pow { a, b } => get(a)?.pow(get(b)?),
        NodeKind::Distance { a, b } => get(a)?.distance(get(b)?),
        NodeKind::Mix { a, b, t } => get(a)?.mix(get(b)?, get(t)?),
        NodeKind::Saturate { x } => get(x)?.saturate(),
        NodeKind::OneMinus { x } => get(x)?.one_minus(),
        NodeKind::Normalize { x } => get(x)?.normalize(),
        NodeKind::RemapClamp { x, lo, hi } => get(x)?.remap_clamp(*lo, *hi),
        NodeKind::Less { a, b } => get(a)?.less_than(get(b)?),
        NodeKind::Select { cond, a, b } => get(cond)?.select(get(a)?, get(b)?),
        NodeKind::Worley { p } => get(p)?.worley(),
        NodeKind::SampleDepth { uv } => get(uv)?.sample_scene_depth(),
        NodeKind::SampleColor { uv } => get(uv)?.sample_scene_color(),
        NodeKind::LinearizeDepth { depth, near, far } => {
            get(depth)?.linearize_depth(get(near)?, get(far)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FragmentInput, TextureSampler, compile};
    use crate::uniform::UniformSet;
    use glam::Vec2;

    struct Black;

    impl TextureSampler for Black {
        fn scene_color(&self, _uv: Vec2) -> Vec3 {
            Vec3::ZERO
        }
        fn scene_depth(&self, _uv: Vec2) -> f32 {
            1.0
        }
    }

    #[test]
    fn long_described_chains_build_and_compile() {
        let mut nodes = vec![NodeDesc {
            id: "n0".into(),
            kind: NodeKind::Scalar { value: 0.75 },
        }];
        for i in 1..=100_000 {
            nodes.push(NodeDesc {
                id: format!("n{i}"),
                kind: NodeKind::OneMinus {
                    x: format!("n{}", i - 1),
                },
            });
        }
        let desc = GraphDesc {
            nodes,
            output: "n100000".into(),
        };
        let field = desc.build().unwrap();
        let program = compile(&field).unwrap();
        assert_eq!(program.instructions().len(), 100_001);
        let value = program
            .bind(&UniformSet::new())
            .unwrap()
            .evaluate(&FragmentInput::default(), &Black);
        assert_eq!(value, crate::uniform::Value::Scalar(0.75));
    }

    #[test]
    fn builds_graph_from_json() {
        let json = r#"{
            "output": "out",
            "nodes": [
                { "id": "pos", "op": "world_position" },
                { "id": "four", "op": "scalar", "value": 4.0 },
                { "id": "scaled", "op": "mul", "a": "pos", "b": "four" },
                { "id": "noise", "op": "worley", "p": "scaled" },
                { "id": "out", "op": "remap_clamp", "x": "noise", "lo": 0.0, "hi": 1.0 }
            ]
        }"#;
        let desc = GraphDesc::from_json(json).unwrap();
        let field = desc.build().unwrap();
        assert_eq!(field.ty(), FieldType::Scalar);

        let program = compile(&field).unwrap();
        let v = program
            .bind(&UniformSet::new())
            .unwrap()
            .evaluate(&FragmentInput::default(), &Black)
            .as_scalar();
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn shared_inputs_become_one_node() {
        let json = r#"{
            "output": "sum",
            "nodes": [
                { "id": "d", "op": "fragment_depth" },
                { "id": "sum", "op": "add", "a": "d", "b": "d" }
            ]
        }"#;
        let field = GraphDesc::from_json(json).unwrap().build().unwrap();
        assert_eq!(compile(&field).unwrap().instructions().len(), 2);
    }

    #[test]
    fn detects_cycles() {
        let json = r#"{
            "output": "a",
            "nodes": [
                { "id": "a", "op": "add", "a": "b", "b": "c" },
                { "id": "b", "op": "saturate", "x": "a" },
                { "id": "c", "op": "scalar", "value": 1.0 }
            ]
        }"#;
        let err = GraphDesc::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn detects_self_reference() {
        let json = r#"{
            "output": "a",
            "nodes": [ { "id": "a", "op": "one_minus", "x": "a" } ]
        }"#;
        let err = GraphDesc::from_json(json).unwrap().build().unwrap_err();
        assert_eq!(err, GraphError::Cycle { node: "a".into() });
    }

    #[test]
    fn reports_unknown_and_duplicate_nodes() {
        let unknown = r#"{
            "output": "a",
            "nodes": [ { "id": "a", "op": "saturate", "x": "missing" } ]
        }"#;
        let err = GraphDesc::from_json(unknown).unwrap().build().unwrap_err();
        assert!(matches!(err, GraphError::UnknownNode { .. }));

        let duplicate = r#"{
            "output": "a",
            "nodes": [
                { "id": "a", "op": "scalar", "value": 1.0 },
                { "id": "a", "op": "scalar", "value": 2.0 }
            ]
        }"#;
        let err = GraphDesc::from_json(duplicate).unwrap().build().unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".into()));
    }

    #[test]
    fn type_errors_surface_from_description() {
        let json = r#"{
            "output": "bad",
            "nodes": [
                { "id": "t", "op": "boolean", "value": true },
                { "id": "bad", "op": "worley", "p": "t" }
            ]
        }"#;
        let err = GraphDesc::from_json(json).unwrap().build().unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { op: "worley", .. }));
    }

    #[test]
    fn malformed_json_is_a_description_error() {
        let err = GraphDesc::from_json("{ nope").unwrap_err();
        assert!(matches!(err, GraphError::Description(_)));
    }
}
