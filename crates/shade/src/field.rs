//! Field nodes and the builder operators that compose them.
//!
//! A [`Field`] is an immutable, reference-counted node. Every operator returns
//! a new node and leaves its operands untouched, so shared sub-expressions are
//! simply shared `Field` clones. Type checking happens here, at construction;
//! nothing at this layer looks at runtime values.

use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// The value kind a field produces per fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Scalar,
    Vector3,
    Boolean,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, FieldType::Boolean)
    }

    /// Result type of a broadcasting numeric operation.
    fn widen(self, other: FieldType) -> FieldType {
        if self == FieldType::Vector3 || other == FieldType::Vector3 {
            FieldType::Vector3
        } else {
            FieldType::Scalar
        }
    }
}

/// Per-fragment inputs supplied by the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// Screen UV in `[0, 1]²`, packed as `(u, v, 0)`.
    ScreenUv,
    WorldPosition,
    WorldNormal,
    /// Depth-buffer value of the fragment being shaded.
    FragmentDepth,
}

impl Builtin {
    pub fn field_type(self) -> FieldType {
        match self {
            Builtin::FragmentDepth => FieldType::Scalar,
            _ => FieldType::Vector3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Saturate,
    OneMinus,
    Normalize,
    Length,
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Less,
    Greater,
    GreaterEqual,
}

/// Texture reads available to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Texture {
    SceneColor,
    SceneDepth,
}

#[derive(Debug)]
pub(crate) enum Node {
    Scalar(f32),
    Vector(Vec3),
    Boolean(bool),
    Uniform(String),
    Builtin(Builtin),
    Unary(UnaryOp, Field),
    Binary(BinaryOp, Field, Field),
    Compare(CompareOp, Field, Field),
    Mix { a: Field, b: Field, t: Field },
    RemapClamp { x: Field, lo: f32, hi: f32 },
    Select { cond: Field, a: Field, b: Field },
    Compose(Field, Field, Field),
    Worley(Field),
    Sample(Texture, Field),
    LinearizeDepth { depth: Field, near: Field, far: Field },
}

impl Node {
    /// Operand fields, in evaluation order.
    pub(crate) fn inputs(&self) -> Vec<&Field> {
        match self {
            Node::Scalar(_)
            | Node::Vector(_)
            | Node::Boolean(_)
            | Node::Uniform(_)
            | Node::Builtin(_) => Vec::new(),
            Node::Unary(_, x) | Node::RemapClamp { x, .. } | Node::Worley(x) | Node::Sample(_, x) => {
                vec![x]
            }
            Node::Binary(_, a, b) | Node::Compare(_, a, b) => vec![a, b],
            Node::Mix { a, b, t } => vec![a, b, t],
            Node::Select { cond, a, b } => vec![cond, a, b],
            Node::Compose(x, y, z) => vec![x, y, z],
            Node::LinearizeDepth { depth, near, far } => vec![depth, near, far],
        }
    }

    /// Move the operands out, leaving a leaf behind.
    fn take_inputs(&mut self) -> Vec<Field> {
        match std::mem::replace(self, Node::Boolean(false)) {
            Node::Scalar(_)
            | Node::Vector(_)
            | Node::Boolean(_)
            | Node::Uniform(_)
            | Node::Builtin(_) => Vec::new(),
            Node::Unary(_, x) | Node::RemapClamp { x, .. } | Node::Worley(x) | Node::Sample(_, x) => {
                vec![x]
            }
            Node::Binary(_, a, b) | Node::Compare(_, a, b) => vec![a, b],
            Node::Mix { a, b, t } => vec![a, b, t],
            Node::Select { cond, a, b } => vec![cond, a, b],
            Node::Compose(x, y, z) => vec![x, y, z],
            Node::LinearizeDepth { depth, near, far } => vec![depth, near, far],
        }
    }
}

#[derive(Debug)]
pub(crate) struct FieldNode {
    pub(crate) ty: FieldType,
    pub(crate) node: Node,
}

// Unlinks uniquely owned operands one at a time, so dropping a long chain
// does not recurse once per node.
impl Drop for FieldNode {
    fn drop(&mut self) {
        let mut pending = self.node.take_inputs();
        while let Some(field) = pending.pop() {
            if let Ok(mut inner) = Arc::try_unwrap(field.0) {
                pending.append(&mut inner.node.take_inputs());
            }
        }
    }
}

/// An immutable node in the per-pixel expression graph.
#[derive(Clone)]
pub struct Field(pub(crate) Arc<FieldNode>);

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("ty", &self.0.ty)
            .field("node", &self.0.node)
            .finish()
    }
}

impl From<f32> for Field {
    fn from(value: f32) -> Self {
        Field::scalar(value)
    }
}

// Unsuffixed float literals default to f64.
impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::scalar(value as f32)
    }
}

impl From<Vec3> for Field {
    fn from(value: Vec3) -> Self {
        Field::vector(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::boolean(value)
    }
}

impl From<&Field> for Field {
    fn from(value: &Field) -> Self {
        value.clone()
    }
}

fn expect_numeric(op: &'static str, field: &Field) -> Result<(), GraphError> {
    if field.ty().is_numeric() {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch {
            op,
            expected: "scalar or vector",
            actual: field.ty(),
        })
    }
}

fn expect(op: &'static str, field: &Field, ty: FieldType) -> Result<(), GraphError> {
    if field.ty() == ty {
        Ok(())
    } else {
        Err(GraphError::TypeMismatch {
            op,
            expected: match ty {
                FieldType::Scalar => "scalar",
                FieldType::Vector3 => "vector",
                FieldType::Boolean => "boolean",
            },
            actual: field.ty(),
        })
    }
}

impl Field {
    fn new(ty: FieldType, node: Node) -> Self {
        Self(Arc::new(FieldNode { ty, node }))
    }

    pub fn scalar(value: f32) -> Self {
        Self::new(FieldType::Scalar, Node::Scalar(value))
    }

    pub fn vector(value: Vec3) -> Self {
        Self::new(FieldType::Vector3, Node::Vector(value))
    }

    /// A vector constant from a packed `0xRRGGBB` color.
    pub fn color(hex: u32) -> Self {
        Self::vector(hex_color(hex))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(FieldType::Boolean, Node::Boolean(value))
    }

    /// A host-owned per-frame value, looked up by name when the program is bound.
    pub fn uniform(name: impl Into<String>, ty: FieldType) -> Self {
        Self::new(ty, Node::Uniform(name.into()))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Self::new(builtin.field_type(), Node::Builtin(builtin))
    }

    pub fn screen_uv() -> Self {
        Self::builtin(Builtin::ScreenUv)
    }

    pub fn world_position() -> Self {
        Self::builtin(Builtin::WorldPosition)
    }

    pub fn world_normal() -> Self {
        Self::builtin(Builtin::WorldNormal)
    }

    pub fn fragment_depth() -> Self {
        Self::builtin(Builtin::FragmentDepth)
    }

    pub fn ty(&self) -> FieldType {
        self.0.ty
    }

    /// True when both handles point at the same node.
    pub fn same_node(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0.node
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn unary(&self, op: UnaryOp) -> Result<Field, GraphError> {
        let name = unary_name(op);
        let ty = match op {
            UnaryOp::Negate | UnaryOp::Saturate | UnaryOp::OneMinus => {
                expect_numeric(name, self)?;
                self.ty()
            }
            UnaryOp::Normalize => {
                expect(name, self, FieldType::Vector3)?;
                FieldType::Vector3
            }
            UnaryOp::Length => {
                expect_numeric(name, self)?;
                FieldType::Scalar
            }
            UnaryOp::X | UnaryOp::Y | UnaryOp::Z => {
                expect(name, self, FieldType::Vector3)?;
                FieldType::Scalar
            }
        };
        Ok(Field::new(ty, Node::Unary(op, self.clone())))
    }

    fn binary(&self, op: BinaryOp, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        let rhs = rhs.into();
        let name = binary_name(op);
        expect_numeric(name, self)?;
        expect_numeric(name, &rhs)?;
        let ty = match op {
            BinaryOp::Distance => FieldType::Scalar,
            _ => self.ty().widen(rhs.ty()),
        };
        Ok(Field::new(ty, Node::Binary(op, self.clone(), rhs)))
    }

    fn compare(&self, op: CompareOp, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        let rhs = rhs.into();
        expect("compare", self, FieldType::Scalar)?;
        expect("compare", &rhs, FieldType::Scalar)?;
        Ok(Field::new(
            FieldType::Boolean,
            Node::Compare(op, self.clone(), rhs),
        ))
    }

    pub fn add(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Mul, rhs)
    }

    pub fn div(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn pow(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Pow, rhs)
    }

    pub fn min(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Min, rhs)
    }

    pub fn max(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Max, rhs)
    }

    /// Euclidean distance; a scalar operand is broadcast to all components.
    pub fn distance(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.binary(BinaryOp::Distance, rhs)
    }

    pub fn negate(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Negate)
    }

    /// Clamp to `[0, 1]`.
    pub fn saturate(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Saturate)
    }

    pub fn one_minus(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::OneMinus)
    }

    pub fn normalize(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Normalize)
    }

    pub fn length(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Length)
    }

    pub fn x(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::X)
    }

    pub fn y(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Y)
    }

    pub fn z(&self) -> Result<Field, GraphError> {
        self.unary(UnaryOp::Z)
    }

    /// Swizzle `(x, z, y)`: projects a world position onto the horizontal plane.
    pub fn xzy(&self) -> Result<Field, GraphError> {
        Field::compose(self.x()?, self.z()?, self.y()?)
    }

    pub fn compose(
        x: impl Into<Field>,
        y: impl Into<Field>,
        z: impl Into<Field>,
    ) -> Result<Field, GraphError> {
        let (x, y, z) = (x.into(), y.into(), z.into());
        for c in [&x, &y, &z] {
            expect("compose", c, FieldType::Scalar)?;
        }
        Ok(Field::new(FieldType::Vector3, Node::Compose(x, y, z)))
    }

    pub fn less_than(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.compare(CompareOp::Less, rhs)
    }

    pub fn greater_than(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.compare(CompareOp::Greater, rhs)
    }

    pub fn greater_equal(&self, rhs: impl Into<Field>) -> Result<Field, GraphError> {
        self.compare(CompareOp::GreaterEqual, rhs)
    }

    /// Linear interpolation `self · (1 − t) + other · t`.
    pub fn mix(&self, other: impl Into<Field>, t: impl Into<Field>) -> Result<Field, GraphError> {
        let (b, t) = (other.into(), t.into());
        expect_numeric("mix", self)?;
        expect_numeric("mix", &b)?;
        expect_numeric("mix", &t)?;
        let ty = self.ty().widen(b.ty()).widen(t.ty());
        Ok(Field::new(
            ty,
            Node::Mix {
                a: self.clone(),
                b,
                t,
            },
        ))
    }

    /// `clamp((self − lo) / (hi − lo), 0, 1)`; a degenerate band is a step at `lo`.
    pub fn remap_clamp(&self, lo: f32, hi: f32) -> Result<Field, GraphError> {
        expect_numeric("remap_clamp", self)?;
        Ok(Field::new(
            self.ty(),
            Node::RemapClamp {
                x: self.clone(),
                lo,
                hi,
            },
        ))
    }

    /// Per-fragment choice between `if_true` and `if_false`; `self` must be boolean.
    pub fn select(
        &self,
        if_true: impl Into<Field>,
        if_false: impl Into<Field>,
    ) -> Result<Field, GraphError> {
        let (a, b) = (if_true.into(), if_false.into());
        expect("select", self, FieldType::Boolean)?;
        let ty = if a.ty() == b.ty() {
            a.ty()
        } else if a.ty().is_numeric() && b.ty().is_numeric() {
            a.ty().widen(b.ty())
        } else {
            return Err(GraphError::TypeMismatch {
                op: "select",
                expected: "branches of matching type",
                actual: b.ty(),
            });
        };
        Ok(Field::new(
            ty,
            Node::Select {
                cond: self.clone(),
                a,
                b,
            },
        ))
    }

    /// Cellular noise of a vector position, in `[0, 1]`.
    pub fn worley(&self) -> Result<Field, GraphError> {
        expect("worley", self, FieldType::Vector3)?;
        Ok(Field::new(FieldType::Scalar, Node::Worley(self.clone())))
    }

    /// Raw scene depth at the screen UV held in `self`.
    pub fn sample_scene_depth(&self) -> Result<Field, GraphError> {
        expect("sample_scene_depth", self, FieldType::Vector3)?;
        Ok(Field::new(
            FieldType::Scalar,
            Node::Sample(Texture::SceneDepth, self.clone()),
        ))
    }

    /// Scene color at the screen UV held in `self`.
    pub fn sample_scene_color(&self) -> Result<Field, GraphError> {
        expect("sample_scene_color", self, FieldType::Vector3)?;
        Ok(Field::new(
            FieldType::Vector3,
            Node::Sample(Texture::SceneColor, self.clone()),
        ))
    }

    /// Convert a perspective depth-buffer value into `[0, 1]` linear depth.
    pub fn linearize_depth(
        &self,
        near: impl Into<Field>,
        far: impl Into<Field>,
    ) -> Result<Field, GraphError> {
        let (near, far) = (near.into(), far.into());
        expect("linearize_depth", self, FieldType::Scalar)?;
        expect("linearize_depth", &near, FieldType::Scalar)?;
        expect("linearize_depth", &far, FieldType::Scalar)?;
        Ok(Field::new(
            FieldType::Scalar,
            Node::LinearizeDepth {
                depth: self.clone(),
                near,
                far,
            },
        ))
    }
}

pub(crate) fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Negate => "negate",
        UnaryOp::Saturate => "saturate",
        UnaryOp::OneMinus => "one_minus",
        UnaryOp::Normalize => "normalize",
        UnaryOp::Length => "length",
        UnaryOp::X => "x",
        UnaryOp::Y => "y",
        UnaryOp::Z => "z",
    }
}

pub(crate) fn binary_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Pow => "pow",
        BinaryOp::Min => "min",
        BinaryOp::Max => "max",
        BinaryOp::Distance => "distance",
    }
}

/// Unpack `0xRRGGBB` into linear `[0, 1]` components.
pub fn hex_color(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_broadcasts_to_vector() {
        let v = Field::vector(Vec3::ONE);
        let s = Field::scalar(2.0);
        assert_eq!(v.mul(&s).unwrap().ty(), FieldType::Vector3);
        assert_eq!(s.add(1.0).unwrap().ty(), FieldType::Scalar);
        assert_eq!(v.distance(&s).unwrap().ty(), FieldType::Scalar);
    }

    #[test]
    fn boolean_arithmetic_is_rejected() {
        let b = Field::boolean(true);
        let err = b.add(1.0).unwrap_err();
        assert!(matches!(err, GraphError::TypeMismatch { op: "add", .. }));
    }

    #[test]
    fn select_requires_boolean_condition() {
        let s = Field::scalar(1.0);
        assert!(s.select(1.0, 0.0).is_err());
        let cond = s.less_than(2.0).unwrap();
        assert_eq!(cond.ty(), FieldType::Boolean);
        let picked = cond.select(Field::vector(Vec3::X), 0.0).unwrap();
        assert_eq!(picked.ty(), FieldType::Vector3);
    }

    #[test]
    fn select_rejects_boolean_and_number_branches() {
        let cond = Field::boolean(false);
        assert!(cond.select(true, 1.0).is_err());
        assert_eq!(cond.select(true, false).unwrap().ty(), FieldType::Boolean);
    }

    #[test]
    fn operators_do_not_mutate_operands() {
        let a = Field::scalar(1.0);
        let b = a.add(2.0).unwrap();
        assert!(!a.same_node(&b));
        assert!(matches!(a.node(), Node::Scalar(v) if *v == 1.0));
    }

    #[test]
    fn swizzle_requires_vector() {
        assert!(Field::scalar(1.0).x().is_err());
        let p = Field::world_position().xzy().unwrap();
        assert_eq!(p.ty(), FieldType::Vector3);
    }

    #[test]
    fn compare_requires_scalars() {
        let v = Field::screen_uv();
        assert!(v.less_than(0.5).is_err());
    }

    #[test]
    fn hex_color_unpacks_channels() {
        let c = hex_color(0xff8000);
        assert_eq!(c.x, 1.0);
        assert!((c.y - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.z, 0.0);
    }
}
