//! Compilation of a field DAG into a flat program, and CPU evaluation.
//!
//! `compile` walks the DAG once, assigning each distinct node a register in
//! dependency order. `bind` resolves uniforms against one frame's snapshot;
//! after that, evaluating a fragment is infallible and pure.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::error::GraphError;
use crate::field::{BinaryOp, Builtin, CompareOp, Field, FieldType, Node, Texture, UnaryOp};
use crate::noise::worley;
use crate::uniform::{UniformSet, Value};

/// Register index inside a [`Program`].
pub type Reg = usize;

/// One lowered node. Operands always refer to earlier registers.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Constant(Value),
    /// Index into [`Program::uniforms`].
    Uniform(usize),
    Builtin(Builtin),
    Unary(UnaryOp, Reg),
    Binary(BinaryOp, Reg, Reg),
    Compare(CompareOp, Reg, Reg),
    Mix(Reg, Reg, Reg),
    RemapClamp { x: Reg, lo: f32, hi: f32 },
    Select { cond: Reg, a: Reg, b: Reg },
    Compose(Reg, Reg, Reg),
    Worley(Reg),
    Sample(Texture, Reg),
    LinearizeDepth { depth: Reg, near: Reg, far: Reg },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub ty: FieldType,
    pub op: Op,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub ty: FieldType,
}

/// A compiled field: instructions in dependency order, the last one is the output.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    uniforms: Vec<UniformDecl>,
}

/// Compile a field DAG. Shared nodes are lowered once.
pub fn compile(root: &Field) -> Result<Program, GraphError> {
    let mut lowering = Lowering::default();
    lowering.lower(root)?;
    tracing::debug!(
        instructions = lowering.instructions.len(),
        uniforms = lowering.uniforms.len(),
        "compiled field program"
    );
    Ok(Program {
        instructions: lowering.instructions,
        uniforms: lowering.uniforms,
    })
}

#[derive(Default)]
struct Lowering {
    instructions: Vec<Instruction>,
    uniforms: Vec<UniformDecl>,
    registers: HashMap<usize, Reg>,
}

impl Lowering {
    /// Post-order walk with an explicit stack of (node, operands pushed).
    fn lower(&mut self, root: &Field) -> Result<Reg, GraphError> {
        let mut stack = vec![(root, false)];
        while let Some((field, expanded)) = stack.pop() {
            if self.registers.contains_key(&field.id()) {
                continue;
            }
            if !expanded {
                stack.push((field, true));
                for input in field.node().inputs().into_iter().rev() {
                    if !self.registers.contains_key(&input.id()) {
                        stack.push((input, false));
                    }
                }
                continue;
            }
            let op = self.op_for(field)?;
            let reg = self.instructions.len();
            self.instructions.push(Instruction { ty: field.ty(), op });
            self.registers.insert(field.id(), reg);
        }
        Ok(self.reg(root))
    }

    fn reg(&self, field: &Field) -> Reg {
        self.registers[&field.id()]
    }

    /// Operands are already lowered when this runs.
    fn op_for(&mut self, field: &Field) -> Result<Op, GraphError> {
        let op = match field.node() {
            Node::Scalar(v) => Op::Constant(Value::Scalar(*v)),
            Node::Vector(v) => Op::Constant(Value::Vector3(*v)),
            Node::Boolean(b) => Op::Constant(Value::Boolean(*b)),
            Node::Uniform(name) => Op::Uniform(self.declare(name, field.ty())?),
            Node::Builtin(b) => Op::Builtin(*b),
            Node::Unary(op, x) => Op::Unary(*op, self.reg(x)),
            Node::Binary(op, a, b) => Op::Binary(*op, self.reg(a), self.reg(b)),
            Node::Compare(op, a, b) => Op::Compare(*op, self.reg(a), self.reg(b)),
            Node::Mix { a, b, t } => Op::Mix(self.reg(a), self.reg(b), self.reg(t)),
            Node::RemapClamp { x, lo, hi } => Op::RemapClamp {
                x: self.reg(x),
                lo: *lo,
                hi: *hi,
            },
            Node::Select { cond, a, b } => Op::Select {
                cond: self.reg(cond),
                a: self.reg(a),
                b: self.reg(b),
            },
            Node::Compose(x, y, z) => Op::Compose(self.reg(x), self.reg(y), self.reg(z)),
            Node::Worley(p) => Op::Worley(self.reg(p)),
            Node::Sample(tex, uv) => Op::Sample(*tex, self.reg(uv)),
            Node::LinearizeDepth { depth, near, far } => Op::LinearizeDepth {
                depth: self.reg(depth),
                near: self.reg(near),
                far: self.reg(far),
            },
        };
        Ok(op)
    }

    fn declare(&mut self, name: &str, ty: FieldType) -> Result<usize, GraphError> {
        if let Some(i) = self.uniforms.iter().position(|u| u.name == name) {
            let first = self.uniforms[i].ty;
            if first != ty {
                return Err(GraphError::UniformTypeConflict {
                    name: name.to_string(),
                    first,
                    second: ty,
                });
            }
            return Ok(i);
        }
        self.uniforms.push(UniformDecl {
            name: name.to_string(),
            ty,
        });
        Ok(self.uniforms.len() - 1)
    }
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn uniforms(&self) -> &[UniformDecl] {
        &self.uniforms
    }

    pub fn output_type(&self) -> FieldType {
        self.instructions
            .last()
            .map(|i| i.ty)
            .unwrap_or(FieldType::Scalar)
    }

    pub fn reads(&self, texture: Texture) -> bool {
        self.instructions
            .iter()
            .any(|i| matches!(i.op, Op::Sample(t, _) if t == texture))
    }

    /// Resolve every uniform the program reads against one frame's values.
    pub fn bind<'p>(&'p self, uniforms: &UniformSet) -> Result<BoundProgram<'p>, GraphError> {
        let values = self
            .uniforms
            .iter()
            .map(|decl| {
                let value = uniforms
                    .get(&decl.name)
                    .ok_or_else(|| GraphError::MissingUniform(decl.name.clone()))?;
                if value.field_type() != decl.ty {
                    return Err(GraphError::UniformValueType {
                        name: decl.name.clone(),
                        expected: decl.ty,
                        actual: value.field_type(),
                    });
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoundProgram {
            program: self,
            uniforms: values,
        })
    }

    /// Uniform values packed one per `vec4<f32>` slot, in declaration order.
    pub fn pack_uniforms(&self, uniforms: &UniformSet) -> Result<Vec<[f32; 4]>, GraphError> {
        let bound = self.bind(uniforms)?;
        Ok(bound
            .uniforms
            .iter()
            .map(|v| match *v {
                Value::Vector3(v) => [v.x, v.y, v.z, 0.0],
                other => [other.as_scalar(), 0.0, 0.0, 0.0],
            })
            .collect())
    }
}

/// Per-fragment rasterizer inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentInput {
    pub screen_uv: Vec2,
    pub world_position: Vec3,
    pub world_normal: Vec3,
    /// Depth-buffer value of this fragment.
    pub depth: f32,
}

impl Default for FragmentInput {
    fn default() -> Self {
        Self {
            screen_uv: Vec2::splat(0.5),
            world_position: Vec3::ZERO,
            world_normal: Vec3::Y,
            depth: 1.0,
        }
    }
}

impl FragmentInput {
    /// Inputs for a full-screen pass: only the screen UV is meaningful.
    pub fn screen(screen_uv: Vec2) -> Self {
        Self {
            screen_uv,
            ..Self::default()
        }
    }
}

/// Read-only access to the full-screen buffers produced earlier in the frame.
pub trait TextureSampler {
    fn scene_color(&self, uv: Vec2) -> Vec3;
    /// Raw depth-buffer value, 0 at the near plane and 1 at the far plane.
    fn scene_depth(&self, uv: Vec2) -> f32;
}

/// Nearest, clamp-to-edge sampling over row-major CPU buffers.
#[derive(Debug, Clone, Copy)]
pub struct BufferSampler<'a> {
    pub width: u32,
    pub height: u32,
    pub color: &'a [Vec3],
    pub depth: &'a [f32],
}

impl BufferSampler<'_> {
    fn index(&self, uv: Vec2) -> Option<usize> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let uv = if uv.is_finite() { uv } else { Vec2::ZERO };
        let x = ((uv.x * self.width as f32) as i64).clamp(0, self.width as i64 - 1) as usize;
        let y = ((uv.y * self.height as f32) as i64).clamp(0, self.height as i64 - 1) as usize;
        Some(y * self.width as usize + x)
    }
}

impl TextureSampler for BufferSampler<'_> {
    fn scene_color(&self, uv: Vec2) -> Vec3 {
        self.index(uv)
            .and_then(|i| self.color.get(i).copied())
            .unwrap_or(Vec3::ZERO)
    }

    fn scene_depth(&self, uv: Vec2) -> f32 {
        self.index(uv)
            .and_then(|i| self.depth.get(i).copied())
            .unwrap_or(1.0)
    }
}

/// A program with its uniforms resolved for one frame.
#[derive(Debug, Clone)]
pub struct BoundProgram<'p> {
    program: &'p Program,
    uniforms: Vec<Value>,
}

impl BoundProgram<'_> {
    pub fn evaluate(&self, fragment: &FragmentInput, textures: &dyn TextureSampler) -> Value {
        let mut registers = Vec::with_capacity(self.program.instructions.len());
        self.evaluate_with(&mut registers, fragment, textures)
    }

    /// Like [`evaluate`](Self::evaluate), reusing a scratch register file.
    pub fn evaluate_with(
        &self,
        registers: &mut Vec<Value>,
        fragment: &FragmentInput,
        textures: &dyn TextureSampler,
    ) -> Value {
        registers.clear();
        for instruction in &self.program.instructions {
            let value = self.step(instruction, registers, fragment, textures);
            registers.push(value);
        }
        registers.last().copied().unwrap_or(Value::Scalar(0.0))
    }

    fn step(
        &self,
        instruction: &Instruction,
        r: &[Value],
        fragment: &FragmentInput,
        textures: &dyn TextureSampler,
    ) -> Value {
        let ty = instruction.ty;
        match instruction.op {
            Op::Constant(v) => v,
            Op::Uniform(i) => self.uniforms[i],
            Op::Builtin(b) => match b {
                Builtin::ScreenUv => Value::Vector3(fragment.screen_uv.extend(0.0)),
                Builtin::WorldPosition => Value::Vector3(fragment.world_position),
                Builtin::WorldNormal => Value::Vector3(fragment.world_normal),
                Builtin::FragmentDepth => Value::Scalar(fragment.depth),
            },
            Op::Unary(op, x) => unary(op, ty, r[x]),
            Op::Binary(op, a, b) => binary(op, ty, r[a], r[b]),
            Op::Compare(op, a, b) => {
                let (a, b) = (r[a].as_scalar(), r[b].as_scalar());
                Value::Boolean(match op {
                    CompareOp::Less => a < b,
                    CompareOp::Greater => a > b,
                    CompareOp::GreaterEqual => a >= b,
                })
            }
            Op::Mix(a, b, t) => numeric(
                ty,
                r[a],
                r[b],
                r[t],
                |a, b, t| a + (b - a) * t,
                |a, b, t| a + (b - a) * t,
            ),
            Op::RemapClamp { x, lo, hi } => map(ty, r[x], |v| remap_clamp(v, lo, hi)),
            Op::Select { cond, a, b } => {
                let chosen = if r[cond].as_bool() { r[a] } else { r[b] };
                coerce(ty, chosen)
            }
            Op::Compose(x, y, z) => Value::Vector3(Vec3::new(
                r[x].as_scalar(),
                r[y].as_scalar(),
                r[z].as_scalar(),
            )),
            Op::Worley(p) => Value::Scalar(worley(r[p].as_vector())),
            Op::Sample(Texture::SceneColor, uv) => {
                Value::Vector3(textures.scene_color(r[uv].as_vector().truncate()))
            }
            Op::Sample(Texture::SceneDepth, uv) => {
                Value::Scalar(textures.scene_depth(r[uv].as_vector().truncate()))
            }
            Op::LinearizeDepth { depth, near, far } => Value::Scalar(linearize_depth(
                r[depth].as_scalar(),
                r[near].as_scalar(),
                r[far].as_scalar(),
            )),
        }
    }
}

/// `clamp((x − lo) / (hi − lo), 0, 1)`; with `lo == hi` it is a step at `lo`.
pub fn remap_clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if hi == lo {
        return if x >= lo { 1.0 } else { 0.0 };
    }
    ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Perspective depth-buffer value → orthographic depth in `[0, 1]`.
pub fn linearize_depth(depth: f32, near: f32, far: f32) -> f32 {
    let view_z = (near * far) / ((far - near) * depth - far);
    (view_z + near) / (near - far)
}

fn coerce(ty: FieldType, v: Value) -> Value {
    match ty {
        FieldType::Scalar => Value::Scalar(v.as_scalar()),
        FieldType::Vector3 => Value::Vector3(v.as_vector()),
        FieldType::Boolean => Value::Boolean(v.as_bool()),
    }
}

fn map(ty: FieldType, v: Value, f: impl Fn(f32) -> f32) -> Value {
    match ty {
        FieldType::Vector3 => {
            let v = v.as_vector();
            Value::Vector3(Vec3::new(f(v.x), f(v.y), f(v.z)))
        }
        _ => Value::Scalar(f(v.as_scalar())),
    }
}

fn numeric(
    ty: FieldType,
    a: Value,
    b: Value,
    c: Value,
    scalar: impl Fn(f32, f32, f32) -> f32,
    vector: impl Fn(Vec3, Vec3, Vec3) -> Vec3,
) -> Value {
    match ty {
        FieldType::Vector3 => Value::Vector3(vector(a.as_vector(), b.as_vector(), c.as_vector())),
        _ => Value::Scalar(scalar(a.as_scalar(), b.as_scalar(), c.as_scalar())),
    }
}

fn unary(op: UnaryOp, ty: FieldType, x: Value) -> Value {
    match op {
        UnaryOp::Negate => map(ty, x, |v| -v),
        UnaryOp::Saturate => map(ty, x, |v| v.clamp(0.0, 1.0)),
        UnaryOp::OneMinus => map(ty, x, |v| 1.0 - v),
        UnaryOp::Normalize => Value::Vector3(x.as_vector().normalize_or_zero()),
        UnaryOp::Length => Value::Scalar(match x {
            Value::Vector3(v) => v.length(),
            other => other.as_scalar().abs(),
        }),
        UnaryOp::X => Value::Scalar(x.as_vector().x),
        UnaryOp::Y => Value::Scalar(x.as_vector().y),
        UnaryOp::Z => Value::Scalar(x.as_vector().z),
    }
}

fn binary(op: BinaryOp, ty: FieldType, a: Value, b: Value) -> Value {
    let unused = Value::Scalar(0.0);
    match op {
        BinaryOp::Add => numeric(ty, a, b, unused, |a, b, _| a + b, |a, b, _| a + b),
        BinaryOp::Sub => numeric(ty, a, b, unused, |a, b, _| a - b, |a, b, _| a - b),
        BinaryOp::Mul => numeric(ty, a, b, unused, |a, b, _| a * b, |a, b, _| a * b),
        BinaryOp::Div => numeric(ty, a, b, unused, |a, b, _| a / b, |a, b, _| a / b),
        BinaryOp::Pow => numeric(ty, a, b, unused, |a, b, _| a.powf(b), |a, b, _| a.powf_vec(b)),
        BinaryOp::Min => numeric(ty, a, b, unused, |a, b, _| a.min(b), |a, b, _| a.min(b)),
        BinaryOp::Max => numeric(ty, a, b, unused, |a, b, _| a.max(b), |a, b, _| a.max(b)),
        BinaryOp::Distance => {
            let wide = a.field_type() == FieldType::Vector3 || b.field_type() == FieldType::Vector3;
            if wide {
                Value::Scalar(a.as_vector().distance(b.as_vector()))
            } else {
                Value::Scalar((a.as_scalar() - b.as_scalar()).abs())
            }
        }
    }
}

trait PowVec {
    fn powf_vec(self, exp: Vec3) -> Vec3;
}

impl PowVec for Vec3 {
    fn powf_vec(self, exp: Vec3) -> Vec3 {
        Vec3::new(self.x.powf(exp.x), self.y.powf(exp.y), self.z.powf(exp.z))
    }
}
