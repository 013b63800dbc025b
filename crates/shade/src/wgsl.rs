//! WGSL emission for compiled programs.
//!
//! The emitted module is self-contained: a uniform block with one `vec4<f32>`
//! slot per program uniform, the scene color and depth textures, helper
//! functions, `field_main` with one `let` per instruction, and a full-screen
//! triangle entry point pair (`vs`/`fs`).

use std::fmt::Write;

use crate::field::{BinaryOp, Builtin, CompareOp, FieldType, Texture, UnaryOp};
use crate::noise::WORLEY_WGSL;
use crate::program::{Op, Program, Reg};
use crate::uniform::Value;

pub const VERTEX_ENTRY: &str = "vs";
pub const FRAGMENT_ENTRY: &str = "fs";
pub const UNIFORM_BINDING: u32 = 0;
pub const SCENE_COLOR_BINDING: u32 = 1;
pub const SCENE_DEPTH_BINDING: u32 = 2;

const PRELUDE: &str = r#"
struct FragmentInput {
    screen_uv: vec3<f32>,
    world_position: vec3<f32>,
    world_normal: vec3<f32>,
    depth: f32,
}

fn texel_of(uv: vec3<f32>, size: vec2<u32>) -> vec2<i32> {
    let max_texel = vec2<i32>(size) - vec2<i32>(1);
    return clamp(vec2<i32>(uv.xy * vec2<f32>(size)), vec2<i32>(0), max_texel);
}

fn sample_scene_color(uv: vec3<f32>) -> vec3<f32> {
    return textureLoad(scene_color, texel_of(uv, textureDimensions(scene_color)), 0).rgb;
}

fn sample_scene_depth(uv: vec3<f32>) -> f32 {
    return textureLoad(scene_depth, texel_of(uv, textureDimensions(scene_depth)), 0).r;
}

fn linearize_depth(depth: f32, near: f32, far: f32) -> f32 {
    let view_z = (near * far) / ((far - near) * depth - far);
    return (view_z + near) / (near - far);
}

fn safe_normalize(v: vec3<f32>) -> vec3<f32> {
    let len = length(v);
    if (len > 0.0) {
        return v / len;
    }
    return vec3<f32>(0.0);
}
"#;

const ENTRY_POINTS: &str = r#"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs(@builtin(vertex_index) index: u32) -> VsOut {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    var out: VsOut;
    out.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}

@fragment
fn fs(in: VsOut) -> @location(0) vec4<f32> {
    var frag: FragmentInput;
    frag.screen_uv = vec3<f32>(in.uv, 0.0);
    frag.world_position = vec3<f32>(0.0);
    frag.world_normal = vec3<f32>(0.0, 1.0, 0.0);
    frag.depth = sample_scene_depth(frag.screen_uv);
    return field_main(frag);
}
"#;

fn type_name(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Scalar => "f32",
        FieldType::Vector3 => "vec3<f32>",
        FieldType::Boolean => "bool",
    }
}

fn float(v: f32) -> String {
    let v = if v.is_nan() {
        0.0
    } else {
        v.clamp(f32::MIN, f32::MAX)
    };
    let s = format!("{v:?}");
    if s.contains('.') || s.contains('e') {
        s
    } else {
        format!("{s}.0")
    }
}

fn splat(ty: FieldType, v: f32) -> String {
    match ty {
        FieldType::Vector3 => format!("vec3<f32>({})", float(v)),
        _ => float(v),
    }
}

struct Emitter<'p> {
    program: &'p Program,
}

impl Emitter<'_> {
    fn ty(&self, reg: Reg) -> FieldType {
        self.program.instructions()[reg].ty
    }

    /// Register `reg`, broadcast to `ty` when needed.
    fn operand(&self, reg: Reg, ty: FieldType) -> String {
        if ty == FieldType::Vector3 && self.ty(reg) == FieldType::Scalar {
            format!("vec3<f32>(r{reg})")
        } else {
            format!("r{reg}")
        }
    }

    fn uniform(&self, slot: usize) -> String {
        match self.program.uniforms()[slot].ty {
            FieldType::Scalar => format!("u.slots[{slot}].x"),
            FieldType::Vector3 => format!("u.slots[{slot}].xyz"),
            FieldType::Boolean => format!("(u.slots[{slot}].x > 0.5)"),
        }
    }

    fn expression(&self, ty: FieldType, op: &Op) -> String {
        match *op {
            Op::Constant(Value::Scalar(v)) => float(v),
            Op::Constant(Value::Vector3(v)) => {
                format!("vec3<f32>({}, {}, {})", float(v.x), float(v.y), float(v.z))
            }
            Op::Constant(Value::Boolean(b)) => b.to_string(),
            Op::Uniform(slot) => self.uniform(slot),
            Op::Builtin(b) => match b {
                Builtin::ScreenUv => "frag.screen_uv".into(),
                Builtin::WorldPosition => "frag.world_position".into(),
                Builtin::WorldNormal => "frag.world_normal".into(),
                Builtin::FragmentDepth => "frag.depth".into(),
            },
            Op::Unary(op, x) => self.unary(op, ty, x),
            Op::Binary(op, a, b) => self.binary(op, ty, a, b),
            Op::Compare(op, a, b) => {
                let symbol = match op {
                    CompareOp::Less => "<",
                    CompareOp::Greater => ">",
                    CompareOp::GreaterEqual => ">=",
                };
                format!("(r{a} {symbol} r{b})")
            }
            Op::Mix(a, b, t) => format!(
                "mix({}, {}, r{t})",
                self.operand(a, ty),
                self.operand(b, ty)
            ),
            Op::RemapClamp { x, lo, hi } => {
                if hi == lo {
                    format!(
                        "select({}, {}, r{x} >= {})",
                        splat(ty, 0.0),
                        splat(ty, 1.0),
                        splat(ty, lo)
                    )
                } else {
                    format!(
                        "clamp((r{x} - {}) / {}, {}, {})",
                        splat(ty, lo),
                        splat(ty, hi - lo),
                        splat(ty, 0.0),
                        splat(ty, 1.0)
                    )
                }
            }
            // WGSL select takes the false branch first.
            Op::Select { cond, a, b } => format!(
                "select({}, {}, r{cond})",
                self.operand(b, ty),
                self.operand(a, ty)
            ),
            Op::Compose(x, y, z) => format!("vec3<f32>(r{x}, r{y}, r{z})"),
            Op::Worley(p) => format!("worley3(r{p})"),
            Op::Sample(Texture::SceneColor, uv) => format!("sample_scene_color(r{uv})"),
            Op::Sample(Texture::SceneDepth, uv) => format!("sample_scene_depth(r{uv})"),
            Op::LinearizeDepth { depth, near, far } => {
                format!("linearize_depth(r{depth}, r{near}, r{far})")
            }
        }
    }

    fn unary(&self, op: UnaryOp, ty: FieldType, x: Reg) -> String {
        match op {
            UnaryOp::Negate => format!("(-r{x})"),
            UnaryOp::Saturate => format!("saturate(r{x})"),
            UnaryOp::OneMinus => format!("({} - r{x})", splat(ty, 1.0)),
            UnaryOp::Normalize => format!("safe_normalize(r{x})"),
            UnaryOp::Length => match self.ty(x) {
                FieldType::Vector3 => format!("length(r{x})"),
                _ => format!("abs(r{x})"),
            },
            UnaryOp::X => format!("r{x}.x"),
            UnaryOp::Y => format!("r{x}.y"),
            UnaryOp::Z => format!("r{x}.z"),
        }
    }

    fn binary(&self, op: BinaryOp, ty: FieldType, a: Reg, b: Reg) -> String {
        let (lhs, rhs) = (self.operand(a, ty), self.operand(b, ty));
        match op {
            BinaryOp::Add => format!("({lhs} + {rhs})"),
            BinaryOp::Sub => format!("({lhs} - {rhs})"),
            BinaryOp::Mul => format!("({lhs} * {rhs})"),
            BinaryOp::Div => format!("({lhs} / {rhs})"),
            BinaryOp::Pow => format!("pow({lhs}, {rhs})"),
            BinaryOp::Min => format!("min({lhs}, {rhs})"),
            BinaryOp::Max => format!("max({lhs}, {rhs})"),
            BinaryOp::Distance => {
                if self.ty(a) == FieldType::Vector3 || self.ty(b) == FieldType::Vector3 {
                    format!(
                        "distance({}, {})",
                        self.operand(a, FieldType::Vector3),
                        self.operand(b, FieldType::Vector3)
                    )
                } else {
                    format!("abs(r{a} - r{b})")
                }
            }
        }
    }
}

/// Render a compiled program as a complete WGSL module.
pub fn emit_wgsl(program: &Program) -> String {
    let emitter = Emitter { program };
    let slots = program.uniforms().len().max(1);
    let mut out = String::new();

    let _ = writeln!(out, "// uniforms:");
    for (i, decl) in program.uniforms().iter().enumerate() {
        let _ = writeln!(out, "//   slot {i}: {} ({:?})", decl.name, decl.ty);
    }
    let _ = writeln!(
        out,
        "struct FieldUniforms {{\n    slots: array<vec4<f32>, {slots}>,\n}}\n"
    );
    let _ = writeln!(
        out,
        "@group(0) @binding({UNIFORM_BINDING}) var<uniform> u: FieldUniforms;"
    );
    let _ = writeln!(
        out,
        "@group(0) @binding({SCENE_COLOR_BINDING}) var scene_color: texture_2d<f32>;"
    );
    let _ = writeln!(
        out,
        "@group(0) @binding({SCENE_DEPTH_BINDING}) var scene_depth: texture_2d<f32>;"
    );
    out.push_str(PRELUDE);
    out.push_str(WORLEY_WGSL);

    out.push_str("\nfn field_main(frag: FragmentInput) -> vec4<f32> {\n");
    for (reg, instruction) in program.instructions().iter().enumerate() {
        let _ = writeln!(
            out,
            "    let r{reg}: {} = {};",
            type_name(instruction.ty),
            emitter.expression(instruction.ty, &instruction.op)
        );
    }
    let last = program.instructions().len().checked_sub(1);
    let result = match (last, program.output_type()) {
        (None, _) => "vec4<f32>(0.0, 0.0, 0.0, 1.0)".to_string(),
        (Some(r), FieldType::Vector3) => format!("vec4<f32>(r{r}, 1.0)"),
        (Some(r), FieldType::Scalar) => format!("vec4<f32>(vec3<f32>(r{r}), 1.0)"),
        (Some(r), FieldType::Boolean) => {
            format!("vec4<f32>(vec3<f32>(select(0.0, 1.0, r{r})), 1.0)")
        }
    };
    let _ = writeln!(out, "    return {result};\n}}");
    out.push_str(ENTRY_POINTS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::program::compile;
    use crate::uniform;

    fn emit(field: &Field) -> String {
        emit_wgsl(&compile(field).unwrap())
    }

    #[test]
    fn emits_one_let_per_instruction() {
        let f = Field::world_position().x().unwrap().add(1.0).unwrap();
        let src = emit(&f);
        assert!(src.contains("let r0: vec3<f32> = frag.world_position;"));
        assert!(src.contains("let r1: f32 = r0.x;"));
        assert!(src.contains("let r2: f32 = 1.0;"));
        assert!(src.contains("let r3: f32 = (r1 + r2);"));
        assert!(src.contains("return vec4<f32>(vec3<f32>(r3), 1.0);"));
    }

    #[test]
    fn select_swaps_branch_order() {
        let f = Field::fragment_depth()
            .less_than(0.5)
            .unwrap()
            .select(1.0, 0.0)
            .unwrap();
        let src = emit(&f);
        // cond r2, true branch r3, false branch r4
        assert!(src.contains("select(r4, r3, r2)"), "{src}");
    }

    #[test]
    fn scalar_operands_are_broadcast() {
        let f = Field::screen_uv().mul(0.5).unwrap();
        let src = emit(&f);
        assert!(src.contains("(r0 * vec3<f32>(r1))"));
    }

    #[test]
    fn uniforms_map_to_slots() {
        let f = uniform::underwater()
            .select(uniform::time(), uniform::water_height())
            .unwrap();
        let src = emit(&f);
        assert!(src.contains("slots: array<vec4<f32>, 3>"));
        assert!(src.contains("(u.slots[0].x > 0.5)"));
        assert!(src.contains("u.slots[1].x"));
        assert!(src.contains("//   slot 2: water_height"));
    }

    #[test]
    fn empty_uniform_block_still_has_a_slot() {
        let src = emit(&Field::scalar(1.0));
        assert!(src.contains("array<vec4<f32>, 1>"));
    }

    #[test]
    fn remap_and_samplers_use_helpers() {
        let f = Field::screen_uv()
            .sample_scene_depth()
            .unwrap()
            .linearize_depth(0.1, 1000.0)
            .unwrap()
            .remap_clamp(0.15, 0.3)
            .unwrap();
        let src = emit(&f);
        assert!(src.contains("sample_scene_depth(r0)"));
        assert!(src.contains("linearize_depth(r1, r2, r3)"));
        assert!(src.contains("clamp((r4 - 0.15) /"));
        assert!(src.contains("fn worley3"));
        assert!(src.contains("@fragment"));
    }

    #[test]
    fn float_literals_always_have_a_decimal_point() {
        assert_eq!(float(1.0), "1.0");
        assert_eq!(float(4.0), "4.0");
        assert_eq!(float(0.25), "0.25");
        assert_eq!(float(f32::NAN), "0.0");
        assert!(float(1e-7).contains('e'));
    }
}
