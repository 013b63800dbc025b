//! Cellular (Worley) noise shared by the CPU evaluator and the WGSL backend.
//!
//! Both sides hash integer cell coordinates with the same `pcg3d` mix so a
//! field rendered on the CPU and on the GPU shows the same cell pattern.

use glam::{IVec3, UVec3, Vec3};

/// WGSL source of [`worley`]; appended to every emitted shader module.
pub const WORLEY_WGSL: &str = r#"
fn pcg3d(seed: vec3<u32>) -> vec3<u32> {
    var v = seed * 1664525u + 1013904223u;
    v.x += v.y * v.z;
    v.y += v.z * v.x;
    v.z += v.x * v.y;
    v ^= v >> vec3<u32>(16u);
    v.x += v.y * v.z;
    v.y += v.z * v.x;
    v.z += v.x * v.y;
    return v;
}

fn worley3(p: vec3<f32>) -> f32 {
    let cell = floor(p);
    let local = p - cell;
    var best = 1e30;
    for (var dz = -1; dz <= 1; dz++) {
        for (var dy = -1; dy <= 1; dy++) {
            for (var dx = -1; dx <= 1; dx++) {
                let offset = vec3<f32>(f32(dx), f32(dy), f32(dz));
                let c = vec3<i32>(cell + offset);
                let jitter = vec3<f32>(pcg3d(bitcast<vec3<u32>>(c))) / 4294967296.0;
                let d = offset + jitter - local;
                best = min(best, dot(d, d));
            }
        }
    }
    return min(sqrt(best), 1.0);
}
"#;

fn pcg3d(seed: UVec3) -> UVec3 {
    let mut v = UVec3::new(
        seed.x.wrapping_mul(1_664_525).wrapping_add(1_013_904_223),
        seed.y.wrapping_mul(1_664_525).wrapping_add(1_013_904_223),
        seed.z.wrapping_mul(1_664_525).wrapping_add(1_013_904_223),
    );
    let mix = |v: &mut UVec3| {
        v.x = v.x.wrapping_add(v.y.wrapping_mul(v.z));
        v.y = v.y.wrapping_add(v.z.wrapping_mul(v.x));
        v.z = v.z.wrapping_add(v.x.wrapping_mul(v.y));
    };
    mix(&mut v);
    v = v ^ (v >> 16);
    mix(&mut v);
    v
}

/// Jittered feature point of a cell, each component in `[0, 1]`.
fn feature_offset(cell: IVec3) -> Vec3 {
    let h = pcg3d(cell.as_uvec3());
    h.as_vec3() / u32::MAX as f32
}

/// F1 Worley noise: distance to the nearest jittered feature point.
///
/// Deterministic, clamped to `[0, 1]`, and 0 for non-finite input.
pub fn worley(p: Vec3) -> f32 {
    if !p.is_finite() {
        return 0.0;
    }
    let cell = p.floor();
    let local = p - cell;
    let base = cell.as_ivec3();
    let mut best = f32::MAX;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let offset = IVec3::new(dx, dy, dz);
                let d = offset.as_vec3() + feature_offset(base.wrapping_add(offset)) - local;
                best = best.min(d.length_squared());
            }
        }
    }
    best.sqrt().min(1.0)
}
