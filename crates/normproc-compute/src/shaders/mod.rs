//! WGSL shader sources for the wgpu backend.
//!
//! Every stage is an 8x8 (or `WG`x`WG`) dispatch over the active tile.
//! Kernel variants are selected by constants prepended with
//! [`variant_source`], so each `(DO_TILING, USE_SCHARR)` pair compiles to its
//! own module.

#![allow(dead_code)] // Shaders used by wgpu backend

/// Helpers shared by every stage.
///
/// `stage.dims = (width, height, radius, lut_len)`,
/// `stage.rect = (x, y, w, h)`, `stage.params = (intensity, 0, 0, 0)`.
const COMMON: &str = r#"
struct Stage {
    dims: vec4<u32>,
    rect: vec4<u32>,
    params: vec4<f32>,
}

fn wrap_or_clamp(i: i32, lo: u32, len: u32) -> u32 {
    let n = i32(len);
    var j = i - i32(lo);
    if DO_TILING {
        j = ((j % n) + n) % n;
    } else {
        j = clamp(j, 0, n - 1);
    }
    return lo + u32(j);
}
"#;

/// Horizontal pass with LUT remap: `src -> dst` inside the tile.
const BLUR_H_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> stage: Stage;
@group(0) @binding(3) var<storage, read> kernel: array<f32>;
@group(0) @binding(4) var<storage, read> lut: array<f32>;

fn sample_lut(v: f32) -> f32 {
    let n = stage.dims.w;
    let x = clamp(v, 0.0, 1.0) * f32(n - 1u);
    let i0 = min(u32(x), n - 1u);
    let i1 = min(i0 + 1u, n - 1u);
    let f = x - f32(i0);
    return lut[i0] + f * (lut[i1] - lut[i0]);
}

@compute @workgroup_size(WG, WG)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let rect = stage.rect;
    if id.x >= rect.z || id.y >= rect.w { return; }
    let x = rect.x + id.x;
    let y = rect.y + id.y;
    let w = stage.dims.x;
    let r = i32(stage.dims.z);

    var acc = 0.0;
    for (var ki = 0; ki <= 2 * r; ki = ki + 1) {
        let sx = wrap_or_clamp(i32(x) + ki - r, rect.x, rect.z);
        acc = acc + sample_lut(src[y * w + sx]) * kernel[ki];
    }
    dst[y * w + x] = acc;
}
"#;

/// Vertical pass: `src -> dst` inside the tile.
const BLUR_V_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;
@group(0) @binding(2) var<uniform> stage: Stage;
@group(0) @binding(3) var<storage, read> kernel: array<f32>;

@compute @workgroup_size(WG, WG)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let rect = stage.rect;
    if id.x >= rect.z || id.y >= rect.w { return; }
    let x = rect.x + id.x;
    let y = rect.y + id.y;
    let w = stage.dims.x;
    let r = i32(stage.dims.z);

    var acc = 0.0;
    for (var ki = 0; ki <= 2 * r; ki = ki + 1) {
        let sy = wrap_or_clamp(i32(y) + ki - r, rect.y, rect.w);
        acc = acc + src[sy * w + x] * kernel[ki];
    }
    dst[y * w + x] = acc;
}
"#;

/// Sobel/Scharr gradient to packed RGBA8 normal.
const NORMAL_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> stage: Stage;

fn height_at(x: i32, y: i32) -> f32 {
    let rect = stage.rect;
    let sx = wrap_or_clamp(x, rect.x, rect.z);
    let sy = wrap_or_clamp(y, rect.y, rect.w);
    return src[sy * stage.dims.x + sx];
}

@compute @workgroup_size(WG, WG)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let rect = stage.rect;
    if id.x >= rect.z || id.y >= rect.w { return; }
    let x = rect.x + id.x;
    let y = rect.y + id.y;
    let xi = i32(x);
    let yi = i32(y);

    var wt = vec3<f32>(1.0, 2.0, 1.0);
    var norm = 1.0 / 8.0;
    if USE_SCHARR {
        wt = vec3<f32>(3.0, 10.0, 3.0);
        norm = 1.0 / 32.0;
    }

    var gx = 0.0;
    var gy = 0.0;
    for (var i = 0; i < 3; i = i + 1) {
        let o = i - 1;
        gx = gx + wt[i] * (height_at(xi + 1, yi + o) - height_at(xi - 1, yi + o));
        gy = gy + wt[i] * (height_at(xi + o, yi + 1) - height_at(xi + o, yi - 1));
    }

    let intensity = stage.params.x;
    let d = vec2<f32>(-gx * norm * intensity, -gy * norm * intensity);
    // pack4x8unorm clamps out-of-range xy.
    let dz = sqrt(max(0.0, 1.0 - dot(d, d)));
    let enc = vec3<f32>(d, dz) * 0.5 + vec3<f32>(0.5);
    dst[y * stage.dims.x + x] = pack4x8unorm(vec4<f32>(enc, 1.0));
}
"#;

/// Which stage program to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageProgram {
    BlurH,
    BlurV,
    Normal,
}

impl StageProgram {
    pub const ALL: [StageProgram; 3] = [Self::BlurH, Self::BlurV, Self::Normal];

    pub fn label(self) -> &'static str {
        match self {
            Self::BlurH => "blur_h",
            Self::BlurV => "blur_v",
            Self::Normal => "normal",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Self::BlurH => BLUR_H_BODY,
            Self::BlurV => BLUR_V_BODY,
            Self::Normal => NORMAL_BODY,
        }
    }
}

/// Full WGSL source of `program` for one kernel variant.
pub fn variant_source(program: StageProgram, tiling: bool, use_scharr: bool, workgroup: u32) -> String {
    format!(
        "const DO_TILING: bool = {tiling};\nconst USE_SCHARR: bool = {use_scharr};\nconst WG: u32 = {workgroup}u;\n{COMMON}{}",
        program.body()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_prefix() {
        let src = variant_source(StageProgram::Normal, true, false, 8);
        assert!(src.starts_with("const DO_TILING: bool = true;"));
        assert!(src.contains("const USE_SCHARR: bool = false;"));
        assert!(src.contains("const WG: u32 = 8u;"));
        assert!(src.contains("pack4x8unorm"));
    }
}
