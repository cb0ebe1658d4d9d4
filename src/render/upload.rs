//! CPU-side preparation of GPU data: uniform layout, mip chains and half
//! float conversion.

use super::CameraRig;
use crate::environment::Cubemap;
use crate::scene::{MaterialSettings, SceneGraph};

/// Per-frame shader constants. Layout matches `Frame` in `sphere.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_radiance: [f32; 4],
    /// roughness, bump scale, sheen, clearcoat
    pub material: [f32; 4],
    /// environment intensity, highest specular mip
    pub environment: [f32; 4],
}

impl FrameUniforms {
    pub fn new(scene: &SceneGraph, camera: &CameraRig) -> Self {
        let light = scene.light();
        let (material, environment) = match scene.mesh() {
            Some(mesh) => {
                let params = mesh.material().params;
                let levels = mesh.material().environment.specular().levels().len();
                (params, levels.saturating_sub(1) as f32)
            }
            None => (MaterialSettings::default(), 0.0),
        };
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position().extend(1.0).to_array(),
            light_direction: light.direction_to_light().extend(0.0).to_array(),
            light_radiance: light.radiance().extend(1.0).to_array(),
            material: [
                material.roughness,
                material.bump_scale,
                material.sheen,
                material.clearcoat,
            ],
            environment: [material.env_map_intensity, environment, 0.0, 0.0],
        }
    }
}

pub(crate) struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Full RGBA8 mip chain down to 1x1, each level a 2x2 box filter of the
/// previous one.
pub(crate) fn rgba8_mip_chain(width: u32, height: u32, pixels: &[u8]) -> Vec<MipLevel> {
    let mut levels = vec![MipLevel {
        width,
        height,
        pixels: pixels.to_vec(),
    }];
    while let Some(last) = levels.last() {
        if last.width == 1 && last.height == 1 {
            break;
        }
        let next = downsample(last);
        levels.push(next);
    }
    levels
}

/// Drop leading levels until the base fits within `max_dimension` on both
/// sides. The 1x1 tail always survives.
pub(crate) fn fit_mip_chain(mut chain: Vec<MipLevel>, max_dimension: u32) -> Vec<MipLevel> {
    let max_dimension = max_dimension.max(1);
    let skip = chain
        .iter()
        .position(|level| level.width <= max_dimension && level.height <= max_dimension)
        .unwrap_or(chain.len().saturating_sub(1));
    chain.drain(..skip);
    chain
}

fn downsample(level: &MipLevel) -> MipLevel {
    let width = (level.width / 2).max(1);
    let height = (level.height / 2).max(1);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let x0 = (x * 2).min(level.width - 1);
            let x1 = (x * 2 + 1).min(level.width - 1);
            let y0 = (y * 2).min(level.height - 1);
            let y1 = (y * 2 + 1).min(level.height - 1);
            for channel in 0..4 {
                let texel = |sx: u32, sy: u32| {
                    u32::from(level.pixels[((sy * level.width + sx) * 4 + channel) as usize])
                };
                let sum = texel(x0, y0) + texel(x1, y0) + texel(x0, y1) + texel(x1, y1);
                pixels.push(((sum + 2) / 4) as u8);
            }
        }
    }
    MipLevel {
        width,
        height,
        pixels,
    }
}

pub(crate) fn f32_to_f16_bits(values: &[f32]) -> Vec<u16> {
    values
        .iter()
        .map(|&value| half::f16::from_f32(value).to_bits())
        .collect()
}

/// Half-float texel data for every level and face, ordered level-major.
pub(crate) fn cubemap_faces_f16(cubemap: &Cubemap) -> Vec<(u32, u32, usize, Vec<u16>)> {
    let mut faces = Vec::new();
    for (mip, level) in cubemap.levels().iter().enumerate() {
        for face in 0..crate::environment::CUBE_FACES {
            faces.push((
                mip as u32,
                level.size(),
                face,
                f32_to_f16_bits(level.face(face)),
            ));
        }
    }
    faces
}

/// Offscreen target size for a window size and pixel density, kept within
/// the device's texture limit.
pub(crate) fn target_size(width: u32, height: u32, density: f32, max_dimension: u32) -> (u32, u32) {
    let density = if density.is_finite() && density > 0.0 {
        density
    } else {
        1.0
    };
    let max_dimension = max_dimension.max(1);
    let scale = |side: u32| ((side.max(1) as f32 * density).round() as u32).clamp(1, max_dimension);
    (scale(width), scale(height))
}
