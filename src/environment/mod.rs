//! Converts an equirectangular radiance panorama into prefiltered cubemaps
//! usable for image-based lighting.
//!
//! The specular cubemap stores one mip level per roughness step (level 0 is a
//! straight resample, the last level is fully rough). The irradiance cubemap
//! stores cosine-weighted average radiance, so a Lambertian surface reflects
//! `albedo * irradiance`.

use crate::assets::{PanoramaPrecision, PanoramicImage};
use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};
use std::time::Instant;

pub const CUBE_FACES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PrefilterSettings {
    pub specular_size: u32,
    pub specular_levels: u32,
    pub specular_samples: u32,
    pub irradiance_size: u32,
    pub irradiance_samples: u32,
}

impl Default for PrefilterSettings {
    fn default() -> Self {
        Self {
            specular_size: 128,
            specular_levels: 6,
            specular_samples: 128,
            irradiance_size: 32,
            irradiance_samples: 64,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("panorama was decoded at standard precision; floating-point radiance is required")]
    LowPrecision,
    #[error("panorama of {width}x{height} is too small to map onto a sphere")]
    Degenerate { width: u32, height: u32 },
    #[error("panorama holds non-finite radiance at ({x}, {y})")]
    NonFinite { x: u32, y: u32 },
    #[error("invalid prefilter settings: {0}")]
    Settings(&'static str),
}

/// One square RGBA f32 level of a cubemap, faces ordered +X, -X, +Y, -Y, +Z, -Z.
#[derive(Debug, Clone, PartialEq)]
pub struct CubemapLevel {
    size: u32,
    roughness: f32,
    faces: [Vec<f32>; CUBE_FACES],
}

impl CubemapLevel {
    pub fn size(&self) -> u32 {
        self.size
    }

    #[allow(dead_code)]
    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    pub fn face(&self, face: usize) -> &[f32] {
        &self.faces[face]
    }

    /// Nearest-texel lookup along `dir`.
    #[cfg(test)]
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        let (face, a, b) = direction_to_face(dir);
        let to_texel = |coord: f32| {
            let scaled = (coord + 1.0) * 0.5 * self.size as f32;
            (scaled.floor() as i64).clamp(0, self.size as i64 - 1) as u32
        };
        let (x, y) = (to_texel(a), to_texel(b));
        let idx = ((y * self.size + x) * 4) as usize;
        let data = &self.faces[face];
        Vec3::new(data[idx], data[idx + 1], data[idx + 2])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cubemap {
    levels: Vec<CubemapLevel>,
}

impl Cubemap {
    pub fn levels(&self) -> &[CubemapLevel] {
        &self.levels
    }

    pub fn base_size(&self) -> u32 {
        self.levels.first().map(|level| level.size).unwrap_or(0)
    }
}

/// Prefiltered lighting derived from one panorama. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    specular: Cubemap,
    irradiance: Cubemap,
}

impl EnvironmentMap {
    pub fn specular(&self) -> &Cubemap {
        &self.specular
    }

    pub fn irradiance(&self) -> &Cubemap {
        &self.irradiance
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentMapper {
    settings: PrefilterSettings,
}

impl EnvironmentMapper {
    pub fn new(settings: PrefilterSettings) -> Self {
        Self { settings }
    }

    pub fn derive(&self, panorama: &PanoramicImage) -> Result<EnvironmentMap, EnvironmentError> {
        self.validate()?;
        if panorama.precision() != PanoramaPrecision::Float {
            return Err(EnvironmentError::LowPrecision);
        }
        if panorama.width() < 2 || panorama.height() < 2 {
            return Err(EnvironmentError::Degenerate {
                width: panorama.width(),
                height: panorama.height(),
            });
        }
        if let Some(index) = panorama
            .pixels()
            .iter()
            .position(|pixel| !pixel.is_finite() || pixel.min_element() < 0.0)
        {
            let index = index as u32;
            return Err(EnvironmentError::NonFinite {
                x: index % panorama.width(),
                y: index / panorama.width(),
            });
        }

        let started = Instant::now();
        let specular = compute_specular_cubemap(panorama, &self.settings);
        let irradiance = compute_irradiance_cubemap(panorama, &self.settings);
        log::debug!(
            "Prefiltered {}x{} panorama in {:.1} ms ({} specular levels)",
            panorama.width(),
            panorama.height(),
            started.elapsed().as_secs_f64() * 1000.0,
            specular.levels.len()
        );
        Ok(EnvironmentMap {
            specular,
            irradiance,
        })
    }

    fn validate(&self) -> Result<(), EnvironmentError> {
        let s = &self.settings;
        if s.specular_size == 0 || s.irradiance_size == 0 {
            return Err(EnvironmentError::Settings("cubemap sizes must be non-zero"));
        }
        if s.specular_levels == 0 {
            return Err(EnvironmentError::Settings("at least one specular level is required"));
        }
        if s.specular_levels > s.specular_size.ilog2() + 1 {
            return Err(EnvironmentError::Settings(
                "more specular levels than the base size can halve into",
            ));
        }
        if s.specular_samples == 0 || s.irradiance_samples == 0 {
            return Err(EnvironmentError::Settings("sample counts must be non-zero"));
        }
        Ok(())
    }
}

fn empty_faces(size: u32) -> [Vec<f32>; CUBE_FACES] {
    std::array::from_fn(|_| vec![0.0; (size * size * 4) as usize])
}

fn write_texel(data: &mut [f32], size: u32, x: u32, y: u32, color: Vec3) {
    let idx = ((y * size + x) * 4) as usize;
    data[idx] = color.x;
    data[idx + 1] = color.y;
    data[idx + 2] = color.z;
    data[idx + 3] = 1.0;
}

fn compute_specular_cubemap(image: &PanoramicImage, settings: &PrefilterSettings) -> Cubemap {
    let level_count = settings.specular_levels;
    let mut levels = Vec::with_capacity(level_count as usize);
    for mip in 0..level_count {
        let size = (settings.specular_size >> mip).max(1);
        let roughness = mip as f32 / (level_count as f32 - 1.0).max(1.0);
        let mut faces = empty_faces(size);
        for (face, data) in faces.iter_mut().enumerate() {
            for y in 0..size {
                for x in 0..size {
                    let r = cubemap_direction(face, x, y, size);
                    let color = if mip == 0 {
                        sample_equirect(image, r)
                    } else {
                        prefilter_ggx(image, r, roughness, settings.specular_samples)
                    };
                    write_texel(data, size, x, y, color);
                }
            }
        }
        levels.push(CubemapLevel {
            size,
            roughness,
            faces,
        });
    }
    Cubemap { levels }
}

fn prefilter_ggx(image: &PanoramicImage, r: Vec3, roughness: f32, samples: u32) -> Vec3 {
    let mut color = Vec3::ZERO;
    let mut weight_sum = 0.0f32;
    for sample in 0..samples {
        let xi = hammersley(sample, samples);
        let h = importance_sample_ggx(r, xi, roughness);
        let l = reflect(-r, h).normalize();
        let n_dot_l = r.dot(l);
        if n_dot_l > 0.0 {
            color += sample_equirect(image, l) * n_dot_l;
            weight_sum += n_dot_l;
        }
    }
    if weight_sum > 0.0 {
        color / weight_sum
    } else {
        sample_equirect(image, r)
    }
}

fn compute_irradiance_cubemap(image: &PanoramicImage, settings: &PrefilterSettings) -> Cubemap {
    let size = settings.irradiance_size;
    let samples = settings.irradiance_samples;
    let mut faces = empty_faces(size);
    for (face, data) in faces.iter_mut().enumerate() {
        for y in 0..size {
            for x in 0..size {
                let n = cubemap_direction(face, x, y, size);
                let mut result = Vec3::ZERO;
                let mut weight_sum = 0.0f32;
                for sample in 0..samples {
                    let xi = hammersley(sample, samples);
                    let dir = cosine_sample_hemisphere(n, xi);
                    let n_dot_l = n.dot(dir).max(0.0);
                    if n_dot_l > 0.0 {
                        result += sample_equirect(image, dir) * n_dot_l;
                        weight_sum += n_dot_l;
                    }
                }
                if weight_sum > 0.0 {
                    result /= weight_sum;
                }
                write_texel(data, size, x, y, result);
            }
        }
    }
    Cubemap {
        levels: vec![CubemapLevel {
            size,
            roughness: 1.0,
            faces,
        }],
    }
}

fn sample_equirect(image: &PanoramicImage, dir: Vec3) -> Vec3 {
    let d = dir.normalize();
    let theta = d.y.clamp(-1.0, 1.0).acos();
    let phi = d.z.atan2(d.x);
    let u = (phi + PI) / TAU;
    let v = theta / PI;
    // texel centres; x wraps across the u = 0 / u = 1 seam
    let x = u * image.width() as f32 - 0.5;
    let y = v * image.height() as f32 - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;

    let width = image.width() as f32;
    let max_y = (image.height() - 1) as f32;
    let ix0 = x0.rem_euclid(width) as u32;
    let ix1 = (x0 + 1.0).rem_euclid(width) as u32;
    let iy0 = y0.clamp(0.0, max_y) as u32;
    let iy1 = (y0 + 1.0).clamp(0.0, max_y) as u32;

    let c0 = image.pixel(ix0, iy0).lerp(image.pixel(ix1, iy0), tx);
    let c1 = image.pixel(ix0, iy1).lerp(image.pixel(ix1, iy1), tx);
    c0.lerp(c1, ty)
}

fn cubemap_direction(face: usize, x: u32, y: u32, size: u32) -> Vec3 {
    let a = (2.0 * (x as f32 + 0.5) / size as f32) - 1.0;
    let b = (2.0 * (y as f32 + 0.5) / size as f32) - 1.0;
    match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    }
    .normalize()
}

/// Inverse of `cubemap_direction`: face index plus face coordinates in [-1, 1].
#[cfg(test)]
fn direction_to_face(dir: Vec3) -> (usize, f32, f32) {
    let abs = dir.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        if dir.x > 0.0 {
            (0, -dir.z / abs.x, -dir.y / abs.x)
        } else {
            (1, dir.z / abs.x, -dir.y / abs.x)
        }
    } else if abs.y >= abs.z {
        if dir.y > 0.0 {
            (2, dir.x / abs.y, dir.z / abs.y)
        } else {
            (3, dir.x / abs.y, -dir.z / abs.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x / abs.z, -dir.y / abs.z)
    } else {
        (5, -dir.x / abs.z, -dir.y / abs.z)
    }
}

fn cosine_sample_hemisphere(normal: Vec3, xi: Vec2) -> Vec3 {
    let r = xi.x.sqrt();
    let theta = TAU * xi.y;
    let local = Vec3::new(r * theta.cos(), r * theta.sin(), (1.0 - xi.x).sqrt());
    tangent_to_world(normal, local)
}

fn importance_sample_ggx(normal: Vec3, xi: Vec2, roughness: f32) -> Vec3 {
    let a = (roughness * roughness).max(0.001);
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    tangent_to_world(normal, h)
}

fn tangent_to_world(normal: Vec3, vec: Vec3) -> Vec3 {
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = normal.cross(up).normalize();
    let bitangent = normal.cross(tangent);
    tangent * vec.x + bitangent * vec.y + normal * vec.z
}

fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

fn radical_inverse_vdc(bits: u32) -> f32 {
    bits.reverse_bits() as f32 * 2.328_306_4e-10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> PrefilterSettings {
        PrefilterSettings {
            specular_size: 8,
            specular_levels: 3,
            specular_samples: 16,
            irradiance_size: 4,
            irradiance_samples: 16,
        }
    }

    fn uniform_panorama(color: Vec3) -> PanoramicImage {
        PanoramicImage::new(16, 8, PanoramaPrecision::Float, vec![color; 16 * 8])
            .expect("panorama")
    }

    fn gradient_panorama() -> PanoramicImage {
        let (width, height) = (32u32, 16u32);
        let pixels = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    Vec3::new(x as f32 / width as f32, 1.0 - y as f32 / height as f32, 0.25)
                })
            })
            .collect();
        PanoramicImage::new(width, height, PanoramaPrecision::Float, pixels).expect("panorama")
    }

    #[test]
    fn equirect_lookup_is_continuous_across_the_seam() {
        let (width, height) = (8u32, 4u32);
        let pixels = (0..height)
            .flat_map(|_| {
                (0..width).map(move |x| match x {
                    0 => Vec3::ZERO,
                    x if x == width - 1 => Vec3::ONE,
                    _ => Vec3::splat(0.5),
                })
            })
            .collect();
        let panorama =
            PanoramicImage::new(width, height, PanoramaPrecision::Float, pixels).expect("panorama");

        let above = sample_equirect(&panorama, Vec3::new(-1.0, 0.0, 1e-4));
        let below = sample_equirect(&panorama, Vec3::new(-1.0, 0.0, -1e-4));
        assert!((above - below).abs().max_element() < 1e-3, "{above} vs {below}");
        assert!((above - Vec3::splat(0.5)).abs().max_element() < 1e-3);
    }

    #[test]
    fn uniform_panorama_stays_uniform() {
        let color = Vec3::new(0.2, 0.5, 3.0);
        let map = EnvironmentMapper::new(small_settings())
            .derive(&uniform_panorama(color))
            .expect("derive");
        let levels = map.specular().levels().iter().chain(map.irradiance().levels());
        for level in levels {
            for face in 0..CUBE_FACES {
                for texel in level.face(face).chunks_exact(4) {
                    let value = Vec3::new(texel[0], texel[1], texel[2]);
                    assert!((value - color).abs().max_element() < 1e-4, "{value:?}");
                    assert_eq!(texel[3], 1.0);
                }
            }
        }
    }

    #[test]
    fn specular_levels_halve_and_ramp_roughness() {
        let map = EnvironmentMapper::new(small_settings())
            .derive(&gradient_panorama())
            .expect("derive");
        let sizes: Vec<u32> = map.specular().levels().iter().map(|l| l.size()).collect();
        let roughness: Vec<f32> = map
            .specular()
            .levels()
            .iter()
            .map(|l| l.roughness())
            .collect();
        assert_eq!(sizes, vec![8, 4, 2]);
        assert_eq!(roughness, vec![0.0, 0.5, 1.0]);
        assert_eq!(map.irradiance().base_size(), 4);
    }

    #[test]
    fn derivation_is_deterministic() {
        let mapper = EnvironmentMapper::new(small_settings());
        let panorama = gradient_panorama();
        let first = mapper.derive(&panorama).expect("first");
        let second = mapper.derive(&panorama).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn highlights_are_not_clipped() {
        let mut pixels = vec![Vec3::splat(0.1); 16 * 8];
        // a bright band across the zenith row
        for pixel in pixels.iter_mut().take(16) {
            *pixel = Vec3::splat(40.0);
        }
        let panorama =
            PanoramicImage::new(16, 8, PanoramaPrecision::Float, pixels).expect("panorama");
        let map = EnvironmentMapper::new(small_settings())
            .derive(&panorama)
            .expect("derive");
        let up = map.specular().levels()[0].sample(Vec3::Y);
        assert!(up.x > 1.0, "zenith radiance was clipped: {up:?}");
    }

    #[test]
    fn rejects_standard_precision() {
        let panorama =
            PanoramicImage::new(4, 2, PanoramaPrecision::Standard, vec![Vec3::ONE; 8]).unwrap();
        let err = EnvironmentMapper::new(small_settings())
            .derive(&panorama)
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::LowPrecision));
    }

    #[test]
    fn rejects_non_finite_radiance() {
        let mut pixels = vec![Vec3::ONE; 8];
        pixels[5] = Vec3::new(f32::NAN, 0.0, 0.0);
        let panorama = PanoramicImage::new(4, 2, PanoramaPrecision::Float, pixels).unwrap();
        let err = EnvironmentMapper::new(small_settings())
            .derive(&panorama)
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::NonFinite { x: 1, y: 1 }));
    }

    #[test]
    fn rejects_too_many_levels() {
        let settings = PrefilterSettings {
            specular_size: 4,
            specular_levels: 4,
            ..small_settings()
        };
        let err = EnvironmentMapper::new(settings)
            .derive(&uniform_panorama(Vec3::ONE))
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::Settings(_)));
    }

    #[test]
    fn face_lookup_inverts_face_directions() {
        let size = 8;
        for face in 0..CUBE_FACES {
            for (x, y) in [(0, 0), (3, 5), (7, 7)] {
                let dir = cubemap_direction(face, x, y, size);
                let (found, a, b) = direction_to_face(dir);
                assert_eq!(found, face);
                let expected_a = (2.0 * (x as f32 + 0.5) / size as f32) - 1.0;
                let expected_b = (2.0 * (y as f32 + 0.5) / size as f32) - 1.0;
                assert!((a - expected_a).abs() < 1e-5);
                assert!((b - expected_b).abs() < 1e-5);
            }
        }
    }
}
