pub mod pipeline;

pub use pipeline::{AssetEvent, AssetPipeline, AssetSources};

use crate::environment::EnvironmentError;
use glam::Vec3;
use image::ImageReader;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Panorama,
    ColorMap,
    BumpMap,
    SpecularMap,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Panorama,
        AssetKind::ColorMap,
        AssetKind::BumpMap,
        AssetKind::SpecularMap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Panorama => "panorama",
            AssetKind::ColorMap => "color map",
            AssetKind::BumpMap => "bump map",
            AssetKind::SpecularMap => "specular map",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Requested decode precision for panoramic radiance images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanoramaPrecision {
    /// 8 bits per channel, values clipped to [0, 1].
    Standard,
    /// 32-bit float per channel, highlights above 1.0 preserved.
    #[default]
    Float,
}

/// Decoded RGBA8 texture. Pixel storage is shared and never mutated.
#[derive(Clone)]
pub struct Texture2D {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Texture2D {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for Texture2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture2D")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Decoded equirectangular radiance image, row-major with row 0 at the zenith.
#[derive(Clone)]
pub struct PanoramicImage {
    width: u32,
    height: u32,
    precision: PanoramaPrecision,
    pixels: Arc<[Vec3]>,
}

impl PanoramicImage {
    pub fn new(
        width: u32,
        height: u32,
        precision: PanoramaPrecision,
        pixels: Vec<Vec3>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(DecodeError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            precision,
            pixels: pixels.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn precision(&self) -> PanoramaPrecision {
        self.precision
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }
}

impl fmt::Debug for PanoramicImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanoramicImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("decoded image has zero size")]
    Empty,
    #[error("pixel buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load {kind} from {path}: {source}")]
    Load {
        kind: AssetKind,
        path: String,
        #[source]
        source: DecodeError,
    },
    #[error("failed to derive environment map from {path}: {source}")]
    Environment {
        path: String,
        #[source]
        source: EnvironmentError,
    },
    #[error("{kind} load ended before completing")]
    Interrupted { kind: AssetKind },
}

impl AssetError {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetError::Load { kind, .. } | AssetError::Interrupted { kind } => *kind,
            AssetError::Environment { .. } => AssetKind::Panorama,
        }
    }
}

/// Image decoding collaborator. Implementations are called from loader threads.
pub trait ImageDecoder: Send + Sync {
    fn load_texture(&self, path: &Path) -> Result<Texture2D, DecodeError>;

    fn load_panorama(
        &self,
        path: &Path,
        precision: PanoramaPrecision,
    ) -> Result<PanoramicImage, DecodeError>;
}

/// Decodes image files from disk with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageDecoder;

impl ImageDecoder for FsImageDecoder {
    fn load_texture(&self, path: &Path) -> Result<Texture2D, DecodeError> {
        let decoded = decode_file(path)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Texture2D::new(width, height, decoded.into_raw())
    }

    fn load_panorama(
        &self,
        path: &Path,
        precision: PanoramaPrecision,
    ) -> Result<PanoramicImage, DecodeError> {
        let decoded = decode_file(path)?;
        let (width, height, pixels) = match precision {
            PanoramaPrecision::Float => {
                let rgb = decoded.to_rgb32f();
                let pixels = rgb
                    .pixels()
                    .map(|pixel| Vec3::from_array(pixel.0))
                    .collect();
                (rgb.width(), rgb.height(), pixels)
            }
            PanoramaPrecision::Standard => {
                let rgb = decoded.to_rgb8();
                let pixels = rgb
                    .pixels()
                    .map(|pixel| {
                        let [r, g, b] = pixel.0;
                        Vec3::new(r as f32, g as f32, b as f32) / 255.0
                    })
                    .collect();
                (rgb.width(), rgb.height(), pixels)
            }
        };
        PanoramicImage::new(width, height, precision, pixels)
    }
}

fn decode_file(path: &Path) -> Result<image::DynamicImage, DecodeError> {
    let read_error = |source| DecodeError::Read {
        path: path.display().to_string(),
        source,
    };
    ImageReader::open(path)
        .map_err(read_error)?
        .with_guessed_format()
        .map_err(read_error)?
        .decode()
        .map_err(|source| DecodeError::Image {
            path: path.display().to_string(),
            source,
        })
}
