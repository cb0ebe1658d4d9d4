mod camera;
pub mod gpu;
mod orbit;
mod upload;
mod viewport;

pub use camera::{CameraRig, CameraSettings};
pub use gpu::GpuSurface;
pub use orbit::{OrbitInteraction, OrbitSettings};
pub use viewport::{ResizeError, ViewportState};

use crate::scene::SceneGraph;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported texture format")]
    NoSurfaceFormat,
    #[error("failed to acquire frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Draws the scene graph into a window-owned surface.
pub trait RenderSurface {
    fn set_size(&mut self, width: u32, height: u32);
    fn set_pixel_density(&mut self, factor: f32);
    fn render(&mut self, scene: &SceneGraph, camera: &CameraRig) -> Result<(), RenderError>;
}

/// Backbuffer and presentation settings.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Render target scale relative to the window's physical size.
    pub pixel_density: f32,
    pub clear_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pixel_density: 2.0,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}
