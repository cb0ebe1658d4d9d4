pub mod assembly;
pub mod geometry;

pub use assembly::{AssemblyState, SceneAssembly};
pub use geometry::{MeshData, SphereGeometry, Vertex};

use crate::assets::Texture2D;
use crate::environment::EnvironmentMap;
use crate::render::CameraRig;
use glam::Vec3;
use std::sync::Arc;

/// Orthographic bounds of the directional light's shadow camera.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShadowCamera {
    pub near: f32,
    pub far: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            near: 0.5,
            far: 100.0,
            left: -10.0,
            right: 10.0,
            top: 10.0,
            bottom: -10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    pub enabled: bool,
    pub map_size: u32,
    pub camera: ShadowCamera,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            map_size: 512,
            camera: ShadowCamera::default(),
        }
    }
}

/// Directional light data - static after startup.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub shadow: ShadowSettings,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            intensity: 3.5,
            position: [0.0, 15.0, 10.0],
            target: [0.0, 0.0, 0.0],
            shadow: ShadowSettings::default(),
        }
    }
}

impl DirectionalLight {
    /// Unit vector from the lit surface toward the light.
    pub fn direction_to_light(&self) -> Vec3 {
        (Vec3::from_array(self.position) - Vec3::from_array(self.target))
            .try_normalize()
            .unwrap_or(Vec3::Y)
    }

    pub fn radiance(&self) -> Vec3 {
        Vec3::from_array(self.color) * self.intensity
    }
}

/// Scalar material parameters applied on top of the texture maps.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaterialSettings {
    pub roughness: f32,
    pub bump_scale: f32,
    pub sheen: f32,
    pub clearcoat: f32,
    pub env_map_intensity: f32,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            roughness: 0.7,
            bump_scale: 0.6,
            sheen: 0.5,
            clearcoat: 0.5,
            env_map_intensity: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMaterial {
    pub color_map: Texture2D,
    pub bump_map: Texture2D,
    pub roughness_map: Texture2D,
    pub environment: Arc<EnvironmentMap>,
    pub params: MaterialSettings,
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    geometry: SphereGeometry,
    data: MeshData,
    material: SphereMaterial,
}

impl SphereMesh {
    pub fn new(geometry: SphereGeometry, material: SphereMaterial) -> Self {
        Self {
            data: geometry.build(),
            geometry,
            material,
        }
    }

    pub fn geometry(&self) -> &SphereGeometry {
        &self.geometry
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    pub fn material(&self) -> &SphereMaterial {
        &self.material
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene already holds the sphere mesh")]
    MeshAlreadyPresent,
}

/// The persistent scene: light and camera from startup, the sphere once its
/// assets are ready.
#[derive(Debug)]
pub struct SceneGraph {
    light: DirectionalLight,
    camera: CameraRig,
    mesh: Option<SphereMesh>,
}

impl SceneGraph {
    pub fn new(light: DirectionalLight, camera: CameraRig) -> Self {
        Self {
            light,
            camera,
            mesh: None,
        }
    }

    pub fn light(&self) -> &DirectionalLight {
        &self.light
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    pub fn mesh(&self) -> Option<&SphereMesh> {
        self.mesh.as_ref()
    }

    pub fn insert_mesh(&mut self, mesh: SphereMesh) -> Result<(), SceneError> {
        if self.mesh.is_some() {
            return Err(SceneError::MeshAlreadyPresent);
        }
        self.mesh = Some(mesh);
        Ok(())
    }

    /// Light, camera and (when present) the sphere.
    #[cfg(test)]
    pub fn object_count(&self) -> usize {
        2 + usize::from(self.mesh.is_some())
    }
}
