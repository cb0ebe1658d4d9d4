use super::ViewportState;
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 2000.0,
            position: [0.0, 0.0, 20.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

/// Perspective camera. The aspect ratio always comes from the viewport and
/// the projection is rebuilt whenever it changes.
#[derive(Debug, Clone)]
pub struct CameraRig {
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vec3,
    target: Vec3,
    projection: Mat4,
}

impl CameraRig {
    pub fn new(settings: &CameraSettings, viewport: &ViewportState) -> Self {
        let mut rig = Self {
            fov_degrees: settings.fov_degrees.clamp(1.0, 179.0),
            aspect: 1.0,
            near: settings.near.max(1e-4),
            far: settings.far.max(settings.near.max(1e-4) * 2.0),
            position: Vec3::from_array(settings.position),
            target: Vec3::from_array(settings.target),
            projection: Mat4::IDENTITY,
        };
        rig.sync_viewport(viewport);
        rig
    }

    pub fn sync_viewport(&mut self, viewport: &ViewportState) {
        self.aspect = viewport.aspect_ratio();
        self.projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3) {
        if position.is_finite() && target.is_finite() {
            self.position = position;
            self.target = target;
        }
    }

    #[cfg(test)]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}
