use super::CameraRig;
use glam::Vec3;
use std::f32::consts::{PI, TAU};

const POLAR_EPSILON: f32 = 1e-6;
/// Closest the camera may get to the target; zooming multiplies the
/// distance, so it must stay positive to be able to move back out.
const DISTANCE_FLOOR: f32 = 1e-3;
const ZOOM_STEP: f32 = 0.95;
const REFERENCE_FPS: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// Revolutions per minute; the default turns once every ~9.5 s.
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: Option<f32>,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            auto_rotate: true,
            auto_rotate_speed: TAU,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: None,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
        }
    }
}

impl OrbitSettings {
    /// Auto-rotation rate in radians per second.
    pub fn auto_rotate_rate(&self) -> f32 {
        if self.auto_rotate {
            TAU / 60.0 * self.auto_rotate_speed
        } else {
            0.0
        }
    }
}

/// Orbit camera control around a fixed target with inertial damping and
/// continuous auto-rotation. Angles are spherical: `azimuth` around +Y
/// measured from +Z, `polar` down from +Y.
#[derive(Debug, Clone)]
pub struct OrbitInteraction {
    settings: OrbitSettings,
    target: Vec3,
    azimuth: f32,
    polar: f32,
    distance: f32,
    pending_azimuth: f32,
    pending_polar: f32,
    pending_scale: f32,
    dragging: bool,
    angular_velocity: f32,
    updates: u64,
}

impl OrbitInteraction {
    pub fn new(settings: OrbitSettings, camera: &CameraRig) -> Self {
        let target = camera.target();
        let offset = camera.position() - target;
        let distance = offset.length();
        let (azimuth, polar) = if distance > f32::EPSILON {
            (
                offset.x.atan2(offset.z),
                (offset.y / distance).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI * 0.5)
        };
        let mut orbit = Self {
            settings,
            target,
            azimuth,
            polar,
            distance,
            pending_azimuth: 0.0,
            pending_polar: 0.0,
            pending_scale: 1.0,
            dragging: false,
            angular_velocity: 0.0,
            updates: 0,
        };
        orbit.clamp_state();
        orbit
    }

    #[cfg(test)]
    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    #[cfg(test)]
    pub fn polar(&self) -> f32 {
        self.polar
    }

    #[cfg(test)]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Azimuthal rate applied by the most recent update with elapsed time,
    /// in radians per second.
    #[allow(dead_code)]
    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    #[cfg(test)]
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    #[cfg(test)]
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    /// Pointer motion in physical pixels. A drag across the full viewport
    /// height turns the camera one revolution.
    pub fn drag(&mut self, dx: f32, dy: f32, viewport_height: u32) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        let height = viewport_height.max(1) as f32;
        self.pending_azimuth -= TAU * dx / height * self.settings.rotate_speed;
        self.pending_polar -= TAU * dy / height * self.settings.rotate_speed;
    }

    /// Wheel notches; positive moves toward the target.
    pub fn zoom(&mut self, notches: f32) {
        if notches.is_finite() {
            self.pending_scale *= ZOOM_STEP.powf(self.settings.zoom_speed * notches);
        }
    }

    /// Pinch gesture: `ratio` is current over previous finger spread.
    pub fn pinch(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.pending_scale /= ratio.powf(self.settings.zoom_speed);
        }
    }

    /// Advance by `dt` seconds and place the camera.
    pub fn update(&mut self, dt: f32, camera: &mut CameraRig) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.updates = self.updates.wrapping_add(1);

        if !self.dragging {
            self.pending_azimuth -= self.settings.auto_rotate_rate() * dt;
        }

        let applied = if self.settings.enable_damping {
            let factor = self.settings.damping_factor.clamp(0.0, 1.0);
            1.0 - (1.0 - factor).powf(dt * REFERENCE_FPS)
        } else {
            1.0
        };
        let azimuth_step = self.pending_azimuth * applied;
        self.azimuth += azimuth_step;
        self.polar += self.pending_polar * applied;
        self.distance *= self.pending_scale;
        self.clamp_state();

        if dt > 0.0 {
            self.angular_velocity = azimuth_step / dt;
        }
        self.pending_azimuth -= azimuth_step;
        self.pending_polar *= 1.0 - applied;
        self.pending_scale = 1.0;

        camera.look_at(self.target + self.offset(), self.target);
    }

    fn offset(&self) -> Vec3 {
        let (sin_polar, cos_polar) = self.polar.sin_cos();
        let (sin_azimuth, cos_azimuth) = self.azimuth.sin_cos();
        Vec3::new(
            sin_polar * sin_azimuth,
            cos_polar,
            sin_polar * cos_azimuth,
        ) * self.distance
    }

    fn clamp_state(&mut self) {
        if self.azimuth.is_finite() {
            self.azimuth = (self.azimuth + PI).rem_euclid(TAU) - PI;
        } else {
            self.azimuth = 0.0;
        }
        let min_polar = self.settings.min_polar_angle.max(POLAR_EPSILON);
        let max_polar = self.settings.max_polar_angle.min(PI - POLAR_EPSILON);
        self.polar = if self.polar.is_finite() {
            self.polar.clamp(min_polar, max_polar.max(min_polar))
        } else {
            PI * 0.5
        };
        let max_distance = self.settings.max_distance.unwrap_or(f32::INFINITY);
        let min_distance = self.settings.min_distance.max(DISTANCE_FLOOR);
        self.distance = if self.distance.is_nan() {
            min_distance
        } else {
            self.distance
                .clamp(min_distance, max_distance.max(min_distance))
                .min(f32::MAX)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{CameraSettings, ViewportState};

    fn camera() -> CameraRig {
        CameraRig::new(&CameraSettings::default(), &ViewportState::new(800, 600))
    }

    #[test]
    fn starts_from_camera_placement() {
        let camera = camera();
        let orbit = OrbitInteraction::new(OrbitSettings::default(), &camera);
        assert!((orbit.distance() - 20.0).abs() < 1e-5);
        assert!(orbit.azimuth().abs() < 1e-6);
        assert!((orbit.polar() - PI * 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_dt_without_input_is_idempotent() {
        let mut camera = camera();
        let mut orbit = OrbitInteraction::new(OrbitSettings::default(), &camera);
        orbit.update(0.0, &mut camera);
        let (position, azimuth, polar) = (camera.position(), orbit.azimuth(), orbit.polar());
        for _ in 0..10 {
            orbit.update(0.0, &mut camera);
        }
        assert_eq!(orbit.azimuth(), azimuth);
        assert_eq!(orbit.polar(), polar);
        assert_eq!(camera.position(), position);
    }

    #[test]
    fn damped_velocity_settles_on_auto_rotate_rate() {
        let mut camera = camera();
        let settings = OrbitSettings::default();
        let auto_rate = -settings.auto_rotate_rate();
        let mut orbit = OrbitInteraction::new(settings, &camera);

        orbit.begin_drag();
        orbit.drag(300.0, 0.0, 600);
        orbit.update(1.0 / 60.0, &mut camera);
        orbit.end_drag();

        let mut previous_gap = (orbit.angular_velocity() - auto_rate).abs();
        for _ in 0..600 {
            orbit.update(1.0 / 60.0, &mut camera);
            let gap = (orbit.angular_velocity() - auto_rate).abs();
            assert!(gap <= previous_gap + 1e-4, "gap grew: {gap} > {previous_gap}");
            previous_gap = gap;
        }
        assert!(previous_gap < 1e-3);
    }

    #[test]
    fn auto_rotation_pauses_while_dragging() {
        let mut camera = camera();
        let mut orbit = OrbitInteraction::new(
            OrbitSettings {
                enable_damping: false,
                ..OrbitSettings::default()
            },
            &camera,
        );
        orbit.begin_drag();
        orbit.update(0.5, &mut camera);
        assert_eq!(orbit.azimuth(), 0.0);
        orbit.end_drag();
        orbit.update(0.5, &mut camera);
        assert!((orbit.azimuth() + TAU / 60.0 * TAU * 0.5).abs() < 1e-5);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut camera = camera();
        let mut orbit = OrbitInteraction::new(
            OrbitSettings {
                enable_damping: false,
                auto_rotate: false,
                ..OrbitSettings::default()
            },
            &camera,
        );
        orbit.drag(0.0, 10_000.0, 600);
        orbit.update(1.0 / 60.0, &mut camera);
        assert!(orbit.polar() > 0.0);
        assert!(camera.position().is_finite());
        orbit.drag(0.0, -20_000.0, 600);
        orbit.update(1.0 / 60.0, &mut camera);
        assert!(orbit.polar() < PI);
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut camera = camera();
        let mut orbit = OrbitInteraction::new(
            OrbitSettings {
                min_distance: 8.0,
                max_distance: Some(30.0),
                auto_rotate: false,
                ..OrbitSettings::default()
            },
            &camera,
        );
        orbit.zoom(1.0);
        orbit.update(0.0, &mut camera);
        assert!((orbit.distance() - 19.0).abs() < 1e-4);

        orbit.zoom(100.0);
        orbit.update(0.0, &mut camera);
        assert_eq!(orbit.distance(), 8.0);

        orbit.pinch(0.01);
        orbit.update(0.0, &mut camera);
        assert_eq!(orbit.distance(), 30.0);
        assert!((camera.position().length() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn zooming_all_the_way_in_can_zoom_back_out() {
        let mut camera = camera();
        let mut orbit = OrbitInteraction::new(
            OrbitSettings {
                auto_rotate: false,
                ..OrbitSettings::default()
            },
            &camera,
        );
        for _ in 0..30 {
            orbit.zoom(100.0);
            orbit.update(1.0 / 60.0, &mut camera);
        }
        assert_eq!(orbit.distance(), DISTANCE_FLOOR);
        assert!(camera.view_matrix().is_finite());

        for _ in 0..2 {
            orbit.zoom(-100.0);
            orbit.update(1.0 / 60.0, &mut camera);
        }
        assert!(orbit.distance() > 1.0, "distance {}", orbit.distance());
        assert!(camera.view_matrix().is_finite());
    }
}
