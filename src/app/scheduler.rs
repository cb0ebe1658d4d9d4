use crate::render::{OrbitInteraction, RenderSurface};
use crate::scene::SceneGraph;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const FAILURE_LOG_INTERVAL: u64 = 120;

/// Cloneable stop flag shared with whoever hosts the view.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rendered,
    RenderFailed,
    Stopped,
}

/// One update-then-render step per display refresh.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    stop: StopHandle,
    frames: u64,
    consecutive_failures: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick(
        &mut self,
        dt: f32,
        orbit: &mut OrbitInteraction,
        scene: &mut SceneGraph,
        surface: &mut dyn RenderSurface,
    ) -> TickOutcome {
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }
        orbit.update(dt, scene.camera_mut());
        if self.stop.is_stopped() {
            return TickOutcome::Stopped;
        }

        self.frames += 1;
        match surface.render(scene, scene.camera()) {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    log::info!(
                        "Rendering recovered after {} failed frames",
                        self.consecutive_failures
                    );
                    self.consecutive_failures = 0;
                }
                TickOutcome::Rendered
            }
            Err(err) => {
                if self.consecutive_failures % FAILURE_LOG_INTERVAL == 0 {
                    log::error!("Frame {} failed to render: {}", self.frames, err);
                }
                self.consecutive_failures += 1;
                TickOutcome::RenderFailed
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::render::{
        CameraRig, CameraSettings, OrbitSettings, RenderError, ViewportState,
    };
    use crate::scene::DirectionalLight;
    use glam::Vec3;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SurfaceCall {
        SetSize(u32, u32),
        SetPixelDensity(f32),
        Render { camera: Vec3, aspect: f32, mesh: bool },
    }

    /// Render surface that records every call, optionally failing renders.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingSurface {
        pub calls: Arc<std::sync::Mutex<Vec<SurfaceCall>>>,
        pub fail_renders: bool,
    }

    impl RecordingSurface {
        pub fn calls(&self) -> Vec<SurfaceCall> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }

        pub fn renders(&self) -> Vec<SurfaceCall> {
            self.calls()
                .into_iter()
                .filter(|call| matches!(call, SurfaceCall::Render { .. }))
                .collect()
        }

        fn record(&self, call: SurfaceCall) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    impl RenderSurface for RecordingSurface {
        fn set_size(&mut self, width: u32, height: u32) {
            self.record(SurfaceCall::SetSize(width, height));
        }

        fn set_pixel_density(&mut self, factor: f32) {
            self.record(SurfaceCall::SetPixelDensity(factor));
        }

        fn render(&mut self, scene: &SceneGraph, camera: &CameraRig) -> Result<(), RenderError> {
            self.record(SurfaceCall::Render {
                camera: camera.position(),
                aspect: camera.aspect_ratio(),
                mesh: scene.mesh().is_some(),
            });
            if self.fail_renders {
                return Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory));
            }
            Ok(())
        }
    }

    fn fixture() -> (OrbitInteraction, SceneGraph) {
        let camera = CameraRig::new(&CameraSettings::default(), &ViewportState::new(800, 600));
        let orbit = OrbitInteraction::new(OrbitSettings::default(), &camera);
        (orbit, SceneGraph::new(DirectionalLight::default(), camera))
    }

    #[test]
    fn every_render_follows_its_own_update() {
        let (mut orbit, mut scene) = fixture();
        let mut surface = RecordingSurface::default();
        let mut scheduler = FrameScheduler::new();

        let mut seen = Vec::new();
        for frame in 1..=5u64 {
            let outcome = scheduler.tick(1.0 / 60.0, &mut orbit, &mut scene, &mut surface);
            assert_eq!(outcome, TickOutcome::Rendered);
            assert_eq!(orbit.update_count(), frame);
            assert_eq!(surface.renders().len() as u64, frame);
            match surface.renders().last() {
                Some(SurfaceCall::Render { camera, .. }) => {
                    assert_eq!(*camera, scene.camera().position());
                    seen.push(*camera);
                }
                other => panic!("unexpected call {other:?}"),
            }
        }
        // auto-rotation moves the camera every frame, so no render reuses a
        // stale transform
        assert!(seen.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn render_failures_do_not_escape() {
        let (mut orbit, mut scene) = fixture();
        let mut surface = RecordingSurface {
            fail_renders: true,
            ..RecordingSurface::default()
        };
        let mut scheduler = FrameScheduler::new();
        for _ in 0..3 {
            assert_eq!(
                scheduler.tick(0.016, &mut orbit, &mut scene, &mut surface),
                TickOutcome::RenderFailed
            );
        }
        surface.fail_renders = false;
        assert_eq!(
            scheduler.tick(0.016, &mut orbit, &mut scene, &mut surface),
            TickOutcome::Rendered
        );
        assert_eq!(scheduler.frames(), 4);
    }

    #[test]
    fn stop_flag_halts_before_update_and_render() {
        let (mut orbit, mut scene) = fixture();
        let mut surface = RecordingSurface::default();
        let mut scheduler = FrameScheduler::new();
        scheduler.tick(0.016, &mut orbit, &mut scene, &mut surface);

        let handle = scheduler.stop_handle();
        handle.stop();
        assert!(scheduler.stop_handle().is_stopped());
        assert_eq!(
            scheduler.tick(0.016, &mut orbit, &mut scene, &mut surface),
            TickOutcome::Stopped
        );
        assert_eq!(orbit.update_count(), 1);
        assert_eq!(surface.renders().len(), 1);
    }
}
