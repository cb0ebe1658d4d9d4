use super::input::{Gesture, PointerState};
use super::scheduler::{FrameScheduler, StopHandle, TickOutcome};
use crate::assets::{AssetEvent, AssetPipeline, AssetSources, ImageDecoder};
use crate::config::ViewerConfig;
use crate::environment::EnvironmentMapper;
use crate::render::{
    CameraRig, OrbitInteraction, RenderSurface, ResizeError, ViewportState,
};
use crate::scene::{AssemblyState, SceneAssembly, SceneGraph};
use std::sync::Arc;
use winit::event::TouchPhase;

/// Owns every piece of viewer state and is driven from the event loop
/// thread: resize, input and asset completions land here between ticks.
pub struct Viewer {
    viewport: ViewportState,
    scene: SceneGraph,
    orbit: OrbitInteraction,
    scheduler: FrameScheduler,
    assembly: SceneAssembly,
    pipeline: Option<AssetPipeline>,
    pointer: PointerState,
    surface: Box<dyn RenderSurface>,
    sources: AssetSources,
    mapper: EnvironmentMapper,
}

impl Viewer {
    pub fn new(
        config: &ViewerConfig,
        mut surface: Box<dyn RenderSurface>,
        width: u32,
        height: u32,
    ) -> Self {
        let viewport = ViewportState::new(width, height);
        let camera = CameraRig::new(&config.camera, &viewport);
        let orbit = OrbitInteraction::new(config.orbit, &camera);
        let scene = SceneGraph::new(config.light.clone(), camera);

        surface.set_pixel_density(config.renderer.pixel_density);
        surface.set_size(viewport.width(), viewport.height());

        Self {
            viewport,
            scene,
            orbit,
            scheduler: FrameScheduler::new(),
            assembly: SceneAssembly::new(config.sphere, config.material),
            pipeline: None,
            pointer: PointerState::default(),
            surface,
            sources: config.assets.clone(),
            mapper: EnvironmentMapper::new(config.environment),
        }
    }

    #[cfg(test)]
    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    #[cfg(test)]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    #[cfg(test)]
    pub fn orbit(&self) -> &OrbitInteraction {
        &self.orbit
    }

    #[cfg(test)]
    pub fn assembly(&self) -> &SceneAssembly {
        &self.assembly
    }

    #[cfg(test)]
    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    /// Kick off the four background loads.
    pub fn start_loading(&mut self, decoder: Arc<dyn ImageDecoder>) -> std::io::Result<()> {
        if self.pipeline.is_some() || self.assembly.state() != AssemblyState::Pending {
            return Ok(());
        }
        self.pipeline = Some(AssetPipeline::start(&self.sources, decoder, self.mapper)?);
        Ok(())
    }

    /// Apply completed loads to the scene. Never blocks.
    pub fn pump_assets(&mut self) -> AssemblyState {
        let events = match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.poll(),
            None => return self.assembly.state(),
        };
        let delivered = !events.is_empty();
        for event in events {
            log::debug!("{} delivered", event.kind());
            self.accept(event);
        }
        let missing = self.assembly.missing();
        if delivered && !missing.is_empty() {
            log::debug!("Waiting on {missing:?}");
        }
        if self.pipeline.as_ref().is_some_and(AssetPipeline::is_finished) {
            log::debug!("All asset loads delivered");
            self.pipeline = None;
        }
        self.assembly.state()
    }

    pub fn accept(&mut self, event: AssetEvent) -> AssemblyState {
        self.assembly.accept(event, &mut self.scene)
    }

    /// Resize the viewport, camera projection and render target together.
    /// Invalid sizes are rejected and the previous size kept.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ResizeError> {
        match self.viewport.apply_resize(width, height) {
            Ok(true) => {
                self.scene.camera_mut().sync_viewport(&self.viewport);
                self.surface.set_size(width, height);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => {
                log::warn!(
                    "{err}; keeping {}x{}",
                    self.viewport.width(),
                    self.viewport.height()
                );
                Err(err)
            }
        }
    }

    pub fn tick(&mut self, dt: f32) -> TickOutcome {
        self.pump_assets();
        self.scheduler.tick(
            dt,
            &mut self.orbit,
            &mut self.scene,
            self.surface.as_mut(),
        )
    }

    pub fn pointer_pressed(&mut self) {
        let gesture = self.pointer.press();
        self.apply_gesture(gesture);
    }

    pub fn pointer_released(&mut self) {
        let gesture = self.pointer.release();
        self.apply_gesture(gesture);
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        let gesture = self.pointer.cursor_moved(x, y);
        self.apply_gesture(gesture);
    }

    pub fn pointer_left(&mut self) {
        let gesture = self.pointer.cursor_left();
        self.apply_gesture(gesture);
    }

    pub fn touch(&mut self, id: u64, phase: TouchPhase, x: f64, y: f64) {
        let gesture = self.pointer.touch(id, phase, x, y);
        self.apply_gesture(gesture);
    }

    pub fn wheel(&mut self, notches: f32) {
        self.orbit.zoom(notches);
    }

    fn apply_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::None => {}
            Gesture::DragStarted => self.orbit.begin_drag(),
            Gesture::Rotate { dx, dy } => self.orbit.drag(dx, dy, self.viewport.height()),
            Gesture::Pinch(ratio) => self.orbit.pinch(ratio),
            Gesture::DragEnded => self.orbit.end_drag(),
        }
    }

    /// Stop rendering and drop any loads still in flight.
    pub fn shutdown(&mut self) {
        self.scheduler.stop_handle().stop();
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.cancel();
        }
    }
}
