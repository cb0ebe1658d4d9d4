mod input;
mod scheduler;
mod timing;
mod viewer;

use scheduler::TickOutcome;
use viewer::Viewer;

use crate::assets::FsImageDecoder;
use crate::config::ViewerConfig;
use crate::render::{GpuSurface, RenderError};
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("renderer setup failed: {0}")]
    Render(#[from] RenderError),
    #[error("failed to start asset loading: {0}")]
    AssetRuntime(#[from] std::io::Error),
}

pub struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    failure: Option<AppError>,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let now = Instant::now();
        Self {
            timing: FrameTiming::new(config.window.title.clone(), now),
            config,
            window: None,
            viewer: None,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            failure: None,
        }
    }

    fn init_viewer(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_transparent(true)
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();
        log::info!("🪟 Window created at {}x{}", size.width, size.height);

        let surface = GpuSurface::new(Arc::clone(&window), &self.config.renderer)?;
        let mut viewer = Viewer::new(&self.config, Box::new(surface), size.width, size.height);
        viewer.start_loading(Arc::new(FsImageDecoder))?;

        self.update_target_frame_duration(&window);
        self.viewer = Some(viewer);
        self.window = Some(window);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let frame_start = Instant::now();
        let dt = self.timing.begin_frame(frame_start);
        if viewer.tick(dt) == TickOutcome::Stopped {
            event_loop.exit();
            return;
        }
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
        if let Some(window) = &self.window {
            self.timing.update_title(window, Instant::now());
        }
    }

    fn close(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init_viewer(event_loop) {
            log::error!("{err}");
            self.failure = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.close(event_loop),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && event.state == ElementState::Pressed
                {
                    self.close(event_loop);
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    // invalid sizes are logged and dropped by the viewer
                    let _ = viewer.resize(new_size.width, new_size.height);
                }
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Focused(false) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.pointer_released();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.pointer_moved(position.x, position.y);
                }
            }
            WindowEvent::CursorLeft { .. } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.pointer_left();
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    match state {
                        ElementState::Pressed => viewer.pointer_pressed(),
                        ElementState::Released => viewer.pointer_released(),
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.wheel(input::wheel_notches(delta));
                }
            }
            WindowEvent::Touch(touch) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.touch(touch.id, touch.phase, touch.location.x, touch.location.y);
                }
            }
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.shutdown();
        }
    }
}

pub fn run(config: ViewerConfig) -> Result<(), AppError> {
    log::info!("🌍 {}", config.window.title);
    log::info!("   Drag to orbit, scroll to zoom, ESC to exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.failure.take() {
        return Err(err);
    }
    log::info!("👋 Goodbye!");
    Ok(())
}
