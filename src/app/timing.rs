use std::time::{Duration, Instant};
use winit::window::Window;

/// Longest step handed to the orbit after a stall (window drag, breakpoint).
const MAX_FRAME_DT: f32 = 0.1;
const TITLE_INTERVAL: Duration = Duration::from_millis(500);

pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_title_time: Instant,
    frame_count: u32,
    frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String, now: Instant) -> Self {
        Self {
            last_frame_time: None,
            last_title_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title,
        }
    }

    #[cfg(test)]
    pub fn frame_dt(&self) -> f32 {
        self.frame_dt
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Start a frame at `now` and return the seconds since the previous one.
    pub fn begin_frame(&mut self, now: Instant) -> f32 {
        let dt = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 1.0 / 60.0,
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt.clamp(0.0, MAX_FRAME_DT);
        self.frame_count = self.frame_count.saturating_add(1);
        self.frame_dt
    }

    /// Window title with frame statistics, produced twice a second.
    pub fn title(&mut self, now: Instant) -> Option<String> {
        let elapsed = now.saturating_duration_since(self.last_title_time);
        if elapsed < TITLE_INTERVAL {
            return None;
        }
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_title_time = now;
        Some(format!(
            "{} - {:.1} fps (cadence {:.2} ms, render {:.2} ms)",
            self.base_title,
            fps,
            self.frame_dt * 1000.0,
            self.render_ms
        ))
    }

    pub fn update_title(&mut self, window: &Window, now: Instant) {
        if let Some(title) = self.title(now) {
            window.set_title(&title);
        }
    }
}
