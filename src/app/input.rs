use winit::event::{MouseScrollDelta, TouchPhase};

const PIXELS_PER_WHEEL_NOTCH: f32 = 100.0;

/// What a pointer or touch event means for the orbit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    None,
    DragStarted,
    Rotate { dx: f32, dy: f32 },
    Pinch(f32),
    DragEnded,
}

/// Tracks the mouse and active touch points between events.
#[derive(Debug, Default)]
pub struct PointerState {
    cursor: Option<(f64, f64)>,
    button_down: bool,
    touches: Vec<(u64, (f64, f64))>,
}

impl PointerState {
    pub fn press(&mut self) -> Gesture {
        if self.button_down {
            return Gesture::None;
        }
        self.button_down = true;
        Gesture::DragStarted
    }

    pub fn release(&mut self) -> Gesture {
        if !self.button_down {
            return Gesture::None;
        }
        self.button_down = false;
        Gesture::DragEnded
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) -> Gesture {
        let previous = self.cursor.replace((x, y));
        match previous {
            Some((px, py)) if self.button_down => Gesture::Rotate {
                dx: (x - px) as f32,
                dy: (y - py) as f32,
            },
            _ => Gesture::None,
        }
    }

    /// Losing the cursor ends any drag in progress.
    pub fn cursor_left(&mut self) -> Gesture {
        self.cursor = None;
        self.release()
    }

    pub fn touch(&mut self, id: u64, phase: TouchPhase, x: f64, y: f64) -> Gesture {
        match phase {
            TouchPhase::Started => {
                self.touches.retain(|(existing, _)| *existing != id);
                self.touches.push((id, (x, y)));
                if self.touches.len() == 1 {
                    Gesture::DragStarted
                } else {
                    Gesture::None
                }
            }
            TouchPhase::Moved => {
                let spread_before = self.spread();
                let Some(index) = self.touches.iter().position(|(existing, _)| *existing == id)
                else {
                    return Gesture::None;
                };
                let (px, py) = std::mem::replace(&mut self.touches[index].1, (x, y));
                match (self.touches.len(), spread_before, self.spread()) {
                    (1, _, _) => Gesture::Rotate {
                        dx: (x - px) as f32,
                        dy: (y - py) as f32,
                    },
                    (_, Some(before), Some(after)) if before > f64::EPSILON => {
                        Gesture::Pinch((after / before) as f32)
                    }
                    _ => Gesture::None,
                }
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                let had_touches = !self.touches.is_empty();
                self.touches.retain(|(existing, _)| *existing != id);
                if had_touches && self.touches.is_empty() {
                    Gesture::DragEnded
                } else {
                    Gesture::None
                }
            }
        }
    }

    /// Distance between the first two touch points.
    fn spread(&self) -> Option<f64> {
        match self.touches.as_slice() {
            [(_, (ax, ay)), (_, (bx, by)), ..] => Some((ax - bx).hypot(ay - by)),
            _ => None,
        }
    }
}

/// Wheel notches toward the target (positive zooms in).
pub fn wheel_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_WHEEL_NOTCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn mouse_drag_reports_deltas_only_while_pressed() {
        let mut pointer = PointerState::default();
        assert_eq!(pointer.cursor_moved(10.0, 10.0), Gesture::None);
        assert_eq!(pointer.press(), Gesture::DragStarted);
        assert_eq!(pointer.press(), Gesture::None);
        assert_eq!(
            pointer.cursor_moved(15.0, 7.0),
            Gesture::Rotate { dx: 5.0, dy: -3.0 }
        );
        assert_eq!(pointer.release(), Gesture::DragEnded);
        assert_eq!(pointer.cursor_moved(20.0, 7.0), Gesture::None);
    }

    #[test]
    fn leaving_the_window_ends_the_drag() {
        let mut pointer = PointerState::default();
        pointer.press();
        assert_eq!(pointer.cursor_left(), Gesture::DragEnded);
        assert_eq!(pointer.cursor_left(), Gesture::None);
    }

    #[test]
    fn one_finger_rotates_two_fingers_pinch() {
        let mut pointer = PointerState::default();
        assert_eq!(
            pointer.touch(1, TouchPhase::Started, 0.0, 0.0),
            Gesture::DragStarted
        );
        assert_eq!(
            pointer.touch(1, TouchPhase::Moved, 4.0, 2.0),
            Gesture::Rotate { dx: 4.0, dy: 2.0 }
        );
        assert_eq!(pointer.touch(2, TouchPhase::Started, 14.0, 2.0), Gesture::None);
        assert_eq!(
            pointer.touch(2, TouchPhase::Moved, 24.0, 2.0),
            Gesture::Pinch(2.0)
        );
        assert_eq!(pointer.touch(1, TouchPhase::Ended, 4.0, 2.0), Gesture::None);
        assert_eq!(
            pointer.touch(2, TouchPhase::Cancelled, 24.0, 2.0),
            Gesture::DragEnded
        );
    }

    #[test]
    fn wheel_deltas_become_notches() {
        assert_eq!(wheel_notches(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        assert_eq!(
            wheel_notches(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -50.0))),
            -0.5
        );
    }
}
