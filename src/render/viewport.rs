/// Size of the render surface in physical pixels. Both sides stay above zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportState {
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResizeError {
    #[error("surface reported invalid size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

impl ViewportState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Apply a resize event. Returns whether the size changed; a zero-sized
    /// event is rejected and the previous size retained.
    pub fn apply_resize(&mut self, width: u32, height: u32) -> Result<bool, ResizeError> {
        if width == 0 || height == 0 {
            return Err(ResizeError::InvalidSize { width, height });
        }
        let changed = (width, height) != (self.width, self.height);
        self.width = width;
        self.height = height;
        Ok(changed)
    }
}
