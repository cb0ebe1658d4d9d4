use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// UV sphere description: `width_segments` around the equator,
/// `height_segments` from pole to pole.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SphereGeometry {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereGeometry {
    fn default() -> Self {
        Self {
            radius: 5.0,
            width_segments: 64,
            height_segments: 32,
        }
    }
}

impl SphereGeometry {
    pub fn vertex_count(&self) -> usize {
        let (w, h) = self.segments();
        (w as usize + 1) * (h as usize + 1)
    }

    fn segments(&self) -> (u32, u32) {
        (self.width_segments.max(3), self.height_segments.max(2))
    }

    /// Vertices run row by row from the north pole. UV (0, 0) is the top-left
    /// of the texture, matching image row order.
    pub fn build(&self) -> MeshData {
        let (width, height) = self.segments();
        let mut vertices = Vec::with_capacity(self.vertex_count());
        for iy in 0..=height {
            let v = iy as f32 / height as f32;
            // keep the seam continuous at the poles
            let u_offset = if iy == 0 {
                0.5 / width as f32
            } else if iy == height {
                -0.5 / width as f32
            } else {
                0.0
            };
            let (sin_theta, cos_theta) = (v * PI).sin_cos();
            for ix in 0..=width {
                let u = ix as f32 / width as f32;
                let (sin_phi, cos_phi) = (u * TAU).sin_cos();
                let normal = [-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
                vertices.push(Vertex {
                    position: normal.map(|c| c * self.radius),
                    normal,
                    uv: [u + u_offset, v],
                });
            }
        }

        let row = width + 1;
        let mut indices = Vec::with_capacity((width * (height - 1) * 6) as usize);
        for iy in 0..height {
            for ix in 0..width {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        MeshData { vertices, indices }
    }
}
