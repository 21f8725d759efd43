/// CPU rasterizer that turns a scene into an RGB framebuffer
use nalgebra::{Matrix4, Vector3};

use crate::config::Color;
use crate::geometry::Triangle;
use crate::projection::{Camera, ScreenPoint};
use crate::scene::Scene;

/// Supersampling factor per axis when anti-aliasing is on
const SUPERSAMPLE: u32 = 2;

/// Panels with more pixels than this render without supersampling
pub const SUPERSAMPLE_PIXEL_BUDGET: u64 = 2048 * 2048;

/// Resolved RGB output of one render
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32, fill: Color) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill.to_rgb(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.pixels
    }

    /// Pixels as tightly packed RGBA bytes with full alpha
    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|&[r, g, b]| [r, g, b, 255])
            .collect()
    }
}

fn sample_factor(width: u32, height: u32, antialias: bool) -> u32 {
    if antialias && width as u64 * height as u64 <= SUPERSAMPLE_PIXEL_BUDGET {
        SUPERSAMPLE
    } else {
        1
    }
}

/// Software renderer sized to the host panel
pub struct SceneRenderer {
    width: u32,
    height: u32,
    samples: u32,
    clear_color: Color,
    color_buffer: Vec<Vector3<f32>>,
    depth_buffer: Vec<f32>,
    output: Framebuffer,
}

impl SceneRenderer {
    pub fn new(width: u32, height: u32, antialias: bool) -> Self {
        let mut renderer = Self {
            width: 0,
            height: 0,
            samples: sample_factor(width, height, antialias),
            clear_color: Color::new(0, 0, 0),
            color_buffer: Vec::new(),
            depth_buffer: Vec::new(),
            output: Framebuffer::new(0, 0, Color::new(0, 0, 0)),
        };
        renderer.set_size(width, height);
        renderer
    }

    pub fn antialias(&self) -> bool {
        self.samples > 1
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.samples > 1 {
            self.samples = sample_factor(width, height, true);
        }
        self.width = width;
        self.height = height;
        let size = (self.sample_width() * self.sample_height()) as usize;
        self.color_buffer = vec![Vector3::zeros(); size];
        self.depth_buffer = vec![f32::INFINITY; size];
        self.output = Framebuffer::new(width, height, self.clear_color);
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn sample_width(&self) -> u32 {
        self.width * self.samples
    }

    fn sample_height(&self) -> u32 {
        self.height * self.samples
    }

    pub fn clear(&mut self) {
        let clear = self.clear_color.to_vector();
        self.color_buffer.fill(clear);
        self.depth_buffer.fill(f32::INFINITY);
    }

    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> &Framebuffer {
        self.clear();

        if let Some(node) = &scene.mesh {
            let model = node.rotation.to_matrix();
            let mvp = camera.projection_matrix() * camera.view_matrix() * model;
            for triangle in &node.mesh.triangles {
                let normal = model.transform_vector(&triangle.normal);
                let color = scene.shade(&normal, node.color);
                self.render_triangle(triangle, &mvp, camera, color);
            }
        }

        self.resolve();
        &self.output
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        mvp: &Matrix4<f32>,
        camera: &Camera,
        color: Vector3<f32>,
    ) {
        let (w, h) = (self.sample_width(), self.sample_height());
        let mut coords = [ScreenPoint { x: 0.0, y: 0.0, depth: 0.0 }; 3];
        for (slot, vertex) in coords.iter_mut().zip(&triangle.vertices) {
            match camera.project_with(mvp, &vertex.position, w, h) {
                Some(point) => *slot = point,
                None => return, // Crosses the near or far plane
            }
        }
        self.rasterize_triangle(&coords, color);
    }

    fn rasterize_triangle(&mut self, coords: &[ScreenPoint; 3], color: Vector3<f32>) {
        let [v0, v1, v2] = *coords;
        let (w, h) = (self.sample_width() as i32, self.sample_height() as i32);

        // Bounding box clipped to the sample grid
        let min_x = (v0.x.min(v1.x).min(v2.x).floor() as i32).max(0);
        let max_x = (v0.x.max(v1.x).max(v2.x).ceil() as i32).min(w - 1);
        let min_y = (v0.y.min(v1.y).min(v2.y).floor() as i32).max(0);
        let max_y = (v0.y.max(v1.y).max(v2.y).ceil() as i32).min(h - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) =
                    barycentric((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y), p)
                else {
                    return; // Degenerate in screen space
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let idx = (y * w + x) as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.color_buffer[idx] = color;
                }
            }
        }
    }

    /// Average each `samples x samples` block into one output pixel
    fn resolve(&mut self) {
        let s = self.samples;
        let sample_width = self.sample_width();
        let weight = 1.0 / (s * s) as f32;

        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = Vector3::zeros();
                for sy in 0..s {
                    for sx in 0..s {
                        let idx = ((y * s + sy) * sample_width + x * s + sx) as usize;
                        sum += self.color_buffer[idx];
                    }
                }
                let c = sum * weight;
                self.output.pixels[(y * self.width + x) as usize] = [
                    to_channel(c.x),
                    to_channel(c.y),
                    to_channel(c.z),
                ];
            }
        }
    }
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerProps;
    use crate::geometry::Mesh;
    use crate::scene::MeshNode;
    use crate::transform::RotationState;
    use nalgebra::Point3;

    const BACKGROUND: Color = Color::from_hex(0xeaeaea);

    fn cube_scene() -> Scene {
        let config = ViewerProps::new("a.stl").validate().unwrap();
        let mut scene = Scene::with_lights(&config);
        scene.add_mesh(MeshNode {
            mesh: Mesh::cube(2.0),
            color: Color::from_hex(0xb92c2c),
            rotation: RotationState::zero(),
        });
        scene
    }

    fn camera(width: u32, height: u32) -> Camera {
        let mut camera = Camera::perspective(width, height);
        camera.position = Point3::new(0.0, 0.0, 8.0);
        camera.look_at(Point3::origin());
        camera
    }

    #[test]
    fn test_lights_only_scene_is_clear_color() {
        let config = ViewerProps::new("a.stl").validate().unwrap();
        let mut renderer = SceneRenderer::new(16, 8, true);
        renderer.set_clear_color(BACKGROUND);
        let frame = renderer.render(&Scene::with_lights(&config), &camera(16, 8));
        assert_eq!((frame.width(), frame.height()), (16, 8));
        assert!(frame.pixels().iter().all(|&p| p == BACKGROUND.to_rgb()));
    }

    #[test]
    fn test_cube_covers_center_not_corners() {
        for antialias in [false, true] {
            let mut renderer = SceneRenderer::new(40, 40, antialias);
            renderer.set_clear_color(BACKGROUND);
            let frame = renderer.render(&cube_scene(), &camera(40, 40));
            assert_ne!(frame.pixel(20, 20), BACKGROUND.to_rgb());
            assert_eq!(frame.pixel(0, 0), BACKGROUND.to_rgb());
            assert_eq!(frame.pixel(39, 39), BACKGROUND.to_rgb());
        }
    }

    #[test]
    fn test_supersampling_respects_pixel_budget() {
        assert!(SceneRenderer::new(40, 40, true).antialias());
        assert!(!SceneRenderer::new(40, 40, false).antialias());
        assert_eq!(sample_factor(2048, 2048, true), SUPERSAMPLE);
        assert_eq!(sample_factor(4096, 4096, true), 1);
        assert_eq!(sample_factor(2049, 2048, true), 1);
    }

    #[test]
    fn test_camera_on_up_axis_still_renders() {
        let mut camera = Camera::perspective(40, 40);
        camera.position = Point3::new(0.0, 10.0, 0.0);
        camera.look_at(Point3::origin());
        let mut renderer = SceneRenderer::new(40, 40, true);
        renderer.set_clear_color(BACKGROUND);
        let frame = renderer.render(&cube_scene(), &camera);
        assert_ne!(frame.pixel(20, 20), BACKGROUND.to_rgb());
        assert_eq!(frame.pixel(0, 0), BACKGROUND.to_rgb());
    }

    #[test]
    fn test_rgba_layout() {
        let frame = Framebuffer::new(2, 1, Color::new(1, 2, 3));
        assert_eq!(frame.to_rgba(), vec![1, 2, 3, 255, 1, 2, 3, 255]);
    }

    #[test]
    fn test_barycentric_inside() {
        let w = barycentric((0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (1.0, 1.0)).unwrap();
        assert!(w.0 >= 0.0 && w.1 >= 0.0 && w.2 >= 0.0);
        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (1.0, 1.0)).is_none());
    }
}
