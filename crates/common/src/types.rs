use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Size of the presentation surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, or `None` when either side is zero.
    pub fn aspect(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Screen UV of the centre of pixel `(x, y)`; v grows downwards.
    pub fn pixel_uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width.max(1) as f32,
            (y as f32 + 0.5) / self.height.max(1) as f32,
        )
    }
}

/// Perspective camera pose supplied by the host every frame.
///
/// Camera input handling lives outside the core; this is only the snapshot the
/// core reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 10.0),
            target: Vec3::ZERO,
            fov_degrees: 55.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraState {
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Height of the eye along the up axis.
    pub fn height(&self) -> f32 {
        self.position.y
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.forward();
        // Looking straight up or down makes Y a degenerate up vector.
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.position, self.position + forward, up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space ray through a screen UV (v grows downwards).
    pub fn ray_through(&self, uv: Vec2) -> (Vec3, Vec3) {
        let inv = self.view_projection().inverse();
        let ndc = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
        let near = inv.project_point3(ndc.extend(0.0));
        let far = inv.project_point3(ndc.extend(1.0));
        (self.position, (far - near).normalize_or_zero())
    }

    /// Depth-buffer value (0 at near, 1 at far) of a world-space point.
    pub fn project_depth(&self, point: Vec3) -> f32 {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w.abs() < f32::EPSILON {
            return 1.0;
        }
        clip.z / clip.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_viewport_has_no_aspect() {
        assert_eq!(Viewport::new(0, 720).aspect(), None);
        assert_eq!(Viewport::new(1280, 0).aspect(), None);
        assert_eq!(Viewport::new(200, 100).aspect(), Some(2.0));
    }

    #[test]
    fn pixel_uv_is_centered() {
        let vp = Viewport::new(2, 2);
        assert_eq!(vp.pixel_uv(0, 0), Vec2::new(0.25, 0.25));
        assert_eq!(vp.pixel_uv(1, 1), Vec2::new(0.75, 0.75));
    }

    #[test]
    fn center_ray_points_at_target() {
        let cam = CameraState::default();
        let (origin, dir) = cam.ray_through(Vec2::splat(0.5));
        assert_eq!(origin, cam.position);
        assert!(dir.dot(cam.forward()) > 0.999);
    }

    #[test]
    fn projected_depth_grows_with_distance() {
        let cam = CameraState::default()
            .at(Vec3::new(0.0, 0.0, 0.0))
            .looking_at(Vec3::new(0.0, 0.0, -1.0));
        let near = cam.project_depth(Vec3::new(0.0, 0.0, -1.0));
        let far = cam.project_depth(Vec3::new(0.0, 0.0, -50.0));
        assert!(near > 0.0 && near < far && far < 1.0);
    }

    #[test]
    fn vertical_camera_has_finite_view() {
        let cam = CameraState::default()
            .at(Vec3::new(0.0, 10.0, 0.0))
            .looking_at(Vec3::ZERO);
        let vp = cam.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }
}
