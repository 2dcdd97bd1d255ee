/// Camera: eye position, target and perspective parameters
///
/// The renderer owns one camera. Its matrices feed the `Transforms` and
/// `LightingParams` uniform structures; the aspect ratio follows the surface
/// on every resize.

use glam::{Mat4, Vec3};

/// Perspective camera looking at a target point
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_y: 45f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Default camera of a `width` x `height` surface, looking at the origin
    pub fn for_extent(width: u32, height: u32) -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, aspect_of(width, height))
    }

    // ===== MATRICES =====

    /// View matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Projection matrix, depth in [0, 1] with Y pointing down in clip space
    pub fn projection_matrix(&self) -> Mat4 {
        let mut projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        projection.y_axis.y = -projection.y_axis.y;
        projection
    }

    /// Combined view-projection matrix (projection * view)
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    // ===== MOVEMENT =====

    /// Rotate the eye around the target (radians)
    pub fn orbit(&mut self, yaw: f32, pitch: f32) {
        let offset = self.position - self.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return;
        }
        let current_pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        let current_yaw = offset.x.atan2(offset.z);
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        let new_pitch = (current_pitch + pitch).clamp(-limit, limit);
        let new_yaw = current_yaw + yaw;
        self.position = self.target
            + radius * Vec3::new(new_pitch.cos() * new_yaw.sin(), new_pitch.sin(), new_pitch.cos() * new_yaw.cos());
    }

    /// Move the eye toward (positive) or away from the target, never past it
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.position - self.target;
        let distance = (offset.length() - amount).max(self.near * 2.0);
        self.position = self.target + offset.normalize_or_zero() * distance;
    }

    pub fn set_extent(&mut self, width: u32, height: u32) {
        self.aspect = aspect_of(width, height);
    }
}

fn aspect_of(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
