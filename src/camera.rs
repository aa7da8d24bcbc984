//! A simple look-at camera for 3D scenes.
//!
//! The camera is a plain value: a position, a target point, and an up
//! vector. It owns no GPU resources; the pipeline derives a view matrix
//! from it each frame.

use glam::{Mat4, Vec3};

/// A look-at camera described by position, target, and up vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World-space eye position.
    pub position: Vec3,
    /// World-space point the camera looks at.
    pub target: Vec3,
    /// Up direction, normally `+Y`.
    pub up: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            target,
            up,
        }
    }

    /// Moves the camera to the given position.
    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    /// Points the camera at the given target.
    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.target = Vec3::new(x, y, z);
        self
    }

    /// Overrides the up vector.
    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    /// The view matrix for this camera (right-handed look-at).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// The normalized direction the camera faces.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_matrix_maps_eye_to_origin() {
        let camera = Camera::default().at(3.0, 4.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let eye = camera.view_matrix().transform_point3(camera.position);
        assert!(eye.length() < 1e-5);
    }

    #[test]
    fn target_lands_on_negative_z() {
        let camera = Camera::default().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let target = camera.view_matrix().transform_point3(camera.target);
        assert!(target.x.abs() < 1e-5);
        assert!(target.y.abs() < 1e-5);
        assert!(target.z < 0.0);
    }

    #[test]
    fn forward_is_normalized() {
        let camera = Camera::default().at(10.0, 0.0, 0.0).looking_at(0.0, 0.0, 0.0);
        assert!((camera.forward().length() - 1.0).abs() < 1e-6);
        assert!((camera.forward() - Vec3::NEG_X).length() < 1e-6);
    }
}
