//! Object placement: translation, axis-angle rotation, and scale.

use glam::{Mat4, Vec3};

/// A transformation composed of a translation, an axis-angle rotation
/// (angle in degrees), and a per-axis scale.
///
/// Zero-valued components act as identity: a zero translation translates
/// nothing, a zero rotation angle rotates nothing, and, notably, an
/// all-zero scale vector means *no scaling applied*, not a collapse to a
/// point. The zero vector doubles as the "unset" sentinel here, so
/// `Transform::default()` produces the identity matrix. Callers that want
/// a degenerate scale must use a small non-zero value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    /// World-space translation.
    pub translate: Vec3,
    /// Rotation axis. Normalized before use; a zero axis disables the
    /// rotation regardless of the angle.
    pub rotate: Vec3,
    /// Rotation angle in degrees.
    pub rotation_angle: f32,
    /// Per-axis scale. An all-zero vector means unit scale.
    pub scale: Vec3,
}

impl Transform {
    /// A transform that only translates.
    pub fn translated(x: f32, y: f32, z: f32) -> Self {
        Self {
            translate: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    /// A transform that only rotates, by `angle` degrees around `axis`.
    pub fn rotated(axis: Vec3, angle: f32) -> Self {
        Self {
            rotate: axis,
            rotation_angle: angle,
            ..Default::default()
        }
    }

    /// A transform that only scales.
    pub fn scaled(x: f32, y: f32, z: f32) -> Self {
        Self {
            scale: Vec3::new(x, y, z),
            ..Default::default()
        }
    }

    /// Replaces the translation component.
    pub fn with_translation(mut self, translate: Vec3) -> Self {
        self.translate = translate;
        self
    }

    /// Replaces the rotation component.
    pub fn with_rotation(mut self, axis: Vec3, angle: f32) -> Self {
        self.rotate = axis;
        self.rotation_angle = angle;
        self
    }

    /// Replaces the scale component.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Composes the components into a model matrix.
    ///
    /// Applied to a point, the order is scale, then rotation, then
    /// translation. Identity sentinels are honored per component.
    pub fn model_matrix(&self) -> Mat4 {
        let mut m = Mat4::IDENTITY;

        if self.translate != Vec3::ZERO {
            m = Mat4::from_translation(self.translate);
        }

        if self.rotation_angle != 0.0 {
            if let Some(axis) = self.rotate.try_normalize() {
                m *= Mat4::from_axis_angle(axis, self.rotation_angle.to_radians());
            }
        }

        if self.scale != Vec3::ZERO {
            m *= Mat4::from_scale(self.scale);
        }

        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_transform_is_identity() {
        let m = Transform::default().model_matrix();
        assert_eq!(m, Mat4::IDENTITY);
    }

    #[test]
    fn zero_scale_means_unit_scale() {
        let zero = Transform::translated(1.0, 2.0, 3.0);
        let unit = Transform::translated(1.0, 2.0, 3.0).with_scale(Vec3::ONE);
        assert_eq!(zero.model_matrix(), unit.model_matrix());
    }

    #[test]
    fn scale_applies_before_translation() {
        let t = Transform::translated(10.0, 0.0, 0.0).with_scale(Vec3::splat(2.0));
        let p = t.model_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 12.0, epsilon = 1e-5);
    }

    #[test]
    fn rotation_uses_degrees() {
        let t = Transform::rotated(Vec3::Y, 90.0);
        let p = t.model_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_axis_disables_rotation() {
        let t = Transform::rotated(Vec3::ZERO, 45.0);
        assert_eq!(t.model_matrix(), Mat4::IDENTITY);
    }
}
