//! Point lights and the per-frame light environment.
//!
//! Lights are plain values. Each frame the active [`LightEnvironment`] is
//! packed into fixed-size GPU records and re-uploaded wholesale into the
//! light storage buffer; the shader indexes the packed array directly.

use glam::Vec3;

use crate::color::Color;

/// Upper bound on lights the accumulation shader reads per frame.
///
/// A [`LightEnvironment`] may hold more; the upload truncates to the first
/// `MAX_LIGHTS` in insertion order.
pub const MAX_LIGHTS: usize = 128;

/// A point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub diffuse: Color,
    pub specular: Color,
    pub position: Vec3,
    /// Effective radius; fragments farther away receive no contribution.
    pub radius: f32,
    /// Quadratic distance-attenuation coefficient.
    pub attenuation: f32,
    pub intensity: f32,
}

impl Light {
    pub fn new(
        diffuse: Color,
        specular: Color,
        position: Vec3,
        radius: f32,
        attenuation: f32,
        intensity: f32,
    ) -> Self {
        Self {
            diffuse,
            specular,
            position,
            radius,
            attenuation,
            intensity,
        }
    }

    fn packed(&self) -> PackedLight {
        PackedLight {
            diffuse: [self.diffuse.r, self.diffuse.g, self.diffuse.b],
            radius: self.radius,
            specular: [self.specular.r, self.specular.g, self.specular.b],
            attenuation: self.attenuation,
            position: self.position.to_array(),
            intensity: self.intensity,
        }
    }
}

/// The 12-float GPU record for one light.
///
/// Field grouping packs each `vec3` with a trailing scalar so the record
/// is tightly 48 bytes under WGSL storage-buffer layout rules.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedLight {
    pub diffuse: [f32; 3],
    pub radius: f32,
    pub specular: [f32; 3],
    pub attenuation: f32,
    pub position: [f32; 3],
    pub intensity: f32,
}

/// Packs a light list into GPU records, truncating at [`MAX_LIGHTS`] while
/// preserving insertion order.
pub fn pack_lights(lights: &[Light]) -> Vec<PackedLight> {
    if lights.len() > MAX_LIGHTS {
        log::warn!(
            "light list has {} entries; truncating to {}",
            lights.len(),
            MAX_LIGHTS
        );
    }
    lights
        .iter()
        .take(MAX_LIGHTS)
        .map(Light::packed)
        .collect()
}

/// Ambient lighting plus the ordered list of active point lights.
#[derive(Clone, Debug)]
pub struct LightEnvironment {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    /// Active lights, in insertion order. May exceed [`MAX_LIGHTS`]; the
    /// renderer uploads only the first 128.
    pub lights: Vec<Light>,
}

impl Default for LightEnvironment {
    fn default() -> Self {
        Self {
            ambient_color: Color::WHITE,
            ambient_intensity: 0.2,
            lights: Vec::new(),
        }
    }
}

impl LightEnvironment {
    pub fn new(ambient_color: Color, ambient_intensity: f32) -> Self {
        Self {
            ambient_color,
            ambient_intensity,
            lights: Vec::new(),
        }
    }

    /// Appends a light. Order is preserved through packing.
    pub fn push(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// The number of lights the shader will actually read.
    pub fn active_count(&self) -> u32 {
        self.lights.len().min(MAX_LIGHTS) as u32
    }

    /// Packs the list for upload. See [`pack_lights`].
    pub fn pack(&self) -> Vec<PackedLight> {
        pack_lights(&self.lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_at(i: usize) -> Light {
        Light::new(
            Color::rgb(i as f32, 0.0, 0.0),
            Color::WHITE,
            Vec3::new(i as f32, 0.0, 0.0),
            10.0,
            0.1,
            1.0,
        )
    }

    #[test]
    fn packed_record_is_twelve_floats() {
        assert_eq!(std::mem::size_of::<PackedLight>(), 12 * 4);
    }

    #[test]
    fn packing_preserves_order_below_limit() {
        let lights: Vec<Light> = (0..100).map(light_at).collect();
        let packed = pack_lights(&lights);
        assert_eq!(packed.len(), 100);
        for (i, record) in packed.iter().enumerate() {
            assert_eq!(record.position[0], i as f32);
            assert_eq!(record.diffuse[0], i as f32);
        }
    }

    #[test]
    fn packing_truncates_at_the_limit() {
        let lights: Vec<Light> = (0..200).map(light_at).collect();
        let packed = pack_lights(&lights);
        assert_eq!(packed.len(), MAX_LIGHTS);
        assert_eq!(packed[0].position[0], 0.0);
        assert_eq!(packed[MAX_LIGHTS - 1].position[0], (MAX_LIGHTS - 1) as f32);
    }

    #[test]
    fn environment_of_130_lights_uploads_first_128() {
        let mut env = LightEnvironment::new(Color::WHITE, 0.2);
        for i in 0..130 {
            env.push(light_at(i));
        }

        let packed = env.pack();
        assert_eq!(env.active_count(), 128);
        assert_eq!(packed.len(), 128);
        // Light 0..=127 present in original order, 128 and 129 absent.
        for (i, record) in packed.iter().enumerate() {
            assert_eq!(record.position[0], i as f32);
        }
        assert!(!packed.iter().any(|r| r.position[0] >= 128.0));
    }

    #[test]
    fn record_fields_round_trip() {
        let light = Light::new(
            Color::rgb(0.1, 0.2, 0.3),
            Color::rgb(0.4, 0.5, 0.6),
            Vec3::new(1.0, 2.0, 3.0),
            7.0,
            0.25,
            1.5,
        );
        let record = pack_lights(&[light])[0];
        assert_eq!(record.diffuse, [0.1, 0.2, 0.3]);
        assert_eq!(record.specular, [0.4, 0.5, 0.6]);
        assert_eq!(record.position, [1.0, 2.0, 3.0]);
        assert_eq!(record.radius, 7.0);
        assert_eq!(record.attenuation, 0.25);
        assert_eq!(record.intensity, 1.5);
    }
}
