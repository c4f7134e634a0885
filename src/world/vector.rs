use serde::Deserialize;

/// Client fixed-point scale for world coordinates.
pub const FIXED_POINT_SCALE: f32 = 256.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, other: Vector3) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Vector3) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vector3) -> f32 {
        other.sub(self).length()
    }

    /// Moves at most `max_step` toward `target`, landing exactly on it when
    /// it is within reach.
    pub fn step_toward(self, target: Vector3, max_step: f32) -> Self {
        let delta = target.sub(self);
        let distance = delta.length();
        if distance <= max_step || distance == 0.0 {
            return target;
        }
        self.add(delta.scale(max_step / distance))
    }

    /// Coordinates as the client's signed 24.8 fixed point, two's
    /// complement in a u32 slot.
    pub fn to_fixed(self) -> [u32; 3] {
        [fixed(self.x), fixed(self.y), fixed(self.z)]
    }

    pub fn from_fixed(fixed: [u32; 3]) -> Self {
        let [x, y, z] = fixed.map(|value| value as i32 as f32 / FIXED_POINT_SCALE);
        Self::new(x, y, z)
    }
}

fn fixed(value: f32) -> u32 {
    (value * FIXED_POINT_SCALE).round() as i32 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_toward_clamps_to_target() {
        let origin = Vector3::new(0.0, 0.0, 0.0);
        let target = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(origin.step_toward(target, 10.0), target);
        let partial = origin.step_toward(target, 2.5);
        assert!((partial.x - 1.5).abs() < 1e-5);
        assert!((partial.y - 2.0).abs() < 1e-5);
        assert!((partial.distance(target) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn fixed_point_keeps_sign() {
        let fixed = Vector3::new(1.0, -1.0, 0.5).to_fixed();
        assert_eq!(fixed, [0x100, 0xffff_ff00, 0x80]);
        assert_eq!(Vector3::from_fixed(fixed), Vector3::new(1.0, -1.0, 0.5));
    }

    #[test]
    fn deserializes_without_z() {
        let vector: Vector3 = serde_yaml::from_str("{ x: 1.5, y: 2 }").unwrap();
        assert_eq!(vector, Vector3::new(1.5, 2.0, 0.0));
    }
}
