//! Light list owned by the scheduler.
//!
//! The buffer is the only owner of light data. Everything else refers to a
//! light by [`LightId`], an index into the buffer, so there is no shared
//! ownership between lights and the storage uploaded to the backend.

use serde::{Deserialize, Serialize};

use crate::util::Vec3;

/// A light source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Light {
    /// Infinitely distant light. `direction` points from the scene
    /// towards the light.
    Directional {
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    /// Isotropic point light with inverse-square falloff.
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
    },
}

impl Light {
    /// Default key light installed on init.
    pub fn sun() -> Self {
        Light::Directional {
            direction: Vec3::new(0.4, 1.0, 0.3).normalize(),
            color: Vec3::new(1.0, 0.96, 0.9),
            intensity: 2.5,
        }
    }
}

/// Stable index of a light in its [`LightBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub u32);

/// Owning, append-only light storage with a dirty flag for re-upload.
#[derive(Debug, Clone, Default)]
pub struct LightBuffer {
    lights: Vec<Light>,
    dirty: bool,
}

impl LightBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a light.
    pub fn add(&mut self, light: Light) -> LightId {
        let id = LightId(self.lights.len() as u32);
        self.lights.push(light);
        self.dirty = true;
        id
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0 as usize)
    }

    /// Replace the light at `id`. Returns false for unknown ids.
    pub fn set(&mut self, id: LightId, light: Light) -> bool {
        match self.lights.get_mut(id.0 as usize) {
            Some(slot) => {
                *slot = light;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Remove all lights. Previously issued ids become invalid.
    pub fn clear(&mut self) {
        self.lights.clear();
        self.dirty = true;
    }

    /// Reset to the default lighting rig.
    pub fn install_defaults(&mut self) {
        self.clear();
        self.add(Light::sun());
    }

    pub fn as_slice(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
