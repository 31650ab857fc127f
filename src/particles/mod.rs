//! Instanced, texture-atlas animated particles.
//!
//! Particles are grouped by [`ParticleType`]. Each frame the simulation is
//! advanced with [`Particles::update`], and [`RendererParticles::render`]
//! uploads the visible instances of every type and draws them with one
//! shared pipeline, rebinding the type's descriptors before each draw.

pub mod particle;
pub mod particle_type;
pub mod renderer;

pub use particle::{Atlas, Particle};
pub use particle_type::{ParticleData, ParticleType};
pub use renderer::RendererParticles;

use instant::Instant;

use crate::context::DeviceContext;

/// Live particles, grouped by type.
#[derive(Debug, Default)]
pub struct Particles {
    types: Vec<(ParticleType, Vec<Particle>)>,
    last_time: Option<Instant>,
}

/// Index of a type registered with [`Particles::add_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleTypeId(usize);

impl Particles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, particle_type: ParticleType) -> ParticleTypeId {
        self.types.push((particle_type, Vec::new()));
        ParticleTypeId(self.types.len() - 1)
    }

    pub fn particle_type(&self, id: ParticleTypeId) -> Option<&ParticleType> {
        self.types.get(id.0).map(|(t, _)| t)
    }

    pub fn particle_type_mut(&mut self, id: ParticleTypeId) -> Option<&mut ParticleType> {
        self.types.get_mut(id.0).map(|(t, _)| t)
    }

    /// Adds `particle` to the type `id`. Returns `false` if the type is unknown.
    pub fn emit(&mut self, id: ParticleTypeId, particle: Particle) -> bool {
        match self.types.get_mut(id.0) {
            Some((_, live)) => {
                live.push(particle);
                true
            }
            None => false,
        }
    }

    /// Advances every particle and drops the ones that have faded out.
    pub fn update(&mut self, delta: f32) {
        for (_, live) in &mut self.types {
            live.retain_mut(|p| p.update(delta));
        }
    }

    /// Advances the simulation by the wall-clock time since the last tick.
    /// The first tick only starts the clock.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last_time
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_time = Some(now);
        self.update(dt);
        dt
    }

    pub fn particles(&self, id: ParticleTypeId) -> &[Particle] {
        self.types.get(id.0).map(|(_, live)| live.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.types.iter().map(|(_, live)| live.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn types_mut(&mut self) -> impl Iterator<Item = (&mut ParticleType, &[Particle])> {
        self.types
            .iter_mut()
            .map(|(particle_type, live)| (particle_type, live.as_slice()))
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        for (particle_type, _) in self.types {
            particle_type.destroy(device);
        }
    }
}
