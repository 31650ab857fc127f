use cgmath::{Deg, Matrix4, Vector3};

use crate::{
    command::CommandRecorder,
    context::{BufferHandle, DeviceContext},
    descriptors::handler::DescriptorsHandler,
    error::DeviceError,
    particles::particle::{Atlas, Particle},
    pipelines::pipeline::CompiledPipeline,
    render::{Camera, SceneUniform},
    resources::{storage::StorageHandler, texture::Texture, uniform::UniformHandler},
};

/// Per-instance data read by the particle vertex shader.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParticleData {
    pub model: [[f32; 4]; 4],
    pub colour_offset: [f32; 4],
    /// Top-left corners of the current and next atlas stage.
    pub offsets: [f32; 4],
    /// Stage blend factor, transparency, atlas rows, padding.
    pub blend: [f32; 4],
}

/// Everything particles of one look share: texture, atlas, colour and
/// lifetime. Owns the instance buffer and descriptor bindings used to draw
/// them.
#[derive(Debug)]
pub struct ParticleType {
    name: String,
    texture: Texture,
    atlas: Atlas,
    colour_offset: [f32; 4],
    life_length: f32,
    scale: f32,
    instances: u32,
    storage: StorageHandler<ParticleData>,
    descriptors: DescriptorsHandler,
}

impl ParticleType {
    pub const MAX_TYPE_INSTANCES: usize = 512;
    /// Culling radius as a multiple of a particle's scale.
    pub const FRUSTUM_BUFFER: f32 = 1.4;

    pub fn new(
        name: &str,
        texture: Texture,
        atlas: Atlas,
        colour_offset: [f32; 4],
        life_length: f32,
        scale: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            texture,
            atlas,
            colour_offset,
            life_length,
            scale,
            instances: 0,
            storage: StorageHandler::new(name, Self::MAX_TYPE_INSTANCES),
            descriptors: DescriptorsHandler::new(),
        }
    }

    /// A particle of this type that starts at `position` and lives as long
    /// as the type says.
    pub fn spawn(
        &self,
        position: Vector3<f32>,
        velocity: Vector3<f32>,
        gravity_effect: f32,
        rotation: f32,
    ) -> Particle {
        Particle::new(
            self.atlas,
            position,
            velocity,
            gravity_effect,
            self.life_length,
            rotation,
            self.scale,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn texture(&self) -> Texture {
        self.texture
    }

    /// Replaces the texture, e.g. once a streamed texture has finished loading.
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
    }

    pub fn atlas(&self) -> Atlas {
        self.atlas
    }

    /// Instances uploaded by the last [`update`](Self::update).
    pub fn instances(&self) -> u32 {
        self.instances
    }

    pub fn descriptors(&self) -> &DescriptorsHandler {
        &self.descriptors
    }

    /// Uploads the visible `particles`, at most [`Self::MAX_TYPE_INSTANCES`].
    pub fn update(
        &mut self,
        device: &dyn DeviceContext,
        particles: &[Particle],
        camera: &dyn Camera,
    ) -> Result<(), DeviceError> {
        let data: Vec<ParticleData> = particles
            .iter()
            .filter(|p| camera.sphere_in_frustum(p.position, Self::FRUSTUM_BUFFER * p.scale))
            .take(Self::MAX_TYPE_INSTANCES)
            .map(|p| self.instance_data(p))
            .collect();
        self.storage.push(device, &data)?;
        self.instances = data.len() as u32;
        Ok(())
    }

    /// Binds this type's resources and draws `quad` once per instance.
    ///
    /// Returns `false`, recording nothing, when the bindings cannot be
    /// resolved this frame.
    pub fn cmd_render(
        &mut self,
        device: &dyn DeviceContext,
        recorder: &mut dyn CommandRecorder,
        pipeline: &CompiledPipeline,
        uniform_scene: &UniformHandler<SceneUniform>,
        quad: BufferHandle,
    ) -> bool {
        self.descriptors.push("UboScene", uniform_scene);
        self.descriptors.push("Instances", &self.storage);
        self.descriptors.push("samplerColour", &self.texture);
        if !self.descriptors.update(device, pipeline) {
            return false;
        }

        self.descriptors.bind_descriptor(recorder, pipeline);
        recorder.bind_vertex_buffer(0, quad);
        recorder.draw(QUAD_VERTICES, self.instances);
        true
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        self.storage.destroy(device);
    }

    fn instance_data(&self, particle: &Particle) -> ParticleData {
        let model = Matrix4::from_translation(particle.position)
            * Matrix4::from_angle_z(Deg(particle.rotation))
            * Matrix4::from_scale(particle.scale);
        let (offset1, offset2) = particle.texture_offsets();
        ParticleData {
            model: model.into(),
            colour_offset: self.colour_offset,
            offsets: [offset1.x, offset1.y, offset2.x, offset2.y],
            blend: [
                particle.texture_blend_factor(),
                particle.transparency(),
                self.atlas.rows as f32,
                0.0,
            ],
        }
    }
}

/// Vertices in the unit quad every particle is drawn with.
pub const QUAD_VERTICES: u32 = 6;
