use crate::{
    command::{CommandRecorder, Scissor, Viewport},
    context::{BufferHandle, BufferUsage, DeviceContext, RenderTarget},
    descriptors::DescriptorBindingSet,
    error::{GpuObject, PipelineError},
    particles::Particles,
    pipelines::{
        DepthMode, PipelineCreate, PipelineVariant,
        input::{ModelVertex, Vertex},
        pipeline::CompiledPipeline,
    },
    render::{Camera, SceneUniform},
    resources::uniform::UniformHandler,
    shader::Shader,
};

/// Unit quad centred on the origin, two counter-clockwise triangles.
const QUAD: [ModelVertex; 6] = [
    ModelVertex { position: [-0.5, -0.5, 0.0], tex_coords: [0.0, 1.0] },
    ModelVertex { position: [0.5, -0.5, 0.0], tex_coords: [1.0, 1.0] },
    ModelVertex { position: [0.5, 0.5, 0.0], tex_coords: [1.0, 0.0] },
    ModelVertex { position: [-0.5, -0.5, 0.0], tex_coords: [0.0, 1.0] },
    ModelVertex { position: [0.5, 0.5, 0.0], tex_coords: [1.0, 0.0] },
    ModelVertex { position: [-0.5, 0.5, 0.0], tex_coords: [0.0, 0.0] },
];

/// The descriptor layout particle shaders are written against.
pub fn particle_bindings() -> DescriptorBindingSet {
    DescriptorBindingSet::new()
        .uniform("UboScene", 0, wgpu::ShaderStages::VERTEX)
        .storage("Instances", 1, wgpu::ShaderStages::VERTEX)
        .sampled_image("samplerColour", 2, wgpu::ShaderStages::FRAGMENT)
}

/// Draws every particle type with one depth-read-only pipeline.
#[derive(Debug)]
pub struct RendererParticles {
    shader: Shader,
    pipeline: CompiledPipeline,
    uniform_scene: UniformHandler<SceneUniform>,
    quad: BufferHandle,
}

impl RendererParticles {
    pub fn new(device: &dyn DeviceContext, target: &RenderTarget) -> Result<Self, PipelineError> {
        let shader = Shader::new(device, "Particle Shader", include_str!("particle.wgsl"))
            .map_err(PipelineError::device(GpuObject::ShaderModule))?;

        let create =
            PipelineCreate::new("Particle Pipeline", PipelineVariant::Polygon).depth(DepthMode::Read);
        let pipeline = match CompiledPipeline::create(
            device,
            &shader,
            target,
            &create,
            ModelVertex::input(),
            particle_bindings(),
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                shader.destroy(device);
                return Err(e);
            }
        };

        let quad = match Self::create_quad(device) {
            Ok(quad) => quad,
            Err(e) => {
                pipeline.destroy(device);
                shader.destroy(device);
                return Err(e);
            }
        };

        Ok(Self {
            shader,
            pipeline,
            uniform_scene: UniformHandler::new("Particle Scene"),
            quad,
        })
    }

    fn create_quad(device: &dyn DeviceContext) -> Result<BufferHandle, PipelineError> {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD);
        let quad = device
            .create_buffer("Particle Quad", bytes.len() as u64, BufferUsage::Vertex)
            .map_err(PipelineError::device(GpuObject::Buffer))?;
        if let Err(e) = device.write_buffer(quad, 0, bytes) {
            device.destroy_buffer(quad);
            return Err(PipelineError::device(GpuObject::Buffer)(e));
        }
        Ok(quad)
    }

    pub fn pipeline(&self) -> &CompiledPipeline {
        &self.pipeline
    }

    /// Uploads this frame's visible particles and draws each type.
    ///
    /// Returns how many types were drawn; types whose bindings are not ready
    /// are skipped.
    pub fn render(
        &mut self,
        device: &dyn DeviceContext,
        recorder: &mut dyn CommandRecorder,
        camera: &dyn Camera,
        particles: &mut Particles,
    ) -> usize {
        if let Err(e) = self
            .uniform_scene
            .push(device, &SceneUniform::from_camera(camera))
        {
            log::warn!("Particle scene uniform not updated: {e}");
        }

        self.pipeline.bind_pipeline(recorder);
        let (width, height) = camera.viewport();
        recorder.set_viewport(Viewport::from_extent(width, height));
        recorder.set_scissor(Scissor::from_extent(width, height));

        let mut drawn = 0;
        for (particle_type, live) in particles.types_mut() {
            if let Err(e) = particle_type.update(device, live, camera) {
                log::warn!("Particle type '{}' not uploaded: {e}", particle_type.name());
                continue;
            }
            if particle_type.cmd_render(device, recorder, &self.pipeline, &self.uniform_scene, self.quad)
            {
                drawn += 1;
            } else {
                log::debug!("Skipping particle type '{}' this frame", particle_type.name());
            }
        }
        drawn
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        self.uniform_scene.destroy(device);
        device.destroy_buffer(self.quad);
        self.pipeline.destroy(device);
        self.shader.destroy(device);
    }
}
