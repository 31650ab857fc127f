//! Compiled pipelines.
//!
//! [`CompiledPipeline::create`] turns a [`PipelineCreate`], a vertex layout
//! and a descriptor binding set into GPU objects in a fixed order:
//!
//! 1. fixed-function state (baseline plus overrides)
//! 2. descriptor set layout
//! 3. descriptor pool sized to the bindings
//! 4. one descriptor set
//! 5. pipeline layout
//! 6. the pipeline itself, assembled by the variant's strategy
//!
//! Every step needs the handle of the one before it. If any step fails the
//! handles acquired so far are destroyed before the error is returned.

use crate::{
    command::CommandRecorder,
    context::{
        DescriptorPoolHandle, DescriptorSetHandle, DescriptorSetLayoutHandle, DeviceContext,
        GraphicsPipelineDesc, PipelineHandle, PipelineLayoutHandle, RenderTarget,
    },
    descriptors::{DescriptorBindingSet, DescriptorSetManager},
    error::{GpuObject, PipelineError},
    shader::Shader,
};

use super::{
    PipelineCreate, PipelineVariant, input::VertexInputLayout, state::FixedFunctionState,
    variant::assembler_for,
};

/// Handles acquired so far during [`CompiledPipeline::create`].
///
/// Whatever is still held when this is dropped gets destroyed, in the same
/// order as a regular teardown.
struct Acquired<'d> {
    device: &'d dyn DeviceContext,
    descriptors: Option<(DescriptorSetLayoutHandle, DescriptorPoolHandle)>,
    pipeline: Option<PipelineHandle>,
    pipeline_layout: Option<PipelineLayoutHandle>,
}

impl Acquired<'_> {
    /// Hands ownership of everything acquired to the finished pipeline.
    fn disarm(&mut self) {
        self.descriptors = None;
        self.pipeline = None;
        self.pipeline_layout = None;
    }
}

impl Drop for Acquired<'_> {
    fn drop(&mut self) {
        if let Some((layout, pool)) = self.descriptors.take() {
            self.device.destroy_descriptor_set_layout(layout);
            self.device.destroy_descriptor_pool(pool);
        }
        if let Some(pipeline) = self.pipeline.take() {
            self.device.destroy_pipeline(pipeline);
        }
        if let Some(layout) = self.pipeline_layout.take() {
            self.device.destroy_pipeline_layout(layout);
        }
    }
}

/// A GPU-resident pipeline with its descriptor infrastructure.
///
/// Owned by exactly one renderer. Release it with [`CompiledPipeline::destroy`].
#[derive(Debug)]
pub struct CompiledPipeline {
    label: String,
    variant: PipelineVariant,
    state: FixedFunctionState,
    vertex_input: VertexInputLayout,
    bindings: DescriptorBindingSet,
    descriptors: DescriptorSetManager,
    pipeline_layout: PipelineLayoutHandle,
    pipeline: PipelineHandle,
    released: bool,
}

impl CompiledPipeline {
    pub fn create(
        device: &dyn DeviceContext,
        shader: &Shader,
        target: &RenderTarget,
        create: &PipelineCreate,
        vertex_input: VertexInputLayout,
        bindings: DescriptorBindingSet,
    ) -> Result<Self, PipelineError> {
        vertex_input.validate()?;
        bindings.validate()?;
        if shader.stages().is_empty() {
            return Err(PipelineError::NoShaderStages);
        }
        let label = create.label.as_str();

        let state = create.fixed_function_state();

        let mut acquired = Acquired {
            device,
            descriptors: None,
            pipeline: None,
            pipeline_layout: None,
        };

        let descriptors = DescriptorSetManager::new(device, label, &bindings)
            .inspect_err(|e| log::error!("Pipeline '{label}': {e}"))?;
        let set_layout = descriptors.layout();
        acquired.descriptors = Some((set_layout, descriptors.pool()));

        let pipeline_layout = device
            .create_pipeline_layout(label, &[set_layout])
            .map_err(PipelineError::device(GpuObject::PipelineLayout))
            .inspect_err(|e| log::error!("Pipeline '{label}': {e}"))?;
        acquired.pipeline_layout = Some(pipeline_layout);

        let desc = GraphicsPipelineDesc {
            label,
            layout: pipeline_layout,
            stages: shader.stages(),
            vertex_input: &vertex_input,
            state: &state,
            target,
        };
        let pipeline = assembler_for(create.variant)
            .assemble(device, &desc)
            .inspect_err(|e| log::error!("Pipeline '{label}': {e}"))?;
        acquired.pipeline = Some(pipeline);
        acquired.disarm();

        log::info!(
            "Compiled {:?} pipeline '{label}' as {pipeline} ({} vertex bindings, {} attributes, {} descriptors)",
            create.variant,
            vertex_input.bindings.len(),
            vertex_input.attributes.len(),
            bindings.len(),
        );

        Ok(Self {
            label: create.label.clone(),
            variant: create.variant,
            state,
            vertex_input,
            bindings,
            descriptors,
            pipeline_layout,
            pipeline,
            released: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn state(&self) -> &FixedFunctionState {
        &self.state
    }

    pub fn vertex_input(&self) -> &VertexInputLayout {
        &self.vertex_input
    }

    pub fn bindings(&self) -> &DescriptorBindingSet {
        &self.bindings
    }

    pub fn descriptors(&self) -> &DescriptorSetManager {
        &self.descriptors
    }

    pub fn descriptor_set(&self) -> DescriptorSetHandle {
        self.descriptors.set()
    }

    pub fn pipeline_layout(&self) -> PipelineLayoutHandle {
        self.pipeline_layout
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn bind_pipeline(&self, recorder: &mut dyn CommandRecorder) {
        recorder.bind_pipeline(self.pipeline);
    }

    /// Releases set layout, pool, pipeline and pipeline layout, in that order.
    pub fn destroy(mut self, device: &dyn DeviceContext) {
        self.descriptors.release(device);
        device.destroy_pipeline(self.pipeline);
        device.destroy_pipeline_layout(self.pipeline_layout);
        self.released = true;
        log::debug!("Destroyed pipeline '{}'", self.label);
    }
}

impl Drop for CompiledPipeline {
    fn drop(&mut self) {
        if !self.released {
            log::warn!(
                "Pipeline '{}' dropped without destroy(); {} and its descriptors leaked",
                self.label,
                self.pipeline
            );
        }
    }
}
