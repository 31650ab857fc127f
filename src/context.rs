//! Device context: the seam between the pipeline layer and the GPU.
//!
//! Every GPU object the pipeline layer touches is created, updated and
//! destroyed through a [`DeviceContext`] that the caller passes in explicitly.
//! Objects are referred to by small copyable handles so that owners can be
//! torn down in a well defined order without holding borrows on the device.
//!
//! The engine ships [`crate::backend::WgpuContext`]; tests use a recording
//! implementation.

use std::fmt;

use crate::{
    descriptors::{DescriptorBinding, DescriptorPoolSize, DescriptorWrite},
    error::DeviceError,
    pipelines::{input::VertexInputLayout, state::FixedFunctionState},
    shader::ShaderStage,
};

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const KIND: &'static str = $kind;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

gpu_handle!(
    /// Describes the binding slots of a descriptor set.
    DescriptorSetLayoutHandle,
    "descriptor set layout"
);
gpu_handle!(
    /// Pre-sized allocator descriptor sets are carved from.
    DescriptorPoolHandle,
    "descriptor pool"
);
gpu_handle!(
    /// A concrete descriptor set; lives as long as its pool.
    DescriptorSetHandle,
    "descriptor set"
);
gpu_handle!(PipelineLayoutHandle, "pipeline layout");
gpu_handle!(PipelineHandle, "pipeline");
gpu_handle!(ShaderModuleHandle, "shader module");
gpu_handle!(BufferHandle, "buffer");
gpu_handle!(ImageViewHandle, "image view");
gpu_handle!(SamplerHandle, "sampler");

/// What a buffer created through [`DeviceContext::create_buffer`] is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Uniform,
    Storage,
    Vertex,
}

/// The render pass a pipeline is compiled against.
///
/// Provided by whoever owns the attachments; the pipeline layer only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub colour_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub subpass: u32,
}

impl RenderTarget {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// A single colour attachment plus the engine's standard depth buffer.
    pub fn with_depth(colour_format: wgpu::TextureFormat) -> Self {
        Self {
            colour_formats: vec![colour_format],
            depth_format: Some(Self::DEPTH_FORMAT),
            subpass: 0,
        }
    }

    pub fn attachment_count(&self) -> usize {
        self.colour_formats.len()
    }
}

/// Everything the device needs to build the final pipeline object.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineDesc<'a> {
    pub label: &'a str,
    pub layout: PipelineLayoutHandle,
    pub stages: &'a [ShaderStage],
    pub vertex_input: &'a VertexInputLayout,
    pub state: &'a FixedFunctionState,
    pub target: &'a RenderTarget,
}

/// Logical device access for the pipeline layer.
///
/// `create_*` and `allocate_*` calls may fail; `destroy_*` calls never do,
/// matching the native APIs the layer is modelled on. Destroying a pool
/// frees every set allocated from it.
pub trait DeviceContext: fmt::Debug {
    fn create_descriptor_set_layout(
        &self,
        label: &str,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, DeviceError>;

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle);

    fn create_descriptor_pool(
        &self,
        label: &str,
        sizes: &[DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<DescriptorPoolHandle, DeviceError>;

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle);

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, DeviceError>;

    /// Applies all writes to `set` in one call.
    fn update_descriptor_set(
        &self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> Result<(), DeviceError>;

    fn create_pipeline_layout(
        &self,
        label: &str,
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<PipelineLayoutHandle, DeviceError>;

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle);

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, DeviceError>;

    fn destroy_pipeline(&self, pipeline: PipelineHandle);

    fn create_shader_module(
        &self,
        label: &str,
        wgsl: &str,
    ) -> Result<ShaderModuleHandle, DeviceError>;

    fn destroy_shader_module(&self, module: ShaderModuleHandle);

    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        usage: BufferUsage,
    ) -> Result<BufferHandle, DeviceError>;

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8])
    -> Result<(), DeviceError>;

    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Whether `format` can be used as a render attachment on this device.
    fn supports_format(&self, format: wgpu::TextureFormat) -> bool;
}
