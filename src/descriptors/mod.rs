//! Descriptor bindings, pools and sets.
//!
//! A [`DescriptorBindingSet`] declares which resources a pipeline's shaders
//! read and at which slots. The [`DescriptorSetManager`] turns that declaration
//! into a set layout, a pool sized exactly to it and the single descriptor set
//! a pipeline binds every frame. Per-frame contents are written by the
//! [`handler::DescriptorsHandler`].

pub mod handler;

use std::collections::{BTreeMap, HashSet};

use crate::{
    context::{
        BufferHandle, DescriptorPoolHandle, DescriptorSetHandle, DescriptorSetLayoutHandle,
        DeviceContext, ImageViewHandle, SamplerHandle,
    },
    error::{GpuObject, PipelineError},
};

/// Upper bound on sets allocated from one pool. Pipelines allocate one set
/// each, so this is never reached in practice.
pub const MAX_DESCRIPTOR_SETS: u32 = 50;

/// The kind of resource a binding slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorKind {
    UniformBuffer,
    StorageBuffer,
    /// Combined image view and sampler.
    SampledImage,
}

/// One declared binding slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorBinding {
    /// Name shaders and renderers use to refer to the slot, e.g. `"UboScene"`.
    pub name: String,
    pub binding: u32,
    pub kind: DescriptorKind,
    pub visibility: wgpu::ShaderStages,
    pub count: u32,
}

/// Ordered list of binding declarations for one descriptor set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorBindingSet {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorBindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, binding: DescriptorBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn uniform(self, name: &str, binding: u32, visibility: wgpu::ShaderStages) -> Self {
        self.declare(name, binding, DescriptorKind::UniformBuffer, visibility)
    }

    pub fn storage(self, name: &str, binding: u32, visibility: wgpu::ShaderStages) -> Self {
        self.declare(name, binding, DescriptorKind::StorageBuffer, visibility)
    }

    /// A combined image sampler. The wgpu backend places the sampler at
    /// `binding +` [`SAMPLER_SLOT_OFFSET`](crate::backend::SAMPLER_SLOT_OFFSET)
    /// (16), so no other binding in the set may use that number.
    pub fn sampled_image(self, name: &str, binding: u32, visibility: wgpu::ShaderStages) -> Self {
        self.declare(name, binding, DescriptorKind::SampledImage, visibility)
    }

    fn declare(
        self,
        name: &str,
        binding: u32,
        kind: DescriptorKind,
        visibility: wgpu::ShaderStages,
    ) -> Self {
        self.with(DescriptorBinding {
            name: name.to_string(),
            binding,
            kind,
            visibility,
            count: 1,
        })
    }

    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Binding indices and names must be unique and every count at least one.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut indices = HashSet::new();
        let mut names = HashSet::new();
        for binding in &self.bindings {
            if binding.count == 0 {
                return Err(PipelineError::InvalidBindingSet(format!(
                    "binding '{}' has a count of zero",
                    binding.name
                )));
            }
            if !indices.insert(binding.binding) {
                return Err(PipelineError::InvalidBindingSet(format!(
                    "binding index {} is declared twice",
                    binding.binding
                )));
            }
            if !names.insert(binding.name.as_str()) {
                return Err(PipelineError::InvalidBindingSet(format!(
                    "binding name '{}' is declared twice",
                    binding.name
                )));
            }
        }
        Ok(())
    }

    /// Summed descriptor counts per kind, one entry per kind present.
    pub fn pool_sizes(&self) -> Vec<DescriptorPoolSize> {
        let mut counts: BTreeMap<DescriptorKind, u32> = BTreeMap::new();
        for binding in &self.bindings {
            *counts.entry(binding.kind).or_default() += binding.count;
        }
        counts
            .into_iter()
            .map(|(kind, count)| DescriptorPoolSize { kind, count })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub kind: DescriptorKind,
    pub count: u32,
}

/// A concrete resource to place in a binding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorResource {
    UniformBuffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    StorageBuffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    SampledImage {
        view: ImageViewHandle,
        sampler: SamplerHandle,
    },
}

impl DescriptorResource {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            DescriptorResource::UniformBuffer { .. } => DescriptorKind::UniformBuffer,
            DescriptorResource::StorageBuffer { .. } => DescriptorKind::StorageBuffer,
            DescriptorResource::SampledImage { .. } => DescriptorKind::SampledImage,
        }
    }
}

/// One entry of a batched descriptor set update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub resource: DescriptorResource,
}

/// Owns the set layout, the pool and the one set of a pipeline.
#[derive(Debug)]
pub struct DescriptorSetManager {
    layout: DescriptorSetLayoutHandle,
    pool: DescriptorPoolHandle,
    set: DescriptorSetHandle,
    pool_sizes: Vec<DescriptorPoolSize>,
}

impl DescriptorSetManager {
    /// Creates the layout, then the pool, then allocates one set.
    ///
    /// If a later step fails the handles created before it are destroyed.
    pub fn new(
        device: &dyn DeviceContext,
        label: &str,
        bindings: &DescriptorBindingSet,
    ) -> Result<Self, PipelineError> {
        let layout = Self::create_layout(device, label, bindings)?;
        let pool_sizes = bindings.pool_sizes();
        let pool = match Self::create_pool(device, label, &pool_sizes) {
            Ok(pool) => pool,
            Err(e) => {
                device.destroy_descriptor_set_layout(layout);
                return Err(e);
            }
        };
        let set = match Self::allocate_set(device, pool, layout) {
            Ok(set) => set,
            Err(e) => {
                device.destroy_descriptor_set_layout(layout);
                device.destroy_descriptor_pool(pool);
                return Err(e);
            }
        };
        Ok(Self {
            layout,
            pool,
            set,
            pool_sizes,
        })
    }

    pub fn create_layout(
        device: &dyn DeviceContext,
        label: &str,
        bindings: &DescriptorBindingSet,
    ) -> Result<DescriptorSetLayoutHandle, PipelineError> {
        let layout = device
            .create_descriptor_set_layout(label, bindings.bindings())
            .map_err(PipelineError::device(GpuObject::DescriptorSetLayout))?;
        log::debug!("Created {layout} for '{label}'");
        Ok(layout)
    }

    pub fn create_pool(
        device: &dyn DeviceContext,
        label: &str,
        sizes: &[DescriptorPoolSize],
    ) -> Result<DescriptorPoolHandle, PipelineError> {
        let pool = device
            .create_descriptor_pool(label, sizes, MAX_DESCRIPTOR_SETS)
            .map_err(PipelineError::device(GpuObject::DescriptorPool))?;
        log::debug!("Created {pool} for '{label}' with sizes {sizes:?}");
        Ok(pool)
    }

    pub fn allocate_set(
        device: &dyn DeviceContext,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, PipelineError> {
        device
            .allocate_descriptor_set(pool, layout)
            .map_err(PipelineError::device(GpuObject::DescriptorSet))
    }

    pub fn layout(&self) -> DescriptorSetLayoutHandle {
        self.layout
    }

    pub fn pool(&self) -> DescriptorPoolHandle {
        self.pool
    }

    pub fn set(&self) -> DescriptorSetHandle {
        self.set
    }

    pub fn pool_sizes(&self) -> &[DescriptorPoolSize] {
        &self.pool_sizes
    }

    /// Destroys the layout, then the pool. The set dies with the pool.
    pub fn destroy(self, device: &dyn DeviceContext) {
        self.release(device);
    }

    pub(crate) fn release(&self, device: &dyn DeviceContext) {
        device.destroy_descriptor_set_layout(self.layout);
        device.destroy_descriptor_pool(self.pool);
    }
}
