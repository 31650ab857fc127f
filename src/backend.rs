//! `wgpu` implementation of [`DeviceContext`] and [`CommandRecorder`].
//!
//! wgpu has no descriptor pools and its bind groups are immutable, so:
//!
//! - pools are bookkeeping: they enforce `max_sets` and per-kind capacity;
//! - a descriptor set remembers the resources written to each slot and
//!   rebuilds its `wgpu::BindGroup` once every declared slot has one;
//! - a sampled image occupies two wgpu slots, the texture view at the
//!   declared binding and its sampler at `binding + SAMPLER_SLOT_OFFSET`.
//!
//! Binding records whichever bind group the set holds at that moment, so a
//! set may be updated again for the next draw in the same pass.

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    command::{CommandRecorder, Scissor, Viewport},
    context::{
        BufferHandle, BufferUsage, DescriptorPoolHandle, DescriptorSetHandle,
        DescriptorSetLayoutHandle, DeviceContext, GraphicsPipelineDesc, ImageViewHandle,
        PipelineHandle, PipelineLayoutHandle, SamplerHandle, ShaderModuleHandle,
    },
    descriptors::{
        DescriptorBinding, DescriptorKind, DescriptorPoolSize, DescriptorResource, DescriptorWrite,
    },
    error::DeviceError,
    pipelines::{
        input::{InputRate, VertexInputLayout},
        state::FixedFunctionState,
    },
    resources::texture::Texture,
    shader::{ShaderStage, ShaderStageKind},
};

/// Distance between a sampled image's texture slot and its sampler slot.
pub const SAMPLER_SLOT_OFFSET: u32 = 16;

#[derive(Debug)]
struct SetLayoutEntry {
    layout: wgpu::BindGroupLayout,
    bindings: Vec<DescriptorBinding>,
}

#[derive(Debug)]
struct PoolEntry {
    capacity: BTreeMap<DescriptorKind, u32>,
    used: BTreeMap<DescriptorKind, u32>,
    max_sets: u32,
    sets: Vec<DescriptorSetHandle>,
}

#[derive(Debug)]
struct SetEntry {
    layout: DescriptorSetLayoutHandle,
    written: BTreeMap<u32, DescriptorResource>,
    bind_group: Option<wgpu::BindGroup>,
}

#[derive(Debug)]
struct ImageEntry {
    #[allow(unused)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Debug)]
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter: Option<wgpu::Adapter>,
    next_id: AtomicU64,
    set_layouts: Mutex<HashMap<DescriptorSetLayoutHandle, SetLayoutEntry>>,
    pools: Mutex<HashMap<DescriptorPoolHandle, PoolEntry>>,
    sets: Mutex<HashMap<DescriptorSetHandle, SetEntry>>,
    pipeline_layouts: Mutex<HashMap<PipelineLayoutHandle, wgpu::PipelineLayout>>,
    pipelines: Mutex<HashMap<PipelineHandle, wgpu::RenderPipeline>>,
    shader_modules: Mutex<HashMap<ShaderModuleHandle, wgpu::ShaderModule>>,
    buffers: Mutex<HashMap<BufferHandle, wgpu::Buffer>>,
    images: Mutex<HashMap<ImageViewHandle, ImageEntry>>,
    samplers: Mutex<HashMap<SamplerHandle, wgpu::Sampler>>,
}

fn lock<'a, K, V>(
    map: &'a Mutex<HashMap<K, V>>,
    what: &str,
) -> Result<MutexGuard<'a, HashMap<K, V>>, DeviceError> {
    map.lock()
        .map_err(|e| DeviceError::Backend(format!("Mutex poisoned ({what}): {e}")))
}

fn remove<K: Eq + Hash + std::fmt::Display, V>(map: &Mutex<HashMap<K, V>>, what: &str, key: K) {
    match lock(map, what) {
        Ok(mut map) => {
            if map.remove(&key).is_none() {
                log::warn!("Destroying unknown {key}");
            } else {
                log::debug!("Destroyed {key}");
            }
        }
        Err(e) => log::error!("{e}"),
    }
}

impl WgpuContext {
    /// Wraps a device the application already created.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, adapter: Option<wgpu::Adapter>) -> Self {
        Self {
            device,
            queue,
            adapter,
            next_id: AtomicU64::new(1),
            set_layouts: Mutex::new(HashMap::new()),
            pools: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            pipeline_layouts: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            shader_modules: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
            samplers: Mutex::new(HashMap::new()),
        }
    }

    /// Requests an adapter and device without a surface.
    pub async fn headless() -> anyhow::Result<Self> {
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("prism device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        Ok(Self::new(device, queue, Some(adapter)))
    }

    fn next<H>(&self, make: impl FnOnce(u64) -> H) -> H {
        make(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Uploads tightly packed RGBA8 pixels and registers view and sampler.
    pub fn create_texture_rgba8(
        &self,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Texture, DeviceError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DeviceError::Backend(format!(
                "texture '{label}' expects {expected} bytes, got {}",
                pixels.len()
            )));
        }
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });
        self.insert_texture(texture, view, sampler)
    }

    /// Registers a texture created elsewhere so it can be pushed as a descriptor.
    pub fn insert_texture(
        &self,
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        sampler: wgpu::Sampler,
    ) -> Result<Texture, DeviceError> {
        let view_handle = self.next(ImageViewHandle);
        let sampler_handle = self.next(SamplerHandle);
        lock(&self.images, "images")?.insert(view_handle, ImageEntry { texture, view });
        lock(&self.samplers, "samplers")?.insert(sampler_handle, sampler);
        Ok(Texture::new(view_handle, sampler_handle))
    }

    pub fn destroy_texture(&self, view: ImageViewHandle, sampler: SamplerHandle) {
        remove(&self.images, "images", view);
        remove(&self.samplers, "samplers", sampler);
    }

    /// Rebuilds the bind group of `set` if every declared slot has a resource.
    fn rebuild_bind_group(&self, set: &mut SetEntry) -> Result<(), DeviceError> {
        let layouts = lock(&self.set_layouts, "set_layouts")?;
        let layout = layouts.get(&set.layout).ok_or(DeviceError::UnknownHandle {
            kind: DescriptorSetLayoutHandle::KIND,
            id: set.layout.0,
        })?;
        if layout
            .bindings
            .iter()
            .any(|b| !set.written.contains_key(&b.binding))
        {
            set.bind_group = None;
            return Ok(());
        }

        let buffers = lock(&self.buffers, "buffers")?;
        let images = lock(&self.images, "images")?;
        let samplers = lock(&self.samplers, "samplers")?;

        let mut entries = Vec::with_capacity(set.written.len() + 1);
        for (binding, resource) in &set.written {
            match resource {
                DescriptorResource::UniformBuffer { buffer, offset, range }
                | DescriptorResource::StorageBuffer { buffer, offset, range } => {
                    let wgpu_buffer = buffers.get(buffer).ok_or(DeviceError::UnknownHandle {
                        kind: BufferHandle::KIND,
                        id: buffer.0,
                    })?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: wgpu_buffer,
                            offset: *offset,
                            size: wgpu::BufferSize::new(*range),
                        }),
                    });
                }
                DescriptorResource::SampledImage { view, sampler } => {
                    let image = images.get(view).ok_or(DeviceError::UnknownHandle {
                        kind: ImageViewHandle::KIND,
                        id: view.0,
                    })?;
                    let wgpu_sampler = samplers.get(sampler).ok_or(DeviceError::UnknownHandle {
                        kind: SamplerHandle::KIND,
                        id: sampler.0,
                    })?;
                    entries.push(wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: wgpu::BindingResource::TextureView(&image.view),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: *binding + SAMPLER_SLOT_OFFSET,
                        resource: wgpu::BindingResource::Sampler(wgpu_sampler),
                    });
                }
            }
        }

        set.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("descriptor set"),
            layout: &layout.layout,
            entries: &entries,
        }));
        Ok(())
    }
}

fn layout_entries(bindings: &[DescriptorBinding]) -> Result<Vec<wgpu::BindGroupLayoutEntry>, DeviceError> {
    let mut entries = Vec::with_capacity(bindings.len());
    for binding in bindings {
        if binding.count != 1 {
            return Err(DeviceError::Unsupported(format!(
                "binding '{}' is an array of {}",
                binding.name, binding.count
            )));
        }
        match binding.kind {
            DescriptorKind::UniformBuffer | DescriptorKind::StorageBuffer => {
                let ty = if binding.kind == DescriptorKind::UniformBuffer {
                    wgpu::BufferBindingType::Uniform
                } else {
                    wgpu::BufferBindingType::Storage { read_only: true }
                };
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: binding.binding,
                    visibility: binding.visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                });
            }
            DescriptorKind::SampledImage => {
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: binding.binding,
                    visibility: binding.visibility,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                });
                entries.push(wgpu::BindGroupLayoutEntry {
                    binding: binding.binding + SAMPLER_SLOT_OFFSET,
                    visibility: binding.visibility,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                });
            }
        }
    }
    let mut slots: Vec<u32> = entries.iter().map(|e| e.binding).collect();
    slots.sort_unstable();
    if let Some(pair) = slots.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(DeviceError::LayoutMismatch(format!(
            "wgpu slot {} is claimed twice",
            pair[0]
        )));
    }
    Ok(entries)
}

fn stage_module<'m>(
    modules: &'m HashMap<ShaderModuleHandle, wgpu::ShaderModule>,
    stages: &'m [ShaderStage],
    kind: ShaderStageKind,
) -> Result<Option<(&'m wgpu::ShaderModule, &'m str)>, DeviceError> {
    let Some(stage) = stages.iter().find(|s| s.kind == kind) else {
        return Ok(None);
    };
    let module = modules.get(&stage.module).ok_or(DeviceError::UnknownHandle {
        kind: ShaderModuleHandle::KIND,
        id: stage.module.0,
    })?;
    Ok(Some((module, stage.entry_point.as_str())))
}

/// Rejects fixed-function settings wgpu cannot express.
///
/// Blend constants are not part of a wgpu pipeline; they are set on the pass.
/// Depth bounds are only read when the depth bounds test is enabled.
fn check_fixed_function(state: &FixedFunctionState, features: wgpu::Features) -> Result<(), DeviceError> {
    let rasterization = &state.rasterization;
    let rejected = [
        (
            rasterization.depth_clamp && !features.contains(wgpu::Features::DEPTH_CLIP_CONTROL),
            "depth clamp",
        ),
        (
            rasterization.polygon_mode == wgpu::PolygonMode::Line
                && !features.contains(wgpu::Features::POLYGON_MODE_LINE),
            "line polygon mode",
        ),
        (
            rasterization.polygon_mode == wgpu::PolygonMode::Point
                && !features.contains(wgpu::Features::POLYGON_MODE_POINT),
            "point polygon mode",
        ),
        (rasterization.rasterizer_discard, "rasterizer discard"),
        (rasterization.line_width != 1.0, "line width other than 1.0"),
        (state.colour_blend.logic_op_enable, "logic ops"),
        (state.depth_stencil.depth_bounds_test, "depth bounds test"),
        (state.multisample.sample_shading, "sample shading"),
        (
            state.viewport.viewport_count != 1 || state.viewport.scissor_count != 1,
            "more than one viewport or scissor",
        ),
    ];
    match rejected.iter().find(|(rejected, _)| *rejected) {
        Some((_, what)) => Err(DeviceError::Unsupported(what.to_string())),
        None => Ok(()),
    }
}

/// One wgpu vertex buffer slot.
#[derive(Debug, Clone, PartialEq)]
struct VertexSlot {
    stride: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: Vec<wgpu::VertexAttribute>,
}

impl VertexSlot {
    const EMPTY: Self = Self {
        stride: 0,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: Vec::new(),
    };
}

/// wgpu addresses vertex buffers by position, so slot `n` is binding `n` and
/// undeclared binding numbers become empty slots. Every slot up to the highest
/// binding still needs a buffer bound before drawing.
fn vertex_slots(input: &VertexInputLayout) -> Vec<VertexSlot> {
    let count = input
        .bindings
        .iter()
        .map(|b| b.binding as usize + 1)
        .max()
        .unwrap_or(0);
    let mut slots = vec![VertexSlot::EMPTY; count];
    for binding in &input.bindings {
        slots[binding.binding as usize] = VertexSlot {
            stride: binding.stride,
            step_mode: match binding.input_rate {
                InputRate::Vertex => wgpu::VertexStepMode::Vertex,
                InputRate::Instance => wgpu::VertexStepMode::Instance,
            },
            attributes: input
                .attributes
                .iter()
                .filter(|a| a.binding == binding.binding)
                .map(|a| wgpu::VertexAttribute {
                    format: a.format,
                    offset: a.offset,
                    shader_location: a.location,
                })
                .collect(),
        };
    }
    slots
}

/// Present whenever the target has a depth attachment. A pipeline that
/// neither tests nor writes depth compares with `Always` and writes nothing.
fn depth_stencil_state(state: &FixedFunctionState, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    let depth = &state.depth_stencil;
    wgpu::DepthStencilState {
        format,
        depth_write_enabled: Some(depth.depth_write),
        depth_compare: Some(if depth.depth_test {
            depth.depth_compare
        } else {
            wgpu::CompareFunction::Always
        }),
        stencil: if depth.stencil_test {
            wgpu::StencilState {
                front: depth.front.face_state(),
                back: depth.back.face_state(),
                read_mask: depth.front.compare_mask,
                write_mask: depth.front.write_mask,
            }
        } else {
            wgpu::StencilState::default()
        },
        bias: state
            .rasterization
            .depth_bias
            .map(|bias| wgpu::DepthBiasState {
                constant: bias.constant_factor as i32,
                slope_scale: bias.slope_factor,
                clamp: bias.clamp,
            })
            .unwrap_or_default(),
    }
}

impl DeviceContext for WgpuContext {
    fn create_descriptor_set_layout(
        &self,
        label: &str,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, DeviceError> {
        let entries = layout_entries(bindings)?;
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &entries,
            });
        let handle = self.next(DescriptorSetLayoutHandle);
        lock(&self.set_layouts, "set_layouts")?.insert(
            handle,
            SetLayoutEntry {
                layout,
                bindings: bindings.to_vec(),
            },
        );
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        remove(&self.set_layouts, "set_layouts", layout);
    }

    fn create_descriptor_pool(
        &self,
        _label: &str,
        sizes: &[DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<DescriptorPoolHandle, DeviceError> {
        let mut capacity = BTreeMap::new();
        for size in sizes {
            *capacity.entry(size.kind).or_insert(0) += size.count;
        }
        let handle = self.next(DescriptorPoolHandle);
        lock(&self.pools, "pools")?.insert(
            handle,
            PoolEntry {
                capacity,
                used: BTreeMap::new(),
                max_sets,
                sets: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        let entry = match lock(&self.pools, "pools") {
            Ok(mut pools) => pools.remove(&pool),
            Err(e) => {
                log::error!("{e}");
                return;
            }
        };
        let Some(entry) = entry else {
            log::warn!("Destroying unknown {pool}");
            return;
        };
        match lock(&self.sets, "sets") {
            Ok(mut sets) => entry.sets.iter().for_each(|set| _ = sets.remove(set)),
            Err(e) => log::error!("{e}"),
        }
        log::debug!("Destroyed {pool} and {} sets", entry.sets.len());
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        layout: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, DeviceError> {
        let needed = {
            let layouts = lock(&self.set_layouts, "set_layouts")?;
            let entry = layouts.get(&layout).ok_or(DeviceError::UnknownHandle {
                kind: DescriptorSetLayoutHandle::KIND,
                id: layout.0,
            })?;
            let mut needed: BTreeMap<DescriptorKind, u32> = BTreeMap::new();
            for binding in &entry.bindings {
                *needed.entry(binding.kind).or_default() += binding.count;
            }
            needed
        };

        let mut pools = lock(&self.pools, "pools")?;
        let entry = pools.get_mut(&pool).ok_or(DeviceError::UnknownHandle {
            kind: DescriptorPoolHandle::KIND,
            id: pool.0,
        })?;
        if entry.sets.len() as u32 >= entry.max_sets {
            return Err(DeviceError::PoolExhausted {
                pool: pool.0,
                reason: format!("all {} sets allocated", entry.max_sets),
            });
        }
        for (kind, count) in &needed {
            let used = entry.used.get(kind).copied().unwrap_or(0);
            let capacity = entry.capacity.get(kind).copied().unwrap_or(0);
            if used + count > capacity {
                return Err(DeviceError::PoolExhausted {
                    pool: pool.0,
                    reason: format!("{kind:?}: {used} of {capacity} in use, {count} requested"),
                });
            }
        }
        for (kind, count) in needed {
            *entry.used.entry(kind).or_default() += count;
        }

        let handle = self.next(DescriptorSetHandle);
        entry.sets.push(handle);
        lock(&self.sets, "sets")?.insert(
            handle,
            SetEntry {
                layout,
                written: BTreeMap::new(),
                bind_group: None,
            },
        );
        Ok(handle)
    }

    fn update_descriptor_set(
        &self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> Result<(), DeviceError> {
        let mut sets = lock(&self.sets, "sets")?;
        let entry = sets.get_mut(&set).ok_or(DeviceError::UnknownHandle {
            kind: DescriptorSetHandle::KIND,
            id: set.0,
        })?;
        {
            let layouts = lock(&self.set_layouts, "set_layouts")?;
            let layout = layouts.get(&entry.layout).ok_or(DeviceError::UnknownHandle {
                kind: DescriptorSetLayoutHandle::KIND,
                id: entry.layout.0,
            })?;
            for write in writes {
                let declared = layout.bindings.iter().find(|b| b.binding == write.binding);
                match declared {
                    Some(binding) if binding.kind == write.resource.kind() => {}
                    Some(binding) => {
                        return Err(DeviceError::LayoutMismatch(format!(
                            "binding {} is {:?}, write is {:?}",
                            write.binding,
                            binding.kind,
                            write.resource.kind()
                        )));
                    }
                    None => {
                        return Err(DeviceError::LayoutMismatch(format!(
                            "binding {} is not declared",
                            write.binding
                        )));
                    }
                }
            }
        }
        for write in writes {
            entry.written.insert(write.binding, write.resource);
        }
        self.rebuild_bind_group(entry)
    }

    fn create_pipeline_layout(
        &self,
        label: &str,
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<PipelineLayoutHandle, DeviceError> {
        let layouts = lock(&self.set_layouts, "set_layouts")?;
        let bind_group_layouts = set_layouts
            .iter()
            .map(|handle| {
                layouts
                    .get(handle)
                    .map(|entry| Some(&entry.layout))
                    .ok_or(DeviceError::UnknownHandle {
                        kind: DescriptorSetLayoutHandle::KIND,
                        id: handle.0,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            });
        let handle = self.next(PipelineLayoutHandle);
        lock(&self.pipeline_layouts, "pipeline_layouts")?.insert(handle, layout);
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        remove(&self.pipeline_layouts, "pipeline_layouts", layout);
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, DeviceError> {
        let state = desc.state;
        check_fixed_function(state, self.device.features())?;
        if state.colour_blend.attachments.len() != desc.target.attachment_count() {
            return Err(DeviceError::LayoutMismatch(format!(
                "{} blend attachments for {} colour attachments",
                state.colour_blend.attachments.len(),
                desc.target.attachment_count()
            )));
        }

        let slots = vertex_slots(desc.vertex_input);
        let buffers: Vec<wgpu::VertexBufferLayout> = slots
            .iter()
            .map(|slot| wgpu::VertexBufferLayout {
                array_stride: slot.stride,
                step_mode: slot.step_mode,
                attributes: &slot.attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .target
            .colour_formats
            .iter()
            .zip(state.colour_blend.attachments.iter())
            .map(|(format, attachment)| {
                Some(wgpu::ColorTargetState {
                    format: *format,
                    blend: attachment.blend_state(),
                    write_mask: attachment.write_mask,
                })
            })
            .collect();

        let depth_stencil = desc
            .target
            .depth_format
            .map(|format| depth_stencil_state(state, format));

        let modules = lock(&self.shader_modules, "shader_modules")?;
        let (vertex_module, vertex_entry) = stage_module(&modules, desc.stages, ShaderStageKind::Vertex)?
            .ok_or(DeviceError::MissingStage("vertex"))?;
        let fragment = stage_module(&modules, desc.stages, ShaderStageKind::Fragment)?;

        let layouts = lock(&self.pipeline_layouts, "pipeline_layouts")?;
        let layout = layouts.get(&desc.layout).ok_or(DeviceError::UnknownHandle {
            kind: PipelineLayoutHandle::KIND,
            id: desc.layout.0,
        })?;

        let topology = state.input_assembly.topology;
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(vertex_entry),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: fragment.map(|(module, entry_point)| wgpu::FragmentState {
                    module,
                    entry_point: Some(entry_point),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: (state.input_assembly.primitive_restart
                        && topology.is_strip())
                    .then_some(wgpu::IndexFormat::Uint32),
                    front_face: state.rasterization.front_face,
                    cull_mode: state.rasterization.cull_mode,
                    polygon_mode: state.rasterization.polygon_mode,
                    unclipped_depth: state.rasterization.depth_clamp,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: state.multisample.samples,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });

        let handle = self.next(PipelineHandle);
        lock(&self.pipelines, "pipelines")?.insert(handle, pipeline);
        Ok(handle)
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        remove(&self.pipelines, "pipelines", pipeline);
    }

    fn create_shader_module(&self, label: &str, wgsl: &str) -> Result<ShaderModuleHandle, DeviceError> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });
        let handle = self.next(ShaderModuleHandle);
        lock(&self.shader_modules, "shader_modules")?.insert(handle, module);
        Ok(handle)
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        remove(&self.shader_modules, "shader_modules", module);
    }

    fn create_buffer(&self, label: &str, size: u64, usage: BufferUsage) -> Result<BufferHandle, DeviceError> {
        let usage = match usage {
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
        } | wgpu::BufferUsages::COPY_DST;
        // Buffer copies work in multiples of four bytes.
        let size = size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let handle = self.next(BufferHandle);
        lock(&self.buffers, "buffers")?.insert(handle, buffer);
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let buffers = lock(&self.buffers, "buffers")?;
        let wgpu_buffer = buffers.get(&buffer).ok_or(DeviceError::UnknownHandle {
            kind: BufferHandle::KIND,
            id: buffer.0,
        })?;
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(wgpu_buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().div_ceil(4) * 4, 0);
            self.queue.write_buffer(wgpu_buffer, offset, &padded);
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        remove(&self.buffers, "buffers", buffer);
    }

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        match &self.adapter {
            Some(adapter) => adapter
                .get_texture_format_features(format)
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
            None => true,
        }
    }
}

/// Records into a `wgpu::RenderPass`, resolving handles through a [`WgpuContext`].
pub struct WgpuRecorder<'a, 'pass> {
    context: &'a WgpuContext,
    pass: &'a mut wgpu::RenderPass<'pass>,
}

impl<'a, 'pass> WgpuRecorder<'a, 'pass> {
    pub fn new(context: &'a WgpuContext, pass: &'a mut wgpu::RenderPass<'pass>) -> Self {
        Self { context, pass }
    }
}

impl CommandRecorder for WgpuRecorder<'_, '_> {
    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        match lock(&self.context.pipelines, "pipelines") {
            Ok(pipelines) => match pipelines.get(&pipeline) {
                Some(p) => self.pass.set_pipeline(p),
                None => log::error!("Binding unknown {pipeline}"),
            },
            Err(e) => log::error!("{e}"),
        }
    }

    fn bind_descriptor_set(&mut self, _layout: PipelineLayoutHandle, set: DescriptorSetHandle) {
        match lock(&self.context.sets, "sets") {
            Ok(sets) => match sets.get(&set).and_then(|s| s.bind_group.as_ref()) {
                Some(bind_group) => self.pass.set_bind_group(0, bind_group, &[]),
                None => log::warn!("{set} has incomplete bindings and was not bound"),
            },
            Err(e) => log::error!("{e}"),
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.pass.set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );
    }

    fn set_scissor(&mut self, scissor: Scissor) {
        self.pass
            .set_scissor_rect(scissor.x, scissor.y, scissor.width, scissor.height);
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        match lock(&self.context.buffers, "buffers") {
            Ok(buffers) => match buffers.get(&buffer) {
                Some(b) => self.pass.set_vertex_buffer(slot, b.slice(..)),
                None => log::error!("Binding unknown {buffer}"),
            },
            Err(e) => log::error!("{e}"),
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.pass.draw(0..vertex_count, 0..instance_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptors::DescriptorBindingSet,
        pipelines::{
            DepthMode, PipelineCreate,
            input::{Vertex, VertexAttribute, VertexBinding},
        },
    };

    #[test]
    fn depth_state_follows_the_target_for_every_depth_mode() {
        let format = wgpu::TextureFormat::Depth32Float;
        let expected = [
            (DepthMode::None, false, wgpu::CompareFunction::Always),
            (DepthMode::Read, false, wgpu::CompareFunction::Less),
            (DepthMode::Write, true, wgpu::CompareFunction::Always),
            (DepthMode::ReadWrite, true, wgpu::CompareFunction::Less),
        ];
        for (mode, write, compare) in expected {
            let state = PipelineCreate::default().depth(mode).fixed_function_state();
            let depth = depth_stencil_state(&state, format);
            assert_eq!(depth.format, format, "{mode:?}");
            assert_eq!(depth.depth_write_enabled, Some(write), "{mode:?}");
            assert_eq!(depth.depth_compare, Some(compare), "{mode:?}");
            assert!(!depth.stencil.is_enabled());
        }
    }

    #[test]
    fn sparse_vertex_bindings_keep_their_slot() {
        let input = VertexInputLayout::new(
            vec![VertexBinding {
                binding: 1,
                stride: 12,
                input_rate: InputRate::Vertex,
            }],
            vec![VertexAttribute {
                location: 0,
                binding: 1,
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
            }],
        );
        let slots = vertex_slots(&input);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], VertexSlot::EMPTY);
        assert_eq!(slots[1].stride, 12);
        assert_eq!(slots[1].attributes.len(), 1);
        assert_eq!(slots[1].attributes[0].shader_location, 0);
    }

    #[test]
    fn instance_binding_steps_per_instance() {
        let mut input = crate::pipelines::input::ModelVertex::input();
        input.bindings.push(VertexBinding {
            binding: 1,
            stride: 64,
            input_rate: InputRate::Instance,
        });
        input.attributes.push(VertexAttribute {
            location: 5,
            binding: 1,
            format: wgpu::VertexFormat::Float32x4,
            offset: 0,
        });
        let slots = vertex_slots(&input);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].step_mode, wgpu::VertexStepMode::Vertex);
        assert_eq!(slots[1].step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(slots[1].attributes[0].shader_location, 5);
    }

    #[test]
    fn baseline_state_passes_without_features() {
        let state = FixedFunctionState::default();
        assert!(check_fixed_function(&state, wgpu::Features::empty()).is_ok());
    }

    #[test]
    fn settings_wgpu_cannot_express_are_rejected() {
        let tweaks: [fn(&mut FixedFunctionState); 6] = [
            |s| s.rasterization.rasterizer_discard = true,
            |s| s.rasterization.line_width = 2.0,
            |s| s.colour_blend.logic_op_enable = true,
            |s| s.depth_stencil.depth_bounds_test = true,
            |s| s.multisample.sample_shading = true,
            |s| s.viewport.viewport_count = 2,
        ];
        for tweak in tweaks {
            let mut state = FixedFunctionState::default();
            tweak(&mut state);
            assert!(matches!(
                check_fixed_function(&state, wgpu::Features::all()),
                Err(DeviceError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn line_mode_needs_its_feature() {
        let mut state = FixedFunctionState::default();
        state.rasterization.polygon_mode = wgpu::PolygonMode::Line;
        assert!(check_fixed_function(&state, wgpu::Features::empty()).is_err());
        assert!(check_fixed_function(&state, wgpu::Features::POLYGON_MODE_LINE).is_ok());
    }

    #[test]
    fn sampler_slot_collision_is_a_layout_mismatch() {
        let bindings = DescriptorBindingSet::new()
            .sampled_image("samplerColour", 0, wgpu::ShaderStages::FRAGMENT)
            .uniform("UboScene", SAMPLER_SLOT_OFFSET, wgpu::ShaderStages::VERTEX);
        assert!(bindings.validate().is_ok());
        assert!(matches!(
            layout_entries(bindings.bindings()),
            Err(DeviceError::LayoutMismatch(_))
        ));
    }
}
