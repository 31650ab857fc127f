#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use cgmath::{Deg, Matrix4, Point3, Vector3, perspective};
use prism_ngin::{
    command::{CommandRecorder, Scissor, Viewport},
    context::{
        BufferHandle, BufferUsage, DescriptorPoolHandle, DescriptorSetHandle,
        DescriptorSetLayoutHandle, DeviceContext, GraphicsPipelineDesc, PipelineHandle,
        PipelineLayoutHandle, ShaderModuleHandle,
    },
    descriptors::{DescriptorBinding, DescriptorPoolSize, DescriptorWrite},
    error::DeviceError,
    render::Camera,
};

/// Every call the device saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSetLayout(DescriptorSetLayoutHandle, Vec<DescriptorBinding>),
    DestroySetLayout(DescriptorSetLayoutHandle),
    CreatePool(DescriptorPoolHandle, Vec<DescriptorPoolSize>, u32),
    DestroyPool(DescriptorPoolHandle),
    AllocateSet(DescriptorPoolHandle, DescriptorSetHandle),
    UpdateSet(DescriptorSetHandle, Vec<DescriptorWrite>),
    CreatePipelineLayout(PipelineLayoutHandle, Vec<DescriptorSetLayoutHandle>),
    DestroyPipelineLayout(PipelineLayoutHandle),
    CreatePipeline {
        pipeline: PipelineHandle,
        vertex_bindings: usize,
        vertex_attributes: usize,
        stages: usize,
    },
    DestroyPipeline(PipelineHandle),
    CreateShaderModule(ShaderModuleHandle),
    DestroyShaderModule(ShaderModuleHandle),
    CreateBuffer(BufferHandle, u64, BufferUsage),
    WriteBuffer(BufferHandle, usize),
    DestroyBuffer(BufferHandle),
}

/// Which creation call should fail next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    SetLayout,
    Pool,
    Set,
    PipelineLayout,
    Pipeline,
    UpdateSet,
    Buffer,
}

/// A `DeviceContext` that hands out sequential handles and records every call.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u64>,
    fail: Cell<Option<FailAt>>,
    unsupported: RefCell<Vec<wgpu::TextureFormat>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_at(&self, at: FailAt) {
        self.fail.set(Some(at));
    }

    pub fn reject_format(&self, format: wgpu::TextureFormat) {
        self.unsupported.borrow_mut().push(format);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn updates(&self) -> Vec<(DescriptorSetHandle, Vec<DescriptorWrite>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::UpdateSet(set, writes) => Some((*set, writes.clone())),
                _ => None,
            })
            .collect()
    }

    /// Only the destroy calls, in order.
    pub fn destroys(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::DestroySetLayout(_)
                        | Call::DestroyPool(_)
                        | Call::DestroyPipeline(_)
                        | Call::DestroyPipelineLayout(_)
                        | Call::DestroyShaderModule(_)
                        | Call::DestroyBuffer(_)
                )
            })
            .cloned()
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn next(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn check(&self, at: FailAt) -> Result<(), DeviceError> {
        if self.fail.get() == Some(at) {
            self.fail.set(None);
            return Err(DeviceError::Backend(format!("injected failure at {at:?}")));
        }
        Ok(())
    }
}

impl DeviceContext for RecordingDevice {
    fn create_descriptor_set_layout(
        &self,
        _: &str,
        bindings: &[DescriptorBinding],
    ) -> Result<DescriptorSetLayoutHandle, DeviceError> {
        self.check(FailAt::SetLayout)?;
        let handle = DescriptorSetLayoutHandle(self.next());
        self.record(Call::CreateSetLayout(handle, bindings.to_vec()));
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: DescriptorSetLayoutHandle) {
        self.record(Call::DestroySetLayout(layout));
    }

    fn create_descriptor_pool(
        &self,
        _: &str,
        sizes: &[DescriptorPoolSize],
        max_sets: u32,
    ) -> Result<DescriptorPoolHandle, DeviceError> {
        self.check(FailAt::Pool)?;
        let handle = DescriptorPoolHandle(self.next());
        self.record(Call::CreatePool(handle, sizes.to_vec(), max_sets));
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPoolHandle) {
        self.record(Call::DestroyPool(pool));
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolHandle,
        _: DescriptorSetLayoutHandle,
    ) -> Result<DescriptorSetHandle, DeviceError> {
        self.check(FailAt::Set)?;
        let handle = DescriptorSetHandle(self.next());
        self.record(Call::AllocateSet(pool, handle));
        Ok(handle)
    }

    fn update_descriptor_set(
        &self,
        set: DescriptorSetHandle,
        writes: &[DescriptorWrite],
    ) -> Result<(), DeviceError> {
        self.check(FailAt::UpdateSet)?;
        self.record(Call::UpdateSet(set, writes.to_vec()));
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        _: &str,
        set_layouts: &[DescriptorSetLayoutHandle],
    ) -> Result<PipelineLayoutHandle, DeviceError> {
        self.check(FailAt::PipelineLayout)?;
        let handle = PipelineLayoutHandle(self.next());
        self.record(Call::CreatePipelineLayout(handle, set_layouts.to_vec()));
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: PipelineLayoutHandle) {
        self.record(Call::DestroyPipelineLayout(layout));
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, DeviceError> {
        self.check(FailAt::Pipeline)?;
        let handle = PipelineHandle(self.next());
        self.record(Call::CreatePipeline {
            pipeline: handle,
            vertex_bindings: desc.vertex_input.bindings.len(),
            vertex_attributes: desc.vertex_input.attributes.len(),
            stages: desc.stages.len(),
        });
        Ok(handle)
    }

    fn destroy_pipeline(&self, pipeline: PipelineHandle) {
        self.record(Call::DestroyPipeline(pipeline));
    }

    fn create_shader_module(&self, _: &str, _: &str) -> Result<ShaderModuleHandle, DeviceError> {
        let handle = ShaderModuleHandle(self.next());
        self.record(Call::CreateShaderModule(handle));
        Ok(handle)
    }

    fn destroy_shader_module(&self, module: ShaderModuleHandle) {
        self.record(Call::DestroyShaderModule(module));
    }

    fn create_buffer(
        &self,
        _: &str,
        size: u64,
        usage: BufferUsage,
    ) -> Result<BufferHandle, DeviceError> {
        self.check(FailAt::Buffer)?;
        let handle = BufferHandle(self.next());
        self.record(Call::CreateBuffer(handle, size, usage));
        Ok(handle)
    }

    fn write_buffer(&self, buffer: BufferHandle, _: u64, data: &[u8]) -> Result<(), DeviceError> {
        self.record(Call::WriteBuffer(buffer, data.len()));
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.record(Call::DestroyBuffer(buffer));
    }

    fn supports_format(&self, format: wgpu::TextureFormat) -> bool {
        !self.unsupported.borrow().contains(&format)
    }
}

/// Recorded command stream entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BindPipeline(PipelineHandle),
    BindDescriptorSet(PipelineLayoutHandle, DescriptorSetHandle),
    SetViewport(Viewport),
    SetScissor(Scissor),
    BindVertexBuffer(u32, BufferHandle),
    Draw { vertices: u32, instances: u32 },
}

#[derive(Debug, Default)]
pub struct RecordingRecorder {
    pub commands: Vec<Command>,
}

impl RecordingRecorder {
    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw {
                    vertices,
                    instances,
                } => Some((*vertices, *instances)),
                _ => None,
            })
            .collect()
    }
}

impl CommandRecorder for RecordingRecorder {
    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.commands.push(Command::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, layout: PipelineLayoutHandle, set: DescriptorSetHandle) {
        self.commands.push(Command::BindDescriptorSet(layout, set));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn set_scissor(&mut self, scissor: Scissor) {
        self.commands.push(Command::SetScissor(scissor));
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.commands.push(Command::BindVertexBuffer(slot, buffer));
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.push(Command::Draw {
            vertices: vertex_count,
            instances: instance_count,
        });
    }
}

/// Looks down -z from the origin with a 90 degree field of view.
pub struct TestCamera;

impl Camera for TestCamera {
    fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(Deg(90.0), 1.0, 0.1, 100.0)
    }

    fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::unit_y(),
        )
    }

    fn viewport(&self) -> (u32, u32) {
        (640, 480)
    }
}
