use std::marker::PhantomData;

use crate::{
    context::{BufferHandle, BufferUsage, DeviceContext},
    descriptors::{DescriptorResource, handler::Descriptor},
    error::DeviceError,
};

/// A typed uniform buffer.
///
/// The GPU buffer is created on the first [`push`](Self::push); until then the
/// handler is not ready and cannot be bound.
#[derive(Debug)]
pub struct UniformHandler<T: bytemuck::Pod> {
    label: String,
    buffer: Option<BufferHandle>,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformHandler<T> {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            buffer: None,
            _marker: PhantomData,
        }
    }

    pub fn push(&mut self, device: &dyn DeviceContext, value: &T) -> Result<(), DeviceError> {
        let buffer = match self.buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = device.create_buffer(&self.label, Self::SIZE, BufferUsage::Uniform)?;
                self.buffer = Some(buffer);
                buffer
            }
        };
        device.write_buffer(buffer, 0, bytemuck::bytes_of(value))
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        if let Some(buffer) = self.buffer {
            device.destroy_buffer(buffer);
        }
    }

    const SIZE: u64 = std::mem::size_of::<T>() as u64;
}

impl<T: bytemuck::Pod> Descriptor for UniformHandler<T> {
    fn descriptor(&self) -> Option<DescriptorResource> {
        self.buffer.map(|buffer| DescriptorResource::UniformBuffer {
            buffer,
            offset: 0,
            range: Self::SIZE,
        })
    }
}
