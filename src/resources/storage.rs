use std::marker::PhantomData;

use crate::{
    context::{BufferHandle, BufferUsage, DeviceContext},
    descriptors::{DescriptorResource, handler::Descriptor},
    error::DeviceError,
};

/// A typed storage buffer holding up to `capacity` elements.
///
/// Like [`super::uniform::UniformHandler`], the buffer only exists after the
/// first push.
#[derive(Debug)]
pub struct StorageHandler<T: bytemuck::Pod> {
    label: String,
    capacity: usize,
    len: usize,
    buffer: Option<BufferHandle>,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> StorageHandler<T> {
    pub fn new(label: &str, capacity: usize) -> Self {
        Self {
            label: label.to_string(),
            capacity,
            len: 0,
            buffer: None,
            _marker: PhantomData,
        }
    }

    /// Uploads `elements`, truncated to the handler's capacity.
    pub fn push(&mut self, device: &dyn DeviceContext, elements: &[T]) -> Result<(), DeviceError> {
        let buffer = match self.buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = device.create_buffer(&self.label, self.size(), BufferUsage::Storage)?;
                self.buffer = Some(buffer);
                buffer
            }
        };
        let elements = if elements.len() > self.capacity {
            log::warn!(
                "'{}' holds {} elements, dropping {}",
                self.label,
                self.capacity,
                elements.len() - self.capacity
            );
            &elements[..self.capacity]
        } else {
            elements
        };
        self.len = elements.len();
        if elements.is_empty() {
            return Ok(());
        }
        device.write_buffer(buffer, 0, bytemuck::cast_slice(elements))
    }

    /// Elements written by the last push.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        if let Some(buffer) = self.buffer {
            device.destroy_buffer(buffer);
        }
    }

    fn size(&self) -> u64 {
        (std::mem::size_of::<T>() * self.capacity.max(1)) as u64
    }
}

impl<T: bytemuck::Pod> Descriptor for StorageHandler<T> {
    fn descriptor(&self) -> Option<DescriptorResource> {
        self.buffer.map(|buffer| DescriptorResource::StorageBuffer {
            buffer,
            offset: 0,
            range: self.size(),
        })
    }
}
