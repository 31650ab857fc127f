//! Command recording.
//!
//! Renderers record binds and draws through a [`CommandRecorder`] so they do
//! not depend on a particular backend's pass type. See
//! [`crate::backend::WgpuRecorder`] for the `wgpu` implementation.

use crate::context::{BufferHandle, DescriptorSetHandle, PipelineHandle, PipelineLayoutHandle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport over `[0, 1]` depth.
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Scissor {
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

pub trait CommandRecorder {
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    /// Binds `set` at set index 0 of `layout`.
    fn bind_descriptor_set(&mut self, layout: PipelineLayoutHandle, set: DescriptorSetHandle);

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_scissor(&mut self, scissor: Scissor);

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle);

    fn draw(&mut self, vertex_count: u32, instance_count: u32);
}
