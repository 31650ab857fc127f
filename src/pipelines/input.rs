//! Vertex input layouts.
//!
//! A [`VertexInputLayout`] is the engine's description of how vertex buffers
//! feed the vertex shader: one [`VertexBinding`] per bound buffer and one
//! [`VertexAttribute`] per shader `@location`.

use std::collections::HashSet;

use crate::error::PipelineError;

/// How often a bound buffer advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRate {
    Vertex,
    Instance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u64,
    pub input_rate: InputRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexInputLayout {
    pub bindings: Vec<VertexBinding>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexInputLayout {
    pub fn new(bindings: Vec<VertexBinding>, attributes: Vec<VertexAttribute>) -> Self {
        Self { bindings, attributes }
    }

    /// Single per-vertex buffer at binding 0 with tightly packed attributes
    /// at consecutive locations starting from 0.
    pub fn packed(formats: &[wgpu::VertexFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = VertexAttribute {
                    location: location as u32,
                    binding: 0,
                    format: *format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();
        Self {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: offset,
                input_rate: InputRate::Vertex,
            }],
            attributes,
        }
    }

    /// Every attribute must reference a declared binding, binding indices
    /// must be unique and attribute locations must be unique.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut bindings = HashSet::new();
        for binding in &self.bindings {
            if !bindings.insert(binding.binding) {
                return Err(PipelineError::InvalidVertexLayout(format!(
                    "vertex binding {} is declared twice",
                    binding.binding
                )));
            }
        }
        let mut locations = HashSet::new();
        for attribute in &self.attributes {
            if !bindings.contains(&attribute.binding) {
                return Err(PipelineError::InvalidVertexLayout(format!(
                    "attribute at location {} references undeclared binding {}",
                    attribute.location, attribute.binding
                )));
            }
            if !locations.insert(attribute.location) {
                return Err(PipelineError::InvalidVertexLayout(format!(
                    "location {} is used by more than one attribute",
                    attribute.location
                )));
            }
        }
        Ok(())
    }
}

/// Types that can be uploaded as vertex data.
pub trait Vertex {
    fn input() -> VertexInputLayout;
}

/// Position + texture coordinates, the layout of the engine's quads.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn input() -> VertexInputLayout {
        VertexInputLayout::packed(&[wgpu::VertexFormat::Float32x3, wgpu::VertexFormat::Float32x2])
    }
}
