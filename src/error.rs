//! Error types for pipeline construction and device calls.
//!
//! Construction failures are fatal for the pipeline being built and carry the
//! GPU object that failed. Per-frame binding failures are not errors at all:
//! they surface as `false` from [`crate::descriptors::handler::DescriptorsHandler::update`].

use std::fmt;

use thiserror::Error;

use crate::pipelines::PipelineVariant;

/// Failure reported by a [`crate::context::DeviceContext`] implementation.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u64 },
    #[error("descriptor pool {pool} is exhausted: {reason}")]
    PoolExhausted { pool: u64, reason: String },
    #[error("descriptor layout mismatch: {0}")]
    LayoutMismatch(String),
    #[error("unsupported by this device: {0}")]
    Unsupported(String),
    #[error("no {0} stage in shader")]
    MissingStage(&'static str),
    #[error("backend error: {0}")]
    Backend(String),
}

/// The GPU object a construction step was creating when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuObject {
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    PipelineLayout,
    Pipeline,
    ShaderModule,
    Buffer,
}

impl fmt::Display for GpuObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuObject::DescriptorSetLayout => "descriptor set layout",
            GpuObject::DescriptorPool => "descriptor pool",
            GpuObject::DescriptorSet => "descriptor set",
            GpuObject::PipelineLayout => "pipeline layout",
            GpuObject::Pipeline => "graphics pipeline",
            GpuObject::ShaderModule => "shader module",
            GpuObject::Buffer => "buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create {object}: {source}")]
    Device {
        object: GpuObject,
        #[source]
        source: DeviceError,
    },
    #[error("pipeline variant {0:?} has no assembly implementation")]
    UnsupportedVariant(PipelineVariant),
    #[error("invalid vertex input layout: {0}")]
    InvalidVertexLayout(String),
    #[error("invalid descriptor binding set: {0}")]
    InvalidBindingSet(String),
    #[error("shader has no stages")]
    NoShaderStages,
}

impl PipelineError {
    pub(crate) fn device(object: GpuObject) -> impl FnOnce(DeviceError) -> PipelineError {
        move |source| PipelineError::Device { object, source }
    }
}
