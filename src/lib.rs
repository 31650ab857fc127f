//! prism-ngin
//!
//! The pipeline layer of a small instancing-oriented renderer. It compiles
//! graphics pipelines from a shader, a vertex layout and a declared set of
//! named descriptor bindings, owns the descriptor infrastructure those
//! pipelines need, and binds per-frame resources by name before each draw.
//!
//! High-level modules
//! - `context`: the `DeviceContext` seam and the GPU handles it hands out
//! - `backend`: `wgpu` implementation of the device context and recorder
//! - `command`: backend-neutral command recording
//! - `descriptors`: binding declarations, the descriptor set manager and the
//!   per-frame `DescriptorsHandler`
//! - `pipelines`: pipeline configuration, fixed-function state, vertex input
//!   and the `CompiledPipeline` lifecycle
//! - `resources`: uniform, storage and texture resources that can be bound
//! - `particles`: instanced particles drawn through the pipeline layer
//! - `render`: the camera trait and frustum culling
//!

pub mod backend;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod particles;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod shader;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;

/// Installs `env_logger` as the `log` backend. Repeated calls only warn.
pub fn init_logging() {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }
}
