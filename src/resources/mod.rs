//! GPU resources renderers push into descriptor sets.
//!
//! - `uniform`: [`uniform::UniformHandler`], a typed uniform buffer
//! - `storage`: [`storage::StorageHandler`], a typed, fixed-capacity storage buffer
//! - `texture`: [`texture::Texture`], an image view and sampler pair

pub mod storage;
pub mod texture;
pub mod uniform;
