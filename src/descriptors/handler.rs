//! Per-frame descriptor binding.
//!
//! Each frame a renderer pushes the resources its pipeline reads, commits
//! them with [`DescriptorsHandler::update`], then binds and draws:
//!
//! ```ignore
//! descriptors.push("UboScene", &uniform_scene);
//! descriptors.push("samplerColour", &texture);
//! if descriptors.update(device, &pipeline) {
//!     descriptors.bind_descriptor(recorder, &pipeline);
//!     recorder.draw(6, instances);
//! }
//! ```
//!
//! Pushed bindings persist across frames until overwritten. An update that
//! cannot resolve every declared binding writes nothing and returns `false`;
//! the caller skips drawing for that frame.

use std::collections::HashMap;

use crate::{
    command::CommandRecorder,
    context::DeviceContext,
    descriptors::{DescriptorResource, DescriptorWrite},
    pipelines::pipeline::CompiledPipeline,
};

/// A resource that can occupy a descriptor slot.
pub trait Descriptor {
    /// `None` while the resource has no GPU-side storage yet.
    fn descriptor(&self) -> Option<DescriptorResource>;
}

impl Descriptor for DescriptorResource {
    fn descriptor(&self) -> Option<DescriptorResource> {
        Some(*self)
    }
}

#[derive(Debug, Default)]
pub struct DescriptorsHandler {
    pushed: HashMap<String, Option<DescriptorResource>>,
    last_writes: Vec<DescriptorWrite>,
}

impl DescriptorsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `resource` for the binding called `name`, replacing any earlier push.
    pub fn push(&mut self, name: &str, resource: &dyn Descriptor) {
        self.pushed.insert(name.to_string(), resource.descriptor());
    }

    /// Writes every declared binding of `pipeline` in one batched device call.
    ///
    /// Returns `false` without writing anything if a pushed name is not
    /// declared by the pipeline, a declared binding has nothing pushed, a
    /// pushed resource is not ready, or its kind does not match the slot.
    pub fn update(&mut self, device: &dyn DeviceContext, pipeline: &CompiledPipeline) -> bool {
        let declared = pipeline.bindings();

        if let Some(unknown) = self.pushed.keys().find(|name| declared.find(name).is_none()) {
            log::debug!(
                "Pipeline '{}' declares no binding named '{unknown}'",
                pipeline.label()
            );
            return false;
        }

        let mut writes = Vec::with_capacity(declared.len());
        for binding in declared.bindings() {
            let Some(Some(resource)) = self.pushed.get(&binding.name) else {
                log::debug!(
                    "Binding '{}' of pipeline '{}' is not ready",
                    binding.name,
                    pipeline.label()
                );
                return false;
            };
            if resource.kind() != binding.kind {
                log::debug!(
                    "Binding '{}' expects {:?} but {:?} was pushed",
                    binding.name,
                    binding.kind,
                    resource.kind()
                );
                return false;
            }
            writes.push(DescriptorWrite {
                binding: binding.binding,
                resource: *resource,
            });
        }
        writes.sort_by_key(|write| write.binding);

        if let Err(e) = device.update_descriptor_set(pipeline.descriptor_set(), &writes) {
            log::warn!(
                "Descriptor update for pipeline '{}' failed: {e}",
                pipeline.label()
            );
            return false;
        }
        self.last_writes = writes;
        true
    }

    pub fn bind_descriptor(&self, recorder: &mut dyn CommandRecorder, pipeline: &CompiledPipeline) {
        recorder.bind_descriptor_set(pipeline.pipeline_layout(), pipeline.descriptor_set());
    }

    /// The write list committed by the last successful [`update`](Self::update).
    pub fn last_writes(&self) -> &[DescriptorWrite] {
        &self.last_writes
    }

    pub fn clear(&mut self) {
        self.pushed.clear();
        self.last_writes.clear();
    }
}
