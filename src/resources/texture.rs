use crate::{
    context::{ImageViewHandle, SamplerHandle},
    descriptors::{DescriptorResource, handler::Descriptor},
};

/// A sampled texture as seen by the pipeline layer: an image view and a sampler.
///
/// Textures that are still streaming in are [`pending`](Self::pending) and
/// cannot be bound yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    image: Option<(ImageViewHandle, SamplerHandle)>,
}

impl Texture {
    pub fn new(view: ImageViewHandle, sampler: SamplerHandle) -> Self {
        Self {
            image: Some((view, sampler)),
        }
    }

    pub fn pending() -> Self {
        Self { image: None }
    }

    pub fn finish_loading(&mut self, view: ImageViewHandle, sampler: SamplerHandle) {
        self.image = Some((view, sampler));
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }
}

impl Descriptor for Texture {
    fn descriptor(&self) -> Option<DescriptorResource> {
        self.image
            .map(|(view, sampler)| DescriptorResource::SampledImage { view, sampler })
    }
}
