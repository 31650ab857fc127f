//! Assembly strategies, one per [`PipelineVariant`].
//!
//! Each strategy receives the fixed-function state, shader stages, pipeline
//! layout and render target and produces the final pipeline object. Only
//! [`Polygon`] is implemented; the remaining variants are explicit stubs that
//! fail with [`PipelineError::UnsupportedVariant`].

use crate::{
    context::{DeviceContext, GraphicsPipelineDesc, PipelineHandle},
    error::{DeviceError, GpuObject, PipelineError},
};

use super::PipelineVariant;

pub trait VariantAssembler {
    fn variant(&self) -> PipelineVariant;

    fn assemble(
        &self,
        device: &dyn DeviceContext,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, PipelineError>;
}

/// Opaque triangle geometry against one colour attachment and depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct Polygon;

impl VariantAssembler for Polygon {
    fn variant(&self) -> PipelineVariant {
        PipelineVariant::Polygon
    }

    fn assemble(
        &self,
        device: &dyn DeviceContext,
        desc: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, PipelineError> {
        if desc.target.attachment_count() == 0 {
            return Err(PipelineError::Device {
                object: GpuObject::Pipeline,
                source: DeviceError::LayoutMismatch(
                    "render target has no colour attachment".to_string(),
                ),
            });
        }
        for format in &desc.target.colour_formats {
            if !device.supports_format(*format) {
                return Err(PipelineError::Device {
                    object: GpuObject::Pipeline,
                    source: DeviceError::Unsupported(format!(
                        "colour attachment format {format:?}"
                    )),
                });
            }
        }
        device
            .create_graphics_pipeline(desc)
            .map_err(PipelineError::device(GpuObject::Pipeline))
    }
}

/// Placeholder for variants without an assembly implementation yet.
#[derive(Debug, Clone, Copy)]
pub struct Unimplemented(pub PipelineVariant);

impl VariantAssembler for Unimplemented {
    fn variant(&self) -> PipelineVariant {
        self.0
    }

    fn assemble(
        &self,
        _: &dyn DeviceContext,
        _: &GraphicsPipelineDesc<'_>,
    ) -> Result<PipelineHandle, PipelineError> {
        Err(PipelineError::UnsupportedVariant(self.0))
    }
}

pub fn assembler_for(variant: PipelineVariant) -> Box<dyn VariantAssembler> {
    match variant {
        PipelineVariant::Polygon => Box::new(Polygon),
        PipelineVariant::NoDepthTest
        | PipelineVariant::MultiRenderTarget
        | PipelineVariant::MultiTexture => Box::new(Unimplemented(variant)),
    }
}
