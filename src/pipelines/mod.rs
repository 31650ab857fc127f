//! Pipeline construction.
//!
//! - `input`: vertex input layouts and the [`input::Vertex`] trait
//! - `state`: fixed-function state and the engine's baseline
//! - `variant`: one assembly strategy per [`PipelineVariant`]
//! - `pipeline`: [`pipeline::CompiledPipeline`], its creation and teardown
//!
//! A renderer describes what it wants with a [`PipelineCreate`], a vertex
//! layout and a descriptor binding set, and compiles them once at startup.

pub mod input;
pub mod pipeline;
pub mod state;
pub mod variant;

use state::FixedFunctionState;

/// Selects the fixed-function template and attachment layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    Polygon,
    NoDepthTest,
    MultiRenderTarget,
    MultiTexture,
}

/// Whether the pipeline reads and/or writes the depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthMode {
    None,
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl DepthMode {
    pub fn reads(&self) -> bool {
        matches!(self, DepthMode::Read | DepthMode::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, DepthMode::Write | DepthMode::ReadWrite)
    }
}

/// Renderer-facing pipeline configuration.
///
/// The default reproduces [`FixedFunctionState::default`] exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineCreate {
    pub label: String,
    pub variant: PipelineVariant,
    pub depth: DepthMode,
    pub polygon_mode: wgpu::PolygonMode,
    pub cull_mode: Option<wgpu::Face>,
}

impl Default for PipelineCreate {
    fn default() -> Self {
        Self {
            label: "Render Pipeline".to_string(),
            variant: PipelineVariant::Polygon,
            depth: DepthMode::ReadWrite,
            polygon_mode: wgpu::PolygonMode::Fill,
            cull_mode: Some(wgpu::Face::Back),
        }
    }
}

impl PipelineCreate {
    pub fn new(label: &str, variant: PipelineVariant) -> Self {
        Self {
            label: label.to_string(),
            variant,
            ..Default::default()
        }
    }

    pub fn depth(mut self, depth: DepthMode) -> Self {
        self.depth = depth;
        self
    }

    pub fn polygon_mode(mut self, polygon_mode: wgpu::PolygonMode) -> Self {
        self.polygon_mode = polygon_mode;
        self
    }

    pub fn cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Baseline state with this configuration's overrides applied.
    pub fn fixed_function_state(&self) -> FixedFunctionState {
        let mut state = FixedFunctionState::default();
        state.rasterization.polygon_mode = self.polygon_mode;
        state.rasterization.cull_mode = self.cull_mode;
        state.depth_stencil.depth_test = self.depth.reads();
        state.depth_stencil.depth_write = self.depth.writes();
        state
    }
}
