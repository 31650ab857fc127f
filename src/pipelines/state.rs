//! Fixed-function pipeline state.
//!
//! [`FixedFunctionState::default`] is the engine's baseline for every
//! pipeline: triangle lists, back-face culling, standard alpha blending into
//! one attachment, depth test and write with `Less`, one sample, and a dynamic
//! viewport and scissor.
//!
//! Some fields have no wgpu counterpart. The wgpu backend only accepts their
//! baseline values: no rasterizer discard, a line width of 1.0, no logic ops,
//! no depth bounds test, no sample shading, one viewport and one scissor.
//! Blend constants are set on the pass rather than baked into the pipeline.

use wgpu::{BlendComponent, BlendFactor, BlendOperation, ColorWrites, CompareFunction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputAssemblyState {
    pub topology: wgpu::PrimitiveTopology,
    pub primitive_restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant_factor: f32,
    pub clamp: f32,
    pub slope_factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizationState {
    pub depth_clamp: bool,
    pub rasterizer_discard: bool,
    pub polygon_mode: wgpu::PolygonMode,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    /// `None` disables depth bias.
    pub depth_bias: Option<DepthBias>,
    pub line_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendAttachmentState {
    pub blend_enable: bool,
    pub colour: BlendComponent,
    pub alpha: BlendComponent,
    pub write_mask: ColorWrites,
}

impl BlendAttachmentState {
    /// `src*alpha + dst*(1-alpha)` for colour, `src + dst*(1-alpha)` for alpha.
    pub const ALPHA_BLENDING: Self = Self {
        blend_enable: true,
        colour: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        write_mask: ColorWrites::ALL,
    };

    pub fn blend_state(&self) -> Option<wgpu::BlendState> {
        self.blend_enable.then_some(wgpu::BlendState {
            color: self.colour,
            alpha: self.alpha,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColourBlendState {
    pub logic_op_enable: bool,
    pub attachments: Vec<BlendAttachmentState>,
    pub blend_constants: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: wgpu::StencilOperation,
    pub pass_op: wgpu::StencilOperation,
    pub depth_fail_op: wgpu::StencilOperation,
    pub compare: CompareFunction,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl StencilOpState {
    pub const KEEP: Self = Self {
        fail_op: wgpu::StencilOperation::Keep,
        pass_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        compare: CompareFunction::Always,
        compare_mask: 0b0000_0000,
        write_mask: 0b1111_1111,
        reference: 0b0000_0000,
    };

    pub fn face_state(&self) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: self.compare,
            fail_op: self.fail_op,
            depth_fail_op: self.depth_fail_op,
            pass_op: self.pass_op,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunction,
    pub depth_bounds_test: bool,
    pub stencil_test: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
}

/// Counts only; the rectangles themselves are dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportState {
    pub viewport_count: u32,
    pub scissor_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultisampleState {
    pub sample_shading: bool,
    pub samples: u32,
    pub min_sample_shading: f32,
}

/// State supplied while recording instead of at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
}

pub const DYNAMIC_STATES: [DynamicState; 2] = [DynamicState::Viewport, DynamicState::Scissor];

#[derive(Debug, Clone, PartialEq)]
pub struct FixedFunctionState {
    pub input_assembly: InputAssemblyState,
    pub rasterization: RasterizationState,
    pub colour_blend: ColourBlendState,
    pub depth_stencil: DepthStencilState,
    pub viewport: ViewportState,
    pub multisample: MultisampleState,
    pub dynamic_states: Vec<DynamicState>,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            input_assembly: InputAssemblyState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                primitive_restart: false,
            },
            rasterization: RasterizationState {
                depth_clamp: false,
                rasterizer_discard: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                depth_bias: None,
                line_width: 1.0,
            },
            colour_blend: ColourBlendState {
                logic_op_enable: false,
                attachments: vec![BlendAttachmentState::ALPHA_BLENDING],
                blend_constants: [0.0; 4],
            },
            depth_stencil: DepthStencilState {
                depth_test: true,
                depth_write: true,
                depth_compare: CompareFunction::Less,
                depth_bounds_test: false,
                stencil_test: false,
                front: StencilOpState::KEEP,
                back: StencilOpState::KEEP,
                min_depth_bounds: 0.0,
                max_depth_bounds: 1.0,
            },
            viewport: ViewportState {
                viewport_count: 1,
                scissor_count: 1,
            },
            multisample: MultisampleState {
                sample_shading: false,
                samples: 1,
                min_sample_shading: 0.0,
            },
            dynamic_states: DYNAMIC_STATES.to_vec(),
        }
    }
}
