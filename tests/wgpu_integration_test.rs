#[cfg(feature = "integration-tests")]
use std::iter;

#[cfg(feature = "integration-tests")]
use prism_ngin::{
    backend::{WgpuContext, WgpuRecorder},
    context::{DeviceContext, RenderTarget},
    descriptors::{
        DescriptorBindingSet, DescriptorResource, DescriptorWrite, handler::Descriptor,
    },
    error::DeviceError,
    particles::{Atlas, ParticleType, Particles, RendererParticles},
    pipelines::{
        DepthMode, PipelineCreate, PipelineVariant,
        input::{InputRate, VertexAttribute, VertexBinding, VertexInputLayout},
        pipeline::CompiledPipeline,
    },
    shader::Shader,
};

#[cfg(feature = "integration-tests")]
use crate::common::test_utils::TestCamera;

mod common;

#[cfg(feature = "integration-tests")]
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[cfg(feature = "integration-tests")]
fn context() -> WgpuContext {
    prism_ngin::init_logging();
    futures::executor::block_on(WgpuContext::headless()).expect("no adapter available")
}

#[cfg(feature = "integration-tests")]
fn attachment(ctx: &WgpuContext, label: &str, format: wgpu::TextureFormat) -> wgpu::TextureView {
    ctx.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

/// Records into a pass with a colour and a depth attachment and submits it.
/// Returns whatever validation error the device raised meanwhile.
#[cfg(feature = "integration-tests")]
fn record<R>(
    ctx: &WgpuContext,
    draw: impl FnOnce(&mut WgpuRecorder<'_, '_>) -> R,
) -> (R, Option<wgpu::Error>) {
    let scope = ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    let colour = attachment(ctx, "colour", FORMAT);
    let depth = attachment(ctx, "depth", RenderTarget::DEPTH_FORMAT);
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Encoder"),
        });
    let result = {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &colour,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
            multiview_mask: None,
        });
        let mut recorder = WgpuRecorder::new(ctx, &mut render_pass);
        draw(&mut recorder)
    };
    ctx.queue.submit(iter::once(encoder.finish()));
    (result, futures::executor::block_on(scope.pop()))
}

#[cfg(feature = "integration-tests")]
const POSITION_WGSL: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

#[cfg(feature = "integration-tests")]
const INSTANCED_WGSL: &str = r#"
@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) offset: vec4<f32>,
) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position + offset.xyz, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

#[cfg(feature = "integration-tests")]
fn compile(
    ctx: &WgpuContext,
    wgsl: &str,
    create: &PipelineCreate,
    vertex_input: VertexInputLayout,
) -> (Shader, CompiledPipeline) {
    let shader = Shader::new(ctx, &create.label, wgsl).unwrap();
    let pipeline = CompiledPipeline::create(
        ctx,
        &shader,
        &RenderTarget::with_depth(FORMAT),
        create,
        vertex_input,
        DescriptorBindingSet::new().uniform("UboScene", 0, wgpu::ShaderStages::VERTEX),
    )
    .unwrap();
    (shader, pipeline)
}

#[test]
#[cfg(feature = "integration-tests")]
fn every_depth_mode_binds_in_a_pass_with_depth() {
    let ctx = context();
    for mode in [
        DepthMode::None,
        DepthMode::Read,
        DepthMode::Write,
        DepthMode::ReadWrite,
    ] {
        let create = PipelineCreate::new(&format!("{mode:?}"), PipelineVariant::Polygon).depth(mode);
        let (shader, pipeline) = compile(
            &ctx,
            POSITION_WGSL,
            &create,
            VertexInputLayout::packed(&[wgpu::VertexFormat::Float32x3]),
        );

        let ((), error) = record(&ctx, |recorder| pipeline.bind_pipeline(recorder));
        assert!(error.is_none(), "{mode:?}: {error:?}");

        pipeline.destroy(&ctx);
        shader.destroy(&ctx);
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn per_vertex_and_per_instance_bindings_compile() {
    let ctx = context();
    let input = VertexInputLayout::new(
        vec![
            VertexBinding {
                binding: 0,
                stride: 12,
                input_rate: InputRate::Vertex,
            },
            VertexBinding {
                binding: 1,
                stride: 16,
                input_rate: InputRate::Instance,
            },
        ],
        vec![
            VertexAttribute {
                location: 0,
                binding: 0,
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
            },
            VertexAttribute {
                location: 1,
                binding: 1,
                format: wgpu::VertexFormat::Float32x4,
                offset: 0,
            },
        ],
    );
    let (shader, pipeline) = compile(
        &ctx,
        INSTANCED_WGSL,
        &PipelineCreate::new("instanced", PipelineVariant::Polygon),
        input,
    );

    let ((), error) = record(&ctx, |recorder| pipeline.bind_pipeline(recorder));
    assert!(error.is_none(), "{error:?}");

    pipeline.destroy(&ctx);
    shader.destroy(&ctx);
}

#[test]
#[cfg(feature = "integration-tests")]
fn non_contiguous_vertex_bindings_compile() {
    let ctx = context();
    let input = VertexInputLayout::new(
        vec![VertexBinding {
            binding: 1,
            stride: 12,
            input_rate: InputRate::Vertex,
        }],
        vec![VertexAttribute {
            location: 0,
            binding: 1,
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
        }],
    );
    let (shader, pipeline) = compile(
        &ctx,
        POSITION_WGSL,
        &PipelineCreate::new("sparse", PipelineVariant::Polygon),
        input,
    );

    let ((), error) = record(&ctx, |recorder| pipeline.bind_pipeline(recorder));
    assert!(error.is_none(), "{error:?}");

    pipeline.destroy(&ctx);
    shader.destroy(&ctx);
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_draw_particles_offscreen() {
    let ctx = context();
    let target = RenderTarget::with_depth(FORMAT);
    let mut renderer = RendererParticles::new(&ctx, &target).unwrap();

    let texture = ctx
        .create_texture_rgba8("atlas", 2, 2, &[255; 16])
        .unwrap();
    let mut particles = Particles::new();
    let id = particles.add_type(ParticleType::new(
        "sparks",
        texture,
        Atlas {
            rows: 2,
            stage_cycles: 1.0,
        },
        [0.0; 4],
        1.0,
        1.0,
    ));
    for z in [3.0, 4.0, 5.0] {
        let p = particles.particle_type(id).unwrap().spawn(
            cgmath::Vector3::new(0.0, 0.0, -z),
            cgmath::Vector3::new(0.0, 1.0, 0.0),
            0.1,
            0.0,
        );
        particles.emit(id, p);
    }
    particles.update(0.25);

    let (drawn, error) = record(&ctx, |recorder| {
        renderer.render(&ctx, recorder, &TestCamera, &mut particles)
    });

    assert!(error.is_none(), "{error:?}");
    assert_eq!(drawn, 1);
    assert_eq!(particles.particle_type(id).unwrap().instances(), 3);

    renderer.destroy(&ctx);
    particles.destroy(&ctx);
    if let Some(DescriptorResource::SampledImage { view, sampler }) = texture.descriptor() {
        ctx.destroy_texture(view, sampler);
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn pool_rejects_sets_beyond_max_sets() {
    let ctx = context();
    let bindings = DescriptorBindingSet::new().uniform("UboScene", 0, wgpu::ShaderStages::VERTEX);
    let layout = ctx
        .create_descriptor_set_layout("limited", bindings.bindings())
        .unwrap();
    let pool = ctx
        .create_descriptor_pool("limited", &bindings.pool_sizes(), 1)
        .unwrap();

    assert!(ctx.allocate_descriptor_set(pool, layout).is_ok());
    assert!(matches!(
        ctx.allocate_descriptor_set(pool, layout),
        Err(DeviceError::PoolExhausted { .. })
    ));

    ctx.destroy_descriptor_set_layout(layout);
    ctx.destroy_descriptor_pool(pool);
}

#[test]
#[cfg(feature = "integration-tests")]
fn backend_rejects_mismatched_writes() {
    let ctx = context();
    let bindings = DescriptorBindingSet::new().uniform("UboScene", 0, wgpu::ShaderStages::VERTEX);
    let layout = ctx
        .create_descriptor_set_layout("mismatch", bindings.bindings())
        .unwrap();
    let pool = ctx
        .create_descriptor_pool("mismatch", &bindings.pool_sizes(), 1)
        .unwrap();
    let set = ctx.allocate_descriptor_set(pool, layout).unwrap();
    let texture = ctx.create_texture_rgba8("mismatch", 1, 1, &[0; 4]).unwrap();

    let write = DescriptorWrite {
        binding: 0,
        resource: texture.descriptor().unwrap(),
    };
    assert!(matches!(
        ctx.update_descriptor_set(set, &[write]),
        Err(DeviceError::LayoutMismatch(_))
    ));

    ctx.destroy_descriptor_set_layout(layout);
    ctx.destroy_descriptor_pool(pool);
}
