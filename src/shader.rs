//! Shader modules and their stages.

use crate::{
    context::{DeviceContext, ShaderModuleHandle},
    error::DeviceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}

impl ShaderStageKind {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStageKind::Vertex => "vertex",
            ShaderStageKind::Fragment => "fragment",
        }
    }
}

/// One programmable stage: which module, which entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStage {
    pub kind: ShaderStageKind,
    pub module: ShaderModuleHandle,
    pub entry_point: String,
}

/// A compiled WGSL module plus the ordered stages a pipeline consumes.
#[derive(Debug)]
pub struct Shader {
    module: ShaderModuleHandle,
    stages: Vec<ShaderStage>,
}

impl Shader {
    /// Compiles `wgsl` with the engine's usual `vs_main` / `fs_main` entry points.
    pub fn new(device: &dyn DeviceContext, label: &str, wgsl: &str) -> Result<Self, DeviceError> {
        Self::with_entry_points(device, label, wgsl, "vs_main", Some("fs_main"))
    }

    pub fn with_entry_points(
        device: &dyn DeviceContext,
        label: &str,
        wgsl: &str,
        vertex_entry: &str,
        fragment_entry: Option<&str>,
    ) -> Result<Self, DeviceError> {
        let module = device.create_shader_module(label, wgsl)?;
        let mut stages = vec![ShaderStage {
            kind: ShaderStageKind::Vertex,
            module,
            entry_point: vertex_entry.to_string(),
        }];
        if let Some(entry_point) = fragment_entry {
            stages.push(ShaderStage {
                kind: ShaderStageKind::Fragment,
                module,
                entry_point: entry_point.to_string(),
            });
        }
        log::debug!("Compiled shader '{label}' as {module}");
        Ok(Self { module, stages })
    }

    /// Wraps stages that were compiled elsewhere. The shader does not own `module`.
    pub fn from_stages(module: ShaderModuleHandle, stages: Vec<ShaderStage>) -> Self {
        Self { module, stages }
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn module(&self) -> ShaderModuleHandle {
        self.module
    }

    pub fn destroy(self, device: &dyn DeviceContext) {
        device.destroy_shader_module(self.module);
    }
}
