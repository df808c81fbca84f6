//! Shader module loading.
//!
//! WGSL modules are loaded from the shader directory by relative path at
//! init. Pipelines built from them are retained across surface
//! reconfiguration, so the set is read exactly once per process unless
//! init itself is rerun.

use rustc_hash::FxHashMap;
use std::path::Path;

use crate::errors::{RenderError, Result};

/// Every module the pipeline roster needs.
const SHADER_FILES: &[&str] = &[
    "voxel",
    "shadow",
    "prepass",
    "ssao",
    "ssao_blur",
    "sky",
    "grass",
    "network",
    "preview",
    "instanced",
    "downsample",
    "exposure_histogram",
    "exposure_reduce",
    "sun_shafts",
    "tonemap",
    "gi_sky",
    "gi_surface",
    "gi_inject",
    "gi_propagate",
];

/// The loaded shader modules, keyed by stem.
pub struct ShaderSet {
    modules: FxHashMap<&'static str, wgpu::ShaderModule>,
}

impl ShaderSet {
    /// Loads every module from `directory`; a missing or unreadable file
    /// fails init.
    pub fn load(device: &wgpu::Device, directory: &Path) -> Result<Self> {
        let mut modules = FxHashMap::default();
        for &name in SHADER_FILES {
            let path = directory.join(format!("{name}.wgsl"));
            let source =
                std::fs::read_to_string(&path).map_err(|e| RenderError::ShaderLoadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            modules.insert(name, module);
        }
        log::info!("loaded {} shader modules", modules.len());
        Ok(Self { modules })
    }

    /// Module lookup; the roster is fixed, so a miss is a programmer
    /// error.
    #[must_use]
    pub fn get(&self, name: &str) -> &wgpu::ShaderModule {
        self.modules
            .get(name)
            .unwrap_or_else(|| panic!("shader module '{name}' not in roster"))
    }
}
