// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use ash::vk;

pub const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Everything the bootstrap would otherwise hard-code.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub app_name: CString,
    pub app_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    /// Enables validation layers and the debug messenger.
    pub diagnostics: bool,
    pub portability_enumeration: bool,
    pub validation_layers: Vec<CString>,
    pub device_extensions: Vec<CString>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            app_name: c"ember".to_owned(),
            app_version: vk::make_api_version(0, 1, 0, 0),
            engine_name: c"No Engine".to_owned(),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_3,
            diagnostics: cfg!(debug_assertions),
            portability_enumeration: true,
            validation_layers: vec![VALIDATION_LAYER.to_owned()],
            device_extensions: vec![ash::khr::swapchain::NAME.to_owned()],
        }
    }
}

impl BootstrapConfig {
    /// Validation layers to enable, empty when diagnostics are off.
    pub fn enabled_layers(&self) -> &[CString] {
        if self.diagnostics {
            &self.validation_layers
        } else {
            &[]
        }
    }
}
