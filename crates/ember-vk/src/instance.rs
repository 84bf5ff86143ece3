// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use ash::vk;
use tracing::{debug, info};

use crate::capabilities::{self, unsupported};
use crate::config::BootstrapConfig;
use crate::debug::sink_request;
use crate::driver::{Driver, InstanceRequest};
use crate::error::{rejected, CapabilityKind, Result};

/// Negotiate and create the instance.
///
/// With diagnostics on, the validation layers must be present before the
/// driver is asked for anything. Every requested instance extension must be
/// available as well. The debug sink is attached separately
/// ([`attach_debug_sink`]) so the caller already owns the instance if that fails.
pub fn create_instance<D: Driver + ?Sized>(
    driver: &mut D,
    window_extensions: &[CString],
    cfg: &BootstrapConfig,
) -> Result<vk::Instance> {
    if cfg.diagnostics && !capabilities::layers_supported(driver, &cfg.validation_layers)? {
        let available = driver
            .instance_layer_names()
            .map_err(rejected("vkEnumerateInstanceLayerProperties"))?;
        return Err(unsupported(
            CapabilityKind::ValidationLayer,
            &available,
            &cfg.validation_layers,
        ));
    }

    let extensions = capabilities::required_instance_extensions(window_extensions, cfg);
    let available = driver
        .instance_extension_names()
        .map_err(rejected("vkEnumerateInstanceExtensionProperties"))?;
    if !capabilities::names_supported(&available, &extensions) {
        return Err(unsupported(CapabilityKind::InstanceExtension, &available, &extensions));
    }
    debug!("instance extensions: {extensions:?}");

    let request = InstanceRequest {
        app_name: &cfg.app_name,
        app_version: cfg.app_version,
        engine_name: &cfg.engine_name,
        engine_version: cfg.engine_version,
        api_version: cfg.api_version,
        flags: capabilities::instance_create_flags(cfg),
        extensions: &extensions,
        layers: cfg.enabled_layers(),
    };

    let instance = driver.create_instance(&request).map_err(rejected("vkCreateInstance"))?;
    info!(
        "instance created (api {}.{}, validation={})",
        vk::api_version_major(cfg.api_version),
        vk::api_version_minor(cfg.api_version),
        cfg.diagnostics
    );
    Ok(instance)
}

/// Hook the validation layers up to `tracing`.
pub fn attach_debug_sink<D: Driver + ?Sized>(
    driver: &mut D,
    instance: vk::Instance,
) -> Result<vk::DebugUtilsMessengerEXT> {
    let messenger = driver
        .create_debug_messenger(instance, &sink_request())
        .map_err(rejected("vkCreateDebugUtilsMessengerEXT"))?;
    debug!("debug messenger attached");
    Ok(messenger)
}
