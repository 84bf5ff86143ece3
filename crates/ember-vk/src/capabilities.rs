// SPDX-License-Identifier: CEPL-1.0
//! Required-capability lists and the checks against what the driver reports.
use std::collections::HashSet;
use std::ffi::{CStr, CString};

use ash::vk;

use crate::config::BootstrapConfig;
use crate::driver::Driver;
use crate::error::{rejected, BootstrapError, CapabilityKind, Result};

/// Window-system extensions first, then portability enumeration, then
/// debug utils when diagnostics are on. Later duplicates are dropped.
pub fn required_instance_extensions(
    window_extensions: &[CString],
    cfg: &BootstrapConfig,
) -> Vec<CString> {
    let mut out: Vec<CString> = Vec::with_capacity(window_extensions.len() + 2);
    let mut push = |name: &CStr| {
        if !out.iter().any(|n| n.as_c_str() == name) {
            out.push(name.to_owned());
        }
    };

    for ext in window_extensions {
        push(ext);
    }
    if cfg.portability_enumeration {
        push(ash::khr::portability_enumeration::NAME);
    }
    if cfg.diagnostics {
        push(ash::ext::debug_utils::NAME);
    }
    out
}

pub fn instance_create_flags(cfg: &BootstrapConfig) -> vk::InstanceCreateFlags {
    if cfg.portability_enumeration {
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    }
}

/// Set subtraction: start from the requested names, strike every name the
/// driver reports, succeed iff nothing is left.
pub fn names_supported(available: &[CString], requested: &[CString]) -> bool {
    let mut remaining: HashSet<&CStr> = requested.iter().map(CString::as_c_str).collect();
    for name in available {
        remaining.remove(name.as_c_str());
    }
    remaining.is_empty()
}

/// Requested names the driver does not report, in request order, without repeats.
pub fn missing_names(available: &[CString], requested: &[CString]) -> Vec<String> {
    let available: HashSet<&CStr> = available.iter().map(CString::as_c_str).collect();
    let mut missing: Vec<String> = Vec::new();
    for name in requested {
        if available.contains(name.as_c_str()) {
            continue;
        }
        let name = name.to_string_lossy().into_owned();
        if !missing.contains(&name) {
            missing.push(name);
        }
    }
    missing
}

pub(crate) fn unsupported(
    kind: CapabilityKind,
    available: &[CString],
    requested: &[CString],
) -> BootstrapError {
    BootstrapError::UnsupportedCapability {
        kind,
        missing: missing_names(available, requested),
    }
}

pub fn layers_supported<D: Driver + ?Sized>(driver: &D, requested: &[CString]) -> Result<bool> {
    let available = driver
        .instance_layer_names()
        .map_err(rejected("vkEnumerateInstanceLayerProperties"))?;
    Ok(names_supported(&available, requested))
}

pub fn device_extensions_supported<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    requested: &[CString],
) -> Result<bool> {
    let available = driver
        .device_extension_names(device)
        .map_err(rejected("vkEnumerateDeviceExtensionProperties"))?;
    Ok(names_supported(&available, requested))
}
