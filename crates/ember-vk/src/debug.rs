// SPDX-License-Identifier: CEPL-1.0
//! Validation-layer messages → `tracing`.
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

use ash::vk;
use tracing::{debug, error, info, warn};

use crate::driver::DebugMessengerRequest;

/// Severities and categories the sink subscribes to.
pub fn sink_request() -> DebugMessengerRequest {
    DebugMessengerRequest {
        severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        types: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
    }
}

fn category_name(types: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL) {
        "general"
    } else {
        "unknown"
    }
}

fn emit(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    message: &str,
) {
    let category = category_name(types);
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(category, "[vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(category, "[vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!(category, "[vulkan] {message}");
    } else {
        debug!(category, "[vulkan] {message}");
    }
}

/// Messenger callback. Never asks the driver to abort the call.
pub(crate) unsafe extern "system" fn forward_to_tracing(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the loader passes a valid callback struct for the duration of the call.
    let p_message = unsafe { (*data).p_message };
    let message = if p_message.is_null() {
        Cow::Borrowed("")
    } else {
        // SAFETY: p_message is a NUL-terminated string owned by the loader.
        unsafe { CStr::from_ptr(p_message) }.to_string_lossy()
    };
    emit(severity, types, &message);
    vk::FALSE
}
