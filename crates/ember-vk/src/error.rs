// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use ash::vk;
use ember_wsi::WindowError;
use thiserror::Error;

use crate::lifecycle::Stage;

/// Which capability list a missing name came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityKind {
    ValidationLayer,
    InstanceExtension,
    DeviceExtension,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CapabilityKind::ValidationLayer => "validation layers",
            CapabilityKind::InstanceExtension => "instance extensions",
            CapabilityKind::DeviceExtension => "device extensions",
        })
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("requested {kind} not available: {missing:?}")]
    UnsupportedCapability {
        kind: CapabilityKind,
        missing: Vec<String>,
    },
    #[error("{operation} rejected by driver: {result}")]
    DriverRejected {
        operation: &'static str,
        result: vk::Result,
    },
    #[error("no Vulkan physical devices found")]
    NoDevicesFound,
    #[error("no physical device satisfies the queue, extension and swapchain requirements")]
    NoSuitableDevice,
    #[error("could not load the Vulkan loader: {0}")]
    Loader(String),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("bootstrap cannot advance from {0:?}")]
    InvalidStage(Stage),
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

/// `map_err` helper: tag a raw driver status with the call that produced it.
pub(crate) fn rejected(operation: &'static str) -> impl FnOnce(vk::Result) -> BootstrapError {
    move |result| BootstrapError::DriverRejected { operation, result }
}
