// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection and logical device creation.
use ash::vk;
use tracing::{debug, info};

use crate::capabilities;
use crate::config::BootstrapConfig;
use crate::driver::{DeviceRequest, Driver, QueueRequest};
use crate::error::{rejected, BootstrapError, Result};
use crate::queue::{resolve_queue_families, QueueFamilies};
use crate::swapchain;

/// The chosen GPU with the queue families it was admitted on.
#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub name: String,
}

pub struct LogicalDevice {
    pub device: vk::Device,
    pub graphics_queue: vk::Queue,
    /// Same handle as `graphics_queue` when the families coincide.
    pub present_queue: vk::Queue,
}

/// Why a candidate was turned down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rejection {
    QueueFamilies,
    DeviceExtensions,
    SwapchainSupport,
}

fn evaluate<D: Driver + ?Sized>(
    driver: &D,
    physical: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    cfg: &BootstrapConfig,
) -> Result<std::result::Result<QueueFamilies, Rejection>> {
    let Some(families) = resolve_queue_families(driver, physical, surface)?.complete() else {
        return Ok(Err(Rejection::QueueFamilies));
    };
    if !capabilities::device_extensions_supported(driver, physical, &cfg.device_extensions)? {
        return Ok(Err(Rejection::DeviceExtensions));
    }
    // Only meaningful once the swapchain extension is known to be there.
    if !swapchain::query_support(driver, physical, surface)?.is_adequate() {
        return Ok(Err(Rejection::SwapchainSupport));
    }
    Ok(Ok(families))
}

/// First device in enumeration order that has complete queue families, all
/// required extensions, and at least one surface format and present mode.
pub fn select_physical_device<D: Driver + ?Sized>(
    driver: &mut D,
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    cfg: &BootstrapConfig,
) -> Result<SelectedDevice> {
    let candidates = driver
        .enumerate_physical_devices(instance)
        .map_err(rejected("vkEnumeratePhysicalDevices"))?;
    if candidates.is_empty() {
        return Err(BootstrapError::NoDevicesFound);
    }

    for physical in candidates {
        let name = driver.physical_device_name(physical);
        match evaluate(driver, physical, surface, cfg)? {
            Ok(families) => {
                info!(
                    "selected GPU \"{name}\" (graphics family {}, present family {})",
                    families.graphics, families.present
                );
                return Ok(SelectedDevice {
                    physical,
                    families,
                    name,
                });
            }
            Err(reason) => debug!("rejecting GPU \"{name}\": {reason:?}"),
        }
    }

    Err(BootstrapError::NoSuitableDevice)
}

/// One request per distinct family, one queue each at full priority.
pub fn queue_requests(families: QueueFamilies) -> Vec<QueueRequest> {
    families
        .unique()
        .into_iter()
        .map(|family| QueueRequest {
            family,
            priorities: vec![1.0],
        })
        .collect()
}

pub fn create_logical_device<D: Driver + ?Sized>(
    driver: &mut D,
    physical: vk::PhysicalDevice,
    families: QueueFamilies,
    cfg: &BootstrapConfig,
) -> Result<LogicalDevice> {
    let queues = queue_requests(families);
    let request = DeviceRequest {
        queues: &queues,
        extensions: &cfg.device_extensions,
        layers: cfg.enabled_layers(),
    };

    let device = driver
        .create_device(physical, &request)
        .map_err(rejected("vkCreateDevice"))?;
    let graphics_queue = driver.device_queue(device, families.graphics, 0);
    let present_queue = driver.device_queue(device, families.present, 0);
    debug!(
        "logical device {device:?} ({} queue families)",
        queues.len()
    );

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
    })
}
