// SPDX-License-Identifier: CEPL-1.0
//! Queue family resolution for the graphics + present pair.
use std::collections::BTreeSet;

use ash::vk;

use crate::driver::Driver;
use crate::error::{rejected, Result};

/// Partially known family indices. Only [`QueueFamilyResolution::complete`]
/// turns this into something the rest of the bootstrap may use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyResolution {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyResolution {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn complete(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Fully resolved family indices (may be equal).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, ascending.
    pub fn unique(&self) -> BTreeSet<u32> {
        [self.graphics, self.present].into_iter().collect()
    }
}

/// First graphics-capable family and first family that can present to
/// `surface`, scanning in driver order and stopping once both are known.
pub fn resolve_queue_families<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyResolution> {
    let mut resolution = QueueFamilyResolution::default();

    for (i, family) in driver.queue_family_properties(device).iter().enumerate() {
        let index = i as u32;

        if resolution.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            resolution.graphics = Some(index);
        }
        if resolution.present.is_none()
            && driver
                .surface_support(device, index, surface)
                .map_err(rejected("vkGetPhysicalDeviceSurfaceSupportKHR"))?
        {
            resolution.present = Some(index);
        }

        if resolution.is_complete() {
            break;
        }
    }

    Ok(resolution)
}
