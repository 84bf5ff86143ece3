// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use ember_wsi::SurfaceWindow;
use tracing::debug;

use crate::driver::Driver;
use crate::error::{rejected, Result};

/// Create the drawable surface for `window` on `instance`.
pub fn bind_surface<D, W>(
    driver: &mut D,
    instance: vk::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR>
where
    D: Driver + ?Sized,
    W: SurfaceWindow + ?Sized,
{
    let (display, handle) = window.raw_handles()?;
    let surface = driver
        .create_surface(instance, display, handle)
        .map_err(rejected("vkCreateSurfaceKHR"))?;
    debug!("surface bound: {surface:?}");
    Ok(surface)
}
