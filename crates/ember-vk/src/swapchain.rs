// SPDX-License-Identifier: CEPL-1.0
//! Swapchain negotiation: surface support query, format / present mode /
//! extent / image count selection, and creation.
use ash::vk;
use ember_wsi::FramebufferSize;
use tracing::{info, warn};

use crate::driver::{Driver, SharingMode, SwapchainRequest};
use crate::error::{rejected, BootstrapError, Result};
use crate::queue::QueueFamilies;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};
pub const PREFERRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;
/// Every conformant implementation supports FIFO.
pub const FALLBACK_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// What a (device, surface) pair supports, queried fresh each time.
#[derive(Clone, Debug)]
pub struct SwapChainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapChainSupport {
    /// At least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The negotiated parameters a swapchain is created with.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainChoice {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    /// Owned by the swapchain; never destroyed individually.
    pub images: Vec<vk::Image>,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

pub fn query_support<D: Driver + ?Sized>(
    driver: &D,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SwapChainSupport> {
    let capabilities = driver
        .surface_capabilities(device, surface)
        .map_err(rejected("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
    let formats = driver
        .surface_formats(device, surface)
        .map_err(rejected("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
    let present_modes = driver
        .surface_present_modes(device, surface)
        .map_err(rejected("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

    Ok(SwapChainSupport {
        capabilities,
        formats,
        present_modes,
    })
}

/// RGBA8 sRGB if offered anywhere, otherwise whatever comes first.
///
/// # Panics
/// On an empty list; device selection never lets one through.
pub fn choose_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .unwrap_or_else(|| available[0])
}

pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&PREFERRED_PRESENT_MODE) {
        PREFERRED_PRESENT_MODE
    } else {
        FALLBACK_PRESENT_MODE
    }
}

/// The driver's current extent wins unless it reports the "any size"
/// sentinel (`u32::MAX` on both axes), in which case the framebuffer size is
/// clamped per axis.
pub fn choose_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    framebuffer: FramebufferSize,
) -> vk::Extent2D {
    let any_size =
        caps.current_extent.width == u32::MAX && caps.current_extent.height == u32::MAX;
    if !any_size {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 = no maximum).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count.saturating_add(1);
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

pub fn sharing_mode(families: QueueFamilies) -> SharingMode {
    if families.is_shared() {
        SharingMode::Exclusive
    } else {
        SharingMode::Concurrent([families.graphics, families.present])
    }
}

pub fn choose(support: &SwapChainSupport, framebuffer: FramebufferSize) -> SwapchainChoice {
    SwapchainChoice {
        format: choose_format(&support.formats),
        present_mode: choose_present_mode(&support.present_modes),
        extent: choose_extent(&support.capabilities, framebuffer),
    }
}

pub fn create_swapchain<D: Driver + ?Sized>(
    driver: &mut D,
    device: vk::Device,
    surface: vk::SurfaceKHR,
    support: &SwapChainSupport,
    choice: &SwapchainChoice,
    families: QueueFamilies,
) -> Result<Swapchain> {
    let caps = &support.capabilities;
    let request = SwapchainRequest {
        surface,
        min_image_count: choose_image_count(caps),
        format: choice.format,
        extent: choice.extent,
        array_layers: 1,
        usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        sharing: sharing_mode(families),
        pre_transform: caps.current_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode: choice.present_mode,
        clipped: true,
        old_swapchain: vk::SwapchainKHR::null(),
    };

    let handle = driver
        .create_swapchain(device, &request)
        .map_err(rejected("vkCreateSwapchainKHR"))?;

    let images = match driver.swapchain_images(device, handle) {
        Ok(images) => images,
        Err(result) => {
            warn!("vkGetSwapchainImagesKHR failed ({result}); dropping swapchain");
            driver.destroy_swapchain(device, handle);
            return Err(rejected("vkGetSwapchainImagesKHR")(result));
        }
    };

    Ok(Swapchain {
        handle,
        images,
        format: choice.format,
        present_mode: choice.present_mode,
        extent: choice.extent,
    })
}

/// Query, choose and create in one go.
pub fn negotiate_swapchain<D: Driver + ?Sized>(
    driver: &mut D,
    physical: vk::PhysicalDevice,
    device: vk::Device,
    surface: vk::SurfaceKHR,
    families: QueueFamilies,
    framebuffer: FramebufferSize,
) -> Result<Swapchain> {
    let support = query_support(driver, physical, surface)?;
    // Re-queried since selection; the surface may have lost its formats or modes.
    if !support.is_adequate() {
        warn!("surface no longer offers a format and a present mode");
        return Err(BootstrapError::NoSuitableDevice);
    }
    let choice = choose(&support, framebuffer);
    let swapchain = create_swapchain(driver, device, surface, &support, &choice, families)?;

    info!(
        "swapchain ready ({}x{}, {:?}/{:?}, {:?}, {} images)",
        swapchain.extent.width,
        swapchain.extent.height,
        swapchain.format.format,
        swapchain.format.color_space,
        swapchain.present_mode,
        swapchain.images.len()
    );
    Ok(swapchain)
}
