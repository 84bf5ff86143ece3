// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bootstrap: instance, debug messenger, surface, device, swapchain.
//!
//! [`Bootstrap`] sequences the stages over a [`Driver`]; [`AshDriver`] is the
//! real one.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod capabilities;
pub mod config;
pub mod debug;
pub mod device;
pub mod driver;
pub mod error;
pub mod instance;
pub mod lifecycle;
pub mod queue;
pub mod surface;
pub mod swapchain;

#[cfg(test)]
mod testing;

pub use ash::vk;
pub use config::{BootstrapConfig, VALIDATION_LAYER};
pub use device::{LogicalDevice, SelectedDevice};
pub use driver::{AshDriver, Driver};
pub use error::{BootstrapError, CapabilityKind, Result};
pub use lifecycle::{Bootstrap, Stage};
pub use queue::{QueueFamilies, QueueFamilyResolution};
pub use swapchain::{SwapChainSupport, Swapchain, SwapchainChoice};
