// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};
use thiserror::Error;

/// Framebuffer size in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window handle unavailable: {0}")]
    Handle(#[from] HandleError),
    #[error("window system cannot host a Vulkan surface: {0}")]
    Unsupported(String),
    #[error("window is gone")]
    Closed,
}

/// What the bootstrap needs from a window toolkit.
///
/// Implementors own the native window; the surface created from
/// [`SurfaceWindow::raw_handles`] must be destroyed before the window is.
pub trait SurfaceWindow {
    /// Instance extensions the windowing layer requires (e.g. `VK_KHR_surface`
    /// plus the platform surface extension), in toolkit order.
    fn required_instance_extensions(&self) -> Result<Vec<CString>, WindowError>;

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), WindowError>;

    fn framebuffer_size(&self) -> FramebufferSize;

    fn should_close(&self) -> bool;

    /// Process pending window events without blocking.
    fn pump_events(&mut self);
}
