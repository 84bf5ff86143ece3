// SPDX-License-Identifier: CEPL-1.0
//! winit-backed [`SurfaceWindow`].
//!
//! The bootstrap drives the window by polling (`should_close` / `pump_events`),
//! so this uses winit's pump-events extension instead of `run_app`. That
//! extension exists on the desktop backends (Windows, macOS, X11, Wayland).
#![deny(unsafe_op_in_unsafe_fn)]
use std::ffi::{CStr, CString};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ember_wsi::{FramebufferSize, SurfaceWindow, WindowError};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, error, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

struct WindowState {
    attrs: WindowAttributes,
    window: Option<Window>,
    size: PhysicalSize<u32>,
    close_requested: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match event_loop.create_window(self.attrs.clone()) {
            Ok(window) => {
                self.size = window.inner_size();
                info!("window created ({}x{})", self.size.width, self.size.height);
                self.window = Some(window);
            }
            Err(e) => {
                error!("create_window failed: {e}");
                self.close_requested = true;
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                debug!("Resized → {}x{}", new_size.width, new_size.height);
                self.size = new_size;
            }
            _ => {}
        }
    }
}

/// A single native window plus the event loop that feeds it.
pub struct PlatformWindow {
    // Declared before the event loop so the window drops first.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    /// Create the event loop and pump it until the window exists.
    pub fn open(cfg: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("EventLoop::new")?;
        let mut state = WindowState {
            attrs: Window::default_attributes()
                .with_title(cfg.title.clone())
                .with_inner_size(LogicalSize::new(cfg.width, cfg.height)),
            window: None,
            size: PhysicalSize::new(cfg.width, cfg.height),
            close_requested: false,
        };

        while state.window.is_none() {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!("event loop exited with {code} before the window opened"));
            }
            if state.close_requested {
                return Err(anyhow!("window creation failed"));
            }
        }

        Ok(Self { state, event_loop })
    }

    fn window(&self) -> Result<&Window, WindowError> {
        self.state.window.as_ref().ok_or(WindowError::Closed)
    }
}

impl SurfaceWindow for PlatformWindow {
    fn required_instance_extensions(&self) -> Result<Vec<CString>, WindowError> {
        let (display, _) = self.raw_handles()?;
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(|e| WindowError::Unsupported(format!("enumerate_required_extensions: {e}")))?;
        Ok(names
            .iter()
            // SAFETY: ash-window hands out pointers to its static, NUL-terminated
            // extension name constants.
            .map(|&p| unsafe { CStr::from_ptr(p) }.to_owned())
            .collect())
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), WindowError> {
        let window = self.window()?;
        let dh = window.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();
        Ok((dh, wh))
    }

    fn framebuffer_size(&self) -> FramebufferSize {
        let size = match &self.state.window {
            Some(w) => w.inner_size(),
            None => self.state.size,
        };
        FramebufferSize {
            width: size.width,
            height: size.height,
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested || self.state.window.is_none()
    }

    fn pump_events(&mut self) {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::from_millis(16)), &mut self.state)
        {
            debug!("event loop exit ({code})");
            self.state.close_requested = true;
        }
    }
}
