// SPDX-License-Identifier: CEPL-1.0
//! The bootstrap state machine and its teardown.
//!
//! STRICT ORDER:
//!   instance (+ debug messenger) → surface → physical device → logical device → swapchain
//! Teardown is the exact reverse of what was acquired, driven by a resource
//! stack: every handle is pushed the moment it exists, so a failure at any
//! stage releases exactly what came before it.
use ash::vk;
use ember_wsi::SurfaceWindow;
use tracing::{debug, info};

use crate::config::BootstrapConfig;
use crate::device::{self, LogicalDevice, SelectedDevice};
use crate::driver::Driver;
use crate::error::{BootstrapError, Result};
use crate::instance;
use crate::surface::bind_surface;
use crate::swapchain::{self, Swapchain};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Uninitialized,
    InstanceReady,
    SurfaceReady,
    DeviceSelected,
    LogicalDeviceReady,
    SwapchainReady,
    Running,
    TornDown,
}

#[derive(Clone, Copy, Debug)]
enum Resource {
    Instance(vk::Instance),
    DebugSink(vk::Instance, vk::DebugUtilsMessengerEXT),
    Surface(vk::Instance, vk::SurfaceKHR),
    Device(vk::Device),
    Swapchain(vk::Device, vk::SwapchainKHR),
}

impl Resource {
    fn release<D: Driver + ?Sized>(self, driver: &mut D) {
        debug!("releasing {self:?}");
        match self {
            Resource::Swapchain(device, swapchain) => driver.destroy_swapchain(device, swapchain),
            Resource::Device(device) => driver.destroy_device(device),
            Resource::Surface(instance, surface) => driver.destroy_surface(instance, surface),
            Resource::DebugSink(instance, messenger) => {
                driver.destroy_debug_messenger(instance, messenger)
            }
            Resource::Instance(instance) => driver.destroy_instance(instance),
        }
    }
}

/// Handles in acquisition order; released last-in first-out.
#[derive(Debug, Default)]
struct ResourceStack {
    held: Vec<Resource>,
}

impl ResourceStack {
    fn push(&mut self, resource: Resource) {
        self.held.push(resource);
    }

    fn unwind<D: Driver + ?Sized>(&mut self, driver: &mut D) {
        while let Some(resource) = self.held.pop() {
            resource.release(driver);
        }
    }
}

/// Owns every handle the bootstrap creates, from instance to swapchain.
///
/// Dropping it tears everything down; keep it declared after the window so
/// the surface goes before the window does.
pub struct Bootstrap<D: Driver> {
    driver: D,
    cfg: BootstrapConfig,
    stage: Stage,
    resources: ResourceStack,

    instance: Option<vk::Instance>,
    surface: Option<vk::SurfaceKHR>,
    selected: Option<SelectedDevice>,
    device: Option<LogicalDevice>,
    swapchain: Option<Swapchain>,
}

impl<D: Driver> Bootstrap<D> {
    pub fn new(driver: D, cfg: BootstrapConfig) -> Self {
        Self {
            driver,
            cfg,
            stage: Stage::Uninitialized,
            resources: ResourceStack::default(),
            instance: None,
            surface: None,
            selected: None,
            device: None,
            swapchain: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.cfg
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn instance(&self) -> Option<vk::Instance> {
        self.instance
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    pub fn selected_device(&self) -> Option<&SelectedDevice> {
        self.selected.as_ref()
    }

    pub fn logical_device(&self) -> Option<&LogicalDevice> {
        self.device.as_ref()
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    /// Perform the next forward transition. On failure everything acquired
    /// so far is released and the bootstrap ends up `TornDown`.
    pub fn advance<W: SurfaceWindow + ?Sized>(&mut self, window: &W) -> Result<Stage> {
        if matches!(self.stage, Stage::Running | Stage::TornDown) {
            return Err(BootstrapError::InvalidStage(self.stage));
        }

        match self.step(window) {
            Ok(next) => {
                info!("bootstrap: {:?} → {:?}", self.stage, next);
                self.stage = next;
                Ok(next)
            }
            // Reported by whoever receives the error.
            Err(e) => {
                debug!("{:?} failed, tearing down", self.stage);
                self.teardown();
                Err(e)
            }
        }
    }

    fn step<W: SurfaceWindow + ?Sized>(&mut self, window: &W) -> Result<Stage> {
        let missing = BootstrapError::InvalidStage(self.stage);

        let next = match self.stage {
            Stage::Uninitialized => {
                let window_exts = window.required_instance_extensions()?;
                let instance =
                    instance::create_instance(&mut self.driver, &window_exts, &self.cfg)?;
                self.resources.push(Resource::Instance(instance));
                self.instance = Some(instance);

                if self.cfg.diagnostics {
                    let sink = instance::attach_debug_sink(&mut self.driver, instance)?;
                    self.resources.push(Resource::DebugSink(instance, sink));
                }
                Stage::InstanceReady
            }
            Stage::InstanceReady => {
                let instance = self.instance.ok_or(missing)?;
                let surface = bind_surface(&mut self.driver, instance, window)?;
                self.resources.push(Resource::Surface(instance, surface));
                self.surface = Some(surface);
                Stage::SurfaceReady
            }
            Stage::SurfaceReady => {
                let (Some(instance), Some(surface)) = (self.instance, self.surface) else {
                    return Err(missing);
                };
                let selected =
                    device::select_physical_device(&mut self.driver, instance, surface, &self.cfg)?;
                self.selected = Some(selected);
                Stage::DeviceSelected
            }
            Stage::DeviceSelected => {
                let selected = self.selected.as_ref().ok_or(missing)?;
                let logical = device::create_logical_device(
                    &mut self.driver,
                    selected.physical,
                    selected.families,
                    &self.cfg,
                )?;
                self.resources.push(Resource::Device(logical.device));
                self.device = Some(logical);
                Stage::LogicalDeviceReady
            }
            Stage::LogicalDeviceReady => {
                let (Some(surface), Some(selected), Some(logical)) =
                    (self.surface, self.selected.as_ref(), self.device.as_ref())
                else {
                    return Err(missing);
                };
                let sc = swapchain::negotiate_swapchain(
                    &mut self.driver,
                    selected.physical,
                    logical.device,
                    surface,
                    selected.families,
                    window.framebuffer_size(),
                )?;
                self.resources.push(Resource::Swapchain(logical.device, sc.handle));
                self.swapchain = Some(sc);
                Stage::SwapchainReady
            }
            Stage::SwapchainReady => Stage::Running,
            Stage::Running | Stage::TornDown => return Err(missing),
        };
        Ok(next)
    }

    /// Advance until the swapchain exists.
    pub fn bootstrap<W: SurfaceWindow + ?Sized>(&mut self, window: &W) -> Result<()> {
        if self.stage > Stage::SwapchainReady {
            return Err(BootstrapError::InvalidStage(self.stage));
        }
        while self.stage < Stage::SwapchainReady {
            self.advance(window)?;
        }
        Ok(())
    }

    /// Bootstrap, then hold `Running` until the window asks to close, then tear down.
    pub fn run<W: SurfaceWindow + ?Sized>(&mut self, window: &mut W) -> Result<()> {
        self.bootstrap(&*window)?;
        self.advance(&*window)?;

        while !window.should_close() {
            window.pump_events();
        }

        self.teardown();
        Ok(())
    }

    /// Release every acquired handle in reverse order. Idempotent.
    pub fn teardown(&mut self) {
        if self.stage == Stage::TornDown {
            return;
        }

        self.swapchain = None;
        self.device = None;
        self.selected = None;
        self.surface = None;
        self.instance = None;
        self.resources.unwind(&mut self.driver);

        info!("bootstrap: {:?} → {:?}", self.stage, Stage::TornDown);
        self.stage = Stage::TornDown;
    }
}

impl<D: Driver> Drop for Bootstrap<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
