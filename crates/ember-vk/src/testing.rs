// SPDX-License-Identifier: CEPL-1.0
//! In-memory driver and window used by the unit tests.
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use ember_wsi::{FramebufferSize, SurfaceWindow, WindowError};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};

use crate::driver::{
    DebugMessengerRequest, DeviceRequest, Driver, InstanceRequest, QueueRequest, SwapchainRequest,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Object {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Swapchain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Create(Object, u64),
    Destroy(Object, u64),
    SurfaceSupport { physical: u64, family: u32 },
    DeviceExtensions(u64),
    Capabilities(u64),
    Formats(u64),
    PresentModes(u64),
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

pub fn destroyed(log: &CallLog) -> Vec<Object> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Destroy(o, _) => Some(*o),
            _ => None,
        })
        .collect()
}

pub fn created(log: &CallLog) -> Vec<Object> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Create(o, _) => Some(*o),
            _ => None,
        })
        .collect()
}

pub fn count(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|c| pred(c)).count()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailAt {
    Instance,
    DebugMessenger,
    Surface,
    Enumerate,
    Device,
    Swapchain,
    SwapchainImages,
}

pub fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR {
        format,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }
}

#[derive(Clone, Debug)]
pub struct FakeGpu {
    pub name: String,
    pub families: Vec<vk::QueueFlags>,
    pub present: Vec<bool>,
    pub extensions: Vec<CString>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// Images handed out per swapchain; `None` returns exactly the requested minimum.
    pub image_count: Option<u32>,
}

impl FakeGpu {
    /// One graphics+present family, swapchain support, fixed 800x600 surface.
    pub fn capable(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            families: vec![
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            ],
            present: vec![true],
            extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                srgb(vk::Format::B8G8R8A8_UNORM),
                srgb(vk::Format::R8G8B8A8_SRGB),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            image_count: None,
        }
    }

    /// Graphics on family 0, presentation only on family 1.
    pub fn split_queues(name: &str) -> Self {
        Self {
            families: vec![vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER],
            present: vec![false, true],
            ..Self::capable(name)
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedInstance {
    pub app_name: CString,
    pub api_version: u32,
    pub flags: vk::InstanceCreateFlags,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

#[derive(Clone, Debug)]
pub struct RecordedDevice {
    pub physical: vk::PhysicalDevice,
    pub queues: Vec<QueueRequest>,
    pub extensions: Vec<CString>,
    pub layers: Vec<CString>,
}

pub fn physical(index: usize) -> vk::PhysicalDevice {
    vk::PhysicalDevice::from_raw(0x1000 + index as u64)
}

pub struct MockDriver {
    pub layers: Vec<CString>,
    pub instance_extensions: Vec<CString>,
    pub gpus: Vec<FakeGpu>,
    pub fail_at: Option<FailAt>,
    pub log: CallLog,
    pub last_instance: Option<RecordedInstance>,
    pub last_messenger: Option<DebugMessengerRequest>,
    pub last_device: Option<RecordedDevice>,
    pub last_swapchain: Option<SwapchainRequest>,
    next_handle: u64,
}

impl MockDriver {
    /// A loader with the validation layer, the usual WSI extensions and one
    /// capable GPU.
    pub fn new() -> Self {
        Self {
            layers: vec![c"VK_LAYER_KHRONOS_validation".to_owned()],
            instance_extensions: vec![
                c"VK_KHR_surface".to_owned(),
                c"VK_KHR_xlib_surface".to_owned(),
                c"VK_KHR_portability_enumeration".to_owned(),
                c"VK_EXT_debug_utils".to_owned(),
            ],
            gpus: vec![FakeGpu::capable("fake gpu")],
            fail_at: None,
            log: Rc::new(RefCell::new(Vec::new())),
            last_instance: None,
            last_messenger: None,
            last_device: None,
            last_swapchain: None,
            next_handle: 0,
        }
    }

    pub fn with_gpus(gpus: Vec<FakeGpu>) -> Self {
        Self { gpus, ..Self::new() }
    }

    pub fn failing_at(fail_at: FailAt) -> Self {
        Self {
            fail_at: Some(fail_at),
            ..Self::new()
        }
    }

    fn fails(&self, at: FailAt) -> bool {
        self.fail_at == Some(at)
    }

    fn issue(&mut self, object: Object) -> u64 {
        self.next_handle += 1;
        let raw = 0x100 * self.next_handle;
        self.log.borrow_mut().push(Call::Create(object, raw));
        raw
    }

    fn retire(&self, object: Object, raw: u64) {
        self.log.borrow_mut().push(Call::Destroy(object, raw));
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn gpu(&self, physical: vk::PhysicalDevice) -> Option<&FakeGpu> {
        let index = physical.as_raw().checked_sub(0x1000)?;
        self.gpus.get(index as usize)
    }
}

impl Driver for MockDriver {
    fn instance_layer_names(&self) -> VkResult<Vec<CString>> {
        Ok(self.layers.clone())
    }

    fn instance_extension_names(&self) -> VkResult<Vec<CString>> {
        Ok(self.instance_extensions.clone())
    }

    fn create_instance(&mut self, request: &InstanceRequest<'_>) -> VkResult<vk::Instance> {
        self.last_instance = Some(RecordedInstance {
            app_name: request.app_name.to_owned(),
            api_version: request.api_version,
            flags: request.flags,
            extensions: request.extensions.to_vec(),
            layers: request.layers.to_vec(),
        });
        if self.fails(FailAt::Instance) {
            return Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER);
        }
        Ok(vk::Instance::from_raw(self.issue(Object::Instance)))
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.retire(Object::Instance, instance.as_raw());
    }

    fn create_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        request: &DebugMessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        self.last_messenger = Some(*request);
        if self.fails(FailAt::DebugMessenger) {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }
        Ok(vk::DebugUtilsMessengerEXT::from_raw(self.issue(Object::DebugMessenger)))
    }

    fn destroy_debug_messenger(
        &mut self,
        _instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        self.retire(Object::DebugMessenger, messenger.as_raw());
    }

    fn create_surface(
        &mut self,
        _instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        if self.fails(FailAt::Surface) {
            return Err(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR);
        }
        Ok(vk::SurfaceKHR::from_raw(self.issue(Object::Surface)))
    }

    fn destroy_surface(&mut self, _instance: vk::Instance, surface: vk::SurfaceKHR) {
        self.retire(Object::Surface, surface.as_raw());
    }

    fn enumerate_physical_devices(
        &mut self,
        _instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        if self.fails(FailAt::Enumerate) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        Ok((0..self.gpus.len()).map(physical).collect())
    }

    fn physical_device_name(&self, physical: vk::PhysicalDevice) -> String {
        self.gpu(physical).map(|g| g.name.clone()).unwrap_or_default()
    }

    fn queue_family_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(physical)
            .map(|g| {
                g.families
                    .iter()
                    .map(|&queue_flags| vk::QueueFamilyProperties {
                        queue_flags,
                        queue_count: 1,
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.record(Call::SurfaceSupport {
            physical: physical.as_raw(),
            family,
        });
        Ok(self
            .gpu(physical)
            .and_then(|g| g.present.get(family as usize).copied())
            .unwrap_or(false))
    }

    fn device_extension_names(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        self.record(Call::DeviceExtensions(physical.as_raw()));
        Ok(self.gpu(physical).map(|g| g.extensions.clone()).unwrap_or_default())
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.record(Call::Capabilities(physical.as_raw()));
        self.gpu(physical)
            .map(|g| g.capabilities)
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.record(Call::Formats(physical.as_raw()));
        Ok(self.gpu(physical).map(|g| g.formats.clone()).unwrap_or_default())
    }

    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.record(Call::PresentModes(physical.as_raw()));
        Ok(self.gpu(physical).map(|g| g.present_modes.clone()).unwrap_or_default())
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        request: &DeviceRequest<'_>,
    ) -> VkResult<vk::Device> {
        self.last_device = Some(RecordedDevice {
            physical,
            queues: request.queues.to_vec(),
            extensions: request.extensions.to_vec(),
            layers: request.layers.to_vec(),
        });
        if self.fails(FailAt::Device) {
            return Err(vk::Result::ERROR_FEATURE_NOT_PRESENT);
        }
        Ok(vk::Device::from_raw(self.issue(Object::Device)))
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.retire(Object::Device, device.as_raw());
    }

    fn device_queue(&self, _device: vk::Device, family: u32, index: u32) -> vk::Queue {
        vk::Queue::from_raw(0x5000 + ((family as u64) << 4) + index as u64)
    }

    fn create_swapchain(
        &mut self,
        _device: vk::Device,
        request: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR> {
        self.last_swapchain = Some(*request);
        if self.fails(FailAt::Swapchain) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Ok(vk::SwapchainKHR::from_raw(self.issue(Object::Swapchain)))
    }

    fn destroy_swapchain(&mut self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.retire(Object::Swapchain, swapchain.as_raw());
    }

    fn swapchain_images(
        &self,
        _device: vk::Device,
        _swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        if self.fails(FailAt::SwapchainImages) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        let requested = self.last_swapchain.map(|r| r.min_image_count).unwrap_or(0);
        let count = self
            .last_device
            .as_ref()
            .and_then(|d| self.gpu(d.physical))
            .and_then(|g| g.image_count)
            .unwrap_or(requested);
        Ok((0..count as u64).map(|i| vk::Image::from_raw(0x9000 + i)).collect())
    }
}

pub struct MockWindow {
    pub extensions: Vec<CString>,
    pub size: FramebufferSize,
    /// `should_close` turns true after this many pumps.
    pub closes_after: usize,
    pub pumps: usize,
    pub handles_unavailable: bool,
}

impl MockWindow {
    pub fn new() -> Self {
        Self {
            extensions: vec![c"VK_KHR_surface".to_owned(), c"VK_KHR_xlib_surface".to_owned()],
            size: FramebufferSize {
                width: 800,
                height: 600,
            },
            closes_after: 3,
            pumps: 0,
            handles_unavailable: false,
        }
    }
}

impl SurfaceWindow for MockWindow {
    fn required_instance_extensions(&self) -> Result<Vec<CString>, WindowError> {
        Ok(self.extensions.clone())
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), WindowError> {
        if self.handles_unavailable {
            return Err(WindowError::Closed);
        }
        Ok((
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
            RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
        ))
    }

    fn framebuffer_size(&self) -> FramebufferSize {
        self.size
    }

    fn should_close(&self) -> bool {
        self.pumps >= self.closes_after
    }

    fn pump_events(&mut self) {
        self.pumps += 1;
    }
}
