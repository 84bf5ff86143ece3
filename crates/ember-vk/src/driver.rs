// SPDX-License-Identifier: CEPL-1.0
//! The seam between the bootstrap and the Vulkan driver.
//!
//! Every driver entry point the bootstrap touches goes through [`Driver`].
//! Requests are plain values; [`AshDriver`] lowers them into `vk::*CreateInfo`
//! structs, everything else (tests) can simply record them.
use std::ffi::{c_char, CStr, CString};

use ash::prelude::VkResult;
use ash::{ext, khr, vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, warn};

use crate::debug;
use crate::error::{BootstrapError, Result};

#[derive(Clone, Copy, Debug)]
pub struct InstanceRequest<'a> {
    pub app_name: &'a CStr,
    pub app_version: u32,
    pub engine_name: &'a CStr,
    pub engine_version: u32,
    pub api_version: u32,
    pub flags: vk::InstanceCreateFlags,
    pub extensions: &'a [CString],
    pub layers: &'a [CString],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebugMessengerRequest {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub types: vk::DebugUtilsMessageTypeFlagsEXT,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueueRequest {
    pub family: u32,
    pub priorities: Vec<f32>,
}

#[derive(Clone, Copy, Debug)]
pub struct DeviceRequest<'a> {
    pub queues: &'a [QueueRequest],
    pub extensions: &'a [CString],
    /// Device-level layers are ignored by current loaders; older ones still
    /// expect them to match the instance layers.
    pub layers: &'a [CString],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    Concurrent([u32; 2]),
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainRequest {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing: SharingMode,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
    pub old_swapchain: vk::SwapchainKHR,
}

/// Synchronous driver service. Creation calls return the new handle or the
/// driver's status; destroy calls cannot fail.
pub trait Driver {
    fn instance_layer_names(&self) -> VkResult<Vec<CString>>;
    fn instance_extension_names(&self) -> VkResult<Vec<CString>>;
    fn create_instance(&mut self, request: &InstanceRequest<'_>) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);

    fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
        request: &DebugMessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT>;
    fn destroy_debug_messenger(
        &mut self,
        instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    );

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(
        &mut self,
        instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_name(&self, physical: vk::PhysicalDevice) -> String;
    fn queue_family_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties>;
    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn device_extension_names(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<CString>>;

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        request: &DeviceRequest<'_>,
    ) -> VkResult<vk::Device>;
    fn destroy_device(&mut self, device: vk::Device);
    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        request: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);
    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>>;
}

struct InstanceFns {
    instance: ash::Instance,
    surface: khr::surface::Instance,
    debug_utils: Option<ext::debug_utils::Instance>,
    physical_devices: Vec<vk::PhysicalDevice>,
    surfaces: Vec<vk::SurfaceKHR>,
}

impl InstanceFns {
    fn knows(&self, physical: vk::PhysicalDevice) -> bool {
        self.physical_devices.contains(&physical)
    }
}

struct DeviceFns {
    device: ash::Device,
    swapchain: khr::swapchain::Device,
    swapchains: Vec<vk::SwapchainKHR>,
}

// Handles are only accepted if this driver created (or enumerated) them.
const FOREIGN_HANDLE: vk::Result = vk::Result::ERROR_INITIALIZATION_FAILED;

/// [`Driver`] over the system Vulkan loader.
///
/// Holds at most one instance and one device at a time, which is all the
/// bootstrap ever creates.
pub struct AshDriver {
    entry: Entry,
    instance: Option<InstanceFns>,
    device: Option<DeviceFns>,
}

impl AshDriver {
    /// Load the Vulkan loader library at runtime.
    pub fn load() -> Result<Self> {
        // SAFETY: loading libvulkan runs its initialisers; nothing else in this
        // process is expected to unload it behind our back.
        let entry = unsafe { Entry::load() }.map_err(|e| BootstrapError::Loader(e.to_string()))?;
        Ok(Self {
            entry,
            instance: None,
            device: None,
        })
    }

    fn instance(&self, handle: vk::Instance) -> VkResult<&InstanceFns> {
        match &self.instance {
            Some(fns) if fns.instance.handle() == handle => Ok(fns),
            _ => Err(FOREIGN_HANDLE),
        }
    }

    fn instance_for(&self, physical: vk::PhysicalDevice) -> VkResult<&InstanceFns> {
        match &self.instance {
            Some(fns) if fns.knows(physical) => Ok(fns),
            _ => Err(FOREIGN_HANDLE),
        }
    }

    fn device(&self, handle: vk::Device) -> VkResult<&DeviceFns> {
        match &self.device {
            Some(fns) if fns.device.handle() == handle => Ok(fns),
            _ => Err(FOREIGN_HANDLE),
        }
    }
}

fn c_strings<'a, I>(names: I) -> Vec<CString>
where
    I: IntoIterator<Item = std::result::Result<&'a CStr, std::ffi::FromBytesUntilNulError>>,
{
    names.into_iter().filter_map(|n| n.ok()).map(CStr::to_owned).collect()
}

fn pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|n| n.as_ptr()).collect()
}

impl Driver for AshDriver {
    fn instance_layer_names(&self) -> VkResult<Vec<CString>> {
        // SAFETY: plain global query.
        let props = unsafe { self.entry.enumerate_instance_layer_properties() }?;
        Ok(c_strings(props.iter().map(|p| p.layer_name_as_c_str())))
    }

    fn instance_extension_names(&self) -> VkResult<Vec<CString>> {
        // SAFETY: plain global query.
        let props = unsafe { self.entry.enumerate_instance_extension_properties(None) }?;
        Ok(c_strings(props.iter().map(|p| p.extension_name_as_c_str())))
    }

    fn create_instance(&mut self, request: &InstanceRequest<'_>) -> VkResult<vk::Instance> {
        if self.instance.is_some() {
            return Err(FOREIGN_HANDLE);
        }

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: request.app_name.as_ptr(),
            application_version: request.app_version,
            p_engine_name: request.engine_name.as_ptr(),
            engine_version: request.engine_version,
            api_version: request.api_version,
            ..Default::default()
        };

        let ext_ptrs = pointers(request.extensions);
        let layer_ptrs = pointers(request.layers);

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            flags: request.flags,
            p_application_info: &app_info,
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };

        // SAFETY: every pointer in create_info borrows from locals or from
        // `request`, all of which outlive this call.
        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;
        let surface = khr::surface::Instance::new(&self.entry, &instance);
        let handle = instance.handle();

        self.instance = Some(InstanceFns {
            instance,
            surface,
            debug_utils: None,
            physical_devices: Vec::new(),
            surfaces: Vec::new(),
        });
        Ok(handle)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        match self.instance.take() {
            Some(fns) if fns.instance.handle() == instance => {
                debug!("destroy_instance {instance:?}");
                // SAFETY: the sequencer destroys every child object first; this
                // is the last use of the instance.
                unsafe { fns.instance.destroy_instance(None) };
            }
            other => {
                self.instance = other;
                warn!("destroy_instance: {instance:?} is not ours");
            }
        }
    }

    fn create_debug_messenger(
        &mut self,
        instance: vk::Instance,
        request: &DebugMessengerRequest,
    ) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let entry = &self.entry;
        let fns = match &mut self.instance {
            Some(fns) if fns.instance.handle() == instance => fns,
            _ => return Err(FOREIGN_HANDLE),
        };
        let loader = fns
            .debug_utils
            .get_or_insert_with(|| ext::debug_utils::Instance::new(entry, &fns.instance));

        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: request.severity,
            message_type: request.types,
            pfn_user_callback: Some(debug::forward_to_tracing),
            ..Default::default()
        };
        // SAFETY: the instance was created by us with VK_EXT_debug_utils enabled
        // whenever diagnostics are requested.
        unsafe { loader.create_debug_utils_messenger(&ci, None) }
    }

    fn destroy_debug_messenger(
        &mut self,
        instance: vk::Instance,
        messenger: vk::DebugUtilsMessengerEXT,
    ) {
        let Ok(fns) = self.instance(instance) else {
            warn!("destroy_debug_messenger: {instance:?} is not ours");
            return;
        };
        if let Some(loader) = &fns.debug_utils {
            // SAFETY: messenger was created from this loader and is destroyed once.
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let entry = &self.entry;
        let fns = match &mut self.instance {
            Some(fns) if fns.instance.handle() == instance => fns,
            _ => return Err(FOREIGN_HANDLE),
        };
        // SAFETY: the raw handles come from a live window whose owner keeps it
        // alive until after the surface is destroyed.
        let surface =
            unsafe { ash_window::create_surface(entry, &fns.instance, display, window, None) }?;
        fns.surfaces.push(surface);
        Ok(surface)
    }

    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR) {
        let fns = match &mut self.instance {
            Some(fns) if fns.instance.handle() == instance => fns,
            _ => {
                warn!("destroy_surface: {instance:?} is not ours");
                return;
            }
        };
        let Some(pos) = fns.surfaces.iter().position(|&s| s == surface) else {
            warn!("destroy_surface: {surface:?} is not ours");
            return;
        };
        fns.surfaces.swap_remove(pos);
        // SAFETY: surface belongs to this instance and no swapchain uses it anymore.
        unsafe { fns.surface.destroy_surface(surface, None) };
    }

    fn enumerate_physical_devices(
        &mut self,
        instance: vk::Instance,
    ) -> VkResult<Vec<vk::PhysicalDevice>> {
        let fns = match &mut self.instance {
            Some(fns) if fns.instance.handle() == instance => fns,
            _ => return Err(FOREIGN_HANDLE),
        };
        // SAFETY: valid instance.
        let devices = unsafe { fns.instance.enumerate_physical_devices() }?;
        fns.physical_devices = devices.clone();
        Ok(devices)
    }

    fn physical_device_name(&self, physical: vk::PhysicalDevice) -> String {
        let Ok(fns) = self.instance_for(physical) else {
            return String::from("<unknown>");
        };
        // SAFETY: physical was enumerated from this instance.
        let props = unsafe { fns.instance.get_physical_device_properties(physical) };
        props
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn queue_family_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        match self.instance_for(physical) {
            // SAFETY: physical was enumerated from this instance.
            Ok(fns) => unsafe {
                fns.instance.get_physical_device_queue_family_properties(physical)
            },
            Err(_) => Vec::new(),
        }
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let fns = self.instance_for(physical)?;
        if !fns.surfaces.contains(&surface) {
            return Err(FOREIGN_HANDLE);
        }
        // SAFETY: physical and surface both derive from this instance.
        unsafe { fns.surface.get_physical_device_surface_support(physical, family, surface) }
    }

    fn device_extension_names(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<CString>> {
        let fns = self.instance_for(physical)?;
        // SAFETY: physical was enumerated from this instance.
        let props = unsafe { fns.instance.enumerate_device_extension_properties(physical) }?;
        Ok(c_strings(props.iter().map(|p| p.extension_name_as_c_str())))
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let fns = self.instance_for(physical)?;
        // SAFETY: physical and surface both derive from this instance.
        unsafe { fns.surface.get_physical_device_surface_capabilities(physical, surface) }
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let fns = self.instance_for(physical)?;
        // SAFETY: physical and surface both derive from this instance.
        unsafe { fns.surface.get_physical_device_surface_formats(physical, surface) }
    }

    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let fns = self.instance_for(physical)?;
        // SAFETY: physical and surface both derive from this instance.
        unsafe { fns.surface.get_physical_device_surface_present_modes(physical, surface) }
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        request: &DeviceRequest<'_>,
    ) -> VkResult<vk::Device> {
        if self.device.is_some() {
            return Err(FOREIGN_HANDLE);
        }
        let fns = self.instance_for(physical)?;

        let qinfos: Vec<vk::DeviceQueueCreateInfo> = request
            .queues
            .iter()
            .map(|q| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: q.family,
                queue_count: q.priorities.len() as u32,
                p_queue_priorities: q.priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let ext_ptrs = pointers(request.extensions);
        let layer_ptrs = pointers(request.layers);

        #[allow(deprecated)]
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: qinfos.len() as u32,
            p_queue_create_infos: qinfos.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };

        // SAFETY: physical was enumerated from this instance; all pointers in
        // dinfo borrow locals or `request`.
        let device = unsafe { fns.instance.create_device(physical, &dinfo, None) }?;
        let swapchain = khr::swapchain::Device::new(&fns.instance, &device);
        let handle = device.handle();

        self.device = Some(DeviceFns {
            device,
            swapchain,
            swapchains: Vec::new(),
        });
        Ok(handle)
    }

    fn destroy_device(&mut self, device: vk::Device) {
        match self.device.take() {
            Some(fns) if fns.device.handle() == device => {
                debug!("destroy_device {device:?}");
                // SAFETY: swapchains are gone and nothing was ever submitted.
                unsafe {
                    fns.device.device_wait_idle().ok();
                    fns.device.destroy_device(None);
                }
            }
            other => {
                self.device = other;
                warn!("destroy_device: {device:?} is not ours");
            }
        }
    }

    fn device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue {
        match self.device(device) {
            // SAFETY: the family/index pair was part of the device's queue requests.
            Ok(fns) => unsafe { fns.device.get_device_queue(family, index) },
            Err(_) => vk::Queue::null(),
        }
    }

    fn create_swapchain(
        &mut self,
        device: vk::Device,
        request: &SwapchainRequest,
    ) -> VkResult<vk::SwapchainKHR> {
        let fns = match &mut self.device {
            Some(fns) if fns.device.handle() == device => fns,
            _ => return Err(FOREIGN_HANDLE),
        };

        let (image_sharing_mode, families): (vk::SharingMode, &[u32]) = match &request.sharing {
            SharingMode::Exclusive => (vk::SharingMode::EXCLUSIVE, &[][..]),
            SharingMode::Concurrent(pair) => (vk::SharingMode::CONCURRENT, pair.as_slice()),
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: request.surface,
            min_image_count: request.min_image_count,
            image_format: request.format.format,
            image_color_space: request.format.color_space,
            image_extent: request.extent,
            image_array_layers: request.array_layers,
            image_usage: request.usage,
            image_sharing_mode,
            queue_family_index_count: families.len() as u32,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: request.pre_transform,
            composite_alpha: request.composite_alpha,
            present_mode: request.present_mode,
            clipped: if request.clipped { vk::TRUE } else { vk::FALSE },
            old_swapchain: request.old_swapchain,
            ..Default::default()
        };

        // SAFETY: surface and device share the instance; the family slice
        // outlives the call.
        let swapchain = unsafe { fns.swapchain.create_swapchain(&swap_info, None) }?;
        fns.swapchains.push(swapchain);
        Ok(swapchain)
    }

    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        let fns = match &mut self.device {
            Some(fns) if fns.device.handle() == device => fns,
            _ => {
                warn!("destroy_swapchain: {device:?} is not ours");
                return;
            }
        };
        let Some(pos) = fns.swapchains.iter().position(|&s| s == swapchain) else {
            warn!("destroy_swapchain: {swapchain:?} is not ours");
            return;
        };
        fns.swapchains.swap_remove(pos);
        // SAFETY: no frame was ever acquired, so no image is in use.
        unsafe { fns.swapchain.destroy_swapchain(swapchain, None) };
    }

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> VkResult<Vec<vk::Image>> {
        let fns = self.device(device)?;
        if !fns.swapchains.contains(&swapchain) {
            return Err(FOREIGN_HANDLE);
        }
        // SAFETY: swapchain was created from this device.
        unsafe { fns.swapchain.get_swapchain_images(swapchain) }
    }
}
