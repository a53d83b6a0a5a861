//! OpenCL device, context and profiling queue

use crate::config::DeviceSelector;
use crate::error::{CldriveError, Result};
use ocl::core::OpenclVersion;
use ocl::{Context as OclContext, Device as OclDevice, Platform, Queue, flags};

/// A resolved OpenCL device with its context and command queue
///
/// The queue is created with profiling enabled so every enqueued command can
/// report queued/start/end timestamps.
#[derive(Clone)]
pub struct OpenClEnv {
    platform: Platform,
    device: OclDevice,
    context: OclContext,
    queue: Queue,
}

impl OpenClEnv {
    /// Whether any platform exposes at least one device
    pub fn is_available() -> bool {
        platforms().into_iter().any(|platform| {
            OclDevice::list_all(platform)
                .map(|devices| !devices.is_empty())
                .unwrap_or(false)
        })
    }

    /// Resolve `selector` across all platforms and open a context on it
    pub fn from_selector(selector: &DeviceSelector) -> Result<Self> {
        let candidates = Self::all_devices();
        if candidates.is_empty() {
            return Err(CldriveError::DeviceNotFound("no OpenCL devices found".into()));
        }

        let (platform, device) = match selector {
            DeviceSelector::Index(index) => candidates.get(*index).copied().ok_or_else(|| {
                CldriveError::DeviceNotFound(format!(
                    "device index {} out of range (available: {})",
                    index,
                    candidates.len()
                ))
            })?,
            DeviceSelector::Name(name) => candidates
                .iter()
                .copied()
                .find(|(_, d)| d.name().map(|n| n.contains(name.as_str())).unwrap_or(false))
                .ok_or_else(|| CldriveError::DeviceNotFound(format!("no device matches '{}'", name)))?,
        };

        Self::with_device(platform, device)
    }

    /// Open a context and a profiling queue on the given device
    pub fn with_device(platform: Platform, device: OclDevice) -> Result<Self> {
        let context = OclContext::builder()
            .platform(platform)
            .devices(device)
            .build()?;

        let queue = Queue::new(&context, device, Some(flags::QUEUE_PROFILING_ENABLE))?;

        log::debug!(
            "Opened OpenCL device '{}' on platform '{}'",
            device.name().unwrap_or_default(),
            platform.name().unwrap_or_default()
        );

        Ok(Self {
            platform,
            device,
            context,
            queue,
        })
    }

    fn all_devices() -> Vec<(Platform, OclDevice)> {
        platforms()
            .into_iter()
            .flat_map(|platform| {
                OclDevice::list_all(platform)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |device| (platform, device))
            })
            .collect()
    }

    /// Names of all devices, in selector index order
    pub fn list_devices() -> Vec<String> {
        Self::all_devices()
            .into_iter()
            .map(|(_, d)| d.name().unwrap_or_else(|_| "Unknown".to_string()))
            .collect()
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn device(&self) -> OclDevice {
        self.device
    }

    pub fn context(&self) -> &OclContext {
        &self.context
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// OpenCL version of the device, needed for kernel argument queries
    pub fn version(&self) -> Result<OpenclVersion> {
        Ok(self.device.version()?)
    }

    /// Largest work-group size the device accepts
    pub fn max_work_group_size(&self) -> Result<usize> {
        Ok(self.device.max_wg_size()?)
    }
}

/// Platforms reported by the ICD loader; empty when none is installed
fn platforms() -> Vec<Platform> {
    ocl::core::get_platform_ids()
        .map(|ids| ids.into_iter().map(Platform::new).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opencl_is_available() {
        let available = OpenClEnv::is_available();
        println!("OpenCL available: {}", available);
    }

    #[test]
    fn test_env_creation() {
        if !OpenClEnv::is_available() {
            println!("OpenCL not available, skipping test");
            return;
        }

        let env = OpenClEnv::from_selector(&DeviceSelector::Index(0));
        assert!(env.is_ok(), "Failed to create env: {:?}", env.err());
        println!("Device name: {}", env.unwrap().device_name());
    }

    #[test]
    fn test_unresolvable_selector() {
        let result = OpenClEnv::from_selector(&DeviceSelector::Index(usize::MAX));
        assert!(matches!(result, Err(CldriveError::DeviceNotFound(_))));

        let result = OpenClEnv::from_selector(&DeviceSelector::Name(
            "no device is called this".to_string(),
        ));
        assert!(matches!(result, Err(CldriveError::DeviceNotFound(_))));
    }
}
