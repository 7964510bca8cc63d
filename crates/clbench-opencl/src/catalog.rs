//! Platform/device enumeration and the device selection policy.
//!
//! Enumeration needs the `opencl` feature; the selection policy works on
//! plain [`PlatformInfo`] values so it can be exercised without hardware.
//!
//! Policy: walk platforms in enumeration order and, within each, devices
//! in enumeration order. The first GPU-class device wins and stops the
//! walk. If no GPU is found the *last* device visited is used, whatever
//! its class.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// `CL_DEVICE_TYPE_CPU`.
pub const DEVICE_TYPE_CPU: u64 = 1 << 1;
/// `CL_DEVICE_TYPE_GPU`.
pub const DEVICE_TYPE_GPU: u64 = 1 << 2;

/// Coarse device classification used by the selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Cpu,
    Gpu,
    #[default]
    Other,
}

impl DeviceClass {
    /// Classify a raw `cl_device_type` bitfield.
    ///
    /// Drivers may OR `CL_DEVICE_TYPE_DEFAULT` into the reported type, so
    /// this tests bits rather than comparing for equality.
    pub fn from_type_bits(bits: u64) -> Self {
        if bits & DEVICE_TYPE_GPU != 0 {
            Self::Gpu
        } else if bits & DEVICE_TYPE_CPU != 0 {
            Self::Cpu
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Gpu => write!(f, "GPU"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Opaque device handle (`cl_device_id` stored as an address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(usize);

impl From<usize> for DeviceId {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

#[cfg(feature = "opencl")]
impl DeviceId {
    pub(crate) fn from_cl(id: opencl3::types::cl_device_id) -> Self {
        Self(id as usize)
    }

    pub(crate) fn as_cl(self) -> opencl3::types::cl_device_id {
        self.0 as opencl3::types::cl_device_id
    }
}

/// One device and the metadata read from it during enumeration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceInfo {
    #[serde(skip)]
    pub id: DeviceId,
    /// Index of the owning platform in enumeration order.
    pub platform_index: usize,
    /// Index within the owning platform.
    pub index: usize,
    pub name: String,
    pub class: DeviceClass,
    pub vendor: String,
    pub version: String,
    pub compute_units: u32,
    pub global_mem_bytes: u64,
    pub max_work_group_size: usize,
}

impl DeviceInfo {
    /// Minimal description, mostly useful for tests and synthetic catalogs.
    pub fn new(name: impl Into<String>, class: DeviceClass) -> Self {
        Self { name: name.into(), class, ..Default::default() }
    }

    pub fn ordinal(&self) -> DeviceOrdinal {
        DeviceOrdinal { platform: self.platform_index, device: self.index }
    }
}

/// A platform and its devices in enumeration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformInfo {
    pub index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub devices: Vec<DeviceInfo>,
}

impl PlatformInfo {
    /// Build a platform from devices, fixing up their indices.
    pub fn with_devices(index: usize, name: impl Into<String>, devices: Vec<DeviceInfo>) -> Self {
        let devices = devices
            .into_iter()
            .enumerate()
            .map(|(i, d)| DeviceInfo { platform_index: index, index: i, ..d })
            .collect();
        Self { index, name: name.into(), devices, ..Default::default() }
    }
}

/// Total number of devices across all platforms.
pub fn device_count(platforms: &[PlatformInfo]) -> usize {
    platforms.iter().map(|p| p.devices.len()).sum()
}

/// Scratch state of the selection walk.
#[derive(Debug, Clone, Copy, Default)]
pub enum SelectionState<'a> {
    #[default]
    Unset,
    /// Latest non-GPU device seen; replaced by every later device.
    Fallback(&'a DeviceInfo),
    /// Final: nothing overrides a GPU choice.
    Gpu(&'a DeviceInfo),
}

impl<'a> SelectionState<'a> {
    /// Offer `device` to the policy. Returns `true` once the choice is final.
    pub fn visit(&mut self, device: &'a DeviceInfo) -> bool {
        if let Self::Gpu(_) = self {
            return true;
        }
        *self = match device.class {
            DeviceClass::Gpu => Self::Gpu(device),
            _ => Self::Fallback(device),
        };
        matches!(self, Self::Gpu(_))
    }

    pub fn chosen(&self) -> Option<&'a DeviceInfo> {
        match *self {
            Self::Unset => None,
            Self::Fallback(d) | Self::Gpu(d) => Some(d),
        }
    }
}

/// Apply the selection policy to an enumerated catalog.
pub fn select_device(platforms: &[PlatformInfo]) -> Result<&DeviceInfo> {
    let mut state = SelectionState::Unset;
    'platforms: for platform in platforms {
        for device in &platform.devices {
            if state.visit(device) {
                break 'platforms;
            }
        }
    }
    state.chosen().ok_or_else(|| BenchError::NoDevice {
        reason: format!("{} platform(s) expose no devices", platforms.len()),
    })
}

/// Explicit `platform:device` choice (both 0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceOrdinal {
    pub platform: usize,
    pub device: usize,
}

impl FromStr for DeviceOrdinal {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            BenchError::Config(format!("invalid device ordinal '{s}', expected PLATFORM:DEVICE"))
        };
        let (platform, device) = s.trim().split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            platform: platform.trim().parse().map_err(|_| invalid())?,
            device: device.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for DeviceOrdinal {
    type Error = BenchError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeviceOrdinal> for String {
    fn from(o: DeviceOrdinal) -> Self {
        o.to_string()
    }
}

impl fmt::Display for DeviceOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.device)
    }
}

/// Look up one device by ordinal.
pub fn select_by_ordinal(platforms: &[PlatformInfo], ordinal: DeviceOrdinal) -> Result<&DeviceInfo> {
    platforms
        .get(ordinal.platform)
        .and_then(|p| p.devices.get(ordinal.device))
        .ok_or_else(|| BenchError::NoDevice {
            reason: format!("no device at {ordinal} ({} devices enumerated)", device_count(platforms)),
        })
}

/// Use `ordinal` when given, the selection policy otherwise.
pub fn resolve(platforms: &[PlatformInfo], ordinal: Option<DeviceOrdinal>) -> Result<&DeviceInfo> {
    match ordinal {
        Some(ordinal) => select_by_ordinal(platforms, ordinal),
        None => select_device(platforms),
    }
}

#[cfg(feature = "opencl")]
pub use self::cl::{enumerate_devices, enumerate_platforms};

#[cfg(feature = "opencl")]
mod cl {
    use opencl3::device::{CL_DEVICE_TYPE_ALL, Device};
    use opencl3::error_codes::ClError;
    use opencl3::platform::{Platform, get_platforms};
    use tracing::{debug, info};

    use super::{DeviceClass, DeviceId, DeviceInfo, PlatformInfo};
    use crate::error::{BenchError, ClResultExt, Result};

    /// `CL_DEVICE_NOT_FOUND`: a platform with no devices of the requested type.
    const CL_DEVICE_NOT_FOUND: i32 = -1;

    /// Enumerate every platform together with its devices.
    pub fn enumerate_platforms() -> Result<Vec<PlatformInfo>> {
        let platforms = match get_platforms() {
            Ok(platforms) => platforms,
            Err(ClError(code)) => {
                crate::driver::check_platform_query(code)?;
                Vec::new()
            }
        };
        info!(count = platforms.len(), "enumerated OpenCL platforms");

        let mut out = Vec::with_capacity(platforms.len());
        for (index, platform) in platforms.iter().enumerate() {
            let name = platform.name().checked().map_err(BenchError::Driver)?;
            let vendor = platform.vendor().checked().map_err(BenchError::Driver)?;
            let version = platform.version().checked().map_err(BenchError::Driver)?;
            let devices = enumerate_devices(index, platform)?;
            debug!(platform = index, %name, devices = devices.len(), "scanned OpenCL platform");
            out.push(PlatformInfo { index, name, vendor, version, devices });
        }
        Ok(out)
    }

    /// Enumerate all devices of one platform. A platform without devices
    /// yields an empty list.
    pub fn enumerate_devices(platform_index: usize, platform: &Platform) -> Result<Vec<DeviceInfo>> {
        let ids = match platform.get_devices(CL_DEVICE_TYPE_ALL) {
            Err(ClError(CL_DEVICE_NOT_FOUND)) => Vec::new(),
            other => other.checked().map_err(BenchError::Driver)?,
        };

        let mut devices = Vec::with_capacity(ids.len());
        for (index, id) in ids.into_iter().enumerate() {
            let device = Device::new(id);
            let info = DeviceInfo {
                id: DeviceId::from_cl(id),
                platform_index,
                index,
                name: device.name().checked().map_err(BenchError::Driver)?,
                class: DeviceClass::from_type_bits(
                    device.dev_type().checked().map_err(BenchError::Driver)?,
                ),
                vendor: device.vendor().checked().map_err(BenchError::Driver)?,
                version: device.version().checked().map_err(BenchError::Driver)?,
                compute_units: device.max_compute_units().checked().map_err(BenchError::Driver)?,
                global_mem_bytes: device.global_mem_size().checked().map_err(BenchError::Driver)?,
                max_work_group_size: device
                    .max_work_group_size()
                    .checked()
                    .map_err(BenchError::Driver)?,
            };
            debug!(
                platform = platform_index,
                device = index,
                name = %info.name,
                class = %info.class,
                "found OpenCL device"
            );
            devices.push(info);
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(layout: &[&[(&str, DeviceClass)]]) -> Vec<PlatformInfo> {
        layout
            .iter()
            .enumerate()
            .map(|(p, devices)| {
                PlatformInfo::with_devices(
                    p,
                    format!("platform-{p}"),
                    devices.iter().map(|(name, class)| DeviceInfo::new(*name, *class)).collect(),
                )
            })
            .collect()
    }

    use DeviceClass::{Cpu, Gpu, Other};

    #[test]
    fn gpu_between_cpus_is_selected() {
        let platforms = catalog(&[&[("CPU0", Cpu), ("GPU0", Gpu), ("CPU1", Cpu)]]);
        assert_eq!(select_device(&platforms).unwrap().name, "GPU0");
    }

    #[test]
    fn without_gpu_the_last_device_wins() {
        let platforms = catalog(&[&[("CPU0", Cpu), ("CPU1", Cpu)]]);
        assert_eq!(select_device(&platforms).unwrap().name, "CPU1");
    }

    #[test]
    fn fallback_ignores_class_of_last_device() {
        let platforms = catalog(&[&[("CPU0", Cpu)], &[("ACC0", Other)]]);
        assert_eq!(select_device(&platforms).unwrap().name, "ACC0");
    }

    #[test]
    fn first_gpu_across_platforms_short_circuits() {
        let platforms = catalog(&[
            &[("CPU0", Cpu)],
            &[("GPU-A", Gpu), ("GPU-B", Gpu)],
            &[("GPU-C", Gpu)],
        ]);
        let chosen = select_device(&platforms).unwrap();
        assert_eq!(chosen.name, "GPU-A");
        assert_eq!(chosen.ordinal(), DeviceOrdinal { platform: 1, device: 0 });
    }

    #[test]
    fn empty_platforms_are_skipped() {
        let platforms = catalog(&[&[], &[("CPU0", Cpu)], &[]]);
        assert_eq!(select_device(&platforms).unwrap().name, "CPU0");
    }

    #[test]
    fn no_devices_is_an_error() {
        let platforms = catalog(&[&[], &[]]);
        let err = select_device(&platforms).unwrap_err();
        assert!(matches!(err, BenchError::NoDevice { .. }));
        assert!(matches!(select_device(&[]), Err(BenchError::NoDevice { .. })));
    }

    #[test]
    fn gpu_state_is_final() {
        let gpu = DeviceInfo::new("GPU0", Gpu);
        let cpu = DeviceInfo::new("CPU0", Cpu);
        let mut state = SelectionState::Unset;
        assert!(state.chosen().is_none());
        assert!(state.visit(&gpu));
        assert!(state.visit(&cpu));
        assert_eq!(state.chosen().unwrap().name, "GPU0");
    }

    #[test]
    fn class_from_type_bits() {
        assert_eq!(DeviceClass::from_type_bits(DEVICE_TYPE_GPU), Gpu);
        assert_eq!(DeviceClass::from_type_bits(DEVICE_TYPE_GPU | 1), Gpu);
        assert_eq!(DeviceClass::from_type_bits(DEVICE_TYPE_CPU), Cpu);
        assert_eq!(DeviceClass::from_type_bits(1 << 3), Other);
    }

    #[test]
    fn ordinal_parse_and_display() {
        let o: DeviceOrdinal = "1:2".parse().unwrap();
        assert_eq!(o, DeviceOrdinal { platform: 1, device: 2 });
        assert_eq!(o.to_string(), "1:2");
        assert_eq!(" 0 : 3 ".parse::<DeviceOrdinal>().unwrap().device, 3);
        assert!("1".parse::<DeviceOrdinal>().is_err());
        assert!("a:b".parse::<DeviceOrdinal>().is_err());
        assert!("-1:0".parse::<DeviceOrdinal>().is_err());
    }

    #[test]
    fn ordinal_overrides_policy() {
        let platforms = catalog(&[&[("CPU0", Cpu), ("GPU0", Gpu)]]);
        let o = DeviceOrdinal { platform: 0, device: 0 };
        assert_eq!(resolve(&platforms, Some(o)).unwrap().name, "CPU0");
        assert_eq!(resolve(&platforms, None).unwrap().name, "GPU0");
    }

    #[test]
    fn out_of_range_ordinal_is_no_device() {
        let platforms = catalog(&[&[("CPU0", Cpu)]]);
        let err = select_by_ordinal(&platforms, DeviceOrdinal { platform: 0, device: 4 });
        assert!(matches!(err, Err(BenchError::NoDevice { .. })));
    }

    #[test]
    fn device_count_sums_platforms() {
        let platforms = catalog(&[&[("a", Cpu), ("b", Gpu)], &[], &[("c", Cpu)]]);
        assert_eq!(device_count(&platforms), 3);
    }
}
