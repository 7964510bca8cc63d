//! Compute driver bootstrap.
//!
//! The ICD loader is linked at build time, so reaching this code already
//! means it was found. What can still fail is the loader finding no
//! installed platform driver, which `clGetPlatformIDs` reports as
//! `CL_PLATFORM_NOT_FOUND_KHR`. Builds without the `opencl` feature never
//! initialise.

use tracing::info;

use crate::error::{BenchError, Result, report_error};

/// `CL_PLATFORM_NOT_FOUND_KHR`: the ICD loader has no platform to offer.
pub const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

/// Classify the status of the bootstrap platform query.
///
/// No installed platform is a [`BenchError::DriverInit`]; any other failure
/// is a [`BenchError::Driver`] query error.
#[track_caller]
pub fn check_platform_query(code: i32) -> Result<()> {
    report_error(code).map_err(|status| {
        if status.code == CL_PLATFORM_NOT_FOUND_KHR {
            BenchError::DriverInit { reason: format!("no OpenCL platform installed ({status})") }
        } else {
            BenchError::Driver(status)
        }
    })
}

/// Query the platform list once to make sure a driver answers.
#[cfg(feature = "opencl")]
pub fn ensure_initialised() -> Result<()> {
    let code = match opencl3::platform::get_platforms() {
        Ok(platforms) => {
            info!(platforms = platforms.len(), "OpenCL driver initialised");
            crate::error::CL_SUCCESS
        }
        Err(e) => e.0,
    };
    check_platform_query(code).inspect_err(|e| tracing::warn!(error = %e, "OpenCL bootstrap failed"))
}

/// Always fails: built without OpenCL support.
#[cfg(not(feature = "opencl"))]
pub fn ensure_initialised() -> Result<()> {
    info!("built without the `opencl` feature");
    Err(BenchError::DriverInit { reason: "built without the `opencl` feature".to_string() })
}

/// `true` if [`ensure_initialised`] succeeds.
pub fn init() -> bool {
    ensure_initialised().is_ok()
}
