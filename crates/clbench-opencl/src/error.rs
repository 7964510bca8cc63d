//! OpenCL status checking and the benchmark error taxonomy.
//!
//! Every OpenCL call goes through [`report_error`] (raw status codes) or
//! the crate-internal `ClResultExt::checked` adapter (opencl3 results).
//! Both capture the caller's file and line, so two failures with the same
//! code are still distinguishable in logs.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

use thiserror::Error;

/// `CL_SUCCESS`.
pub const CL_SUCCESS: i32 = 0;

/// Source location of a checked OpenCL call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    /// Location of the (outermost `#[track_caller]`) caller.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = Location::caller();
        Self { file: loc.file(), line: loc.line() }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A non-success OpenCL status code and the call site that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("OpenCL error code {code} encountered at {site}")]
pub struct Status {
    pub code: i32,
    pub site: CallSite,
}

/// Check a raw OpenCL status code.
///
/// `CL_SUCCESS` is a no-op; anything else becomes a [`Status`] pointing at
/// the caller.
#[track_caller]
pub fn report_error(code: i32) -> std::result::Result<(), Status> {
    if code == CL_SUCCESS {
        return Ok(());
    }
    Err(Status { code, site: CallSite::caller() })
}

/// Errors produced by the benchmark pipeline.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("can't init OpenCL driver: {reason}")]
    DriverInit { reason: String },

    #[error("OpenCL platform/device query failed: {0}")]
    Driver(Status),

    #[error("no OpenCL device found: {reason}")]
    NoDevice { reason: String },

    #[error("context creation failed: {0}")]
    ContextCreation(Status),

    #[error("command queue creation failed: {0}")]
    QueueCreation(Status),

    #[error("device buffer allocation ({bytes} bytes) failed: {status}")]
    Allocation { bytes: usize, status: Status },

    #[error("device to host transfer failed: {0}")]
    Transfer(Status),

    #[error("host array has {actual} elements, device buffer has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("failed to read kernel source '{}'", path.display())]
    KernelSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "empty kernel source '{origin}'! Maybe you forgot to configure the working directory properly?"
    )]
    EmptySource { origin: String },

    #[error("kernel build failed: {status}{}", render_log(.log))]
    Build { status: Status, log: String },

    #[error("setting kernel argument #{index} failed: {status}")]
    ArgumentBind { index: u32, status: Status },

    #[error("kernel dispatch failed: {0}")]
    Dispatch(Status),

    #[error("CPU and GPU results differ at index {index}: expected {expected}, got {actual}")]
    ResultMismatch { index: usize, expected: f32, actual: f32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn render_log(log: &str) -> String {
    if log.len() > 1 { format!("\nBuild log:\n{log}") } else { String::new() }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Turns an opencl3 result into a [`Status`] that remembers the call site.
#[cfg(feature = "opencl")]
pub(crate) trait ClResultExt<T> {
    fn checked(self) -> std::result::Result<T, Status>;
}

#[cfg(feature = "opencl")]
impl<T> ClResultExt<T> for std::result::Result<T, opencl3::error_codes::ClError> {
    #[track_caller]
    fn checked(self) -> std::result::Result<T, Status> {
        let site = CallSite::caller();
        self.map_err(|e| Status { code: e.0, site })
    }
}
