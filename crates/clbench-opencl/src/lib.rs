//! `clbench-opencl`: OpenCL device selection and a benchmarked `a + b` kernel.
//!
//! The crate picks one OpenCL device, uploads two `f32` arrays, compiles the
//! `aplusb` kernel, times repeated dispatches and readbacks, and checks the
//! result against the CPU.
//!
//! | Module        | Role                                              |
//! |---------------|---------------------------------------------------|
//! | [`error`]     | status checks with call sites, error taxonomy     |
//! | [`timer`]     | lap timing, mean and standard deviation           |
//! | [`catalog`]   | platform/device enumeration, selection policy     |
//! | `context`     | context + command queue (`opencl` feature)        |
//! | [`buffers`]   | device buffers for the inputs and the output      |
//! | [`kernel`]    | source loading, compile, bind, dispatch           |
//! | [`benchmark`] | timed loops, throughput and bandwidth, validation |
//! | [`pipeline`]  | the whole run with progress callbacks             |
//!
//! Everything touching the driver is compiled only with the `opencl`
//! feature. Without it [`driver::init`] reports no driver and a run fails
//! with [`BenchError::DriverInit`].
//!
//! ```rust
//! use clbench_opencl::kernel::global_work_size;
//!
//! assert_eq!(global_work_size(100_000_001, 128).unwrap(), 100_000_128);
//! ```

pub mod benchmark;
pub mod buffers;
pub mod catalog;
pub mod config;
#[cfg(feature = "opencl")]
pub mod context;
pub mod data;
pub mod driver;
pub mod error;
pub mod kernel;
pub mod pipeline;
pub mod timer;

/// Elements per array in a default run.
pub const DEFAULT_ELEMENTS: usize = 100_000_000;
/// Work-items per work-group in a default run.
pub const DEFAULT_WORK_GROUP_SIZE: usize = 128;
/// Timed repetitions of each phase in a default run.
pub const DEFAULT_TRIALS: usize = 20;

pub use benchmark::{Benchmark, BenchmarkReport, ComputeReport, TransferReport, Workload, validate};
pub use catalog::{DeviceClass, DeviceInfo, DeviceOrdinal, PlatformInfo, SelectionState, select_device};
pub use config::{BenchConfig, ConfigBuilder, LogFormat, load_config};
#[cfg(feature = "opencl")]
pub use context::ComputeContext;
pub use error::{BenchError, CallSite, Result, Status, report_error};
pub use kernel::{APLUSB_SRC, KERNEL_ENTRY_POINT, SourceText};
pub use pipeline::{NoopObserver, RunObserver, RunReport, run};
pub use timer::{LapStats, Timer};
