//! End-to-end run: discover, select, upload, compile, time, validate.
//!
//! Resources are locals of [`run`] and are released in reverse order of
//! creation: kernel and program, buffers, queue, context.

use serde::Serialize;
use tracing::info;

use crate::benchmark::{ComputeReport, TransferReport};
use crate::catalog::{DeviceInfo, PlatformInfo};
use crate::config::{BenchConfig, KernelConfig};
use crate::driver;
use crate::error::{BenchError, Result};
use crate::kernel::SourceText;

/// Progress callbacks for presenting a run as it happens.
///
/// Every method defaults to doing nothing.
pub trait RunObserver {
    fn on_platforms(&mut self, _platforms: &[PlatformInfo]) {}
    fn on_device_selected(&mut self, _device: &DeviceInfo) {}
    fn on_data_generated(&mut self, _elements: usize) {}
    /// Called only when the log has more than one character.
    fn on_build_log(&mut self, _log: &str) {}
    fn on_compute(&mut self, _report: &ComputeReport) {}
    fn on_transfer(&mut self, _report: &TransferReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Outcome of a validated run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub device: DeviceInfo,
    pub elements: usize,
    pub work_group_size: usize,
    pub global_work_size: usize,
    pub trials: usize,
    pub warmup: usize,
    pub seed: u64,
    pub compute: ComputeReport,
    pub transfer: TransferReport,
}

/// Kernel source as configured: embedded or read from disk.
pub fn kernel_source(config: &KernelConfig) -> Result<SourceText> {
    if config.use_embedded {
        return Ok(SourceText::embedded());
    }
    SourceText::from_file(&config.source_path)
}

/// Reject work-groups the device cannot run. A device reporting no limit
/// (zero) accepts anything.
pub fn check_work_group(device: &DeviceInfo, group: usize) -> Result<()> {
    let max = device.max_work_group_size;
    if max > 0 && group > max {
        return Err(BenchError::Config(format!(
            "work-group size {group} exceeds the maximum {max} of device '{}'",
            device.name
        )));
    }
    Ok(())
}

/// Bootstrap the driver and enumerate every platform and device.
pub fn discover(observer: &mut dyn RunObserver) -> Result<Vec<PlatformInfo>> {
    driver::ensure_initialised()?;
    discover_initialised(observer)
}

#[cfg(feature = "opencl")]
fn discover_initialised(observer: &mut dyn RunObserver) -> Result<Vec<PlatformInfo>> {
    let platforms = crate::catalog::enumerate_platforms()?;
    observer.on_platforms(&platforms);
    Ok(platforms)
}

#[cfg(not(feature = "opencl"))]
fn discover_initialised(_observer: &mut dyn RunObserver) -> Result<Vec<PlatformInfo>> {
    Err(BenchError::DriverInit { reason: "built without the `opencl` feature".into() })
}

/// Run the whole benchmark described by `config`.
///
/// `config` is expected to have passed [`ConfigBuilder::validate`](crate::config::ConfigBuilder::validate).
pub fn run(config: &BenchConfig, observer: &mut dyn RunObserver) -> Result<RunReport> {
    let platforms = discover(observer)?;
    let device = crate::catalog::resolve(&platforms, config.device.ordinal)?;
    info!(device = %device.name, class = %device.class, ordinal = %device.ordinal(), "selected device");
    observer.on_device_selected(device);
    check_work_group(device, config.workload.work_group_size)?;
    run_on(device, config, observer)
}

#[cfg(not(feature = "opencl"))]
fn run_on(_device: &DeviceInfo, _config: &BenchConfig, _observer: &mut dyn RunObserver) -> Result<RunReport> {
    Err(BenchError::DriverInit { reason: "built without the `opencl` feature".into() })
}

#[cfg(feature = "opencl")]
fn run_on(device: &DeviceInfo, config: &BenchConfig, observer: &mut dyn RunObserver) -> Result<RunReport> {
    use crate::benchmark::{Benchmark, validate};
    use crate::buffers::BufferSet;
    use crate::context::ComputeContext;
    use crate::data::generate_inputs;
    use crate::kernel::{KernelPipeline, global_work_size, is_nontrivial_log};

    let workload = &config.workload;
    let n = workload.elements;
    let group = workload.work_group_size;
    let count = u32::try_from(n)
        .map_err(|_| BenchError::Config(format!("element count {n} does not fit in u32")))?;

    let ctx = ComputeContext::create(device)?;

    let seed = workload.effective_seed();
    let (a, b) = generate_inputs(n, seed);
    observer.on_data_generated(n);

    let buffers = BufferSet::new(&ctx, &a, &b)?;

    let source = kernel_source(&config.kernel)?;
    let pipeline = KernelPipeline::compile(&ctx, &source, &config.kernel.build_options)?;
    if is_nontrivial_log(pipeline.build_log()) {
        observer.on_build_log(pipeline.build_log());
    }
    let kernel = pipeline.bind_arguments(&buffers, count)?;

    let bench = Benchmark::new(workload.trials, workload.warmup);
    let mut cl_workload = ClWorkload { kernel, group };

    let compute = bench.time_compute(&mut cl_workload)?;
    observer.on_compute(&compute);

    let mut out = vec![0.0f32; n];
    let transfer = bench.time_transfer(&mut cl_workload, &mut out)?;
    observer.on_transfer(&transfer);

    validate(&a, &b, &out)?;
    info!(n, "results validated");

    Ok(RunReport {
        device: device.clone(),
        elements: n,
        work_group_size: group,
        global_work_size: global_work_size(n, group)?,
        trials: workload.trials,
        warmup: workload.warmup,
        seed,
        compute,
        transfer,
    })
}

/// The compiled `aplusb` pipeline driven through [`Workload`](crate::benchmark::Workload).
#[cfg(feature = "opencl")]
struct ClWorkload<'b, 'ctx> {
    kernel: crate::kernel::BoundKernel<'b, 'ctx>,
    group: usize,
}

#[cfg(feature = "opencl")]
impl crate::benchmark::Workload for ClWorkload<'_, '_> {
    fn len(&self) -> usize {
        self.kernel.buffers().len()
    }

    fn run_compute(&mut self) -> Result<()> {
        use crate::error::ClResultExt;

        let event = self.kernel.dispatch(self.kernel.buffers().len(), self.group)?;
        event.wait().checked().map_err(BenchError::Dispatch)
    }

    fn download(&mut self, out: &mut [f32]) -> Result<std::time::Duration> {
        self.kernel.buffers().c.download(out)
    }
}
