// Exit codes for scripted runs
use clbench_opencl::BenchError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_NO_DRIVER: i32 = 3;
pub const EXIT_NO_DEVICE: i32 = 4;
pub const EXIT_KERNEL_SOURCE: i32 = 5;
pub const EXIT_BUILD_FAIL: i32 = 6;
pub const EXIT_MISMATCH: i32 = 7;

/// Exit code for the first [`BenchError`] in the chain of `err`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    let Some(bench) = err.chain().find_map(|e| e.downcast_ref::<BenchError>()) else {
        return EXIT_GENERIC_FAIL;
    };
    match bench {
        BenchError::Config(_) => EXIT_CONFIG,
        BenchError::DriverInit { .. } => EXIT_NO_DRIVER,
        BenchError::NoDevice { .. } => EXIT_NO_DEVICE,
        BenchError::KernelSource { .. } | BenchError::EmptySource { .. } => EXIT_KERNEL_SOURCE,
        BenchError::Build { .. } => EXIT_BUILD_FAIL,
        BenchError::ResultMismatch { .. } => EXIT_MISMATCH,
        _ => EXIT_GENERIC_FAIL,
    }
}
