//! Kernel source handling, compilation, argument binding and dispatch.
//!
//! The `aplusb` kernel takes `(a, b, c, n)`: two read-only inputs, the
//! output, and the element count as `unsigned int`. The dispatch range is
//! padded up to a whole number of work-groups; the kernel ignores work
//! items at or beyond `n`.

use std::borrow::Cow;
use std::path::Path;

use crate::error::{BenchError, Result, Status};

/// Entry point name of the benchmark kernel.
pub const KERNEL_ENTRY_POINT: &str = "aplusb";

/// The `aplusb` kernel source, embedded at compile time.
pub const APLUSB_SRC: &str = include_str!("cl/aplusb.cl");

/// Kernel source text and where it came from.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// File path or `<embedded>`.
    pub origin: String,
    pub text: Cow<'static, str>,
}

impl SourceText {
    pub fn embedded() -> Self {
        Self { origin: "<embedded>".into(), text: Cow::Borrowed(APLUSB_SRC) }
    }

    /// Read kernel source from `path`.
    ///
    /// A missing or unreadable file is a [`BenchError::KernelSource`]; an
    /// empty one is accepted here and rejected by [`SourceText::ensure_nonempty`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| BenchError::KernelSource { path: path.to_path_buf(), source })?;
        Ok(Self { origin: path.display().to_string(), text: Cow::Owned(text) })
    }

    /// Fail with [`BenchError::EmptySource`] if there is nothing to compile.
    pub fn ensure_nonempty(&self) -> Result<()> {
        if self.text.is_empty() {
            return Err(BenchError::EmptySource { origin: self.origin.clone() });
        }
        Ok(())
    }
}

/// Global work size for `total` items in groups of `group`:
/// `ceil(total / group) * group`.
pub fn global_work_size(total: usize, group: usize) -> Result<usize> {
    if group == 0 {
        return Err(BenchError::Config("work-group size must be non-zero".into()));
    }
    total
        .div_ceil(group)
        .checked_mul(group)
        .ok_or_else(|| BenchError::Config(format!("global size for {total} items overflows")))
}

/// Build logs of a single character (typically a newline) carry nothing.
pub fn is_nontrivial_log(log: &str) -> bool {
    log.len() > 1
}

/// Settle a build outcome with its log query.
///
/// A failed build keeps its own status even when the log query also
/// failed; after a successful build a failed log query is an error.
#[cfg_attr(not(feature = "opencl"), allow(dead_code))]
pub(crate) fn settle_build(
    built: std::result::Result<(), Status>,
    log: std::result::Result<String, Status>,
) -> Result<String> {
    match (built, log) {
        (Err(status), log) => Err(BenchError::Build { status, log: log.unwrap_or_default() }),
        (Ok(()), Err(status)) => Err(BenchError::Build { status, log: String::new() }),
        (Ok(()), Ok(log)) => Ok(log),
    }
}

#[cfg(feature = "opencl")]
pub use self::cl::{BoundKernel, KernelPipeline};

#[cfg(feature = "opencl")]
mod cl {
    use std::ptr;

    use opencl3::error_codes::ClError;
    use opencl3::event::Event;
    use opencl3::kernel::Kernel;
    use opencl3::program::Program;
    use opencl3::types::cl_uint;
    use tracing::{debug, info, warn};

    use super::{KERNEL_ENTRY_POINT, SourceText, global_work_size, is_nontrivial_log, settle_build};
    use crate::buffers::BufferSet;
    use crate::context::ComputeContext;
    use crate::error::{BenchError, ClResultExt, Result};

    #[track_caller]
    fn bind(index: cl_uint, result: std::result::Result<(), ClError>) -> Result<()> {
        result.checked().map_err(|status| BenchError::ArgumentBind { index, status })
    }

    /// Compiled program plus the `aplusb` kernel for one device.
    pub struct KernelPipeline<'ctx> {
        // Kernel is released before the program it was created from.
        kernel: Kernel,
        #[allow(dead_code)]
        program: Program,
        build_log: String,
        ctx: &'ctx ComputeContext,
    }

    impl<'ctx> KernelPipeline<'ctx> {
        /// Compile `source` for the context's device.
        ///
        /// Empty sources are rejected before anything reaches the driver.
        pub fn compile(ctx: &'ctx ComputeContext, source: &SourceText, options: &str) -> Result<Self> {
            source.ensure_nonempty()?;

            let device_id = ctx.device().id.as_cl();
            let mut program = Program::create_from_source(ctx.context(), &source.text)
                .checked()
                .map_err(|status| BenchError::Build { status, log: String::new() })?;

            let built = program.build(&[device_id], options).checked();
            let log = program.get_build_log(device_id).checked();
            let build_log = settle_build(built, log).inspect_err(|e| {
                warn!(origin = %source.origin, error = %e, "kernel build failed");
            })?;
            if is_nontrivial_log(&build_log) {
                info!(origin = %source.origin, log = %build_log.trim_end(), "kernel build log");
            }

            let kernel = Kernel::create(&program, KERNEL_ENTRY_POINT)
                .checked()
                .map_err(|status| BenchError::Build { status, log: build_log.clone() })?;

            debug!(origin = %source.origin, entry = KERNEL_ENTRY_POINT, "compiled kernel");
            Ok(Self { kernel, program, build_log, ctx })
        }

        /// Build log reported by the compiler (may be empty).
        pub fn build_log(&self) -> &str {
            &self.build_log
        }

        /// Bind `(a, b, c, count)` in that order.
        ///
        /// Dispatching goes through the returned [`BoundKernel`], which
        /// borrows `buffers`, so they cannot be released while the kernel
        /// can still run against them.
        pub fn bind_arguments<'b>(
            &'b self,
            buffers: &'b BufferSet<'ctx>,
            count: u32,
        ) -> Result<BoundKernel<'b, 'ctx>> {
            // SAFETY: argument types match the kernel signature; the handles
            // stay valid for as long as the returned borrow of `buffers`.
            unsafe {
                bind(0, self.kernel.set_arg(0, &buffers.a.raw()))?;
                bind(1, self.kernel.set_arg(1, &buffers.b.raw()))?;
                bind(2, self.kernel.set_arg(2, &buffers.c.raw()))?;
                bind(3, self.kernel.set_arg(3, &(count as cl_uint)))?;
            }
            Ok(BoundKernel { pipeline: self, buffers })
        }
    }

    /// A kernel with its arguments bound to one [`BufferSet`].
    ///
    /// The buffers must outlive every dispatch:
    ///
    /// ```compile_fail
    /// use clbench_opencl::buffers::BufferSet;
    /// use clbench_opencl::kernel::KernelPipeline;
    /// use clbench_opencl::{ComputeContext, Result};
    ///
    /// fn dispatch_after_release<'ctx>(ctx: &'ctx ComputeContext, pipeline: &KernelPipeline<'ctx>) -> Result<()> {
    ///     let bound = {
    ///         let buffers = BufferSet::new(ctx, &[1.0; 16], &[2.0; 16])?;
    ///         pipeline.bind_arguments(&buffers, 16)?
    ///     };
    ///     bound.dispatch(16, 16)?;
    ///     Ok(())
    /// }
    /// ```
    pub struct BoundKernel<'b, 'ctx> {
        pipeline: &'b KernelPipeline<'ctx>,
        buffers: &'b BufferSet<'ctx>,
    }

    impl<'b, 'ctx> BoundKernel<'b, 'ctx> {
        pub fn buffers(&self) -> &'b BufferSet<'ctx> {
            self.buffers
        }

        /// Enqueue one 1-D dispatch of `total` items in groups of `group`.
        pub fn dispatch(&self, total: usize, group: usize) -> Result<Event> {
            let global = [global_work_size(total, group)?];
            let local = [group];
            // SAFETY: work sizes are 1-D arrays that live across the call and
            // the bound buffers are borrowed by `self`.
            unsafe {
                self.pipeline.ctx.queue().enqueue_nd_range_kernel(
                    self.pipeline.kernel.get(),
                    1,
                    ptr::null(),
                    global.as_ptr(),
                    local.as_ptr(),
                    &[],
                )
            }
            .checked()
            .map_err(BenchError::Dispatch)
        }
    }
}
