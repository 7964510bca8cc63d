//! Device buffers for the two `f32` inputs and the output.
//!
//! Byte-size arithmetic is always available; the buffers themselves need
//! the `opencl` feature.

use crate::error::{BenchError, Result};

/// Size in bytes of a device buffer holding `len` `f32` values.
pub fn fp32_buffer_bytes(len: usize) -> Result<usize> {
    len.checked_mul(size_of::<f32>())
        .ok_or_else(|| BenchError::Config(format!("{len} f32 elements overflow the address space")))
}

/// Host and device arrays must have the same element count.
pub fn check_lengths(device_len: usize, host_len: usize) -> Result<()> {
    if device_len != host_len {
        return Err(BenchError::LengthMismatch { expected: device_len, actual: host_len });
    }
    Ok(())
}

#[cfg(feature = "opencl")]
pub use self::cl::{BufferSet, DeviceBuffer};

#[cfg(feature = "opencl")]
mod cl {
    use std::ffi::c_void;
    use std::ptr;
    use std::time::{Duration, Instant};

    use opencl3::memory::{Buffer, CL_MEM_COPY_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY};
    use opencl3::types::{CL_BLOCKING, cl_float, cl_mem};
    use tracing::{debug, trace};

    use super::{check_lengths, fp32_buffer_bytes};
    use crate::context::ComputeContext;
    use crate::error::{BenchError, ClResultExt, Result};

    /// A device mirror of one host array, released on drop.
    pub struct DeviceBuffer<'ctx> {
        buffer: Buffer<cl_float>,
        len: usize,
        ctx: &'ctx ComputeContext,
    }

    impl<'ctx> DeviceBuffer<'ctx> {
        /// Allocate a read-only buffer initialised from `host`.
        pub fn upload(ctx: &'ctx ComputeContext, host: &[f32]) -> Result<Self> {
            let bytes = fp32_buffer_bytes(host.len())?;
            // SAFETY: COPY_HOST_PTR copies `host` during the call and the
            // device never writes through this pointer.
            let buffer = unsafe {
                Buffer::<cl_float>::create(
                    ctx.context(),
                    CL_MEM_READ_ONLY | CL_MEM_COPY_HOST_PTR,
                    host.len(),
                    host.as_ptr() as *mut c_void,
                )
            }
            .checked()
            .map_err(|status| BenchError::Allocation { bytes, status })?;

            debug!(bytes, "uploaded input buffer");
            Ok(Self { buffer, len: host.len(), ctx })
        }

        /// Allocate an uninitialised write-only buffer of `len` elements.
        pub fn allocate_output(ctx: &'ctx ComputeContext, len: usize) -> Result<Self> {
            let bytes = fp32_buffer_bytes(len)?;
            // SAFETY: no host pointer is passed.
            let buffer = unsafe {
                Buffer::<cl_float>::create(ctx.context(), CL_MEM_WRITE_ONLY, len, ptr::null_mut())
            }
            .checked()
            .map_err(|status| BenchError::Allocation { bytes, status })?;

            debug!(bytes, "allocated output buffer");
            Ok(Self { buffer, len, ctx })
        }

        /// Blocking read of the whole buffer into `host` on the queue the
        /// buffer was created with; returns the wall-clock time of enqueue
        /// plus wait.
        pub fn download(&self, host: &mut [f32]) -> Result<Duration> {
            check_lengths(self.len, host.len())?;

            let started = Instant::now();
            // SAFETY: `host` is exactly `self.len` elements and the read is blocking.
            let event = unsafe {
                self.ctx.queue().enqueue_read_buffer(&self.buffer, CL_BLOCKING, 0, host, &[])
            }
            .checked()
            .map_err(BenchError::Transfer)?;
            event.wait().checked().map_err(BenchError::Transfer)?;
            let elapsed = started.elapsed();

            trace!(elapsed_us = elapsed.as_micros() as u64, "downloaded buffer");
            Ok(elapsed)
        }

        pub fn len(&self) -> usize {
            self.len
        }

        pub fn is_empty(&self) -> bool {
            self.len == 0
        }

        pub(crate) fn raw(&self) -> cl_mem {
            use opencl3::memory::ClMem;
            self.buffer.get()
        }
    }

    /// The three equal-length buffers of one `a + b` run.
    pub struct BufferSet<'ctx> {
        pub a: DeviceBuffer<'ctx>,
        pub b: DeviceBuffer<'ctx>,
        pub c: DeviceBuffer<'ctx>,
    }

    impl<'ctx> BufferSet<'ctx> {
        /// Upload `a` and `b` and allocate an output of the same length.
        pub fn new(ctx: &'ctx ComputeContext, a: &[f32], b: &[f32]) -> Result<Self> {
            check_lengths(a.len(), b.len())?;
            Ok(Self {
                a: DeviceBuffer::upload(ctx, a)?,
                b: DeviceBuffer::upload(ctx, b)?,
                c: DeviceBuffer::allocate_output(ctx, a.len())?,
            })
        }

        pub fn len(&self) -> usize {
            self.c.len()
        }

        pub fn is_empty(&self) -> bool {
            self.c.is_empty()
        }
    }
}
