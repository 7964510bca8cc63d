//! Context and command queue for the selected device.
//!
//! The queue is declared before the context, so it is released first when
//! a [`ComputeContext`] is dropped. Buffers and kernels borrow the context
//! and therefore cannot outlive it.

use opencl3::command_queue::CommandQueue;
use opencl3::context::Context;
use opencl3::device::Device;
use tracing::{debug, info};

use crate::catalog::DeviceInfo;
use crate::error::{BenchError, ClResultExt, Result};

/// One OpenCL context with a single in-order command queue.
pub struct ComputeContext {
    // Field order is drop order.
    queue: CommandQueue,
    context: Context,
    device: DeviceInfo,
}

impl ComputeContext {
    /// Create a context and its queue for `device`.
    pub fn create(device: &DeviceInfo) -> Result<Self> {
        let cl_device = Device::new(device.id.as_cl());
        let context =
            Context::from_device(&cl_device).checked().map_err(BenchError::ContextCreation)?;
        let queue = CommandQueue::create_default_with_properties(&context, 0, 0)
            .checked()
            .map_err(BenchError::QueueCreation)?;

        info!(device = %device.name, ordinal = %device.ordinal(), "created OpenCL context");
        Ok(Self { queue, context, device: device.clone() })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
}

impl Drop for ComputeContext {
    fn drop(&mut self) {
        debug!(device = %self.device.name, "releasing OpenCL queue and context");
    }
}
