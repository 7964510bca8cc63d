//! Command-line arguments and how they layer onto the configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clbench_opencl::{BenchConfig, DeviceOrdinal, LogFormat};

use crate::output::OutputFormat;

/// clbench - OpenCL device selection and a+b kernel benchmark
#[derive(Debug, Parser)]
#[command(name = "clbench")]
#[command(about = "Pick an OpenCL device, time an a+b kernel and check the result")]
#[command(long_about = r#"
clbench enumerates OpenCL platforms and devices, picks the first GPU (or the last
device seen when there is none), uploads two float arrays, compiles the aplusb
kernel, and times both the kernel and the device-to-host readback.

Examples:
  # Default run: 100,000,000 elements, work-group 128, 20 trials
  clbench

  # Smaller run on an explicit device with the built-in kernel
  clbench --elements 1048576 --device 0:1 --embedded-kernel

  # List platforms and devices
  clbench devices

  # Show the effective configuration
  clbench config
"#)]
#[command(version)]
pub struct Cli {
    /// Configuration file path (otherwise CLBENCH_CONFIG, then ./clbench.toml)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Kernel source file
    #[arg(long, value_name = "PATH", global = true)]
    pub kernel: Option<PathBuf>,

    /// Compile the kernel built into the binary
    #[arg(long, global = true)]
    pub embedded_kernel: bool,

    /// Elements per array
    #[arg(short = 'n', long, value_name = "N", global = true)]
    pub elements: Option<usize>,

    /// Work-items per work-group
    #[arg(long, value_name = "SIZE", global = true)]
    pub work_group_size: Option<usize>,

    /// Timed repetitions of each phase
    #[arg(long, value_name = "N", global = true)]
    pub trials: Option<usize>,

    /// Untimed kernel runs before the compute phase
    #[arg(long, value_name = "N", global = true)]
    pub warmup: Option<usize>,

    /// Input data seed (defaults to the element count)
    #[arg(long, value_name = "SEED", global = true)]
    pub seed: Option<u64>,

    /// Use a specific device instead of the selection policy
    #[arg(short, long, value_name = "PLATFORM:DEVICE", global = true)]
    pub device: Option<DeviceOrdinal>,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Only print errors and the final result
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the benchmark (default)
    Run,
    /// List platforms and devices and mark the one that would be used
    #[command(alias = "list")]
    Devices,
    /// Print the effective configuration
    Config,
}

impl Cli {
    /// Defaults, config file, environment, then these flags; validated.
    pub fn load_config(&self) -> Result<BenchConfig> {
        let builder = clbench_opencl::load_config(self.config.as_deref())
            .context("failed to load configuration")?;

        let config = builder
            .update(|c| self.apply(c))
            .validate()
            .context("invalid configuration")?
            .build();
        Ok(config)
    }

    fn apply(&self, c: &mut BenchConfig) {
        if let Some(path) = &self.kernel {
            c.kernel.source_path = path.clone();
        }
        if self.embedded_kernel {
            c.kernel.use_embedded = true;
        }
        if let Some(n) = self.elements {
            c.workload.elements = n;
        }
        if let Some(size) = self.work_group_size {
            c.workload.work_group_size = size;
        }
        if let Some(trials) = self.trials {
            c.workload.trials = trials;
        }
        if let Some(warmup) = self.warmup {
            c.workload.warmup = warmup;
        }
        if let Some(seed) = self.seed {
            c.workload.seed = Some(seed);
        }
        if let Some(ordinal) = self.device {
            c.device.ordinal = Some(ordinal);
        }
        if let Some(level) = &self.log_level {
            c.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            c.logging.format = format;
        }
    }

    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}
