//! Centralized output configuration and console rendering.
//!
//! - `--format json` emits the final result as JSON on stdout and silences
//!   progress output
//! - `--quiet` suppresses progress output in text mode
//!
//! Line builders return plain strings; styling is applied when printing.

use std::io::Write;

use clbench_opencl::benchmark::{ComputeReport, TransferReport};
use clbench_opencl::catalog::{DeviceInfo, DeviceOrdinal, PlatformInfo};
use clbench_opencl::{RunObserver, RunReport};
use console::style;
use serde::Serialize;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text (default).
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}'. Expected one of: text, json")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Output configuration derived from CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputConfig {
    /// Whether progress lines are printed at all.
    pub fn shows_progress(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    /// Print a progress line on stdout (text mode only, unless quiet).
    pub fn status(&self, msg: &str) {
        if self.shows_progress() {
            println!("{msg}");
        }
    }

    /// Emit a final result value. In JSON mode it is serialized to stdout;
    /// in text mode `text_fn` is called to render human output.
    pub fn emit_result<T: Serialize>(&self, value: &T, text_fn: impl FnOnce(&T)) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(value)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}")?;
            }
            OutputFormat::Text => text_fn(value),
        }
        Ok(())
    }

    /// Log level forced by the flags, if any.
    pub fn log_level_override(&self) -> Option<&'static str> {
        self.quiet.then_some("error")
    }
}

/// `Number of OpenCL platforms` followed by each platform and its devices.
pub fn platform_lines(platforms: &[PlatformInfo]) -> Vec<String> {
    let mut lines = vec![format!("Number of OpenCL platforms: {}", platforms.len())];
    for (p, platform) in platforms.iter().enumerate() {
        lines.push(format!("Platform #{}/{}", p + 1, platforms.len()));
        lines.push(format!("    Platform name: {}", platform.name));
        lines.push(format!("    Number of devices: {}", platform.devices.len()));
        for (d, device) in platform.devices.iter().enumerate() {
            lines.push(format!("    Device #{}/{}", d + 1, platform.devices.len()));
            lines.push(format!("      Device name: {}", device.name));
        }
    }
    lines
}

pub fn compute_lines(report: &ComputeReport) -> Vec<String> {
    vec![
        format!("Kernel average time: {}", report.stats),
        format!("GFlops: {}", report.gflops),
        format!("VRAM bandwidth: {} GB/s", report.bandwidth_gib_s),
    ]
}

pub fn transfer_lines(report: &TransferReport) -> Vec<String> {
    vec![
        format!("Result data transfer time: {}", report.stats),
        format!("VRAM -> RAM bandwidth: {} GB/s", report.bandwidth_gib_s),
    ]
}

/// One line of the `devices` listing.
pub fn device_line(device: &DeviceInfo, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    format!(
        "{marker} [{}] {} ({}, {} CUs, {} MiB, max work-group {})",
        device.ordinal(),
        device.name,
        device.class,
        device.compute_units,
        device.global_mem_bytes / (1024 * 1024),
        device.max_work_group_size,
    )
}

/// Result of the `devices` subcommand.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing {
    pub platforms: Vec<PlatformInfo>,
    pub selected: Option<DeviceOrdinal>,
}

impl DeviceListing {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for platform in &self.platforms {
            lines.push(format!(
                "Platform #{}: {} ({}, {})",
                platform.index, platform.name, platform.vendor, platform.version
            ));
            for device in &platform.devices {
                lines.push(format!("  {}", device_line(device, self.selected == Some(device.ordinal()))));
            }
        }
        if self.platforms.is_empty() {
            lines.push("No OpenCL platforms found".to_string());
        }
        lines
    }
}

/// Final line of a successful text-mode run.
pub fn summary_line(report: &RunReport) -> String {
    format!(
        "{} elements on {} [{}]: results match the CPU reference",
        report.elements,
        report.device.name,
        report.device.ordinal()
    )
}

/// Prints progress as the run advances.
pub struct ConsoleObserver {
    out: OutputConfig,
}

impl ConsoleObserver {
    pub fn new(out: OutputConfig) -> Self {
        Self { out }
    }

    fn print(&self, lines: Vec<String>) {
        for line in lines {
            self.out.status(&line);
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_platforms(&mut self, platforms: &[PlatformInfo]) {
        self.print(platform_lines(platforms));
    }

    fn on_device_selected(&mut self, device: &DeviceInfo) {
        self.out.status(&format!(
            "Using device {} [{}]",
            style(&device.name).bold(),
            device.ordinal()
        ));
    }

    fn on_data_generated(&mut self, elements: usize) {
        self.out.status(&format!("Data generated for n={elements}!"));
    }

    fn on_build_log(&mut self, log: &str) {
        self.out.status(&style("Log:").yellow().to_string());
        self.out.status(log.trim_end());
    }

    fn on_compute(&mut self, report: &ComputeReport) {
        self.print(compute_lines(report));
    }

    fn on_transfer(&mut self, report: &TransferReport) {
        self.print(transfer_lines(report));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clbench_opencl::LapStats;
    use clbench_opencl::catalog::DeviceClass;

    fn platforms() -> Vec<PlatformInfo> {
        vec![
            PlatformInfo::with_devices(0, "Portable Computing Language", vec![DeviceInfo::new("cpu-haswell", DeviceClass::Cpu)]),
            PlatformInfo::with_devices(
                1,
                "NVIDIA CUDA",
                vec![DeviceInfo::new("GeForce A", DeviceClass::Gpu), DeviceInfo::new("GeForce B", DeviceClass::Gpu)],
            ),
        ]
    }

    #[test]
    fn platform_listing_uses_one_based_counters() {
        let lines = platform_lines(&platforms());
        assert_eq!(lines[0], "Number of OpenCL platforms: 2");
        assert_eq!(lines[1], "Platform #1/2");
        assert_eq!(lines[2], "    Platform name: Portable Computing Language");
        assert!(lines.contains(&"    Device #2/2".to_string()));
        assert_eq!(lines.last().unwrap(), "      Device name: GeForce B");
    }

    #[test]
    fn compute_lines_show_mean_and_std() {
        let report = ComputeReport::new(1_000_000_000, LapStats::from_laps(&[1.0, 1.0]));
        let lines = compute_lines(&report);
        assert_eq!(lines[0], "Kernel average time: 1+-0 s");
        assert_eq!(lines[1], "GFlops: 1");
        assert!(lines[2].starts_with("VRAM bandwidth: ") && lines[2].ends_with(" GB/s"));
    }

    #[test]
    fn transfer_lines_show_bandwidth() {
        let report = TransferReport::new(1 << 28, LapStats::from_laps(&[0.5, 0.5]));
        let lines = transfer_lines(&report);
        assert_eq!(lines[0], "Result data transfer time: 0.5+-0 s");
        assert_eq!(lines[1], "VRAM -> RAM bandwidth: 2 GB/s");
    }

    #[test]
    fn listing_marks_selected_device() {
        let listing = DeviceListing {
            platforms: platforms(),
            selected: Some(DeviceOrdinal { platform: 1, device: 0 }),
        };
        let lines = listing.lines();
        let marked: Vec<_> = lines.iter().filter(|l| l.trim_start().starts_with('*')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].contains("GeForce A"));
    }

    #[test]
    fn empty_listing_says_so() {
        let listing = DeviceListing { platforms: vec![], selected: None };
        assert_eq!(listing.lines(), vec!["No OpenCL platforms found".to_string()]);
    }

    #[test]
    fn json_and_quiet_hide_progress() {
        assert!(OutputConfig::default().shows_progress());
        assert!(!OutputConfig { quiet: true, ..Default::default() }.shows_progress());
        assert!(!OutputConfig { format: OutputFormat::Json, quiet: false }.shows_progress());
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
