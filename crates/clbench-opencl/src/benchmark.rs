//! Timed compute and transfer loops plus result validation.
//!
//! The loops are written against the [`Workload`] trait so the same
//! orchestration drives the OpenCL pipeline and host-side stand-ins.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::timer::{LapStats, Timer};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const F32_BYTES: f64 = size_of::<f32>() as f64;

/// Something that can compute `c = a + b` and hand back `c`.
pub trait Workload {
    /// Number of elements per array.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one full compute pass and wait for it to finish.
    fn run_compute(&mut self) -> Result<()>;

    /// Blocking read of the whole result into `out`, returning its duration.
    fn download(&mut self, out: &mut [f32]) -> Result<Duration>;
}

/// Compute-phase timing and derived throughput.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeReport {
    pub stats: LapStats,
    /// `n / 1e9 / mean`: one addition per element.
    pub gflops: f64,
    /// `3 * n * 4 / 1024^3 / mean`: two reads and one write per element.
    pub bandwidth_gib_s: f64,
}

impl ComputeReport {
    pub fn new(n: usize, stats: LapStats) -> Self {
        let n = n as f64;
        Self {
            gflops: per_second(n / 1e9, stats.mean_s),
            bandwidth_gib_s: per_second(3.0 * n * F32_BYTES / GIB, stats.mean_s),
            stats,
        }
    }
}

/// Transfer-phase timing and derived bandwidth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReport {
    pub stats: LapStats,
    /// `n * 4 / 1024^3 / mean`.
    pub bandwidth_gib_s: f64,
}

impl TransferReport {
    pub fn new(n: usize, stats: LapStats) -> Self {
        Self { bandwidth_gib_s: per_second(n as f64 * F32_BYTES / GIB, stats.mean_s), stats }
    }
}

fn per_second(amount: f64, seconds: f64) -> f64 {
    if seconds > 0.0 { amount / seconds } else { 0.0 }
}

/// Both timing phases of a validated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub compute: ComputeReport,
    pub transfer: TransferReport,
}

/// Trial counts for the timed loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Benchmark {
    pub trials: usize,
    /// Untimed compute passes before the first lap.
    pub warmup: usize,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self { trials: crate::DEFAULT_TRIALS, warmup: 0 }
    }
}

impl Benchmark {
    pub fn new(trials: usize, warmup: usize) -> Self {
        Self { trials, warmup }
    }

    /// Warm up, then record one lap per compute pass.
    pub fn time_compute<W: Workload + ?Sized>(&self, workload: &mut W) -> Result<ComputeReport> {
        for _ in 0..self.warmup {
            workload.run_compute()?;
        }
        if self.warmup > 0 {
            debug!(passes = self.warmup, "warm-up done");
        }

        let mut timer = Timer::start();
        for _ in 0..self.trials {
            timer.restart();
            workload.run_compute()?;
            timer.next_lap();
        }

        let report = ComputeReport::new(workload.len(), timer.stats());
        info!(
            mean_s = report.stats.mean_s,
            std_dev_s = report.stats.std_dev_s,
            gflops = report.gflops,
            bandwidth_gib_s = report.bandwidth_gib_s,
            "compute phase timed"
        );
        Ok(report)
    }

    /// Record one lap per full download into `out`.
    pub fn time_transfer<W: Workload + ?Sized>(
        &self,
        workload: &mut W,
        out: &mut [f32],
    ) -> Result<TransferReport> {
        let mut timer = Timer::start();
        for _ in 0..self.trials {
            let lap = workload.download(out)?;
            timer.record(lap);
        }

        let report = TransferReport::new(workload.len(), timer.stats());
        info!(
            mean_s = report.stats.mean_s,
            std_dev_s = report.stats.std_dev_s,
            bandwidth_gib_s = report.bandwidth_gib_s,
            "transfer phase timed"
        );
        Ok(report)
    }

    /// Compute, transfer, then validate `out` against `a + b`.
    pub fn run<W: Workload + ?Sized>(
        &self,
        workload: &mut W,
        a: &[f32],
        b: &[f32],
        out: &mut [f32],
    ) -> Result<BenchmarkReport> {
        let compute = self.time_compute(workload)?;
        let transfer = self.time_transfer(workload, out)?;
        validate(a, b, out)?;
        Ok(BenchmarkReport { compute, transfer })
    }
}

/// Check `c[i] == a[i] + b[i]` exactly, stopping at the first difference.
pub fn validate(a: &[f32], b: &[f32], c: &[f32]) -> Result<()> {
    crate::buffers::check_lengths(a.len(), b.len())?;
    crate::buffers::check_lengths(a.len(), c.len())?;

    for (index, ((&x, &y), &got)) in a.iter().zip(b).zip(c).enumerate() {
        let expected = x + y;
        if got != expected {
            return Err(BenchError::ResultMismatch { index, expected, actual: got });
        }
    }
    debug!(n = c.len(), "results match the CPU reference");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{generate_inputs, reference_sum};

    /// Host-side `a + b` with call counters.
    struct HostWorkload {
        a: Vec<f32>,
        b: Vec<f32>,
        c: Vec<f32>,
        computes: usize,
        downloads: usize,
    }

    impl HostWorkload {
        fn new(a: Vec<f32>, b: Vec<f32>) -> Self {
            let c = vec![0.0; a.len()];
            Self { a, b, c, computes: 0, downloads: 0 }
        }
    }

    impl Workload for HostWorkload {
        fn len(&self) -> usize {
            self.a.len()
        }

        fn run_compute(&mut self) -> Result<()> {
            self.c = reference_sum(&self.a, &self.b);
            self.computes += 1;
            Ok(())
        }

        fn download(&mut self, out: &mut [f32]) -> Result<Duration> {
            crate::buffers::check_lengths(self.c.len(), out.len())?;
            out.copy_from_slice(&self.c);
            self.downloads += 1;
            Ok(Duration::from_millis(2))
        }
    }

    #[test]
    fn run_counts_trials_and_warmup() {
        let (a, b) = generate_inputs(256, 256);
        let mut w = HostWorkload::new(a.clone(), b.clone());
        let mut out = vec![0.0; 256];
        let report = Benchmark::new(5, 2).run(&mut w, &a, &b, &mut out).unwrap();

        assert_eq!(w.computes, 7);
        assert_eq!(w.downloads, 5);
        assert_eq!(report.compute.stats.laps, 5);
        assert_eq!(report.transfer.stats.laps, 5);
        assert_eq!(out, reference_sum(&a, &b));
    }

    #[test]
    fn transfer_uses_reported_durations() {
        let mut w = HostWorkload::new(vec![1.0; 8], vec![2.0; 8]);
        let mut out = vec![0.0; 8];
        let report = Benchmark::new(3, 0).time_transfer(&mut w, &mut out).unwrap();
        assert!((report.stats.mean_s - 0.002).abs() < 1e-12);
        assert_eq!(report.stats.std_dev_s, 0.0);
    }

    #[test]
    fn compute_metrics_follow_formulas() {
        let stats = LapStats::from_laps(&[0.5, 0.5]);
        let r = ComputeReport::new(100_000_000, stats);
        assert!((r.gflops - 0.2).abs() < 1e-12);
        let expected_bw = 3.0 * 100_000_000.0 * 4.0 / GIB / 0.5;
        assert!((r.bandwidth_gib_s - expected_bw).abs() < 1e-9);
    }

    #[test]
    fn transfer_bandwidth_formula() {
        let r = TransferReport::new(1 << 28, LapStats::from_laps(&[1.0]));
        // 2^28 floats are exactly 1 GiB.
        assert!((r.bandwidth_gib_s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_mean_yields_zero_rates() {
        let r = ComputeReport::new(10, LapStats::from_laps(&[]));
        assert_eq!(r.gflops, 0.0);
        assert_eq!(r.bandwidth_gib_s, 0.0);
    }

    #[test]
    fn validation_reports_first_mismatch() {
        let a = vec![1.0; 10];
        let b = vec![2.0; 10];
        let mut c = vec![3.0; 10];
        c[4] = 0.0;
        c[7] = 0.0;
        let err = validate(&a, &b, &c).unwrap_err();
        assert!(matches!(err, BenchError::ResultMismatch { index: 4, .. }));
    }

    #[test]
    fn validation_is_exact() {
        let a = [0.1f32];
        let b = [0.2f32];
        assert!(validate(&a, &b, &[0.1f32 + 0.2f32]).is_ok());
        let off = f32::from_bits((0.1f32 + 0.2f32).to_bits() + 1);
        assert!(validate(&a, &b, &[off]).is_err());
    }

    #[test]
    fn validation_rejects_length_mismatch() {
        let err = validate(&[1.0, 2.0], &[1.0, 2.0], &[2.0]).unwrap_err();
        assert!(matches!(err, BenchError::LengthMismatch { .. }));
    }

    #[test]
    fn failing_compute_aborts_before_transfer() {
        struct Broken(usize);
        impl Workload for Broken {
            fn len(&self) -> usize {
                4
            }
            fn run_compute(&mut self) -> Result<()> {
                Err(BenchError::Config("boom".into()))
            }
            fn download(&mut self, _out: &mut [f32]) -> Result<Duration> {
                self.0 += 1;
                Ok(Duration::ZERO)
            }
        }

        let mut w = Broken(0);
        let mut out = vec![0.0; 4];
        let res = Benchmark::default().run(&mut w, &[0.0; 4], &[0.0; 4], &mut out);
        assert!(res.is_err());
        assert_eq!(w.0, 0);
    }
}
