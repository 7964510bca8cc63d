//! Property-based tests for the hardware-independent parts of the crate.
//!
//! - **Selection** picks the first GPU if any, else the last device.
//! - **Padding** yields the smallest multiple of the group covering every item.
//! - **Lap statistics** stay consistent with the samples they summarise.
//! - **Validation** pinpoints the first corrupted element.

use clbench_opencl::catalog::{DeviceClass, DeviceInfo, PlatformInfo, select_device};
use clbench_opencl::data::{generate_inputs, reference_sum};
use clbench_opencl::kernel::global_work_size;
use clbench_opencl::{BenchError, LapStats, validate};
use proptest::prelude::*;

// ── Catalog strategy ────────────────────────────────────────────────

fn arb_class() -> impl Strategy<Value = DeviceClass> {
    prop::sample::select(vec![DeviceClass::Cpu, DeviceClass::Gpu, DeviceClass::Other])
}

fn arb_catalog() -> impl Strategy<Value = Vec<PlatformInfo>> {
    prop::collection::vec(prop::collection::vec(arb_class(), 0..5), 0..4).prop_map(|layout| {
        layout
            .into_iter()
            .enumerate()
            .map(|(p, classes)| {
                let devices = classes
                    .into_iter()
                    .enumerate()
                    .map(|(d, class)| DeviceInfo::new(format!("p{p}d{d}"), class))
                    .collect();
                PlatformInfo::with_devices(p, format!("platform {p}"), devices)
            })
            .collect()
    })
}

// ── Selection invariants ────────────────────────────────────────────

proptest! {
    #[test]
    fn selection_matches_first_gpu_or_last_device(platforms in arb_catalog()) {
        let flat: Vec<&DeviceInfo> = platforms.iter().flat_map(|p| &p.devices).collect();
        let expected = flat
            .iter()
            .find(|d| d.class == DeviceClass::Gpu)
            .or_else(|| flat.last())
            .map(|d| d.name.clone());

        match select_device(&platforms) {
            Ok(chosen) => prop_assert_eq!(Some(chosen.name.clone()), expected),
            Err(e) => {
                prop_assert!(expected.is_none());
                prop_assert!(matches!(e, BenchError::NoDevice { .. }), "unexpected error");
            }
        }
    }

    #[test]
    fn gpu_is_chosen_whenever_one_exists(platforms in arb_catalog()) {
        if let Ok(chosen) = select_device(&platforms) {
            let any_gpu = platforms.iter().flat_map(|p| &p.devices).any(|d| d.class == DeviceClass::Gpu);
            prop_assert_eq!(chosen.class == DeviceClass::Gpu, any_gpu);
        }
    }
}

// ── Padding invariants ──────────────────────────────────────────────

proptest! {
    #[test]
    fn global_size_is_minimal_group_multiple(total in 0_usize..=u32::MAX as usize, group in 1_usize..=1024) {
        let global = global_work_size(total, group).unwrap();
        prop_assert_eq!(global % group, 0);
        prop_assert!(global >= total);
        prop_assert!(global - total < group);
    }
}

// ── Lap statistics ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn mean_lies_within_min_and_max(laps in prop::collection::vec(1e-6_f64..10.0, 1..64)) {
        let stats = LapStats::from_laps(&laps);
        prop_assert_eq!(stats.laps, laps.len());
        prop_assert!(stats.min_s <= stats.mean_s + 1e-12);
        prop_assert!(stats.mean_s <= stats.max_s + 1e-12);
        prop_assert!(stats.std_dev_s >= 0.0);
    }

    #[test]
    fn std_dev_is_shift_invariant(
        laps in prop::collection::vec(0.0_f64..1.0, 2..32),
        shift in 0.0_f64..5.0,
    ) {
        let base = LapStats::from_laps(&laps);
        let shifted: Vec<f64> = laps.iter().map(|x| x + shift).collect();
        let moved = LapStats::from_laps(&shifted);
        prop_assert!((base.std_dev_s - moved.std_dev_s).abs() < 1e-9);
        prop_assert!((moved.mean_s - base.mean_s - shift).abs() < 1e-9);
    }
}

// ── Validation ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn validation_finds_first_corruption(
        n in 1_usize..512,
        seed in any::<u64>(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..4),
    ) {
        let (a, b) = generate_inputs(n, seed);
        let mut c = reference_sum(&a, &b);
        prop_assert!(validate(&a, &b, &c).is_ok());

        let mut first = usize::MAX;
        for pick in &picks {
            let i = pick.index(n);
            c[i] += 1.0;
            first = first.min(i);
        }
        match validate(&a, &b, &c) {
            Err(BenchError::ResultMismatch { index, .. }) => prop_assert_eq!(index, first),
            other => prop_assert!(false, "expected mismatch, got {:?}", other),
        }
    }
}
