//! Integration tests for `ObservationSet` construction and corrections.
//!
//! Validates:
//! - first-occurrence deduplication on unsorted input,
//! - clock synchronisation without drift reduces to a constant shift,
//! - intrinsic delay correction brings a delayed ring scan back onto the ring,
//! - exporting corrected samples keeps everything but the corrected fields.

use rts_core::synthetic::noise::PolarNoise;
use rts_core::synthetic::scenes::RingScan;
use rts_core::{
    IdentityFrames, Observation, ObservationSet, Real, StationPose, VarianceConfig,
};

fn ring_set(scan: &RingScan) -> ObservationSet {
    ObservationSet::new(
        scan.observations(),
        VarianceConfig::default(),
        StationPose::default(),
    )
    .unwrap()
}

fn max_deviation(set: &ObservationSet, scan: &RingScan) -> Real {
    let xyz = set.xyz(&IdentityFrames).unwrap();
    xyz.iter()
        .zip(scan.true_positions())
        .map(|(p, t)| (p - t).norm())
        .fold(0.0, Real::max)
}

#[test]
fn duplicates_keep_first_occurrence() {
    let mut raw = Vec::new();
    for i in 0..20 {
        let t = (i % 10) as Real;
        raw.push(Observation {
            geocom_return_code: i,
            ..Observation::polar(t, 10.0 + i as Real, 0.1, 1.5)
        });
    }
    raw.reverse();

    let set = ObservationSet::new(raw, VarianceConfig::default(), StationPose::default()).unwrap();
    assert_eq!(set.len(), 10);
    let ts = set.sensor_timestamps();
    assert!(ts.windows(2).all(|w| w[0] < w[1]), "timestamps {ts:?}");
    // after reversing, the later index of each timestamp comes first
    for (k, obs) in set.observations().iter().enumerate() {
        assert_eq!(obs.geocom_return_code, k as i32 + 10);
    }
}

#[test]
fn sync_without_drift_is_a_constant_shift() {
    let scan = RingScan::default();
    let mut raw = scan.observations();
    for obs in &mut raw {
        obs.controller_timestamp = obs.sensor_timestamp + 1_700_000_000.25;
    }
    let mut set = ObservationSet::new(raw, VarianceConfig::default(), StationPose::default()).unwrap();
    let before = set.sensor_timestamps();

    let external_delay = 0.012;
    let sync = set.sync_sensor_time(115_200.0, external_delay).unwrap();
    let shift = sync.intercept - external_delay;
    assert!((sync.intercept - 1_700_000_000.25).abs() < 1e-5);

    for (b, a) in before.iter().zip(set.sensor_timestamps()) {
        assert!((a - b - shift).abs() < 1e-5, "{a} vs {b}");
    }
}

#[test]
fn intrinsic_delay_correction_reduces_ring_deviation() {
    let scan = RingScan {
        delay: 0.03,
        ..RingScan::default()
    };
    let mut set = ring_set(&scan);
    let raw_deviation = max_deviation(&set, &scan);

    let report = set.apply_intrinsic_delay(scan.delay);
    assert!(report.converged, "{report:?}");
    let corrected_deviation = max_deviation(&set, &scan);
    assert!(
        corrected_deviation < 0.1 * raw_deviation,
        "raw {raw_deviation}, corrected {corrected_deviation}"
    );
}

#[test]
fn zero_delay_leaves_noisy_scan_bit_identical() {
    let scan = RingScan::default();
    let mut raw = scan.observations();
    PolarNoise {
        seed: 3,
        distance_std_dev: 1e-3,
        angle_std_dev: 1e-4,
    }
    .apply_all(&mut raw);
    let mut set = ObservationSet::new(raw, VarianceConfig::default(), StationPose::default()).unwrap();
    let before = set.to_observations();

    set.apply_intrinsic_delay(0.0);
    let after = set.to_observations();
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.horizontal_angle.to_bits(), a.horizontal_angle.to_bits());
        assert_eq!(b.vertical_angle.to_bits(), a.vertical_angle.to_bits());
        assert_eq!(b.sensor_timestamp.to_bits(), a.sensor_timestamp.to_bits());
    }
}

#[test]
fn corrected_samples_export_with_bookkeeping() {
    let scan = RingScan {
        delay: 0.02,
        samples: 30,
        ..RingScan::default()
    };
    let raw: Vec<Observation> = scan
        .observations()
        .into_iter()
        .map(|o| Observation {
            station_id: 4,
            job_id: 9,
            response_length: 20,
            ..o
        })
        .collect();
    let mut set = ObservationSet::new(raw.clone(), VarianceConfig::default(), StationPose::default())
        .unwrap();
    set.apply_intrinsic_delay(scan.delay);

    let exported = set.to_observations();
    assert_eq!(exported.len(), raw.len());
    for (e, r) in exported.iter().zip(&raw) {
        assert_eq!(e.distance, r.distance);
        assert_eq!(e.station_id, 4);
        assert_eq!(e.job_id, 9);
        assert_eq!(e.response_length, 20);
    }
    assert!(exported
        .iter()
        .zip(&raw)
        .any(|(e, r)| e.horizontal_angle != r.horizontal_angle));
}
