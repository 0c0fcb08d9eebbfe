//! Variance component estimation on a noisy alignment.
//!
//! The a-priori variances are four times too optimistic. The first pass must
//! report a variance factor close to four, the rescaled second pass a factor
//! of one, and the global test must flip from failing to passing.

use anyhow::Result;
use rts_adjust::{adjust, AdjustOptions, AlignmentModel, SolverOptions, VarianceOptions};
use rts_core::synthetic::noise::PolarNoise;
use rts_core::synthetic::scenes::{circle_targets, rigid_observations};
use rts_core::{ObservationSet, Pt3, StationPose, VarianceConfig, Vec3};

const DISTANCE_STD_DEV: f64 = 1e-3;
const ANGLE_STD_DEV: f64 = 5e-6;
const OPTIMISM: f64 = 4.0;

fn noisy_alignment() -> (Vec<Pt3>, ObservationSet) {
    let mut targets = circle_targets(20, 10.0, Pt3::new(0.0, 0.0, 0.0));
    targets.extend(circle_targets(20, 20.0, Pt3::new(1.0, -2.0, 2.0)));
    targets.extend(circle_targets(20, 30.0, Pt3::new(-3.0, 4.0, 5.0)));

    let mut raw = rigid_observations(&targets, Vec3::new(5.0, -3.0, 1.2), -0.7, 0.5);
    PolarNoise {
        seed: 2024,
        distance_std_dev: DISTANCE_STD_DEV,
        angle_std_dev: ANGLE_STD_DEV,
    }
    .apply_all(&mut raw);

    let optimistic = VarianceConfig::from_std_devs(
        DISTANCE_STD_DEV / OPTIMISM.sqrt(),
        0.0,
        ANGLE_STD_DEV / OPTIMISM.sqrt(),
    );
    let set = ObservationSet::new(raw, optimistic, StationPose::default()).unwrap();
    (targets, set)
}

fn options() -> AdjustOptions {
    AdjustOptions {
        solver: SolverOptions {
            tolerance: Some(1e-11),
            ..SolverOptions::default()
        },
        variance: VarianceOptions::default(),
    }
}

#[test]
fn optimistic_variances_are_rescaled() -> Result<()> {
    let (targets, set) = noisy_alignment();
    let model = AlignmentModel::new(&targets, &set)?;
    let options = options();
    let result = adjust(
        &model,
        &set.variance_vector(),
        &options.solver,
        &options.variance,
    )?;

    assert_eq!(result.redundancy, 3 * 60 - 4);
    assert!(result.history.len() >= 2, "{:?}", result.history);

    let first = result.history[0];
    assert!(
        (first.variance_factor / OPTIMISM - 1.0).abs() < 0.3,
        "first factor {}",
        first.variance_factor
    );
    assert!(!first.global_test.passed);

    let second = result.history[1];
    assert!(
        (second.variance_factor - 1.0).abs() < 1e-3,
        "second factor {}",
        second.variance_factor
    );
    assert!(second.global_test.passed);

    assert!((result.variance_scale - first.variance_factor).abs() < 1e-2 * first.variance_factor);
    let ratio = result.variances.component_div(&set.variance_vector());
    assert!(ratio.iter().all(|r| (r - result.variance_scale).abs() < 1e-9 * r));
    Ok(())
}

#[test]
fn rescaling_keeps_the_estimate() -> Result<()> {
    let (targets, set) = noisy_alignment();
    let model = AlignmentModel::new(&targets, &set)?;
    let options = options();

    let single = adjust(
        &model,
        &set.variance_vector(),
        &options.solver,
        &VarianceOptions {
            max_iterations: 1,
            ..VarianceOptions::default()
        },
    )?;
    let rescaled = adjust(
        &model,
        &set.variance_vector(),
        &options.solver,
        &options.variance,
    )?;

    assert_eq!(single.history.len(), 1);
    assert_eq!(single.variance_scale, 1.0);
    assert!((&single.parameters - &rescaled.parameters).amax() < 1e-9);
    // the covariance follows the variance scale
    let ratio = rescaled.covariance[(0, 0)] / single.covariance[(0, 0)];
    assert!((ratio - rescaled.variance_scale).abs() < 1e-6 * ratio);
    Ok(())
}
