//! Integration tests for the 4-parameter alignment adjustment.
//!
//! Validates:
//! - exact recovery of shift and yaw from noise-free observations,
//! - the 10-target circle scenario (parameters, redundancy, global test),
//! - exact observations keep the a-priori stochastic model,
//! - variance write-back into the observation set,
//! - too few targets are rejected before any iteration,
//! - coincident targets cannot separate yaw from shift.

use anyhow::Result;
use rts_adjust::{fit_alignment, AdjustError, AdjustOptions};
use rts_core::synthetic::noise::PolarNoise;
use rts_core::synthetic::scenes::{circle_targets, rigid_observations};
use rts_core::{ObservationSet, Pt3, Real, StationPose, VarianceConfig, Vec3};

fn observation_set(targets: &[Pt3], shift: Vec3, yaw: Real, variances: VarianceConfig) -> ObservationSet {
    ObservationSet::new(
        rigid_observations(targets, shift, yaw, 0.5),
        variances,
        StationPose::default(),
    )
    .unwrap()
}

#[test]
fn circle_scenario_recovers_shift_and_yaw() -> Result<()> {
    let targets = circle_targets(10, 5.0, Pt3::origin());
    let mut set = observation_set(
        &targets,
        Vec3::new(1.0, 2.0, 0.5),
        0.3,
        VarianceConfig::default(),
    );

    let fit = fit_alignment(&targets, &mut set, &AdjustOptions::default())?;
    let p = fit.parameters;
    let expected = [1.0, 2.0, 0.5, 0.3];
    for (got, want) in [p.x, p.y, p.z, p.phi].iter().zip(expected) {
        assert!((got - want).abs() < 1e-4, "got {got}, want {want}");
    }

    let adj = &fit.adjustment;
    assert_eq!(adj.redundancy, 26);
    assert!(adj.converged);
    assert!(adj.history[0].global_test.passed, "{:?}", adj.history[0]);
    Ok(())
}

#[test]
fn noise_free_recovery_is_exact() -> Result<()> {
    let mut targets = circle_targets(8, 12.0, Pt3::new(3.0, -4.0, 0.0));
    targets.extend(circle_targets(8, 25.0, Pt3::new(0.0, 0.0, 3.0)));
    let shift = Vec3::new(-7.5, 11.25, 1.8);
    let yaw = -0.8;
    let mut set = observation_set(&targets, shift, yaw, VarianceConfig::default());

    let fit = fit_alignment(&targets, &mut set, &AdjustOptions::default())?;
    assert!((fit.parameters.shift() - shift).norm() < 1e-6);
    assert!((fit.parameters.phi - yaw).abs() < 1e-6);
    assert!(fit.std_devs.x.is_finite());

    // residuals at roundoff level leave nothing to rescale
    let adj = &fit.adjustment;
    assert_eq!(adj.history.len(), 1, "{:?}", adj.history);
    assert!(adj.variance_factor < 1e-10);
    assert_eq!(adj.variance_scale, 1.0);
    assert_eq!(set.variance_config(), &VarianceConfig::default());
    Ok(())
}

#[test]
fn variance_scale_is_written_back() -> Result<()> {
    let targets = {
        let mut t = circle_targets(15, 10.0, Pt3::origin());
        t.extend(circle_targets(15, 30.0, Pt3::new(0.0, 0.0, 4.0)));
        t
    };
    let mut raw = rigid_observations(&targets, Vec3::new(2.0, 1.0, 0.0), 0.5, 0.5);
    PolarNoise {
        seed: 11,
        distance_std_dev: 2e-3,
        angle_std_dev: 2e-5,
    }
    .apply_all(&mut raw);

    let initial = VarianceConfig::from_std_devs(1e-3, 0.0, 1e-5);
    let mut set = ObservationSet::new(raw, initial, StationPose::default())?;
    let fit = fit_alignment(&targets, &mut set, &AdjustOptions::default())?;

    let scale = fit.adjustment.variance_scale;
    assert!(scale > 1.0, "scale {scale}");
    let updated = set.variance_config();
    assert!((updated.distance_variance / initial.distance_variance - scale).abs() < 1e-9 * scale);
    assert!((updated.angle_variance / initial.angle_variance - scale).abs() < 1e-9 * scale);
    Ok(())
}

#[test]
fn single_target_has_no_redundancy() {
    let targets = vec![Pt3::new(4.0, 1.0, 0.0)];
    let mut set = observation_set(&targets, Vec3::zeros(), 0.0, VarianceConfig::default());
    let err = fit_alignment(&targets, &mut set, &AdjustOptions::default()).unwrap_err();
    assert!(
        matches!(
            err,
            AdjustError::InsufficientRedundancy {
                equations: 3,
                parameters: 4
            }
        ),
        "{err}"
    );
}

#[test]
fn coincident_targets_are_degenerate() {
    let targets = vec![Pt3::new(4.0, 1.0, 0.5); 6];
    let mut set = observation_set(
        &targets,
        Vec3::new(1.0, -2.0, 0.0),
        0.4,
        VarianceConfig::default(),
    );
    let err = fit_alignment(&targets, &mut set, &AdjustOptions::default()).unwrap_err();
    assert!(matches!(err, AdjustError::DegenerateGeometry(_)), "{err}");
}
