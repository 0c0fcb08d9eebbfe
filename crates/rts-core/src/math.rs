use nalgebra::{Point3, Vector3};
use std::f64::consts::{PI, TAU};

pub type Real = f64;

pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;

/// Offset of a polar sample relative to the instrument, in the instrument's
/// horizontal frame.
///
/// `x = d·sin(v)·sin(h)`, `y = d·sin(v)·cos(h)`, `z = d·cos(v)`: the horizontal
/// angle runs clockwise from the y axis and the vertical angle is a zenith
/// angle.
#[inline]
pub fn polar_to_local(distance: Real, horizontal: Real, vertical: Real) -> Vec3 {
    let (sin_h, cos_h) = horizontal.sin_cos();
    let (sin_v, cos_v) = vertical.sin_cos();
    Vec3::new(
        distance * sin_v * sin_h,
        distance * sin_v * cos_h,
        distance * cos_v,
    )
}

/// Inverse of [`polar_to_local`]: returns `(distance, horizontal, vertical)`.
///
/// The horizontal angle is returned in `(-π, π]`.
pub fn local_to_polar(offset: &Vec3) -> (Real, Real, Real) {
    let distance = offset.norm();
    let horizontal = offset.x.atan2(offset.y);
    let vertical = if distance > 0.0 {
        (offset.z / distance).clamp(-1.0, 1.0).acos()
    } else {
        0.0
    };
    (distance, horizontal, vertical)
}

/// Remove 2π discontinuities from an angle sequence.
///
/// Consecutive jumps larger than π are folded by multiples of 2π, so the
/// result is continuous. The first element is returned unchanged.
pub fn unwrap_angles(angles: &[Real]) -> Vec<Real> {
    let mut out = Vec::with_capacity(angles.len());
    let Some(&first) = angles.first() else {
        return out;
    };
    out.push(first);

    let mut correction = 0.0;
    for pair in angles.windows(2) {
        let diff = pair[1] - pair[0];
        let mut folded = (diff + PI).rem_euclid(TAU) - PI;
        if folded == -PI && diff > 0.0 {
            folded = PI;
        }
        if diff.abs() >= PI {
            correction += folded - diff;
        }
        out.push(pair[1] + correction);
    }
    out
}

/// Rate of change between consecutive samples.
///
/// `rate[i] = (values[i + 1] - values[i]) / (times[i + 1] - times[i])`; the last
/// sample has no successor and its rate is defined as zero.
pub fn consecutive_rates(values: &[Real], times: &[Real]) -> Vec<Real> {
    debug_assert_eq!(values.len(), times.len());
    let mut rates: Vec<Real> = values
        .windows(2)
        .zip(times.windows(2))
        .map(|(v, t)| (v[1] - v[0]) / (t[1] - t[0]))
        .collect();
    if !values.is_empty() {
        rates.push(0.0);
    }
    rates
}

/// Angular velocity of an angle sequence sampled at `times`.
///
/// The angles are unwrapped before differencing.
pub fn angular_rates(angles: &[Real], times: &[Real]) -> Vec<Real> {
    consecutive_rates(&unwrap_angles(angles), times)
}

/// Whether the time span of `times` intersects the span of `reference`.
///
/// Both slices must be sorted in ascending order.
pub fn has_overlap(reference: &[Real], times: &[Real]) -> bool {
    match (reference.first(), reference.last(), times.first(), times.last()) {
        (Some(&ref_start), Some(&ref_end), Some(&start), Some(&end)) => {
            start <= ref_end && end >= ref_start
        }
        _ => false,
    }
}

/// Piecewise-linear interpolation of `(xs, ys)` at `x`.
///
/// `xs` must be sorted ascending. Queries outside the sampled range clamp to
/// the first/last value.
pub fn interpolate_linear(xs: &[Real], ys: &[Real], x: Real) -> Real {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert!(!xs.is_empty());

    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }

    // first index with xs[idx] > x; guaranteed in 1..=last by the checks above
    let idx = xs.partition_point(|&xi| xi <= x);
    let (x0, x1) = (xs[idx - 1], xs[idx]);
    let (y0, y1) = (ys[idx - 1], ys[idx]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
