//! Minimum-jerk (quintic) interpolation between two boundary states.

use crate::error::{MotionError, Result};
use joints::JointState;

/// Relative slack when snapping a duration onto the tick grid, so that
/// `2.0 / 0.1` counts as 20 intervals rather than 19.999...
const GRID_TOLERANCE: f64 = 1e-9;

/// Longest motion, in samples, a single buffer may hold. About 11.6 hours
/// at 25 Hz.
pub const MAX_STEPS: usize = 1 << 20;

pub(crate) fn check_interval(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(MotionError::InvalidInterval(dt))
    }
}

pub(crate) fn check_duration(duration: f64) -> Result<()> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(MotionError::InvalidDuration(duration))
    }
}

/// Number of samples a motion of `duration` seconds occupies at `dt`:
/// `floor(duration / dt) + 1`, counted with a relative tolerance of
/// `GRID_TOLERANCE`.
///
/// This differs from the legacy count, which floors the raw quotient: there
/// `0.3 / 0.1` floors to 2 intervals (3 samples), here it counts as 3
/// intervals (4 samples). Durations that land on the grid are no longer cut
/// a tick short by float error.
///
/// Durations needing more than [`MAX_STEPS`] samples are `InvalidDuration`.
pub fn step_count(duration: f64, dt: f64) -> Result<usize> {
    check_interval(dt)?;
    check_duration(duration)?;
    let intervals = (duration / dt * (1.0 + GRID_TOLERANCE)).floor();
    if !intervals.is_finite() || intervals >= MAX_STEPS as f64 {
        return Err(MotionError::InvalidDuration(duration));
    }
    (intervals as usize)
        .checked_add(1)
        .ok_or(MotionError::InvalidDuration(duration))
}

/// Duration actually covered once `duration` is snapped onto the tick grid.
/// Never longer than the request.
pub fn effective_duration(duration: f64, dt: f64) -> Result<f64> {
    Ok((step_count(duration, dt)? - 1) as f64 * dt)
}

/// Quintic polynomial matching position, velocity and acceleration at both
/// ends of `[0, duration]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuinticSegment {
    coeffs: [f64; 6],
    duration: f64,
    end: JointState,
}

impl QuinticSegment {
    pub fn new(start: JointState, end: JointState, duration: f64) -> Self {
        let t = duration;
        let mut coeffs = [
            start.position,
            start.velocity,
            start.acceleration / 2.0,
            0.0,
            0.0,
            0.0,
        ];

        if t > 0.0 {
            let (t2, t3) = (t * t, t * t * t);
            let h = end.position - start.position - start.velocity * t - start.acceleration * t2 / 2.0;
            let (v0, v1) = (start.velocity, end.velocity);
            let (a0, a1) = (start.acceleration, end.acceleration);

            coeffs[3] = (20.0 * h - (8.0 * v1 + 12.0 * v0) * t - (3.0 * a0 - a1) * t2) / (2.0 * t3);
            coeffs[4] = (-30.0 * h + (14.0 * v1 + 16.0 * v0) * t + (3.0 * a0 - 2.0 * a1) * t2)
                / (2.0 * t3 * t);
            coeffs[5] = (12.0 * h - 6.0 * (v1 + v0) * t + (a1 - a0) * t2) / (2.0 * t3 * t2);
        }

        Self {
            coeffs,
            duration: t.max(0.0),
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn position(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return self.end.position;
        }
        let c = &self.coeffs;
        c[0] + t * (c[1] + t * (c[2] + t * (c[3] + t * (c[4] + t * c[5]))))
    }

    pub fn velocity(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return self.end.velocity;
        }
        let c = &self.coeffs;
        c[1] + t * (2.0 * c[2] + t * (3.0 * c[3] + t * (4.0 * c[4] + t * 5.0 * c[5])))
    }

    pub fn acceleration(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return self.end.acceleration;
        }
        let c = &self.coeffs;
        2.0 * c[2] + t * (6.0 * c[3] + t * (12.0 * c[4] + t * 20.0 * c[5]))
    }
}

/// Samples a minimum-jerk move from `start` to `end` every `dt` seconds.
///
/// The move is stretched over the effective duration (see
/// [`effective_duration`]), so the result holds exactly
/// `floor(duration / dt) + 1` samples. The first sample is `start.position`
/// and the last is `end.position`, bit for bit. A zero duration gives the
/// single sample `end.position`.
pub fn generate(start: JointState, end: JointState, dt: f64, duration: f64) -> Result<Vec<f64>> {
    let steps = step_count(duration, dt)?;
    if steps == 1 {
        return Ok(vec![end.position]);
    }

    let segment = QuinticSegment::new(start, end, (steps - 1) as f64 * dt);
    let mut samples: Vec<f64> = (0..steps).map(|i| segment.position(i as f64 * dt)).collect();
    samples[0] = start.position;
    samples[steps - 1] = end.position;
    Ok(samples)
}
