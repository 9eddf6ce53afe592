//! Turns planner waypoints into a fixed-interval trajectory buffer.

use crate::buffer::TrajectoryBuffer;
use crate::error::{MotionError, Result};
use crate::minimum_jerk::{QuinticSegment, check_interval, step_count};
use crate::path::{PathPoint, PlannedPath};
use joints::JointIndex;
use serde::Deserialize;
use std::sync::Arc;

/// How waypoints map onto control steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    /// One step per waypoint, timing ignored. Playback speed only matches
    /// the planner when its waypoints are already spaced one tick apart.
    #[default]
    PerWaypoint,
    /// One step per tick, interpolating a quintic between neighbouring
    /// waypoints.
    Timed,
}

#[derive(Debug, Clone)]
pub struct WaypointResampler {
    index: Arc<JointIndex>,
    mode: ResampleMode,
}

impl WaypointResampler {
    pub fn new(index: Arc<JointIndex>, mode: ResampleMode) -> Self {
        Self { index, mode }
    }

    pub fn mode(&self) -> ResampleMode {
        self.mode
    }

    /// Builds a full-width buffer from `path`. Slots the path does not name
    /// keep their value from `base`.
    pub fn resample(&self, path: &PlannedPath, base: &[f64], dt: f64) -> Result<TrajectoryBuffer> {
        check_interval(dt)?;
        if base.len() != self.index.len() {
            return Err(MotionError::DimensionMismatch {
                expected: self.index.len(),
                actual: base.len(),
            });
        }
        let slots = self.validate(path)?;

        match self.mode {
            ResampleMode::PerWaypoint => per_waypoint(path, &slots, base, dt),
            ResampleMode::Timed => timed(path, &slots, base, dt),
        }
    }

    /// Structural checks only: names, array shapes and, in timed mode, time
    /// stamps. No buffer is built.
    pub fn check(&self, path: &PlannedPath) -> Result<()> {
        self.validate(path).map(|_| ())
    }

    /// Resolves the path's joint names to slots and checks array shapes.
    fn validate(&self, path: &PlannedPath) -> Result<Vec<usize>> {
        if path.points.is_empty() {
            return Err(MotionError::malformed("path has no waypoints"));
        }

        let mut slots = Vec::with_capacity(path.joint_names.len());
        for name in &path.joint_names {
            let slot = self
                .index
                .arm_slot(name)
                .ok_or_else(|| MotionError::malformed(format!("unknown arm joint {name}")))?;
            if slots.contains(&slot) {
                return Err(MotionError::malformed(format!("joint {name} listed twice")));
            }
            slots.push(slot);
        }

        let width = slots.len();
        for (i, point) in path.points.iter().enumerate() {
            let shapes_ok = point.positions.len() == width
                && (point.velocities.is_empty() || point.velocities.len() == width)
                && (point.accelerations.is_empty() || point.accelerations.len() == width);
            if !shapes_ok {
                return Err(MotionError::malformed(format!(
                    "waypoint {i} does not match the {width} named joints"
                )));
            }
        }

        if self.mode == ResampleMode::Timed {
            let mut previous = None;
            for (i, point) in path.points.iter().enumerate() {
                let t = point.time_from_start;
                let ordered = previous.is_none_or(|p| t > p);
                if !t.is_finite() || t < 0.0 || !ordered {
                    return Err(MotionError::malformed(format!(
                        "waypoint {i} time {t} is not strictly increasing"
                    )));
                }
                previous = Some(t);
            }
        }

        Ok(slots)
    }
}

fn copy_point(buffer: &mut TrajectoryBuffer, step: usize, slots: &[usize], point: &PathPoint) {
    for (column, &slot) in slots.iter().enumerate() {
        buffer.set(step, slot, point.positions[column]);
    }
}

fn per_waypoint(path: &PlannedPath, slots: &[usize], base: &[f64], dt: f64) -> Result<TrajectoryBuffer> {
    let mut buffer = TrajectoryBuffer::hold(base, path.points.len(), dt)?;
    for (step, point) in path.points.iter().enumerate() {
        copy_point(&mut buffer, step, slots, point);
    }
    Ok(buffer)
}

fn timed(path: &PlannedPath, slots: &[usize], base: &[f64], dt: f64) -> Result<TrajectoryBuffer> {
    let points = &path.points;
    let steps = step_count(path.duration(), dt)?;
    let mut buffer = TrajectoryBuffer::hold(base, steps, dt)?;

    // Index of the waypoint that opens the current segment and its quintics.
    let mut segment: Option<(usize, Vec<QuinticSegment>)> = None;

    for step in 0..steps {
        let t = step as f64 * dt;

        if t <= points[0].time_from_start || points.len() == 1 {
            copy_point(&mut buffer, step, slots, &points[0]);
            continue;
        }

        let mut k = segment.as_ref().map_or(0, |(k, _)| *k);
        while k + 2 < points.len() && t > points[k + 1].time_from_start {
            k += 1;
        }
        if segment.as_ref().is_none_or(|(open, _)| *open != k) {
            let (from, to) = (&points[k], &points[k + 1]);
            let span = to.time_from_start - from.time_from_start;
            let quintics = (0..slots.len())
                .map(|column| QuinticSegment::new(from.state(column), to.state(column), span))
                .collect();
            segment = Some((k, quintics));
        }

        if let Some((k, quintics)) = &segment {
            let local = (t - points[*k].time_from_start).min(quintics[0].duration());
            for (column, &slot) in slots.iter().enumerate() {
                buffer.set(step, slot, quintics[column].position(local));
            }
        }
    }

    if let Some(last) = points.last() {
        copy_point(&mut buffer, steps - 1, slots, last);
    }
    Ok(buffer)
}
