//! Time-sampled joint position table.

use crate::error::{MotionError, Result};
use crate::minimum_jerk::check_interval;
use nalgebra::DMatrix;

/// Positions for every joint slot at every control step.
///
/// Stored slot-major (one matrix column per step) so a step is a contiguous
/// slice. Every step has the same width and there is at least one step.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBuffer {
    data: DMatrix<f64>,
    interval: f64,
}

impl TrajectoryBuffer {
    /// A buffer of `steps` rows all equal to `base`.
    pub fn hold(base: &[f64], steps: usize, interval: f64) -> Result<Self> {
        check_interval(interval)?;
        if steps == 0 {
            return Err(MotionError::malformed("trajectory needs at least one step"));
        }
        if base.is_empty() {
            return Err(MotionError::DimensionMismatch { expected: 1, actual: 0 });
        }

        Ok(Self {
            data: DMatrix::from_fn(base.len(), steps, |slot, _| base[slot]),
            interval,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>], interval: f64) -> Result<Self> {
        let first = rows
            .first()
            .ok_or_else(|| MotionError::malformed("trajectory needs at least one step"))?;
        let mut buffer = Self::hold(first, rows.len(), interval)?;
        for (step, row) in rows.iter().enumerate().skip(1) {
            if row.len() != first.len() {
                return Err(MotionError::DimensionMismatch {
                    expected: first.len(),
                    actual: row.len(),
                });
            }
            buffer.data.column_mut(step).copy_from_slice(row);
        }
        Ok(buffer)
    }

    pub fn set(&mut self, step: usize, slot: usize, position: f64) {
        self.data[(slot, step)] = position;
    }

    /// Overwrites one slot over the whole trajectory.
    pub fn set_slot(&mut self, slot: usize, samples: &[f64]) -> Result<()> {
        if samples.len() != self.steps() {
            return Err(MotionError::DimensionMismatch {
                expected: self.steps(),
                actual: samples.len(),
            });
        }
        self.data.row_mut(slot).iter_mut().zip(samples).for_each(|(dst, src)| *dst = *src);
        Ok(())
    }

    pub fn steps(&self) -> usize {
        self.data.ncols()
    }

    pub fn width(&self) -> usize {
        self.data.nrows()
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Time from the first to the last sample.
    pub fn duration(&self) -> f64 {
        (self.steps() - 1) as f64 * self.interval
    }

    pub fn row(&self, step: usize) -> &[f64] {
        let width = self.width();
        &self.data.as_slice()[step * width..(step + 1) * width]
    }

    pub fn last_row(&self) -> &[f64] {
        self.row(self.steps() - 1)
    }
}
