//! Planner-supplied multi-waypoint trajectories.

use joints::JointState;

/// One waypoint of a planned path. The arrays run parallel to
/// [`PlannedPath::joint_names`]; empty velocity or acceleration arrays mean
/// zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
    /// Seconds since the start of the path.
    pub time_from_start: f64,
}

impl PathPoint {
    pub fn at(time_from_start: f64, positions: Vec<f64>) -> Self {
        Self {
            positions,
            time_from_start,
            ..Default::default()
        }
    }

    pub fn state(&self, column: usize) -> JointState {
        JointState {
            position: self.positions[column],
            velocity: self.velocities.get(column).copied().unwrap_or(0.0),
            acceleration: self.accelerations.get(column).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannedPath {
    pub joint_names: Vec<String>,
    pub points: Vec<PathPoint>,
}

impl PlannedPath {
    pub fn new<S: Into<String>>(joint_names: impl IntoIterator<Item = S>, points: Vec<PathPoint>) -> Self {
        Self {
            joint_names: joint_names.into_iter().map(Into::into).collect(),
            points,
        }
    }

    /// Time stamp of the last waypoint, or zero for an empty path.
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time_from_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_defaults_missing_derivatives() {
        let mut point = PathPoint::at(0.5, vec![0.1, 0.2]);
        point.velocities = vec![1.0, 2.0];

        let state = point.state(1);
        assert_eq!(state.position, 0.2);
        assert_eq!(state.velocity, 2.0);
        assert_eq!(state.acceleration, 0.0);
    }

    #[test]
    fn test_duration() {
        let path = PlannedPath::new(
            ["joint1"],
            vec![PathPoint::at(0.0, vec![0.0]), PathPoint::at(1.25, vec![1.0])],
        );
        assert_eq!(path.duration(), 1.25);
        assert_eq!(PlannedPath::default().duration(), 0.0);
    }
}
