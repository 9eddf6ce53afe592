use edgefirst_schemas::builtin_interfaces::Time;
use edgefirst_schemas::std_msgs::Header;
use joints::JointCommand;
use motion::{PathPoint, PlannedPath};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// sensor_msgs/JointState
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JointState {
    pub header: Header,
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

impl Default for JointState {
    fn default() -> Self {
        Self {
            header: empty_header(),
            name: Vec::new(),
            position: Vec::new(),
            velocity: Vec::new(),
            effort: Vec::new(),
        }
    }
}

/// std_msgs/String
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StringMsg {
    pub data: String,
}

/// builtin_interfaces/Duration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct RosDuration {
    pub sec: i32,
    pub nanosec: u32,
}

impl RosDuration {
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// trajectory_msgs/JointTrajectoryPoint
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
    pub effort: Vec<f64>,
    pub time_from_start: RosDuration,
}

/// trajectory_msgs/JointTrajectory
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct JointTrajectory {
    pub header: Header,
    pub joint_names: Vec<String>,
    pub points: Vec<JointTrajectoryPoint>,
}

fn empty_header() -> Header {
    Header {
        stamp: Time::new(0, 0),
        frame_id: String::new(),
    }
}

fn now() -> Time {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Time::new(now.as_secs() as i32, now.subsec_nanos())
}

/// Serializes with the little-endian CDR encapsulation header ROS 2 expects.
pub fn encode<T: Serialize>(msg: &T) -> anyhow::Result<Vec<u8>> {
    Ok(cdr::serialize::<_, _, cdr::CdrLe>(msg, cdr::Infinite)?)
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> anyhow::Result<T> {
    Ok(cdr::deserialize(payload)?)
}

pub fn goal_joint_state(command: &JointCommand) -> JointState {
    let mut msg = JointState::default();
    msg.header.stamp = now();
    msg.header.frame_id = "robot_base".to_string();
    msg.name = command.names.clone();
    msg.position = command.positions.clone();
    msg
}

/// Name/position pairs of a feedback message; surplus names or positions
/// are dropped.
pub fn present_positions(msg: &JointState) -> Vec<(String, f64)> {
    msg.name
        .iter()
        .cloned()
        .zip(msg.position.iter().copied())
        .collect()
}

pub fn planned_path(msg: &JointTrajectory) -> PlannedPath {
    PlannedPath {
        joint_names: msg.joint_names.clone(),
        points: msg
            .points
            .iter()
            .map(|p| PathPoint {
                positions: p.positions.clone(),
                velocities: p.velocities.clone(),
                accelerations: p.accelerations.clone(),
                time_from_start: p.time_from_start.as_secs_f64(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joints::JointIndex;

    #[test]
    fn test_goal_joint_state_over_cdr() {
        let index = JointIndex::open_manipulator();
        let command = JointCommand::from_slots(&index, &[0.1, 0.2, 0.3, 0.4, -1.3]);

        let payload = encode(&goal_joint_state(&command)).unwrap();
        assert_eq!(&payload[..4], &[0x00, 0x01, 0x00, 0x00]);

        let decoded: JointState = decode(&payload).unwrap();
        assert_eq!(decoded.name, command.names);
        assert_eq!(decoded.position, command.positions);
        assert_eq!(decoded.header.frame_id, "robot_base");
    }

    #[test]
    fn test_present_positions_pairs_by_name() {
        let msg = JointState {
            name: vec!["joint1".into(), "grip_joint".into(), "extra".into()],
            position: vec![0.5, -0.2],
            ..Default::default()
        };
        assert_eq!(
            present_positions(&msg),
            vec![("joint1".to_string(), 0.5), ("grip_joint".to_string(), -0.2)]
        );
    }

    #[test]
    fn test_planned_path_conversion() {
        let msg = JointTrajectory {
            header: empty_header(),
            joint_names: vec!["joint1".into(), "joint2".into()],
            points: vec![
                JointTrajectoryPoint {
                    positions: vec![0.0, 0.0],
                    ..Default::default()
                },
                JointTrajectoryPoint {
                    positions: vec![0.3, 0.4],
                    velocities: vec![0.0, 0.1],
                    time_from_start: RosDuration { sec: 1, nanosec: 500_000_000 },
                    ..Default::default()
                },
            ],
        };

        let path = planned_path(&msg);
        assert_eq!(path.joint_names, vec!["joint1", "joint2"]);
        assert_eq!(path.points.len(), 2);
        assert!((path.duration() - 1.5).abs() < 1e-12);
        assert_eq!(path.points[1].velocities, vec![0.0, 0.1]);
    }

    #[test]
    fn test_string_over_cdr() {
        let payload = encode(&StringMsg { data: "grip_on".into() }).unwrap();
        let decoded: StringMsg = decode(&payload).unwrap();
        assert_eq!(decoded.data, "grip_on");
    }
}
