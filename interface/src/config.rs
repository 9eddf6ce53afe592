//! Controller configuration, read from a TOML file.
//!
//! Every field has a default matching the open manipulator deployment, so an
//! empty file (or no file at all) gives a working controller.

use joints::{JointError, JointIndex};
use motion::minimum_jerk::step_count;
use motion::{GripperSettings, ResampleMode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub control: ControlConfig,
    pub joints: JointsConfig,
    pub gripper: GripperConfig,
    pub planner: PlannerConfig,
    pub topics: TopicConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Tick rate of the playback loop.
    pub frequency_hz: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { frequency_hz: 25.0 }
    }
}

impl ControlConfig {
    pub fn interval(&self) -> f64 {
        1.0 / self.frequency_hz
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JointsConfig {
    pub arm: Vec<String>,
    pub gripper: String,
}

impl Default for JointsConfig {
    fn default() -> Self {
        Self {
            arm: ["joint1", "joint2", "joint3", "joint4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            gripper: "grip_joint".to_string(),
        }
    }
}

impl JointsConfig {
    pub fn index(&self) -> Result<JointIndex, JointError> {
        JointIndex::new(self.arm.as_slice(), &self.gripper)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GripperConfig {
    pub on_position_deg: f64,
    pub off_position_deg: f64,
    pub move_time: f64,
}

impl Default for GripperConfig {
    fn default() -> Self {
        Self {
            on_position_deg: -75.0,
            off_position_deg: 0.0,
            move_time: 2.0,
        }
    }
}

impl GripperConfig {
    pub fn settings(&self) -> GripperSettings {
        GripperSettings {
            on_position: self.on_position_deg.to_radians(),
            off_position: self.off_position_deg.to_radians(),
            move_time: self.move_time,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub settle_delay_ms: u64,
    pub resample: ResampleMode,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            resample: ResampleMode::PerWaypoint,
        }
    }
}

impl PlannerConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub goal_joint_states: String,
    pub present_joint_states: String,
    pub gripper: String,
    pub planned_path: String,
    pub planner_status: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            goal_joint_states: "rt/open_manipulator/goal_joint_states".to_string(),
            present_joint_states: "rt/open_manipulator/present_joint_states".to_string(),
            gripper: "rt/open_manipulator/gripper".to_string(),
            planned_path: "rt/move_group/planned_path".to_string(),
            planner_status: "rt/move_group/status".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let hz = self.control.frequency_hz;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "control.frequency_hz must be positive, got {hz}"
            )));
        }
        let move_time = self.gripper.move_time;
        step_count(move_time, self.control.interval())
            .map_err(|e| ConfigError::Invalid(format!("gripper.move_time: {e}")))?;
        self.joints
            .index()
            .map_err(|e| ConfigError::Invalid(format!("joints: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ControllerConfig::from_toml_str("").unwrap();
        assert_eq!(config.control.frequency_hz, 25.0);
        assert!((config.control.interval() - 0.04).abs() < 1e-12);
        assert_eq!(config.joints.arm.len(), 4);
        assert_eq!(config.planner.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.planner.resample, ResampleMode::PerWaypoint);

        let settings = config.gripper.settings();
        assert!((settings.on_position - (-75.0f64).to_radians()).abs() < 1e-12);
        assert_eq!(settings.move_time, 2.0);
    }

    #[test]
    fn test_partial_override() {
        let config = ControllerConfig::from_toml_str(
            r#"
[control]
frequency_hz = 10.0

[joints]
arm = ["shoulder", "elbow"]
gripper = "claw"

[planner]
resample = "timed"
settle_delay_ms = 0

[topics]
gripper = "rt/claw/command"
"#,
        )
        .unwrap();

        assert!((config.control.interval() - 0.1).abs() < 1e-12);
        assert_eq!(config.planner.resample, ResampleMode::Timed);
        assert!(config.planner.settle_delay().is_zero());
        assert_eq!(config.topics.gripper, "rt/claw/command");
        assert_eq!(config.topics.planned_path, "rt/move_group/planned_path");

        let index = config.joints.index().unwrap();
        assert_eq!(index.slot("claw"), Some(2));
        assert_eq!(config.gripper.move_time, 2.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = ControllerConfig::from_toml_str("[control]\nfrequency_hz = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ControllerConfig::from_toml_str("[gripper]\nmove_time = -2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ControllerConfig::from_toml_str("[gripper]\nmove_time = 1e7\n").unwrap_err();
        assert!(err.to_string().contains("gripper.move_time"));

        let err = ControllerConfig::from_toml_str("[joints]\narm = [\"a\", \"a\"]\n").unwrap_err();
        assert!(err.to_string().contains("joint name used twice"));

        let err = ControllerConfig::from_toml_str("[control]\nfrequency_hz = \"fast\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ControllerConfig::load("/nonexistent/controller.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
