use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

pub mod command;

pub use command::JointCommand;

/// Boundary state of a single joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl Default for JointState {
    fn default() -> Self {
        Self {
            position: 0.0,
            velocity: 0.0,
            acceleration: 0.0,
        }
    }
}

impl JointState {
    pub fn at_rest(position: f64) -> Self {
        Self { position, ..Default::default() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JointError {
    #[error("joint name used twice: {0}")]
    DuplicateJoint(String),

    #[error("an arm needs at least one joint")]
    EmptyArm,
}

/// Which part of the manipulator a motion drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointSubset {
    Arm,
    Gripper,
}

/// Fixed mapping from joint name to slot.
///
/// Arm joints occupy `[0, arm_len)` in declaration order and the gripper
/// takes the slot right after them. Built once at startup and shared behind
/// an `Arc`; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct JointIndex {
    names: Vec<String>,
    slots: HashMap<String, usize>,
    arm_len: usize,
}

impl JointIndex {
    pub fn new<S: AsRef<str>>(arm: &[S], gripper: &str) -> Result<Self, JointError> {
        if arm.is_empty() {
            return Err(JointError::EmptyArm);
        }

        let mut names = Vec::with_capacity(arm.len() + 1);
        let mut slots = HashMap::with_capacity(arm.len() + 1);
        for name in arm.iter().map(AsRef::as_ref).chain(std::iter::once(gripper)) {
            if slots.insert(name.to_string(), names.len()).is_some() {
                return Err(JointError::DuplicateJoint(name.to_string()));
            }
            names.push(name.to_string());
        }

        Ok(Self {
            names,
            slots,
            arm_len: arm.len(),
        })
    }

    /// The four-joint arm plus gripper of the default deployment.
    pub fn open_manipulator() -> Self {
        const NAMES: [&str; 5] = ["joint1", "joint2", "joint3", "joint4", "grip_joint"];
        Self {
            names: NAMES.iter().map(|s| s.to_string()).collect(),
            slots: NAMES
                .iter()
                .enumerate()
                .map(|(slot, s)| (s.to_string(), slot))
                .collect(),
            arm_len: NAMES.len() - 1,
        }
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Slot of an arm joint; the gripper name yields `None`.
    pub fn arm_slot(&self, name: &str) -> Option<usize> {
        self.slot(name).filter(|&slot| slot < self.arm_len)
    }

    pub fn name(&self, slot: usize) -> Option<&str> {
        self.names.get(slot).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn arm_len(&self) -> usize {
        self.arm_len
    }

    pub fn gripper_slot(&self) -> usize {
        self.arm_len
    }

    /// Total slot count, arm plus gripper.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn subset_slots(&self, subset: JointSubset) -> Range<usize> {
        match subset {
            JointSubset::Arm => 0..self.arm_len,
            JointSubset::Gripper => self.arm_len..self.arm_len + 1,
        }
    }
}
