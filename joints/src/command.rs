use crate::JointIndex;

/// Per-joint position targets for one control tick.
///
/// Always covers every joint of the index, arm first, gripper last.
#[derive(Debug, Clone, PartialEq)]
pub struct JointCommand {
    pub names: Vec<String>,
    pub positions: Vec<f64>,
}

impl JointCommand {
    pub fn from_slots(index: &JointIndex, positions: &[f64]) -> Self {
        debug_assert_eq!(index.len(), positions.len());
        Self {
            names: index.names().to_vec(),
            positions: positions.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.positions[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.positions.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
