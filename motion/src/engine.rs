//! Tick-driven trajectory playback.
//!
//! The [`PlaybackEngine`] is owned by the control loop and advanced once per
//! tick. Background regeneration talks to it only through an
//! [`EngineHandle`]: a generation counter, two flags, a single-slot mailbox
//! and a copy of the goal position. The tick side never blocks on any of
//! them.

use crate::buffer::TrajectoryBuffer;
use crate::error::{MotionError, Result};
use crate::minimum_jerk::{check_duration, check_interval, generate, step_count};
use crate::path::PlannedPath;
use crate::resample::{ResampleMode, WaypointResampler};
use joints::{JointCommand, JointIndex, JointState, JointSubset};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    MovingArm,
    MovingGripper,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::MovingArm => write!(f, "arm"),
            Mode::MovingGripper => write!(f, "gripper"),
        }
    }
}

/// A two-endpoint move of one joint subset. `initial` and `target` hold one
/// state per joint of the subset, in slot order.
#[derive(Debug, Clone, PartialEq)]
pub struct PointToPoint {
    pub subset: JointSubset,
    pub initial: Vec<JointState>,
    pub target: Vec<JointState>,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MotionRequest {
    PointToPoint(PointToPoint),
    PlannedPath(PlannedPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripCommand {
    On,
    Off,
}

/// Gripper targets in radians and the time a grip takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripperSettings {
    pub on_position: f64,
    pub off_position: f64,
    pub move_time: f64,
}

impl Default for GripperSettings {
    fn default() -> Self {
        Self {
            on_position: (-75.0f64).to_radians(),
            off_position: 0.0,
            move_time: 2.0,
        }
    }
}

/// Outcome of checking a background result against the current generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Regeneration {
    Fresh(TrajectoryBuffer),
    Stale { token: u64, current: u64 },
}

#[derive(Debug)]
struct Regenerated {
    token: u64,
    buffer: TrajectoryBuffer,
}

#[derive(Debug)]
struct Shared {
    generation: AtomicU64,
    moving: AtomicBool,
    ready: AtomicBool,
    mailbox: Mutex<Option<Regenerated>>,
    goal: Mutex<Vec<f64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Cloneable access to an engine from other threads or tasks.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
    index: Arc<JointIndex>,
    interval: f64,
}

impl EngineHandle {
    /// Claims a new generation, superseding every older token.
    pub fn next_generation(&self) -> u64 {
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn is_moving(&self) -> bool {
        self.shared.moving.load(Ordering::SeqCst)
    }

    /// The planner reports it is executing a plan. Only counts while the
    /// engine is not playing a motion.
    pub fn signal_executing(&self) {
        if !self.is_moving() {
            self.shared.ready.store(true, Ordering::SeqCst);
        }
    }

    /// Consumes the ready flag.
    pub fn take_ready(&self) -> bool {
        self.shared.ready.swap(false, Ordering::SeqCst)
    }

    /// Last goal position published by the tick loop.
    pub fn goal_snapshot(&self) -> Vec<f64> {
        lock(&self.shared.goal).clone()
    }

    /// Leaves a finished buffer for the tick loop, replacing anything not
    /// yet picked up.
    pub fn post(&self, token: u64, buffer: TrajectoryBuffer) {
        let replaced = lock(&self.shared.mailbox).replace(Regenerated { token, buffer });
        if let Some(old) = replaced {
            debug!("Dropping unclaimed regeneration {}", old.token);
        }
    }

    pub fn index(&self) -> &Arc<JointIndex> {
        &self.index
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }
}

/// What the engine is playing right now.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub mode: Mode,
    pub step_cnt: usize,
    pub total_steps: usize,
    pub current_buffer: Option<TrajectoryBuffer>,
}

pub struct PlaybackEngine {
    index: Arc<JointIndex>,
    interval: f64,
    resampler: WaypointResampler,
    gripper: GripperSettings,
    state: PlaybackState,
    goal: Vec<f64>,
    present: Vec<f64>,
    commanded: bool,
    shared: Arc<Shared>,
}

impl PlaybackEngine {
    pub fn new(index: Arc<JointIndex>, interval: f64) -> Result<Self> {
        check_interval(interval)?;
        let width = index.len();
        Ok(Self {
            resampler: WaypointResampler::new(Arc::clone(&index), ResampleMode::default()),
            index,
            interval,
            gripper: GripperSettings::default(),
            state: PlaybackState::default(),
            goal: vec![0.0; width],
            present: vec![0.0; width],
            commanded: false,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                moving: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                mailbox: Mutex::new(None),
                goal: Mutex::new(vec![0.0; width]),
            }),
        })
    }

    pub fn with_gripper(mut self, gripper: GripperSettings) -> Self {
        self.gripper = gripper;
        self
    }

    pub fn with_resample_mode(mut self, mode: ResampleMode) -> Self {
        self.resampler = WaypointResampler::new(Arc::clone(&self.index), mode);
        self
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
            index: Arc::clone(&self.index),
            interval: self.interval,
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn step(&self) -> usize {
        self.state.step_cnt
    }

    pub fn total_steps(&self) -> usize {
        self.state.total_steps
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn goal(&self) -> &[f64] {
        &self.goal
    }

    pub fn present(&self) -> &[f64] {
        &self.present
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub fn index(&self) -> &Arc<JointIndex> {
        &self.index
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Records hardware feedback for one joint. Returns false for names the
    /// index does not know.
    ///
    /// Until the first motion is commanded the goal follows the feedback, so
    /// the hold position at startup is wherever the arm already is.
    pub fn update_present(&mut self, name: &str, position: f64) -> bool {
        let Some(slot) = self.index.slot(name) else {
            return false;
        };
        self.present[slot] = position;
        if !self.commanded {
            self.goal[slot] = position;
        }
        true
    }

    pub fn update_present_all<'a>(&mut self, joints: impl IntoIterator<Item = (&'a str, f64)>) {
        for (name, position) in joints {
            if !self.update_present(name, position) {
                debug!("Ignoring feedback for unknown joint {}", name);
            }
        }
    }

    /// Builds the buffer for `request` and starts playing it, pre-empting any
    /// motion in progress. Returns the generation token of the new motion.
    /// A rejected request leaves the engine untouched.
    pub fn submit(&mut self, request: MotionRequest) -> Result<u64> {
        let (mode, buffer) = match request {
            MotionRequest::PointToPoint(request) => {
                let mode = match request.subset {
                    JointSubset::Arm => Mode::MovingArm,
                    JointSubset::Gripper => Mode::MovingGripper,
                };
                (mode, self.point_to_point(&request)?)
            }
            MotionRequest::PlannedPath(path) => (
                Mode::MovingArm,
                self.resampler.resample(&path, &self.goal, self.interval)?,
            ),
        };

        let token = self.handle().next_generation();
        self.install(mode, buffer);
        Ok(token)
    }

    /// Rest-to-rest move of `subset` from the present position.
    pub fn move_to(&mut self, subset: JointSubset, targets: &[f64], duration: f64) -> Result<u64> {
        let slots = self.index.subset_slots(subset);
        let initial = self.present[slots].iter().copied().map(JointState::at_rest).collect();
        self.submit(MotionRequest::PointToPoint(PointToPoint {
            subset,
            initial,
            target: targets.iter().copied().map(JointState::at_rest).collect(),
            duration,
        }))
    }

    pub fn grip(&mut self, command: GripCommand) -> Result<u64> {
        let target = match command {
            GripCommand::On => self.gripper.on_position,
            GripCommand::Off => self.gripper.off_position,
        };
        self.move_to(JointSubset::Gripper, &[target], self.gripper.move_time)
    }

    /// Advances playback by one step and returns the command for this tick.
    pub fn tick(&mut self) -> JointCommand {
        self.poll_mailbox();

        if let Some(buffer) = &self.state.current_buffer {
            self.goal.copy_from_slice(buffer.row(self.state.step_cnt));
            self.state.step_cnt += 1;
            if self.state.step_cnt >= self.state.total_steps {
                self.finish();
            }
        }

        if let Some(mut snapshot) = try_lock(&self.shared.goal) {
            snapshot.copy_from_slice(&self.goal);
        }

        JointCommand::from_slots(&self.index, &self.goal)
    }

    /// Sorts a background result into fresh or stale against the current
    /// generation.
    pub fn classify(&self, token: u64, buffer: TrajectoryBuffer) -> Regeneration {
        let current = self.generation();
        if token == current {
            Regeneration::Fresh(buffer)
        } else {
            Regeneration::Stale { token, current }
        }
    }

    fn poll_mailbox(&mut self) {
        let Some(regenerated) = try_lock(&self.shared.mailbox).and_then(|mut slot| slot.take()) else {
            return;
        };

        match self.classify(regenerated.token, regenerated.buffer) {
            Regeneration::Fresh(buffer) if buffer.width() == self.index.len() => {
                self.install(Mode::MovingArm, buffer);
            }
            Regeneration::Fresh(buffer) => {
                warn!(
                    "Discarding regenerated trajectory of width {} (expected {})",
                    buffer.width(),
                    self.index.len()
                );
            }
            Regeneration::Stale { token, current } => {
                debug!("{}", MotionError::StaleRegeneration { token, current });
            }
        }
    }

    fn point_to_point(&self, request: &PointToPoint) -> Result<TrajectoryBuffer> {
        let slots = self.index.subset_slots(request.subset);
        for len in [request.initial.len(), request.target.len()] {
            if len != slots.len() {
                return Err(MotionError::DimensionMismatch {
                    expected: slots.len(),
                    actual: len,
                });
            }
        }
        check_duration(request.duration)?;

        let steps = step_count(request.duration, self.interval)?;
        let mut buffer = TrajectoryBuffer::hold(&self.goal, steps, self.interval)?;
        for (column, slot) in slots.enumerate() {
            let samples = generate(
                request.initial[column],
                request.target[column],
                self.interval,
                request.duration,
            )?;
            buffer.set_slot(slot, &samples)?;
        }
        Ok(buffer)
    }

    fn install(&mut self, mode: Mode, buffer: TrajectoryBuffer) {
        if self.state.mode != Mode::Idle {
            debug!(
                "Pre-empting {} motion at step {}/{}",
                self.state.mode, self.state.step_cnt, self.state.total_steps
            );
        }
        info!("Start {} trajectory ({} steps, {:.2} s)", mode, buffer.steps(), buffer.duration());

        self.state = PlaybackState {
            mode,
            step_cnt: 0,
            total_steps: buffer.steps(),
            current_buffer: Some(buffer),
        };
        self.commanded = true;
        self.shared.moving.store(true, Ordering::SeqCst);
    }

    fn finish(&mut self) {
        info!("End {} trajectory", self.state.mode);
        self.state = PlaybackState::default();
        self.shared.moving.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathPoint;

    const DT: f64 = 0.1;

    fn engine() -> PlaybackEngine {
        PlaybackEngine::new(Arc::new(JointIndex::open_manipulator()), DT).unwrap()
    }

    fn arm_path() -> PlannedPath {
        PlannedPath::new(
            ["joint1", "joint2"],
            vec![
                PathPoint::at(0.0, vec![0.0, 0.0]),
                PathPoint::at(0.5, vec![0.2, 0.1]),
                PathPoint::at(1.0, vec![0.4, 0.2]),
            ],
        )
    }

    #[test]
    fn test_gripper_move_runs_to_completion() {
        let mut engine = engine();
        engine.grip(GripCommand::On).unwrap();
        assert_eq!(engine.mode(), Mode::MovingGripper);
        assert_eq!(engine.total_steps(), 21);

        let target = (-75.0f64).to_radians();
        for tick in 0..20 {
            engine.tick();
            assert_ne!(engine.mode(), Mode::Idle, "idle early after tick {}", tick);
        }
        let last = engine.tick();

        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.step(), 0);
        assert!(engine.state().current_buffer.is_none());
        assert_eq!(last.get("grip_joint"), Some(target));
        assert_eq!(last.get("joint1"), Some(0.0));
    }

    #[test]
    fn test_idle_hold_repeats_goal() {
        let mut engine = engine();
        engine.move_to(JointSubset::Arm, &[0.1, 0.2, 0.3, 0.4], 0.3).unwrap();
        for _ in 0..4 {
            engine.tick();
        }
        assert_eq!(engine.mode(), Mode::Idle);

        let held = engine.tick();
        for _ in 0..5 {
            assert_eq!(engine.tick(), held);
        }
        assert_eq!(held.positions, vec![0.1, 0.2, 0.3, 0.4, 0.0]);
        assert_eq!(held.positions, engine.goal());
    }

    #[test]
    fn test_command_covers_all_joints_every_tick() {
        let mut engine = engine();
        assert_eq!(engine.tick().len(), 5);
        engine.grip(GripCommand::On).unwrap();
        assert_eq!(engine.tick().len(), 5);
    }

    #[test]
    fn test_preemption_resets_step() {
        let mut engine = engine();
        engine.move_to(JointSubset::Arm, &[1.0, 1.0, 1.0, 1.0], 2.0).unwrap();
        for _ in 0..7 {
            engine.tick();
        }
        assert_eq!(engine.step(), 7);

        let first = engine.generation();
        let second = engine.submit(MotionRequest::PlannedPath(arm_path())).unwrap();
        assert!(second > first);
        assert_eq!(engine.mode(), Mode::MovingArm);
        assert_eq!(engine.step(), 0);
        assert_eq!(engine.total_steps(), 3);

        // The new buffer starts from the planner's first waypoint, not the abandoned motion.
        let command = engine.tick();
        assert_eq!(command.get("joint1"), Some(0.0));
        assert_eq!(engine.step(), 1);
    }

    #[test]
    fn test_rejected_requests_keep_state() {
        let mut engine = engine();
        engine.grip(GripCommand::On).unwrap();
        engine.tick();
        let generation = engine.generation();

        let mut bad = arm_path();
        bad.joint_names = vec!["joint1".into(), "joint2".into(), "joint9".into()];
        for point in &mut bad.points {
            point.positions.push(0.0);
        }
        assert!(matches!(
            engine.submit(MotionRequest::PlannedPath(bad)),
            Err(MotionError::MalformedPath(_))
        ));
        assert!(matches!(
            engine.move_to(JointSubset::Gripper, &[0.0], -1.0),
            Err(MotionError::InvalidDuration(_))
        ));
        assert!(matches!(
            engine.move_to(JointSubset::Arm, &[0.0], 1.0),
            Err(MotionError::DimensionMismatch { expected: 4, actual: 1 })
        ));

        assert_eq!(engine.mode(), Mode::MovingGripper);
        assert_eq!(engine.step(), 1);
        assert_eq!(engine.generation(), generation);
    }

    #[test]
    fn test_overlong_grip_is_rejected() {
        let mut engine = engine().with_gripper(GripperSettings {
            move_time: 1e7,
            ..GripperSettings::default()
        });
        assert_eq!(
            engine.grip(GripCommand::On).unwrap_err(),
            MotionError::InvalidDuration(1e7)
        );
        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.generation(), 0);
        assert_eq!(engine.tick().get("grip_joint"), Some(0.0));
    }

    #[test]
    fn test_point_to_point_with_explicit_boundaries() {
        let mut engine = engine();
        let request = PointToPoint {
            subset: JointSubset::Gripper,
            initial: vec![JointState::at_rest(0.2)],
            target: vec![JointState::at_rest(-0.2)],
            duration: 0.0,
        };
        engine.submit(MotionRequest::PointToPoint(request)).unwrap();
        assert_eq!(engine.total_steps(), 1);

        let command = engine.tick();
        assert_eq!(command.get("grip_joint"), Some(-0.2));
        assert_eq!(engine.mode(), Mode::Idle);
    }

    #[test]
    fn test_feedback_seeds_goal_until_first_motion() {
        let mut engine = engine();
        engine.update_present_all([("joint1", 0.5), ("grip_joint", -0.1), ("joint9", 3.0)]);
        assert_eq!(engine.tick().get("joint1"), Some(0.5));

        engine.grip(GripCommand::Off).unwrap();
        let first = engine.tick();
        assert_eq!(first.get("grip_joint"), Some(-0.1));
        assert_eq!(first.get("joint1"), Some(0.5));

        engine.update_present("joint1", 0.9);
        assert_eq!(engine.present()[0], 0.9);
        assert_eq!(engine.tick().get("joint1"), Some(0.5));
    }

    #[test]
    fn test_mailbox_fresh_and_stale() {
        let mut engine = engine();
        let handle = engine.handle();
        let buffer = TrajectoryBuffer::hold(&[0.3, 0.0, 0.0, 0.0, 0.0], 2, DT).unwrap();

        let stale = handle.next_generation();
        let fresh = handle.next_generation();
        handle.post(stale, buffer.clone());
        engine.tick();
        assert_eq!(engine.mode(), Mode::Idle);

        handle.post(fresh, buffer.clone());
        let command = engine.tick();
        assert_eq!(engine.mode(), Mode::MovingArm);
        assert_eq!(command.get("joint1"), Some(0.3));
        assert!(handle.is_moving());

        assert_eq!(
            engine.classify(stale, buffer.clone()),
            Regeneration::Stale { token: stale, current: fresh }
        );
        assert_eq!(engine.classify(fresh, buffer.clone()), Regeneration::Fresh(buffer));
    }

    #[test]
    fn test_direct_request_supersedes_pending_regeneration() {
        let mut engine = engine();
        let handle = engine.handle();
        let token = handle.next_generation();
        let buffer = TrajectoryBuffer::hold(&[1.0; 5], 3, DT).unwrap();

        engine.grip(GripCommand::On).unwrap();
        handle.post(token, buffer);
        engine.tick();

        assert_eq!(engine.mode(), Mode::MovingGripper);
        assert_eq!(engine.step(), 1);
    }

    #[test]
    fn test_ready_flag_requires_idle() {
        let mut engine = engine();
        let handle = engine.handle();

        engine.grip(GripCommand::On).unwrap();
        handle.signal_executing();
        assert!(!handle.take_ready());

        for _ in 0..21 {
            engine.tick();
        }
        handle.signal_executing();
        assert!(handle.take_ready());
        assert!(!handle.take_ready());
    }

    #[test]
    fn test_goal_snapshot_follows_ticks() {
        let mut engine = engine();
        let handle = engine.handle();
        engine.move_to(JointSubset::Arm, &[0.4, 0.3, 0.2, 0.1], 0.0).unwrap();
        engine.tick();
        assert_eq!(handle.goal_snapshot(), vec![0.4, 0.3, 0.2, 0.1, 0.0]);
    }
}
