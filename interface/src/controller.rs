//! Glue between transport callbacks and the playback engine.

use log::{debug, error, warn};
use motion::{EngineHandle, GripCommand, PlaybackEngine};
use tokio::sync::mpsc::UnboundedSender;

/// Planner state reported while a plan is being executed.
pub const PLANNER_EXECUTING: &str = "MONITOR";

/// Inputs the tick loop applies to the engine between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Present(Vec<(String, f64)>),
    Grip(GripCommand),
}

pub fn parse_grip_command(text: &str) -> Option<GripCommand> {
    match text {
        "grip_on" => Some(GripCommand::On),
        "grip_off" => Some(GripCommand::Off),
        _ => None,
    }
}

/// Maps a gripper topic string to an event, logging anything unknown.
pub fn grip_event(text: &str) -> Option<Event> {
    let command = parse_grip_command(text);
    if command.is_none() {
        error!("If you want to grip or release something, publish 'grip_on' or 'grip_off' (got '{}')", text);
    }
    command.map(Event::Grip)
}

/// Hands an event to the tick loop. Once the loop has shut down the event is
/// dropped.
pub fn forward(events: &UnboundedSender<Event>, event: Event) {
    if let Err(e) = events.send(event) {
        debug!("Tick loop gone, dropping {:?}", e.0);
    }
}

pub fn on_planner_status(handle: &EngineHandle, status: &str) {
    if status == PLANNER_EXECUTING {
        handle.signal_executing();
    }
}

pub fn apply(engine: &mut PlaybackEngine, event: Event) {
    match event {
        Event::Present(joints) => {
            engine.update_present_all(joints.iter().map(|(name, position)| (name.as_str(), *position)));
        }
        Event::Grip(command) => {
            if let Err(e) = engine.grip(command) {
                warn!("Gripper request {:?} rejected: {}", command, e);
            }
        }
    }
}
