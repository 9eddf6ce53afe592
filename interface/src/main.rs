mod communication;
mod config;
mod controller;
mod messages;

use communication::CommunicationLayer;
use config::ControllerConfig;
use controller::Event;
use log::{info, warn};
use motion::{PlaybackEngine, RegenerationTask};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ControllerConfig::load(&path)?,
        None => ControllerConfig::default(),
    };

    let index = Arc::new(config.joints.index()?);
    let mut engine = PlaybackEngine::new(Arc::clone(&index), config.control.interval())?
        .with_gripper(config.gripper.settings())
        .with_resample_mode(config.planner.resample);
    let handle = engine.handle();

    let (regeneration, _worker) =
        RegenerationTask::spawn(handle.clone(), config.planner.resample, config.planner.settle_delay());
    let regeneration = Arc::new(regeneration);

    let comm = CommunicationLayer::new(config.topics.clone()).await?;
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let tx = events_tx.clone();
    comm.subscribe_joint_state(move |joints| controller::forward(&tx, Event::Present(joints)))
        .await?;

    let tx = events_tx;
    comm.subscribe_gripper(move |text| {
        if let Some(event) = controller::grip_event(&text) {
            controller::forward(&tx, event);
        }
    })
    .await?;

    let planner = Arc::clone(&regeneration);
    comm.subscribe_planned_path(move |path| {
        if let Err(e) = planner.submit(path) {
            warn!("Ignoring planned path: {}", e);
        }
    })
    .await?;

    let status_handle = handle.clone();
    comm.subscribe_planner_status(move |status| controller::on_planner_status(&status_handle, &status))
        .await?;

    info!(
        "Position controller running at {} Hz for joints {:?}",
        config.control.frequency_hz,
        index.names()
    );

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(config.control.interval()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                while let Ok(event) = events.try_recv() {
                    controller::apply(&mut engine, event);
                }
                let command = engine.tick();
                if let Err(e) = comm.publish_joint_command(&command).await {
                    warn!("Failed to publish joint command: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down position controller");
                break;
            }
        }
    }

    Ok(())
}
