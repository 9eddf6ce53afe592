use crate::config::TopicConfig;
use crate::messages::{self, JointState, JointTrajectory, StringMsg};
use joints::JointCommand;
use log::{debug, error};
use motion::PlannedPath;
use serde::de::DeserializeOwned;
use zenoh::Session;

pub struct CommunicationLayer {
    session: Session,
    topics: TopicConfig,
}

impl CommunicationLayer {
    pub async fn new(topics: TopicConfig) -> anyhow::Result<Self> {
        let config = zenoh::config::Config::default();
        let session = zenoh::open(config).await.map_err(|e| anyhow::anyhow!("{e}"))?;

        Ok(Self { session, topics })
    }

    pub async fn publish_joint_command(&self, command: &JointCommand) -> anyhow::Result<()> {
        let payload = messages::encode(&messages::goal_joint_state(command))?;
        self.session
            .put(&self.topics.goal_joint_states, payload)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        Ok(())
    }

    /// Present joint positions as name/position pairs.
    pub async fn subscribe_joint_state<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(Vec<(String, f64)>) + Send + Sync + 'static,
    {
        self.subscribe(&self.topics.present_joint_states, move |msg: JointState| {
            callback(messages::present_positions(&msg))
        })
        .await
    }

    /// Raw gripper command strings.
    pub async fn subscribe_gripper<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.subscribe(&self.topics.gripper, move |msg: StringMsg| callback(msg.data))
            .await
    }

    pub async fn subscribe_planned_path<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(PlannedPath) + Send + Sync + 'static,
    {
        self.subscribe(&self.topics.planned_path, move |msg: JointTrajectory| {
            callback(messages::planned_path(&msg))
        })
        .await
    }

    /// Planner execution state strings.
    pub async fn subscribe_planner_status<F>(&self, callback: F) -> anyhow::Result<()>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.subscribe(&self.topics.planner_status, move |msg: StringMsg| callback(msg.data))
            .await
    }

    async fn subscribe<T, F>(&self, key: &str, callback: F) -> anyhow::Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let subscriber = self
            .session
            .declare_subscriber(key)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        debug!("Subscribed to {}", key);

        let key = key.to_string();
        tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let payload = sample.payload().to_bytes();
                match messages::decode::<T>(&payload) {
                    Ok(msg) => callback(msg),
                    Err(e) => error!("Failed to deserialize message on {}: {}", key, e),
                }
            }
        });
        Ok(())
    }
}
