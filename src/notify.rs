//! NATS-backed notification publisher.

use async_trait::async_trait;
use exn::ResultExt;
use mdwatch_latest::error::{ErrorKind, Result};
use mdwatch_latest::{ChapterBatch, Notify};

/// Publishes tracked chapter batches to a NATS subject as JSON.
pub struct NatsNotify {
    client: async_nats::Client,
}

impl NatsNotify {
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::info!(url, "connecting to message bus");
        let client = async_nats::connect(url).await.or_raise(|| ErrorKind::Notify)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notify for NatsNotify {
    async fn publish(&self, channel: &str, batch: &ChapterBatch) -> Result<()> {
        let payload = serde_json::to_vec(batch).or_raise(|| ErrorKind::Notify)?;
        let bytes = payload.len();
        self.client
            .publish(channel.to_string(), payload.into())
            .await
            .or_raise(|| ErrorKind::Notify)?;
        tracing::debug!(channel, bytes, "published batch");
        Ok(())
    }
}
