//! The long-running watch loop: discovery passes on a timer, batches out
//! to a notifier.

use crate::error::Result;
use crate::event::ChapterBatch;
use crate::process::latest;
use crate::rollup::rollup;
use crate::settings::FetchSettings;
use async_trait::async_trait;
use futures::StreamExt;
use mdwatch_cache::Repository;
use mdwatch_feed::Feed;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Channel that tracked chapter batches are published on.
pub const LATEST_CHANNEL: &str = "latest-chapters";

/// Where tracked batches go. Implementations publish and forget; the
/// watcher never reads anything back.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn publish(&self, channel: &str, batch: &ChapterBatch) -> Result<()>;
}

/// Runs discovery passes forever, publishing each rolled-up batch.
pub struct Watcher<F, N> {
    feed: F,
    repo: Repository,
    notify: N,
}

impl<F, N> Watcher<F, N>
where
    F: Feed,
    N: Notify,
{
    pub fn new(feed: F, repo: Repository, notify: N) -> Self {
        Self { feed, repo, notify }
    }

    /// Run a single discovery pass and publish its batches.
    ///
    /// Cache rows written before a failure or cancellation stay written;
    /// the next pass simply won't re-announce them.
    pub async fn check(&self, settings: &FetchSettings, cancel: &CancellationToken) -> Result<()> {
        let events = latest(&self.feed, &self.repo, settings, cancel);
        let batches = rollup(events, cancel.clone());
        futures::pin_mut!(batches);
        while let Some(batch) = batches.next().await {
            let batch = ChapterBatch::new(batch?);
            tracing::info!(chapters = batch.chapters.len(), "publishing tracked batch");
            self.notify.publish(LATEST_CHANNEL, &batch).await?;
        }
        Ok(())
    }

    /// Watch until cancelled: one pass, then sleep `period`, repeatedly.
    ///
    /// A pass that fails retryably (feed outage, bus hiccup) is logged and
    /// the loop carries on to the next scheduled pass; a non-retryable
    /// failure ends the loop. The token is honored at every suspension
    /// point; cancelling mid-pass stops event production without flushing
    /// the in-flight buffer.
    pub async fn watch(
        &self,
        period: Duration,
        settings: &FetchSettings,
        cancel: &CancellationToken,
    ) -> Result<()> {
        while !cancel.is_cancelled() {
            if let Err(error) = self.check(settings, cancel).await {
                if !error.is_retryable() {
                    return Err(error);
                }
                tracing::warn!(%error, "discovery pass failed, retrying next pass");
            }
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(period) => {},
            }
        }
        Ok(())
    }
}
