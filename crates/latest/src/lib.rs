//! The incremental chapter discovery engine.
//!
//! One discovery pass walks the feed's chapter listing newest-first from
//! the cache's watermark, skips everything already cached, resolves and
//! tracks the rest, and narrates the whole thing as a stream of
//! [`WatchEvent`]s. Requests are counted against two rate-limit budgets and
//! the stream pauses itself when a budget runs out — which is also where
//! [`rollup`] cuts the stream into notification batches.
//!
//! [`Watcher`] drives passes on a timer and hands each batch to a
//! [`Notify`] implementation.

pub mod error;

mod cursor;
mod enrich;
mod event;
mod process;
mod ratelimit;
mod rollup;
mod settings;
#[cfg(test)]
pub(crate) mod testing;
mod track;
mod watcher;

pub use crate::event::{ChapterBatch, FetchedChapter, WatchEvent, log_event};
pub use crate::process::latest;
pub use crate::rollup::rollup;
pub use crate::settings::{FetchSettings, RateLimit};
pub use crate::watcher::{LATEST_CHANNEL, Notify, Watcher};
