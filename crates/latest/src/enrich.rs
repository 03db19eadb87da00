//! Series detail enrichment for one page of chapters.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mdwatch_feed::{Feed, FeedChapter, FeedSeries};
use std::collections::HashMap;

/// Attach series detail to every chapter in `chapters` with one bulk feed
/// lookup, keyed on the distinct series ids the page references.
///
/// Returns whether a lookup was actually made, so the caller can count the
/// request; a page with no series references is a no-op. Series the feed
/// doesn't return are left unenriched, which the downstream state machine
/// treats the same as a missing relation.
pub(crate) async fn attach_series_detail<F>(feed: &F, chapters: &mut [FeedChapter]) -> Result<bool>
where
    F: Feed + ?Sized,
{
    let mut ids: Vec<String> = chapters
        .iter()
        .filter_map(|chapter| chapter.series.as_ref().map(|stub| stub.id.clone()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(false);
    }

    let details = feed.series(&ids).await.or_raise(|| ErrorKind::Feed)?;
    let by_id: HashMap<&str, &FeedSeries> = details.iter().map(|s| (s.id.as_str(), s)).collect();
    for chapter in chapters.iter_mut() {
        if let Some(stub) = chapter.series.as_mut()
            && let Some(detail) = by_id.get(stub.id.as_str())
        {
            stub.detail = Some((*detail).clone());
        }
    }
    Ok(true)
}
