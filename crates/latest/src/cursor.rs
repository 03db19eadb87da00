//! The pagination cursor: walks the chapter listing newest-first from a
//! watermark until the feed runs out.

use crate::enrich::attach_series_detail;
use crate::error::{ErrorKind, Result};
use crate::event::WatchEvent;
use crate::settings::FetchSettings;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use mdwatch_feed::{ChapterFilter, Feed};
use time::UtcDateTime;
use tokio_util::sync::CancellationToken;

/// Chapters fetched per listing request.
pub(crate) const PAGE_LIMIT: u32 = 100;

/// Walk the listing from `since` forward, yielding one enriched
/// [`WatchEvent::Page`] per feed page.
///
/// Each round trip emits a `GeneralRequest` event (two when the page needed
/// a series lookup) so the caller can count it. The walk ends on an empty
/// page, or after the page that exhausts the feed's reported total.
pub(crate) fn paginate<'a, F>(
    feed: &'a F,
    settings: &'a FetchSettings,
    since: UtcDateTime,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<WatchEvent>> + 'a
where
    F: Feed + ?Sized,
{
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut filter = ChapterFilter {
            updated_since: since,
            limit: PAGE_LIMIT,
            offset: 0,
            languages: settings.languages.clone(),
            include_external: settings.include_external,
        };

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let page = match feed.chapters(&filter).await.or_raise(|| ErrorKind::Feed) {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            yield Ok(WatchEvent::GeneralRequest { scope: "latest", endpoint: "chapters" });
            if page.items.is_empty() {
                break;
            }

            let mut items = page.items;
            match attach_series_detail(feed, &mut items).await {
                Ok(true) => {
                    yield Ok(WatchEvent::GeneralRequest { scope: "series-detail", endpoint: "series" });
                },
                Ok(false) => {},
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
            yield Ok(WatchEvent::Page(items));

            // The feed reports its total up front; don't ask for a page we
            // already know is past the end.
            if page.total <= page.offset + page.limit {
                break;
            }
            filter.offset = page.offset + page.limit;
        }
    })
}
