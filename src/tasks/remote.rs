use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use crate::search::{SearchClient, SearchRequest};
use crate::source::PoolSink;

/// Counters from one paged search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchProgress {
    pub pages: usize,
    pub fetched: usize,
    pub total_matches: Option<usize>,
}

/// Items matching a query on a remote search service, fetched page by page.
pub struct RemoteSearch {
    host: String,
    query: String,
    page_size: usize,
    client: Arc<dyn SearchClient>,
}

impl RemoteSearch {
    pub fn new(
        host: impl Into<String>,
        query: impl Into<String>,
        page_size: usize,
        client: Arc<dyn SearchClient>,
    ) -> Self {
        Self {
            host: host.into(),
            query: query.into(),
            page_size: page_size.max(1),
            client,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fetch pages until every match has been seen or a page comes back
    /// empty. A failed request is reported once and ends the cycle; it is
    /// not retried.
    #[instrument(skip_all, fields(cycle = sink.cycle(), query = %self.query))]
    pub fn enumerate(&self, sink: &mut PoolSink) -> SearchProgress {
        let mut progress = SearchProgress::default();
        loop {
            if !sink.is_current() {
                info!("search superseded; stopping");
                break;
            }
            let count = progress
                .total_matches
                .map_or(self.page_size, |total| {
                    total.saturating_sub(progress.fetched).min(self.page_size)
                });
            let request = SearchRequest {
                host: &self.host,
                query: &self.query,
                first_index: progress.fetched + 1,
                page_size: count,
            };
            let page = match self.client.search(&request) {
                Ok(page) => page,
                Err(err) => {
                    error!(first = request.first_index, "search failed: {err}");
                    sink.fail(format!("Search for '{}' failed: {err}", self.query));
                    break;
                }
            };

            progress.pages += 1;
            progress.total_matches = Some(page.total_matches);
            let received = page.items.len();
            progress.fetched += received;
            for remote in page.items {
                let id = remote.id.clone();
                match remote.into_item() {
                    Some(item) => {
                        sink.push(item);
                    }
                    None => debug!(%id, "skipping unsupported media type"),
                }
            }
            debug!(
                page = progress.pages,
                received,
                fetched = progress.fetched,
                total = page.total_matches,
                "search page"
            );
            if received == 0 || progress.fetched >= page.total_matches {
                break;
            }
        }
        progress
    }
}
