//! Remote photo-search collaborator: request/response shapes and the HTTP
//! client.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use crate::config::SearchOptions;
use crate::error::SearchError;
use crate::media::{GeoLocation, Locator, MediaItem, MediaKind};

/// One page request. `first_index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRequest<'a> {
    pub host: &'a str,
    pub query: &'a str,
    pub first_index: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Authoritative number of matches for the whole query.
    pub total_matches: usize,
    #[serde(default)]
    pub items: Vec<RemoteMatch>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMatch {
    pub id: String,
    /// Where the media can be fetched from.
    pub url: String,
    /// `image` or `video`; missing means image.
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub created_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Folder the match lives in on the server.
    #[serde(default)]
    pub folder: Option<String>,
}

impl RemoteMatch {
    /// Convert to a media item; `None` for media types we cannot play.
    pub fn into_item(self) -> Option<MediaItem> {
        let kind = match self.media_type.as_deref().map(str::to_ascii_lowercase) {
            None => MediaKind::Image,
            Some(t) if t == "image" => MediaKind::Image,
            Some(t) if t == "video" => MediaKind::Video,
            Some(_) => return None,
        };
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoLocation {
                latitude,
                longitude,
                placename: self.location_name,
            }),
            _ => None,
        };
        let duration = self
            .duration_seconds
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| match Duration::try_from_secs_f64(secs) {
                Ok(length) => Some(length),
                Err(err) => {
                    debug!(id = %self.id, secs, "unusable clip length ({err}); length unknown");
                    None
                }
            });
        Some(MediaItem {
            id: self.id,
            locator: Locator::Remote(self.url),
            kind,
            captured_at: self.created_date,
            location,
            duration,
            parent_label: self.folder.unwrap_or_default(),
        })
    }
}

/// Interface implemented by remote search backends.
///
/// Calls are synchronous; callers run them on a blocking worker.
pub trait SearchClient: Send + Sync {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage, SearchError>;
}

/// Search client backed by `ureq`.
pub struct HttpSearchClient {
    http_client: ureq::Agent,
}

impl HttpSearchClient {
    pub fn new(options: &SearchOptions) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .timeout_write(options.read_timeout)
            .build();
        Self { http_client }
    }

    fn api_url(request: &SearchRequest<'_>) -> String {
        format!(
            "{}/api/search?q={}&first={}&count={}",
            request.host.trim().trim_end_matches('/'),
            urlencoding::encode(request.query),
            request.first_index,
            request.page_size
        )
    }
}

impl SearchClient for HttpSearchClient {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchPage, SearchError> {
        let url = Self::api_url(request);
        debug!(%url, "search request");
        let response = self.http_client.get(&url).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => SearchError::Status(code),
            ureq::Error::Transport(transport) => SearchError::Transport(transport.to_string()),
        })?;
        let page: SearchPage = response
            .into_json()
            .map_err(|err| SearchError::Parse(err.to_string()))?;
        if let Some(message) = page.error.as_ref().filter(|m| !m.is_empty()) {
            return Err(SearchError::Server(message.clone()));
        }
        Ok(page)
    }
}
