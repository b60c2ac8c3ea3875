//! Channel metadata lookup.
//!
//! Cache-or-fetch-and-scrape: consult the persisted details cache
//! first, otherwise fetch the channel page and scrape its OpenGraph
//! tags, writing the result back. From the caller's point of view this
//! collaborator never fails — any miss, network error, or scrape
//! failure yields the deterministic placeholder derived from the id.

use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::store::{placeholder_name, placeholder_thumbnail, ChannelRecord, Store, StoreError};

/// Base URL of the video site. Overridable per call for tests.
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

/// Hard cap on the fetched channel page size.
const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Backstop timeout for the whole fetch, independent of client config.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Site suffix stripped from scraped `og:title` values.
const TITLE_SUFFIX: &str = " - YouTube";

#[derive(Debug, Error)]
pub(crate) enum LookupError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Channel page carries no usable metadata")]
    MissingMetadata,
}

/// Display metadata for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDetails {
    pub name: String,
    pub thumbnail: String,
}

impl ChannelDetails {
    pub fn placeholder(id: &str) -> Self {
        Self {
            name: placeholder_name(id),
            thumbnail: placeholder_thumbnail(id),
        }
    }
}

/// Resolve display metadata for a channel. Never fails.
///
/// Cache entries younger than the TTL win; otherwise the channel page
/// is fetched and scraped, and the result cached. On any failure the
/// placeholder is returned (and nothing is cached, so a later call
/// retries).
pub async fn channel_details(
    client: &reqwest::Client,
    store: &Store,
    id: &str,
    base_url: Option<&str>,
    ttl_hours: Option<i64>,
) -> ChannelDetails {
    if let Some(hit) = store.cached_details(id, ttl_hours).await {
        tracing::debug!(channel = id, "Using cached channel details");
        return ChannelDetails {
            name: hit.name,
            thumbnail: hit.thumbnail,
        };
    }

    let base = base_url.unwrap_or(DEFAULT_BASE_URL);
    match fetch_details(client, base, id).await {
        Ok(details) => {
            if let Err(e) = store.store_details(id, &details.name, &details.thumbnail).await {
                tracing::warn!(channel = id, error = %e, "Failed to cache channel details");
            }
            details
        }
        Err(e) => {
            tracing::warn!(channel = id, error = %e, "Channel details lookup failed, using placeholder");
            ChannelDetails::placeholder(id)
        }
    }
}

/// Resolve display metadata for `id` and append it to the study list.
/// Returns whether the list grew (adding an existing id is a no-op).
pub async fn resolve_and_add(
    client: &reqwest::Client,
    store: &Store,
    id: &str,
    base_url: Option<&str>,
    ttl_hours: Option<i64>,
) -> Result<bool, StoreError> {
    let details = channel_details(client, store, id, base_url, ttl_hours).await;
    store
        .add_channel(ChannelRecord {
            id: id.to_string(),
            name: details.name,
            thumbnail: details.thumbnail,
        })
        .await
}

/// Fetch the channel page and scrape name and thumbnail from its
/// OpenGraph tags.
async fn fetch_details(
    client: &reqwest::Client,
    base: &str,
    id: &str,
) -> Result<ChannelDetails, LookupError> {
    let url = format!("{base}/channel/{id}");

    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(&url).send())
        .await
        .map_err(|_| LookupError::Timeout)?
        .map_err(LookupError::Network)?;

    if !response.status().is_success() {
        return Err(LookupError::HttpStatus(response.status().as_u16()));
    }

    let html = read_body_limited(response, MAX_RESPONSE_SIZE).await?;

    let name = meta_property_content(&html, "og:title")
        .map(|title| title.strip_suffix(TITLE_SUFFIX).unwrap_or(&title).to_string())
        .filter(|name| !name.is_empty());
    let thumbnail = meta_property_content(&html, "og:image").filter(|t| !t.is_empty());

    match (name, thumbnail) {
        (Some(name), Some(thumbnail)) => Ok(ChannelDetails { name, thumbnail }),
        _ => Err(LookupError::MissingMetadata),
    }
}

/// Return the `content` attribute of the first `<meta>` tag whose
/// `property` attribute equals `property`.
///
/// The fetched documents are tag soup, not XML, so this is a plain
/// attribute scan: attribute order within the tag does not matter, and
/// both quote styles are accepted.
fn meta_property_content(html: &str, property: &str) -> Option<String> {
    let mut rest = html;
    while let Some(pos) = rest.find("<meta") {
        let tag_and_beyond = &rest[pos..];
        let Some(end) = tag_and_beyond.find('>') else {
            break;
        };
        let tag = &tag_and_beyond[..end];
        if attr_value(tag, "property") == Some(property) {
            return attr_value(tag, "content").map(decode_entities);
        }
        rest = &tag_and_beyond[end + 1..];
    }
    None
}

/// Value of `name="..."` (or single-quoted) within one tag's text,
/// requiring whitespace before the attribute name so that e.g.
/// `data-content=` never matches `content=`.
fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    for quote in ['"', '\''] {
        let needle = format!("{name}={quote}");
        let mut from = 0;
        while let Some(rel) = tag[from..].find(&needle) {
            let pos = from + rel;
            let start = pos + needle.len();
            let Some(len) = tag[start..].find(quote) else {
                break;
            };
            let preceded_by_space = pos > 0 && tag.as_bytes()[pos - 1].is_ascii_whitespace();
            if preceded_by_space {
                return Some(&tag[start..start + len]);
            }
            from = start + len + 1;
        }
    }
    None
}

/// Minimal entity decoding for attribute values. `&amp;` is decoded
/// last so that doubly escaped sequences stay escaped once.
fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Stream the body, refusing to buffer past `limit` (channel pages can
/// be enormous; only the head matters for the og tags).
async fn read_body_limited(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, LookupError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(LookupError::ResponseTooLarge(limit));
        }
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(LookupError::Network)?;
        if body.len().saturating_add(chunk.len()) > limit {
            return Err(LookupError::ResponseTooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body).map_err(|_| LookupError::InvalidUtf8)
}
