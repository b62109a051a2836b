//! Metadata-lookup collaborator.
//!
//! A lookup turns a formatted query string into the single best
//! [`LookupCandidate`]. The HTTP client below fetches the search page and
//! hands the body to [`decode_payload`], which reads the embedded
//! page-data JSON.

use serde::Deserialize;

use crate::error::{Result, TagMateError};
use crate::models::LookupCandidate;

pub const SEARCH_URL: &str = "https://www.beatport.com/search/tracks?q=";

/// Marker of the script element holding the page data
const PAGE_DATA_MARKER: &str = "__NEXT_DATA__";

pub trait MetadataLookup {
    fn lookup(&self, query: &str) -> Result<LookupCandidate>;
}

// ============================================================================
// Payload Models
// ============================================================================

/// Field that the lookup service returns either as one object or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.first(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageData {
    props: Props,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Props {
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    dehydrated_state: DehydratedState,
}

#[derive(Debug, Deserialize)]
struct DehydratedState {
    queries: Vec<Query>,
}

#[derive(Debug, Deserialize)]
struct Query {
    state: QueryState,
}

#[derive(Debug, Deserialize)]
struct QueryState {
    data: ResultPage,
}

#[derive(Debug, Deserialize)]
struct ResultPage {
    data: Vec<RawTrack>,
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    artists: Vec<RawArtist>,
    track_name: String,
    mix_name: String,
    genre: OneOrMany<RawGenre>,
    label: OneOrMany<RawLabel>,
}

#[derive(Debug, Deserialize)]
struct RawArtist {
    artist_name: String,
}

#[derive(Debug, Deserialize)]
struct RawGenre {
    genre_name: String,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    label_name: String,
}

// ============================================================================
// Decoding
// ============================================================================

/// Cut the JSON object out of a search page body.
fn extract_page_json(body: &str) -> Option<&str> {
    let scoped = match body.find(PAGE_DATA_MARKER) {
        Some(pos) => {
            let rest = &body[pos..];
            rest.find("</script>").map_or(rest, |end| &rest[..end])
        }
        None => body,
    };
    let start = scoped.find('{')?;
    let end = scoped.rfind('}')?;
    (start < end).then(|| &scoped[start..=end])
}

/// Decode the best candidate from a search page body (or bare JSON).
///
/// When genre or label is a list, its first element is used.
pub fn decode_payload(query: &str, body: &str) -> Result<LookupCandidate> {
    let json = extract_page_json(body)
        .ok_or_else(|| TagMateError::lookup(query, "no page data in response"))?;
    let page: PageData =
        serde_json::from_str(json).map_err(|e| TagMateError::lookup(query, e))?;

    let track = page
        .props
        .page_props
        .dehydrated_state
        .queries
        .into_iter()
        .next()
        .and_then(|q| q.state.data.data.into_iter().next())
        .ok_or_else(|| TagMateError::lookup(query, "search returned no tracks"))?;

    let genre = track
        .genre
        .first()
        .map(|g| g.genre_name.clone())
        .ok_or_else(|| TagMateError::lookup(query, "track has no genre"))?;
    let label = track
        .label
        .first()
        .map(|l| l.label_name.clone())
        .ok_or_else(|| TagMateError::lookup(query, "track has no label"))?;

    Ok(LookupCandidate {
        artists: track.artists.into_iter().map(|a| a.artist_name).collect(),
        title: track.track_name,
        version: track.mix_name,
        genre,
        label,
    })
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Blocking search-page lookup. No timeout is set: a stuck request stalls
/// the batch, which runs one file at a time.
pub struct HttpLookup {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpLookup {
    pub fn new() -> Result<Self> {
        Self::with_base_url(SEARCH_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| TagMateError::lookup(base_url, e))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl MetadataLookup for HttpLookup {
    fn lookup(&self, query: &str) -> Result<LookupCandidate> {
        let url = format!("{}{}", self.base_url, query);
        let body = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(|e| TagMateError::lookup(query, e))?;
        decode_payload(query, &body)
    }
}
