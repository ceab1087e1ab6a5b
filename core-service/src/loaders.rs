//! Batch loaders for the dashboard and profile screens.
//!
//! Each loader fires its calls concurrently and settles all of them. Failed
//! sections come back as `Value::Null` and are listed in `missing`; only a
//! batch where every call failed is an error.

use crate::endpoints::{EndpointRequest, SpotifyEndpoint};
use crate::error::Result;
use core_auth::{settle_all, AuthenticatedClient, TimeRange};
use core_runtime::events::{ApiEvent, CoreEvent, EventBus};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

const TOP_TRACKS_LIMIT: u32 = 10;
const TOP_ARTISTS_LIMIT: u32 = 5;
const RECENTLY_PLAYED_LIMIT: u32 = 10;
/// The profile only needs the `total` counters.
const COUNTER_LIMIT: u32 = 1;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dashboard {
    pub time_range: &'static str,
    pub top_tracks: Value,
    pub top_artists: Value,
    pub recently_played: Value,
    pub missing: Vec<SpotifyEndpoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Profile {
    pub user: Value,
    pub saved_tracks: Value,
    pub followed_artists: Value,
    pub playlists: Value,
    pub missing: Vec<SpotifyEndpoint>,
}

pub(crate) fn dashboard_requests(range: TimeRange) -> Vec<EndpointRequest> {
    vec![
        EndpointRequest::new(SpotifyEndpoint::TopTracks)
            .limit(TOP_TRACKS_LIMIT)
            .time_range(range),
        EndpointRequest::new(SpotifyEndpoint::TopArtists)
            .limit(TOP_ARTISTS_LIMIT)
            .time_range(range),
        EndpointRequest::new(SpotifyEndpoint::RecentlyPlayed).limit(RECENTLY_PLAYED_LIMIT),
    ]
}

pub(crate) fn profile_requests() -> Vec<EndpointRequest> {
    vec![
        EndpointRequest::new(SpotifyEndpoint::Me),
        EndpointRequest::new(SpotifyEndpoint::SavedTracks).limit(COUNTER_LIMIT),
        EndpointRequest::new(SpotifyEndpoint::FollowedArtists).limit(COUNTER_LIMIT),
        EndpointRequest::new(SpotifyEndpoint::Playlists).limit(COUNTER_LIMIT),
    ]
}

/// Run a batch and return one value per request, `Null` for failures,
/// together with the endpoints that failed.
async fn load_batch(
    client: &AuthenticatedClient,
    event_bus: &EventBus,
    requests: Vec<EndpointRequest>,
) -> Result<(Vec<Value>, Vec<SpotifyEndpoint>)> {
    let endpoints: Vec<SpotifyEndpoint> = requests.iter().map(|r| r.endpoint).collect();
    let total = requests.len();

    let settled = settle_all(
        requests
            .into_iter()
            .map(|request| client.call(request.endpoint.path(), request.options)),
    )
    .await;

    let failed = settled.failed_count();
    let values = settled.into_values_or_error()?;

    let missing: Vec<SpotifyEndpoint> = endpoints
        .into_iter()
        .zip(values.iter())
        .filter(|(_, value)| value.is_none())
        .map(|(endpoint, _)| endpoint)
        .collect();

    if failed > 0 {
        warn!(failed, total, "Loaded partial data");
        let _ = event_bus.emit(CoreEvent::Api(ApiEvent::BatchDegraded { failed, total }));
    }

    Ok((
        values.into_iter().map(Option::unwrap_or_default).collect(),
        missing,
    ))
}

#[instrument(skip(client, event_bus))]
pub async fn load_dashboard(
    client: &AuthenticatedClient,
    event_bus: &EventBus,
    range: TimeRange,
) -> Result<Dashboard> {
    let (values, missing) = load_batch(client, event_bus, dashboard_requests(range)).await?;
    let mut values = values.into_iter();

    info!(missing = missing.len(), "Dashboard loaded");
    Ok(Dashboard {
        time_range: range.as_str(),
        top_tracks: values.next().unwrap_or_default(),
        top_artists: values.next().unwrap_or_default(),
        recently_played: values.next().unwrap_or_default(),
        missing,
    })
}

#[instrument(skip(client, event_bus))]
pub async fn load_profile(client: &AuthenticatedClient, event_bus: &EventBus) -> Result<Profile> {
    let (values, missing) = load_batch(client, event_bus, profile_requests()).await?;
    let mut values = values.into_iter();

    info!(missing = missing.len(), "Profile loaded");
    Ok(Profile {
        user: values.next().unwrap_or_default(),
        saved_tracks: values.next().unwrap_or_default(),
        followed_artists: values.next().unwrap_or_default(),
        playlists: values.next().unwrap_or_default(),
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_requests_match_screen() {
        let requests = dashboard_requests(TimeRange::MediumTerm);
        let shaped: Vec<_> = requests
            .iter()
            .map(|r| (r.endpoint.path(), r.options.query.clone()))
            .collect();

        assert_eq!(
            shaped,
            vec![
                (
                    "/me/top/tracks",
                    vec![
                        ("limit".to_string(), "10".to_string()),
                        ("time_range".to_string(), "medium_term".to_string())
                    ]
                ),
                (
                    "/me/top/artists",
                    vec![
                        ("limit".to_string(), "5".to_string()),
                        ("time_range".to_string(), "medium_term".to_string())
                    ]
                ),
                (
                    "/me/player/recently-played",
                    vec![("limit".to_string(), "10".to_string())]
                ),
            ]
        );
    }

    #[test]
    fn test_profile_requests_only_fetch_counters() {
        let requests = profile_requests();
        assert_eq!(requests[0].endpoint, SpotifyEndpoint::Me);
        assert!(requests[0].options.query.is_empty());
        assert!(requests[1..]
            .iter()
            .all(|r| r.options.query == vec![("limit".to_string(), "1".to_string())]));
    }

    #[test]
    fn test_endpoint_serializes_as_path() {
        assert_eq!(
            serde_json::to_string(&SpotifyEndpoint::FollowedArtists).unwrap(),
            "\"/me/following?type=artist\""
        );
    }
}
