//! Spotify Web API endpoints used by the client screens.

use core_auth::{CallOptions, TimeRange};
use serde::{Serialize, Serializer};
use std::fmt;

/// Public client id registered for the PKCE login flow.
pub const SPOTIFY_CLIENT_ID: &str = "602ac32e57a3499bbc9d6cebd5418250";

/// Scopes requested at login.
///
/// The follow and playlist endpoints need scopes outside this list; without
/// them those calls fail and the profile reports them as missing.
pub const SPOTIFY_SCOPES: &[&str] = &[
    "user-read-email",
    "user-library-read",
    "user-read-recently-played",
    "user-top-read",
];

/// Space-separated scope string as expected by the authorize endpoint.
pub fn scope_string() -> String {
    SPOTIFY_SCOPES.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotifyEndpoint {
    Me,
    TopTracks,
    TopArtists,
    RecentlyPlayed,
    SavedTracks,
    FollowedArtists,
    Playlists,
}

impl SpotifyEndpoint {
    /// Path relative to the API base.
    pub fn path(&self) -> &'static str {
        match self {
            SpotifyEndpoint::Me => "/me",
            SpotifyEndpoint::TopTracks => "/me/top/tracks",
            SpotifyEndpoint::TopArtists => "/me/top/artists",
            SpotifyEndpoint::RecentlyPlayed => "/me/player/recently-played",
            SpotifyEndpoint::SavedTracks => "/me/tracks",
            SpotifyEndpoint::FollowedArtists => "/me/following?type=artist",
            SpotifyEndpoint::Playlists => "/me/playlists",
        }
    }

    /// Required scope, if any beyond the implicit profile access.
    pub fn scope(&self) -> Option<&'static str> {
        match self {
            SpotifyEndpoint::Me => None,
            SpotifyEndpoint::TopTracks | SpotifyEndpoint::TopArtists => Some("user-top-read"),
            SpotifyEndpoint::RecentlyPlayed => Some("user-read-recently-played"),
            SpotifyEndpoint::SavedTracks => Some("user-library-read"),
            SpotifyEndpoint::FollowedArtists => Some("user-follow-read"),
            SpotifyEndpoint::Playlists => Some("playlist-read-private"),
        }
    }

    /// Whether the endpoint accepts a `time_range` parameter.
    pub fn supports_time_range(&self) -> bool {
        matches!(self, SpotifyEndpoint::TopTracks | SpotifyEndpoint::TopArtists)
    }
}

impl Serialize for SpotifyEndpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}

impl fmt::Display for SpotifyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A GET against one catalogue endpoint.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub endpoint: SpotifyEndpoint,
    pub options: CallOptions,
}

impl EndpointRequest {
    pub fn new(endpoint: SpotifyEndpoint) -> Self {
        Self {
            endpoint,
            options: CallOptions::get(),
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.options = self.options.query("limit", limit);
        self
    }

    /// Ignored for endpoints without a time window.
    pub fn time_range(mut self, range: TimeRange) -> Self {
        if self.endpoint.supports_time_range() {
            self.options = self.options.query("time_range", range.as_str());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_string() {
        assert_eq!(
            scope_string(),
            "user-read-email user-library-read user-read-recently-played user-top-read"
        );
    }

    #[test]
    fn test_endpoint_scopes() {
        let all = [
            SpotifyEndpoint::Me,
            SpotifyEndpoint::TopTracks,
            SpotifyEndpoint::TopArtists,
            SpotifyEndpoint::RecentlyPlayed,
            SpotifyEndpoint::SavedTracks,
            SpotifyEndpoint::FollowedArtists,
            SpotifyEndpoint::Playlists,
        ];

        assert_eq!(SpotifyEndpoint::FollowedArtists.scope(), Some("user-follow-read"));
        assert_eq!(SpotifyEndpoint::Playlists.scope(), Some("playlist-read-private"));

        let not_requested: Vec<_> = all
            .into_iter()
            .filter(|endpoint| {
                endpoint
                    .scope()
                    .is_some_and(|scope| !SPOTIFY_SCOPES.contains(&scope))
            })
            .collect();
        assert_eq!(
            not_requested,
            vec![SpotifyEndpoint::FollowedArtists, SpotifyEndpoint::Playlists]
        );
    }

    #[test]
    fn test_request_builder() {
        let request = EndpointRequest::new(SpotifyEndpoint::TopArtists)
            .limit(5)
            .time_range(TimeRange::LongTerm);
        assert_eq!(
            request.options.query,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("time_range".to_string(), "long_term".to_string()),
            ]
        );

        let request = EndpointRequest::new(SpotifyEndpoint::RecentlyPlayed)
            .limit(10)
            .time_range(TimeRange::LongTerm);
        assert_eq!(request.options.query.len(), 1);
    }
}
