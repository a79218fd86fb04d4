use std::{env::VarError, time::Duration};

use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::clients::{
    entities::{ScrobbledTrack, TrackInfo},
    errors::{Error, Result},
};

/// Public Last.fm API root
pub const DEFAULT_API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
/// Request timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TOP_TRACKS_PERIOD: &str = "7day";
// image[] is ordered small, medium, large, extralarge
const ARTWORK_SIZE_INDEX: usize = 2;

/// Source of the track shown by the widget
#[async_trait]
pub trait ScrobbleApi: Send + Sync {
    /// The track the user is listening to right now, if any.
    ///
    /// Only a live track has to be well formed; a broken historical scrobble
    /// just means nothing is playing.
    async fn now_playing(&self) -> Result<Option<ScrobbledTrack>>;

    /// Most recent scrobble of the user, flagged when it is playing right now
    async fn recent_track(&self) -> Result<Option<ScrobbledTrack>>;

    /// The user's most played track of the last seven days
    async fn top_track(&self) -> Result<Option<ScrobbledTrack>>;
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum LastFMArtist {
    Plain(String),
    Object {
        #[serde(rename = "#text")]
        text: Option<String>,
        name: Option<String>,
    },
}

impl LastFMArtist {
    // recenttracks nests the name under "#text", toptracks under "name"
    fn resolve(self) -> String {
        match self {
            LastFMArtist::Plain(name) => name,
            LastFMArtist::Object { text, name } => text
                .filter(|t| !t.is_empty())
                .or(name)
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct LastFMImage {
    #[serde(rename = "#text")]
    url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LastFMAPITrack {
    name: Option<String>,
    artist: Option<LastFMArtist>,
    image: Option<Vec<LastFMImage>>,
}

// Last.fm collapses single-element lists into a bare object
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

// Tracks stay raw until one of them is picked for display
#[derive(Deserialize, Debug)]
struct Tracks {
    #[serde(default)]
    track: OneOrMany<Value>,
}

#[derive(Deserialize, Debug)]
struct RecentTracksResponse {
    recenttracks: Option<Tracks>,
}

#[derive(Deserialize, Debug)]
struct TopTracksResponse {
    toptracks: Option<Tracks>,
}

fn is_now_playing(track: &Value) -> bool {
    track.pointer("/@attr/nowplaying").and_then(Value::as_str) == Some("true")
}

impl TryFrom<Value> for ScrobbledTrack {
    type Error = Error;

    fn try_from(track: Value) -> Result<Self> {
        let now_playing = is_now_playing(&track);
        let LastFMAPITrack {
            name,
            artist,
            image,
        } = serde_json::from_value(track)?;
        let name = name.unwrap_or_default();
        let artist = artist
            .ok_or_else(|| {
                Error::LastFMUnexpectedResponse(format!("track {name:?} has no artist"))
            })?
            .resolve();
        let artwork_url = image
            .into_iter()
            .flatten()
            .nth(ARTWORK_SIZE_INDEX)
            .and_then(|image| image.url)
            .unwrap_or_default();

        Ok(ScrobbledTrack {
            info: TrackInfo {
                name,
                artist,
                artwork_url,
            },
            now_playing,
        })
    }
}

// Last.fm reports failures as {"error": <code>, "message": "..."}, often with a 200 status
fn check_error_envelope(value: &Value) -> Result<()> {
    match value.get("error").and_then(Value::as_i64) {
        Some(code) => Err(Error::LastFMApiError {
            code,
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Ok(()),
    }
}

fn first_raw_track(tracks: Option<Tracks>) -> Option<Value> {
    tracks
        .and_then(|tracks| tracks.track.into_first())
        .filter(|track| !track.is_null())
}

fn first_track(tracks: Option<Tracks>) -> Result<Option<ScrobbledTrack>> {
    first_raw_track(tracks)
        .map(ScrobbledTrack::try_from)
        .transpose()
}

// Only the live flag is read before deciding, the track is converted only when playing
pub(crate) fn parse_now_playing(value: Value) -> Result<Option<ScrobbledTrack>> {
    check_error_envelope(&value)?;
    let response: RecentTracksResponse = serde_json::from_value(value)?;
    match first_raw_track(response.recenttracks) {
        Some(track) if is_now_playing(&track) => ScrobbledTrack::try_from(track).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn parse_recent_tracks(value: Value) -> Result<Option<ScrobbledTrack>> {
    check_error_envelope(&value)?;
    let response: RecentTracksResponse = serde_json::from_value(value)?;
    first_track(response.recenttracks)
}

pub(crate) fn parse_top_tracks(value: Value) -> Result<Option<ScrobbledTrack>> {
    check_error_envelope(&value)?;
    let response: TopTracksResponse = serde_json::from_value(value)?;
    first_track(response.toptracks)
}

/// Connection settings; anything left `None` is read from the environment
#[derive(Debug, Clone, Default)]
pub struct LastFmSettings {
    /// Falls back to `LASTFM_USER`
    pub user: Option<String>,
    /// Falls back to `LASTFM_API_KEY`
    pub api_key: Option<String>,
    /// Falls back to `LASTFM_API_ROOT`, then [`DEFAULT_API_ROOT`]
    pub api_root: Option<String>,
    /// Per-request timeout, [`DEFAULT_TIMEOUT`] when unset; zero is rejected
    pub timeout: Option<Duration>,
}

fn required_setting(value: Option<String>, var: &str) -> Result<String> {
    let value = match value {
        Some(value) => value,
        None => std::env::var(var)
            .map_err(|e| Error::ConfigurationError(format!("{var}: {e}")))?,
    };
    if value.trim().is_empty() {
        return Err(Error::ConfigurationError(format!("{var} must not be empty")));
    }
    Ok(value)
}

/// Unauthenticated Last.fm client for one user
pub struct LastFmClient {
    http: reqwest::Client,
    api_root: String,
    user: String,
    api_key: String,
}

impl LastFmClient {
    /// Client against the public API root
    pub fn new(
        http: reqwest::Client,
        user: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        LastFmClient {
            http,
            api_root: DEFAULT_API_ROOT.to_string(),
            user: user.into(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at another API root
    #[must_use]
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Fill unset fields from the environment and build the client
    pub fn from_settings(settings: LastFmSettings) -> Result<Self> {
        let user = required_setting(settings.user, "LASTFM_USER")?;
        let api_key = required_setting(settings.api_key, "LASTFM_API_KEY")?;
        let api_root = match settings.api_root {
            Some(root) => root,
            None => match std::env::var("LASTFM_API_ROOT") {
                Ok(root) => root,
                Err(VarError::NotPresent) => DEFAULT_API_ROOT.to_string(),
                Err(e) => return Err(e.into()),
            },
        };

        let timeout = settings.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::ConfigurationError(
                "request timeout must be greater than zero".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(LastFmClient::new(http, user, api_key).with_api_root(api_root))
    }

    /// Create a LastFmClient from environment variables or raise a configuration error
    pub fn try_default() -> Result<Self> {
        Self::from_settings(LastFmSettings::default())
    }

    /// Last.fm user whose scrobbles are read
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    fn method_url(&self, method: &str, extra: &[(&str, &str)]) -> Result<Url> {
        let mut params = vec![
            ("method", method),
            ("user", self.user.as_str()),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
        ];
        params.extend_from_slice(extra);
        Url::parse_with_params(&self.api_root, &params).map_err(|e| {
            Error::ConfigurationError(format!("invalid API root {:?}: {e}", self.api_root))
        })
    }

    // HTTP status is not checked here, the body decides whether the call failed
    async fn call(&self, method: &str, extra: &[(&str, &str)]) -> Result<Value> {
        let url = self.method_url(method, extra)?;
        debug!("Calling LastFM {method} for user {}", self.user);
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("LastFM {method} answered {status} with {} bytes", body.len());
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ScrobbleApi for LastFmClient {
    async fn now_playing(&self) -> Result<Option<ScrobbledTrack>> {
        let value = self
            .call("user.getrecenttracks", &[("limit", "1")])
            .await?;
        parse_now_playing(value)
    }

    async fn recent_track(&self) -> Result<Option<ScrobbledTrack>> {
        let value = self
            .call("user.getrecenttracks", &[("limit", "1")])
            .await?;
        parse_recent_tracks(value)
    }

    async fn top_track(&self) -> Result<Option<ScrobbledTrack>> {
        let value = self
            .call(
                "user.gettoptracks",
                &[("period", TOP_TRACKS_PERIOD), ("limit", "1")],
            )
            .await?;
        parse_top_tracks(value)
    }
}
