use std::fmt;

/// Heading rendered above the track, picked by the query that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLabel {
    /// The track is playing right now
    NowPlaying,
    /// Top track of the week, shown when nothing is playing
    OnRepeatThisWeek,
    /// Top track of the week in the fixed top-tracks mode
    MostPlayedThisWeek,
    /// Latest scrobble in the fixed recent-tracks mode
    RecentListening,
}

impl DisplayLabel {
    /// Text shown in the widget
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayLabel::NowPlaying => "Now Playing",
            DisplayLabel::OnRepeatThisWeek => "On Repeat This Week",
            DisplayLabel::MostPlayedThisWeek => "Most played this week",
            DisplayLabel::RecentListening => "Recent listening",
        }
    }
}

impl fmt::Display for DisplayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a track the widget displays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track title
    pub name: String,
    /// Artist name
    pub artist: String,
    /// Empty when the provider has no artwork of the expected size
    pub artwork_url: String,
}

/// A single track as reported by the scrobbling API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrobbledTrack {
    /// Displayed fields
    pub info: TrackInfo,
    /// Provider reports the track as live
    pub now_playing: bool,
}

/// What the widget shows for one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Heading above the track
    pub label: DisplayLabel,
    /// Track to render
    pub track: TrackInfo,
}
