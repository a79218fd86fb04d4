//! Markup for the widget. Everything here is pure: outcome in, string out.

use crate::clients::entities::{NowPlaying, TrackInfo};
use crate::widget::RefreshOutcome;

const SPOTIFY_SEARCH_URL: &str = "https://open.spotify.com/search/";
const YOUTUBE_SEARCH_URL: &str = "https://www.youtube.com/results?search_query=";

/// Knobs for [`render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Append Spotify and YouTube search links under the artist
    pub search_links: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { search_links: true }
    }
}

/// Outbound search URLs for a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLinks {
    /// Spotify search page
    pub spotify: String,
    /// YouTube results page
    pub youtube: String,
}

/// Spotify and YouTube searches for "<name> <artist>"
#[must_use]
pub fn search_links(track: &TrackInfo) -> SearchLinks {
    let query = format!("{} {}", track.name, track.artist);
    let encoded = urlencoding::encode(&query);
    SearchLinks {
        spotify: format!("{SPOTIFY_SEARCH_URL}{encoded}"),
        youtube: format!("{YOUTUBE_SEARCH_URL}{encoded}"),
    }
}

/// Escape text for use in element content and double-quoted attributes
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Markup for a refresh outcome; anything but a track renders as nothing
#[must_use]
pub fn render(outcome: &RefreshOutcome, options: &RenderOptions) -> String {
    match outcome {
        RefreshOutcome::Ok(now) => render_now_playing(now, options),
        RefreshOutcome::Empty | RefreshOutcome::Error(_) => String::new(),
    }
}

/// Markup for a found track
#[must_use]
pub fn render_now_playing(now: &NowPlaying, options: &RenderOptions) -> String {
    let track = &now.track;
    let links = if options.search_links {
        let links = search_links(track);
        format!(
            r#"
      <div style="margin-top:0.25rem;">
        <a href="{spotify}" target="_blank" rel="noopener noreferrer" style="color:#1DB954; font-size:0.875rem; text-decoration:none; margin-right:0.5rem;">Spotify</a> |
        <a href="{youtube}" target="_blank" rel="noopener noreferrer" style="color:#FF0000; font-size:0.875rem; text-decoration:none; margin-left:0.5rem;">YouTube</a>
      </div>"#,
            spotify = escape_html(&links.spotify),
            youtube = escape_html(&links.youtube),
        )
    } else {
        String::new()
    };

    format!(
        r#"<div style="font-family: system-ui, sans-serif;">
  <span>{label}:</span>
  <div style="display: flex; align-items: center; gap: 0.75rem;">
    <img src="{artwork}" alt="Album artwork" style="width: 3rem; height: 3rem; object-fit: cover; border-radius: 0.125rem;" />
    <div>
      <div style="color: #333; font-weight: 500;">{name}</div>
      <div style="color: #666; font-size: 0.875rem;">{artist}</div>{links}
    </div>
  </div>
</div>"#,
        label = escape_html(now.label.as_str()),
        artwork = escape_html(&track.artwork_url),
        name = escape_html(&track.name),
        artist = escape_html(&track.artist),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::entities::DisplayLabel;
    use crate::clients::errors::ErrorKind;

    fn now_playing(name: &str, artist: &str, artwork: &str) -> NowPlaying {
        NowPlaying {
            label: DisplayLabel::NowPlaying,
            track: TrackInfo {
                name: name.into(),
                artist: artist.into(),
                artwork_url: artwork.into(),
            },
        }
    }

    #[test]
    fn test_render_track() {
        let html = render(
            &RefreshOutcome::Ok(now_playing("Xtal", "Aphex Twin", "https://img/l.jpg")),
            &RenderOptions::default(),
        );
        assert!(html.contains("<span>Now Playing:</span>"));
        assert!(html.contains(r#"<img src="https://img/l.jpg""#));
        assert!(html.contains(">Xtal</div>"));
        assert!(html.contains(">Aphex Twin</div>"));
        assert!(html.contains(r#"href="https://open.spotify.com/search/Xtal%20Aphex%20Twin""#));
        assert!(html.contains(
            r#"href="https://www.youtube.com/results?search_query=Xtal%20Aphex%20Twin""#
        ));
    }

    #[test]
    fn test_missing_artwork_keeps_image() {
        let html = render_now_playing(&now_playing("Xtal", "Aphex Twin", ""), &RenderOptions::default());
        assert!(html.contains(r#"<img src="" alt="Album artwork""#));
    }

    #[test]
    fn test_untrusted_fields_are_escaped() {
        let html = render_now_playing(
            &now_playing(
                "<script>alert(1)</script>",
                "Tom & \"Jerry\"",
                "x\" onerror=\"alert(1)",
            ),
            &RenderOptions::default(),
        );
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Tom &amp; &quot;Jerry&quot;"));
        assert!(html.contains(r#"src="x&quot; onerror=&quot;alert(1)""#));
    }

    #[test]
    fn test_search_links_are_optional() {
        let html = render_now_playing(
            &now_playing("Xtal", "Aphex Twin", ""),
            &RenderOptions {
                search_links: false,
            },
        );
        assert!(!html.contains("<a "));
        assert!(html.contains(">Aphex Twin</div>"));
    }

    #[test]
    fn test_search_links_encode_query() {
        let links = search_links(&TrackInfo {
            name: "Song/2".into(),
            artist: "A&B".into(),
            artwork_url: String::new(),
        });
        assert_eq!(links.spotify, "https://open.spotify.com/search/Song%2F2%20A%26B");
        assert_eq!(
            links.youtube,
            "https://www.youtube.com/results?search_query=Song%2F2%20A%26B"
        );
    }

    #[test]
    fn test_non_track_outcomes_render_nothing() {
        let options = RenderOptions::default();
        assert_eq!(render(&RefreshOutcome::Empty, &options), "");
        assert_eq!(
            render(&RefreshOutcome::Error(ErrorKind::Network), &options),
            ""
        );
    }
}
