/// Page targets the widget renders into
pub mod document;
/// Data entities for tracks and display labels
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Last.fm API client
pub mod lastfm;

pub use document::{Document, FragmentDirectory, MemoryDocument};
pub use lastfm::{LastFmClient, ScrobbleApi};
