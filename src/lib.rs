//! Rnowplaying - Last.fm now playing widget
//!
//! This library fetches the track a Last.fm user is listening to (or the one
//! they played most this week) and renders it as a small HTML fragment into a
//! page element, refreshed on a timer.

/// Client modules for interacting with the scrobbling API and the page
pub mod clients;
/// Pure HTML rendering of refresh outcomes
pub mod render;
/// The widget, its configuration and refresh scheduler
pub mod widget;
