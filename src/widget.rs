use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use clap::ValueEnum;
use log::{debug, info, warn};
use tokio::{
    sync::{Mutex, oneshot},
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};

use crate::clients::{
    Document, FragmentDirectory, LastFmClient, ScrobbleApi,
    document::validate_element_id,
    entities::{DisplayLabel, NowPlaying, ScrobbledTrack},
    errors::{Error, ErrorKind, Result},
};
use crate::render::{self, RenderOptions};

/// Element id used when none is configured
pub const DEFAULT_TARGET_ID: &str = "nowplaying";
/// Refresh period used when none is configured
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Which queries feed the widget and how the result is labelled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Live track if one is playing, otherwise the week's top track
    #[default]
    NowPlaying,
    /// Always the week's top track
    TopTracks,
    /// Always the latest scrobble
    RecentTracks,
}

/// Result of one refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A track was found and rendered
    Ok(NowPlaying),
    /// Nothing to show, the target is cleared
    Empty,
    /// The cycle failed, the target is cleared
    Error(ErrorKind),
}

/// Configuration for the Widget struct
pub struct Config {
    /// Where tracks come from
    pub api: Arc<dyn ScrobbleApi>,
    /// The page holding the target element
    pub document: Arc<dyn Document>,
    /// Id of the element the widget owns
    pub target_id: String,
    /// Period between scheduled refreshes
    pub refresh_interval: Duration,
    /// Query and label selection
    pub mode: Mode,
    /// Markup options
    pub render: RenderOptions,
}

/// Builds a [`Config`], filling unset values with defaults
#[derive(Default)]
pub struct ConfigBuilder {
    api: Option<Arc<dyn ScrobbleApi>>,
    document: Option<Arc<dyn Document>>,
    target_id: Option<String>,
    refresh_interval: Option<Duration>,
    mode: Option<Mode>,
    render: Option<RenderOptions>,
}

impl ConfigBuilder {
    /// Builder with nothing set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track source
    #[must_use]
    pub fn api(mut self, api: Arc<dyn ScrobbleApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Page to write into
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Element id, defaults to [`DEFAULT_TARGET_ID`]
    #[must_use]
    pub fn target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Timer period, defaults to [`DEFAULT_REFRESH_INTERVAL`]
    #[must_use]
    pub fn refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = Some(refresh_interval);
        self
    }

    /// Query selection, defaults to [`Mode::NowPlaying`]
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Markup options
    #[must_use]
    pub fn render(mut self, render: RenderOptions) -> Self {
        self.render = Some(render);
        self
    }

    /// Missing API and document fall back to the environment-configured
    /// Last.fm client and the default fragment directory.
    pub async fn build(self) -> Result<Config> {
        let target_id = self
            .target_id
            .unwrap_or_else(|| DEFAULT_TARGET_ID.to_string());
        validate_element_id(&target_id)?;

        let refresh_interval = self.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL);
        if refresh_interval.is_zero() {
            return Err(Error::ConfigurationError(
                "refresh interval must be greater than zero".into(),
            ));
        }

        let api: Arc<dyn ScrobbleApi> = match self.api {
            Some(api) => api,
            None => Arc::new(LastFmClient::try_default()?),
        };
        let document: Arc<dyn Document> = match self.document {
            Some(document) => document,
            None => Arc::new(FragmentDirectory::try_default().await?),
        };

        Ok(Config {
            api,
            document,
            target_id,
            refresh_interval,
            mode: self.mode.unwrap_or_default(),
            render: self.render.unwrap_or_default(),
        })
    }
}

fn labelled(label: DisplayLabel, track: ScrobbledTrack) -> NowPlaying {
    NowPlaying {
        label,
        track: track.info,
    }
}

/// The now playing widget: fetches a track and owns one target element
pub struct Widget {
    config: Config,
    // sequence number handed to the most recently started refresh
    issued: AtomicU64,
    // sequence number of the refresh whose result is on the page
    applied: Mutex<u64>,
}

impl Widget {
    /// Wrap a built [`Config`]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Widget {
            config,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
        }
    }

    /// Settings this widget runs with
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn fetch_track(&self) -> Result<Option<NowPlaying>> {
        let api = &self.config.api;
        match self.config.mode {
            Mode::NowPlaying => {
                if let Some(track) = api.now_playing().await? {
                    return Ok(Some(labelled(DisplayLabel::NowPlaying, track)));
                }
                debug!("Nothing is playing, falling back to top tracks");
                Ok(api
                    .top_track()
                    .await?
                    .map(|t| labelled(DisplayLabel::OnRepeatThisWeek, t)))
            }
            Mode::TopTracks => Ok(api
                .top_track()
                .await?
                .map(|t| labelled(DisplayLabel::MostPlayedThisWeek, t))),
            Mode::RecentTracks => Ok(api
                .recent_track()
                .await?
                .map(|t| labelled(DisplayLabel::RecentListening, t))),
        }
    }

    /// Query the API without touching the page
    pub async fn fetch(&self) -> RefreshOutcome {
        match self.fetch_track().await {
            Ok(Some(now)) => RefreshOutcome::Ok(now),
            Ok(None) => {
                debug!("No track to show");
                RefreshOutcome::Empty
            }
            Err(e) => {
                warn!("Refresh failed: {e}");
                RefreshOutcome::Error(e.kind())
            }
        }
    }

    /// Run one refresh cycle and render its outcome into the target.
    ///
    /// Never fails: errors clear the target and are reported in the outcome.
    /// A missing target skips the cycle without any network call. If a newer
    /// refresh has already rendered by the time this one resolves, its result
    /// is discarded.
    pub async fn refresh(&self) -> RefreshOutcome {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let target = self.config.target_id.as_str();
        if !self.config.document.contains(target).await {
            debug!("Target element {target:?} not found, skipping refresh #{seq}");
            return RefreshOutcome::Error(ErrorKind::MissingTarget);
        }

        let outcome = self.fetch().await;
        self.apply(seq, outcome).await
    }

    async fn apply(&self, seq: u64, outcome: RefreshOutcome) -> RefreshOutcome {
        let mut applied = self.applied.lock().await;
        if seq < *applied {
            debug!("Discarding stale refresh #{seq}, #{} is already rendered", *applied);
            return outcome;
        }
        *applied = seq;

        let html = render::render(&outcome, &self.config.render);
        match self
            .config
            .document
            .set_inner_html(&self.config.target_id, &html)
            .await
        {
            Ok(()) => {
                debug!("Rendered refresh #{seq}: {outcome:?}");
                outcome
            }
            Err(e) => {
                warn!(
                    "Failed to update target element {:?}: {e}",
                    self.config.target_id
                );
                RefreshOutcome::Error(e.kind())
            }
        }
    }

    /// Refresh now and then on every interval tick until the handle is stopped
    /// or dropped.
    ///
    /// Ticks do not wait for earlier refreshes, slow cycles overlap.
    pub fn start(self: Arc<Self>) -> WidgetHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = self.config.refresh_interval;
        info!(
            "Refreshing {:?} every {period:?} ({:?} mode)",
            self.config.target_id, self.config.mode
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut in_flight = JoinSet::new();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let widget = Arc::clone(&self);
                        in_flight.spawn(async move { widget.refresh().await });
                    }
                    Some(joined) = in_flight.join_next() => {
                        if let Err(e) = joined {
                            warn!("Refresh task failed: {e}");
                        }
                    }
                }
            }

            in_flight.shutdown().await;
            info!("Stopped refreshing {:?}", self.config.target_id);
        });

        WidgetHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Stops the refresh timer started by [`Widget::start`]
pub struct WidgetHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl WidgetHandle {
    /// Stop the timer, abort in-flight refreshes and wait for the loop to exit
    pub async fn stop(self) {
        let WidgetHandle { shutdown, task } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            warn!("Widget scheduler ended abnormally: {e}");
        }
    }

    /// True once the timer loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
