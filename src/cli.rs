use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rnowplaying::clients::{
    Document, FragmentDirectory, LastFmClient, MemoryDocument,
    errors::Result,
    lastfm::{DEFAULT_TIMEOUT, LastFmSettings},
};
use rnowplaying::render::{self, RenderOptions};
use rnowplaying::widget::{
    Config, ConfigBuilder, DEFAULT_REFRESH_INTERVAL, DEFAULT_TARGET_ID, Mode, Widget,
};

#[derive(Parser)]
#[command(name = "rnowplaying")]
#[command(version, about = "Render a Last.fm now playing widget into a page fragment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the fragment on a timer until interrupted
    Run(WidgetArgs),
    /// Refresh the fragment once
    Once(WidgetArgs),
    /// Fetch once and print the fragment to stdout
    Print(WidgetArgs),
}

#[derive(Args)]
struct WidgetArgs {
    /// Last.fm user name, defaults to $LASTFM_USER
    #[arg(long)]
    user: Option<String>,
    /// Last.fm API key, defaults to $LASTFM_API_KEY
    #[arg(long)]
    api_key: Option<String>,
    /// API root, defaults to $LASTFM_API_ROOT or the public Last.fm endpoint
    #[arg(long)]
    api_root: Option<String>,
    /// Directory holding `<target-id>.html`, defaults to the user cache directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_TARGET_ID)]
    target_id: String,
    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
    interval_secs: u64,
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
    #[arg(long, value_enum, default_value_t = Mode::NowPlaying)]
    mode: Mode,
    /// Leave out the Spotify and YouTube search links
    #[arg(long)]
    no_search_links: bool,
    /// Create an empty fragment file if the target does not exist yet
    #[arg(long)]
    create_target: bool,
}

impl WidgetArgs {
    fn lastfm_client(&self) -> Result<LastFmClient> {
        LastFmClient::from_settings(LastFmSettings {
            user: self.user.clone(),
            api_key: self.api_key.clone(),
            api_root: self.api_root.clone(),
            timeout: Some(Duration::from_secs(self.timeout_secs)),
        })
    }

    async fn fragment_directory(&self) -> Result<FragmentDirectory> {
        let directory = match &self.out_dir {
            Some(dir) => FragmentDirectory::new(dir),
            None => FragmentDirectory::try_default().await?,
        };
        if self.create_target {
            directory.ensure_element(&self.target_id).await?;
        }
        Ok(directory)
    }

    async fn config(&self, document: Arc<dyn Document>) -> Result<Config> {
        let lastfm = self.lastfm_client()?;
        info!("Using Last.fm user {}", lastfm.user());
        ConfigBuilder::new()
            .api(Arc::new(lastfm))
            .document(document)
            .target_id(self.target_id.clone())
            .refresh_interval(Duration::from_secs(self.interval_secs))
            .mode(self.mode)
            .render(RenderOptions {
                search_links: !self.no_search_links,
            })
            .build()
            .await
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run_widget(args).await,
        Commands::Once(args) => refresh_once(args).await,
        Commands::Print(args) => print_fragment(args).await,
    }
}

async fn run_widget(args: &WidgetArgs) -> Result<()> {
    let document = args.fragment_directory().await?;
    info!("Writing fragments to {:?}", document.root());
    let widget = Arc::new(Widget::new(args.config(Arc::new(document)).await?));

    let handle = widget.start();
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
    }
    info!("Shutting down ...");
    handle.stop().await;
    Ok(())
}

async fn refresh_once(args: &WidgetArgs) -> Result<()> {
    let document = args.fragment_directory().await?;
    let widget = Widget::new(args.config(Arc::new(document)).await?);
    let outcome = widget.refresh().await;
    info!("Refresh finished: {outcome:?}");
    Ok(())
}

async fn print_fragment(args: &WidgetArgs) -> Result<()> {
    // fetch only, the document is never written
    let widget = Widget::new(args.config(Arc::new(MemoryDocument::new())).await?);
    let outcome = widget.fetch().await;
    println!("{}", render::render(&outcome, &widget.config().render));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rnowplaying::clients::errors::ErrorKind;

    fn parse_args(args: &[&str]) -> WidgetArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(args) | Commands::Once(args) | Commands::Print(args) => args,
        }
    }

    #[test]
    fn test_defaults_follow_library_constants() {
        let args = parse_args(&["rnowplaying", "once"]);
        assert_eq!(args.interval_secs, DEFAULT_REFRESH_INTERVAL.as_secs());
        assert_eq!(args.timeout_secs, DEFAULT_TIMEOUT.as_secs());
        assert_eq!(args.target_id, DEFAULT_TARGET_ID);
        assert_eq!(args.mode, Mode::NowPlaying);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let args = parse_args(&[
            "rnowplaying",
            "print",
            "--user",
            "tester",
            "--api-key",
            "secret",
            "--timeout-secs",
            "0",
        ]);
        let err = args.lastfm_client().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
