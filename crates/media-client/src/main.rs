mod cli;

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use media_client::mpv::MpvElement;
use media_client::player::{EngineFactory, MediaElement};
use media_client::playlist::VariantEngineFactory;
use media_client::{
    CatalogStore, MediaApi, PlayerAdapter, PlayerOptions, SessionOrchestrator, SessionState,
    StreamApi, Transport,
};
use media_proto::config::{Config, EngineKind};
use media_proto::format;
use media_proto::settings::{PreferenceStore, SettingKey, Settings};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Command, SettingsAction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(server) = &cli.server {
        config.client.base_url = server.clone();
    }

    init_logging(&config)?;
    info!("Config loaded, server at {}", config.client.base_url);

    let transport = Transport::from_config(&config.client)?;
    let api = MediaApi::new(transport.clone());
    let catalog = CatalogStore::new(Arc::new(api.clone()));
    let mut prefs = PreferenceStore::load(config.paths.settings_file.clone());

    match cli.command {
        Command::Status => {
            let status = api.server_status().await?;
            println!("status:  {}", status.status);
            println!("version: {}", status.version.as_deref().unwrap_or("unknown"));
            println!("uptime:  {}", format::uptime(status.uptime));
            if let Some(time) = status.time {
                println!("time:    {}", time);
            }
        }
        Command::List { search } => {
            catalog.refresh().await?;
            let snapshot = catalog.set_search_term(search.as_deref().unwrap_or(""));
            for record in &snapshot.filtered {
                println!(
                    "{:<12} {:<48} {:<6} {:>10} {:>9}",
                    record.id,
                    record.filename,
                    record.format.as_deref().unwrap_or("-"),
                    format::file_size(record.size),
                    format::duration(record.duration),
                );
            }
            let stats = &snapshot.stats;
            println!(
                "\n{} of {} files, {}, {} formats, {} total",
                snapshot.filtered.len(),
                stats.total_files,
                format::file_size(stats.total_size_bytes),
                stats.distinct_formats.len(),
                format::duration(stats.total_duration()),
            );
        }
        Command::Show { id } => {
            let record = catalog.fetch_details(&id).await?;
            print_details(&record);
        }
        Command::Scan => {
            let snapshot = catalog.rescan().await?;
            println!("Rescan complete: {} media files", snapshot.stats.total_files);
        }
        Command::Play { id, direct } => {
            let settings = prefs.get().clone();
            if direct {
                play_direct(&config, &settings, &api, &catalog, &id).await?;
            } else {
                play_hls(&config, &settings, &transport, api, &id).await?;
            }
        }
        Command::Settings { action } => match action {
            None => {
                for key in SettingKey::ALL {
                    println!("{} = {}", key.name(), prefs.get().value(key));
                }
            }
            Some(SettingsAction::Get { key }) => {
                let key: SettingKey = key.parse()?;
                println!("{}", prefs.get().value(key));
            }
            Some(SettingsAction::Set { key, value }) => {
                prefs.set(&key, &value)?;
                println!("Saved to {}", prefs.path().display());
            }
        },
    }

    Ok(())
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let log_path = &config.paths.log_file;
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,media_client=debug,mediadeck=debug,hyper=warn,reqwest=warn",
                )
            }),
        )
        .init();
    Ok(())
}

fn print_details(record: &media_proto::model::MediaRecord) {
    println!("{}", record.filename);
    println!("  id:        {}", record.id);
    println!("  format:    {}", record.format.as_deref().unwrap_or("unknown"));
    println!("  size:      {}", format::file_size(record.size));
    println!("  duration:  {}", format::duration(record.duration));
    println!("  created:   {}", format::created(&record.created_time));
    if let Some(resolution) = record.resolution() {
        println!("  video:     {} {}", resolution, record.video_codec.as_deref().unwrap_or(""));
    }
    if let Some(fps) = record.frame_rate {
        println!("  fps:       {:.2}", fps);
    }
    if let Some(bitrate) = record.bitrate {
        println!("  bitrate:   {}", format::bitrate(bitrate));
    }
    if let Some(codec) = &record.audio_codec {
        let rate = record
            .audio_sample_rate
            .map(|r| format!(" {} Hz", r))
            .unwrap_or_default();
        let layout = record
            .channel_layout
            .clone()
            .or_else(|| record.audio_channels.map(|c| format!("{} ch", c)))
            .map(|l| format!(" {}", l))
            .unwrap_or_default();
        println!("  audio:     {}{}{}", codec, rate, layout);
    }
    if let Some(path) = &record.path {
        println!("  path:      {}", path);
    }
}

fn build_player(config: &Config, settings: &Settings, transport: &Transport) -> PlayerAdapter {
    let element = MpvElement::new(config.player.mpv_binary.as_ref());
    let factory: Arc<dyn EngineFactory> = Arc::new(VariantEngineFactory::new(
        transport.clone(),
        config.player.engine == EngineKind::Variant,
    ));
    PlayerAdapter::new(
        Box::new(element),
        Some(factory),
        PlayerOptions {
            hls_base_url: config.hls_base_url().to_string(),
            autoplay: settings.auto_play,
            volume: settings.default_volume,
            looping: settings.loop_playback,
        },
    )
}

async fn play_hls(
    config: &Config,
    settings: &Settings,
    transport: &Transport,
    api: MediaApi,
    id: &str,
) -> anyhow::Result<()> {
    let player = Arc::new(Mutex::new(build_player(config, settings, transport)));
    let streams: Arc<dyn StreamApi> = Arc::new(api);
    let orchestrator =
        SessionOrchestrator::new(streams, Some(player.clone()), config.polling.clone());

    let handle = orchestrator.start_playback(id).await;
    let max_attempts = config.polling.max_attempts;
    let mut progress = handle.watch();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let session = progress.borrow_and_update().clone();
            if session.state == SessionState::Polling && session.attempts > 0 {
                eprintln!("Preparing stream... ({}/{})", session.attempts, max_attempts);
            }
        }
    });
    let outcome = handle.wait_terminal().await;
    reporter.abort();

    let Some(session) = outcome else {
        bail!("playback session for {} was cancelled", id);
    };
    match session.state {
        SessionState::Ready => {
            println!("Playing {} (Ctrl-C to stop)", id);
        }
        SessionState::TimedOut if config.polling.handoff_on_timeout => {
            eprintln!("Warning: stream preparation taking longer than expected, opening anyway");
        }
        SessionState::TimedOut => {
            eprintln!("Warning: stream preparation taking longer than expected");
            return Ok(());
        }
        _ => {
            let reason = session
                .error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("{}", reason);
        }
    }
    if let Some(reason) = session.player_error {
        orchestrator.stop_playback().await;
        bail!("stream {} is ready but could not be played: {}", id, reason);
    }

    tokio::signal::ctrl_c().await?;
    orchestrator.stop_playback().await;
    if let Err(e) = player.lock().await.destroy().await {
        warn!("player teardown failed: {}", e);
    }
    Ok(())
}

async fn play_direct(
    config: &Config,
    settings: &Settings,
    api: &MediaApi,
    catalog: &CatalogStore,
    id: &str,
) -> anyhow::Result<()> {
    let filename = match catalog.refresh().await {
        Ok(_) => catalog.get_by_id(id).map(|r| r.filename).unwrap_or_default(),
        Err(e) => {
            warn!("catalog refresh before direct session failed: {}", e);
            String::new()
        }
    };
    let ticket = api.create_session(id, &filename).await?;
    if !ticket.success {
        bail!("failed to create streaming session");
    }
    let url = ticket
        .playback_url(api.transport().base_url())
        .context("server returned neither stream_url nor session_id")?;
    info!("direct session for {}: {}", id, url);

    let mut element = MpvElement::new(config.player.mpv_binary.as_ref());
    element.set_source(Some(&url)).await?;
    element
        .apply_preferences(settings.default_volume, settings.loop_playback)
        .await?;
    if settings.auto_play {
        element.play().await?;
    }
    println!("Playing {} (Ctrl-C to stop)", url);

    tokio::signal::ctrl_c().await?;
    element.shutdown().await;
    Ok(())
}
