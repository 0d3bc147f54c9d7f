pub mod audio;
mod cli;
pub mod content;
pub mod images;
pub mod navigation;
pub mod session;
pub mod settings;
mod utils;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use audio::ClockAudio;
use cli::Args;
use content::{Content, ContentConfig, Slide, Stage};
use images::{FsImageLoader, NetworkAdapter};
use navigation::NavigationSnapshot;
use session::StorySession;
use settings::{EngineSettings, SettingsStore};

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    info!("storyreel starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    runtime.block_on(play(args))
}

async fn play(args: Args) -> Result<()> {
    let config = ContentConfig::from_path(&args.content)?;
    let content = Arc::new(
        Content::load(&config)
            .with_context(|| format!("Invalid story content in {}", args.content.display()))?,
    );

    let mut settings = match &args.settings {
        Some(path) => SettingsStore::new(path.clone())?.engine(),
        None => EngineSettings::default(),
    };
    // headless runs always play
    settings.autoplay = true;
    settings.start_muted |= args.muted;

    let root = args
        .content
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let session = StorySession::start(
        Arc::clone(&content),
        &settings,
        FsImageLoader::new(root),
        Arc::new(ClockAudio::spawn()),
        NetworkAdapter::from_env(),
    )
    .await;
    info!("Session {} playing {}", session.id(), args.content.display());

    if let Some(section) = args.section {
        if !session.controller().jump_to(section, 0).await {
            warn!("No section {}, starting from the beginning", section);
        }
    }

    let mut snapshots = session.controller().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_position = None;
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        let position = snapshot.state.position();
        if last_position != Some(position) {
            describe(&content, &snapshot);
            last_position = Some(position);
        }
        if snapshot.state.is_complete() {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
            changed = snapshots.changed() => {
                changed.context("story controller stopped unexpectedly")?;
            }
        }
    }

    let stats = session.scheduler().stats();
    info!(
        "Images: {} cached, {} preloaded, {} failed",
        session.cache().len(),
        stats.loaded,
        stats.failed
    );
    session.shutdown().await
}

fn describe(content: &Content, snapshot: &NavigationSnapshot) {
    let (section_id, slide_index) = snapshot.state.position();
    let progress = snapshot.progress * 100.0;

    match content.stage(section_id) {
        Some(Stage::Section(section)) => {
            let Some(slide) = section.slides.get(slide_index) else {
                return;
            };
            let what = match &slide.slide {
                Slide::Text(_) => format!("\"{}\"", slide.lines.join(" / ")),
                Slide::Photo(photo) => format!("photo {}", photo.content),
                Slide::Collage(collage) => format!("collage of {} photos", collage.photos.len()),
            };
            info!(
                "[{:>3.0}%] {} ({}/{}): {}",
                progress,
                section.title,
                slide_index + 1,
                section.slide_count(),
                what
            );
        }
        Some(Stage::Terminal(video)) => {
            info!("[100%] Closing video {}", video.path);
        }
        None => {}
    }
}
