use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::{ImageBuffer, Rgb};
use serde_json::json;

use storyreel_lib::audio::ClockAudio;
use storyreel_lib::content::{Content, ContentConfig};
use storyreel_lib::images::{DecodedImage, FsImageLoader, ImageCache, ImageLoader, NetworkAdapter};
use storyreel_lib::navigation::StoryController;
use storyreel_lib::session::StorySession;
use storyreel_lib::settings::EngineSettings;

fn story_json(duration: u64) -> serde_json::Value {
    json!({
        "names": { "his": "Daniel", "hers": "Alo" },
        "date": "Our Story",
        "audio": {
            "tracks": [
                { "name": "First", "path": "/audio/first.mp3", "sections": [0] },
                { "name": "Second", "path": "/audio/second.mp3", "sections": [1, 2] }
            ]
        },
        "sections": [
            {
                "id": 0,
                "title": "Beginnings",
                "slides": [
                    {
                        "type": "text",
                        "content": "It started\n\n with a hello",
                        "duration": duration
                    },
                    { "type": "photo", "content": "/photos/a.png", "duration": duration }
                ]
            },
            {
                "id": 1,
                "title": "Travels",
                "slides": [
                    {
                        "type": "photo",
                        "content": "/photos/b.png",
                        "duration": duration,
                        "altText": "beach"
                    },
                    {
                        "type": "collage",
                        "duration": duration,
                        "layout": "masonry-burst",
                        "photos": [
                            { "src": "/photos/c.png", "alt": "city", "focalPoint": "top center" },
                            { "src": "/photos/missing.png" }
                        ]
                    },
                    { "type": "photo", "content": "/photos/a.png", "duration": duration }
                ]
            },
            {
                "id": 2,
                "title": "Forever",
                "slides": [
                    {
                        "type": "text",
                        "content": "Will you?",
                        "duration": duration,
                        "special": "valentine"
                    }
                ]
            }
        ],
        "video": { "path": "/video/final.mp4", "audioPath": "/audio/second.mp3", "cuePoint": 90 },
        "finalMessage": "Always"
    })
}

fn write_story(dir: &Path, duration: u64) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("photos")).unwrap();
    for (name, color) in [("a", [200, 0, 0]), ("b", [0, 200, 0]), ("c", [0, 0, 200])] {
        let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Rgb(color));
        buffer.save(dir.join(format!("photos/{name}.png"))).unwrap();
    }
    let path = dir.join("content.json");
    std::fs::write(&path, serde_json::to_string_pretty(&story_json(duration)).unwrap()).unwrap();
    path
}

/// Loader that never touches the disk.
struct Placeholders;

impl ImageLoader for Placeholders {
    fn load(&self, url: &str) -> impl Future<Output = Result<DecodedImage>> + Send {
        let url = url.to_string();
        async move { Ok(DecodedImage::placeholder(url, 1, 1)) }
    }
}

#[test]
fn content_loads_from_disk_with_progress_positions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_story(dir.path(), 3000);
    let content = Content::load(&ContentConfig::from_path(&path).unwrap()).unwrap();

    assert_eq!(content.total_slides(), 6);
    assert_eq!(content.terminal_id(), 3);
    for section in content.sections() {
        assert_eq!(content.progress_fraction(section.id, 0), section.start_position);
    }
    assert_eq!(content.progress_fraction(2, 0), 5.0 / 6.0);
    assert_eq!(content.audio_track_path_for_section(2), "/audio/second.mp3");
    assert_eq!(
        content.all_photos(),
        vec![
            "/photos/a.png",
            "/photos/b.png",
            "/photos/c.png",
            "/photos/missing.png",
            "/photos/a.png"
        ]
    );
    assert_eq!(content.sections()[0].slides[0].lines, vec!["It started", "with a hello"]);
}

#[test]
fn invalid_content_reports_every_problem() {
    let mut raw = story_json(3000);
    raw["names"]["his"] = json!("");
    raw["sections"][1]["id"] = json!(7);
    let config: ContentConfig = serde_json::from_value(raw).unwrap();

    let message = format!("{:#}", Content::load(&config).unwrap_err());
    assert!(message.contains("names.his"), "{message}");
    assert!(message.contains("sections[1].id"), "{message}");
}

#[tokio::test(start_paused = true)]
async fn navigation_walks_forward_and_back() {
    let content = Content::load(&serde_json::from_value(story_json(3000)).unwrap()).unwrap();
    let controller = StoryController::new(Arc::new(content));

    assert!(controller.jump_to(1, 2).await);
    for _ in 0..3 {
        controller.retreat().await;
    }
    assert_eq!(controller.state().await.position(), (0, 1));

    assert!(!controller.jump_to(42, 0).await);
    assert_eq!(controller.state().await.position(), (0, 1));

    controller.toggle_playback().await;
    controller.toggle_playback().await;
    let state = controller.state().await;
    assert!(!state.is_playing());

    controller.reset().await;
    for _ in 0..6 {
        controller.advance().await;
    }
    let state = controller.state().await;
    assert!(state.is_complete() && !state.is_playing());
    controller.shutdown().await;
}

#[tokio::test]
async fn cache_evicts_least_recently_used() {
    let cache = ImageCache::new(Placeholders, 2);
    for url in ["a", "b", "c"] {
        cache.get(url).await.unwrap();
    }

    assert!(!cache.has("a"));
    assert!(cache.has("b"));
    assert!(cache.has("c"));
}

#[tokio::test]
async fn plays_a_story_from_disk_until_the_valentine_slide() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_story(dir.path(), 40);
    let content = Arc::new(Content::load(&ContentConfig::from_path(&path).unwrap()).unwrap());
    let settings = EngineSettings {
        autoplay: true,
        hints_path: Some(dir.path().join("hints.json")),
        ..EngineSettings::default()
    };

    let session = StorySession::start(
        content,
        &settings,
        FsImageLoader::new(dir.path()),
        Arc::new(ClockAudio::spawn()),
        NetworkAdapter::new(None),
    )
    .await;

    // the valentine slide stops auto-advance
    let controller = session.controller().clone();
    let mut snapshots = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.state.position() == (2, 0)),
    )
    .await
    .unwrap()
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.state().await.position(), (2, 0));
    assert!(session.cache().has("/photos/a.png"));

    // an explicit jump still reaches the closing stage
    assert!(controller.jump_to(3, 0).await);
    tokio::time::timeout(Duration::from_secs(1), session.wait_until_complete())
        .await
        .unwrap()
        .unwrap();

    session.shutdown().await.unwrap();
    assert!(dir.path().join("hints.json").exists());
}
