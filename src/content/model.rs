use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Raw declarative story configuration, as authored in `content.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentConfig {
    #[serde(default)]
    pub names: Names,
    #[serde(default)]
    pub date: String,
    pub audio: AudioConfig,
    pub sections: Vec<Section>,
    pub video: VideoDescriptor,
    #[serde(default)]
    pub final_message: String,
    /// Time-based cues fired from audio playback (e.g. the closing declaration).
    #[serde(default)]
    pub cues: Vec<CueConfig>,
}

impl ContentConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content from {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse content from {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Names {
    #[serde(default)]
    pub his: String,
    #[serde(default)]
    pub hers: String,
    #[serde(default)]
    pub initials: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    #[serde(default)]
    pub tracks: Vec<AudioTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioTrack {
    pub name: String,
    pub path: String,
    /// Ids of the sections that play under this track.
    #[serde(default)]
    pub sections: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    pub id: usize,
    pub title: String,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Slide {
    Text(TextSlide),
    Photo(PhotoSlide),
    Collage(CollageSlide),
}

impl Slide {
    pub fn duration_ms(&self) -> u64 {
        match self {
            Slide::Text(text) => text.duration,
            Slide::Photo(photo) => photo.duration,
            Slide::Collage(collage) => collage.duration,
        }
    }

    pub fn special(&self) -> Option<SpecialStyle> {
        match self {
            Slide::Text(text) => text.special,
            _ => None,
        }
    }

    /// Every image URL the slide renders, in display order.
    pub fn image_urls(&self) -> Vec<&str> {
        match self {
            Slide::Text(text) => text.background_photo.as_deref().into_iter().collect(),
            Slide::Photo(photo) if !photo.content.is_empty() => vec![photo.content.as_str()],
            Slide::Photo(_) => Vec::new(),
            Slide::Collage(collage) => collage
                .photos
                .iter()
                .map(|photo| photo.src.as_str())
                .filter(|src| !src.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextSlide {
    /// Line-break separated text, may carry `*emphasis*` markers.
    pub content: String,
    pub duration: u64,
    #[serde(default)]
    pub special: Option<SpecialStyle>,
    #[serde(default)]
    pub background_photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSlide {
    pub content: String,
    pub duration: u64,
    #[serde(default)]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollageSlide {
    #[serde(default)]
    pub content: String,
    pub duration: u64,
    #[serde(default)]
    pub photos: Vec<CollagePhoto>,
    #[serde(default)]
    pub layout: Option<CollageLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollagePhoto {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub focal_point: Option<FocalPoint>,
    #[serde(default)]
    pub collage_role: Option<CollageRole>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpecialStyle {
    Overlay,
    /// Terminal interactive slide: never auto-advances.
    Valentine,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FocalPoint {
    #[serde(rename = "top center")]
    TopCenter,
    #[serde(rename = "center center")]
    CenterCenter,
    #[serde(rename = "top left")]
    TopLeft,
    #[serde(rename = "top right")]
    TopRight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollageRole {
    Hero,
    Accent,
    Strip,
    Equal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CollageLayout {
    HeroFeature,
    PolaroidScatter,
    IntimateDuo,
    MasonryBurst,
    CinematicStrip,
    FeaturedStrip,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub path: String,
    pub audio_path: String,
    /// Seconds into the closing track where the video takes over.
    pub cue_point: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CueConfig {
    pub name: String,
    pub track: usize,
    pub at_seconds: f64,
}
