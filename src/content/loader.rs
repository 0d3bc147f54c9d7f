use anyhow::{bail, Result};
use serde::Serialize;

use super::model::{AudioTrack, ContentConfig, CueConfig, Slide, VideoDescriptor};
use super::validator::validate;

/// A slide plus the fields derived from it at load time.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSlide {
    pub slide: Slide,
    /// Non-empty trimmed lines of a text slide, in authoring order. Empty for
    /// photo and collage slides.
    pub lines: Vec<String>,
}

impl ProcessedSlide {
    fn new(slide: &Slide) -> Self {
        let lines = match slide {
            Slide::Text(text) => parse_text_lines(&text.content),
            _ => Vec::new(),
        };
        Self {
            slide: slide.clone(),
            lines,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.slide.duration_ms()
    }

    pub fn image_urls(&self) -> Vec<&str> {
        self.slide.image_urls()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSection {
    pub id: usize,
    pub title: String,
    pub slides: Vec<ProcessedSlide>,
    pub audio_track_index: usize,
    /// Fraction of the whole story (0..1) that precedes this section.
    pub start_position: f64,
}

impl ProcessedSection {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn last_slide_index(&self) -> usize {
        self.slides.len().saturating_sub(1)
    }
}

/// Where a section id lands: a slide-bearing section or the closing video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage<'a> {
    Section(&'a ProcessedSection),
    Terminal(&'a VideoDescriptor),
}

/// Immutable story content, derived once from a validated [`ContentConfig`].
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    sections: Vec<ProcessedSection>,
    audio_tracks: Vec<AudioTrack>,
    video: VideoDescriptor,
    cues: Vec<CueConfig>,
    total_slides: usize,
}

impl Content {
    /// Validate and process a configuration. Pure: the same input always
    /// yields an equal `Content`.
    pub fn load(config: &ContentConfig) -> Result<Self> {
        let validation = validate(config);
        if !validation.is_valid() {
            bail!(
                "Content configuration validation failed:\n{}",
                validation.summary()
            );
        }

        let total_slides: usize = config.sections.iter().map(|s| s.slides.len()).sum();
        let mut preceding = 0usize;
        let sections = config
            .sections
            .iter()
            .map(|section| {
                let start_position = fraction(preceding, total_slides);
                preceding += section.slides.len();
                ProcessedSection {
                    id: section.id,
                    title: section.title.clone(),
                    slides: section.slides.iter().map(ProcessedSlide::new).collect(),
                    audio_track_index: track_index_for_section(section.id, &config.audio.tracks),
                    start_position,
                }
            })
            .collect();

        Ok(Self {
            sections,
            audio_tracks: config.audio.tracks.clone(),
            video: config.video.clone(),
            cues: config.cues.clone(),
            total_slides,
        })
    }

    pub fn sections(&self) -> &[ProcessedSection] {
        &self.sections
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio_tracks
    }

    pub fn video(&self) -> &VideoDescriptor {
        &self.video
    }

    pub fn cues(&self) -> &[CueConfig] {
        &self.cues
    }

    pub fn total_slides(&self) -> usize {
        self.total_slides
    }

    /// Id of the closing video pseudo-section (one past the last section).
    pub fn terminal_id(&self) -> usize {
        self.sections.len()
    }

    pub fn section_by_id(&self, id: usize) -> Option<&ProcessedSection> {
        // ids equal positions once validated
        self.sections.get(id)
    }

    pub fn stage(&self, id: usize) -> Option<Stage<'_>> {
        match self.section_by_id(id) {
            Some(section) => Some(Stage::Section(section)),
            None if id == self.terminal_id() => Some(Stage::Terminal(&self.video)),
            None => None,
        }
    }

    pub fn slide(&self, section_id: usize, slide_index: usize) -> Option<&ProcessedSlide> {
        self.section_by_id(section_id)?.slides.get(slide_index)
    }

    /// Share of the story before `(section_id, slide_index)`. Equals the
    /// section's `start_position` at slide 0; the terminal stage reports 1.0.
    pub fn progress_fraction(&self, section_id: usize, slide_index: usize) -> f64 {
        let before: usize = self
            .sections
            .iter()
            .take(section_id.min(self.sections.len()))
            .map(ProcessedSection::slide_count)
            .sum();
        let within = match self.section_by_id(section_id) {
            Some(section) => slide_index.min(section.last_slide_index()),
            None => 0,
        };
        fraction(before + within, self.total_slides)
    }

    pub fn audio_track_path_for_section(&self, section_id: usize) -> &str {
        let index = self
            .section_by_id(section_id)
            .map(|s| s.audio_track_index)
            .unwrap_or(0);
        self.audio_tracks
            .get(index)
            .map(|t| t.path.as_str())
            .unwrap_or("")
    }

    /// Every photo referenced anywhere in the story, in document order.
    pub fn all_photos(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.slides.iter())
            .flat_map(ProcessedSlide::image_urls)
            .collect()
    }
}

fn parse_text_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn track_index_for_section(section_id: usize, tracks: &[AudioTrack]) -> usize {
    tracks
        .iter()
        .position(|track| track.sections.contains(&section_id))
        .unwrap_or(0)
}

fn fraction(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
