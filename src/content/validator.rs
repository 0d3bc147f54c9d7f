use serde::Serialize;

use super::model::{ContentConfig, Slide};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// `field: message` lines, one per error.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&mut self, field: impl Into<String>, message: &str) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.to_string(),
        });
    }
}

/// Check the semantic rules serde cannot express. Collects every problem
/// rather than stopping at the first one.
pub fn validate(config: &ContentConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.names.his.trim().is_empty() {
        result.push("names.his", "His name is required");
    }
    if config.names.hers.trim().is_empty() {
        result.push("names.hers", "Her name is required");
    }
    if config.date.trim().is_empty() {
        result.push("date", "Date is required");
    }

    validate_audio(config, &mut result);
    validate_sections(config, &mut result);

    if config.video.path.is_empty() {
        result.push("video.path", "Video path is required");
    }
    if config.video.audio_path.is_empty() {
        result.push("video.audioPath", "Video audio path is required");
    }
    if !(config.video.cue_point >= 0.0) {
        result.push("video.cuePoint", "Video cue point must be a non-negative number");
    }

    if config.final_message.trim().is_empty() {
        result.push("finalMessage", "Final message is required");
    }

    for (index, cue) in config.cues.iter().enumerate() {
        if cue.track >= config.audio.tracks.len() {
            result.push(format!("cues[{index}].track"), "Cue track must reference an audio track");
        }
        if !(cue.at_seconds >= 0.0) {
            result.push(
                format!("cues[{index}].atSeconds"),
                "Cue time must be a non-negative number",
            );
        }
    }

    result
}

fn validate_audio(config: &ContentConfig, result: &mut ValidationResult) {
    if config.audio.tracks.is_empty() {
        result.push("audio.tracks", "At least one audio track is required");
    }

    for (index, track) in config.audio.tracks.iter().enumerate() {
        if track.name.trim().is_empty() {
            result.push(format!("audio.tracks[{index}].name"), "Track name is required");
        }
        if track.path.trim().is_empty() {
            result.push(format!("audio.tracks[{index}].path"), "Track path is required");
        }
    }
}

fn validate_sections(config: &ContentConfig, result: &mut ValidationResult) {
    if config.sections.is_empty() {
        result.push("sections", "At least one section is required");
    }

    for (section_index, section) in config.sections.iter().enumerate() {
        let prefix = format!("sections[{section_index}]");

        if section.id != section_index {
            result.push(format!("{prefix}.id"), "Section id must equal its position");
        }
        if section.title.trim().is_empty() {
            result.push(format!("{prefix}.title"), "Section title is required");
        }
        if section.slides.is_empty() {
            result.push(format!("{prefix}.slides"), "Section must have at least one slide");
        }

        for (slide_index, slide) in section.slides.iter().enumerate() {
            let field = format!("{prefix}.slides[{slide_index}]");
            match slide {
                Slide::Text(text) if text.content.trim().is_empty() => {
                    result.push(format!("{field}.content"), "Slide content is required");
                }
                Slide::Photo(photo) if photo.content.trim().is_empty() => {
                    result.push(format!("{field}.content"), "Slide content is required");
                }
                Slide::Collage(collage) => {
                    if collage.photos.is_empty() {
                        result.push(
                            format!("{field}.photos"),
                            "Collage slides must have at least one photo",
                        );
                    }
                    for (photo_index, photo) in collage.photos.iter().enumerate() {
                        if photo.src.trim().is_empty() {
                            result.push(
                                format!("{field}.photos[{photo_index}].src"),
                                "Collage photo src is required",
                            );
                        }
                    }
                }
                _ => {}
            }

            if slide.duration_ms() == 0 {
                result.push(
                    format!("{field}.duration"),
                    "Slide duration must be a positive number",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_fixtures::sample_config;

    fn fields(result: &ValidationResult) -> Vec<&str> {
        result.errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn sample_config_is_valid() {
        let result = validate(&sample_config(&[2, 3, 1]));
        assert!(result.is_valid(), "{}", result.summary());
    }

    #[test]
    fn rejects_missing_names_and_sections() {
        let mut config = sample_config(&[1]);
        config.names.his.clear();
        config.sections.clear();

        let result = validate(&config);
        assert!(!result.is_valid());
        assert!(fields(&result).contains(&"names.his"));
        assert!(fields(&result).contains(&"sections"));
    }

    #[test]
    fn rejects_out_of_order_ids_and_zero_duration() {
        let mut config = sample_config(&[1, 1]);
        config.sections[1].id = 5;
        if let Slide::Text(text) = &mut config.sections[0].slides[0] {
            text.duration = 0;
        }

        let result = validate(&config);
        assert_eq!(
            fields(&result),
            vec!["sections[0].slides[0].duration", "sections[1].id"]
        );
    }

    #[test]
    fn rejects_empty_collage_and_bad_cue() {
        let mut config = sample_config(&[1]);
        config.sections[0].slides.push(Slide::Collage(crate::content::model::CollageSlide {
            content: String::new(),
            duration: 3000,
            photos: Vec::new(),
            layout: None,
        }));
        config.cues[0].track = 9;

        let result = validate(&config);
        assert!(fields(&result).contains(&"sections[0].slides[1].photos"));
        assert!(fields(&result).contains(&"cues[0].track"));
    }

    #[test]
    fn missing_optional_fields_are_fine() {
        let mut config = sample_config(&[1]);
        config.names.initials = None;
        assert!(validate(&config).is_valid());
    }
}
