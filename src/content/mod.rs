pub mod loader;
pub mod model;
pub mod validator;

pub use loader::{Content, ProcessedSection, ProcessedSlide, Stage};
pub use model::{ContentConfig, Slide, SpecialStyle};
pub use validator::{validate, ValidationError, ValidationResult};

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::model::*;

    /// A valid config with one section per entry in `sizes`. Slide 0 of each
    /// section is text, the rest are photos at `/photos/s{section}/{slide}.jpg`.
    pub fn sample_config(sizes: &[usize]) -> ContentConfig {
        let sections = sizes
            .iter()
            .enumerate()
            .map(|(id, &count)| Section {
                id,
                title: format!("Chapter {id}"),
                slides: (0..count)
                    .map(|slide| {
                        if slide == 0 {
                            Slide::Text(TextSlide {
                                content: format!("Chapter {id}\n\n  begins here  "),
                                duration: 4000,
                                special: None,
                                background_photo: None,
                            })
                        } else {
                            Slide::Photo(PhotoSlide {
                                content: format!("/photos/s{id}/{slide}.jpg"),
                                duration: 5000,
                                alt_text: None,
                            })
                        }
                    })
                    .collect(),
            })
            .collect();

        ContentConfig {
            names: Names {
                his: "Daniel".into(),
                hers: "Alo".into(),
                initials: Some("D & A".into()),
            },
            date: "Our Story".into(),
            audio: AudioConfig {
                tracks: vec![
                    AudioTrack {
                        name: "One".into(),
                        path: "/audio/one.mp3".into(),
                        sections: vec![0],
                    },
                    AudioTrack {
                        name: "Two".into(),
                        path: "/audio/two.mp3".into(),
                        sections: (1..sizes.len()).collect(),
                    },
                ],
            },
            sections,
            video: VideoDescriptor {
                path: "/video/final.mp4".into(),
                audio_path: "/audio/two.mp3".into(),
                cue_point: 90.0,
            },
            final_message: "Forever".into(),
            cues: vec![CueConfig {
                name: "declaration".into(),
                track: 1,
                at_seconds: 140.0,
            }],
        }
    }
}
