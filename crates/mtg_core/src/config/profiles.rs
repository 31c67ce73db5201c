//! Hardware profiles and field-level overrides.
//!
//! A profile is a named preset resolved once, before a run starts, into
//! the explicit [`Settings`]. Overrides (CLI flags, environment variables)
//! are applied after it. Precedence, lowest first:
//! defaults < config file < profile < overrides.

use std::fmt;
use std::str::FromStr;

use super::manager::ConfigError;
use super::settings::Settings;
use crate::frames::FrameMode;

/// Named hardware preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Entry-level GPU; small models, vision on CPU.
    Laptop,
    /// Workstation GPU; large models.
    Pc,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Laptop, Profile::Pc];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Laptop => "laptop",
            Profile::Pc => "pc",
        }
    }

    /// Hardware the profile is sized for.
    pub fn description(&self) -> &'static str {
        match self {
            Profile::Laptop => "GTX 1050 Ti (4GB VRAM), 48GB RAM",
            Profile::Pc => "RTX 4090 (24GB VRAM), 96GB RAM",
        }
    }

    pub fn whisper_model(&self) -> &'static str {
        match self {
            Profile::Laptop => "small",
            Profile::Pc => "large-v3",
        }
    }

    pub fn vision_model(&self) -> &'static str {
        match self {
            Profile::Laptop => "llava-v1.6-mistral-7b",
            Profile::Pc => "llava-v1.6-34b",
        }
    }

    pub fn text_model(&self) -> &'static str {
        match self {
            Profile::Laptop => "phi-3-mini-4k-instruct",
            Profile::Pc => "llama-3.1-70b-instruct",
        }
    }

    pub fn vision_on_cpu(&self) -> bool {
        matches!(self, Profile::Laptop)
    }

    /// Write this profile's fields into `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        settings.transcription.model = self.whisper_model().to_string();
        settings.inference.vision_model = self.vision_model().to_string();
        settings.inference.text_model = self.text_model().to_string();
        settings.inference.vision_on_cpu = self.vision_on_cpu();
    }

    /// Comma-separated profile names.
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownProfile {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

/// Field-level overrides applied after the profile.
///
/// Every field left `None` keeps the value already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub output_folder: Option<String>,
    pub lm_studio_url: Option<String>,
    pub text_model: Option<String>,
    pub vision_model: Option<String>,
    pub whisper_model: Option<String>,
    pub transcription_url: Option<String>,
    pub interval_secs: Option<f64>,
    pub interval_mode: bool,
    pub max_key_frames: Option<u32>,
    pub max_frames_to_analyze: Option<u32>,
    pub threshold: Option<f64>,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut settings.paths.output_folder, &self.output_folder);
        set(&mut settings.inference.base_url, &self.lm_studio_url);
        set(&mut settings.inference.text_model, &self.text_model);
        set(&mut settings.inference.vision_model, &self.vision_model);
        set(&mut settings.transcription.model, &self.whisper_model);
        set(&mut settings.transcription.service_url, &self.transcription_url);
        set(&mut settings.frames.interval_secs, &self.interval_secs);
        set(&mut settings.frames.max_key_frames, &self.max_key_frames);
        set(
            &mut settings.inference.max_frames_to_analyze,
            &self.max_frames_to_analyze,
        );
        set(&mut settings.frames.threshold, &self.threshold);

        if self.interval_mode {
            settings.frames.mode = FrameMode::Interval;
        }
    }
}

/// Resolve the settings for one run.
///
/// `base` is the default or file-loaded settings. The result is validated.
pub fn resolve_settings(
    mut base: Settings,
    profile: Option<Profile>,
    overrides: &Overrides,
) -> Result<Settings, ConfigError> {
    if let Some(profile) = profile {
        tracing::debug!("[Config] Applying profile {} ({})", profile, profile.description());
        profile.apply(&mut base);
    }
    overrides.apply(&mut base);
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_names() {
        assert_eq!("laptop".parse::<Profile>().unwrap(), Profile::Laptop);
        assert_eq!(" PC ".parse::<Profile>().unwrap(), Profile::Pc);
    }

    #[test]
    fn unknown_profile_lists_available() {
        let err = "server".parse::<Profile>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("server"));
        assert!(msg.contains("laptop, pc"));
    }

    #[test]
    fn profile_sets_models() {
        let mut settings = Settings::default();
        Profile::Pc.apply(&mut settings);
        assert_eq!(settings.transcription.model, "large-v3");
        assert_eq!(settings.inference.text_model, "llama-3.1-70b-instruct");
        assert!(!settings.inference.vision_on_cpu);

        Profile::Laptop.apply(&mut settings);
        assert_eq!(settings.inference.vision_model, "llava-v1.6-mistral-7b");
        assert!(settings.inference.vision_on_cpu);
    }

    #[test]
    fn overrides_beat_profile() {
        let overrides = Overrides {
            text_model: Some("llama-3.2-3b".to_string()),
            interval_mode: true,
            max_key_frames: Some(4),
            ..Overrides::default()
        };
        let settings =
            resolve_settings(Settings::default(), Some(Profile::Pc), &overrides).unwrap();

        assert_eq!(settings.inference.text_model, "llama-3.2-3b");
        // Untouched profile fields survive
        assert_eq!(settings.inference.vision_model, "llava-v1.6-34b");
        assert_eq!(settings.frames.mode, FrameMode::Interval);
        assert_eq!(settings.frames.max_key_frames, 4);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let overrides = Overrides {
            max_key_frames: Some(0),
            ..Overrides::default()
        };
        let result = resolve_settings(Settings::default(), None, &overrides);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
