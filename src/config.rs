// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Configuration, read from an optional YAML file and layered with `ENSEMBLE_*`
//! environment variables. Nested keys use `__`, e.g. `ENSEMBLE_BATCH__SIZE`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use crate::instrument::Instrument;
use crate::samples::resolver::DEFAULT_EXTENSION;

mod audio;
mod batch;
mod error;
mod instruments;
mod playback;

pub use self::audio::Audio;
pub use self::batch::Batch;
pub use self::error::ConfigError;
pub use self::instruments::InstrumentOverride;
pub use self::playback::MissingSamplePolicy;

pub const DEFAULT_TEMPO: Duration = Duration::from_millis(500);
/// The longest half note accepted.
pub const MAX_TEMPO: Duration = Duration::from_secs(60);
pub const DEFAULT_VOLUME: f32 = 1.0;

const ENV_PREFIX: &str = "ENSEMBLE";

/// The top level configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Ensemble {
    /// Root directory that asset paths are relative to.
    assets: Option<PathBuf>,

    /// Sample file extension (default: mp3).
    extension: Option<String>,

    /// Length of a half note, e.g. `500ms`.
    tempo: Option<String>,

    /// Master volume, 0.0 to 1.0.
    volume: Option<f32>,

    /// What sequences do with samples that fail to load.
    missing_sample: Option<MissingSamplePolicy>,

    batch: Option<Batch>,

    audio: Option<Audio>,

    /// Per-instrument profile overrides.
    instruments: Option<HashMap<Instrument, InstrumentOverride>>,
}

impl Ensemble {
    /// Loads the configuration from the given file, if any, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Ensemble, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Self::finish(builder)
    }

    /// Parses the configuration from a YAML string, layered with the environment.
    pub fn from_yaml(yaml: &str) -> Result<Ensemble, ConfigError> {
        Self::finish(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Ensemble, ConfigError> {
        let ensemble = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Ensemble>()?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Checks values that deserialize fine but can't be used.
    fn validate(&self) -> Result<(), ConfigError> {
        self.tempo()?;
        if self.audio().sample_rate() == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(volume) = self.volume {
            if !volume.is_finite() {
                return Err(ConfigError::Invalid {
                    field: "volume",
                    reason: format!("{} is not a number", volume),
                });
            }
        }
        self.batch().sample_timeout()?;
        Ok(())
    }

    pub fn assets(&self) -> &Path {
        self.assets.as_deref().unwrap_or_else(|| Path::new("."))
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }

    pub fn tempo(&self) -> Result<Duration, ConfigError> {
        match &self.tempo {
            Some(tempo) => parse_tempo(tempo),
            None => Ok(DEFAULT_TEMPO),
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume.unwrap_or(DEFAULT_VOLUME)
    }

    pub fn missing_sample(&self) -> MissingSamplePolicy {
        self.missing_sample.unwrap_or_default()
    }

    pub fn batch(&self) -> Batch {
        self.batch.clone().unwrap_or_default()
    }

    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn instruments(&self) -> HashMap<Instrument, InstrumentOverride> {
        self.instruments.clone().unwrap_or_default()
    }

    /// Replaces the output device, e.g. from a command line flag.
    pub fn set_device(&mut self, device: &str) {
        self.audio = Some(Audio::new(device).with_sample_rate(self.audio().sample_rate()));
    }

    pub fn set_missing_sample(&mut self, policy: MissingSamplePolicy) {
        self.missing_sample = Some(policy);
    }

    pub fn set_assets(&mut self, assets: &Path) {
        self.assets = Some(assets.to_path_buf());
    }
}

/// Parses a duration like `500ms` or `1s`.
pub fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::Duration {
            field,
            reason: e.to_string(),
        })
}

/// Parses a tempo, the length of a half note, and checks it's in range.
pub fn parse_tempo(value: &str) -> Result<Duration, ConfigError> {
    let tempo = parse_duration("tempo", value)?;
    check_tempo(tempo)?;
    Ok(tempo)
}

/// Checks a tempo is greater than zero and at most `MAX_TEMPO`.
pub fn check_tempo(tempo: Duration) -> Result<(), ConfigError> {
    if tempo.is_zero() {
        return Err(ConfigError::Invalid {
            field: "tempo",
            reason: "must be greater than zero".to_string(),
        });
    }
    if tempo > MAX_TEMPO {
        return Err(ConfigError::Invalid {
            field: "tempo",
            reason: format!("{:?} is longer than the maximum of {:?}", tempo, MAX_TEMPO),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;
    use crate::instrument::Dynamic;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = Ensemble::load(None).unwrap();
        assert_eq!(config.assets(), Path::new("."));
        assert_eq!(config.extension(), "mp3");
        assert_eq!(config.tempo().unwrap(), Duration::from_millis(500));
        assert_eq!(config.volume(), 1.0);
        assert_eq!(config.missing_sample(), MissingSamplePolicy::Skip);
        assert_eq!(config.batch().size(), 10);
        assert_eq!(
            config.batch().sample_timeout().unwrap(),
            Duration::from_millis(800)
        );
        assert_eq!(config.audio().device(), "default");
        assert_eq!(config.audio().sample_rate(), 44100);
        assert!(config.instruments().is_empty());
    }

    #[test]
    #[serial]
    fn test_full_yaml() {
        let config = Ensemble::from_yaml(
            r#"
            assets: /srv/samples
            extension: wav
            tempo: 400ms
            volume: 0.5
            missing_sample: synthesize
            batch:
              size: 4
              sample_timeout: 2s
            audio:
              device: mock-device
              sample_rate: 48000
            instruments:
              violin:
                path: custom/violin
                technique: pizzicato
              bass-drum:
                default_dynamic: forte
            "#,
        )
        .unwrap();

        assert_eq!(config.assets(), Path::new("/srv/samples"));
        assert_eq!(config.extension(), "wav");
        assert_eq!(config.tempo().unwrap(), Duration::from_millis(400));
        assert_eq!(config.volume(), 0.5);
        assert_eq!(config.missing_sample(), MissingSamplePolicy::Synthesize);
        assert_eq!(config.batch().size(), 4);
        assert_eq!(config.batch().sample_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(config.audio().sample_rate(), 48000);

        let instruments = config.instruments();
        assert_eq!(
            instruments[&Instrument::Violin],
            InstrumentOverride::new(
                Some("custom/violin".to_string()),
                Some("pizzicato".to_string()),
                None
            )
        );
        assert_eq!(
            instruments[&Instrument::BassDrum].default_dynamic(),
            Some(Dynamic::Forte)
        );
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "tempo: 250ms\nmissing_sample: abort").unwrap();

        let config = Ensemble::load(Some(file.path())).unwrap();
        assert_eq!(config.tempo().unwrap(), Duration::from_millis(250));
        assert_eq!(config.missing_sample(), MissingSamplePolicy::Abort);
    }

    #[test]
    #[serial]
    fn test_invalid_values() {
        assert!(matches!(
            Ensemble::from_yaml("tempo: soon"),
            Err(ConfigError::Duration { field: "tempo", .. })
        ));
        assert!(matches!(
            Ensemble::from_yaml("tempo: 0ms"),
            Err(ConfigError::Invalid { field: "tempo", .. })
        ));
        assert!(matches!(
            Ensemble::from_yaml("tempo: 1000h"),
            Err(ConfigError::Invalid { field: "tempo", .. })
        ));
        assert!(matches!(
            Ensemble::from_yaml("audio:\n  sample_rate: 0"),
            Err(ConfigError::Invalid {
                field: "audio.sample_rate",
                ..
            })
        ));
        assert!(matches!(
            Ensemble::from_yaml("missing_sample: shrug"),
            Err(ConfigError::Load(_))
        ));
        assert!(matches!(
            Ensemble::from_yaml("batch:\n  sample_timeout: never"),
            Err(ConfigError::Duration { .. })
        ));
        assert!(Ensemble::load(Some(Path::new("/does/not/exist.yaml"))).is_err());
    }

    #[test]
    fn test_parse_tempo_bounds() {
        assert_eq!(parse_tempo("400ms").unwrap(), Duration::from_millis(400));
        assert_eq!(parse_tempo("60s").unwrap(), MAX_TEMPO);
        assert!(matches!(
            parse_tempo("61s"),
            Err(ConfigError::Invalid { field: "tempo", .. })
        ));
        assert!(matches!(
            parse_tempo("0s"),
            Err(ConfigError::Invalid { field: "tempo", .. })
        ));
        assert!(matches!(
            parse_tempo("later"),
            Err(ConfigError::Duration { field: "tempo", .. })
        ));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("ENSEMBLE_TEMPO", "300ms");
        std::env::set_var("ENSEMBLE_BATCH__SIZE", "3");
        std::env::set_var("ENSEMBLE_AUDIO__DEVICE", "silent");

        let config = Ensemble::from_yaml("tempo: 400ms\naudio:\n  device: mock");

        std::env::remove_var("ENSEMBLE_TEMPO");
        std::env::remove_var("ENSEMBLE_BATCH__SIZE");
        std::env::remove_var("ENSEMBLE_AUDIO__DEVICE");

        let config = config.unwrap();
        assert_eq!(config.tempo().unwrap(), Duration::from_millis(300));
        assert_eq!(config.batch().size(), 3);
        assert_eq!(config.audio().device(), "silent");
    }

    #[test]
    #[serial]
    fn test_setters() {
        let mut config = Ensemble::from_yaml("audio:\n  sample_rate: 22050").unwrap();
        config.set_device("mock-cli");
        config.set_missing_sample(MissingSamplePolicy::Abort);
        config.set_assets(Path::new("assets"));

        assert_eq!(config.audio().device(), "mock-cli");
        assert_eq!(config.audio().sample_rate(), 22050);
        assert_eq!(config.missing_sample(), MissingSamplePolicy::Abort);
        assert_eq!(config.assets(), Path::new("assets"));
    }
}
