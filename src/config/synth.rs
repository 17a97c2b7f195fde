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
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;
use tracing::info;

use super::error::ConfigError;
use crate::audio::cpal::DEFAULT_DEVICE;
use crate::registry::{Sfid, DEFAULT_MAX_VOICES};
use crate::synth::{LoadOptions, Synth, DEFAULT_SAMPLE_RATE};

/// A YAML representation of a synth setup.
#[derive(Deserialize, Clone, Debug)]
pub struct SynthConfig {
    /// Base gain in relative dB (default: 0).
    gain: Option<f32>,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// The audio device to play through (default: the host's default output).
    audio_device: Option<String>,

    /// SoundFonts to load, by name.
    #[serde(default)]
    soundfonts: BTreeMap<String, SoundFontDefinition>,

    /// Programs to select once the SoundFonts are loaded.
    #[serde(default)]
    programs: Vec<ProgramDefinition>,
}

/// A SoundFont to load.
#[derive(Deserialize, Clone, Debug)]
pub struct SoundFontDefinition {
    /// Path to the sf2 file. Relative paths are resolved against the config file.
    path: String,

    /// Gain for this SoundFont in relative dB, on top of the synth gain.
    gain: Option<f32>,

    /// Maximum simultaneous voices (default: 256).
    max_voices: Option<usize>,
}

impl SoundFontDefinition {
    /// The load options for this SoundFont.
    pub fn options(&self) -> LoadOptions {
        LoadOptions {
            gain_db: self.gain.unwrap_or(crate::gain::DEFAULT_GAIN_DB),
            max_voices: self.max_voices.unwrap_or(DEFAULT_MAX_VOICES),
        }
    }

    /// The path of the SoundFont, resolved against `base_path`.
    pub fn resolve(&self, base_path: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_path.join(path)
        }
    }
}

/// A program to select on a channel.
#[derive(Deserialize, Clone, Debug)]
pub struct ProgramDefinition {
    /// The channel to select the program on.
    channel: u8,

    /// The name of the SoundFont, as given under `soundfonts`.
    soundfont: String,

    /// The bank (default: 0).
    #[serde(default)]
    bank: u16,

    /// The preset number (default: 0).
    #[serde(default)]
    preset: u8,
}

impl ProgramDefinition {
    /// The channel this program is selected on.
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl SynthConfig {
    /// Parses a synth config from a YAML file.
    pub fn deserialize(path: &Path) -> Result<SynthConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<SynthConfig>()?)
    }

    /// Returns the base gain from the configuration.
    pub fn gain(&self) -> f32 {
        self.gain.unwrap_or(crate::gain::DEFAULT_GAIN_DB)
    }

    /// Returns the sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the audio device name (default: the host's default output).
    pub fn audio_device(&self) -> &str {
        self.audio_device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// The SoundFont definitions, by name.
    pub fn soundfonts(&self) -> &BTreeMap<String, SoundFontDefinition> {
        &self.soundfonts
    }

    /// The program definitions.
    pub fn programs(&self) -> &[ProgramDefinition] {
        &self.programs
    }

    /// Loads the configured SoundFonts into the synth, in name order, and selects the
    /// configured programs. Returns the id of each SoundFont by name.
    pub fn apply(
        &self,
        synth: &mut Synth,
        base_path: &Path,
    ) -> Result<HashMap<String, Sfid>, ConfigError> {
        // Check programs first so that a bad mapping loads nothing.
        for program in &self.programs {
            if !self.soundfonts.contains_key(&program.soundfont) {
                return Err(ConfigError::UnknownSoundFont {
                    channel: program.channel,
                    name: program.soundfont.clone(),
                });
            }
        }

        let mut loaded = HashMap::new();
        for (name, definition) in &self.soundfonts {
            let sfid =
                synth.load_with_options(definition.resolve(base_path), definition.options())?;
            loaded.insert(name.clone(), sfid);
        }

        for program in &self.programs {
            let sfid = loaded[&program.soundfont];
            synth.program_select(program.channel, sfid, program.bank, program.preset)?;
        }

        info!(
            soundfonts = loaded.len(),
            programs = self.programs.len(),
            "Synth configuration applied"
        );
        Ok(loaded)
    }
}
