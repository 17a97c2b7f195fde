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

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

mod soundfont;

pub use soundfont::{SoundFontEngine, SoundFontLoader, SAMPLE_RATES};

/// How an engine lays out the samples it renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputLayout {
    /// Left/right pairs, one pair per frame.
    StereoInterleaved,
    /// All left samples for the block followed by all right samples.
    StereoUnweaved,
    /// A single channel.
    Mono,
}

impl OutputLayout {
    /// Number of samples a single frame occupies in this layout.
    pub fn channels(&self) -> usize {
        match self {
            OutputLayout::StereoInterleaved | OutputLayout::StereoUnweaved => 2,
            OutputLayout::Mono => 1,
        }
    }
}

/// Raw sample bank data handed to an engine loader.
#[derive(Clone, Debug)]
pub enum BankData {
    /// The bank is already in memory.
    Bytes(Vec<u8>),
    /// The bank should be read from a file.
    File(PathBuf),
}

impl fmt::Display for BankData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankData::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            BankData::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<Vec<u8>> for BankData {
    fn from(bytes: Vec<u8>) -> Self {
        BankData::Bytes(bytes)
    }
}

impl From<&[u8]> for BankData {
    fn from(bytes: &[u8]) -> Self {
        BankData::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for BankData {
    fn from(path: PathBuf) -> Self {
        BankData::File(path)
    }
}

impl From<&Path> for BankData {
    fn from(path: &Path) -> Self {
        BankData::File(path.to_path_buf())
    }
}

impl From<&str> for BankData {
    fn from(path: &str) -> Self {
        BankData::File(PathBuf::from(path))
    }
}

/// A preset available in a loaded bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetInfo {
    pub bank: u16,
    pub number: u8,
    pub name: String,
}

/// A synthesis engine for one loaded sample bank.
///
/// Configuration and channel events are called from the controlling thread, `render`
/// from the audio thread. The synth serializes access to each engine, so
/// implementations only need to be `Send`.
pub trait Engine: Send {
    /// Sets the output layout, sample rate and gain (relative dB) the engine renders with.
    fn configure_output(
        &mut self,
        layout: OutputLayout,
        sample_rate: u32,
        gain_db: f32,
    ) -> Result<(), LoadError>;

    /// Sets the maximum number of simultaneous voices. Enforcing the cap, including
    /// stealing voices when it is exceeded, is up to the engine.
    fn set_voice_cap(&mut self, max_voices: usize) -> Result<(), LoadError>;

    /// Selects the bank used by the next preset selection on the channel.
    fn select_bank(&mut self, channel: u8, bank: u16);

    /// Selects a preset on the channel. Drum channels map distinct samples to each key.
    fn select_preset(&mut self, channel: u8, preset: u8, is_drum_channel: bool);

    /// The bank currently selected on the channel.
    fn preset_bank(&self, channel: u8) -> u16;

    /// The preset number currently selected on the channel.
    fn preset_number(&self, channel: u8) -> u8;

    /// The name of a preset, or `None` if the bank has no such preset.
    fn preset_name(&self, bank: u16, number: u8) -> Option<String>;

    /// Starts a note. `amplitude` is in [0, 1].
    fn note_on(&mut self, channel: u8, key: u8, amplitude: f32);

    /// Releases a note.
    fn note_off(&mut self, channel: u8, key: u8);

    /// Renders `buffer.len()` samples in the configured layout. With `mix` false the
    /// buffer is overwritten, including with zeros when nothing is playing. With `mix`
    /// true the rendered samples are added to the existing contents.
    fn render(&mut self, buffer: &mut [f32], mix: bool);

    /// Number of presets in the bank.
    fn preset_count(&self) -> usize {
        0
    }

    /// Every preset in the bank.
    fn presets(&self) -> Vec<PresetInfo> {
        Vec::new()
    }

    /// Applies a MIDI control change on the channel.
    fn control_change(&mut self, _channel: u8, _controller: u8, _value: u8) {}

    /// Applies a 14-bit pitch bend on the channel. 8192 is centre.
    fn pitch_bend(&mut self, _channel: u8, _value: u16) {}

    /// Releases every playing note on one channel, or on all channels.
    fn notes_off(&mut self, _channel: Option<u8>) {}

    /// Silences every voice on one channel, or on all channels, without release.
    fn sounds_off(&mut self, _channel: Option<u8>) {}

    /// Stops every voice at once and returns all channel controllers to their
    /// defaults. The programs selected on each channel are kept.
    fn reset(&mut self) {
        self.sounds_off(None);
    }
}

/// Builds engines from bank data.
pub trait EngineLoader: Send {
    /// Parses the bank and returns an unconfigured engine for it.
    fn load(&self, data: &BankData) -> Result<Box<dyn Engine>, LoadError>;
}
