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

use std::io;

use crate::audio::AudioError;
use crate::registry::Sfid;

/// Errors returned by configuration operations on a [`crate::Synth`].
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Invalid SoundFont id {0}")]
    InvalidId(Sfid),

    #[error("Invalid channel {0} (channel not assigned)")]
    ChannelUnassigned(u8),

    #[error("Unable to load SoundFont: {0}")]
    Load(#[from] LoadError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Invalid scheduler state: {0}")]
    InvalidState(&'static str),
}

/// Errors produced while turning bank data into a configured engine. A failed load
/// leaves the registry untouched.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SoundFont parse error: {0}")]
    SoundFont(#[from] rustysynth::SoundFontError),

    #[error("Synthesizer error: {0}")]
    Synthesizer(#[from] rustysynth::SynthesizerError),

    #[error("Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Invalid sample bank: {0}")]
    Invalid(String),
}
