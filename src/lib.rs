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
//! Routes channel events to any number of loaded SoundFont engines and mixes them
//! into one real-time stereo stream.
//!
//! A [`Synth`] owns a registry of loaded engines, a channel router and a playback
//! scheduler. Load a bank, select a program on a channel, start playback and send
//! notes:
//!
//! ```no_run
//! use sfmixer::Synth;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut synth = Synth::new(0.0, 44100);
//! let piano = synth.load("piano.sf2")?;
//! synth.program_select(0, piano, 0, 0)?;
//! synth.start()?;
//! synth.note_on(0, 60, 100);
//! # Ok(())
//! # }
//! ```
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod gain;
pub mod registry;
pub mod router;
pub mod synth;
#[cfg(test)]
mod testutil;

pub use engine::{BankData, Engine, EngineLoader, OutputLayout, PresetInfo};
pub use error::{LoadError, SynthError};
pub use registry::Sfid;
pub use synth::{LoadOptions, ProgramInfo, Synth};
