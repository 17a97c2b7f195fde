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
use std::path::Path;

use crate::synth::Synth;

mod error;
mod synth;

pub use error::ConfigError;
pub use synth::{ProgramDefinition, SoundFontDefinition, SynthConfig};

/// Builds a synth from the config file at `path`: loads its SoundFonts and selects
/// its programs. The synth is not started.
pub fn init_synth(path: &Path) -> Result<(Synth, SynthConfig), ConfigError> {
    let config = SynthConfig::deserialize(path)?;
    let base_path = path.parent().unwrap_or_else(|| Path::new("."));
    let mut synth = Synth::new(config.gain(), config.sample_rate());
    config.apply(&mut synth, base_path)?;
    Ok((synth, config))
}
