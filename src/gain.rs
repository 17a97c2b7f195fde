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

/// The gain applied when neither the synth nor a load asks for one.
pub const DEFAULT_GAIN_DB: f32 = 0.0;

/// Gains below this are treated as silence when converting from linear.
const SILENCE_DB: f32 = -100.0;

/// Combines the synth-wide base gain with the gain requested for a single load.
pub fn combine(base_db: f32, load_db: f32) -> f32 {
    base_db + load_db
}

/// Converts a relative dB value to a linear amplitude scale.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Converts a linear amplitude scale to relative dB.
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        return SILENCE_DB;
    }
    (20.0 * linear.log10()).max(SILENCE_DB)
}
