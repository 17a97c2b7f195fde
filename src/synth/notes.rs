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

use tracing::trace;

use super::Synth;

/// Highest key, velocity, controller number and controller value.
pub const MIDI_MAX: u8 = 127;

/// Highest 14-bit pitch bend value.
pub const PITCH_BEND_MAX: u16 = 16383;

/// The pitch bend value that leaves pitch unchanged.
pub const PITCH_BEND_CENTER: u16 = 8192;

impl Synth {
    /// Plays a note. Velocity is 0-127 and is passed to the engine as an amplitude
    /// in [0, 1].
    pub fn note_on(&self, channel: u8, key: u8, velocity: u8) -> bool {
        if key > MIDI_MAX || velocity > MIDI_MAX {
            return false;
        }
        let Some(engine) = self.routed_engine(channel) else {
            return false;
        };
        let amplitude = f32::from(velocity) / f32::from(MIDI_MAX);
        engine.lock().note_on(channel, key, amplitude);
        trace!(channel, key, velocity, "Note on");
        true
    }

    /// Releases a note.
    pub fn note_off(&self, channel: u8, key: u8) -> bool {
        if key > MIDI_MAX {
            return false;
        }
        let Some(engine) = self.routed_engine(channel) else {
            return false;
        };
        engine.lock().note_off(channel, key);
        trace!(channel, key, "Note off");
        true
    }

    /// Sends a MIDI control change to the channel's engine.
    pub fn control_change(&self, channel: u8, controller: u8, value: u8) -> bool {
        if controller > MIDI_MAX || value > MIDI_MAX {
            return false;
        }
        let Some(engine) = self.routed_engine(channel) else {
            return false;
        };
        engine.lock().control_change(channel, controller, value);
        true
    }

    /// Bends the pitch of the channel. 8192 is centre.
    pub fn pitch_bend(&self, channel: u8, value: u16) -> bool {
        if value > PITCH_BEND_MAX {
            return false;
        }
        let Some(engine) = self.routed_engine(channel) else {
            return false;
        };
        engine.lock().pitch_bend(channel, value);
        true
    }

    /// Releases every note on a channel, or on every channel of every engine when
    /// `channel` is `None`.
    pub fn notes_off(&self, channel: Option<u8>) -> bool {
        match channel {
            Some(channel) => match self.routed_engine(channel) {
                Some(engine) => {
                    engine.lock().notes_off(Some(channel));
                    true
                }
                None => false,
            },
            None => {
                self.registry
                    .engines()
                    .for_each(|engine| engine.lock().notes_off(None));
                true
            }
        }
    }

    /// Silences a channel immediately, or every engine when `channel` is `None`.
    pub fn sounds_off(&self, channel: Option<u8>) -> bool {
        match channel {
            Some(channel) => match self.routed_engine(channel) {
                Some(engine) => {
                    engine.lock().sounds_off(Some(channel));
                    true
                }
                None => false,
            },
            None => {
                self.registry
                    .engines()
                    .for_each(|engine| engine.lock().sounds_off(None));
                true
            }
        }
    }
}
