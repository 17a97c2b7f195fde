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

//! SoundFont engine backed by rustysynth.
//!
//! rustysynth does the bank parsing and voice rendering. This wrapper adapts it to
//! the [`Engine`] contract: layouts, dB gain, per-channel program tracking and the
//! drum-channel flag.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::ops::RangeInclusive;
use std::sync::Arc;

use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use tracing::{debug, warn};

use super::{BankData, Engine, EngineLoader, OutputLayout, PresetInfo};
use crate::error::LoadError;
use crate::gain;

/// Number of MIDI channels rustysynth renders.
const CHANNEL_COUNT: u8 = 16;

/// rustysynth treats this channel index as percussion and offsets its bank by 128.
const RUSTYSYNTH_PERCUSSION_CHANNEL: u8 = 9;

/// Bank number holding drum kits in a SoundFont.
const DRUM_BANK_OFFSET: i32 = 128;

/// Output sample rates rustysynth can render at.
pub const SAMPLE_RATES: RangeInclusive<u32> = 16_000..=192_000;

/// Voice limits accepted by rustysynth.
const MIN_VOICES: usize = 8;
const MAX_VOICES: usize = 256;

/// Frames rendered per rustysynth call. Larger requests are processed in chunks.
const SCRATCH_FRAMES: usize = 1024;

const DEFAULT_SAMPLE_RATE: u32 = 44100;

const CONTROL_CHANGE: i32 = 0xB0;
const PROGRAM_CHANGE: i32 = 0xC0;
const PITCH_BEND: i32 = 0xE0;
const CC_BANK_SELECT: i32 = 0x00;
const CC_ALL_SOUND_OFF: i32 = 0x78;
const CC_ALL_NOTES_OFF: i32 = 0x7B;

/// The program selected on a channel.
#[derive(Clone, Copy, Debug, Default)]
struct Program {
    bank: u16,
    preset: u8,
    drums: bool,
}

/// Loads SoundFont (sf2) banks into [`SoundFontEngine`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoundFontLoader;

impl EngineLoader for SoundFontLoader {
    fn load(&self, data: &BankData) -> Result<Box<dyn Engine>, LoadError> {
        Ok(Box::new(SoundFontEngine::from_bank(data)?))
    }
}

/// A loaded SoundFont and the synthesizer rendering it.
pub struct SoundFontEngine {
    sound_font: Arc<SoundFont>,
    synthesizer: Synthesizer,
    layout: OutputLayout,
    sample_rate: u32,
    max_voices: usize,
    gain_db: f32,
    programs: HashMap<u8, Program>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl SoundFontEngine {
    /// Parses a SoundFont from memory or from a file.
    pub fn from_bank(data: &BankData) -> Result<SoundFontEngine, LoadError> {
        let sound_font = match data {
            BankData::Bytes(bytes) => SoundFont::new(&mut Cursor::new(bytes))?,
            BankData::File(path) => SoundFont::new(&mut BufReader::new(File::open(path)?))?,
        };
        let sound_font = Arc::new(sound_font);
        debug!(
            bank = %data,
            presets = sound_font.get_presets().len(),
            "Parsed SoundFont"
        );

        let synthesizer = Self::build(&sound_font, DEFAULT_SAMPLE_RATE, MAX_VOICES)?;
        let mut engine = SoundFontEngine {
            sound_font,
            synthesizer,
            layout: OutputLayout::StereoInterleaved,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_voices: MAX_VOICES,
            gain_db: gain::DEFAULT_GAIN_DB,
            programs: HashMap::new(),
            left: vec![0.0; SCRATCH_FRAMES],
            right: vec![0.0; SCRATCH_FRAMES],
        };
        engine.apply_gain();
        Ok(engine)
    }

    fn build(
        sound_font: &Arc<SoundFont>,
        sample_rate: u32,
        max_voices: usize,
    ) -> Result<Synthesizer, LoadError> {
        if !SAMPLE_RATES.contains(&sample_rate) {
            return Err(LoadError::UnsupportedSampleRate(sample_rate));
        }
        let sample_rate =
            i32::try_from(sample_rate).map_err(|_| LoadError::UnsupportedSampleRate(sample_rate))?;
        let mut settings = SynthesizerSettings::new(sample_rate);
        settings.maximum_polyphony = max_voices;
        Ok(Synthesizer::new(sound_font, &settings)?)
    }

    /// Rebuilds the synthesizer after a settings change and restores channel programs.
    fn rebuild(&mut self) -> Result<(), LoadError> {
        self.synthesizer = Self::build(&self.sound_font, self.sample_rate, self.max_voices)?;
        self.apply_gain();
        self.restore_programs();
        Ok(())
    }

    /// Sends the tracked program of every channel to the synthesizer again.
    fn restore_programs(&mut self) {
        let programs: Vec<(u8, Program)> = self.programs.iter().map(|(c, p)| (*c, *p)).collect();
        for (channel, program) in programs {
            self.send_bank(channel, program.bank, program.drums);
            self.send_preset(channel, program.preset);
        }
    }

    fn apply_gain(&mut self) {
        self.synthesizer
            .set_master_volume(gain::db_to_linear(self.gain_db));
    }

    fn program(&self, channel: u8) -> Program {
        self.programs.get(&channel).copied().unwrap_or_default()
    }

    fn is_rendered_channel(channel: u8) -> bool {
        channel < CHANNEL_COUNT
    }

    fn send_bank(&mut self, channel: u8, bank: u16, drums: bool) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        let mut raw = i32::from(bank);
        if drums {
            raw += DRUM_BANK_OFFSET;
        }
        if channel == RUSTYSYNTH_PERCUSSION_CHANNEL {
            raw -= DRUM_BANK_OFFSET;
        }
        self.synthesizer
            .process_midi_message(i32::from(channel), CONTROL_CHANGE, CC_BANK_SELECT, raw);
    }

    fn send_preset(&mut self, channel: u8, preset: u8) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        self.synthesizer
            .process_midi_message(i32::from(channel), PROGRAM_CHANGE, i32::from(preset), 0);
    }

    fn send_all_channels(&mut self, controller: i32) {
        for channel in 0..CHANNEL_COUNT {
            self.synthesizer
                .process_midi_message(i32::from(channel), CONTROL_CHANGE, controller, 0);
        }
    }

    fn write_block(
        &self,
        buffer: &mut [f32],
        offset: usize,
        frames: usize,
        total: usize,
        mix: bool,
    ) {
        let left = &self.left[..frames];
        let right = &self.right[..frames];
        match self.layout {
            OutputLayout::StereoInterleaved => {
                let out = &mut buffer[offset * 2..(offset + frames) * 2];
                for (pair, (l, r)) in out.chunks_exact_mut(2).zip(left.iter().zip(right)) {
                    if mix {
                        pair[0] += l;
                        pair[1] += r;
                    } else {
                        pair[0] = *l;
                        pair[1] = *r;
                    }
                }
            }
            OutputLayout::StereoUnweaved => {
                let (out_left, out_right) = buffer.split_at_mut(total);
                let out_left = &mut out_left[offset..offset + frames];
                let out_right = &mut out_right[offset..offset + frames];
                if mix {
                    out_left.iter_mut().zip(left).for_each(|(o, s)| *o += s);
                    out_right.iter_mut().zip(right).for_each(|(o, s)| *o += s);
                } else {
                    out_left.copy_from_slice(left);
                    out_right.copy_from_slice(right);
                }
            }
            OutputLayout::Mono => {
                let out = &mut buffer[offset..offset + frames];
                for (o, (l, r)) in out.iter_mut().zip(left.iter().zip(right)) {
                    let sample = (l + r) * 0.5;
                    if mix {
                        *o += sample;
                    } else {
                        *o = sample;
                    }
                }
            }
        }
    }
}

impl Engine for SoundFontEngine {
    fn configure_output(
        &mut self,
        layout: OutputLayout,
        sample_rate: u32,
        gain_db: f32,
    ) -> Result<(), LoadError> {
        self.layout = layout;
        self.gain_db = gain_db;
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.rebuild()?;
        } else {
            self.apply_gain();
        }
        Ok(())
    }

    fn set_voice_cap(&mut self, max_voices: usize) -> Result<(), LoadError> {
        let clamped = max_voices.clamp(MIN_VOICES, MAX_VOICES);
        if clamped != max_voices {
            warn!(
                requested = max_voices,
                applied = clamped,
                "Voice cap outside the supported range, clamping"
            );
        }
        if clamped != self.max_voices {
            self.max_voices = clamped;
            self.rebuild()?;
        }
        Ok(())
    }

    fn select_bank(&mut self, channel: u8, bank: u16) {
        let program = self.programs.entry(channel).or_default();
        program.bank = bank;
        let drums = program.drums;
        self.send_bank(channel, bank, drums);
    }

    fn select_preset(&mut self, channel: u8, preset: u8, is_drum_channel: bool) {
        let program = self.programs.entry(channel).or_default();
        program.preset = preset;
        let bank = program.bank;
        let drums_changed = program.drums != is_drum_channel;
        program.drums = is_drum_channel;
        if drums_changed {
            self.send_bank(channel, bank, is_drum_channel);
        }
        self.send_preset(channel, preset);
    }

    fn preset_bank(&self, channel: u8) -> u16 {
        self.program(channel).bank
    }

    fn preset_number(&self, channel: u8) -> u8 {
        self.program(channel).preset
    }

    fn preset_name(&self, bank: u16, number: u8) -> Option<String> {
        self.sound_font
            .get_presets()
            .iter()
            .find(|preset| {
                preset.get_bank_number() == i32::from(bank)
                    && preset.get_patch_number() == i32::from(number)
            })
            .map(|preset| preset.get_name().to_string())
    }

    fn note_on(&mut self, channel: u8, key: u8, amplitude: f32) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        let velocity = (amplitude.clamp(0.0, 1.0) * 127.0).round() as i32;
        self.synthesizer
            .note_on(i32::from(channel), i32::from(key), velocity);
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        self.synthesizer.note_off(i32::from(channel), i32::from(key));
    }

    fn render(&mut self, buffer: &mut [f32], mix: bool) {
        let total = buffer.len() / self.layout.channels();
        let mut offset = 0;
        while offset < total {
            let frames = (total - offset).min(SCRATCH_FRAMES);
            self.synthesizer
                .render(&mut self.left[..frames], &mut self.right[..frames]);
            self.write_block(buffer, offset, frames, total, mix);
            offset += frames;
        }
    }

    fn preset_count(&self) -> usize {
        self.sound_font.get_presets().len()
    }

    fn presets(&self) -> Vec<PresetInfo> {
        let mut presets: Vec<PresetInfo> = self
            .sound_font
            .get_presets()
            .iter()
            .map(|preset| PresetInfo {
                bank: u16::try_from(preset.get_bank_number()).unwrap_or_default(),
                number: u8::try_from(preset.get_patch_number()).unwrap_or_default(),
                name: preset.get_name().to_string(),
            })
            .collect();
        presets.sort_by_key(|preset| (preset.bank, preset.number));
        presets
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        self.synthesizer.process_midi_message(
            i32::from(channel),
            CONTROL_CHANGE,
            i32::from(controller),
            i32::from(value),
        );
    }

    fn pitch_bend(&mut self, channel: u8, value: u16) {
        if !Self::is_rendered_channel(channel) {
            return;
        }
        self.synthesizer.process_midi_message(
            i32::from(channel),
            PITCH_BEND,
            i32::from(value & 0x7F),
            i32::from((value >> 7) & 0x7F),
        );
    }

    fn notes_off(&mut self, channel: Option<u8>) {
        match channel {
            Some(channel) => self.control_change(channel, CC_ALL_NOTES_OFF as u8, 0),
            None => self.send_all_channels(CC_ALL_NOTES_OFF),
        }
    }

    fn sounds_off(&mut self, channel: Option<u8>) {
        match channel {
            Some(channel) => self.control_change(channel, CC_ALL_SOUND_OFF as u8, 0),
            None => self.send_all_channels(CC_ALL_SOUND_OFF),
        }
    }

    fn reset(&mut self) {
        // rustysynth also resets each channel's bank and patch.
        self.synthesizer.reset();
        self.restore_programs();
    }
}
