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

use std::{
    collections::HashMap,
    f32::consts::PI,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use parking_lot::Mutex;

use crate::engine::{BankData, Engine, EngineLoader, OutputLayout, PresetInfo};
use crate::error::LoadError;

/// Marks bytes that the stub loader accepts as a bank.
const STUB_MAGIC: &[u8] = b"STUB";

/// An engine call recorded by a [`StubEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    ConfigureOutput {
        layout: OutputLayout,
        sample_rate: u32,
        gain_db: f32,
    },
    SetVoiceCap(usize),
    SelectBank {
        channel: u8,
        bank: u16,
    },
    SelectPreset {
        channel: u8,
        preset: u8,
        drums: bool,
    },
    NoteOn {
        channel: u8,
        key: u8,
        amplitude: f32,
    },
    NoteOff {
        channel: u8,
        key: u8,
    },
    Render {
        len: usize,
        mix: bool,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        value: u16,
    },
    NotesOff(Option<u8>),
    SoundsOff(Option<u8>),
    Reset,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// An engine that records every call and renders a deterministic ramp.
///
/// Each engine's ramp is scaled by its load index so that engines are
/// distinguishable in a mix. A gated engine is silent until a note is on, then
/// scales the ramp by the sum of the held amplitudes.
pub struct StubEngine {
    index: usize,
    gated: bool,
    log: CallLog,
    programs: HashMap<u8, (u16, u8)>,
    held: HashMap<(u8, u8), f32>,
}

impl StubEngine {
    fn sample(&self, position: usize) -> f32 {
        let level = 0.1 * (self.index + 1) as f32;
        let ramp = ((position % 8) as f32 - 3.5) / 8.0;
        if self.gated {
            ramp * level * self.held.values().sum::<f32>()
        } else {
            ramp * level
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().push(call);
    }
}

impl Engine for StubEngine {
    fn configure_output(
        &mut self,
        layout: OutputLayout,
        sample_rate: u32,
        gain_db: f32,
    ) -> Result<(), LoadError> {
        self.record(Call::ConfigureOutput {
            layout,
            sample_rate,
            gain_db,
        });
        Ok(())
    }

    fn set_voice_cap(&mut self, max_voices: usize) -> Result<(), LoadError> {
        self.record(Call::SetVoiceCap(max_voices));
        Ok(())
    }

    fn select_bank(&mut self, channel: u8, bank: u16) {
        self.record(Call::SelectBank { channel, bank });
        self.programs.entry(channel).or_default().0 = bank;
    }

    fn select_preset(&mut self, channel: u8, preset: u8, is_drum_channel: bool) {
        self.record(Call::SelectPreset {
            channel,
            preset,
            drums: is_drum_channel,
        });
        self.programs.entry(channel).or_default().1 = preset;
    }

    fn preset_bank(&self, channel: u8) -> u16 {
        self.programs.get(&channel).map(|p| p.0).unwrap_or_default()
    }

    fn preset_number(&self, channel: u8) -> u8 {
        self.programs.get(&channel).map(|p| p.1).unwrap_or_default()
    }

    fn preset_name(&self, bank: u16, number: u8) -> Option<String> {
        (bank == 0 && number < 2).then(|| format!("Stub {} preset {}", self.index, number))
    }

    fn note_on(&mut self, channel: u8, key: u8, amplitude: f32) {
        self.record(Call::NoteOn {
            channel,
            key,
            amplitude,
        });
        self.held.insert((channel, key), amplitude);
    }

    fn note_off(&mut self, channel: u8, key: u8) {
        self.record(Call::NoteOff { channel, key });
        self.held.remove(&(channel, key));
    }

    fn render(&mut self, buffer: &mut [f32], mix: bool) {
        self.record(Call::Render {
            len: buffer.len(),
            mix,
        });
        for (position, out) in buffer.iter_mut().enumerate() {
            let sample = self.sample(position);
            if mix {
                *out += sample;
            } else {
                *out = sample;
            }
        }
    }

    fn preset_count(&self) -> usize {
        2
    }

    fn presets(&self) -> Vec<PresetInfo> {
        (0..2)
            .filter_map(|number| {
                self.preset_name(0, number).map(|name| PresetInfo {
                    bank: 0,
                    number,
                    name,
                })
            })
            .collect()
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) {
        self.record(Call::ControlChange {
            channel,
            controller,
            value,
        });
    }

    fn pitch_bend(&mut self, channel: u8, value: u16) {
        self.record(Call::PitchBend { channel, value });
    }

    fn notes_off(&mut self, channel: Option<u8>) {
        self.record(Call::NotesOff(channel));
        self.held.retain(|(c, _), _| channel.is_some_and(|channel| channel != *c));
    }

    fn sounds_off(&mut self, channel: Option<u8>) {
        self.record(Call::SoundsOff(channel));
        self.held.retain(|(c, _), _| channel.is_some_and(|channel| channel != *c));
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
        self.held.clear();
    }
}

/// Builds [`StubEngine`]s and keeps their call logs, indexed by load order.
#[derive(Clone, Default)]
pub struct StubLoader {
    gated: bool,
    logs: Arc<Mutex<Vec<CallLog>>>,
}

impl StubLoader {
    /// A loader whose engines always render their ramp.
    pub fn new() -> StubLoader {
        StubLoader::default()
    }

    /// A loader whose engines only sound while a note is held.
    pub fn gated() -> StubLoader {
        StubLoader {
            gated: true,
            ..StubLoader::default()
        }
    }

    /// Bank data the stub loader accepts.
    pub fn bank() -> BankData {
        BankData::Bytes(STUB_MAGIC.to_vec())
    }

    /// Calls recorded by the engine created by the nth successful load.
    pub fn calls(&self, engine: usize) -> Vec<Call> {
        self.logs.lock()[engine].lock().clone()
    }

    /// Calls other than rendering, which the audio thread may add at any time.
    pub fn control_calls(&self, engine: usize) -> Vec<Call> {
        self.calls(engine)
            .into_iter()
            .filter(|call| !matches!(call, Call::Render { .. }))
            .collect()
    }

    /// Mix flags of every render the engine performed.
    pub fn renders(&self, engine: usize) -> Vec<bool> {
        self.calls(engine)
            .into_iter()
            .filter_map(|call| match call {
                Call::Render { mix, .. } => Some(mix),
                _ => None,
            })
            .collect()
    }

    /// Number of engines created so far.
    pub fn engines(&self) -> usize {
        self.logs.lock().len()
    }
}

impl EngineLoader for StubLoader {
    fn load(&self, data: &BankData) -> Result<Box<dyn Engine>, LoadError> {
        if let BankData::Bytes(bytes) = data {
            if !bytes.starts_with(STUB_MAGIC) {
                return Err(LoadError::Invalid("not a stub bank".to_string()));
            }
        }

        let log = CallLog::default();
        let mut logs = self.logs.lock();
        let engine = StubEngine {
            index: logs.len(),
            gated: self.gated,
            log: log.clone(),
            programs: HashMap::new(),
            held: HashMap::new(),
        };
        logs.push(log);
        Ok(Box::new(engine))
    }
}

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let mut tick = Duration::from_millis(5);
    let timeout = Duration::from_secs(10);
    let max_tick = Duration::from_millis(100);

    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }

        thread::sleep(tick);
        tick = std::cmp::min(tick * 2, max_tick);
    }
}

/// A preset of a bank built by [`soundfont_bank`]. Every preset gets its own
/// instrument playing its own looped sine sample.
pub struct TestPreset {
    pub name: &'static str,
    pub bank: u16,
    pub number: u16,
    /// Instrument pan in 0.1% steps, from -500 (left) to 500 (right).
    pub pan: i16,
}

const SINE_FRAMES: usize = 64;
// SoundFont samples are followed by at least 46 zero samples.
const SAMPLE_PADDING: usize = 46;
const SAMPLE_ROOT_KEY: u8 = 60;

const GEN_REVERB_SEND: u16 = 16;
const GEN_PAN: u16 = 17;
const GEN_INSTRUMENT: u16 = 41;
const GEN_SAMPLE_ID: u16 = 53;
const GEN_SAMPLE_MODES: u16 = 54;
const LOOP_CONTINUOUS: u16 = 1;
const MONO_SAMPLE: u16 = 1;

fn riff_chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(data.len() + 8);
    chunk.extend_from_slice(id);
    chunk.extend_from_slice(&(data.len() as u32).to_le_bytes());
    chunk.extend_from_slice(data);
    chunk
}

fn riff_list(kind: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut data = kind.to_vec();
    for chunk in chunks {
        data.extend_from_slice(chunk);
    }
    riff_chunk(b"LIST", &data)
}

fn fixed_name(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    let len = name.len().min(19);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Builds a minimal SoundFont 2 bank in memory. The samples are dry, so each
/// preset's pan fully decides which side it sounds on.
pub fn soundfont_bank(presets: &[TestPreset]) -> Vec<u8> {
    let count = presets.len() as u16;
    let span = (SINE_FRAMES + SAMPLE_PADDING) as u32;

    let mut smpl = Vec::new();
    let (mut phdr, mut pbag, mut pgen) = (Vec::new(), Vec::new(), Vec::new());
    let (mut inst, mut ibag, mut igen) = (Vec::new(), Vec::new(), Vec::new());
    let mut shdr = Vec::new();

    for (index, preset) in presets.iter().enumerate() {
        let index = index as u16;
        for frame in 0..SINE_FRAMES {
            let phase = 2.0 * PI * frame as f32 / SINE_FRAMES as f32;
            let sample = (phase.sin() * 16000.0) as i16;
            smpl.extend_from_slice(&sample.to_le_bytes());
        }
        smpl.resize(smpl.len() + SAMPLE_PADDING * 2, 0);

        phdr.extend_from_slice(&fixed_name(preset.name));
        push_u16(&mut phdr, preset.number);
        push_u16(&mut phdr, preset.bank);
        push_u16(&mut phdr, index);
        phdr.extend_from_slice(&[0; 12]);
        push_u16(&mut pbag, index);
        push_u16(&mut pbag, 0);
        push_u16(&mut pgen, GEN_INSTRUMENT);
        push_u16(&mut pgen, index);

        inst.extend_from_slice(&fixed_name(preset.name));
        push_u16(&mut inst, index);
        push_u16(&mut ibag, index * 4);
        push_u16(&mut ibag, 0);
        for (generator, value) in [
            (GEN_PAN, preset.pan as u16),
            (GEN_REVERB_SEND, -1000i16 as u16),
            (GEN_SAMPLE_MODES, LOOP_CONTINUOUS),
            (GEN_SAMPLE_ID, index),
        ] {
            push_u16(&mut igen, generator);
            push_u16(&mut igen, value);
        }

        let start = u32::from(index) * span;
        let end = start + SINE_FRAMES as u32;
        shdr.extend_from_slice(&fixed_name(preset.name));
        for value in [start, end, start, end, 44100] {
            push_u32(&mut shdr, value);
        }
        shdr.extend_from_slice(&[SAMPLE_ROOT_KEY, 0]);
        push_u16(&mut shdr, 0);
        push_u16(&mut shdr, MONO_SAMPLE);
    }

    // Terminal records.
    phdr.extend_from_slice(&fixed_name("EOP"));
    push_u32(&mut phdr, 0);
    push_u16(&mut phdr, count);
    phdr.extend_from_slice(&[0; 12]);
    push_u16(&mut pbag, count);
    push_u16(&mut pbag, 0);
    pgen.extend_from_slice(&[0; 4]);
    inst.extend_from_slice(&fixed_name("EOI"));
    push_u16(&mut inst, count);
    push_u16(&mut ibag, count * 4);
    push_u16(&mut ibag, 0);
    igen.extend_from_slice(&[0; 4]);
    shdr.extend_from_slice(&fixed_name("EOS"));
    shdr.extend_from_slice(&[0; 26]);

    let info = riff_list(b"INFO", &[riff_chunk(b"ifil", &[2, 0, 1, 0])]);
    let sdta = riff_list(b"sdta", &[riff_chunk(b"smpl", &smpl)]);
    let pdta = riff_list(
        b"pdta",
        &[
            riff_chunk(b"phdr", &phdr),
            riff_chunk(b"pbag", &pbag),
            riff_chunk(b"pmod", &[0; 10]),
            riff_chunk(b"pgen", &pgen),
            riff_chunk(b"inst", &inst),
            riff_chunk(b"ibag", &ibag),
            riff_chunk(b"imod", &[0; 10]),
            riff_chunk(b"igen", &igen),
            riff_chunk(b"shdr", &shdr),
        ],
    );

    let mut body = b"sfbk".to_vec();
    body.extend_from_slice(&info);
    body.extend_from_slice(&sdta);
    body.extend_from_slice(&pdta);
    riff_chunk(b"RIFF", &body)
}

/// A bank with a melodic preset at 0:0 panned left and a drum kit at 128:0 panned
/// right.
pub fn lead_and_kit() -> Vec<u8> {
    soundfont_bank(&[
        TestPreset {
            name: "Lead",
            bank: 0,
            number: 0,
            pan: -500,
        },
        TestPreset {
            name: "Kit",
            bank: 128,
            number: 0,
            pan: 500,
        },
    ])
}

/// Sum of squares of the left and right channels of an interleaved stereo buffer.
pub fn stereo_energy(interleaved: &[f32]) -> (f32, f32) {
    interleaved
        .chunks_exact(2)
        .fold((0.0, 0.0), |(left, right), frame| {
            (left + frame[0] * frame[0], right + frame[1] * frame[1])
        })
}

