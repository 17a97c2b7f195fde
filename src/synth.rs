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
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{self, mixer::Mixer, scheduler::Scheduler, OUTPUT_CHANNELS};
use crate::engine::{BankData, EngineLoader, PresetInfo, SoundFontLoader, SAMPLE_RATES};
use crate::error::SynthError;
use crate::gain;
use crate::registry::{EngineSetup, Registry, SharedEngine, Sfid, DEFAULT_MAX_VOICES};
use crate::router::{is_drum_channel, Router};

mod notes;

/// The sample rate used when none is given.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Per-load settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoadOptions {
    /// Gain for this SoundFont in relative dB, added to the synth's gain.
    pub gain_db: f32,
    /// Maximum simultaneous voices. A note may use more than one voice; when more are
    /// needed the engine cuts off older voices.
    pub max_voices: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            gain_db: gain::DEFAULT_GAIN_DB,
            max_voices: DEFAULT_MAX_VOICES,
        }
    }
}

/// The program selected on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramInfo {
    pub sfid: Sfid,
    pub bank: u16,
    pub preset: u8,
}

/// A synthesizer that loads SoundFonts and mixes them into one stereo stream.
///
/// Configuration calls take `&mut self` and fail with [`SynthError`]. Note events
/// take `&self` and return `false` instead of failing, since they are sent at a
/// much higher rate.
pub struct Synth {
    /// Base gain in relative dB, added to every load's gain.
    gain_db: f32,
    /// Output sample rate. Fixed for the life of the synth.
    sample_rate: u32,
    registry: Registry,
    router: Router,
    scheduler: Scheduler,
}

impl Synth {
    /// Creates a synth that loads SoundFont (sf2) banks.
    ///
    /// The sample rate must lie within [`SAMPLE_RATES`]. Outside it every load fails
    /// with [`crate::LoadError::UnsupportedSampleRate`].
    ///
    /// If many voices are mixed at once the gain may need turning down to avoid
    /// clipping. Some SoundFonts also need their own adjustment at load time.
    pub fn new(gain_db: f32, sample_rate: u32) -> Synth {
        if !SAMPLE_RATES.contains(&sample_rate) {
            warn!(
                sample_rate,
                min = SAMPLE_RATES.start(),
                max = SAMPLE_RATES.end(),
                "Sample rate not supported by the SoundFont engine"
            );
        }
        Synth::with_loader(gain_db, sample_rate, SoundFontLoader)
    }

    /// Creates a synth that builds its engines with the given loader.
    pub fn with_loader<L>(gain_db: f32, sample_rate: u32, loader: L) -> Synth
    where
        L: EngineLoader + 'static,
    {
        let registry = Registry::new(Box::new(loader));
        let scheduler = Scheduler::new(Mixer::new(registry.engine_set()), sample_rate);
        Synth {
            gain_db,
            sample_rate,
            registry,
            router: Router::new(),
            scheduler,
        }
    }

    /// The base gain in relative dB.
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// The output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Loads a SoundFont with default options and returns its id.
    pub fn load(&mut self, data: impl Into<BankData>) -> Result<Sfid, SynthError> {
        self.load_with_options(data, LoadOptions::default())
    }

    /// Loads a SoundFont and returns its id for use with [`Synth::program_select`].
    pub fn load_with_options(
        &mut self,
        data: impl Into<BankData>,
        options: LoadOptions,
    ) -> Result<Sfid, SynthError> {
        let data = data.into();
        let setup = EngineSetup {
            sample_rate: self.sample_rate,
            gain_db: gain::combine(self.gain_db, options.gain_db),
            max_voices: options.max_voices,
        };
        Ok(self.registry.load(&data, &setup)?)
    }

    /// Unloads a SoundFont. Channels routed to it become unassigned.
    pub fn unload(&mut self, sfid: Sfid) -> Result<(), SynthError> {
        self.registry.unload(sfid)?;
        self.router.remove_sfid(sfid);
        Ok(())
    }

    /// The loaded SoundFonts in load order.
    pub fn soundfonts(&self) -> Vec<Sfid> {
        self.registry.ids()
    }

    /// Number of presets in a loaded SoundFont.
    pub fn preset_count(&self, sfid: Sfid) -> Result<usize, SynthError> {
        Ok(self.registry.get(sfid)?.lock().preset_count())
    }

    /// Every preset in a loaded SoundFont.
    pub fn presets(&self, sfid: Sfid) -> Result<Vec<PresetInfo>, SynthError> {
        Ok(self.registry.get(sfid)?.lock().presets())
    }

    /// Selects a program for a channel, replacing whatever the channel played before.
    pub fn program_select(
        &mut self,
        channel: u8,
        sfid: Sfid,
        bank: u16,
        preset: u8,
    ) -> Result<(), SynthError> {
        let engine = self.registry.get(sfid)?;
        {
            let mut engine = engine.lock();
            engine.select_bank(channel, bank);
            engine.select_preset(channel, preset, is_drum_channel(channel));
        }
        if let Some(previous) = self.router.assign(channel, sfid) {
            if previous != sfid {
                debug!(channel, previous = %previous, sfid = %sfid, "Channel rerouted");
            }
        }
        info!(channel, sfid = %sfid, bank, preset, "Program selected");
        Ok(())
    }

    /// Stops every voice of a loaded SoundFont and resets its channel controllers.
    /// Channel routing and the selected programs are left as they are.
    pub fn reset(&mut self, sfid: Sfid) -> Result<(), SynthError> {
        self.registry.get(sfid)?.lock().reset();
        info!(sfid = %sfid, "SoundFont reset");
        Ok(())
    }

    /// Puts a channel back into the unassigned state.
    pub fn program_unset(&mut self, channel: u8) -> Result<(), SynthError> {
        self.router.unassign(channel)?;
        debug!(channel, "Program unset");
        Ok(())
    }

    /// The SoundFont, bank and preset selected on a channel.
    pub fn program_info(&self, channel: u8) -> Result<ProgramInfo, SynthError> {
        let sfid = self.router.sfid(channel)?;
        let engine = self.registry.get(sfid)?.lock();
        Ok(ProgramInfo {
            sfid,
            bank: engine.preset_bank(channel),
            preset: engine.preset_number(channel),
        })
    }

    /// The name of a preset in a loaded SoundFont, or `None` if it has no such preset.
    pub fn preset_name(
        &self,
        sfid: Sfid,
        bank: u16,
        number: u8,
    ) -> Result<Option<String>, SynthError> {
        Ok(self.registry.get(sfid)?.lock().preset_name(bank, number))
    }

    /// The assigned channels and the SoundFont each is routed to.
    pub fn channels(&self) -> Vec<(u8, Sfid)> {
        self.router.channels().collect()
    }

    /// Starts playback on the host's default output device.
    pub fn start(&mut self) -> Result<(), SynthError> {
        let device = audio::get_device(audio::cpal::DEFAULT_DEVICE)?;
        self.start_on(device)
    }

    /// Starts playback on the given device.
    pub fn start_on(&mut self, device: Arc<dyn audio::Device>) -> Result<(), SynthError> {
        self.scheduler.start(device.as_ref())
    }

    /// Stops playback. Once this returns no render is in progress. Does nothing if
    /// playback was never started.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Returns true while playback is running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Renders `frames` frames of interleaved stereo without an audio device.
    pub fn generate(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0; frames * OUTPUT_CHANNELS as usize];
        self.generate_into(&mut output);
        output
    }

    /// Renders interleaved stereo into `output` without an audio device.
    pub fn generate_into(&self, output: &mut [f32]) {
        Mixer::new(self.registry.engine_set()).render(output);
    }

    /// The engine a channel is routed to.
    fn routed_engine(&self, channel: u8) -> Option<&SharedEngine> {
        let sfid = self.router.get(channel)?;
        self.registry.get(sfid).ok()
    }
}

impl Drop for Synth {
    fn drop(&mut self) {
        // Engines are dropped after this, so no render may still be running.
        self.scheduler.stop();
    }
}

impl fmt::Debug for Synth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synth")
            .field("gain_db", &self.gain_db)
            .field("sample_rate", &self.sample_rate)
            .field("soundfonts", &self.registry.ids())
            .field("channels", &self.router)
            .field("running", &self.scheduler.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutputLayout;
    use crate::error::LoadError;
    use crate::testutil::{lead_and_kit, Call, StubLoader};

    fn synth() -> (Synth, StubLoader) {
        let loader = StubLoader::new();
        (Synth::with_loader(-6.0, 48000, loader.clone()), loader)
    }

    #[test]
    fn test_load_combines_gain() {
        let (mut synth, loader) = synth();
        synth
            .load_with_options(
                StubLoader::bank(),
                LoadOptions {
                    gain_db: 2.5,
                    max_voices: 32,
                },
            )
            .unwrap();
        synth.load(StubLoader::bank()).unwrap();

        assert_eq!(
            loader.calls(0),
            vec![
                Call::ConfigureOutput {
                    layout: OutputLayout::StereoInterleaved,
                    sample_rate: 48000,
                    gain_db: -3.5,
                },
                Call::SetVoiceCap(32),
            ]
        );
        assert_eq!(
            loader.calls(1),
            vec![
                Call::ConfigureOutput {
                    layout: OutputLayout::StereoInterleaved,
                    sample_rate: 48000,
                    gain_db: -6.0,
                },
                Call::SetVoiceCap(DEFAULT_MAX_VOICES),
            ]
        );
    }

    #[test]
    fn test_load_error_does_not_consume_id() {
        let (mut synth, _) = synth();
        let first = synth.load(StubLoader::bank()).unwrap();
        assert!(matches!(
            synth.load(b"nope".as_slice()),
            Err(SynthError::Load(_))
        ));
        let second = synth.load(StubLoader::bank()).unwrap();
        assert_eq!(second.value(), first.value() + 1);
        assert_eq!(synth.soundfonts(), vec![first, second]);
    }

    #[test]
    fn test_program_select_then_info() {
        let (mut synth, _) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();

        for channel in [0u8, 1, 9, 10, 15, 200] {
            synth.program_select(channel, sfid, 3, 42).unwrap();
            assert_eq!(
                synth.program_info(channel).unwrap(),
                ProgramInfo {
                    sfid,
                    bank: 3,
                    preset: 42
                }
            );
        }
    }

    #[test]
    fn test_program_select_unknown_sfid() {
        let (mut synth, _) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();
        synth.unload(sfid).unwrap();
        assert!(matches!(
            synth.program_select(0, sfid, 0, 0),
            Err(SynthError::InvalidId(id)) if id == sfid
        ));
        assert!(synth.channels().is_empty());
    }

    #[test]
    fn test_program_select_overwrites_channel() {
        let (mut synth, _) = synth();
        let a = synth.load(StubLoader::bank()).unwrap();
        let b = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(2, a, 0, 1).unwrap();
        synth.program_select(2, b, 0, 5).unwrap();
        assert_eq!(synth.program_info(2).unwrap().sfid, b);
        assert_eq!(synth.channels(), vec![(2, b)]);
    }

    #[test]
    fn test_drum_channel_flag() {
        let (mut synth, loader) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(10, sfid, 0, 0).unwrap();
        synth.program_select(0, sfid, 0, 0).unwrap();

        let presets: Vec<Call> = loader
            .calls(0)
            .into_iter()
            .filter(|call| matches!(call, Call::SelectPreset { .. }))
            .collect();
        assert_eq!(
            presets,
            vec![
                Call::SelectPreset {
                    channel: 10,
                    preset: 0,
                    drums: true
                },
                Call::SelectPreset {
                    channel: 0,
                    preset: 0,
                    drums: false
                },
            ]
        );
    }

    #[test]
    fn test_program_select_sends_bank_before_preset() {
        let (mut synth, loader) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(4, sfid, 8, 17).unwrap();

        let calls = loader.calls(0);
        assert_eq!(
            &calls[2..],
            &[
                Call::SelectBank {
                    channel: 4,
                    bank: 8
                },
                Call::SelectPreset {
                    channel: 4,
                    preset: 17,
                    drums: false
                },
            ]
        );
    }

    #[test]
    fn test_program_unset() {
        let (mut synth, _) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(1, sfid, 0, 0).unwrap();

        synth.program_unset(1).unwrap();
        assert!(matches!(
            synth.program_info(1),
            Err(SynthError::ChannelUnassigned(1))
        ));
        assert!(matches!(
            synth.program_unset(1),
            Err(SynthError::ChannelUnassigned(1))
        ));
    }

    #[test]
    fn test_unload_clears_channels() {
        let (mut synth, _) = synth();
        let a = synth.load(StubLoader::bank()).unwrap();
        let b = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(0, a, 0, 0).unwrap();
        synth.program_select(1, b, 0, 0).unwrap();
        synth.program_select(10, a, 0, 0).unwrap();

        synth.unload(a).unwrap();
        assert!(matches!(
            synth.program_info(0),
            Err(SynthError::ChannelUnassigned(0))
        ));
        assert!(matches!(
            synth.program_info(10),
            Err(SynthError::ChannelUnassigned(10))
        ));
        assert_eq!(synth.program_info(1).unwrap().sfid, b);
        assert!(matches!(synth.unload(a), Err(SynthError::InvalidId(_))));
    }

    #[test]
    fn test_preset_queries() {
        let (mut synth, _) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();

        assert_eq!(
            synth.preset_name(sfid, 0, 1).unwrap().as_deref(),
            Some("Stub 0 preset 1")
        );
        assert_eq!(synth.preset_name(sfid, 5, 1).unwrap(), None);
        assert_eq!(synth.preset_count(sfid).unwrap(), 2);
        assert_eq!(synth.presets(sfid).unwrap().len(), 2);

        synth.unload(sfid).unwrap();
        assert!(matches!(
            synth.preset_name(sfid, 0, 0),
            Err(SynthError::InvalidId(_))
        ));
        assert!(matches!(synth.presets(sfid), Err(SynthError::InvalidId(_))));
    }

    #[test]
    fn test_generate_without_engines_is_silent() {
        let (synth, _) = synth();
        let output = synth.generate(64);
        assert_eq!(output.len(), 128);
        assert!(output.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_reset_only_touches_one_engine() {
        let (mut synth, loader) = synth();
        let a = synth.load(StubLoader::bank()).unwrap();
        let b = synth.load(StubLoader::bank()).unwrap();
        synth.program_select(0, a, 0, 3).unwrap();
        synth.program_select(1, b, 0, 0).unwrap();
        assert!(synth.note_on(0, 60, 100));

        synth.reset(a).unwrap();
        assert_eq!(loader.control_calls(0).last(), Some(&Call::Reset));
        assert!(!loader.control_calls(1).contains(&Call::Reset));

        // Routing survives a reset.
        let info = synth.program_info(0).unwrap();
        assert_eq!((info.sfid, info.preset), (a, 3));
    }

    #[test]
    fn test_reset_unknown_sfid() {
        let (mut synth, _) = synth();
        let sfid = synth.load(StubLoader::bank()).unwrap();
        synth.unload(sfid).unwrap();
        assert!(matches!(
            synth.reset(sfid),
            Err(SynthError::InvalidId(id)) if id == sfid
        ));
    }

    #[test]
    fn test_unsupported_sample_rate_fails_load() {
        let mut synth = Synth::new(0.0, 8000);
        assert!(matches!(
            synth.load(lead_and_kit()),
            Err(SynthError::Load(LoadError::UnsupportedSampleRate(8000)))
        ));
        assert!(synth.soundfonts().is_empty());
    }
}
