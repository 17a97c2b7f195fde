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
// Renders every loaded engine into one interleaved stereo buffer.
use crate::registry::EngineSet;

/// Mixes the published engine set. Independent of any audio backend: the scheduler
/// calls it from the device callback and the synth calls it for offline rendering.
#[derive(Clone)]
pub struct Mixer {
    /// The engines to render, shared with the registry.
    engines: EngineSet,
}

impl Mixer {
    pub(crate) fn new(engines: EngineSet) -> Self {
        Self { engines }
    }

    /// Fills `output` (interleaved stereo) with the sum of every loaded engine.
    ///
    /// The first engine overwrites the buffer and every later one adds into it, so no
    /// separate clear pass is needed. With nothing loaded the buffer is zero-filled.
    pub fn render(&self, output: &mut [f32]) {
        let snapshot = self.engines.snapshot();
        if snapshot.is_empty() {
            output.fill(0.0);
            return;
        }

        let mut mix = false;
        for loaded in snapshot.iter() {
            loaded.engine.lock().render(output, mix);
            // After the first render, accumulate.
            mix = true;
        }
    }

    /// Number of engines the next render will mix.
    pub fn engine_count(&self) -> usize {
        self.engines.snapshot().len()
    }
}
