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

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{info, span, Level};

use super::mixer::Mixer;
use super::{Device, Flow, RenderCallback, Stream, OUTPUT_CHANNELS};
use crate::error::SynthError;

/// Where the scheduler is in its lifecycle.
enum State {
    Idle,
    Running(Box<dyn Stream>),
    Stopped,
}

/// Drives the mixer from an audio device's callback.
pub struct Scheduler {
    mixer: Mixer,
    sample_rate: u32,
    state: State,
    /// Cleared when stopping so that a callback racing the close renders silence.
    active: Arc<AtomicBool>,
}

impl Scheduler {
    pub(crate) fn new(mixer: Mixer, sample_rate: u32) -> Scheduler {
        Scheduler {
            mixer,
            sample_rate,
            state: State::Idle,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens a stereo f32 stream on the device and starts mixing into it.
    pub fn start(&mut self, device: &dyn Device) -> Result<(), SynthError> {
        match self.state {
            State::Idle => {}
            State::Running(_) => return Err(SynthError::InvalidState("already running")),
            State::Stopped => {
                return Err(SynthError::InvalidState(
                    "stopped scheduler cannot restart",
                ))
            }
        }

        let span = span!(Level::INFO, "start scheduler");
        let _enter = span.enter();

        self.active.store(true, Ordering::Release);
        match device.open(self.sample_rate, OUTPUT_CHANNELS, self.callback()) {
            Ok(stream) => {
                info!(
                    device = %device,
                    sample_rate = self.sample_rate,
                    engines = self.mixer.engine_count(),
                    "Scheduler running"
                );
                self.state = State::Running(stream);
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Closes the stream and waits for any callback in flight. A no-op unless running.
    pub fn stop(&mut self) {
        if let State::Running(stream) = &mut self.state {
            self.active.store(false, Ordering::Release);
            stream.close();
            self.state = State::Stopped;
            info!("Scheduler stopped");
        }
    }

    /// Returns true while the stream is open.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running(_))
    }

    /// Returns true once the scheduler has been stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self.state, State::Stopped)
    }

    fn callback(&self) -> RenderCallback {
        let mixer = self.mixer.clone();
        let active = self.active.clone();
        Box::new(move |output: &mut [f32]| {
            if !active.load(Ordering::Acquire) {
                output.fill(0.0);
                return Flow::Stop;
            }
            mixer.render(output);
            Flow::Continue
        })
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
