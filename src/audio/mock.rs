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
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{AudioError, Flow, RenderCallback, Stream};

/// Frames requested per callback when none is given.
const DEFAULT_BLOCK_FRAMES: usize = 64;

/// A mock device. Calls the render callback from a plain thread at roughly the
/// real-time rate and remembers what it rendered, but plays nothing.
#[derive(Clone)]
pub struct Device {
    name: String,
    block_frames: usize,
    callbacks: Arc<AtomicU64>,
    last_block: Arc<Mutex<Vec<f32>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device::with_block_frames(name, DEFAULT_BLOCK_FRAMES)
    }

    /// Gets a mock device that requests the given number of frames per callback.
    pub fn with_block_frames(name: &str, block_frames: usize) -> Device {
        Device {
            name: name.to_string(),
            block_frames,
            callbacks: Arc::new(AtomicU64::new(0)),
            last_block: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times the callback has completed.
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Acquire)
    }

    /// The buffer produced by the most recent callback.
    pub fn last_block(&self) -> Vec<f32> {
        self.last_block.lock().clone()
    }
}

/// The stream thread of a mock device.
struct MockStream {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Stream for MockStream {
    fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl super::Device for Device {
    fn open(
        &self,
        sample_rate: u32,
        channels: u16,
        mut callback: RenderCallback,
    ) -> Result<Box<dyn Stream>, AudioError> {
        let span = span!(Level::INFO, "open stream (mock)");
        let _enter = span.enter();
        info!(
            device = self.name,
            sample_rate,
            channels,
            block_frames = self.block_frames,
            "Opening stream."
        );

        let samples = self.block_frames * channels as usize;
        *self.last_block.lock() = vec![0.0; samples];
        let period =
            Duration::from_secs_f64(self.block_frames as f64 / f64::from(sample_rate.max(1)));

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            let callbacks = self.callbacks.clone();
            let last_block = self.last_block.clone();
            thread::spawn(move || {
                let mut buffer = vec![0.0f32; samples];
                while !stop.load(Ordering::Acquire) {
                    let flow = callback(&mut buffer);
                    last_block.lock().copy_from_slice(&buffer);
                    callbacks.fetch_add(1, Ordering::AcqRel);
                    if flow == Flow::Stop {
                        break;
                    }
                    spin_sleep::sleep(period);
                }
            })
        };

        Ok(Box::new(MockStream {
            stop,
            thread: Some(thread),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
